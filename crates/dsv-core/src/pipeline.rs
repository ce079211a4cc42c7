//! Ordered rule pipelines
//!
//! A [`Rule`] maps a table to a new table and never sees its input
//! mutably. [`Pipeline::run_all`] applies rules in order and stops at the
//! first failure, returning the table as it stood before the failing rule.

use crate::error::{Error, Result};
use crate::table::Table;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transformation step over a table
pub trait Rule {
    /// Name used in history labels and error reports
    fn name(&self) -> &str;

    /// Produce the transformed table. The input must not be changed.
    fn apply(&self, table: &Table) -> Result<Table>;
}

impl<R: Rule + ?Sized> Rule for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn apply(&self, table: &Table) -> Result<Table> {
        (**self).apply(table)
    }
}

/// A rule backed by a closure
pub struct FnRule<F> {
    name: String,
    f: F,
}

impl<F> FnRule<F>
where
    F: Fn(&Table) -> Result<Table>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&Table) -> Result<Table>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, table: &Table) -> Result<Table> {
        (self.f)(table)
    }
}

/// How a pipeline run maps onto undo history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// Each successful rule is its own undo entry
    #[default]
    PerRule,
    /// The whole run is one undo entry
    Batch,
}

/// A pipeline run that stopped at a failing rule
#[derive(Debug)]
pub struct PipelineFailure {
    /// The table after every rule before the failing one
    pub partial: Table,
    /// Index of the failing rule
    pub index: usize,
    /// Name of the failing rule
    pub rule: String,
    /// What the rule reported
    pub error: Error,
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {} ('{}') failed: {}", self.index, self.rule, self.error)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// An ordered list of rules
#[derive(Default)]
pub struct Pipeline {
    rules: Vec<Box<dyn Rule>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    pub fn push<R: Rule + 'static>(&mut self, rule: R) -> &mut Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Builder-style append
    pub fn with<R: Rule + 'static>(mut self, rule: R) -> Self {
        self.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &(dyn Rule + 'static)> + '_ {
        self.rules.iter().map(|r| &**r)
    }

    /// Apply every rule in order
    pub fn run_all(&self, table: &Table) -> std::result::Result<Table, PipelineFailure> {
        let mut current = table.clone();
        for (index, rule) in self.rules().enumerate() {
            match rule.apply(&current) {
                Ok(next) => {
                    debug!("rule {} ('{}') applied", index, rule.name());
                    current = next;
                }
                Err(error) => {
                    debug!("rule {} ('{}') failed: {}", index, rule.name(), error);
                    return Err(PipelineFailure {
                        partial: current,
                        index,
                        rule: rule.name().to_string(),
                        error,
                    });
                }
            }
        }
        Ok(current)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rules().map(|r| r.name())).finish()
    }
}

impl FromIterator<Box<dyn Rule>> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Box<dyn Rule>>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;
    use std::cell::Cell;
    use std::rc::Rc;

    fn table() -> Table {
        Table::from_rows(vec![Row::from(vec!["a", "b"])], false).unwrap()
    }

    fn set(col: usize, value: &'static str) -> FnRule<impl Fn(&Table) -> Result<Table>> {
        FnRule::new(format!("set {col}"), move |t: &Table| {
            let mut next = t.clone();
            next.set_field(0, col, value)?;
            Ok(next)
        })
    }

    #[test]
    fn test_rules_apply_in_order() {
        let pipeline = Pipeline::new().with(set(0, "x")).with(set(0, "y"));
        let out = pipeline.run_all(&table()).unwrap();
        assert_eq!(out.get_field(0, 0).unwrap(), "y");
    }

    #[test]
    fn test_input_is_untouched() {
        let input = table();
        let pipeline = Pipeline::new().with(set(1, "z"));
        pipeline.run_all(&input).unwrap();
        assert_eq!(input, table());
    }

    #[test]
    fn test_halts_at_first_failure() {
        let third_runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&third_runs);

        let pipeline = Pipeline::new()
            .with(set(0, "first"))
            .with(FnRule::new("fails", |_: &Table| Err(Error::rule("fails", "boom"))))
            .with(FnRule::new("third", move |t: &Table| {
                counter.set(counter.get() + 1);
                Ok(t.clone())
            }));

        let failure = pipeline.run_all(&table()).unwrap_err();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.rule, "fails");
        assert_eq!(failure.partial.get_field(0, 0).unwrap(), "first");
        assert!(matches!(failure.error, Error::Rule { .. }));
        assert_eq!(third_runs.get(), 0);
    }

    #[test]
    fn test_failing_rule_effects_are_not_observable() {
        let pipeline = Pipeline::new().with(set(0, "kept")).with(FnRule::new(
            "half done",
            |t: &Table| {
                let mut next = t.clone();
                next.set_field(0, 0, "half")?;
                next.set_field(0, 9, "never")?;
                Ok(next)
            },
        ));

        let failure = pipeline.run_all(&table()).unwrap_err();
        assert_eq!(failure.partial.get_field(0, 0).unwrap(), "kept");
        assert!(matches!(failure.error, Error::Index { .. }));
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let out = Pipeline::new().run_all(&table()).unwrap();
        assert_eq!(out, table());
    }
}
