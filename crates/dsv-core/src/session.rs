//! Editing session: one live table, its history and its listeners

use crate::codec::{load_file, save_file};
use crate::error::Result;
use crate::history::{EditHandle, History};
use crate::notify::{ChangeEvent, ChangeKind, Notifier, Payload};
use crate::options::{LoadOptions, SaveOptions};
use crate::pipeline::{Granularity, Pipeline, PipelineFailure, Rule};
use crate::table::Table;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

/// Environment variable that bounds history depth
pub const HISTORY_CAPACITY_ENV: &str = "DSV_HISTORY_CAPACITY";

/// Session settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum undo depth; `None` is unbounded
    pub history_capacity: Option<usize>,
    /// How pipeline runs are recorded in history
    pub granularity: Granularity,
}

impl SessionConfig {
    /// Defaults, with `DSV_HISTORY_CAPACITY` applied when set
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(HISTORY_CAPACITY_ENV).ok().as_deref())
    }

    /// Defaults, with a raw history capacity setting applied.
    ///
    /// `None` and `"0"` mean unbounded; anything that is not a
    /// non-negative integer is logged and ignored.
    pub fn from_value(value: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(value) = value {
            match value.trim().parse::<usize>() {
                Ok(0) => config.history_capacity = None,
                Ok(n) => config.history_capacity = Some(n),
                Err(_) => warn!(
                    "ignoring {}={:?}: expected a non-negative integer",
                    HISTORY_CAPACITY_ENV, value
                ),
            }
        }
        config
    }

    pub fn with_granularity(self, granularity: Granularity) -> Self {
        Self {
            granularity,
            ..self
        }
    }

    pub fn with_history_capacity(self, capacity: Option<usize>) -> Self {
        Self {
            history_capacity: capacity,
            ..self
        }
    }
}

/// Where the live table came from
#[derive(Debug, Clone)]
struct Source {
    path: PathBuf,
    options: LoadOptions,
}

/// An editing session over a single table
#[derive(Debug)]
pub struct Session {
    history: History,
    notifier: Notifier,
    config: SessionConfig,
    target: Option<String>,
    source: Option<Source>,
}

impl Session {
    /// Start a session over an in-memory table
    pub fn new(table: Table, config: SessionConfig) -> Self {
        Self {
            history: History::with_capacity(table, config.history_capacity),
            notifier: Notifier::new(),
            config,
            target: None,
            source: None,
        }
    }

    /// Load a file and start a session over it
    pub fn open<P: AsRef<Path>>(path: P, options: LoadOptions, config: SessionConfig) -> Result<Self> {
        let table = load_file(path.as_ref(), &options)?;
        let mut session = Self::new(table, config);
        session.source = Some(Source {
            path: path.as_ref().to_path_buf(),
            options,
        });
        Ok(session)
    }

    /// The live table
    pub fn table(&self) -> &Table {
        self.history.current()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Path the live table was loaded from, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_ref().map(|s| s.path.as_path())
    }

    /// Options the live table was loaded with, if it came from a file
    pub fn load_options(&self) -> Option<&LoadOptions> {
        self.source.as_ref().map(|s| &s.options)
    }

    /// Set the identifier stamped on subsequent change events
    pub fn set_target(&mut self, target: Option<String>) {
        self.target = target;
    }

    /// Listen for change events
    pub fn subscribe(&mut self) -> Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    fn publish(&mut self, kind: ChangeKind, payload: Payload) {
        let event = ChangeEvent::new(kind, self.target.clone()).with_payload(payload);
        self.notifier.publish(event);
    }

    /// Replace the live table with a file's contents and reset history.
    ///
    /// The file is parsed completely before anything is installed; on error
    /// the session is unchanged.
    pub fn load<P: AsRef<Path>>(&mut self, path: P, options: LoadOptions) -> Result<()> {
        let table = load_file(path.as_ref(), &options)?;
        self.history.reset(table);
        self.source = Some(Source {
            path: path.as_ref().to_path_buf(),
            options,
        });
        self.publish(ChangeKind::Loaded, Payload::default());
        Ok(())
    }

    /// Replace the live table with an in-memory one and reset history
    pub fn replace_table(&mut self, table: Table) {
        self.history.reset(table);
        self.source = None;
        self.publish(ChangeKind::Loaded, Payload::default());
    }

    /// Start a scoped edit of the live table
    pub fn begin_edit(&mut self, label: impl Into<String>) -> SessionEdit<'_> {
        SessionEdit {
            edit: self.history.begin_edit(label),
            notifier: &mut self.notifier,
            target: self.target.clone(),
            payload: Payload::default(),
        }
    }

    /// Apply one rule as one undoable step
    pub fn apply(&mut self, rule: &dyn Rule) -> Result<&Table> {
        let next = rule.apply(self.history.current())?;
        let label = rule.name().to_string();
        self.history.commit(label.clone(), next);
        self.publish(ChangeKind::Committed { label }, Payload::default());
        Ok(self.history.current())
    }

    /// Run a pipeline against the live table.
    ///
    /// Returns the number of rules applied. On failure the live table holds
    /// the result of every rule before the failing one, recorded in history
    /// according to the configured [`Granularity`].
    pub fn run_pipeline(&mut self, pipeline: &Pipeline) -> std::result::Result<usize, PipelineFailure> {
        let outcome = match self.config.granularity {
            Granularity::PerRule => self.run_per_rule(pipeline),
            Granularity::Batch => self.run_batch(pipeline),
        };

        let (applied, failed_at) = match &outcome {
            Ok(applied) => (*applied, None),
            Err(failure) => (failure.index, Some(failure.index)),
        };
        self.publish(ChangeKind::Pipeline { applied, failed_at }, Payload::default());
        outcome
    }

    fn run_per_rule(&mut self, pipeline: &Pipeline) -> std::result::Result<usize, PipelineFailure> {
        for (index, rule) in pipeline.rules().enumerate() {
            match rule.apply(self.history.current()) {
                Ok(next) => self.history.commit(rule.name(), next),
                Err(error) => {
                    return Err(PipelineFailure {
                        partial: self.history.current().clone(),
                        index,
                        rule: rule.name().to_string(),
                        error,
                    });
                }
            }
        }
        Ok(pipeline.len())
    }

    fn run_batch(&mut self, pipeline: &Pipeline) -> std::result::Result<usize, PipelineFailure> {
        let label = format!("pipeline ({} rules)", pipeline.len());
        match pipeline.run_all(self.history.current()) {
            Ok(table) => {
                self.history.commit(label, table);
                Ok(pipeline.len())
            }
            Err(failure) => {
                if failure.index > 0 {
                    self.history.commit(label, failure.partial.clone());
                }
                Err(failure)
            }
        }
    }

    /// Revert the most recent edit
    pub fn undo(&mut self) -> Result<&Table> {
        let label = self.history.peek_undo_label().unwrap_or_default().to_string();
        self.history.undo()?;
        self.publish(ChangeKind::Undone { label }, Payload::default());
        Ok(self.history.current())
    }

    /// Reapply the most recently undone edit
    pub fn redo(&mut self) -> Result<&Table> {
        let label = self.history.peek_redo_label().unwrap_or_default().to_string();
        self.history.redo()?;
        self.publish(ChangeKind::Redone { label }, Payload::default());
        Ok(self.history.current())
    }

    /// Write the live table to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P, options: &SaveOptions) -> Result<()> {
        save_file(path, self.history.current(), options)
    }

    /// Write the live table back to the file it was loaded from, in the same format.
    ///
    /// Returns the path written, or `None` if the table did not come from a file.
    pub fn save_in_place(&self) -> Result<Option<PathBuf>> {
        let Some(source) = &self.source else {
            return Ok(None);
        };
        save_file(&source.path, self.history.current(), &SaveOptions::from(&source.options))?;
        info!("saved in place: {}", source.path.display());
        Ok(Some(source.path.clone()))
    }
}

/// A scoped edit that notifies listeners when committed
pub struct SessionEdit<'a> {
    edit: EditHandle<'a>,
    notifier: &'a mut Notifier,
    target: Option<String>,
    payload: Payload,
}

impl SessionEdit<'_> {
    /// Attach an opaque payload to the commit notification
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn table(&self) -> &Table {
        self.edit.table()
    }

    pub fn table_mut(&mut self) -> &mut Table {
        self.edit.table_mut()
    }

    pub fn commit(self) {
        let label = self.edit.commit();
        Self::notify(self.notifier, label, self.target, self.payload);
    }

    pub fn commit_with(self, table: Table) {
        let label = self.edit.commit_with(table);
        Self::notify(self.notifier, label, self.target, self.payload);
    }

    /// Abandon the edit and restore the pre-edit table
    pub fn discard(self) {
        self.edit.discard();
    }

    fn notify(notifier: &mut Notifier, label: String, target: Option<String>, payload: Payload) {
        let event = ChangeEvent::new(ChangeKind::Committed { label }, target).with_payload(payload);
        notifier.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pipeline::FnRule;
    use crate::rules::{ColumnRef, RuleSpec};
    use crate::table::Row;

    fn table() -> Table {
        Table::from_rows(
            vec![Row::from(vec!["k", "v"]), Row::from(vec!["a", "1"])],
            true,
        )
        .unwrap()
    }

    fn upper(column: &str) -> RuleSpec {
        RuleSpec::Uppercase {
            column: ColumnRef::Name(column.to_string()),
        }
    }

    #[test]
    fn test_undo_on_fresh_session() {
        let mut session = Session::new(table(), SessionConfig::default());
        assert!(session.undo().unwrap_err().is_empty_history());
    }

    #[test]
    fn test_apply_notifies_and_undoes() {
        let mut session = Session::new(table(), SessionConfig::default());
        session.set_target(Some("grid".to_string()));
        let events = session.subscribe();

        session.apply(&upper("k")).unwrap();
        assert_eq!(session.table().get_field(1, 0).unwrap(), "A");

        session.undo().unwrap();
        assert_eq!(session.table(), &table());

        let first = events.try_recv().unwrap();
        assert_eq!(first.target.as_deref(), Some("grid"));
        assert_eq!(
            first.kind,
            ChangeKind::Committed {
                label: "uppercase".to_string()
            }
        );
        assert_eq!(
            events.try_recv().unwrap().kind,
            ChangeKind::Undone {
                label: "uppercase".to_string()
            }
        );
    }

    #[test]
    fn test_failed_apply_leaves_session_untouched() {
        let mut session = Session::new(table(), SessionConfig::default());
        let events = session.subscribe();
        assert!(session.apply(&upper("nope")).is_err());
        assert_eq!(session.table(), &table());
        assert!(!session.history().can_undo());
        assert!(events.try_recv().is_err());
    }

    fn failing_pipeline() -> Pipeline {
        Pipeline::new()
            .with(upper("k"))
            .with(RuleSpec::SetField {
                row: 0,
                column: ColumnRef::Index(1),
                value: "2".to_string(),
            })
            .with(FnRule::new("fails", |_: &Table| Err(Error::rule("fails", "nope"))))
            .with(upper("v"))
    }

    #[test]
    fn test_pipeline_per_rule_history() {
        let mut session = Session::new(table(), SessionConfig::default());
        let failure = session.run_pipeline(&failing_pipeline()).unwrap_err();

        assert_eq!(failure.index, 2);
        assert_eq!(session.table().get_field(1, 0).unwrap(), "A");
        assert_eq!(session.table().get_field(1, 1).unwrap(), "2");
        assert_eq!(session.history().undo_labels(), vec!["uppercase", "set_field"]);

        session.undo().unwrap();
        assert_eq!(session.table().get_field(1, 1).unwrap(), "1");
    }

    #[test]
    fn test_pipeline_batch_history() {
        let config = SessionConfig::default().with_granularity(Granularity::Batch);
        let mut session = Session::new(table(), config);
        let events = session.subscribe();

        assert!(session.run_pipeline(&failing_pipeline()).is_err());
        assert_eq!(session.history().undo_len(), 1);
        assert_eq!(session.table().get_field(1, 1).unwrap(), "2");

        assert_eq!(
            events.try_recv().unwrap().kind,
            ChangeKind::Pipeline {
                applied: 2,
                failed_at: Some(2)
            }
        );

        session.undo().unwrap();
        assert_eq!(session.table(), &table());
    }

    #[test]
    fn test_batch_success_is_one_entry() {
        let config = SessionConfig::default().with_granularity(Granularity::Batch);
        let mut session = Session::new(table(), config);
        let pipeline = Pipeline::new().with(upper("k")).with(upper("v"));
        assert_eq!(session.run_pipeline(&pipeline).unwrap(), 2);
        assert_eq!(session.history().undo_len(), 1);
    }

    #[test]
    fn test_session_edit_commit_carries_payload() {
        let mut session = Session::new(table(), SessionConfig::default());
        let events = session.subscribe();

        let mut payload = Payload::new();
        payload.insert("source", "keyboard");

        let mut edit = session.begin_edit("type").with_payload(payload.clone());
        edit.table_mut().set_field(1, 1, "42").unwrap();
        edit.commit();

        let event = events.try_recv().unwrap();
        assert_eq!(event.payload, payload);
        assert_eq!(session.table().get_field(1, 1).unwrap(), "42");
    }

    #[test]
    fn test_session_edit_dropped_is_discarded() {
        let mut session = Session::new(table(), SessionConfig::default());
        {
            let mut edit = session.begin_edit("oops");
            edit.table_mut().push_row(vec!["b", "2"]).unwrap();
        }
        assert_eq!(session.table(), &table());
        assert!(!session.history().can_undo());
    }

    #[test]
    fn test_replace_table_resets_history() {
        let mut session = Session::new(table(), SessionConfig::default());
        session.apply(&upper("k")).unwrap();
        session.replace_table(Table::new());
        assert!(!session.history().can_undo());
        assert!(session.table().is_empty());
    }

    #[test]
    fn test_history_capacity_from_config() {
        let config = SessionConfig::default().with_history_capacity(Some(1));
        let mut session = Session::new(table(), config);
        session.apply(&upper("k")).unwrap();
        session.apply(&upper("v")).unwrap();
        assert_eq!(session.history().undo_len(), 1);
    }

    #[test]
    fn test_history_capacity_setting() {
        assert_eq!(SessionConfig::from_value(None).history_capacity, None);
        assert_eq!(SessionConfig::from_value(Some("0")).history_capacity, None);
        assert_eq!(SessionConfig::from_value(Some(" 25 ")).history_capacity, Some(25));
        assert_eq!(SessionConfig::from_value(Some("lots")).history_capacity, None);
        assert_eq!(SessionConfig::from_value(Some("-3")), SessionConfig::default());
    }

    #[test]
    fn test_history_capacity_from_env() {
        std::env::set_var(HISTORY_CAPACITY_ENV, "3");
        assert_eq!(SessionConfig::from_env().history_capacity, Some(3));

        std::env::set_var(HISTORY_CAPACITY_ENV, "0");
        assert_eq!(SessionConfig::from_env().history_capacity, None);

        std::env::set_var(HISTORY_CAPACITY_ENV, "not a number");
        assert_eq!(SessionConfig::from_env().history_capacity, None);

        std::env::remove_var(HISTORY_CAPACITY_ENV);
        assert_eq!(SessionConfig::from_env(), SessionConfig::default());
    }
}
