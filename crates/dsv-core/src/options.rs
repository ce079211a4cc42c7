//! Load and save options for the DSV codec

use crate::encoding::Encoding;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated field delimiter.
///
/// Any non-empty string is accepted by the data model, but the codec
/// reads and writes through the `csv` crate which splits on a single
/// byte, so construction rejects anything that is not one ASCII character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Delimiter(u8);

impl Delimiter {
    pub const TAB: Delimiter = Delimiter(b'\t');
    pub const COMMA: Delimiter = Delimiter(b',');
    pub const SEMICOLON: Delimiter = Delimiter(b';');
    pub const PIPE: Delimiter = Delimiter(b'|');

    /// Parse a delimiter from text. `\t` and `tab` are accepted as aliases for a tab.
    pub fn new(s: &str) -> Result<Self> {
        match s {
            "\\t" | "tab" => return Ok(Self::TAB),
            _ => {}
        }
        match s.as_bytes() {
            [b] if b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r' => Ok(Delimiter(*b)),
            _ => Err(Error::InvalidDelimiter(s.to_string())),
        }
    }

    /// The delimiter byte
    pub fn byte(&self) -> u8 {
        self.0
    }

    /// The delimiter as a string
    pub fn as_str(&self) -> &str {
        // Always ASCII by construction
        std::str::from_utf8(std::slice::from_ref(&self.0)).unwrap_or("\t")
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::TAB
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            b'\t' => write!(f, "\\t"),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl TryFrom<String> for Delimiter {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Delimiter::new(&value)
    }
}

impl From<Delimiter> for String {
    fn from(value: Delimiter) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for Delimiter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Delimiter::new(s)
    }
}

/// What to do with records whose width disagrees with the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RaggedPolicy {
    /// Fail with [`Error::RaggedRow`] on the first mismatching record
    #[default]
    Reject,
    /// Widen the table to its widest record, padding short records with empty fields
    PadToWidest,
    /// Keep the first record's width, padding short records and truncating long ones
    FitToFirst,
}

impl FromStr for RaggedPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "reject" => Ok(RaggedPolicy::Reject),
            "pad" | "pad-to-widest" => Ok(RaggedPolicy::PadToWidest),
            "fit" | "fit-to-first" => Ok(RaggedPolicy::FitToFirst),
            other => Err(format!(
                "unknown ragged-row policy '{}', expected reject, pad or fit",
                other
            )),
        }
    }
}

/// Options for parsing DSV text.
///
/// The default is the documented fallback: no header row, tab delimiter,
/// UTF-8 without BOM, ragged records rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    has_header: bool,
    delimiter: Delimiter,
    encoding: Encoding,
    ragged: RaggedPolicy,
}

impl LoadOptions {
    /// Create load options from their parts
    pub fn new(has_header: bool, delimiter: Delimiter, encoding: Encoding) -> Self {
        Self {
            has_header,
            delimiter,
            encoding,
            ragged: RaggedPolicy::default(),
        }
    }

    /// Tab-separated, no header
    pub fn tsv() -> Self {
        Self::default()
    }

    /// Comma-separated, no header
    pub fn csv() -> Self {
        Self::default().with_delimiter(Delimiter::COMMA)
    }

    pub fn with_header(self, has_header: bool) -> Self {
        Self { has_header, ..self }
    }

    pub fn with_delimiter(self, delimiter: Delimiter) -> Self {
        Self { delimiter, ..self }
    }

    pub fn with_encoding(self, encoding: Encoding) -> Self {
        Self { encoding, ..self }
    }

    pub fn with_ragged(self, ragged: RaggedPolicy) -> Self {
        Self { ragged, ..self }
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn ragged(&self) -> RaggedPolicy {
        self.ragged
    }
}

/// Line terminator written between records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    #[default]
    Lf,
    CrLf,
}

/// Options for serializing a table, mirroring [`LoadOptions`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    delimiter: Delimiter,
    encoding: Encoding,
    line_terminator: LineTerminator,
}

impl SaveOptions {
    pub fn new(delimiter: Delimiter, encoding: Encoding) -> Self {
        Self {
            delimiter,
            encoding,
            line_terminator: LineTerminator::default(),
        }
    }

    pub fn with_delimiter(self, delimiter: Delimiter) -> Self {
        Self { delimiter, ..self }
    }

    pub fn with_encoding(self, encoding: Encoding) -> Self {
        Self { encoding, ..self }
    }

    pub fn with_line_terminator(self, line_terminator: LineTerminator) -> Self {
        Self {
            line_terminator,
            ..self
        }
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn line_terminator(&self) -> LineTerminator {
        self.line_terminator
    }
}

impl From<&LoadOptions> for SaveOptions {
    fn from(options: &LoadOptions) -> Self {
        SaveOptions::new(options.delimiter(), options.encoding())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_accepts_single_ascii() {
        assert_eq!(Delimiter::new(",").unwrap(), Delimiter::COMMA);
        assert_eq!(Delimiter::new("\t").unwrap(), Delimiter::TAB);
        assert_eq!(Delimiter::new("\\t").unwrap(), Delimiter::TAB);
        assert_eq!(Delimiter::new("|").unwrap().as_str(), "|");
    }

    #[test]
    fn test_delimiter_rejects_bad_input() {
        assert!(matches!(Delimiter::new(""), Err(Error::InvalidDelimiter(_))));
        assert!(Delimiter::new("::").is_err());
        assert!(Delimiter::new("\"").is_err());
        assert!(Delimiter::new("\n").is_err());
        assert!(Delimiter::new("§").is_err());
    }

    #[test]
    fn test_default_is_documented_fallback() {
        let options = LoadOptions::default();
        assert!(!options.has_header());
        assert_eq!(options.delimiter(), Delimiter::TAB);
        assert_eq!(options.encoding(), Encoding::Utf8);
        assert_eq!(options.ragged(), RaggedPolicy::Reject);
    }

    #[test]
    fn test_load_options_json() {
        let json = r#"{"has_header": true, "delimiter": ",", "encoding": "utf-8-bom"}"#;
        let options: LoadOptions = serde_json::from_str(json).unwrap();
        assert!(options.has_header());
        assert_eq!(options.delimiter(), Delimiter::COMMA);
        assert_eq!(options.encoding(), Encoding::Utf8Bom);
        assert_eq!(options.ragged(), RaggedPolicy::Reject);

        let bad = r#"{"delimiter": ";;"}"#;
        assert!(serde_json::from_str::<LoadOptions>(bad).is_err());
    }

    #[test]
    fn test_save_options_mirror_load() {
        let load = LoadOptions::csv().with_encoding(Encoding::Utf16Le);
        let save = SaveOptions::from(&load);
        assert_eq!(save.delimiter(), Delimiter::COMMA);
        assert_eq!(save.encoding(), Encoding::Utf16Le);
        assert_eq!(save.line_terminator(), LineTerminator::Lf);
    }
}
