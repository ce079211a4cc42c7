//! dsv-core: Core library for editing delimiter-separated tables
//!
//! This library provides functionality to:
//! - Parse and serialize DSV text (CSV, TSV, ...) with explicit delimiter,
//!   header, encoding and ragged-row options
//! - Hold the data as an owned, independently cloneable table
//! - Apply ordered rule pipelines with undo/redo over table snapshots
//! - Notify listeners when the live table changes
//! - Run rule files over whole directories

pub mod batch;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod history;
pub mod notify;
pub mod options;
pub mod pipeline;
pub mod rules;
pub mod scanner;
pub mod session;
pub mod table;

pub use batch::{run_batch, BatchFile, BatchReport};
pub use codec::{load_file, parse, parse_str, save_file, serialize, serialize_string};
pub use encoding::Encoding;
pub use error::{Error, HistoryOp, IndexKind, Result};
pub use history::{EditHandle, History, HistoryEntry};
pub use notify::{ChangeEvent, ChangeKind, Notifier, Payload};
pub use options::{Delimiter, LineTerminator, LoadOptions, RaggedPolicy, SaveOptions};
pub use pipeline::{FnRule, Granularity, Pipeline, PipelineFailure, Rule};
pub use rules::{ColumnRef, RuleFile, RuleSpec};
pub use scanner::scan_directory;
pub use session::{Session, SessionConfig, SessionEdit};
pub use table::{Row, Table};
