//! DSV codec: delimited text to [`Table`] and back
//!
//! Quoting follows RFC 4180 (double quotes, embedded quotes doubled), so a
//! delimiter or line break inside a quoted field is data, not structure.
//! Blank lines between records are skipped.

use crate::error::{Error, Result};
use crate::options::{LineTerminator, LoadOptions, RaggedPolicy, SaveOptions};
use crate::table::{Row, Table};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// Parse raw bytes into a table
pub fn parse(bytes: &[u8], options: &LoadOptions) -> Result<Table> {
    let text = options.encoding().decode(bytes)?;
    parse_str(&text, options)
}

/// Parse already-decoded text into a table
pub fn parse_str(text: &str, options: &LoadOptions) -> Result<Table> {
    // The csv reader drops a leading U+FEFF; here it is field content
    let body = text.trim_start_matches('\u{FEFF}');
    let leading_boms = (text.len() - body.len()) / '\u{FEFF}'.len_utf8();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter().byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records: Vec<(Row, u64)> = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        records.push((record.iter().collect(), line));
    }

    if leading_boms > 0 {
        restore_leading_boms(&mut records, body, leading_boms);
    }

    if options.ragged() == RaggedPolicy::Reject {
        if let Some((first, _)) = records.first() {
            let expected = first.len();
            let mismatch = records
                .iter()
                .enumerate()
                .find(|(_, (row, _))| row.len() != expected);
            if let Some((record, (row, line))) = mismatch {
                return Err(Error::RaggedRow {
                    record,
                    line: *line,
                    expected,
                    found: row.len(),
                });
            }
        }
    }

    let column_count = match options.ragged() {
        RaggedPolicy::PadToWidest => records.iter().map(|(r, _)| r.len()).max(),
        _ => records.first().map(|(r, _)| r.len()),
    }
    .unwrap_or(0);

    let rows: Vec<Row> = records
        .into_iter()
        .enumerate()
        .map(|(index, (row, line))| fit_row(row, column_count, index, line))
        .collect();

    debug!(
        "parsed {} rows x {} columns (header: {})",
        rows.len(),
        column_count,
        options.has_header()
    );

    Ok(Table::from_parts(rows, column_count, options.has_header()))
}

/// Put `count` stripped U+FEFF characters back where they came from.
///
/// If nothing but the BOMs sat on line 1, the reader skipped that line as
/// blank, so it becomes a one-field row of its own. Otherwise they belong
/// to the first field of the first record.
fn restore_leading_boms(records: &mut Vec<(Row, u64)>, body: &str, count: usize) {
    let boms = "\u{FEFF}".repeat(count);
    let line_was_bom_only = body.is_empty() || body.starts_with(['\n', '\r']);

    match records.first_mut() {
        Some((row, _)) if !line_was_bom_only => {
            if let Some(field) = row.get_mut(0) {
                field.insert_str(0, &boms);
            }
        }
        _ => records.insert(0, (Row::from(vec![boms]), 1)),
    }
}

/// Pad or truncate a record to the table width
fn fit_row(row: Row, column_count: usize, index: usize, line: u64) -> Row {
    if row.len() == column_count {
        return row;
    }
    let found = row.len();
    let mut fields = row.into_fields();
    if found > column_count {
        warn!(
            "record {} (line {}) has {} fields, truncating to {}",
            index, line, found, column_count
        );
        fields.truncate(column_count);
    } else {
        debug!(
            "record {} (line {}) has {} fields, padding to {}",
            index, line, found, column_count
        );
        fields.resize(column_count, String::new());
    }
    Row::new(fields)
}

/// Serialize a table to bytes in the requested delimiter and encoding
pub fn serialize(table: &Table, options: &SaveOptions) -> Result<Vec<u8>> {
    let text = serialize_string(table, options)?;
    Ok(options.encoding().encode(&text))
}

/// Serialize a table to a string, before encoding
pub fn serialize_string(table: &Table, options: &SaveOptions) -> Result<String> {
    let terminator = match options.line_terminator() {
        LineTerminator::Lf => csv::Terminator::Any(b'\n'),
        LineTerminator::CrLf => csv::Terminator::CRLF,
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter().byte())
        .terminator(terminator)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    for row in table.rows() {
        writer.write_record(row.iter())?;
    }

    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    debug!("serialized {} rows ({} bytes)", table.row_count(), bytes.len());

    // The writer only emits the UTF-8 we handed it plus ASCII framing
    String::from_utf8(bytes).map_err(|e| Error::Encoding {
        encoding: crate::encoding::Encoding::Utf8,
        offset: e.utf8_error().valid_up_to(),
        message: e.to_string(),
    })
}

/// Read and parse a file
pub fn load_file<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Table> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let table = parse(&bytes, options)?;
    info!(
        "loaded {} ({} rows, {} columns)",
        path.display(),
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Serialize a table and write it to a file
pub fn save_file<P: AsRef<Path>>(path: P, table: &Table, options: &SaveOptions) -> Result<()> {
    let path = path.as_ref();
    let bytes = serialize(table, options)?;
    fs::write(path, &bytes).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("saved {} ({} rows)", path.display(), table.row_count());
    Ok(())
}
