//! Input row validation
//!
//! The whole table is validated before the first network call, so a
//! malformed row aborts the run before anything is sent or written.

use entsync_domain::{EntsyncError, InputFormat, InputRow, Result, RowAction};
use tracing::debug;

/// Status attached to rows without an identifier in skip-and-report formats.
pub const MISSING_IDENTIFIER: &str = "Missing identifier - SKIPPED";

/// One record as read from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number
    pub line: u64,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn new(line: u64, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    fn is_blank(&self) -> bool {
        self.fields.iter().all(|field| field.trim().is_empty())
    }

    fn field(&self, index: usize) -> &str {
        self.fields.get(index).map_or("", |field| field.trim())
    }
}

/// Validate raw records and turn them into data rows.
///
/// Blank rows and the header row are dropped. Actions are normalized but not
/// judged here: an unrecognized action is a per-row outcome, not a fatal
/// error.
///
/// # Errors
/// Returns `EntsyncError::Validation` when a row has the wrong number of
/// columns, or when a legacy row has no identifier.
pub fn parse_rows<I>(format: InputFormat, records: I) -> Result<Vec<InputRow>>
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut rows = Vec::new();

    for record in records {
        if record.is_blank() {
            continue;
        }
        check_column_count(format, &record)?;
        if record.field(0) == format.header_marker() {
            debug!(line = record.line, "skipping header row");
            continue;
        }

        let row = parse_row(format, &record)?;
        rows.push(row);
    }

    Ok(rows)
}

fn check_column_count(format: InputFormat, record: &RawRecord) -> Result<()> {
    let expected = format.columns();
    let found = record.fields.len();
    let extra_values = record.fields.iter().skip(expected).any(|field| !field.trim().is_empty());

    if found < expected || extra_values {
        return Err(EntsyncError::Validation(format!(
            "Invalid CSV file format at line {}: expected {} columns ({}), found {}",
            record.line,
            expected,
            format.report_header()[..expected].join(", "),
            found
        )));
    }
    Ok(())
}

fn parse_row(format: InputFormat, record: &RawRecord) -> Result<InputRow> {
    let (email, action, permission) = match format {
        InputFormat::Legacy => (None, record.field(1), None),
        InputFormat::Permission => (None, record.field(1), non_empty(record.field(2))),
        InputFormat::Email => (non_empty(record.field(1)), record.field(2), None),
    };

    let identifier = record.field(0).to_string();
    let mut rejection = None;
    if identifier.is_empty() {
        if format.missing_identifier_is_fatal() {
            return Err(EntsyncError::Validation(format!(
                "Missing identifier at line {}",
                record.line
            )));
        }
        rejection = Some(MISSING_IDENTIFIER.to_string());
    }

    Ok(InputRow {
        line: record.line,
        identifier,
        email,
        permission,
        action: RowAction::parse(action, format),
        rejection,
    })
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(rows: &[&[&str]]) -> Vec<RawRecord> {
        rows.iter()
            .enumerate()
            .map(|(index, fields)| {
                RawRecord::new(index as u64 + 1, fields.iter().map(|f| (*f).to_string()).collect())
            })
            .collect()
    }

    #[test]
    fn legacy_rows_skip_header_and_blank_lines() {
        let input = records(&[
            &["UserID", "Action"],
            &["1001", "add"],
            &["", ""],
            &["1002", "Remove"],
        ]);

        let rows = parse_rows(InputFormat::Legacy, input).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].identifier, "1001");
        assert_eq!(rows[0].action, RowAction::Add);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].action, RowAction::Remove);
    }

    #[test]
    fn missing_column_is_fatal() {
        let input = records(&[&["1001", "ADD"], &["1002"]]);

        let err = parse_rows(InputFormat::Legacy, input).unwrap_err();

        assert!(matches!(err, EntsyncError::Validation(ref msg) if msg.contains("line 2")));
        assert!(err.aborts_batch());
    }

    #[test]
    fn extra_non_empty_column_is_fatal() {
        let input = records(&[&["1001", "ADD", "surprise"]]);
        assert!(parse_rows(InputFormat::Legacy, input).is_err());

        let trailing_comma = records(&[&["1001", "ADD", ""]]);
        assert_eq!(parse_rows(InputFormat::Legacy, trailing_comma).unwrap().len(), 1);
    }

    #[test]
    fn legacy_missing_identifier_is_fatal() {
        let input = records(&[&["", "ADD"]]);
        assert!(matches!(
            parse_rows(InputFormat::Legacy, input),
            Err(EntsyncError::Validation(_))
        ));
    }

    #[test]
    fn newer_formats_reject_missing_identifier_per_row() {
        let input = records(&[&["advisorId", "Action", "Permission"], &["", "ADD", "create:room"]]);

        let rows = parse_rows(InputFormat::Permission, input).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rejection.as_deref(), Some(MISSING_IDENTIFIER));
    }

    #[test]
    fn permission_format_accepts_blank_action() {
        let input = records(&[&["a@example.com", "", "create:room"]]);

        let rows = parse_rows(InputFormat::Permission, input).unwrap();

        assert_eq!(rows[0].action, RowAction::Blank);
        assert_eq!(rows[0].permission.as_deref(), Some("create:room"));
    }

    #[test]
    fn email_format_maps_columns() {
        let input = records(&[&["UserID", "Email", "Action"], &["1001", "ada@example.com", "ADD"]]);

        let rows = parse_rows(InputFormat::Email, input).unwrap();

        assert_eq!(rows[0].email.as_deref(), Some("ada@example.com"));
        assert_eq!(rows[0].action, RowAction::Add);
    }

    #[test]
    fn invalid_action_is_not_a_validation_error() {
        let input = records(&[&["1001", "UPSERT"]]);

        let rows = parse_rows(InputFormat::Legacy, input).unwrap();

        assert_eq!(rows[0].action, RowAction::Invalid("UPSERT".into()));
    }
}
