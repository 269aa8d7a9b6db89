//! CSV input reader and report writers
//!
//! Reports start with a UTF-8 byte-order mark and use CRLF record
//! terminators so spreadsheet tools open them with the right encoding.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::{ReaderBuilder, Terminator, Trim, WriterBuilder};
use entsync_core::batch::input::RawRecord;
use entsync_domain::constants::UTF8_BOM;
use entsync_domain::{EntitlementRecord, EntsyncError, InputFormat, Result, RowResult};
use tracing::{debug, info};

use crate::errors::map_infra;

/// Roster report columns
pub const ROSTER_HEADER: [&str; 5] =
    ["UserID", "First Name", "Last Name", "Display Name", "Entitlement Type"];

/// Read every row of the input table.
///
/// No header interpretation happens here; rows keep their 1-based line
/// numbers so validation errors can point at them.
///
/// # Errors
/// Returns `EntsyncError::Io` when the file cannot be opened and
/// `EntsyncError::Validation` when a row is not valid UTF-8.
pub fn read_input(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| {
            EntsyncError::Io(format!("failed to open input {}: {e}", path.display()))
        })?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(map_infra)?;
        let line = record.position().map_or(index as u64 + 1, csv::Position::line);

        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        if index == 0 {
            if let Some(first) = fields.first_mut() {
                if let Some(stripped) = first.strip_prefix(UTF8_BOM) {
                    *first = stripped.trim().to_string();
                }
            }
        }

        rows.push(RawRecord::new(line, fields));
    }

    debug!(path = %path.display(), rows = rows.len(), "read input table");
    Ok(rows)
}

/// Write the per-row outcome report, one line per result in order.
///
/// # Errors
/// Returns `EntsyncError::Io` when the file cannot be written.
pub fn write_results(path: &Path, format: InputFormat, results: &[RowResult]) -> Result<()> {
    let mut writer = bom_writer(path)?;
    writer.write_record(format.report_header()).map_err(map_infra)?;
    for result in results {
        writer.write_record(result.report_columns(format)).map_err(map_infra)?;
    }
    writer.flush().map_err(map_infra)?;

    info!(path = %path.display(), rows = results.len(), "wrote results report");
    Ok(())
}

/// Write the roster snapshot. Nothing is written for an empty listing.
///
/// Returns whether a file was written.
///
/// # Errors
/// Returns `EntsyncError::Io` when the file cannot be written.
pub fn write_roster(path: &Path, records: &[EntitlementRecord]) -> Result<bool> {
    if records.is_empty() {
        info!(path = %path.display(), "listing is empty, roster not written");
        return Ok(false);
    }

    let mut writer = bom_writer(path)?;
    writer.write_record(ROSTER_HEADER).map_err(map_infra)?;
    for record in records {
        writer
            .write_record([
                record.user_id.as_str(),
                record.first_name.as_deref().unwrap_or_default(),
                record.last_name.as_deref().unwrap_or_default(),
                record.display_name.as_deref().unwrap_or_default(),
                record.entitlement_type.as_str(),
            ])
            .map_err(map_infra)?;
    }
    writer.flush().map_err(map_infra)?;

    info!(path = %path.display(), rows = records.len(), "wrote roster report");
    Ok(true)
}

fn bom_writer(path: &Path) -> Result<csv::Writer<File>> {
    let mut file = File::create(path).map_err(|e| {
        EntsyncError::Io(format!("failed to create {}: {e}", path.display()))
    })?;
    file.write_all(UTF8_BOM.as_bytes()).map_err(map_infra)?;
    Ok(WriterBuilder::new().terminator(Terminator::CRLF).from_writer(file))
}

#[cfg(test)]
mod tests {
    use entsync_domain::Network;
    use tempfile::TempDir;

    use super::*;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn read_input_strips_bom_and_trims() {
        let dir = TempDir::new().unwrap();
        let path =
            write_file(&dir, "in.csv", "\u{feff}UserID,Action\r\n 123 , add \r\n\r\n456,REMOVE\r\n");

        let rows = read_input(&path).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fields, vec!["UserID", "Action"]);
        assert_eq!(rows[1].fields, vec!["123", "add"]);
        assert_eq!(rows[2].fields, vec!["456", "REMOVE"]);
        assert!(rows[0].line >= 1);
        assert!(rows[0].line < rows[1].line && rows[1].line < rows[2].line);
    }

    #[test]
    fn read_input_keeps_ragged_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "in.csv", "1,ADD\n2\n3,ADD,extra\n");

        let rows = read_input(&path).unwrap();

        let widths: Vec<usize> = rows.iter().map(|r| r.fields.len()).collect();
        assert_eq!(widths, vec![2, 1, 3]);
    }

    #[test]
    fn read_input_missing_file_is_io_error() {
        let result = read_input(Path::new("/nonexistent/input.csv"));
        assert!(matches!(result, Err(EntsyncError::Io(_))));
    }

    #[test]
    fn results_report_has_bom_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let results = vec![
            RowResult {
                identifier: "123".into(),
                email: None,
                action: "ADD".into(),
                permission: None,
                status: "Jane Doe added successfully".into(),
            },
            RowResult {
                identifier: "456".into(),
                email: None,
                action: "DROP".into(),
                permission: None,
                status: "Action is not ADD/REMOVE - SKIPPED".into(),
            },
        ];

        write_results(&path, InputFormat::Legacy, &results).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(UTF8_BOM));
        let lines: Vec<&str> = contents.trim_start_matches(UTF8_BOM).lines().collect();
        assert_eq!(
            lines,
            vec![
                "UserID,Action,Status",
                "123,ADD,Jane Doe added successfully",
                "456,DROP,Action is not ADD/REMOVE - SKIPPED",
            ]
        );
    }

    #[test]
    fn permission_report_quotes_fields_with_commas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let results = vec![RowResult {
            identifier: "jane@example.com".into(),
            email: None,
            action: "ADD".into(),
            permission: Some("create:room".into()),
            status: "409 - Conflict, already entitled".into(),
        }];

        write_results(&path, InputFormat::Permission, &results).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.trim_start_matches(UTF8_BOM).lines().collect();
        assert_eq!(lines[0], "advisorId,Action,Permission,Status");
        assert_eq!(lines[1], "jane@example.com,ADD,create:room,\"409 - Conflict, already entitled\"");
    }

    #[test]
    fn roster_written_with_blank_optional_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.csv");
        let records = vec![EntitlementRecord {
            user_id: "123".into(),
            network: Network::WhatsApp,
            entitlement_type: "WHATSAPPGROUPS".into(),
            first_name: Some("Jane".into()),
            last_name: None,
            display_name: Some("Jane D".into()),
            email: None,
            permissions: Vec::new(),
        }];

        assert!(write_roster(&path, &records).unwrap());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(UTF8_BOM));
        let lines: Vec<&str> = contents.trim_start_matches(UTF8_BOM).lines().collect();
        assert_eq!(lines[0], "UserID,First Name,Last Name,Display Name,Entitlement Type");
        assert_eq!(lines[1], "123,Jane,,Jane D,WHATSAPPGROUPS");
    }

    #[test]
    fn empty_roster_is_not_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.csv");

        assert!(!write_roster(&path, &[]).unwrap());
        assert!(!path.exists());
    }
}
