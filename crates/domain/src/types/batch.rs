//! Batch input rows and per-row results

use serde::{Deserialize, Serialize};

/// Supported input table layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// `UserID, Action`
    #[default]
    Legacy,
    /// `advisorId, Action, Permission`
    Permission,
    /// `UserID, Email, Action`
    Email,
}

crate::impl_token_conversions!(InputFormat {
    Legacy => "legacy",
    Permission => "permission" | "permissions",
    Email => "email",
});

impl InputFormat {
    /// Number of columns a data row must provide.
    pub fn columns(self) -> usize {
        match self {
            Self::Legacy => 2,
            Self::Permission | Self::Email => 3,
        }
    }

    /// Literal first-column value identifying the header row.
    pub fn header_marker(self) -> &'static str {
        match self {
            Self::Legacy | Self::Email => "UserID",
            Self::Permission => "advisorId",
        }
    }

    /// Whether an empty action token is accepted.
    pub fn allows_blank_action(self) -> bool {
        matches!(self, Self::Permission)
    }

    /// Legacy input aborts the batch on a missing identifier; newer formats
    /// skip the row and report it.
    pub fn missing_identifier_is_fatal(self) -> bool {
        matches!(self, Self::Legacy)
    }

    /// Header of the per-row outcome report.
    pub fn report_header(self) -> &'static [&'static str] {
        match self {
            Self::Legacy => &["UserID", "Action", "Status"],
            Self::Permission => &["advisorId", "Action", "Permission", "Status"],
            Self::Email => &["UserID", "Email", "Action", "Status"],
        }
    }
}

/// Normalized action requested by a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowAction {
    Add,
    Remove,
    /// Blank action, only valid for formats that allow it
    Blank,
    /// Anything else, kept verbatim (upper-cased) for the report
    Invalid(String),
}

impl RowAction {
    /// Normalize a raw action token for the given format.
    pub fn parse(raw: &str, format: InputFormat) -> Self {
        let token = raw.trim().to_uppercase();
        match token.as_str() {
            "ADD" => Self::Add,
            "REMOVE" => Self::Remove,
            "" if format.allows_blank_action() => Self::Blank,
            _ => Self::Invalid(token),
        }
    }

    /// Token written to the report's action column.
    pub fn as_report_token(&self) -> &str {
        match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Blank => "",
            Self::Invalid(token) => token,
        }
    }
}

/// A validated data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    /// 1-based line number in the input file
    pub line: u64,
    pub identifier: String,
    pub email: Option<String>,
    pub permission: Option<String>,
    pub action: RowAction,
    /// Set when the row fails field validation in a skip-and-report format
    pub rejection: Option<String>,
}

/// Outcome of one processed row. Immutable once appended to the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowResult {
    pub identifier: String,
    pub email: Option<String>,
    pub action: String,
    pub permission: Option<String>,
    pub status: String,
}

impl RowResult {
    /// Start a result for the given row with an empty status.
    pub fn for_row(row: &InputRow) -> Self {
        Self {
            identifier: row.identifier.clone(),
            email: row.email.clone(),
            action: row.action.as_report_token().to_string(),
            permission: row.permission.clone(),
            status: String::new(),
        }
    }

    /// Report columns matching [`InputFormat::report_header`].
    pub fn report_columns(&self, format: InputFormat) -> Vec<&str> {
        let status = self.status.as_str();
        match format {
            InputFormat::Legacy => vec![self.identifier.as_str(), self.action.as_str(), status],
            InputFormat::Permission => vec![
                self.identifier.as_str(),
                self.action.as_str(),
                self.permission.as_deref().unwrap_or_default(),
                status,
            ],
            InputFormat::Email => vec![
                self.identifier.as_str(),
                self.email.as_deref().unwrap_or_default(),
                self.action.as_str(),
                status,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tokens_are_normalized() {
        assert_eq!(RowAction::parse(" add ", InputFormat::Legacy), RowAction::Add);
        assert_eq!(RowAction::parse("Remove", InputFormat::Email), RowAction::Remove);
        assert_eq!(
            RowAction::parse("delete", InputFormat::Legacy),
            RowAction::Invalid("DELETE".into())
        );
    }

    #[test]
    fn blank_action_depends_on_format() {
        assert_eq!(RowAction::parse("", InputFormat::Permission), RowAction::Blank);
        assert_eq!(RowAction::parse("  ", InputFormat::Legacy), RowAction::Invalid(String::new()));
    }

    #[test]
    fn report_columns_follow_header_shape() {
        let result = RowResult {
            identifier: "advisor@example.com".into(),
            email: None,
            action: "ADD".into(),
            permission: Some("create:room".into()),
            status: "Added successfully".into(),
        };
        for format in [InputFormat::Legacy, InputFormat::Permission, InputFormat::Email] {
            assert_eq!(result.report_columns(format).len(), format.report_header().len());
        }
        assert_eq!(
            result.report_columns(InputFormat::Permission),
            vec!["advisor@example.com", "ADD", "create:room", "Added successfully"]
        );
    }

    #[test]
    fn format_tokens_round_trip_through_display() {
        for format in [InputFormat::Legacy, InputFormat::Permission, InputFormat::Email] {
            assert_eq!(format.to_string().parse::<InputFormat>().unwrap(), format);
        }
    }
}
