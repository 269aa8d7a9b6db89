//! Application constants
//!
//! Centralized location for domain-level defaults shared by the loader, the
//! clients and the CLI.

// Remote API defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_PAGES: usize = 1000;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 290; // just under five minutes
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 10;
pub const DEFAULT_POD_PAGE_SIZE: usize = 1000;

// Token subject prefix for customer-scoped credentials
pub const CUSTOMER_SUBJECT_PREFIX: &str = "ces:customer:";

// Default file names
pub const DEFAULT_INPUT_FILE: &str = "whatsapp_user_entitlements.csv";
pub const DEFAULT_OUTPUT_FILE: &str = "whatsapp_user_entitlements_output.csv";
pub const DEFAULT_ROSTER_FILE: &str = "current_user_list.csv";

// Report encoding
pub const UTF8_BOM: &str = "\u{feff}";
