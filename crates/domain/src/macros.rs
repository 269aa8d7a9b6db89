//! Macro for implementing Display and FromStr for token-like enums
//!
//! Configuration values and CLI flags name networks and input formats by
//! short tokens. This macro gives those enums a canonical display string
//! plus case-insensitive parsing that also accepts legacy aliases.
//!
//! # Example
//!
//! ```rust
//! use entsync_domain::impl_token_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Primary,
//!     Fallback,
//! }
//!
//! impl_token_conversions!(Channel {
//!     Primary => "primary" | "main",
//!     Fallback => "fallback",
//! });
//!
//! assert_eq!("MAIN".parse::<Channel>().unwrap(), Channel::Primary);
//! assert_eq!(Channel::Fallback.to_string(), "fallback");
//! ```

/// Implements Display and FromStr traits for token enums
///
/// - Display writes the first (canonical) token of each variant
/// - FromStr matches any listed token, ignoring case and surrounding
///   whitespace
///
/// Tokens must be written in lowercase.
#[macro_export]
macro_rules! impl_token_conversions {
    ($enum_name:ident { $($variant:ident => $canonical:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($canonical),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($canonical $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
