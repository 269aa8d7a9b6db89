//! Conversions from external infrastructure errors into domain errors.

use csv::Error as CsvError;
use entsync_domain::EntsyncError;
use jsonwebtoken::errors::Error as JwtError;
use reqwest::Error as HttpError;
use std::io::Error as IoError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub EntsyncError);

impl From<InfraError> for EntsyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<EntsyncError> for InfraError {
    fn from(value: EntsyncError) -> Self {
        InfraError(value)
    }
}

/// `map_err` adapter: `.map_err(map_infra)?`
pub fn map_infra<E: Into<InfraError>>(err: E) -> EntsyncError {
    err.into().0
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoEntsyncError {
    fn into_entsync(self) -> EntsyncError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → EntsyncError */
/* -------------------------------------------------------------------------- */

impl IntoEntsyncError for HttpError {
    fn into_entsync(self) -> EntsyncError {
        if self.is_timeout() {
            return EntsyncError::Transport(format!("HTTP request timed out: {self}"));
        }

        if self.is_connect() {
            return EntsyncError::Transport(format!("HTTP connection failure: {self}"));
        }

        if self.is_builder() {
            return EntsyncError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            return EntsyncError::RemoteCall { status: status.as_u16(), body: self.to_string() };
        }

        EntsyncError::Transport(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_entsync())
    }
}

/* -------------------------------------------------------------------------- */
/* jsonwebtoken::Error → EntsyncError */
/* -------------------------------------------------------------------------- */

impl IntoEntsyncError for JwtError {
    fn into_entsync(self) -> EntsyncError {
        use jsonwebtoken::errors::ErrorKind;

        match self.kind() {
            ErrorKind::InvalidRsaKey(reason) => {
                EntsyncError::Config(format!("signing key is not a valid RSA key: {reason}"))
            }
            ErrorKind::InvalidKeyFormat => {
                EntsyncError::Config("signing key is not PEM encoded".into())
            }
            _ => EntsyncError::Config(format!("failed to sign token: {self}")),
        }
    }
}

impl From<JwtError> for InfraError {
    fn from(value: JwtError) -> Self {
        InfraError(value.into_entsync())
    }
}

/* -------------------------------------------------------------------------- */
/* csv::Error → EntsyncError */
/* -------------------------------------------------------------------------- */

impl IntoEntsyncError for CsvError {
    fn into_entsync(self) -> EntsyncError {
        let line = self.position().map(csv::Position::line);
        match (self.kind(), line) {
            (csv::ErrorKind::Utf8 { .. }, Some(line)) => {
                EntsyncError::Validation(format!("input line {line} is not valid UTF-8"))
            }
            (csv::ErrorKind::Io(_), _) => EntsyncError::Io(self.to_string()),
            (_, Some(line)) => EntsyncError::Validation(format!("input line {line}: {self}")),
            _ => EntsyncError::Io(self.to_string()),
        }
    }
}

impl From<CsvError> for InfraError {
    fn from(value: CsvError) -> Self {
        InfraError(value.into_entsync())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → EntsyncError */
/* -------------------------------------------------------------------------- */

impl IntoEntsyncError for IoError {
    fn into_entsync(self) -> EntsyncError {
        EntsyncError::Io(self.to_string())
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_entsync())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
