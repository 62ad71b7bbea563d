use thiserror::Error;

/// Top-level error type for the here/now system.
///
/// Subsystem crates return this directly so the `?` operator works
/// across crate boundaries without per-crate error types.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HereNowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for HereNowError {
    fn from(err: toml::de::Error) -> Self {
        HereNowError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HereNowError {
    fn from(err: toml::ser::Error) -> Self {
        HereNowError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for HereNowError {
    fn from(err: serde_json::Error) -> Self {
        HereNowError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for here/now operations.
pub type Result<T> = std::result::Result<T, HereNowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HereNowError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = HereNowError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HereNowError = io_err.into();
        assert!(matches!(err, HereNowError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let parsed: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let err: HereNowError = parsed.unwrap_err().into();
        assert!(matches!(err, HereNowError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parsed: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{ invalid json }");
        let err: HereNowError = parsed.unwrap_err().into();
        assert!(matches!(err, HereNowError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<i32> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            Ok(io_result?)
        }

        assert_eq!(inner().unwrap(), 42);
    }
}
