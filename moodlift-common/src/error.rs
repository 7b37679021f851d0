//! Common error types for MoodLift

use thiserror::Error;

/// Common result type for MoodLift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across MoodLift services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = Error::Config("Parse moodlift.toml failed".to_string());
        assert_eq!(err.to_string(), "Configuration error: Parse moodlift.toml failed");
    }

    #[test]
    fn test_io_error_converts() {
        fn open_config() -> Result<String> {
            let content = std::fs::read_to_string("/nonexistent/moodlift/moodlift.toml")?;
            Ok(content)
        }

        let err = open_config().unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got {:?}", err);
        assert!(err.to_string().starts_with("IO error: "));
    }

    #[test]
    fn test_error_kinds() {
        fn kind(err: &Error) -> &'static str {
            match err {
                #[cfg(feature = "sqlx")]
                Error::Database(_) => "database",
                Error::Io(_) => "io",
                Error::Config(_) => "config",
            }
        }

        assert_eq!(kind(&Error::Config(String::new())), "config");
        assert_eq!(kind(&std::io::Error::from(std::io::ErrorKind::NotFound).into()), "io");
    }
}
