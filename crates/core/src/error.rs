//! Error types shared by the CPU-side crates.

use thiserror::Error;

/// Main error type for the CPU-side crates.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Asset loading errors
    #[error("Resource error: {0}")]
    Resource(String),

    /// A handle or count exceeded the capacity fixed at allocation time
    #[error("Capacity exceeded: {what} {value} (limit {limit})")]
    Capacity {
        what: &'static str,
        value: usize,
        limit: usize,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message_names_limit() {
        let err = Error::Capacity {
            what: "mesh slot",
            value: 12,
            limit: 10,
        };
        assert_eq!(err.to_string(), "Capacity exceeded: mesh slot 12 (limit 10)");
    }

    #[test]
    fn test_io_error_converts() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(Error::Io(_))));
    }
}
