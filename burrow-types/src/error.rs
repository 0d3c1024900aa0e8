//! Error types for burrow-types.

use thiserror::Error;

/// Errors raised while parsing wire values.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Identifier was not a valid UUID
    #[error("invalid {kind} id: {value}")]
    InvalidId {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// Unknown status name
    #[error("unknown {kind} status: {value}")]
    UnknownStatus {
        /// Which status enum was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// Channel frame could not be decoded
    #[error("malformed event: {0}")]
    MalformedEvent(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::InvalidId {
            kind: "peer",
            value: "nope".into(),
        };
        assert_eq!(err.to_string(), "invalid peer id: nope");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
