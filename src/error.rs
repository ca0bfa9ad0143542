//! Error types for signalkit.

use std::fmt;

/// Errors reported by signal operations.
///
/// Most failure modes in signalkit are deliberately not errors: disconnecting
/// a handle twice and toggling a removed connection are idempotent no-ops that
/// report `false`, and emitting on an empty signal does nothing. The only
/// operation that can fail is a duplicate-checked [`connect_with`].
///
/// [`connect_with`]: crate::Signal::connect_with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// A duplicate-checked connect found an existing slot with the same
    /// receiver/method pair or the same name.
    DuplicateSlot {
        /// The name the rejected slot was being registered under, if any.
        name: Option<String>,
    },
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSlot { name: Some(name) } => {
                write!(f, "duplicate slot: a slot named {name:?} is already connected")
            }
            Self::DuplicateSlot { name: None } => {
                write!(f, "duplicate slot: this receiver and method are already connected")
            }
        }
    }
}

impl std::error::Error for SignalError {}

/// A specialized Result type for signalkit operations.
pub type Result<T> = std::result::Result<T, SignalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_display_with_name() {
        let err = SignalError::DuplicateSlot {
            name: Some("save".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "duplicate slot: a slot named \"save\" is already connected"
        );
    }

    #[test]
    fn test_duplicate_display_without_name() {
        let err = SignalError::DuplicateSlot { name: None };
        assert!(err.to_string().contains("receiver and method"));
    }
}
