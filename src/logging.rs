//! Logging facilities for signalkit.
//!
//! signalkit instruments itself with the `tracing` crate. To see logs,
//! install a subscriber in the consuming application:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```

use std::any::Any;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal emission and registry mutation.
    pub const SIGNAL: &str = "signalkit::signal";
    /// Task queue processing.
    pub const QUEUE: &str = "signalkit::queue";
    /// Queued invocation lifecycle.
    pub const INVOCATION: &str = "signalkit::invocation";
}

/// Extract a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_str() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
    }

    #[test]
    fn test_panic_message_string() {
        let payload: Box<dyn Any + Send> = Box::new("kaboom".to_string());
        assert_eq!(panic_message(payload.as_ref()), "kaboom");
    }

    #[test]
    fn test_panic_message_other() {
        let payload: Box<dyn Any + Send> = Box::new(17_u32);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }
}
