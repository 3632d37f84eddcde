//! Telemetry utilities.

/// Standardized span constructors for sync observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for one transport connection.
    pub fn connection(connection_id: &str) -> Span {
        info_span!("connection", connection_id = %connection_id)
    }

    /// Create a span for work on one channel.
    pub fn channel(cid: &str) -> Span {
        info_span!("channel", cid = %cid)
    }

    /// Create a span for a deferred repository flush.
    pub fn flush(repository: &'static str) -> Span {
        info_span!("flush", repository = repository)
    }

    /// Create a span for handling one chat event.
    pub fn chat_event(kind: &'static str, target: Option<&str>) -> Span {
        if let Some(target) = target {
            info_span!("chat_event", kind = kind, target = %target)
        } else {
            info_span!("chat_event", kind = kind)
        }
    }
}
