/// Sink for user-visible failure notifications.
///
/// The host UI attaches its toast/notification surface here; the engine never
/// renders anything itself.
pub trait NoticeSink: Send + Sync {
    fn error(&self, message: &str);
}

/// Default sink when the host has not attached one; keeps a log trail only.
#[derive(Debug, Default)]
pub struct NullNoticeSink;

impl NoticeSink for NullNoticeSink {
    fn error(&self, message: &str) {
        tracing::warn!(message, "user notice dropped: no sink attached");
    }
}
