use std::time::{Duration, Instant};

/// Default minimum interval between throttled flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(50);

/// Coalesces frequent small deltas into bounded-rate content updates.
///
/// Deltas append in arrival order and never reorder. `take` clears what it
/// returns, so a final forced take before finalization applies every delta
/// exactly once.
#[derive(Debug)]
pub struct DeltaBuffer {
    pending_content: String,
    pending_reasoning: String,
    min_interval: Duration,
    last_flush: Option<Instant>,
}

impl DeltaBuffer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            pending_content: String::new(),
            pending_reasoning: String::new(),
            min_interval,
            last_flush: None,
        }
    }

    pub fn push(&mut self, content: &str, reasoning: &str) {
        self.pending_content.push_str(content);
        self.pending_reasoning.push_str(reasoning);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_content.is_empty() || !self.pending_reasoning.is_empty()
    }

    /// True when pending deltas exist and the minimum inter-flush interval has
    /// elapsed. The first flush of a stream is always due.
    pub fn flush_due(&self) -> bool {
        self.has_pending()
            && self
                .last_flush
                .map_or(true, |last| last.elapsed() >= self.min_interval)
    }

    /// Returns and clears the pending deltas, stamping the flush instant.
    pub fn take(&mut self) -> (String, String) {
        self.last_flush = Some(Instant::now());
        (
            std::mem::take(&mut self.pending_content),
            std::mem::take(&mut self.pending_reasoning),
        )
    }
}

impl Default for DeltaBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::DeltaBuffer;

    #[test]
    fn first_flush_is_due_immediately() {
        let mut buffer = DeltaBuffer::new(Duration::from_secs(3600));
        assert!(!buffer.flush_due());

        buffer.push("a", "");
        assert!(buffer.flush_due());
    }

    #[test]
    fn interval_gates_subsequent_flushes() {
        let mut buffer = DeltaBuffer::new(Duration::from_secs(3600));
        buffer.push("a", "");
        let _ = buffer.take();

        buffer.push("b", "");
        assert!(buffer.has_pending());
        assert!(!buffer.flush_due(), "interval has not elapsed");
    }

    #[test]
    fn zero_interval_flushes_every_time() {
        let mut buffer = DeltaBuffer::new(Duration::ZERO);
        buffer.push("a", "");
        let _ = buffer.take();
        buffer.push("b", "");
        assert!(buffer.flush_due());
    }

    #[test]
    fn take_applies_each_delta_exactly_once_in_order() {
        let mut buffer = DeltaBuffer::new(Duration::ZERO);
        buffer.push("He", "th");
        buffer.push("llo", "ink");

        assert_eq!(buffer.take(), ("Hello".to_string(), "think".to_string()));
        assert!(!buffer.has_pending());
        assert_eq!(buffer.take(), (String::new(), String::new()));
    }
}
