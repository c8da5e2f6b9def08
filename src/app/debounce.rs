pub(in crate::app) const CONTROL_DEBOUNCE_SECS: f64 = 0.15;

/// Holds the latest value until it has been stable for `delay_secs`. Pushing a
/// new value restarts the wait and discards the pending one.
#[derive(Clone, Debug)]
pub(in crate::app) struct Debounced<T> {
    pending: Option<(T, f64)>,
    delay_secs: f64,
}

impl<T> Debounced<T> {
    pub fn new(delay_secs: f64) -> Self {
        Self {
            pending: None,
            delay_secs,
        }
    }

    pub fn push(&mut self, value: T, now: f64) {
        self.pending = Some((value, now + self.delay_secs));
    }

    pub fn poll(&mut self, now: f64) -> Option<T> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Seconds until the pending value is due, for scheduling a repaint.
    pub fn remaining(&self, now: f64) -> Option<f64> {
        self.pending.as_ref().map(|(_, due)| (due - now).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_released_after_delay() {
        let mut debounced = Debounced::new(CONTROL_DEBOUNCE_SECS);
        debounced.push(3, 1.0);
        assert_eq!(debounced.poll(1.1), None);
        assert_eq!(debounced.poll(1.2), Some(3));
        assert!(!debounced.is_pending());
    }

    #[test]
    fn newer_value_supersedes_pending_one() {
        let mut debounced = Debounced::new(CONTROL_DEBOUNCE_SECS);
        debounced.push(1, 0.0);
        debounced.push(2, 0.1);
        assert_eq!(debounced.poll(0.2), None);
        assert_eq!(debounced.remaining(0.2).map(|secs| (secs * 100.0).round()), Some(5.0));
        assert_eq!(debounced.poll(0.3), Some(2));
        assert_eq!(debounced.poll(1.0), None);
    }

    #[test]
    fn flush_releases_immediately() {
        let mut debounced = Debounced::new(CONTROL_DEBOUNCE_SECS);
        debounced.push("x", 0.0);
        assert_eq!(debounced.flush(), Some("x"));
        assert_eq!(debounced.flush(), None);
    }
}
