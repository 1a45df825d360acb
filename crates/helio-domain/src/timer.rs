use std::time::Instant;

use tracing::debug;

/// Scoped elapsed-time measurement. Logs the elapsed wall time for the
/// named operation when dropped.
pub struct Timer {
    operation: &'static str,
    started_at: Instant,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started_at: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = %self.operation,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "operation finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_measures_elapsed_time() {
        let timer = Timer::start("test_op");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.started_at.elapsed().as_millis() >= 5);
    }
}
