use std::time::{Duration, Instant};

/// Wall-clock timer for logging how long a stage took.
#[derive(Debug, Clone, Copy)]
pub struct SimpleTimer {
    start: Instant,
}

impl SimpleTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_millis(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Default for SimpleTimer {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_monotonic() {
        let timer = SimpleTimer::start();
        let first = timer.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() > first);
    }
}
