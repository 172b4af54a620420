//! Drains a `LogStream` into the `log` facade.
//!
//! Runs outside the capture path (between recorder steps on the host,
//! from the idle loop on the device). Whatever logger is installed
//! (env_logger, EspLogger) does the blocking output.

use core::fmt;

use crate::logging::{LogEntry, LogStream};

/// Dropped-entry warnings are emitted at most this often.
pub const DROPPED_REPORT_INTERVAL_US: i64 = 10_000_000;

/// Target used for forwarded entries.
pub const LOG_TARGET: &str = "voicememo";

/// An entry prefixed with the recorder clock time it was queued at.
///
/// Format: `[timestamp_us] message`
pub struct Stamped<'a>(pub &'a LogEntry);

impl fmt::Display for Stamped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:10}] {}", self.0.timestamp_us, self.0.text())
    }
}

/// Forwarder state.
#[derive(Debug, Default)]
pub struct LogDrain {
    last_dropped_report: i64,
    forwarded: u64,
}

impl LogDrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries forwarded so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Forward everything ready in `stream`. Returns how many entries
    /// were forwarded.
    pub fn drain<const N: usize>(&mut self, stream: &LogStream<N>, now_us: i64) -> usize {
        let mut count = 0;
        while let Some(entry) = stream.drain() {
            log::log!(target: LOG_TARGET, entry.level, "{}", Stamped(&entry));
            count += 1;
        }
        self.forwarded += count as u64;

        if now_us - self.last_dropped_report > DROPPED_REPORT_INTERVAL_US {
            let dropped = stream.dropped();
            if dropped > 0 {
                log::warn!(target: LOG_TARGET, "Dropped: {} log entries", dropped);
                stream.reset_dropped();
            }
            self.last_dropped_report = now_us;
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_stamped_format() {
        let e = LogEntry::new(1234567, Level::Info, format_args!("buffer {} samples", 479744));
        assert_eq!(Stamped(&e).to_string(), "[   1234567] buffer 479744 samples");
    }

    #[test]
    fn test_drain_empties_stream() {
        let stream = LogStream::<8>::new();
        stream.push(1, Level::Info, format_args!("a"));
        stream.push(2, Level::Debug, format_args!("b"));

        let mut drain = LogDrain::new();
        assert_eq!(drain.drain(&stream, 3), 2);
        assert!(stream.drain().is_none());
        assert_eq!(drain.forwarded(), 2);
    }

    #[test]
    fn test_dropped_counter_reset_after_report() {
        let stream = LogStream::<2>::new();
        for i in 0..5 {
            stream.push(i, Level::Info, format_args!("x"));
        }
        assert_eq!(stream.dropped(), 3);

        let mut drain = LogDrain::new();
        // Too early to report: counter kept
        drain.drain(&stream, DROPPED_REPORT_INTERVAL_US);
        assert_eq!(stream.dropped(), 3);

        drain.drain(&stream, DROPPED_REPORT_INTERVAL_US + 1);
        assert_eq!(stream.dropped(), 0);
    }
}
