//! Non-blocking logging for the control loop.
//!
//! ```text
//! control loop           LogStream            drain
//! ────────────           ─────────            ─────
//!
//! rt_info!() ─────────▶ [L0][L1][L2] ──────▶ log facade
//! formats straight        lock-free           env_logger / EspLogger
//! into its slot           ring buffer         blocking ok
//! ```
//!
//! The capture loop must not stall on a UART or stdout write while the
//! microphone DMA keeps filling, so it only formats into a fixed-size slot.
//! When the ring is full the entry is dropped and counted.

use core::cell::UnsafeCell;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::Level;

/// Maximum message length in bytes.
pub const MAX_MSG_LEN: usize = 120;

/// Ring size (number of entries).
pub const LOG_BUFFER_SIZE: usize = 256;

/// One formatted message.
#[derive(Clone, Copy)]
pub struct LogEntry {
    pub timestamp_us: i64,
    pub level: Level,
    len: u8,
    msg: [u8; MAX_MSG_LEN],
}

impl LogEntry {
    const EMPTY: Self = Self {
        timestamp_us: 0,
        level: Level::Info,
        len: 0,
        msg: [0; MAX_MSG_LEN],
    };

    /// Format `args`, cutting at the last whole character that fits.
    pub fn new(timestamp_us: i64, level: Level, args: fmt::Arguments<'_>) -> Self {
        let mut entry = Self::EMPTY;
        entry.fill(timestamp_us, level, args);
        entry
    }

    fn fill(&mut self, timestamp_us: i64, level: Level, args: fmt::Arguments<'_>) {
        let mut w = MsgWriter {
            msg: &mut self.msg,
            len: 0,
        };
        let _ = w.write_fmt(args);
        self.len = w.len as u8;
        self.timestamp_us = timestamp_us;
        self.level = level;
    }

    pub fn text(&self) -> &str {
        // Only whole characters are ever copied in
        core::str::from_utf8(&self.msg[..self.len as usize]).unwrap_or("")
    }
}

struct MsgWriter<'a> {
    msg: &'a mut [u8; MAX_MSG_LEN],
    len: usize,
}

impl Write for MsgWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = MAX_MSG_LEN - self.len;
        let mut n = s.len().min(room);
        while !s.is_char_boundary(n) {
            n -= 1;
        }
        self.msg[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

struct Slot {
    /// Set by the producer once the entry is written, cleared by the
    /// consumer once it is copied out.
    ready: AtomicBool,
    entry: UnsafeCell<LogEntry>,
}

impl Slot {
    const EMPTY: Self = Self {
        ready: AtomicBool::new(false),
        entry: UnsafeCell::new(LogEntry::EMPTY),
    };
}

/// Lock-free log ring: any number of producers, one consumer.
///
/// A producer reserves a slot with a CAS on the write index, formats into
/// it and then marks it ready. The consumer stops at the first slot that
/// is reserved but not ready yet.
pub struct LogStream<const N: usize = LOG_BUFFER_SIZE> {
    slots: [Slot; N],
    write_idx: AtomicU32,
    read_idx: AtomicU32,
    dropped: AtomicU32,
}

// SAFETY: a slot's entry is only written by the producer holding its
// reservation and only read by the consumer after `ready` is observed.
unsafe impl<const N: usize> Sync for LogStream<N> {}
unsafe impl<const N: usize> Send for LogStream<N> {}

impl<const N: usize> LogStream<N> {
    const MASK: u32 = N as u32 - 1;

    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "Log buffer size must be power of 2");

        Self {
            slots: [Slot::EMPTY; N],
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Format and queue a message. Never blocks.
    ///
    /// Returns `false` if the ring was full and the message was dropped.
    pub fn push(&self, timestamp_us: i64, level: Level, args: fmt::Arguments<'_>) -> bool {
        let mut write = self.write_idx.load(Ordering::Relaxed);
        loop {
            let read = self.read_idx.load(Ordering::Acquire);
            if write.wrapping_sub(read) >= N as u32 {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            match self.write_idx.compare_exchange_weak(
                write,
                write.wrapping_add(1),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => write = current,
            }
        }

        let slot = &self.slots[(write & Self::MASK) as usize];
        // SAFETY: the CAS handed this slot to us alone, and the consumer
        // released it (read_idx moved past it) before we could reserve it.
        unsafe { (*slot.entry.get()).fill(timestamp_us, level, args) };
        slot.ready.store(true, Ordering::Release);
        true
    }

    /// Take the next entry (single consumer).
    ///
    /// Returns `None` if the ring is empty or the oldest entry is still
    /// being written.
    pub fn drain(&self) -> Option<LogEntry> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let slot = &self.slots[(read & Self::MASK) as usize];
        if !slot.ready.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: `ready` is set, so the producer is done with the slot
        let entry = unsafe { *slot.entry.get() };
        slot.ready.store(false, Ordering::Relaxed);
        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(entry)
    }

    /// Messages dropped since the last `reset_dropped`.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset_dropped(&self) {
        self.dropped.store(0, Ordering::Relaxed);
    }
}

impl<const N: usize> Default for LogStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue a message on a `LogStream` at the given level.
///
/// ```ignore
/// rt_log!(log::Level::Info, LOG_STREAM, clock.now_us(), "chunk {} ok", n);
/// ```
#[macro_export]
macro_rules! rt_log {
    ($level:expr, $stream:expr, $timestamp:expr, $($arg:tt)*) => {{
        $stream.push($timestamp, $level, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! rt_info {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!(::log::Level::Info, $stream, $timestamp, $($arg)*)
    };
}

#[macro_export]
macro_rules! rt_warn {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!(::log::Level::Warn, $stream, $timestamp, $($arg)*)
    };
}

#[macro_export]
macro_rules! rt_error {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!(::log::Level::Error, $stream, $timestamp, $($arg)*)
    };
}

/// Per-chunk detail; compiled in, filtered by the installed logger.
#[macro_export]
macro_rules! rt_debug {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!(::log::Level::Debug, $stream, $timestamp, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_then_drain() {
        let stream = LogStream::<16>::new();

        assert!(stream.push(
            1000,
            Level::Info,
            format_args!("mode {} -> {}", "Idle", "ArmRecording")
        ));

        let entry = stream.drain().unwrap();
        assert_eq!(entry.timestamp_us, 1000);
        assert_eq!(entry.level, Level::Info);
        assert_eq!(entry.text(), "mode Idle -> ArmRecording");

        assert!(stream.drain().is_none());
    }

    #[test]
    fn test_full_ring_drops_and_counts() {
        let stream = LogStream::<4>::new();

        for i in 0..4 {
            assert!(stream.push(i, Level::Info, format_args!("chunk {}", i)));
        }
        assert!(!stream.push(4, Level::Info, format_args!("chunk 4")));
        assert_eq!(stream.dropped(), 1);

        // Oldest entry survives, the dropped one never appears
        assert_eq!(stream.drain().unwrap().text(), "chunk 0");
        assert!(stream.push(5, Level::Info, format_args!("chunk 5")));

        let rest: Vec<i64> = core::iter::from_fn(|| stream.drain())
            .map(|e| e.timestamp_us)
            .collect();
        assert_eq!(rest, vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_reserved_slot_not_drained_until_ready() {
        let stream = LogStream::<4>::new();
        // Reserve without filling, as a producer preempted mid-format would
        stream.write_idx.store(1, Ordering::Relaxed);
        assert!(stream.drain().is_none());

        stream.slots[0].ready.store(true, Ordering::Release);
        assert!(stream.drain().is_some());
    }

    #[test]
    fn test_long_message_truncated() {
        let long = "x".repeat(MAX_MSG_LEN + 40);
        let entry = LogEntry::new(7, Level::Warn, format_args!("{}", long));
        assert_eq!(entry.text().len(), MAX_MSG_LEN);
    }

    #[test]
    fn test_truncation_keeps_whole_characters() {
        // 119 ASCII bytes, then a 3-byte character that does not fit
        let text = format!("{}█", "x".repeat(MAX_MSG_LEN - 1));
        let entry = LogEntry::new(0, Level::Debug, format_args!("{}", text));
        assert_eq!(entry.text().len(), MAX_MSG_LEN - 1);
        assert!(entry.text().chars().all(|c| c == 'x'));
    }

    #[test]
    fn test_macro_pushes_formatted() {
        let stream = LogStream::<4>::new();
        crate::rt_warn!(stream, 55, "speaker forced off after {} ms", 200);

        let entry = stream.drain().unwrap();
        assert_eq!(entry.level, Level::Warn);
        assert_eq!(entry.text(), "speaker forced off after 200 ms");
    }

    #[test]
    fn test_concurrent_producers() {
        use std::sync::Arc;
        use std::thread;

        let stream = Arc::new(LogStream::<64>::new());
        let handles: Vec<_> = (0..4)
            .map(|task| {
                let stream = Arc::clone(&stream);
                thread::spawn(move || {
                    for j in 0..10 {
                        stream.push(j, Level::Info, format_args!("task {} chunk {}", task, j));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut count = 0;
        while let Some(entry) = stream.drain() {
            assert!(entry.text().starts_with("task "));
            count += 1;
        }
        assert_eq!(count, 40);
        assert_eq!(stream.dropped(), 0);
    }
}
