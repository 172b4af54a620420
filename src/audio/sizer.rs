//! Recording buffer sizing
//!
//! Runs once at startup. Picks the largest chunk-aligned sample count that
//! fits the memory budget and the target duration, then halves on
//! allocation failure until the floor is reached.

use crate::audio::buffer::SampleBuffer;
use crate::config::{MemoryBudget, RecorderConfig};

const BYTES_PER_SAMPLE: usize = core::mem::size_of::<i16>();

/// Source of sample storage.
///
/// Returns `None` when the allocation cannot be satisfied; never panics.
pub trait SampleAllocator {
    fn try_allocate(&mut self, samples: usize) -> Option<Vec<i16>>;
}

/// Global-allocator backed storage (PSRAM first on the device, via
/// the ESP-IDF malloc policy).
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl SampleAllocator for HeapAllocator {
    fn try_allocate(&mut self, samples: usize) -> Option<Vec<i16>> {
        let mut storage = Vec::new();
        storage.try_reserve_exact(samples).ok()?;
        storage.resize(samples, 0);
        Some(storage)
    }
}

/// Sample counts derived from config and budget, before allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePlan {
    /// First size to try.
    pub target_samples: usize,
    /// Smallest acceptable size.
    pub floor_samples: usize,
}

/// Result of a successful sizing run.
pub struct SizedBuffer {
    pub buffer: SampleBuffer,
    /// Longest recording the buffer holds.
    pub max_ms: u32,
    /// Allocation attempts made (1 = first try succeeded).
    pub attempts: u32,
}

impl core::fmt::Debug for SizedBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SizedBuffer")
            .field("samples", &self.buffer.capacity())
            .field("max_ms", &self.max_ms)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Round down to a multiple of `chunk`.
#[inline]
fn align_down(samples: usize, chunk: usize) -> usize {
    samples / chunk * chunk
}

/// Round up to a multiple of `chunk`.
#[inline]
fn align_up(samples: usize, chunk: usize) -> usize {
    samples.div_ceil(chunk) * chunk
}

/// Compute the sizes to try.
///
/// Returns `None` when even the floor does not fit the budget.
pub fn plan(config: &RecorderConfig, budget: MemoryBudget) -> Option<SizePlan> {
    let chunk = config.chunk_samples;
    let floor_samples = align_up(config.samples_for_ms(config.floor_ms), chunk).max(chunk);

    let ideal = config.samples_for_ms(config.target_ms);
    let affordable = budget.bytes / BYTES_PER_SAMPLE;
    let target_samples = align_down(ideal.min(affordable), chunk);

    if target_samples < floor_samples {
        return None;
    }

    Some(SizePlan {
        target_samples,
        floor_samples,
    })
}

/// Size and allocate the recording buffer.
///
/// Returns `None` when the feature must stay disabled: the budget cannot
/// cover the floor, or every attempt down to the floor failed.
pub fn allocate(
    config: &RecorderConfig,
    budget: MemoryBudget,
    allocator: &mut impl SampleAllocator,
) -> Option<SizedBuffer> {
    let plan = plan(config, budget)?;

    let mut samples = plan.target_samples;
    let mut attempts = 0;

    while samples >= plan.floor_samples {
        attempts += 1;
        if let Some(storage) = allocator.try_allocate(samples) {
            return Some(SizedBuffer {
                buffer: SampleBuffer::from_vec(storage),
                max_ms: config.ms_for_samples(samples),
                attempts,
            });
        }
        samples = align_down(samples / 2, config.chunk_samples);
    }

    None
}
