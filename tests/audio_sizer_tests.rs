//! Recording buffer sizing tests

use stick_voice_memo::audio::sizer::{allocate, plan, HeapAllocator, SampleAllocator, SizePlan};
use stick_voice_memo::config::{MemoryBudget, RecorderConfig};

/// Refuses anything above `limit` samples and records every request.
struct LimitedAllocator {
    limit: usize,
    requests: Vec<usize>,
}

impl LimitedAllocator {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            requests: Vec::new(),
        }
    }
}

impl SampleAllocator for LimitedAllocator {
    fn try_allocate(&mut self, samples: usize) -> Option<Vec<i16>> {
        self.requests.push(samples);
        (samples <= self.limit).then(|| vec![0; samples])
    }
}

const FLOOR_SAMPLES: usize = 48_128;
const TARGET_SAMPLES: usize = 479_744;

#[test]
fn test_plan_defaults() {
    let config = RecorderConfig::default();
    let plan = plan(&config, MemoryBudget::new(8 * 1024 * 1024)).unwrap();
    assert_eq!(
        plan,
        SizePlan {
            target_samples: TARGET_SAMPLES,
            floor_samples: FLOOR_SAMPLES,
        }
    );
    assert_eq!(plan.target_samples % config.chunk_samples, 0);
}

#[test]
fn test_budget_below_floor_disables() {
    let config = RecorderConfig::default();
    assert!(plan(&config, MemoryBudget::new(FLOOR_SAMPLES * 2 - 1)).is_none());
    assert!(plan(&config, MemoryBudget::new(FLOOR_SAMPLES * 2)).is_some());

    let mut alloc = LimitedAllocator::new(usize::MAX);
    assert!(allocate(&config, MemoryBudget::new(96_255), &mut alloc).is_none());
    assert!(alloc.requests.is_empty(), "nothing allocated when the floor cannot fit");
}

#[test]
fn test_budget_limits_target() {
    let config = RecorderConfig::default();
    let plan = plan(&config, MemoryBudget::new(200_000)).unwrap();
    // 100000 samples rounded down to 512
    assert_eq!(plan.target_samples, 99_840);
}

#[test]
fn test_first_attempt_success() {
    let config = RecorderConfig::default();
    let sized = allocate(&config, MemoryBudget::new(4 * 1024 * 1024), &mut HeapAllocator).unwrap();
    assert_eq!(sized.buffer.capacity(), TARGET_SAMPLES);
    assert_eq!(sized.attempts, 1);
    assert_eq!(sized.max_ms, 29_984);
    assert!(sized.buffer.is_empty());
}

#[test]
fn test_halves_on_failure() {
    let config = RecorderConfig::default();
    let mut alloc = LimitedAllocator::new(150_000);
    let sized = allocate(&config, MemoryBudget::new(4 * 1024 * 1024), &mut alloc).unwrap();

    assert_eq!(alloc.requests, vec![479_744, 239_616, 119_808]);
    assert_eq!(sized.buffer.capacity(), 119_808);
    assert_eq!(sized.attempts, 3);
    assert!(alloc.requests.iter().all(|r| r % 512 == 0));
}

#[test]
fn test_never_below_floor() {
    let config = RecorderConfig::default();
    let mut alloc = LimitedAllocator::new(FLOOR_SAMPLES - 1);
    assert!(allocate(&config, MemoryBudget::new(4 * 1024 * 1024), &mut alloc).is_none());
    assert!(alloc.requests.iter().all(|&r| r >= FLOOR_SAMPLES));
}

#[test]
fn test_zero_floor_still_terminates() {
    let config = RecorderConfig {
        floor_ms: 0,
        ..RecorderConfig::default()
    };
    let mut alloc = LimitedAllocator::new(0);
    assert!(allocate(&config, MemoryBudget::new(4 * 1024 * 1024), &mut alloc).is_none());
    assert_eq!(*alloc.requests.last().unwrap(), config.chunk_samples);
}
