//! Single-slot recording buffer
//!
//! Fixed capacity, allocated once at startup, reused for every recording.
//! `len` tracks the committed prefix; everything past it is scratch.

/// Recording sample buffer.
///
/// Owned by the recorder. Components borrow slices for the duration of
/// one call and never keep them.
pub struct SampleBuffer {
    data: Box<[i16]>,
    len: usize,
}

impl SampleBuffer {
    /// Wrap an allocation of exactly `capacity` samples.
    pub fn from_vec(samples: Vec<i16>) -> Self {
        Self {
            data: samples.into_boxed_slice(),
            len: 0,
        }
    }

    /// Total number of samples the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of committed samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the buffer is at capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= self.data.len()
    }

    /// Samples still free.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.len
    }

    /// Committed samples.
    #[inline]
    pub fn samples(&self) -> &[i16] {
        &self.data[..self.len]
    }

    /// Committed samples, mutable (codec round trip works in place).
    #[inline]
    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.data[..self.len]
    }

    /// Region for the next capture chunk: at most `max` samples past `len`.
    ///
    /// Nothing in this region counts as recorded until [`commit`](Self::commit).
    #[inline]
    pub fn next_chunk(&mut self, max: usize) -> &mut [i16] {
        let end = self.len + max.min(self.remaining());
        &mut self.data[self.len..end]
    }

    /// Mark `count` samples past `len` as recorded.
    ///
    /// Returns the committed range start so the caller can analyze the chunk.
    #[inline]
    pub fn commit(&mut self, count: usize) -> usize {
        let start = self.len;
        self.len = (self.len + count).min(self.data.len());
        start
    }

    /// Forget the current recording. Capacity is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = SampleBuffer::from_vec(vec![0; 1024]);
        assert_eq!(buf.capacity(), 1024);
        assert!(buf.is_empty());
        assert_eq!(buf.remaining(), 1024);
    }

    #[test]
    fn test_chunk_then_commit() {
        let mut buf = SampleBuffer::from_vec(vec![0; 1024]);

        let chunk = buf.next_chunk(512);
        assert_eq!(chunk.len(), 512);
        chunk.fill(7);

        // Not recorded until committed
        assert_eq!(buf.len(), 0);

        assert_eq!(buf.commit(512), 0);
        assert_eq!(buf.len(), 512);
        assert!(buf.samples().iter().all(|&s| s == 7));
    }

    #[test]
    fn test_last_chunk_is_truncated() {
        let mut buf = SampleBuffer::from_vec(vec![0; 700]);
        buf.commit(512);

        assert_eq!(buf.next_chunk(512).len(), 188);
        buf.commit(188);
        assert!(buf.is_full());
        assert_eq!(buf.next_chunk(512).len(), 0);
    }

    #[test]
    fn test_commit_never_exceeds_capacity() {
        let mut buf = SampleBuffer::from_vec(vec![0; 100]);
        buf.commit(500);
        assert_eq!(buf.len(), 100);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buf = SampleBuffer::from_vec(vec![0; 256]);
        buf.commit(128);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 256);
    }
}
