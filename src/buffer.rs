//! Reusable receive buffer for inbound payloads.

/// Scratch space for one session's inbound payloads.
///
/// A session keeps exactly one of these and reuses it for every packet, so
/// the steady state allocates nothing. Capacity grows by doubling and never
/// shrinks, bounding reallocations to O(log max-payload) per session.
#[derive(Debug, Default)]
pub struct RecvBuffer {
    bytes: Vec<u8>,
}

impl RecvBuffer {
    /// Starts at capacity 0; the first packet always allocates.
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Return a writable slice of exactly `required` bytes.
    ///
    /// Reuses the existing allocation when it is large enough. Otherwise
    /// doubles capacity starting from 1 until it fits; the old contents are
    /// discarded, since each packet's payload fully overwrites the buffer.
    pub fn ensure(&mut self, required: usize) -> &mut [u8] {
        if required > self.bytes.len() {
            let mut capacity = self.bytes.len().max(1);
            while capacity < required {
                capacity *= 2;
            }
            self.bytes = vec![0; capacity];
        }
        &mut self.bytes[..required]
    }

    /// The first `len` bytes, as most recently filled by the caller.
    pub fn filled(&self, len: usize) -> &[u8] {
        &self.bytes[..len]
    }
}
