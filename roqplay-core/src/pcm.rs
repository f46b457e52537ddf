use crate::error::PlaybackError;

/// Default capacity of the decoded-PCM staging buffer.
pub const PCM_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Bounded FIFO of decoded PCM bytes awaiting the audio sink. The producer
/// appends whole audio frames at the back; the consumer removes exact-size
/// prefixes from the front.
pub struct PcmBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl PcmBuffer {
    /// Allocate the full capacity up front so appends never reallocate.
    pub fn with_capacity(capacity: usize) -> Result<PcmBuffer, PlaybackError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| PlaybackError::OutOfMemory)?;
        Ok(PcmBuffer { data, capacity })
    }

    pub fn filled(&self) -> usize {
        self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one decoded audio frame. An append past capacity means the
    /// producer has outrun the consumer; it is rejected rather than allowed
    /// to grow the buffer without bound.
    pub fn append(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
        if self.data.len() + pcm.len() > self.capacity {
            return Err(PlaybackError::Overflow {
                capacity: self.capacity,
                filled: self.data.len(),
                incoming: pcm.len(),
            });
        }
        self.data.extend_from_slice(pcm);
        Ok(())
    }

    /// Remove and return the first `size` bytes, compacting the remainder
    /// to the front. The caller must have checked that `size` bytes are
    /// filled.
    pub fn take_front(&mut self, size: usize) -> Vec<u8> {
        debug_assert!(size <= self.data.len());
        self.data.drain(..size).collect()
    }

    /// Drop the backing allocation at end of playback.
    pub fn release(&mut self) {
        self.data = Vec::new();
    }
}

#[test]
fn drains_in_submission_order() {
    let mut buffer = PcmBuffer::with_capacity(16).unwrap();
    buffer.append(&[1, 2, 3, 4]).unwrap();
    buffer.append(&[5, 6]).unwrap();

    assert_eq!(buffer.take_front(3), vec![1, 2, 3]);
    assert_eq!(buffer.take_front(3), vec![4, 5, 6]);
    assert_eq!(buffer.filled(), 0);
}

#[test]
fn rejects_append_past_capacity() {
    let mut buffer = PcmBuffer::with_capacity(8).unwrap();
    buffer.append(&[0; 6]).unwrap();

    match buffer.append(&[0; 3]) {
        Err(PlaybackError::Overflow {
            capacity,
            filled,
            incoming,
        }) => {
            assert_eq!((capacity, filled, incoming), (8, 6, 3));
        }
        other => panic!("expected overflow, got {:?}", other),
    }

    // The rejected append must leave the buffer untouched.
    assert_eq!(buffer.filled(), 6);
    assert!(buffer.filled() <= buffer.capacity());

    // Filling exactly to capacity is still allowed.
    buffer.append(&[7, 8]).unwrap();
    assert_eq!(buffer.filled(), 8);
}

#[test]
fn release_empties_the_buffer() {
    let mut buffer = PcmBuffer::with_capacity(8).unwrap();
    buffer.append(&[1, 2, 3]).unwrap();
    buffer.release();
    assert_eq!(buffer.filled(), 0);
}
