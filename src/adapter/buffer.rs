//! Outbound audio coalescing.
//!
//! Small audio writes are staged into chunks of the service-preferred size
//! before they reach the transport. The buffer is mutated under the adapter
//! lock; full chunks are handed back to the caller so the actual transport
//! writes happen after the lock is released.

use bytes::Bytes;

/// Fixed-capacity staging buffer for outbound audio.
///
/// Guarantees: no produced chunk exceeds the configured size; bytes come
/// out in the order they went in; a flush drains every staged byte.
#[derive(Debug)]
pub struct ChunkBuffer {
    chunk_size: usize,
    staged: Option<Vec<u8>>,
}

impl ChunkBuffer {
    pub fn new(chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0);
        Self {
            chunk_size,
            staged: None,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes currently staged and not yet handed to the transport.
    pub fn staged_len(&self) -> usize {
        self.staged.as_ref().map_or(0, Vec::len)
    }

    /// Stage `data`, returning every chunk that filled up. The staging
    /// region is allocated on first use and reallocated on demand after a
    /// flush.
    pub fn write(&mut self, data: &[u8]) -> Vec<Bytes> {
        let mut full = Vec::new();
        let mut remaining = data;

        while !remaining.is_empty() {
            let staged = self
                .staged
                .get_or_insert_with(|| Vec::with_capacity(self.chunk_size));

            let take = remaining.len().min(self.chunk_size - staged.len());
            staged.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];

            if staged.len() == self.chunk_size {
                full.push(Bytes::from(std::mem::replace(
                    staged,
                    Vec::with_capacity(self.chunk_size),
                )));
            }
        }

        full
    }

    /// Drain any partial chunk and deallocate the staging region.
    pub fn flush(&mut self) -> Option<Bytes> {
        let staged = self.staged.take()?;
        if staged.is_empty() {
            None
        } else {
            Some(Bytes::from(staged))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat(chunks: &[Bytes]) -> Vec<u8> {
        chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }

    #[test]
    fn test_small_writes_stage_without_output() {
        let mut buffer = ChunkBuffer::new(10);
        assert!(buffer.write(&[1, 2, 3]).is_empty());
        assert!(buffer.write(&[4, 5]).is_empty());
        assert_eq!(buffer.staged_len(), 5);
    }

    #[test]
    fn test_exact_fill_produces_one_chunk() {
        let mut buffer = ChunkBuffer::new(4);
        let chunks = buffer.write(&[1, 2, 3, 4]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref(), &[1, 2, 3, 4]);
        assert_eq!(buffer.staged_len(), 0);
    }

    #[test]
    fn test_large_write_splits_into_chunks() {
        let mut buffer = ChunkBuffer::new(3);
        let chunks = buffer.write(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref(), &[1, 2, 3]);
        assert_eq!(chunks[1].as_ref(), &[4, 5, 6]);
        assert_eq!(buffer.staged_len(), 1);
    }

    #[test]
    fn test_flush_drains_partial_and_deallocates() {
        let mut buffer = ChunkBuffer::new(8);
        buffer.write(&[9, 9, 9]);

        let tail = buffer.flush().unwrap();
        assert_eq!(tail.as_ref(), &[9, 9, 9]);
        assert_eq!(buffer.staged_len(), 0);

        // empty flush produces nothing
        assert!(buffer.flush().is_none());

        // the buffer reallocates on demand after a flush
        assert!(buffer.write(&[1]).is_empty());
        assert_eq!(buffer.staged_len(), 1);
    }

    #[test]
    fn test_no_chunk_exceeds_size_and_order_is_preserved() {
        let input: Vec<u8> = (0..=255).collect();
        for chunk_size in [1usize, 3, 7, 32, 256, 300] {
            let mut buffer = ChunkBuffer::new(chunk_size);
            let mut out = Vec::new();

            // feed in uneven slices
            for piece in input.chunks(11) {
                out.extend(buffer.write(piece));
            }
            let tail = buffer.flush();

            for chunk in &out {
                assert_eq!(chunk.len(), chunk_size, "chunk_size={chunk_size}");
            }
            if let Some(tail) = tail {
                assert!(tail.len() <= chunk_size);
                out.push(tail);
            }
            assert_eq!(concat(&out), input, "chunk_size={chunk_size}");
        }
    }
}
