//! Injected mapping capability over a sized backing store
//!
//! Mapping a store into the address space is the one inherently OS-specific
//! operation in this crate, so it sits behind the [`RegionMapper`] trait.
//! Production code uses [`MmapMapper`]; tests that only exercise header and
//! value logic can substitute [`HeapMapper`] and never touch the OS.

use std::fs::File;

use memmap2::MmapOptions;

use crate::error::{Result, ShuttleError};

/// An addressable byte span obtained from a [`RegionMapper`].
///
/// The span doubles as the platform-mapping token: dropping it releases this
/// process's mapping. Dropping never affects the backing store itself.
#[derive(Debug)]
pub struct MappedSpan {
    inner: SpanInner,
}

#[derive(Debug)]
enum SpanInner {
    /// A real OS mapping shared by every process mapping the same store
    File(memmap2::MmapMut),
    /// A process-private heap buffer used by [`HeapMapper`]
    Heap(Box<[u8]>),
}

impl MappedSpan {
    fn from_mmap(mmap: memmap2::MmapMut) -> Self {
        Self {
            inner: SpanInner::File(mmap),
        }
    }

    fn from_heap(buf: Box<[u8]>) -> Self {
        Self {
            inner: SpanInner::Heap(buf),
        }
    }

    /// Length of the span in bytes
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the span is zero-length
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// The span contents (read-only)
    pub fn as_slice(&self) -> &[u8] {
        match &self.inner {
            SpanInner::File(mmap) => mmap,
            SpanInner::Heap(buf) => buf,
        }
    }

    /// The span contents (mutable)
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.inner {
            SpanInner::File(mmap) => mmap,
            SpanInner::Heap(buf) => buf,
        }
    }

    /// Flush span contents back to the backing store
    ///
    /// Heap-backed spans have no store behind them; flushing is a no-op.
    pub fn flush(&self) -> Result<()> {
        match &self.inner {
            SpanInner::File(mmap) => mmap
                .flush()
                .map_err(|e| ShuttleError::from_io(e, "failed to flush mapping")),
            SpanInner::Heap(_) => Ok(()),
        }
    }
}

/// Capability for mapping a sized backing store into addressable memory
///
/// Unmapping is RAII: the [`MappedSpan`] releases the mapping when dropped.
pub trait RegionMapper: Send + Sync + std::fmt::Debug {
    /// Map `len` bytes of `store` starting at offset 0.
    fn map(&self, store: &File, len: usize) -> Result<MappedSpan>;
}

/// Production mapper backed by `mmap` via memmap2
///
/// Every process that maps the same store through this mapper observes the
/// same bytes; coherency and visibility ordering come from the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapMapper;

impl RegionMapper for MmapMapper {
    fn map(&self, store: &File, len: usize) -> Result<MappedSpan> {
        let mmap = unsafe {
            MmapOptions::new()
                .len(len)
                .map_mut(store)
                .map_err(|e| ShuttleError::from_io(e, "failed to map backing store"))?
        };
        Ok(MappedSpan::from_mmap(mmap))
    }
}

/// In-process fake mapper backed by a plain zeroed buffer
///
/// Each call to `map` hands out a fresh private buffer: writes never reach
/// the store and are invisible to other mappings. Only suitable for tests of
/// single-mapping logic.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapMapper;

impl RegionMapper for HeapMapper {
    fn map(&self, _store: &File, len: usize) -> Result<MappedSpan> {
        Ok(MappedSpan::from_heap(vec![0u8; len].into_boxed_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_span_is_zeroed() {
        let file = tempfile::tempfile().unwrap();
        let span = HeapMapper.map(&file, 64).unwrap();
        assert_eq!(span.len(), 64);
        assert!(span.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_heap_span_mutation() {
        let file = tempfile::tempfile().unwrap();
        let mut span = HeapMapper.map(&file, 16).unwrap();
        span.as_mut_slice()[3] = 0xAB;
        assert_eq!(span.as_slice()[3], 0xAB);
        span.flush().unwrap();
    }

    #[test]
    fn test_mmap_span_reflects_store() {
        let file = tempfile::tempfile().unwrap();
        file.set_len(32).unwrap();

        let mut span = MmapMapper.map(&file, 32).unwrap();
        span.as_mut_slice()[0] = 7;
        span.flush().unwrap();

        // A second mapping of the same store sees the write.
        let other = MmapMapper.map(&file, 32).unwrap();
        assert_eq!(other.as_slice()[0], 7);
    }
}
