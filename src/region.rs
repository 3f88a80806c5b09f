//! Shared region layout and access
//!
//! A region is one fixed-size header followed by a fixed-capacity value area,
//! both views into the same mapped backing store. The region carries no
//! synchronization of its own: callers must sequence reads and writes through
//! an external protocol before touching these accessors from more than one
//! process.

use std::{fs::File, path::Path};

#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};

use crate::{
    error::{Result, ShuttleError},
    mapper::MappedSpan,
    provision::BackingStore,
};

/// Size of the region header in bytes
///
/// The header is a single field: the current value length as a u64 stored
/// little-endian at offset 0. Every process mapping the store relies on this
/// exact encoding, independent of its own native struct layout.
pub const HEADER_SIZE: usize = 8;

/// Total backing store size needed for a region holding values up to
/// `capacity` bytes
pub const fn size_for(capacity: usize) -> usize {
    HEADER_SIZE + capacity
}

/// Lifecycle states of a [`SharedRegion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    /// No mapping established yet
    Uninitialized,
    /// Mapped and usable; the only state in which accessors are valid
    Mapped,
    /// Unmapped; terminal
    Closed,
}

/// Live view onto a region's header
///
/// Not a copy: each [`length`](Self::length) call re-reads the mapped bytes,
/// so a concurrent writer's update (once synchronized) is observable through
/// an already-obtained view.
#[derive(Debug, Clone, Copy)]
pub struct RegionHeader<'a> {
    bytes: &'a [u8],
}

impl RegionHeader<'_> {
    /// Number of meaningful bytes currently in the value area
    pub fn length(&self) -> usize {
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&self.bytes[..HEADER_SIZE]);
        u64::from_le_bytes(raw) as usize
    }
}

/// A shared memory region holding one variable-length value
///
/// Owns the backing store handle, the mapped span, and an explicit deletion
/// ownership flag. Constructed only by the provisioner; a constructed region
/// is always in the [`Mapped`](RegionState::Mapped) state.
#[derive(Debug)]
pub struct SharedRegion {
    /// Backing store the span is mapped from; dropped on close
    store: Option<BackingStore>,
    /// Mapped span covering header plus value area; dropped on close
    span: Option<MappedSpan>,
    /// Fixed maximum value size, set at creation
    capacity: usize,
    /// Whether close() deletes the backing store
    remove_on_close: bool,
    state: RegionState,
}

impl SharedRegion {
    /// Wrap an established mapping. The span must cover exactly
    /// `size_for(capacity)` bytes.
    pub(crate) fn new_mapped(
        store: BackingStore,
        span: MappedSpan,
        capacity: usize,
        remove_on_close: bool,
    ) -> Self {
        debug_assert_eq!(span.len(), size_for(capacity));
        Self {
            store: Some(store),
            span: Some(span),
            capacity,
            remove_on_close,
            state: RegionState::Mapped,
        }
    }

    /// Write a zero length into the header
    pub(crate) fn zero_header(&mut self) {
        self.span_mut().as_mut_slice()[..HEADER_SIZE].fill(0);
    }

    fn span(&self) -> &MappedSpan {
        match &self.span {
            Some(span) => span,
            None => panic!("shared region accessed after close"),
        }
    }

    fn span_mut(&mut self) -> &mut MappedSpan {
        match &mut self.span {
            Some(span) => span,
            None => panic!("shared region accessed after close"),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> RegionState {
        self.state
    }

    /// Fixed maximum value size for this region
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total mapped size (header plus value area)
    pub fn total_size(&self) -> usize {
        size_for(self.capacity)
    }

    /// Whether this region deletes its backing store on close
    pub fn owns_store(&self) -> bool {
        self.remove_on_close
    }

    /// Filesystem path of the backing store, when it has one
    pub fn path(&self) -> Option<&Path> {
        self.store.as_ref().and_then(|s| s.path())
    }

    /// Backing store handle
    ///
    /// # Panics
    ///
    /// Panics if the region is closed.
    pub fn store_file(&self) -> &File {
        match &self.store {
            Some(store) => store.file(),
            None => panic!("shared region accessed after close"),
        }
    }

    /// Raw descriptor of the backing store
    ///
    /// # Panics
    ///
    /// Panics if the region is closed.
    #[cfg(unix)]
    pub fn fd(&self) -> RawFd {
        self.store_file().as_raw_fd()
    }

    /// Live view onto the header
    ///
    /// # Panics
    ///
    /// Panics if the region is closed.
    pub fn header(&self) -> RegionHeader<'_> {
        RegionHeader {
            bytes: self.span().as_slice(),
        }
    }

    /// The value currently stored in the region
    ///
    /// The returned slice points into shared memory; it is not a copy. A
    /// write through any other mapping of the same store changes what it
    /// exposes (once the external protocol has sequenced that write).
    ///
    /// # Panics
    ///
    /// Panics if the region is closed.
    pub fn value(&self) -> &[u8] {
        let length = self.header().length();
        &self.span().as_slice()[HEADER_SIZE..HEADER_SIZE + length]
    }

    /// Copy `bytes` into the value area, then update the header length
    ///
    /// The value bytes and the length field are written as two separate plain
    /// stores, in that order. No visibility ordering is guaranteed toward an
    /// unsynchronized reader in another process; readers must wait for the
    /// external protocol's completion signal.
    ///
    /// Returns [`ShuttleError::CapacityExceeded`] if `bytes` is longer than
    /// the region capacity. The value area and length are left exactly as
    /// they were; the region remains usable.
    ///
    /// # Panics
    ///
    /// Panics if the region is closed.
    pub fn set_value(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.capacity {
            return Err(ShuttleError::capacity_exceeded(bytes.len(), self.capacity));
        }

        let span = self.span_mut().as_mut_slice();
        span[HEADER_SIZE..HEADER_SIZE + bytes.len()].copy_from_slice(bytes);
        span[..HEADER_SIZE].copy_from_slice(&(bytes.len() as u64).to_le_bytes());
        Ok(())
    }

    /// Flush the mapped span back to the backing store
    ///
    /// # Panics
    ///
    /// Panics if the region is closed.
    pub fn flush(&self) -> Result<()> {
        self.span().flush()
    }

    /// Unmap the region and, for an owning region, delete the backing store
    ///
    /// Idempotent: closing a closed region is a no-op. Safe to invoke while
    /// unwinding a partially completed create or attach.
    pub fn close(&mut self) -> Result<()> {
        if self.state == RegionState::Closed {
            return Ok(());
        }
        self.state = RegionState::Closed;

        // Unmap before the store handle goes away.
        self.span = None;

        if let Some(store) = self.store.take() {
            if self.remove_on_close {
                log::debug!("removing backing store {:?}", store.path());
                store.remove()?;
            }
        }
        Ok(())
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if self.state == RegionState::Mapped {
            if let Err(e) = self.close() {
                log::warn!("failed to close shared region: {}", e);
            }
        }
    }
}
