//! # Memshuttle - Shared-Memory Value Exchange
//!
//! Memshuttle passes one variable-length binary value between two
//! cooperating processes (a coordinator and a worker) through a region of
//! memory mapped from a common backing store, avoiding per-exchange
//! serialization over a pipe.
//!
//! ## Features
//!
//! - **Fixed region layout**: an 8-byte little-endian length header followed
//!   by a fixed-capacity value area, bit-identical in every process
//! - **Provisioning**: uniquely named temporary stores, caller-chosen paths,
//!   or anonymous memfd stores on Linux
//! - **Explicit ownership**: delete-on-close is a boolean set at
//!   construction, never implied by how the store was obtained
//! - **Injected mapping**: OS mapping sits behind a trait, with an
//!   in-process fake for tests
//! - **Handoff**: serializable store identity for the coordinator-to-worker
//!   startup channel
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   create_temporary    ┌───────────────────────────┐
//! │ Coordinator  │──────────────────────▶│ backing store (tmp file / │
//! │              │   RegionSpec handoff  │ memfd), header + value    │
//! └──────┬───────┘ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ▶└───────────▲───────────────┘
//!        │ set_value / value                         │ attach_existing
//!        ▼                                           │
//! ┌──────────────┐                            ┌──────┴───────┐
//! │ SharedRegion │                            │    Worker    │
//! └──────────────┘                            └──────────────┘
//! ```
//!
//! The region is a dumb shared buffer: *when* each side may read or write is
//! decided by an external request/response protocol, not by this crate.

// Core modules
pub mod error;
pub mod handoff;
pub mod mapper;
pub mod provision;
pub mod region;

// Main API re-exports
pub use error::{Result, ShuttleError};
pub use handoff::{RegionSpec, StoreIdentity};
pub use mapper::{HeapMapper, MappedSpan, MmapMapper, RegionMapper};
pub use provision::{BackingKind, BackingStore, ProvisionConfig, RegionProvisioner};
pub use region::{size_for, RegionHeader, RegionState, SharedRegion, HEADER_SIZE};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
