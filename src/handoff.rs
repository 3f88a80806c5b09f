//! Store identity handoff between coordinator and worker
//!
//! The coordinator creates a region, then tells the worker where to find the
//! same backing store. [`RegionSpec`] is the canonical encoding of that
//! handoff: the store identity plus the agreed total size, serialized with
//! bincode for transport over whatever out-of-band channel the two processes
//! share (pipe, argv, environment).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ShuttleError},
    provision::{BackingStore, RegionProvisioner},
    region::SharedRegion,
};

#[cfg(unix)]
use std::os::fd::FromRawFd;

/// How an attaching process locates the backing store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreIdentity {
    /// Filesystem path to the store
    Path(PathBuf),
    /// Raw descriptor number inherited from the creating process; only
    /// meaningful in a child that inherited the descriptor table
    InheritedFd(i32),
}

/// Everything a worker needs to attach to a coordinator's region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    /// Store identity
    pub identity: StoreIdentity,
    /// Full store size agreed by both sides (header plus capacity)
    pub total_size: u64,
}

impl RegionSpec {
    /// Describe a mapped region for handoff
    ///
    /// Path-backed stores travel by path; pathless stores travel by raw
    /// descriptor and rely on inheritance.
    pub fn describe(region: &SharedRegion) -> Result<Self> {
        let identity = match region.path() {
            Some(path) => StoreIdentity::Path(path.to_path_buf()),
            #[cfg(unix)]
            None => StoreIdentity::InheritedFd(region.fd()),
            #[cfg(not(unix))]
            None => {
                return Err(ShuttleError::platform(
                    "pathless stores need descriptor inheritance, which requires unix",
                ));
            }
        };
        Ok(Self {
            identity,
            total_size: region.total_size() as u64,
        })
    }

    /// Serialize for the out-of-band channel
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from the out-of-band channel
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl RegionProvisioner {
    /// Attach to the region a [`RegionSpec`] describes
    ///
    /// The worker side of the handoff; `take_ownership` is almost always
    /// false, the coordinator keeps deletion ownership.
    ///
    /// # Safety
    ///
    /// For [`StoreIdentity::InheritedFd`], the descriptor must be open in
    /// this process, refer to the coordinator's backing store, and be owned
    /// by no other handle; the returned region takes ownership of it.
    pub unsafe fn attach_spec(
        &self,
        spec: &RegionSpec,
        take_ownership: bool,
    ) -> Result<SharedRegion> {
        let total_size = usize::try_from(spec.total_size).map_err(|_| {
            ShuttleError::invalid_parameter("total_size", "does not fit in usize")
        })?;

        let store = match &spec.identity {
            StoreIdentity::Path(path) => BackingStore::open(path)?,
            #[cfg(unix)]
            StoreIdentity::InheritedFd(fd) => {
                BackingStore::from_file(std::fs::File::from_raw_fd(*fd))
            }
            #[cfg(not(unix))]
            StoreIdentity::InheritedFd(_) => {
                return Err(ShuttleError::platform(
                    "descriptor inheritance requires unix",
                ));
            }
        };
        self.attach_existing(store, total_size, take_ownership)
    }
}
