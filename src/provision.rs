//! Backing store provisioning and region attach
//!
//! The provisioner turns a requested value capacity into a sized backing
//! store, maps it through the injected [`RegionMapper`], and hands back a
//! [`SharedRegion`]. A second process re-attaches to the same store through
//! its identity (path or inherited descriptor) without creating storage.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ShuttleError},
    mapper::{MmapMapper, RegionMapper},
    region::{size_for, SharedRegion, HEADER_SIZE},
};

/// Types of backing store a provisioner can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackingKind {
    /// Uniquely named temporary file in a configurable directory
    FileBacked,
    /// Anonymous memory file descriptor (Linux-specific); identity crosses
    /// the process boundary only by descriptor inheritance
    #[cfg(target_os = "linux")]
    MemFd,
}

/// Configuration for provisioning backing stores
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Directory for temporary stores; the system temp directory if unset
    pub dir: Option<PathBuf>,
    /// Filename prefix for temporary stores
    pub prefix: String,
    /// Backing type to provision
    pub kind: BackingKind,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "memshuttle-".to_string(),
            kind: BackingKind::FileBacked,
        }
    }
}

/// Handle to a provisioned backing store
///
/// Carries the open file plus the filesystem path when the store has one.
/// Pathless stores (inherited descriptors, memfd) release their storage when
/// the last descriptor closes.
#[derive(Debug)]
pub struct BackingStore {
    file: File,
    path: Option<PathBuf>,
}

impl BackingStore {
    pub(crate) fn new(file: File, path: Option<PathBuf>) -> Self {
        Self { file, path }
    }

    /// Open an existing store by path for attaching
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ShuttleError::from_io(e, "failed to open backing store"))?;
        Ok(Self {
            file,
            path: Some(path),
        })
    }

    /// Wrap an already-open store handle, e.g. a descriptor inherited from
    /// the creating process
    pub fn from_file(file: File) -> Self {
        Self { file, path: None }
    }

    /// The open store handle
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Filesystem path of the store, when it has one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Delete the store
    ///
    /// Unlinks path-backed stores; for pathless stores dropping the
    /// descriptor is the deletion.
    pub fn remove(self) -> Result<()> {
        if let Some(path) = &self.path {
            std::fs::remove_file(path)
                .map_err(|e| ShuttleError::from_io(e, "failed to remove backing store"))?;
        }
        Ok(())
    }
}

/// Creates temporary backing stores and attaches to existing ones
#[derive(Debug, Clone)]
pub struct RegionProvisioner {
    mapper: Arc<dyn RegionMapper>,
    config: ProvisionConfig,
}

impl RegionProvisioner {
    /// Provisioner with the production mmap mapper and default configuration
    pub fn new() -> Self {
        Self::with_parts(Arc::new(MmapMapper), ProvisionConfig::default())
    }

    /// Provisioner with the production mapper and a custom configuration
    pub fn with_config(config: ProvisionConfig) -> Self {
        Self::with_parts(Arc::new(MmapMapper), config)
    }

    /// Provisioner with an injected mapper and configuration
    pub fn with_parts(mapper: Arc<dyn RegionMapper>, config: ProvisionConfig) -> Self {
        Self { mapper, config }
    }

    /// Provisioning configuration in use
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Create a uniquely named temporary backing store sized for values up
    /// to `capacity` bytes, map it, and return an owning region
    ///
    /// The store is deleted when the region is closed. Every failure path
    /// after the store exists deletes it before the error is returned.
    pub fn create_temporary(&self, capacity: usize) -> Result<SharedRegion> {
        let total_size = size_for(capacity);
        let store = self.provision_store(total_size)?;
        self.map_new_store(store, total_size, capacity, true)
    }

    /// Create a region backed by a store at a caller-chosen path
    ///
    /// Fails if `path` already exists. Deletion ownership is the explicit
    /// `remove_on_close` flag.
    pub fn create_at(
        &self,
        path: impl AsRef<Path>,
        capacity: usize,
        remove_on_close: bool,
    ) -> Result<SharedRegion> {
        let path = path.as_ref().to_path_buf();
        let total_size = size_for(capacity);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| ShuttleError::from_io(e, "failed to create backing store"))?;
        let store = self.size_store(BackingStore::new(file, Some(path)), total_size)?;
        self.map_new_store(store, total_size, capacity, remove_on_close)
    }

    /// Attach to an already-provisioned store without creating storage
    ///
    /// `total_size` is the full store size agreed with the creator (header
    /// plus capacity); the capacity is derived from it. Deletion ownership is
    /// the explicit `take_ownership` flag.
    pub fn attach_existing(
        &self,
        store: BackingStore,
        total_size: usize,
        take_ownership: bool,
    ) -> Result<SharedRegion> {
        if total_size < HEADER_SIZE {
            return Err(ShuttleError::invalid_parameter(
                "total_size",
                format!("must be at least the header size ({} bytes)", HEADER_SIZE),
            ));
        }
        let capacity = total_size - HEADER_SIZE;

        let store_len = store
            .file()
            .metadata()
            .map_err(|e| ShuttleError::from_io(e, "failed to stat backing store"))?
            .len();
        if store_len < total_size as u64 {
            return Err(ShuttleError::provision(format!(
                "backing store holds {} bytes, expected at least {}",
                store_len, total_size
            )));
        }

        let span = self.mapper.map(store.file(), total_size)?;

        // The stored length must already satisfy the region invariant.
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&span.as_slice()[..HEADER_SIZE]);
        let length = u64::from_le_bytes(raw) as usize;
        if length > capacity {
            return Err(ShuttleError::provision(format!(
                "stored length {} exceeds region capacity {}",
                length, capacity
            )));
        }

        log::debug!(
            "attached region at {:?}, capacity {}, owned {}",
            store.path(),
            capacity,
            take_ownership
        );
        Ok(SharedRegion::new_mapped(store, span, capacity, take_ownership))
    }

    /// Attach to an existing store by filesystem path
    pub fn attach_path(
        &self,
        path: impl AsRef<Path>,
        total_size: usize,
        take_ownership: bool,
    ) -> Result<SharedRegion> {
        let store = BackingStore::open(path)?;
        self.attach_existing(store, total_size, take_ownership)
    }

    fn provision_store(&self, total_size: usize) -> Result<BackingStore> {
        match self.config.kind {
            BackingKind::FileBacked => {
                let dir = self.config.dir.clone().unwrap_or_else(std::env::temp_dir);
                let (file, path) = tempfile::Builder::new()
                    .prefix(&self.config.prefix)
                    .tempfile_in(&dir)
                    .map_err(|e| {
                        ShuttleError::from_io(e, "failed to create temporary backing store")
                    })?
                    .keep()
                    .map_err(|e| {
                        ShuttleError::from_io(e.error, "failed to persist temporary backing store")
                    })?;
                self.size_store(BackingStore::new(file, Some(path)), total_size)
            }
            #[cfg(target_os = "linux")]
            BackingKind::MemFd => {
                let file = memfd_file(&self.config.prefix)?;
                self.size_store(BackingStore::from_file(file), total_size)
            }
        }
    }

    fn size_store(&self, store: BackingStore, total_size: usize) -> Result<BackingStore> {
        if let Err(e) = store.file().set_len(total_size as u64) {
            let _ = store.remove();
            return Err(ShuttleError::from_io(e, "failed to size backing store"));
        }
        Ok(store)
    }

    fn map_new_store(
        &self,
        store: BackingStore,
        total_size: usize,
        capacity: usize,
        remove_on_close: bool,
    ) -> Result<SharedRegion> {
        match self.mapper.map(store.file(), total_size) {
            Ok(span) => {
                log::debug!(
                    "provisioned region at {:?}, capacity {}",
                    store.path(),
                    capacity
                );
                let mut region =
                    SharedRegion::new_mapped(store, span, capacity, remove_on_close);
                region.zero_header();
                Ok(region)
            }
            Err(e) => {
                if let Err(remove_err) = store.remove() {
                    log::warn!(
                        "failed to remove backing store after mapping failure: {}",
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }
}

impl Default for RegionProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
fn memfd_file(name: &str) -> Result<File> {
    use std::ffi::CString;
    use std::os::fd::FromRawFd;

    let name_cstr = CString::new(name)
        .map_err(|_| ShuttleError::invalid_parameter("prefix", "Name contains null bytes"))?;

    let fd = unsafe { libc::memfd_create(name_cstr.as_ptr(), libc::MFD_CLOEXEC) };
    if fd == -1 {
        return Err(ShuttleError::platform("Failed to create memfd"));
    }

    Ok(unsafe { File::from_raw_fd(fd) })
}
