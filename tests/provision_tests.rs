//! Integration tests for backing store provisioning and failure cleanup

use std::{fs, sync::Arc};

use memshuttle::{
    size_for, BackingStore, MappedSpan, ProvisionConfig, RegionMapper, RegionProvisioner,
    Result, ShuttleError, HEADER_SIZE,
};
use tempfile::TempDir;

/// Mapper that always fails, for exercising creation unwinding
#[derive(Debug)]
struct FailingMapper;

impl RegionMapper for FailingMapper {
    fn map(&self, _store: &fs::File, _len: usize) -> Result<MappedSpan> {
        Err(ShuttleError::platform("mapping rejected by test"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisioner_in(dir: &TempDir) -> RegionProvisioner {
        RegionProvisioner::with_config(ProvisionConfig {
            dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
    }

    fn entries_in(dir: &TempDir) -> usize {
        fs::read_dir(dir.path()).unwrap().count()
    }

    #[test]
    fn test_store_sized_to_capacity() {
        let dir = TempDir::new().unwrap();
        let region = provisioner_in(&dir).create_temporary(4096).unwrap();

        let store_len = fs::metadata(region.path().unwrap()).unwrap().len();
        assert_eq!(store_len as usize, size_for(4096));
        assert_eq!(region.total_size(), size_for(4096));
    }

    #[test]
    fn test_mapping_failure_leaves_no_orphan() {
        let dir = TempDir::new().unwrap();
        let provisioner = RegionProvisioner::with_parts(
            Arc::new(FailingMapper),
            ProvisionConfig {
                dir: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
        );

        let err = provisioner.create_temporary(64).unwrap_err();
        assert!(matches!(err, ShuttleError::Platform { .. }));
        assert_eq!(entries_in(&dir), 0);
    }

    #[test]
    fn test_create_at_failure_leaves_no_orphan() {
        let dir = TempDir::new().unwrap();
        let provisioner = RegionProvisioner::with_parts(
            Arc::new(FailingMapper),
            ProvisionConfig::default(),
        );

        let path = dir.path().join("doomed");
        assert!(provisioner.create_at(&path, 64, true).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_create_at_refuses_existing_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taken");
        fs::write(&path, b"occupied").unwrap();

        let err = RegionProvisioner::new().create_at(&path, 16, false).unwrap_err();
        assert!(matches!(err, ShuttleError::Io { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"occupied");
    }

    #[test]
    fn test_attach_missing_store_fails() {
        let dir = TempDir::new().unwrap();
        let err = RegionProvisioner::new()
            .attach_path(dir.path().join("absent"), size_for(16), false)
            .unwrap_err();
        assert!(matches!(err, ShuttleError::Io { .. }));
    }

    #[test]
    fn test_attach_rejects_short_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short");
        fs::write(&path, vec![0u8; HEADER_SIZE + 4]).unwrap();

        let err = RegionProvisioner::new()
            .attach_path(&path, size_for(64), false)
            .unwrap_err();
        assert!(matches!(err, ShuttleError::Provision { .. }));
    }

    #[test]
    fn test_attach_rejects_corrupt_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt");

        // A store whose header claims more bytes than the value area holds.
        let mut bytes = vec![0u8; size_for(16)];
        bytes[..HEADER_SIZE].copy_from_slice(&1000u64.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let err = RegionProvisioner::new()
            .attach_path(&path, size_for(16), false)
            .unwrap_err();
        assert!(matches!(err, ShuttleError::Provision { .. }));
    }

    #[test]
    fn test_attach_existing_from_open_store() {
        let dir = TempDir::new().unwrap();
        let provisioner = provisioner_in(&dir);

        let mut creator = provisioner.create_temporary(32).unwrap();
        creator.set_value(b"through a handle").unwrap();

        let store = BackingStore::open(creator.path().unwrap()).unwrap();
        let attached = provisioner
            .attach_existing(store, creator.total_size(), false)
            .unwrap();
        assert_eq!(attached.value(), b"through a handle");
    }

    #[test]
    fn test_zero_capacity_store() {
        let dir = TempDir::new().unwrap();
        let region = provisioner_in(&dir).create_temporary(0).unwrap();

        assert_eq!(region.capacity(), 0);
        assert_eq!(region.total_size(), HEADER_SIZE);
        assert_eq!(region.value(), b"");
    }
}
