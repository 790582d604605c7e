//! PCI configuration-space read primitive
//!
//! This module provides low-level dword access to a device's config space
//! through its `/proc/bus/pci/<bus>/<dev>.<fn>` file. Each call opens the
//! file, so it suits one-off probes such as reading vendor/device IDs during
//! a bus scan. For repeated access keep a handle open (see `PciHandle` in the
//! `hsmp` crate).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, ConfigSpaceError>;

/// Errors that can occur during config-space operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigSpaceError {
    #[error("Failed to open PCI config space {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read offset 0x{offset:X} of {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        offset: u32,
        source: std::io::Error,
    },

    #[error("Failed to write offset 0x{offset:X} of {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        offset: u32,
        source: std::io::Error,
    },

    #[error("Failed to seek to offset 0x{offset:X} of {}: {source}", path.display())]
    SeekFailed {
        path: PathBuf,
        offset: u32,
        source: std::io::Error,
    },
}

/// Read a 32-bit little-endian value from a device's config space
///
/// # Errors
///
/// Returns an error if:
/// - The config-space file cannot be opened
/// - The offset lies beyond the readable region (unprivileged readers only
///   see the first 64 bytes)
///
/// # Example
///
/// ```ignore
/// use hsmp_raw::read_config32;
///
/// let id = read_config32("/proc/bus/pci/00/00.0", 0)?;
/// println!("vendor 0x{:04X} device 0x{:04X}", id & 0xFFFF, id >> 16);
/// ```
pub fn read_config32(path: impl AsRef<Path>, offset: u32) -> Result<u32> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| ConfigSpaceError::OpenFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    file.seek(SeekFrom::Start(offset as u64))
        .map_err(|e| ConfigSpaceError::SeekFailed {
            path: path.to_path_buf(),
            offset,
            source: e,
        })?;

    let mut buffer = [0u8; 4];
    file.read_exact(&mut buffer)
        .map_err(|e| ConfigSpaceError::ReadFailed {
            path: path.to_path_buf(),
            offset,
            source: e,
        })?;

    Ok(u32::from_le_bytes(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "hsmp-raw-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_read_dword() {
        let mut bytes = [0u8; 16];
        bytes[4..8].copy_from_slice(&0x1480_1022u32.to_le_bytes());
        let path = scratch_file("rw", &bytes);

        assert_eq!(read_config32(&path, 4).unwrap(), 0x1480_1022);
        assert_eq!(read_config32(&path, 0).unwrap(), 0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_short_read_reports_offset() {
        let path = scratch_file("short", &[0u8; 4]);

        let err = read_config32(&path, 8).unwrap_err();
        assert!(matches!(err, ConfigSpaceError::ReadFailed { offset: 8, .. }));
        assert!(err.to_string().contains("0x8"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_device_error_display() {
        let err = read_config32("/nonexistent/pci/00/00.0", 0).unwrap_err();
        assert!(err.to_string().contains("Failed to open PCI config space"));
    }
}
