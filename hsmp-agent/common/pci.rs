use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hsmp_raw::ConfigSpaceError;

use crate::error::{HsmpError, Result};
use crate::smn::ConfigSpace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PciAddress {
    pub domain: u32,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X}:{:02X}:{:02X}.{}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl PciAddress {
    /// Location of the config-space file under `root` (usually `/proc/bus/pci`)
    pub fn config_path(&self, root: &Path) -> PathBuf {
        let bus_dir = if self.domain > 0 {
            format!("{:04x}:{:02x}", self.domain, self.bus)
        } else {
            format!("{:02x}", self.bus)
        };
        root.join(bus_dir)
            .join(format!("{:02x}.{:x}", self.device, self.function))
    }
}

pub struct PciHandle {
    file: parking_lot::Mutex<File>,
    address: PciAddress,
    path: PathBuf,
}

impl PciHandle {
    pub fn open(root: &Path, address: PciAddress) -> Result<Self> {
        let path = address.config_path(root);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&path)
            .map_err(|e| ConfigSpaceError::OpenFailed {
                path: path.clone(),
                source: e,
            })?;

        tracing::debug!("Opened config space of {} at {}", address, path.display());

        Ok(Self {
            file: parking_lot::Mutex::new(file),
            address,
            path,
        })
    }

    pub fn address(&self) -> PciAddress {
        self.address
    }

    fn seek(&self, file: &mut File, offset: u32) -> Result<()> {
        file.seek(SeekFrom::Start(offset as u64))
            .map_err(|e| ConfigSpaceError::SeekFailed {
                path: self.path.clone(),
                offset,
                source: e,
            })?;
        Ok(())
    }
}

impl ConfigSpace for PciHandle {
    fn read32(&self, offset: u32) -> Result<u32> {
        let mut file = self.file.lock();
        self.seek(&mut file, offset)?;

        let mut buffer = [0u8; 4];
        file.read_exact(&mut buffer)
            .map_err(|e| ConfigSpaceError::ReadFailed {
                path: self.path.clone(),
                offset,
                source: e,
            })?;

        Ok(u32::from_le_bytes(buffer))
    }

    fn write32(&self, offset: u32, value: u32) -> Result<()> {
        let mut file = self.file.lock();
        self.seek(&mut file, offset)?;

        file.write_all(&value.to_le_bytes())
            .map_err(|e| ConfigSpaceError::WriteFailed {
                path: self.path.clone(),
                offset,
                source: e,
            })?;

        Ok(())
    }
}

/// A device found by a bus scan, with an open config-space handle
#[derive(Clone)]
pub struct PciDevice {
    pub address: PciAddress,
    pub vendor_id: u16,
    pub device_id: u16,
    pub config: Arc<dyn ConfigSpace>,
}

impl fmt::Debug for PciDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PciDevice")
            .field("address", &self.address)
            .field("vendor_id", &format_args!("0x{:04X}", self.vendor_id))
            .field("device_id", &format_args!("0x{:04X}", self.device_id))
            .finish()
    }
}

/// Enumerate all devices under `root` and open those matching `vendor:device`
///
/// Only the ID dword is read from non-matching devices; handles are opened
/// for matches only.
pub fn scan(root: &Path, vendor_id: u16, device_id: u16) -> Result<Vec<PciDevice>> {
    let bus_dirs = std::fs::read_dir(root).map_err(|e| {
        HsmpError::PciError(format!("Failed to list {}: {e}", root.display()))
    })?;

    let mut found = Vec::new();

    for bus_dir in bus_dirs.flatten() {
        let name = bus_dir.file_name();
        let Some((domain, bus)) = name.to_str().and_then(parse_bus_dir) else {
            continue;
        };

        let Ok(slots) = std::fs::read_dir(bus_dir.path()) else {
            continue;
        };

        for slot in slots.flatten() {
            let name = slot.file_name();
            let Some((device, function)) = name.to_str().and_then(parse_slot) else {
                continue;
            };

            let address = PciAddress {
                domain,
                bus,
                device,
                function,
            };

            let id = match hsmp_raw::read_config32(slot.path(), 0) {
                Ok(id) => id,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", address, e);
                    continue;
                }
            };

            if (id & 0xFFFF) as u16 != vendor_id || (id >> 16) as u16 != device_id {
                continue;
            }

            tracing::debug!(
                "Located PCI device {:04X}:{:04X} at {}",
                vendor_id,
                device_id,
                address
            );

            found.push(PciDevice {
                address,
                vendor_id,
                device_id,
                config: Arc::new(PciHandle::open(root, address)?),
            });
        }
    }

    Ok(found)
}

/// Parse a bus directory name: `bb` or `dddd:bb`
fn parse_bus_dir(name: &str) -> Option<(u32, u8)> {
    match name.split_once(':') {
        Some((domain, bus)) => Some((
            u32::from_str_radix(domain, 16).ok()?,
            u8::from_str_radix(bus, 16).ok()?,
        )),
        None => Some((0, u8::from_str_radix(name, 16).ok()?)),
    }
}

/// Parse a device file name: `dd.f`
fn parse_slot(name: &str) -> Option<(u8, u8)> {
    let (device, function) = name.split_once('.')?;
    Some((
        u8::from_str_radix(device, 16).ok()?,
        u8::from_str_radix(function, 16).ok()?,
    ))
}
