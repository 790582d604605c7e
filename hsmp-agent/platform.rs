//! OS-facing inputs of the library
//!
//! Privilege, processor identity, PCI enumeration and the logical CPU table
//! all come from the running system. [`LinuxPlatform`] reads them from
//! procfs, CPUID and the process credentials.

use hsmp_raw::current_arch::iohc::{IOHC_DEVICE_ID, PCI_VENDOR_ID_AMD};

use crate::common::{CpuTable, PciDevice, ProcessorInfo, PROCESSOR};
use crate::config::HsmpConfig;
use crate::error::Result;

pub trait Platform: Send + Sync {
    fn is_privileged(&self) -> bool;

    fn processor(&self) -> ProcessorInfo;

    /// IOHC root complexes, in enumeration order
    fn pci_devices(&self) -> Result<Vec<PciDevice>>;

    fn cpu_table(&self) -> Result<CpuTable>;
}

pub struct LinuxPlatform {
    config: HsmpConfig,
}

impl LinuxPlatform {
    pub fn new(config: HsmpConfig) -> Self {
        Self { config }
    }
}

impl Platform for LinuxPlatform {
    fn is_privileged(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn processor(&self) -> ProcessorInfo {
        *PROCESSOR
    }

    fn pci_devices(&self) -> Result<Vec<PciDevice>> {
        crate::common::pci::scan(&self.config.pci_root, PCI_VENDOR_ID_AMD, IOHC_DEVICE_ID)
    }

    fn cpu_table(&self) -> Result<CpuTable> {
        CpuTable::from_cpuinfo(&self.config.cpuinfo_path)
    }
}
