//! Indirect register access through IOHC config-space apertures
//!
//! An SMN (or HSMP mailbox) register is reached by writing its address to an
//! aperture's index register and then reading or writing the aperture's data
//! register. The two steps are not atomic: callers serialize access (the
//! transaction engine holds the cross-process lock for the whole exchange).

use hsmp_raw::current_arch::iohc::pci;

use crate::error::Result;

/// 32-bit access to one device's PCI configuration space
pub trait ConfigSpace: Send + Sync {
    fn read32(&self, offset: u32) -> Result<u32>;
    fn write32(&self, offset: u32, value: u32) -> Result<()>;
}

/// An index/data register pair in config space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aperture {
    pub name: &'static str,
    pub index: u32,
    pub data: u32,
}

/// General purpose SMN aperture
pub const SMN: Aperture = Aperture {
    name: "SMN",
    index: pci::SMN_INDEX,
    data: pci::SMN_DATA,
};

/// Aperture dedicated to the HSMP mailbox registers
pub const HSMP: Aperture = Aperture {
    name: "HSMP",
    index: pci::HSMP_INDEX,
    data: pci::HSMP_DATA,
};

impl Aperture {
    pub fn read(&self, dev: &dyn ConfigSpace, address: u32) -> Result<u32> {
        dev.write32(self.index, address)?;
        let value = dev.read32(self.data)?;
        tracing::debug!("{} read: addr 0x{:08X} = 0x{:08X}", self.name, address, value);
        Ok(value)
    }

    pub fn write(&self, dev: &dyn ConfigSpace, address: u32, value: u32) -> Result<()> {
        tracing::debug!("{} write: addr 0x{:08X} <- 0x{:08X}", self.name, address, value);
        dev.write32(self.index, address)?;
        dev.write32(self.data, value)
    }
}

/// Read a register in SMN address space
pub fn smn_read(dev: &dyn ConfigSpace, address: u32) -> Result<u32> {
    SMN.read(dev, address)
}

pub fn hsmp_read(dev: &dyn ConfigSpace, address: u32) -> Result<u32> {
    HSMP.read(dev, address)
}

pub fn hsmp_write(dev: &dyn ConfigSpace, address: u32, value: u32) -> Result<()> {
    HSMP.write(dev, address, value)
}
