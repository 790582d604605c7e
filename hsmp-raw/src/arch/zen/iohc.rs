//! IOHC (I/O Hub Controller) definitions
//!
//! Every socket carries four IOHC tiles, each a PCIe root complex hosting a
//! contiguous range of bus numbers. The tiles expose two index/data
//! apertures in their PCI configuration space through which SMN registers
//! (and the HSMP mailbox) are reached.

use crate::register::RegisterLayout;

/// AMD PCI vendor ID
pub const PCI_VENDOR_ID_AMD: u16 = 0x1022;

/// IOHC root complex device ID on Family 17h/19h
pub const IOHC_DEVICE_ID: u16 = 0x1480;

/// Number of IOHC tiles per socket
pub const TILES_PER_SOCKET: usize = 4;

/// Maximum number of sockets on an HSMP capable platform
pub const MAX_SOCKETS: usize = 2;

/// Maximum number of IOHC tiles in the system
pub const MAX_TILES: usize = TILES_PER_SOCKET * MAX_SOCKETS;

/// Highest PCI bus number in a segment
pub const MAX_BUS: u8 = 0xFF;

/// PCI config-space offsets of the SMN access apertures
pub mod pci {
    /// General purpose SMN index register
    pub const SMN_INDEX: u32 = 0x60;

    /// General purpose SMN data register
    pub const SMN_DATA: u32 = 0x64;

    /// HSMP aperture index register
    pub const HSMP_INDEX: u32 = 0xC4;

    /// HSMP aperture data register
    pub const HSMP_DATA: u32 = 0xC8;
}

/// SMN addresses of IOHC registers
pub mod smn {
    /// IOHCMISC0 NB_BUS_NUM_CNTL register
    pub const IOHCMISC0_NB_BUS_NUM_CNTL: u32 = 0x13B1_0044;

    /// Stride between IOHCMISC[0..3] register blocks
    pub const IOHCMISC_STRIDE: u32 = 0x0010_0000;

    /// NB_BUS_NUM_CNTL address for the tile at `position` within its socket
    pub const fn nb_bus_num_cntl(position: usize) -> u32 {
        IOHCMISC0_NB_BUS_NUM_CNTL
            + ((position % super::TILES_PER_SOCKET) as u32) * IOHCMISC_STRIDE
    }
}

/// NB_BUS_NUM_CNTL register layout
///
/// Reports the base bus number the hardware assigned to an IOHC tile.
///
/// ## Register Format
///
/// | Bits  | Field    | Description                     |
/// |-------|----------|---------------------------------|
/// | 0-7   | bus_base | Lowest bus hosted by this IOHC  |
/// | 8-31  | reserved |                                 |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NbBusNumCntl {
    pub bus_base: u8,
}

impl RegisterLayout for NbBusNumCntl {
    fn to_reg_value(&self) -> u32 {
        self.bus_base as u32
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            bus_base: (value & 0xFF) as u8,
        }
    }
}
