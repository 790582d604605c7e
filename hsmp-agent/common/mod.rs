pub mod arch;
pub mod cpuid;
pub mod cpus;
pub mod lock;
pub mod pci;

pub use arch::{ProcessorInfo, Vendor, PROCESSOR};
pub use cpus::{CpuEntry, CpuTable};
pub use lock::LockGuard;
pub use pci::{PciAddress, PciDevice, PciHandle};
