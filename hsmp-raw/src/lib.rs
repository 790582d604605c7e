//! # hsmp-raw
//!
//! Register and mailbox definitions for the AMD Host System Management Port
//! (HSMP).
//!
//! HSMP is a firmware mailbox owned by the System Management Unit (SMU). It is
//! reached from the host through two index/data apertures in the PCI
//! configuration space of each IOHC (root complex) device: one aperture for
//! general SMN (System Management Network) registers and one dedicated to the
//! HSMP message, status and argument registers.
//!
//! This crate only carries definitions and the stateless config-space
//! primitives. Discovery, locking and the transaction protocol live in the
//! `hsmp` crate.
//!
//! ## Features
//!
//! Select the target processor generation via feature flags:
//! - `zen` (default) - Family 17h (models 30h-3Fh) and Family 19h server parts
//!
//! ## Usage
//!
//! ```ignore
//! use hsmp_raw::current_arch::mailbox::{self, DdrBandwidth};
//! use hsmp_raw::RegisterLayout;
//!
//! let status_addr = mailbox::smn::MBOX_STATUS;
//! let bw = DdrBandwidth::from_reg_value(response_word);
//! println!("{} GB/s of {} GB/s", bw.utilized_gbps, bw.max_gbps);
//! ```

pub mod arch;
pub mod config_space;
pub mod register;

// Re-export for convenience
pub use config_space::{read_config32, ConfigSpaceError, Result};
pub use register::{Register, RegisterLayout};

// Export current architecture based on feature flag
#[cfg(feature = "zen")]
pub use arch::zen as current_arch;
