// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod capability;
pub mod common;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod metrics;
pub mod ops;
pub mod platform;
pub mod prom;
pub mod session;
pub mod smn;
pub mod topology;

#[cfg(test)]
mod testing;

pub use config::HsmpConfig;
pub use error::{strerror, ErrorCode, ErrorKind, HsmpError, Result};
pub use ops::{min_xgmi_width, DfPstate, FabricClocks, NbioPstate, XgmiWidth};
pub use platform::{LinuxPlatform, Platform};
pub use prom::HsmpMetricExporter;
pub use session::Hsmp;
pub use topology::{Tile, Topology};
