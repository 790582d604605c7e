//! Processor-generation specific register definitions
//!
//! The IOHC device ID, the SMN addresses of the HSMP mailbox and the bus
//! number control registers are fixed per processor generation. This module
//! provides those definitions organized by generation.
//!
//! ## Supported Generations
//!
//! - **Zen** (`zen` feature) - EPYC Family 17h (models 30h-3Fh) and Family 19h

#[cfg(feature = "zen")]
pub mod zen;
