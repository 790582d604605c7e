//! AMD EPYC (Zen 2 / Zen 3) register definitions
//!
//! This module provides hardware definitions for AMD server processors that
//! implement the Host System Management Port: Family 17h models 30h-3Fh
//! (Rome) and Family 19h (Milan).
//!
//! ## Units
//!
//! - **IOHC** (I/O Hub Controller) - PCIe root complex tiles, SMN apertures
//! - **Mailbox** - HSMP message, status and argument registers
//!
//! ## References
//!
//! - Processor Programming Reference (PPR) for AMD Family 19h Model 01h
//! - Section: Host System Management Port (HSMP)

pub mod iohc;
pub mod mailbox;
