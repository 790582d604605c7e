//! HSMP mailbox register definitions
//!
//! A transaction clears the status register, writes up to eight argument
//! words, writes the message ID (which starts the SMU), polls the status
//! register and finally reads back the response words from the same
//! argument slots.
//!
//! ## References
//!
//! - PPR for AMD Family 19h Model 01h, Section: HSMP Messages

use crate::register::RegisterLayout;

/// Maximum number of argument/response words per message
pub const MAX_ARGS: usize = 8;

/// Default number of 1 ms status polls before the SMU is considered hung
pub const DEFAULT_TIMEOUT_POLLS: u32 = 500;

/// Highest HSMP interface version this crate knows the message set of
pub const MAX_INTERFACE_VERSION: u32 = 3;

/// SMN addresses of the mailbox registers (through the HSMP aperture)
pub mod smn {
    /// Message ID register; writing it triggers the SMU
    pub const MBOX_MSG_ID: u32 = 0x03B1_0534;

    /// Status register
    pub const MBOX_STATUS: u32 = 0x03B1_0980;

    /// First argument/response slot
    pub const MBOX_DATA: u32 = 0x03B1_09E0;

    /// Address of argument/response slot `index`
    pub const fn data(index: usize) -> u32 {
        MBOX_DATA + ((index as u32) << 2)
    }
}

/// Status register values
pub mod status {
    /// Written by the host before a message; the SMU has not answered yet
    pub const NOT_READY: u32 = 0x00;

    /// Message completed successfully
    pub const OK: u32 = 0x01;

    /// The SMU does not implement the message ID
    pub const INVALID_MSG_ID: u32 = 0xFE;

    /// The SMU rejected an argument
    pub const INVALID_ARG: u32 = 0xFF;
}

/// HSMP message identifiers
///
/// Every implementation supports `Test`, `GetSmuVersion` and
/// `GetInterfaceVersion`; the rest depend on the interface version.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageId {
    Test = 1,
    GetSmuVersion = 2,
    GetInterfaceVersion = 3,
    GetSocketPower = 4,
    SetSocketPowerLimit = 5,
    GetSocketPowerLimit = 6,
    GetSocketPowerLimitMax = 7,
    SetBoostLimit = 8,
    SetBoostLimitSocket = 9,
    GetBoostLimit = 10,
    GetProcHot = 11,
    SetXgmiLinkWidth = 12,
    SetDfPstate = 13,
    AutoDfPstate = 14,
    GetFclkMclk = 15,
    GetCclkThrottleLimit = 16,
    GetC0Percent = 17,
    SetNbioDpmLevel = 18,
    GetDdrBandwidth = 20,
}

impl MessageId {
    pub fn id(&self) -> u32 {
        *self as u32
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageId::Test => "TEST",
            MessageId::GetSmuVersion => "GET_SMU_VER",
            MessageId::GetInterfaceVersion => "GET_PROTO_VER",
            MessageId::GetSocketPower => "GET_SOCKET_POWER",
            MessageId::SetSocketPowerLimit => "SET_SOCKET_POWER_LIMIT",
            MessageId::GetSocketPowerLimit => "GET_SOCKET_POWER_LIMIT",
            MessageId::GetSocketPowerLimitMax => "GET_SOCKET_POWER_LIMIT_MAX",
            MessageId::SetBoostLimit => "SET_BOOST_LIMIT",
            MessageId::SetBoostLimitSocket => "SET_BOOST_LIMIT_SOCKET",
            MessageId::GetBoostLimit => "GET_BOOST_LIMIT",
            MessageId::GetProcHot => "GET_PROC_HOT",
            MessageId::SetXgmiLinkWidth => "SET_XGMI_LINK_WIDTH",
            MessageId::SetDfPstate => "SET_DF_PSTATE",
            MessageId::AutoDfPstate => "AUTO_DF_PSTATE",
            MessageId::GetFclkMclk => "GET_FCLK_MCLK",
            MessageId::GetCclkThrottleLimit => "GET_CCLK_THROTTLE_LIMIT",
            MessageId::GetC0Percent => "GET_C0_PERCENT",
            MessageId::SetNbioDpmLevel => "SET_NBIO_DPM_LEVEL",
            MessageId::GetDdrBandwidth => "GET_DDR_BANDWIDTH",
        }
    }

    /// Lowest interface version that defines this message
    pub fn min_interface_version(&self) -> u32 {
        match self {
            MessageId::SetNbioDpmLevel => 2,
            MessageId::GetDdrBandwidth => 3,
            _ => 1,
        }
    }

    pub fn all() -> Vec<MessageId> {
        vec![
            MessageId::Test,
            MessageId::GetSmuVersion,
            MessageId::GetInterfaceVersion,
            MessageId::GetSocketPower,
            MessageId::SetSocketPowerLimit,
            MessageId::GetSocketPowerLimit,
            MessageId::GetSocketPowerLimitMax,
            MessageId::SetBoostLimit,
            MessageId::SetBoostLimitSocket,
            MessageId::GetBoostLimit,
            MessageId::GetProcHot,
            MessageId::SetXgmiLinkWidth,
            MessageId::SetDfPstate,
            MessageId::AutoDfPstate,
            MessageId::GetFclkMclk,
            MessageId::GetCclkThrottleLimit,
            MessageId::GetC0Percent,
            MessageId::SetNbioDpmLevel,
            MessageId::GetDdrBandwidth,
        ]
    }
}

/// Highest message ID legal under an interface version
///
/// The allow-list is a prefix of the message ID space: a message legal under
/// version `v` stays legal under every later version. Versions above
/// [`MAX_INTERFACE_VERSION`] are treated as the maximum; version 0 allows
/// nothing.
pub fn max_message_for_version(version: u32) -> Option<MessageId> {
    match version.min(MAX_INTERFACE_VERSION) {
        1 => Some(MessageId::GetC0Percent),
        2 => Some(MessageId::SetNbioDpmLevel),
        3 => Some(MessageId::GetDdrBandwidth),
        _ => None,
    }
}

/// SMU firmware version word (GET_SMU_VER response)
///
/// ## Register Format
///
/// | Bits   | Field  |
/// |--------|--------|
/// | 0-7    | debug  |
/// | 8-15   | minor  |
/// | 16-23  | major  |
/// | 24-31  | unused |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmuFwVersion {
    pub major: u8,
    pub minor: u8,
    pub debug: u8,
}

impl RegisterLayout for SmuFwVersion {
    fn to_reg_value(&self) -> u32 {
        self.debug as u32 | ((self.minor as u32) << 8) | ((self.major as u32) << 16)
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            debug: (value & 0xFF) as u8,
            minor: ((value >> 8) & 0xFF) as u8,
            major: ((value >> 16) & 0xFF) as u8,
        }
    }
}

impl std::fmt::Display for SmuFwVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.debug)
    }
}

/// SET_BOOST_LIMIT argument word
///
/// | Bits   | Field     | Description                  |
/// |--------|-----------|------------------------------|
/// | 0-15   | limit_mhz | Boost limit in MHz           |
/// | 16-31  | apic_id   | APIC ID of the target core   |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoostLimitArg {
    pub apic_id: u16,
    pub limit_mhz: u16,
}

impl RegisterLayout for BoostLimitArg {
    fn to_reg_value(&self) -> u32 {
        ((self.apic_id as u32) << 16) | self.limit_mhz as u32
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            apic_id: (value >> 16) as u16,
            limit_mhz: (value & 0xFFFF) as u16,
        }
    }
}

/// SET_XGMI_LINK_WIDTH argument word
///
/// | Bits   | Field | Description                   |
/// |--------|-------|-------------------------------|
/// | 0-7    | max   | Maximum width class (0=x2..2=x16) |
/// | 8-15   | min   | Minimum width class           |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XgmiWidthArg {
    pub min: u8,
    pub max: u8,
}

impl RegisterLayout for XgmiWidthArg {
    fn to_reg_value(&self) -> u32 {
        ((self.min as u32) << 8) | self.max as u32
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            min: ((value >> 8) & 0xFF) as u8,
            max: (value & 0xFF) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.max > 2 || self.min > 2 {
            return Err("xGMI width class must be <= 2 (x16)");
        }
        if self.min > self.max {
            return Err("xGMI minimum width must not exceed maximum width");
        }
        Ok(())
    }
}

/// SET_NBIO_DPM_LEVEL argument word
///
/// | Bits   | Field   | Description                     |
/// |--------|---------|---------------------------------|
/// | 0-7    | dpm_min | Minimum DPM level               |
/// | 8-15   | dpm_max | Maximum DPM level               |
/// | 16-23  | tile_id | IOHC tile number in the socket  |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NbioDpmArg {
    pub tile_id: u8,
    pub dpm_max: u8,
    pub dpm_min: u8,
}

impl RegisterLayout for NbioDpmArg {
    fn to_reg_value(&self) -> u32 {
        ((self.tile_id as u32) << 16) | ((self.dpm_max as u32) << 8) | self.dpm_min as u32
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            tile_id: ((value >> 16) & 0xFF) as u8,
            dpm_max: ((value >> 8) & 0xFF) as u8,
            dpm_min: (value & 0xFF) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.tile_id as usize >= super::iohc::TILES_PER_SOCKET {
            return Err("NBIO tile ID must be < 4");
        }
        if self.dpm_min > self.dpm_max {
            return Err("NBIO DPM minimum must not exceed maximum");
        }
        Ok(())
    }
}

/// GET_DDR_BANDWIDTH response word
///
/// | Bits   | Field         | Description                          |
/// |--------|---------------|--------------------------------------|
/// | 0-7    | utilized_pct  | Utilized bandwidth, percent of max   |
/// | 8-19   | utilized_gbps | Utilized (read + write) GB/s         |
/// | 20-31  | max_gbps      | Theoretical maximum GB/s             |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdrBandwidth {
    pub max_gbps: u32,
    pub utilized_gbps: u32,
    pub utilized_pct: u32,
}

impl RegisterLayout for DdrBandwidth {
    fn to_reg_value(&self) -> u32 {
        ((self.max_gbps & 0xFFF) << 20)
            | ((self.utilized_gbps & 0xFFF) << 8)
            | (self.utilized_pct & 0xFF)
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            max_gbps: value >> 20,
            utilized_gbps: (value >> 8) & 0xFFF,
            utilized_pct: value & 0xFF,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.max_gbps > 0xFFF || self.utilized_gbps > 0xFFF {
            return Err("DDR bandwidth fields are 12 bits wide");
        }
        if self.utilized_pct > 0xFF {
            return Err("DDR utilization percent is 8 bits wide");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_is_prefix() {
        for version in 1..=MAX_INTERFACE_VERSION + 1 {
            let lower = max_message_for_version(version).unwrap();
            let higher = max_message_for_version(version + 1).unwrap();
            assert!(lower <= higher);
        }
        assert_eq!(max_message_for_version(0), None);
        assert_eq!(max_message_for_version(7), Some(MessageId::GetDdrBandwidth));
    }

    #[test]
    fn test_min_version_agrees_with_allow_list() {
        for msg in MessageId::all() {
            let max = max_message_for_version(msg.min_interface_version()).unwrap();
            assert!(msg <= max, "{} not allowed at its own version", msg.name());
            if msg.min_interface_version() > 1 {
                let below = max_message_for_version(msg.min_interface_version() - 1).unwrap();
                assert!(msg > below);
            }
        }
    }

    #[test]
    fn test_ddr_bandwidth_fields() {
        // 204 GB/s max, 51 GB/s used, 25 %
        let word = (204 << 20) | (51 << 8) | 25;
        let bw = DdrBandwidth::from_reg_value(word);
        assert_eq!(bw.max_gbps, 204);
        assert_eq!(bw.utilized_gbps, 51);
        assert_eq!(bw.utilized_pct, 25);
        assert_eq!(bw.to_reg_value(), word);
    }

    #[test]
    fn test_smu_version_display() {
        let ver = SmuFwVersion::from_reg_value(0x002E_4A00);
        assert_eq!(ver.to_string(), "46.74.0");
    }

    #[test]
    fn test_argument_words() {
        let boost = BoostLimitArg {
            apic_id: 0x12,
            limit_mhz: 3000,
        };
        assert_eq!(boost.to_reg_value(), 0x0012_0BB8);

        let xgmi = XgmiWidthArg { min: 0, max: 2 };
        assert_eq!(xgmi.to_reg_value(), 0x0002);
        assert!(XgmiWidthArg { min: 2, max: 1 }.validate().is_err());

        let dpm = NbioDpmArg {
            tile_id: 3,
            dpm_max: 2,
            dpm_min: 0,
        };
        assert_eq!(dpm.to_reg_value(), 0x0003_0200);
        assert!(dpm.validate().is_ok());
    }
}
