// Processor identification and HSMP support gating

use once_cell::sync::Lazy;

use crate::common::cpuid;
use crate::error::{HsmpError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Amd,
    Intel,
    Unknown,
}

impl Vendor {
    fn from_string(vendor: &str) -> Self {
        match vendor {
            "AuthenticAMD" => Vendor::Amd,
            "GenuineIntel" => Vendor::Intel,
            _ => Vendor::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorInfo {
    pub vendor: Vendor,
    pub family: u32,
    pub model: u32,
    pub stepping: u32,
}

pub static PROCESSOR: Lazy<ProcessorInfo> = Lazy::new(detect_processor);

fn detect_processor() -> ProcessorInfo {
    let vendor = Vendor::from_string(&cpuid::vendor_string());
    let (eax, _ebx, _ecx, _edx) = cpuid::cpuid(1, 0);
    let (family, model, stepping) = cpuid::decode_signature(eax);

    tracing::info!(
        "CPU: {:?} Family {:X}h, Model {:X}h, Stepping {:X}",
        vendor,
        family,
        model,
        stepping
    );

    ProcessorInfo {
        vendor,
        family,
        model,
        stepping,
    }
}

impl ProcessorInfo {
    pub fn name(&self) -> &'static str {
        match (self.vendor, self.family) {
            (Vendor::Amd, 0x17) => "EPYC Family 17h (Zen 2)",
            (Vendor::Amd, 0x19) => "EPYC Family 19h (Zen 3)",
            (Vendor::Amd, f) if f > 0x19 => "AMD Family 1Ah or later",
            (Vendor::Amd, _) => "AMD (pre-Zen 2)",
            (Vendor::Intel, _) => "Intel",
            (Vendor::Unknown, _) => "Unknown",
        }
    }

    /// Family 19h and later always carry HSMP
    pub fn is_family_19h_or_later(&self) -> bool {
        self.vendor == Vendor::Amd && self.family >= 0x19
    }

    /// Reject processors without an HSMP mailbox
    ///
    /// Family 17h models 30h-3Fh (Rome) implement HSMP but with limited
    /// firmware support; they are accepted with a warning.
    pub fn check_supported(&self) -> Result<()> {
        if self.vendor != Vendor::Amd {
            return Err(HsmpError::Unsupported(format!(
                "{} processors do not implement HSMP",
                self.name()
            )));
        }

        if self.is_family_19h_or_later() {
            return Ok(());
        }

        if self.family == 0x17 && (0x30..=0x3F).contains(&self.model) {
            tracing::warn!(
                "HSMP support on Family 17h Model {:X}h is limited",
                self.model
            );
            return Ok(());
        }

        Err(HsmpError::Unsupported(format!(
            "AMD Family {:X}h Model {:X}h does not implement HSMP",
            self.family, self.model
        )))
    }
}
