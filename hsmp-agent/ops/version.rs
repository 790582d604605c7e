use hsmp_raw::current_arch::mailbox::{MessageId, SmuFwVersion};

use crate::error::Result;
use crate::session::Hsmp;

impl Hsmp {
    /// SMU firmware version, as read during initialisation
    pub fn smu_fw_version(&self) -> Result<SmuFwVersion> {
        let state = self.enter(Some(MessageId::GetSmuVersion))?;
        Ok(state.capabilities.firmware)
    }

    /// HSMP interface version reported by the firmware
    pub fn interface_version(&self) -> Result<u32> {
        let state = self.enter(Some(MessageId::GetInterfaceVersion))?;
        Ok(state.capabilities.interface_version)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::fake_hsmp;

    #[test]
    fn test_versions_come_from_the_probe() {
        let (hsmp, platform) = fake_hsmp("ops-version", 2, 2);

        assert_eq!(hsmp.smu_fw_version().unwrap().to_string(), "46.74.0");
        assert_eq!(hsmp.interface_version().unwrap(), 2);

        // No transaction beyond the probe itself
        assert_eq!(platform.transactions(), 4);
    }
}
