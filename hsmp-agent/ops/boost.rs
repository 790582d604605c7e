use hsmp_raw::current_arch::mailbox::{BoostLimitArg, MessageId};
use hsmp_raw::RegisterLayout;

use crate::error::{HsmpError, Result};
use crate::mailbox::Message;
use crate::session::Hsmp;

/// Boost limits travel in a 16-bit field; 0xFFFF lifts the HSMP limit
fn saturate_mhz(limit_mhz: u32) -> u16 {
    u16::try_from(limit_mhz).unwrap_or(u16::MAX)
}

fn apic_id(cpu: usize, apic_id: u32) -> Result<u16> {
    u16::try_from(apic_id).map_err(|_| {
        HsmpError::InvalidArgument(format!(
            "CPU {cpu} has APIC ID 0x{apic_id:X}, which does not fit the boost limit argument"
        ))
    })
}

impl Hsmp {
    pub fn set_cpu_boost_limit(&self, cpu: usize, limit_mhz: u32) -> Result<()> {
        let state = self.enter(Some(MessageId::SetBoostLimit))?;
        let entry = state.cpus.lookup(cpu)?;

        let arg = BoostLimitArg {
            apic_id: apic_id(cpu, entry.apic_id)?,
            limit_mhz: saturate_mhz(limit_mhz),
        };
        let msg = Message::new(MessageId::SetBoostLimit).arg(arg.to_reg_value());
        self.send_message(&state, entry.socket, &msg)?;
        Ok(())
    }

    pub fn set_socket_boost_limit(&self, socket: usize, limit_mhz: u32) -> Result<()> {
        let msg = Message::new(MessageId::SetBoostLimitSocket)
            .arg(saturate_mhz(limit_mhz) as u32);
        self.call(socket, &msg)?;
        Ok(())
    }

    /// Apply a boost limit to every socket, stopping at the first failure
    pub fn set_system_boost_limit(&self, limit_mhz: u32) -> Result<()> {
        let state = self.enter(Some(MessageId::SetBoostLimitSocket))?;
        let msg = Message::new(MessageId::SetBoostLimitSocket)
            .arg(saturate_mhz(limit_mhz) as u32);
        self.broadcast(&state, &msg)
    }

    /// Effective boost limit of one CPU in MHz
    pub fn cpu_boost_limit(&self, cpu: usize) -> Result<u32> {
        let state = self.enter(Some(MessageId::GetBoostLimit))?;
        let entry = state.cpus.lookup(cpu)?;

        let msg = Message::new(MessageId::GetBoostLimit)
            .arg(apic_id(cpu, entry.apic_id)? as u32)
            .response(1);
        let words = self.send_message(&state, entry.socket, &msg)?;
        Ok(words[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{apic_id as fake_apic, fake_hsmp};

    #[test]
    fn test_saturation() {
        assert_eq!(saturate_mhz(3500), 3500);
        assert_eq!(saturate_mhz(0xFFFF), 0xFFFF);
        assert_eq!(saturate_mhz(100_000), 0xFFFF);
    }

    #[test]
    fn test_cpu_boost_limit_targets_owning_socket() {
        let (hsmp, platform) = fake_hsmp("ops-boost-cpu", 2, 3);

        // CPU 5 is core 1 of socket 1
        hsmp.set_cpu_boost_limit(5, 3000).unwrap();
        assert_eq!(hsmp.cpu_boost_limit(5).unwrap(), 3000);

        let fw = platform.socket(1).firmware();
        let (id, args) = &fw.log[1];
        assert_eq!(*id, 8);
        assert_eq!(args[0], (fake_apic(1, 1) << 16) | 3000);
        assert_eq!(fw.boost[&fake_apic(1, 1)], 3000);
    }

    #[test]
    fn test_unknown_cpu_is_rejected_before_sending() {
        let (hsmp, platform) = fake_hsmp("ops-boost-unknown", 1, 3);
        hsmp.enter(None).unwrap();
        let before = platform.transactions();

        assert!(matches!(
            hsmp.set_cpu_boost_limit(64, 3000),
            Err(HsmpError::InvalidArgument(_))
        ));
        assert!(matches!(
            hsmp.cpu_boost_limit(64),
            Err(HsmpError::InvalidArgument(_))
        ));
        assert_eq!(platform.transactions(), before);
    }

    #[test]
    fn test_socket_boost_limit_saturates() {
        let (hsmp, platform) = fake_hsmp("ops-boost-socket", 1, 3);

        hsmp.set_socket_boost_limit(0, 1_000_000).unwrap();
        assert_eq!(hsmp.cpu_boost_limit(2).unwrap(), 0xFFFF);
        assert!(platform
            .socket(0)
            .firmware()
            .log
            .iter()
            .any(|(id, args)| *id == 9 && args[0] == 0xFFFF));
    }

    #[test]
    fn test_system_boost_limit_covers_all_sockets() {
        let (hsmp, _platform) = fake_hsmp("ops-boost-system", 2, 3);

        hsmp.set_system_boost_limit(2800).unwrap();
        assert_eq!(hsmp.cpu_boost_limit(0).unwrap(), 2800);
        assert_eq!(hsmp.cpu_boost_limit(7).unwrap(), 2800);
    }

    #[test]
    fn test_system_boost_limit_stops_at_first_failure() {
        let (hsmp, platform) = fake_hsmp("ops-boost-fanout", 2, 3);
        hsmp.enter(None).unwrap();
        platform.socket(0).firmware().fixed_status = Some(0xFF);

        let err = hsmp.set_system_boost_limit(2800).unwrap_err();
        assert!(matches!(err, HsmpError::Hardware { status: 0xFF }));

        // Socket 1 never saw the message
        assert_eq!(platform.socket(1).firmware().sent(), vec![1]);
    }
}
