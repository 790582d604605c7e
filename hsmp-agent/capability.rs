//! Mailbox probing and interface version negotiation

use hsmp_raw::current_arch::mailbox::{
    max_message_for_version, MessageId, SmuFwVersion, MAX_INTERFACE_VERSION,
};
use hsmp_raw::RegisterLayout;

use crate::error::{HsmpError, Result};
use crate::mailbox::{Mailbox, Message};
use crate::topology::Topology;

/// Argument of the probe's TEST message; the SMU answers with it plus one
const TEST_ARG: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub firmware: SmuFwVersion,
    /// Version reported by the firmware
    pub interface_version: u32,
    /// Version the allow-list is computed from, never above what this
    /// crate knows
    pub supported_version: u32,
}

impl Capabilities {
    pub fn new(firmware: SmuFwVersion, interface_version: u32) -> Self {
        Self {
            firmware,
            interface_version,
            supported_version: interface_version.min(MAX_INTERFACE_VERSION),
        }
    }

    pub fn max_message(&self) -> Option<MessageId> {
        max_message_for_version(self.supported_version)
    }

    pub fn allows(&self, msg: MessageId) -> bool {
        self.max_message().is_some_and(|max| msg <= max)
    }

    /// Reject `msg` if the negotiated version does not cover it
    pub fn check(&self, msg: MessageId) -> Result<()> {
        if self.allows(msg) {
            return Ok(());
        }
        Err(HsmpError::VersionMismatch {
            message: msg.name(),
            required: msg.min_interface_version(),
            negotiated: self.interface_version,
        })
    }
}

/// Verify every socket's mailbox and read the versions from the first
///
/// A socket that fails the TEST round trip makes HSMP unusable as a whole.
pub fn probe(mailbox: &Mailbox, topology: &Topology) -> Result<Capabilities> {
    let test = Message::new(MessageId::Test).arg(TEST_ARG).response(1);
    let mut versions = None;

    for socket in 0..topology.socket_count() {
        let tile = topology.socket_tile(socket)?;

        let response = mailbox.send(tile.device(), &test, None)?;
        if response[0] != TEST_ARG + 1 {
            return Err(HsmpError::Unsupported(format!(
                "HSMP test failed on socket {socket}, expected {}, received {}",
                TEST_ARG + 1,
                response[0]
            )));
        }

        if versions.is_none() {
            let fw = mailbox.send(
                tile.device(),
                &Message::new(MessageId::GetSmuVersion).response(1),
                None,
            )?;
            let proto = mailbox.send(
                tile.device(),
                &Message::new(MessageId::GetInterfaceVersion).response(1),
                None,
            )?;
            versions = Some((SmuFwVersion::from_reg_value(fw[0]), proto[0]));
        }
    }

    let (firmware, interface_version) = versions
        .ok_or_else(|| HsmpError::Topology("no socket to probe".to_string()))?;

    if interface_version == 0 {
        return Err(HsmpError::Unsupported(
            "firmware reports HSMP interface version 0".to_string(),
        ));
    }

    let caps = Capabilities::new(firmware, interface_version);
    tracing::info!(
        "SMU firmware {}, HSMP interface version {} (using {})",
        caps.firmware,
        caps.interface_version,
        caps.supported_version
    );
    if interface_version > MAX_INTERFACE_VERSION {
        tracing::info!(
            "Messages above interface version {} are not used",
            MAX_INTERFACE_VERSION
        );
    }

    Ok(caps)
}
