use hsmp_raw::current_arch::mailbox::MessageId;

use crate::error::Result;
use crate::mailbox::Message;
use crate::session::Hsmp;

enum_with_data! {
    /// Data fabric P-state, P0 being the fastest
    pub enum DfPstate: Option<u32> {
        P0 => ("0", Some(0)),
        P1 => ("1", Some(1)),
        P2 => ("2", Some(2)),
        P3 => ("3", Some(3)),
        Auto => ("auto", None),
    }
    impl level -> Option<u32>
}

impl Hsmp {
    /// Pin the socket's data fabric P-state, or hand it back to the SMU
    pub fn set_data_fabric_pstate(&self, socket: usize, pstate: DfPstate) -> Result<()> {
        // AUTO_DF_PSTATE is the higher of the two IDs, so gate on it
        let state = self.enter(Some(MessageId::AutoDfPstate))?;

        let msg = match pstate.level() {
            Some(level) => Message::new(MessageId::SetDfPstate).arg(level),
            None => Message::new(MessageId::AutoDfPstate),
        };
        self.send_message(&state, socket, &msg)?;
        Ok(())
    }
}
