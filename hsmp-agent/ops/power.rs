use hsmp_raw::current_arch::mailbox::MessageId;

use crate::error::Result;
use crate::mailbox::Message;
use crate::session::Hsmp;

impl Hsmp {
    /// Average socket power in mW
    pub fn socket_power(&self, socket: usize) -> Result<u32> {
        self.read_word(socket, MessageId::GetSocketPower)
    }

    /// Set the socket power limit in mW
    ///
    /// The SMU clips the request to the platform's range; read the limit
    /// back to see what was applied.
    pub fn set_socket_power_limit(&self, socket: usize, limit_mw: u32) -> Result<()> {
        let msg = Message::new(MessageId::SetSocketPowerLimit).arg(limit_mw);
        self.call(socket, &msg)?;
        Ok(())
    }

    pub fn socket_power_limit(&self, socket: usize) -> Result<u32> {
        self.read_word(socket, MessageId::GetSocketPowerLimit)
    }

    /// Highest power limit the socket accepts, in mW
    pub fn socket_max_power_limit(&self, socket: usize) -> Result<u32> {
        self.read_word(socket, MessageId::GetSocketPowerLimitMax)
    }

    /// Whether the socket's PROC_HOT input is asserted
    pub fn proc_hot(&self, socket: usize) -> Result<bool> {
        Ok(self.read_word(socket, MessageId::GetProcHot)? != 0)
    }
}
