use hsmp_raw::current_arch::mailbox::MessageId;

use crate::error::Result;
use crate::mailbox::Message;
use crate::session::Hsmp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FabricClocks {
    pub fclk_mhz: u32,
    pub mclk_mhz: u32,
}

impl Hsmp {
    /// Current data fabric and memory clocks
    pub fn fabric_clocks(&self, socket: usize) -> Result<FabricClocks> {
        let msg = Message::new(MessageId::GetFclkMclk).response(2);
        let words = self.call(socket, &msg)?;
        Ok(FabricClocks {
            fclk_mhz: words[0],
            mclk_mhz: words[1],
        })
    }

    pub fn data_fabric_clock(&self, socket: usize) -> Result<u32> {
        Ok(self.fabric_clocks(socket)?.fclk_mhz)
    }

    pub fn memory_clock(&self, socket: usize) -> Result<u32> {
        Ok(self.fabric_clocks(socket)?.mclk_mhz)
    }

    /// Highest core clock the socket allows under its current limits
    pub fn core_clock_max_frequency(&self, socket: usize) -> Result<u32> {
        self.read_word(socket, MessageId::GetCclkThrottleLimit)
    }

    /// Share of time the socket's cores spent in C0, 0-100
    pub fn c0_residency(&self, socket: usize) -> Result<u32> {
        self.read_word(socket, MessageId::GetC0Percent)
    }
}
