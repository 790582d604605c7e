use hsmp_raw::current_arch::mailbox::{DdrBandwidth, MessageId};
use hsmp_raw::RegisterLayout;

use crate::error::Result;
use crate::session::Hsmp;

impl Hsmp {
    /// Theoretical maximum and utilised DDR bandwidth of a socket
    pub fn ddr_bandwidths(&self, socket: usize) -> Result<DdrBandwidth> {
        let word = self.read_word(socket, MessageId::GetDdrBandwidth)?;
        Ok(DdrBandwidth::from_reg_value(word))
    }

    /// GB/s
    pub fn ddr_max_bandwidth(&self, socket: usize) -> Result<u32> {
        Ok(self.ddr_bandwidths(socket)?.max_gbps)
    }

    /// GB/s
    pub fn ddr_utilized_bandwidth(&self, socket: usize) -> Result<u32> {
        Ok(self.ddr_bandwidths(socket)?.utilized_gbps)
    }

    pub fn ddr_utilized_percent(&self, socket: usize) -> Result<u32> {
        Ok(self.ddr_bandwidths(socket)?.utilized_pct)
    }
}
