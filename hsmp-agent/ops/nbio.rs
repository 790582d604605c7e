use hsmp_raw::current_arch::mailbox::{MessageId, NbioDpmArg};
use hsmp_raw::RegisterLayout;

use crate::error::{HsmpError, Result};
use crate::mailbox::Message;
use crate::session::Hsmp;

enum_with_data! {
    /// NBIO (PCIe interface) P-state as a (min, max) DPM level range
    pub enum NbioPstate: (u8, u8) {
        Auto => ("auto", (0, 2)),
        P0 => ("0", (2, 2)),
    }
    impl dpm_range -> (u8, u8)
}

impl Hsmp {
    /// Set the P-state of the root complex hosting `bus`
    pub fn set_nbio_pstate(&self, bus: u8, pstate: NbioPstate) -> Result<()> {
        let state = self.enter(Some(MessageId::SetNbioDpmLevel))?;
        let tile = state.topology.bus_to_tile(bus)?;

        let (dpm_min, dpm_max) = pstate.dpm_range();
        let arg = NbioDpmArg {
            tile_id: tile.id,
            dpm_max,
            dpm_min,
        };
        arg.validate().map_err(|e| HsmpError::InvalidArgument(e.to_string()))?;

        tracing::debug!(
            "NBIO P-state {} for bus 0x{:02X}: socket {} tile {}",
            pstate.name(),
            bus,
            tile.socket,
            tile.id
        );

        let msg = Message::new(MessageId::SetNbioDpmLevel).arg(arg.to_reg_value());
        self.send_message(&state, tile.socket, &msg)?;
        Ok(())
    }

    /// Bus cursor over the discovered root complexes
    ///
    /// Start at 0 and pass the returned index back in; a returned index of
    /// 0 means the bus just returned was the last one.
    pub fn next_bus(&self, index: usize) -> Result<(u8, usize)> {
        let state = self.enter(None)?;
        state.topology.next_bus(index)
    }

    /// Lowest bus of every root complex, in bus order
    pub fn buses(&self) -> Result<Vec<u8>> {
        let state = self.enter(None)?;
        Ok(state.topology.buses().collect())
    }
}
