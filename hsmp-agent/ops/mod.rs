//! Typed HSMP operations
//!
//! Each operation validates its inputs, gates on the message it sends,
//! encodes the arguments, runs the transaction and decodes the response.
//! All of them are methods on [`Hsmp`].

mod boost;
mod clocks;
mod ddr;
mod nbio;
mod power;
mod pstate;
mod version;
mod xgmi;

pub use clocks::FabricClocks;
pub use nbio::NbioPstate;
pub use pstate::DfPstate;
pub use xgmi::{min_xgmi_width, XgmiWidth};

use hsmp_raw::current_arch::mailbox::MessageId;

use crate::error::Result;
use crate::mailbox::Message;
use crate::session::{Hsmp, State};

impl Hsmp {
    /// Send a message without arguments and return its single response word
    fn read_word(&self, socket: usize, id: MessageId) -> Result<u32> {
        let words = self.call(socket, &Message::new(id).response(1))?;
        Ok(words[0])
    }

    /// Send `msg` to every socket in order, stopping at the first failure
    fn broadcast(&self, state: &State, msg: &Message) -> Result<()> {
        for socket in 0..state.topology.socket_count() {
            self.send_message(state, socket, msg)?;
        }
        Ok(())
    }
}
