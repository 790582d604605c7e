//! Process-wide HSMP session
//!
//! Every operation enters through [`Hsmp::enter`]: privilege check, disabled
//! check, lazy initialisation and the interface version gate. The discovered
//! state is immutable once published and is shared through an `Arc`, so
//! readers never hold the lock across a transaction.

use std::sync::Arc;

use hsmp_raw::current_arch::mailbox::MessageId;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use crate::capability::{self, Capabilities};
use crate::common::{CpuTable, ProcessorInfo};
use crate::config::HsmpConfig;
use crate::error::{ErrorKind, HsmpError, Result};
use crate::mailbox::{Mailbox, Message};
use crate::platform::{LinuxPlatform, Platform};
use crate::topology::Topology;

/// Everything learned during initialisation
#[derive(Debug)]
pub struct State {
    pub processor: ProcessorInfo,
    pub topology: Topology,
    pub cpus: CpuTable,
    pub capabilities: Capabilities,
}

pub struct Hsmp {
    platform: Box<dyn Platform>,
    config: HsmpConfig,
    mailbox: Mailbox,
    init_lock: Mutex<()>,
    state: RwLock<Option<Arc<State>>>,
}

static INSTANCE: Lazy<Hsmp> = Lazy::new(|| {
    let config = HsmpConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("{}, using default configuration", e);
        HsmpConfig::default()
    });
    Hsmp::new(Box::new(LinuxPlatform::new(config.clone())), config)
});

impl Hsmp {
    pub fn new(platform: Box<dyn Platform>, config: HsmpConfig) -> Self {
        let mailbox = Mailbox::new(&config);
        Self {
            platform,
            config,
            mailbox,
            init_lock: Mutex::new(()),
            state: RwLock::new(None),
        }
    }

    /// Shared session over the running system
    pub fn instance() -> &'static Hsmp {
        &INSTANCE
    }

    pub fn config(&self) -> &HsmpConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    /// Whether the SMU stopped answering; survives [`Hsmp::teardown`]
    pub fn is_disabled(&self) -> bool {
        self.mailbox.is_disabled()
    }

    /// Gate an operation and hand out the initialised state
    ///
    /// `msg` is the message the operation is about to send; `None` skips
    /// the version gate for operations that only consult the topology.
    pub fn enter(&self, msg: Option<MessageId>) -> Result<Arc<State>> {
        if !self.platform.is_privileged() {
            return Err(HsmpError::PermissionDenied(
                "HSMP access requires root".to_string(),
            ));
        }

        if self.mailbox.is_disabled() {
            return Err(HsmpError::Unsupported("HSMP is disabled".to_string()));
        }

        let state = self.state()?;

        if let Some(msg) = msg {
            state.capabilities.check(msg)?;
        }

        Ok(state)
    }

    fn state(&self) -> Result<Arc<State>> {
        if let Some(state) = self.state.read().as_ref() {
            return Ok(Arc::clone(state));
        }

        let _init = self.init_lock.lock();

        // Another thread may have finished while we waited
        if let Some(state) = self.state.read().as_ref() {
            return Ok(Arc::clone(state));
        }

        let state = Arc::new(self.initialize()?);
        *self.state.write() = Some(Arc::clone(&state));
        Ok(state)
    }

    fn initialize(&self) -> Result<State> {
        let processor = self.platform.processor();
        processor.check_supported()?;
        tracing::info!("Initializing HSMP on {}", processor.name());

        let topology = Topology::discover(self.platform.pci_devices()?)?;
        let cpus = self.platform.cpu_table()?;

        let capabilities = match capability::probe(&self.mailbox, &topology) {
            Ok(caps) => caps,
            // Only an answer from the SMU says anything about HSMP itself;
            // OS-level failures leave discovery to be retried
            Err(e) => match e.kind() {
                ErrorKind::Unsupported | ErrorKind::Hardware | ErrorKind::Timeout => {
                    tracing::warn!("HSMP probe failed: {}", e);
                    self.mailbox.disable();
                    return Err(e);
                }
                _ => {
                    tracing::warn!("HSMP probe could not run, will retry: {}", e);
                    return Err(e);
                }
            },
        };

        tracing::info!(
            "HSMP ready: {} socket(s), {} IOHC tiles, {} CPUs",
            topology.socket_count(),
            topology.tiles().len(),
            cpus.len()
        );

        Ok(State {
            processor,
            topology,
            cpus,
            capabilities,
        })
    }

    /// Send `msg` to `socket`'s mailbox
    pub fn send_message(&self, state: &State, socket: usize, msg: &Message) -> Result<Vec<u32>> {
        let tile = state.topology.socket_tile(socket)?;
        tracing::debug!("{} -> socket {}", msg.id.name(), socket);
        self.mailbox
            .send(tile.device(), msg, state.capabilities.max_message())
    }

    /// Gate `msg`, then send it to `socket`
    pub fn call(&self, socket: usize, msg: &Message) -> Result<Vec<u32>> {
        let state = self.enter(Some(msg.id))?;
        self.send_message(&state, socket, msg)
    }

    /// Drop the discovered state; the next operation discovers again
    pub fn teardown(&self) {
        let _init = self.init_lock.lock();
        if self.state.write().take().is_some() {
            tracing::debug!("HSMP state released");
        }
    }
}
