//! In-memory IOHC tiles and SMU firmware for unit tests
//!
//! Each simulated socket owns one SMN register file shared by its four
//! tiles. Writing the mailbox message ID register runs the firmware model
//! synchronously, so the first status poll already sees the answer unless
//! the socket is told to stall.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hsmp_raw::current_arch::iohc::{self, pci, IOHC_DEVICE_ID, PCI_VENDOR_ID_AMD};
use hsmp_raw::current_arch::mailbox::{max_message_for_version, smn, status, MAX_ARGS};
use parking_lot::Mutex;

use crate::common::{CpuEntry, CpuTable, PciAddress, PciDevice, ProcessorInfo, Vendor};
use crate::config::HsmpConfig;
use crate::error::{HsmpError, Result};
use crate::platform::Platform;
use crate::session::Hsmp;
use crate::smn::ConfigSpace;

/// Mutable firmware state and behaviour switches of one socket
#[derive(Debug, Clone)]
pub(crate) struct Firmware {
    pub interface_version: u32,
    pub smu_version: u32,
    /// Never leave NOT_READY
    pub stall: bool,
    /// Message IDs answered with INVALID_MSG_ID
    pub rejected: Vec<u32>,
    /// Answer every message with this status
    pub fixed_status: Option<u32>,

    pub socket_power: u32,
    pub power_limit: u32,
    pub max_power_limit: u32,
    pub boost: HashMap<u32, u32>,
    pub proc_hot: u32,
    pub xgmi: Option<u32>,
    pub df_pstate: Option<u32>,
    pub fclk: u32,
    pub mclk: u32,
    pub cclk_limit: u32,
    pub c0_percent: u32,
    pub nbio: HashMap<u32, (u32, u32)>,
    pub ddr: u32,

    /// (message ID, argument words) of every triggered message
    pub log: Vec<(u32, Vec<u32>)>,
    pub status_reads: u32,
}

impl Firmware {
    fn new(interface_version: u32) -> Self {
        Self {
            interface_version,
            smu_version: 0x002E_4A00,
            stall: false,
            rejected: Vec::new(),
            fixed_status: None,
            socket_power: 95_000,
            power_limit: 200_000,
            max_power_limit: 225_000,
            boost: HashMap::new(),
            proc_hot: 0,
            xgmi: None,
            df_pstate: None,
            fclk: 1467,
            mclk: 1600,
            cclk_limit: 3500,
            c0_percent: 42,
            nbio: HashMap::new(),
            // 204 GB/s max, 51 GB/s used, 25 %
            ddr: (204 << 20) | (51 << 8) | 25,
            log: Vec::new(),
            status_reads: 0,
        }
    }

    /// Message IDs sent so far, in order
    pub fn sent(&self) -> Vec<u32> {
        self.log.iter().map(|(id, _)| *id).collect()
    }

    fn execute(&mut self, id: u32, args: &[u32]) -> std::result::Result<Vec<u32>, u32> {
        // TEST and the two version queries exist in every firmware
        let known = id <= 3
            || max_message_for_version(self.interface_version).is_some_and(|max| id <= max.id());
        if !known || self.rejected.contains(&id) {
            return Err(status::INVALID_MSG_ID);
        }

        let arg = args[0];
        let response = match id {
            1 => vec![arg.wrapping_add(1)],
            2 => vec![self.smu_version],
            3 => vec![self.interface_version],
            4 => vec![self.socket_power],
            5 => {
                self.power_limit = arg.min(self.max_power_limit);
                vec![]
            }
            6 => vec![self.power_limit],
            7 => vec![self.max_power_limit],
            8 => {
                let apic = arg >> 16;
                match self.boost.get_mut(&apic) {
                    Some(limit) => *limit = arg & 0xFFFF,
                    None => return Err(status::INVALID_ARG),
                }
                vec![]
            }
            9 => {
                for limit in self.boost.values_mut() {
                    *limit = arg & 0xFFFF;
                }
                vec![]
            }
            10 => match self.boost.get(&arg) {
                Some(limit) => vec![*limit],
                None => return Err(status::INVALID_ARG),
            },
            11 => vec![self.proc_hot],
            12 => {
                let (min, max) = ((arg >> 8) & 0xFF, arg & 0xFF);
                if min > max || max > 2 {
                    return Err(status::INVALID_ARG);
                }
                self.xgmi = Some(arg);
                vec![]
            }
            13 => {
                if arg > 3 {
                    return Err(status::INVALID_ARG);
                }
                self.df_pstate = Some(arg);
                vec![]
            }
            14 => {
                self.df_pstate = None;
                vec![]
            }
            15 => vec![self.fclk, self.mclk],
            16 => vec![self.cclk_limit],
            17 => vec![self.c0_percent],
            18 => {
                let tile = (arg >> 16) & 0xFF;
                let (max, min) = ((arg >> 8) & 0xFF, arg & 0xFF);
                if tile as usize >= iohc::TILES_PER_SOCKET || min > max {
                    return Err(status::INVALID_ARG);
                }
                self.nbio.insert(tile, (max, min));
                vec![]
            }
            20 => vec![self.ddr],
            _ => return Err(status::INVALID_MSG_ID),
        };

        Ok(response)
    }
}

#[derive(Debug)]
struct SocketState {
    regs: HashMap<u32, u32>,
    firmware: Firmware,
}

/// One simulated socket: the SMN space behind its tiles
#[derive(Debug)]
pub(crate) struct FakeSocket {
    state: Mutex<SocketState>,
}

impl FakeSocket {
    /// `bases[t]` is the bus base reported by IOHCMISC`t`
    pub fn new(bases: [u8; 4], interface_version: u32) -> Arc<Self> {
        let regs = bases
            .iter()
            .enumerate()
            .map(|(t, base)| (iohc::smn::nb_bus_num_cntl(t), *base as u32))
            .collect();

        Arc::new(Self {
            state: Mutex::new(SocketState {
                regs,
                firmware: Firmware::new(interface_version),
            }),
        })
    }

    pub fn firmware(&self) -> parking_lot::MappedMutexGuard<'_, Firmware> {
        parking_lot::MutexGuard::map(self.state.lock(), |s| &mut s.firmware)
    }

    pub fn set_reg(&self, address: u32, value: u32) {
        self.state.lock().regs.insert(address, value);
    }

    fn read(&self, address: u32) -> u32 {
        let mut state = self.state.lock();
        if address == smn::MBOX_STATUS {
            state.firmware.status_reads += 1;
        }
        state.regs.get(&address).copied().unwrap_or(0)
    }

    fn write(&self, address: u32, value: u32) {
        let mut state = self.state.lock();
        state.regs.insert(address, value);

        if address != smn::MBOX_MSG_ID {
            return;
        }

        let args: Vec<u32> = (0..MAX_ARGS)
            .map(|i| state.regs.get(&smn::data(i)).copied().unwrap_or(0))
            .collect();
        state.firmware.log.push((value, args.clone()));

        if state.firmware.stall {
            return;
        }

        let result = match state.firmware.fixed_status {
            Some(fixed) => Err(fixed),
            None => state.firmware.execute(value, &args),
        };

        match result {
            Ok(words) => {
                for (i, word) in words.into_iter().enumerate() {
                    state.regs.insert(smn::data(i), word);
                }
                state.regs.insert(smn::MBOX_STATUS, status::OK);
            }
            Err(code) => {
                state.regs.insert(smn::MBOX_STATUS, code);
            }
        }
    }
}

/// Config space of one simulated IOHC tile
pub(crate) struct FakeIohc {
    socket: Arc<FakeSocket>,
    smn_index: Mutex<u32>,
    hsmp_index: Mutex<u32>,
    broken: AtomicBool,
}

impl FakeIohc {
    pub fn new(socket: Arc<FakeSocket>) -> Self {
        Self {
            socket,
            smn_index: Mutex::new(0),
            hsmp_index: Mutex::new(0),
            broken: AtomicBool::new(false),
        }
    }

    /// Fail every access from now on, like a removed device
    pub fn break_device(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(HsmpError::PciError("device removed".into()));
        }
        Ok(())
    }
}

impl ConfigSpace for FakeIohc {
    fn read32(&self, offset: u32) -> Result<u32> {
        self.check()?;
        Ok(match offset {
            0 => ((IOHC_DEVICE_ID as u32) << 16) | PCI_VENDOR_ID_AMD as u32,
            pci::SMN_DATA => self.socket.read(*self.smn_index.lock()),
            pci::HSMP_DATA => self.socket.read(*self.hsmp_index.lock()),
            pci::SMN_INDEX => *self.smn_index.lock(),
            pci::HSMP_INDEX => *self.hsmp_index.lock(),
            _ => 0,
        })
    }

    fn write32(&self, offset: u32, value: u32) -> Result<()> {
        self.check()?;
        match offset {
            pci::SMN_INDEX => *self.smn_index.lock() = value,
            pci::HSMP_INDEX => *self.hsmp_index.lock() = value,
            pci::SMN_DATA => self.socket.write(*self.smn_index.lock(), value),
            pci::HSMP_DATA => self.socket.write(*self.hsmp_index.lock(), value),
            _ => {}
        }
        Ok(())
    }
}

/// IOHC devices for `socket`, one per bus base, enumerated in `bases` order
pub(crate) fn fake_devices(socket: &Arc<FakeSocket>, bases: &[u8]) -> Vec<PciDevice> {
    bases
        .iter()
        .map(|bus| PciDevice {
            address: PciAddress {
                domain: 0,
                bus: *bus,
                device: 0,
                function: 0,
            },
            vendor_id: PCI_VENDOR_ID_AMD,
            device_id: IOHC_DEVICE_ID,
            config: Arc::new(FakeIohc::new(Arc::clone(socket))),
        })
        .collect()
}

/// CPUs per simulated socket
pub(crate) const CPUS_PER_SOCKET: usize = 4;

pub(crate) fn apic_id(socket: usize, core: usize) -> u32 {
    (socket * 0x80 + core * 2) as u32
}

pub(crate) struct FakePlatform {
    pub privileged: AtomicBool,
    pub processor: Mutex<ProcessorInfo>,
    pub sockets: Vec<Arc<FakeSocket>>,
    devices: Vec<PciDevice>,
    cpus: CpuTable,
    pub scans: AtomicUsize,
}

impl FakePlatform {
    /// `sockets` sockets of four tiles each, bus bases `0x80*s + 0x20*t`
    ///
    /// Devices are enumerated in reverse bus order and socket `s` has CPUs
    /// `4s..4s+3`.
    pub fn new(sockets: usize, interface_version: u32) -> Arc<Self> {
        let mut all_sockets = Vec::new();
        let mut devices = Vec::new();
        let mut cpus = CpuTable::default();

        for s in 0..sockets {
            let bases: [u8; 4] = std::array::from_fn(|t| (s * 0x80 + t * 0x20) as u8);
            let socket = FakeSocket::new(bases, interface_version);

            for core in 0..CPUS_PER_SOCKET {
                let apic = apic_id(s, core);
                socket.firmware().boost.insert(apic, 3500);
                cpus.insert(
                    s * CPUS_PER_SOCKET + core,
                    CpuEntry {
                        socket: s,
                        apic_id: apic,
                    },
                );
            }

            devices.extend(fake_devices(&socket, &bases));
            all_sockets.push(socket);
        }
        devices.reverse();

        Arc::new(Self {
            privileged: AtomicBool::new(true),
            processor: Mutex::new(ProcessorInfo {
                vendor: Vendor::Amd,
                family: 0x19,
                model: 0x01,
                stepping: 1,
            }),
            sockets: all_sockets,
            devices,
            cpus,
            scans: AtomicUsize::new(0),
        })
    }

    pub fn socket(&self, index: usize) -> &Arc<FakeSocket> {
        &self.sockets[index]
    }

    /// Messages sent to every socket so far
    pub fn transactions(&self) -> usize {
        self.sockets.iter().map(|s| s.firmware().log.len()).sum()
    }
}

impl Platform for Arc<FakePlatform> {
    fn is_privileged(&self) -> bool {
        self.privileged.load(Ordering::SeqCst)
    }

    fn processor(&self) -> ProcessorInfo {
        *self.processor.lock()
    }

    fn pci_devices(&self) -> Result<Vec<PciDevice>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.clone())
    }

    fn cpu_table(&self) -> Result<CpuTable> {
        Ok(self.cpus.clone())
    }
}

/// Fast-failing configuration with a per-test lock file
pub(crate) fn test_config(name: &str) -> HsmpConfig {
    HsmpConfig {
        lock_path: std::env::temp_dir().join(format!(
            "hsmp-test-{}-{}.lock",
            name,
            std::process::id()
        )),
        mailbox_polls: 5,
        poll_interval: Duration::ZERO,
        ..HsmpConfig::default()
    }
}

pub(crate) fn fake_hsmp(name: &str, sockets: usize, interface_version: u32) -> (Hsmp, Arc<FakePlatform>) {
    let platform = FakePlatform::new(sockets, interface_version);
    let hsmp = Hsmp::new(Box::new(Arc::clone(&platform)), test_config(name));
    (hsmp, platform)
}

