//! HSMP mailbox transaction engine
//!
//! One transaction: clear status, write arguments, write the message ID,
//! poll status, read the response. The whole exchange runs under the
//! cross-process lock because the mailbox has a single set of registers
//! per socket.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hsmp_raw::current_arch::mailbox::{smn, status, MessageId, MAX_ARGS};

use crate::common::LockGuard;
use crate::config::HsmpConfig;
use crate::error::{HsmpError, Result};
use crate::smn::{hsmp_read, hsmp_write, ConfigSpace};

/// A request: message ID, argument words and the number of response words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub args: Vec<u32>,
    pub response_len: usize,
}

impl Message {
    pub fn new(id: MessageId) -> Self {
        Self {
            id,
            args: Vec::new(),
            response_len: 0,
        }
    }

    pub fn arg(mut self, word: u32) -> Self {
        self.args.push(word);
        self
    }

    pub fn response(mut self, words: usize) -> Self {
        self.response_len = words;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.args.len() > MAX_ARGS || self.response_len > MAX_ARGS {
            return Err(HsmpError::InvalidArgument(format!(
                "{} carries {} arguments and {} response words, at most {} each",
                self.id.name(),
                self.args.len(),
                self.response_len,
                MAX_ARGS
            )));
        }
        Ok(())
    }
}

pub struct Mailbox {
    lock_path: PathBuf,
    polls: u32,
    interval: Duration,
    timeout: Duration,
    /// Set once the SMU stops answering; never cleared
    disabled: AtomicBool,
}

impl Mailbox {
    pub fn new(config: &HsmpConfig) -> Self {
        Self {
            lock_path: config.lock_path.clone(),
            polls: config.mailbox_polls,
            interval: config.poll_interval,
            timeout: config.mailbox_timeout(),
            disabled: AtomicBool::new(false),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn disable(&self) {
        if !self.disabled.swap(true, Ordering::AcqRel) {
            tracing::warn!("HSMP disabled for the lifetime of this process");
        }
    }

    /// Run one transaction against the mailbox behind `dev`
    ///
    /// `allowed` is the highest message the negotiated interface version
    /// permits, if negotiation has happened. An INVALID_MSG_ID answer to a
    /// message below it means the firmware lacks a message its version
    /// promises.
    pub fn send(
        &self,
        dev: &dyn ConfigSpace,
        msg: &Message,
        allowed: Option<MessageId>,
    ) -> Result<Vec<u32>> {
        msg.validate()?;

        if self.is_disabled() {
            return Err(HsmpError::Unsupported("HSMP is disabled".to_string()));
        }

        let _lock = LockGuard::acquire(&self.lock_path)?;

        tracing::debug!(
            "Sending {} (ID {}) args {:08X?}",
            msg.id.name(),
            msg.id.id(),
            msg.args
        );

        hsmp_write(dev, smn::MBOX_STATUS, status::NOT_READY)?;
        for (i, arg) in msg.args.iter().enumerate() {
            hsmp_write(dev, smn::data(i), *arg)?;
        }
        hsmp_write(dev, smn::MBOX_MSG_ID, msg.id.id())?;

        let mut mbox_status = status::NOT_READY;
        let mut polls = 0;
        while polls < self.polls {
            std::thread::sleep(self.interval);
            polls += 1;
            mbox_status = hsmp_read(dev, smn::MBOX_STATUS)?;
            if mbox_status != status::NOT_READY {
                break;
            }
        }

        // There is no status for "HSMP disabled", the SMU just never answers
        if mbox_status == status::NOT_READY {
            tracing::warn!(
                "SMU timeout for {} after {} polls ({:?}), HSMP is not enabled",
                msg.id.name(),
                polls,
                self.timeout
            );
            self.disable();
            return Err(HsmpError::Timeout {
                message: msg.id.name(),
                polls,
            });
        }

        tracing::debug!(
            "{} answered with status 0x{:02X} after {} polls",
            msg.id.name(),
            mbox_status,
            polls
        );

        if mbox_status == status::INVALID_MSG_ID && allowed.is_some_and(|max| msg.id <= max) {
            tracing::warn!(
                "{} is covered by the interface version but rejected by the firmware",
                msg.id.name()
            );
            return Err(HsmpError::FirmwareRejected {
                message: msg.id.name(),
            });
        }

        if mbox_status != status::OK {
            return Err(HsmpError::Hardware {
                status: mbox_status,
            });
        }

        (0..msg.response_len)
            .map(|i| hsmp_read(dev, smn::data(i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, FakeIohc, FakeSocket};
    use std::sync::Arc;

    fn setup(name: &str, version: u32) -> (Mailbox, Arc<FakeSocket>, FakeIohc) {
        let socket = FakeSocket::new([0x00, 0x20, 0x40, 0x60], version);
        let dev = FakeIohc::new(Arc::clone(&socket));
        (Mailbox::new(&test_config(name)), socket, dev)
    }

    #[test]
    fn test_round_trip() {
        let (mailbox, socket, dev) = setup("mbox-round-trip", 3);
        let msg = Message::new(MessageId::Test).arg(41).response(1);
        assert_eq!(mailbox.send(&dev, &msg, None).unwrap(), vec![42]);

        let fw = socket.firmware();
        assert_eq!(fw.log.len(), 1);
        assert_eq!(fw.log[0].0, 1);
        assert_eq!(fw.log[0].1[0], 41);
        assert_eq!(fw.status_reads, 1);
    }

    #[test]
    fn test_two_word_response() {
        let (mailbox, _socket, dev) = setup("mbox-two-words", 3);
        let msg = Message::new(MessageId::GetFclkMclk).response(2);
        assert_eq!(mailbox.send(&dev, &msg, None).unwrap(), vec![1467, 1600]);
    }

    #[test]
    fn test_timeout_disables_mailbox() {
        let (mailbox, socket, dev) = setup("mbox-timeout", 3);
        socket.firmware().stall = true;

        let msg = Message::new(MessageId::GetSocketPower).response(1);
        let err = mailbox.send(&dev, &msg, None).unwrap_err();
        assert!(matches!(err, HsmpError::Timeout { polls: 5, .. }));
        assert_eq!(socket.firmware().status_reads, 5);
        assert!(mailbox.is_disabled());

        // Fails fast without touching the hardware again
        let err = mailbox.send(&dev, &msg, None).unwrap_err();
        assert!(matches!(err, HsmpError::Unsupported(_)));
        assert_eq!(socket.firmware().status_reads, 5);
        assert_eq!(socket.firmware().log.len(), 1);
    }

    #[test]
    fn test_firmware_rejection_within_version() {
        let (mailbox, socket, dev) = setup("mbox-reject", 3);
        socket.firmware().rejected.push(MessageId::GetProcHot.id());

        let msg = Message::new(MessageId::GetProcHot).response(1);
        let err = mailbox
            .send(&dev, &msg, Some(MessageId::GetDdrBandwidth))
            .unwrap_err();
        assert!(matches!(
            err,
            HsmpError::FirmwareRejected {
                message: "GET_PROC_HOT"
            }
        ));

        // Without a negotiated version the raw status is reported
        let err = mailbox.send(&dev, &msg, None).unwrap_err();
        assert!(matches!(err, HsmpError::Hardware { status: 0xFE }));
        assert!(!mailbox.is_disabled());
    }

    #[test]
    fn test_hardware_status_is_surfaced() {
        let (mailbox, socket, dev) = setup("mbox-status", 3);
        socket.firmware().fixed_status = Some(0x42);

        let msg = Message::new(MessageId::GetSocketPower).response(1);
        let err = mailbox.send(&dev, &msg, None).unwrap_err();
        assert!(matches!(err, HsmpError::Hardware { status: 0x42 }));
    }

    #[test]
    fn test_too_many_words() {
        let (mailbox, socket, dev) = setup("mbox-too-many", 3);
        let mut msg = Message::new(MessageId::Test).response(1);
        msg.args = vec![0; MAX_ARGS + 1];
        assert!(matches!(
            mailbox.send(&dev, &msg, None),
            Err(HsmpError::InvalidArgument(_))
        ));
        assert!(socket.firmware().log.is_empty());
    }

    #[test]
    fn test_device_failure_propagates() {
        let (mailbox, _socket, dev) = setup("mbox-broken", 3);
        dev.break_device();
        let msg = Message::new(MessageId::Test).arg(1).response(1);
        assert!(matches!(
            mailbox.send(&dev, &msg, None),
            Err(HsmpError::PciError(_))
        ));
        assert!(!mailbox.is_disabled());
    }
}
