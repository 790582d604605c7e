use std::io;

use hsmp_raw::current_arch::mailbox::status;
use hsmp_raw::ConfigSpaceError;
use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HsmpError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("HSMP not supported: {0}")]
    Unsupported(String),

    #[error("{message} requires HSMP interface version {required}, firmware provides {negotiated}")]
    VersionMismatch {
        message: &'static str,
        required: u32,
        negotiated: u32,
    },

    #[error("{message} is not implemented by this SMU firmware")]
    FirmwareRejected { message: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Topology discovery failed: {0}")]
    Topology(String),

    #[error("SMU did not answer {message} after {polls} polls, HSMP is disabled")]
    Timeout { message: &'static str, polls: u32 },

    #[error("HSMP status 0x{status:02X}")]
    Hardware { status: u32 },

    #[error("PCI operation failed: {0}")]
    PciError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error(transparent)]
    ConfigSpace(#[from] ConfigSpaceError),
}

pub type Result<T> = std::result::Result<T, HsmpError>;

/// Failure classes callers react to differently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Permission,
    Unsupported,
    VersionMismatch,
    InvalidArgument,
    Device,
    Timeout,
    Hardware,
}

/// Discriminated error code: a status word from the SMU or an OS errno
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Hardware(u32),
    Os(Errno),
}

impl HsmpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HsmpError::PermissionDenied(_) => ErrorKind::Permission,
            HsmpError::Unsupported(_) | HsmpError::FirmwareRejected { .. } => {
                ErrorKind::Unsupported
            }
            HsmpError::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            HsmpError::InvalidArgument(_) | HsmpError::ConfigError(_) => {
                ErrorKind::InvalidArgument
            }
            HsmpError::Timeout { .. } => ErrorKind::Timeout,
            HsmpError::Hardware { .. } => ErrorKind::Hardware,
            HsmpError::IoError(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                ErrorKind::Permission
            }
            HsmpError::NixError(Errno::EPERM | Errno::EACCES) => ErrorKind::Permission,
            HsmpError::Topology(_)
            | HsmpError::PciError(_)
            | HsmpError::ParseError(_)
            | HsmpError::IoError(_)
            | HsmpError::NixError(_)
            | HsmpError::PrometheusError(_)
            | HsmpError::ConfigSpace(_) => ErrorKind::Device,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            HsmpError::Hardware { status } => ErrorCode::Hardware(*status),
            HsmpError::PermissionDenied(_) => ErrorCode::Os(Errno::EPERM),
            HsmpError::Unsupported(_)
            | HsmpError::VersionMismatch { .. }
            | HsmpError::FirmwareRejected { .. }
            | HsmpError::Timeout { .. } => ErrorCode::Os(Errno::ENOTSUP),
            HsmpError::InvalidArgument(_)
            | HsmpError::ConfigError(_)
            | HsmpError::ParseError(_) => ErrorCode::Os(Errno::EINVAL),
            HsmpError::Topology(_) => ErrorCode::Os(Errno::ENODEV),
            HsmpError::NixError(errno) => ErrorCode::Os(*errno),
            HsmpError::IoError(e) => {
                ErrorCode::Os(e.raw_os_error().map_or(Errno::EIO, Errno::from_i32))
            }
            HsmpError::ConfigSpace(e) => ErrorCode::Os(config_space_errno(e)),
            HsmpError::PciError(_) | HsmpError::PrometheusError(_) => ErrorCode::Os(Errno::EIO),
        }
    }

    /// Remediation line for front ends
    pub fn hint(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Permission => "HSMP access requires root, re-run with sudo",
            ErrorKind::Unsupported => {
                "HSMP is not supported on this system or is disabled in the BIOS settings"
            }
            ErrorKind::VersionMismatch => {
                "the SMU firmware interface is too old for this operation, a BIOS update may add it"
            }
            ErrorKind::InvalidArgument => "check the socket, CPU, bus and value arguments",
            ErrorKind::Device => "the HSMP root complex devices could not be accessed",
            ErrorKind::Timeout => {
                "the SMU stopped answering, HSMP is likely disabled in the BIOS settings"
            }
            ErrorKind::Hardware => "the SMU firmware rejected the request",
        }
    }
}

fn config_space_errno(err: &ConfigSpaceError) -> Errno {
    let source = match err {
        ConfigSpaceError::OpenFailed { source, .. }
        | ConfigSpaceError::ReadFailed { source, .. }
        | ConfigSpaceError::WriteFailed { source, .. }
        | ConfigSpaceError::SeekFailed { source, .. } => source,
    };
    source.raw_os_error().map_or(Errno::EIO, Errno::from_i32)
}

/// Human readable text for a hardware status word or an OS errno
///
/// Hardware codes are only consulted when the discriminator says the SMU
/// produced the failure.
pub fn strerror(code: ErrorCode) -> String {
    match code {
        ErrorCode::Hardware(0) => "Success".to_string(),
        ErrorCode::Hardware(status::INVALID_MSG_ID) => "Invalid HSMP message ID".to_string(),
        ErrorCode::Hardware(status::INVALID_ARG) => "Invalid HSMP argument".to_string(),
        ErrorCode::Hardware(_) => "Unknown error".to_string(),
        ErrorCode::Os(errno) => errno.desc().to_string(),
    }
}
