use hsmp_raw::current_arch::mailbox::{MessageId, XgmiWidthArg};
use hsmp_raw::RegisterLayout;

use crate::common::ProcessorInfo;
use crate::error::{HsmpError, Result};
use crate::mailbox::Message;
use crate::session::Hsmp;

enum_with_data! {
    /// xGMI link width class
    pub enum XgmiWidth: u8 {
        X2 => ("x2", 0),
        X8 => ("x8", 1),
        X16 => ("x16", 2),
    }
    impl class -> u8
}

impl PartialOrd for XgmiWidth {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XgmiWidth {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.class().cmp(&other.class())
    }
}

/// Narrowest width the link may drop to: x2 from Family 19h, x8 before
pub fn min_xgmi_width(processor: &ProcessorInfo) -> XgmiWidth {
    if processor.is_family_19h_or_later() {
        XgmiWidth::X2
    } else {
        XgmiWidth::X8
    }
}

impl Hsmp {
    /// Bound the dynamic xGMI link width on every socket
    pub fn set_xgmi_width(&self, min: XgmiWidth, max: XgmiWidth) -> Result<()> {
        let arg = XgmiWidthArg {
            min: min.class(),
            max: max.class(),
        };
        arg.validate().map_err(|e| {
            HsmpError::InvalidArgument(format!("xGMI {}..{}: {}", min.name(), max.name(), e))
        })?;

        let state = self.enter(Some(MessageId::SetXgmiLinkWidth))?;

        let floor = min_xgmi_width(&state.processor);
        if min < floor {
            return Err(HsmpError::InvalidArgument(format!(
                "xGMI width {} is below the {} minimum of this processor",
                min.name(),
                floor.name()
            )));
        }

        let msg = Message::new(MessageId::SetXgmiLinkWidth).arg(arg.to_reg_value());
        self.broadcast(&state, &msg)
    }

    /// Let the link width float over the full range the processor allows
    pub fn set_xgmi_auto(&self) -> Result<()> {
        let state = self.enter(Some(MessageId::SetXgmiLinkWidth))?;
        self.set_xgmi_width(min_xgmi_width(&state.processor), XgmiWidth::X16)
    }
}
