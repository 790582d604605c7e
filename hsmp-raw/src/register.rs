//! Generic register abstractions for type-safe mailbox word encoding

/// Trait for register layouts that can be converted to/from raw 32-bit words
///
/// SMN registers and HSMP mailbox argument/response slots are all 32 bits
/// wide. Layouts implementing this trait pack structured fields into such a
/// word and unpack them again.
///
/// # Example
///
/// ```ignore
/// use hsmp_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct BusControl {
///     bus: u8,
///     enable: bool,
/// }
///
/// impl RegisterLayout for BusControl {
///     fn to_reg_value(&self) -> u32 {
///         self.bus as u32 | ((self.enable as u32) << 8)
///     }
///
///     fn from_reg_value(value: u32) -> Self {
///         Self {
///             bus: (value & 0xFF) as u8,
///             enable: (value >> 8) & 1 != 0,
///         }
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this layout to a raw 32-bit word
    fn to_reg_value(&self) -> u32;

    /// Parse a raw 32-bit word into this layout
    fn from_reg_value(value: u32) -> Self;

    /// Validate that the field values fit their bit ranges
    ///
    /// Returns `Ok(())` if valid, or an error message if invalid.
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

/// A register in SMN space with a typed layout
///
/// # Example
///
/// ```ignore
/// use hsmp_raw::register::Register;
/// use hsmp_raw::current_arch::iohc::{self, NbBusNumCntl};
///
/// let mut reg: Register<NbBusNumCntl> = Register::with_address(iohc::smn::nb_bus_num_cntl(2));
/// reg.from_reg_value(raw);
/// println!("IOHC2 hosts bus 0x{:02X}", reg.layout.bus_base);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Register<T: RegisterLayout> {
    /// SMN address
    pub address: u32,
    /// Typed register layout
    pub layout: T,
}

impl<T: RegisterLayout> Register<T> {
    /// Create a register with default layout
    pub fn with_address(address: u32) -> Self
    where
        T: Default,
    {
        Self {
            address,
            layout: T::default(),
        }
    }

    /// Update the layout from a raw word
    pub fn from_reg_value(&mut self, value: u32) {
        self.layout = T::from_reg_value(value);
    }
}
