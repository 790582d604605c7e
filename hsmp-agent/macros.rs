//! Declarative macros for the small closed enums used across the crate

/// Define a metric enum with automatic `name()` and `all()` implementations
///
/// # Example
/// ```
/// use hsmp::metric_enum;
///
/// metric_enum! {
///     pub enum ClockMetric {
///         Fabric => "fclk_mhz",
///         Memory => "mclk_mhz",
///     }
/// }
///
/// let metric = ClockMetric::Fabric;
/// assert_eq!(metric.name(), "fclk_mhz");
/// assert_eq!(ClockMetric::all().len(), 2);
/// ```
#[macro_export]
macro_rules! metric_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $str:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }
    };
}

/// Define an enum with `name()`, `from_name()` and `all()`, plus custom data
/// per variant
///
/// # Example
/// ```
/// use hsmp::enum_with_data;
///
/// enum_with_data! {
///     pub enum LinkWidth: u8 {
///         X2 => ("x2", 0),
///         X16 => ("x16", 2),
///     }
///     impl class -> u8
/// }
///
/// assert_eq!(LinkWidth::X16.class(), 2);
/// assert_eq!(LinkWidth::from_name("x2"), Some(LinkWidth::X2));
/// assert_eq!(LinkWidth::from_name("x4"), None);
/// ```
#[macro_export]
macro_rules! enum_with_data {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $data_type:ty {
            $($variant:ident => ($str:literal, $data:expr)),* $(,)?
        }
        impl $method:ident -> $return_type:ty
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($str => Some($name::$variant),)*
                    _ => None,
                }
            }

            pub fn $method(&self) -> $return_type {
                match self {
                    $($name::$variant => $data,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }
    };
}
