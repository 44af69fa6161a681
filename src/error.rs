use std::{fmt, result};

use crate::DeliverySystem;

/// A result of a function that may return a `FrontendError`.
pub type Result<T> = result::Result<T, FrontendError>;

/// Chip-state preconditions that monitor and control functions check
/// before touching the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwStateError {
    /// The demodulator has not been started on any delivery system.
    NotActive,
    /// The operation needs a locked transport stream.
    NotLocked,
    /// The chip cannot do this for the given delivery system.
    Unsupported(DeliverySystem),
    /// The chip has no such function at all.
    NotSupported(&'static str),
    /// The chip did not clear a busy flag in time.
    Timeout(&'static str),
    /// A tuner's embedded controller reported busy or an error.
    TunerCpu { status: u8, error: u8 },
    BadChipId { expected: u8, found: u8 },
}

impl fmt::Display for HwStateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HwStateError::NotActive => write!(f, "demodulator is not active"),
            HwStateError::NotLocked => write!(f, "demodulator is not locked"),
            HwStateError::Unsupported(sys) => write!(f, "not supported for {:?}", sys),
            HwStateError::NotSupported(what) => write!(f, "{} is not supported", what),
            HwStateError::Timeout(what) => write!(f, "timed out waiting for {}", what),
            HwStateError::TunerCpu { status, error } => write!(
                f,
                "tuner CPU not ready (status {:#04x}, error {:#04x})",
                status, error
            ),
            HwStateError::BadChipId { expected, found } => write!(
                f,
                "unexpected chip id {:#04x} (expected {:#04x})",
                found, expected
            ),
        }
    }
}

// Macro to create an error enum with From converters for each input error class
macro_rules! define_errcodes {
    [ $typename:ident => $( $name:ident $(: $class:ty)? ),+ ] => {
        #[derive(Debug)]
        pub enum $typename {
            $(
                $name $( ($class) )?,
            )+
        }

        impl fmt::Display for $typename {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match *self {
                    $(
                        $typename::$name(ref err) => fmt::Display::fmt(err, f),
                    )+
                }
            }
        }

        impl std::error::Error for $typename {}

        $( $(
            impl From<$class> for $typename {
                fn from(e: $class) -> Self {
                    $typename::$name(e)
                }
            } )?
        )+
    };
}

define_errcodes![
    FrontendError =>
    Io: std::io::Error,
    Ioctl: nix::Error,
    HwState: HwStateError,
    FrontendErr: String
];

impl FrontendError {
    /// True for the "chip must be locked/active" family of errors, which
    /// callers polling a frontend usually treat as "no value yet".
    pub fn is_hw_state(&self) -> bool {
        matches!(self, FrontendError::HwState(_))
    }
}
