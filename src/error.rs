use std::{fmt, result};

/// A result of a function that may return a `UsrpError`.
pub type Result<T> = result::Result<T, UsrpError>;

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
                        $typename::$name(ref err) => err.fmt(f),
                    )+
                }
            }
        }

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
    UsrpError =>
    Config : ConfigError,
    Hardware : HardwareError
];

/// Rejected configuration request. Raised synchronously by the offending
/// call and never retried; the previous device state is left in place.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Channel index at or past the number of channels the source streams.
    ChannelOutOfRange { chan: usize, num_channels: usize },
    /// Channel count of zero, or more channels than the device exposes.
    BadChannelCount { requested: usize, available: usize },
    /// Device address string did not parse or matched no known device type.
    BadDeviceAddr(String),
    /// Subdevice specification markup did not parse or names a missing slot.
    BadSubdevSpec(String),
    /// Antenna name the frontend does not provide.
    UnknownAntenna { name: String, available: Vec<String> },
    /// Sample format the device cannot produce.
    UnsupportedFormat(String),
    /// Non-finite or otherwise nonsensical numeric parameter.
    BadValue(String),
    /// Output buffers handed to `work` do not match the stream shape.
    BadWorkBuffers(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::ChannelOutOfRange { chan, num_channels } => {
                write!(f, "channel {} out of range (source has {})", chan, num_channels)
            }
            ConfigError::BadChannelCount { requested, available } => {
                write!(f, "cannot stream {} channels (device has {})", requested, available)
            }
            ConfigError::BadDeviceAddr(addr) => write!(f, "bad device address: {}", addr),
            ConfigError::BadSubdevSpec(spec) => write!(f, "bad subdevice spec: {}", spec),
            ConfigError::UnknownAntenna { name, available } => {
                write!(f, "unknown antenna {:?} (available: {})", name, available.join(", "))
            }
            ConfigError::UnsupportedFormat(fmt_name) => {
                write!(f, "unsupported sample format: {}", fmt_name)
            }
            ConfigError::BadValue(what) => write!(f, "bad value: {}", what),
            ConfigError::BadWorkBuffers(why) => write!(f, "bad work buffers: {}", why),
        }
    }
}

/// Hardware I/O failure surfaced from the streaming path. Recoverable by the
/// caller (retry or tear the graph down); a single transient failure is
/// logged and becomes a discontinuity instead.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareError {
    /// Transport-level receive or command failure.
    Transport(String),
    /// Device went away underneath us.
    Disconnected,
    /// Reception gave up after repeated consecutive failures; the stream
    /// must be stopped and restarted.
    StreamLost(String),
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HardwareError::Transport(why) => write!(f, "transport error: {}", why),
            HardwareError::Disconnected => write!(f, "device disconnected"),
            HardwareError::StreamLost(why) => write!(f, "stream lost: {}", why),
        }
    }
}
