pub mod constants;
pub use constants::*;
pub mod sim;
#[cfg(test)]
pub mod mock_device;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::error::{ConfigError, Result};
use crate::types::{
    ClockConfig, MetaRange, StreamCmd, SubdevSpec, TimeSpec, TuneRequest, TuneResult,
};
use crate::SampleFormat;

#[cfg(test)]
mod device_test;

/// Parsed device address: a comma-separated `key=value` list such as
/// `"type=sim,channels=2"`. An empty string selects the first device found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAddr {
    pairs: Vec<(String, String)>,
}

impl DeviceAddr {
    pub fn parse(addr: &str) -> Result<DeviceAddr> {
        let mut pairs = Vec::new();
        for token in addr.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    pairs.push((key.trim().to_string(), value.trim().to_string()));
                }
                _ => {
                    return Err(ConfigError::BadDeviceAddr(format!(
                        "expected key=value, got {:?}",
                        token
                    ))
                    .into())
                }
            }
        }
        Ok(DeviceAddr { pairs })
    }

    /// Last value set for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parse the value for `key`, falling back to `default` when absent.
    /// An unparsable value is a configuration error.
    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::BadDeviceAddr(format!("bad value for {}: {:?}", key, raw)).into()
            }),
        }
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let joined: Vec<String> = self.pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", joined.join(","))
    }
}

/// One transfer out of the device: wire bytes per channel plus the stream
/// metadata the tag bookkeeping runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct RxChunk {
    /// Raw sample words, one buffer per streamed channel, all the same length.
    pub data: Vec<Vec<u8>>,
    /// Complex samples per channel encoded in `data`.
    pub samples: usize,
    /// Device time of the first sample in this chunk.
    pub time: TimeSpec,
    /// The device dropped samples before this chunk.
    pub overflow: bool,
}

impl RxChunk {
    /// An empty transfer (bounded wait elapsed without data).
    pub fn empty(channels: usize, time: TimeSpec) -> RxChunk {
        RxChunk { data: vec![Vec::new(); channels], samples: 0, time, overflow: false }
    }
}

/// The capability set a radio frontend must provide: tuning, time
/// synchronization, and streaming. Implementations synchronize internally;
/// every method takes `&self` so the handle can be shared with the
/// reception thread.
///
/// The simulated backend ships in-tree; hardware drivers implement this
/// trait out of tree and are handed in via `UsrpSource::from_device`.
pub trait UsrpDevice: Send + Sync {
    /// Human-readable identification for logs.
    fn name(&self) -> String;
    fn num_channels(&self) -> usize;
    fn supports_format(&self, format: SampleFormat) -> bool;

    /// Rebind channels to frontend slots. Ranges queried before this call
    /// are stale afterwards.
    fn set_subdev_spec(&self, spec: &SubdevSpec) -> Result<()>;
    fn subdev_spec(&self) -> SubdevSpec;

    /// Returns the rate actually configured, snapped to the device's grid.
    fn set_samp_rate(&self, rate: f64) -> Result<f64>;
    fn samp_rate(&self) -> f64;

    fn set_center_freq(&self, request: &TuneRequest, chan: usize) -> Result<TuneResult>;
    fn center_freq(&self, chan: usize) -> Result<f64>;
    fn freq_range(&self, chan: usize) -> Result<MetaRange>;

    /// Returns the gain actually applied after clamping and step snapping.
    fn set_gain(&self, gain: f64, chan: usize) -> Result<f64>;
    fn gain(&self, chan: usize) -> Result<f64>;
    fn gain_range(&self, chan: usize) -> Result<MetaRange>;

    fn set_antenna(&self, name: &str, chan: usize) -> Result<()>;
    fn antenna(&self, chan: usize) -> Result<String>;
    fn antennas(&self, chan: usize) -> Result<Vec<String>>;

    fn set_bandwidth(&self, bw: f64, chan: usize) -> Result<()>;
    fn bandwidth(&self, chan: usize) -> Result<f64>;

    fn set_clock_config(&self, config: &ClockConfig) -> Result<()>;
    fn time_now(&self) -> TimeSpec;
    fn set_time_now(&self, time: TimeSpec) -> Result<()>;
    /// Arm `time` to load into the time register at the next PPS edge.
    fn set_time_next_pps(&self, time: TimeSpec) -> Result<()>;

    fn start_stream(&self, cmd: &StreamCmd) -> Result<()>;
    fn stop_stream(&self) -> Result<()>;
    /// Wait up to `timeout` for samples; an elapsed wait yields an empty
    /// chunk, not an error.
    fn recv(&self, max_samples: usize, timeout: Duration) -> Result<RxChunk>;
}

impl fmt::Debug for dyn UsrpDevice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UsrpDevice({})", self.name())
    }
}

/// Find and open the device matching `addr`.
pub fn open(addr: &DeviceAddr) -> Result<Arc<dyn UsrpDevice>> {
    match addr.get("type") {
        None | Some("sim") => {
            let dev = sim::SimUsrp::open(addr)?;
            info!("Opened device: {}", dev.name());
            Ok(Arc::new(dev))
        }
        Some(other) => {
            Err(ConfigError::BadDeviceAddr(format!("no device of type {:?}", other)).into())
        }
    }
}
