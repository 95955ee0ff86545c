//! # usrp-source Library
//! Library for streaming complex baseband samples from a USRP radio
//! front end, with tuning and clock/time control.

pub mod convert;
pub mod device;
pub mod error;
mod source;
pub mod types;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use device::UsrpDevice;
use error::{ConfigError, Result, UsrpError};
use num_complex::Complex;
use source::UsrpSource as Source;

pub use types::{
    ClockConfig, ClockSource, MetaRange, PpsSource, SampleBlock, SubdevSpec, TimeSpec, TimeTag,
    TunePolicy, TuneRequest, TuneResult,
};

/// Samples per channel a caller typically passes to one `work` call.
pub const DEFAULT_BUF_LENGTH: usize = 16 * 1024;
pub const DEFAULT_NUM_CHANNELS: usize = 1;

/// Over-the-wire sample format requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit signed I and Q words
    Sc16,
    /// 32-bit float I and Q words
    Fc32,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::Sc16 => 4,
            SampleFormat::Fc32 => 8,
        }
    }
}

impl FromStr for SampleFormat {
    type Err = UsrpError;

    fn from_str(s: &str) -> Result<SampleFormat> {
        match s {
            "sc16" => Ok(SampleFormat::Sc16),
            "fc32" => Ok(SampleFormat::Fc32),
            other => Err(ConfigError::UnsupportedFormat(other.to_string()).into()),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SampleFormat::Sc16 => write!(f, "sc16"),
            SampleFormat::Fc32 => write!(f, "fc32"),
        }
    }
}

/// A streaming receive source. All methods take `&self`; the source
/// synchronizes internally, so a shared reference can tune from one thread
/// while another calls `work`. Concurrent `work` calls serialize rather
/// than interleave.
pub struct UsrpSource {
    src: Source,
}

impl UsrpSource {
    /// Open the device matching `addr` (a `key=value` list such as
    /// `"type=sim,channels=2"`) and prepare `num_channels` receive channels
    /// in `format`. Streaming begins on the first `work` call.
    pub fn open(addr: &str, format: SampleFormat, num_channels: usize) -> Result<UsrpSource> {
        Ok(UsrpSource { src: Source::open(addr, format, num_channels)? })
    }

    /// Like `open`, for an already constructed backend.
    pub fn from_device(
        dev: Arc<dyn UsrpDevice>,
        format: SampleFormat,
        num_channels: usize,
    ) -> Result<UsrpSource> {
        Ok(UsrpSource { src: Source::from_device(dev, format, num_channels)? })
    }

    pub fn num_channels(&self) -> usize {
        self.src.num_channels()
    }
    pub fn sample_format(&self) -> SampleFormat {
        self.src.sample_format()
    }
    pub fn set_subdev_spec(&self, markup: &str) -> Result<()> {
        self.src.set_subdev_spec(markup)
    }
    pub fn get_subdev_spec(&self) -> SubdevSpec {
        self.src.subdev_spec()
    }
    /// Tune `chan`. Accepts a bare frequency in Hz or a full `TuneRequest`;
    /// a bare `f` behaves exactly like `TuneRequest::new(f)`.
    pub fn set_center_freq<R>(&self, request: R, chan: usize) -> Result<TuneResult>
    where
        R: Into<TuneRequest>,
    {
        self.src.set_center_freq(request.into(), chan)
    }
    pub fn get_center_freq(&self, chan: usize) -> Result<f64> {
        self.src.get_center_freq(chan)
    }
    pub fn get_freq_range(&self, chan: usize) -> Result<MetaRange> {
        self.src.get_freq_range(chan)
    }
    pub fn set_gain(&self, gain: f64, chan: usize) -> Result<()> {
        self.src.set_gain(gain, chan)
    }
    pub fn get_gain(&self, chan: usize) -> Result<f64> {
        self.src.get_gain(chan)
    }
    pub fn get_gain_range(&self, chan: usize) -> Result<MetaRange> {
        self.src.get_gain_range(chan)
    }
    pub fn set_antenna(&self, name: &str, chan: usize) -> Result<()> {
        self.src.set_antenna(name, chan)
    }
    pub fn get_antenna(&self, chan: usize) -> Result<String> {
        self.src.get_antenna(chan)
    }
    pub fn get_antennas(&self, chan: usize) -> Result<Vec<String>> {
        self.src.get_antennas(chan)
    }
    pub fn set_bandwidth(&self, bw: f64, chan: usize) -> Result<()> {
        self.src.set_bandwidth(bw, chan)
    }
    pub fn get_bandwidth(&self, chan: usize) -> Result<f64> {
        self.src.get_bandwidth(chan)
    }
    pub fn set_clock_config(&self, config: ClockConfig) -> Result<()> {
        self.src.set_clock_config(config)
    }
    pub fn get_time_now(&self) -> TimeSpec {
        self.src.get_time_now()
    }
    pub fn set_time_now(&self, time: TimeSpec) -> Result<()> {
        self.src.set_time_now(time)
    }
    pub fn set_time_next_pps(&self, time: TimeSpec) -> Result<()> {
        self.src.set_time_next_pps(time)
    }
    pub fn set_start_time(&self, time: TimeSpec) {
        self.src.set_start_time(time)
    }
    pub fn set_samp_rate(&self, rate: f64) -> Result<()> {
        self.src.set_samp_rate(rate)
    }
    pub fn get_samp_rate(&self) -> f64 {
        self.src.get_samp_rate()
    }
    pub fn samples_produced(&self) -> u64 {
        self.src.samples_produced()
    }
    /// The backend driver, shared. Lets callers reach device-level state the
    /// source does not wrap.
    pub fn device(&self) -> Arc<dyn UsrpDevice> {
        self.src.device()
    }
    /// Fill `outputs` (one buffer per channel, each at least `requested`
    /// long) with up to `requested` samples per channel. Waits a bounded
    /// time when the device has nothing; an empty block is normal.
    pub fn work(
        &self,
        outputs: &mut [&mut [Complex<f32>]],
        requested: usize,
    ) -> Result<SampleBlock> {
        self.src.work(outputs, requested)
    }
    /// Stop streaming and join the reception thread. The next `work` call
    /// starts a fresh stream.
    pub fn stop(&self) -> Result<()> {
        self.src.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_format_parses_and_prints() {
        assert_eq!("sc16".parse::<SampleFormat>().unwrap(), SampleFormat::Sc16);
        assert_eq!("fc32".parse::<SampleFormat>().unwrap(), SampleFormat::Fc32);
        assert_eq!(SampleFormat::Sc16.to_string(), "sc16");
        assert_eq!(SampleFormat::Sc16.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::Fc32.bytes_per_sample(), 8);
        assert!("s8".parse::<SampleFormat>().is_err());
    }
}
