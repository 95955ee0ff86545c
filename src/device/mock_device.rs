//! Mock version of a UsrpDevice backend
use mockall::mock;

use std::time::Duration;

use crate::device::{RxChunk, UsrpDevice};
use crate::error::Result;
use crate::types::{
    ClockConfig, MetaRange, StreamCmd, SubdevSpec, TimeSpec, TuneRequest, TuneResult,
};
use crate::SampleFormat;

mock! {
    pub Device {}

    impl UsrpDevice for Device {
        fn name(&self) -> String;
        fn num_channels(&self) -> usize;
        fn supports_format(&self, format: SampleFormat) -> bool;
        fn set_subdev_spec(&self, spec: &SubdevSpec) -> Result<()>;
        fn subdev_spec(&self) -> SubdevSpec;
        fn set_samp_rate(&self, rate: f64) -> Result<f64>;
        fn samp_rate(&self) -> f64;
        fn set_center_freq(&self, request: &TuneRequest, chan: usize) -> Result<TuneResult>;
        fn center_freq(&self, chan: usize) -> Result<f64>;
        fn freq_range(&self, chan: usize) -> Result<MetaRange>;
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
        fn set_time_next_pps(&self, time: TimeSpec) -> Result<()>;
        fn start_stream(&self, cmd: &StreamCmd) -> Result<()>;
        fn stop_stream(&self) -> Result<()>;
        fn recv(&self, max_samples: usize, timeout: Duration) -> Result<RxChunk>;
    }
}
