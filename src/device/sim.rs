//! Simulated radio front end.
//!
//! Paces a synthesized tone against the wall clock, quantizes tuning the way
//! real synthesizers do (LO step grid, gain steps, decimation-derived sample
//! rates), and models the free-running time register including PPS-edge
//! latching. Selected by device address `type=sim` (or an empty address).
//!
//! Address options: `channels=`, `master_clock=`, `pps_period_ms=`, `fifo=`
//! (device buffer depth in samples; shrink it to provoke overflows).

use std::f64::consts::TAU;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use num_complex::Complex;

use crate::convert;
use crate::device::constants::SlotCaps;
use crate::device::{
    DeviceAddr, RxChunk, UsrpDevice, DECIM_MAX, DECIM_MIN, DEFAULT_FREQ, DEFAULT_PPS_PERIOD,
    DEFAULT_RATE, MASTER_CLOCK, SIM_SLOTS,
};
use crate::error::{ConfigError, HardwareError, Result};
use crate::types::{
    ClockConfig, MetaRange, StreamCmd, SubdevSpec, TimeSpec, TunePolicy, TuneRequest, TuneResult,
};
use crate::SampleFormat;

/// Baseband offset of the synthesized tone.
const TONE_OFFSET: f64 = 100e3;
const TONE_AMPLITUDE: f64 = 0.5;
const DEFAULT_FIFO_SAMPLES: u64 = 1 << 18;

fn dur_to_spec(d: Duration) -> TimeSpec {
    TimeSpec::new(d.as_secs() as i64, d.subsec_nanos() as f64 * 1e-9)
}

/// Nearest rate on the integer-decimation grid below `master_clock`.
fn snap_decimation(master_clock: f64, rate: f64) -> f64 {
    let decim = (master_clock / rate).round().clamp(DECIM_MIN as f64, DECIM_MAX as f64);
    master_clock / decim
}

struct ChanState {
    slot: &'static SlotCaps,
    rf_freq: f64,
    dsp_freq: f64,
    gain: f64,
    antenna: String,
    bandwidth: f64,
}

impl ChanState {
    fn bind(slot: &'static SlotCaps) -> ChanState {
        ChanState {
            slot,
            rf_freq: MetaRange::new(slot.freq_min, slot.freq_max, slot.lo_step)
                .clip(DEFAULT_FREQ),
            dsp_freq: 0.0,
            gain: slot.gain_min,
            antenna: slot.antennas[0].to_string(),
            bandwidth: 0.0,
        }
    }
}

/// The free-running time register: device time is `base` plus wall time
/// elapsed since `epoch`, until a pending PPS latch rewrites the mapping.
struct ClockModel {
    epoch: Instant,
    base: TimeSpec,
    /// Value to load and the wall instant of the PPS edge it loads at.
    armed: Option<(TimeSpec, Instant)>,
}

impl ClockModel {
    fn commit_latch(&mut self) {
        if let Some((t, edge)) = self.armed {
            if Instant::now() >= edge {
                self.base = t;
                self.epoch = edge;
                self.armed = None;
            }
        }
    }

    /// Device time at `wall` under the mapping valid at that instant.
    fn time_at(&self, wall: Instant) -> TimeSpec {
        if let Some((t, edge)) = self.armed {
            if wall >= edge {
                return t + dur_to_spec(wall.duration_since(edge));
            }
        }
        match wall.checked_duration_since(self.epoch) {
            Some(d) => self.base + dur_to_spec(d),
            None => self.base - dur_to_spec(self.epoch.duration_since(wall)),
        }
    }
}

struct SimStream {
    cmd: StreamCmd,
    /// Wall instant of the sample at `anchor_produced`.
    anchor_wall: Instant,
    anchor_produced: u64,
    /// Samples synthesized or dropped since the stream began.
    produced: u64,
    /// Tone phase accumulator, radians.
    phase: f64,
    /// An overflow happened; flag the next delivered chunk.
    overflow_pending: bool,
}

struct SimState {
    chans: Vec<ChanState>,
    rate: f64,
    clock_config: ClockConfig,
    clock: ClockModel,
    stream: Option<SimStream>,
}

pub struct SimUsrp {
    state: Mutex<SimState>,
    channels: usize,
    master_clock: f64,
    fifo_samples: u64,
    pps_period: Duration,
    /// PPS edges fall on this instant plus whole periods.
    pps_origin: Instant,
}

impl SimUsrp {
    pub fn open(addr: &DeviceAddr) -> Result<SimUsrp> {
        let channels: usize = addr.get_parsed("channels", 2)?;
        if channels == 0 || channels > SIM_SLOTS.len() {
            return Err(ConfigError::BadDeviceAddr(format!(
                "channels must be 1..={}, got {}",
                SIM_SLOTS.len(),
                channels
            ))
            .into());
        }
        let master_clock: f64 = addr.get_parsed("master_clock", MASTER_CLOCK)?;
        if !master_clock.is_finite() || master_clock <= 0.0 {
            return Err(ConfigError::BadDeviceAddr(format!(
                "master_clock must be positive, got {}",
                master_clock
            ))
            .into());
        }
        let pps_ms: u64 = addr.get_parsed("pps_period_ms", DEFAULT_PPS_PERIOD.as_millis() as u64)?;
        if pps_ms == 0 {
            return Err(ConfigError::BadDeviceAddr("pps_period_ms must be nonzero".into()).into());
        }
        let fifo_samples: u64 = addr.get_parsed("fifo", DEFAULT_FIFO_SAMPLES)?;

        let now = Instant::now();
        let chans = (0..channels).map(|i| ChanState::bind(&SIM_SLOTS[i])).collect();
        Ok(SimUsrp {
            state: Mutex::new(SimState {
                chans,
                rate: snap_decimation(master_clock, DEFAULT_RATE),
                clock_config: ClockConfig::default(),
                clock: ClockModel { epoch: now, base: TimeSpec::ZERO, armed: None },
                stream: None,
            }),
            channels,
            master_clock,
            fifo_samples: fifo_samples.max(1),
            pps_period: Duration::from_millis(pps_ms),
            pps_origin: now,
        })
    }

    fn check_chan(&self, chan: usize) -> Result<()> {
        if chan >= self.channels {
            return Err(ConfigError::ChannelOutOfRange {
                chan,
                num_channels: self.channels,
            }
            .into());
        }
        Ok(())
    }

    /// Synthesize `count` tone samples and encode them for every streamed
    /// channel.
    fn synthesize(stream: &mut SimStream, rate: f64, count: usize) -> Vec<Vec<u8>> {
        let step = TAU * TONE_OFFSET / rate;
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            samples.push(Complex::new(
                (TONE_AMPLITUDE * stream.phase.cos()) as f32,
                (TONE_AMPLITUDE * stream.phase.sin()) as f32,
            ));
            stream.phase = (stream.phase + step) % TAU;
        }
        let mut bytes = Vec::with_capacity(count * stream.cmd.format.bytes_per_sample());
        convert::complex_to_wire(stream.cmd.format, &samples, &mut bytes);
        vec![bytes; stream.cmd.channels]
    }
}

impl UsrpDevice for SimUsrp {
    fn name(&self) -> String {
        format!("simulated USRP, {} channel(s)", self.channels)
    }

    fn num_channels(&self) -> usize {
        self.channels
    }

    fn supports_format(&self, _format: SampleFormat) -> bool {
        true
    }

    fn set_subdev_spec(&self, spec: &SubdevSpec) -> Result<()> {
        if spec.len() != self.channels {
            return Err(ConfigError::BadSubdevSpec(format!(
                "spec names {} slots, device streams {} channels",
                spec.len(),
                self.channels
            ))
            .into());
        }
        let mut slots = Vec::with_capacity(spec.len());
        for name in spec.slots() {
            match SIM_SLOTS.iter().find(|caps| caps.slot == *name) {
                Some(caps) => slots.push(caps),
                None => {
                    return Err(ConfigError::BadSubdevSpec(format!("no slot {:?}", name)).into())
                }
            }
        }
        let mut st = self.state.lock().unwrap();
        for (chan, slot) in st.chans.iter_mut().zip(slots) {
            *chan = ChanState::bind(slot);
        }
        info!("Subdevice spec set to {}", spec);
        Ok(())
    }

    fn subdev_spec(&self) -> SubdevSpec {
        let st = self.state.lock().unwrap();
        SubdevSpec::from_slots(st.chans.iter().map(|c| c.slot.slot.to_string()))
    }

    fn set_samp_rate(&self, rate: f64) -> Result<f64> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::BadValue(format!("sample rate {}", rate)).into());
        }
        let actual = snap_decimation(self.master_clock, rate);
        let mut st = self.state.lock().unwrap();
        st.rate = actual;
        // keep pacing continuous across the rate switch
        if let Some(stream) = st.stream.as_mut() {
            stream.anchor_wall = Instant::now();
            stream.anchor_produced = stream.produced;
        }
        if (actual - rate).abs() > 1.0 {
            warn!("Sample rate {} not achievable, using {}", rate, actual);
        }
        Ok(actual)
    }

    fn samp_rate(&self) -> f64 {
        self.state.lock().unwrap().rate
    }

    fn set_center_freq(&self, request: &TuneRequest, chan: usize) -> Result<TuneResult> {
        self.check_chan(chan)?;
        let mut st = self.state.lock().unwrap();
        let rate = st.rate;
        let ch = &mut st.chans[chan];

        let target_rf = match request.rf {
            TunePolicy::Auto => request.target_freq,
            TunePolicy::Manual(f) => f,
            TunePolicy::None => ch.rf_freq,
        };
        let lo_grid = MetaRange::new(ch.slot.freq_min, ch.slot.freq_max, ch.slot.lo_step);
        let actual_rf = lo_grid.clip(target_rf);

        let target_dsp = match request.dsp {
            TunePolicy::Auto => actual_rf - request.target_freq,
            TunePolicy::Manual(f) => f,
            TunePolicy::None => ch.dsp_freq,
        };
        // the DSP shift is continuously tunable within the passband
        let actual_dsp = target_dsp.clamp(-rate / 2.0, rate / 2.0);

        ch.rf_freq = actual_rf;
        ch.dsp_freq = actual_dsp;
        Ok(TuneResult {
            target_rf_freq: target_rf,
            actual_rf_freq: actual_rf,
            target_dsp_freq: target_dsp,
            actual_dsp_freq: actual_dsp,
        })
    }

    fn center_freq(&self, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        let st = self.state.lock().unwrap();
        let ch = &st.chans[chan];
        Ok(ch.rf_freq - ch.dsp_freq)
    }

    fn freq_range(&self, chan: usize) -> Result<MetaRange> {
        self.check_chan(chan)?;
        let st = self.state.lock().unwrap();
        let slot = st.chans[chan].slot;
        Ok(MetaRange::new(slot.freq_min, slot.freq_max, slot.lo_step))
    }

    fn set_gain(&self, gain: f64, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        let mut st = self.state.lock().unwrap();
        let ch = &mut st.chans[chan];
        let range = MetaRange::new(ch.slot.gain_min, ch.slot.gain_max, ch.slot.gain_step);
        ch.gain = range.clip(gain);
        Ok(ch.gain)
    }

    fn gain(&self, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        Ok(self.state.lock().unwrap().chans[chan].gain)
    }

    fn gain_range(&self, chan: usize) -> Result<MetaRange> {
        self.check_chan(chan)?;
        let st = self.state.lock().unwrap();
        let slot = st.chans[chan].slot;
        Ok(MetaRange::new(slot.gain_min, slot.gain_max, slot.gain_step))
    }

    fn set_antenna(&self, name: &str, chan: usize) -> Result<()> {
        self.check_chan(chan)?;
        let mut st = self.state.lock().unwrap();
        let ch = &mut st.chans[chan];
        if !ch.slot.antennas.contains(&name) {
            return Err(ConfigError::UnknownAntenna {
                name: name.to_string(),
                available: ch.slot.antennas.iter().map(|a| a.to_string()).collect(),
            }
            .into());
        }
        ch.antenna = name.to_string();
        Ok(())
    }

    fn antenna(&self, chan: usize) -> Result<String> {
        self.check_chan(chan)?;
        Ok(self.state.lock().unwrap().chans[chan].antenna.clone())
    }

    fn antennas(&self, chan: usize) -> Result<Vec<String>> {
        self.check_chan(chan)?;
        let st = self.state.lock().unwrap();
        Ok(st.chans[chan].slot.antennas.iter().map(|a| a.to_string()).collect())
    }

    fn set_bandwidth(&self, bw: f64, chan: usize) -> Result<()> {
        self.check_chan(chan)?;
        self.state.lock().unwrap().chans[chan].bandwidth = bw;
        Ok(())
    }

    fn bandwidth(&self, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        Ok(self.state.lock().unwrap().chans[chan].bandwidth)
    }

    fn set_clock_config(&self, config: &ClockConfig) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.clock_config = *config;
        info!("Clock configured: {:?}", config);
        Ok(())
    }

    fn time_now(&self) -> TimeSpec {
        let mut st = self.state.lock().unwrap();
        st.clock.commit_latch();
        st.clock.time_at(Instant::now())
    }

    fn set_time_now(&self, time: TimeSpec) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.clock.epoch = Instant::now();
        st.clock.base = time;
        st.clock.armed = None;
        Ok(())
    }

    fn set_time_next_pps(&self, time: TimeSpec) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.clock.commit_latch();
        let period = self.pps_period.as_nanos();
        let periods = self.pps_origin.elapsed().as_nanos() / period + 1;
        let edge = self.pps_origin + Duration::from_nanos((periods * period) as u64);
        st.clock.armed = Some((time, edge));
        Ok(())
    }

    fn start_stream(&self, cmd: &StreamCmd) -> Result<()> {
        if cmd.channels == 0 || cmd.channels > self.channels {
            return Err(ConfigError::BadChannelCount {
                requested: cmd.channels,
                available: self.channels,
            }
            .into());
        }
        let mut st = self.state.lock().unwrap();
        st.clock.commit_latch();
        let now = Instant::now();
        let anchor_wall = match cmd.start_time {
            Some(start) => {
                let lead = (start - st.clock.time_at(now)).real_secs();
                if lead > 0.0 {
                    now + Duration::from_secs_f64(lead)
                } else {
                    now
                }
            }
            None => now,
        };
        st.stream = Some(SimStream {
            cmd: *cmd,
            anchor_wall,
            anchor_produced: 0,
            produced: 0,
            phase: 0.0,
            overflow_pending: false,
        });
        Ok(())
    }

    fn stop_stream(&self) -> Result<()> {
        self.state.lock().unwrap().stream = None;
        Ok(())
    }

    fn recv(&self, max_samples: usize, timeout: Duration) -> Result<RxChunk> {
        let deadline = Instant::now() + timeout;
        let max_samples = max_samples.max(1);
        loop {
            let wait = {
                let mut st = self.state.lock().unwrap();
                let SimState { clock, stream, rate, .. } = &mut *st;
                clock.commit_latch();
                let rate = *rate;
                let now = Instant::now();
                let stream = match stream.as_mut() {
                    Some(s) => s,
                    None => {
                        return Err(HardwareError::Transport("stream not started".into()).into())
                    }
                };

                let since_anchor = stream.produced - stream.anchor_produced;
                let generated = match now.checked_duration_since(stream.anchor_wall) {
                    Some(d) => (d.as_secs_f64() * rate) as u64,
                    None => 0,
                };
                let mut available = generated.saturating_sub(since_anchor);

                // the device-side buffer is finite; a lagging consumer loses samples
                if available > self.fifo_samples {
                    let dropped = available - self.fifo_samples;
                    stream.produced += dropped;
                    stream.phase =
                        (stream.phase + TAU * TONE_OFFSET / rate * dropped as f64) % TAU;
                    stream.overflow_pending = true;
                    available = self.fifo_samples;
                }

                let fifo_full = available >= self.fifo_samples;
                if available >= max_samples as u64 || fifo_full || (now >= deadline && available > 0)
                {
                    let count = available.min(max_samples as u64) as usize;
                    let offset = stream.produced - stream.anchor_produced;
                    let chunk_wall =
                        stream.anchor_wall + Duration::from_secs_f64(offset as f64 / rate);
                    let time = clock.time_at(chunk_wall);
                    let overflow = stream.overflow_pending;
                    stream.overflow_pending = false;
                    stream.produced += count as u64;
                    let data = Self::synthesize(stream, rate, count);
                    return Ok(RxChunk { data, samples: count, time, overflow });
                }
                if now >= deadline {
                    return Ok(RxChunk::empty(stream.cmd.channels, clock.time_at(now)));
                }

                // wall instant when a full request (or a full device buffer,
                // whichever is smaller) will be ready
                let pending = stream.produced - stream.anchor_produced;
                let want = (max_samples as u64).min(self.fifo_samples);
                let ready = stream.anchor_wall
                    + Duration::from_secs_f64((pending + want) as f64 / rate);
                ready.min(deadline).saturating_duration_since(now)
            };
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(addr: &str) -> SimUsrp {
        SimUsrp::open(&DeviceAddr::parse(addr).unwrap()).unwrap()
    }

    fn start_cmd(channels: usize) -> StreamCmd {
        StreamCmd { format: SampleFormat::Sc16, channels, start_time: None }
    }

    #[test]
    fn open_validates_address_options() {
        assert!(SimUsrp::open(&DeviceAddr::parse("channels=0").unwrap()).is_err());
        assert!(SimUsrp::open(&DeviceAddr::parse("channels=9").unwrap()).is_err());
        assert!(SimUsrp::open(&DeviceAddr::parse("pps_period_ms=abc").unwrap()).is_err());
        assert!(SimUsrp::open(&DeviceAddr::parse("master_clock=0").unwrap()).is_err());
        assert_eq!(sim("channels=3").num_channels(), 3);
    }

    #[test]
    fn master_clock_option_changes_rate_grid() {
        let dev = sim("master_clock=100e6");
        assert_eq!(dev.set_samp_rate(2e6).unwrap(), 2e6);
        assert_eq!(dev.set_samp_rate(30e6).unwrap(), 25e6);
        // the default rate itself gets snapped to the configured grid
        assert_eq!(sim("master_clock=3e6").samp_rate(), 750e3);
    }

    #[test]
    fn rate_snaps_to_decimation_grid() {
        let dev = sim("");
        assert_eq!(dev.set_samp_rate(1e6).unwrap(), 1e6);
        assert_eq!(dev.samp_rate(), 1e6);
        // closest achievable, stable across repeated reads
        let actual = dev.set_samp_rate(0.9e6).unwrap();
        assert_eq!(actual, MASTER_CLOCK / 71.0);
        assert_eq!(dev.samp_rate(), actual);
        assert_eq!(dev.samp_rate(), actual);
        // clamped at the decimation limits
        assert_eq!(dev.set_samp_rate(1e9).unwrap(), MASTER_CLOCK / DECIM_MIN as f64);
        assert_eq!(dev.set_samp_rate(10.0).unwrap(), MASTER_CLOCK / DECIM_MAX as f64);
        assert!(dev.set_samp_rate(f64::NAN).is_err());
    }

    #[test]
    fn tune_snaps_to_lo_grid() {
        let dev = sim("");
        let res = dev.set_center_freq(&TuneRequest::new(915.0126e6), 0).unwrap();
        // LO lands on the 25 kHz grid, DSP absorbs the residual
        assert_eq!(res.actual_rf_freq, 915.025e6);
        assert!((res.actual_rf_freq - 50e6) % 25e3 == 0.0);
        assert!((res.actual_freq() - 915.0126e6).abs() < 1e-3);
        assert!((dev.center_freq(0).unwrap() - 915.0126e6).abs() < 1e-3);
    }

    #[test]
    fn tune_clips_to_frontend_range() {
        let dev = sim("");
        let res = dev.set_center_freq(&TuneRequest::new(10e9), 0).unwrap();
        assert_eq!(res.actual_rf_freq, 2.2e9);
        let range = dev.freq_range(0).unwrap();
        assert!(range.contains(res.actual_rf_freq));
    }

    #[test]
    fn gain_clamps_and_snaps() {
        let dev = sim("");
        assert_eq!(dev.set_gain(99.0, 0).unwrap(), 76.0);
        assert_eq!(dev.gain(0).unwrap(), 76.0);
        assert_eq!(dev.set_gain(-5.0, 0).unwrap(), 0.0);
        assert_eq!(dev.set_gain(10.3, 0).unwrap(), 10.5);
        let range = dev.gain_range(0).unwrap();
        assert!(range.contains(dev.gain(0).unwrap()));
    }

    #[test]
    fn antenna_selection_validates() {
        let dev = sim("");
        assert_eq!(dev.antenna(0).unwrap(), "TX/RX");
        dev.set_antenna("RX2", 0).unwrap();
        assert_eq!(dev.antenna(0).unwrap(), "RX2");
        assert!(dev.set_antenna("J1", 0).is_err());
        assert_eq!(dev.antenna(0).unwrap(), "RX2");
    }

    #[test]
    fn subdev_rebind_swaps_frontend_caps() {
        let dev = sim("channels=2");
        assert_eq!(dev.freq_range(0).unwrap().start, 50e6);
        dev.set_subdev_spec(&SubdevSpec::parse("B:0 B:1").unwrap()).unwrap();
        assert_eq!(dev.subdev_spec().to_string(), "B:0 B:1");
        assert_eq!(dev.freq_range(0).unwrap().start, 400e6);
        assert_eq!(dev.antenna(0).unwrap(), "RX2");
        // bad specs leave the binding alone
        assert!(dev.set_subdev_spec(&SubdevSpec::parse("C:0 A:0").unwrap()).is_err());
        assert!(dev.set_subdev_spec(&SubdevSpec::parse("A:0").unwrap()).is_err());
        assert_eq!(dev.freq_range(0).unwrap().start, 400e6);
    }

    #[test]
    fn channel_bounds_checked() {
        let dev = sim("channels=1");
        assert!(dev.gain(1).is_err());
        assert!(dev.set_center_freq(&TuneRequest::new(915e6), 1).is_err());
        assert!(dev.antennas(1).is_err());
    }

    #[test]
    fn set_time_now_takes_effect_immediately() {
        let dev = sim("");
        dev.set_time_now(TimeSpec::new(42, 0.0)).unwrap();
        let t = dev.time_now();
        assert!(t >= TimeSpec::new(42, 0.0));
        assert!(t < TimeSpec::new(43, 0.0));
    }

    #[test]
    fn pps_latch_applies_at_edge() {
        let dev = sim("pps_period_ms=20");
        dev.set_time_next_pps(TimeSpec::new(100, 0.0)).unwrap();
        // before the edge the old timeline still runs
        assert!(dev.time_now() < TimeSpec::new(50, 0.0));
        thread::sleep(Duration::from_millis(45));
        let t1 = dev.time_now();
        assert!(t1 >= TimeSpec::new(100, 0.0));
        assert!(t1 < TimeSpec::new(101, 0.0));
        let t2 = dev.time_now();
        assert!(t2 >= t1);
    }

    #[test]
    fn recv_paces_and_timestamps_chunks() {
        let dev = sim("channels=1");
        dev.set_samp_rate(1e6).unwrap();
        dev.start_stream(&start_cmd(1)).unwrap();
        let a = dev.recv(4096, Duration::from_millis(200)).unwrap();
        assert!(a.samples > 0 && a.samples <= 4096);
        assert_eq!(a.data.len(), 1);
        assert_eq!(a.data[0].len(), a.samples * 4);
        let b = dev.recv(4096, Duration::from_millis(200)).unwrap();
        // consecutive chunk timestamps line up with the sample count
        let expect = a.time + TimeSpec::from_samples(a.samples as u64, 1e6);
        assert!(b.time.close_to(expect, 1e-6));
    }

    #[test]
    fn recv_flags_overflow_after_consumer_lag() {
        let dev = sim("channels=1,fifo=2048");
        dev.set_samp_rate(1e6).unwrap();
        dev.start_stream(&start_cmd(1)).unwrap();
        thread::sleep(Duration::from_millis(30));
        let chunk = dev.recv(1024, Duration::from_millis(100)).unwrap();
        assert!(chunk.overflow);
        let next = dev.recv(1024, Duration::from_millis(100)).unwrap();
        assert!(!next.overflow);
    }

    #[test]
    fn timed_start_holds_first_chunk() {
        let dev = sim("channels=1");
        dev.set_samp_rate(1e6).unwrap();
        let start = dev.time_now() + TimeSpec::new(0, 0.05);
        dev.start_stream(&StreamCmd {
            format: SampleFormat::Sc16,
            channels: 1,
            start_time: Some(start),
        })
        .unwrap();
        let early = dev.recv(1024, Duration::from_millis(5)).unwrap();
        assert_eq!(early.samples, 0);
        let first = dev.recv(1024, Duration::from_millis(200)).unwrap();
        assert!(first.samples > 0);
        assert!((first.time - start).real_secs() >= -1e-6);
    }

    #[test]
    fn recv_without_stream_is_an_error() {
        let dev = sim("");
        assert!(dev.recv(1024, Duration::from_millis(1)).is_err());
    }
}
