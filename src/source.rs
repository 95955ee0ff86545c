use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};
use num_complex::Complex;

use crate::convert;
use crate::device::{
    self, DeviceAddr, UsrpDevice, CHUNK_SAMPLES, DEFAULT_QUEUE_DEPTH, DEFAULT_RECV_TIMEOUT,
    MAX_CONSECUTIVE_ERRORS,
};
use crate::error::{ConfigError, HardwareError, Result};
use crate::types::{
    ClockConfig, MetaRange, SampleBlock, StreamCmd, SubdevSpec, TimeSpec, TimeTag, TunePolicy,
    TuneRequest, TuneResult,
};
use crate::SampleFormat;

/// A decoded transfer queued between the reception thread and `work`.
struct SampleChunk {
    chans: Vec<Vec<Complex<f32>>>,
    time: TimeSpec,
    overflow: bool,
}

impl SampleChunk {
    fn samples(&self) -> usize {
        self.chans[0].len()
    }
}

/// Timeline bookkeeping. `expected` is the device time the next in-order
/// chunk should carry; `pending` records that a tag is owed to the next
/// block boundary.
struct TagTracker {
    expected: Option<TimeSpec>,
    pending: bool,
}

impl TagTracker {
    fn fresh() -> TagTracker {
        TagTracker { expected: None, pending: true }
    }

    /// Fold an arriving chunk into the timeline, flagging a discontinuity
    /// on a device-reported overflow or a timestamp more than half a sample
    /// period away from expectation.
    fn observe(&mut self, chunk: &SampleChunk, rate: f64) {
        let mut discontinuity = chunk.overflow;
        if let Some(expected) = self.expected {
            if (chunk.time - expected).real_secs().abs() > 0.5 / rate {
                discontinuity = true;
            }
        }
        self.expected = Some(chunk.time + TimeSpec::from_samples(chunk.samples() as u64, rate));
        if discontinuity {
            self.pending = true;
        }
    }
}

struct StreamState {
    rx: Option<Receiver<SampleChunk>>,
    pump: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<HardwareError>>>,
    /// Partially consumed chunk and the offset already delivered.
    cursor: Option<(SampleChunk, usize)>,
    tags: TagTracker,
    active: bool,
}

pub struct UsrpSource {
    dev: Arc<dyn UsrpDevice>,
    format: SampleFormat,
    channels: usize,
    /// One lock per channel so tuning calls on the same channel cannot
    /// interleave, while different channels proceed in parallel.
    chan_locks: Vec<Mutex<()>>,
    /// Serializes device-wide operations (rate, clock, time, subdev).
    dev_lock: Mutex<()>,
    /// Achieved sample rate, cached so repeated reads are stable without
    /// another device query.
    rate: Mutex<f64>,
    start_time: Mutex<Option<TimeSpec>>,
    stream: Mutex<StreamState>,
    /// A rate change happened; stamp the next block even without a gap.
    force_tag: AtomicBool,
    samples_produced: AtomicU64,
    recv_timeout: Duration,
    queue_depth: usize,
}

fn check_finite(value: f64, what: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::BadValue(format!("{} is {}", what, value)).into())
    }
}

impl UsrpSource {
    pub fn open(addr: &str, format: SampleFormat, num_channels: usize) -> Result<UsrpSource> {
        let addr = DeviceAddr::parse(addr)?;
        let dev = device::open(&addr)?;
        UsrpSource::build(dev, format, num_channels, &addr)
    }

    /// Wrap an externally constructed device backend.
    pub fn from_device(
        dev: Arc<dyn UsrpDevice>,
        format: SampleFormat,
        num_channels: usize,
    ) -> Result<UsrpSource> {
        UsrpSource::build(dev, format, num_channels, &DeviceAddr::default())
    }

    fn build(
        dev: Arc<dyn UsrpDevice>,
        format: SampleFormat,
        channels: usize,
        addr: &DeviceAddr,
    ) -> Result<UsrpSource> {
        if channels == 0 || channels > dev.num_channels() {
            return Err(ConfigError::BadChannelCount {
                requested: channels,
                available: dev.num_channels(),
            }
            .into());
        }
        if !dev.supports_format(format) {
            return Err(ConfigError::UnsupportedFormat(format.to_string()).into());
        }
        let timeout_ms: u64 =
            addr.get_parsed("recv_timeout_ms", DEFAULT_RECV_TIMEOUT.as_millis() as u64)?;
        let queue_depth: usize = addr.get_parsed("queue_depth", DEFAULT_QUEUE_DEPTH)?;
        let rate = dev.samp_rate();
        info!("Using device: {}", dev.name());

        Ok(UsrpSource {
            dev,
            format,
            channels,
            chan_locks: (0..channels).map(|_| Mutex::new(())).collect(),
            dev_lock: Mutex::new(()),
            rate: Mutex::new(rate),
            start_time: Mutex::new(None),
            stream: Mutex::new(StreamState {
                rx: None,
                pump: None,
                running: Arc::new(AtomicBool::new(false)),
                fault: Arc::new(Mutex::new(None)),
                cursor: None,
                tags: TagTracker::fresh(),
                active: false,
            }),
            force_tag: AtomicBool::new(false),
            samples_produced: AtomicU64::new(0),
            recv_timeout: Duration::from_millis(timeout_ms.max(1)),
            queue_depth: queue_depth.max(1),
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

    pub fn num_channels(&self) -> usize {
        self.channels
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.format
    }

    pub fn device(&self) -> Arc<dyn UsrpDevice> {
        self.dev.clone()
    }

    /// Samples delivered through `work` since construction.
    pub fn samples_produced(&self) -> u64 {
        self.samples_produced.load(Ordering::SeqCst)
    }

    // --- tuning -----------------------------------------------------------

    pub fn set_subdev_spec(&self, markup: &str) -> Result<()> {
        let spec = SubdevSpec::parse(markup)?;
        let _guard = self.dev_lock.lock().unwrap();
        self.dev.set_subdev_spec(&spec)
    }

    pub fn subdev_spec(&self) -> SubdevSpec {
        self.dev.subdev_spec()
    }

    pub fn set_center_freq(&self, request: TuneRequest, chan: usize) -> Result<TuneResult> {
        self.check_chan(chan)?;
        check_finite(request.target_freq, "target frequency")?;
        if let TunePolicy::Manual(f) = request.rf {
            check_finite(f, "rf frequency")?;
        }
        if let TunePolicy::Manual(f) = request.dsp {
            check_finite(f, "dsp frequency")?;
        }
        let _guard = self.chan_locks[chan].lock().unwrap();
        self.dev.set_center_freq(&request, chan)
    }

    pub fn get_center_freq(&self, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        self.dev.center_freq(chan)
    }

    /// Queried from the device on every call; never cached, so a subdevice
    /// change is reflected immediately.
    pub fn get_freq_range(&self, chan: usize) -> Result<MetaRange> {
        self.check_chan(chan)?;
        self.dev.freq_range(chan)
    }

    pub fn set_gain(&self, gain: f64, chan: usize) -> Result<()> {
        self.check_chan(chan)?;
        check_finite(gain, "gain")?;
        let _guard = self.chan_locks[chan].lock().unwrap();
        let actual = self.dev.set_gain(gain, chan)?;
        if (actual - gain).abs() > f64::EPSILON {
            info!("Gain {} dB not exact on channel {}, device applied {} dB", gain, chan, actual);
        }
        Ok(())
    }

    pub fn get_gain(&self, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        self.dev.gain(chan)
    }

    pub fn get_gain_range(&self, chan: usize) -> Result<MetaRange> {
        self.check_chan(chan)?;
        self.dev.gain_range(chan)
    }

    pub fn set_antenna(&self, name: &str, chan: usize) -> Result<()> {
        self.check_chan(chan)?;
        let _guard = self.chan_locks[chan].lock().unwrap();
        // validate before touching the device so a bad name leaves the
        // previous selection in place
        let available = self.dev.antennas(chan)?;
        if !available.iter().any(|a| a == name) {
            return Err(ConfigError::UnknownAntenna { name: name.to_string(), available }.into());
        }
        self.dev.set_antenna(name, chan)
    }

    pub fn get_antenna(&self, chan: usize) -> Result<String> {
        self.check_chan(chan)?;
        self.dev.antenna(chan)
    }

    pub fn get_antennas(&self, chan: usize) -> Result<Vec<String>> {
        self.check_chan(chan)?;
        self.dev.antennas(chan)
    }

    pub fn set_bandwidth(&self, bw: f64, chan: usize) -> Result<()> {
        self.check_chan(chan)?;
        check_finite(bw, "bandwidth")?;
        let _guard = self.chan_locks[chan].lock().unwrap();
        self.dev.set_bandwidth(bw, chan)
    }

    pub fn get_bandwidth(&self, chan: usize) -> Result<f64> {
        self.check_chan(chan)?;
        self.dev.bandwidth(chan)
    }

    // --- time -------------------------------------------------------------

    pub fn set_clock_config(&self, config: ClockConfig) -> Result<()> {
        let _guard = self.dev_lock.lock().unwrap();
        self.dev.set_clock_config(&config)
    }

    pub fn get_time_now(&self) -> TimeSpec {
        self.dev.time_now()
    }

    pub fn set_time_now(&self, time: TimeSpec) -> Result<()> {
        let _guard = self.dev_lock.lock().unwrap();
        self.dev.set_time_now(time)
    }

    pub fn set_time_next_pps(&self, time: TimeSpec) -> Result<()> {
        let _guard = self.dev_lock.lock().unwrap();
        self.dev.set_time_next_pps(time)
    }

    /// Arm a stream start time; takes effect when streaming next begins.
    pub fn set_start_time(&self, time: TimeSpec) {
        *self.start_time.lock().unwrap() = Some(time);
    }

    // --- streaming --------------------------------------------------------

    pub fn set_samp_rate(&self, rate: f64) -> Result<()> {
        check_finite(rate, "sample rate")?;
        if rate <= 0.0 {
            return Err(ConfigError::BadValue(format!("sample rate {}", rate)).into());
        }
        let _guard = self.dev_lock.lock().unwrap();
        let actual = self.dev.set_samp_rate(rate)?;
        *self.rate.lock().unwrap() = actual;
        // the tick rate changed; the next block opens a new timeline
        self.force_tag.store(true, Ordering::SeqCst);
        info!("Sample rate set: requested {} Hz, actual {} Hz", rate, actual);
        Ok(())
    }

    pub fn get_samp_rate(&self) -> f64 {
        *self.rate.lock().unwrap()
    }

    fn start_streaming(&self, st: &mut StreamState) -> Result<()> {
        let cmd = StreamCmd {
            format: self.format,
            channels: self.channels,
            start_time: self.start_time.lock().unwrap().take(),
        };
        self.dev.start_stream(&cmd)?;

        let (tx, rx) = sync_channel(self.queue_depth);
        let running = Arc::new(AtomicBool::new(true));
        let fault = Arc::new(Mutex::new(None));
        let pump = {
            let dev = self.dev.clone();
            let running = running.clone();
            let fault = fault.clone();
            let format = self.format;
            let timeout = self.recv_timeout;
            thread::spawn(move || pump_loop(dev, tx, running, fault, format, timeout))
        };

        st.rx = Some(rx);
        st.pump = Some(pump);
        st.running = running;
        st.fault = fault;
        st.cursor = None;
        st.tags = TagTracker::fresh();
        st.active = true;
        self.force_tag.store(false, Ordering::SeqCst);
        info!("Streaming started: {} channel(s), {}", self.channels, self.format);
        Ok(())
    }

    fn stop_streaming(&self, st: &mut StreamState) -> Result<()> {
        if !st.active {
            return Ok(());
        }
        st.running.store(false, Ordering::SeqCst);
        // dropping the receiver unblocks a pump stuck on a full queue
        st.rx = None;
        if let Some(pump) = st.pump.take() {
            if pump.join().is_err() {
                error!("Reception thread panicked");
            }
        }
        st.cursor = None;
        st.active = false;
        *st.fault.lock().unwrap() = None;
        let res = self.dev.stop_stream();
        info!("Streaming stopped");
        res
    }

    /// Stop streaming and drain the background reception path. Idempotent;
    /// a later `work` call starts a fresh stream with a fresh start tag.
    pub fn stop(&self) -> Result<()> {
        let mut st = self.stream.lock().unwrap();
        self.stop_streaming(&mut st)
    }

    /// Pull up to `requested` samples per channel into `outputs`. Starts
    /// streaming on first use. Waits at most the receive timeout when no
    /// data is queued, then returns an empty block rather than blocking on.
    pub fn work(
        &self,
        outputs: &mut [&mut [Complex<f32>]],
        requested: usize,
    ) -> Result<SampleBlock> {
        if outputs.len() != self.channels {
            return Err(ConfigError::BadWorkBuffers(format!(
                "{} buffers for {} channels",
                outputs.len(),
                self.channels
            ))
            .into());
        }
        if let Some(short) = outputs.iter().find(|o| o.len() < requested) {
            return Err(ConfigError::BadWorkBuffers(format!(
                "buffer holds {} samples, {} requested",
                short.len(),
                requested
            ))
            .into());
        }

        let mut st = self.stream.lock().unwrap();
        if !st.active {
            self.start_streaming(&mut st)?;
        }
        let rate = self.get_samp_rate();
        if self.force_tag.swap(false, Ordering::SeqCst) {
            st.tags.pending = true;
        }

        let mut filled = 0usize;
        let mut tag: Option<TimeTag> = None;
        while filled < requested {
            if st.cursor.is_none() {
                match self.next_chunk(&st, filled == 0)? {
                    Some(chunk) => {
                        st.tags.observe(&chunk, rate);
                        st.cursor = Some((chunk, 0));
                    }
                    None => break,
                }
            }
            let StreamState { cursor, tags, .. } = &mut *st;
            let (chunk, offset) = match cursor.as_mut() {
                Some((chunk, offset)) => (&*chunk, offset),
                None => break,
            };

            // tags only land on block boundaries; cut the block short when a
            // discontinuity shows up mid-assembly
            if tags.pending {
                if filled > 0 {
                    break;
                }
                let time = chunk.time + TimeSpec::from_samples(*offset as u64, rate);
                tag = Some(TimeTag { time, rate });
                tags.pending = false;
            }

            let n = (chunk.samples() - *offset).min(requested - filled);
            for (out, chan) in outputs.iter_mut().zip(chunk.chans.iter()) {
                out[filled..filled + n].copy_from_slice(&chan[*offset..*offset + n]);
            }
            *offset += n;
            filled += n;
            if *offset >= chunk.samples() {
                *cursor = None;
            }
        }

        self.samples_produced.fetch_add(filled as u64, Ordering::SeqCst);
        Ok(SampleBlock { samples: filled, tag })
    }

    /// Take the next queued chunk. Blocks up to the receive timeout only
    /// when nothing has been assembled yet.
    fn next_chunk(&self, st: &StreamState, may_wait: bool) -> Result<Option<SampleChunk>> {
        let rx = match st.rx.as_ref() {
            Some(rx) => rx,
            None => return Ok(None),
        };
        if may_wait {
            match rx.recv_timeout(self.recv_timeout) {
                Ok(chunk) => Ok(Some(chunk)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(self.pump_fault(st)),
            }
        } else {
            match rx.try_recv() {
                Ok(chunk) => Ok(Some(chunk)),
                Err(TryRecvError::Empty) => Ok(None),
                // deliver what was assembled; the fault surfaces next call
                Err(TryRecvError::Disconnected) => Ok(None),
            }
        }
    }

    /// The reception thread is gone; report why.
    fn pump_fault(&self, st: &StreamState) -> crate::error::UsrpError {
        let fault = st.fault.lock().unwrap().clone();
        fault.unwrap_or(HardwareError::Disconnected).into()
    }
}

impl Drop for UsrpSource {
    fn drop(&mut self) {
        if let Ok(mut st) = self.stream.lock() {
            if let Err(e) = self.stop_streaming(&mut st) {
                warn!("Stop on drop failed: {}", e);
            }
        }
    }
}

/// Background reception loop: receive, decode, hand over. Exits when the
/// source clears the running flag, when the queue closes, or after too many
/// consecutive receive failures.
fn pump_loop(
    dev: Arc<dyn UsrpDevice>,
    tx: SyncSender<SampleChunk>,
    running: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<HardwareError>>>,
    format: SampleFormat,
    timeout: Duration,
) {
    let mut consecutive = 0u32;
    while running.load(Ordering::SeqCst) {
        let chunk = match dev.recv(CHUNK_SAMPLES, timeout) {
            Ok(chunk) => {
                consecutive = 0;
                chunk
            }
            Err(e) => {
                consecutive += 1;
                warn!("Receive failed ({} consecutive): {}", consecutive, e);
                if consecutive >= MAX_CONSECUTIVE_ERRORS {
                    error!("Receive failed {} times in a row, stopping reception", consecutive);
                    *fault.lock().unwrap() = Some(HardwareError::StreamLost(e.to_string()));
                    break;
                }
                continue;
            }
        };
        if chunk.samples == 0 {
            continue;
        }
        let mut chans = Vec::with_capacity(chunk.data.len());
        for bytes in &chunk.data {
            let mut samples = Vec::with_capacity(chunk.samples);
            convert::wire_to_complex(format, bytes, &mut samples);
            chans.push(samples);
        }
        let decoded = SampleChunk { chans, time: chunk.time, overflow: chunk.overflow };
        if tx.send(decoded).is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
