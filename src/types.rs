//! Value types shared by the tuning, time-sync, and streaming surfaces.

use std::fmt;
use std::ops::{Add, Sub};

use crate::error::{ConfigError, Result};
use crate::SampleFormat;

/// Absolute device time as a whole-second count plus a fractional part.
///
/// Keeping the pair split preserves sub-nanosecond resolution at large
/// timestamps where a single `f64` would not. The fractional part is kept
/// normalized to `0.0 <= frac < 1.0`, which makes the derived ordering
/// (whole seconds first, then fraction) correct.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct TimeSpec {
    full_secs: i64,
    frac_secs: f64,
}

impl TimeSpec {
    pub const ZERO: TimeSpec = TimeSpec { full_secs: 0, frac_secs: 0.0 };

    /// Build a time from a whole/fractional pair, normalizing the fraction
    /// into `[0, 1)` with carry into the whole seconds.
    pub fn new(full_secs: i64, frac_secs: f64) -> TimeSpec {
        let mut full = full_secs + frac_secs.floor() as i64;
        let mut frac = frac_secs - frac_secs.floor();
        // floor() of a value just below a whole number can round frac to 1.0
        if frac >= 1.0 {
            full += 1;
            frac -= 1.0;
        }
        TimeSpec { full_secs: full, frac_secs: frac }
    }

    pub fn from_secs(secs: f64) -> TimeSpec {
        TimeSpec::new(0, secs)
    }

    /// Duration covered by `count` samples at `rate` samples per second.
    /// Splitting the division keeps sub-sample resolution even for sample
    /// counts far past where `count / rate` alone would round it away.
    pub fn from_samples(count: u64, rate: f64) -> TimeSpec {
        let rate = rate.max(1.0);
        let full = (count as f64 / rate).floor();
        let rem = (count as f64 - full * rate).max(0.0);
        TimeSpec::new(full as i64, rem / rate)
    }

    pub fn full_secs(&self) -> i64 {
        self.full_secs
    }

    pub fn frac_secs(&self) -> f64 {
        self.frac_secs
    }

    /// Collapsed `f64` seconds. Loses precision for large timestamps; meant
    /// for display and coarse math only.
    pub fn real_secs(&self) -> f64 {
        self.full_secs as f64 + self.frac_secs
    }

    /// True if the two times agree to within `tol` seconds.
    pub fn close_to(&self, other: TimeSpec, tol: f64) -> bool {
        let d = *self - other;
        d.real_secs().abs() <= tol
    }
}

impl Add for TimeSpec {
    type Output = TimeSpec;

    fn add(self, other: TimeSpec) -> TimeSpec {
        TimeSpec::new(self.full_secs + other.full_secs, self.frac_secs + other.frac_secs)
    }
}

impl Sub for TimeSpec {
    type Output = TimeSpec;

    fn sub(self, other: TimeSpec) -> TimeSpec {
        TimeSpec::new(self.full_secs - other.full_secs, self.frac_secs - other.frac_secs)
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.9}", self.real_secs())
    }
}

/// How one stage of a tune should pick its frequency.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TunePolicy {
    /// Leave the stage where it is.
    None,
    /// Let the device choose (usually target for RF, residual for DSP).
    #[default]
    Auto,
    /// Force the stage to the given frequency in Hz.
    Manual(f64),
}

/// A tune instruction: overall target plus per-stage policy for the RF
/// front end and the DSP fine-shift stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneRequest {
    pub target_freq: f64,
    pub rf: TunePolicy,
    pub dsp: TunePolicy,
}

impl TuneRequest {
    pub fn new(target_freq: f64) -> TuneRequest {
        TuneRequest { target_freq, rf: TunePolicy::Auto, dsp: TunePolicy::Auto }
    }

    /// Park the LO `lo_offset` Hz away from the target and let the DSP stage
    /// shift the difference back, keeping LO leakage out of band.
    pub fn with_lo_offset(target_freq: f64, lo_offset: f64) -> TuneRequest {
        TuneRequest {
            target_freq,
            rf: TunePolicy::Manual(target_freq + lo_offset),
            dsp: TunePolicy::Auto,
        }
    }
}

impl From<f64> for TuneRequest {
    fn from(target_freq: f64) -> Self {
        TuneRequest::new(target_freq)
    }
}

/// What a tune actually achieved, per stage. The requested and achieved
/// values frequently differ; callers that care must read these back.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TuneResult {
    pub target_rf_freq: f64,
    pub actual_rf_freq: f64,
    pub target_dsp_freq: f64,
    pub actual_dsp_freq: f64,
}

impl TuneResult {
    /// Overall achieved center frequency: RF stage minus the DSP shift.
    pub fn actual_freq(&self) -> f64 {
        self.actual_rf_freq - self.actual_dsp_freq
    }
}

impl fmt::Display for TuneResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rf {:.0} Hz (wanted {:.0}), dsp {:.0} Hz (wanted {:.0})",
            self.actual_rf_freq, self.target_rf_freq, self.actual_dsp_freq, self.target_dsp_freq
        )
    }
}

/// A device capability range: `[start, stop]` with an optional step.
/// `step == 0.0` means continuously tunable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetaRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl MetaRange {
    pub fn new(start: f64, stop: f64, step: f64) -> MetaRange {
        assert!(start <= stop);
        assert!(step >= 0.0);
        MetaRange { start, stop, step }
    }

    pub fn continuous(start: f64, stop: f64) -> MetaRange {
        MetaRange::new(start, stop, 0.0)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.start && value <= self.stop
    }

    /// Clamp `value` into the range and, when a step is defined, snap it to
    /// the nearest point on the `start + n*step` grid.
    pub fn clip(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.start, self.stop);
        if self.step == 0.0 {
            return clamped;
        }
        let steps = ((clamped - self.start) / self.step).round();
        (self.start + steps * self.step).clamp(self.start, self.stop)
    }
}

impl fmt::Display for MetaRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.step == 0.0 {
            write!(f, "[{}, {}]", self.start, self.stop)
        } else {
            write!(f, "[{}, {}] step {}", self.start, self.stop, self.step)
        }
    }
}

/// Reference clock input selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockSource {
    #[default]
    Internal,
    External,
    Mimo,
    Gpsdo,
}

/// PPS input selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PpsSource {
    #[default]
    Internal,
    External,
    Mimo,
    Gpsdo,
}

/// Where the device takes its reference clock and PPS edge from. Configure
/// this before arming a PPS time latch; reads before then are free-running
/// and not meaningful for cross-device alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockConfig {
    pub clock: ClockSource,
    pub pps: PpsSource,
}

impl ClockConfig {
    pub fn external() -> ClockConfig {
        ClockConfig { clock: ClockSource::External, pps: PpsSource::External }
    }
}

/// Channel-to-frontend binding, parsed from markup like `"A:0 B:0"`:
/// one whitespace-separated `slot:frontend` pair per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdevSpec {
    slots: Vec<String>,
}

impl SubdevSpec {
    pub fn parse(markup: &str) -> Result<SubdevSpec> {
        let mut slots = Vec::new();
        for pair in markup.split_whitespace() {
            match pair.split_once(':') {
                Some((mb, fe)) if !mb.is_empty() && !fe.is_empty() => {
                    slots.push(pair.to_string());
                }
                _ => {
                    return Err(ConfigError::BadSubdevSpec(format!(
                        "expected slot:frontend, got {:?}",
                        pair
                    ))
                    .into())
                }
            }
        }
        if slots.is_empty() {
            return Err(ConfigError::BadSubdevSpec("empty spec".to_string()).into());
        }
        Ok(SubdevSpec { slots })
    }

    /// Build a spec from already-validated slot names (device side).
    pub fn from_slots(slots: impl IntoIterator<Item = String>) -> SubdevSpec {
        SubdevSpec { slots: slots.into_iter().collect() }
    }

    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Display for SubdevSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.slots.join(" "))
    }
}

/// Timing metadata attached to the first sample of a returned block after a
/// discontinuity. Sample `k` past the tag lands at `time + k/rate` until the
/// next tag supersedes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeTag {
    pub time: TimeSpec,
    pub rate: f64,
}

/// What one `work` call produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleBlock {
    /// Samples written per channel; `0..=requested`.
    pub samples: usize,
    /// Present only when the block's first sample opens a new timeline.
    pub tag: Option<TimeTag>,
}

/// Instruction handed to the device when streaming begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamCmd {
    pub format: SampleFormat,
    /// Number of channels to stream, starting at channel 0.
    pub channels: usize,
    /// Begin producing at this device time instead of immediately.
    pub start_time: Option<TimeSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn timespec_arithmetic_small() {
        let a = TimeSpec::new(4, 0.5);
        let b = TimeSpec::new(1, 0.5);
        let c = a + b;
        assert!(c.close_to(TimeSpec::new(6, 0.0), TOLERANCE));
        let d = c - b;
        assert!(d.close_to(a, TOLERANCE));
        let e = c - a;
        assert!(e.close_to(b, TOLERANCE));
    }

    #[test]
    fn timespec_arithmetic_large_epoch() {
        // UNIX timestamp: 2026-08-22T00:00:00+0000
        let start = TimeSpec::new(1787702400, 0.0);
        let a = start + TimeSpec::new(4, 0.5);
        let b = start + TimeSpec::new(1, 0.5);
        assert!((a - b).close_to(TimeSpec::new(3, 0.0), TOLERANCE));
        assert!((b - a).close_to(TimeSpec::new(-3, 0.0), TOLERANCE));
        // sub-second resolution survives the large whole part
        let c = start + TimeSpec::new(0, 1e-9);
        assert_eq!(c.full_secs(), 1787702400);
        assert!((c.frac_secs() - 1e-9).abs() < 1e-12);
    }

    #[test]
    fn timespec_normalizes_fraction() {
        let t = TimeSpec::new(2, 3.25);
        assert_eq!(t.full_secs(), 5);
        assert!((t.frac_secs() - 0.25).abs() < TOLERANCE);

        let u = TimeSpec::new(2, -0.25);
        assert_eq!(u.full_secs(), 1);
        assert!((u.frac_secs() - 0.75).abs() < TOLERANCE);
    }

    #[test]
    fn timespec_ordering() {
        assert!(TimeSpec::new(1, 0.9) < TimeSpec::new(2, 0.1));
        assert!(TimeSpec::new(2, 0.2) > TimeSpec::new(2, 0.1));
        assert!(TimeSpec::new(-1, 0.5) < TimeSpec::ZERO);
    }

    #[test]
    fn timespec_from_samples() {
        let d = TimeSpec::from_samples(1_000_000, 1e6);
        assert!(d.close_to(TimeSpec::new(1, 0.0), TOLERANCE));
        let d = TimeSpec::from_samples(1500, 1e6);
        assert!(d.close_to(TimeSpec::new(0, 1.5e-3), TOLERANCE));
        // large counts must not lose sub-sample resolution
        let d = TimeSpec::from_samples(10_000_000_001, 1e6);
        assert_eq!(d.full_secs(), 10_000);
        assert!((d.frac_secs() - 1e-6).abs() < 1e-12);
    }

    #[test]
    fn metarange_clip_clamps_and_snaps() {
        let r = MetaRange::new(0.0, 76.0, 0.5);
        assert_eq!(r.clip(-3.0), 0.0);
        assert_eq!(r.clip(100.0), 76.0);
        assert_eq!(r.clip(10.3), 10.5);
        assert_eq!(r.clip(10.2), 10.0);

        let c = MetaRange::continuous(50e6, 2.2e9);
        assert_eq!(c.clip(914.987e6), 914.987e6);
        assert!(c.contains(914.987e6));
        assert!(!c.contains(6e9));
    }

    #[test]
    fn tune_request_from_bare_freq() {
        let req: TuneRequest = 915e6.into();
        assert_eq!(req, TuneRequest::new(915e6));
        assert_eq!(req.rf, TunePolicy::Auto);
        assert_eq!(req.dsp, TunePolicy::Auto);
    }

    #[test]
    fn tune_result_overall_freq() {
        let res = TuneResult {
            target_rf_freq: 915.5e6,
            actual_rf_freq: 915.5e6,
            target_dsp_freq: 0.5e6,
            actual_dsp_freq: 0.5e6,
        };
        assert_eq!(res.actual_freq(), 915e6);
    }

    #[test]
    fn subdev_spec_parses_markup() {
        let spec = SubdevSpec::parse("A:0 B:0").unwrap();
        assert_eq!(spec.slots(), &["A:0".to_string(), "B:0".to_string()]);
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.to_string(), "A:0 B:0");
    }

    #[test]
    fn subdev_spec_rejects_malformed() {
        assert!(SubdevSpec::parse("").is_err());
        assert!(SubdevSpec::parse("A0").is_err());
        assert!(SubdevSpec::parse("A: B:0").is_err());
        assert!(SubdevSpec::parse(":0").is_err());
    }
}
