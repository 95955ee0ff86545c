#![allow(dead_code)]

use std::time::Duration;

/// RF capabilities of one receive frontend slot.
pub struct SlotCaps {
    pub slot: &'static str,
    pub frontend: &'static str,
    pub freq_min: f64,
    pub freq_max: f64,
    /// LO synthesizer step; achieved RF frequency snaps to this grid.
    pub lo_step: f64,
    pub gain_min: f64,
    pub gain_max: f64,
    pub gain_step: f64,
    pub antennas: &'static [&'static str],
}

pub const SIM_SLOTS: &'static [SlotCaps; 4] = &[
    SlotCaps {
        slot: "A:0",
        frontend: "RFA wideband receiver",
        freq_min: 50e6,
        freq_max: 2.2e9,
        lo_step: 25e3,
        gain_min: 0.0,
        gain_max: 76.0,
        gain_step: 0.5,
        antennas: &["TX/RX", "RX2", "CAL"],
    },
    SlotCaps {
        slot: "A:1",
        frontend: "RFA wideband receiver",
        freq_min: 50e6,
        freq_max: 2.2e9,
        lo_step: 25e3,
        gain_min: 0.0,
        gain_max: 76.0,
        gain_step: 0.5,
        antennas: &["TX/RX", "RX2"],
    },
    SlotCaps {
        slot: "B:0",
        frontend: "RFB high-band receiver",
        freq_min: 400e6,
        freq_max: 4.4e9,
        lo_step: 50e3,
        gain_min: 0.0,
        gain_max: 62.0,
        gain_step: 1.0,
        antennas: &["RX2", "CAL"],
    },
    SlotCaps {
        slot: "B:1",
        frontend: "RFB high-band receiver",
        freq_min: 400e6,
        freq_max: 4.4e9,
        lo_step: 50e3,
        gain_min: 0.0,
        gain_max: 62.0,
        gain_step: 1.0,
        antennas: &["RX2"],
    },
];

// Simulated clocking
pub const MASTER_CLOCK: f64 = 64e6;
pub const DECIM_MIN: u32 = 4;
pub const DECIM_MAX: u32 = 512;
pub const DEFAULT_RATE: f64 = 1e6;
pub const DEFAULT_FREQ: f64 = 915e6;
pub const DEFAULT_PPS_PERIOD: Duration = Duration::from_secs(1);

// Streaming
pub const CHUNK_SAMPLES: usize = 8192;
pub const DEFAULT_QUEUE_DEPTH: usize = 16;
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(100);
pub const MAX_CONSECUTIVE_ERRORS: u32 = 8;
