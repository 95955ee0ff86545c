use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use num_complex::Complex;
use usrp_source_rs::{
    convert, ClockConfig, SampleFormat, TimeSpec, TuneRequest, UsrpSource, DEFAULT_BUF_LENGTH,
    DEFAULT_NUM_CHANNELS,
};

const DEFAULT_ADDR: &str = "type=sim";
const DEFAULT_FREQUENCY: f64 = 915_000_000.0;
const DEFAULT_SAMPLE_RATE: f64 = 1_000_000.0;

#[derive(Clone, Debug)]
struct AppConfig {
    addr: String,
    frequency: f64,
    sample_rate: f64,
    gain: Option<f64>,
    antenna: Option<String>,
    format: SampleFormat,
    channels: usize,
    sample_count: Option<u64>,
    output: Option<String>,
    external_refs: bool,
}

fn main() {
    stderrlog::new().verbosity(log::Level::Info).init().unwrap();
    if let Err(err) = run() {
        eprintln!("usrp_capture: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config = parse_args()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown_flag = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown_flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| format!("Failed to set signal handler: {}", e))?;
    }

    let source = setup_source(&config)?;

    let mut writer = match &config.output {
        Some(path) => {
            let file = File::create(path).map_err(|e| format!("Failed to create {}: {}", path, e))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let mut chan_bufs: Vec<Vec<Complex<f32>>> =
        vec![vec![Complex::new(0.0, 0.0); DEFAULT_BUF_LENGTH]; config.channels];
    let mut wire = Vec::new();
    let mut total: u64 = 0;
    let mut segments: u64 = 0;
    let started = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        let want = match config.sample_count {
            Some(count) => {
                let left = count - total;
                if left == 0 {
                    break;
                }
                (left as usize).min(DEFAULT_BUF_LENGTH)
            }
            None => DEFAULT_BUF_LENGTH,
        };

        let block = {
            let mut outputs: Vec<&mut [Complex<f32>]> =
                chan_bufs.iter_mut().map(|b| b.as_mut_slice()).collect();
            source.work(&mut outputs, want)
        }
        .map_err(|e| format!("Streaming failed: {}", e))?;

        if let Some(tag) = block.tag {
            segments += 1;
            println!("Segment {} starts at t={} ({} S/s)", segments, tag.time, tag.rate);
        }
        if block.samples == 0 {
            continue;
        }
        total += block.samples as u64;

        if let Some(writer) = writer.as_mut() {
            wire.clear();
            convert::complex_to_wire(
                SampleFormat::Fc32,
                &chan_bufs[0][..block.samples],
                &mut wire,
            );
            writer.write_all(&wire).map_err(|e| format!("Failed to write output: {}", e))?;
        }
    }

    source.stop().map_err(|e| format!("Failed to stop streaming: {}", e))?;
    if let Some(writer) = writer.as_mut() {
        writer.flush().map_err(|e| format!("Failed to flush output: {}", e))?;
    }

    let elapsed = started.elapsed().as_secs_f64();
    println!(
        "Captured {} samples in {:.2} s ({} segment(s))",
        total, elapsed, segments
    );
    println!("bye!");
    Ok(())
}

fn parse_args() -> Result<AppConfig, String> {
    let mut config = AppConfig {
        addr: DEFAULT_ADDR.to_string(),
        frequency: DEFAULT_FREQUENCY,
        sample_rate: DEFAULT_SAMPLE_RATE,
        gain: None,
        antenna: None,
        format: SampleFormat::Sc16,
        channels: DEFAULT_NUM_CHANNELS,
        sample_count: None,
        output: None,
        external_refs: false,
    };

    let args: Vec<String> = env::args().skip(1).collect();
    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-a" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -a")?;
                config.addr = value.clone();
            }
            "-f" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -f")?;
                config.frequency = parse_scaled(value)?;
            }
            "-s" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -s")?;
                config.sample_rate = parse_scaled(value)?;
            }
            "-g" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -g")?;
                let gain = value.parse::<f64>().map_err(|e| format!("Invalid gain: {}", e))?;
                config.gain = Some(gain);
            }
            "-A" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -A")?;
                config.antenna = Some(value.clone());
            }
            "-F" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -F")?;
                config.format = value
                    .parse::<SampleFormat>()
                    .map_err(|e| format!("Invalid format: {}", e))?;
            }
            "-c" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -c")?;
                config.channels = value
                    .parse::<usize>()
                    .map_err(|e| format!("Invalid channel count: {}", e))?;
            }
            "-n" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -n")?;
                config.sample_count = Some(parse_scaled(value)?.round() as u64);
            }
            "-o" => {
                idx += 1;
                let value = args.get(idx).ok_or("Missing value for -o")?;
                config.output = Some(value.clone());
            }
            "-x" => {
                config.external_refs = true;
            }
            other => {
                return Err(format!("Unknown argument: {}", other));
            }
        }
        idx += 1;
    }

    Ok(config)
}

fn print_usage() {
    println!("usrp_capture, an I/Q recorder for USRP receivers");
    println!("Usage: usrp_capture [options]\n");
    println!("  -a device address (default: {})", DEFAULT_ADDR);
    println!("  -f frequency to tune to [Hz] (default: {} Hz)", DEFAULT_FREQUENCY);
    println!("  -s samplerate in Hz (default: {} Hz)", DEFAULT_SAMPLE_RATE);
    println!("  -g gain in dB (default: hardware default)");
    println!("  -A antenna name (default: hardware default)");
    println!("  -F wire format, sc16 or fc32 (default: sc16)");
    println!("  -c channel count (default: {})", DEFAULT_NUM_CHANNELS);
    println!("  -n number of samples to capture (default: until Ctrl-C)");
    println!("  -o output file, channel 0 as interleaved LE f32 I/Q");
    println!("  -x use external clock and PPS references");
}

fn parse_scaled(value: &str) -> Result<f64, String> {
    if value.is_empty() {
        return Err("Empty numeric value".to_string());
    }
    let mut factor = 1f64;
    let mut digits = value;
    if let Some(last) = value.chars().last() {
        match last {
            'k' | 'K' => {
                factor = 1e3;
                digits = &value[..value.len() - 1];
            }
            'M' | 'm' => {
                factor = 1e6;
                digits = &value[..value.len() - 1];
            }
            'G' | 'g' => {
                factor = 1e9;
                digits = &value[..value.len() - 1];
            }
            _ => {}
        }
    }
    let number = digits
        .parse::<f64>()
        .map_err(|e| format!("Invalid number '{}': {}", value, e))?;
    if number < 0.0 {
        return Err(format!("Value must be positive: {}", value));
    }
    Ok(number * factor)
}

fn setup_source(config: &AppConfig) -> Result<UsrpSource, String> {
    let source = UsrpSource::open(&config.addr, config.format, config.channels)
        .map_err(|e| format!("Failed to open device: {}", e))?;

    if config.external_refs {
        source
            .set_clock_config(ClockConfig::external())
            .map_err(|e| format!("Failed to select external references: {}", e))?;
        source
            .set_time_next_pps(TimeSpec::ZERO)
            .map_err(|e| format!("Failed to arm PPS time latch: {}", e))?;
    } else {
        source
            .set_time_now(TimeSpec::ZERO)
            .map_err(|e| format!("Failed to zero device time: {}", e))?;
    }

    source
        .set_samp_rate(config.sample_rate)
        .map_err(|e| format!("Failed to set sample rate: {}", e))?;
    println!("Sampling at {} S/s", source.get_samp_rate());

    for chan in 0..config.channels {
        let result = source
            .set_center_freq(TuneRequest::new(config.frequency), chan)
            .map_err(|e| format!("Failed to tune channel {}: {}", chan, e))?;
        println!("Channel {} tuned to {} Hz", chan, result.actual_freq());

        if let Some(gain) = config.gain {
            source
                .set_gain(gain, chan)
                .map_err(|e| format!("Failed to set gain on channel {}: {}", chan, e))?;
            let applied = source
                .get_gain(chan)
                .map_err(|e| format!("Failed to read gain on channel {}: {}", chan, e))?;
            println!("Channel {} gain {} dB", chan, applied);
        }

        if let Some(name) = &config.antenna {
            source
                .set_antenna(name, chan)
                .map_err(|e| format!("Failed to select antenna on channel {}: {}", chan, e))?;
        }
    }

    Ok(source)
}
