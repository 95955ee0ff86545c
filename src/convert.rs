//! Over-the-wire sample codec.
//!
//! Devices deliver raw little-endian sample words; the graph side works in
//! `Complex<f32>`. Scaling follows the usual convention: full-scale sc16
//! maps to +/-1.0.

use byteorder::{ByteOrder, LittleEndian};
use num_complex::Complex;

use crate::SampleFormat;

const SC16_SCALE: f32 = 32767.0;

/// Decode `bytes` in `format` and append the samples to `out`.
/// Returns the number of samples appended. A trailing partial sample word
/// is dropped.
pub fn wire_to_complex(format: SampleFormat, bytes: &[u8], out: &mut Vec<Complex<f32>>) -> usize {
    let before = out.len();
    match format {
        SampleFormat::Sc16 => {
            for word in bytes.chunks_exact(4) {
                let re = LittleEndian::read_i16(&word[0..2]) as f32 / SC16_SCALE;
                let im = LittleEndian::read_i16(&word[2..4]) as f32 / SC16_SCALE;
                out.push(Complex::new(re, im));
            }
        }
        SampleFormat::Fc32 => {
            for word in bytes.chunks_exact(8) {
                let re = LittleEndian::read_f32(&word[0..4]);
                let im = LittleEndian::read_f32(&word[4..8]);
                out.push(Complex::new(re, im));
            }
        }
    }
    out.len() - before
}

/// Encode `samples` into `format` wire bytes, appending to `out`. Values
/// outside +/-1.0 saturate in the sc16 path.
pub fn complex_to_wire(format: SampleFormat, samples: &[Complex<f32>], out: &mut Vec<u8>) {
    match format {
        SampleFormat::Sc16 => {
            let mut word = [0u8; 4];
            for s in samples {
                let re = (s.re * SC16_SCALE).clamp(-SC16_SCALE, SC16_SCALE) as i16;
                let im = (s.im * SC16_SCALE).clamp(-SC16_SCALE, SC16_SCALE) as i16;
                LittleEndian::write_i16(&mut word[0..2], re);
                LittleEndian::write_i16(&mut word[2..4], im);
                out.extend_from_slice(&word);
            }
        }
        SampleFormat::Fc32 => {
            let mut word = [0u8; 8];
            for s in samples {
                LittleEndian::write_f32(&mut word[0..4], s.re);
                LittleEndian::write_f32(&mut word[4..8], s.im);
                out.extend_from_slice(&word);
            }
        }
    }
}
