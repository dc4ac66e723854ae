//! Byte <-> sample conversion for the in-process engine.

use crate::effects::engine::SampleEncoding;

const BIAS: i32 = 0x84;
const CLIP: i32 = 32_635;

/// Decode one G.711 μ-law byte to a 16-bit linear sample.
pub fn mulaw_decode(byte: u8) -> i16 {
    let u = !byte;
    let exponent = (u >> 4) & 0x07;
    let mantissa = i32::from(u & 0x0F);
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if u & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Encode a 16-bit linear sample as G.711 μ-law.
pub fn mulaw_encode(sample: i16) -> u8 {
    let mut s = i32::from(sample);
    let sign = if s < 0 {
        s = -s;
        0x80u8
    } else {
        0
    };
    s = s.min(CLIP) + BIAS;

    let mut exponent = 7u8;
    let mut mask = 0x4000;
    while s & mask == 0 && exponent > 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = ((s >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

/// Decode a raw byte stream into samples in `[-1, 1]`.
pub fn decode(bytes: &[u8], encoding: SampleEncoding) -> Vec<f32> {
    match encoding {
        SampleEncoding::MuLaw => bytes
            .iter()
            .map(|&b| f32::from(mulaw_decode(b)) / 32_768.0)
            .collect(),
        SampleEncoding::Unsigned8 => bytes
            .iter()
            .map(|&b| (f32::from(b) - 128.0) / 128.0)
            .collect(),
    }
}

/// Encode samples back to raw bytes, clipping to `[-1, 1]`.
pub fn encode(samples: &[f32], encoding: SampleEncoding) -> Vec<u8> {
    match encoding {
        SampleEncoding::MuLaw => samples
            .iter()
            .map(|&s| {
                let v = (s.clamp(-1.0, 1.0) * 32_767.0).round() as i16;
                mulaw_encode(v)
            })
            .collect(),
        SampleEncoding::Unsigned8 => samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 128.0 + 128.0).round().min(255.0) as u8)
            .collect(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/mulaw.rs"]
mod tests;
