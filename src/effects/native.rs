//! In-process effect engine.
//!
//! A small set of effects implemented directly on decoded samples, for machines without SoX and
//! for tests. Parameter names and units follow the SoX effects of the same name.

use crate::{
    effects::{
        chain::{EffectChain, EffectParams},
        engine::{EffectEngine, SampleFormat},
        mulaw,
        registry::EffectRegistry,
    },
    foundation::error::{BendError, BendResult},
};

/// A resolved native effect.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeOp {
    /// Multiply every sample, optionally after normalizing the peak to full scale.
    Gain {
        /// Linear factor.
        factor: f32,
        /// Normalize to 0 dBFS first.
        normalize: bool,
    },
    /// Play backwards.
    Reverse,
    /// Delayed, decayed copies mixed onto the input; extends the stream by the longest delay.
    Echo {
        /// Input gain.
        gain_in: f32,
        /// Output gain.
        gain_out: f32,
        /// `(delay_ms, decay)` pairs.
        taps: Vec<(f64, f32)>,
    },
    /// One-pole low-pass filter.
    Lowpass {
        /// Cutoff in Hz.
        frequency: f64,
    },
    /// One-pole high-pass filter.
    Highpass {
        /// Cutoff in Hz.
        frequency: f64,
    },
    /// Linear-interpolation resample; changes the stream length by `1 / factor`.
    Speed {
        /// Playback speed factor.
        factor: f64,
    },
}

impl NativeOp {
    fn apply(&self, samples: Vec<f32>, rate: u32) -> BendResult<Vec<f32>> {
        match self {
            Self::Gain { factor, normalize } => {
                let mut samples = samples;
                let mut factor = *factor;
                if *normalize {
                    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
                    if peak > 0.0 {
                        factor /= peak;
                    }
                }
                samples.iter_mut().for_each(|s| *s *= factor);
                Ok(samples)
            }
            Self::Reverse => {
                let mut samples = samples;
                samples.reverse();
                Ok(samples)
            }
            Self::Echo {
                gain_in,
                gain_out,
                taps,
            } => {
                let n = samples.len();
                let longest = taps.iter().map(|(ms, _)| *ms).fold(0.0, f64::max);
                let total = checked_len("echo", n as f64 + ms_to_samples(longest, rate), n, rate)?;
                let delays: Vec<(usize, f32)> = taps
                    .iter()
                    .map(|(ms, decay)| (ms_to_samples(*ms, rate) as usize, *decay))
                    .collect();
                let mut out = vec![0.0f32; total];
                for (t, o) in out.iter_mut().enumerate() {
                    let mut acc = samples.get(t).copied().unwrap_or(0.0);
                    for (d, decay) in &delays {
                        if let Some(src) = t.checked_sub(*d).and_then(|i| samples.get(i)) {
                            acc += decay * src;
                        }
                    }
                    *o = acc * gain_in * gain_out;
                }
                Ok(out)
            }
            Self::Lowpass { frequency } => {
                let a = one_pole_coefficient(*frequency, rate)?;
                Ok(one_pole(&samples, a))
            }
            Self::Highpass { frequency } => {
                let a = one_pole_coefficient(*frequency, rate)?;
                let low = one_pole(&samples, a);
                Ok(samples.iter().zip(low).map(|(x, l)| x - l).collect())
            }
            Self::Speed { factor } => resample(&samples, *factor, rate),
        }
    }
}

/// A stream may grow to this multiple of its input length, or to one second of audio if that is
/// longer.
pub const MAX_GROWTH: usize = 64;

fn ms_to_samples(ms: f64, rate: u32) -> f64 {
    (ms * f64::from(rate) / 1000.0).round()
}

fn checked_len(effect: &str, len: f64, input: usize, rate: u32) -> BendResult<usize> {
    let limit = input
        .saturating_mul(MAX_GROWTH)
        .max(usize::try_from(rate).unwrap_or(usize::MAX));
    if !len.is_finite() || len < 0.0 || len > limit as f64 {
        return Err(BendError::parameter(format!(
            "{effect}: output of {len} samples exceeds the limit of {limit}"
        )));
    }
    Ok(len as usize)
}

fn one_pole_coefficient(frequency: f64, rate: u32) -> BendResult<f32> {
    let nyquist = f64::from(rate) / 2.0;
    if frequency >= nyquist {
        return Err(BendError::parameter(format!(
            "frequency {frequency} must be below the Nyquist frequency {nyquist}"
        )));
    }
    Ok((1.0 - (-2.0 * std::f64::consts::PI * frequency / f64::from(rate)).exp()) as f32)
}

fn one_pole(samples: &[f32], a: f32) -> Vec<f32> {
    let mut y = 0.0f32;
    samples
        .iter()
        .map(|x| {
            y += a * (x - y);
            y
        })
        .collect()
}

fn resample(samples: &[f32], factor: f64, rate: u32) -> BendResult<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    let out_len = checked_len(
        "speed",
        (samples.len() as f64 / factor).round(),
        samples.len(),
        rate,
    )?;
    let last = samples.len() - 1;
    Ok((0..out_len)
        .map(|i| {
            let pos = i as f64 * factor;
            let i0 = (pos.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let frac = (pos - i0 as f64).clamp(0.0, 1.0) as f32;
            samples[i0] + (samples[i1] - samples[i0]) * frac
        })
        .collect())
}

fn db_to_factor(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

fn positive(p: &EffectParams, key: &str, default: Option<f64>) -> BendResult<f64> {
    let v = match default {
        Some(d) => p.f64_or(key, d)?,
        None => p.f64(key)?,
    };
    if !v.is_finite() || v <= 0.0 {
        return Err(BendError::parameter(format!(
            "{key} must be a finite value > 0, got {v}"
        )));
    }
    Ok(v)
}

fn echo(p: &EffectParams) -> BendResult<NativeOp> {
    let gain_in = p.f64_or("gain_in", 0.8)?;
    if gain_in <= 0.0 || gain_in > 1.0 {
        return Err(BendError::parameter("gain_in must be in (0, 1]"));
    }
    let gain_out = positive(p, "gain_out", Some(0.9))?;
    let n_echos = p.u32_or("n_echos", 1)? as usize;
    if n_echos == 0 {
        return Err(BendError::parameter("n_echos must be >= 1"));
    }
    let delays = p.f64_list_or("delays", &[60.0])?;
    let decays = p.f64_list_or("decays", &[0.4])?;
    if delays.len() != n_echos || decays.len() != n_echos {
        return Err(BendError::parameter(format!(
            "delays and decays must both have n_echos ({n_echos}) entries"
        )));
    }
    if delays.iter().any(|d| !d.is_finite() || *d <= 0.0) {
        return Err(BendError::parameter("delays must be finite and > 0"));
    }
    if decays.iter().any(|d| *d <= 0.0 || *d > 1.0) {
        return Err(BendError::parameter("decays must be in (0, 1]"));
    }
    Ok(NativeOp::Echo {
        gain_in: gain_in as f32,
        gain_out: gain_out as f32,
        taps: delays
            .into_iter()
            .zip(decays.into_iter().map(|d| d as f32))
            .collect(),
    })
}

fn vol(p: &EffectParams) -> BendResult<NativeOp> {
    let gain = p.f64("gain")?;
    let factor = match p.str_or("gain_type", "amplitude")? {
        "amplitude" => gain as f32,
        "db" => db_to_factor(gain),
        "power" => {
            if gain < 0.0 {
                return Err(BendError::parameter("power gain must be >= 0"));
            }
            gain.sqrt() as f32
        }
        other => {
            return Err(BendError::parameter(format!(
                "gain_type must be amplitude, db or power, got '{other}'"
            )));
        }
    };
    Ok(NativeOp::Gain {
        factor,
        normalize: false,
    })
}

fn native_registry() -> EffectRegistry<NativeOp> {
    let mut reg = EffectRegistry::new();
    reg.register("gain", |p| {
        Ok(NativeOp::Gain {
            factor: db_to_factor(p.f64_or("gain_db", 0.0)?),
            normalize: p.bool_or("normalize", true)?,
        })
    })
    .register("vol", vol)
    .register("reverse", |_| Ok(NativeOp::Reverse))
    .register("echo", echo)
    .register("lowpass", |p| {
        Ok(NativeOp::Lowpass {
            frequency: positive(p, "frequency", None)?,
        })
    })
    .register("highpass", |p| {
        Ok(NativeOp::Highpass {
            frequency: positive(p, "frequency", None)?,
        })
    })
    .register("speed", |p| {
        Ok(NativeOp::Speed {
            factor: positive(p, "factor", None)?,
        })
    });
    reg
}

/// Effect engine that runs entirely in-process.
///
/// Only mono streams are supported. Effects that lengthen the stream are bounded by
/// [`MAX_GROWTH`].
#[derive(Debug)]
pub struct NativeEngine {
    format: SampleFormat,
    registry: EffectRegistry<NativeOp>,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self {
            format: SampleFormat::default(),
            registry: native_registry(),
        }
    }
}

impl NativeEngine {
    /// Engine reading and writing `format`. Fails unless `format` is mono.
    pub fn new(format: SampleFormat) -> BendResult<Self> {
        if format.channels != 1 {
            return Err(BendError::validation(format!(
                "the native engine processes mono streams only, got {} channels",
                format.channels
            )));
        }
        Ok(Self {
            format,
            ..Self::default()
        })
    }

    /// The sample format in use.
    pub fn format(&self) -> SampleFormat {
        self.format
    }
}

impl EffectEngine for NativeEngine {
    fn supports(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    fn effect_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn build(&self, input: &[u8], chain: &EffectChain) -> BendResult<Vec<u8>> {
        if chain.is_empty() {
            return Ok(input.to_vec());
        }

        let ops = self.registry.resolve_chain(chain)?;
        let mut samples = mulaw::decode(input, self.format.encoding);
        for op in &ops {
            samples = op
                .apply(samples, self.format.rate)
                .map_err(|e| e.with_chain(chain.dump()))?;
        }
        Ok(mulaw::encode(&samples, self.format.encoding))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/native.rs"]
mod tests;
