use serde::{Deserialize, Serialize};

use crate::{effects::chain::EffectChain, foundation::error::BendResult};

/// The "audio" processor a body is run through.
///
/// `build` interprets `input` as raw single-channel samples in the engine's [`SampleFormat`],
/// applies `chain` in order and returns the processed bytes. The output length is unconstrained;
/// callers normalize it. An empty chain must return `input` unchanged.
pub trait EffectEngine: Send + Sync {
    /// Whether the engine provides an effect called `name`.
    fn supports(&self, name: &str) -> bool;

    /// Every effect name the engine provides, sorted.
    fn effect_names(&self) -> Vec<String>;

    /// Run `chain` over `input`.
    fn build(&self, input: &[u8], chain: &EffectChain) -> BendResult<Vec<u8>>;
}

/// Byte-to-sample encoding of the raw stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleEncoding {
    /// G.711 μ-law, one byte per sample.
    #[default]
    #[serde(rename = "u-law")]
    MuLaw,
    /// Unsigned 8-bit linear PCM centered on 128.
    Unsigned8,
}

impl SampleEncoding {
    /// Name understood by `sox -e`.
    pub fn sox_name(self) -> &'static str {
        match self {
            Self::MuLaw => "u-law",
            Self::Unsigned8 => "unsigned-integer",
        }
    }
}

/// How bytes are interpreted as audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleFormat {
    /// Sample encoding.
    pub encoding: SampleEncoding,
    /// Sample rate in Hz; frequency parameters are relative to it.
    pub rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Let the engine dither when requantizing.
    pub dither: bool,
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self {
            encoding: SampleEncoding::MuLaw,
            rate: 72_000,
            channels: 1,
            dither: true,
        }
    }
}
