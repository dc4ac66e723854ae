//! sockbend databends raster images by treating their pixel payload as raw audio.
//!
//! # Pipeline overview
//!
//! 1. **Separate**: a BMP is split at the pixel-array offset into an immutable header and a body
//!    ([`separator`]). Other formats are converted to BMP first ([`ImageCodec`]).
//! 2. **Bend**: the body runs through an [`EffectChain`] on an [`EffectEngine`], either the system
//!    `sox` binary ([`SoxEngine`]) or the in-process [`NativeEngine`].
//! 3. **Normalize**: the engine output is truncated or zero-padded back to the original body
//!    length, so the stored header stays valid.
//! 4. **Reattach**: header and bent body are joined, optionally re-encoded and optionally merged
//!    with the original under a [`Mask`].
//!
//! A [`Bender`] owns one separated image and bends it any number of times. A [`MultiBender`]
//! drives one session per frame of a sequence or animated GIF, sequentially or on a rayon pool,
//! and can assemble the results into a new animation.
//!
//! The library reports through a [`DiagnosticSink`] and never installs a `tracing` subscriber on
//! its own.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod container;
mod effects;
mod foundation;
mod sequence;
mod session;

pub use codec::animation::{AnimationCodec, FrameTiming, GifCodec};
pub use codec::image::{ImageCodec, RasterCodec, extension_for, format_from_extension};
pub use container::separator::{self, SeparatedPair};
pub use effects::chain::{EffectChain, EffectParams, EffectSpec, load_chain, load_chain_sequence};
pub use effects::engine::{EffectEngine, SampleEncoding, SampleFormat};
pub use effects::mulaw;
pub use effects::native::{NativeEngine, NativeOp};
pub use effects::registry::{EffectBuilder, EffectRegistry};
pub use effects::sox::{SoxEngine, SoxOpts, is_sox_on_path};
pub use foundation::diag::{Diagnostic, DiagnosticSink, MemorySink, NullSink, TracingSink};
pub use foundation::error::{BendError, BendResult, FrameFailure};
pub use foundation::naming;
pub use sequence::curve::{sin_up_down, sweep};
pub use sequence::multi::{MultiBender, MultiBenderBuilder, SequenceOpts, SequenceOutput};
pub use session::bender::{Backends, Bender, BenderOpts};
pub use session::mask::Mask;
