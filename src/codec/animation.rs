//! Animated containers: split into native frames, assemble from frames.

use std::{
    fs::File,
    io::{BufReader, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use image::{
    AnimationDecoder, Delay, DynamicImage, Frame, ImageFormat,
    codecs::gif::{GifDecoder, GifEncoder, Repeat},
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::foundation::{
    error::{BendError, BendResult},
    naming::{self, FRAME_INDEX_WIDTH},
};

/// Per-frame delays plus a loop count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTiming {
    /// Delay of each frame in milliseconds. A single entry applies to every frame.
    pub delays_ms: Vec<u32>,
    /// Number of times to play; `0` loops forever.
    pub loop_count: u16,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::uniform(Self::DEFAULT_DELAY_MS)
    }
}

impl FrameTiming {
    /// Delay used when nothing else is known.
    pub const DEFAULT_DELAY_MS: u32 = 80;

    /// Same delay for every frame, looping forever.
    pub fn uniform(delay_ms: u32) -> Self {
        Self {
            delays_ms: vec![delay_ms],
            loop_count: 0,
        }
    }

    /// Explicit per-frame delays, looping forever.
    pub fn per_frame(delays_ms: Vec<u32>) -> Self {
        Self {
            delays_ms,
            loop_count: 0,
        }
    }

    /// Delays for exactly `frames` frames.
    ///
    /// An empty list falls back to the default delay and a single delay is broadcast; any other
    /// length must equal `frames`.
    pub fn delays_for(&self, frames: usize) -> BendResult<Vec<u32>> {
        match self.delays_ms.as_slice() {
            [] => Ok(vec![Self::DEFAULT_DELAY_MS; frames]),
            [one] => Ok(vec![*one; frames]),
            many if many.len() == frames => Ok(many.to_vec()),
            many => Err(BendError::validation(format!(
                "timing has {} delays for {frames} frames",
                many.len()
            ))),
        }
    }
}

/// Splits and assembles an animated container.
pub trait AnimationCodec: Send + Sync {
    /// Write every frame of `path` into `work_dir` as a native BMP and return the frame paths in
    /// playback order with the timing found in the container.
    fn split(&self, path: &Path, work_dir: &Path) -> BendResult<(Vec<PathBuf>, FrameTiming)>;

    /// Encode `frames` (any raster format) into an animation at `out_path`.
    fn assemble(&self, frames: &[PathBuf], timing: &FrameTiming, out_path: &Path)
    -> BendResult<()>;
}

/// GIF [`AnimationCodec`] backed by the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct GifCodec;

impl AnimationCodec for GifCodec {
    fn split(&self, path: &Path, work_dir: &Path) -> BendResult<(Vec<PathBuf>, FrameTiming)> {
        let file = File::open(path).with_context(|| format!("open gif '{}'", path.display()))?;
        let decoder = GifDecoder::new(BufReader::new(file))
            .with_context(|| format!("decode gif '{}'", path.display()))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .with_context(|| format!("decode gif frames of '{}'", path.display()))?;
        if frames.is_empty() {
            return Err(BendError::validation(format!(
                "'{}' has no frames",
                path.display()
            )));
        }

        std::fs::create_dir_all(work_dir)
            .with_context(|| format!("create work dir '{}'", work_dir.display()))?;
        let base = naming::sanitize(path);

        let mut paths = Vec::with_capacity(frames.len());
        let mut delays = Vec::with_capacity(frames.len());
        for (i, frame) in frames.into_iter().enumerate() {
            delays.push(delay_ms(frame.delay()));
            let rgb = DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
            let out = work_dir.join(format!("{base}_{i:0width$}.bmp", width = FRAME_INDEX_WIDTH));
            rgb.save_with_format(&out, ImageFormat::Bmp)
                .with_context(|| format!("write frame '{}'", out.display()))?;
            paths.push(out);
        }

        Ok((paths, FrameTiming::per_frame(delays)))
    }

    fn assemble(
        &self,
        frames: &[PathBuf],
        timing: &FrameTiming,
        out_path: &Path,
    ) -> BendResult<()> {
        if frames.is_empty() {
            return Err(BendError::validation("cannot assemble an animation from zero frames"));
        }
        let delays = timing.delays_for(frames.len())?;

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let repeat = match timing.loop_count {
                0 => Repeat::Infinite,
                n => Repeat::Finite(n),
            };
            encoder.set_repeat(repeat).context("set gif repeat")?;

            let mut dims = None;
            for (path, ms) in frames.iter().zip(delays) {
                let rgba = image::open(path)
                    .with_context(|| format!("read frame '{}'", path.display()))?
                    .to_rgba8();
                let these = rgba.dimensions();
                match dims {
                    None => dims = Some(these),
                    Some(first) if first != these => {
                        return Err(BendError::validation(format!(
                            "frame '{}' is {}x{}, expected {}x{}",
                            path.display(),
                            these.0,
                            these.1,
                            first.0,
                            first.1
                        )));
                    }
                    Some(_) => {}
                }
                let frame = Frame::from_parts(rgba, 0, 0, Delay::from_numer_denom_ms(ms, 1));
                encoder
                    .encode_frame(frame)
                    .with_context(|| format!("encode frame '{}'", path.display()))?;
            }
        }

        // Same directory as the target: `persist` is a rename.
        naming::ensure_parent_dir(out_path)?;
        let dir = match out_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("stage gif in '{}'", dir.display()))?;
        staged
            .write_all(&bytes)
            .with_context(|| format!("write gif '{}'", out_path.display()))?;
        staged
            .flush()
            .with_context(|| format!("flush gif '{}'", out_path.display()))?;
        staged
            .persist(out_path)
            .with_context(|| format!("persist gif '{}'", out_path.display()))?;
        Ok(())
    }
}

fn delay_ms(delay: Delay) -> u32 {
    let (numer, denom) = delay.numer_denom_ms();
    if denom == 0 {
        return FrameTiming::DEFAULT_DELAY_MS;
    }
    (f64::from(numer) / f64::from(denom)).round() as u32
}

#[cfg(test)]
#[path = "../../tests/unit/codec/animation.rs"]
mod tests;
