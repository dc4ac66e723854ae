use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    codec::animation::FrameTiming,
    effects::{chain::EffectChain, sox::SoxEngine},
    foundation::{
        diag::Diagnostic,
        error::{BendError, BendResult, FrameFailure},
        naming::{self, DEFAULT_FRAME_PATTERN},
    },
    session::{
        bender::{Backends, Bender, BenderOpts},
        mask::Mask,
    },
};

/// Options for one [`MultiBender::bend_varying`] run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceOpts {
    /// Output path pattern; `{}` becomes the zero-padded frame index.
    pub frame_pattern: String,
    /// Bend frames on a rayon pool instead of one after another.
    pub parallel: bool,
    /// Worker count for the pool; `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Assemble the bent frames into this animation.
    pub animation_out: Option<PathBuf>,
    /// Timing for the assembled animation, instead of the timing captured on split.
    pub timing_override: Option<FrameTiming>,
}

impl Default for SequenceOpts {
    fn default() -> Self {
        Self {
            frame_pattern: DEFAULT_FRAME_PATTERN.to_string(),
            parallel: false,
            threads: None,
            animation_out: None,
            timing_override: None,
        }
    }
}

impl SequenceOpts {
    fn validate(&self) -> BendResult<()> {
        if self.frame_pattern.trim().is_empty() {
            return Err(BendError::validation("frame pattern must not be empty"));
        }
        if self.threads == Some(0) {
            return Err(BendError::validation(
                "sequence 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

/// Result of a sequence run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceOutput {
    /// Bent frames; position `i` holds frame `i`.
    pub frames: Vec<PathBuf>,
    /// The assembled animation, when one was requested.
    pub animation: Option<PathBuf>,
}

/// Builder for [`MultiBender`]. Exactly one of [`frames`](Self::frames) or
/// [`animation`](Self::animation) must be given.
#[derive(Debug, Default)]
pub struct MultiBenderBuilder {
    frames: Option<Vec<PathBuf>>,
    animation: Option<PathBuf>,
    opts: BenderOpts,
    backends: Option<Backends>,
}

impl MultiBenderBuilder {
    /// Bend an explicit, ordered list of images.
    pub fn frames<I, P>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.frames = Some(frames.into_iter().map(Into::into).collect());
        self
    }

    /// Bend every frame of an animated container.
    pub fn animation(mut self, path: impl Into<PathBuf>) -> Self {
        self.animation = Some(path.into());
        self
    }

    /// Options applied to every per-frame session.
    pub fn opts(mut self, opts: BenderOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Engine, codecs and sink. Defaults to a [`SoxEngine`] with the `image`-crate codecs.
    pub fn backends(mut self, backends: Backends) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Split the input if needed and open one session per frame.
    pub fn build(self) -> BendResult<MultiBender> {
        let backends = self
            .backends
            .unwrap_or_else(|| Backends::new(Arc::new(SoxEngine::default())));

        let (paths, timing, split) = match (self.frames, self.animation) {
            (Some(frames), None) => (frames, None, false),
            (None, Some(animation)) => {
                let (paths, timing) = backends.animation.split(&animation, &self.opts.work_dir)?;
                (paths, Some(timing), true)
            }
            (Some(_), Some(_)) => {
                return Err(BendError::validation(
                    "give either a frame list or an animation, not both",
                ));
            }
            (None, None) => {
                return Err(BendError::validation(
                    "a frame list or an animation is required",
                ));
            }
        };
        if paths.is_empty() {
            return Err(BendError::validation("a sequence needs at least one frame"));
        }

        let mask = self
            .opts
            .mask
            .as_deref()
            .map(Mask::open)
            .transpose()?
            .map(Arc::new);

        let split_frames = if split { paths.clone() } else { Vec::new() };
        let sessions = paths
            .iter()
            .map(|p| Bender::open_with_mask(p, &self.opts, backends.clone(), mask.clone()))
            .collect::<BendResult<Vec<_>>>()?;

        Ok(MultiBender {
            sessions,
            timing,
            split_frames,
            keep_organs: self.opts.keep_organs,
            backends,
        })
    }
}

/// One [`Bender`] per frame of a sequence.
#[derive(Debug)]
pub struct MultiBender {
    sessions: Vec<Bender>,
    timing: Option<FrameTiming>,
    split_frames: Vec<PathBuf>,
    keep_organs: bool,
    backends: Backends,
}

impl MultiBender {
    /// Start building a sequence.
    pub fn builder() -> MultiBenderBuilder {
        MultiBenderBuilder::default()
    }

    /// Number of frames, and so the number of chains [`bend_varying`](Self::bend_varying) needs.
    pub fn number_of_frames(&self) -> usize {
        self.sessions.len()
    }

    /// Timing captured from the source animation, if the sequence came from one.
    pub fn timing(&self) -> Option<&FrameTiming> {
        self.timing.as_ref()
    }

    /// Per-frame sessions in order.
    pub fn sessions(&self) -> &[Bender] {
        &self.sessions
    }

    /// Bend every frame with the same chain.
    pub fn bend_uniform(&self, chain: &EffectChain, opts: &SequenceOpts) -> BendResult<SequenceOutput> {
        let chains = vec![chain.clone(); self.number_of_frames()];
        self.bend_varying(&chains, opts)
    }

    /// Bend frame `i` with `chains[i]`.
    ///
    /// Every frame is attempted even when some fail; failures come back together as
    /// [`BendError::Frames`] and no animation is assembled.
    #[tracing::instrument(skip(self, chains, opts), fields(frames = self.sessions.len(), parallel = opts.parallel))]
    pub fn bend_varying(
        &self,
        chains: &[EffectChain],
        opts: &SequenceOpts,
    ) -> BendResult<SequenceOutput> {
        if chains.len() != self.sessions.len() {
            return Err(BendError::FrameCountMismatch {
                expected: self.sessions.len(),
                got: chains.len(),
            });
        }
        opts.validate()?;

        let outs: Vec<PathBuf> = (0..self.sessions.len())
            .map(|i| naming::frame_path(&opts.frame_pattern, i))
            .collect();
        let bend_one = |i: usize| self.sessions[i].bend(&chains[i], Some(&outs[i]));

        let results: Vec<BendResult<PathBuf>> = if opts.parallel {
            let pool = build_thread_pool(opts.threads)?;
            pool.install(|| (0..self.sessions.len()).into_par_iter().map(bend_one).collect())
        } else {
            (0..self.sessions.len()).map(bend_one).collect()
        };

        let mut frames = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(path) => frames.push(path),
                Err(error) => {
                    self.backends.sink.emit(&Diagnostic::FrameFailed {
                        index,
                        error: &error.to_string(),
                    });
                    failures.push(FrameFailure { index, error });
                }
            }
        }
        if !failures.is_empty() {
            return Err(BendError::Frames(failures));
        }

        let animation = match &opts.animation_out {
            Some(out) => {
                self.assemble(&frames, opts, out)?;
                Some(out.clone())
            }
            None => None,
        };
        Ok(SequenceOutput { frames, animation })
    }

    fn assemble(&self, frames: &[PathBuf], opts: &SequenceOpts, out: &Path) -> BendResult<()> {
        let timing = opts
            .timing_override
            .clone()
            .or_else(|| self.timing.clone())
            .unwrap_or_default();
        self.backends.animation.assemble(frames, &timing, out)?;
        self.backends.sink.emit(&Diagnostic::Animated {
            output: out,
            frames: frames.len(),
        });
        Ok(())
    }
}

impl Drop for MultiBender {
    fn drop(&mut self) {
        if self.keep_organs {
            return;
        }
        for frame in &self.split_frames {
            let _ = std::fs::remove_file(frame);
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> BendResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| BendError::engine(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/multi.rs"]
mod tests;
