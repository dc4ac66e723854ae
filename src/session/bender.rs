use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::{
    codec::{
        animation::{AnimationCodec, FrameTiming, GifCodec},
        image::{ImageCodec, RasterCodec, extension_for, format_from_extension},
    },
    container::separator::{self, SeparatedPair},
    effects::{chain::EffectChain, engine::EffectEngine},
    foundation::{
        diag::{Diagnostic, DiagnosticSink, TracingSink},
        error::{BendError, BendResult},
        naming::{self, DEFAULT_WORK_DIR},
    },
    session::mask::Mask,
};

/// Options for [`Bender::open`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenderOpts {
    /// Where header, body and converted inputs are written.
    pub work_dir: PathBuf,
    /// Output extension (`"png"`, `"bmp"`, ...) for the default destination and for destinations
    /// without an extension. Defaults to the input's extension.
    pub output_format: Option<String>,
    /// Optional mask image selecting which pixels take the bent value.
    pub mask: Option<PathBuf>,
    /// Leave the working files behind when the session is dropped.
    pub keep_organs: bool,
}

impl Default for BenderOpts {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            output_format: None,
            mask: None,
            keep_organs: false,
        }
    }
}

/// The collaborators a session drives: effect engine, codecs and diagnostic sink.
#[derive(Clone)]
pub struct Backends {
    /// Processes bodies.
    pub engine: Arc<dyn EffectEngine>,
    /// Converts between raster formats and the native container.
    pub image: Arc<dyn ImageCodec>,
    /// Splits and assembles animations.
    pub animation: Arc<dyn AnimationCodec>,
    /// Receives diagnostics.
    pub sink: Arc<dyn DiagnosticSink>,
}

impl Backends {
    /// `engine` with the `image`-crate codecs and a [`TracingSink`].
    pub fn new(engine: Arc<dyn EffectEngine>) -> Self {
        Self {
            engine,
            image: Arc::new(RasterCodec),
            animation: Arc::new(GifCodec),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the image codec.
    pub fn with_image_codec(mut self, image: Arc<dyn ImageCodec>) -> Self {
        self.image = image;
        self
    }

    /// Replace the animation codec.
    pub fn with_animation_codec(mut self, animation: Arc<dyn AnimationCodec>) -> Self {
        self.animation = animation;
        self
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("effects", &self.engine.effect_names())
            .finish_non_exhaustive()
    }
}

/// A transform session over one image.
///
/// The input is separated once; every [`Bender::bend`] runs the stored body through an effect
/// chain, forces the result back to the original body length, reattaches the stored header and
/// writes one output file. The stored header and body never change, so a session can bend any
/// number of times, including from several threads.
#[derive(Debug)]
pub struct Bender {
    in_path: PathBuf,
    native_path: PathBuf,
    converted: bool,
    head_path: PathBuf,
    body_path: PathBuf,
    pair: SeparatedPair,
    output_format: ImageFormat,
    mask: Option<Arc<Mask>>,
    keep_organs: bool,
    backends: Backends,
}

impl Bender {
    /// Open a session over `in_path`.
    ///
    /// Non-BMP inputs are converted to a BMP inside the work directory first.
    pub fn open(in_path: impl AsRef<Path>, opts: &BenderOpts, backends: Backends) -> BendResult<Self> {
        let mask = opts
            .mask
            .as_deref()
            .map(Mask::open)
            .transpose()?
            .map(Arc::new);
        Self::open_with_mask(in_path.as_ref(), opts, backends, mask)
    }

    /// Like [`Bender::open`] but with an already loaded mask, ignoring `opts.mask`.
    pub fn open_with_mask(
        in_path: &Path,
        opts: &BenderOpts,
        backends: Backends,
        mask: Option<Arc<Mask>>,
    ) -> BendResult<Self> {
        let ext = naming::extension_lower(in_path).ok_or_else(|| {
            BendError::validation(format!(
                "cannot tell the image format of '{}' without an extension",
                in_path.display()
            ))
        })?;
        let in_format = format_from_extension(&ext)?;
        let output_format = match opts.output_format.as_deref() {
            Some(ext) => format_from_extension(ext)?,
            None => in_format,
        };

        let tag = naming::session_tag();
        let converted = in_format != ImageFormat::Bmp;
        let native_path = if converted {
            let native = backends.image.decode_to_native(in_path)?;
            let to = opts
                .work_dir
                .join(format!("{}_{tag}.bmp", naming::sanitize(in_path)));
            naming::ensure_parent_dir(&to)?;
            std::fs::write(&to, native)
                .with_context(|| format!("write converted input '{}'", to.display()))?;
            backends.sink.emit(&Diagnostic::Converted {
                from: in_path,
                to: &to,
            });
            to
        } else {
            in_path.to_path_buf()
        };

        let (head_path, body_path) = naming::organ_paths(&opts.work_dir, in_path, &tag);
        let pair = separator::decapitate(&native_path, &head_path, &body_path)?;
        backends.sink.emit(&Diagnostic::Separated {
            input: &native_path,
            header_len: pair.header.len(),
            body_len: pair.body_length(),
        });

        Ok(Self {
            in_path: in_path.to_path_buf(),
            native_path,
            converted,
            head_path,
            body_path,
            pair,
            output_format,
            mask,
            keep_organs: opts.keep_organs,
            backends,
        })
    }

    /// The path the session was opened with.
    pub fn in_path(&self) -> &Path {
        &self.in_path
    }

    /// The BMP the session separated (the input itself, or its converted copy).
    pub fn native_path(&self) -> &Path {
        &self.native_path
    }

    /// Stored header bytes.
    pub fn header(&self) -> &[u8] {
        &self.pair.header
    }

    /// Stored body bytes.
    pub fn body(&self) -> &[u8] {
        &self.pair.body
    }

    /// Length every bent body is normalized to.
    pub fn body_length(&self) -> usize {
        self.pair.body_length()
    }

    /// Format outputs are written in.
    pub fn output_format(&self) -> ImageFormat {
        self.output_format
    }

    /// Persisted header and body paths.
    pub fn organ_paths(&self) -> (&Path, &Path) {
        (&self.head_path, &self.body_path)
    }

    /// Default destination: `<input stem>_bent.<output ext>` next to the input.
    pub fn default_out_path(&self) -> PathBuf {
        naming::default_bent_path(&self.in_path, extension_for(self.output_format))
    }

    /// Format a bend to `out` is encoded in: the extension of `out`, or the session's output
    /// format when `out` has none.
    pub fn format_for(&self, out: &Path) -> BendResult<ImageFormat> {
        match naming::extension_lower(out) {
            Some(ext) => format_from_extension(&ext),
            None => Ok(self.output_format),
        }
    }

    /// Bend the stored body through `chain` and write the result.
    ///
    /// Returns the path written, `out_path` or [`Bender::default_out_path`]. The encoding follows
    /// [`Bender::format_for`].
    #[tracing::instrument(skip(self, chain), fields(input = %self.in_path.display(), effects = chain.len()))]
    pub fn bend(&self, chain: &EffectChain, out_path: Option<&Path>) -> BendResult<PathBuf> {
        let out = out_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_out_path());
        let format = self.format_for(&out)?;
        self.backends.sink.emit(&Diagnostic::Bending {
            input: &self.native_path,
            output: &out,
            effects: chain.len(),
        });

        let bytes = self.render_as(chain, format)?;
        naming::ensure_parent_dir(&out)?;
        std::fs::write(&out, bytes).with_context(|| format!("write '{}'", out.display()))?;
        Ok(out)
    }

    /// Bend into memory, encoded in the session's output format.
    pub fn render(&self, chain: &EffectChain) -> BendResult<Vec<u8>> {
        self.render_as(chain, self.output_format)
    }

    /// Bend into memory, encoded as `format`, without touching the filesystem.
    pub fn render_as(&self, chain: &EffectChain, format: ImageFormat) -> BendResult<Vec<u8>> {
        let body = self.transform_body(chain)?;
        let native = separator::recapitate(&self.pair.header, &body);

        let codec = &self.backends.image;
        match &self.mask {
            Some(mask) => {
                let original = codec.decode(&self.pair.recapitate())?;
                let bent = codec.decode(&native)?;
                let merged = mask.composite(&original, &bent)?;
                codec.encode(&merged, format)
            }
            None => codec.encode_from_native(&native, format),
        }
    }

    /// Run the engine and normalize its output to [`Bender::body_length`].
    pub fn transform_body(&self, chain: &EffectChain) -> BendResult<Vec<u8>> {
        let engine = &self.backends.engine;
        if let Some(bad) = chain.specs().iter().find(|s| !engine.supports(&s.name)) {
            return Err(BendError::unknown_effect(bad.name.clone()));
        }

        let mut body = match engine.build(&self.pair.body, chain) {
            Ok(body) => body,
            Err(err) => {
                if let BendError::EffectParameter { message, chain: dump } = &err {
                    self.backends.sink.emit(&Diagnostic::ParameterRejected {
                        input: &self.native_path,
                        message,
                        chain: dump,
                    });
                }
                return Err(err);
            }
        };

        let target = self.body_length();
        if body.len() != target {
            self.backends.sink.emit(&Diagnostic::Rescaled {
                from: body.len(),
                to: target,
            });
            separator::rescale_in_place(&mut body, target);
        }
        assert_eq!(
            body.len(),
            target,
            "normalized body length must equal the separated body length"
        );
        Ok(body)
    }

    /// Bend once per chain into `frame_pattern` and assemble the frames into `out_path`.
    ///
    /// Returns the frame paths in order.
    pub fn bend_to_animation(
        &self,
        chains: &[EffectChain],
        frame_pattern: &str,
        out_path: &Path,
        timing: &FrameTiming,
    ) -> BendResult<Vec<PathBuf>> {
        if chains.is_empty() {
            return Err(BendError::validation(
                "an animation needs at least one effect chain",
            ));
        }
        timing.delays_for(chains.len())?;

        let frames = chains
            .iter()
            .enumerate()
            .map(|(i, chain)| self.bend(chain, Some(&naming::frame_path(frame_pattern, i))))
            .collect::<BendResult<Vec<_>>>()?;

        self.backends.animation.assemble(&frames, timing, out_path)?;
        self.backends.sink.emit(&Diagnostic::Animated {
            output: out_path,
            frames: frames.len(),
        });
        Ok(frames)
    }
}

impl Drop for Bender {
    fn drop(&mut self) {
        if self.keep_organs {
            return;
        }
        let _ = std::fs::remove_file(&self.head_path);
        let _ = std::fs::remove_file(&self.body_path);
        if self.converted {
            let _ = std::fs::remove_file(&self.native_path);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/bender.rs"]
mod tests;
