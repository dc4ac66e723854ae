use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::{
    effects::{
        chain::{EffectChain, EffectParams},
        engine::{EffectEngine, SampleFormat},
        registry::EffectRegistry,
    },
    foundation::error::{BendError, BendResult},
};

/// Options for [`SoxEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoxOpts {
    /// `sox` executable; looked up on `PATH` when relative.
    pub binary: PathBuf,
    /// `-V` verbosity level passed to sox.
    pub verbosity: u8,
    /// Kill a build that runs longer than this.
    pub timeout: Option<Duration>,
    /// Raw stream format for both input and output.
    pub format: SampleFormat,
}

impl Default for SoxOpts {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("sox"),
            verbosity: 0,
            timeout: Some(Duration::from_secs(120)),
            format: SampleFormat::default(),
        }
    }
}

/// Returns true when `binary --version` runs successfully.
pub fn is_sox_on_path(binary: &Path) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Effect engine backed by the system `sox` binary.
///
/// The body is written to a scratch file as a headerless stream, sox runs the chain from file to
/// file, and the result is read back.
#[derive(Debug)]
pub struct SoxEngine {
    opts: SoxOpts,
    registry: EffectRegistry<Vec<String>>,
}

impl Default for SoxEngine {
    fn default() -> Self {
        Self::new(SoxOpts::default())
    }
}

impl SoxEngine {
    /// Engine with the given options.
    pub fn new(opts: SoxOpts) -> Self {
        Self {
            opts,
            registry: sox_registry(),
        }
    }

    /// Options in use.
    pub fn opts(&self) -> &SoxOpts {
        &self.opts
    }

    /// Whether the configured binary can be run.
    pub fn is_available(&self) -> bool {
        is_sox_on_path(&self.opts.binary)
    }

    /// Full sox argument list for running `chain` from `input` to `output`.
    pub fn command_args(
        &self,
        input: &Path,
        output: &Path,
        chain: &EffectChain,
    ) -> BendResult<Vec<OsString>> {
        let effects = self.registry.resolve_chain(chain)?;
        let fmt = self.opts.format;

        let mut args: Vec<OsString> = vec![format!("-V{}", self.opts.verbosity).into()];
        if !fmt.dither {
            args.push("-D".into());
        }
        let stream = [
            "-t".to_string(),
            "raw".to_string(),
            "-e".to_string(),
            fmt.encoding.sox_name().to_string(),
            "-b".to_string(),
            "8".to_string(),
            "-r".to_string(),
            fmt.rate.to_string(),
            "-c".to_string(),
            fmt.channels.to_string(),
        ];
        args.extend(stream.iter().map(OsString::from));
        args.push(input.into());
        args.extend(stream.iter().map(OsString::from));
        args.push(output.into());
        args.extend(effects.into_iter().flatten().map(OsString::from));
        Ok(args)
    }
}

impl EffectEngine for SoxEngine {
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

        let scratch = tempfile::Builder::new()
            .prefix("sockbend-sox-")
            .tempdir()
            .context("create sox scratch directory")?;
        let in_path = scratch.path().join("in.raw");
        let out_path = scratch.path().join("out.raw");
        let err_path = scratch.path().join("stderr.txt");

        let args = self.command_args(&in_path, &out_path, chain)?;
        std::fs::write(&in_path, input).context("write sox input")?;
        let stderr = std::fs::File::create(&err_path).context("create sox stderr capture")?;

        let mut child = Command::new(&self.opts.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| {
                BendError::engine(format!(
                    "failed to spawn '{}' (is sox installed and on PATH?): {e}",
                    self.opts.binary.display()
                ))
            })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(BendError::engine(format!("failed to wait for sox: {e}"))),
            }
            if let Some(limit) = self.opts.timeout
                && started.elapsed() > limit
            {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BendError::engine(format!(
                    "sox did not finish within {:.1}s",
                    limit.as_secs_f64()
                )));
            }
            std::thread::sleep(Duration::from_millis(5));
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&err_path).unwrap_or_default();
            return Err(BendError::parameter(format!(
                "sox exited with status {status}: {}",
                stderr.trim()
            ))
            .with_chain(chain.dump()));
        }

        Ok(std::fs::read(&out_path).context("read sox output")?)
    }
}

fn num(v: f64) -> String {
    format!("{v}")
}

fn require(cond: bool, msg: &str) -> BendResult<()> {
    if cond {
        Ok(())
    } else {
        Err(BendError::parameter(msg))
    }
}

fn in_range(p: &EffectParams, key: &str, default: f64, lo: f64, hi: f64) -> BendResult<f64> {
    let v = p.f64_or(key, default)?;
    if v < lo || v > hi {
        return Err(BendError::parameter(format!(
            "{key} must be in [{lo}, {hi}], got {v}"
        )));
    }
    Ok(v)
}

fn positive(p: &EffectParams, key: &str, default: Option<f64>) -> BendResult<f64> {
    let v = match default {
        Some(d) => p.f64_or(key, d)?,
        None => p.f64(key)?,
    };
    if v <= 0.0 {
        return Err(BendError::parameter(format!("{key} must be > 0, got {v}")));
    }
    Ok(v)
}

fn pass_filter(name: &'static str) -> impl Fn(&EffectParams) -> BendResult<Vec<String>> {
    move |p| {
        let frequency = positive(p, "frequency", None)?;
        let width_q = positive(p, "width_q", Some(0.707))?;
        let n_passes = p.u32_or("n_passes", 2)?;
        require(
            n_passes == 1 || n_passes == 2,
            "n_passes must be 1 or 2",
        )?;
        let mut args = vec![name.to_string(), format!("-{n_passes}"), num(frequency)];
        if n_passes == 2 {
            args.push(format!("{}q", num(width_q)));
        }
        Ok(args)
    }
}

fn shelf(name: &'static str, default_frequency: f64) -> impl Fn(&EffectParams) -> BendResult<Vec<String>> {
    move |p| {
        let gain_db = p.f64_or("gain_db", 0.0)?;
        let frequency = positive(p, "frequency", Some(default_frequency))?;
        let slope = p.f64_or("slope", 0.5)?;
        require(slope > 0.0 && slope <= 1.0, "slope must be in (0, 1]")?;
        Ok(vec![
            name.to_string(),
            num(gain_db),
            num(frequency),
            format!("{}s", num(slope)),
        ])
    }
}

fn band(name: &'static str) -> impl Fn(&EffectParams) -> BendResult<Vec<String>> {
    move |p| {
        let frequency = positive(p, "frequency", None)?;
        let width_q = positive(p, "width_q", Some(2.0))?;
        let mut args = vec![name.to_string()];
        if name == "bandpass" && p.bool_or("constant_skirt", false)? {
            args.push("-c".to_string());
        }
        args.push(num(frequency));
        args.push(format!("{}q", num(width_q)));
        Ok(args)
    }
}

fn echo(p: &EffectParams) -> BendResult<Vec<String>> {
    let gain_in = p.f64_or("gain_in", 0.8)?;
    require(gain_in > 0.0 && gain_in <= 1.0, "gain_in must be in (0, 1]")?;
    let gain_out = positive(p, "gain_out", Some(0.9))?;
    let n_echos = p.u32_or("n_echos", 1)? as usize;
    require(n_echos >= 1, "n_echos must be >= 1")?;
    let delays = p.f64_list_or("delays", &[60.0])?;
    let decays = p.f64_list_or("decays", &[0.4])?;
    require(
        delays.len() == n_echos && decays.len() == n_echos,
        "delays and decays must both have n_echos entries",
    )?;
    require(delays.iter().all(|d| *d > 0.0), "delays must be > 0")?;
    require(
        decays.iter().all(|d| *d > 0.0 && *d <= 1.0),
        "decays must be in (0, 1]",
    )?;

    let mut args = vec!["echo".to_string(), num(gain_in), num(gain_out)];
    for (delay, decay) in delays.iter().zip(&decays) {
        args.push(num(*delay));
        args.push(num(*decay));
    }
    Ok(args)
}

fn phaser(p: &EffectParams) -> BendResult<Vec<String>> {
    let gain_in = in_range(p, "gain_in", 0.8, 0.0, 1.0)?;
    let gain_out = in_range(p, "gain_out", 0.74, 0.0, 1e9)?;
    let delay = in_range(p, "delay", 3.0, 0.0, 5.0)?;
    let decay = in_range(p, "decay", 0.4, 0.1, 0.5)?;
    let speed = in_range(p, "speed", 0.5, 0.1, 2.0)?;
    let shape = match p.str_or("modulation_shape", "sinusoidal")? {
        "sinusoidal" => "-s",
        "triangular" => "-t",
        other => {
            return Err(BendError::parameter(format!(
                "modulation_shape must be sinusoidal or triangular, got '{other}'"
            )));
        }
    };
    Ok(vec![
        "phaser".to_string(),
        num(gain_in),
        num(gain_out),
        num(delay),
        num(decay),
        num(speed),
        shape.to_string(),
    ])
}

fn reverb(p: &EffectParams) -> BendResult<Vec<String>> {
    let reverberance = in_range(p, "reverberance", 50.0, 0.0, 100.0)?;
    let damping = in_range(p, "high_freq_damping", 50.0, 0.0, 100.0)?;
    let room_scale = in_range(p, "room_scale", 100.0, 0.0, 100.0)?;
    let stereo_depth = in_range(p, "stereo_depth", 100.0, 0.0, 100.0)?;
    let pre_delay = in_range(p, "pre_delay", 0.0, 0.0, 500.0)?;
    let wet_gain = p.f64_or("wet_gain", 0.0)?;
    let mut args = vec!["reverb".to_string()];
    if p.bool_or("wet_only", false)? {
        args.push("-w".to_string());
    }
    args.extend([
        num(reverberance),
        num(damping),
        num(room_scale),
        num(stereo_depth),
        num(pre_delay),
        num(wet_gain),
    ]);
    Ok(args)
}

fn flanger(p: &EffectParams) -> BendResult<Vec<String>> {
    let delay = in_range(p, "delay", 0.0, 0.0, 30.0)?;
    let depth = in_range(p, "depth", 2.0, 0.0, 10.0)?;
    let regen = in_range(p, "regen", 0.0, -95.0, 95.0)?;
    let width = in_range(p, "width", 71.0, 0.0, 100.0)?;
    let speed = in_range(p, "speed", 0.5, 0.1, 10.0)?;
    let shape = p.str_or("shape", "sine")?;
    require(
        matches!(shape, "sine" | "triangle"),
        "shape must be sine or triangle",
    )?;
    let phase = in_range(p, "phase", 25.0, 0.0, 100.0)?;
    let interp = p.str_or("interp", "linear")?;
    require(
        matches!(interp, "linear" | "quadratic"),
        "interp must be linear or quadratic",
    )?;
    Ok(vec![
        "flanger".to_string(),
        num(delay),
        num(depth),
        num(regen),
        num(width),
        num(speed),
        shape.to_string(),
        num(phase),
        interp.to_string(),
    ])
}

fn sox_registry() -> EffectRegistry<Vec<String>> {
    let mut reg = EffectRegistry::new();
    reg.register("allpass", |p| {
        let frequency = positive(p, "frequency", None)?;
        let width_q = positive(p, "width_q", Some(2.0))?;
        Ok(vec![
            "allpass".to_string(),
            num(frequency),
            format!("{}q", num(width_q)),
        ])
    })
    .register("bandpass", band("bandpass"))
    .register("bandreject", band("bandreject"))
    .register("bass", shelf("bass", 100.0))
    .register("treble", shelf("treble", 3000.0))
    .register("equalizer", |p| {
        let frequency = positive(p, "frequency", None)?;
        let width_q = positive(p, "width_q", None)?;
        let gain_db = p.f64("gain_db")?;
        Ok(vec![
            "equalizer".to_string(),
            num(frequency),
            format!("{}q", num(width_q)),
            num(gain_db),
        ])
    })
    .register("highpass", pass_filter("highpass"))
    .register("lowpass", pass_filter("lowpass"))
    .register("echo", echo)
    .register("gain", |p| {
        let mut args = vec!["gain".to_string()];
        if p.bool_or("normalize", true)? {
            args.push("-n".to_string());
        }
        if p.bool_or("limiter", false)? {
            args.push("-l".to_string());
        }
        args.push(num(p.f64_or("gain_db", 0.0)?));
        Ok(args)
    })
    .register("vol", |p| {
        let gain = p.f64("gain")?;
        let gain_type = match p.str_or("gain_type", "amplitude")? {
            "amplitude" => "amplitude",
            "db" => "dB",
            "power" => "power",
            other => {
                return Err(BendError::parameter(format!(
                    "gain_type must be amplitude, db or power, got '{other}'"
                )));
            }
        };
        Ok(vec!["vol".to_string(), num(gain), gain_type.to_string()])
    })
    .register("overdrive", |p| {
        Ok(vec![
            "overdrive".to_string(),
            num(in_range(p, "gain_db", 20.0, 0.0, 100.0)?),
            num(in_range(p, "colour", 20.0, 0.0, 100.0)?),
        ])
    })
    .register("contrast", |p| {
        Ok(vec![
            "contrast".to_string(),
            num(in_range(p, "amount", 75.0, 0.0, 100.0)?),
        ])
    })
    .register("phaser", phaser)
    .register("reverb", reverb)
    .register("flanger", flanger)
    .register("reverse", |_| Ok(vec!["reverse".to_string()]))
    .register("speed", |p| {
        Ok(vec!["speed".to_string(), num(positive(p, "factor", None)?)])
    })
    .register("tempo", |p| {
        let factor = positive(p, "factor", None)?;
        let mut args = vec!["tempo".to_string()];
        if p.bool_or("quick", false)? {
            args.push("-q".to_string());
        }
        args.push(num(factor));
        Ok(args)
    })
    .register("pitch", |p| {
        let semitones = p.f64("n_semitones")?;
        require(
            (-12.0..=12.0).contains(&semitones),
            "n_semitones must be in [-12, 12]",
        )?;
        let mut args = vec!["pitch".to_string()];
        if p.bool_or("quick", false)? {
            args.push("-q".to_string());
        }
        args.push(num(semitones * 100.0));
        Ok(args)
    })
    .register("tremolo", |p| {
        Ok(vec![
            "tremolo".to_string(),
            num(positive(p, "speed", Some(6.0))?),
            num(in_range(p, "depth", 40.0, 0.0, 100.0)?),
        ])
    });
    reg
}

#[cfg(test)]
#[path = "../../tests/unit/effects/sox.rs"]
mod tests;
