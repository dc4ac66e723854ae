use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sockbend", version, about = "Databend images through audio effect chains")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bend one image with one effect chain.
    Bend(BendArgs),
    /// Bend one image once per chain and assemble the results into a GIF.
    Animate(AnimateArgs),
    /// Bend every frame of a GIF and reassemble it.
    Gif(GifArgs),
    /// List the effects an engine provides.
    Effects(EffectsArgs),
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Effect engine to use.
    #[arg(long, value_enum, default_value_t = EngineChoice::Sox)]
    engine: EngineChoice,

    /// Directory for separated header/body files.
    #[arg(long, default_value = sockbend::naming::DEFAULT_WORK_DIR)]
    work_dir: PathBuf,

    /// Output image format (extension); defaults to the input's.
    #[arg(long)]
    format: Option<String>,

    /// Mask image: fully opaque / white pixels take the bent value.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Keep the working files after the run.
    #[arg(long)]
    keep_organs: bool,
}

#[derive(Parser, Debug)]
struct BendArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Effect chain JSON.
    #[arg(long)]
    chain: PathBuf,

    /// Output image; defaults to `<input stem>_bent.<ext>` next to the input.
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Parser, Debug)]
struct AnimateArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// JSON array of effect chains, one per frame.
    #[arg(long)]
    chains: PathBuf,

    /// Output GIF.
    #[arg(long)]
    out: PathBuf,

    /// Delay per frame in milliseconds.
    #[arg(long, default_value_t = sockbend::FrameTiming::DEFAULT_DELAY_MS)]
    delay: u32,

    /// Frame path pattern; `{}` becomes the frame index.
    #[arg(long, default_value = sockbend::naming::DEFAULT_FRAME_PATTERN)]
    frames: String,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Parser, Debug)]
struct GifArgs {
    /// Input GIF.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// One effect chain applied to every frame.
    #[arg(long, conflicts_with = "chains", required_unless_present = "chains")]
    chain: Option<PathBuf>,

    /// JSON array of effect chains, one per frame.
    #[arg(long)]
    chains: Option<PathBuf>,

    /// Output GIF.
    #[arg(long)]
    out: PathBuf,

    /// Frame path pattern; `{}` becomes the frame index.
    #[arg(long, default_value = sockbend::naming::DEFAULT_FRAME_PATTERN)]
    frames: String,

    /// Bend frames in parallel.
    #[arg(long)]
    parallel: bool,

    /// Worker threads for `--parallel`.
    #[arg(long)]
    threads: Option<usize>,

    /// Override the source delays with one delay in milliseconds.
    #[arg(long)]
    delay: Option<u32>,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Parser, Debug)]
struct EffectsArgs {
    /// Effect engine to list.
    #[arg(long, value_enum, default_value_t = EngineChoice::Sox)]
    engine: EngineChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineChoice {
    /// The system `sox` binary.
    Sox,
    /// The in-process engine.
    Native,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Bend(args) => cmd_bend(args),
        Command::Animate(args) => cmd_animate(args),
        Command::Gif(args) => cmd_gif(args),
        Command::Effects(args) => cmd_effects(args),
    }
}

fn make_engine(choice: EngineChoice) -> anyhow::Result<Arc<dyn sockbend::EffectEngine>> {
    match choice {
        EngineChoice::Sox => {
            let engine = sockbend::SoxEngine::default();
            if !engine.is_available() {
                anyhow::bail!(
                    "'{}' not found on PATH; install SoX or pass --engine native",
                    engine.opts().binary.display()
                );
            }
            Ok(Arc::new(engine))
        }
        EngineChoice::Native => Ok(Arc::new(sockbend::NativeEngine::default())),
    }
}

fn bender_opts(args: &SessionArgs) -> sockbend::BenderOpts {
    sockbend::BenderOpts {
        work_dir: args.work_dir.clone(),
        output_format: args.format.clone(),
        mask: args.mask.clone(),
        keep_organs: args.keep_organs,
    }
}

fn open_bender(
    in_path: &Path,
    args: &SessionArgs,
    engine: Arc<dyn sockbend::EffectEngine>,
) -> anyhow::Result<sockbend::Bender> {
    sockbend::Bender::open(in_path, &bender_opts(args), sockbend::Backends::new(engine))
        .with_context(|| format!("open '{}'", in_path.display()))
}

fn cmd_bend(args: BendArgs) -> anyhow::Result<()> {
    let engine = make_engine(args.session.engine)?;
    let chain = sockbend::load_chain(&args.chain, engine.as_ref())?;
    let bender = open_bender(&args.in_path, &args.session, engine)?;
    let out = bender.bend(&chain, args.out.as_deref())?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_animate(args: AnimateArgs) -> anyhow::Result<()> {
    let engine = make_engine(args.session.engine)?;
    let chains = sockbend::load_chain_sequence(&args.chains, engine.as_ref())?;
    let bender = open_bender(&args.in_path, &args.session, engine)?;
    let frames = bender.bend_to_animation(
        &chains,
        &args.frames,
        &args.out,
        &sockbend::FrameTiming::uniform(args.delay),
    )?;
    eprintln!("wrote {} ({} frames)", args.out.display(), frames.len());
    Ok(())
}

fn cmd_gif(args: GifArgs) -> anyhow::Result<()> {
    let engine = make_engine(args.session.engine)?;
    let multi = sockbend::MultiBender::builder()
        .animation(&args.in_path)
        .opts(bender_opts(&args.session))
        .backends(sockbend::Backends::new(engine.clone()))
        .build()
        .with_context(|| format!("split '{}'", args.in_path.display()))?;

    let seq = sockbend::SequenceOpts {
        frame_pattern: args.frames,
        parallel: args.parallel,
        threads: args.threads,
        animation_out: Some(args.out.clone()),
        timing_override: args.delay.map(sockbend::FrameTiming::uniform),
    };

    let out = match (&args.chain, &args.chains) {
        (Some(chain), _) => {
            let chain = sockbend::load_chain(chain, engine.as_ref())?;
            multi.bend_uniform(&chain, &seq)?
        }
        (None, Some(chains)) => {
            let chains = sockbend::load_chain_sequence(chains, engine.as_ref())?;
            multi.bend_varying(&chains, &seq)?
        }
        (None, None) => anyhow::bail!("either --chain or --chains is required"),
    };

    eprintln!("wrote {} ({} frames)", args.out.display(), out.frames.len());
    Ok(())
}

fn cmd_effects(args: EffectsArgs) -> anyhow::Result<()> {
    let engine: Arc<dyn sockbend::EffectEngine> = match args.engine {
        EngineChoice::Sox => Arc::new(sockbend::SoxEngine::default()),
        EngineChoice::Native => Arc::new(sockbend::NativeEngine::default()),
    };
    for name in engine.effect_names() {
        println!("{name}");
    }
    Ok(())
}
