use super::*;
use crate::{
    effects::{
        chain::{EffectParams, EffectSpec},
        native::NativeEngine,
        sox::SoxEngine,
    },
    foundation::diag::MemorySink,
};

struct Fixture {
    dir: tempfile::TempDir,
    opts: BenderOpts,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let opts = BenderOpts {
            work_dir: dir.path().join("organs"),
            ..BenderOpts::default()
        };
        Self { dir, opts }
    }

    fn image(&self, name: &str) -> PathBuf {
        let p = self.dir.path().join(name);
        image::RgbImage::from_fn(8, 4, |x, y| image::Rgb([(x * 30) as u8, (y * 60) as u8, 128]))
            .save(&p)
            .unwrap();
        p
    }
}

fn native() -> Arc<NativeEngine> {
    Arc::new(NativeEngine::default())
}

fn chain(specs: Vec<EffectSpec>) -> EffectChain {
    EffectChain::new(specs, &NativeEngine::default()).unwrap()
}

#[test]
fn opens_bmp_and_persists_organs() {
    let fx = Fixture::new();
    let input = fx.image("in.bmp");
    let bender = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();

    assert_eq!(bender.header().len(), 54);
    assert_eq!(bender.body_length(), 8 * 4 * 3);
    assert_eq!(bender.native_path(), input.as_path());
    assert_eq!(bender.output_format(), ImageFormat::Bmp);

    let (head, body) = bender.organ_paths();
    let (head, body) = (head.to_path_buf(), body.to_path_buf());
    assert!(head.starts_with(&fx.opts.work_dir));
    assert_eq!(std::fs::read(&head).unwrap(), bender.header());
    assert_eq!(std::fs::read(&body).unwrap(), bender.body());

    drop(bender);
    assert!(!head.exists());
    assert!(!body.exists());
    assert!(input.exists());
}

#[test]
fn keep_organs_leaves_files() {
    let mut fx = Fixture::new();
    fx.opts.keep_organs = true;
    let input = fx.image("in.bmp");
    let bender = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();
    let head = bender.organ_paths().0.to_path_buf();
    drop(bender);
    assert!(head.exists());
}

#[test]
fn empty_chain_round_trips_exactly() {
    let fx = Fixture::new();
    let input = fx.image("in.bmp");
    let bender = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();
    let out = bender.bend(&EffectChain::empty(), None).unwrap();
    assert_eq!(out, fx.dir.path().join("in_bent.bmp"));
    assert_eq!(std::fs::read(out).unwrap(), std::fs::read(&input).unwrap());
}

#[test]
fn shrinking_effect_is_padded_back() {
    let fx = Fixture::new();
    let input = fx.image("in.bmp");
    let sink = Arc::new(MemorySink::new());
    let bender = Bender::open(
        &input,
        &fx.opts,
        Backends::new(native()).with_sink(sink.clone()),
    )
    .unwrap();

    let c = chain(vec![EffectSpec::new(
        "speed",
        EffectParams::new().with("factor", 2.0),
    )]);
    let body = bender.transform_body(&c).unwrap();
    assert_eq!(body.len(), bender.body_length());
    assert!(body[bender.body_length() / 2..].iter().all(|b| *b == 0));
    assert!(sink.events().iter().any(|e| e.starts_with("Rescaled")));

    let out = bender
        .bend(&c, Some(&fx.dir.path().join("nested/out.bmp")))
        .unwrap();
    let written = std::fs::read(out).unwrap();
    assert_eq!(written.len(), std::fs::metadata(&input).unwrap().len() as usize);
    assert_eq!(&written[..54], bender.header());
}

#[test]
fn png_input_is_converted_and_written_back_as_png() {
    let fx = Fixture::new();
    let input = fx.image("in.png");
    let sink = Arc::new(MemorySink::new());
    let bender = Bender::open(
        &input,
        &fx.opts,
        Backends::new(native()).with_sink(sink.clone()),
    )
    .unwrap();
    assert_eq!(bender.output_format(), ImageFormat::Png);
    assert!(bender.native_path().starts_with(&fx.opts.work_dir));
    assert!(sink.events()[0].starts_with("Converted"));

    let out = bender
        .bend(&chain(vec![EffectSpec::bare("reverse")]), None)
        .unwrap();
    assert_eq!(out, fx.dir.path().join("in_bent.png"));
    let img = image::open(&out).unwrap();
    assert_eq!((img.width(), img.height()), (8, 4));

    let native = bender.native_path().to_path_buf();
    drop(bender);
    assert!(!native.exists());
}

#[test]
fn output_format_override() {
    let mut fx = Fixture::new();
    fx.opts.output_format = Some("png".into());
    let input = fx.image("in.bmp");
    let bender = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();
    let bytes = bender.render(&EffectChain::empty()).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
    assert_eq!(bender.default_out_path(), fx.dir.path().join("in_bent.png"));
}

#[test]
fn destination_extension_picks_the_encoding() {
    let fx = Fixture::new();
    let input = fx.image("in.png");
    let bender = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();
    assert_eq!(bender.output_format(), ImageFormat::Png);

    let bmp = bender
        .bend(&EffectChain::empty(), Some(&fx.dir.path().join("out.bmp")))
        .unwrap();
    let bytes = std::fs::read(&bmp).unwrap();
    assert_eq!(&bytes[..2], b"BM");
    assert_eq!(bytes, std::fs::read(bender.native_path()).unwrap());

    let upper = bender
        .bend(&EffectChain::empty(), Some(&fx.dir.path().join("OUT.PNG")))
        .unwrap();
    assert_eq!(&std::fs::read(upper).unwrap()[1..4], b"PNG");

    let bare = fx.dir.path().join("noext");
    assert_eq!(bender.format_for(&bare).unwrap(), ImageFormat::Png);
    assert!(matches!(
        bender.bend(&EffectChain::empty(), Some(&fx.dir.path().join("out.xyz"))),
        Err(BendError::Validation(_))
    ));
}

#[test]
fn sessions_over_one_input_keep_separate_organs() {
    let fx = Fixture::new();
    let input = fx.image("in.png");
    let first = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();
    let second = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();
    assert_ne!(first.organ_paths(), second.organ_paths());
    assert_ne!(first.native_path(), second.native_path());

    drop(first);
    let (head, body) = second.organ_paths();
    assert_eq!(std::fs::read(head).unwrap(), second.header());
    assert_eq!(std::fs::read(body).unwrap(), second.body());
    assert!(second.native_path().exists());
}

#[test]
fn rejected_parameters_leave_session_usable() {
    let fx = Fixture::new();
    let input = fx.image("in.bmp");
    let sink = Arc::new(MemorySink::new());
    let bender = Bender::open(
        &input,
        &fx.opts,
        Backends::new(native()).with_sink(sink.clone()),
    )
    .unwrap();

    let bad = chain(vec![EffectSpec::new(
        "lowpass",
        EffectParams::new().with("frequency", 90_000),
    )]);
    let err = bender.bend(&bad, None).unwrap_err();
    assert!(matches!(err, BendError::EffectParameter { .. }));
    assert!(
        sink.events()
            .iter()
            .any(|e| e.starts_with("ParameterRejected") && e.contains("lowpass"))
    );

    let good = chain(vec![EffectSpec::bare("reverse")]);
    let first = bender.render(&good).unwrap();
    let second = bender.render(&good).unwrap();
    assert_eq!(first, second);
}

#[test]
fn chain_for_another_engine_is_rejected() {
    let fx = Fixture::new();
    let input = fx.image("in.bmp");
    let bender = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();
    let sox_only = EffectChain::new(vec![EffectSpec::bare("flanger")], &SoxEngine::default())
        .unwrap();
    assert!(matches!(
        bender.bend(&sox_only, None),
        Err(BendError::UnknownEffect { ref name }) if name == "flanger"
    ));
}

#[test]
fn malformed_and_unknown_inputs() {
    let fx = Fixture::new();
    let tiny = fx.dir.path().join("tiny.bmp");
    std::fs::write(&tiny, b"BM").unwrap();
    assert!(matches!(
        Bender::open(&tiny, &fx.opts, Backends::new(native())),
        Err(BendError::MalformedContainer(_))
    ));

    let bare = fx.dir.path().join("noext");
    std::fs::write(&bare, b"whatever").unwrap();
    assert!(matches!(
        Bender::open(&bare, &fx.opts, Backends::new(native())),
        Err(BendError::Validation(_))
    ));
}

#[test]
fn bend_to_animation_writes_frames_and_gif() {
    let fx = Fixture::new();
    let input = fx.image("in.bmp");
    let bender = Bender::open(&input, &fx.opts, Backends::new(native())).unwrap();

    let chains: Vec<EffectChain> = (1..=3)
        .map(|i| {
            chain(vec![EffectSpec::new(
                "vol",
                EffectParams::new().with("gain", f64::from(i) * 0.3),
            )])
        })
        .collect();
    let pattern = fx.dir.path().join("frames/f_{}.bmp");
    let gif = fx.dir.path().join("out.gif");
    let frames = bender
        .bend_to_animation(
            &chains,
            pattern.to_str().unwrap(),
            &gif,
            &FrameTiming::uniform(100),
        )
        .unwrap();

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2], fx.dir.path().join("frames/f_0002.bmp"));
    assert!(frames.iter().all(|f| f.exists()));
    assert!(gif.exists());

    assert!(matches!(
        bender.bend_to_animation(&[], "x_{}.bmp", &gif, &FrameTiming::default()),
        Err(BendError::Validation(_))
    ));
}
