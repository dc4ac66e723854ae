use super::*;
use crate::effects::chain::EffectSpec;

fn chain(engine: &NativeEngine, specs: Vec<EffectSpec>) -> EffectChain {
    EffectChain::new(specs, engine).unwrap()
}

fn ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

#[test]
fn empty_chain_is_lossless() {
    let engine = NativeEngine::default();
    let input = ramp(512);
    assert_eq!(engine.build(&input, &EffectChain::empty()).unwrap(), input);
}

#[test]
fn registered_names() {
    let engine = NativeEngine::default();
    assert_eq!(
        engine.effect_names(),
        vec!["echo", "gain", "highpass", "lowpass", "reverse", "speed", "vol"]
    );
    assert!(engine.supports("Echo"));
    assert!(!engine.supports("flanger"));
}

#[test]
fn reverse_twice_restores_all_but_negative_zero() {
    let engine = NativeEngine::default();
    let input: Vec<u8> = (0u8..=255).filter(|b| *b != 0x7F).collect();
    let c = chain(
        &engine,
        vec![EffectSpec::bare("reverse"), EffectSpec::bare("reverse")],
    );
    assert_eq!(engine.build(&input, &c).unwrap(), input);
}

#[test]
fn echo_extends_stream_by_longest_delay() {
    let engine = NativeEngine::default();
    // 72 kHz: 1 ms = 72 samples.
    let c = chain(
        &engine,
        vec![EffectSpec::new(
            "echo",
            EffectParams::new()
                .with("n_echos", 2)
                .with("delays", serde_json::json!([1.0, 2.0]))
                .with("decays", serde_json::json!([0.5, 0.25])),
        )],
    );
    let out = engine.build(&ramp(1000), &c).unwrap();
    assert_eq!(out.len(), 1000 + 144);
}

#[test]
fn speed_changes_length() {
    let engine = NativeEngine::default();
    let c = chain(
        &engine,
        vec![EffectSpec::new(
            "speed",
            EffectParams::new().with("factor", 2.0),
        )],
    );
    assert_eq!(engine.build(&ramp(1000), &c).unwrap().len(), 500);

    let c = chain(
        &engine,
        vec![EffectSpec::new(
            "speed",
            EffectParams::new().with("factor", 0.5),
        )],
    );
    assert_eq!(engine.build(&ramp(1000), &c).unwrap().len(), 2000);
}

#[test]
fn filters_preserve_length() {
    let engine = NativeEngine::default();
    for name in ["lowpass", "highpass"] {
        let c = chain(
            &engine,
            vec![EffectSpec::new(
                name,
                EffectParams::new().with("frequency", 500),
            )],
        );
        assert_eq!(engine.build(&ramp(300), &c).unwrap().len(), 300);
    }
}

#[test]
fn out_of_range_frequency_reports_chain() {
    let engine = NativeEngine::default();
    let c = chain(
        &engine,
        vec![
            EffectSpec::bare("reverse"),
            EffectSpec::new("highpass", EffectParams::new().with("frequency", 50_000)),
        ],
    );
    match engine.build(&ramp(64), &c).unwrap_err() {
        BendError::EffectParameter { message, chain } => {
            assert!(message.contains("Nyquist"), "{message}");
            assert!(chain.contains("highpass"), "{chain}");
            assert!(chain.contains("frequency=50000"), "{chain}");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn invalid_params_are_parameter_errors() {
    let engine = NativeEngine::default();
    let cases = [
        EffectSpec::new("highpass", EffectParams::new().with("frequency", -5)),
        EffectSpec::bare("lowpass"),
        EffectSpec::new("echo", EffectParams::new().with("n_echos", 2)),
        EffectSpec::new("vol", EffectParams::new().with("gain", 1).with("gain_type", "loud")),
        EffectSpec::new("speed", EffectParams::new().with("factor", 0)),
    ];
    for spec in cases {
        let c = chain(&engine, vec![spec.clone()]);
        let err = engine.build(&ramp(16), &c).unwrap_err();
        assert!(
            matches!(err, BendError::EffectParameter { .. }),
            "{spec}: {err:?}"
        );
    }
}

#[test]
fn gain_without_normalize_scales_samples() {
    let engine = NativeEngine::default();
    let c = chain(
        &engine,
        vec![EffectSpec::new(
            "vol",
            EffectParams::new().with("gain", 0.0),
        )],
    );
    let out = engine.build(&ramp(32), &c).unwrap();
    assert!(out.iter().all(|b| *b == 0xFF));
}

#[test]
fn unsigned8_format_is_honored() {
    let engine = NativeEngine::new(SampleFormat {
        encoding: crate::effects::engine::SampleEncoding::Unsigned8,
        ..SampleFormat::default()
    })
    .unwrap();
    let c = chain(&engine, vec![EffectSpec::bare("reverse")]);
    assert_eq!(engine.build(&[1, 2, 3], &c).unwrap(), vec![3, 2, 1]);
}

#[test]
fn multi_channel_format_is_rejected() {
    let err = NativeEngine::new(SampleFormat {
        channels: 2,
        ..SampleFormat::default()
    })
    .unwrap_err();
    assert!(matches!(err, BendError::Validation(_)), "{err:?}");
}

#[test]
fn runaway_lengths_are_parameter_errors() {
    let engine = NativeEngine::default();
    let cases = [
        EffectSpec::new("speed", EffectParams::new().with("factor", 1e-30)),
        EffectSpec::new(
            "echo",
            EffectParams::new().with("delays", serde_json::json!([1e15])),
        ),
    ];
    for spec in cases {
        let c = chain(&engine, vec![EffectSpec::bare("reverse"), spec.clone()]);
        match engine.build(&ramp(64), &c).unwrap_err() {
            BendError::EffectParameter { message, chain } => {
                assert!(message.contains("exceeds the limit"), "{message}");
                assert!(chain.contains(&spec.name), "{chain}");
            }
            other => panic!("{spec}: unexpected {other:?}"),
        }
    }
}

#[test]
fn growth_up_to_one_second_is_allowed_for_short_streams() {
    let engine = NativeEngine::default();
    let c = chain(
        &engine,
        vec![EffectSpec::new(
            "speed",
            EffectParams::new().with("factor", 0.01),
        )],
    );
    assert_eq!(engine.build(&ramp(100), &c).unwrap().len(), 10_000);
}
