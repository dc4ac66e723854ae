use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        BendError::malformed("x")
            .to_string()
            .contains("malformed container:")
    );
    assert!(
        BendError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(BendError::engine("x").to_string().contains("engine error:"));
    assert_eq!(
        BendError::unknown_effect("flange").to_string(),
        "unknown effect 'flange'"
    );
}

#[test]
fn with_chain_only_touches_parameter_errors() {
    let err = BendError::parameter("frequency must be > 0").with_chain("highpass{}");
    match err {
        BendError::EffectParameter { message, chain } => {
            assert_eq!(message, "frequency must be > 0");
            assert_eq!(chain, "highpass{}");
        }
        other => panic!("unexpected variant: {other:?}"),
    }

    let err = BendError::validation("x").with_chain("ignored");
    assert!(matches!(err, BendError::Validation(_)));
}

#[test]
fn frames_lists_every_failure() {
    let err = BendError::Frames(vec![
        FrameFailure {
            index: 1,
            error: BendError::engine("boom"),
        },
        FrameFailure {
            index: 4,
            error: BendError::unknown_effect("nope"),
        },
    ]);
    let msg = err.to_string();
    assert!(msg.starts_with("2 frame(s) failed"));
    assert!(msg.contains("frame 1: engine error: boom"));
    assert!(msg.contains("frame 4: unknown effect 'nope'"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = BendError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
