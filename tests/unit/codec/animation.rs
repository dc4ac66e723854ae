use super::*;

fn write_frames(dir: &Path, count: u8) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let p = dir.join(format!("f{i}.bmp"));
            image::RgbImage::from_pixel(6, 4, image::Rgb([i * 60, 0, 255 - i * 60]))
                .save(&p)
                .unwrap();
            p
        })
        .collect()
}

#[test]
fn timing_broadcast_and_mismatch() {
    assert_eq!(FrameTiming::default().delays_for(3).unwrap(), vec![80, 80, 80]);
    assert_eq!(FrameTiming::uniform(50).delays_for(2).unwrap(), vec![50, 50]);
    assert_eq!(
        FrameTiming::per_frame(Vec::new()).delays_for(2).unwrap(),
        vec![80, 80]
    );
    assert_eq!(
        FrameTiming::per_frame(vec![10, 20]).delays_for(2).unwrap(),
        vec![10, 20]
    );
    assert!(matches!(
        FrameTiming::per_frame(vec![10, 20]).delays_for(3),
        Err(BendError::Validation(_))
    ));
}

#[test]
fn timing_deserializes_with_defaults() {
    let t: FrameTiming = serde_json::from_str(r#"{"delays_ms": [40]}"#).unwrap();
    assert_eq!(t, FrameTiming::uniform(40));
    let t: FrameTiming = serde_json::from_str("{}").unwrap();
    assert_eq!(t, FrameTiming::default());
}

#[test]
fn assemble_then_split_keeps_order_and_delays() {
    let dir = tempfile::tempdir().unwrap();
    let frames = write_frames(dir.path(), 3);
    let gif = dir.path().join("anim.gif");

    GifCodec
        .assemble(&frames, &FrameTiming::per_frame(vec![80, 120, 40]), &gif)
        .unwrap();

    let work = dir.path().join("work");
    let (split, timing) = GifCodec.split(&gif, &work).unwrap();
    assert_eq!(split.len(), 3);
    assert_eq!(timing.delays_ms, vec![80, 120, 40]);
    assert_eq!(timing.loop_count, 0);

    for (i, p) in split.iter().enumerate() {
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with(&format!("anim.gif_{i:04}.bmp")), "{name}");
        let img = image::open(p).unwrap();
        assert_eq!((img.width(), img.height()), (6, 4));
        assert!(!img.color().has_alpha());
    }
}

#[test]
fn assemble_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let gif = dir.path().join("out.gif");
    assert!(matches!(
        GifCodec.assemble(&[], &FrameTiming::default(), &gif),
        Err(BendError::Validation(_))
    ));

    let frames = write_frames(dir.path(), 2);
    assert!(matches!(
        GifCodec.assemble(&frames, &FrameTiming::per_frame(vec![1, 2, 3]), &gif),
        Err(BendError::Validation(_))
    ));

    let odd = dir.path().join("odd.bmp");
    image::RgbImage::new(3, 3).save(&odd).unwrap();
    assert!(matches!(
        GifCodec.assemble(
            &[frames[0].clone(), odd],
            &FrameTiming::default(),
            &gif
        ),
        Err(BendError::Validation(_))
    ));
    assert!(!gif.exists());
}

#[test]
fn failed_assemble_leaves_previous_output_and_no_strays() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let gif = out_dir.join("anim.gif");
    let frames = write_frames(dir.path(), 2);
    GifCodec
        .assemble(&frames, &FrameTiming::default(), &gif)
        .unwrap();
    let before = std::fs::read(&gif).unwrap();

    let missing = dir.path().join("missing.bmp");
    assert!(
        GifCodec
            .assemble(&[frames[0].clone(), missing], &FrameTiming::default(), &gif)
            .is_err()
    );
    assert_eq!(std::fs::read(&gif).unwrap(), before);
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 1);
}

#[test]
fn split_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(
        GifCodec
            .split(&dir.path().join("nope.gif"), dir.path())
            .is_err()
    );
}
