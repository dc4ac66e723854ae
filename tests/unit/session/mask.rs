use super::*;

fn solid(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, image::Rgb(rgb)))
}

#[test]
fn luma_threshold_selects_pixels() {
    // Left column white, middle 254, right black.
    let mask_img = image::GrayImage::from_fn(3, 1, |x, _| Luma([[255, 254, 0][x as usize]]));
    let mask = Mask::from_image(&DynamicImage::ImageLuma8(mask_img));

    let out = mask
        .composite(&solid(3, 1, [1, 1, 1]), &solid(3, 1, [9, 9, 9]))
        .unwrap()
        .to_rgb8();
    assert_eq!(out.get_pixel(0, 0).0, [9, 9, 9]);
    assert_eq!(out.get_pixel(1, 0).0, [1, 1, 1]);
    assert_eq!(out.get_pixel(2, 0).0, [1, 1, 1]);
}

#[test]
fn alpha_wins_over_colour() {
    // Black but opaque selects; white but translucent keeps.
    let mask_img = image::RgbaImage::from_fn(2, 1, |x, _| {
        if x == 0 {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([255, 255, 255, 200])
        }
    });
    let mask = Mask::from_image(&DynamicImage::ImageRgba8(mask_img));
    assert!(mask.selects_transformed(0, 0));
    assert!(!mask.selects_transformed(1, 0));
}

#[test]
fn composite_keeps_original_layout() {
    let mask = Mask::from_image(&solid(2, 2, [255, 255, 255]));
    let original = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        2,
        2,
        image::Rgba([0, 0, 0, 10]),
    ));
    let out = mask.composite(&original, &solid(2, 2, [7, 8, 9])).unwrap();
    assert!(out.color().has_alpha());
    assert_eq!(out.to_rgba8().get_pixel(1, 1).0, [7, 8, 9, 255]);

    let out = mask
        .composite(&solid(2, 2, [0, 0, 0]), &solid(2, 2, [7, 8, 9]))
        .unwrap();
    assert!(!out.color().has_alpha());
}

#[test]
fn size_mismatch_is_validation() {
    let mask = Mask::from_image(&solid(2, 2, [255, 255, 255]));
    let err = mask
        .composite(&solid(3, 2, [0, 0, 0]), &solid(3, 2, [0, 0, 0]))
        .unwrap_err();
    assert!(matches!(err, BendError::Validation(_)));
}

#[test]
fn open_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("mask.png");
    image::GrayImage::from_pixel(4, 3, Luma([255])).save(&p).unwrap();
    let mask = Mask::open(&p).unwrap();
    assert_eq!(mask.dimensions(), (4, 3));
    assert!(mask.selects_transformed(3, 2));
    assert!(Mask::open(&dir.path().join("missing.png")).is_err());
}
