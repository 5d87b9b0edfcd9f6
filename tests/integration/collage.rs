//! Integration tests for template loading and collage assembly.

use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use photobooth::collage::{TemplateCollage, load_templates, print_path, small_path};
use photobooth::error::PhotoboothError;
use photobooth::frame::Frame;

use crate::common::fixtures::{
    PAIR_TEMPLATE_TOML, POSTCARD_TEMPLATE_YAML, STRIP_TEMPLATE_JSON, TemplateDir, TestPhotos,
};

fn near(px: Rgb<u8>, expected: [u8; 3]) -> bool {
    px.0.iter().zip(expected).all(|(a, b)| a.abs_diff(b) <= 10)
}

#[test]
fn test_load_templates_mixed_formats() {
    let dir = TemplateDir::new();
    dir.write("a_strip.json", STRIP_TEMPLATE_JSON);
    dir.write("b_postcard.yaml", POSTCARD_TEMPLATE_YAML);
    dir.write("c_pair.toml", PAIR_TEMPLATE_TOML);
    dir.write("notes.txt", "not a template");

    let templates = load_templates(dir.path()).unwrap();
    let names: Vec<&str> = templates.iter().map(TemplateCollage::name).collect();
    assert_eq!(names, ["Photo Strip", "Postcard", "Pair"]);
    assert_eq!(templates[0].photos_required(), 3);
    assert!(templates[1].margin_percent().abs() < f64::EPSILON);
    assert!((templates[2].get_aspect_ratio() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_invalid_template_is_skipped() {
    let dir = TemplateDir::new();
    dir.write("broken.json", "{ this is not json");
    dir.write("zero.json", r#"{"page": {"width": 0, "height": 10}}"#);
    dir.write("pair.toml", PAIR_TEMPLATE_TOML);

    let templates = load_templates(dir.path()).unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].name(), "Pair");
}

#[test]
fn test_no_valid_template() {
    let dir = TemplateDir::new();
    dir.write("broken.yaml", "page: [1, 2");
    assert!(matches!(
        load_templates(dir.path()),
        Err(PhotoboothError::NoTemplates { .. })
    ));
    assert!(matches!(
        load_templates(&dir.path().join("missing")),
        Err(PhotoboothError::NoTemplates { .. })
    ));
}

#[test]
fn test_strip_duplicates_only_for_print() {
    let dir = TemplateDir::new();
    let strip = TemplateCollage::load(&dir.write("strip.json", STRIP_TEMPLATE_JSON)).unwrap();
    let photos = TestPhotos::solid(&[[220, 30, 30], [30, 220, 30], [30, 30, 220]], 800, 600);

    let display = strip.assemble(&photos.paths, None, false).unwrap();
    assert_eq!(display.dimensions(), (1240, 3688));

    let printed = strip.assemble(&photos.paths, None, true).unwrap();
    assert_eq!(printed.dimensions(), (2480, 3688));

    // Slot colors land in both halves of the print page
    let px = printed.pixels();
    for offset in [0, 1240] {
        assert!(near(*px.get_pixel(offset + 620, 480), [220, 30, 30]));
        assert!(near(*px.get_pixel(offset + 620, 1380), [30, 220, 30]));
        assert!(near(*px.get_pixel(offset + 620, 2280), [30, 30, 220]));
        // Margin stays white
        assert!(near(*px.get_pixel(offset + 20, 20), [255, 255, 255]));
    }
}

#[test]
fn test_render_artifacts_writes_companions() {
    let dir = TemplateDir::new();
    let strip = TemplateCollage::load(&dir.write("strip.json", STRIP_TEMPLATE_JSON)).unwrap();
    let photos = TestPhotos::solid(&[[10, 10, 10]; 3], 400, 300);
    let output = photos.path().join("collage.jpg");

    let printable = strip.render_artifacts(&photos.paths, &output).unwrap();
    assert_eq!(printable, print_path(&output));

    assert_eq!(Frame::open(&output).unwrap().dimensions(), (1240, 3688));
    assert_eq!(Frame::open(&printable).unwrap().dimensions(), (2480, 3688));
    let small = Frame::open(&small_path(&output)).unwrap();
    assert!(small.width() <= 1920 && small.height() <= 1080);
    assert_eq!(small.height(), 1080);
}

#[test]
fn test_render_artifacts_without_duplication() {
    let dir = TemplateDir::new();
    let pair = TemplateCollage::load(&dir.write("pair.toml", PAIR_TEMPLATE_TOML)).unwrap();
    let photos = TestPhotos::solid(&[[0, 0, 0]; 2], 100, 100);
    let output = photos.path().join("collage.jpg");

    let printable = pair.render_artifacts(&photos.paths, &output).unwrap();
    assert_eq!(printable, output);
    assert!(!print_path(&output).exists());
    // Already inside the bounds, so the companion keeps the page size
    assert_eq!(Frame::open(&small_path(&output)).unwrap().dimensions(), (800, 400));
}

#[test]
fn test_missing_photo_leaves_background() {
    let dir = TemplateDir::new();
    let pair = TemplateCollage::load(&dir.write("pair.toml", PAIR_TEMPLATE_TOML)).unwrap();
    let photos = TestPhotos::solid(&[[200, 0, 0]], 100, 100);
    let inputs = [photos.paths[0].clone(), photos.path().join("capture-1.jpg")];

    let collage = pair.assemble(&inputs, None, false).unwrap();
    assert!(near(*collage.pixels().get_pixel(200, 200), [200, 0, 0]));
    assert!(near(*collage.pixels().get_pixel(600, 200), [255, 255, 255]));
}

#[test]
fn test_background_and_transparent_foreground_resolve_relative_paths() {
    let dir = TemplateDir::new();
    RgbImage::from_pixel(10, 10, Rgb([0, 0, 200]))
        .save(dir.path().join("bg.png"))
        .unwrap();
    // Opaque red band across the top, transparent elsewhere
    RgbaImage::from_fn(100, 100, |_, y| {
        if y < 10 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 0, 0]) }
    })
    .save(dir.path().join("fg.png"))
    .unwrap();

    let path = dir.write(
        "framed.json",
        r#"{"name": "Framed", "page": {"width": 400, "height": 400},
            "photos": [{"x": 100, "y": 100, "width": 200, "height": 200}],
            "background": "bg.png", "foreground": "fg.png"}"#,
    );
    let framed = TemplateCollage::load(&path).unwrap();
    let photos = TestPhotos::solid(&[[0, 200, 0]], 50, 50);

    let collage = framed.assemble(&photos.paths, None, false).unwrap();
    let px = collage.pixels();
    assert!(near(*px.get_pixel(10, 10), [255, 0, 0]));
    assert!(near(*px.get_pixel(50, 200), [0, 0, 200]));
    assert!(near(*px.get_pixel(200, 200), [0, 200, 0]));
}

#[test]
fn test_layout_preview_file() {
    let dir = TemplateDir::new();
    let strip = TemplateCollage::load(&dir.write("strip.json", STRIP_TEMPLATE_JSON)).unwrap();

    let preview = strip.get_preview().unwrap();
    let image = image::open(&preview).unwrap();
    let (w, h) = image.dimensions();
    assert!(w <= 1920 && h <= 1080);
    // Placeholders are gray on the white page
    let center = image.to_rgb8().get_pixel(w / 2, h * 480 / 3688).0;
    assert!(center.iter().all(|&c| c.abs_diff(0x75) <= 10), "got {center:?}");
    std::fs::remove_file(preview).unwrap();
}

#[test]
fn test_print_params_are_stringified() {
    let dir = TemplateDir::new();
    let strip = TemplateCollage::load(&dir.write("strip.json", STRIP_TEMPLATE_JSON)).unwrap();
    let params = strip.print_params();
    assert_eq!(params.get("media").map(String::as_str), Some("Postcard"));
    assert_eq!(params.get("fit-to-page").map(String::as_str), Some("true"));
}

const GRAY_STRIP_JSON: &str = r#"{
    "name": "Gray Strip",
    "page": {"width": 1240, "height": 3688},
    "photos": [
        {"x": 0, "y": 0, "width": 1240, "height": 1229},
        {"x": 0, "y": 1229, "width": 1240, "height": 1229},
        {"x": 0, "y": 2458, "width": 1240, "height": 1229}
    ],
    "duplicate_horizontal": true
}"#;

#[test]
fn test_gray_strip_print_page() {
    let dir = TemplateDir::new();
    let strip = TemplateCollage::load(&dir.write("gray.json", GRAY_STRIP_JSON)).unwrap();
    let photos = TestPhotos::solid(&[[128, 128, 128]; 3], 1920, 1080);

    let page = strip.assemble(&photos.paths, None, true).unwrap();
    assert_eq!(page.dimensions(), (2480, 3688));
    assert_eq!(page.pixels().as_raw().len(), 2480 * 3688 * 3);
    for (x, y) in [(620, 600), (1860, 1800), (1860, 3000)] {
        assert!(near(*page.pixels().get_pixel(x, y), [128, 128, 128]), "({x}, {y})");
    }
}

#[test]
fn test_assemble_is_deterministic() {
    let dir = TemplateDir::new();
    let strip = TemplateCollage::load(&dir.write("strip.json", STRIP_TEMPLATE_JSON)).unwrap();
    let photos = TestPhotos::solid(&[[200, 40, 40], [40, 200, 40], [40, 40, 200]], 640, 480);

    let first = strip.assemble(&photos.paths, None, true).unwrap();
    let second = strip.assemble(&photos.paths, None, true).unwrap();
    assert_eq!(first.dimensions(), second.dimensions());
    assert!(first == second, "two assemblies of the same inputs differ");
}
