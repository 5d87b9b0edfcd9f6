//! Integration tests for the image helpers on files written to disk.

use image::{Rgb, RgbImage};
use photobooth::error::PhotoboothError;
use photobooth::frame::Frame;
use photobooth::image_ops::{
    blurry_pad_to_size, crop_to_aspect_ratio, downscale_to_bounds, resize_and_crop, zoom,
};

use crate::common::fixtures::TestPhotos;

/// A 4:3 photo loaded from JPEG, cropped to a square slot, saved, reloaded.
#[test]
fn test_photo_file_to_square_slot() {
    let photos = TestPhotos::solid(&[[200, 40, 40]], 640, 480);
    let photo = Frame::open(&photos.paths[0]).unwrap();
    assert_eq!(photo.dimensions(), (640, 480));

    let slot = resize_and_crop(&photo, Some(300), Some(300)).unwrap();
    assert_eq!(slot.dimensions(), (300, 300));

    let out = photos.path().join("slot.jpg");
    slot.save(&out).unwrap();
    let reloaded = Frame::open(&out).unwrap();
    assert_eq!(reloaded.dimensions(), (300, 300));
    let px = reloaded.pixels().get_pixel(150, 150);
    assert!(px.0[0] > 150 && px.0[1] < 90, "color survived: {px:?}");
}

#[test]
fn test_missing_photo_file() {
    let photos = TestPhotos::solid(&[], 10, 10);
    let err = Frame::open(&photos.path().join("nope.jpg")).unwrap_err();
    assert!(matches!(err, PhotoboothError::ImageNotFound { .. }), "got {err:?}");
}

#[test]
fn test_capture_pipeline_shapes() {
    // Capture at 3:2, crop to a 4:3 slot, then bound the companion
    let photo = Frame::new(RgbImage::from_pixel(3000, 2000, Rgb([90, 90, 90])));

    let cropped = crop_to_aspect_ratio(&photo, Some(4.0 / 3.0)).unwrap();
    let (w, h) = cropped.dimensions();
    assert_eq!(h, 2000);
    assert!((f64::from(w) / f64::from(h) - 4.0 / 3.0).abs() < 0.01);

    let small = downscale_to_bounds(&cropped, 1920, 1080);
    assert!(small.width() <= 1920 && small.height() <= 1080);
    assert_eq!(small.height(), 1080);
}

#[test]
fn test_zoom_then_pad_keeps_target_size() {
    let frame = Frame::new(RgbImage::from_fn(320, 240, |x, _| Rgb([(x % 256) as u8, 0, 0])));
    let zoomed = zoom(&frame, 1.5, 20, -10).unwrap();
    assert_eq!(zoomed.dimensions(), (320, 240));

    let padded = blurry_pad_to_size(&zoomed, 480, 240).unwrap();
    assert_eq!(padded.dimensions(), (480, 240));
}

#[test]
fn test_invalid_arguments_are_rejected() {
    let frame = Frame::solid(10, 10, [0, 0, 0]);
    assert!(matches!(
        resize_and_crop(&frame, Some(0), Some(5)),
        Err(PhotoboothError::InvalidDimensions { .. })
    ));
    assert!(matches!(
        crop_to_aspect_ratio(&frame, Some(-1.0)),
        Err(PhotoboothError::InvalidAspectRatio { .. })
    ));
    assert!(matches!(zoom(&frame, 0.5, 0, 0), Err(PhotoboothError::InvalidZoom { .. })));
}
