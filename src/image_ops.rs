//! Geometric image operations.
//!
//! Every function here is pure: it takes a [`Frame`] by reference and returns
//! a new one. The only failures are invalid arguments.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;

/// Two aspect ratios closer than this are considered equal.
pub const ASPECT_EPSILON: f64 = 0.01;

/// Default bounds of the downscaled "small" companion images.
pub const SMALL_MAX_WIDTH: u32 = 1920;
pub const SMALL_MAX_HEIGHT: u32 = 1080;

// Area-like filter, good enough for the large downscales a collage needs
const FILTER: FilterType = FilterType::Triangle;

// The blurred backdrop is computed at 1/8 of the target size
const BACKDROP_DOWNSAMPLE: u32 = 8;
const BACKDROP_SIGMA: f32 = 6.0;

/// Scale `value` by `num / den`, rounding, never below 1.
fn scale_dim(value: u32, num: u32, den: u32) -> u32 {
    ((f64::from(value) * f64::from(num) / f64::from(den)).round() as u32).max(1)
}

fn ensure_not_empty(image: &Frame) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PhotoboothError::ImageProcessing(
            "cannot transform an empty frame".to_string(),
        ));
    }
    Ok(())
}

fn resize(image: &Frame, width: u32, height: u32) -> Frame {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    image.map(|px| imageops::resize(px, width, height, FILTER))
}

fn crop(image: &Frame, x: u32, y: u32, width: u32, height: u32) -> Frame {
    image.map(|px| imageops::crop_imm(px, x, y, width, height).to_image())
}

/// Resize and crop to exact target dimensions.
///
/// * Both dimensions `None`: the input is returned unchanged.
/// * One dimension `None`: the given axis is matched exactly and the other is
///   derived from the source aspect ratio, without cropping.
/// * Both given: cover fit (the source fully covers the target), then a
///   centered crop of the overflowing axis. The result is always exactly
///   `target_width x target_height`.
///
/// # Errors
///
/// Returns [`PhotoboothError::InvalidDimensions`] if a given target is 0.
pub fn resize_and_crop(
    image: &Frame,
    target_height: Option<u32>,
    target_width: Option<u32>,
) -> Result<Frame> {
    if target_height == Some(0) || target_width == Some(0) {
        return Err(PhotoboothError::InvalidDimensions {
            width: target_width.unwrap_or(0),
            height: target_height.unwrap_or(0),
        });
    }

    let (width, height) = image.dimensions();
    match (target_height, target_width) {
        (None, None) => Ok(image.clone()),
        (Some(th), None) => {
            ensure_not_empty(image)?;
            Ok(resize(image, scale_dim(width, th, height), th))
        }
        (None, Some(tw)) => {
            ensure_not_empty(image)?;
            Ok(resize(image, tw, scale_dim(height, tw, width)))
        }
        (Some(th), Some(tw)) => {
            ensure_not_empty(image)?;
            let source_ratio = f64::from(width) / f64::from(height);
            let target_ratio = f64::from(tw) / f64::from(th);

            let (new_w, new_h) = if source_ratio > target_ratio {
                // Wider than the target: match height, crop width
                (scale_dim(width, th, height).max(tw), th)
            } else {
                // Taller than the target: match width, crop height
                (tw, scale_dim(height, tw, width).max(th))
            };

            let resized = resize(image, new_w, new_h);
            let x = (new_w - tw) / 2;
            let y = (new_h - th) / 2;
            let cropped = crop(&resized, x, y, tw, th);

            if cropped.dimensions() == (tw, th) {
                Ok(cropped)
            } else {
                Ok(resize(&cropped, tw, th))
            }
        }
    }
}

/// Center-crop to a width/height ratio.
///
/// `None`, or a frame already within [`ASPECT_EPSILON`] of `ratio`, is
/// returned unchanged.
///
/// # Errors
///
/// Returns [`PhotoboothError::InvalidAspectRatio`] for non-finite or
/// non-positive ratios.
pub fn crop_to_aspect_ratio(image: &Frame, ratio: Option<f64>) -> Result<Frame> {
    let Some(ratio) = ratio else {
        return Ok(image.clone());
    };
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(PhotoboothError::InvalidAspectRatio { ratio });
    }
    ensure_not_empty(image)?;

    let (width, height) = image.dimensions();
    let current = f64::from(width) / f64::from(height);
    if (current - ratio).abs() < ASPECT_EPSILON {
        return Ok(image.clone());
    }

    if current > ratio {
        let new_w = ((f64::from(height) * ratio).round() as u32).clamp(1, width);
        Ok(crop(image, (width - new_w) / 2, 0, new_w, height))
    } else {
        let new_h = ((f64::from(width) / ratio).round() as u32).clamp(1, height);
        Ok(crop(image, 0, (height - new_h) / 2, width, new_h))
    }
}

/// Digital zoom with pan.
///
/// The frame is upscaled by `factor` and a window of the original size is cut
/// out around the scaled center shifted by `(x_offset, y_offset)`. The window
/// is kept inside the scaled image, so the output always has the input's
/// dimensions.
///
/// # Errors
///
/// Returns [`PhotoboothError::InvalidZoom`] if `factor < 1.0`.
pub fn zoom(image: &Frame, factor: f64, x_offset: i32, y_offset: i32) -> Result<Frame> {
    // Written this way round so NaN is rejected too
    if !(factor >= 1.0) || !factor.is_finite() {
        return Err(PhotoboothError::InvalidZoom { factor });
    }
    if (factor - 1.0).abs() < f64::EPSILON && x_offset == 0 && y_offset == 0 {
        return Ok(image.clone());
    }
    ensure_not_empty(image)?;

    let (width, height) = image.dimensions();
    let scaled_w = ((f64::from(width) * factor).round() as u32).max(width);
    let scaled_h = ((f64::from(height) * factor).round() as u32).max(height);
    let scaled = resize(image, scaled_w, scaled_h);

    let center_x = f64::from(scaled_w) / 2.0 + f64::from(x_offset);
    let center_y = f64::from(scaled_h) / 2.0 + f64::from(y_offset);
    let left = (center_x - f64::from(width) / 2.0)
        .round()
        .clamp(0.0, f64::from(scaled_w - width)) as u32;
    let top = (center_y - f64::from(height) / 2.0)
        .round()
        .clamp(0.0, f64::from(scaled_h - height)) as u32;

    Ok(crop(&scaled, left, top, width, height))
}

/// Fit the frame inside `target_width x target_height` and fill the
/// letterbox or pillarbox bands with a blurred, stretched copy of itself.
///
/// # Errors
///
/// Returns [`PhotoboothError::InvalidDimensions`] if a target is 0.
pub fn blurry_pad_to_size(image: &Frame, target_width: u32, target_height: u32) -> Result<Frame> {
    if target_width == 0 || target_height == 0 {
        return Err(PhotoboothError::InvalidDimensions {
            width: target_width,
            height: target_height,
        });
    }
    ensure_not_empty(image)?;

    let (width, height) = image.dimensions();
    let scale = (f64::from(target_width) / f64::from(width))
        .min(f64::from(target_height) / f64::from(height));
    let fit_w = ((f64::from(width) * scale).round() as u32).clamp(1, target_width);
    let fit_h = ((f64::from(height) * scale).round() as u32).clamp(1, target_height);
    let fitted = resize(image, fit_w, fit_h);
    if (fit_w, fit_h) == (target_width, target_height) {
        return Ok(fitted);
    }

    let small_w = (target_width / BACKDROP_DOWNSAMPLE).max(1);
    let small_h = (target_height / BACKDROP_DOWNSAMPLE).max(1);
    let padded = image.map(|px| {
        let backdrop = imageops::resize(px, small_w, small_h, FILTER);
        let backdrop = imageops::blur(&backdrop, BACKDROP_SIGMA);
        let mut canvas = imageops::resize(&backdrop, target_width, target_height, FILTER);
        imageops::replace(
            &mut canvas,
            fitted.pixels(),
            i64::from((target_width - fit_w) / 2),
            i64::from((target_height - fit_h) / 2),
        );
        canvas
    });
    Ok(padded)
}

/// Shrink a frame to fit inside `max_width x max_height`, keeping its aspect
/// ratio. Frames already inside the bounds are returned unchanged.
pub fn downscale_to_bounds(image: &Frame, max_width: u32, max_height: u32) -> Frame {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return image.clone();
    }

    let aspect = f64::from(width) / f64::from(height);
    let (new_w, new_h) =
        if f64::from(max_width) / f64::from(width) < f64::from(max_height) / f64::from(height) {
            (max_width, ((f64::from(max_width) / aspect) as u32).max(1))
        } else {
            (((f64::from(max_height) * aspect) as u32).max(1), max_height)
        };
    resize(image, new_w, new_h)
}

/// Resize to exact dimensions, ignoring the aspect ratio.
///
/// # Errors
///
/// Returns [`PhotoboothError::InvalidDimensions`] if a target is 0.
pub fn stretch(image: &Frame, width: u32, height: u32) -> Result<Frame> {
    if width == 0 || height == 0 {
        return Err(PhotoboothError::InvalidDimensions { width, height });
    }
    ensure_not_empty(image)?;
    Ok(resize(image, width, height))
}

/// Blend `overlay` over `base` at a uniform opacity.
///
/// The overlay is stretched to the base size first. `alpha` is clamped to
/// `0.0..=1.0`; the result has the base's channel order.
pub fn blend(base: &Frame, overlay: &Frame, alpha: f32) -> Result<Frame> {
    let alpha = alpha.clamp(0.0, 1.0);
    let (width, height) = base.dimensions();
    let overlay = stretch(overlay, width, height)?;
    let needs_swap = overlay.order() != base.order();
    let mut overlay = overlay.into_pixels();
    if needs_swap {
        // Only two orders exist, so swapping red and blue converts either way
        for px in overlay.pixels_mut() {
            px.0.swap(0, 2);
        }
    }

    Ok(base.map(|px| {
        let mut out = px.clone();
        for (dst, src) in out.pixels_mut().zip(overlay.pixels()) {
            for c in 0..3 {
                dst[c] = mix(dst[c], src[c], alpha);
            }
        }
        out
    }))
}

/// Composite an RGBA overlay over an RGB frame using the overlay's alpha
/// channel: `alpha * overlay + (1 - alpha) * base` per channel.
///
/// The overlay must already match the frame's dimensions.
pub fn alpha_composite(base: &Frame, overlay: &RgbaImage) -> Frame {
    let base = base.clone().into_rgb();
    base.map(|px| {
        let mut out = px.clone();
        for (dst, src) in out.pixels_mut().zip(overlay.pixels()) {
            let alpha = f32::from(src[3]) / 255.0;
            for c in 0..3 {
                dst[c] = mix(dst[c], src[c], alpha);
            }
        }
        out
    })
}

fn mix(base: u8, top: u8, alpha: f32) -> u8 {
    alpha
        .mul_add(f32::from(top), (1.0 - alpha) * f32::from(base))
        .round()
        .clamp(0.0, 255.0) as u8
}
