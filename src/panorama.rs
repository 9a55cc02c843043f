// panorama.rs: 图片读取与全景图预处理

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::io::Reader as ImageReader;
use image::{GenericImage, GenericImageView, Rgba, RgbaImage};

use crate::error::AssetError;

/// Decode any supported image file into 8-bit RGBA.
pub fn load_rgba(path: &Path) -> Result<RgbaImage, AssetError> {
    let file = File::open(path).map_err(|source| AssetError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let decode_error = |source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|err| decode_error(image::ImageError::IoError(err)))?;
    // 全景图常常超过默认的解码尺寸限制
    reader.no_limits();
    let image = reader.decode().map_err(decode_error)?;

    let (width, height) = image.dimensions();
    log::info!("loaded {} ({width}x{height})", path.display());
    Ok(image.to_rgba8())
}

/// Downscale so neither side exceeds `max_dimension`, keeping the aspect.
pub fn fit_to_limit(image: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    if src_w <= max_dimension && src_h <= max_dimension {
        return image;
    }

    let scale = max_dimension as f32 / src_w.max(src_h) as f32;
    let new_w = ((src_w as f32 * scale) as u32).clamp(1, max_dimension);
    let new_h = ((src_h as f32 * scale) as u32).clamp(1, max_dimension);
    log::warn!(
        "panorama {src_w}x{src_h} exceeds texture limit {max_dimension}; scaled to {new_w}x{new_h}"
    );
    image::imageops::resize(&image, new_w, new_h, image::imageops::FilterType::Lanczos3)
}

/// Pad an image shorter than 2:1 with opaque black at the top, so the
/// picture keeps its place at the lower latitudes.
pub fn pad_to_equirect(image: RgbaImage) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    let target_h = src_w / 2;
    if target_h == 0 || src_h >= target_h {
        return image;
    }

    let mut canvas = RgbaImage::from_pixel(src_w, target_h, Rgba([0, 0, 0, 255]));
    // 原图贴到底部；y_offset 保证不会越界
    if let Err(err) = canvas.copy_from(&image, 0, target_h - src_h) {
        log::warn!("failed to pad panorama: {err}");
        return image;
    }
    canvas
}

/// Everything a decoded panorama goes through before upload.
pub fn prepare_panorama(image: RgbaImage, max_dimension: u32) -> RgbaImage {
    pad_to_equirect(fit_to_limit(image, max_dimension))
}
