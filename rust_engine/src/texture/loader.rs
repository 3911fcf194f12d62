//! 纹理解码
//!
//! 统一解码为 RGBA8，不做垂直翻转：
//! 是否翻转由 GL 上传时的 UNPACK_FLIP_Y 决定（Cubism2 翻转，Cubism4 不翻转）。

use image::{DynamicImage, GenericImageView};

use super::Texture;
use crate::{Live2dError, Result};

/// 从内存解码纹理
pub fn load_texture_from_memory(data: &[u8]) -> Result<Texture> {
    let img = image::load_from_memory(data)
        .map_err(|e| Live2dError::Texture(format!("Failed to decode texture: {}", e)))?;

    let (width, height) = img.dimensions();
    let has_alpha = has_alpha_channel(&img);
    let pixels = img.to_rgba8().into_raw();

    Ok(Texture::new(width, height, pixels, has_alpha))
}

/// 检查图片是否有透明通道
fn has_alpha_channel(img: &DynamicImage) -> bool {
    matches!(
        img,
        DynamicImage::ImageRgba8(_)
            | DynamicImage::ImageRgba16(_)
            | DynamicImage::ImageRgba32F(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLumaA16(_)
    )
}
