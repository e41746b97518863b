//! CPU-side texture images: decode, fallback and mip generation.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;

use crate::util::{Error, Result};

/// Solid color substituted for textures that fail to decode.
pub const FALLBACK_RGBA: [u8; 4] = [255, 0, 255, 255];

/// Decoded RGBA8 image
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows
    pub pixels: Vec<u8>,
    /// True when this image replaced a texture that failed to load
    pub is_fallback: bool,
}

impl TextureImage {
    pub fn from_rgba8(label: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let label = label.into();
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(Error::TextureDecode {
                path: label.into(),
                message: format!("{}x{} image needs {} bytes, got {}", width, height, expected, pixels.len()),
            });
        }
        Ok(Self {
            label,
            width,
            height,
            pixels,
            is_fallback: false,
        })
    }

    /// 1x1 image of a single color
    pub fn solid(label: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self {
            label: label.into(),
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
            is_fallback: false,
        }
    }

    /// Magenta placeholder for a texture that could not be decoded.
    pub fn fallback(label: impl Into<String>) -> Self {
        Self {
            is_fallback: true,
            ..Self::solid(label, FALLBACK_RGBA)
        }
    }

    /// Decode an image file into RGBA8.
    pub fn decode(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| Error::TextureDecode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(path.display().to_string(), width, height, rgba.into_raw())
    }

    /// Decode encoded image bytes (embedded textures).
    pub fn decode_memory(label: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let label = label.into();
        let img = image::load_from_memory(bytes).map_err(|e| Error::TextureDecode {
            path: label.clone().into(),
            message: e.to_string(),
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(label, width, height, rgba.into_raw())
    }

    /// Decode `path`, substituting the magenta fallback on failure.
    pub fn load_or_fallback(path: &Path) -> Self {
        match Self::decode(path) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("Texture {} unavailable, using fallback: {}", path.display(), e);
                Self::fallback(path.display().to_string())
            }
        }
    }

    /// Copy one channel into all color channels of a new opaque image.
    ///
    /// Used to split packed metallic-roughness maps into separate roles.
    pub fn extract_channel(&self, channel: usize, label: impl Into<String>) -> Self {
        let channel = channel.min(3);
        let pixels = self
            .pixels
            .chunks_exact(4)
            .flat_map(|px| {
                let v = px[channel];
                [v, v, v, 255]
            })
            .collect();
        Self {
            label: label.into(),
            width: self.width,
            height: self.height,
            pixels,
            is_fallback: self.is_fallback,
        }
    }

    /// Copy scaled down so neither side exceeds `max`, keeping the aspect ratio.
    /// Returns `None` when the image already fits.
    pub fn fit_within(&self, max: u32) -> Option<Self> {
        let max = max.max(1);
        let longest = self.width.max(self.height);
        if longest <= max {
            return None;
        }
        let scale = |side: u32| ((side as u64 * max as u64) / longest as u64).clamp(1, max as u64) as u32;
        let (width, height) = (scale(self.width), scale(self.height));
        let pixels = match RgbaImage::from_raw(self.width, self.height, self.pixels.clone()) {
            Some(base) => image::imageops::resize(&base, width, height, FilterType::Triangle).into_raw(),
            None => return Some(Self::fallback(self.label.clone())),
        };
        Some(Self {
            label: self.label.clone(),
            width,
            height,
            pixels,
            is_fallback: self.is_fallback,
        })
    }

    /// Number of mip levels down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }

    /// Full mip chain, level 0 first, each level half the previous (min 1).
    pub fn mip_chain(&self) -> Vec<(u32, u32, Vec<u8>)> {
        let levels = self.mip_level_count();
        let mut chain = Vec::with_capacity(levels as usize);
        chain.push((self.width, self.height, self.pixels.clone()));

        let Some(base) = RgbaImage::from_raw(self.width, self.height, self.pixels.clone()) else {
            return chain;
        };
        let (mut w, mut h) = (self.width, self.height);
        for _ in 1..levels {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            let level = image::imageops::resize(&base, w, h, FilterType::Triangle);
            chain.push((w, h, level.into_raw()));
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_magenta() {
        let img = TextureImage::load_or_fallback(Path::new("/nonexistent/texture.png"));
        assert!(img.is_fallback);
        assert_eq!((img.width, img.height), (1, 1));
        assert_eq!(img.pixels, FALLBACK_RGBA.to_vec());
    }

    #[test]
    fn test_from_rgba8_rejects_bad_length() {
        assert!(TextureImage::from_rgba8("bad", 2, 2, vec![0; 15]).is_err());
        assert!(TextureImage::from_rgba8("empty", 0, 2, Vec::new()).is_err());
        assert!(TextureImage::from_rgba8("ok", 2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_mip_chain_sizes() {
        let img = TextureImage::from_rgba8("mips", 8, 2, vec![128; 8 * 2 * 4]).unwrap();
        assert_eq!(img.mip_level_count(), 4);
        let chain = img.mip_chain();
        let sizes: Vec<(u32, u32)> = chain.iter().map(|(w, h, _)| (*w, *h)).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        for (w, h, px) in &chain {
            assert_eq!(px.len(), (*w * *h * 4) as usize);
        }
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        let wide = TextureImage::from_rgba8("wide", 8193, 2, vec![200; 8193 * 2 * 4]).unwrap();
        let fitted = wide.fit_within(8192).unwrap();
        assert_eq!((fitted.width, fitted.height), (8192, 1));
        assert_eq!(fitted.pixels.len(), 8192 * 4);
        assert!(!fitted.is_fallback);

        let tall = TextureImage::from_rgba8("tall", 4, 16, vec![0; 4 * 16 * 4]).unwrap();
        let fitted = tall.fit_within(8).unwrap();
        assert_eq!((fitted.width, fitted.height), (2, 8));

        assert!(tall.fit_within(16).is_none());
    }

    #[test]
    fn test_extract_channel() {
        // glTF packs roughness in G and metallic in B
        let img = TextureImage::from_rgba8("mr", 1, 1, vec![0, 40, 200, 255]).unwrap();
        assert_eq!(img.extract_channel(1, "rough").pixels, vec![40, 40, 40, 255]);
        assert_eq!(img.extract_channel(2, "metal").pixels, vec![200, 200, 200, 255]);
    }
}
