//! Texture loading and data structures.

use std::path::Path;

use anyhow::{Context, Result};

use crate::roots::AssetRoots;

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
    R8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::R8 => 1,
        }
    }
}

impl TextureData {
    /// Wrap raw pixels. `None` if the size doesn't match the format.
    pub fn new(width: u32, height: u32, format: TextureFormat, data: Vec<u8>) -> Option<Self> {
        let tex = Self {
            data,
            width,
            height,
            format,
        };
        tex.is_valid().then_some(tex)
    }

    /// Decode an encoded image (PNG) into RGBA8.
    pub fn from_memory(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).context("Failed to decode image")?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
            format: TextureFormat::Rgba8,
        })
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size =
            self.width as usize * self.height as usize * self.bytes_per_pixel() as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

/// Resolve `textures/<name>` against `roots` and decode it.
pub fn load_texture(roots: &AssetRoots, name: &str) -> Result<TextureData> {
    let rel = Path::new("textures").join(name);
    let bytes = roots.read(&rel)?;
    let tex = TextureData::from_memory(&bytes)
        .with_context(|| format!("Failed to load texture '{name}'"))?;
    log::info!(
        "Loaded texture '{}' {}x{} with {} bytes",
        name,
        tex.width,
        tex.height,
        tex.data.len()
    );
    Ok(tex)
}
