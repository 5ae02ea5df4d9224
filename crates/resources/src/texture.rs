//! Texture decoding.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Decoded RGBA8 pixels ready for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    /// Label used in logs and GPU object names.
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows, top row first.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decodes a DDS or PNG file into RGBA8.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        let image = image::open(path).map_err(|source| ResourceError::Texture {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("Decoded texture {} ({}x{})", path.display(), width, height);

        Ok(Self {
            name: path.display().to_string(),
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// A 2x2 light/dark checker, used when no textures are configured.
    pub fn checker() -> Self {
        const LIGHT: [u8; 4] = [235, 235, 235, 255];
        const DARK: [u8; 4] = [90, 90, 90, 255];
        Self {
            name: "checker".to_string(),
            width: 2,
            height: 2,
            pixels: [LIGHT, DARK, DARK, LIGHT].concat(),
        }
    }

    /// Size of the pixel payload in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}
