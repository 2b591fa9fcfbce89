//! Static drawing assets, loaded once at startup.
//!
//! The bundle is immutable and passed by reference into the composer;
//! missing fonts or the template card are fatal, missing overlays are not.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use rusttype::Font;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse font {0}")]
    BadFont(PathBuf),
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

pub struct AssetBundle {
    pub font_regular: Font<'static>,
    pub font_medium: Font<'static>,
    pub font_bold: Font<'static>,
    pub template: RgbaImage,
    pub frame_gray: Option<RgbaImage>,
    pub frame_green: Option<RgbaImage>,
    logos_dir: PathBuf,
}

impl AssetBundle {
    pub fn load(dir: &Path) -> Result<Self, AssetError> {
        Ok(Self {
            font_regular: load_font(&dir.join("Inter.ttf"))?,
            font_medium: load_font(&dir.join("Inter-Medium.ttf"))?,
            font_bold: load_font(&dir.join("Inter-Bold.ttf"))?,
            template: load_image(&dir.join("template.png"))?,
            frame_gray: load_optional_image(&dir.join("Frame_Gray.png"))?,
            frame_green: load_optional_image(&dir.join("Frame_Green.png"))?,
            logos_dir: dir.join("color_logos"),
        })
    }

    /// Per-color series logo, looked up by color name with spaces stripped.
    ///
    /// A missing file is a soft skip (`Ok(None)`); a file that exists but
    /// cannot be decoded is an error, which aborts the row.
    pub fn logo_for_color(&self, color: &str) -> Result<Option<RgbaImage>, AssetError> {
        let path = self.logos_dir.join(format!("{}.png", color.replace(' ', "")));
        if !path.exists() {
            return Ok(None);
        }
        load_image(&path).map(Some)
    }
}

fn load_font(path: &Path) -> Result<Font<'static>, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Font::try_from_vec(bytes).ok_or_else(|| AssetError::BadFont(path.to_path_buf()))
}

fn load_image(path: &Path) -> Result<RgbaImage, AssetError> {
    let img = image::open(path).map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgba8())
}

fn load_optional_image(path: &Path) -> Result<Option<RgbaImage>, AssetError> {
    if !path.exists() {
        return Ok(None);
    }
    load_image(path).map(Some)
}
