//! Colour-coded region map.

use glam::Vec3;
use serde::Deserialize;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, ImageData, ImageSource, RgbParam, decode_params, parse_choice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RegionMode {
    #[default]
    Info,
    Highlight,
    Hide,
    Isolate,
}

impl RegionMode {
    const CHOICES: [(&'static str, RegionMode); 4] = [
        ("info", RegionMode::Info),
        ("highlight", RegionMode::Highlight),
        ("hide", RegionMode::Hide),
        ("isolate", RegionMode::Isolate),
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionMapState {
    pub source: Option<ImageSource>,
    pub image: Option<ImageData>,
    pub mode: RegionMode,
    /// Region colour to highlight; negative components mean none.
    pub highlight_color: Vec3,
    pub highlight_factor: Vec3,
}

impl Default for RegionMapState {
    fn default() -> Self {
        Self {
            source: None,
            image: None,
            mode: RegionMode::Info,
            highlight_color: Vec3::splat(-1.0),
            highlight_factor: Vec3::new(1.5, 1.5, 0.0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RegionMapParams {
    src: Option<String>,
    target: Option<String>,
    mode: Option<String>,
    highlight_color: Option<RgbParam>,
    highlight_factor: Option<RgbParam>,
}

impl RegionMapState {
    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let p: RegionMapParams = decode_params("regionMap", params)?;
        let d = Self::default();
        let source = match (p.src, p.target) {
            (Some(src), _) => ImageSource::Uri(src),
            (None, Some(target)) => ImageSource::Target(target),
            (None, None) => {
                return Err(ConfigError::MissingField {
                    category: Category::RegionMap,
                    field: "src",
                });
            }
        };
        Ok(Self {
            source: Some(source),
            image: None,
            mode: match p.mode.as_deref() {
                Some(v) => parse_choice(Category::RegionMap, "mode", v, &RegionMode::CHOICES)?,
                None => d.mode,
            },
            highlight_color: p.highlight_color.map_or(d.highlight_color, |c| c.or(d.highlight_color)),
            highlight_factor: p.highlight_factor.map_or(d.highlight_factor, |c| c.or(d.highlight_factor)),
        })
    }

    #[must_use]
    pub fn pending_uri(&self) -> Option<&str> {
        match (&self.source, &self.image) {
            (Some(ImageSource::Uri(uri)), None) => Some(uri),
            _ => None,
        }
    }

    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        BindingHasher::new(Category::RegionMap)
            .flag(self.source.is_some())
            .tag(self.mode as u8)
            .finish()
    }
}
