//! User clip planes.

use glam::Vec4;
use serde::Deserialize;
use smallvec::SmallVec;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, decode_params, parse_choice};

/// Which half-space of a plane is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipMode {
    Inside,
    Outside,
    Disabled,
}

impl ClipMode {
    const CHOICES: [(&'static str, ClipMode); 3] = [
        ("inside", ClipMode::Inside),
        ("outside", ClipMode::Outside),
        ("disabled", ClipMode::Disabled),
    ];
}

/// Plane `a*x + b*y + c*z + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub mode: ClipMode,
    pub plane: Vec4,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClipsState {
    pub clips: SmallVec<[ClipPlane; 2]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClipParams {
    mode: Option<String>,
    a: f32,
    b: f32,
    c: f32,
    d: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClipsParams {
    clips: Vec<ClipParams>,
}

impl ClipsState {
    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let p: ClipsParams = decode_params("clips", params)?;
        let mut clips = SmallVec::with_capacity(p.clips.len());
        for clip in p.clips {
            clips.push(ClipPlane {
                mode: match clip.mode.as_deref() {
                    Some(v) => parse_choice(Category::Clips, "mode", v, &ClipMode::CHOICES)?,
                    None => ClipMode::Outside,
                },
                plane: Vec4::new(clip.a, clip.b, clip.c, clip.d),
            });
        }
        Ok(Self { clips })
    }

    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        let mut h = BindingHasher::new(Category::Clips);
        h.count(self.clips.len());
        for clip in &self.clips {
            h.tag(clip.mode as u8);
        }
        h.finish()
    }
}
