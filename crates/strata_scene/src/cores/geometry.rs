//! Geometry payload carried on display list entries.

use serde::Deserialize;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, decode_params, parse_choice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Primitive {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    const CHOICES: [(&'static str, Primitive); 7] = [
        ("points", Primitive::Points),
        ("lines", Primitive::Lines),
        ("line-loop", Primitive::LineLoop),
        ("line-strip", Primitive::LineStrip),
        ("triangles", Primitive::Triangles),
        ("triangle-strip", Primitive::TriangleStrip),
        ("triangle-fan", Primitive::TriangleFan),
    ];
}

/// Vertex arrays of a drawable. Attribute arrays are flat: positions and
/// normals hold 3 floats per vertex, uvs 2, colours 4.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryState {
    pub primitive: Primitive,
    pub positions: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    pub uvs: Option<Vec<f32>>,
    pub colors: Option<Vec<f32>>,
    pub indices: Option<Vec<u32>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeometryParams {
    primitive: Option<String>,
    positions: Option<Vec<f32>>,
    normals: Option<Vec<f32>>,
    uv: Option<Vec<f32>>,
    colors: Option<Vec<f32>>,
    indices: Option<Vec<u32>>,
}

impl GeometryState {
    #[must_use]
    pub fn triangles(positions: Vec<f32>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let c = Category::Geometry;
        let p: GeometryParams = decode_params("geometry", params)?;
        let state = Self {
            primitive: match p.primitive.as_deref() {
                Some(v) => parse_choice(c, "primitive", v, &Primitive::CHOICES)?,
                None => Primitive::Triangles,
            },
            positions: p.positions.ok_or(ConfigError::MissingField { category: c, field: "positions" })?,
            normals: p.normals,
            uvs: p.uv,
            colors: p.colors,
            indices: p.indices,
        };
        state.validate()?;
        Ok(state)
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| ConfigError::InvalidValue {
            category: Category::Geometry,
            field,
            reason,
        };
        if !self.positions.len().is_multiple_of(3) {
            return Err(invalid("positions", format!("length {} is not a multiple of 3", self.positions.len())));
        }
        let vertices = self.vertex_count();
        let arrays: [(&'static str, Option<&Vec<f32>>, usize); 3] = [
            ("normals", self.normals.as_ref(), 3),
            ("uv", self.uvs.as_ref(), 2),
            ("colors", self.colors.as_ref(), 4),
        ];
        for (field, array, width) in arrays {
            if let Some(array) = array
                && array.len() != vertices * width
            {
                return Err(invalid(field, format!("expected {} floats, got {}", vertices * width, array.len())));
            }
        }
        if let Some(indices) = &self.indices
            && let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices)
        {
            return Err(invalid("indices", format!("index {bad} out of range for {vertices} vertices")));
        }
        Ok(())
    }

    /// Primitive and attribute layout.
    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        BindingHasher::new(Category::Geometry)
            .tag(self.primitive as u8)
            .flag(self.normals.is_some())
            .flag(self.uvs.is_some())
            .flag(self.colors.is_some())
            .flag(self.indices.is_some())
            .finish()
    }
}
