//! Modelling transforms.
//!
//! Transform nodes form a chain: at compile time each xform core is linked to
//! the xform core visible above it, and the world matrix is resolved from that
//! chain at submission. Numeric edits therefore only need re-submission.

use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;
use strata_core::{Category, ConfigError, CoreKey};

use super::{BindingHasher, decode_params};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XformKind {
    Translate(Vec3),
    /// Angle in degrees about a (non-zero) axis.
    Rotate { angle: f32, axis: Vec3 },
    Scale(Vec3),
    Matrix(Mat4),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XformState {
    pub kind: XformKind,
    /// Enclosing xform core, linked by the compiler.
    pub parent: Option<CoreKey>,
}

impl Default for XformState {
    fn default() -> Self {
        Self::new(XformKind::Matrix(Mat4::IDENTITY))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XformParams {
    x: Option<f32>,
    y: Option<f32>,
    z: Option<f32>,
    angle: Option<f32>,
    elements: Option<Vec<f32>>,
}

impl XformState {
    #[must_use]
    pub fn new(kind: XformKind) -> Self {
        Self { kind, parent: None }
    }

    #[must_use]
    pub fn translate(offset: Vec3) -> Self {
        Self::new(XformKind::Translate(offset))
    }

    #[must_use]
    pub fn rotate(angle: f32, axis: Vec3) -> Self {
        Self::new(XformKind::Rotate { angle, axis })
    }

    #[must_use]
    pub fn scale(factor: Vec3) -> Self {
        Self::new(XformKind::Scale(factor))
    }

    #[must_use]
    pub fn matrix(matrix: Mat4) -> Self {
        Self::new(XformKind::Matrix(matrix))
    }

    /// Decodes one of the transform node types
    /// (`translate`, `rotate`, `scale`, `matrix`).
    pub fn from_params(type_name: &str, params: &serde_json::Value) -> Result<Self, ConfigError> {
        let p: XformParams = decode_params(type_name, params)?;
        let xyz = |default: f32| Vec3::new(p.x.unwrap_or(default), p.y.unwrap_or(default), p.z.unwrap_or(default));
        let state = match type_name {
            "translate" => Self::translate(xyz(0.0)),
            "scale" => Self::scale(xyz(1.0)),
            "rotate" => Self::rotate(p.angle.unwrap_or(0.0), xyz(0.0)),
            "matrix" => {
                let elements = p.elements.as_deref().unwrap_or(&[]);
                if elements.is_empty() {
                    Self::default()
                } else if elements.len() == 16 {
                    Self::matrix(Mat4::from_cols_slice(elements))
                } else {
                    return Err(ConfigError::InvalidValue {
                        category: Category::Xform,
                        field: "elements",
                        reason: format!("expected 16 elements, got {}", elements.len()),
                    });
                }
            }
            other => return Err(ConfigError::UnknownType(other.to_string())),
        };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let XformKind::Rotate { axis, .. } = self.kind
            && axis.length_squared() == 0.0
        {
            return Err(ConfigError::InvalidValue {
                category: Category::Xform,
                field: "axis",
                reason: "rotation axis must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Local matrix of this transform.
    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        match self.kind {
            XformKind::Translate(offset) => Mat4::from_translation(offset),
            XformKind::Rotate { angle, axis } => Mat4::from_quat(Quat::from_axis_angle(axis.normalize(), angle.to_radians())),
            XformKind::Scale(factor) => Mat4::from_scale(factor),
            XformKind::Matrix(matrix) => matrix,
        }
    }

    /// Transforms never split a batch.
    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        BindingHasher::new(Category::Xform).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn translate_params_build_a_translation() {
        let state = XformState::from_params("translate", &json!({ "x": 1.0 })).unwrap();
        assert_eq!(state.local_matrix(), Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn scale_defaults_to_unit() {
        let state = XformState::from_params("scale", &json!({ "y": 2.0 })).unwrap();
        assert_eq!(state.kind, XformKind::Scale(Vec3::new(1.0, 2.0, 1.0)));
    }

    #[test]
    fn zero_axis_rotation_is_rejected() {
        let err = XformState::from_params("rotate", &json!({ "angle": 90.0 })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "axis", .. }));
    }

    #[test]
    fn matrix_needs_sixteen_elements() {
        let err = XformState::from_params("matrix", &json!({ "elements": [1.0, 0.0] })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "elements", .. }));
    }
}
