//! Custom shader stages.

use std::collections::BTreeMap;

use serde::Deserialize;
use strata_core::{Category, ConfigError};

use super::{BindingHasher, ConfigKey, decode_params, parse_choice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    const CHOICES: [(&'static str, ShaderStage); 2] = [("vertex", ShaderStage::Vertex), ("fragment", ShaderStage::Fragment)];
}

/// Uniform parameter value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ShaderParam {
    Scalar(f32),
    Vector(Vec<f32>),
}

/// Stage sources and uniform parameters. Sources select the program; params
/// are plain uniforms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderState {
    pub vertex: Option<String>,
    pub fragment: Option<String>,
    pub params: BTreeMap<String, ShaderParam>,
}

#[derive(Debug, Deserialize)]
struct StageParams {
    stage: Option<String>,
    #[serde(default)]
    code: Option<CodeParam>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeParam {
    Single(String),
    Lines(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShaderParams {
    shaders: Vec<StageParams>,
    params: BTreeMap<String, ShaderParam>,
}

impl ShaderState {
    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let c = Category::Shader;
        let p: ShaderParams = decode_params("shader", params)?;
        let mut state = Self {
            params: p.params,
            ..Self::default()
        };
        for stage in p.shaders {
            let name = stage.stage.ok_or(ConfigError::MissingField { category: c, field: "stage" })?;
            let code = match stage.code {
                Some(CodeParam::Single(code)) => code,
                Some(CodeParam::Lines(lines)) => lines.concat(),
                None => String::new(),
            };
            match parse_choice(c, "stage", &name, &ShaderStage::CHOICES)? {
                ShaderStage::Vertex => state.vertex = Some(code),
                ShaderStage::Fragment => state.fragment = Some(code),
            }
        }
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in &self.params {
            if let ShaderParam::Vector(v) = value
                && !(1..=4).contains(&v.len())
            {
                return Err(ConfigError::InvalidValue {
                    category: Category::Shader,
                    field: "params",
                    reason: format!("'{name}' has {} components, expected 1 to 4", v.len()),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        let mut h = BindingHasher::new(Category::Shader);
        h.text(self.vertex.as_deref().unwrap_or_default())
            .text(self.fragment.as_deref().unwrap_or_default());
        h.finish()
    }

    /// Shaders share by source text and parameters; a shader without any
    /// stage never shares.
    #[must_use]
    pub fn content_key(&self) -> Option<ConfigKey> {
        if self.vertex.is_none() && self.fragment.is_none() {
            return None;
        }
        Some(ConfigKey::Content(format!(
            "vertex={:?};fragment={:?};params={:?}",
            self.vertex, self.fragment, self.params
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_lines_are_joined() {
        let state = ShaderState::from_params(&json!({
            "shaders": [{ "stage": "fragment", "code": ["void main() {", "}"] }],
            "params": { "time": 1.5 }
        }))
        .unwrap();
        assert_eq!(state.fragment.as_deref(), Some("void main() {}"));
        assert_eq!(state.params.get("time"), Some(&ShaderParam::Scalar(1.5)));
    }

    #[test]
    fn stage_is_mandatory() {
        let err = ShaderState::from_params(&json!({ "shaders": [{ "code": "x" }] })).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "stage", .. }));
    }
}
