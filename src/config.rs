use std::path::Path;

use serde::Deserialize;

use crate::diagnostics::CompileError;

/// Code generator settings, usually read from `charon.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenConfig {
    /// First address handed out by the static data segment. Address 0 stays
    /// reserved as the null placeholder.
    pub data_base: u32,
    pub data_align: u32,
    pub allocator_class: String,
    pub allocator_method: String,
    pub static_label_prefix: String,
    pub receiver_name: String,
    pub size_method: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            data_base: 1024,
            data_align: 4,
            allocator_class: "Object".to_string(),
            allocator_method: "allocate".to_string(),
            static_label_prefix: "$static".to_string(),
            receiver_name: "_self_".to_string(),
            size_method: "_size_".to_string(),
        }
    }
}

impl CodegenConfig {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, CompileError> {
        let config: CodegenConfig = toml::from_str(text)
            .map_err(|e| CompileError::config(format!("failed to parse config: {e}"), path.to_path_buf()))?;
        config.validate(path)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CompileError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CompileError::config(format!("failed to read config: {e}"), path.to_path_buf()))?;
        Self::from_toml_str(&text, path)
    }

    fn validate(&self, path: &Path) -> Result<(), CompileError> {
        if self.data_base == 0 {
            return Err(CompileError::config(
                "'data_base' must be nonzero; address 0 is the null placeholder",
                path.to_path_buf(),
            ));
        }
        if !self.data_align.is_power_of_two() {
            return Err(CompileError::config(
                format!("'data_align' must be a power of two, got {}", self.data_align),
                path.to_path_buf(),
            ));
        }
        let names = [
            ("allocator_class", &self.allocator_class),
            ("allocator_method", &self.allocator_method),
            ("static_label_prefix", &self.static_label_prefix),
            ("receiver_name", &self.receiver_name),
            ("size_method", &self.size_method),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(CompileError::config(format!("'{key}' must not be empty"), path.to_path_buf()));
            }
        }
        Ok(())
    }
}
