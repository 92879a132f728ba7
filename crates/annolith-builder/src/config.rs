//! Builder configuration.
//!
//! The defaults describe a JVM-style host: `java.lang.Object` as the
//! universal root, Groovy's script and object support classes as no-op
//! bases, and the `java.lang.annotation` meta-annotations.

use std::path::Path;

use annolith_types::name_matches_pattern;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration shared by every build in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// The universal root type, never part of a hierarchy
    pub root_type: String,
    /// Base classes skipped while walking superclasses
    pub ignored_base_types: Vec<String>,
    /// Marker interfaces skipped while collecting interfaces
    pub ignored_interfaces: Vec<String>,
    /// Annotation name patterns excluded everywhere except on annotation types
    pub excluded_annotations: Vec<String>,
    /// Meta-annotation declaring the retention policy
    pub retention_annotation: String,
    /// Meta-annotation marking a repeatable annotation type
    pub repeatable_annotation: String,
    /// Meta-annotation marking an annotation as inherited by subclasses
    pub inherited_annotation: String,
    /// Collect meta-annotations of annotation types as stereotypes
    pub stereotypes: bool,
    /// Only inherit type annotations whose type carries the inherited marker
    pub require_inherited_marker: bool,
    /// Maximum nesting depth when converting values
    pub max_value_depth: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            root_type: "java.lang.Object".to_string(),
            ignored_base_types: vec![
                "groovy.lang.Script".to_string(),
                "groovy.lang.GroovyObjectSupport".to_string(),
            ],
            ignored_interfaces: vec!["groovy.lang.GroovyObject".to_string()],
            excluded_annotations: vec!["java.lang.annotation.*".to_string()],
            retention_annotation: "java.lang.annotation.Retention".to_string(),
            repeatable_annotation: "java.lang.annotation.Repeatable".to_string(),
            inherited_annotation: "java.lang.annotation.Inherited".to_string(),
            stereotypes: true,
            require_inherited_marker: false,
            max_value_depth: 32,
        }
    }
}

impl BuilderConfig {
    /// Parse and validate a JSON config. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: BuilderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_value_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_value_depth must be at least 1".to_string(),
            ));
        }

        let required = [
            ("root_type", &self.root_type),
            ("retention_annotation", &self.retention_annotation),
            ("repeatable_annotation", &self.repeatable_annotation),
            ("inherited_annotation", &self.inherited_annotation),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
            }
        }

        if let Some(pattern) = self
            .excluded_annotations
            .iter()
            .find(|p| p.matches('*').count() > 2 || p.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "unsupported annotation pattern '{}'",
                pattern
            )));
        }

        Ok(())
    }

    /// Whether the annotation is excluded from non-annotation declarations.
    pub fn is_excluded_annotation(&self, annotation_type: &str) -> bool {
        self.excluded_annotations
            .iter()
            .any(|pattern| name_matches_pattern(annotation_type, pattern))
    }

    /// Whether a superclass is skipped while walking the hierarchy.
    pub fn is_ignored_base(&self, type_name: &str) -> bool {
        type_name == self.root_type || self.ignored_base_types.iter().any(|t| t == type_name)
    }

    pub fn is_ignored_interface(&self, type_name: &str) -> bool {
        self.ignored_interfaces.iter().any(|t| t == type_name)
    }
}
