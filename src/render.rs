//! Template rendering
//!
//! Attribute values, script bodies and blueprints all pass through here with
//! the current attribute set as the variable namespace. Undefined references
//! fail instead of rendering as an empty string.

use std::path::Path;

use minijinja::{Environment, UndefinedBehavior};

use crate::attrs::Attributes;
use crate::error::{PurserError, PurserResult};

/// Render `input`, reporting failures against `context`.
pub fn render_str(context: &str, input: &str, attrs: &Attributes) -> PurserResult<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.render_str(input, attrs)
        .map_err(|e| PurserError::Attribute {
            context: context.to_string(),
            message: e.to_string(),
        })
}

/// Render the template file at `path`.
pub fn render_file(path: &Path, attrs: &Attributes) -> PurserResult<String> {
    let input = std::fs::read_to_string(path)?;
    render_str(&path.display().to_string(), &input, attrs)
}
