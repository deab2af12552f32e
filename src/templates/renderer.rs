//! MiniJinja-backed renderer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};

use super::TemplateRenderError;

/// Whitespace and undefined-variable behaviour of the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderingOptions {
    /// Remove the first newline after a block tag.
    pub trim_blocks: bool,
    /// Strip whitespace before a block tag on the same line.
    pub lstrip_blocks: bool,
    pub keep_trailing_newline: bool,
    /// Fail on undefined variables instead of rendering them empty.
    pub strict_undefined: bool,
}

impl RenderingOptions {
    /// Applies per-endpoint overrides. Unknown option names are rejected.
    pub fn with_overrides(
        &self,
        overrides: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, TemplateRenderError> {
        if overrides.is_empty() {
            return Ok(*self);
        }
        let mut combined = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => return Err(TemplateRenderError::Options(e.to_string())),
        };
        combined.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        serde_json::from_value(serde_json::Value::Object(combined))
            .map_err(|e| TemplateRenderError::Options(e.to_string()))
    }
}

/// Renders a named template with a context.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `name` (a path relative to the template root).
    ///
    /// `overrides` are per-call rendering options on top of the renderer's
    /// defaults.
    fn render(
        &self,
        name: &str,
        context: &serde_json::Value,
        overrides: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, TemplateRenderError>;

    /// Drops compiled templates, so the next render reads them from disk.
    fn clear_cache(&self) {}
}

/// Renders templates from a directory with MiniJinja.
pub struct MiniJinjaRenderer {
    root: PathBuf,
    defaults: RenderingOptions,
    cache: bool,
    shared: Mutex<Option<Arc<Environment<'static>>>>,
}

impl std::fmt::Debug for MiniJinjaRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniJinjaRenderer")
            .field("root", &self.root)
            .field("defaults", &self.defaults)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl MiniJinjaRenderer {
    pub fn new(root: impl Into<PathBuf>, defaults: RenderingOptions, cache: bool) -> Self {
        Self {
            root: root.into(),
            defaults,
            cache,
            shared: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn build_environment(&self, options: &RenderingOptions) -> Environment<'static> {
        let mut env = Environment::new();
        // The path loader refuses names that escape the root.
        env.set_loader(minijinja::path_loader(&self.root));
        // Config files are never HTML, whatever their extension.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_trim_blocks(options.trim_blocks);
        env.set_lstrip_blocks(options.lstrip_blocks);
        env.set_keep_trailing_newline(options.keep_trailing_newline);
        if options.strict_undefined {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }
        env
    }

    fn environment(&self, options: &RenderingOptions) -> Arc<Environment<'static>> {
        if !self.cache || *options != self.defaults {
            return Arc::new(self.build_environment(options));
        }
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared
            .get_or_insert_with(|| Arc::new(self.build_environment(options)))
            .clone()
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(
        &self,
        name: &str,
        context: &serde_json::Value,
        overrides: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, TemplateRenderError> {
        let options = self.defaults.with_overrides(overrides)?;
        let env = self.environment(&options);
        let name = name.trim_start_matches('/');
        let render_error = |source| TemplateRenderError::Render {
            name: name.to_string(),
            source,
        };
        let template = env.get_template(name).map_err(render_error)?;
        template.render(context).map_err(render_error)
    }

    fn clear_cache(&self) {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
