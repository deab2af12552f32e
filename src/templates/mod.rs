//! Template rendering.
//!
//! Endpoints are Jinja templates under the config directory, rendered with
//! the `template.context` of their environment.

pub mod renderer;

use thiserror::Error;

pub use renderer::{MiniJinjaRenderer, RenderingOptions, TemplateRenderer};

#[derive(Debug, Error)]
pub enum TemplateRenderError {
    #[error("failed to render template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("invalid rendering options: {0}")]
    Options(String),
}
