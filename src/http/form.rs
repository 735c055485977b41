//! Submission form served on `GET /sign`

use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{ConfigError, Result};

/// File name of the form template, both built in and in custom directories
pub const FORM_TEMPLATE_FILE: &str = "form.html";

const FORM_TEMPLATE: &str = "form";
const BUILTIN_FORM: &str = include_str!("../../templates/form.html");

#[derive(Debug, Serialize)]
struct FormContext<'a> {
    action: &'a str,
    max_content_size: usize,
}

/// Renders the HTML form, from a custom template directory when configured
pub struct FormRenderer {
    registry: Handlebars<'static>,
}

impl FormRenderer {
    pub fn new(templates_dir: Option<&Path>) -> Result<Self> {
        let template = match templates_dir {
            Some(dir) => {
                let path = dir.join(FORM_TEMPLATE_FILE);
                info!(path = %path.display(), "Loading custom form template");
                std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })?
            }
            None => BUILTIN_FORM.to_string(),
        };

        let mut registry = Handlebars::new();
        registry.set_strict_mode(true); // Fail on undefined variables
        registry
            .register_template_string(FORM_TEMPLATE, template)
            .map_err(|e| ConfigError::Invalid {
                message: format!("Invalid form template: {}", e),
            })?;

        Ok(Self { registry })
    }

    /// Render the form posting to `action`
    pub fn render(
        &self,
        action: &str,
        max_content_size: usize,
    ) -> std::result::Result<String, handlebars::RenderError> {
        let html = self.registry.render(
            FORM_TEMPLATE,
            &FormContext {
                action,
                max_content_size,
            },
        )?;
        debug!(bytes = html.len(), "Rendered submission form");
        Ok(html)
    }
}
