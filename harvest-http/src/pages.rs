//! Server-rendered HTML pages.

use rust_embed::Embed;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template {name} is not valid UTF-8")]
    Encoding { name: String },
    #[error("template error: {0}")]
    Tera(#[from] tera::Error),
}

/// Every page template, compiled once at startup.
pub struct Pages {
    tera: Tera,
}

impl Pages {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        // Base layout first so child templates can extend it.
        let mut names: Vec<String> = EmbeddedTemplates::iter().map(|n| n.into_owned()).collect();
        names.sort_by_key(|n| n.as_str() != "base.html");
        for name in names {
            if let Some(file) = EmbeddedTemplates::get(&name) {
                let body = std::str::from_utf8(&file.data)
                    .map_err(|_| RenderError::Encoding { name: name.clone() })?;
                tera.add_raw_template(&name, body)?;
            }
        }
        Ok(Self { tera })
    }

    /// Render `template` with a single collection bound to `key`.
    pub fn list<T: Serialize>(&self, template: &str, key: &str, rows: &T) -> Result<String, RenderError> {
        let mut ctx = Context::new();
        ctx.insert(key, rows);
        Ok(self.tera.render(template, &ctx)?)
    }

    pub fn page(&self, template: &str) -> Result<String, RenderError> {
        Ok(self.tera.render(template, &Context::new())?)
    }

    /// The error page never fails; a broken template degrades to plain text.
    pub fn error(&self, status: u16, message: &str) -> String {
        let mut ctx = Context::new();
        ctx.insert("status", &status);
        ctx.insert("error", message);
        self.tera
            .render("error.html", &ctx)
            .unwrap_or_else(|_| format!("Error {status}: {message}"))
    }
}
