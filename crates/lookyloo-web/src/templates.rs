//! HTML templates, embedded at build time.

use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;

use lookyloo_common::error::ApiError;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("scrape.html", include_str!("../templates/scrape.html")),
    ("tree.html", include_str!("../templates/tree.html")),
    ("error.html", include_str!("../templates/error.html")),
];

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<Html<String>, ApiError> {
        self.env
            .get_template(name)
            .and_then(|t| t.render(ctx))
            .map(Html)
            .map_err(|e| {
                tracing::error!(template = name, error = %e, "template rendering failed");
                ApiError::Internal("template rendering failed".to_string())
            })
    }
}
