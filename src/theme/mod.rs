//! Theme engine
//!
//! Server-rendered pages use Tera templates embedded in the binary from
//! `templates/`. Features:
//! - Public site and admin console templates
//! - `relative_time` and `badge_class` filters
//! - Standard template variables (site settings, current user, year)
//! - An error page fallback when a template fails to render

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera, Value};

use crate::models::{category_badge_class, GeneralSettings};
use crate::services::format_relative_time;

mod error;

pub use error::ThemeError;

/// Embedded page templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct Templates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Load every embedded template and register the newsroom filters
    pub fn new() -> Result<Self> {
        let mut templates = Vec::new();
        for name in Templates::iter() {
            let Some(file) = Templates::get(&name) else {
                continue;
            };
            let body = String::from_utf8(file.data.into_owned())
                .map_err(|_| ThemeError::TemplateError(format!("{} is not UTF-8", name)))?;
            templates.push((name.to_string(), body));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(describe(&e)))?;
        tera.register_filter("relative_time", relative_time_filter);
        tera.register_filter("badge_class", badge_class_filter);

        tracing::debug!("Loaded {} templates", tera.get_template_names().count());
        Ok(Self { tera })
    }

    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|t| t == template)
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        if !self.has_template(template) {
            return Err(ThemeError::NotFound(template.to_string()).into());
        }
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!("Failed to render '{}': {}", template, describe(&e)))
                .into()
        })
    }

    /// Render a template with standard variables automatically added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> String {
        let mut full_context = context.clone();
        full_context.insert("site", &standard_vars.site);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        if let Some(ref user) = standard_vars.current_user {
            full_context.insert("current_user", user);
        }
        self.render_with_fallback(template, &full_context)
    }

    /// Render a template, falling back to `error.html` and then to a plain
    /// HTML page. Always returns a page.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}", template, e);

                let mut error_context = context.clone();
                error_context.insert("error_message", &e.to_string());
                match self.render("error.html", &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::warn!("Failed to render error template: {}", error_template_err);
                        Self::simple_error_page(template, &e.to_string())
                    }
                }
            }
        }
    }

    /// Last-resort page when neither the template nor `error.html` render
    fn simple_error_page(template: &str, error: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Something went wrong</title>
</head>
<body>
    <h1>Something went wrong</h1>
    <p>Failed to render <code>{}</code>.</p>
    <p>{}</p>
</body>
</html>"#,
            tera::escape_html(template),
            tera::escape_html(error)
        )
    }
}

fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// `{{ article.published_at | relative_time }}`
fn relative_time_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let Some(text) = value.as_str() else {
        return Ok(Value::String(String::new()));
    };
    let at = DateTime::parse_from_rfc3339(text)
        .map_err(|e| tera::Error::msg(format!("relative_time: invalid timestamp '{}': {}", text, e)))?
        .with_timezone(&Utc);
    Ok(Value::String(format_relative_time(at, Utc::now())))
}

/// `{{ article.category | badge_class }}`
fn badge_class_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let category = value.as_str().unwrap_or_default();
    Ok(Value::String(category_badge_class(category).to_string()))
}

/// Variables every page receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site: GeneralSettings,
    pub request_path: String,
    /// Current year (for copyright)
    pub year: i32,
    pub current_user: Option<CurrentUser>,
}

/// Signed-in admin as shown in the console header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub can_publish: bool,
}

impl StandardTemplateVars {
    pub fn new(site: GeneralSettings, request_path: impl Into<String>) -> Self {
        Self {
            site,
            request_path: request_path.into(),
            year: Utc::now().year(),
            current_user: None,
        }
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.current_user = Some(user);
        self
    }
}
