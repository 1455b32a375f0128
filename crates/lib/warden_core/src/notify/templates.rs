//! Message templates.
//!
//! A template is a text/HTML pair with `{{Key}}` placeholders. Values
//! substituted into the HTML part are escaped. The set is built once and only
//! read afterwards.

use std::collections::HashMap;

use thiserror::Error;

use crate::error::EngineError;

/// Name of the validation code template.
pub const TOKEN_TEMPLATE: &str = "token";

/// Template data key for the application name.
pub const KEY_APP_NAME: &str = "AppName";

/// Template data key for the validation code.
pub const KEY_TOKEN: &str = "Token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("template '{template}' references unknown key '{key}'")]
    MissingKey { template: String, key: String },

    #[error("template '{0}' has an unclosed placeholder")]
    Unclosed(String),
}

impl From<TemplateError> for EngineError {
    fn from(e: TemplateError) -> Self {
        EngineError::internal(e)
    }
}

/// Output of [`TemplateSet::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone)]
struct Template {
    text: String,
    html: String,
}

/// Named templates, compiled once at startup.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The templates shipped with the crate.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.insert(
            TOKEN_TEMPLATE,
            include_str!("../../templates/token.txt"),
            include_str!("../../templates/token.html"),
        );
        set
    }

    pub fn insert(&mut self, name: &str, text: &str, html: &str) {
        self.templates.insert(
            name.to_string(),
            Template {
                text: text.to_string(),
                html: html.to_string(),
            },
        );
    }

    /// Render both parts of `name` with `data`.
    pub fn render(&self, name: &str, data: &[(&str, &str)]) -> Result<Rendered, TemplateError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        Ok(Rendered {
            text: substitute(name, &template.text, data, false)?,
            html: substitute(name, &template.html, data, true)?,
        })
    }
}

fn substitute(
    name: &str,
    source: &str,
    data: &[(&str, &str)],
    escape: bool,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError::Unclosed(name.to_string()))?;
        let key = after[..end].trim();
        let value = data
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| TemplateError::MissingKey {
                template: name.to_string(),
                key: key.to_string(),
            })?;
        if escape {
            push_escaped(&mut out, value);
        } else {
            out.push_str(value);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
