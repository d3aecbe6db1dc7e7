//! Minimal HTML templates with `{{ name }}` placeholders.
//!
//! Templates are parsed once at start-up. Rendering looks each placeholder up
//! in a [`Context`]; text values are HTML-escaped, markup values are inserted
//! as they are, and unknown names render as nothing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unterminated placeholder in {name} at byte {offset}")]
    Unterminated { name: String, offset: usize },
    #[error("required template {0} is missing")]
    Missing(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| TemplateError::Unterminated {
                name: name.to_string(),
                offset: offset + start,
            })?;
            segments.push(Segment::Placeholder(after[..end].trim().to_string()));
            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, context: &Context) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(key) => match context.values.get(key) {
                    Some(ContextValue::Text(text)) => out.push_str(&escape_html(text)),
                    Some(ContextValue::Markup(markup)) => out.push_str(markup),
                    None => {}
                },
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Text(String),
    Markup(String),
}

/// Values available to a template render.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: HashMap<String, ContextValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values
            .insert(key.into(), ContextValue::Text(value.into()));
        self
    }

    pub fn markup(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values
            .insert(key.into(), ContextValue::Markup(value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }
}

/// All `*.html` templates of one directory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    /// Load every `*.html` file in `dir` and require each of `required` to exist.
    pub fn load(dir: &Path, required: &[&str]) -> Result<Self, TemplateError> {
        let read_err = |path: &Path, source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut templates = HashMap::new();
        for entry in std::fs::read_dir(dir).map_err(|e| read_err(dir, e))? {
            let path = entry.map_err(|e| read_err(dir, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
            let template = Template::parse(name, &source)?;
            tracing::debug!("loaded template {}", name);
            templates.insert(name.to_string(), template);
        }

        let set = Self { templates };
        for name in required {
            if set.get(name).is_none() {
                return Err(TemplateError::Missing(name.to_string()));
            }
        }
        Ok(set)
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
