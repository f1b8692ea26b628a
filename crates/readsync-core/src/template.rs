//! Note templates
//!
//! Templates are plain text with `{{ name }}` placeholders. Rendering is a
//! pure function of the template and a lookup: unknown names become empty
//! strings, and an unterminated `{{` is copied through untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// Built-in header template (one per note)
pub const DEFAULT_HEADER_TEMPLATE: &str = "# {{title}}

- Author: {{author}}
- Source: {{source}}
- URL: {{url}}

## Highlights

{{highlights}}
";

/// Built-in highlight template (one per highlight)
pub const DEFAULT_HIGHLIGHT_TEMPLATE: &str = "- {{text}}{{note_block}}";

/// A template file could not be read
#[derive(Error, Debug)]
#[error("Failed to read template '{path}': {source}")]
pub struct TemplateError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Header and per-highlight templates used to render a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub header: String,
    pub highlight: String,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER_TEMPLATE.to_string(),
            highlight: DEFAULT_HIGHLIGHT_TEMPLATE.to_string(),
        }
    }
}

impl Template {
    pub fn new(header: impl Into<String>, highlight: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            highlight: highlight.into(),
        }
    }

    /// Load templates from disk, using the built-in ones where no path is given
    pub fn load(header: Option<&Path>, highlight: Option<&Path>) -> Result<Self, TemplateError> {
        let defaults = Self::default();
        Ok(Self {
            header: match header {
                Some(path) => read_template(path)?,
                None => defaults.header,
            },
            highlight: match highlight {
                Some(path) => read_template(path)?,
                None => defaults.highlight,
            },
        })
    }
}

fn read_template(path: &Path) -> Result<String, TemplateError> {
    fs::read_to_string(path).map_err(|source| TemplateError {
        path: path.to_path_buf(),
        source,
    })
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Substitute every `{{ name }}` in `template` with `lookup(name)`
pub fn render_template<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    placeholder_pattern()
        .replace_all(template, |caps: &Captures| {
            lookup(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "title" => Some("Dune".to_string()),
            "author" => Some("Frank Herbert".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_substitutes_known_placeholders() {
        let out = render_template("{{title}} by {{ author }}", lookup);
        assert_eq!(out, "Dune by Frank Herbert");
    }

    #[test]
    fn test_unknown_placeholder_is_empty() {
        let out = render_template("[{{missing}}] {{title}}", lookup);
        assert_eq!(out, "[] Dune");
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        let out = render_template("{{title}} {{author", lookup);
        assert_eq!(out, "Dune {{author");
    }

    #[test]
    fn test_substituted_values_are_not_reexpanded() {
        let out = render_template("{{x}}", |_| Some("{{title}}".to_string()));
        assert_eq!(out, "{{title}}");
    }

    #[test]
    fn test_load_defaults_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let header_path = temp_dir.path().join("header.md");
        fs::write(&header_path, "## {{title}}\n{{highlights}}").unwrap();

        let template = Template::load(Some(&header_path), None).unwrap();
        assert_eq!(template.header, "## {{title}}\n{{highlights}}");
        assert_eq!(template.highlight, DEFAULT_HIGHLIGHT_TEMPLATE);

        assert_eq!(Template::load(None, None).unwrap(), Template::default());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Template::load(Some(Path::new("/nonexistent/header.md")), None).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/header.md"));
    }
}
