//! Document templates with `{{var}}` placeholders.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_-]*)\s*\}\}").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("Unknown template: {id}")]
    Unknown { id: String },

    #[error("Missing value for {{{{{var}}}}}")]
    Missing { var: String },
}

pub type Result<T> = std::result::Result<T, TemplateError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub body: String,
}

impl DocumentTemplate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            body: body.into(),
        }
    }

    /// Placeholder names in order of first appearance.
    pub fn variables(&self) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.body) {
            let name = &caps[1];
            if !vars.iter().any(|v| v == name) {
                vars.push(name.to_string());
            }
        }
        vars
    }

    /// Fills every placeholder. Fails on the first one without a value.
    pub fn render(&self, vars: &HashMap<String, String>) -> Result<String> {
        if let Some(missing) = self.variables().into_iter().find(|v| !vars.contains_key(v)) {
            return Err(TemplateError::Missing { var: missing });
        }

        Ok(PLACEHOLDER
            .replace_all(&self.body, |caps: &regex::Captures| {
                vars.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

/// The set of templates available to the CLI and server.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: Vec<DocumentTemplate>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut library = Self::new();
        for template in builtin_templates() {
            library.insert(template);
        }
        library
    }

    /// Adds a template, replacing one with the same id.
    pub fn insert(&mut self, template: DocumentTemplate) {
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    pub fn get(&self, id: &str) -> Option<&DocumentTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn list(&self) -> &[DocumentTemplate] {
        &self.templates
    }

    pub fn variables(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.require(id)?.variables())
    }

    pub fn render(&self, id: &str, vars: &HashMap<String, String>) -> Result<String> {
        self.require(id)?.render(vars)
    }

    fn require(&self, id: &str) -> Result<&DocumentTemplate> {
        self.get(id).ok_or_else(|| TemplateError::Unknown { id: id.to_string() })
    }
}

fn builtin_templates() -> Vec<DocumentTemplate> {
    vec![
        DocumentTemplate::new(
            "readme",
            "README",
            "Project README with install and usage sections",
            "# {{project}}\n\n{{description}}\n\n## Installation\n\n```bash\n{{install}}\n```\n\n## Usage\n\n{{usage}}\n\n## License\n\n{{license}}\n",
        ),
        DocumentTemplate::new(
            "api-docs",
            "API documentation",
            "Reference entry for a single endpoint",
            "# {{endpoint}}\n\n`{{method}} {{path}}`\n\n{{summary}}\n\n## Request\n\n```json\n{{request}}\n```\n\n## Response\n\n```json\n{{response}}\n```\n",
        ),
        DocumentTemplate::new(
            "meeting-notes",
            "Meeting notes",
            "Attendees, agenda, decisions and action items",
            "# {{title}}\n\n**Date:** {{date}}\n**Attendees:** {{attendees}}\n\n## Agenda\n\n{{agenda}}\n\n## Decisions\n\n{{decisions}}\n\n## Action items\n\n{{actions}}\n",
        ),
        DocumentTemplate::new(
            "bug-report",
            "Bug report",
            "Steps to reproduce with expected and actual behaviour",
            "# {{title}}\n\n## Environment\n\n{{environment}}\n\n## Steps to reproduce\n\n{{steps}}\n\n## Expected\n\n{{expected}}\n\n## Actual\n\n{{actual}}\n",
        ),
        DocumentTemplate::new(
            "blog-post",
            "Blog post",
            "Technical article outline",
            "# {{title}}\n\n*{{author}}*\n\n{{intro}}\n\n## {{section}}\n\n{{body}}\n\n## Conclusion\n\n{{conclusion}}\n",
        ),
        DocumentTemplate::new(
            "code-review",
            "Code review",
            "Review summary for a change",
            "# Review: {{change}}\n\n## Summary\n\n{{summary}}\n\n## Strengths\n\n{{strengths}}\n\n## Issues\n\n{{issues}}\n\n## Verdict\n\n{{verdict}}\n",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_builtins_present() {
        let library = TemplateLibrary::builtin();
        let ids: Vec<_> = library.list().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["readme", "api-docs", "meeting-notes", "bug-report", "blog-post", "code-review"]
        );
        for template in library.list() {
            assert!(!template.variables().is_empty(), "{} has no variables", template.id);
        }
    }

    #[test]
    fn test_variables_deduplicated_in_order() {
        let template = DocumentTemplate::new("t", "T", "", "{{b}} {{ a }} {{b}}");
        assert_eq!(template.variables(), vec!["b", "a"]);
    }

    #[test]
    fn test_render() {
        let template = DocumentTemplate::new("t", "T", "", "Hello {{ name }}, {{name}}! {{x-y}}");
        let out = template.render(&vars(&[("name", "Ada"), ("x-y", "ok")])).unwrap();
        assert_eq!(out, "Hello Ada, Ada! ok");
    }

    #[test]
    fn test_render_missing_and_unknown() {
        let library = TemplateLibrary::builtin();
        assert_eq!(
            library.render("nope", &HashMap::new()),
            Err(TemplateError::Unknown { id: "nope".to_string() })
        );

        let err = library.render("readme", &vars(&[("project", "x")])).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Missing {
                var: "description".to_string()
            }
        );
        assert_eq!(err.to_string(), "Missing value for {{description}}");
    }

    #[test]
    fn test_insert_replaces() {
        let mut library = TemplateLibrary::builtin();
        let count = library.list().len();
        library.insert(DocumentTemplate::new("readme", "Mine", "", "{{x}}"));
        assert_eq!(library.list().len(), count);
        assert_eq!(library.variables("readme").unwrap(), vec!["x"]);
    }
}
