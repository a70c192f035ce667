//! Placeholder templates for SEO metadata (`{title} | {site_name}`, `{intro[:155]}`).
//!
//! Resolution is a pure function of the template and a field map. A template either resolves
//! completely or fails with [`PlaceholderError::InvalidSyntax`]; no partial output is produced.

mod html;
mod parser;

pub use html::flatten as flatten_rich_text;
pub use parser::{Segment, SyntaxIssue, Template, Token};

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audit::domain::{ContentUnit, FieldValue};
use crate::config::PlaceholderConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaceholderError {
    #[error("invalid placeholder syntax at offset {offset} ({issue}): '{fragment}'")]
    InvalidSyntax {
        offset: usize,
        fragment: String,
        issue: SyntaxIssue,
    },
}

/// What a field absent from both the unit and the globals resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    #[default]
    Empty,
    /// Keep the token text, e.g. `{subtitle}`, in the output.
    LeaveLiteral,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown missing-field policy '{0}'")]
pub struct UnknownPolicy(pub String);

impl FromStr for MissingFieldPolicy {
    type Err = UnknownPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "literal" | "leave_literal" => Ok(Self::LeaveLiteral),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaceholderResolver {
    policy: MissingFieldPolicy,
    globals: BTreeMap<String, String>,
}

impl PlaceholderResolver {
    pub fn new(policy: MissingFieldPolicy) -> Self {
        Self {
            policy,
            globals: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &PlaceholderConfig) -> Self {
        Self::new(config.missing_policy)
    }

    /// Register a value available to every template (e.g. `site_name`). Unit fields win.
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    pub fn policy(&self) -> MissingFieldPolicy {
        self.policy
    }

    pub fn resolve(
        &self,
        template: &str,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<String, PlaceholderError> {
        let template = Template::parse(template)?;
        Ok(self.render(&template, fields))
    }

    pub fn resolve_unit(
        &self,
        template: &str,
        unit: &ContentUnit,
    ) -> Result<String, PlaceholderError> {
        self.resolve(template, &unit.fields)
    }

    pub fn render(&self, template: &Template, fields: &BTreeMap<String, FieldValue>) -> String {
        let mut output = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Token(token) => match self.lookup(&token.field, fields) {
                    Some(value) => output.extend(truncate(&value, token.limit)),
                    None => {
                        if self.policy == MissingFieldPolicy::LeaveLiteral {
                            output.push_str(&token.raw);
                        }
                    }
                },
            }
        }
        output
    }

    /// Present fields always substitute, even when empty; the policy applies to absent names.
    fn lookup(&self, name: &str, fields: &BTreeMap<String, FieldValue>) -> Option<String> {
        match fields.get(name) {
            Some(value) => Some(field_text(value)),
            None => self.globals.get(name).cloned(),
        }
    }
}

fn field_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) if text.contains('<') => flatten_rich_text(text),
        FieldValue::Text(text) => text.clone(),
        FieldValue::RichText(html) => flatten_rich_text(html),
        FieldValue::Number(number) => number.to_string(),
        FieldValue::Flag(flag) => flag.to_string(),
    }
}

fn truncate(value: &str, limit: Option<usize>) -> impl Iterator<Item = char> + '_ {
    value.chars().take(limit.unwrap_or(usize::MAX))
}

/// Field names referenced by a template.
pub fn extract_placeholders(template: &str) -> Result<BTreeSet<String>, PlaceholderError> {
    Ok(Template::parse(template)?
        .tokens()
        .map(|token| token.field.clone())
        .collect())
}

/// Referenced names missing from `available`, sorted.
pub fn validate_placeholders<'a, I>(
    template: &str,
    available: I,
) -> Result<Vec<String>, PlaceholderError>
where
    I: IntoIterator<Item = &'a str>,
{
    let available: BTreeSet<&str> = available.into_iter().collect();
    Ok(extract_placeholders(template)?
        .into_iter()
        .filter(|name| !available.contains(name.as_str()))
        .collect())
}
