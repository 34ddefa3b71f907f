//! Theme selection: under which conditions a code node renders with which
//! theme, and how flexible user-facing theme options resolve to a concrete
//! list of conditional themes.

pub mod raw;

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, VermiglioResult};
use crate::options::CodeNodeOptions;
use crate::registry::CodeNodeKind;

/// When a theme applies to a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeCondition {
    /// The theme used when no other condition matches.
    /// Exactly one theme per node carries this condition.
    Default,
    /// Applies when the CSS media query matches
    MatchMedia(String),
    /// Applies underneath the given parent selector
    ParentSelector(String),
}

impl ThemeCondition {
    /// Parses a serialized condition: `default`, `matchMedia(<query>)` or
    /// `parentSelector(<selector>)`. `position` is the byte offset of the
    /// string within its surrounding source, used for error reporting.
    pub fn parse(value: &str, position: usize) -> VermiglioResult<Self> {
        let trimmed = value.trim();
        if trimmed == "default" {
            return Ok(ThemeCondition::Default);
        }
        let err = || Error::InvalidThemeCondition {
            value: value.to_string(),
            position,
        };
        let open = trimmed.find('(').ok_or_else(err)?;
        if !trimmed.ends_with(')') {
            return Err(err());
        }
        let head = &trimmed[..open];
        let inner = trimmed[open + 1..trimmed.len() - 1].trim();
        if inner.is_empty() {
            return Err(err());
        }
        match head {
            "matchMedia" => Ok(ThemeCondition::MatchMedia(inner.to_string())),
            "parentSelector" => Ok(ThemeCondition::ParentSelector(inner.to_string())),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for ThemeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeCondition::Default => write!(f, "default"),
            ThemeCondition::MatchMedia(query) => write!(f, "matchMedia({})", query),
            ThemeCondition::ParentSelector(selector) => {
                write!(f, "parentSelector({})", selector)
            }
        }
    }
}

/// A theme a node may render under, together with the conditions under
/// which it applies
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalTheme {
    pub identifier: String,
    pub path: PathBuf,
    pub conditions: Vec<ThemeCondition>,
}

impl ConditionalTheme {
    /// Adds a condition unless a structurally equal one is already present
    pub fn merge_condition(&mut self, condition: ThemeCondition) {
        if !self.conditions.contains(&condition) {
            self.conditions.push(condition);
        }
    }
}

/// Merges a theme into a list keyed by identifier: appends when the
/// identifier is new, otherwise unions the condition sets.
pub(crate) fn merge_theme(themes: &mut Vec<ConditionalTheme>, theme: ConditionalTheme) {
    match themes
        .iter_mut()
        .find(|t| t.identifier == theme.identifier)
    {
        Some(existing) => {
            for condition in theme.conditions {
                existing.merge_condition(condition);
            }
        }
        None => themes.push(theme),
    }
}

/// A resolved theme request before catalog lookup: an identifier and the
/// conditions it should carry
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeRequest {
    pub identifier: String,
    pub conditions: Vec<ThemeCondition>,
}

/// Context handed to computed theme options
#[derive(Debug, Clone, Copy)]
pub struct CodeNodeContext<'a> {
    pub language: Option<&'a str>,
    pub kind: CodeNodeKind,
    pub options: &'a CodeNodeOptions,
}

pub const DARK_MEDIA_QUERY: &str = "(prefers-color-scheme: dark)";
pub const LIGHT_MEDIA_QUERY: &str = "(prefers-color-scheme: light)";

/// How the caller picks themes: a single identifier, a default with
/// dark/light overrides, or a function of the node being registered.
pub enum ThemeOption {
    Literal(String),
    Conditional {
        default: String,
        dark: Option<String>,
        light: Option<String>,
    },
    Computed(Box<dyn Fn(&CodeNodeContext<'_>) -> ThemeOption + Send + Sync>),
}

impl fmt::Debug for ThemeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeOption::Literal(id) => f.debug_tuple("Literal").field(id).finish(),
            ThemeOption::Conditional {
                default,
                dark,
                light,
            } => f
                .debug_struct("Conditional")
                .field("default", default)
                .field("dark", dark)
                .field("light", light)
                .finish(),
            ThemeOption::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl ThemeOption {
    /// Resolves to theme requests for one node. Requests with the same
    /// identifier are merged, conditions deduplicated.
    pub fn resolve(&self, context: &CodeNodeContext<'_>) -> Vec<ThemeRequest> {
        let mut requests = Vec::new();
        self.resolve_into(context, &mut requests);
        requests
    }

    fn resolve_into(&self, context: &CodeNodeContext<'_>, requests: &mut Vec<ThemeRequest>) {
        match self {
            ThemeOption::Literal(identifier) => {
                push_request(requests, identifier, ThemeCondition::Default);
            }
            ThemeOption::Conditional {
                default,
                dark,
                light,
            } => {
                push_request(requests, default, ThemeCondition::Default);
                if let Some(dark) = dark {
                    push_request(
                        requests,
                        dark,
                        ThemeCondition::MatchMedia(DARK_MEDIA_QUERY.to_string()),
                    );
                }
                if let Some(light) = light {
                    push_request(
                        requests,
                        light,
                        ThemeCondition::MatchMedia(LIGHT_MEDIA_QUERY.to_string()),
                    );
                }
            }
            ThemeOption::Computed(compute) => {
                compute(context).resolve_into(context, requests);
            }
        }
    }
}

fn push_request(requests: &mut Vec<ThemeRequest>, identifier: &str, condition: ThemeCondition) {
    match requests.iter_mut().find(|r| r.identifier == identifier) {
        Some(existing) => {
            if !existing.conditions.contains(&condition) {
                existing.conditions.push(condition);
            }
        }
        None => requests.push(ThemeRequest {
            identifier: identifier.to_string(),
            conditions: vec![condition],
        }),
    }
}
