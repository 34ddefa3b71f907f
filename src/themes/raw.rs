//! Loading of VSCode color theme files.
//!
//! Theme files are JSON with an optional `include` chain (the included file
//! is the base, the including file overrides), a `colors` map of editor
//! colors, and token rules under `tokenColors` (either inline or as a path
//! to another file) or the legacy `settings` key.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VermiglioResult;

/// Scope selector of a token color rule: a single selector string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScopeSelector {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRuleSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(
        default,
        rename = "fontStyle",
        skip_serializing_if = "Option::is_none"
    )]
    pub font_style: Option<String>,
}

/// One token color rule as found in a theme file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawThemeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<RawScopeSelector>,
    #[serde(default)]
    pub settings: RawRuleSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TokenColors {
    Inline(Vec<RawThemeRule>),
    Path(String),
}

#[derive(Debug, Clone, Deserialize)]
struct RawThemeFile {
    #[serde(default)]
    include: Option<String>,
    #[serde(default)]
    colors: BTreeMap<String, String>,
    #[serde(default, rename = "tokenColors")]
    token_colors: Option<TokenColors>,
    // Legacy tmTheme-style key
    #[serde(default)]
    settings: Option<Vec<RawThemeRule>>,
}

/// A fully resolved theme: flattened rule list and editor color settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedTheme {
    pub result_rules: Vec<RawThemeRule>,
    pub result_colors: BTreeMap<String, String>,
}

/// Reads a theme file, recursively resolving its `include` chain.
/// Includes are resolved relative to the including file.
pub fn load_color_theme(path: impl AsRef<Path>) -> VermiglioResult<LoadedTheme> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let file: RawThemeFile = serde_json::from_str(&content)?;

    let mut theme = match &file.include {
        Some(include) => {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            load_color_theme(base.join(include))?
        }
        None => LoadedTheme::default(),
    };

    theme.result_colors.extend(file.colors);

    if let Some(rules) = file.settings {
        theme.result_rules.extend(rules);
    }
    match file.token_colors {
        Some(TokenColors::Inline(rules)) => theme.result_rules.extend(rules),
        Some(TokenColors::Path(rel)) => {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let nested = load_color_theme(base.join(rel))?;
            theme.result_rules.extend(nested.result_rules);
        }
        None => {}
    }

    Ok(theme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_fixture_theme() {
        let theme = load_color_theme("src/fixtures/themes/dark_plus.json").unwrap();
        assert_eq!(
            theme.result_colors.get("editor.foreground").map(|s| s.as_str()),
            Some("#D4D4D4")
        );
        assert!(!theme.result_rules.is_empty());
        let comment = theme
            .result_rules
            .iter()
            .find(|r| matches!(&r.scope, Some(RawScopeSelector::One(s)) if s == "comment"))
            .unwrap();
        assert_eq!(comment.settings.font_style.as_deref(), Some("italic"));
    }

    #[test]
    fn resolves_include_chain() {
        // monokai.json includes monokai_base.json and overrides its background
        let theme = load_color_theme("src/fixtures/themes/monokai.json").unwrap();
        assert_eq!(
            theme.result_colors.get("editor.background").map(|s| s.as_str()),
            Some("#272822")
        );
        // Rule from the base file survives
        assert!(theme.result_rules.iter().any(
            |r| matches!(&r.scope, Some(RawScopeSelector::One(s)) if s == "comment")
        ));
        // Rule from the including file is appended after the base rules
        assert!(theme.result_rules.iter().any(
            |r| matches!(&r.scope, Some(RawScopeSelector::One(s)) if s == "keyword")
        ));
    }
}
