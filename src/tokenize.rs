//! Tokenization of a node's lines under one theme.
//!
//! The shared grammar engine holds one active theme at a time, so callers
//! must hold the engine lock for the whole call. Lines are inherently
//! sequential within a theme (the rule stack carries over), but themes are
//! independent of each other.

use std::collections::BTreeMap;

use crate::engine::{GrammarEngine, GrammarId, RuleStack};
use crate::error::VermiglioResult;
use crate::themes::ConditionalTheme;
use crate::themes::raw::{RawRuleSettings, RawThemeRule, load_color_theme};
use crate::transformers::Line;

/// A token with its raw TextMate scope path. Used for attribution, not
/// styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullToken {
    pub start: usize,
    pub end: usize,
    pub scopes: Vec<String>,
}

/// A token with packed 32-bit style metadata (see [`crate::metadata`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryToken {
    pub start: usize,
    pub end: usize,
    pub metadata: u32,
}

/// Both encodings of one line's tokens
#[derive(Debug, Clone, PartialEq)]
pub struct LineTokens {
    pub binary: Vec<BinaryToken>,
    pub full: Vec<FullToken>,
}

/// Result of tokenizing one node under one theme
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizationResult {
    /// The theme's color table. Index 0 is reserved; metadata color indices
    /// are 1-based into this table.
    pub color_map: Vec<String>,
    /// Raw editor color settings of the theme
    pub settings: BTreeMap<String, String>,
    /// `None` when no grammar matched the language; the caller renders the
    /// lines as plain escaped text.
    pub lines: Option<Vec<LineTokens>>,
}

/// Converts the packed `(start, metadata)` pair array of `tokenize_line2`
/// into explicit spans
pub(crate) fn binary_tokens_from_packed(data: &[u32], line_len: usize) -> Vec<BinaryToken> {
    let mut tokens = Vec::with_capacity(data.len() / 2);
    for (i, pair) in data.chunks_exact(2).enumerate() {
        let start = pair[0] as usize;
        let metadata = pair[1];
        let end = match data.get(i * 2 + 2) {
            Some(&next_start) => next_start as usize,
            None => line_len,
        };
        if end > start {
            tokens.push(BinaryToken {
                start,
                end,
                metadata,
            });
        }
    }
    tokens
}

/// Builds the synthetic default rule from the theme's editor colors.
/// It is prepended so it always wins as the base style.
fn default_rule(settings: &BTreeMap<String, String>) -> RawThemeRule {
    let foreground = settings
        .get("editor.foreground")
        .or_else(|| settings.get("foreground"))
        .cloned();
    let background = settings
        .get("editor.background")
        .or_else(|| settings.get("background"))
        .cloned();
    RawThemeRule {
        name: Some("vermiglio-default".to_string()),
        scope: None,
        settings: RawRuleSettings {
            foreground,
            background,
            font_style: None,
        },
    }
}

/// Tokenizes every line under `theme`, producing both the binary and the
/// scope-path encoding. When `grammar` is `None` the result still carries a
/// valid color map and settings but no lines.
pub fn tokenize_with_theme(
    lines: &[Line],
    theme: &ConditionalTheme,
    grammar: Option<GrammarId>,
    engine: &mut dyn GrammarEngine,
) -> VermiglioResult<TokenizationResult> {
    let loaded = load_color_theme(&theme.path)?;
    let settings = loaded.result_colors;

    let mut rules = Vec::with_capacity(loaded.result_rules.len() + 1);
    rules.push(default_rule(&settings));
    rules.extend(loaded.result_rules);
    engine.set_theme(&rules);
    let color_map = engine.color_map();

    let Some(grammar) = grammar else {
        return Ok(TokenizationResult {
            color_map,
            settings,
            lines: None,
        });
    };

    let mut result_lines = Vec::with_capacity(lines.len());
    let mut stack: Option<Box<dyn RuleStack>> = None;
    for line in lines {
        let full = engine.tokenize_line(grammar, &line.text, stack.as_deref())?;
        let packed = engine.tokenize_line2(grammar, &line.text, stack.as_deref())?;
        result_lines.push(LineTokens {
            binary: binary_tokens_from_packed(&packed.data, line.text.len()),
            full: full.tokens,
        });
        stack = Some(packed.stack);
    }

    Ok(TokenizationResult {
        color_map,
        settings,
        lines: Some(result_lines),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockEngine, fixture_theme, transformed_lines};

    #[test]
    fn unpacks_pair_arrays() {
        let data = [0u32, 11, 5, 22, 6, 33];
        let tokens = binary_tokens_from_packed(&data, 10);
        assert_eq!(
            tokens,
            vec![
                BinaryToken {
                    start: 0,
                    end: 5,
                    metadata: 11
                },
                BinaryToken {
                    start: 5,
                    end: 6,
                    metadata: 22
                },
                BinaryToken {
                    start: 6,
                    end: 10,
                    metadata: 33
                },
            ]
        );
    }

    #[test]
    fn tokenizes_lines_under_a_theme() {
        let mut engine = MockEngine::new().with_grammar("source.js");
        let grammar = engine.load_grammar("source.js", 1);
        let lines = transformed_lines("const x = 3;");
        let theme = fixture_theme("Default Dark+", "src/fixtures/themes/dark_plus.json");

        let result = tokenize_with_theme(&lines, &theme, grammar, &mut engine).unwrap();
        assert_eq!(
            result.settings.get("editor.background").map(|s| s.as_str()),
            Some("#1E1E1E")
        );
        assert!(result.color_map.len() > 1);

        let line_tokens = &result.lines.as_ref().unwrap()[0];
        assert!(!line_tokens.binary.is_empty());
        assert_eq!(line_tokens.binary.len(), line_tokens.full.len());
        // Binary tokens tile the line
        assert_eq!(line_tokens.binary[0].start, 0);
        assert_eq!(line_tokens.binary.last().unwrap().end, "const x = 3;".len());
    }

    #[test]
    fn missing_grammar_still_yields_colors() {
        let mut engine = MockEngine::new();
        let lines = transformed_lines("anything");
        let theme = fixture_theme("Default Dark+", "src/fixtures/themes/dark_plus.json");

        let result = tokenize_with_theme(&lines, &theme, None, &mut engine).unwrap();
        assert!(result.lines.is_none());
        assert!(!result.color_map.is_empty());
        assert!(!result.settings.is_empty());
    }
}
