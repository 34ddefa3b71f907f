//! Shared test helpers: a deterministic in-memory grammar engine and the
//! fixture catalog backing the theme files under `src/fixtures/themes`.

use std::any::Any;
use std::path::PathBuf;

use crate::catalog::{Catalog, GrammarManifestEntry, Manifest, ThemeManifestEntry};
use crate::engine::{GrammarEngine, GrammarId, RuleStack, TokenizedLine, TokenizedLine2};
use crate::error::VermiglioResult;
use crate::metadata::{FontStyle, pack_metadata};
use crate::options::CodeNodeOptions;
use crate::themes::raw::RawThemeRule;
use crate::themes::{ConditionalTheme, ThemeCondition};
use crate::tokenize::FullToken;
use crate::transformers::{Line, run_pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Word,
    Space,
    Punct,
}

impl SegmentKind {
    fn of(c: char) -> Self {
        if c.is_alphanumeric() || c == '_' {
            SegmentKind::Word
        } else if c.is_whitespace() {
            SegmentKind::Space
        } else {
            SegmentKind::Punct
        }
    }

    fn scope_segment(self) -> &'static str {
        match self {
            SegmentKind::Word => "word",
            SegmentKind::Space => "space",
            SegmentKind::Punct => "punct",
        }
    }

    // 1-based color table index; whitespace inherits (0)
    fn foreground(self) -> u32 {
        match self {
            SegmentKind::Word => 1,
            SegmentKind::Space => 0,
            SegmentKind::Punct => 2,
        }
    }
}

fn segments(line: &str) -> Vec<(usize, usize, SegmentKind)> {
    let mut runs = Vec::new();
    for (offset, c) in line.char_indices() {
        let kind = SegmentKind::of(c);
        match runs.last_mut() {
            Some((_, end, last)) if *last == kind => *end = offset + c.len_utf8(),
            _ => runs.push((offset, offset + c.len_utf8(), kind)),
        }
    }
    runs
}

/// The opaque state the mock threads between lines: how many lines were
/// tokenized before this one.
#[derive(Debug)]
pub(crate) struct MockStack {
    pub(crate) lines_seen: usize,
}

impl RuleStack for MockStack {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn lines_seen(prior: Option<&dyn RuleStack>) -> usize {
    prior
        .and_then(|stack| stack.as_any().downcast_ref::<MockStack>())
        .map(|stack| stack.lines_seen)
        .unwrap_or(0)
}

/// An engine that splits lines into word/whitespace/punctuation runs and
/// colors each kind with a fixed 1-based color index
#[derive(Debug, Default)]
pub(crate) struct MockEngine {
    grammars: Vec<(String, u32)>,
    rules: Vec<RawThemeRule>,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_grammar(mut self, scope_name: &str) -> Self {
        self.grammars.push((scope_name.to_string(), 0));
        self
    }
}

impl GrammarEngine for MockEngine {
    fn set_theme(&mut self, rules: &[RawThemeRule]) {
        self.rules = rules.to_vec();
    }

    fn color_map(&self) -> Vec<String> {
        let mut map = vec!["#000000".to_string()];
        for rule in &self.rules {
            if let Some(fg) = &rule.settings.foreground
                && !map.contains(fg)
            {
                map.push(fg.clone());
            }
        }
        map
    }

    fn load_grammar(&mut self, scope_name: &str, language_id: u32) -> Option<GrammarId> {
        let idx = self.grammars.iter().position(|(s, _)| s == scope_name)?;
        self.grammars[idx].1 = language_id;
        Some(GrammarId(idx as u16))
    }

    fn tokenize_line(
        &mut self,
        grammar: GrammarId,
        line: &str,
        prior: Option<&dyn RuleStack>,
    ) -> VermiglioResult<TokenizedLine> {
        let (scope_name, _) = &self.grammars[grammar.0 as usize];
        let tokens = segments(line)
            .into_iter()
            .map(|(start, end, kind)| FullToken {
                start,
                end,
                scopes: vec![
                    scope_name.clone(),
                    format!("segment.{}", kind.scope_segment()),
                ],
            })
            .collect();
        Ok(TokenizedLine {
            tokens,
            stack: Box::new(MockStack {
                lines_seen: lines_seen(prior) + 1,
            }),
        })
    }

    fn tokenize_line2(
        &mut self,
        grammar: GrammarId,
        line: &str,
        prior: Option<&dyn RuleStack>,
    ) -> VermiglioResult<TokenizedLine2> {
        let (_, language_id) = self.grammars[grammar.0 as usize];
        let mut data = Vec::new();
        for (start, _, kind) in segments(line) {
            data.push(start as u32);
            data.push(pack_metadata(
                language_id,
                0,
                FontStyle::empty(),
                kind.foreground(),
                0,
            ));
        }
        Ok(TokenizedLine2 {
            data,
            stack: Box::new(MockStack {
                lines_seen: lines_seen(prior) + 1,
            }),
        })
    }
}

pub(crate) fn fixture_manifest() -> Manifest {
    Manifest {
        grammars: vec![GrammarManifestEntry {
            scope_name: "source.js".to_string(),
            language: "javascript".to_string(),
            language_id: 1,
            aliases: vec!["js".to_string()],
        }],
        themes: vec![
            ThemeManifestEntry {
                id: "Default Dark+".to_string(),
                label: Some("Dark+ (default dark)".to_string()),
                path: PathBuf::from("src/fixtures/themes/dark_plus.json"),
            },
            ThemeManifestEntry {
                id: "Monokai".to_string(),
                label: None,
                path: PathBuf::from("src/fixtures/themes/monokai.json"),
            },
        ],
    }
}

pub(crate) fn fixture_catalog() -> Catalog {
    Catalog::from_manifest(fixture_manifest())
}

pub(crate) fn fixture_theme(identifier: &str, path: &str) -> ConditionalTheme {
    ConditionalTheme {
        identifier: identifier.to_string(),
        path: PathBuf::from(path),
        conditions: vec![ThemeCondition::Default],
    }
}

/// Raw line split without any transformers, as `run_pipeline` would see it
pub(crate) fn transformed_lines(text: &str) -> Vec<Line> {
    run_pipeline(text, None, &CodeNodeOptions::default(), &[])
        .expect("empty pipeline cannot fail")
        .lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_tile_the_line() {
        let runs = segments("const x = 3;");
        assert_eq!(runs.first().unwrap().0, 0);
        assert_eq!(runs.last().unwrap().1, 12);
        for pair in runs.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn mock_stack_counts_lines() {
        let mut engine = MockEngine::new().with_grammar("source.js");
        let grammar = engine.load_grammar("source.js", 1).unwrap();
        let first = engine.tokenize_line2(grammar, "a", None).unwrap();
        let second = engine
            .tokenize_line2(grammar, "b", Some(first.stack.as_ref()))
            .unwrap();
        let stack = second
            .stack
            .as_any()
            .downcast_ref::<MockStack>()
            .unwrap();
        assert_eq!(stack.lines_seen, 2);
    }
}
