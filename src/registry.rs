//! The code node registry: the central aggregator one document-processing
//! pass registers its code blocks and spans into, and the sole read API
//! renderers consume.
//!
//! Class names are generated lazily on the first token or style query, once
//! for the registry's lifetime. Callers must register every node before the
//! first query; later registrations are not reflected in generated names.

use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::error::{Error, VermiglioResult};
use crate::metadata::{self, CanonicalSuffix, FontStyle};
use crate::options::CodeNodeOptions;
use crate::themes::{ConditionalTheme, ThemeCondition, merge_theme};
use crate::tokenize::{BinaryToken, FullToken, TokenizationResult};
use crate::transformers::Line;
use crate::zip::{ZippedToken, zip_line_tokens};

/// Prefix of theme-scoped class names and of all container/gutter classes
pub const CLASS_NAME_PREFIX: &str = "vml-";

/// Discriminates fenced code blocks from inline code spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeNodeKind {
    Block,
    Span,
}

/// Everything recorded for one registered code node
#[derive(Debug)]
pub struct RegisteredCodeNodeData {
    pub kind: CodeNodeKind,
    /// Normalized output of the transformer pipeline
    pub lines: Vec<Line>,
    /// Raw source text of the node
    pub text: String,
    pub options: CodeNodeOptions,
    pub language_name: Option<String>,
    /// Themes this node may render under. Index-aligned with
    /// `tokenization_results`.
    pub possible_themes: Vec<ConditionalTheme>,
    /// `false` when no grammar matched; lines are then emitted verbatim
    pub is_tokenized: bool,
    pub tokenization_results: Vec<TokenizationResult>,
    /// Container classes contributed by transformers
    pub container_class_names: Vec<String>,
}

/// Style data of one zipped token under one theme
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeTokenData {
    pub theme_identifier: String,
    /// Rendered (possibly theme-prefixed) class names, space separated
    pub class_name: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Resolved foreground color, `None` when the token inherits
    pub color: Option<String>,
    /// The raw packed metadata
    pub metadata: u32,
}

/// One zipped token group handed to `for_each_token` callbacks
#[derive(Debug)]
pub struct TokenGroup<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    /// Raw scope path, taken from the first theme, for attribution
    pub scopes: &'a [String],
    pub default_theme: ThemeTokenData,
    pub additional_themes: Vec<ThemeTokenData>,
}

/// A `(class name, css declarations)` pair for stylesheet generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStyle {
    pub class_name: String,
    pub css: String,
}

/// A registered theme together with its recorded editor settings
#[derive(Debug, Clone, Copy)]
pub struct PossibleTheme<'a> {
    pub theme: &'a ConditionalTheme,
    pub settings: Option<&'a BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
struct ThemeColorRecord {
    color_map: Vec<String>,
    settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ModifierUsage {
    bold: bool,
    italic: bool,
    underline: bool,
}

#[derive(Debug, Default)]
struct ClassNameMaps {
    // theme identifier -> canonical class -> rendered class
    rendered: HashMap<String, HashMap<String, String>>,
    // theme identifier -> canonical color classes in first-seen order
    color_order: HashMap<String, Vec<String>>,
    modifiers: HashMap<String, ModifierUsage>,
}

/// Derives the fixed-length theme token used in prefixed class names
fn theme_hash(identifier: &str) -> String {
    let mut hasher = DefaultHasher::new();
    identifier.hash(&mut hasher);
    format!("{:06x}", (hasher.finish() & 0xff_ffff) as u32)
}

/// Registry of all code nodes of one document-processing pass, keyed by an
/// opaque caller-owned identity
#[derive(Debug)]
pub struct CodeNodeRegistry<K> {
    nodes: Vec<(K, RegisteredCodeNodeData)>,
    index_by_key: HashMap<K, usize>,
    themes: Vec<ConditionalTheme>,
    theme_colors: HashMap<String, ThemeColorRecord>,
    // Zipped token groups per node, index-aligned with `nodes`, memoized
    zipped: Vec<Option<Vec<Vec<ZippedToken>>>>,
    class_names: Option<ClassNameMaps>,
    prefix_all: bool,
}

impl<K> Default for CodeNodeRegistry<K> {
    fn default() -> Self {
        CodeNodeRegistry {
            nodes: Vec::new(),
            index_by_key: HashMap::new(),
            themes: Vec::new(),
            theme_colors: HashMap::new(),
            zipped: Vec::new(),
            class_names: None,
            prefix_all: false,
        }
    }
}

impl<K: Eq + Hash + Clone> CodeNodeRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces theme-scoped class names even when only one theme is active
    pub fn with_prefixed_class_names(mut self) -> Self {
        self.prefix_all = true;
        self
    }

    /// Stores a node. Its possible themes are merged into the running
    /// global theme set by identifier, condition sets unioned without
    /// structural duplicates; theme color tables are recorded
    /// last-write-wins.
    pub fn register(&mut self, key: K, data: RegisteredCodeNodeData) {
        debug_assert_eq!(data.tokenization_results.len(), data.possible_themes.len());
        for (theme, result) in data.possible_themes.iter().zip(&data.tokenization_results) {
            merge_theme(&mut self.themes, theme.clone());
            self.theme_colors.insert(
                theme.identifier.clone(),
                ThemeColorRecord {
                    color_map: result.color_map.clone(),
                    settings: result.settings.clone(),
                },
            );
        }
        self.index_by_key.insert(key.clone(), self.nodes.len());
        self.nodes.push((key, data));
        self.zipped.push(None);
    }

    pub fn node(&self, key: &K) -> Option<&RegisteredCodeNodeData> {
        self.index_by_key.get(key).map(|&idx| &self.nodes[idx].1)
    }

    /// Iterates a node's lines in order, with their index
    pub fn for_each_line(&self, key: &K, mut action: impl FnMut(usize, &Line)) {
        if let Some(&idx) = self.index_by_key.get(key) {
            for (i, line) in self.nodes[idx].1.lines.iter().enumerate() {
                action(i, line);
            }
        }
    }

    /// Iterates registered code blocks in registration order
    pub fn for_each_code_block(&self, mut action: impl FnMut(&K, &RegisteredCodeNodeData)) {
        for (key, data) in &self.nodes {
            if data.kind == CodeNodeKind::Block {
                action(key, data);
            }
        }
    }

    /// Iterates registered code spans in registration order
    pub fn for_each_code_span(&self, mut action: impl FnMut(&K, &RegisteredCodeNodeData)) {
        for (key, data) in &self.nodes {
            if data.kind == CodeNodeKind::Span {
                action(key, data);
            }
        }
    }

    /// Every distinct theme ever registered, with its settings, for global
    /// stylesheet generation
    pub fn all_possible_themes(&self) -> Vec<PossibleTheme<'_>> {
        self.themes
            .iter()
            .map(|theme| PossibleTheme {
                theme,
                settings: self
                    .theme_colors
                    .get(&theme.identifier)
                    .map(|record| &record.settings),
            })
            .collect()
    }

    fn ensure_zipped(&mut self, idx: usize) {
        if self.zipped[idx].is_some() {
            return;
        }
        let node = &self.nodes[idx].1;
        if !node.is_tokenized {
            self.zipped[idx] = Some(Vec::new());
            return;
        }
        let mut lines = Vec::with_capacity(node.lines.len());
        for line_idx in 0..node.lines.len() {
            let streams: Vec<Vec<BinaryToken>> = node
                .tokenization_results
                .iter()
                .map(|result| {
                    result
                        .lines
                        .as_ref()
                        .and_then(|lines| lines.get(line_idx))
                        .map(|tokens| tokens.binary.clone())
                        .unwrap_or_default()
                })
                .collect();
            lines.push(zip_line_tokens(&streams));
        }
        self.zipped[idx] = Some(lines);
    }

    /// Runs the deterministic class-name generation exactly once.
    ///
    /// For every `(theme, canonical class)` pair encountered across all
    /// tokenized nodes the rendered name is the canonical name itself when
    /// only one theme is in play, or a theme-scoped
    /// `vml-<hash>-<suffix>` name when a token group spans multiple themes
    /// (or prefixing is forced), so that two themes assigning different
    /// colors to the same canonical slot cannot collide.
    fn generate_class_names(&mut self) -> VermiglioResult<()> {
        if self.class_names.is_some() {
            return Ok(());
        }
        for idx in 0..self.nodes.len() {
            self.ensure_zipped(idx);
        }

        let mut maps = ClassNameMaps::default();
        for (idx, (_, node)) in self.nodes.iter().enumerate() {
            if !node.is_tokenized {
                continue;
            }
            let Some(zipped) = &self.zipped[idx] else {
                continue;
            };
            let multi_theme = node.possible_themes.len() > 1 || self.prefix_all;
            for line in zipped {
                for group in line {
                    for (theme_idx, &word) in group.metadata.iter().enumerate() {
                        let theme_id = &node.possible_themes[theme_idx].identifier;
                        let style = metadata::font_style(word);
                        let usage = maps.modifiers.entry(theme_id.clone()).or_default();
                        usage.bold |= style.contains(FontStyle::BOLD);
                        usage.italic |= style.contains(FontStyle::ITALIC);
                        usage.underline |= style.contains(FontStyle::UNDERLINE);

                        for canonical in metadata::canonical_class_names(word) {
                            let by_canonical =
                                maps.rendered.entry(theme_id.clone()).or_default();
                            if by_canonical.contains_key(&canonical) {
                                continue;
                            }
                            let suffix = CanonicalSuffix::parse(&canonical)?;
                            if matches!(suffix, CanonicalSuffix::Color(_)) {
                                maps.color_order
                                    .entry(theme_id.clone())
                                    .or_default()
                                    .push(canonical.clone());
                            }
                            let rendered = if multi_theme {
                                format!(
                                    "{}{}-{}",
                                    CLASS_NAME_PREFIX,
                                    theme_hash(theme_id),
                                    suffix.as_suffix_string()
                                )
                            } else {
                                canonical.clone()
                            };
                            by_canonical.insert(canonical, rendered);
                        }
                    }
                }
            }
        }
        self.class_names = Some(maps);
        Ok(())
    }

    fn theme_token_data(
        &self,
        theme: &ConditionalTheme,
        result: &TokenizationResult,
        word: u32,
        maps: &ClassNameMaps,
    ) -> VermiglioResult<ThemeTokenData> {
        let style = metadata::font_style(word);
        let canonicals = metadata::canonical_class_names(word);
        let mut rendered = Vec::with_capacity(canonicals.len());
        let mut color = None;
        for canonical in &canonicals {
            if let Some(name) = maps
                .rendered
                .get(&theme.identifier)
                .and_then(|m| m.get(canonical))
            {
                rendered.push(name.clone());
            }
            if matches!(CanonicalSuffix::parse(canonical)?, CanonicalSuffix::Color(_)) {
                color =
                    Some(metadata::color_from_color_map(&result.color_map, canonical)?.to_string());
            }
        }
        Ok(ThemeTokenData {
            theme_identifier: theme.identifier.clone(),
            class_name: rendered.join(" "),
            bold: style.contains(FontStyle::BOLD),
            italic: style.contains(FontStyle::ITALIC),
            underline: style.contains(FontStyle::UNDERLINE),
            color,
            metadata: word,
        })
    }

    /// Invokes `action` once per zipped token group of the given line.
    ///
    /// Triggers class-name generation on first call, and zips all lines of
    /// the node the first time any of its lines is requested. Untokenized
    /// nodes never invoke the action; callers detect `is_tokenized ==
    /// false` separately and render plain text.
    pub fn for_each_token(
        &mut self,
        key: &K,
        line_index: usize,
        mut action: impl FnMut(TokenGroup<'_>),
    ) -> VermiglioResult<()> {
        self.generate_class_names()?;
        let Some(&idx) = self.index_by_key.get(key) else {
            return Ok(());
        };
        self.ensure_zipped(idx);

        let node = &self.nodes[idx].1;
        if !node.is_tokenized {
            return Ok(());
        }
        let Some(zipped) = &self.zipped[idx] else {
            return Ok(());
        };
        let (Some(groups), Some(line)) = (zipped.get(line_index), node.lines.get(line_index))
        else {
            return Ok(());
        };
        let Some(maps) = &self.class_names else {
            return Ok(());
        };

        let default_idx = node
            .possible_themes
            .iter()
            .position(|t| t.conditions.contains(&ThemeCondition::Default))
            .unwrap_or(0);
        let full_tokens: &[FullToken] = node
            .tokenization_results
            .first()
            .and_then(|r| r.lines.as_ref())
            .and_then(|lines| lines.get(line_index))
            .map(|tokens| tokens.full.as_slice())
            .unwrap_or(&[]);

        for group in groups {
            let scopes = full_tokens
                .iter()
                .find(|t| t.start <= group.start && group.start < t.end)
                .map(|t| t.scopes.as_slice())
                .unwrap_or(&[]);

            let mut default_theme = None;
            let mut additional_themes = Vec::with_capacity(group.metadata.len() - 1);
            for (theme_idx, &word) in group.metadata.iter().enumerate() {
                let data = self.theme_token_data(
                    &node.possible_themes[theme_idx],
                    &node.tokenization_results[theme_idx],
                    word,
                    maps,
                )?;
                if theme_idx == default_idx {
                    default_theme = Some(data);
                } else {
                    additional_themes.push(data);
                }
            }
            let Some(default_theme) = default_theme else {
                continue;
            };

            action(TokenGroup {
                text: &line.text[group.start..group.end],
                start: group.start,
                end: group.end,
                scopes,
                default_theme,
                additional_themes,
            });
        }
        Ok(())
    }

    /// Style rules for one theme's stylesheet: modifier classes first (in
    /// front-to-back order underline, italic, bold, each only when actually
    /// used), then one `color` rule per canonical color class in first-seen
    /// order.
    pub fn token_styles_for_theme(&mut self, identifier: &str) -> VermiglioResult<Vec<TokenStyle>> {
        self.generate_class_names()?;
        let Some(record) = self.theme_colors.get(identifier) else {
            return Err(Error::ThemeNotFound {
                identifier: identifier.to_string(),
                path: None,
            });
        };
        let Some(maps) = &self.class_names else {
            return Ok(Vec::new());
        };
        let rendered_for = |canonical: &str| {
            maps.rendered
                .get(identifier)
                .and_then(|m| m.get(canonical))
                .cloned()
        };

        let mut styles = Vec::new();
        let usage = maps
            .modifiers
            .get(identifier)
            .copied()
            .unwrap_or_default();
        // Each modifier is unshifted to the front, so the final order is
        // underline, italic, bold.
        if usage.bold
            && let Some(class_name) = rendered_for(metadata::BOLD_CLASS)
        {
            styles.insert(
                0,
                TokenStyle {
                    class_name,
                    css: "font-weight: bold;".to_string(),
                },
            );
        }
        if usage.italic
            && let Some(class_name) = rendered_for(metadata::ITALIC_CLASS)
        {
            styles.insert(
                0,
                TokenStyle {
                    class_name,
                    css: "font-style: italic;".to_string(),
                },
            );
        }
        if usage.underline
            && let Some(class_name) = rendered_for(metadata::UNDERLINE_CLASS)
        {
            styles.insert(
                0,
                TokenStyle {
                    class_name,
                    css: "text-decoration: underline;".to_string(),
                },
            );
        }

        let color_order = maps
            .color_order
            .get(identifier)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        for canonical in color_order {
            let Some(class_name) = rendered_for(canonical) else {
                continue;
            };
            let color = metadata::color_from_color_map(&record.color_map, canonical)?;
            styles.push(TokenStyle {
                class_name,
                css: format!("color: {};", color),
            });
        }
        Ok(styles)
    }
}
