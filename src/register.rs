//! Registration of one code node: runs the transformer pipeline, resolves
//! themes and grammar, tokenizes under every possible theme while holding
//! the engine lock, and records the result in the registry.

use crate::catalog::Catalog;
use crate::engine::EngineLock;
use crate::error::{Error, VermiglioResult};
use crate::options::parse_fence_options;
use crate::registry::{CodeNodeKind, CodeNodeRegistry, RegisteredCodeNodeData};
use crate::themes::{CodeNodeContext, ConditionalTheme, ThemeOption, merge_theme};
use crate::tokenize::tokenize_with_theme;
use crate::transformers::LineTransformer;
use std::hash::Hash;

/// One code block or span as found in the document
#[derive(Debug, Clone, Copy)]
pub struct CodeNodeInput<'a> {
    pub kind: CodeNodeKind,
    /// Raw source text of the node
    pub text: &'a str,
    /// The fence info string for blocks (`js,linenos,...`), `None` for
    /// spans
    pub fence: Option<&'a str>,
    /// Language override; falls back to the fence language
    pub language: Option<&'a str>,
}

#[inline]
pub(crate) fn normalize_string(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Resolves a theme option against the catalog, erroring on unknown
/// identifiers or missing theme files
fn resolve_themes(
    theme_option: &ThemeOption,
    context: &CodeNodeContext<'_>,
    catalog: &Catalog,
) -> VermiglioResult<Vec<ConditionalTheme>> {
    let mut themes = Vec::new();
    for request in theme_option.resolve(context) {
        let path = catalog
            .theme_path(&request.identifier)
            .ok_or_else(|| Error::ThemeNotFound {
                identifier: request.identifier.clone(),
                path: None,
            })?
            .to_path_buf();
        if !path.exists() {
            return Err(Error::ThemeNotFound {
                identifier: request.identifier,
                path: Some(path),
            });
        }
        merge_theme(
            &mut themes,
            ConditionalTheme {
                identifier: request.identifier,
                path,
                conditions: request.conditions,
            },
        );
    }
    Ok(themes)
}

/// Registers one code node.
///
/// The transformer pipeline runs without the lock; the lock is held for
/// grammar loading and all per-theme tokenization, then released before the
/// registry is updated. A missing grammar is not an error: the node is
/// recorded untokenized and a warning is logged.
pub fn register_code_node<K: Eq + Hash + Clone>(
    registry: &mut CodeNodeRegistry<K>,
    key: K,
    input: CodeNodeInput<'_>,
    theme_option: &ThemeOption,
    catalog: &Catalog,
    lock: &EngineLock,
    transformers: &[Box<dyn LineTransformer>],
) -> VermiglioResult<()> {
    let parsed = match input.fence {
        Some(fence) => parse_fence_options(fence)?,
        None => parse_fence_options("")?,
    };
    let options = parsed.options;
    let language = input
        .language
        .map(str::to_string)
        .or(parsed.language)
        .map(|l| l.to_lowercase());

    let text = normalize_string(input.text);
    let text = text.strip_suffix('\n').unwrap_or(&text);
    let transformed = crate::transformers::run_pipeline(
        text,
        language.as_deref(),
        &options,
        transformers,
    )?;

    // A per-fence theme override beats the document-wide option
    let fence_theme = options.theme.clone().map(ThemeOption::Literal);
    let effective_option = fence_theme.as_ref().unwrap_or(theme_option);
    let context = CodeNodeContext {
        language: language.as_deref(),
        kind: input.kind,
        options: &options,
    };
    let possible_themes = resolve_themes(effective_option, &context, catalog)?;

    let scope = language
        .as_deref()
        .and_then(|lang| catalog.scope_for_language(lang));

    let mut guard = lock.acquire();
    let grammar =
        scope.and_then(|(scope_name, language_id)| guard.load_grammar(scope_name, language_id));
    if let Some(lang) = language.as_deref()
        && grammar.is_none()
    {
        log::warn!("no grammar found for language '{lang}', rendering as plain text");
    }

    let mut tokenization_results = Vec::with_capacity(possible_themes.len());
    for theme in &possible_themes {
        tokenization_results.push(tokenize_with_theme(
            &transformed.lines,
            theme,
            grammar,
            &mut *guard,
        )?);
    }
    drop(guard);

    registry.register(
        key,
        RegisteredCodeNodeData {
            kind: input.kind,
            lines: transformed.lines,
            text: text.to_string(),
            options,
            language_name: language,
            possible_themes,
            is_tokenized: grammar.is_some(),
            tokenization_results,
            container_class_names: transformed.container_class_names,
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GrammarEngine;
    use crate::test_utils::{MockEngine, fixture_catalog};
    use crate::themes::ThemeCondition;
    use crate::transformers::default_transformers;

    fn block(text: &'static str, fence: &'static str) -> CodeNodeInput<'static> {
        CodeNodeInput {
            kind: CodeNodeKind::Block,
            text,
            fence: Some(fence),
            language: None,
        }
    }

    fn engine_lock() -> EngineLock {
        EngineLock::new(|| {
            Box::new(MockEngine::new().with_grammar("source.js"))
                as Box<dyn GrammarEngine + Send>
        })
    }

    #[test]
    fn tokenized_node_reconstructs_its_line() {
        let catalog = fixture_catalog();
        let lock = engine_lock();
        let transformers = default_transformers();
        let mut registry = CodeNodeRegistry::new();
        let option = ThemeOption::Literal("Default Dark+".to_string());

        register_code_node(
            &mut registry,
            1,
            block("const x = 3;", "js"),
            &option,
            &catalog,
            &lock,
            &transformers,
        )
        .unwrap();

        let node = registry.node(&1).unwrap();
        assert!(node.is_tokenized);
        assert_eq!(node.possible_themes.len(), 1);
        assert_eq!(node.tokenization_results.len(), 1);

        let mut reconstructed = String::new();
        let mut groups = 0;
        registry
            .for_each_token(&1, 0, |group| {
                reconstructed.push_str(group.text);
                groups += 1;
            })
            .unwrap();
        assert!(groups > 0);
        assert_eq!(reconstructed, "const x = 3;");
    }

    #[test]
    fn unknown_language_falls_back_to_plain_text() {
        let catalog = fixture_catalog();
        let lock = engine_lock();
        let transformers = default_transformers();
        let mut registry = CodeNodeRegistry::new();
        let option = ThemeOption::Literal("Default Dark+".to_string());

        register_code_node(
            &mut registry,
            1,
            block("some text", "cobol"),
            &option,
            &catalog,
            &lock,
            &transformers,
        )
        .unwrap();

        let node = registry.node(&1).unwrap();
        assert!(!node.is_tokenized);
        assert_eq!(node.lines.len(), 1);
        assert_eq!(node.lines[0].text, "some text");

        let mut called = false;
        registry.for_each_token(&1, 0, |_| called = true).unwrap();
        assert!(!called);
    }

    #[test]
    fn two_themes_register_and_style_differently() {
        let catalog = fixture_catalog();
        let lock = engine_lock();
        let transformers = default_transformers();
        let mut registry = CodeNodeRegistry::new();
        let option = ThemeOption::Conditional {
            default: "Default Dark+".to_string(),
            dark: Some("Monokai".to_string()),
            light: None,
        };

        register_code_node(
            &mut registry,
            1,
            block("const x = 3;", "js"),
            &option,
            &catalog,
            &lock,
            &transformers,
        )
        .unwrap();

        let themes = registry.all_possible_themes();
        assert_eq!(themes.len(), 2);
        assert_eq!(themes[0].theme.conditions, vec![ThemeCondition::Default]);

        let dark_styles = registry.token_styles_for_theme("Default Dark+").unwrap();
        let monokai_styles = registry.token_styles_for_theme("Monokai").unwrap();
        assert!(!dark_styles.is_empty());
        assert_eq!(dark_styles.len(), monokai_styles.len());
        // Same canonical slots, different colors in at least one rule
        assert!(
            dark_styles
                .iter()
                .zip(&monokai_styles)
                .any(|(a, b)| a.css != b.css),
            "expected at least one differing color rule"
        );
        // And the rendered class names never collide across the two themes
        for (a, b) in dark_styles.iter().zip(&monokai_styles) {
            assert_ne!(a.class_name, b.class_name);
        }
    }

    #[test]
    fn missing_theme_is_fatal() {
        let catalog = fixture_catalog();
        let lock = engine_lock();
        let transformers = default_transformers();
        let mut registry: CodeNodeRegistry<u32> = CodeNodeRegistry::new();
        let option = ThemeOption::Literal("No Such Theme".to_string());

        let err = register_code_node(
            &mut registry,
            1,
            block("x", "js"),
            &option,
            &catalog,
            &lock,
            &transformers,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ThemeNotFound { .. }));
    }

    #[test]
    fn fence_theme_override_wins() {
        let catalog = fixture_catalog();
        let lock = engine_lock();
        let transformers = default_transformers();
        let mut registry = CodeNodeRegistry::new();
        let option = ThemeOption::Literal("Default Dark+".to_string());

        register_code_node(
            &mut registry,
            1,
            block("const x = 3;", "js,theme=Monokai"),
            &option,
            &catalog,
            &lock,
            &transformers,
        )
        .unwrap();

        let node = registry.node(&1).unwrap();
        assert_eq!(node.possible_themes[0].identifier, "Monokai");
    }
}
