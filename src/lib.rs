mod catalog;
mod engine;
mod error;
mod metadata;
mod options;
mod themes;

mod register;
mod registry;
mod tokenize;
mod transformers;
mod zip;

#[cfg(test)]
mod test_utils;

pub use catalog::{Catalog, GrammarManifestEntry, KeyValueCache, Manifest, MemoryCache, ThemeManifestEntry};
pub use engine::{
    EngineGuard, EngineLock, GrammarEngine, GrammarId, RuleStack, TokenizedLine, TokenizedLine2,
};
pub use error::{Error, VermiglioResult};
pub use metadata::{
    BOLD_CLASS, FontStyle, ITALIC_CLASS, UNDERLINE_CLASS, background, font_style, foreground,
    language_id, pack_metadata, token_type,
};
pub use options::{CodeNodeOptions, ParsedFence, parse_fence_options};
pub use register::{CodeNodeInput, register_code_node};
pub use registry::{
    CLASS_NAME_PREFIX, CodeNodeKind, CodeNodeRegistry, PossibleTheme, RegisteredCodeNodeData,
    ThemeTokenData, TokenGroup, TokenStyle,
};
pub use themes::raw::{LoadedTheme, RawRuleSettings, RawScopeSelector, RawThemeRule, load_color_theme};
pub use themes::{
    CodeNodeContext, ConditionalTheme, DARK_MEDIA_QUERY, LIGHT_MEDIA_QUERY, ThemeCondition,
    ThemeOption, ThemeRequest,
};
pub use tokenize::{
    BinaryToken, FullToken, LineTokens, TokenizationResult, tokenize_with_theme,
};
pub use transformers::{
    GutterCell, Line, LineEdit, LineTransformer, TransformedLines, TransformerInput,
    TransformerResult, default_transformers, run_pipeline,
};

pub use transformers::diff::{
    DIFF_ADD_GUTTER_CLASS, DIFF_ADD_LINE_CLASS, DIFF_DEL_GUTTER_CLASS, DIFF_DEL_LINE_CLASS,
    HAS_DIFF_CLASS,
};
pub use transformers::highlight::{HAS_HIGHLIGHTED_LINES_CLASS, HIGHLIGHTED_LINE_CLASS};
pub use transformers::line_numbers::{HAS_LINE_NUMBERS_CLASS, LINE_NUMBER_GUTTER_CLASS};

/// Baseline stylesheet for the structural classes emitted by the built-in
/// transformers. Token color rules come from
/// [`CodeNodeRegistry::token_styles_for_theme`] instead, since they depend
/// on the registered themes.
pub const VERMIGLIO_CSS: &str = r#".vml-ln {
  display: inline-block;
  user-select: none;
  white-space: pre;
  margin-right: 0.4em;
  padding: 0 0.4em;
  min-width: 3ch;
  text-align: right;
  opacity: 0.8;
}
.vml-line-highlighted {
  background-color: rgba(255, 255, 255, 0.1);
  display: block;
}
.vml-line-diff-add {
  background-color: rgba(16, 185, 129, 0.15);
  display: block;
}
.vml-line-diff-del {
  background-color: rgba(239, 68, 68, 0.15);
  display: block;
}
.vml-gutter-diff-add,
.vml-gutter-diff-del {
  display: inline-block;
  user-select: none;
  white-space: pre;
  margin-right: 0.4em;
}
"#;
