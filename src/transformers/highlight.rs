//! Highlight directives inside comments (`highlight-start`/`highlight-end`
//! ranges, `highlight-next-line`, trailing `highlight-line`) plus the
//! `hl_lines` ranges from the fence options.

use crate::error::VermiglioResult;
use crate::transformers::{
    LineTransformer, TransformerInput, TransformerResult, take_state,
};

pub const HIGHLIGHTED_LINE_CLASS: &str = "vml-line-highlighted";
pub const HAS_HIGHLIGHTED_LINES_CLASS: &str = "vml-has-highlighted-lines";

// Comment delimiters we recognize directives in, regardless of language.
// A directive comment in the "wrong" style for the language is just a
// directive the author wrote that way.
const COMMENT_STYLES: &[(&str, &str)] = &[
    ("//", ""),
    ("#", ""),
    ("/*", "*/"),
    ("<!--", "-->"),
    ("--", ""),
    (";", ""),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Start,
    End,
    NextLine,
}

impl Directive {
    fn marker(self) -> &'static str {
        match self {
            Directive::Start => "highlight-start",
            Directive::End => "highlight-end",
            Directive::NextLine => "highlight-next-line",
        }
    }
}

fn comment_forms(marker: &str) -> impl Iterator<Item = String> + '_ {
    COMMENT_STYLES.iter().flat_map(move |(open, close)| {
        let suffix = if close.is_empty() {
            String::new()
        } else {
            format!(" {close}")
        };
        [
            format!("{open} {marker}{suffix}"),
            format!("{open}{marker}{suffix}"),
        ]
    })
}

/// Matches a line that is nothing but a directive comment
fn whole_line_directive(text: &str) -> Option<Directive> {
    let trimmed = text.trim();
    for directive in [Directive::Start, Directive::End, Directive::NextLine] {
        if comment_forms(directive.marker()).any(|form| form == trimmed) {
            return Some(directive);
        }
    }
    None
}

/// Matches a trailing `highlight-line` comment and returns the line with
/// the comment stripped
fn strip_line_directive(text: &str) -> Option<String> {
    let trimmed = text.trim_end();
    for form in comment_forms("highlight-line") {
        if let Some(stripped) = trimmed.strip_suffix(&form) {
            return Some(stripped.trim_end().to_string());
        }
    }
    None
}

#[derive(Debug, Default)]
struct DirectiveState {
    in_range: bool,
    highlight_next: bool,
}

/// Marks highlighted lines and drops the directive-only lines that carry no
/// visible content
#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightDirectives;

impl LineTransformer for HighlightDirectives {
    fn name(&self) -> &'static str {
        "highlight-directives"
    }

    fn transform(&self, input: TransformerInput<'_>) -> VermiglioResult<TransformerResult> {
        let mut state: DirectiveState = take_state(input.state);

        if let Some(directive) = whole_line_directive(&input.line.text) {
            match directive {
                Directive::Start => state.in_range = true,
                Directive::End => state.in_range = false,
                Directive::NextLine => state.highlight_next = true,
            }
            let mut result = TransformerResult::drop_line();
            result.state = Some(Box::new(state));
            return Ok(result);
        }

        let mut line = input.line;
        let mut highlighted = state.in_range;
        if state.highlight_next {
            highlighted = true;
            state.highlight_next = false;
        }
        if let Some(stripped) = strip_line_directive(&line.text) {
            line.text = stripped;
            highlighted = true;
        }
        if input
            .options
            .highlight_lines
            .iter()
            .any(|range| range.contains(&input.line_number))
        {
            highlighted = true;
        }

        let mut result = if highlighted {
            line.add_class(HIGHLIGHTED_LINE_CLASS);
            let mut result = TransformerResult::keep(line);
            result
                .data
                .insert("isHighlighted".to_string(), serde_json::Value::Bool(true));
            result.container_class_name = Some(HAS_HIGHLIGHTED_LINES_CLASS.to_string());
            result
        } else {
            TransformerResult::keep(line)
        };
        result.state = Some(Box::new(state));
        Ok(result)
    }
}
