//! Diff markers: when the fence carries the `diff` flag, leading `+`/`-`
//! markers become gutter cells and line classes, and the marker itself is
//! stripped so the grammar still tokenizes clean source.

use serde_json::Value;

use crate::error::VermiglioResult;
use crate::transformers::{GutterCell, LineTransformer, TransformerInput, TransformerResult};

pub const DIFF_ADD_LINE_CLASS: &str = "vml-line-diff-add";
pub const DIFF_DEL_LINE_CLASS: &str = "vml-line-diff-del";
pub const DIFF_ADD_GUTTER_CLASS: &str = "vml-gutter-diff-add";
pub const DIFF_DEL_GUTTER_CLASS: &str = "vml-gutter-diff-del";
pub const HAS_DIFF_CLASS: &str = "vml-has-diff";

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffLines;

fn strip_marker(text: &str, marker: char) -> String {
    let rest = &text[marker.len_utf8()..];
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

impl LineTransformer for DiffLines {
    fn name(&self) -> &'static str {
        "diff-lines"
    }

    fn transform(&self, input: TransformerInput<'_>) -> VermiglioResult<TransformerResult> {
        if !input.options.diff {
            return Ok(TransformerResult::keep(input.line));
        }

        let mut line = input.line;
        let (kind, line_class, gutter_class) = match line.text.chars().next() {
            Some('+') => ("add", DIFF_ADD_LINE_CLASS, DIFF_ADD_GUTTER_CLASS),
            Some('-') => ("del", DIFF_DEL_LINE_CLASS, DIFF_DEL_GUTTER_CLASS),
            _ => {
                let mut result = TransformerResult::keep(line);
                result.container_class_name = Some(HAS_DIFF_CLASS.to_string());
                return Ok(result);
            }
        };

        let marker = if kind == "add" { '+' } else { '-' };
        line.text = strip_marker(&line.text, marker);
        line.add_class(line_class);
        let mut result = TransformerResult::keep(line);
        result.gutter_cells = vec![Some(GutterCell {
            text: marker.to_string(),
            class_name: Some(gutter_class.to_string()),
        })];
        result
            .data
            .insert("diff".to_string(), Value::String(kind.to_string()));
        result.container_class_name = Some(HAS_DIFF_CLASS.to_string());
        Ok(result)
    }
}
