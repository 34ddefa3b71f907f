//! Line number gutter cells, counting output lines (lines dropped by
//! earlier transformers do not consume a number).

use serde_json::Value;

use crate::error::VermiglioResult;
use crate::transformers::{
    GutterCell, LineTransformer, TransformerInput, TransformerResult, take_state,
};

pub const LINE_NUMBER_GUTTER_CLASS: &str = "vml-ln";
pub const HAS_LINE_NUMBERS_CLASS: &str = "vml-has-line-numbers";

#[derive(Debug, Default)]
struct NumberState {
    next: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LineNumbers;

impl LineTransformer for LineNumbers {
    fn name(&self) -> &'static str {
        "line-numbers"
    }

    fn transform(&self, input: TransformerInput<'_>) -> VermiglioResult<TransformerResult> {
        if !input.options.show_line_numbers {
            return Ok(TransformerResult::keep(input.line));
        }

        let state: NumberState = take_state(input.state);
        let number = state.next.unwrap_or(input.options.line_number_start);

        let mut result = TransformerResult::keep(input.line);
        result.gutter_cells = vec![Some(GutterCell {
            text: number.to_string(),
            class_name: Some(LINE_NUMBER_GUTTER_CLASS.to_string()),
        })];
        result.data.insert(
            "lineNumber".to_string(),
            Value::Number(serde_json::Number::from(number)),
        );
        result.state = Some(Box::new(NumberState {
            next: Some(number + 1),
        }));
        result.container_class_name = Some(HAS_LINE_NUMBERS_CLASS.to_string());
        Ok(result)
    }
}
