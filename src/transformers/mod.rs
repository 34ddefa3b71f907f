//! The line transformer pipeline.
//!
//! Transformers rewrite raw code lines before tokenization: they can drop
//! directive lines, attach CSS classes and data to lines, and contribute
//! gutter cells. Each transformer threads its own state across lines,
//! independent of the others, and its gutter cells always land at the same
//! column block in every line.

use std::any::Any;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::VermiglioResult;
use crate::options::CodeNodeOptions;

pub mod diff;
pub mod highlight;
pub mod line_numbers;

/// A per-line side annotation slot (line number, diff marker, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GutterCell {
    pub text: String,
    pub class_name: Option<String>,
}

/// One normalized output line
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    /// CSS classes merged additively across transformers
    pub class_names: Vec<String>,
    /// Flattened gutter cells. `None` entries are padding that keeps every
    /// transformer's cells at a fixed column offset.
    pub gutter_cells: Vec<Option<GutterCell>>,
    /// Transformer-contributed data (`isHighlighted`, `lineNumber`, `diff`).
    /// Merge semantics are shallow overwrite.
    pub data: BTreeMap<String, Value>,
}

/// The visible part of a line while it travels through the chain
#[derive(Debug, Clone, PartialEq)]
pub struct LineEdit {
    pub text: String,
    pub class_names: Vec<String>,
}

impl LineEdit {
    pub fn new(text: impl Into<String>) -> Self {
        LineEdit {
            text: text.into(),
            class_names: Vec::new(),
        }
    }

    /// Adds a class unless already present
    pub fn add_class(&mut self, class_name: &str) {
        if !self.class_names.iter().any(|c| c == class_name) {
            self.class_names.push(class_name.to_string());
        }
    }
}

pub struct TransformerInput<'a> {
    /// Output line of the previous transformer in the chain
    pub line: LineEdit,
    /// The state this same transformer returned for the previous line
    pub state: Option<Box<dyn Any>>,
    pub language: Option<&'a str>,
    pub options: &'a CodeNodeOptions,
    /// 1-based source line number (before any lines were dropped)
    pub line_number: usize,
}

pub struct TransformerResult {
    /// `None` drops the entire line from the output
    pub line: Option<LineEdit>,
    pub state: Option<Box<dyn Any>>,
    pub data: BTreeMap<String, Value>,
    pub gutter_cells: Vec<Option<GutterCell>>,
    pub container_class_name: Option<String>,
}

impl TransformerResult {
    /// Keeps the line unchanged, with no state, data or cells
    pub fn keep(line: LineEdit) -> Self {
        TransformerResult {
            line: Some(line),
            state: None,
            data: BTreeMap::new(),
            gutter_cells: Vec::new(),
            container_class_name: None,
        }
    }

    /// Drops the line from the output
    pub fn drop_line() -> Self {
        TransformerResult {
            line: None,
            state: None,
            data: BTreeMap::new(),
            gutter_cells: Vec::new(),
            container_class_name: None,
        }
    }
}

pub trait LineTransformer {
    fn name(&self) -> &'static str;

    fn transform(&self, input: TransformerInput<'_>) -> VermiglioResult<TransformerResult>;
}

/// Recovers a transformer's typed state from the pipeline's opaque slot
pub(crate) fn take_state<T: Default + 'static>(state: Option<Box<dyn Any>>) -> T {
    state
        .and_then(|s| s.downcast::<T>().ok())
        .map(|s| *s)
        .unwrap_or_default()
}

/// Result of running the whole pipeline over a node's text
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedLines {
    pub lines: Vec<Line>,
    /// Classes for the surrounding container element, in first-seen order
    pub container_class_names: Vec<String>,
}

/// The built-in chain: highlight directives, diff markers, line numbers
pub fn default_transformers() -> Vec<Box<dyn LineTransformer>> {
    vec![
        Box::new(highlight::HighlightDirectives),
        Box::new(diff::DiffLines),
        Box::new(line_numbers::LineNumbers),
    ]
}

struct PendingLine {
    edit: LineEdit,
    data: BTreeMap<String, Value>,
    // One row of raw cells per transformer, unpadded
    cell_rows: Vec<Vec<Option<GutterCell>>>,
}

/// Runs the transformer chain over every line of `text`.
///
/// Two passes: the first runs the transformers and records each
/// transformer's raw gutter cells and running maximum width, the second
/// flattens the cells using the final widths so columns line up.
/// A transformer error aborts the whole node.
pub fn run_pipeline(
    text: &str,
    language: Option<&str>,
    options: &CodeNodeOptions,
    transformers: &[Box<dyn LineTransformer>],
) -> VermiglioResult<TransformedLines> {
    let mut states: Vec<Option<Box<dyn Any>>> =
        (0..transformers.len()).map(|_| None).collect();
    let mut max_cells = vec![0usize; transformers.len()];
    let mut pending: Vec<PendingLine> = Vec::new();
    let mut container_class_names: Vec<String> = Vec::new();

    for (line_idx, raw) in text.split('\n').enumerate() {
        let mut edit = Some(LineEdit::new(raw));
        let mut data = BTreeMap::new();
        let mut cell_rows: Vec<Vec<Option<GutterCell>>> = vec![Vec::new(); transformers.len()];

        for (t_idx, transformer) in transformers.iter().enumerate() {
            let Some(current) = edit.take() else {
                break;
            };
            let result = transformer.transform(TransformerInput {
                line: current,
                state: states[t_idx].take(),
                language,
                options,
                line_number: line_idx + 1,
            })?;
            states[t_idx] = result.state;
            if let Some(class_name) = result.container_class_name
                && !container_class_names.contains(&class_name)
            {
                container_class_names.push(class_name);
            }
            data.extend(result.data);
            max_cells[t_idx] = max_cells[t_idx].max(result.gutter_cells.len());
            cell_rows[t_idx] = result.gutter_cells;
            edit = result.line;
        }

        if let Some(edit) = edit {
            pending.push(PendingLine {
                edit,
                data,
                cell_rows,
            });
        }
    }

    let total_width: usize = max_cells.iter().sum();
    let lines = pending
        .into_iter()
        .map(|p| {
            let mut gutter_cells = Vec::with_capacity(total_width);
            for (t_idx, mut row) in p.cell_rows.into_iter().enumerate() {
                row.resize_with(max_cells[t_idx], || None);
                gutter_cells.extend(row);
            }
            Line {
                text: p.edit.text,
                class_names: p.edit.class_names,
                gutter_cells,
                data: p.data,
            }
        })
        .collect();

    Ok(TransformedLines {
        lines,
        container_class_names,
    })
}
