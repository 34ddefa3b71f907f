//! Parsing of code fence info strings like
//! `js,linenos,linenostart=5,hl_lines=1-3 7,theme=Monokai`.
//!
//! Malformed values are fatal for the node (they indicate a typo the author
//! wants to know about), reported with the offending fragment and its byte
//! offset within the fence string.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::error::{Error, VermiglioResult};

/// Options attached to one code node, from its fence string and defaults
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeNodeOptions {
    /// Whether to emit line number gutter cells
    pub show_line_numbers: bool,
    /// First displayed line number
    pub line_number_start: usize,
    /// 1-indexed source line ranges to mark as highlighted
    pub highlight_lines: Vec<RangeInclusive<usize>>,
    /// Whether `+`/`-` prefixed lines carry diff gutter markers
    pub diff: bool,
    /// Per-node theme override
    pub theme: Option<String>,
    /// Unrecognized `key=value` pairs, kept for downstream renderers
    pub rest: BTreeMap<String, String>,
}

impl Default for CodeNodeOptions {
    fn default() -> Self {
        Self {
            show_line_numbers: false,
            line_number_start: 1,
            highlight_lines: Vec::new(),
            diff: false,
            theme: None,
            rest: BTreeMap::new(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsedFence {
    pub language: Option<String>,
    pub options: CodeNodeOptions,
}

fn parse_range(s: &str, position: usize) -> VermiglioResult<RangeInclusive<usize>> {
    let err = || Error::InvalidOption {
        fragment: s.to_string(),
        position,
    };
    match s.find('-') {
        Some(dash) => {
            let mut from: usize = s[..dash].parse().map_err(|_| err())?;
            let mut to: usize = s[dash + 1..].parse().map_err(|_| err())?;
            if to < from {
                std::mem::swap(&mut from, &mut to);
            }
            Ok(from..=to)
        }
        None => {
            let val: usize = s.parse().map_err(|_| err())?;
            Ok(val..=val)
        }
    }
}

fn parse_ranges(
    value: &str,
    position: usize,
    out: &mut Vec<RangeInclusive<usize>>,
) -> VermiglioResult<()> {
    for range_str in value.split(' ') {
        if range_str.is_empty() {
            continue;
        }
        out.push(parse_range(range_str, position)?);
    }
    Ok(())
}

/// Parses a fence info string. The first bare token is the language; later
/// bare tokens become boolean flags under `rest`.
pub fn parse_fence_options(fence: &str) -> VermiglioResult<ParsedFence> {
    let mut language = None;
    let mut options = CodeNodeOptions::default();

    let mut offset = 0;
    for raw_token in fence.split(',') {
        let token = raw_token.trim();
        let position = offset + (raw_token.len() - raw_token.trim_start().len());
        offset += raw_token.len() + 1;
        if token.is_empty() {
            continue;
        }

        let (key, value) = match token.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (token, None),
        };
        let err = || Error::InvalidOption {
            fragment: token.to_string(),
            position,
        };

        match key {
            "linenos" => options.show_line_numbers = true,
            "linenostart" => {
                let value = value.ok_or_else(err)?;
                options.line_number_start = value.parse().map_err(|_| err())?;
                options.show_line_numbers = true;
            }
            "hl_lines" => {
                let value = value.ok_or_else(err)?;
                parse_ranges(value, position, &mut options.highlight_lines)?;
            }
            "diff" => options.diff = true,
            "theme" => {
                let value = value.ok_or_else(err)?;
                if value.is_empty() {
                    return Err(err());
                }
                options.theme = Some(value.to_string());
            }
            key => match value {
                Some(value) => {
                    options.rest.insert(key.to_string(), value.to_string());
                }
                None if language.is_none() => language = Some(key.to_string()),
                None => {
                    options.rest.insert(key.to_string(), "true".to_string());
                }
            },
        }
    }

    Ok(ParsedFence { language, options })
}
