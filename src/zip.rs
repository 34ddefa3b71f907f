//! Zipping: aligning N independently-boundaried per-theme token streams for
//! one line into a single position-synchronized stream.

use std::collections::VecDeque;

use crate::tokenize::BinaryToken;

/// One position-aligned slice valid across all themes, carrying one packed
/// metadata word per theme (same index order as the input streams)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ZippedToken {
    pub start: usize,
    pub end: usize,
    pub metadata: Vec<u32>,
}

/// Aligns per-theme token streams for one line.
///
/// At each step the next boundary is the minimum `end` across the themes'
/// current tokens. A token that ends exactly there is consumed; a longer one
/// contributes its metadata for the slice and is requeued with its start
/// advanced. The output tiles the line with no gaps or overlaps and every
/// group has exactly one entry per theme.
pub(crate) fn zip_line_tokens(streams: &[Vec<BinaryToken>]) -> Vec<ZippedToken> {
    let mut queues: Vec<VecDeque<BinaryToken>> = streams
        .iter()
        .map(|s| s.iter().copied().collect())
        .collect();
    let mut out = Vec::new();
    let mut start = 0;

    loop {
        let Some(end) = queues
            .iter()
            .filter_map(|q| q.front().map(|t| t.end))
            .min()
        else {
            // Every queue is empty
            break;
        };

        let mut metadata = Vec::with_capacity(queues.len());
        for queue in &mut queues {
            match queue.front_mut() {
                Some(token) if token.end == end => {
                    metadata.push(token.metadata);
                    queue.pop_front();
                }
                Some(token) => {
                    metadata.push(token.metadata);
                    token.start = end;
                }
                // Streams for the same line have the same total span, so an
                // already-empty queue means inconsistent input; keep the
                // group complete anyway.
                None => metadata.push(0),
            }
        }

        out.push(ZippedToken {
            start,
            end,
            metadata,
        });
        start = end;
    }

    out
}
