//! Best-effort recovery of a truncated checkpoint document
//!
//! A single forward pass over the raw bytes tracks string state and the stack
//! of open containers. Every position just after a `}` or `]` outside a string
//! ends a complete value, so the prefix up to that point plus the closers for
//! whatever is still open is well-formed JSON. Those cut points are tried from
//! the end backward, up to a fixed number of attempts, and the first one that
//! decodes wins. This only helps when the damage is a lost tail; interior
//! corruption before the last good cut point is not repaired.

use std::collections::VecDeque;

/// A place the document can be cut and closed off
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CutPoint {
    /// Length of the kept prefix in bytes
    pub offset: usize,
    /// Closing brackets needed to balance the prefix
    pub suffix: String,
}

impl CutPoint {
    /// The prefix of `raw` up to this cut with its closers appended
    pub(crate) fn apply(&self, raw: &[u8]) -> Vec<u8> {
        let mut repaired = Vec::with_capacity(self.offset + self.suffix.len());
        repaired.extend_from_slice(&raw[..self.offset]);
        repaired.extend_from_slice(self.suffix.as_bytes());
        repaired
    }
}

/// Collects the last `limit` cut points of `raw`, latest first
pub(crate) fn cut_points(raw: &[u8], limit: usize) -> Vec<CutPoint> {
    let mut open: Vec<u8> = Vec::new();
    let mut cuts: VecDeque<CutPoint> = VecDeque::with_capacity(limit.min(1024));
    let mut in_string = false;
    let mut escaped = false;

    for (index, &byte) in raw.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => open.push(b'}'),
            b'[' => open.push(b']'),
            b'}' | b']' => {
                if open.pop() != Some(byte) {
                    // Brackets stop matching; nothing after this is trustworthy
                    tracing::debug!("Unbalanced '{}' at byte {}", byte as char, index);
                    break;
                }

                if limit == 0 {
                    continue;
                }
                if cuts.len() == limit {
                    cuts.pop_front();
                }
                cuts.push_back(CutPoint {
                    offset: index + 1,
                    suffix: open.iter().rev().map(|&b| b as char).collect(),
                });
            }
            _ => {}
        }
    }

    cuts.into_iter().rev().collect()
}

/// Finds the longest prefix of `raw` that `decode` accepts
///
/// Returns the cut point used together with the decoded value, or `None`
/// if none of the last `max_attempts` cut points decode.
pub(crate) fn recover_prefix<T, E, F>(
    raw: &[u8],
    max_attempts: usize,
    mut decode: F,
) -> Option<(CutPoint, T)>
where
    F: FnMut(&[u8]) -> Result<T, E>,
    E: std::fmt::Display,
{
    for cut in cut_points(raw, max_attempts) {
        match decode(&cut.apply(raw)) {
            Ok(value) => return Some((cut, value)),
            Err(e) => {
                tracing::debug!("Prefix ending at byte {} did not decode: {}", cut.offset, e);
            }
        }
    }
    None
}
