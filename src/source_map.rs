//! Source map (v3) support for the splice pass.
//!
//! Maps are decoded into per-line segment lists, edited in generated
//! coordinates as replacements are applied, and re-encoded.

use serde::{Deserialize, Serialize};

use crate::error::RenameError;

const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn from_json(json: &str) -> Result<Self, RenameError> {
        serde_json::from_str(json).map_err(|e| RenameError::SourceMap {
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, RenameError> {
        serde_json::to_string(self).map_err(|e| RenameError::SourceMap {
            message: e.to_string(),
        })
    }
}

/// Position in generated text: 0-based line, UTF-16 column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Position of byte `offset` in `text`.
    pub fn of_offset(text: &str, offset: usize) -> Self {
        let before = &text[..offset.min(text.len())];
        match before.rfind('\n') {
            Some(nl) => Self {
                line: before.matches('\n').count() as u32,
                column: before[nl + 1..].encode_utf16().count() as u32,
            },
            None => Self {
                line: 0,
                column: before.encode_utf16().count() as u32,
            },
        }
    }

    /// Position reached after writing `text` starting here.
    pub fn advance(self, text: &str) -> Self {
        match text.rfind('\n') {
            Some(nl) => Self {
                line: self.line + text.matches('\n').count() as u32,
                column: text[nl + 1..].encode_utf16().count() as u32,
            },
            None => Self {
                line: self.line,
                column: self.column + text.encode_utf16().count() as u32,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source_index: u32,
    pub line: u32,
    pub column: u32,
    pub name_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub original: Option<OriginalLocation>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// VLQ
// ═══════════════════════════════════════════════════════════════════════════════

pub fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 0x1F) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0x20;
        }
        out.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

fn base64_value(c: u8) -> Option<i64> {
    match c {
        b'A'..=b'Z' => Some((c - b'A') as i64),
        b'a'..=b'z' => Some((c - b'a') as i64 + 26),
        b'0'..=b'9' => Some((c - b'0') as i64 + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes every VLQ value in one segment.
pub fn decode_vlq_segment(segment: &str) -> Result<Vec<i64>, RenameError> {
    let mut values = Vec::new();
    let mut value = 0i64;
    let mut shift = 0u32;
    for &c in segment.as_bytes() {
        let digit = base64_value(c).ok_or_else(|| RenameError::SourceMap {
            message: format!("invalid base64 character '{}' in mappings", c as char),
        })?;
        value += (digit & 0x1F) << shift;
        if digit & 0x20 != 0 {
            shift += 5;
            if shift > 60 {
                return Err(RenameError::SourceMap {
                    message: "VLQ value overflow".to_string(),
                });
            }
        } else {
            let negative = value & 1 == 1;
            let magnitude = value >> 1;
            values.push(if negative { -magnitude } else { magnitude });
            value = 0;
            shift = 0;
        }
    }
    if shift != 0 {
        return Err(RenameError::SourceMap {
            message: "truncated VLQ value".to_string(),
        });
    }
    Ok(values)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAPPINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Decoded `mappings`, one segment list per generated line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mappings {
    pub lines: Vec<Vec<Segment>>,
}

fn non_negative(value: i64, field: &str) -> Result<u32, RenameError> {
    u32::try_from(value).map_err(|_| RenameError::SourceMap {
        message: format!("negative {} in mappings", field),
    })
}

impl Mappings {
    pub fn decode(mappings: &str) -> Result<Self, RenameError> {
        let mut lines = Vec::new();
        let (mut source, mut orig_line, mut orig_col, mut name) = (0i64, 0i64, 0i64, 0i64);

        for line in mappings.split(';') {
            let mut segments = Vec::new();
            let mut column = 0i64;
            for raw in line.split(',').filter(|s| !s.is_empty()) {
                let fields = decode_vlq_segment(raw)?;
                column += fields[0];
                let original = match fields.len() {
                    1 => None,
                    4 | 5 => {
                        source += fields[1];
                        orig_line += fields[2];
                        orig_col += fields[3];
                        let name_index = if fields.len() == 5 {
                            name += fields[4];
                            Some(non_negative(name, "name index")?)
                        } else {
                            None
                        };
                        Some(OriginalLocation {
                            source_index: non_negative(source, "source index")?,
                            line: non_negative(orig_line, "original line")?,
                            column: non_negative(orig_col, "original column")?,
                            name_index,
                        })
                    }
                    n => {
                        return Err(RenameError::SourceMap {
                            message: format!("segment '{}' has {} fields", raw, n),
                        })
                    }
                };
                segments.push(Segment {
                    generated_column: non_negative(column, "generated column")?,
                    original,
                });
            }
            lines.push(segments);
        }
        Ok(Self { lines })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        let (mut source, mut orig_line, mut orig_col, mut name) = (0i64, 0i64, 0i64, 0i64);

        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            let mut column = 0i64;
            for (j, seg) in line.iter().enumerate() {
                if j > 0 {
                    out.push(',');
                }
                encode_vlq(seg.generated_column as i64 - column, &mut out);
                column = seg.generated_column as i64;
                if let Some(orig) = seg.original {
                    encode_vlq(orig.source_index as i64 - source, &mut out);
                    encode_vlq(orig.line as i64 - orig_line, &mut out);
                    encode_vlq(orig.column as i64 - orig_col, &mut out);
                    source = orig.source_index as i64;
                    orig_line = orig.line as i64;
                    orig_col = orig.column as i64;
                    if let Some(n) = orig.name_index {
                        encode_vlq(n as i64 - name, &mut out);
                        name = n as i64;
                    }
                }
            }
        }
        out
    }

    /// Moves every mapping after a replacement of `start..end` whose new text
    /// now ends at `replacement_end`.
    ///
    /// Mappings strictly inside the replaced range are dropped, and mappings
    /// that land on the same position are merged (first one wins).
    pub fn apply_edit(&mut self, start: Position, end: Position, replacement_end: Position) {
        let mut moved: Vec<(Position, Segment)> = Vec::new();
        for (line_idx, line) in self.lines.iter().enumerate() {
            for seg in line {
                let pos = Position::new(line_idx as u32, seg.generated_column);
                if pos <= start {
                    moved.push((pos, *seg));
                } else if pos < end {
                    continue;
                } else if pos.line == end.line {
                    let column = pos.column - end.column + replacement_end.column;
                    moved.push((Position::new(replacement_end.line, column), *seg));
                } else {
                    let line = pos.line - end.line + replacement_end.line;
                    moved.push((Position::new(line, pos.column), *seg));
                }
            }
        }

        let line_count = if self.lines.is_empty() {
            0
        } else {
            let removed = end.line - start.line;
            let added = replacement_end.line - start.line;
            (self.lines.len() as i64 - removed as i64 + added as i64).max(1) as usize
        };
        let mut lines: Vec<Vec<Segment>> = vec![Vec::new(); line_count];
        for (pos, seg) in moved {
            let idx = pos.line as usize;
            if idx >= lines.len() {
                lines.resize(idx + 1, Vec::new());
            }
            lines[idx].push(Segment {
                generated_column: pos.column,
                ..seg
            });
        }
        for line in &mut lines {
            line.sort_by_key(|s| s.generated_column);
            line.dedup_by_key(|s| s.generated_column);
        }
        self.lines = lines;
    }
}
