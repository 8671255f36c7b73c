//! Working out what the cursor is editing.
//!
//! The text around the cursor is usually incomplete, so contexts are found
//! by substituting a placeholder for the partial token, reparsing, and
//! looking up where the placeholder landed in the typed tree.

use serde::Serialize;

use crate::languages::Language;
use crate::providers::Providers;
use crate::reconcile::Analysis;
use crate::yaml::{NodeId, NodeKind};

pub const PLACEHOLDER: &str = "__placeholder__";

/// How far a context is from the cursor's own indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Exact,
    Nested,
    Dedented,
}

impl Tier {
    pub fn marker(self) -> &'static str {
        match self {
            Tier::Exact => "",
            Tier::Nested => "→ ",
            Tier::Dedented => "← ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A key, possibly partially typed.
    Key,
    /// The value after `key: `.
    Value { start: usize },
    /// After `- ` in a sequence: a key of a new mapping item or a scalar item.
    Item,
}

/// The line under the cursor, split into its parts.
#[derive(Debug, Clone)]
pub struct Cursor<'t> {
    pub text: &'t str,
    pub offset: usize,
    pub line_start: usize,
    /// Column where a key on this line starts, after any dashes.
    pub key_col: usize,
    pub dash: bool,
    pub token_start: usize,
    pub token_end: usize,
    pub slot: Slot,
}

impl<'t> Cursor<'t> {
    pub fn locate(text: &'t str, offset: usize) -> Option<Self> {
        let offset = offset.min(text.len());
        if !text.is_char_boundary(offset) {
            return None;
        }
        let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
        let before = &text[line_start..offset];
        let indent = before.len() - before.trim_start_matches(' ').len();
        let mut rest = &before[indent..];
        let mut key_col = indent;
        let mut dash = false;
        while let Some(stripped) = rest.strip_prefix("- ") {
            let skipped = rest.len() - stripped.trim_start_matches(' ').len();
            key_col += skipped;
            rest = stripped.trim_start_matches(' ');
            dash = true;
        }
        if rest.starts_with('#') || rest == "-" {
            return None;
        }
        let line_end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);

        if let Some(colon) = rest.find(": ") {
            let key = &rest[..colon];
            if key.is_empty() || key.contains(['{', '[']) {
                return None;
            }
            let after = &rest[colon + 1..];
            let value_col = key_col + colon + 1 + (after.len() - after.trim_start().len());
            let start = line_start + value_col;
            if start > offset {
                return None;
            }
            let token_end = text[offset..line_end]
                .find(char::is_whitespace)
                .map_or(line_end, |i| offset + i);
            return Some(Self {
                text,
                offset,
                line_start,
                key_col,
                dash,
                token_start: start,
                token_end,
                slot: Slot::Value { start },
            });
        }
        if rest.contains([':', ' ', '\t', '{', '[', '"', '\'']) {
            return None;
        }
        let token_end = text[offset..line_end]
            .find(|c: char| c.is_whitespace() || c == ':')
            .map_or(line_end, |i| offset + i);
        Some(Self {
            text,
            offset,
            line_start,
            key_col,
            dash,
            token_start: line_start + key_col,
            token_end,
            slot: if dash { Slot::Item } else { Slot::Key },
        })
    }

    /// What the user has typed of the token so far.
    pub fn partial(&self) -> &'t str {
        &self.text[self.token_start..self.offset]
    }

    /// The document with the cursor token replaced by `replacement`, which
    /// is written at `col` when given.
    pub fn repaired(&self, replacement: &str, col: Option<usize>) -> String {
        let mut out = String::with_capacity(self.text.len() + replacement.len() + 8);
        out.push_str(&self.text[..self.line_start]);
        match col {
            Some(col) => out.push_str(&" ".repeat(col)),
            None => out.push_str(&self.text[self.line_start..self.token_start]),
        }
        out.push_str(replacement);
        out.push_str(&self.text[self.token_end..]);
        out
    }

    /// Indentation of the next line with content after the cursor's line.
    pub fn next_indent(&self) -> Option<usize> {
        let line_end = self.text[self.offset..]
            .find('\n')
            .map(|i| self.offset + i + 1)?;
        self.text[line_end..]
            .lines()
            .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .map(|l| l.len() - l.trim_start_matches(' ').len())
    }

    /// Key column of the previous content line when it ends in `key:`
    /// with no value.
    pub fn open_key_above(&self) -> Option<usize> {
        let above = &self.text[..self.line_start];
        let line = above
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))?;
        let content = line.split(" #").next().unwrap_or(line).trim_end();
        if !content.ends_with(':') {
            return None;
        }
        let indent = line.len() - line.trim_start_matches(' ').len();
        let mut col = indent;
        let mut rest = &line[indent..];
        while let Some(stripped) = rest.strip_prefix("- ") {
            col += rest.len() - stripped.trim_start_matches(' ').len();
            rest = stripped.trim_start_matches(' ');
        }
        Some(col)
    }
}

/// A mapping found at the placeholder, with the analysis it came from.
pub struct KeyContext {
    pub tier: Tier,
    pub col: usize,
    pub analysis: Analysis,
    pub map: NodeId,
    pub placeholder: NodeId,
}

impl KeyContext {
    /// Keys already present in the mapping, merges applied.
    pub fn present(&self) -> Vec<&str> {
        let ast = &self.analysis.ast;
        ast.entries(self.map)
            .iter()
            .map(|e| ast.key_text(e.key))
            .filter(|k| *k != PLACEHOLDER)
            .collect()
    }
}

fn find_placeholder(analysis: &Analysis, as_key: bool) -> Option<NodeId> {
    let ast = &analysis.ast;
    (0..ast.len()).map(|i| NodeId(i as u32)).find(|id| {
        matches!(&ast.node(*id).kind, NodeKind::Scalar { value, .. } if value == PLACEHOLDER)
            && (ast.entry_of_key(*id).is_some() == as_key)
    })
}

pub fn key_context(
    language: &Language,
    cursor: &Cursor<'_>,
    providers: &Providers,
    tier: Tier,
    col: Option<usize>,
) -> Option<KeyContext> {
    let repaired = cursor.repaired(&format!("{PLACEHOLDER}:"), col);
    let analysis = Analysis::new(language, &repaired, providers, false);
    let placeholder = find_placeholder(&analysis, true)?;
    let map = analysis.ast.node(placeholder).parent?;
    Some(KeyContext {
        tier,
        col: col.unwrap_or(cursor.key_col),
        analysis,
        map,
        placeholder,
    })
}

/// A scalar position found at the placeholder.
pub struct ValueContext {
    pub analysis: Analysis,
    pub node: NodeId,
}

pub fn value_context(language: &Language, cursor: &Cursor<'_>, providers: &Providers) -> Option<ValueContext> {
    let repaired = cursor.repaired(PLACEHOLDER, None);
    let analysis = Analysis::new(language, &repaired, providers, false);
    let node = find_placeholder(&analysis, false)?;
    Some(ValueContext { analysis, node })
}

/// Every context worth proposing for at a key position: the one the
/// indentation implies, the value of an open key above, and the enclosing
/// mappings further left.
pub fn key_contexts(language: &Language, cursor: &Cursor<'_>, providers: &Providers) -> Vec<KeyContext> {
    let mut contexts = Vec::new();
    let Some(exact) = key_context(language, cursor, providers, Tier::Exact, None) else {
        return contexts;
    };
    if cursor.dash {
        contexts.push(exact);
        return contexts;
    }

    if let Some(open) = cursor.open_key_above()
        && cursor.key_col <= open
        && let Some(nested) = key_context(language, cursor, providers, Tier::Nested, Some(open + 2))
    {
        contexts.push(nested);
    }

    let ast = &exact.analysis.ast;
    let next_indent = cursor.next_indent();
    let mut columns = Vec::new();
    let mut current = ast.node(exact.map).parent;
    while let Some(id) = current {
        if ast.is_mapping(id) && !ast.node(id).flow {
            let col = ast.column(ast.node(id).span.start);
            let closes_content = next_indent.is_some_and(|next| next > col);
            if col < cursor.key_col && !columns.contains(&col) && !closes_content {
                columns.push(col);
            }
        }
        current = ast.node(id).parent;
    }
    for col in columns {
        if let Some(dedented) = key_context(language, cursor, providers, Tier::Dedented, Some(col)) {
            contexts.push(dedented);
        }
    }
    contexts.insert(0, exact);
    contexts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_key_and_value() {
        let text = "resources:\n- name: foo\n  ty";
        let cursor = Cursor::locate(text, text.len()).unwrap();
        assert_eq!(cursor.slot, Slot::Key);
        assert_eq!(cursor.partial(), "ty");
        assert_eq!(cursor.key_col, 2);

        let text = "jobs:\n- name: a\n  plan:\n  - get: re";
        let cursor = Cursor::locate(text, text.len()).unwrap();
        assert!(matches!(cursor.slot, Slot::Value { .. }));
        assert_eq!(cursor.partial(), "re");
    }

    #[test]
    fn test_locate_item() {
        let text = "resources:\n- na";
        let cursor = Cursor::locate(text, text.len()).unwrap();
        assert_eq!(cursor.slot, Slot::Item);
        assert_eq!(cursor.key_col, 2);
        assert!(cursor.dash);
    }

    #[test]
    fn test_repaired_text() {
        let text = "a:\n  b\nc: 1";
        let cursor = Cursor::locate(text, 6).unwrap();
        assert_eq!(cursor.repaired("__placeholder__:", None), "a:\n  __placeholder__:\nc: 1");
        assert_eq!(cursor.repaired("x:", Some(0)), "a:\nx:\nc: 1");
    }

    #[test]
    fn test_open_key_above() {
        let text = "jobs:\n- name: a\n  plan:\n  ";
        let cursor = Cursor::locate(text, text.len()).unwrap();
        assert_eq!(cursor.open_key_above(), Some(2));
    }
}
