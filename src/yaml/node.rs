use std::collections::HashSet;

use serde::Serialize;

/// Index of a node inside an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Byte range in the source text. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Cursor containment: both ends inclusive.
    pub fn touches(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn cover(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Scalar { value: String, style: ScalarStyle },
    Mapping(Vec<Entry>),
    Sequence(Vec<SeqItem>),
    /// `*name`. The target is the most recent anchor of that name defined
    /// before the alias, or `None` when undefined.
    Alias {
        name: String,
        target: Option<NodeId>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub key: NodeId,
    pub value: NodeId,
}

#[derive(Debug, Clone, Copy)]
pub struct SeqItem {
    /// The `-` indicator. Absent for flow sequence items.
    pub dash: Option<Span>,
    pub value: NodeId,
}

#[derive(Debug, Clone)]
pub struct Anchor {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub anchor: Option<Anchor>,
    pub tag: Option<String>,
    pub flow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    ExpectedBlockEnd,
    MissingColon,
    MappingNotAllowed,
    Unterminated,
    UndefinedAlias,
    MalformedMerge,
}

#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub span: Span,
}

/// A mapping entry after merge keys are applied.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveEntry {
    pub key: NodeId,
    pub value: NodeId,
    /// Entry contributed by a `<<` merge source rather than written in place.
    pub merged: bool,
}

pub const MERGE_KEY: &str = "<<";

/// Parsed YAML stream. Nodes live in one arena; aliases point at their
/// anchor's node instead of copying it.
#[derive(Debug, Clone)]
pub struct Ast {
    pub(crate) source: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) documents: Vec<NodeId>,
    pub(crate) anchors: Vec<(String, NodeId)>,
    pub(crate) errors: Vec<SyntaxError>,
}

impl Ast {
    pub fn parse(text: &str) -> Ast {
        super::parser::parse(text)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.documents.first().copied()
    }

    pub fn documents(&self) -> &[NodeId] {
        &self.documents
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    pub fn text(&self, span: Span) -> &str {
        self.source.get(span.start..span.end).unwrap_or("")
    }

    /// Latest definition of an anchor name in the stream.
    pub fn anchor(&self, name: &str) -> Option<NodeId> {
        self.anchors
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    pub fn anchors(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.anchors.iter().map(|(n, id)| (n.as_str(), *id))
    }

    /// Follows alias chains. Undefined aliases resolve to themselves.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        let mut current = id;
        for _ in 0..self.nodes.len() {
            match &self.node(current).kind {
                NodeKind::Alias {
                    target: Some(target),
                    ..
                } => current = *target,
                _ => return current,
            }
        }
        current
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(self.resolve(id)).kind
    }

    pub fn scalar(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Scalar { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Scalar {
                value,
                style: ScalarStyle::Plain,
            } => matches!(value.as_str(), "" | "~" | "null" | "Null" | "NULL"),
            _ => false,
        }
    }

    pub fn is_mapping(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Mapping(_))
    }

    pub fn is_sequence(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Sequence(_))
    }

    pub fn is_alias(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Alias { .. })
    }

    /// Entries as written, merge keys included, duplicates preserved.
    pub fn explicit_entries(&self, id: NodeId) -> &[Entry] {
        match self.kind(id) {
            NodeKind::Mapping(entries) => entries,
            _ => &[],
        }
    }

    pub fn items(&self, id: NodeId) -> &[SeqItem] {
        match self.kind(id) {
            NodeKind::Sequence(items) => items,
            _ => &[],
        }
    }

    pub fn key_text(&self, key: NodeId) -> &str {
        self.scalar(key).unwrap_or("")
    }

    /// Mappings pulled in by the `<<` keys of a mapping, in priority order.
    pub fn merge_sources(&self, id: NodeId) -> Vec<NodeId> {
        let mut sources = Vec::new();
        for entry in self.explicit_entries(id) {
            if self.key_text(entry.key) != MERGE_KEY {
                continue;
            }
            let value = self.resolve(entry.value);
            match &self.node(value).kind {
                NodeKind::Mapping(_) => sources.push(value),
                NodeKind::Sequence(items) => {
                    for item in items {
                        let item = self.resolve(item.value);
                        if self.is_mapping(item) {
                            sources.push(item);
                        }
                    }
                }
                _ => {}
            }
        }
        sources
    }

    /// Entries with merge keys applied. Explicit keys win over merged ones;
    /// earlier merge sources win over later ones.
    pub fn entries(&self, id: NodeId) -> Vec<EffectiveEntry> {
        let mut visited = HashSet::new();
        self.collect_entries(self.resolve(id), false, &mut visited)
    }

    fn collect_entries(
        &self,
        id: NodeId,
        merged: bool,
        visited: &mut HashSet<NodeId>,
    ) -> Vec<EffectiveEntry> {
        if !visited.insert(id) {
            return Vec::new();
        }
        let mut result: Vec<EffectiveEntry> = self
            .explicit_entries(id)
            .iter()
            .filter(|e| self.key_text(e.key) != MERGE_KEY)
            .map(|e| EffectiveEntry {
                key: e.key,
                value: e.value,
                merged,
            })
            .collect();
        for source in self.merge_sources(id) {
            for entry in self.collect_entries(source, true, visited) {
                let key = self.key_text(entry.key);
                if !result.iter().any(|e| self.key_text(e.key) == key) {
                    result.push(entry);
                }
            }
        }
        result
    }

    /// Value of a key in a mapping, merges applied.
    pub fn get(&self, map: NodeId, key: &str) -> Option<NodeId> {
        self.entries(map)
            .into_iter()
            .find(|e| self.key_text(e.key) == key)
            .map(|e| e.value)
    }

    pub fn get_str(&self, map: NodeId, key: &str) -> Option<&str> {
        self.get(map, key).and_then(|v| self.scalar(v))
    }

    /// Innermost-last chain of nodes whose span touches `offset`, following
    /// the written tree (aliases are not entered).
    pub fn path_at(&self, offset: usize) -> Vec<NodeId> {
        let mut path = Vec::new();
        let Some(root) = self
            .documents
            .iter()
            .copied()
            .find(|d| self.node(*d).span.touches(offset))
        else {
            return path;
        };
        let mut current = Some(root);
        while let Some(id) = current {
            path.push(id);
            current = None;
            match &self.node(id).kind {
                NodeKind::Mapping(entries) => {
                    for entry in entries {
                        if self.node(entry.key).span.touches(offset) {
                            current = Some(entry.key);
                            break;
                        }
                        if self.node(entry.value).span.touches(offset) {
                            current = Some(entry.value);
                            break;
                        }
                    }
                }
                NodeKind::Sequence(items) => {
                    current = items
                        .iter()
                        .find(|i| self.node(i.value).span.touches(offset))
                        .map(|i| i.value);
                }
                _ => {}
            }
        }
        path
    }

    /// The entry of `map` whose key node is `key`.
    pub fn entry_of_key(&self, key: NodeId) -> Option<Entry> {
        let parent = self.node(key).parent?;
        self.explicit_entries(parent)
            .iter()
            .find(|e| e.key == key)
            .copied()
    }

    /// The entry of the parent mapping whose value is `value`.
    pub fn entry_of_value(&self, value: NodeId) -> Option<Entry> {
        let parent = self.node(value).parent?;
        self.explicit_entries(parent)
            .iter()
            .find(|e| e.value == value)
            .copied()
    }

    /// The sequence item whose value is `value`.
    pub fn item_of_value(&self, value: NodeId) -> Option<SeqItem> {
        let parent = self.node(value).parent?;
        self.items(parent).iter().find(|i| i.value == value).copied()
    }

    /// Line-start column of the line containing `offset`, in bytes.
    pub fn column(&self, offset: usize) -> usize {
        let line_start = self.source[..offset.min(self.source.len())]
            .rfind('\n')
            .map_or(0, |i| i + 1);
        offset - line_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_explicit_keys_win() {
        let ast = Ast::parse("base: &b\n  a: 1\n  b: 2\nuse:\n  <<: *b\n  b: 3\n");
        let root = ast.root().unwrap();
        let used = ast.get(root, "use").unwrap();
        assert_eq!(ast.get_str(used, "a"), Some("1"));
        assert_eq!(ast.get_str(used, "b"), Some("3"));
        let keys: Vec<_> = ast
            .entries(used)
            .iter()
            .map(|e| ast.key_text(e.key).to_string())
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_earlier_merge_source_wins() {
        let ast = Ast::parse("x: &x\n  a: 1\ny: &y\n  a: 2\n  c: 3\nz:\n  <<: [*x, *y]\n");
        let root = ast.root().unwrap();
        let z = ast.get(root, "z").unwrap();
        assert_eq!(ast.get_str(z, "a"), Some("1"));
        assert_eq!(ast.get_str(z, "c"), Some("3"));
    }

    #[test]
    fn test_alias_shares_anchor_node() {
        let ast = Ast::parse("a: &anchor\n  k: v\nb: *anchor\n");
        let root = ast.root().unwrap();
        let a = ast.get(root, "a").unwrap();
        let b = ast.get(root, "b").unwrap();
        assert_ne!(a, b);
        assert_eq!(ast.resolve(b), a);
    }

    #[test]
    fn test_path_at_finds_innermost() {
        let text = "jobs:\n- name: foo\n";
        let ast = Ast::parse(text);
        let offset = text.find("foo").unwrap() + 1;
        let path = ast.path_at(offset);
        let last = *path.last().unwrap();
        assert_eq!(ast.scalar(last), Some("foo"));
    }
}
