//! YAML document model used by every analysis pass.
pub mod line_index;
pub mod node;
pub mod parser;

pub use line_index::LineIndex;
pub use node::{
    Anchor, Ast, EffectiveEntry, Entry, MERGE_KEY, Node, NodeId, NodeKind, ScalarStyle, SeqItem,
    Span, SyntaxError, SyntaxErrorKind,
};
