use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

use crate::engine::Engine;
use crate::lsp::document::Document;

/// Provide hover information for a position in a document
pub fn provide_hover(engine: &Engine, doc: &Document, position: Position) -> Option<Hover> {
    let offset = doc.lines.offset(position);
    let hover = engine.hover(doc.language, &doc.content, offset)?;
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: hover.contents,
        }),
        range: Some(doc.lines.range(hover.span)),
    })
}
