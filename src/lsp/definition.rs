use tower_lsp::lsp_types::{GotoDefinitionResponse, Location, Position};

use crate::engine::Engine;
use crate::lsp::document::Document;

/// Provide go-to-definition for a position in a document
pub fn provide_definition(engine: &Engine, doc: &Document, position: Position) -> Option<GotoDefinitionResponse> {
    let offset = doc.lines.offset(position);
    let span = engine.definition(doc.language, &doc.content, offset)?;
    Some(GotoDefinitionResponse::Scalar(Location::new(
        doc.uri.clone(),
        doc.lines.range(span),
    )))
}
