use tower_lsp::lsp_types::{DocumentSymbol, DocumentSymbolResponse, SymbolKind};

use crate::assist::Symbol;
use crate::engine::Engine;
use crate::lsp::document::Document;
use crate::yaml::LineIndex;

pub fn provide_symbols(engine: &Engine, doc: &Document) -> Option<DocumentSymbolResponse> {
    let outline = engine.symbols(doc.language, &doc.content);
    if outline.is_empty() {
        return None;
    }
    let sections = outline
        .into_iter()
        .map(|section| {
            let kind = entity_kind(&section.name);
            let mut symbol = to_document_symbol(&section, SymbolKind::NAMESPACE, &doc.lines);
            symbol.children = Some(
                section
                    .children
                    .iter()
                    .map(|child| to_document_symbol(child, kind, &doc.lines))
                    .collect(),
            );
            symbol
        })
        .collect();
    Some(DocumentSymbolResponse::Nested(sections))
}

fn entity_kind(section: &str) -> SymbolKind {
    match section {
        "Jobs" => SymbolKind::FUNCTION,
        "Resource Types" => SymbolKind::CLASS,
        "Groups" => SymbolKind::PACKAGE,
        _ => SymbolKind::OBJECT,
    }
}

#[allow(deprecated)]
fn to_document_symbol(symbol: &Symbol, kind: SymbolKind, lines: &LineIndex) -> DocumentSymbol {
    DocumentSymbol {
        name: symbol.name.clone(),
        detail: symbol.detail.clone(),
        kind,
        tags: None,
        deprecated: None,
        range: lines.range(symbol.span),
        selection_range: lines.range(symbol.selection),
        children: None,
    }
}
