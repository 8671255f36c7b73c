use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemTag, CompletionResponse, CompletionTextEdit,
    Documentation, InsertTextFormat, MarkupContent, MarkupKind, Position, TextEdit,
};

use crate::assist::{Proposal, ProposalKind, Tier};
use crate::engine::Engine;
use crate::lsp::document::Document;
use crate::yaml::LineIndex;

/// Provide code completion for a position in a document
pub fn provide_completion(engine: &Engine, doc: &Document, position: Position) -> Option<CompletionResponse> {
    let offset = doc.lines.offset(position);
    let proposals = engine.complete(doc.language, &doc.content, offset);
    if proposals.is_empty() {
        return None;
    }
    let items = proposals
        .iter()
        .enumerate()
        .map(|(rank, proposal)| proposal_to_item(proposal, rank, &doc.lines))
        .collect();
    Some(CompletionResponse::Array(items))
}

fn kind(kind: ProposalKind) -> CompletionItemKind {
    match kind {
        ProposalKind::Property => CompletionItemKind::PROPERTY,
        ProposalKind::Value => CompletionItemKind::VALUE,
        ProposalKind::Reference => CompletionItemKind::REFERENCE,
        ProposalKind::Snippet => CompletionItemKind::SNIPPET,
        ProposalKind::Info => CompletionItemKind::TEXT,
    }
}

pub fn proposal_to_item(proposal: &Proposal, rank: usize, lines: &LineIndex) -> CompletionItem {
    let documentation = proposal.documentation.as_ref().map(|text| {
        Documentation::MarkupContent(MarkupContent {
            kind: MarkupKind::Markdown,
            value: text.clone(),
        })
    });
    // Nested and dedented proposals rewrite the line from its start, so the
    // editor filters them against the indented text.
    let filter_text = (proposal.tier != Tier::Exact).then(|| proposal.text.clone());

    CompletionItem {
        label: proposal.label.clone(),
        kind: Some(kind(proposal.kind)),
        detail: proposal.detail.clone(),
        documentation,
        tags: proposal.deprecated.then(|| vec![CompletionItemTag::DEPRECATED]),
        sort_text: Some(format!("{rank:05}")),
        filter_text,
        insert_text_format: Some(if proposal.snippet {
            InsertTextFormat::SNIPPET
        } else {
            InsertTextFormat::PLAIN_TEXT
        }),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit {
            range: lines.range(proposal.span),
            new_text: proposal.text.clone(),
        })),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageId;
    use tower_lsp::lsp_types::Url;

    fn document(text: &str) -> Document {
        Document {
            uri: Url::parse("file:///ci/pipeline.yml").unwrap(),
            version: 1,
            language: LanguageId::Pipeline,
            content: text.to_string(),
            lines: LineIndex::new(text),
            generation: 1,
        }
    }

    #[test]
    fn test_items_keep_engine_order() {
        let doc = document("resources:\n- name: repo\n  ty\n");
        let Some(CompletionResponse::Array(items)) =
            provide_completion(&Engine::default(), &doc, Position::new(2, 4))
        else {
            panic!("expected completion items");
        };
        let type_item = items.iter().find(|i| i.label == "type").unwrap();
        assert_eq!(type_item.kind, Some(CompletionItemKind::PROPERTY));
        let Some(CompletionTextEdit::Edit(edit)) = &type_item.text_edit else {
            panic!("expected a text edit");
        };
        assert_eq!(edit.range.start, Position::new(2, 2));
        assert_eq!(edit.range.end, Position::new(2, 4));
        let mut sorted = items.iter().map(|i| i.sort_text.clone()).collect::<Vec<_>>();
        sorted.sort();
        assert_eq!(sorted, items.iter().map(|i| i.sort_text.clone()).collect::<Vec<_>>());
    }
}
