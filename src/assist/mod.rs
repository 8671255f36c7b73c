//! Content assist: completion, hover, definitions and the outline.
pub mod context;
pub mod navigation;
pub mod snippet;

use serde::Serialize;

use crate::languages::Language;
use crate::providers::Providers;
use crate::schema::value::is_subsequence;
use crate::schema::{Property, ScalarType, Schema, TypeId, TypeKind, ValueContext as ProviderContext};
use crate::yaml::{NodeId, Span};
use context::{Cursor, KeyContext, PLACEHOLDER, Slot, key_context, key_contexts, value_context};
use snippet::{Snippets, indent};

pub use context::Tier;
pub use navigation::{Hover, Symbol, definition, hover, symbols};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalKind {
    Property,
    Value,
    Reference,
    Snippet,
    /// Carries a message instead of an edit.
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub label: String,
    /// Replaces `span` in the document.
    pub text: String,
    pub span: Span,
    /// `text` contains `$n` tab stops.
    pub snippet: bool,
    pub kind: ProposalKind,
    pub tier: Tier,
    pub deprecated: bool,
    pub detail: Option<String>,
    pub documentation: Option<String>,
}

impl Proposal {
    fn new(label: String, text: String, span: Span, kind: ProposalKind) -> Self {
        Self {
            label,
            text,
            span,
            snippet: false,
            kind,
            tier: Tier::Exact,
            deprecated: false,
            detail: None,
            documentation: None,
        }
    }
}

pub fn complete(language: &Language, text: &str, offset: usize, providers: &Providers) -> Vec<Proposal> {
    let Some(cursor) = Cursor::locate(text, offset) else {
        return Vec::new();
    };
    let schema = &language.schema;
    let mut proposals = Vec::new();
    match cursor.slot {
        Slot::Key => {
            for context in key_contexts(language, &cursor, providers) {
                property_proposals(schema, &cursor, &context, &mut proposals);
                if context.tier == Tier::Exact {
                    entity_snippets(schema, &cursor, &context, &mut proposals);
                }
            }
        }
        Slot::Item => {
            if let Some(context) = key_context(language, &cursor, providers, Tier::Exact, None) {
                property_proposals(schema, &cursor, &context, &mut proposals);
                item_snippet(schema, &cursor, &context, &mut proposals);
            }
            value_proposals(language, &cursor, providers, &mut proposals);
        }
        Slot::Value { .. } => value_proposals(language, &cursor, providers, &mut proposals),
    }
    proposals.sort_by(|a, b| {
        (a.deprecated, a.tier, &a.label).cmp(&(b.deprecated, b.tier, &b.label))
    });
    tracing::debug!(offset, count = proposals.len(), "completion");
    proposals
}

/// Replacement range and leading text for a proposal in `context`.
fn target(cursor: &Cursor<'_>, context: &KeyContext) -> (Span, String) {
    match context.tier {
        Tier::Exact => (Span::new(cursor.token_start, cursor.token_end), String::new()),
        _ => (Span::new(cursor.line_start, cursor.token_end), indent(context.col)),
    }
}

fn property_proposals(schema: &Schema, cursor: &Cursor<'_>, context: &KeyContext, out: &mut Vec<Proposal>) {
    let Some(ty) = context.analysis.tree.type_of(context.map) else {
        return;
    };
    let Some(bean) = schema.bean(ty) else {
        return;
    };
    let present = context.present();
    let partial = cursor.partial();
    let missing: Vec<&Property> = bean
        .properties
        .iter()
        .filter(|p| p.is_required() && !present.contains(&p.name.as_str()))
        .collect();
    let (span, lead) = target(cursor, context);
    let col = context.col;

    for property in &bean.properties {
        if present.contains(&property.name.as_str()) || !is_subsequence(partial, &property.name) {
            continue;
        }
        let mut snippets = Snippets::with_tab_stops(schema);
        let mut text = format!("{lead}{}", snippets.property(property, col));
        if property.is_required() {
            for sibling in missing.iter().filter(|s| s.name != property.name) {
                text.push('\n');
                text.push_str(&indent(col));
                text.push_str(&snippets.property(sibling, col));
            }
        }
        let mut proposal = Proposal::new(
            format!("{}{}", context.tier.marker(), property.name),
            text,
            span,
            ProposalKind::Property,
        );
        proposal.snippet = snippets.uses_tab_stops();
        proposal.tier = context.tier;
        proposal.deprecated = property.deprecated;
        proposal.detail = Some(schema.type_name(property.ty).to_string());
        proposal.documentation = property.description.clone();
        out.push(proposal);
    }
}

/// `- Resource Snippet` after a key whose sequence continues at the
/// cursor's column.
fn entity_snippets(schema: &Schema, cursor: &Cursor<'_>, context: &KeyContext, out: &mut Vec<Proposal>) {
    let ast = &context.analysis.ast;
    let entries = ast.explicit_entries(context.map);
    let Some(position) = entries.iter().position(|e| e.key == context.placeholder) else {
        return;
    };
    let Some(previous) = position.checked_sub(1).map(|i| entries[i]) else {
        return;
    };
    let value = ast.resolve(previous.value);
    let Some(first) = ast.items(value).first() else {
        return;
    };
    let Some(dash) = first.dash else {
        return;
    };
    if ast.column(dash.start) != cursor.key_col {
        return;
    }
    let Some(TypeKind::Seq(element)) = context.analysis.tree.type_of(previous.value).map(|t| schema.kind(t)) else {
        return;
    };
    let label = format!("- {} Snippet", schema.type_name(*element));
    if !is_subsequence(cursor.partial(), &label) {
        return;
    }
    let mut snippets = Snippets::with_tab_stops(schema);
    let body = snippets.item_body(*element, cursor.key_col, 0);
    let mut proposal = Proposal::new(
        label,
        format!("- {body}"),
        Span::new(cursor.token_start, cursor.token_end),
        ProposalKind::Snippet,
    );
    proposal.snippet = snippets.uses_tab_stops();
    out.push(proposal);
}

/// Skeleton of a whole item after a fresh `- `.
fn item_snippet(schema: &Schema, cursor: &Cursor<'_>, context: &KeyContext, out: &mut Vec<Proposal>) {
    if !context.present().is_empty() {
        return;
    }
    let Some(ty) = context.analysis.tree.type_of(context.map) else {
        return;
    };
    if schema.bean(ty).is_none_or(|b| !b.properties.iter().any(Property::is_required)) {
        return;
    }
    let label = format!("{} Snippet", schema.type_name(ty));
    if !is_subsequence(cursor.partial(), &label) {
        return;
    }
    let dash_col = cursor.key_col.saturating_sub(2);
    let mut snippets = Snippets::with_tab_stops(schema);
    let body = snippets.item_body(ty, dash_col, 0);
    let mut proposal = Proposal::new(
        label,
        body,
        Span::new(cursor.token_start, cursor.token_end),
        ProposalKind::Snippet,
    );
    proposal.snippet = snippets.uses_tab_stops();
    out.push(proposal);
}

/// Scalar alternatives of a type.
fn scalars(schema: &Schema, ty: TypeId) -> Vec<&ScalarType> {
    schema
        .alternatives(ty)
        .into_iter()
        .filter_map(|alt| schema.scalar(alt))
        .collect()
}

fn value_proposals(language: &Language, cursor: &Cursor<'_>, providers: &Providers, out: &mut Vec<Proposal>) {
    let schema = &language.schema;
    let Some(context) = value_context(language, cursor, providers) else {
        return;
    };
    let tree = &context.analysis.tree;
    let Some(ty) = tree.type_of(context.node).or_else(|| tree.declared_type_of(context.node)) else {
        return;
    };
    let partial = cursor.partial();
    let span = Span::new(cursor.token_start, cursor.token_end);
    let before = out.len();

    for scalar in scalars(schema, ty) {
        for value in scalar.values() {
            if is_subsequence(partial, &value) {
                out.push(Proposal::new(value.clone(), value, span, ProposalKind::Value));
            }
        }
        if let Some(spec) = scalar.reference {
            let excluded = enclosing_names(&context.analysis, context.node, spec.kind);
            let index = &context.analysis.index;
            let mut names: Vec<String> = index
                .names(spec.kind)
                .into_iter()
                .map(str::to_string)
                .collect();
            names.extend(schema.entity(spec.kind).builtins.iter().cloned());
            names.sort();
            names.dedup();
            for name in names {
                if name == PLACEHOLDER || excluded.contains(&name) || !is_subsequence(partial, &name) {
                    continue;
                }
                let mut proposal = Proposal::new(name.clone(), name, span, ProposalKind::Reference);
                proposal.detail = Some(schema.entity(spec.kind).label.clone());
                out.push(proposal);
            }
        }
        if let Some(completer) = &scalar.completer {
            let ctx = ProviderContext { providers };
            match completer.complete(partial, &ctx) {
                Ok(values) => out.extend(values.into_iter().map(|v| {
                    Proposal::new(v.label, v.text, span, ProposalKind::Value)
                })),
                Err(message) => {
                    tracing::debug!(error = %message, "value completion failed");
                    let unchanged = cursor.text[cursor.token_start..cursor.token_end].to_string();
                    out.push(Proposal::new(message, unchanged, span, ProposalKind::Info));
                }
            }
        }
    }
    // Values proposed through several alternatives appear once.
    let mut seen = std::collections::HashSet::new();
    let mut i = before;
    while i < out.len() {
        if seen.insert(out[i].label.clone()) {
            i += 1;
        } else {
            out.remove(i);
        }
    }
}

/// Names of entities of `kind` whose declaring mapping encloses `node`.
fn enclosing_names(analysis: &crate::reconcile::Analysis, node: NodeId, kind: crate::schema::EntityKind) -> Vec<String> {
    let ast = &analysis.ast;
    let mut names = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        names.extend(
            analysis
                .index
                .declarations_of(kind)
                .filter(|d| d.owner == id)
                .map(|d| d.name.clone()),
        );
        current = ast.node(id).parent;
    }
    names
}
