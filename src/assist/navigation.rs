//! Hover, go-to-definition and the document outline.

use serde::Serialize;

use crate::languages::Language;
use crate::providers::Providers;
use crate::reconcile::Analysis;
use crate::yaml::{NodeKind, Span};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hover {
    /// Markdown.
    pub contents: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub name: String,
    pub detail: Option<String>,
    /// Whole construct.
    pub span: Span,
    /// The name.
    pub selection: Span,
    pub children: Vec<Symbol>,
}

pub fn hover(language: &Language, text: &str, offset: usize) -> Option<Hover> {
    let schema = &language.schema;
    let analysis = Analysis::new(language, text, &Providers::none(), false);
    let ast = &analysis.ast;
    let node = *ast.path_at(offset).last()?;

    let (key, span) = if ast.entry_of_key(node).is_some() {
        (node, ast.node(node).span)
    } else if let Some(entry) = ast.entry_of_value(node) {
        if let Some(reference) = analysis.index.reference_at(ast.resolve(node))
            && let Some(declaration) = analysis.index.resolve(reference.spec.kind, &reference.name)
        {
            let def = schema.entity(declaration.kind);
            let owner_type = analysis
                .tree
                .type_of(declaration.owner)
                .map(|t| schema.type_name(t).to_string())
                .unwrap_or_default();
            let mut contents = format!("**{}** `{}`", def.label, declaration.name);
            if let Some(kind) = ast.get_str(declaration.owner, "type") {
                contents.push_str(&format!("\n\ntype: `{kind}`"));
            } else if !owner_type.is_empty() {
                contents.push_str(&format!("\n\n{owner_type}"));
            }
            return Some(Hover {
                contents,
                span: ast.node(node).span,
            });
        }
        (entry.key, ast.node(node).span)
    } else {
        return None;
    };

    let property = analysis.tree.property_of_key(schema, key)?;
    let mut contents = format!("**{}**: `{}`", property.name, schema.type_name(property.ty));
    if let Some(description) = &property.description {
        contents.push_str("\n\n");
        contents.push_str(description);
    }
    if property.deprecated {
        match &property.replaced_by {
            Some(replacement) => contents.push_str(&format!("\n\n*Deprecated*: use `{replacement}` instead.")),
            None => contents.push_str("\n\n*Deprecated*."),
        }
    }
    Some(Hover { contents, span })
}

/// Where the alias or entity reference under the cursor is defined.
pub fn definition(language: &Language, text: &str, offset: usize) -> Option<Span> {
    let analysis = Analysis::new(language, text, &Providers::none(), false);
    let ast = &analysis.ast;
    let node = *ast.path_at(offset).last()?;
    if let NodeKind::Alias { target, .. } = &ast.node(node).kind {
        let target = (*target)?;
        let anchored = ast.node(target);
        return Some(anchored.anchor.as_ref().map_or(anchored.span, |a| a.span));
    }
    let reference = analysis.index.reference_at(node)?;
    let declaration = analysis.index.resolve(reference.spec.kind, &reference.name)?;
    Some(ast.node(declaration.node).span)
}

/// Declared entities grouped by section, in schema order.
pub fn symbols(language: &Language, text: &str) -> Vec<Symbol> {
    let schema = &language.schema;
    let analysis = Analysis::new(language, text, &Providers::none(), false);
    let ast = &analysis.ast;
    let mut sections = Vec::new();
    for (kind, def) in schema.entity_kinds() {
        let children: Vec<Symbol> = analysis
            .index
            .declarations_of(kind)
            .map(|d| Symbol {
                name: d.name.clone(),
                detail: ast.get_str(d.owner, "type").map(str::to_string),
                span: ast.node(d.owner).span,
                selection: ast.node(d.node).span,
                children: Vec::new(),
            })
            .collect();
        let Some(first) = children.first() else {
            continue;
        };
        let span = children.iter().fold(first.span, |acc, c| acc.cover(c.span));
        sections.push(Symbol {
            name: def.section.clone(),
            detail: None,
            span,
            selection: first.selection,
            children,
        });
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{LanguageId, language};

    const PIPELINE: &str = "\
resources:
- name: repo
  type: git
jobs:
- name: build
  plan:
  - get: repo
";

    #[test]
    fn test_definition_of_resource_reference() {
        let offset = PIPELINE.rfind("repo").unwrap() + 1;
        let span = definition(language(LanguageId::Pipeline), PIPELINE, offset).unwrap();
        assert_eq!(&PIPELINE[span.start..span.end], "repo");
        assert_eq!(span.start, PIPELINE.find("repo").unwrap());
    }

    #[test]
    fn test_hover_on_key() {
        let offset = PIPELINE.find("plan").unwrap() + 1;
        let hover = hover(language(LanguageId::Pipeline), PIPELINE, offset).unwrap();
        assert!(hover.contents.starts_with("**plan**"));
    }

    #[test]
    fn test_outline_sections() {
        let outline = symbols(language(LanguageId::Pipeline), PIPELINE);
        let names: Vec<&str> = outline.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Resources", "Jobs"]);
        assert_eq!(outline[0].children[0].name, "repo");
        assert_eq!(outline[0].children[0].detail.as_deref(), Some("git"));
    }
}
