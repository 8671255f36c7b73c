//! Cross-reference checks over the entity index.

use std::collections::HashMap;

use super::glob::SimpleGlob;
use super::problem::{Problem, ProblemCode, Severity};
use crate::index::EntityIndex;
use crate::schema::{EntityKind, Schema, TypedTree};
use crate::yaml::Ast;

pub struct RuleContext<'a> {
    pub ast: &'a Ast,
    pub schema: &'a Schema,
    pub tree: &'a TypedTree,
    pub index: &'a EntityIndex,
}

/// A whole-document check contributed by a language.
pub trait DocumentRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, ctx: &RuleContext<'_>, problems: &mut Vec<Problem>);
}

pub fn check_entities(ctx: &RuleContext<'_>) -> Vec<Problem> {
    let mut problems = Vec::new();
    for (kind, _) in ctx.schema.entity_kinds() {
        duplicate_names(ctx, kind, &mut problems);
        unused_entities(ctx, kind, &mut problems);
    }
    unresolved_references(ctx, &mut problems);
    problems
}

fn duplicate_names(ctx: &RuleContext<'_>, kind: EntityKind, problems: &mut Vec<Problem>) {
    let def = ctx.schema.entity(kind);
    if !def.unique {
        return;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for declaration in ctx.index.declarations_of(kind) {
        *counts.entry(declaration.name.as_str()).or_default() += 1;
    }
    for declaration in ctx.index.declarations_of(kind) {
        if counts[declaration.name.as_str()] > 1 {
            problems.push(Problem::error(
                ProblemCode::DuplicateName,
                format!("Duplicate {} name", def.noun),
                ctx.ast.node(declaration.node).span,
            ));
        }
    }
}

fn unused_entities(ctx: &RuleContext<'_>, kind: EntityKind, problems: &mut Vec<Problem>) {
    let def = ctx.schema.entity(kind);
    if !def.requires_usage {
        return;
    }
    for declaration in ctx.index.declarations_of(kind) {
        if def.builtins.contains(&declaration.name) {
            continue;
        }
        if ctx.index.usages(kind, &declaration.name).is_empty() {
            problems.push(Problem::warning(
                ProblemCode::UnusedEntity,
                format!("Unused '{}'", def.label),
                ctx.ast.node(declaration.node).span,
            ));
        }
    }
}

fn unresolved_references(ctx: &RuleContext<'_>, problems: &mut Vec<Problem>) {
    for reference in ctx.index.references() {
        let spec = reference.spec;
        if !spec.validate {
            continue;
        }
        let def = ctx.schema.entity(spec.kind);
        let span = ctx.ast.node(reference.node).span;
        if spec.glob {
            let Some(glob) = SimpleGlob::parse(&reference.name) else {
                continue;
            };
            if !glob.is_literal() {
                let names = ctx.index.names(spec.kind);
                if !names.iter().any(|n| glob.matches(n)) {
                    problems.push(Problem::error(
                        ProblemCode::UnmatchedPattern,
                        format!(
                            "'{}' does not match any existing {}",
                            reference.name,
                            def.label.to_lowercase()
                        ),
                        span,
                    ));
                }
                continue;
            }
        }
        if ctx.index.is_known(ctx.schema, spec.kind, &reference.name) {
            continue;
        }
        let names = ctx.index.names(spec.kind);
        let message = if names.is_empty() {
            format!("{} '{}' does not exist", def.label, reference.name)
        } else {
            format!(
                "{} '{}' does not exist. Existing {}: [{}]",
                def.label,
                reference.name,
                def.section.to_lowercase(),
                names.join(", ")
            )
        };
        problems.push(Problem::new(ProblemCode::UnresolvedReference, Severity::Error, message, span));
    }
}
