//! Problems that come from the document shape: syntax, duplicate keys and
//! schema violations.

use std::collections::HashMap;

use super::problem::{Problem, ProblemCode, QuickFix, Severity, TextEdit};
use crate::assist::snippet::{Snippets, indent};
use crate::schema::{Schema, TypedTree, Violation};
use crate::yaml::{Ast, MERGE_KEY, NodeId, NodeKind, Span, SyntaxErrorKind};

pub fn syntax_problems(ast: &Ast) -> Vec<Problem> {
    ast.errors()
        .iter()
        .map(|error| {
            let code = match error.kind {
                SyntaxErrorKind::UndefinedAlias => ProblemCode::UndefinedAlias,
                SyntaxErrorKind::MalformedMerge => ProblemCode::MalformedMerge,
                _ => ProblemCode::SyntaxError,
            };
            Problem::error(code, error.message.clone(), error.span)
        })
        .collect()
}

/// Every occurrence of a key written twice in one mapping.
pub fn duplicate_keys(ast: &Ast) -> Vec<Problem> {
    let mut problems = Vec::new();
    for index in 0..ast.len() {
        let id = NodeId(index as u32);
        let NodeKind::Mapping(entries) = &ast.node(id).kind else {
            continue;
        };
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for entry in entries {
            *seen.entry(ast.key_text(entry.key)).or_default() += 1;
        }
        for entry in entries {
            let key = ast.key_text(entry.key);
            if key != MERGE_KEY && seen.get(key).copied().unwrap_or(0) > 1 {
                problems.push(Problem::error(
                    ProblemCode::DuplicateKey,
                    format!("Duplicate key '{key}'"),
                    ast.node(entry.key).span,
                ));
            }
        }
    }
    problems
}

/// Where problems about a whole mapping are shown: the key that owns it,
/// the dash of its sequence item, or the last character of the document.
pub fn anchor_span(ast: &Ast, node: NodeId) -> Span {
    if let Some(entry) = ast.entry_of_value(node) {
        return ast.node(entry.key).span;
    }
    if let Some(item) = ast.item_of_value(node) {
        return item.dash.unwrap_or(ast.node(node).span);
    }
    let source = ast.source();
    match source.char_indices().rev().find(|(_, c)| !c.is_whitespace()) {
        Some((i, c)) => Span::new(i, i + c.len_utf8()),
        None => Span::empty(0),
    }
}

fn names_message(names: &[String]) -> String {
    let mut sorted = names.to_vec();
    sorted.sort();
    if sorted.len() == 1 {
        format!("'{}' is required", sorted[0])
    } else {
        format!("[{}] are required", sorted.join(", "))
    }
}

/// Inserts missing properties on a new line after the mapping's last line.
fn missing_property_fix(ast: &Ast, schema: &Schema, map: NodeId, ty: crate::schema::TypeId, names: &[String]) -> Option<QuickFix> {
    let node = ast.node(map);
    if node.flow {
        return None;
    }
    let col = ast.column(node.span.start);
    let map_end = node.span.end;
    let mut snippets = Snippets::plain(schema);
    let lines: Vec<String> = names
        .iter()
        .filter_map(|name| schema.property(ty, name))
        .map(|p| format!("{}{}", indent(col), snippets.property(p, col)))
        .collect();
    if lines.is_empty() {
        return None;
    }
    let label = if names.len() == 1 {
        format!("Add property '{}'", names[0])
    } else {
        let mut sorted = names.to_vec();
        sorted.sort();
        format!("Add properties: [{}]", sorted.join(", "))
    };
    let body = lines.join("\n");
    Some(QuickFix::new(label, move |text: &str| {
        let from = map_end.min(text.len());
        match text[from..].find('\n') {
            Some(i) => vec![TextEdit::insert(from + i + 1, format!("{body}\n"))],
            None => vec![TextEdit::insert(text.len(), format!("\n{body}"))],
        }
    }))
}

/// Absolute span of a sub-range reported inside a scalar's value.
fn value_span(ast: &Ast, node: NodeId, range: Option<(usize, usize)>) -> Span {
    let span = ast.node(node).span;
    let Some((start, end)) = range else {
        return span;
    };
    let quoted = matches!(
        ast.source().as_bytes().get(span.start),
        Some(b'"') | Some(b'\'')
    );
    let base = span.start + usize::from(quoted);
    Span::new((base + start).min(span.end), (base + end).min(span.end))
}

pub fn violation_problems(ast: &Ast, schema: &Schema, tree: &TypedTree) -> Vec<Problem> {
    let mut problems = Vec::new();
    for violation in &tree.violations {
        match violation {
            Violation::Missing {
                node,
                map,
                ty,
                names,
                severity,
            } => {
                let mut problem = Problem::new(
                    ProblemCode::MissingProperty,
                    *severity,
                    names_message(names),
                    anchor_span(ast, *node),
                );
                // Aliased mappings are fixed at their anchor, not here.
                if node == map
                    && let Some(fix) = missing_property_fix(ast, schema, *map, *ty, names)
                {
                    problem = problem.with_fix(fix);
                }
                problems.push(problem);
            }
            Violation::Unknown { key, type_name } => problems.push(Problem::error(
                ProblemCode::UnknownProperty,
                format!("Unknown property '{}' for type '{type_name}'", ast.key_text(*key)),
                ast.node(*key).span,
            )),
            Violation::Deprecated {
                key,
                name,
                replacement,
            } => {
                let span = ast.node(*key).span;
                let problem = match replacement {
                    Some(replacement) => {
                        let new_name = replacement.clone();
                        Problem::warning(
                            ProblemCode::DeprecatedProperty,
                            format!("Deprecated: '{name}' is replaced by '{replacement}'"),
                            span,
                        )
                        .with_fix(QuickFix::new(
                            format!("Replace with '{replacement}'"),
                            move |_text: &str| vec![TextEdit::replace(span, new_name.clone())],
                        ))
                    }
                    None => Problem::warning(
                        ProblemCode::DeprecatedProperty,
                        format!("Deprecated property '{name}'"),
                        span,
                    ),
                };
                problems.push(problem);
            }
            Violation::Shape {
                node,
                expected,
                found,
            } => {
                let message = if expected.len() == 1 {
                    format!("Expecting a '{}' but found a '{found}'", expected[0])
                } else {
                    format!("Expecting one of [{}] but found a '{found}'", expected.join(", "))
                };
                problems.push(Problem::error(
                    ProblemCode::WrongShape,
                    message,
                    ast.node(*node).span,
                ));
            }
            Violation::Value { node, problem } => {
                let code = if problem.severity == Severity::Warning {
                    ProblemCode::UnknownRepository
                } else {
                    ProblemCode::InvalidValue
                };
                let span = value_span(ast, *node, problem.range);
                let span = if span.is_empty() {
                    anchor_span(ast, *node)
                } else {
                    span
                };
                problems.push(Problem::new(code, problem.severity, problem.message.clone(), span));
            }
            Violation::Constraint {
                node,
                keys,
                message,
                severity,
            } => {
                if keys.is_empty() {
                    problems.push(Problem::new(
                        ProblemCode::ConstraintViolation,
                        *severity,
                        message.clone(),
                        anchor_span(ast, *node),
                    ));
                }
                for key in keys {
                    problems.push(Problem::new(
                        ProblemCode::ConstraintViolation,
                        *severity,
                        message.clone(),
                        ast.node(*key).span,
                    ));
                }
            }
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_keys_flag_each_occurrence() {
        let ast = Ast::parse("resources: []\njobs: []\nresources: []\n");
        let problems = duplicate_keys(&ast);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.message == "Duplicate key 'resources'"));
        assert_ne!(problems[0].span, problems[1].span);
    }

    #[test]
    fn test_anchor_span_choices() {
        let text = "resources:\n- name: foo\nother: x";
        let ast = Ast::parse(text);
        let root = ast.root().unwrap();
        let resources = ast.get(root, "resources").unwrap();
        assert_eq!(ast.text(anchor_span(&ast, resources)), "resources");
        let item = ast.items(resources)[0].value;
        assert_eq!(ast.text(anchor_span(&ast, item)), "-");
        assert_eq!(ast.text(anchor_span(&ast, root)), "x");
    }
}
