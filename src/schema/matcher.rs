//! Lock-step walk of a document and its schema.
//!
//! The walk assigns a type to every reachable node, resolves unions with a
//! single forward scan, and records declarations, references and schema
//! violations. Nodes shared through anchors are walked once per type.

use std::collections::{HashMap, HashSet};

use super::{
    BeanType, Dispatch, EntityKind, RefSpec, Requirement, ScalarType, Schema, TypeId, TypeKind,
    ValueContext, ValueProblem, shape_name,
};
use crate::providers::Providers;
use crate::reconcile::Severity;
use crate::yaml::{Ast, NodeId, NodeKind};

const MAX_DEPTH: usize = 200;

#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: EntityKind,
    pub name: String,
    /// The scalar holding the name.
    pub node: NodeId,
    /// The mapping that declares the entity.
    pub owner: NodeId,
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub spec: RefSpec,
    pub name: String,
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub enum Violation {
    /// Required properties absent from a mapping. `node` is the mapping as
    /// written (possibly an alias), `map` the resolved mapping.
    Missing {
        node: NodeId,
        map: NodeId,
        ty: TypeId,
        names: Vec<String>,
        severity: Severity,
    },
    Unknown {
        key: NodeId,
        type_name: String,
    },
    Deprecated {
        key: NodeId,
        name: String,
        replacement: Option<String>,
    },
    Shape {
        node: NodeId,
        expected: Vec<String>,
        found: &'static str,
    },
    Value {
        node: NodeId,
        problem: ValueProblem,
    },
    Constraint {
        node: NodeId,
        keys: Vec<NodeId>,
        message: String,
        severity: Severity,
    },
}

/// Result of matching a document against a schema.
#[derive(Debug, Default)]
pub struct TypedTree {
    /// Type of each node after union dispatch.
    pub types: HashMap<NodeId, TypeId>,
    /// Type each node was declared with, before union dispatch.
    pub declared: HashMap<NodeId, TypeId>,
    /// Key node to (bean type, property index).
    pub keys: HashMap<NodeId, (TypeId, usize)>,
    pub declarations: Vec<Declaration>,
    pub references: Vec<Reference>,
    pub violations: Vec<Violation>,
}

impl TypedTree {
    pub fn type_of(&self, node: NodeId) -> Option<TypeId> {
        self.types.get(&node).copied()
    }

    pub fn declared_type_of(&self, node: NodeId) -> Option<TypeId> {
        self.declared.get(&node).copied()
    }

    pub fn property_of_key<'s>(&self, schema: &'s Schema, key: NodeId) -> Option<&'s super::Property> {
        let (ty, index) = self.keys.get(&key)?;
        schema.bean(*ty).and_then(|b| b.properties.get(*index))
    }

    pub fn reference_at(&self, node: NodeId) -> Option<&Reference> {
        self.references.iter().find(|r| r.node == node)
    }
}

pub struct WalkOptions<'a> {
    pub providers: &'a Providers,
    /// Run value grammars. Completion skips them.
    pub check_values: bool,
    /// Discriminator values that user definitions override.
    pub shadowed: &'a HashSet<String>,
}

/// `((var))` and legacy `{{var}}` interpolation.
pub fn is_placeholder(value: &str) -> bool {
    (value.contains("((") && value.contains("))")) || (value.contains("{{") && value.contains("}}"))
}

pub fn walk(ast: &Ast, schema: &Schema, options: &WalkOptions<'_>) -> TypedTree {
    let mut walker = Walker {
        ast,
        schema,
        options,
        tree: TypedTree::default(),
        visited: HashSet::new(),
    };
    for root in ast.documents() {
        walker.visit(*root, schema.root(), None, 0);
    }
    walker.tree
}

struct Walker<'a> {
    ast: &'a Ast,
    schema: &'a Schema,
    options: &'a WalkOptions<'a>,
    tree: TypedTree,
    visited: HashSet<(NodeId, TypeId)>,
}

fn found_shape(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Mapping(_) => "Map",
        NodeKind::Sequence(_) => "Sequence",
        _ => "Scalar",
    }
}

impl<'a> Walker<'a> {
    fn visit(&mut self, node: NodeId, ty: TypeId, parent_map: Option<NodeId>, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        let ast = self.ast;
        let schema = self.schema;
        let target = ast.resolve(node);
        if ast.is_alias(target) {
            return;
        }
        self.tree.declared.entry(node).or_insert(ty);
        let Some(ty) = self.select(node, ty, target, parent_map) else {
            return;
        };
        self.tree.types.entry(node).or_insert(ty);
        self.tree.types.entry(target).or_insert(ty);
        if !self.visited.insert((target, ty)) {
            return;
        }
        match schema.kind(ty) {
            TypeKind::Any | TypeKind::Union(_) => {}
            TypeKind::Scalar(scalar) => self.visit_scalar(node, target, ty, scalar),
            TypeKind::Bean(bean) => self.visit_bean(node, target, ty, bean, depth),
            TypeKind::Map(value_ty) => match ast.kind(target) {
                NodeKind::Mapping(_) => {
                    for entry in ast.entries(target) {
                        self.visit(entry.value, *value_ty, Some(target), depth + 1);
                    }
                }
                kind => self.shape_mismatch(node, target, vec!["Map".to_string()], kind),
            },
            TypeKind::Seq(element) => match ast.kind(target) {
                NodeKind::Sequence(items) => {
                    for item in items {
                        self.visit(item.value, *element, None, depth + 1);
                    }
                }
                kind => self.shape_mismatch(node, target, vec!["Sequence".to_string()], kind),
            },
        }
    }

    fn shape_mismatch(&mut self, node: NodeId, target: NodeId, expected: Vec<String>, kind: &NodeKind) {
        if self.ast.is_null(target) {
            return;
        }
        if let NodeKind::Scalar { value, .. } = kind
            && is_placeholder(value)
        {
            return;
        }
        self.tree.violations.push(Violation::Shape {
            node,
            expected,
            found: found_shape(kind),
        });
    }

    /// Resolves unions down to a concrete alternative.
    fn select(&mut self, node: NodeId, ty: TypeId, target: NodeId, parent_map: Option<NodeId>) -> Option<TypeId> {
        let ast = self.ast;
        let schema = self.schema;
        let mut current = ty;
        for _ in 0..16 {
            let TypeKind::Union(union) = schema.kind(current) else {
                return Some(current);
            };
            current = match &union.dispatch {
                Dispatch::Shape => {
                    let fit = union
                        .alternatives
                        .iter()
                        .copied()
                        .find(|alt| self.fits(*alt, target));
                    match fit {
                        Some(alt) => alt,
                        None => {
                            let mut expected: Vec<String> = union
                                .alternatives
                                .iter()
                                .map(|alt| match schema.kind(*alt) {
                                    TypeKind::Scalar(_) => schema.type_name(*alt).to_string(),
                                    kind => shape_name(kind).to_string(),
                                })
                                .collect();
                            expected.dedup();
                            self.shape_mismatch(node, target, expected, ast.kind(target));
                            return None;
                        }
                    }
                }
                Dispatch::PrimaryProperty { fallback } => {
                    let entries = ast.entries(target);
                    union
                        .alternatives
                        .iter()
                        .copied()
                        .find(|alt| {
                            schema
                                .bean(*alt)
                                .and_then(|b| b.primary.as_deref())
                                .is_some_and(|primary| {
                                    entries.iter().any(|e| ast.key_text(e.key) == primary)
                                })
                        })
                        .unwrap_or(*fallback)
                }
                Dispatch::Field {
                    key,
                    from_parent,
                    shadowable,
                    default,
                    cases,
                    fallback,
                } => {
                    let holder = if *from_parent { parent_map } else { Some(target) };
                    let value = holder
                        .and_then(|h| ast.get_str(h, key))
                        .filter(|v| !v.is_empty())
                        .or(default.as_deref());
                    match value {
                        Some(v) if *shadowable && self.options.shadowed.contains(v) => *fallback,
                        Some(v) => cases
                            .iter()
                            .find(|(case, _)| case == v)
                            .map_or(*fallback, |(_, alt)| *alt),
                        None => *fallback,
                    }
                }
            };
        }
        Some(current)
    }

    fn fits(&self, ty: TypeId, target: NodeId) -> bool {
        match (self.schema.kind(ty), self.ast.kind(target)) {
            (TypeKind::Any | TypeKind::Union(_), _) => true,
            (TypeKind::Scalar(_), NodeKind::Scalar { .. }) => true,
            (TypeKind::Bean(_) | TypeKind::Map(_), NodeKind::Mapping(_)) => true,
            (TypeKind::Seq(_), NodeKind::Sequence(_)) => true,
            _ => false,
        }
    }

    fn visit_scalar(&mut self, node: NodeId, target: NodeId, ty: TypeId, scalar: &ScalarType) {
        let ast = self.ast;
        let value = match ast.kind(target) {
            NodeKind::Scalar { value, .. } => value.as_str(),
            kind => {
                let expected = vec![self.schema.type_name(ty).to_string()];
                self.shape_mismatch(node, target, expected, kind);
                return;
            }
        };
        if is_placeholder(value) {
            return;
        }
        if ast.is_null(target) || value.trim().is_empty() {
            if let Some(message) = &scalar.non_blank {
                self.tree.violations.push(Violation::Value {
                    node: target,
                    problem: ValueProblem::error(message.clone()),
                });
            }
            return;
        }
        if let Some(spec) = scalar.reference {
            self.tree.references.push(Reference {
                spec,
                name: value.to_string(),
                node: target,
            });
        }
        if self.options.check_values
            && let Some(parser) = &scalar.parser
        {
            let ctx = ValueContext {
                providers: self.options.providers,
            };
            for problem in parser.check(value, &ctx) {
                self.tree.violations.push(Violation::Value {
                    node: target,
                    problem,
                });
            }
        }
    }

    fn visit_bean(&mut self, node: NodeId, target: NodeId, ty: TypeId, bean: &BeanType, depth: usize) {
        let ast = self.ast;
        let schema = self.schema;
        if !ast.is_mapping(target) {
            let expected = vec!["Map".to_string()];
            self.shape_mismatch(node, target, expected, ast.kind(target));
            return;
        }
        let entries = ast.entries(target);
        let present: Vec<&str> = entries.iter().map(|e| ast.key_text(e.key)).collect();
        let is_document_root = ast.node(target).parent.is_none();

        for entry in &entries {
            let key = ast.key_text(entry.key);
            let Some(index) = bean.properties.iter().position(|p| p.name == key) else {
                if bean.ignored.iter().any(|k| k == key) {
                    continue;
                }
                // Top-level holders of anchors are scratch space.
                if is_document_root && ast.node(entry.value).anchor.is_some() {
                    continue;
                }
                self.tree.violations.push(Violation::Unknown {
                    key: entry.key,
                    type_name: schema.type_name(ty).to_string(),
                });
                continue;
            };
            let property = &bean.properties[index];
            self.tree.keys.entry(entry.key).or_insert((ty, index));
            if property.deprecated {
                self.tree.violations.push(Violation::Deprecated {
                    key: entry.key,
                    name: property.name.clone(),
                    replacement: property.replaced_by.clone(),
                });
            }
            if let Some(kind) = property.declares
                && let Some(name) = ast.scalar(entry.value)
                && !ast.is_null(entry.value)
                && !is_placeholder(name)
            {
                self.tree.declarations.push(Declaration {
                    kind,
                    name: name.to_string(),
                    node: ast.resolve(entry.value),
                    owner: target,
                });
            }
            if property
                .shadowed_by
                .as_deref()
                .is_some_and(|sibling| present.contains(&sibling))
            {
                self.tree.declared.entry(entry.value).or_insert(property.ty);
                continue;
            }
            self.visit(entry.value, property.ty, Some(target), depth + 1);
        }

        let mut hard = Vec::new();
        let mut soft = Vec::new();
        for property in &bean.properties {
            if present.contains(&property.name.as_str()) {
                continue;
            }
            match property.requirement {
                Requirement::Required(Severity::Error) => hard.push(property.name.clone()),
                Requirement::Required(_) => soft.push(property.name.clone()),
                Requirement::Optional => {}
            }
        }
        for (names, severity) in [(hard, Severity::Error), (soft, Severity::Warning)] {
            if !names.is_empty() {
                self.tree.violations.push(Violation::Missing {
                    node,
                    map: target,
                    ty,
                    names,
                    severity,
                });
            }
        }

        for constraint in &bean.constraints {
            if let Some((message, severity, keys)) = constraint.check(&present) {
                let key_nodes = entries
                    .iter()
                    .filter(|e| keys.iter().any(|k| k == ast.key_text(e.key)))
                    .map(|e| e.key)
                    .collect();
                self.tree.violations.push(Violation::Constraint {
                    node,
                    keys: key_nodes,
                    message,
                    severity,
                });
            }
        }
    }
}
