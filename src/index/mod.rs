//! Named entities declared in a document and the references to them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use indexmap::IndexSet;

use crate::schema::{Declaration, EntityKind, Reference, Schema, TypedTree};
use crate::yaml::{Ast, NodeId, NodeKind};

#[derive(Debug, Default)]
pub struct EntityIndex {
    declarations: Vec<Declaration>,
    references: Vec<Reference>,
    by_node: HashMap<NodeId, usize>,
}

impl EntityIndex {
    pub fn build(tree: &TypedTree) -> Self {
        let by_node = tree
            .references
            .iter()
            .enumerate()
            .map(|(i, r)| (r.node, i))
            .collect();
        Self {
            declarations: tree.declarations.clone(),
            references: tree.references.clone(),
            by_node,
        }
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn declarations_of(&self, kind: EntityKind) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.kind == kind)
    }

    /// Declared names of `kind` in document order, without repeats.
    pub fn names(&self, kind: EntityKind) -> Vec<&str> {
        self.declarations_of(kind)
            .map(|d| d.name.as_str())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// The first declaration of `name`.
    pub fn resolve(&self, kind: EntityKind, name: &str) -> Option<&Declaration> {
        self.declarations_of(kind).find(|d| d.name == name)
    }

    pub fn is_known(&self, schema: &Schema, kind: EntityKind, name: &str) -> bool {
        self.resolve(kind, name).is_some() || schema.entity(kind).builtins.iter().any(|b| b == name)
    }

    /// Checked references to the entity, globs excluded.
    pub fn usages(&self, kind: EntityKind, name: &str) -> Vec<&Reference> {
        self.references
            .iter()
            .filter(|r| r.spec.kind == kind && r.spec.validate && !r.spec.glob && r.name == name)
            .collect()
    }

    pub fn reference_at(&self, node: NodeId) -> Option<&Reference> {
        self.by_node.get(&node).map(|i| &self.references[*i])
    }

    pub fn declaration_at(&self, node: NodeId) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.node == node)
    }

    /// For each `owner` entity, the `target` entities referenced anywhere
    /// inside its declaring mapping, following aliases and merges.
    pub fn interactions(
        &self,
        ast: &Ast,
        owner: EntityKind,
        target: EntityKind,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut result: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for declaration in self.declarations_of(owner) {
            let mut nodes = HashSet::new();
            collect_nodes(ast, declaration.owner, &mut nodes, 0);
            let names = result.entry(declaration.name.clone()).or_default();
            for node in nodes {
                if let Some(reference) = self.reference_at(node)
                    && reference.spec.kind == target
                    && reference.spec.validate
                {
                    names.insert(reference.name.clone());
                }
            }
        }
        result
    }
}

fn collect_nodes(ast: &Ast, node: NodeId, out: &mut HashSet<NodeId>, depth: usize) {
    let node = ast.resolve(node);
    if depth > 200 || !out.insert(node) {
        return;
    }
    match ast.kind(node) {
        NodeKind::Mapping(_) => {
            for entry in ast.entries(node) {
                collect_nodes(ast, entry.value, out, depth + 1);
            }
        }
        NodeKind::Sequence(items) => {
            for item in items {
                collect_nodes(ast, item.value, out, depth + 1);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Alias { .. } => {}
    }
}
