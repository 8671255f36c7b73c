//! Text templates for inserting properties.

use crate::schema::{Property, Schema, TypeId, TypeKind};

const MAX_NESTING: usize = 3;

pub fn indent(col: usize) -> String {
    " ".repeat(col)
}

/// Renders properties as YAML text. With tab stops enabled, every scalar
/// placeholder becomes `$1`, `$2`, ... in order.
pub struct Snippets<'a> {
    schema: &'a Schema,
    tab_stops: bool,
    next: usize,
}

impl<'a> Snippets<'a> {
    pub fn plain(schema: &'a Schema) -> Self {
        Self {
            schema,
            tab_stops: false,
            next: 1,
        }
    }

    pub fn with_tab_stops(schema: &'a Schema) -> Self {
        Self {
            schema,
            tab_stops: true,
            next: 1,
        }
    }

    pub fn uses_tab_stops(&self) -> bool {
        self.tab_stops && self.next > 1
    }

    fn stop(&mut self) -> String {
        if !self.tab_stops {
            return String::new();
        }
        let stop = format!("${}", self.next);
        self.next += 1;
        stop
    }

    /// `name: value` text for a key written at column `col`.
    pub fn property(&mut self, property: &Property, col: usize) -> String {
        self.named(&property.name, property.ty, col, 0)
    }

    pub fn named(&mut self, name: &str, ty: TypeId, col: usize, depth: usize) -> String {
        let schema = self.schema;
        match schema.kind(ty) {
            TypeKind::Seq(element) => {
                let body = self.item_body(*element, col, depth + 1);
                format!("{name}:\n{}- {body}", indent(col))
            }
            TypeKind::Bean(bean) if depth < MAX_NESTING => {
                let required: Vec<&Property> =
                    bean.properties.iter().filter(|p| p.is_required()).collect();
                if required.is_empty() {
                    return format!("{name}:\n{}", indent(col + 2));
                }
                let lines: Vec<String> = required
                    .iter()
                    .map(|p| {
                        let text = self.named(&p.name, p.ty, col + 2, depth + 1);
                        format!("{}{text}", indent(col + 2))
                    })
                    .collect();
                format!("{name}:\n{}", lines.join("\n"))
            }
            TypeKind::Bean(_) | TypeKind::Map(_) | TypeKind::Union(_) => {
                format!("{name}:\n{}", indent(col + 2))
            }
            TypeKind::Scalar(_) | TypeKind::Any => format!("{name}: {}", self.stop()),
        }
    }

    /// Text following `- ` for an item whose dash sits at column `col`.
    pub fn item_body(&mut self, element: TypeId, col: usize, depth: usize) -> String {
        let schema = self.schema;
        let Some(bean) = schema.bean(element) else {
            return String::new();
        };
        if depth >= MAX_NESTING {
            return String::new();
        }
        let required: Vec<&Property> = bean.properties.iter().filter(|p| p.is_required()).collect();
        let mut parts = Vec::new();
        for (i, p) in required.iter().enumerate() {
            let text = self.named(&p.name, p.ty, col + 2, depth + 1);
            if i == 0 {
                parts.push(text);
            } else {
                parts.push(format!("{}{text}", indent(col + 2)));
            }
        }
        parts.join("\n")
    }
}
