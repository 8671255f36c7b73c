//! Declarative document schemas.
//!
//! A [`Schema`] is an arena of [`TypeDef`]s built once through
//! [`SchemaBuilder`] and shared read-only by every analysis.
pub mod constraint;
pub mod matcher;
pub mod value;

use std::sync::Arc;

pub use constraint::Constraint;
pub use matcher::{Declaration, Reference, TypedTree, Violation, walk};
pub use value::{ValueCompleter, ValueContext, ValueParser, ValueProblem, ValueProposal};

use crate::reconcile::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A category of named, referenceable constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKind(u16);

#[derive(Debug, Clone)]
pub struct EntityKindDef {
    /// Singular label, e.g. `Resource`.
    pub label: String,
    /// Outline section label, e.g. `Resources`.
    pub section: String,
    /// Word used in duplicate-name messages, e.g. `resource-type`.
    pub noun: String,
    pub unique: bool,
    /// Declared entities without any reference are reported.
    pub requires_usage: bool,
    /// Names valid without a declaration.
    pub builtins: Vec<String>,
}

impl EntityKindDef {
    pub fn new(label: &str, section: &str, noun: &str) -> Self {
        Self {
            label: label.to_string(),
            section: section.to_string(),
            noun: noun.to_string(),
            unique: true,
            requires_usage: false,
            builtins: Vec::new(),
        }
    }

    pub fn requires_usage(mut self) -> Self {
        self.requires_usage = true;
        self
    }

    pub fn builtins(mut self, names: &[&str]) -> Self {
        self.builtins = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

/// How a scalar refers to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefSpec {
    pub kind: EntityKind,
    /// Unresolved names are reported.
    pub validate: bool,
    /// The value is a glob pattern over names.
    pub glob: bool,
}

#[derive(Clone, Default)]
pub struct ScalarType {
    pub parser: Option<Arc<dyn ValueParser>>,
    pub completer: Option<Arc<dyn ValueCompleter>>,
    pub reference: Option<RefSpec>,
    /// Message for blank values. Blank values are accepted when unset.
    pub non_blank: Option<String>,
}

impl ScalarType {
    pub fn parsed(parser: impl ValueParser + 'static) -> Self {
        Self {
            parser: Some(Arc::new(parser)),
            ..Self::default()
        }
    }

    pub fn reference(kind: EntityKind) -> Self {
        Self {
            reference: Some(RefSpec {
                kind,
                validate: true,
                glob: false,
            }),
            ..Self::default()
        }
    }

    /// Names of `kind` are proposed but never checked.
    pub fn suggest(kind: EntityKind) -> Self {
        Self {
            reference: Some(RefSpec {
                kind,
                validate: false,
                glob: false,
            }),
            ..Self::default()
        }
    }

    pub fn glob(kind: EntityKind) -> Self {
        Self {
            reference: Some(RefSpec {
                kind,
                validate: true,
                glob: true,
            }),
            ..Self::default()
        }
    }

    pub fn with_completer(mut self, completer: impl ValueCompleter + 'static) -> Self {
        self.completer = Some(Arc::new(completer));
        self
    }

    pub fn non_blank(mut self, message: &str) -> Self {
        self.non_blank = Some(message.to_string());
        self
    }

    pub fn values(&self) -> Vec<String> {
        self.parser.as_ref().map(|p| p.values()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Optional,
    Required(Severity),
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub ty: TypeId,
    pub requirement: Requirement,
    pub description: Option<String>,
    pub deprecated: bool,
    pub replaced_by: Option<String>,
    /// The scalar value names an entity of this kind.
    pub declares: Option<EntityKind>,
    /// When this sibling key is present, the value is a plain local name.
    pub shadowed_by: Option<String>,
}

impl Property {
    pub fn new(name: &str, ty: TypeId) -> Self {
        Self {
            name: name.to_string(),
            ty,
            requirement: Requirement::Optional,
            description: None,
            deprecated: false,
            replaced_by: None,
            declares: None,
            shadowed_by: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.requirement = Requirement::Required(Severity::Error);
        self
    }

    /// Required, but a usable default exists, so absence is a warning.
    pub fn soft_required(mut self) -> Self {
        self.requirement = Requirement::Required(Severity::Warning);
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn deprecated(mut self, replacement: Option<&str>) -> Self {
        self.deprecated = true;
        self.replaced_by = replacement.map(str::to_string);
        self
    }

    pub fn declares(mut self, kind: EntityKind) -> Self {
        self.declares = Some(kind);
        self
    }

    pub fn shadowed_by(mut self, key: &str) -> Self {
        self.shadowed_by = Some(key.to_string());
        self
    }

    pub fn is_required(&self) -> bool {
        matches!(self.requirement, Requirement::Required(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BeanType {
    pub properties: Vec<Property>,
    pub constraints: Vec<Constraint>,
    /// Key that identifies this bean inside a sequence or union.
    pub primary: Option<String>,
    /// Keys accepted without validation or completion.
    pub ignored: Vec<String>,
}

impl BeanType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prop(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn props(mut self, properties: impl IntoIterator<Item = Property>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn primary(mut self, key: &str) -> Self {
        self.primary = Some(key.to_string());
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// How a union picks its alternative.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// First alternative whose shape (scalar, map, sequence) fits.
    Shape,
    /// First bean alternative whose primary key is present; `fallback` when
    /// none is.
    PrimaryProperty { fallback: TypeId },
    /// Alternative chosen by the value of a discriminator key.
    Field {
        key: String,
        /// Read the key from the enclosing mapping instead of this one.
        from_parent: bool,
        /// Values found in the document's own shadowed set select `fallback`.
        shadowable: bool,
        default: Option<String>,
        cases: Vec<(String, TypeId)>,
        fallback: TypeId,
    },
}

#[derive(Debug, Clone)]
pub struct UnionType {
    pub alternatives: Vec<TypeId>,
    pub dispatch: Dispatch,
}

#[derive(Clone)]
pub enum TypeKind {
    Any,
    Scalar(ScalarType),
    Bean(BeanType),
    Map(TypeId),
    Seq(TypeId),
    Union(UnionType),
}

impl std::fmt::Debug for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarType")
            .field("reference", &self.reference)
            .field("non_blank", &self.non_blank)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Any => write!(f, "Any"),
            TypeKind::Scalar(s) => s.fmt(f),
            TypeKind::Bean(b) => f.debug_tuple("Bean").field(&b.properties.len()).finish(),
            TypeKind::Map(v) => f.debug_tuple("Map").field(v).finish(),
            TypeKind::Seq(e) => f.debug_tuple("Seq").field(e).finish(),
            TypeKind::Union(u) => f.debug_tuple("Union").field(&u.alternatives).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub description: Option<String>,
}

/// The shape families used in "Expecting a ..." messages.
pub fn shape_name(kind: &TypeKind) -> &'static str {
    match kind {
        TypeKind::Bean(_) | TypeKind::Map(_) => "Map",
        TypeKind::Seq(_) => "Sequence",
        _ => "Scalar",
    }
}

#[derive(Debug)]
pub struct Schema {
    name: String,
    types: Vec<TypeDef>,
    kinds: Vec<EntityKindDef>,
    root: TypeId,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> TypeId {
        self.root
    }

    pub fn def(&self, ty: TypeId) -> &TypeDef {
        &self.types[ty.index()]
    }

    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        &self.def(ty).kind
    }

    pub fn type_name(&self, ty: TypeId) -> &str {
        &self.def(ty).name
    }

    pub fn bean(&self, ty: TypeId) -> Option<&BeanType> {
        match self.kind(ty) {
            TypeKind::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    pub fn scalar(&self, ty: TypeId) -> Option<&ScalarType> {
        match self.kind(ty) {
            TypeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn property(&self, ty: TypeId, name: &str) -> Option<&Property> {
        self.bean(ty).and_then(|b| b.property(name))
    }

    pub fn entity(&self, kind: EntityKind) -> &EntityKindDef {
        &self.kinds[kind.0 as usize]
    }

    pub fn entity_kinds(&self) -> impl Iterator<Item = (EntityKind, &EntityKindDef)> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(i, def)| (EntityKind(i as u16), def))
    }

    /// Alternatives of a union, or the type itself.
    pub fn alternatives(&self, ty: TypeId) -> Vec<TypeId> {
        match self.kind(ty) {
            TypeKind::Union(union) => {
                let mut all = union.alternatives.clone();
                match &union.dispatch {
                    Dispatch::PrimaryProperty { fallback } | Dispatch::Field { fallback, .. } => {
                        if !all.contains(fallback) {
                            all.push(*fallback);
                        }
                    }
                    Dispatch::Shape => {}
                }
                all
            }
            _ => vec![ty],
        }
    }
}

/// Assembles a [`Schema`]. Types can be declared before they are defined,
/// which allows recursive shapes such as nested steps.
pub struct SchemaBuilder {
    name: String,
    types: Vec<TypeDef>,
    defined: Vec<bool>,
    kinds: Vec<EntityKindDef>,
}

impl SchemaBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            types: Vec::new(),
            defined: Vec::new(),
            kinds: Vec::new(),
        }
    }

    pub fn entity_kind(&mut self, def: EntityKindDef) -> EntityKind {
        self.kinds.push(def);
        EntityKind((self.kinds.len() - 1) as u16)
    }

    pub fn declare(&mut self, name: &str) -> TypeId {
        self.types.push(TypeDef {
            name: name.to_string(),
            kind: TypeKind::Any,
            description: None,
        });
        self.defined.push(false);
        TypeId((self.types.len() - 1) as u32)
    }

    pub fn define(&mut self, ty: TypeId, kind: TypeKind) -> TypeId {
        self.types[ty.index()].kind = kind;
        self.defined[ty.index()] = true;
        ty
    }

    pub fn add(&mut self, name: &str, kind: TypeKind) -> TypeId {
        let ty = self.declare(name);
        self.define(ty, kind)
    }

    pub fn describe(&mut self, ty: TypeId, text: &str) -> TypeId {
        self.types[ty.index()].description = Some(text.to_string());
        ty
    }

    pub fn any(&mut self) -> TypeId {
        self.add("Object", TypeKind::Any)
    }

    pub fn scalar(&mut self, name: &str, scalar: ScalarType) -> TypeId {
        self.add(name, TypeKind::Scalar(scalar))
    }

    pub fn bean(&mut self, name: &str, bean: BeanType) -> TypeId {
        self.add(name, TypeKind::Bean(bean))
    }

    pub fn seq(&mut self, element: TypeId) -> TypeId {
        let name = format!("List<{}>", self.types[element.index()].name);
        self.add(&name, TypeKind::Seq(element))
    }

    pub fn map(&mut self, value: TypeId) -> TypeId {
        let name = format!("Map<String, {}>", self.types[value.index()].name);
        self.add(&name, TypeKind::Map(value))
    }

    pub fn union(&mut self, name: &str, alternatives: Vec<TypeId>, dispatch: Dispatch) -> TypeId {
        self.add(
            name,
            TypeKind::Union(UnionType {
                alternatives,
                dispatch,
            }),
        )
    }

    /// A bean defined earlier, for deriving related types from it.
    pub fn bean_def(&self, ty: TypeId) -> Option<&BeanType> {
        match &self.types[ty.index()].kind {
            TypeKind::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    pub fn build(self, root: TypeId) -> Schema {
        for (ty, defined) in self.types.iter().zip(&self.defined) {
            if !defined {
                tracing::warn!(schema = %self.name, ty = %ty.name, "type declared but never defined");
            }
        }
        Schema {
            name: self.name,
            types: self.types,
            kinds: self.kinds,
            root,
        }
    }
}
