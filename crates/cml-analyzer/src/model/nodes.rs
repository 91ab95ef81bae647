use cml_common::{
    AggregateId, AntiCorruptionId, AttributeId, ContextId, ModuleId, ObjectId,
    ReferenceId, RelationshipId,
};
use serde::{Deserialize, Serialize};

use super::expr::Expr;

// ============================================================================
// Strategic design: bounded contexts and context maps
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundedContextType {
    #[default]
    Feature,
    Application,
    System,
    Team,
}

/// A named unit owning aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedContext {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: BoundedContextType,
    #[serde(default)]
    pub aggregates: Vec<AggregateId>,
    #[serde(default)]
    pub modules: Vec<ModuleId>,
    #[serde(default)]
    pub anti_corruptions: Vec<AntiCorruptionId>,
    /// Contexts realized by this one (only meaningful for teams).
    #[serde(default)]
    pub realizes: Vec<ContextId>,
    /// The team owning this context.
    #[serde(default)]
    pub owner: Option<ContextId>,
}

/// A sub-module of a bounded context, owning further aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub aggregates: Vec<AggregateId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextMapType {
    SystemLandscape,
    Organizational,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMap {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<ContextMapType>,
    #[serde(default)]
    pub contexts: Vec<ContextId>,
    #[serde(default)]
    pub relationships: Vec<RelationshipId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymmetricKind {
    Partnership,
    SharedKernel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpstreamRole {
    #[serde(rename = "OHS")]
    OpenHostService,
    #[serde(rename = "PL")]
    PublishedLanguage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownstreamRole {
    #[serde(rename = "ACL")]
    AntiCorruptionLayer,
    #[serde(rename = "CF")]
    Conformist,
}

/// A relationship between two bounded contexts on a context map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Relationship {
    Symmetric {
        pattern: SymmetricKind,
        participant1: Option<ContextId>,
        participant2: Option<ContextId>,
    },
    UpstreamDownstream {
        #[serde(default)]
        customer_supplier: bool,
        upstream: Option<ContextId>,
        downstream: Option<ContextId>,
        #[serde(default)]
        upstream_roles: Vec<UpstreamRole>,
        #[serde(default)]
        downstream_roles: Vec<DownstreamRole>,
        #[serde(default)]
        exposed_aggregates: Vec<AggregateId>,
    },
}

impl Relationship {
    /// `(upstream, downstream)` for directed relationships.
    pub fn upstream_downstream(&self) -> Option<(Option<ContextId>, Option<ContextId>)> {
        match self {
            Relationship::UpstreamDownstream {
                upstream,
                downstream,
                ..
            } => Some((*upstream, *downstream)),
            Relationship::Symmetric { .. } => None,
        }
    }

    pub fn participants(&self) -> (Option<ContextId>, Option<ContextId>) {
        match self {
            Relationship::Symmetric {
                participant1,
                participant2,
                ..
            } => (*participant1, *participant2),
            Relationship::UpstreamDownstream {
                upstream,
                downstream,
                ..
            } => (*upstream, *downstream),
        }
    }
}

// ============================================================================
// Tactical design: aggregates and domain objects
// ============================================================================

/// A named boolean (or `final`) constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invariant {
    pub name: String,
    pub expression: Expr,
}

/// A consistency boundary containing domain objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub name: String,
    pub context: Option<ContextId>,
    #[serde(default)]
    pub objects: Vec<ObjectId>,
    #[serde(default)]
    pub invariants: Vec<Invariant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionKind {
    #[default]
    None,
    List,
    Set,
    Bag,
    Collection,
}

impl CollectionKind {
    pub fn is_collection(self) -> bool {
        self != CollectionKind::None
    }
}

/// A parameter or return type: a primitive type name or a domain object,
/// optionally wrapped in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexType {
    #[serde(default)]
    pub collection: CollectionKind,
    pub target: TypeTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTarget {
    Primitive(String),
    /// `None` when the linker could not resolve the domain object.
    DomainObject(Option<ObjectId>),
}

impl ComplexType {
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            collection: CollectionKind::None,
            target: TypeTarget::Primitive(name.into()),
        }
    }

    pub fn object(id: ObjectId) -> Self {
        Self {
            collection: CollectionKind::None,
            target: TypeTarget::DomainObject(Some(id)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ComplexType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorAssignment {
    /// Name of the attribute being assigned.
    pub attribute: String,
    pub expression: Expr,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constructor {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub assignments: Vec<ConstructorAssignment>,
}

/// Left-hand side of an assignment command: `this.attr` or `var.attr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeftValue {
    /// `None` means `this`.
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default)]
    pub properties: Vec<String>,
}

impl LeftValue {
    pub fn is_this(&self) -> bool {
        self.variable.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Assignment { left: LeftValue, right: Expr },
    /// Any non-assignment command (object creation, event emission, ...).
    Other { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<ComplexType>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOperation {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<ComplexType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub operations: Vec<RepositoryOperation>,
}

/// `alias = root.ref1.ref2` inside an entity mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasDeclaration {
    pub name: String,
    #[serde(default)]
    pub references: Vec<ReferenceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributePathHead {
    Root,
    Alias(String),
}

/// `(root | alias) . ref* . attribute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributePath {
    pub head: AttributePathHead,
    #[serde(default)]
    pub references: Vec<ReferenceId>,
    pub attribute: String,
}

/// One mapped attribute of an entity mapping: local name and type, and the
/// path to the attribute it mirrors on the mapped aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityAttributeMapping {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub path: AttributePath,
}

/// An entity mirroring the root entity of an aggregate in another context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMapping {
    pub bounded_context: String,
    pub aggregate: String,
    pub entity: Option<ObjectId>,
    #[serde(default)]
    pub aliases: Vec<AliasDeclaration>,
    #[serde(default)]
    pub attributes: Vec<EntityAttributeMapping>,
}

/// An entity delegating to a value object of another context's aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityUses {
    pub bounded_context: Option<ContextId>,
    pub aggregate: Option<AggregateId>,
    pub value_object: Option<ObjectId>,
    /// Name of the anti-corruption mapping/translation in the owning context.
    #[serde(default)]
    pub anti_corruption: Option<String>,
    pub variable: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityData {
    #[serde(default)]
    pub mapping: Option<EntityMapping>,
    #[serde(default)]
    pub uses: Option<EntityUses>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainObjectKind {
    Entity(EntityData),
    ValueObject,
    DomainEvent,
    Enum {
        #[serde(default)]
        defines_aggregate_lifecycle: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainObject {
    pub name: String,
    pub aggregate: AggregateId,
    #[serde(flatten)]
    pub kind: DomainObjectKind,
    #[serde(default)]
    pub aggregate_root: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeId>,
    #[serde(default)]
    pub references: Vec<ReferenceId>,
    #[serde(default)]
    pub constructor: Option<Constructor>,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl DomainObject {
    pub fn is_entity(&self) -> bool {
        matches!(self.kind, DomainObjectKind::Entity(_))
    }

    pub fn is_value_object(&self) -> bool {
        matches!(self.kind, DomainObjectKind::ValueObject)
    }

    pub fn is_root_entity(&self) -> bool {
        self.aggregate_root && self.is_entity()
    }

    pub fn entity(&self) -> Option<&EntityData> {
        match &self.kind {
            DomainObjectKind::Entity(data) => Some(data),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DomainObjectKind::Entity(_) => "Entity",
            DomainObjectKind::ValueObject => "ValueObject",
            DomainObjectKind::DomainEvent => "DomainEvent",
            DomainObjectKind::Enum { .. } => "Enum",
        }
    }
}

/// `uses var.attribute` on an attribute of an entity with a uses binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeUses {
    pub variable: String,
    pub attribute: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub owner: ObjectId,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub uses: Option<AttributeUses>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub owner: ObjectId,
    pub target: Option<ObjectId>,
    #[serde(default)]
    pub collection: CollectionKind,
}

// ============================================================================
// Anti-corruption mappings and translations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiCorruptionKind {
    Mapping,
    Translation,
}

/// `name : type <- Entity.attribute [as alias]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeTranslation {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub entity: Option<ObjectId>,
    pub attribute: Option<AttributeId>,
    #[serde(default)]
    pub alias: Option<String>,
}

/// A declared correspondence from an aggregate of an upstream context to
/// the owning context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiCorruption {
    pub name: String,
    pub kind: AntiCorruptionKind,
    pub owner: ContextId,
    pub bounded_context: Option<ContextId>,
    pub aggregate: Option<AggregateId>,
    #[serde(default)]
    pub attributes: Vec<AttributeTranslation>,
    #[serde(default)]
    pub invariants: Vec<Invariant>,
}
