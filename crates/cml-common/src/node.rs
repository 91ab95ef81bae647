use serde::{Deserialize, Serialize};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// Handle of a bounded context in the model arena.
    ContextId
);
handle!(
    /// Handle of a sub-module of a bounded context.
    ModuleId
);
handle!(
    /// Handle of an aggregate.
    AggregateId
);
handle!(
    /// Handle of a domain object (entity, value object, domain event or enum).
    ObjectId
);
handle!(
    /// Handle of an attribute declared on a domain object.
    AttributeId
);
handle!(
    /// Handle of a reference declared on a domain object.
    ReferenceId
);
handle!(
    /// Handle of an anti-corruption mapping or translation.
    AntiCorruptionId
);
handle!(ContextMapId);
handle!(RelationshipId);
handle!(
    /// Identity of an expression node. Expressions are owned trees, the id
    /// only exists so diagnostics can point at them.
    ExprId
);

/// A constructor or a domain-object operation: anything with parameters and
/// an assignment body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Callable {
    Constructor { object: ObjectId },
    Operation { object: ObjectId, index: usize },
}

/// A reference into the model graph: the node a diagnostic is attached to.
///
/// Nodes that are owned inline by another node (invariants, attribute
/// mappings, parameters, ...) are addressed by their owner plus position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeRef {
    Context { id: ContextId },
    ContextMap { id: ContextMapId },
    Relationship { id: RelationshipId },
    Aggregate { id: AggregateId },
    DomainObject { id: ObjectId },
    Attribute { id: AttributeId },
    AntiCorruption { id: AntiCorruptionId },
    AttributeTranslation { owner: AntiCorruptionId, index: usize },
    InterInvariant { owner: AntiCorruptionId, index: usize },
    IntraInvariant { aggregate: AggregateId, index: usize },
    EntityMapping { entity: ObjectId },
    AliasDeclaration { entity: ObjectId, index: usize },
    AttributeMapping { entity: ObjectId, index: usize },
    Callable { callable: Callable },
    Parameter { callable: Callable, index: usize },
    Assignment { callable: Callable, index: usize },
    Expr { id: ExprId },
}

/// The named field of a node a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Name,
    Type,
    AggregateRoot,
    DefinesAggregateLifecycle,
    Mapping,
    Uses,
    UsesBoundedContext,
    UsesAggregate,
    UsesValueObject,
    UsesAntiCorruption,
    Variable,
    UsesAttribute,
    References,
    AttributePathHead,
    Attribute,
    BoundedContext,
    Aggregate,
    Entity,
    Expression,
    Participant1,
    Participant2,
    Upstream,
    Downstream,
    UpstreamRoles,
    DownstreamRoles,
    UpstreamExposedAggregates,
    BoundedContexts,
    Realizes,
    Owner,
    Parameters,
    ParameterType,
    Assignments,
    Commands,
    LeftValue,
    HeadElement,
    Properties,
    Methods,
    Left,
    Right,
    Operand,
    Condition,
    ThenValue,
    ElseValue,
    FinalElements,
    QueryOperation,
    QueryParams,
    Operator,
}

impl Feature {
    /// The serde spelling, shared by text and JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Name => "name",
            Feature::Type => "type",
            Feature::AggregateRoot => "aggregateRoot",
            Feature::DefinesAggregateLifecycle => "definesAggregateLifecycle",
            Feature::Mapping => "mapping",
            Feature::Uses => "uses",
            Feature::UsesBoundedContext => "usesBoundedContext",
            Feature::UsesAggregate => "usesAggregate",
            Feature::UsesValueObject => "usesValueObject",
            Feature::UsesAntiCorruption => "usesAntiCorruption",
            Feature::Variable => "variable",
            Feature::UsesAttribute => "usesAttribute",
            Feature::References => "references",
            Feature::AttributePathHead => "attributePathHead",
            Feature::Attribute => "attribute",
            Feature::BoundedContext => "boundedContext",
            Feature::Aggregate => "aggregate",
            Feature::Entity => "entity",
            Feature::Expression => "expression",
            Feature::Participant1 => "participant1",
            Feature::Participant2 => "participant2",
            Feature::Upstream => "upstream",
            Feature::Downstream => "downstream",
            Feature::UpstreamRoles => "upstreamRoles",
            Feature::DownstreamRoles => "downstreamRoles",
            Feature::UpstreamExposedAggregates => "upstreamExposedAggregates",
            Feature::BoundedContexts => "boundedContexts",
            Feature::Realizes => "realizes",
            Feature::Owner => "owner",
            Feature::Parameters => "parameters",
            Feature::ParameterType => "parameterType",
            Feature::Assignments => "assignments",
            Feature::Commands => "commands",
            Feature::LeftValue => "leftValue",
            Feature::HeadElement => "headElement",
            Feature::Properties => "properties",
            Feature::Methods => "methods",
            Feature::Left => "left",
            Feature::Right => "right",
            Feature::Operand => "operand",
            Feature::Condition => "condition",
            Feature::ThenValue => "thenValue",
            Feature::ElseValue => "elseValue",
            Feature::FinalElements => "finalElements",
            Feature::QueryOperation => "queryOperation",
            Feature::QueryParams => "queryParams",
            Feature::Operator => "operator",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
