//! The linked model graph the analyzer consumes.
//!
//! Nodes live in flat vectors owned by [`Model`] and refer to each other
//! through the typed handles from `cml_common`. Parent links are explicit
//! handles; links the linker could not resolve are `None`.

pub mod builder;
pub mod expr;
pub mod load;
pub mod nodes;

use std::ops::Index;

use cml_common::{
    AggregateId, AntiCorruptionId, AttributeId, ContextId, ContextMapId, ExprId, ModuleId,
    ObjectId, ReferenceId, RelationshipId,
};
use serde::{Deserialize, Serialize};

pub use builder::ModelBuilder;
pub use expr::*;
pub use load::ModelError;
pub use nodes::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub contexts: Vec<BoundedContext>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub aggregates: Vec<Aggregate>,
    #[serde(default)]
    pub objects: Vec<DomainObject>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub anti_corruptions: Vec<AntiCorruption>,
    #[serde(default)]
    pub context_maps: Vec<ContextMap>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

macro_rules! arena_index {
    ($id:ty, $node:ty, $field:ident) => {
        impl Index<$id> for Model {
            type Output = $node;

            fn index(&self, id: $id) -> &$node {
                &self.$field[id.index()]
            }
        }
    };
}

arena_index!(ContextId, BoundedContext, contexts);
arena_index!(ModuleId, Module, modules);
arena_index!(AggregateId, Aggregate, aggregates);
arena_index!(ObjectId, DomainObject, objects);
arena_index!(AttributeId, Attribute, attributes);
arena_index!(ReferenceId, Reference, references);
arena_index!(AntiCorruptionId, AntiCorruption, anti_corruptions);
arena_index!(ContextMapId, ContextMap, context_maps);
arena_index!(RelationshipId, Relationship, relationships);

impl Model {
    // -- Handle iteration --

    pub fn context_ids(&self) -> impl Iterator<Item = ContextId> {
        (0..self.contexts.len()).map(ContextId::from_index)
    }

    pub fn aggregate_ids(&self) -> impl Iterator<Item = AggregateId> {
        (0..self.aggregates.len()).map(AggregateId::from_index)
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> {
        (0..self.objects.len()).map(ObjectId::from_index)
    }

    pub fn anti_corruption_ids(&self) -> impl Iterator<Item = AntiCorruptionId> {
        (0..self.anti_corruptions.len()).map(AntiCorruptionId::from_index)
    }

    pub fn context_map_ids(&self) -> impl Iterator<Item = ContextMapId> {
        (0..self.context_maps.len()).map(ContextMapId::from_index)
    }

    // -- Upward navigation --

    /// The bounded context an aggregate belongs to, directly or via a module.
    pub fn context_of_aggregate(&self, aggregate: AggregateId) -> Option<ContextId> {
        self[aggregate].context
    }

    pub fn context_of_object(&self, object: ObjectId) -> Option<ContextId> {
        self.context_of_aggregate(self[object].aggregate)
    }

    // -- Aggregate-local lookups --

    /// The first entity flagged as aggregate root.
    pub fn root_entity(&self, aggregate: AggregateId) -> Option<ObjectId> {
        self[aggregate]
            .objects
            .iter()
            .copied()
            .find(|&o| self[o].is_root_entity())
    }

    pub fn object_by_name(&self, aggregate: AggregateId, name: &str) -> Option<ObjectId> {
        self[aggregate]
            .objects
            .iter()
            .copied()
            .find(|&o| self[o].name == name)
    }

    pub fn entity_names(&self, aggregate: AggregateId) -> Vec<&str> {
        self[aggregate]
            .objects
            .iter()
            .filter(|&&o| self[o].is_entity())
            .map(|&o| self[o].name.as_str())
            .collect()
    }

    // -- Domain-object members --

    pub fn attribute_by_name(&self, object: ObjectId, name: &str) -> Option<AttributeId> {
        self[object]
            .attributes
            .iter()
            .copied()
            .find(|&a| self[a].name == name)
    }

    pub fn reference_by_name(&self, object: ObjectId, name: &str) -> Option<ReferenceId> {
        self[object]
            .references
            .iter()
            .copied()
            .find(|&r| self[r].name == name)
    }

    pub fn key_attribute(&self, object: ObjectId) -> Option<AttributeId> {
        self[object]
            .attributes
            .iter()
            .copied()
            .find(|&a| self[a].key)
    }

    // -- Context-level lookups --

    /// Aggregates of a context, including those declared in its modules.
    pub fn context_aggregates(&self, context: ContextId) -> Vec<AggregateId> {
        let ctx = &self[context];
        let mut aggregates = ctx.aggregates.clone();
        for &module in &ctx.modules {
            aggregates.extend(self[module].aggregates.iter().copied());
        }
        aggregates
    }

    pub fn aggregate_in_context(&self, context: ContextId, name: &str) -> Option<AggregateId> {
        self.context_aggregates(context)
            .into_iter()
            .find(|&a| self[a].name == name)
    }

    pub fn anti_corruption_in_context(
        &self,
        context: ContextId,
        name: &str,
    ) -> Option<AntiCorruptionId> {
        self[context]
            .anti_corruptions
            .iter()
            .copied()
            .find(|&ac| self[ac].name == name)
    }

    /// The first context map listing `context` as a participant.
    pub fn context_map_of(&self, context: ContextId) -> Option<ContextMapId> {
        self.context_map_ids()
            .find(|&m| self[m].contexts.contains(&context))
    }

    /// Whether `map` declares `upstream` upstream of `downstream`.
    pub fn is_upstream_of(
        &self,
        map: ContextMapId,
        upstream: ContextId,
        downstream: ContextId,
    ) -> bool {
        self[map].relationships.iter().any(|&r| {
            self[r].upstream_downstream() == Some((Some(upstream), Some(downstream)))
        })
    }

    /// Assign fresh, model-unique ids to every expression in the graph.
    pub fn number_expressions(&mut self) {
        let mut next = 0u32;
        let mut assign = |e: &mut Expr| {
            e.id = ExprId(next);
            next += 1;
        };
        for aggregate in &mut self.aggregates {
            for invariant in &mut aggregate.invariants {
                invariant.expression.walk_mut(&mut assign);
            }
        }
        for ac in &mut self.anti_corruptions {
            for invariant in &mut ac.invariants {
                invariant.expression.walk_mut(&mut assign);
            }
        }
        for object in &mut self.objects {
            if let Some(constructor) = &mut object.constructor {
                for assignment in &mut constructor.assignments {
                    assignment.expression.walk_mut(&mut assign);
                }
            }
            for operation in &mut object.operations {
                for command in &mut operation.commands {
                    if let Command::Assignment { right, .. } = command {
                        right.walk_mut(&mut assign);
                    }
                }
            }
        }
    }
}
