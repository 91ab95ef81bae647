use cml_common::{
    AggregateId, AntiCorruptionId, AttributeId, ContextId, ContextMapId, ModuleId, ObjectId,
    ReferenceId, RelationshipId,
};

use super::expr::Expr;
use super::nodes::*;
use super::Model;

/// Programmatic construction of a linked [`Model`].
///
/// Every `add`-style method wires the new node into its parent and returns
/// its handle, so callers never touch the arena vectors directly.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish the model and number its expressions.
    pub fn build(mut self) -> Model {
        self.model.number_expressions();
        self.model
    }

    // -- Bounded contexts --

    pub fn context(&mut self, name: &str, kind: BoundedContextType) -> ContextId {
        let id = ContextId::from_index(self.model.contexts.len());
        self.model.contexts.push(BoundedContext {
            name: name.to_string(),
            kind,
            aggregates: Vec::new(),
            modules: Vec::new(),
            anti_corruptions: Vec::new(),
            realizes: Vec::new(),
            owner: None,
        });
        id
    }

    pub fn owner(&mut self, context: ContextId, team: ContextId) {
        self.model.contexts[context.index()].owner = Some(team);
    }

    pub fn realizes(&mut self, context: ContextId, realized: ContextId) {
        self.model.contexts[context.index()].realizes.push(realized);
    }

    pub fn module(&mut self, context: ContextId, name: &str) -> ModuleId {
        let id = ModuleId::from_index(self.model.modules.len());
        self.model.modules.push(Module {
            name: name.to_string(),
            aggregates: Vec::new(),
        });
        self.model.contexts[context.index()].modules.push(id);
        id
    }

    // -- Aggregates --

    pub fn aggregate(&mut self, context: ContextId, name: &str) -> AggregateId {
        let id = self.push_aggregate(Some(context), name);
        self.model.contexts[context.index()].aggregates.push(id);
        id
    }

    /// An aggregate declared inside a module of `context`.
    pub fn module_aggregate(
        &mut self,
        module: ModuleId,
        context: ContextId,
        name: &str,
    ) -> AggregateId {
        let id = self.push_aggregate(Some(context), name);
        self.model.modules[module.index()].aggregates.push(id);
        id
    }

    fn push_aggregate(&mut self, context: Option<ContextId>, name: &str) -> AggregateId {
        let id = AggregateId::from_index(self.model.aggregates.len());
        self.model.aggregates.push(Aggregate {
            name: name.to_string(),
            context,
            objects: Vec::new(),
            invariants: Vec::new(),
        });
        id
    }

    pub fn invariant(&mut self, aggregate: AggregateId, name: &str, expression: Expr) {
        self.model.aggregates[aggregate.index()]
            .invariants
            .push(Invariant {
                name: name.to_string(),
                expression,
            });
    }

    // -- Domain objects --

    pub fn object(
        &mut self,
        aggregate: AggregateId,
        name: &str,
        kind: DomainObjectKind,
        aggregate_root: bool,
    ) -> ObjectId {
        let id = ObjectId::from_index(self.model.objects.len());
        self.model.objects.push(DomainObject {
            name: name.to_string(),
            aggregate,
            kind,
            aggregate_root,
            attributes: Vec::new(),
            references: Vec::new(),
            constructor: None,
            repository: None,
            operations: Vec::new(),
        });
        self.model.aggregates[aggregate.index()].objects.push(id);
        id
    }

    pub fn entity(&mut self, aggregate: AggregateId, name: &str) -> ObjectId {
        self.object(
            aggregate,
            name,
            DomainObjectKind::Entity(EntityData::default()),
            false,
        )
    }

    pub fn root_entity(&mut self, aggregate: AggregateId, name: &str) -> ObjectId {
        self.object(
            aggregate,
            name,
            DomainObjectKind::Entity(EntityData::default()),
            true,
        )
    }

    pub fn value_object(&mut self, aggregate: AggregateId, name: &str) -> ObjectId {
        self.object(aggregate, name, DomainObjectKind::ValueObject, false)
    }

    pub fn domain_event(&mut self, aggregate: AggregateId, name: &str) -> ObjectId {
        self.object(aggregate, name, DomainObjectKind::DomainEvent, false)
    }

    pub fn lifecycle_enum(&mut self, aggregate: AggregateId, name: &str) -> ObjectId {
        self.object(
            aggregate,
            name,
            DomainObjectKind::Enum {
                defines_aggregate_lifecycle: true,
            },
            false,
        )
    }

    pub fn attribute(&mut self, owner: ObjectId, name: &str, ty: &str) -> AttributeId {
        self.push_attribute(owner, name, ty, false)
    }

    pub fn key_attribute(&mut self, owner: ObjectId, name: &str, ty: &str) -> AttributeId {
        self.push_attribute(owner, name, ty, true)
    }

    fn push_attribute(&mut self, owner: ObjectId, name: &str, ty: &str, key: bool) -> AttributeId {
        let id = AttributeId::from_index(self.model.attributes.len());
        self.model.attributes.push(Attribute {
            name: name.to_string(),
            ty: ty.to_string(),
            owner,
            key,
            uses: None,
        });
        self.model.objects[owner.index()].attributes.push(id);
        id
    }

    /// `attribute uses variable.attribute`
    pub fn attribute_uses(&mut self, attribute: AttributeId, variable: &str, used: &str) {
        self.model.attributes[attribute.index()].uses = Some(AttributeUses {
            variable: variable.to_string(),
            attribute: used.to_string(),
        });
    }

    pub fn reference(
        &mut self,
        owner: ObjectId,
        name: &str,
        target: ObjectId,
        collection: CollectionKind,
    ) -> ReferenceId {
        let id = ReferenceId::from_index(self.model.references.len());
        self.model.references.push(Reference {
            name: name.to_string(),
            owner,
            target: Some(target),
            collection,
        });
        self.model.objects[owner.index()].references.push(id);
        id
    }

    pub fn constructor(&mut self, owner: ObjectId, constructor: Constructor) {
        self.model.objects[owner.index()].constructor = Some(constructor);
    }

    pub fn operation(&mut self, owner: ObjectId, operation: Operation) -> usize {
        let operations = &mut self.model.objects[owner.index()].operations;
        operations.push(operation);
        operations.len() - 1
    }

    pub fn repository(&mut self, owner: ObjectId, repository: Repository) {
        self.model.objects[owner.index()].repository = Some(repository);
    }

    /// Attach an entity mapping. No-op on non-entities.
    pub fn entity_mapping(&mut self, entity: ObjectId, mapping: EntityMapping) {
        if let DomainObjectKind::Entity(data) = &mut self.model.objects[entity.index()].kind {
            data.mapping = Some(mapping);
        }
    }

    /// Attach a uses binding. No-op on non-entities.
    pub fn entity_uses(&mut self, entity: ObjectId, uses: EntityUses) {
        if let DomainObjectKind::Entity(data) = &mut self.model.objects[entity.index()].kind {
            data.uses = Some(uses);
        }
    }

    // -- Anti-corruption --

    pub fn anti_corruption(
        &mut self,
        owner: ContextId,
        name: &str,
        kind: AntiCorruptionKind,
        bounded_context: ContextId,
        aggregate: AggregateId,
    ) -> AntiCorruptionId {
        let id = AntiCorruptionId::from_index(self.model.anti_corruptions.len());
        self.model.anti_corruptions.push(AntiCorruption {
            name: name.to_string(),
            kind,
            owner,
            bounded_context: Some(bounded_context),
            aggregate: Some(aggregate),
            attributes: Vec::new(),
            invariants: Vec::new(),
        });
        self.model.contexts[owner.index()].anti_corruptions.push(id);
        id
    }

    /// `name : ty <- Entity.attribute`
    pub fn translate(
        &mut self,
        anti_corruption: AntiCorruptionId,
        name: &str,
        ty: &str,
        attribute: AttributeId,
    ) {
        let entity = self.model.attributes[attribute.index()].owner;
        self.model.anti_corruptions[anti_corruption.index()]
            .attributes
            .push(AttributeTranslation {
                name: name.to_string(),
                ty: ty.to_string(),
                entity: Some(entity),
                attribute: Some(attribute),
                alias: None,
            });
    }

    pub fn inter_invariant(&mut self, anti_corruption: AntiCorruptionId, name: &str, expression: Expr) {
        self.model.anti_corruptions[anti_corruption.index()]
            .invariants
            .push(Invariant {
                name: name.to_string(),
                expression,
            });
    }

    // -- Context maps --

    pub fn context_map(
        &mut self,
        name: &str,
        kind: Option<ContextMapType>,
        contexts: &[ContextId],
    ) -> ContextMapId {
        let id = ContextMapId::from_index(self.model.context_maps.len());
        self.model.context_maps.push(ContextMap {
            name: name.to_string(),
            kind,
            contexts: contexts.to_vec(),
            relationships: Vec::new(),
        });
        id
    }

    pub fn relationship(&mut self, map: ContextMapId, relationship: Relationship) -> RelationshipId {
        let id = RelationshipId::from_index(self.model.relationships.len());
        self.model.relationships.push(relationship);
        self.model.context_maps[map.index()].relationships.push(id);
        id
    }

    /// `upstream -> downstream` without roles.
    pub fn upstream_downstream(
        &mut self,
        map: ContextMapId,
        upstream: ContextId,
        downstream: ContextId,
    ) -> RelationshipId {
        self.relationship(
            map,
            Relationship::UpstreamDownstream {
                customer_supplier: false,
                upstream: Some(upstream),
                downstream: Some(downstream),
                upstream_roles: Vec::new(),
                downstream_roles: Vec::new(),
                exposed_aggregates: Vec::new(),
            },
        )
    }

    pub fn partnership(&mut self, map: ContextMapId, a: ContextId, b: ContextId) -> RelationshipId {
        self.relationship(
            map,
            Relationship::Symmetric {
                pattern: SymmetricKind::Partnership,
                participant1: Some(a),
                participant2: Some(b),
            },
        )
    }
}
