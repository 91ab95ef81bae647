//! `uses` bindings: an entity delegating to a value object of an upstream
//! aggregate, and the attributes that read through that binding.

use cml_common::{
    AggregateId, AntiCorruptionId, ContextId, Diagnostic, DiagnosticSink, Feature, NodeRef,
    ObjectId,
};

use crate::model::{EntityUses, Model, Relationship};

pub fn check_entity(model: &Model, entity: ObjectId, sink: &mut dyn DiagnosticSink) {
    let Some(data) = model[entity].entity() else {
        return;
    };
    let mut check = EntityCheck {
        model,
        entity,
        sink,
    };
    match &data.uses {
        Some(uses) => check.uses(uses),
        None => check.attributes_without_binding(),
    }
}

struct EntityCheck<'m, 's> {
    model: &'m Model,
    entity: ObjectId,
    sink: &'s mut dyn DiagnosticSink,
}

/// Where attribute `uses` clauses resolve: the named anti-corruption, or the
/// used value object when none is named.
#[derive(Clone, Copy)]
enum UsesTarget {
    AntiCorruption(AntiCorruptionId),
    ValueObject(ObjectId),
}

impl EntityCheck<'_, '_> {
    fn error(&mut self, message: String, node: NodeRef, feature: Feature) {
        self.sink.report(Diagnostic::error(message).at(node, feature));
    }

    fn node(&self) -> NodeRef {
        NodeRef::DomainObject { id: self.entity }
    }

    fn attributes_without_binding(&mut self) {
        let model = self.model;
        for &attribute in &model[self.entity].attributes {
            if model[attribute].uses.is_some() {
                self.error(
                    format!(
                        "Attribute {} uses a binding but entity {} does not use one.",
                        model[attribute].name, model[self.entity].name
                    ),
                    NodeRef::Attribute { id: attribute },
                    Feature::Uses,
                );
            }
        }
    }

    fn uses(&mut self, uses: &EntityUses) {
        let model = self.model;
        let entity = &model[self.entity];
        let node = self.node();

        if entity.aggregate_root {
            self.error(
                format!("Aggregate root '{}' cannot use a value object.", entity.name),
                node,
                Feature::AggregateRoot,
            );
        }

        let owner = model.context_of_object(self.entity);
        match (uses.bounded_context, owner) {
            (Some(used), Some(owner)) => self.relationship(used, owner),
            (None, _) => self.error(
                format!("Used bounded context of '{}' is not defined.", entity.name),
                node,
                Feature::UsesBoundedContext,
            ),
            (Some(_), None) => {}
        }

        match uses.aggregate {
            Some(aggregate) => self.used_aggregate(uses.bounded_context, aggregate),
            None => self.error(
                format!("Used aggregate of '{}' is not defined.", entity.name),
                node,
                Feature::UsesAggregate,
            ),
        }

        match uses.value_object {
            Some(value_object) => self.used_value_object(uses.aggregate, value_object),
            None => self.error(
                format!("Used value object of '{}' is not defined.", entity.name),
                node,
                Feature::UsesValueObject,
            ),
        }

        let anti_corruption = match (&uses.anti_corruption, owner) {
            (Some(name), Some(owner)) => {
                let found = model.anti_corruption_in_context(owner, name);
                if found.is_none() {
                    self.error(
                        format!(
                            "Anti-corruption mapping {} used by entity '{}' does not exist.",
                            name, entity.name
                        ),
                        node,
                        Feature::UsesAntiCorruption,
                    );
                }
                found
            }
            _ => None,
        };

        let target = match (anti_corruption, uses.value_object) {
            (Some(ac), _) => Some(UsesTarget::AntiCorruption(ac)),
            (None, Some(vo)) if uses.anti_corruption.is_none() => Some(UsesTarget::ValueObject(vo)),
            _ => None,
        };
        self.attribute_uses(&uses.variable, target);
    }

    /// The used context needs a relationship with the owner and must not be
    /// its downstream.
    fn relationship(&mut self, used: ContextId, owner: ContextId) {
        let model = self.model;
        let mut related = false;
        let mut downstream = false;
        if let Some(map) = model.context_map_of(used) {
            for &relationship in &model[map].relationships {
                match &model[relationship] {
                    Relationship::Symmetric {
                        participant1,
                        participant2,
                        ..
                    } => {
                        let pair = (*participant1, *participant2);
                        if pair == (Some(used), Some(owner)) || pair == (Some(owner), Some(used)) {
                            related = true;
                        }
                    }
                    Relationship::UpstreamDownstream {
                        upstream,
                        downstream: down,
                        ..
                    } => {
                        if (*upstream, *down) == (Some(used), Some(owner)) {
                            related = true;
                        }
                        if (*upstream, *down) == (Some(owner), Some(used)) {
                            related = true;
                            downstream = true;
                        }
                    }
                }
            }
        }
        let node = self.node();
        if downstream {
            self.error(
                format!("Mapped bounded context '{}' is not upstream.", model[used].name),
                node,
                Feature::UsesBoundedContext,
            );
        }
        if !related {
            self.error(
                "Bounded contexts should have a relationship.".to_string(),
                node,
                Feature::UsesBoundedContext,
            );
        }
    }

    fn used_aggregate(&mut self, context: Option<ContextId>, aggregate: AggregateId) {
        let model = self.model;
        let node = self.node();
        if let Some(context) = context {
            if !model.context_aggregates(context).contains(&aggregate) {
                self.error(
                    format!(
                        "Aggregate does not belong to bounded context '{}'.",
                        model[context].name
                    ),
                    node,
                    Feature::UsesAggregate,
                );
            }
        }
        match model.root_entity(aggregate) {
            None => self.error(
                "Aggregate should have root entity.".to_string(),
                node,
                Feature::UsesAggregate,
            ),
            Some(root) if model.key_attribute(root).is_none() => self.error(
                format!(
                    "Root entity {} of mapped aggreagate should have a key attribute.",
                    model[root].name
                ),
                node,
                Feature::UsesAggregate,
            ),
            Some(_) => {}
        }
    }

    fn used_value_object(&mut self, aggregate: Option<AggregateId>, value_object: ObjectId) {
        let model = self.model;
        let node = self.node();
        let vo = &model[value_object];
        if let Some(aggregate) = aggregate {
            if !vo.is_value_object() || !model[aggregate].objects.contains(&value_object) {
                self.error(
                    format!(
                        "Value object does not belong to aggregate '{}'.",
                        model[aggregate].name
                    ),
                    node,
                    Feature::UsesValueObject,
                );
            }
        }

        let constructor_operations = vo.operations.iter().filter(|op| op.name == vo.name).count();
        let other_operations = vo.operations.len() - constructor_operations;
        if !vo.references.is_empty()
            || vo.repository.is_some()
            || other_operations > 0
            || constructor_operations > 1
        {
            self.error(
                format!("Value object '{}' can only have attributes and constructor.", vo.name),
                node,
                Feature::UsesValueObject,
            );
        }
        if vo.constructor.is_none() && constructor_operations == 0 {
            self.error(
                format!("Value object '{}' should have constructor.", vo.name),
                node,
                Feature::UsesValueObject,
            );
        }
    }

    fn attribute_uses(&mut self, variable: &str, target: Option<UsesTarget>) {
        let model = self.model;
        let mut used_names = Vec::new();

        for &attribute in &model[self.entity].attributes {
            let Some(attribute_uses) = &model[attribute].uses else {
                continue;
            };
            let node = NodeRef::Attribute { id: attribute };
            used_names.push(attribute_uses.attribute.as_str());

            if attribute_uses.variable != variable {
                self.sink.report(
                    Diagnostic::error(format!(
                        "Attribute {} must use variable {}.",
                        model[attribute].name, variable
                    ))
                    .at(node, Feature::Variable)
                    .with_suggestion(format!("uses {}.{}", variable, attribute_uses.attribute)),
                );
            }

            let Some(target) = target else {
                continue;
            };
            let (owner_name, used_type) = match target {
                UsesTarget::AntiCorruption(ac) => (
                    model[ac].name.as_str(),
                    model[ac]
                        .attributes
                        .iter()
                        .find(|t| t.name == attribute_uses.attribute)
                        .map(|t| t.ty.as_str()),
                ),
                UsesTarget::ValueObject(vo) => (
                    model[vo].name.as_str(),
                    model
                        .attribute_by_name(vo, &attribute_uses.attribute)
                        .map(|a| model[a].ty.as_str()),
                ),
            };
            match used_type {
                None => self.error(
                    format!(
                        "Attribute {} is not declared by {}.",
                        attribute_uses.attribute, owner_name
                    ),
                    node,
                    Feature::UsesAttribute,
                ),
                Some(ty) if ty != model[attribute].ty => self.error(
                    format!("Attribute type should be {}.", ty),
                    node,
                    Feature::Type,
                ),
                Some(_) => {}
            }
        }

        if let Some(UsesTarget::AntiCorruption(ac)) = target {
            let Some(key_translation) = key_translation(model, ac) else {
                return;
            };
            if !used_names.contains(&key_translation) {
                let node = self.node();
                self.error(
                    format!(
                        "Entity attributes should use the key attribute translation {}.",
                        key_translation
                    ),
                    node,
                    Feature::UsesAntiCorruption,
                );
            }
        }
    }
}

/// Name of the translation that carries the root key of the mapped aggregate.
fn key_translation(model: &Model, ac: AntiCorruptionId) -> Option<&str> {
    let anti_corruption = &model[ac];
    let root = model.root_entity(anti_corruption.aggregate?)?;
    let key = model.key_attribute(root)?;
    anti_corruption
        .attributes
        .iter()
        .find(|t| t.attribute == Some(key))
        .map(|t| t.name.as_str())
}

#[cfg(test)]
mod tests {
    use cml_common::{AttributeId, ContextMapId, Diagnostic};

    use super::*;
    use crate::model::{
        AntiCorruptionKind, BoundedContextType, Constructor, ModelBuilder, Operation, Repository,
    };
    use crate::semantic::test_support::errors;

    struct Upstream {
        builder: ModelBuilder,
        crm: ContextId,
        sales: ContextId,
        map: ContextMapId,
        clients: AggregateId,
        client_id: AttributeId,
        address: ObjectId,
        customer: ObjectId,
    }

    /// CRM owns Clients: root Client(clientId key) and value object
    /// Address(street, zip) with a constructor. Sales/Orders holds an entity
    /// Customer that will use Address.
    fn upstream() -> Upstream {
        let mut b = ModelBuilder::new();
        let crm = b.context("CRM", BoundedContextType::Feature);
        let sales = b.context("Sales", BoundedContextType::Feature);
        let clients = b.aggregate(crm, "Clients");
        let client = b.root_entity(clients, "Client");
        let client_id = b.key_attribute(client, "clientId", "String");
        let address = b.value_object(clients, "Address");
        b.attribute(address, "street", "String");
        b.attribute(address, "zip", "Integer");
        b.constructor(address, Constructor::default());
        let orders = b.aggregate(sales, "Orders");
        b.root_entity(orders, "Order");
        let customer = b.entity(orders, "Customer");
        let map = b.context_map("Landscape", None, &[crm, sales]);
        Upstream {
            builder: b,
            crm,
            sales,
            map,
            clients,
            client_id,
            address,
            customer,
        }
    }

    fn binding(u: &Upstream, anti_corruption: Option<&str>) -> EntityUses {
        EntityUses {
            bounded_context: Some(u.crm),
            aggregate: Some(u.clients),
            value_object: Some(u.address),
            anti_corruption: anti_corruption.map(str::to_string),
            variable: "addr".to_string(),
        }
    }

    fn run(builder: ModelBuilder, entity: ObjectId) -> Vec<Diagnostic> {
        let model = builder.build();
        let mut out = Vec::new();
        check_entity(&model, entity, &mut out);
        out
    }

    #[test]
    fn value_object_binding_is_clean() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.crm, u.sales);
        let uses = binding(&u, None);
        u.builder.entity_uses(u.customer, uses);
        let street = u.builder.attribute(u.customer, "street", "String");
        u.builder.attribute_uses(street, "addr", "street");
        assert!(run(u.builder, u.customer).is_empty());
    }

    #[test]
    fn downstream_context_cannot_be_used() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.sales, u.crm);
        let uses = binding(&u, None);
        u.builder.entity_uses(u.customer, uses);
        let out = run(u.builder, u.customer);
        assert_eq!(errors(&out), vec!["Mapped bounded context 'CRM' is not upstream."]);
        assert_eq!(out[0].feature(), Some(Feature::UsesBoundedContext));
    }

    #[test]
    fn unrelated_contexts() {
        let mut u = upstream();
        let uses = binding(&u, None);
        u.builder.entity_uses(u.customer, uses);
        assert_eq!(
            errors(&run(u.builder, u.customer)),
            vec!["Bounded contexts should have a relationship."]
        );
    }

    #[test]
    fn partnership_counts_as_relationship() {
        let mut u = upstream();
        u.builder.partnership(u.map, u.sales, u.crm);
        let uses = binding(&u, None);
        u.builder.entity_uses(u.customer, uses);
        assert!(run(u.builder, u.customer).is_empty());
    }

    #[test]
    fn root_cannot_use_and_body_restrictions() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.crm, u.sales);
        u.builder.repository(
            u.address,
            Repository {
                name: "AddressRepository".to_string(),
                operations: vec![],
            },
        );
        u.builder.operation(
            u.address,
            Operation {
                name: "normalize".to_string(),
                parameters: vec![],
                return_type: None,
                commands: vec![],
            },
        );
        let orders = u.builder.aggregate(u.sales, "Shipments");
        let shipment = u.builder.root_entity(orders, "Shipment");
        let uses = binding(&u, None);
        u.builder.entity_uses(shipment, uses);
        assert_eq!(
            errors(&run(u.builder, shipment)),
            vec![
                "Aggregate root 'Shipment' cannot use a value object.",
                "Value object 'Address' can only have attributes and constructor.",
            ]
        );
    }

    #[test]
    fn used_aggregate_rules() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.crm, u.sales);
        let archive = u.builder.aggregate(u.sales, "Archive");
        let note = u.builder.value_object(archive, "Note");
        let uses = EntityUses {
            bounded_context: Some(u.crm),
            aggregate: Some(archive),
            value_object: Some(note),
            anti_corruption: None,
            variable: "n".to_string(),
        };
        u.builder.entity_uses(u.customer, uses);
        assert_eq!(
            errors(&run(u.builder, u.customer)),
            vec![
                "Aggregate does not belong to bounded context 'CRM'.",
                "Aggregate should have root entity.",
                "Value object 'Note' should have constructor.",
            ]
        );
    }

    #[test]
    fn value_object_must_be_in_used_aggregate() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.crm, u.sales);
        let leads = u.builder.aggregate(u.crm, "Leads");
        let contact = u.builder.value_object(leads, "Contact");
        u.builder.constructor(contact, Constructor::default());
        let mut uses = binding(&u, None);
        uses.value_object = Some(contact);
        u.builder.entity_uses(u.customer, uses);
        assert_eq!(
            errors(&run(u.builder, u.customer)),
            vec!["Value object does not belong to aggregate 'Clients'."]
        );
    }

    #[test]
    fn attribute_uses_without_binding() {
        let mut u = upstream();
        let street = u.builder.attribute(u.customer, "street", "String");
        u.builder.attribute_uses(street, "addr", "street");
        let out = run(u.builder, u.customer);
        assert_eq!(
            errors(&out),
            vec!["Attribute street uses a binding but entity Customer does not use one."]
        );
        assert_eq!(out[0].node(), Some(NodeRef::Attribute { id: street }));
    }

    #[test]
    fn attribute_uses_through_value_object() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.crm, u.sales);
        let uses = binding(&u, None);
        u.builder.entity_uses(u.customer, uses);
        let zip = u.builder.attribute(u.customer, "zip", "String");
        u.builder.attribute_uses(zip, "address", "zip");
        let city = u.builder.attribute(u.customer, "city", "String");
        u.builder.attribute_uses(city, "addr", "city");
        let out = run(u.builder, u.customer);
        assert_eq!(
            errors(&out),
            vec![
                "Attribute zip must use variable addr.",
                "Attribute type should be Integer.",
                "Attribute city is not declared by Address.",
            ]
        );
        assert_eq!(out[0].suggestion.as_deref(), Some("uses addr.zip"));
    }

    #[test]
    fn anti_corruption_binding() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.crm, u.sales);
        let ac = u.builder.anti_corruption(
            u.sales,
            "ClientAcl",
            AntiCorruptionKind::Translation,
            u.crm,
            u.clients,
        );
        u.builder.translate(ac, "clientRef", "String", u.client_id);
        let uses = binding(&u, Some("ClientAcl"));
        u.builder.entity_uses(u.customer, uses);
        let client = u.builder.attribute(u.customer, "client", "String");
        u.builder.attribute_uses(client, "addr", "clientRef");
        assert!(run(u.builder, u.customer).is_empty());
    }

    #[test]
    fn anti_corruption_binding_errors() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.crm, u.sales);
        let ac = u.builder.anti_corruption(
            u.sales,
            "ClientAcl",
            AntiCorruptionKind::Translation,
            u.crm,
            u.clients,
        );
        u.builder.translate(ac, "clientRef", "String", u.client_id);
        let uses = binding(&u, Some("ClientAcl"));
        u.builder.entity_uses(u.customer, uses);
        let street = u.builder.attribute(u.customer, "street", "String");
        u.builder.attribute_uses(street, "addr", "street");
        let out = run(u.builder, u.customer);
        assert_eq!(
            errors(&out),
            vec![
                "Attribute street is not declared by ClientAcl.",
                "Entity attributes should use the key attribute translation clientRef.",
            ]
        );
        assert_eq!(out[1].feature(), Some(Feature::UsesAntiCorruption));
    }

    #[test]
    fn unknown_anti_corruption() {
        let mut u = upstream();
        u.builder.upstream_downstream(u.map, u.crm, u.sales);
        let uses = binding(&u, Some("Missing"));
        u.builder.entity_uses(u.customer, uses);
        assert_eq!(
            errors(&run(u.builder, u.customer)),
            vec!["Anti-corruption mapping Missing used by entity 'Customer' does not exist."]
        );
    }
}
