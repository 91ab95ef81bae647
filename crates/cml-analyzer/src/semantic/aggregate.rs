use std::collections::HashSet;

use cml_common::{AggregateId, Diagnostic, DiagnosticSink, Feature, NodeRef, ObjectId, ReferenceId};

use crate::model::{AttributePathHead, CollectionKind, DomainObjectKind, EntityMapping, Model};

/// Aggregate-local structural rules: a single root, a single lifecycle
/// enum, and well-formed entity mappings.
pub fn check_aggregate(model: &Model, aggregate: AggregateId, sink: &mut dyn DiagnosticSink) {
    let mut check = AggregateCheck { model, sink };
    check.single_root(aggregate);
    check.single_lifecycle_enum(aggregate);
    for &object in &model[aggregate].objects {
        if let Some(mapping) = model[object].entity().and_then(|e| e.mapping.as_ref()) {
            check.entity_mapping(object, mapping);
        }
    }
}

struct AggregateCheck<'m, 's> {
    model: &'m Model,
    sink: &'s mut dyn DiagnosticSink,
}

impl AggregateCheck<'_, '_> {
    fn error(&mut self, message: String, node: NodeRef, feature: Feature) {
        self.sink.report(Diagnostic::error(message).at(node, feature));
    }

    fn single_root(&mut self, aggregate: AggregateId) {
        let model = self.model;
        let roots: Vec<ObjectId> = model[aggregate]
            .objects
            .iter()
            .copied()
            .filter(|&o| model[o].aggregate_root)
            .collect();
        if roots.len() > 1 {
            for root in roots {
                self.error(
                    format!(
                        "Your aggregate '{}' contains multiple aggregate roots. An aggregate must only contain one root.",
                        model[aggregate].name
                    ),
                    NodeRef::DomainObject { id: root },
                    Feature::AggregateRoot,
                );
            }
        }
    }

    fn single_lifecycle_enum(&mut self, aggregate: AggregateId) {
        let model = self.model;
        let enums: Vec<ObjectId> = model[aggregate]
            .objects
            .iter()
            .copied()
            .filter(|&o| {
                matches!(
                    model[o].kind,
                    DomainObjectKind::Enum {
                        defines_aggregate_lifecycle: true
                    }
                )
            })
            .collect();
        if enums.len() > 1 {
            for id in enums {
                self.error(
                    format!(
                        "Your aggregate '{}' contains multiple enums that define its states. Ensure that only one enum declares the states of the Aggregate.",
                        model[aggregate].name
                    ),
                    NodeRef::DomainObject { id },
                    Feature::DefinesAggregateLifecycle,
                );
            }
        }
    }

    fn entity_mapping(&mut self, entity: ObjectId, mapping: &EntityMapping) {
        let model = self.model;
        let node = NodeRef::DomainObject { id: entity };

        if model[entity].aggregate_root {
            self.error(
                format!("Aggregate root '{}' cannot declare an entity mapping.", model[entity].name),
                node,
                Feature::Mapping,
            );
        }
        let Some(mapped) = mapping.entity else {
            self.error(
                format!("Entity mapping of '{}' does not resolve to an entity.", model[entity].name),
                NodeRef::EntityMapping { entity },
                Feature::Entity,
            );
            return;
        };
        if !model[mapped].is_root_entity() {
            self.error(
                format!("Mapped entity '{}' must be an aggregate root.", model[mapped].name),
                node,
                Feature::Mapping,
            );
        }
        let key = model.key_attribute(mapped);
        if key.is_none() {
            self.error(
                format!(
                    "Root entity {} of mapped aggreagate should have a key attribute.",
                    model[mapped].name
                ),
                NodeRef::DomainObject { id: mapped },
                Feature::Mapping,
            );
        }

        // Alias name -> entity it stands for.
        let mut aliases: Vec<(&str, ObjectId)> = Vec::new();
        for (index, alias) in mapping.aliases.iter().enumerate() {
            let alias_node = NodeRef::AliasDeclaration { entity, index };
            if aliases.iter().any(|(name, _)| *name == alias.name) {
                self.error(
                    format!("Alias {} is declared more than once.", alias.name),
                    alias_node,
                    Feature::Name,
                );
            }
            let target = self.walk_references(mapped, &alias.references, alias_node);
            aliases.push((&alias.name, target));
        }

        let mut mapped_attributes = HashSet::new();
        let mut names = HashSet::new();
        for (index, attribute_mapping) in mapping.attributes.iter().enumerate() {
            let mapping_node = NodeRef::AttributeMapping { entity, index };
            if !names.insert(attribute_mapping.name.as_str()) {
                self.error(
                    format!("Attribute {} is mapped more than once.", attribute_mapping.name),
                    mapping_node,
                    Feature::Name,
                );
            }

            let path = &attribute_mapping.path;
            let start = match &path.head {
                AttributePathHead::Root => mapped,
                AttributePathHead::Alias(name) => {
                    match aliases.iter().rev().find(|(alias, _)| *alias == name.as_str()) {
                        Some(&(_, target)) => target,
                        None => {
                            self.error(
                                format!("Alias {} is not declared.", name),
                                mapping_node,
                                Feature::AttributePathHead,
                            );
                            continue;
                        }
                    }
                }
            };
            let owner = self.walk_references(start, &path.references, mapping_node);
            let Some(attribute) = model.attribute_by_name(owner, &path.attribute) else {
                self.error(
                    format!(
                        "Attribute {} in path is not an attribute of entity {}.",
                        path.attribute, model[owner].name
                    ),
                    mapping_node,
                    Feature::Attribute,
                );
                continue;
            };
            if model[attribute].ty != attribute_mapping.ty {
                self.error(
                    format!("Attribute mapping type should be {}.", model[attribute].ty),
                    mapping_node,
                    Feature::Type,
                );
            }
            mapped_attributes.insert(attribute);
        }

        if let Some(key) = key {
            if !mapped_attributes.contains(&key) {
                self.error(
                    format!(
                        "Key attribute {} of the mapped root entity is not mapped.",
                        model[key].name
                    ),
                    node,
                    Feature::Mapping,
                );
            }
        }
    }

    /// Follow a reference path from `start`. Every step must be a
    /// single-valued reference of the current entity to another entity;
    /// offending steps are reported and skipped.
    fn walk_references(
        &mut self,
        start: ObjectId,
        references: &[ReferenceId],
        node: NodeRef,
    ) -> ObjectId {
        let model = self.model;
        let mut current = start;
        for (index, &reference) in references.iter().enumerate() {
            let declared = &model[reference];
            let message = if !model[current].references.contains(&reference) {
                format!(
                    "Reference {} in path is not a reference of entity {}.",
                    declared.name, model[current].name
                )
            } else if declared.collection != CollectionKind::None {
                format!("Reference {} in path must not be a collection.", declared.name)
            } else {
                match declared.target {
                    Some(target) if model[target].is_entity() => {
                        current = target;
                        continue;
                    }
                    _ => format!("Reference {} in path does not refer to an entity.", declared.name),
                }
            };
            self.sink.report(
                Diagnostic::error(message)
                    .at(node, Feature::References)
                    .with_index(index),
            );
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use cml_common::Diagnostic;

    use super::*;
    use crate::model::{
        AliasDeclaration, AttributePath, BoundedContextType, EntityAttributeMapping, ModelBuilder,
    };
    use crate::semantic::test_support::errors;

    fn run(builder: ModelBuilder, aggregate: AggregateId) -> Vec<Diagnostic> {
        let model = builder.build();
        let mut out = Vec::new();
        check_aggregate(&model, aggregate, &mut out);
        out
    }

    #[test]
    fn every_excess_root_is_reported() {
        let mut b = ModelBuilder::new();
        let ctx = b.context("Sales", BoundedContextType::Feature);
        let agg = b.aggregate(ctx, "Order");
        let first = b.root_entity(agg, "Order");
        b.entity(agg, "Line");
        let second = b.root_entity(agg, "Shipment");
        let out = run(b, agg);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].node(), Some(NodeRef::DomainObject { id: first }));
        assert_eq!(out[1].node(), Some(NodeRef::DomainObject { id: second }));
        assert!(out.iter().all(|d| d.feature() == Some(Feature::AggregateRoot)));
        assert_eq!(
            out[0].message,
            "Your aggregate 'Order' contains multiple aggregate roots. An aggregate must only contain one root."
        );
    }

    #[test]
    fn single_root_is_fine() {
        let mut b = ModelBuilder::new();
        let ctx = b.context("Sales", BoundedContextType::Feature);
        let agg = b.aggregate(ctx, "Order");
        b.root_entity(agg, "Order");
        b.lifecycle_enum(agg, "OrderState");
        assert!(run(b, agg).is_empty());
    }

    #[test]
    fn multiple_lifecycle_enums() {
        let mut b = ModelBuilder::new();
        let ctx = b.context("Sales", BoundedContextType::Feature);
        let agg = b.aggregate(ctx, "Order");
        b.lifecycle_enum(agg, "OrderState");
        b.lifecycle_enum(agg, "PaymentState");
        let out = run(b, agg);
        assert_eq!(out.len(), 2);
        assert!(out
            .iter()
            .all(|d| d.feature() == Some(Feature::DefinesAggregateLifecycle)));
    }

    struct Crm {
        builder: ModelBuilder,
        local: AggregateId,
        customer: ObjectId,
        client: ObjectId,
        address_ref: ReferenceId,
        lines_ref: ReferenceId,
    }

    /// `Client` (root of CRM.Clients) with `clientId` key, `name`, a single
    /// `address -> Address(city)` and a list `lines -> Line`. `Customer`
    /// in Sales.Orders declares the mapping.
    fn crm() -> Crm {
        let mut b = ModelBuilder::new();
        let crm = b.context("CRM", BoundedContextType::Feature);
        let clients = b.aggregate(crm, "Clients");
        let client = b.root_entity(clients, "Client");
        let address = b.entity(clients, "Address");
        let line = b.entity(clients, "Line");
        b.key_attribute(client, "clientId", "String");
        b.attribute(client, "name", "String");
        b.attribute(address, "city", "String");
        let address_ref = b.reference(client, "address", address, CollectionKind::None);
        let lines_ref = b.reference(client, "lines", line, CollectionKind::List);

        let sales = b.context("Sales", BoundedContextType::Feature);
        let local = b.aggregate(sales, "Orders");
        b.root_entity(local, "Order");
        let customer = b.entity(local, "Customer");
        Crm {
            builder: b,
            local,
            customer,
            client,
            address_ref,
            lines_ref,
        }
    }

    fn mapped(
        name: &str,
        ty: &str,
        head: AttributePathHead,
        references: Vec<ReferenceId>,
        attribute: &str,
    ) -> EntityAttributeMapping {
        EntityAttributeMapping {
            name: name.to_string(),
            ty: ty.to_string(),
            path: AttributePath {
                head,
                references,
                attribute: attribute.to_string(),
            },
        }
    }

    fn mapping(
        client: ObjectId,
        aliases: Vec<AliasDeclaration>,
        attributes: Vec<EntityAttributeMapping>,
    ) -> EntityMapping {
        EntityMapping {
            bounded_context: "CRM".to_string(),
            aggregate: "Clients".to_string(),
            entity: Some(client),
            aliases,
            attributes,
        }
    }

    #[test]
    fn well_formed_mapping() {
        let mut crm = crm();
        let m = mapping(
            crm.client,
            vec![AliasDeclaration {
                name: "addr".to_string(),
                references: vec![crm.address_ref],
            }],
            vec![
                mapped("id", "String", AttributePathHead::Root, vec![], "clientId"),
                mapped("city", "String", AttributePathHead::Alias("addr".into()), vec![], "city"),
            ],
        );
        crm.builder.entity_mapping(crm.customer, m);
        let out = run(crm.builder, crm.local);
        assert!(out.is_empty(), "{:?}", out);
    }

    #[test]
    fn mapped_root_without_key() {
        let mut b = ModelBuilder::new();
        let crm = b.context("CRM", BoundedContextType::Feature);
        let clients = b.aggregate(crm, "Clients");
        let client = b.root_entity(clients, "Client");
        b.attribute(client, "name", "String");
        let sales = b.context("Sales", BoundedContextType::Feature);
        let local = b.aggregate(sales, "Orders");
        let customer = b.entity(local, "Customer");
        b.entity_mapping(
            customer,
            mapping(
                client,
                vec![],
                vec![mapped("name", "String", AttributePathHead::Root, vec![], "name")],
            ),
        );
        let out = run(b, local);
        assert_eq!(
            errors(&out),
            vec!["Root entity Client of mapped aggreagate should have a key attribute."]
        );
        assert_eq!(out[0].node(), Some(NodeRef::DomainObject { id: client }));
    }

    #[test]
    fn mapping_entity_rules() {
        let mut crm = crm();
        let mut m = mapping(
            crm.client,
            vec![],
            vec![
                mapped("name", "Integer", AttributePathHead::Root, vec![], "name"),
                mapped("name", "String", AttributePathHead::Root, vec![], "name"),
                mapped("x", "String", AttributePathHead::Alias("nope".into()), vec![], "name"),
                mapped("y", "String", AttributePathHead::Root, vec![], "missing"),
            ],
        );
        m.aliases.push(AliasDeclaration {
            name: "many".to_string(),
            references: vec![crm.lines_ref],
        });
        crm.builder.entity_mapping(crm.customer, m);
        let out = run(crm.builder, crm.local);
        assert_eq!(
            errors(&out),
            vec![
                "Reference lines in path must not be a collection.",
                "Attribute mapping type should be String.",
                "Attribute name is mapped more than once.",
                "Alias nope is not declared.",
                "Attribute missing in path is not an attribute of entity Client.",
                "Key attribute clientId of the mapped root entity is not mapped.",
            ]
        );
    }

    #[test]
    fn mapping_must_target_a_root_from_a_non_root() {
        let mut b = ModelBuilder::new();
        let crm = b.context("CRM", BoundedContextType::Feature);
        let clients = b.aggregate(crm, "Clients");
        let contact = b.entity(clients, "Contact");
        b.key_attribute(contact, "contactId", "String");
        let sales = b.context("Sales", BoundedContextType::Feature);
        let local = b.aggregate(sales, "Orders");
        let order = b.root_entity(local, "Order");
        b.entity_mapping(
            order,
            mapping(
                contact,
                vec![],
                vec![mapped("id", "String", AttributePathHead::Root, vec![], "contactId")],
            ),
        );
        assert_eq!(
            errors(&run(b, local)),
            vec![
                "Aggregate root 'Order' cannot declare an entity mapping.",
                "Mapped entity 'Contact' must be an aggregate root.",
            ]
        );
    }

    #[test]
    fn duplicate_alias_and_foreign_reference() {
        let mut crm = crm();
        let m = mapping(
            crm.client,
            vec![
                AliasDeclaration {
                    name: "addr".to_string(),
                    references: vec![crm.address_ref],
                },
                AliasDeclaration {
                    name: "addr".to_string(),
                    references: vec![crm.address_ref, crm.address_ref],
                },
            ],
            vec![mapped("id", "String", AttributePathHead::Root, vec![], "clientId")],
        );
        crm.builder.entity_mapping(crm.customer, m);
        let out = run(crm.builder, crm.local);
        assert_eq!(
            errors(&out),
            vec![
                "Alias addr is declared more than once.",
                "Reference address in path is not a reference of entity Address.",
            ]
        );
        let location = out[1].location.unwrap();
        assert_eq!(location.node, NodeRef::AliasDeclaration { entity: crm.customer, index: 1 });
        assert_eq!(location.index, Some(1));
    }
}
