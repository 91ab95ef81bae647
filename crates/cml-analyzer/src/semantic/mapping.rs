//! Anti-corruption mappings and translations: the mapped side must be an
//! upstream context, and every attribute must resolve on the mapped
//! aggregate with the declared type.

use std::collections::HashSet;

use cml_common::{AntiCorruptionId, Diagnostic, DiagnosticSink, Feature, NodeRef};

use crate::model::{AntiCorruptionKind, Model};

pub fn check_anti_corruption(model: &Model, id: AntiCorruptionId, sink: &mut dyn DiagnosticSink) {
    let ac = &model[id];
    let node = NodeRef::AntiCorruption { id };
    let mut error = |message: String, node: NodeRef, feature: Feature| {
        sink.report(Diagnostic::error(message).at(node, feature));
    };
    let (verb, noun) = match ac.kind {
        AntiCorruptionKind::Mapping => ("mapped", "mapping"),
        AntiCorruptionKind::Translation => ("translated", "translation"),
    };

    match ac.bounded_context {
        Some(mapped) => {
            let upstream = model
                .context_map_of(mapped)
                .is_some_and(|map| model.is_upstream_of(map, mapped, ac.owner));
            if !upstream {
                error(
                    format!("Mapped bounded context '{}' is not upstream.", model[mapped].name),
                    node,
                    Feature::BoundedContext,
                );
            }
            if let Some(aggregate) = ac.aggregate {
                if !model.context_aggregates(mapped).contains(&aggregate) {
                    error(
                        format!(
                            "Mapped aggregate '{}' does not belong to the mapped bounded context.",
                            model[aggregate].name
                        ),
                        node,
                        Feature::Aggregate,
                    );
                }
            }
        }
        None => error(
            format!("Mapped bounded context of '{}' is not defined.", ac.name),
            node,
            Feature::BoundedContext,
        ),
    }
    let Some(aggregate) = ac.aggregate else {
        error(
            format!("Mapped aggregate of '{}' is not defined.", ac.name),
            node,
            Feature::Aggregate,
        );
        return;
    };

    let root_key = model
        .root_entity(aggregate)
        .and_then(|root| model.key_attribute(root).map(|key| (root, key)));
    let mut key_covered = false;
    let mut names = HashSet::new();

    for (index, translation) in ac.attributes.iter().enumerate() {
        let attribute_node = NodeRef::AttributeTranslation { owner: id, index };
        if !names.insert(translation.name.as_str()) {
            error(
                format!("Attribute {} is {} more than once.", translation.name, verb),
                attribute_node,
                Feature::Name,
            );
        }

        let (Some(entity), Some(attribute)) = (translation.entity, translation.attribute) else {
            error(
                format!("Attribute {} does not name an entity attribute.", translation.name),
                attribute_node,
                Feature::Attribute,
            );
            continue;
        };
        if !model[entity].is_entity() || !model[aggregate].objects.contains(&entity) {
            error(
                format!(
                    "Mapped entity '{}' does not belong to the mapped aggregate.",
                    model[entity].name
                ),
                attribute_node,
                Feature::Entity,
            );
        }
        let Some(resolved) = model.attribute_by_name(entity, &model[attribute].name) else {
            error(
                format!(
                    "Mapped attribute '{}' does not belong to the mapped entity.",
                    model[attribute].name
                ),
                attribute_node,
                Feature::Attribute,
            );
            continue;
        };
        if model[resolved].ty != translation.ty {
            error(
                format!("Attribute {} type should be {}.", noun, model[resolved].ty),
                attribute_node,
                Feature::Type,
            );
        }
        if root_key == Some((entity, resolved)) {
            key_covered = true;
        }
    }

    if !key_covered {
        error(
            format!(
                "Root entity of aggregate '{}' and its key attribute should be mapped.",
                model[aggregate].name
            ),
            node,
            Feature::Aggregate,
        );
    }

    if ac.kind == AntiCorruptionKind::Translation {
        let mut invariant_names = HashSet::new();
        for (index, invariant) in ac.invariants.iter().enumerate() {
            if !invariant_names.insert(invariant.name.as_str()) {
                error(
                    format!("Invariant {} is declared more than once.", invariant.name),
                    NodeRef::InterInvariant { owner: id, index },
                    Feature::Name,
                );
            }
        }
    }
}
