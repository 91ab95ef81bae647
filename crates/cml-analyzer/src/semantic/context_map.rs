use cml_common::{
    ContextId, ContextMapId, Diagnostic, DiagnosticSink, Feature, NodeRef, ObjectId,
    RelationshipId,
};

use crate::model::{
    BoundedContextType, ContextMapType, DownstreamRole, EntityMapping, Model, Relationship,
    UpstreamRole,
};

/// Rules over one context map: relationship participants and roles,
/// exposed aggregates, the map type, and entity mappings between the
/// contexts on the map.
pub fn check_context_map(model: &Model, map: ContextMapId, sink: &mut dyn DiagnosticSink) {
    let mut check = ContextMapCheck { model, map, sink };
    for &relationship in &model[map].relationships {
        check.relationship(relationship);
    }
    check.map_type();
    check.entity_mappings();
}

/// Team rules for one bounded context: only teams realize contexts, and an
/// owner must be a team.
pub fn check_bounded_context(model: &Model, context: ContextId, sink: &mut dyn DiagnosticSink) {
    let ctx = &model[context];
    let node = NodeRef::Context { id: context };
    if !ctx.realizes.is_empty() && ctx.kind != BoundedContextType::Team {
        sink.report(
            Diagnostic::error(format!(
                "Only teams can realize bounded contexts. '{}' is not a team!",
                ctx.name
            ))
            .at(node, Feature::Realizes),
        );
    }
    if let Some(owner) = ctx.owner {
        if model[owner].kind != BoundedContextType::Team {
            sink.report(
                Diagnostic::error(format!(
                    "'{}' is not a team. The owner attribute must refer to a Bounded Context representing a team (type = TEAM)!",
                    model[owner].name
                ))
                .at(node, Feature::Owner),
            );
        }
    }
}

struct ContextMapCheck<'m, 's> {
    model: &'m Model,
    map: ContextMapId,
    sink: &'s mut dyn DiagnosticSink,
}

impl ContextMapCheck<'_, '_> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.sink.report(diagnostic);
    }

    fn on_map(&self, context: ContextId) -> bool {
        self.model[self.map].contexts.contains(&context)
    }

    fn relationship(&mut self, id: RelationshipId) {
        let model = self.model;
        let relationship = &model[id];
        let node = NodeRef::Relationship { id };
        let (first, second) = relationship.participants();
        let (first_feature, second_feature) = match relationship {
            Relationship::Symmetric { .. } => (Feature::Participant1, Feature::Participant2),
            Relationship::UpstreamDownstream { .. } => (Feature::Upstream, Feature::Downstream),
        };

        for (context, feature) in [(first, first_feature), (second, second_feature)] {
            if let Some(context) = context {
                if !self.on_map(context) {
                    self.report(
                        Diagnostic::error(format!(
                            "The Bounded Context '{}' is not part of the Context Map.",
                            model[context].name
                        ))
                        .at(node, feature),
                    );
                }
            }
        }
        if first.is_some() && first == second {
            self.report(
                Diagnostic::error(
                    "Bounded context relationships must be declared between two different bounded contexts.",
                )
                .at(node, second_feature),
            );
        }

        let Relationship::UpstreamDownstream {
            customer_supplier,
            upstream,
            upstream_roles,
            downstream_roles,
            exposed_aggregates,
            ..
        } = relationship
        else {
            return;
        };

        if let Some(upstream) = *upstream {
            let owned = model.context_aggregates(upstream);
            for (index, aggregate) in exposed_aggregates.iter().enumerate() {
                if !owned.contains(aggregate) {
                    self.report(
                        Diagnostic::error(format!(
                            "The aggregate '{}' is not part of the upstream context '{}'.",
                            model[*aggregate].name, model[upstream].name
                        ))
                        .at(node, Feature::UpstreamExposedAggregates)
                        .with_index(index),
                    );
                }
            }
        }

        if *customer_supplier {
            if downstream_roles.contains(&DownstreamRole::Conformist) {
                self.report(
                    Diagnostic::error(
                        "The CONFORMIST pattern is not applicable for a Customer-Supplier relationship.",
                    )
                    .at(node, Feature::DownstreamRoles),
                );
            }
            if upstream_roles.contains(&UpstreamRole::OpenHostService) {
                self.report(
                    Diagnostic::error(
                        "The OPEN-HOST SERVICE pattern is not applicable for a Customer-Supplier relationship.",
                    )
                    .at(node, Feature::UpstreamRoles),
                );
            }
            if downstream_roles.contains(&DownstreamRole::AntiCorruptionLayer) {
                self.report(
                    Diagnostic::warning(
                        "Are you sure you need an ANTICORRUPTION LAYER here? This pattern should not be necessarily needed in a Customer-Supplier relationship.",
                    )
                    .at(node, Feature::DownstreamRoles),
                );
            }
        }
    }

    fn map_type(&mut self) {
        let model = self.model;
        let map = &model[self.map];
        let node = NodeRef::ContextMap { id: self.map };
        match map.kind {
            Some(ContextMapType::Organizational) => {
                let has_team = map
                    .contexts
                    .iter()
                    .any(|&c| model[c].kind == BoundedContextType::Team);
                if !has_team {
                    self.report(
                        Diagnostic::warning(
                            "Your Context Map is of the type ORGANIZATIONAL but does not contain Bounded Contexts of the type TEAM. This type of Context Map is intended to model team relationships.",
                        )
                        .at(node, Feature::Type),
                    );
                }
            }
            Some(ContextMapType::SystemLandscape) => {
                for (index, &context) in map.contexts.iter().enumerate() {
                    if model[context].kind == BoundedContextType::Team {
                        self.report(
                            Diagnostic::error(
                                "A Bounded Context of type 'TEAM' is not allowed on a SYSTEM_LANDSCAPE map.",
                            )
                            .at(node, Feature::BoundedContexts)
                            .with_index(index),
                        );
                    }
                }
            }
            None => {}
        }
    }

    /// Entities of contexts on this map that mirror a root entity of
    /// another context on the map.
    fn entity_mappings(&mut self) {
        let model = self.model;
        for &context in &model[self.map].contexts {
            for aggregate in model.context_aggregates(context) {
                for &object in &model[aggregate].objects {
                    if let Some(mapping) = model[object].entity().and_then(|e| e.mapping.as_ref()) {
                        self.entity_mapping(context, object, mapping);
                    }
                }
            }
        }
    }

    fn entity_mapping(&mut self, owner: ContextId, entity: ObjectId, mapping: &EntityMapping) {
        let model = self.model;
        let node = NodeRef::DomainObject { id: entity };
        let mapped_contexts: Vec<ContextId> = model[self.map]
            .contexts
            .iter()
            .copied()
            .filter(|&c| model[c].name == mapping.bounded_context)
            .collect();

        if mapped_contexts.is_empty() {
            self.report(
                Diagnostic::error(format!(
                    "Mapped bounded context '{}' does not exist.",
                    mapping.bounded_context
                ))
                .at(node, Feature::Mapping),
            );
        }

        let upstream = model[self.map].relationships.iter().any(|&r| {
            matches!(
                model[r].upstream_downstream(),
                Some((Some(up), Some(down)))
                    if model[down].name == model[owner].name
                        && model[up].name == mapping.bounded_context
            )
        });
        if !upstream {
            self.report(
                Diagnostic::error(format!(
                    "Mapped bounded context '{}' is not upstream.",
                    mapping.bounded_context
                ))
                .at(node, Feature::Mapping),
            );
        }

        let aggregates: Vec<_> = mapped_contexts
            .iter()
            .flat_map(|&c| model.context_aggregates(c))
            .filter(|&a| model[a].name == mapping.aggregate)
            .collect();
        if aggregates.is_empty() {
            self.report(
                Diagnostic::error(format!(
                    "Mapped aggregate '{}' does not belong to the mapped bounded context.",
                    mapping.aggregate
                ))
                .at(node, Feature::Mapping),
            );
        }

        if let Some(mapped) = mapping.entity {
            let belongs = aggregates
                .iter()
                .any(|&a| model[a].objects.contains(&mapped) && model[mapped].is_entity());
            if !belongs {
                self.report(
                    Diagnostic::error(format!(
                        "Mapped entity '{}' does not belong to the mapped aggregate.",
                        model[mapped].name
                    ))
                    .at(node, Feature::Mapping),
                );
            }
        }
    }
}
