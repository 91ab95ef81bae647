pub mod aggregate;
pub mod constructor;
pub mod context_map;
pub mod entity;
pub mod expression;
pub mod mapping;
pub mod path;
pub mod scope;
pub mod types;
pub mod uniqueness;

#[cfg(test)]
mod test_support;

use cml_common::{
    AggregateId, AnalyzerConfig, AntiCorruptionId, CheckGroup, ContextId, ContextMapId,
    DiagnosticBag, DiagnosticSink, ObjectId, TernaryPolicy,
};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::model::{AntiCorruptionKind, Model};

pub use aggregate::check_aggregate;
pub use constructor::{check_constructor, check_operation};
pub use context_map::{check_bounded_context, check_context_map};
pub use entity::check_entity;
pub use expression::{check_inter_invariant, check_intra_invariant, infer_type, ExpressionChecker};
pub use mapping::check_anti_corruption;
pub use scope::{ScopeKind, ScopeVars};
pub use types::Type;
pub use uniqueness::check_uniqueness;

/// Run every enabled check group over the model.
///
/// Checks run per top-level node: model-wide uniqueness, then bounded
/// contexts, context maps, aggregates, domain objects and anti-corruption
/// declarations, each in declaration order. With `config.parallel` the
/// nodes are checked on the rayon pool; the output order is the same.
pub fn analyze(model: &Model, config: &AnalyzerConfig) -> DiagnosticBag {
    let units = units(model);
    debug!(units = units.len(), parallel = config.parallel, "analyzing model");

    let bags: Vec<DiagnosticBag> = if config.parallel {
        units.par_iter().map(|unit| unit.check(model, config)).collect()
    } else {
        units.iter().map(|unit| unit.check(model, config)).collect()
    };

    let mut all = DiagnosticBag::new();
    for bag in bags {
        all.extend(bag);
    }
    info!(
        diagnostics = all.len(),
        errors = all.diagnostics().iter().filter(|d| d.is_error()).count(),
        "analysis finished"
    );
    all
}

/// Like [`analyze`], forwarding into a caller-owned sink.
pub fn analyze_into(model: &Model, config: &AnalyzerConfig, sink: &mut dyn DiagnosticSink) {
    analyze(model, config).drain_into(sink);
}

/// Intra-aggregate invariants of one aggregate.
pub fn check_invariants(
    model: &Model,
    aggregate: AggregateId,
    policy: TernaryPolicy,
    sink: &mut dyn DiagnosticSink,
) {
    for index in 0..model[aggregate].invariants.len() {
        check_intra_invariant(model, aggregate, index, policy, sink);
    }
}

/// Inter-aggregate invariants of one anti-corruption translation. Mappings
/// carry no invariants.
pub fn check_translation_invariants(
    model: &Model,
    anti_corruption: AntiCorruptionId,
    policy: TernaryPolicy,
    sink: &mut dyn DiagnosticSink,
) {
    let ac = &model[anti_corruption];
    if ac.kind != AntiCorruptionKind::Translation {
        return;
    }
    for index in 0..ac.invariants.len() {
        check_inter_invariant(model, anti_corruption, index, policy, sink);
    }
}

/// A top-level node the analyzer visits independently.
#[derive(Debug, Clone, Copy)]
enum Unit {
    Names,
    Context(ContextId),
    ContextMap(ContextMapId),
    Aggregate(AggregateId),
    Object(ObjectId),
    AntiCorruption(AntiCorruptionId),
}

fn units(model: &Model) -> Vec<Unit> {
    std::iter::once(Unit::Names)
        .chain(model.context_ids().map(Unit::Context))
        .chain(model.context_map_ids().map(Unit::ContextMap))
        .chain(model.aggregate_ids().map(Unit::Aggregate))
        .chain(model.object_ids().map(Unit::Object))
        .chain(model.anti_corruption_ids().map(Unit::AntiCorruption))
        .collect()
}

impl Unit {
    fn check(self, model: &Model, config: &AnalyzerConfig) -> DiagnosticBag {
        let mut bag = DiagnosticBag::new();
        let policy = config.ternary_branches;
        let on = |group| config.enabled(group);

        match self {
            Unit::Names => {
                if on(CheckGroup::Uniqueness) {
                    check_uniqueness(model, &mut bag);
                }
            }
            Unit::Context(id) => {
                if on(CheckGroup::ContextMap) {
                    check_bounded_context(model, id, &mut bag);
                }
            }
            Unit::ContextMap(id) => {
                if on(CheckGroup::ContextMap) {
                    check_context_map(model, id, &mut bag);
                }
            }
            Unit::Aggregate(id) => {
                if on(CheckGroup::Aggregate) {
                    check_aggregate(model, id, &mut bag);
                }
                if on(CheckGroup::Invariant) {
                    check_invariants(model, id, policy, &mut bag);
                }
            }
            Unit::Object(id) => {
                if on(CheckGroup::Entity) {
                    check_entity(model, id, &mut bag);
                }
                if on(CheckGroup::Constructor) {
                    check_constructor(model, id, policy, &mut bag);
                }
                if on(CheckGroup::Operation) {
                    for index in 0..model[id].operations.len() {
                        check_operation(model, id, index, policy, &mut bag);
                    }
                }
            }
            Unit::AntiCorruption(id) => {
                if on(CheckGroup::AntiCorruption) {
                    check_anti_corruption(model, id, &mut bag);
                }
                if on(CheckGroup::Invariant) {
                    check_translation_invariants(model, id, policy, &mut bag);
                }
            }
        }

        if !bag.is_empty() {
            debug!(unit = ?self, diagnostics = bag.len(), "checked");
        }
        bag
    }
}
