use std::collections::HashMap;

use cml_common::{Diagnostic, DiagnosticSink, Feature, NodeRef};

use crate::model::Model;

/// Name clashes across the whole model: bounded contexts, modules,
/// aggregates and domain objects model-wide, invariants per aggregate.
/// Every node carrying a duplicated name is reported.
pub fn check_uniqueness(model: &Model, sink: &mut dyn DiagnosticSink) {
    report_duplicates(
        sink,
        model
            .context_ids()
            .map(|id| (NodeRef::Context { id }, model[id].name.as_str())),
        |name| format!("Multiple bounded contexts with the name '{}' have been declared.", name),
    );
    report_duplicates(
        sink,
        model.context_ids().flat_map(|id| {
            model[id]
                .modules
                .iter()
                .map(move |&module| (NodeRef::Context { id }, model[module].name.as_str()))
        }),
        |name| format!("Duplicate name. There is already an existing Module named '{}'.", name),
    );
    report_duplicates(
        sink,
        model
            .aggregate_ids()
            .map(|id| (NodeRef::Aggregate { id }, model[id].name.as_str())),
        |name| format!("Multiple aggregates with the name '{}' have been declared.", name),
    );
    report_duplicates(
        sink,
        model
            .object_ids()
            .map(|id| (NodeRef::DomainObject { id }, model[id].name.as_str())),
        |name| format!("Multiple domain objects with the name '{}' have been declared.", name),
    );
    for aggregate in model.aggregate_ids() {
        report_duplicates(
            sink,
            model[aggregate]
                .invariants
                .iter()
                .enumerate()
                .map(|(index, inv)| (NodeRef::IntraInvariant { aggregate, index }, inv.name.as_str())),
            |name| format!("Multiple invariantes with the name '{}' have been declared.", name),
        );
    }
}

fn report_duplicates<'a>(
    sink: &mut dyn DiagnosticSink,
    named: impl Iterator<Item = (NodeRef, &'a str)>,
    message: impl Fn(&str) -> String,
) {
    let named: Vec<_> = named.collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, name) in &named {
        *counts.entry(*name).or_default() += 1;
    }
    for (node, name) in named {
        if counts[name] > 1 {
            sink.report(Diagnostic::error(message(name)).at(node, Feature::Name));
        }
    }
}
