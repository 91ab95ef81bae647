//! Constructors and constructor-like operations (an operation named after
//! its owner). Both share one set of rules over parameters and the
//! attribute assignments of their body.

use std::collections::HashSet;

use cml_common::{
    AggregateId, Callable, Diagnostic, DiagnosticSink, Feature, NodeRef, ObjectId, TernaryPolicy,
};

use crate::model::{
    CollectionKind, Command, DomainObjectKind, Expr, ExprKind, Model, Parameter, PathHead,
    TypeTarget,
};

use super::expression::{
    check_assignment_expression, complex_type, declared_attribute_type, ExpressionChecker,
};
use super::scope::ScopeVars;

pub fn check_constructor(
    model: &Model,
    object: ObjectId,
    policy: TernaryPolicy,
    sink: &mut dyn DiagnosticSink,
) {
    let Some(constructor) = &model[object].constructor else {
        return;
    };
    let assignments: Vec<Assigned<'_>> = constructor
        .assignments
        .iter()
        .enumerate()
        .map(|(index, a)| Assigned {
            index,
            attribute: &a.attribute,
            expression: &a.expression,
        })
        .collect();

    let mut check = CallableCheck {
        model,
        object,
        callable: Callable::Constructor { object },
        kind: "Constructor",
        sink,
    };
    check.parameters(&constructor.parameters);
    check.key_mapped(&constructor.parameters, &assignments);
    check.coverage(&assignments, Feature::Attribute);
    check.assignment_types(&constructor.parameters, &assignments, policy);
}

/// Operations not named after their owner are ordinary methods and are not
/// checked here.
pub fn check_operation(
    model: &Model,
    object: ObjectId,
    index: usize,
    policy: TernaryPolicy,
    sink: &mut dyn DiagnosticSink,
) {
    let Some(operation) = model[object].operations.get(index) else {
        return;
    };
    if operation.name != model[object].name {
        return;
    }

    let mut check = CallableCheck {
        model,
        object,
        callable: Callable::Operation { object, index },
        kind: "Operation",
        sink,
    };
    check.parameters(&operation.parameters);

    let mut assignments = Vec::new();
    for (position, command) in operation.commands.iter().enumerate() {
        match command {
            Command::Assignment { left, right } => {
                if !left.is_this() {
                    let node = check.assignment_node(position);
                    check.error(
                        "Operation constructor assignments should use this.".to_string(),
                        node,
                        Feature::LeftValue,
                    );
                }
                assignments.push(Assigned {
                    index: position,
                    attribute: left.properties.first().map(String::as_str).unwrap_or(""),
                    expression: right,
                });
            }
            Command::Other { .. } => {
                let node = check.node();
                check.sink.report(
                    Diagnostic::error("Operation constructor can only contain assignment commands.")
                        .at(node, Feature::Commands)
                        .with_index(position),
                );
            }
        }
    }

    check.key_mapped(&operation.parameters, &assignments);
    check.coverage(&assignments, Feature::LeftValue);
    check.assignment_types(&operation.parameters, &assignments, policy);
}

/// One `attribute = expression` of a body, with its position.
struct Assigned<'a> {
    index: usize,
    attribute: &'a str,
    expression: &'a Expr,
}

struct CallableCheck<'m, 's> {
    model: &'m Model,
    object: ObjectId,
    callable: Callable,
    kind: &'static str,
    sink: &'s mut dyn DiagnosticSink,
}

impl CallableCheck<'_, '_> {
    fn error(&mut self, message: String, node: NodeRef, feature: Feature) {
        self.sink.report(Diagnostic::error(message).at(node, feature));
    }

    fn node(&self) -> NodeRef {
        NodeRef::Callable {
            callable: self.callable,
        }
    }

    fn assignment_node(&self, index: usize) -> NodeRef {
        NodeRef::Assignment {
            callable: self.callable,
            index,
        }
    }

    fn aggregate(&self) -> AggregateId {
        self.model[self.object].aggregate
    }

    /// A non-collection parameter typed with the aggregate root entity.
    fn is_root_parameter(&self, parameter: &Parameter) -> bool {
        match parameter.ty.target {
            TypeTarget::DomainObject(Some(target)) => {
                parameter.ty.collection == CollectionKind::None
                    && self.model.root_entity(self.aggregate()) == Some(target)
            }
            _ => false,
        }
    }

    /// Parameters are primitives or single objects of the owning aggregate.
    /// Constructors only accept entities; operations any domain object.
    fn parameters(&mut self, parameters: &[Parameter]) {
        let model = self.model;
        let aggregate = self.aggregate();
        for (index, parameter) in parameters.iter().enumerate() {
            let accepted = match parameter.ty.target {
                TypeTarget::Primitive(_) => true,
                TypeTarget::DomainObject(Some(target)) => {
                    parameter.ty.collection == CollectionKind::None
                        && model[aggregate].objects.contains(&target)
                        && (matches!(self.callable, Callable::Operation { .. })
                            || model[target].is_entity())
                }
                TypeTarget::DomainObject(None) => false,
            };
            if !accepted {
                let expected = match self.callable {
                    Callable::Constructor { .. } => "aggregate entity type",
                    Callable::Operation { .. } => "aggregate domain object type",
                };
                self.error(
                    format!(
                        "{} parameter should be simple type of {}.",
                        self.kind, expected
                    ),
                    NodeRef::Parameter {
                        callable: self.callable,
                        index,
                    },
                    Feature::ParameterType,
                );
            }
        }

        if model[self.object].is_value_object()
            && !parameters.iter().any(|p| self.is_root_parameter(p))
        {
            let node = self.node();
            self.error(
                format!("{} parameters require root aggregate.", self.kind),
                node,
                Feature::Parameters,
            );
        }
    }

    /// When the root entity is passed in, its key must be copied with a
    /// one-step path `param.key`.
    fn key_mapped(&mut self, parameters: &[Parameter], assignments: &[Assigned<'_>]) {
        let model = self.model;
        if matches!(model[self.object].kind, DomainObjectKind::DomainEvent) {
            return;
        }
        let Some(root) = model.root_entity(self.aggregate()) else {
            return;
        };
        let Some(key) = model.key_attribute(root) else {
            return;
        };
        let Some(parameter) = parameters.iter().find(|p| self.is_root_parameter(p)) else {
            return;
        };
        let key_name = model[key].name.as_str();

        let mapped = assignments.iter().any(|a| match &a.expression.kind {
            ExprKind::Path(path) => {
                path.head == PathHead::Variable(parameter.name.clone())
                    && path.properties.len() == 1
                    && path.properties[0] == key_name
            }
            _ => false,
        });
        if !mapped {
            let node = self.node();
            self.error(
                format!(
                    "Constructor assignements should map the key attribute {} of the aggregate root entity.",
                    key_name
                ),
                node,
                Feature::Name,
            );
        }
    }

    /// Every declared attribute is assigned exactly once and nothing else is.
    fn coverage(&mut self, assignments: &[Assigned<'_>], target: Feature) {
        let model = self.model;
        let mut assigned = HashSet::new();
        for a in assignments {
            if !assigned.insert(a.attribute) {
                let node = self.assignment_node(a.index);
                self.error("Attribute is assigned more than once.".to_string(), node, target);
            }
        }
        for &attribute in &model[self.object].attributes {
            let name = model[attribute].name.as_str();
            if !assigned.contains(name) {
                let node = self.node();
                self.error(
                    format!("Attribute {} is not assigned in constructor.", name),
                    node,
                    Feature::Name,
                );
            }
        }
        for a in assignments {
            if model.attribute_by_name(self.object, a.attribute).is_none() {
                let node = self.assignment_node(a.index);
                self.error("Attribute is not declared.".to_string(), node, target);
            }
        }
    }

    fn assignment_types(
        &mut self,
        parameters: &[Parameter],
        assignments: &[Assigned<'_>],
        policy: TernaryPolicy,
    ) {
        let model = self.model;
        let scope = ScopeVars::with_bindings(
            parameters
                .iter()
                .map(|p| (p.name.clone(), complex_type(model, &p.ty))),
        );
        let callable = self.callable;
        let mut checker = ExpressionChecker::new(model, Some(self.aggregate()), policy, &mut *self.sink);
        for a in assignments {
            check_assignment_expression(
                &mut checker,
                &scope,
                declared_attribute_type(model, self.object, a.attribute),
                a.expression,
                NodeRef::Assignment {
                    callable,
                    index: a.index,
                },
            );
        }
    }
}
