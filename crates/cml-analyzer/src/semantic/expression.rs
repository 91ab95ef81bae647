use cml_common::{
    AggregateId, AntiCorruptionId, Diagnostic, DiagnosticSink, Feature, NodeRef, ObjectId,
    TernaryPolicy,
};
use tracing::trace;

use crate::model::{
    CollectionKind, ComplexType, Expr, ExprKind, FinalElement, Model, TypeTarget,
};

use super::scope::{ScopeKind, ScopeVars};
use super::types::{compatible, number_literal_type, Type, DATE_TIME, STRING};

/// Recursive type inference over one expression tree.
///
/// The checker is bound to the aggregate whose entities the expression may
/// navigate (for translations, the mapped aggregate). Every sub-expression
/// that fails yields [`Type::Error`], which enclosing checks accept silently.
pub struct ExpressionChecker<'m, 's> {
    pub(super) model: &'m Model,
    pub(super) aggregate: Option<AggregateId>,
    entity_names: Vec<&'m str>,
    policy: TernaryPolicy,
    pub(super) sink: &'s mut dyn DiagnosticSink,
}

impl<'m, 's> ExpressionChecker<'m, 's> {
    pub fn new(
        model: &'m Model,
        aggregate: Option<AggregateId>,
        policy: TernaryPolicy,
        sink: &'s mut dyn DiagnosticSink,
    ) -> Self {
        let entity_names = aggregate
            .map(|a| model.entity_names(a))
            .unwrap_or_default();
        Self {
            model,
            aggregate,
            entity_names,
            policy,
            sink,
        }
    }

    pub(super) fn compatible(&self, a: &Type, b: &Type) -> bool {
        compatible(a, b, &self.entity_names)
    }

    pub(super) fn error_at(&mut self, message: String, expr: &Expr, feature: Feature) {
        self.sink
            .report(Diagnostic::error(message).at(NodeRef::Expr { id: expr.id }, feature));
    }

    pub(super) fn error_at_index(
        &mut self,
        message: String,
        expr: &Expr,
        feature: Feature,
        index: usize,
    ) {
        self.sink.report(
            Diagnostic::error(message)
                .at(NodeRef::Expr { id: expr.id }, feature)
                .with_index(index),
        );
    }

    /// Infer the type of `expr` in the given scope.
    pub fn infer(&mut self, expr: &Expr, scope: &ScopeVars<'_>, kind: ScopeKind) -> Type {
        let ty = match &expr.kind {
            ExprKind::Boolean { left, right, .. } => {
                let left_ty = self.infer(left, scope, kind);
                match right {
                    None => left_ty,
                    Some(right) => {
                        let right_ty = self.infer(right, scope, kind);
                        // An `Error` operand is already reported and passes the check.
                        let left_ok = self.expect_boolean(expr, &left_ty, Feature::Left);
                        let right_ok = self.expect_boolean(expr, &right_ty, Feature::Right);
                        if left_ok && right_ok && !left_ty.is_error() && !right_ty.is_error() {
                            Type::boolean()
                        } else {
                            Type::Error
                        }
                    }
                }
            }
            ExprKind::Comparison { left, right, .. } => {
                let left_ty = self.infer(left, scope, kind);
                match right {
                    None => left_ty,
                    Some(right) => {
                        let right_ty = self.infer(right, scope, kind);
                        if left_ty.is_error() || right_ty.is_error() {
                            Type::Error
                        } else if self.compatible(&left_ty, &right_ty) {
                            Type::boolean()
                        } else {
                            self.error_at(
                                format!(
                                    "Incompatible types {} <> {} in comparison expression.",
                                    left_ty, right_ty
                                ),
                                expr,
                                Feature::Operator,
                            );
                            Type::Error
                        }
                    }
                }
            }
            ExprKind::Addition { left, right, .. } | ExprKind::Multiplication { left, right, .. } => {
                let left_ty = self.infer(left, scope, kind);
                match right {
                    None => left_ty,
                    Some(right) => {
                        let right_ty = self.infer(right, scope, kind);
                        self.arithmetic(expr, left_ty, right_ty)
                    }
                }
            }
            ExprKind::Negation { operand } => {
                let ty = self.infer(operand, scope, kind);
                if self.expect_boolean(expr, &ty, Feature::Operand) {
                    ty
                } else {
                    Type::Error
                }
            }
            ExprKind::Signed { operand, .. } => {
                let ty = self.infer(operand, scope, kind);
                if ty.is_error() || ty.is_numeric() {
                    ty
                } else {
                    self.error_at(
                        format!("{} is not numeric type.", ty),
                        expr,
                        Feature::Operand,
                    );
                    Type::Error
                }
            }
            ExprKind::Ternary {
                condition,
                then_value,
                else_value,
            } => self.ternary(expr, condition, then_value, else_value, scope, kind),
            ExprKind::Final { elements } => self.final_expression(expr, elements, kind),
            ExprKind::Path(path) => self.resolve_path(expr, path, scope, kind),
            ExprKind::Parenthesized { inner } => self.infer(inner, scope, kind),
            ExprKind::Number { value } => number_literal_type(value),
            ExprKind::String { .. } => Type::primitive(STRING),
            ExprKind::Bool { .. } => Type::boolean(),
            ExprKind::Null => Type::Null,
            ExprKind::Now => Type::primitive(DATE_TIME),
        };
        trace!(expr = %expr.id, ty = %ty, "inferred");
        ty
    }

    /// Report unless `ty` is compatible with Boolean. Returns whether it was.
    fn expect_boolean(&mut self, expr: &Expr, ty: &Type, feature: Feature) -> bool {
        if self.compatible(ty, &Type::boolean()) {
            return true;
        }
        self.error_at(
            format!("Expected a boolean expression but got {}.", ty),
            expr,
            feature,
        );
        false
    }

    fn arithmetic(&mut self, expr: &Expr, left: Type, right: Type) -> Type {
        let mut ok = !left.is_error() && !right.is_error();
        if !left.is_error() && !left.is_numeric() {
            self.error_at(format!("{} is not numeric type.", left), expr, Feature::Left);
            ok = false;
        }
        if !right.is_error() && !right.is_numeric() {
            self.error_at(format!("{} is not numeric type.", right), expr, Feature::Right);
            ok = false;
        }
        if ok {
            left
        } else {
            Type::Error
        }
    }

    fn ternary(
        &mut self,
        expr: &Expr,
        condition: &Expr,
        then_value: &Expr,
        else_value: &Expr,
        scope: &ScopeVars<'_>,
        kind: ScopeKind,
    ) -> Type {
        let condition_ty = self.infer(condition, scope, kind);
        if condition_ty.is_error() {
            return Type::Error;
        }
        if !condition_ty.is_boolean() {
            self.error_at(
                format!(
                    "Ternary expression condition must be boolean intead of {}.",
                    condition_ty
                ),
                expr,
                Feature::Condition,
            );
            return Type::Error;
        }

        let then_ty = self.infer(then_value, scope, kind);
        let else_ty = self.infer(else_value, scope, kind);
        if then_ty.is_error() || else_ty.is_error() {
            return Type::Error;
        }

        match self.policy {
            TernaryPolicy::Boolean => {
                let mut ok = true;
                if !then_ty.is_boolean() {
                    self.error_at(
                        format!(
                            "Ternary expression then value must be boolean instead of {}.",
                            then_ty
                        ),
                        expr,
                        Feature::ThenValue,
                    );
                    ok = false;
                }
                if !else_ty.is_boolean() {
                    self.error_at(
                        format!(
                            "Ternary expression else value must be boolean instead of {}.",
                            else_ty
                        ),
                        expr,
                        Feature::ElseValue,
                    );
                    ok = false;
                }
                if ok {
                    Type::boolean()
                } else {
                    Type::Error
                }
            }
            TernaryPolicy::Matching => {
                if !self.compatible(&then_ty, &else_ty) {
                    self.error_at(
                        format!(
                            "Incompatible types {} <> {} in ternary expression.",
                            then_ty, else_ty
                        ),
                        expr,
                        Feature::ElseValue,
                    );
                    return Type::Error;
                }
                if then_ty == Type::Null {
                    else_ty
                } else {
                    then_ty
                }
            }
        }
    }

    fn final_expression(&mut self, expr: &Expr, elements: &[FinalElement], kind: ScopeKind) -> Type {
        if kind != ScopeKind::IntraInvariant {
            self.error_at(
                "Final Expression only allowed in aggregate Invariant.".to_string(),
                expr,
                Feature::FinalElements,
            );
            return Type::Error;
        }
        let Some(root) = self.root_entity(expr, Feature::FinalElements) else {
            return Type::Error;
        };

        let mut result = Type::Final;
        for (index, element) in elements.iter().enumerate() {
            let offending = match self.walk_properties(root, &element.properties) {
                Err(position) => Some(position),
                // Final elements must end on an attribute.
                Ok(Type::Primitive(_)) => None,
                Ok(_) => element.properties.len().checked_sub(1),
            };
            if let Some(position) = offending {
                self.error_at_index(
                    format!(
                        "Property {} in path is not a correct entity property.",
                        element.properties[position]
                    ),
                    expr,
                    Feature::FinalElements,
                    index,
                );
                result = Type::Error;
            }
        }
        result
    }
}

/// The inference type of a declared parameter or return type.
pub fn complex_type(model: &Model, ty: &ComplexType) -> Type {
    let base = match &ty.target {
        TypeTarget::Primitive(name) => Type::Primitive(name.clone()),
        TypeTarget::DomainObject(Some(object)) => Type::Entity(model[*object].name.clone()),
        TypeTarget::DomainObject(None) => return Type::Error,
    };
    if ty.collection == CollectionKind::None {
        base
    } else {
        Type::collection(base)
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Infer the type of a standalone expression.
pub fn infer_type(
    model: &Model,
    aggregate: Option<AggregateId>,
    expr: &Expr,
    scope: &ScopeVars<'_>,
    kind: ScopeKind,
    policy: TernaryPolicy,
    sink: &mut dyn DiagnosticSink,
) -> Type {
    ExpressionChecker::new(model, aggregate, policy, sink).infer(expr, scope, kind)
}

/// Check the invariant at `index` of an aggregate: Boolean or `final`.
pub fn check_intra_invariant(
    model: &Model,
    aggregate: AggregateId,
    index: usize,
    policy: TernaryPolicy,
    sink: &mut dyn DiagnosticSink,
) {
    let Some(invariant) = model[aggregate].invariants.get(index) else {
        return;
    };
    let mut checker = ExpressionChecker::new(model, Some(aggregate), policy, sink);
    let ty = checker.infer(&invariant.expression, &ScopeVars::new(), ScopeKind::IntraInvariant);
    if !checker.compatible(&ty, &Type::boolean()) && !checker.compatible(&ty, &Type::Final) {
        sink_error(
            checker.sink,
            format!("Invariant expression must be boolean or final, instead of {}.", ty),
            NodeRef::IntraInvariant { aggregate, index },
        );
    }
}

/// Check the invariant at `index` of an anti-corruption translation. Its
/// variables are the translation's attribute names.
pub fn check_inter_invariant(
    model: &Model,
    owner: AntiCorruptionId,
    index: usize,
    policy: TernaryPolicy,
    sink: &mut dyn DiagnosticSink,
) {
    let ac = &model[owner];
    let Some(invariant) = ac.invariants.get(index) else {
        return;
    };
    let entity_names = ac.aggregate.map(|a| model.entity_names(a)).unwrap_or_default();
    let scope = ScopeVars::with_bindings(ac.attributes.iter().map(|t| {
        let ty = if entity_names.contains(&t.ty.as_str()) {
            Type::Entity(t.ty.clone())
        } else {
            Type::Primitive(t.ty.clone())
        };
        (t.name.clone(), ty)
    }));
    let mut checker = ExpressionChecker::new(model, ac.aggregate, policy, sink);
    let ty = checker.infer(&invariant.expression, &scope, ScopeKind::InterInvariant);
    if !checker.compatible(&ty, &Type::boolean()) {
        sink_error(
            checker.sink,
            format!("Invariant expression must be boolean instead of {}.", ty),
            NodeRef::InterInvariant { owner, index },
        );
    }
}

fn sink_error(sink: &mut dyn DiagnosticSink, message: String, node: NodeRef) {
    sink.report(Diagnostic::error(message).at(node, Feature::Expression));
}

/// Expected type name for an assignment to `attribute` of the object, if
/// the attribute is declared.
pub(super) fn declared_attribute_type(
    model: &Model,
    object: ObjectId,
    attribute: &str,
) -> Option<Type> {
    model
        .attribute_by_name(object, attribute)
        .map(|a| Type::Primitive(model[a].ty.clone()))
}

/// Check an assignment expression against the declared attribute type,
/// with the callable's parameters in scope.
pub(super) fn check_assignment_expression(
    checker: &mut ExpressionChecker<'_, '_>,
    scope: &ScopeVars<'_>,
    expected: Option<Type>,
    expression: &Expr,
    node: NodeRef,
) {
    let ty = checker.infer(expression, scope, ScopeKind::ConstructorAssignment);
    if let Some(expected) = expected {
        if !checker.compatible(&ty, &expected) {
            checker.sink.report(
                Diagnostic::error(format!(
                    "Constructor assigment expression should be of type {}.",
                    expected
                ))
                .at(node, Feature::Expression),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use cml_common::Diagnostic;

    use super::*;
    use crate::model::{AdditiveOp, ComparisonOp, MultiplicativeOp};
    use crate::semantic::test_support::{errors, order_model};

    fn infer_with(
        policy: TernaryPolicy,
        expr: Expr,
        scope: &ScopeVars<'_>,
        kind: ScopeKind,
    ) -> (Type, Vec<String>) {
        let (builder, orders) = order_model();
        let model = builder.build();
        let mut out: Vec<Diagnostic> = Vec::new();
        let ty = infer_type(&model, Some(orders.aggregate), &expr, scope, kind, policy, &mut out);
        (ty, errors(&out))
    }

    fn intra(expr: Expr) -> (Type, Vec<String>) {
        infer_with(TernaryPolicy::Boolean, expr, &ScopeVars::new(), ScopeKind::IntraInvariant)
    }

    #[test]
    fn comparison_of_numbers_is_boolean() {
        let (ty, errs) = intra(Expr::compare(
            Expr::root(&["quantity"]),
            ComparisonOp::Gt,
            Expr::number("0"),
        ));
        assert_eq!(ty, Type::boolean());
        assert!(errs.is_empty(), "{:?}", errs);
    }

    #[test]
    fn incompatible_comparison() {
        let (ty, errs) = intra(Expr::compare(
            Expr::root(&["status"]),
            ComparisonOp::Gt,
            Expr::number("5"),
        ));
        assert_eq!(ty, Type::Error);
        assert_eq!(errs, vec!["Incompatible types String <> Integer in comparison expression."]);
    }

    #[test]
    fn failed_operand_reports_once() {
        let (ty, errs) = intra(Expr::and(
            Expr::compare(Expr::root(&["nope"]), ComparisonOp::Gt, Expr::number("5")),
            Expr::boolean(true),
        ));
        assert_eq!(ty, Type::Error);
        assert_eq!(errs, vec!["Property nope in path is not a correct entity property."]);
    }

    #[test]
    fn failed_operand_does_not_hide_its_sibling() {
        let (ty, errs) = intra(Expr::and(Expr::root(&["nope"]), Expr::string("x")));
        assert_eq!(ty, Type::Error);
        assert_eq!(
            errs,
            vec![
                "Property nope in path is not a correct entity property.",
                "Expected a boolean expression but got String.",
            ]
        );

        let (ty, errs) = intra(Expr::add(
            Expr::root(&["nope"]),
            AdditiveOp::Plus,
            Expr::root(&["status"]),
        ));
        assert_eq!(ty, Type::Error);
        assert_eq!(
            errs,
            vec![
                "Property nope in path is not a correct entity property.",
                "String is not numeric type.",
            ]
        );
    }

    #[test]
    fn both_non_numeric_operands_are_reported() {
        let (_, errs) = intra(Expr::add(
            Expr::root(&["status"]),
            AdditiveOp::Plus,
            Expr::string("x"),
        ));
        assert_eq!(errs, vec!["String is not numeric type.", "String is not numeric type."]);
    }

    #[test]
    fn boolean_operands_must_be_boolean() {
        let (_, errs) = intra(Expr::or(Expr::boolean(true), Expr::string("yes")));
        assert_eq!(errs, vec!["Expected a boolean expression but got String."]);
    }

    #[test]
    fn arithmetic_needs_numbers() {
        let (ty, errs) = intra(Expr::add(
            Expr::root(&["status"]),
            AdditiveOp::Plus,
            Expr::number("1"),
        ));
        assert_eq!(ty, Type::Error);
        assert_eq!(errs, vec!["String is not numeric type."]);

        let (ty, errs) = intra(Expr::add(
            Expr::root(&["quantity"]),
            AdditiveOp::Minus,
            Expr::number("1"),
        ));
        assert_eq!(ty, Type::primitive("Integer"));
        assert!(errs.is_empty());
    }

    #[test]
    fn multiplication_keeps_left_type() {
        let (ty, errs) = intra(Expr::multiply(
            Expr::root(&["total"]),
            MultiplicativeOp::Times,
            Expr::root(&["quantity"]),
        ));
        assert_eq!(ty, Type::primitive("Double"));
        assert!(errs.is_empty());

        let (_, errs) = intra(Expr::multiply(
            Expr::root(&["total"]),
            MultiplicativeOp::Divide,
            Expr::string("2"),
        ));
        assert_eq!(errs, vec!["String is not numeric type."]);
    }

    #[test]
    fn negation_and_sign() {
        let (ty, errs) = intra(Expr::not(Expr::boolean(false)));
        assert_eq!(ty, Type::boolean());
        assert!(errs.is_empty());

        let (_, errs) = intra(Expr::signed(AdditiveOp::Minus, Expr::string("x")));
        assert_eq!(errs, vec!["String is not numeric type."]);
    }

    #[test]
    fn literal_types() {
        assert_eq!(intra(Expr::now()).0, Type::primitive("DateTime"));
        assert_eq!(intra(Expr::null()).0, Type::Null);
        assert_eq!(intra(Expr::number("1.5")).0, Type::primitive("Float"));
        assert_eq!(intra(Expr::parenthesized(Expr::string("a"))).0, Type::primitive("String"));
    }

    fn guarded_ternary(then_value: Expr, else_value: Expr) -> Expr {
        Expr::ternary(
            Expr::compare(Expr::root(&["quantity"]), ComparisonOp::Gt, Expr::number("0")),
            then_value,
            else_value,
        )
    }

    #[test]
    fn boolean_ternary_rejects_non_boolean_branch() {
        let (ty, errs) = intra(guarded_ternary(Expr::boolean(true), Expr::number("5")));
        assert_eq!(ty, Type::Error);
        assert_eq!(errs, vec!["Ternary expression else value must be boolean instead of Integer."]);
    }

    #[test]
    fn matching_ternary_compares_branches() {
        let scope = ScopeVars::new();
        let (ty, errs) = infer_with(
            TernaryPolicy::Matching,
            guarded_ternary(Expr::boolean(true), Expr::number("5")),
            &scope,
            ScopeKind::IntraInvariant,
        );
        assert_eq!(ty, Type::Error);
        assert_eq!(errs, vec!["Incompatible types Boolean <> Integer in ternary expression."]);

        let (ty, errs) = infer_with(
            TernaryPolicy::Matching,
            guarded_ternary(Expr::null(), Expr::number("2")),
            &scope,
            ScopeKind::IntraInvariant,
        );
        assert_eq!(ty, Type::primitive("Integer"));
        assert!(errs.is_empty());
    }

    #[test]
    fn ternary_condition_must_be_boolean() {
        let (_, errs) = intra(Expr::ternary(
            Expr::number("1"),
            Expr::boolean(true),
            Expr::boolean(false),
        ));
        assert_eq!(errs, vec!["Ternary expression condition must be boolean intead of Integer."]);
    }

    #[test]
    fn final_is_intra_only() {
        let (ty, errs) = intra(Expr::finals(&[&["status"], &["customer", "name"]]));
        assert_eq!(ty, Type::Final);
        assert!(errs.is_empty(), "{:?}", errs);

        let scope = ScopeVars::new();
        let (_, errs) = infer_with(
            TernaryPolicy::Boolean,
            Expr::finals(&[&["status"]]),
            &scope,
            ScopeKind::InterInvariant,
        );
        assert_eq!(errs, vec!["Final Expression only allowed in aggregate Invariant."]);
    }

    #[test]
    fn final_element_must_end_on_attribute() {
        let (ty, errs) = intra(Expr::finals(&[&["status"], &["customer"]]));
        assert_eq!(ty, Type::Error);
        assert_eq!(errs, vec!["Property customer in path is not a correct entity property."]);
    }

    #[test]
    fn intra_invariant_must_be_boolean_or_final() {
        let (mut builder, orders) = order_model();
        builder.invariant(orders.aggregate, "named", Expr::root(&["status"]));
        builder.invariant(orders.aggregate, "frozen", Expr::finals(&[&["orderId"]]));
        let model = builder.build();
        let mut out: Vec<Diagnostic> = Vec::new();
        check_intra_invariant(&model, orders.aggregate, 0, TernaryPolicy::Boolean, &mut out);
        check_intra_invariant(&model, orders.aggregate, 1, TernaryPolicy::Boolean, &mut out);
        assert_eq!(
            errors(&out),
            vec!["Invariant expression must be boolean or final, instead of String."]
        );
        assert_eq!(
            out[0].node(),
            Some(NodeRef::IntraInvariant {
                aggregate: orders.aggregate,
                index: 0
            })
        );
    }

    #[test]
    fn diagnostics_point_at_numbered_expressions() {
        let (mut builder, orders) = order_model();
        builder.invariant(
            orders.aggregate,
            "bad",
            Expr::and(Expr::boolean(true), Expr::number("3")),
        );
        let model = builder.build();
        let mut out: Vec<Diagnostic> = Vec::new();
        check_intra_invariant(&model, orders.aggregate, 0, TernaryPolicy::Boolean, &mut out);
        let root_id = model[orders.aggregate].invariants[0].expression.id;
        assert_eq!(out[0].node(), Some(NodeRef::Expr { id: root_id }));
        assert_eq!(out[0].feature(), Some(Feature::Right));
    }
}
