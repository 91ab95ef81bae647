//! End-to-end checks: build or load a linked model, run the analyzer, and
//! verify the reported diagnostics.

use std::path::PathBuf;

use cml_analyzer::model::{
    AttributePath, AttributePathHead, BoundedContextType, CollectionKind, ComparisonOp,
    ComplexType, Constructor, ConstructorAssignment, EntityAttributeMapping, EntityMapping, Expr,
    ParametricMethod, Parameter,
};
use cml_analyzer::semantic::{infer_type, ScopeKind, ScopeVars, Type};
use cml_analyzer::{analyze, Model, ModelBuilder, ModelError};
use cml_common::{
    AggregateId, AnalyzerConfig, Callable, Diagnostic, Feature, NodeRef, ObjectId, TernaryPolicy,
};

fn errors(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
    diagnostics.iter().filter(|d| d.is_error()).collect()
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn two_aggregate_roots() {
    let mut b = ModelBuilder::new();
    let sales = b.context("Sales", BoundedContextType::Feature);
    let agg = b.aggregate(sales, "Order");
    let order = b.root_entity(agg, "Order");
    b.entity(agg, "Line");
    let shipment = b.root_entity(agg, "Shipment");
    let model = b.build();

    let bag = analyze(&model, &AnalyzerConfig::default());
    let errs = errors(bag.diagnostics());
    assert_eq!(errs.len(), 2, "{:?}", bag.diagnostics());
    assert_eq!(errs[0].node(), Some(NodeRef::DomainObject { id: order }));
    assert_eq!(errs[1].node(), Some(NodeRef::DomainObject { id: shipment }));
    assert!(errs.iter().all(|d| d.feature() == Some(Feature::AggregateRoot)));
}

#[test]
fn mapped_root_without_key_attribute() {
    let mut b = ModelBuilder::new();
    let crm = b.context("CRM", BoundedContextType::Feature);
    let clients = b.aggregate(crm, "Clients");
    let client = b.root_entity(clients, "Client");
    b.attribute(client, "name", "String");

    let sales = b.context("Sales", BoundedContextType::Feature);
    let orders = b.aggregate(sales, "Orders");
    b.root_entity(orders, "Order");
    let customer = b.entity(orders, "Customer");
    b.entity_mapping(
        customer,
        EntityMapping {
            bounded_context: "CRM".to_string(),
            aggregate: "Clients".to_string(),
            entity: Some(client),
            aliases: Vec::new(),
            attributes: vec![EntityAttributeMapping {
                name: "name".to_string(),
                ty: "String".to_string(),
                path: AttributePath {
                    head: AttributePathHead::Root,
                    references: Vec::new(),
                    attribute: "name".to_string(),
                },
            }],
        },
    );
    let map = b.context_map("Landscape", None, &[crm, sales]);
    b.upstream_downstream(map, crm, sales);
    let model = b.build();

    let bag = analyze(&model, &AnalyzerConfig::default());
    let errs = errors(bag.diagnostics());
    assert_eq!(errs.len(), 1, "{:?}", bag.diagnostics());
    assert_eq!(
        errs[0].message,
        "Root entity Client of mapped aggreagate should have a key attribute."
    );
    assert_eq!(errs[0].node(), Some(NodeRef::DomainObject { id: client }));
}

/// Banking/Accounts: root `Account(id key, iban, balance)` and value object
/// `Money(ownerId, amount)` whose constructor copies `ownerId` from the
/// given parameter path.
fn bank(owner_source: &str) -> (Model, ObjectId) {
    let mut b = ModelBuilder::new();
    let banking = b.context("Banking", BoundedContextType::Feature);
    let accounts = b.aggregate(banking, "Accounts");
    let account = b.root_entity(accounts, "Account");
    b.key_attribute(account, "id", "String");
    b.attribute(account, "iban", "String");
    b.attribute(account, "balance", "Double");
    let money = b.value_object(accounts, "Money");
    b.attribute(money, "ownerId", "String");
    b.attribute(money, "amount", "Double");
    b.constructor(
        money,
        Constructor {
            parameters: vec![
                Parameter {
                    name: "owner".to_string(),
                    ty: ComplexType::object(account),
                },
                Parameter {
                    name: "amount".to_string(),
                    ty: ComplexType::primitive("Double"),
                },
            ],
            assignments: vec![
                ConstructorAssignment {
                    attribute: "ownerId".to_string(),
                    expression: Expr::var("owner", &[owner_source]),
                },
                ConstructorAssignment {
                    attribute: "amount".to_string(),
                    expression: Expr::var("amount", &[]),
                },
            ],
        },
    );
    (b.build(), money)
}

#[test]
fn value_object_constructor_propagates_root_key() {
    let (model, _) = bank("id");
    let bag = analyze(&model, &AnalyzerConfig::default());
    assert!(!bag.has_errors(), "{:?}", bag.diagnostics());

    let (model, money) = bank("iban");
    let bag = analyze(&model, &AnalyzerConfig::default());
    let errs = errors(bag.diagnostics());
    assert_eq!(errs.len(), 1, "{:?}", bag.diagnostics());
    assert_eq!(
        errs[0].message,
        "Constructor assignements should map the key attribute id of the aggregate root entity."
    );
    assert_eq!(
        errs[0].node(),
        Some(NodeRef::Callable {
            callable: Callable::Constructor { object: money }
        })
    );
}

/// `Sales/Orders` with root `Order(quantity: Integer, lines -> List<Line>,
/// customer -> Customer)` and one invariant.
fn orders_with_invariant(invariant: Expr) -> (Model, AggregateId) {
    let mut b = ModelBuilder::new();
    let sales = b.context("Sales", BoundedContextType::Feature);
    let orders = b.aggregate(sales, "Orders");
    let order = b.root_entity(orders, "Order");
    let line = b.entity(orders, "Line");
    let customer = b.entity(orders, "Customer");
    b.key_attribute(order, "orderId", "String");
    b.attribute(order, "quantity", "Integer");
    b.attribute(line, "qty", "Integer");
    b.attribute(customer, "name", "String");
    b.reference(order, "lines", line, CollectionKind::List);
    b.reference(order, "customer", customer, CollectionKind::None);
    b.invariant(orders, "check", invariant);
    (b.build(), orders)
}

fn quantity_ternary() -> Expr {
    Expr::ternary(
        Expr::compare(Expr::root(&["quantity"]), ComparisonOp::Gt, Expr::number("0")),
        Expr::boolean(true),
        Expr::number("5"),
    )
}

#[test]
fn ternary_else_branch_must_be_boolean() {
    let (model, aggregate) = orders_with_invariant(quantity_ternary());
    let bag = analyze(&model, &AnalyzerConfig::default());
    let errs = errors(bag.diagnostics());
    assert_eq!(errs.len(), 1, "{:?}", bag.diagnostics());
    assert_eq!(
        errs[0].message,
        "Ternary expression else value must be boolean instead of Integer."
    );
    assert_eq!(errs[0].feature(), Some(Feature::ElseValue));
    assert_eq!(
        errs[0].node(),
        Some(NodeRef::Expr {
            id: model[aggregate].invariants[0].expression.id
        })
    );
}

#[test]
fn matching_ternary_policy_compares_branches() {
    let (model, _) = orders_with_invariant(quantity_ternary());
    let config = AnalyzerConfig {
        ternary_branches: TernaryPolicy::Matching,
        ..AnalyzerConfig::default()
    };
    let bag = analyze(&model, &config);
    let errs = errors(bag.diagnostics());
    assert_eq!(errs.len(), 1, "{:?}", bag.diagnostics());
    assert_eq!(
        errs[0].message,
        "Incompatible types Boolean <> Integer in ternary expression."
    );
}

#[test]
fn filter_on_single_reference() {
    let filter = Expr::root(&["customer"]).call_lambda(
        ParametricMethod::Filter,
        "c",
        Expr::boolean(true),
    );
    let (model, aggregate) = orders_with_invariant(filter);
    let bag = analyze(&model, &AnalyzerConfig::default());
    let errs = errors(bag.diagnostics());
    assert_eq!(errs.len(), 1, "{:?}", bag.diagnostics());
    assert_eq!(errs[0].message, "Method 'filter' requires collection.");
    assert_eq!(errs[0].feature(), Some(Feature::Methods));
    assert_eq!(errs[0].location.and_then(|l| l.index), Some(0));

    let expression = &model[aggregate].invariants[0].expression;
    let mut out = Vec::new();
    let ty = infer_type(
        &model,
        Some(aggregate),
        expression,
        &ScopeVars::new(),
        ScopeKind::IntraInvariant,
        TernaryPolicy::Boolean,
        &mut out,
    );
    assert_eq!(ty, Type::Error);
}

#[test]
fn any_match_on_collection_is_clean() {
    let filter = Expr::root(&["lines"]).call_lambda(
        ParametricMethod::AnyMatch,
        "l",
        Expr::compare(Expr::var("l", &["qty"]), ComparisonOp::Gt, Expr::number("0")),
    );
    let (model, _) = orders_with_invariant(filter);
    let bag = analyze(&model, &AnalyzerConfig::default());
    assert!(bag.is_empty(), "{:?}", bag.diagnostics());
}

#[test]
fn repeated_and_parallel_runs_agree() {
    let (model, _) = orders_with_invariant(quantity_ternary());
    let first = analyze(&model, &AnalyzerConfig::default());
    let again = analyze(&model, &AnalyzerConfig::default());
    let parallel = analyze(
        &model,
        &AnalyzerConfig {
            parallel: true,
            ..AnalyzerConfig::default()
        },
    );
    assert_eq!(first.diagnostics(), again.diagnostics());
    assert_eq!(first.diagnostics(), parallel.diagnostics());
}

#[test]
fn loaded_fixture_reports_both_roots() {
    let model = Model::load(&fixture("two_roots.json")).expect("fixture loads");
    let bag = analyze(&model, &AnalyzerConfig::default());
    let nodes: Vec<_> = errors(bag.diagnostics())
        .iter()
        .map(|d| d.node())
        .collect();
    assert_eq!(
        nodes,
        vec![
            Some(NodeRef::DomainObject { id: ObjectId(0) }),
            Some(NodeRef::DomainObject { id: ObjectId(2) }),
        ]
    );
}

#[test]
fn dangling_fixture_is_rejected() {
    match Model::load(&fixture("dangling.json")) {
        Err(ModelError::DanglingHandle { handle, .. }) => assert_eq!(handle, "ObjectId#4"),
        other => panic!("expected a dangling handle, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn json_round_trip_keeps_diagnostics() {
    let (model, _) = orders_with_invariant(quantity_ternary());
    let json = model.to_json().expect("serializes");
    let reloaded = Model::from_json(&json).expect("reloads");
    assert_eq!(
        analyze(&model, &AnalyzerConfig::default()).diagnostics(),
        analyze(&reloaded, &AnalyzerConfig::default()).diagnostics()
    );
}
