//! Shared model fixtures for the semantic unit tests.

use cml_common::{AggregateId, ContextId, Diagnostic, ObjectId, Severity};

use crate::model::*;

/// Handles into [`order_model`].
pub struct Orders {
    pub sales: ContextId,
    pub aggregate: AggregateId,
    pub order: ObjectId,
    pub customer: ObjectId,
    pub item: ObjectId,
}

/// A `Sales` context with an `Orders` aggregate:
///
/// ```text
/// Order (root)   orderId: String (key), quantity: Integer, total: Double,
///                status: String, customer -> Customer, items -> List<OrderItem>
/// Customer       name: String
/// OrderItem      qty: Integer, price: Double, tags -> List<Tag>
/// Tag            label: String
/// ```
///
/// The root has a repository with `findByStatus(String): Order` and
/// `findAll(): List<Order>`.
pub fn order_model() -> (ModelBuilder, Orders) {
    let mut b = ModelBuilder::new();
    let sales = b.context("Sales", BoundedContextType::Feature);
    let aggregate = b.aggregate(sales, "Orders");
    let order = b.root_entity(aggregate, "Order");
    let customer = b.entity(aggregate, "Customer");
    let item = b.entity(aggregate, "OrderItem");
    let tag = b.entity(aggregate, "Tag");

    b.key_attribute(order, "orderId", "String");
    b.attribute(order, "quantity", "Integer");
    b.attribute(order, "total", "Double");
    b.attribute(order, "status", "String");
    b.reference(order, "customer", customer, CollectionKind::None);
    b.reference(order, "items", item, CollectionKind::List);
    b.attribute(customer, "name", "String");
    b.attribute(item, "qty", "Integer");
    b.attribute(item, "price", "Double");
    b.reference(item, "tags", tag, CollectionKind::List);
    b.attribute(tag, "label", "String");

    b.repository(
        order,
        Repository {
            name: "OrderRepository".to_string(),
            operations: vec![
                RepositoryOperation {
                    name: "findByStatus".to_string(),
                    parameters: vec![Parameter {
                        name: "status".to_string(),
                        ty: ComplexType::primitive("String"),
                    }],
                    return_type: Some(ComplexType::object(order)),
                },
                RepositoryOperation {
                    name: "findAll".to_string(),
                    parameters: Vec::new(),
                    return_type: Some(ComplexType {
                        collection: CollectionKind::List,
                        target: TypeTarget::DomainObject(Some(order)),
                    }),
                },
            ],
        },
    );

    (
        b,
        Orders {
            sales,
            aggregate,
            order,
            customer,
            item,
        },
    )
}

pub fn errors(diagnostics: &[Diagnostic]) -> Vec<String> {
    of_severity(diagnostics, Severity::Error)
}

pub fn warnings(diagnostics: &[Diagnostic]) -> Vec<String> {
    of_severity(diagnostics, Severity::Warning)
}

fn of_severity(diagnostics: &[Diagnostic], severity: Severity) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .map(|d| d.message.clone())
        .collect()
}
