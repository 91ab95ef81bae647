//! Path expression resolution: head element, property chain, method chain.

use cml_common::{Feature, ObjectId};

use crate::model::{
    DomainObjectKind, Expr, Method, ParametricMethod, PathExpr, PathHead, SimpleMethod, TypeTarget,
};

use super::expression::{complex_type, ExpressionChecker};
use super::scope::{ScopeKind, ScopeVars};
use super::types::{Type, LONG, OBJECT_TYPES};

/// Where the property walk starts after the head has been resolved.
enum Start {
    /// Walk properties from this domain object.
    Object(ObjectId),
    /// The head already has a type that cannot be navigated further.
    Terminal(Type),
}

impl ExpressionChecker<'_, '_> {
    pub(super) fn resolve_path(
        &mut self,
        expr: &Expr,
        path: &PathExpr,
        scope: &ScopeVars<'_>,
        kind: ScopeKind,
    ) -> Type {
        let Some(start) = self.resolve_head(expr, &path.head, scope, kind) else {
            return Type::Error;
        };

        let base = match start {
            Start::Object(object) => match self.walk_properties(object, &path.properties) {
                Ok(ty) => ty,
                Err(index) => {
                    self.property_error(expr, path, index);
                    return Type::Error;
                }
            },
            Start::Terminal(ty) if path.properties.is_empty() => ty,
            Start::Terminal(_) => {
                self.property_error(expr, path, 0);
                return Type::Error;
            }
        };

        self.apply_methods(expr, &path.methods, base, scope)
    }

    fn property_error(&mut self, expr: &Expr, path: &PathExpr, index: usize) {
        self.error_at_index(
            format!(
                "Property {} in path is not a correct entity property.",
                path.properties[index]
            ),
            expr,
            Feature::Properties,
            index,
        );
    }

    /// The aggregate root entity, reporting when there is none.
    pub(super) fn root_entity(&mut self, expr: &Expr, feature: Feature) -> Option<ObjectId> {
        let root = self.aggregate.and_then(|a| self.model.root_entity(a));
        if root.is_none() {
            self.error_at("Aggregate should have root entity.".to_string(), expr, feature);
        }
        root
    }

    fn resolve_head(
        &mut self,
        expr: &Expr,
        head: &PathHead,
        scope: &ScopeVars<'_>,
        kind: ScopeKind,
    ) -> Option<Start> {
        match head {
            PathHead::Root => {
                if !kind.allows_root() {
                    let message = match kind {
                        ScopeKind::InterInvariant => {
                            "Inter-aggregate invariant cannot contain root."
                        }
                        _ => "Method local expression cannot contain root.",
                    };
                    self.error_at(message.to_string(), expr, Feature::HeadElement);
                    return None;
                }
                self.root_entity(expr, Feature::HeadElement).map(Start::Object)
            }
            PathHead::Query { operation, params } => {
                if !kind.allows_query() {
                    let message = match kind {
                        ScopeKind::ConstructorAssignment => {
                            format!("Constructor assignment cannot contain query {}.", operation)
                        }
                        _ => format!("Aggregate invariant cannot contain query {}.", operation),
                    };
                    self.error_at(message, expr, Feature::QueryOperation);
                    return None;
                }
                self.resolve_query(expr, operation, params, scope)
            }
            PathHead::Variable(name) => {
                if kind == ScopeKind::IntraInvariant {
                    self.error_at(
                        format!("Aggregate invariant cannot contain var {}.", name),
                        expr,
                        Feature::HeadElement,
                    );
                    return None;
                }
                let Some(ty) = scope.lookup(name) else {
                    let message = match kind {
                        ScopeKind::InterInvariant => format!(
                            "Attribute {} is not declared in anti-corruption translation.",
                            name
                        ),
                        ScopeKind::ConstructorAssignment => {
                            format!("Constructor assigment head {} not declared as parameter.", name)
                        }
                        _ => format!("Method local variable {} not declared.", name),
                    };
                    self.error_at(message, expr, Feature::HeadElement);
                    return None;
                };
                self.classify_variable(expr, name, ty.clone())
            }
        }
    }

    /// A variable either names an object to walk from or is terminal.
    fn classify_variable(&mut self, expr: &Expr, name: &str, ty: Type) -> Option<Start> {
        match &ty {
            Type::Error => None,
            Type::Collection(_) | Type::Optional(_) => Some(Start::Terminal(ty.clone())),
            Type::Primitive(type_name) | Type::Entity(type_name) => {
                if let Some(object) = self.object_named(type_name) {
                    return Some(Start::Object(object));
                }
                if OBJECT_TYPES.contains(&type_name.as_str()) {
                    return Some(Start::Terminal(ty.clone()));
                }
                self.error_at(
                    format!("Path expresssion head {} must be object.", name),
                    expr,
                    Feature::HeadElement,
                );
                None
            }
            Type::Final | Type::Null => {
                self.error_at(
                    format!("Path expresssion head {} must be object.", name),
                    expr,
                    Feature::HeadElement,
                );
                None
            }
        }
    }

    /// A domain object by name: the current aggregate first, then the model.
    fn object_named(&self, name: &str) -> Option<ObjectId> {
        self.aggregate
            .and_then(|a| self.model.object_by_name(a, name))
            .or_else(|| self.model.object_ids().find(|&o| self.model[o].name == name))
    }

    fn resolve_query(
        &mut self,
        expr: &Expr,
        operation: &str,
        params: &[String],
        scope: &ScopeVars<'_>,
    ) -> Option<Start> {
        let model = self.model;
        let root = self.root_entity(expr, Feature::QueryOperation)?;
        let Some(repository) = &model[root].repository else {
            self.error_at(
                format!("Query {} does not have associated repository.", operation),
                expr,
                Feature::QueryOperation,
            );
            return None;
        };
        let Some(op) = repository.operations.iter().find(|o| o.name == operation) else {
            self.error_at(
                format!("Query operation {} is not defined in the repository.", operation),
                expr,
                Feature::QueryOperation,
            );
            return None;
        };
        if op.parameters.len() != params.len() {
            self.error_at(
                format!(
                    "Number of query {} parameters are not consistent with definition.",
                    operation
                ),
                expr,
                Feature::QueryOperation,
            );
            return None;
        }
        for (index, param) in params.iter().enumerate() {
            if !scope.is_declared(param) {
                self.error_at_index(
                    format!("Query param {} is not declared.", param),
                    expr,
                    Feature::QueryParams,
                    index,
                );
                return None;
            }
        }
        for (index, (param, declared)) in params.iter().zip(&op.parameters).enumerate() {
            let actual = scope.lookup(param);
            let expected = complex_type(model, &declared.ty);
            if actual != Some(&expected) {
                self.error_at_index(
                    format!(
                        "Query param {} type does not match repository operation parameter type.",
                        param
                    ),
                    expr,
                    Feature::QueryParams,
                    index,
                );
                return None;
            }
        }

        let returned = op.return_type.as_ref().and_then(|rt| match rt.target {
            TypeTarget::DomainObject(Some(object)) if model[object].is_entity() => {
                Some((object, rt.collection.is_collection()))
            }
            _ => None,
        });
        let Some((entity, is_collection)) = returned else {
            self.error_at(
                format!("Query {} does not return entity.", operation),
                expr,
                Feature::QueryOperation,
            );
            return None;
        };
        let belongs = self
            .aggregate
            .is_some_and(|a| model[a].objects.contains(&entity));
        if !belongs {
            self.error_at(
                format!(
                    "Query returned entity {} does not belong to mapped aggregate.",
                    model[entity].name
                ),
                expr,
                Feature::QueryOperation,
            );
            return None;
        }
        if is_collection {
            Some(Start::Terminal(Type::collection(Type::Entity(
                model[entity].name.clone(),
            ))))
        } else {
            Some(Start::Object(entity))
        }
    }

    /// Walk a property chain starting at `object`.
    ///
    /// Single-valued references descend; a collection reference or an
    /// attribute ends the chain. `Err` carries the position of the first
    /// property that cannot be resolved or that follows the end of the chain.
    pub(super) fn walk_properties(
        &self,
        object: ObjectId,
        properties: &[String],
    ) -> Result<Type, usize> {
        let model = self.model;
        let mut current = object;
        let mut end: Option<Type> = None;

        for (index, property) in properties.iter().enumerate() {
            if end.is_some() {
                return Err(index);
            }
            let owner = self.property_owner(current);
            if let Some(reference) = model.reference_by_name(owner, property) {
                let reference = &model[reference];
                let Some(target) = reference.target else {
                    return Err(index);
                };
                if reference.collection.is_collection() {
                    end = Some(Type::collection(Type::Entity(model[target].name.clone())));
                } else {
                    current = target;
                }
            } else if let Some(attribute) = model.attribute_by_name(owner, property) {
                end = Some(Type::Primitive(model[attribute].ty.clone()));
            } else {
                return Err(index);
            }
        }

        Ok(end.unwrap_or_else(|| Type::Entity(model[current].name.clone())))
    }

    /// Properties of an entity with a `uses` binding resolve on the used
    /// value object.
    fn property_owner(&self, object: ObjectId) -> ObjectId {
        match &self.model[object].kind {
            DomainObjectKind::Entity(data) => data
                .uses
                .as_ref()
                .and_then(|u| u.value_object)
                .unwrap_or(object),
            _ => object,
        }
    }

    fn apply_methods(
        &mut self,
        expr: &Expr,
        methods: &[Method],
        base: Type,
        scope: &ScopeVars<'_>,
    ) -> Type {
        let mut current = base;
        for (index, method) in methods.iter().enumerate() {
            current = match method {
                Method::Simple { method } => self.simple_method(expr, index, *method, &current),
                Method::Parametric {
                    method,
                    variable,
                    body,
                } => self.parametric_method(expr, index, *method, variable, body, &current, scope),
            };
            if current.is_error() {
                return Type::Error;
            }
        }
        current
    }

    fn simple_method(&mut self, expr: &Expr, index: usize, method: SimpleMethod, ty: &Type) -> Type {
        match method {
            SimpleMethod::Count | SimpleMethod::Distinct | SimpleMethod::FindAny | SimpleMethod::FindFirst => {
                if !ty.is_collection() {
                    self.requires(expr, index, method.name(), "collection");
                    return Type::Error;
                }
                match method {
                    SimpleMethod::Count => Type::primitive(LONG),
                    SimpleMethod::Distinct => ty.clone(),
                    _ => Type::optional(ty.unwrap_collection()),
                }
            }
            SimpleMethod::IsEmpty | SimpleMethod::Get => {
                if !ty.is_optional() {
                    self.requires(expr, index, method.name(), "optional");
                    return Type::Error;
                }
                match method {
                    SimpleMethod::IsEmpty => Type::boolean(),
                    _ => ty.unwrap_optional(),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn parametric_method(
        &mut self,
        expr: &Expr,
        index: usize,
        method: ParametricMethod,
        variable: &str,
        body: &Expr,
        ty: &Type,
        scope: &ScopeVars<'_>,
    ) -> Type {
        if !ty.is_collection() {
            self.requires(expr, index, method.name(), "collection");
            return Type::Error;
        }
        let inner = match scope.bind(variable, ty.unwrap_collection()) {
            Ok(inner) => inner,
            Err(_) => {
                self.error_at_index(
                    format!("Variable {} already declared in scope.", variable),
                    expr,
                    Feature::Methods,
                    index,
                );
                return Type::Error;
            }
        };

        let body_ty = self.infer(body, &inner, ScopeKind::MethodLocal);
        if body_ty.is_error() {
            return Type::Error;
        }
        if method.takes_predicate() && !body_ty.is_boolean() {
            self.error_at_index(
                format!("Expected a boolean expression but got {}.", body_ty),
                expr,
                Feature::Methods,
                index,
            );
            return Type::Error;
        }
        match method {
            ParametricMethod::AllMatch | ParametricMethod::AnyMatch | ParametricMethod::NoneMatch => {
                Type::boolean()
            }
            ParametricMethod::Filter => ty.clone(),
            ParametricMethod::Map => Type::collection(body_ty),
            ParametricMethod::FlatMap => body_ty,
        }
    }

    fn requires(&mut self, expr: &Expr, index: usize, method: &str, what: &str) {
        self.error_at_index(
            format!("Method '{}' requires {}.", method, what),
            expr,
            Feature::Methods,
            index,
        );
    }
}
