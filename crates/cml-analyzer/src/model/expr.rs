use cml_common::ExprId;
use serde::{Deserialize, Serialize};

/// An expression node of the embedded invariant/assignment language.
///
/// `id` is assigned by [`Model::number_expressions`](super::Model::number_expressions)
/// and only serves to address diagnostics; freshly constructed expressions
/// carry `ExprId(0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default)]
    pub id: ExprId,
    #[serde(flatten)]
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprKind {
    // -- Binary forms; a missing right operand is the grouping form --
    Boolean {
        left: Box<Expr>,
        op: BooleanOp,
        #[serde(default)]
        right: Option<Box<Expr>>,
    },
    Comparison {
        left: Box<Expr>,
        op: ComparisonOp,
        #[serde(default)]
        right: Option<Box<Expr>>,
    },
    Addition {
        left: Box<Expr>,
        op: AdditiveOp,
        #[serde(default)]
        right: Option<Box<Expr>>,
    },
    Multiplication {
        left: Box<Expr>,
        op: MultiplicativeOp,
        #[serde(default)]
        right: Option<Box<Expr>>,
    },

    // -- Unary --
    Negation {
        operand: Box<Expr>,
    },
    Signed {
        op: AdditiveOp,
        operand: Box<Expr>,
    },

    Ternary {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    Final {
        elements: Vec<FinalElement>,
    },
    Path(PathExpr),
    Parenthesized {
        inner: Box<Expr>,
    },

    // -- Literals --
    /// Decimal literal as written (`42`, `1.50`, `1e3`).
    Number {
        value: String,
    },
    String {
        value: String,
    },
    Bool {
        value: bool,
    },
    Null,
    Now,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdditiveOp {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultiplicativeOp {
    #[serde(rename = "*")]
    Times,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "%")]
    Modulo,
}

/// One property chain of a `final(...)` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalElement {
    pub properties: Vec<String>,
}

/// `head . property* . method*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathExpr {
    pub head: PathHead,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathHead {
    Root,
    /// A repository operation call on the aggregate root's repository.
    Query {
        operation: String,
        #[serde(default)]
        params: Vec<String>,
    },
    Variable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimpleMethod {
    Count,
    Distinct,
    FindAny,
    FindFirst,
    IsEmpty,
    Get,
}

impl SimpleMethod {
    pub fn name(self) -> &'static str {
        match self {
            SimpleMethod::Count => "count",
            SimpleMethod::Distinct => "distinct",
            SimpleMethod::FindAny => "findAny",
            SimpleMethod::FindFirst => "findFirst",
            SimpleMethod::IsEmpty => "isEmpty",
            SimpleMethod::Get => "get",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParametricMethod {
    AllMatch,
    AnyMatch,
    NoneMatch,
    Filter,
    Map,
    FlatMap,
}

impl ParametricMethod {
    pub fn name(self) -> &'static str {
        match self {
            ParametricMethod::AllMatch => "allMatch",
            ParametricMethod::AnyMatch => "anyMatch",
            ParametricMethod::NoneMatch => "noneMatch",
            ParametricMethod::Filter => "filter",
            ParametricMethod::Map => "map",
            ParametricMethod::FlatMap => "flatMap",
        }
    }

    /// Methods whose body is a predicate rather than a mapping.
    pub fn takes_predicate(self) -> bool {
        !matches!(self, ParametricMethod::Map | ParametricMethod::FlatMap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Method {
    Simple {
        method: SimpleMethod,
    },
    /// `method(variable -> body)`
    Parametric {
        method: ParametricMethod,
        variable: String,
        body: Box<Expr>,
    },
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Simple { method } => method.name(),
            Method::Parametric { method, .. } => method.name(),
        }
    }
}

// ============================================================================
// Construction helpers
// ============================================================================

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            id: ExprId::default(),
            kind,
        }
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Number {
            value: value.into(),
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::String {
            value: value.into(),
        })
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::Bool { value })
    }

    pub fn null() -> Self {
        Self::new(ExprKind::Null)
    }

    pub fn now() -> Self {
        Self::new(ExprKind::Now)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Boolean {
            left: Box::new(left),
            op: BooleanOp::And,
            right: Some(Box::new(right)),
        })
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Boolean {
            left: Box::new(left),
            op: BooleanOp::Or,
            right: Some(Box::new(right)),
        })
    }

    pub fn compare(left: Expr, op: ComparisonOp, right: Expr) -> Self {
        Self::new(ExprKind::Comparison {
            left: Box::new(left),
            op,
            right: Some(Box::new(right)),
        })
    }

    pub fn add(left: Expr, op: AdditiveOp, right: Expr) -> Self {
        Self::new(ExprKind::Addition {
            left: Box::new(left),
            op,
            right: Some(Box::new(right)),
        })
    }

    pub fn multiply(left: Expr, op: MultiplicativeOp, right: Expr) -> Self {
        Self::new(ExprKind::Multiplication {
            left: Box::new(left),
            op,
            right: Some(Box::new(right)),
        })
    }

    pub fn not(operand: Expr) -> Self {
        Self::new(ExprKind::Negation {
            operand: Box::new(operand),
        })
    }

    pub fn signed(op: AdditiveOp, operand: Expr) -> Self {
        Self::new(ExprKind::Signed {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn ternary(condition: Expr, then_value: Expr, else_value: Expr) -> Self {
        Self::new(ExprKind::Ternary {
            condition: Box::new(condition),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        })
    }

    pub fn parenthesized(inner: Expr) -> Self {
        Self::new(ExprKind::Parenthesized {
            inner: Box::new(inner),
        })
    }

    pub fn finals(chains: &[&[&str]]) -> Self {
        Self::new(ExprKind::Final {
            elements: chains
                .iter()
                .map(|chain| FinalElement {
                    properties: strings(chain),
                })
                .collect(),
        })
    }

    pub fn path(path: PathExpr) -> Self {
        Self::new(ExprKind::Path(path))
    }

    /// `root.p1.p2...`
    pub fn root(properties: &[&str]) -> Self {
        Self::path(PathExpr {
            head: PathHead::Root,
            properties: strings(properties),
            methods: Vec::new(),
        })
    }

    /// `var.p1.p2...`
    pub fn var(name: &str, properties: &[&str]) -> Self {
        Self::path(PathExpr {
            head: PathHead::Variable(name.to_string()),
            properties: strings(properties),
            methods: Vec::new(),
        })
    }

    /// `query operation(params...).p1...`
    pub fn query(operation: &str, params: &[&str], properties: &[&str]) -> Self {
        Self::path(PathExpr {
            head: PathHead::Query {
                operation: operation.to_string(),
                params: strings(params),
            },
            properties: strings(properties),
            methods: Vec::new(),
        })
    }

    /// Append a method to a path expression. Other expressions are returned
    /// unchanged.
    pub fn call(mut self, method: Method) -> Self {
        if let ExprKind::Path(path) = &mut self.kind {
            path.methods.push(method);
        }
        self
    }

    pub fn call_simple(self, method: SimpleMethod) -> Self {
        self.call(Method::Simple { method })
    }

    pub fn call_lambda(self, method: ParametricMethod, variable: &str, body: Expr) -> Self {
        self.call(Method::Parametric {
            method,
            variable: variable.to_string(),
            body: Box::new(body),
        })
    }

    /// Visit this expression and every nested one, parents first.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(self);
        match &mut self.kind {
            ExprKind::Boolean { left, right, .. }
            | ExprKind::Comparison { left, right, .. }
            | ExprKind::Addition { left, right, .. }
            | ExprKind::Multiplication { left, right, .. } => {
                left.walk_mut(f);
                if let Some(right) = right {
                    right.walk_mut(f);
                }
            }
            ExprKind::Negation { operand } | ExprKind::Signed { operand, .. } => {
                operand.walk_mut(f)
            }
            ExprKind::Ternary {
                condition,
                then_value,
                else_value,
            } => {
                condition.walk_mut(f);
                then_value.walk_mut(f);
                else_value.walk_mut(f);
            }
            ExprKind::Parenthesized { inner } => inner.walk_mut(f),
            ExprKind::Path(path) => {
                for method in &mut path.methods {
                    if let Method::Parametric { body, .. } = method {
                        body.walk_mut(f);
                    }
                }
            }
            ExprKind::Final { .. }
            | ExprKind::Number { .. }
            | ExprKind::String { .. }
            | ExprKind::Bool { .. }
            | ExprKind::Null
            | ExprKind::Now => {}
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
