use std::fmt;

/// Internal type representation for expression inference.
///
/// Derived from attribute type names and domain-object names; never stored
/// in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    // -- Named types --
    /// A primitive or otherwise non-entity type name (`Integer`, `String`, ...).
    Primitive(String),
    /// A domain object of the current aggregate, by name.
    Entity(String),

    // -- Wrappers --
    Collection(Box<Type>),
    Optional(Box<Type>),

    // -- Sentinels --
    /// Result of a `final(...)` expression.
    Final,
    /// Type of the `null` literal.
    Null,
    /// Used after a reported problem to avoid cascading diagnostics.
    Error,
}

pub const BOOLEAN: &str = "Boolean";
pub const STRING: &str = "String";
pub const INTEGER: &str = "Integer";
pub const LONG: &str = "Long";
pub const FLOAT: &str = "Float";
pub const DATE_TIME: &str = "DateTime";

/// Primitive names `null` may stand in for.
pub const OBJECT_TYPES: &[&str] = &[
    "String",
    "Integer",
    "Long",
    "Boolean",
    "Date",
    "DateTime",
    "Timestamp",
    "BigDecimal",
    "BigInteger",
    "Double",
    "Float",
];

const NUMERIC_TYPES: &[&str] = &[
    "Integer",
    "Long",
    "Float",
    "Double",
    "BigInteger",
    "BigDecimal",
    "int",
];

impl Type {
    pub fn primitive(name: &str) -> Self {
        Type::Primitive(name.to_string())
    }

    pub fn boolean() -> Self {
        Type::primitive(BOOLEAN)
    }

    pub fn collection(inner: Type) -> Self {
        Type::Collection(Box::new(inner))
    }

    pub fn optional(inner: Type) -> Self {
        Type::Optional(Box::new(inner))
    }

    /// The bare name of a primitive or entity type.
    pub fn name(&self) -> Option<&str> {
        match self {
            Type::Primitive(name) | Type::Entity(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Type::Primitive(name) if name.eq_ignore_ascii_case(BOOLEAN))
    }

    pub fn is_numeric(&self) -> bool {
        match self {
            Type::Primitive(name) => NUMERIC_TYPES.iter().any(|n| n.eq_ignore_ascii_case(name)),
            _ => false,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Type::Collection(_))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    /// Element type of a collection; `Error` for anything else.
    pub fn unwrap_collection(&self) -> Type {
        match self {
            Type::Collection(inner) => (**inner).clone(),
            _ => Type::Error,
        }
    }

    /// Content type of an optional; `Error` for anything else.
    pub fn unwrap_optional(&self) -> Type {
        match self {
            Type::Optional(inner) => (**inner).clone(),
            _ => Type::Error,
        }
    }

    /// Human-readable type name for diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            Type::Primitive(name) | Type::Entity(name) => name.clone(),
            Type::Collection(inner) => format!("Collection<{}>", inner.display_name()),
            Type::Optional(inner) => format!("Optional<{}>", inner.display_name()),
            Type::Final => "Final".to_string(),
            Type::Null => "null".to_string(),
            Type::Error => "Error".to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Compatibility of two inferred types.
///
/// `entity_names` are the entity names of the aggregate under analysis;
/// together with [`OBJECT_TYPES`] they are the names `null` is allowed for.
pub fn compatible(a: &Type, b: &Type, entity_names: &[&str]) -> bool {
    if a.is_error() || b.is_error() {
        return true;
    }
    match (a, b) {
        (Type::Null, Type::Null) | (Type::Final, Type::Final) => true,
        (Type::Null, other) | (other, Type::Null) => accepts_null(other, entity_names),
        (Type::Collection(x), Type::Collection(y)) | (Type::Optional(x), Type::Optional(y)) => {
            compatible(x, y, entity_names)
        }
        _ => match (a.name(), b.name()) {
            (Some(x), Some(y)) => {
                x.eq_ignore_ascii_case(y) || (a.is_numeric() && b.is_numeric())
            }
            _ => false,
        },
    }
}

fn accepts_null(ty: &Type, entity_names: &[&str]) -> bool {
    match ty {
        Type::Collection(_) | Type::Optional(_) => true,
        Type::Primitive(name) | Type::Entity(name) => {
            OBJECT_TYPES.contains(&name.as_str()) || entity_names.contains(&name.as_str())
        }
        Type::Final | Type::Null | Type::Error => false,
    }
}

/// Classify a decimal literal: `Integer` when it has no fractional part
/// once trailing zeros are dropped, `Float` otherwise.
pub fn number_literal_type(literal: &str) -> Type {
    let literal = literal.trim_start_matches(['+', '-']);
    let (mantissa, exponent) = match literal.find(['e', 'E']) {
        Some(pos) => (&literal[..pos], exponent(&literal[pos + 1..])),
        None => (literal, 0),
    };
    let fraction = mantissa
        .split_once('.')
        .map(|(_, frac)| frac.trim_end_matches('0'))
        .unwrap_or("");
    let mut scale = (fraction.len() as i64).saturating_sub(exponent);
    if fraction.is_empty() {
        // Trailing zeros of the integer part also lower the scale.
        let integer = mantissa.split('.').next().unwrap_or("");
        let zeros = integer.len() - integer.trim_end_matches('0').len();
        scale = scale.saturating_sub(zeros as i64);
    }
    if scale <= 0 {
        Type::primitive(INTEGER)
    } else {
        Type::primitive(FLOAT)
    }
}

/// Exponents beyond `i64` saturate instead of being dropped.
fn exponent(text: &str) -> i64 {
    if let Ok(value) = text.parse::<i64>() {
        return value;
    }
    let digits = text.trim_start_matches(['+', '-']);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        0
    } else if text.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }
}
