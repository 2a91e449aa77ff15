use std::fmt;

use chrono::{DateTime, FixedOffset};
use num_bigint::BigInt;
use uuid::Uuid;

use crate::error::EdnError;

/// Source position, 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub namespace: Option<String>,
    pub name: String,
}

impl Symbol {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Keyword {
    pub namespace: Option<String>,
    pub name: String,
}

impl Keyword {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, ":{}/{}", namespace, self.name),
            None => write!(f, ":{}", self.name),
        }
    }
}

/// One parsed form. Metadata never participates in equality.
#[derive(Clone, Debug)]
pub struct Value {
    pub kind: ValueKind,
    pub meta: Option<Box<Value>>,
}

#[derive(Clone, Debug)]
pub enum ValueKind {
    Nil,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Ratio {
        numerator: BigInt,
        denominator: BigInt,
    },
    Float(f64),
    Decimal(String),
    Char(char),
    String(String),
    Symbol(Symbol),
    Keyword(Keyword),
    List(Vec<Value>),
    Vector(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Inst(DateTime<FixedOffset>),
    Uuid(Uuid),
    Tagged {
        tag: Symbol,
        value: Box<Value>,
    },
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind, meta: None }
    }

    pub fn nil() -> Self {
        Self::new(ValueKind::Nil)
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(ValueKind::Symbol(Symbol::simple(name)))
    }

    pub fn symbol_ns(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ValueKind::Symbol(Symbol::qualified(namespace, name)))
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(ValueKind::Keyword(Keyword::simple(name)))
    }

    pub fn keyword_ns(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ValueKind::Keyword(Keyword::qualified(namespace, name)))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::new(ValueKind::List(items))
    }

    pub fn vector(items: Vec<Value>) -> Self {
        Self::new(ValueKind::Vector(items))
    }

    /// Only collections and symbols carry metadata.
    pub fn supports_meta(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::Symbol(_)
                | ValueKind::List(_)
                | ValueKind::Vector(_)
                | ValueKind::Map(_)
                | ValueKind::Set(_)
        )
    }

    /// Merges `pairs` over any existing metadata; new keys override.
    pub fn attach_meta(&mut self, pairs: Vec<(Value, Value)>) {
        let mut merged: Vec<(Value, Value)> = match self.meta.take() {
            Some(meta) => match meta.kind {
                ValueKind::Map(existing) => existing,
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        for (key, value) in pairs {
            if let Some(entry) = merged.iter_mut().find(|entry| entry.0 == key) {
                entry.1 = value;
            } else {
                merged.push((key, value));
            }
        }
        self.meta = Some(Box::new(Value::new(ValueKind::Map(merged))));
    }

    pub fn meta_pairs(&self) -> Option<&[(Value, Value)]> {
        match self.meta.as_deref() {
            Some(Value {
                kind: ValueKind::Map(pairs),
                ..
            }) => Some(pairs),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Self::new(ValueKind::Char(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::new(ValueKind::String(value.to_string()))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl ValueKind {
    /// Builds a map literal, rejecting duplicate keys.
    pub fn map_from_pairs(pairs: Vec<(Value, Value)>) -> Result<ValueKind, EdnError> {
        for (index, (key, _)) in pairs.iter().enumerate() {
            if pairs[..index].iter().any(|(seen, _)| seen == key) {
                return Err(EdnError::lexical(format!("Duplicate key: {key}")));
            }
        }
        Ok(ValueKind::Map(pairs))
    }

    /// Builds a set literal, rejecting duplicate elements.
    pub fn set_from_items(items: Vec<Value>) -> Result<ValueKind, EdnError> {
        for (index, item) in items.iter().enumerate() {
            if items[..index].iter().any(|seen| seen == item) {
                return Err(EdnError::lexical(format!("Duplicate key: {item}")));
            }
        }
        Ok(ValueKind::Set(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::Nil => "nil",
            ValueKind::Bool(_) => "boolean",
            ValueKind::Int(_) | ValueKind::BigInt(_) => "integer",
            ValueKind::Ratio { .. } => "ratio",
            ValueKind::Float(_) => "float",
            ValueKind::Decimal(_) => "decimal",
            ValueKind::Char(_) => "character",
            ValueKind::String(_) => "string",
            ValueKind::Symbol(_) => "symbol",
            ValueKind::Keyword(_) => "keyword",
            ValueKind::List(_) => "list",
            ValueKind::Vector(_) => "vector",
            ValueKind::Map(_) => "map",
            ValueKind::Set(_) => "set",
            ValueKind::Inst(_) => "instant",
            ValueKind::Uuid(_) => "uuid",
            ValueKind::Tagged { .. } => "tagged value",
        }
    }
}

impl PartialEq for ValueKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueKind::Nil, ValueKind::Nil) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::BigInt(a), ValueKind::BigInt(b)) => a == b,
            (ValueKind::Int(a), ValueKind::BigInt(b))
            | (ValueKind::BigInt(b), ValueKind::Int(a)) => *b == BigInt::from(*a),
            (
                ValueKind::Ratio {
                    numerator: an,
                    denominator: ad,
                },
                ValueKind::Ratio {
                    numerator: bn,
                    denominator: bd,
                },
            ) => an == bn && ad == bd,
            // Bit-pattern comparison keeps NaN deterministic inside collections.
            (ValueKind::Float(a), ValueKind::Float(b)) => a.to_bits() == b.to_bits(),
            (ValueKind::Decimal(a), ValueKind::Decimal(b)) => a == b,
            (ValueKind::Char(a), ValueKind::Char(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Symbol(a), ValueKind::Symbol(b)) => a == b,
            (ValueKind::Keyword(a), ValueKind::Keyword(b)) => a == b,
            (ValueKind::List(a), ValueKind::List(b)) => a == b,
            (ValueKind::Vector(a), ValueKind::Vector(b)) => a == b,
            (ValueKind::Map(a), ValueKind::Map(b)) => unordered_pairs_eq(a, b),
            (ValueKind::Set(a), ValueKind::Set(b)) => unordered_eq(a, b),
            (ValueKind::Inst(a), ValueKind::Inst(b)) => a == b,
            (ValueKind::Uuid(a), ValueKind::Uuid(b)) => a == b,
            (
                ValueKind::Tagged { tag: a, value: av },
                ValueKind::Tagged { tag: b, value: bv },
            ) => a == b && av == bv,
            _ => false,
        }
    }
}

fn unordered_pairs_eq(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.iter().any(|(bk, bv)| k == bk && v == bv))
}

fn unordered_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().all(|item| b.contains(item))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Nil => write!(f, "nil"),
            ValueKind::Bool(value) => write!(f, "{value}"),
            ValueKind::Int(value) => write!(f, "{value}"),
            ValueKind::BigInt(value) => write!(f, "{value}N"),
            ValueKind::Ratio {
                numerator,
                denominator,
            } => write!(f, "{numerator}/{denominator}"),
            ValueKind::Float(value) => write_float(f, *value),
            ValueKind::Decimal(value) => write!(f, "{value}M"),
            ValueKind::Char(value) => write_char(f, *value),
            ValueKind::String(value) => write_string(f, value),
            ValueKind::Symbol(value) => write!(f, "{value}"),
            ValueKind::Keyword(value) => write!(f, "{value}"),
            ValueKind::List(items) => write_seq(f, "(", items, ")"),
            ValueKind::Vector(items) => write_seq(f, "[", items, "]"),
            ValueKind::Map(pairs) => {
                write!(f, "{{")?;
                for (index, (key, value)) in pairs.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key} {value}")?;
                }
                write!(f, "}}")
            }
            ValueKind::Set(items) => write_seq(f, "#{", items, "}"),
            ValueKind::Inst(value) => write!(f, "#inst \"{}\"", value.to_rfc3339()),
            ValueKind::Uuid(value) => write!(f, "#uuid \"{value}\""),
            ValueKind::Tagged { tag, value } => write!(f, "#{tag} {value}"),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    write!(f, "{open}")?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            write!(f, " ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "{close}")
}

fn write_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        write!(f, "NaN")
    } else if value.is_infinite() {
        write!(f, "{}", if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else if value.fract() == 0.0 {
        write!(f, "{value:.1}")
    } else {
        write!(f, "{value}")
    }
}

fn write_char(f: &mut fmt::Formatter<'_>, value: char) -> fmt::Result {
    match value {
        '\n' => write!(f, "\\newline"),
        '\r' => write!(f, "\\return"),
        '\t' => write!(f, "\\tab"),
        ' ' => write!(f, "\\space"),
        '\u{0008}' => write!(f, "\\backspace"),
        '\u{000C}' => write!(f, "\\formfeed"),
        other => write!(f, "\\{other}"),
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in value.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            other => write!(f, "{other}")?,
        }
    }
    write!(f, "\"")
}
