//! Normalized type classes.
//!
//! PostgreSQL reports the same storage type under several names
//! (`int8`, `bigint`, `bigserial`, ...). Comparing rendered types against
//! introspected ones goes through [`classify`] so cosmetic differences never
//! produce a change.

/// An equivalence class of PostgreSQL type names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// `INT2`, `SMALLINT`, `SMALLSERIAL`, `SERIAL2`.
    SmallInt,
    /// `INT`, `INT4`, `INTEGER`, `SERIAL`, `SERIAL4`.
    Integer,
    /// `INT8`, `BIGINT`, `SERIAL8`, `BIGSERIAL`.
    BigInt,
    /// `REAL`, `FLOAT4`.
    Real,
    /// `DOUBLE PRECISION`, `FLOAT8`, `FLOAT`.
    Double,
    /// `NUMERIC`, `DECIMAL`.
    Numeric,
    /// `BOOL`, `BOOLEAN`.
    Boolean,
    /// `TEXT`.
    Text,
    /// `VARCHAR`, `CHARACTER VARYING`, with optional length.
    Varchar(Option<u32>),
    /// `CHAR`, `CHARACTER`, `BPCHAR`, with optional length.
    Char(Option<u32>),
    /// `TIMESTAMP`, `TIMESTAMP WITHOUT TIME ZONE`.
    Timestamp,
    /// `TIMESTAMPTZ`, `TIMESTAMP WITH TIME ZONE`.
    TimestampTz,
    /// `DATE`.
    Date,
    /// `TIME`, `TIME WITHOUT TIME ZONE`.
    Time,
    /// `TIMETZ`, `TIME WITH TIME ZONE`.
    TimeTz,
    /// `BYTEA`.
    Bytea,
    /// `UUID`.
    Uuid,
    /// `JSON`.
    Json,
    /// `JSONB`.
    Jsonb,
    /// `<ELEM>[]`, reported as `_<elem>`.
    Array(Box<TypeClass>),
    /// Anything else, by normalized name.
    Other(String),
}

impl TypeClass {
    /// Returns true for character types, whose defaults are quoted.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text | Self::Varchar(_) | Self::Char(_))
    }
}

/// A type name split into its parts, normalized to upper case with single
/// spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedType {
    /// Name without modifiers, e.g. `TIMESTAMP WITH TIME ZONE`.
    base: String,
    /// Text between the parentheses, e.g. `255` or `10,2`.
    args: Option<String>,
    /// `TEXT[]`, or the `_text` spelling `udt_name` uses for arrays.
    array: bool,
}

/// Parses `VARCHAR(255)`, `TIMESTAMP(3) WITH TIME ZONE`, `INTEGER[]` or
/// `_int4`.
fn parse_type(type_name: &str) -> ParsedType {
    let normalized = type_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();

    let mut name = normalized.as_str();
    let mut array = false;
    while let Some(element) = name.strip_suffix("[]") {
        name = element.trim_end();
        array = true;
    }
    if let Some(element) = name.strip_prefix('_') {
        name = element;
        array = true;
    }

    let (base, args) = match (name.find('('), name.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let before = name[..open].trim();
            let after = name[close + 1..].trim();
            let base = if after.is_empty() {
                before.to_string()
            } else {
                format!("{before} {after}")
            };
            (base, Some(name[open + 1..close].trim().to_string()))
        }
        _ => (name.trim().to_string(), None),
    };

    ParsedType { base, args, array }
}

/// Classifies a type name. `length` is a separately reported character
/// length, used when the name itself carries none.
#[must_use]
pub fn classify(type_name: &str, length: Option<u32>) -> TypeClass {
    let ParsedType { base, args, array } = parse_type(type_name);
    let declared_length = args.and_then(|a| a.parse::<u32>().ok()).or(length);

    let class = match base.as_str() {
        "INT2" | "SMALLINT" | "SMALLSERIAL" | "SERIAL2" => TypeClass::SmallInt,
        "INT" | "INT4" | "INTEGER" | "SERIAL" | "SERIAL4" => TypeClass::Integer,
        "INT8" | "BIGINT" | "SERIAL8" | "BIGSERIAL" => TypeClass::BigInt,
        "REAL" | "FLOAT4" => TypeClass::Real,
        "DOUBLE PRECISION" | "FLOAT8" | "FLOAT" => TypeClass::Double,
        "NUMERIC" | "DECIMAL" => TypeClass::Numeric,
        "BOOL" | "BOOLEAN" => TypeClass::Boolean,
        "TEXT" => TypeClass::Text,
        "VARCHAR" | "CHARACTER VARYING" => TypeClass::Varchar(declared_length),
        "CHAR" | "CHARACTER" | "BPCHAR" => TypeClass::Char(declared_length),
        "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => TypeClass::Timestamp,
        "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => TypeClass::TimestampTz,
        "DATE" => TypeClass::Date,
        "TIME" | "TIME WITHOUT TIME ZONE" => TypeClass::Time,
        "TIMETZ" | "TIME WITH TIME ZONE" => TypeClass::TimeTz,
        "BYTEA" => TypeClass::Bytea,
        "UUID" => TypeClass::Uuid,
        "JSON" => TypeClass::Json,
        "JSONB" => TypeClass::Jsonb,
        _ => TypeClass::Other(base),
    };

    if array {
        TypeClass::Array(Box::new(class))
    } else {
        class
    }
}

fn classes_equivalent(expected: &TypeClass, actual: &TypeClass) -> bool {
    match (expected, actual) {
        (TypeClass::Varchar(a), TypeClass::Varchar(b)) | (TypeClass::Char(a), TypeClass::Char(b)) => {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }
        (TypeClass::Array(a), TypeClass::Array(b)) => classes_equivalent(a, b),
        (a, b) => a == b,
    }
}

/// Returns whether an expected rendered type matches an introspected one.
///
/// Character lengths only count when both sides report one. Arrays match
/// when their element types do.
#[must_use]
pub fn types_equivalent(expected: &str, actual: &str, actual_length: Option<u32>) -> bool {
    classes_equivalent(&classify(expected, None), &classify(actual, actual_length))
}

/// Maps pseudo-types that only exist in CREATE TABLE to their storage type,
/// for use in `ALTER COLUMN ... TYPE`.
#[must_use]
pub fn alter_type_target(sql_type: &str) -> String {
    let parsed = parse_type(sql_type);
    if parsed.array {
        return sql_type.to_string();
    }
    match parsed.base.as_str() {
        "SMALLSERIAL" | "SERIAL2" => "SMALLINT".to_string(),
        "SERIAL" | "SERIAL4" => "INTEGER".to_string(),
        "BIGSERIAL" | "SERIAL8" => "BIGINT".to_string(),
        _ => sql_type.to_string(),
    }
}
