//! SQL values and parameter handling.
//!
//! Values travel in both directions: `ToSqlValue` turns entity fields into
//! statement parameters, `FromSqlValue` turns decoded result columns back
//! into entity fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::ValueError;

/// A SQL value that can be used as a parameter or read from a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the SQL representation for inline use (escaped).
    ///
    /// Statements never embed values this way; the mapper uses it to build
    /// identity keys, where `NULL` and `'NULL'` must stay distinct.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{escaped}'")
            }
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Returns whether this is SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in conversion errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOLEAN",
            Self::Int(_) => "INTEGER",
            Self::Float(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB",
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

/// Trait for types that can be read back from SQL values.
pub trait FromSqlValue: Sized {
    /// Converts a decoded column value into `Self`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] when the value has the wrong storage class,
    /// does not fit the target type or cannot be parsed.
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError>;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(i) => Ok(i != 0),
            other => Err(ValueError::new("BOOLEAN", &other)),
        }
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(self)
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Int(i) => Ok(i),
            SqlValue::Bool(b) => Ok(Self::from(b)),
            other => Err(ValueError::new("INTEGER", &other)),
        }
    }
}

// Narrower integers go through i64 and fail when the value does not fit.
macro_rules! impl_narrow_int {
    ($($ty:ty),+) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }

            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
                    let found = value.type_name();
                    let wide = i64::from_sql_value(value)?;
                    Self::try_from(wide).map_err(|_| ValueError {
                        expected: stringify!($ty),
                        found,
                    })
                }
            }
        )+
    };
}

impl_narrow_int!(i32, i16, i8, u32, u16, u8);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl FromSqlValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(i) => Ok(i as Self),
            other => Err(ValueError::new("REAL", &other)),
        }
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        f64::from_sql_value(value).map(|f| f as Self)
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => Err(ValueError::new("TEXT", &other)),
        }
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        self.map_or(SqlValue::Null, ToSqlValue::to_sql_value)
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => Err(ValueError::new("BLOB", &other)),
        }
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn expect_text(value: SqlValue, expected: &'static str) -> Result<String, ValueError> {
    match value {
        SqlValue::Text(s) => Ok(s),
        other => Err(ValueError::new(expected, &other)),
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.format(DATETIME_FORMAT).to_string())
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        let text = expect_text(value, "DATETIME")?;
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.naive_utc())
            .or_else(|_| Self::parse_from_str(&text, DATETIME_FORMAT))
            .map_err(|_| ValueError::unparsable("DATETIME"))
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.to_rfc3339())
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        let text = expect_text(value, "DATETIME")?;
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT).map(|dt| dt.and_utc())
            })
            .map_err(|_| ValueError::unparsable("DATETIME"))
    }
}

impl ToSqlValue for NaiveDate {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.format(DATE_FORMAT).to_string())
    }
}

impl FromSqlValue for NaiveDate {
    fn from_sql_value(value: SqlValue) -> Result<Self, ValueError> {
        let text = expect_text(value, "DATE")?;
        Self::parse_from_str(&text, DATE_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT).map(|dt| dt.date()))
            .map_err(|_| ValueError::unparsable("DATE"))
    }
}

/// SQL text with its positional parameters, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlExpression {
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlExpression {
    /// A parameterless expression.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// An expression with positional parameters.
    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_inline_null() {
        assert_eq!(SqlValue::Null.to_sql_inline(), "NULL");
    }

    #[test]
    fn test_sql_value_inline_text_escaping() {
        assert_eq!(
            SqlValue::Text(String::from("O'Brien")).to_sql_inline(),
            "'O''Brien'"
        );
        // A literal "NULL" string must not collide with SQL NULL.
        assert_ne!(
            SqlValue::Text(String::from("NULL")).to_sql_inline(),
            SqlValue::Null.to_sql_inline()
        );
    }

    #[test]
    fn test_sql_value_inline_blob() {
        assert_eq!(
            SqlValue::Blob(vec![0x48, 0x45, 0x4C, 0x4C, 0x4F]).to_sql_inline(),
            "X'48454C4C4F'"
        );
    }

    #[test]
    fn test_to_sql_value_conversions() {
        assert_eq!(true.to_sql_value(), SqlValue::Bool(true));
        assert_eq!(42_i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(2.5_f64.to_sql_value(), SqlValue::Float(2.5));
        assert_eq!(
            "hello".to_sql_value(),
            SqlValue::Text(String::from("hello"))
        );
        assert_eq!(None::<i32>.to_sql_value(), SqlValue::Null);
        assert_eq!(Some(42_i32).to_sql_value(), SqlValue::Int(42));
    }

    #[test]
    fn test_from_sql_value_integers() {
        assert_eq!(i64::from_sql_value(SqlValue::Int(7)).unwrap(), 7);
        assert_eq!(i32::from_sql_value(SqlValue::Int(-3)).unwrap(), -3);
        assert!(u8::from_sql_value(SqlValue::Int(300)).is_err());
        assert!(i64::from_sql_value(SqlValue::Text("7".into())).is_err());
    }

    #[test]
    fn test_from_sql_value_bool_accepts_integers() {
        assert!(bool::from_sql_value(SqlValue::Int(1)).unwrap());
        assert!(!bool::from_sql_value(SqlValue::Int(0)).unwrap());
        assert!(bool::from_sql_value(SqlValue::Bool(true)).unwrap());
    }

    #[test]
    fn test_from_sql_value_option() {
        assert_eq!(Option::<i64>::from_sql_value(SqlValue::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_sql_value(SqlValue::Text("x".into())).unwrap(),
            Some(String::from("x"))
        );
        let err = String::from_sql_value(SqlValue::Null).unwrap_err();
        assert_eq!(err.expected, "TEXT");
        assert_eq!(err.found, "NULL");
    }

    #[test]
    fn test_from_sql_value_dates() {
        let date = NaiveDate::from_sql_value(SqlValue::Text("2024-03-01".into())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let dt = NaiveDateTime::from_sql_value(SqlValue::Text("2024-03-01 10:30:00".into()))
            .unwrap();
        assert_eq!(dt.to_sql_value(), SqlValue::Text("2024-03-01 10:30:00".into()));

        let utc = DateTime::<Utc>::from_sql_value(SqlValue::Text(
            "2024-03-01T10:30:00+02:00".into(),
        ))
        .unwrap();
        assert_eq!(utc.format("%H:%M").to_string(), "08:30");

        assert!(NaiveDate::from_sql_value(SqlValue::Text("yesterday".into())).is_err());
    }

    #[test]
    fn test_sql_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            SqlValue::Null,
            SqlValue::Int(1),
            SqlValue::Text("a".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,1,"a"]"#);
    }

    #[test]
    fn test_sql_expression_parts() {
        let expr = SqlExpression::with_params("x = ?", vec![SqlValue::Int(1)]);
        assert_eq!(expr.sql(), "x = ?");
        assert_eq!(expr.params(), &[SqlValue::Int(1)]);
        assert!(SqlExpression::new("SELECT 1").params().is_empty());
    }
}
