//! Row → model mapping.
//!
//! A model declares its fields and their kinds; the engine coerces each mapped column into
//! that kind and hands the result to the model's factory:
//! ```rust
//! use sqlite_queue::prelude::*;
//!
//! struct Item {
//!     title: String,
//!     price: Option<f64>,
//! }
//!
//! impl Model for Item {
//!     const NAME: &'static str = "Item";
//!
//!     fn fields() -> &'static [FieldSpec] {
//!         const FIELDS: &[FieldSpec] = &[
//!             FieldSpec::new("title", FieldKind::Text),
//!             FieldSpec::new("price", FieldKind::Real),
//!         ];
//!         FIELDS
//!     }
//!
//!     fn key_map() -> KeyMap {
//!         KeyMap::identity().with("title", "name")
//!     }
//!
//!     fn from_fields(fields: &mut FieldValues) -> Result<Self, SqliteQueueError> {
//!         Ok(Self {
//!             title: fields.take("title")?,
//!             price: fields.take("price")?,
//!         })
//!     }
//! }
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::config::JsonReadOptions;
use crate::error::SqliteQueueError;
use crate::registry::KeyMap;
use crate::results::Row;
use crate::types::RowValues;

/// Static type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Bool,
    Date,
    Blob,
    /// Arrays and objects persisted as JSON text.
    Structured,
}

/// Name and kind of one model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A column value after coercion to its field's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Blob(Vec<u8>),
    Structured(JsonValue),
}

/// A type that can be built from a named, string-identified set of coerced fields.
pub trait Model: Sized {
    /// Identifier the key map is registered under.
    const NAME: &'static str;

    /// Fields the factory consumes, with their kinds.
    fn fields() -> &'static [FieldSpec];

    /// Field → column translation used by `ModelRegistry::register_model`.
    fn key_map() -> KeyMap {
        KeyMap::identity()
    }

    /// Build an instance from coerced field values.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::MappingError` when a field is missing or of the wrong kind.
    fn from_fields(fields: &mut FieldValues) -> Result<Self, SqliteQueueError>;
}

/// Conversion out of a coerced [`FieldValue`]. On mismatch the value is handed back for the
/// error message.
pub trait FromFieldValue: Sized {
    /// # Errors
    /// Returns the original value when it is not of the expected kind.
    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue>;
}

macro_rules! from_field_value {
    ($ty:ty, $variant:ident) => {
        impl FromFieldValue for $ty {
            fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
                match value {
                    FieldValue::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

from_field_value!(String, Text);
from_field_value!(i64, Integer);
from_field_value!(f64, Real);
from_field_value!(bool, Bool);
from_field_value!(NaiveDateTime, Date);
from_field_value!(Vec<u8>, Blob);
from_field_value!(JsonValue, Structured);

impl FromFieldValue for i32 {
    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Integer(i) => i32::try_from(i).map_err(|_| FieldValue::Integer(i)),
            other => Err(other),
        }
    }
}

impl<T: FromFieldValue> FromFieldValue for Option<T> {
    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field_value(other).map(Some),
        }
    }
}

/// Coerced values for one row, keyed by field name.
#[derive(Debug, Clone)]
pub struct FieldValues {
    model: &'static str,
    values: HashMap<&'static str, FieldValue>,
}

impl FieldValues {
    /// Remove and convert the value of `field`.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::MappingError` when the field was not declared, was already
    /// taken, or does not convert into `T` (including NULL into a non-`Option`).
    pub fn take<T: FromFieldValue>(&mut self, field: &str) -> Result<T, SqliteQueueError> {
        let value = self.remove(field)?;
        T::from_field_value(value).map_err(|value| {
            SqliteQueueError::mapping(format!(
                "field `{field}` of {} cannot hold {value:?} as {}",
                self.model,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Remove a structured field and decode it into `T` with `serde`.
    ///
    /// # Errors
    /// Returns `SqliteQueueError::MappingError` when the field is missing or the JSON does not
    /// match `T`.
    pub fn take_structured<T: DeserializeOwned>(
        &mut self,
        field: &str,
    ) -> Result<T, SqliteQueueError> {
        let json = match self.remove(field)? {
            FieldValue::Null => JsonValue::Null,
            FieldValue::Structured(json) => json,
            other => {
                return Err(SqliteQueueError::mapping(format!(
                    "field `{field}` of {} is not structured: {other:?}",
                    self.model
                )));
            }
        };
        serde_json::from_value(json).map_err(|err| {
            SqliteQueueError::mapping(format!(
                "field `{field}` of {} does not decode: {err}",
                self.model
            ))
        })
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    fn remove(&mut self, field: &str) -> Result<FieldValue, SqliteQueueError> {
        self.values.remove(field).ok_or_else(|| {
            SqliteQueueError::mapping(format!(
                "field `{field}` is not declared by {} or was already taken",
                self.model
            ))
        })
    }
}

/// Build one `M` from `row`, reading each declared field from the column `key_map` names.
///
/// # Errors
/// Returns `SqliteQueueError::MappingError` when a mapped column is absent from the row or a
/// value cannot be coerced.
pub(crate) fn map_row<M: Model>(
    row: &Row,
    key_map: &KeyMap,
    json: JsonReadOptions,
) -> Result<M, SqliteQueueError> {
    let specs = M::fields();
    let mut values = HashMap::with_capacity(specs.len());
    for spec in specs {
        let column = key_map.column_for(spec.name);
        let raw = row.get(column).ok_or_else(|| {
            SqliteQueueError::mapping(format!(
                "column `{column}` for field `{}` of {} is not in the result",
                spec.name,
                M::NAME
            ))
        })?;
        let coerced = coerce(raw, spec.kind, json).map_err(|reason| {
            SqliteQueueError::mapping(format!(
                "column `{column}` for field `{}` of {}: {reason}",
                spec.name,
                M::NAME
            ))
        })?;
        values.insert(spec.name, coerced);
    }
    M::from_fields(&mut FieldValues {
        model: M::NAME,
        values,
    })
}

/// Coerce a row value into `kind`.
///
/// # Errors
/// Returns a description of why the value does not fit.
pub fn coerce(
    value: &RowValues,
    kind: FieldKind,
    json: JsonReadOptions,
) -> Result<FieldValue, String> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }
    let mismatch = || format!("{} value {value:?} is not coercible to {kind:?}", value.kind_name());
    match kind {
        FieldKind::Text => match value {
            RowValues::Text(s) => Ok(FieldValue::Text(s.clone())),
            RowValues::Int(i) => Ok(FieldValue::Text(i.to_string())),
            RowValues::Float(f) => Ok(FieldValue::Text(f.to_string())),
            RowValues::Blob(bytes) => String::from_utf8(bytes.clone())
                .map(FieldValue::Text)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        FieldKind::Integer => match value {
            RowValues::Int(i) => Ok(FieldValue::Integer(*i)),
            RowValues::Bool(b) => Ok(FieldValue::Integer(i64::from(*b))),
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => {
                Ok(FieldValue::Integer(*f as i64))
            }
            RowValues::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        FieldKind::Real => match value {
            RowValues::Float(f) => Ok(FieldValue::Real(*f)),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(i) => Ok(FieldValue::Real(*i as f64)),
            RowValues::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Real)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        FieldKind::Bool => match value {
            RowValues::Bool(b) => Ok(FieldValue::Bool(*b)),
            RowValues::Int(i) => Ok(FieldValue::Bool(*i != 0)),
            RowValues::Float(f) => Ok(FieldValue::Bool(*f != 0.0)),
            RowValues::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(FieldValue::Bool(true)),
                "false" | "no" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        FieldKind::Date => match value {
            RowValues::Timestamp(dt) => Ok(FieldValue::Date(*dt)),
            RowValues::Text(s) => parse_date(s.trim()).map(FieldValue::Date).ok_or_else(mismatch),
            RowValues::Int(secs) => DateTime::from_timestamp(*secs, 0)
                .map(|dt| FieldValue::Date(dt.naive_utc()))
                .ok_or_else(mismatch),
            RowValues::Float(secs) => unix_float(*secs).map(FieldValue::Date).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        FieldKind::Blob => match value {
            RowValues::Blob(bytes) => Ok(FieldValue::Blob(bytes.clone())),
            RowValues::Text(s) => Ok(FieldValue::Blob(s.clone().into_bytes())),
            _ => Err(mismatch()),
        },
        FieldKind::Structured => {
            let decoded = match value {
                RowValues::JSON(v) => v.clone(),
                RowValues::Text(s) => serde_json::from_str::<JsonValue>(s)
                    .map_err(|err| format!("invalid JSON text: {err}"))?,
                RowValues::Blob(bytes) => serde_json::from_slice::<JsonValue>(bytes)
                    .map_err(|err| format!("invalid JSON bytes: {err}"))?,
                RowValues::Int(i) if json.allow_fragments => JsonValue::from(*i),
                RowValues::Float(f) if json.allow_fragments => JsonValue::from(*f),
                _ => return Err(mismatch()),
            };
            if !json.allow_fragments && !(decoded.is_array() || decoded.is_object()) {
                return Err(format!(
                    "JSON fragment {decoded} rejected (fragments are not allowed)"
                ));
            }
            Ok(FieldValue::Structured(decoded))
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDateTime> {
    const LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn unix_float(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    #[allow(clippy::cast_possible_truncation)]
    let secs = whole as i64;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::RowColumns;
    use serde_json::json;

    const STRICT: JsonReadOptions = JsonReadOptions {
        allow_fragments: false,
    };

    #[derive(Debug, PartialEq)]
    struct Gadget {
        title: String,
        count: i64,
        active: bool,
        tags: Vec<String>,
        seen: Option<NaiveDateTime>,
    }

    impl Model for Gadget {
        const NAME: &'static str = "Gadget";

        fn fields() -> &'static [FieldSpec] {
            const FIELDS: &[FieldSpec] = &[
                FieldSpec::new("title", FieldKind::Text),
                FieldSpec::new("count", FieldKind::Integer),
                FieldSpec::new("active", FieldKind::Bool),
                FieldSpec::new("tags", FieldKind::Structured),
                FieldSpec::new("seen", FieldKind::Date),
            ];
            FIELDS
        }

        fn from_fields(fields: &mut FieldValues) -> Result<Self, SqliteQueueError> {
            Ok(Self {
                title: fields.take("title")?,
                count: fields.take("count")?,
                active: fields.take("active")?,
                tags: fields.take_structured("tags")?,
                seen: fields.take("seen")?,
            })
        }
    }

    fn row(pairs: &[(&str, RowValues)]) -> Row {
        Row::new(
            RowColumns::new(pairs.iter().map(|(n, _)| (*n).to_string()).collect()),
            pairs.iter().map(|(_, v)| v.clone()).collect(),
        )
    }

    #[test]
    fn maps_through_key_map_with_coercion() {
        let row = row(&[
            ("name", RowValues::Text("widget".into())),
            ("count", RowValues::Text("12".into())),
            ("active", RowValues::Int(1)),
            ("tags", RowValues::Text("[\"a\",\"b\"]".into())),
            ("seen", RowValues::Text("2024-05-01 10:00:00".into())),
        ]);
        let key_map = KeyMap::identity().with("title", "name");
        let gadget: Gadget = map_row(&row, &key_map, STRICT).unwrap();
        assert_eq!(gadget.title, "widget");
        assert_eq!(gadget.count, 12);
        assert!(gadget.active);
        assert_eq!(gadget.tags, ["a", "b"]);
        assert_eq!(
            gadget.seen,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(10, 0, 0)
        );
    }

    #[test]
    fn missing_column_is_a_mapping_error() {
        let row = row(&[("title", RowValues::Text("x".into()))]);
        let err = map_row::<Gadget>(&row, &KeyMap::identity(), STRICT).unwrap_err();
        assert!(matches!(err, SqliteQueueError::MappingError(ref m) if m.contains("`count`")));
    }

    #[test]
    fn non_numeric_text_does_not_become_integer() {
        let err = coerce(&RowValues::Text("twelve".into()), FieldKind::Integer, STRICT).unwrap_err();
        assert!(err.contains("not coercible to Integer"));
        assert!(coerce(&RowValues::Float(1.5), FieldKind::Integer, STRICT).is_err());
        assert_eq!(
            coerce(&RowValues::Float(3.0), FieldKind::Integer, STRICT),
            Ok(FieldValue::Integer(3))
        );
    }

    #[test]
    fn null_into_required_field_fails_but_option_accepts() {
        let mut fields = FieldValues {
            model: "Test",
            values: HashMap::from([("a", FieldValue::Null), ("b", FieldValue::Null)]),
        };
        assert_eq!(fields.take::<Option<String>>("a").unwrap(), None);
        assert!(fields.take::<String>("b").is_err());
        assert!(fields.take::<String>("a").is_err(), "already taken");
    }

    #[test]
    fn dates_from_unix_seconds() {
        let expected = NaiveDate::from_ymd_opt(1970, 1, 2)
            .unwrap()
            .and_hms_milli_opt(0, 0, 0, 500)
            .unwrap();
        assert_eq!(
            coerce(&RowValues::Float(86_400.5), FieldKind::Date, STRICT),
            Ok(FieldValue::Date(expected))
        );
        assert_eq!(
            coerce(&RowValues::Text("1970-01-02".into()), FieldKind::Date, STRICT),
            Ok(FieldValue::Date(expected - chrono::Duration::milliseconds(500)))
        );
    }

    #[test]
    fn fragments_need_permission() {
        let scalar = RowValues::Text("42".into());
        assert!(coerce(&scalar, FieldKind::Structured, STRICT).is_err());
        let lenient = JsonReadOptions {
            allow_fragments: true,
        };
        assert_eq!(
            coerce(&scalar, FieldKind::Structured, lenient),
            Ok(FieldValue::Structured(json!(42)))
        );
    }

    #[test]
    fn i32_rejects_out_of_range() {
        assert!(i32::from_field_value(FieldValue::Integer(i64::MAX)).is_err());
        assert_eq!(i32::from_field_value(FieldValue::Integer(-4)), Ok(-4));
    }
}
