//! Schema introspection: user tables and their column metadata.

use serde::Serialize;

use crate::error::SqliteQueueError;
use crate::placeholders::quote_identifier;
use crate::sqlite::connection::ConnectionHandle;
use crate::types::RowValues;

/// Storage class derived from a column's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColumnType {
    Null,
    Integer,
    Text,
    Real,
    Blob,
}

impl ColumnType {
    /// Classify a declared type with SQLite's affinity rules, checked in SQLite's order.
    /// Declarations that fall through every rule (including an empty one) map to `Null`.
    #[must_use]
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnType::Text
        } else if upper.contains("BLOB") {
            ColumnType::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else {
            ColumnType::Null
        }
    }
}

/// One column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    name: String,
    ordinal: i64,
    column_type: ColumnType,
    declared_type: String,
    not_null: bool,
    primary_key: bool,
    #[serde(serialize_with = "serialize_default")]
    default_value: Option<RowValues>,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }

    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Declared type text as written in the DDL.
    #[must_use]
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    #[must_use]
    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Default expression as SQLite stores it (the SQL text, e.g. `'draft'` or `0`).
    #[must_use]
    pub fn default_value(&self) -> Option<&RowValues> {
        self.default_value.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescriptor {
    name: String,
    columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// User tables of a database, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    tables: Vec<TableDescriptor>,
}

impl Schema {
    #[must_use]
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

const USER_TABLES_SQL: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
     ORDER BY rowid";

/// Introspect every user table on `handle`.
///
/// # Errors
/// Returns `SqliteQueueError::SchemaError` if the catalog or a table's metadata cannot be read.
pub(crate) fn build_schema(handle: &ConnectionHandle) -> Result<Schema, SqliteQueueError> {
    let table_names = query_rows(handle, USER_TABLES_SQL)?
        .into_iter()
        .map(|row| match row.get("name") {
            Some(RowValues::Text(name)) => Ok(name.clone()),
            other => Err(SqliteQueueError::SchemaError(format!(
                "unexpected table name in catalog: {other:?}"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let columns = table_columns(handle, &name)?;
        tables.push(TableDescriptor { name, columns });
    }
    tracing::debug!(path = handle.path(), tables = tables.len(), "schema built");
    Ok(Schema { tables })
}

fn table_columns(
    handle: &ConnectionHandle,
    table: &str,
) -> Result<Vec<ColumnDescriptor>, SqliteQueueError> {
    let sql = format!("PRAGMA table_info({})", quote_identifier(table));
    query_rows(handle, &sql)?
        .into_iter()
        .map(|row| {
            let field = |name: &str| {
                row.get(name).cloned().ok_or_else(|| {
                    SqliteQueueError::SchemaError(format!("table_info for {table} lacks {name}"))
                })
            };
            let declared_type = match field("type")? {
                RowValues::Text(text) => text,
                _ => String::new(),
            };
            let name = match field("name")? {
                RowValues::Text(text) => text,
                other => {
                    return Err(SqliteQueueError::SchemaError(format!(
                        "column name in {table} is not text: {other:?}"
                    )));
                }
            };
            let default_value = match field("dflt_value")? {
                RowValues::Null => None,
                value => Some(value),
            };
            Ok(ColumnDescriptor {
                name,
                ordinal: field("cid")?.as_int().copied().unwrap_or_default(),
                column_type: ColumnType::from_declared(&declared_type),
                declared_type,
                not_null: field("notnull")?.as_int().is_some_and(|v| *v != 0),
                primary_key: field("pk")?.as_int().is_some_and(|v| *v != 0),
                default_value,
            })
        })
        .collect()
}

fn query_rows(
    handle: &ConnectionHandle,
    sql: &str,
) -> Result<Vec<crate::results::Row>, SqliteQueueError> {
    let introspection = |err: SqliteQueueError| {
        SqliteQueueError::SchemaError(format!("introspection query failed ({sql}): {err}"))
    };
    let mut stmt = handle.prepare(sql).map_err(introspection)?;
    let rows = stmt.cursor().collect_rows().map_err(introspection)?;
    stmt.finalize().map_err(introspection)?;
    Ok(rows)
}

fn serialize_default<S: serde::Serializer>(
    value: &Option<RowValues>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        None | Some(RowValues::Null) => serializer.serialize_none(),
        Some(RowValues::Int(i)) => serializer.serialize_i64(*i),
        Some(RowValues::Float(f)) => serializer.serialize_f64(*f),
        Some(RowValues::Text(s)) => serializer.serialize_str(s),
        Some(other) => serializer.serialize_str(&format!("{other:?}")),
    }
}
