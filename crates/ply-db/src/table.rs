//! Tables: a schema, key-sorted rows and an optional conflict set.

use std::fmt;

use ply_list::List;
use ply_value::{Struct, Value, ValueStore};

use crate::error::{DbError, DbResult};

const TABLE: &str = "Table";
const SCHEMA: &str = "Schema";
const COLUMN: &str = "Column";

/// Declared kind of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Bool,
    Int,
    Uint,
    String,
    Blob,
    /// Any value.
    Value,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Bool => "bool",
            ColumnKind::Int => "int",
            ColumnKind::Uint => "uint",
            ColumnKind::String => "string",
            ColumnKind::Blob => "blob",
            ColumnKind::Value => "value",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "bool" => ColumnKind::Bool,
            "int" => ColumnKind::Int,
            "uint" => ColumnKind::Uint,
            "string" => ColumnKind::String,
            "blob" => ColumnKind::Blob,
            "value" => ColumnKind::Value,
            _ => return None,
        })
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: false,
        }
    }

    pub fn key(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name, kind)
        }
    }
}

/// Ordered column list of a table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn to_value(&self) -> Value {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Value::Struct(
                    Struct::new(COLUMN)
                        .with("name", c.name.as_str())
                        .with("kind", c.kind.as_str())
                        .with("primary_key", c.primary_key),
                )
            })
            .collect();
        Value::Struct(Struct::new(SCHEMA).with("columns", Value::Tuple(columns)))
    }

    pub fn from_value(value: &Value) -> DbResult<Self> {
        let s = value.expect_struct(SCHEMA)?;
        let mut columns = Vec::new();
        for v in s.require_tuple("columns")? {
            let c = v.expect_struct(COLUMN)?;
            let kind_name = c.require_str("kind")?;
            let kind = ColumnKind::parse(kind_name).ok_or_else(|| DbError::Malformed {
                what: "schema".into(),
                reason: format!("unknown column kind {kind_name:?}"),
            })?;
            let primary_key = c.require("primary_key")?.as_bool().unwrap_or(false);
            columns.push(Column {
                name: c.require_str("name")?.to_string(),
                kind,
                primary_key,
            });
        }
        Ok(Self { columns })
    }
}

/// A divergent edit of one row recorded by a merge.
///
/// `None` means the row is absent on that side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub key: Value,
    pub base: Option<Value>,
    pub ours: Option<Value>,
    pub theirs: Option<Value>,
}

fn opt_to_value(v: &Option<Value>) -> Value {
    Value::Tuple(v.iter().cloned().collect())
}

fn opt_from_value(v: &Value) -> DbResult<Option<Value>> {
    match v.as_tuple() {
        Some([]) => Ok(None),
        Some([inner]) => Ok(Some(inner.clone())),
        _ => Err(DbError::Malformed {
            what: "conflict".into(),
            reason: format!("expected 0- or 1-tuple, found {}", v.kind_name()),
        }),
    }
}

impl Conflict {
    pub fn to_value(&self) -> Value {
        Value::Tuple(vec![
            self.key.clone(),
            opt_to_value(&self.base),
            opt_to_value(&self.ours),
            opt_to_value(&self.theirs),
        ])
    }

    pub fn from_value(value: &Value) -> DbResult<Self> {
        match value.as_tuple() {
            Some([key, base, ours, theirs]) => Ok(Self {
                key: key.clone(),
                base: opt_from_value(base)?,
                ours: opt_from_value(ours)?,
                theirs: opt_from_value(theirs)?,
            }),
            _ => Err(DbError::Malformed {
                what: "conflict".into(),
                reason: "expected a 4-tuple".into(),
            }),
        }
    }
}

fn row_value(key: Value, value: Value) -> Value {
    Value::Tuple(vec![key, value])
}

/// Split a stored row into key and value.
pub fn split_row(row: &Value) -> DbResult<(&Value, &Value)> {
    match row.as_tuple() {
        Some([key, value]) => Ok((key, value)),
        _ => Err(DbError::Malformed {
            what: "row".into(),
            reason: format!("expected a (key, value) tuple, found {}", row.kind_name()),
        }),
    }
}

/// A table: schema, rows sorted by key, and an optional conflict set.
///
/// `conflicts` is `None` when no merge left a marker, `Some(empty)` when a
/// marker remains but every conflict has been resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    schema: Schema,
    rows: List,
    conflicts: Option<List>,
}

impl Table {
    /// An empty table.
    pub fn new(store: ValueStore, schema: Schema) -> Self {
        Self {
            schema,
            rows: List::new(store),
            conflicts: None,
        }
    }

    /// A table holding `rows`, which are sorted by key first.
    pub fn from_rows(
        store: ValueStore,
        schema: Schema,
        rows: impl IntoIterator<Item = (Value, Value)>,
    ) -> DbResult<Self> {
        let mut rows: Vec<(Value, Value)> = rows.into_iter().collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows.dedup_by(|later, earlier| later.0 == earlier.0);
        let list = List::from_values(store, rows.into_iter().map(|(k, v)| row_value(k, v)))?;
        Ok(Self {
            schema,
            rows: list,
            conflicts: None,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &List {
        &self.rows
    }

    pub fn row_count(&self) -> u64 {
        self.rows.len()
    }

    pub fn store(&self) -> &ValueStore {
        self.rows.store()
    }

    pub fn with_schema(&self, schema: Schema) -> Self {
        Self {
            schema,
            ..self.clone()
        }
    }

    pub fn with_rows(&self, rows: List) -> Self {
        Self {
            rows,
            ..self.clone()
        }
    }

    /// Binary search for `key`: `Ok(index)` if present, otherwise
    /// `Err(insertion index)`.
    fn search(&self, key: &Value) -> DbResult<Result<u64, u64>> {
        let (mut lo, mut hi) = (0u64, self.rows.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let row = self.rows.get(mid)?;
            let (k, _) = split_row(&row)?;
            match k.cmp(key) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(lo))
    }

    pub fn get_row(&self, key: &Value) -> DbResult<Option<Value>> {
        match self.search(key)? {
            Ok(idx) => {
                let row = self.rows.get(idx)?;
                Ok(Some(split_row(&row)?.1.clone()))
            }
            Err(_) => Ok(None),
        }
    }

    /// Insert or replace a row.
    pub fn put_row(&self, key: Value, value: Value) -> DbResult<Table> {
        let rows = match self.search(&key)? {
            Ok(idx) => self.rows.set(idx, row_value(key, value))?,
            Err(idx) => self.rows.insert(idx, row_value(key, value))?,
        };
        Ok(self.with_rows(rows))
    }

    /// Remove a row; absent keys leave the table unchanged.
    pub fn delete_row(&self, key: &Value) -> DbResult<Table> {
        match self.search(key)? {
            Ok(idx) => Ok(self.with_rows(self.rows.remove(idx)?)),
            Err(_) => Ok(self.clone()),
        }
    }

    /// All rows as `(key, value)` pairs in key order.
    pub fn row_pairs(&self) -> DbResult<Vec<(Value, Value)>> {
        let mut out = Vec::with_capacity(self.rows.len() as usize);
        for row in self.rows.iter() {
            let row = row?;
            let (k, v) = split_row(&row)?;
            out.push((k.clone(), v.clone()));
        }
        Ok(out)
    }

    /// Whether a conflict marker is present, resolved or not.
    pub fn has_conflicts(&self) -> bool {
        self.conflicts.is_some()
    }

    pub fn num_rows_in_conflict(&self) -> u64 {
        self.conflicts.as_ref().map_or(0, List::len)
    }

    pub fn conflicts(&self) -> DbResult<Vec<Conflict>> {
        match &self.conflicts {
            None => Ok(Vec::new()),
            Some(list) => list
                .iter()
                .map(|v| Conflict::from_value(&v?))
                .collect(),
        }
    }

    /// Replace the conflict set. An empty set leaves a resolved marker.
    pub fn with_conflicts(&self, mut conflicts: Vec<Conflict>) -> DbResult<Table> {
        conflicts.sort_by(|a, b| a.key.cmp(&b.key));
        let list = List::from_values(
            self.store().clone(),
            conflicts.iter().map(Conflict::to_value),
        )?;
        Ok(Self {
            conflicts: Some(list),
            ..self.clone()
        })
    }

    /// Drop the conflict marker entirely.
    pub fn clear_conflicts(&self) -> Table {
        Self {
            conflicts: None,
            ..self.clone()
        }
    }

    pub fn to_value(&self) -> Value {
        let mut s = Struct::new(TABLE)
            .with("schema", self.schema.to_value())
            .with("rows", self.rows.to_value());
        if let Some(conflicts) = &self.conflicts {
            s = s.with("conflicts", conflicts.to_value());
        }
        Value::Struct(s)
    }

    pub fn from_value(store: ValueStore, value: &Value) -> DbResult<Self> {
        let s = value.expect_struct(TABLE)?;
        let schema = Schema::from_value(s.require("schema")?)?;
        let rows = List::from_sequence(store.clone(), s.require_list("rows")?.clone());
        let conflicts = match s.get("conflicts") {
            Some(v) => Some(List::from_value(store, v)?),
            None => None,
        };
        Ok(Self {
            schema,
            rows,
            conflicts,
        })
    }
}
