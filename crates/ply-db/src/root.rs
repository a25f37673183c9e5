//! Root values: the map from table name to table that a commit snapshots.

use std::collections::{BTreeMap, BTreeSet};

use ply_types::Hash;
use ply_value::{Ref, Struct, Value, ValueStore};

use crate::error::{DbError, DbResult};
use crate::table::Table;

const ROOT_VALUE: &str = "RootValue";
const TABLES: &str = "Tables";

/// Name → table ref map. Cheap to clone; tables are loaded on demand.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootValue {
    tables: BTreeMap<String, Ref>,
}

impl RootValue {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_ref(&self, name: &str) -> Option<&Ref> {
        self.tables.get(name)
    }

    /// Hash of the named table's value, if present.
    pub fn table_hash(&self, name: &str) -> Option<Hash> {
        self.tables.get(name).map(Ref::target_hash)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Load the named table.
    pub fn get_table(&self, store: &ValueStore, name: &str) -> DbResult<Option<Table>> {
        match self.tables.get(name) {
            Some(r) => {
                let value = r.target_value(store)?;
                Ok(Some(Table::from_value(store.clone(), &value)?))
            }
            None => Ok(None),
        }
    }

    /// Write `table` and point `name` at it.
    pub fn put_table(&self, store: &ValueStore, name: &str, table: &Table) -> DbResult<RootValue> {
        let r = store.write_value(&table.to_value())?;
        Ok(self.put_table_ref(name, r))
    }

    pub fn put_table_ref(&self, name: &str, table: Ref) -> RootValue {
        let mut tables = self.tables.clone();
        tables.insert(name.to_string(), table);
        Self { tables }
    }

    /// Drop the named tables; names that are absent are ignored.
    pub fn remove_tables<S: AsRef<str>>(&self, names: &[S]) -> RootValue {
        let mut tables = self.tables.clone();
        for name in names {
            tables.remove(name.as_ref());
        }
        Self { tables }
    }

    pub fn to_value(&self) -> Value {
        let tables = self
            .tables
            .iter()
            .fold(Struct::new(TABLES), |s, (name, r)| s.with(name.as_str(), r.clone()));
        Value::Struct(Struct::new(ROOT_VALUE).with("tables", Value::Struct(tables)))
    }

    pub fn from_value(value: &Value) -> DbResult<Self> {
        let s = value.expect_struct(ROOT_VALUE)?;
        let tables = s.require("tables")?.expect_struct(TABLES)?;
        let mut out = BTreeMap::new();
        for (name, v) in &tables.fields {
            let r = v.as_ref_value().ok_or_else(|| DbError::Malformed {
                what: "root value".into(),
                reason: format!("table {name:?} is a {}, not a ref", v.kind_name()),
            })?;
            out.insert(name.clone(), r.clone());
        }
        Ok(Self { tables: out })
    }

    pub fn hash(&self) -> Hash {
        self.to_value().hash()
    }
}

/// Sorted union of the table names of two roots.
pub fn union_table_names(a: &RootValue, b: &RootValue) -> Vec<String> {
    a.tables
        .keys()
        .chain(b.tables.keys())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Copy the named tables from `from` into `to`.
///
/// A name missing from `from` is removed from `to`, so afterwards `to` agrees
/// with `from` on every name in `names`.
pub fn move_tables_between_roots<S: AsRef<str>>(
    names: &[S],
    from: &RootValue,
    to: &RootValue,
) -> RootValue {
    let mut tables = to.tables.clone();
    for name in names {
        let name = name.as_ref();
        match from.tables.get(name) {
            Some(r) => {
                tables.insert(name.to_string(), r.clone());
            }
            None => {
                tables.remove(name);
            }
        }
    }
    RootValue { tables }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnKind, Schema};
    use ply_store::InMemoryChunkStore;
    use std::sync::Arc;

    fn store() -> ValueStore {
        ValueStore::new(Arc::new(InMemoryChunkStore::new()))
    }

    fn table(store: &ValueStore, n: i64) -> Table {
        Table::from_rows(
            store.clone(),
            Schema::new(vec![Column::key("id", ColumnKind::Int)]),
            (0..n).map(|i| (Value::Int(i), Value::Int(i))),
        )
        .unwrap()
    }

    #[test]
    fn put_get_remove() {
        let s = store();
        let root = RootValue::empty()
            .put_table(&s, "a", &table(&s, 3))
            .unwrap()
            .put_table(&s, "b", &table(&s, 5))
            .unwrap();
        assert_eq!(root.table_names(), vec!["a", "b"]);
        assert_eq!(root.get_table(&s, "b").unwrap().unwrap().row_count(), 5);
        assert!(root.get_table(&s, "c").unwrap().is_none());

        let root = root.remove_tables(&["a", "zzz"]);
        assert_eq!(root.table_names(), vec!["b"]);
    }

    #[test]
    fn value_round_trip_and_hash_stability() {
        let s = store();
        let t = table(&s, 10);
        let r1 = RootValue::empty()
            .put_table(&s, "x", &t)
            .unwrap()
            .put_table(&s, "y", &t)
            .unwrap();
        let r2 = RootValue::empty()
            .put_table(&s, "y", &t)
            .unwrap()
            .put_table(&s, "x", &t)
            .unwrap();
        assert_eq!(r1.hash(), r2.hash());
        assert_eq!(RootValue::from_value(&r1.to_value()).unwrap(), r1);
    }

    #[test]
    fn union_and_move() {
        let s = store();
        let a = RootValue::empty()
            .put_table(&s, "t1", &table(&s, 1))
            .unwrap()
            .put_table(&s, "t2", &table(&s, 2))
            .unwrap();
        let b = RootValue::empty()
            .put_table(&s, "t2", &table(&s, 20))
            .unwrap()
            .put_table(&s, "t3", &table(&s, 3))
            .unwrap();
        assert_eq!(union_table_names(&a, &b), vec!["t1", "t2", "t3"]);

        let moved = move_tables_between_roots(&["t2", "t3"], &a, &b);
        assert_eq!(moved.table_names(), vec!["t2"]);
        assert_eq!(moved.table_hash("t2"), a.table_hash("t2"));
    }
}
