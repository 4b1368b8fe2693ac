//! # Table and Group Definitions
//!
//! This module provides the in-memory schema the query compiler resolves
//! against: a `Group` of named tables, each with named, typed columns.
//!
//! ## Column Model
//!
//! A column is one of four shapes:
//!
//! - `Scalar(DataType)`: a single typed value per object
//! - `List(DataType)`: a list of typed values per object
//! - `Link { target }`: a single link to an object in another table
//! - `LinkList { target }`: a list of such links
//!
//! The compiler pattern-matches on this tagged shape to decide between
//! scalar predicates, list traversal, and link-chain extension.
//!
//! ## Naming
//!
//! Object-store table names carry a `class_` prefix as an implementation
//! detail; [`printable_table_name`] strips it so diagnostics show the name
//! users actually wrote.
//!
//! ## Keys
//!
//! `TableKey` and `ColKey` are opaque indices into the group and table
//! respectively. They are cheap to copy and are what compiled queries
//! carry instead of names.

use hashbrown::HashMap;

use crate::types::DataType;

/// Key of a table within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableKey(pub u32);

/// Key of a column within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColKey(pub u32);

/// The shape and type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Scalar(DataType),
    List(DataType),
    Link { target: TableKey },
    LinkList { target: TableKey },
}

impl ColumnType {
    /// The data type carried by this column; links report the link types.
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::Scalar(dt) | ColumnType::List(dt) => *dt,
            ColumnType::Link { .. } => DataType::Link,
            ColumnType::LinkList { .. } => DataType::LinkList,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ColumnType::List(_) | ColumnType::LinkList { .. })
    }

    /// The table a link or link-list column points at.
    pub fn link_target(&self) -> Option<TableKey> {
        match self {
            ColumnType::Link { target } | ColumnType::LinkList { target } => Some(*target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: String,
    ty: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.ty
    }
}

/// A named table with typed columns.
#[derive(Debug, Clone)]
pub struct Table {
    key: TableKey,
    name: String,
    columns: Vec<ColumnDef>,
    by_name: HashMap<String, ColKey>,
}

impl Table {
    fn new(key: TableKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            columns: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn key(&self) -> TableKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a column and returns its key. Panics on duplicate names;
    /// schema construction is programmer-driven, not data-driven.
    pub fn add_column(&mut self, name: impl Into<String>, ty: ColumnType) -> ColKey {
        let name = name.into();
        assert!(
            !self.by_name.contains_key(&name),
            "duplicate column '{}' in table '{}'",
            name,
            self.name
        );
        let key = ColKey(self.columns.len() as u32);
        self.by_name.insert(name.clone(), key);
        self.columns.push(ColumnDef::new(name, ty));
        key
    }

    pub fn column_key(&self, name: &str) -> Option<ColKey> {
        self.by_name.get(name).copied()
    }

    pub fn column(&self, key: ColKey) -> &ColumnDef {
        &self.columns[key.0 as usize]
    }

    pub fn column_type(&self, key: ColKey) -> ColumnType {
        self.columns[key.0 as usize].column_type()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }
}

/// A collection of tables forming one database schema.
#[derive(Debug, Clone, Default)]
pub struct Group {
    tables: Vec<Table>,
    by_name: HashMap<String, TableKey>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty table and returns its key. Panics on duplicate names.
    pub fn add_table(&mut self, name: impl Into<String>) -> TableKey {
        let name = name.into();
        assert!(
            !self.by_name.contains_key(&name),
            "duplicate table '{}'",
            name
        );
        let key = TableKey(self.tables.len() as u32);
        self.by_name.insert(name.clone(), key);
        self.tables.push(Table::new(key, name));
        key
    }

    pub fn table(&self, key: TableKey) -> &Table {
        &self.tables[key.0 as usize]
    }

    pub fn table_mut(&mut self, key: TableKey) -> &mut Table {
        &mut self.tables[key.0 as usize]
    }

    pub fn table_key(&self, name: &str) -> Option<TableKey> {
        self.by_name.get(name).copied()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }
}

/// Strips the object store's `class_` prefix from a table name, which is
/// an implementation detail that should not be exposed to users.
pub fn printable_table_name(name: &str) -> &str {
    name.strip_prefix("class_").unwrap_or(name)
}
