//! # RefDB - Embedded Object Database Core
//!
//! RefDB is the storage-and-query core of an embedded object database:
//! a slab-based file-backed allocator and a predicate query compiler over
//! typed, link-joined tables.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │   Query Compiler (predicate text → Query)    │
//! ├───────────────────┬──────────────────────────┤
//! │  Schema (Group /  │  Argument Binding ($N)   │
//! │  Table / columns) │                          │
//! ├───────────────────┴──────────────────────────┤
//! │   Slab Allocator (unified ref address space) │
//! ├──────────────────────────────────────────────┤
//! │   Memory-Mapped File + Header/Footer         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! **Storage.** Persistent nodes are addressed by *refs*: 8-aligned byte
//! offsets into an address space that starts at the beginning of the
//! attached file and continues past its end into heap slabs. The
//! [`storage::SlabAlloc`] owns this space: it validates the bit-exact
//! file envelope (including streaming-form files whose top-ref lives in
//! a footer), allocates and frees chunks with first-fit reuse, and
//! translates refs to addresses with a binary search over the slab
//! sequence.
//!
//! **Queries.** Textual predicates (`"age > 18 && name CONTAINS[c]
//! \"bo\" SORT(name ASC)"`) compile against a [`schema::Group`] into
//! executable [`query::Query`] values. Comparisons that touch a single
//! typed column compile to column-specialized predicate nodes; anything
//! involving link traversal, aggregates, or mixed types becomes a
//! generic expression tree. Paths may traverse forward links and
//! `@links.Table.column` backlinks.
//!
//! ## Quick Start
//!
//! ```ignore
//! use refdb::query::{NoArguments, QueryNode};
//! use refdb::schema::{ColumnType, Group};
//! use refdb::types::DataType;
//!
//! let mut group = Group::new();
//! let person = group.add_table("class_Person");
//! group.table_mut(person).add_column("age", ColumnType::Scalar(DataType::Int));
//!
//! let query = group.query(person, "age == 30", &NoArguments)?;
//! assert!(matches!(query.nodes()[0], QueryNode::IntCompare { .. }));
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: slab allocator, mmap region, file envelope
//! - [`query`]: lexer, parser, AST, compiler, descriptors
//! - [`schema`]: groups, tables, typed columns
//! - [`types`]: data types and owned constant values
//! - [`parsing`]: literal parsers for the constant forms
//! - [`config`]: constants and the process-wide sync flag

#[macro_use]
mod macros;

pub mod config;
pub mod parsing;
pub mod query;
pub mod schema;
pub mod storage;
pub mod types;

pub use query::{Arguments, NoArguments, Query, QueryCompiler, ValueArguments};
pub use schema::{ColKey, ColumnType, Group, Table, TableKey};
pub use storage::{DetachGuard, FileAttachConfig, InvalidDatabase, Ref, SlabAlloc};
pub use types::{DataType, QueryValue};
