//! # Query Module
//!
//! The predicate query compiler: text → AST → executable [`Query`].
//!
//! ## Pipeline
//!
//! ```text
//! "age == 30 SORT(name ASC)"
//!      │ lexer + parser (this module)
//!      ▼
//! Predicate AST (owned nodes)
//!      │ QueryCompiler, consulting schema + Arguments
//!      ▼
//! Query { nodes, ordering }
//! ```
//!
//! The compiler prefers column-specialized predicate nodes (typed column
//! vs constant) and falls back to generic `Compare` expression trees when
//! operands involve link traversal, aggregates, or mixed types. Paths
//! through link and backlink columns resolve via [`LinkChain`].
//!
//! ## Entry Points
//!
//! - [`Group::query`](crate::schema::Group): compile against a table
//! - [`parse`]: syntax-check a predicate without compiling it
//! - [`QueryCompiler`]: the full pipeline, for callers that reuse a
//!   schema and argument set

mod args;
pub mod ast;
mod compiler;
mod descriptor;
mod expr;
mod lexer;
mod link_chain;
mod parser;
#[allow(clippy::module_inception)]
mod query;

pub use args::{Arguments, NoArguments, ValueArguments};
pub use compiler::QueryCompiler;
pub use descriptor::{
    Descriptor, DescriptorOrdering, DistinctDescriptor, LimitDescriptor, MergeMode, SortDescriptor,
};
pub use expr::{ColumnExpr, ColumnKind, Compare, ExprOp, LinkStep, Subexpr};
pub use lexer::{Keyword, Lexer, Token};
pub use link_chain::LinkChain;
pub use parser::parse;
pub use query::{CompareOp, Query, QueryNode, StringCompareOp};
