//! # Expression Trees
//!
//! This module defines the compiled expression model: `Subexpr` operand
//! trees and the generic `Compare` node the slow compilation path emits
//! when a predicate cannot be lowered to a column-specialized primitive.
//!
//! ## Column Model
//!
//! A column operand is a tagged value (scalar, list, link, or backlink)
//! carrying the ordered list of link columns to traverse from the base
//! table. This replaces a template-per-type column hierarchy with one
//! enum the compiler pattern-matches on.
//!
//! ## Operand Order
//!
//! `Compare` nodes store operands in evaluator order, which is *swapped*
//! relative to the source text: `x > y` compiles to `Less(y, x)`. The
//! compiler performs the swap so the evaluator's left-vs-right convention
//! holds throughout.

use smallvec::SmallVec;

use crate::schema::{ColKey, TableKey};
use crate::types::{DataType, QueryValue};

use super::ast::{AggrOp, ComparisonType};

/// One traversal step in a link chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStep {
    /// Follow a link or link-list column forward.
    Forward { col: ColKey },
    /// Traverse backwards through the named origin column.
    Backlink {
        origin_table: TableKey,
        origin_col: ColKey,
    },
}

/// The shape of a terminal column operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar(DataType),
    List(DataType),
    Link,
    LinkList,
    Backlink,
}

/// A column operand: a terminal column reached through zero or more link
/// steps from the base table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnExpr {
    /// The terminal column; `None` for a bare backlink terminal, which
    /// has no column of its own.
    pub col: Option<ColKey>,
    pub kind: ColumnKind,
    pub links: SmallVec<[LinkStep; 2]>,
    pub comparison: ComparisonType,
}

impl ColumnExpr {
    /// Whether reaching this column requires link traversal. Properties
    /// with link traversal are excluded from the specialized fast path.
    pub fn links_exist(&self) -> bool {
        !self.links.is_empty()
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, ColumnKind::List(_))
    }

    pub fn data_type(&self) -> DataType {
        match self.kind {
            ColumnKind::Scalar(dt) | ColumnKind::List(dt) => dt,
            ColumnKind::Link => DataType::Link,
            // Backlinks are multi-valued like link lists.
            ColumnKind::LinkList | ColumnKind::Backlink => DataType::LinkList,
        }
    }
}

/// An operand of a comparison: a column reference, a constant, or a
/// derived value (count, size, aggregate).
#[derive(Debug, Clone, PartialEq)]
pub enum Subexpr {
    Column(ColumnExpr),
    Constant(QueryValue),
    /// `.@count` over a link or backlink column.
    Count(ColumnExpr),
    /// `.@size` over a list, string, or binary column.
    Size(ColumnExpr),
    /// An aggregate over the elements of a primitive list column.
    ListAggregate { column: ColumnExpr, op: AggrOp },
    /// An aggregate over a scalar column of the objects reached through a
    /// link-list column.
    SubColumnAggregate {
        list: ColumnExpr,
        column: ColKey,
        data_type: DataType,
        op: AggrOp,
    },
}

impl Subexpr {
    /// The operand's data type, used as the hint when compiling the
    /// opposing constant. `None` when the type is unknown (e.g. null).
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Subexpr::Column(col) => Some(col.data_type()),
            Subexpr::Constant(value) => value.data_type(),
            Subexpr::Count(_) | Subexpr::Size(_) => Some(DataType::Int),
            Subexpr::ListAggregate { column, op } => match op {
                AggrOp::Avg => Some(DataType::Double),
                _ => Some(column.data_type()),
            },
            Subexpr::SubColumnAggregate { data_type, op, .. } => match op {
                AggrOp::Avg => Some(DataType::Double),
                _ => Some(*data_type),
            },
        }
    }

    /// Whether this operand evaluates to a constant without consulting
    /// any object.
    pub fn has_constant_evaluation(&self) -> bool {
        matches!(self, Subexpr::Constant(_))
    }

    /// The plain column reference, if this operand is one. The fast path
    /// only applies to such operands.
    pub fn as_column(&self) -> Option<&ColumnExpr> {
        match self {
            Subexpr::Column(col) => Some(col),
            _ => None,
        }
    }

    pub fn is_list_column(&self) -> bool {
        matches!(self, Subexpr::Column(col) if col.is_list())
    }

    pub fn as_constant(&self) -> Option<&QueryValue> {
        match self {
            Subexpr::Constant(value) => Some(value),
            _ => None,
        }
    }
}

/// Operator of a generic comparison node, including the case-insensitive
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    BeginsWith,
    EndsWith,
    Contains,
    Like,
    EqualIns,
    NotEqualIns,
    BeginsWithIns,
    EndsWithIns,
    ContainsIns,
    LikeIns,
}

/// A generic comparison: the slow-path output of predicate compilation.
/// Operands are stored in evaluator order (see the module docs).
#[derive(Debug, Clone, PartialEq)]
pub struct Compare {
    pub op: ExprOp,
    pub left: Subexpr,
    pub right: Subexpr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn scalar_int() -> ColumnExpr {
        ColumnExpr {
            col: Some(ColKey(0)),
            kind: ColumnKind::Scalar(DataType::Int),
            links: SmallVec::new(),
            comparison: ComparisonType::Any,
        }
    }

    #[test]
    fn plain_column_has_no_links() {
        assert!(!scalar_int().links_exist());
    }

    #[test]
    fn linked_column_reports_links() {
        let col = ColumnExpr {
            links: smallvec![LinkStep::Forward { col: ColKey(1) }],
            ..scalar_int()
        };
        assert!(col.links_exist());
    }

    #[test]
    fn count_and_size_are_integers() {
        assert_eq!(Subexpr::Count(scalar_int()).data_type(), Some(DataType::Int));
        assert_eq!(Subexpr::Size(scalar_int()).data_type(), Some(DataType::Int));
    }

    #[test]
    fn average_aggregates_report_double() {
        let list = ColumnExpr {
            kind: ColumnKind::List(DataType::Int),
            ..scalar_int()
        };
        let avg = Subexpr::ListAggregate {
            column: list.clone(),
            op: AggrOp::Avg,
        };
        let max = Subexpr::ListAggregate {
            column: list,
            op: AggrOp::Max,
        };

        assert_eq!(avg.data_type(), Some(DataType::Double));
        assert_eq!(max.data_type(), Some(DataType::Int));
    }

    #[test]
    fn null_constant_has_unknown_type() {
        assert_eq!(Subexpr::Constant(QueryValue::Null).data_type(), None);
        assert!(Subexpr::Constant(QueryValue::Null).has_constant_evaluation());
    }
}
