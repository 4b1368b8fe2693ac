//! # Compiled Queries
//!
//! A `Query` is the executable artifact of predicate compilation: an
//! ordered list of nodes evaluated against a base table, plus an optional
//! descriptor ordering.
//!
//! ## Node List
//!
//! Nodes are either column-specialized predicates (one typed column
//! compared against a constant, no expression tree), generic `Compare`
//! expressions, logical markers (`Not`, `Or`), or constant truth values.
//! Conjunction is concatenation ([`Query::and_query`]); a `Not` marker
//! negates the group that follows it; an `Or` marker turns the current
//! group into a disjunction.
//!
//! The storage engine's evaluators consume this list directly; the
//! compiler guarantees a column-specialized node is emitted whenever the
//! predicate shape allows one, which is what makes simple comparisons
//! cheap.

use crate::schema::{ColKey, TableKey};
use crate::types::{Decimal, Timestamp, Uuid};

use super::descriptor::DescriptorOrdering;
use super::expr::Compare;

/// Comparison operator of a column-specialized predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

/// String/binary operator of a column-specialized predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringCompareOp {
    Equal,
    NotEqual,
    BeginsWith,
    EndsWith,
    Contains,
    Like,
}

/// One node of a compiled query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    IntCompare {
        col: ColKey,
        op: CompareOp,
        value: i64,
    },
    BoolCompare {
        col: ColKey,
        op: CompareOp,
        value: bool,
    },
    FloatCompare {
        col: ColKey,
        op: CompareOp,
        value: f32,
    },
    DoubleCompare {
        col: ColKey,
        op: CompareOp,
        value: f64,
    },
    DecimalCompare {
        col: ColKey,
        op: CompareOp,
        value: Decimal,
    },
    TimestampCompare {
        col: ColKey,
        op: CompareOp,
        value: Timestamp,
    },
    UuidCompare {
        col: ColKey,
        op: CompareOp,
        value: Uuid,
    },
    StringCompare {
        col: ColKey,
        op: StringCompareOp,
        value: String,
        case_sensitive: bool,
    },
    BinaryCompare {
        col: ColKey,
        op: StringCompareOp,
        value: Vec<u8>,
        case_sensitive: bool,
    },
    /// Column compared against null; `negated` selects `!= NULL`.
    NullCompare { col: ColKey, negated: bool },
    /// A generic expression comparison (the slow path).
    Expression(Compare),
    /// Negates the node group that follows.
    Not,
    /// Turns the current group into a disjunction.
    Or,
    /// Tautology; matches every object.
    True,
    /// Contradiction; matches nothing.
    False,
}

impl QueryNode {
    /// Whether this node is a column-specialized predicate rather than a
    /// generic expression or marker.
    pub fn is_specialized(&self) -> bool {
        !matches!(
            self,
            QueryNode::Expression(_)
                | QueryNode::Not
                | QueryNode::Or
                | QueryNode::True
                | QueryNode::False
        )
    }
}

/// A compiled, executable query over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: TableKey,
    nodes: Vec<QueryNode>,
    ordering: Option<DescriptorOrdering>,
}

impl Query {
    pub fn new(table: TableKey) -> Self {
        Self {
            table,
            nodes: Vec::new(),
            ordering: None,
        }
    }

    pub fn table(&self) -> TableKey {
        self.table
    }

    pub fn nodes(&self) -> &[QueryNode] {
        &self.nodes
    }

    pub fn push(&mut self, node: QueryNode) {
        self.nodes.push(node);
    }

    /// Conjoins another query's nodes onto this one.
    pub fn and_query(&mut self, other: Query) {
        self.nodes.extend(other.nodes);
    }

    /// Inserts a disjunction marker.
    pub fn or(&mut self) {
        self.nodes.push(QueryNode::Or);
    }

    /// Inserts a negation marker.
    pub fn not(&mut self) {
        self.nodes.push(QueryNode::Not);
    }

    pub fn ordering(&self) -> Option<&DescriptorOrdering> {
        self.ordering.as_ref()
    }

    pub fn set_ordering(&mut self, ordering: DescriptorOrdering) -> &mut Self {
        self.ordering = Some(ordering);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_query_concatenates_nodes() {
        let mut q = Query::new(TableKey(0));
        q.push(QueryNode::True);

        let mut other = Query::new(TableKey(0));
        other.push(QueryNode::False);

        q.and_query(other);
        assert_eq!(q.nodes(), &[QueryNode::True, QueryNode::False]);
    }

    #[test]
    fn markers_are_not_specialized() {
        assert!(!QueryNode::Not.is_specialized());
        assert!(!QueryNode::Or.is_specialized());
        assert!(QueryNode::IntCompare {
            col: ColKey(0),
            op: CompareOp::Equal,
            value: 1
        }
        .is_specialized());
    }
}
