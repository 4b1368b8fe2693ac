//! # Predicate Abstract Syntax Tree
//!
//! This module defines the AST produced by the predicate parser and
//! consumed by the query compiler. All nodes are owned values: a node owns
//! its children, and dropping the root drops the tree.
//!
//! ## Shape
//!
//! ```text
//! OrNode
//!  └── AndNode*
//!       └── AtomPredNode*
//!            ├── Not / Parens          (logical)
//!            ├── Equality / Relational / StringOps
//!            │     └── ValueNode (left, right)
//!            │           ├── Constant (typed text)
//!            │           └── Property (path + terminal)
//!            └── TrueOrFalse
//! ```
//!
//! A `PropertyNode` is either a plain property reference (optionally with
//! a `.@count`/`.@size` post-op), a list aggregate (`path.list.@max`), or
//! a link aggregate (`path.link.@max.prop`).
//!
//! Constants carry their original text plus a kind tag; the compiler
//! interprets the text once it knows the type hint from the opposing
//! operand.

/// Top-level disjunction: one or more conjunctions joined by OR.
#[derive(Debug, Clone, PartialEq)]
pub struct OrNode {
    pub and_preds: Vec<AndNode>,
}

/// Conjunction: one or more atoms joined by AND.
#[derive(Debug, Clone, PartialEq)]
pub struct AndNode {
    pub atom_preds: Vec<AtomPredNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomPredNode {
    Not(Box<AtomPredNode>),
    Parens(Box<OrNode>),
    Equality(EqualityNode),
    Relational(RelationalNode),
    StringOps(StringOpsNode),
    TrueOrFalse(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityOp {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalOp {
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

impl RelationalOp {
    /// The operator's spelling, used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            RelationalOp::Greater => ">",
            RelationalOp::Less => "<",
            RelationalOp::GreaterEqual => ">=",
            RelationalOp::LessEqual => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    BeginsWith,
    EndsWith,
    Contains,
    Like,
}

impl StringOp {
    pub fn as_str(self) -> &'static str {
        match self {
            StringOp::BeginsWith => "beginswith",
            StringOp::EndsWith => "endswith",
            StringOp::Contains => "contains",
            StringOp::Like => "like",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EqualityNode {
    pub left: ValueNode,
    pub right: ValueNode,
    pub op: EqualityOp,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationalNode {
    pub left: ValueNode,
    pub right: ValueNode,
    pub op: RelationalOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringOpsNode {
    pub left: ValueNode,
    pub right: ValueNode,
    pub op: StringOp,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Constant(ConstantNode),
    Property(PropertyNode),
}

/// The textual kind of a constant, decided by the lexer. The compiler
/// interprets `text` according to the kind and the opposing operand's
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantKind {
    Number,
    Float,
    Infinity,
    Nan,
    String,
    Base64,
    Timestamp,
    Uuid,
    Oid,
    Null,
    True,
    False,
    Arg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantNode {
    pub kind: ConstantKind,
    pub text: String,
}

/// How a multi-valued property participates in a comparison. The parser
/// currently always produces `Any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonType {
    #[default]
    Any,
    All,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOp {
    Count,
    Size,
}

impl PostOp {
    pub fn as_str(self) -> &'static str {
        match self {
            PostOp::Count => ".@count",
            PostOp::Size => ".@size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggrOp {
    Max,
    Min,
    Sum,
    Avg,
}

impl AggrOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AggrOp::Max => ".@max",
            AggrOp::Min => ".@min",
            AggrOp::Sum => ".@sum",
            AggrOp::Avg => ".@avg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyNode {
    Prop(PropNode),
    LinkAggr(LinkAggrNode),
    ListAggr(ListAggrNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropNode {
    pub path: PathNode,
    pub identifier: String,
    pub comp_type: ComparisonType,
    pub post_op: Option<PostOp>,
}

/// `path.link.@aggr.prop`: aggregate `prop` over the objects linked
/// through `link`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkAggrNode {
    pub path: PathNode,
    pub link: String,
    pub aggr_op: AggrOp,
    pub prop: String,
}

/// `path.list.@aggr`: aggregate the elements of a list property.
#[derive(Debug, Clone, PartialEq)]
pub struct ListAggrNode {
    pub path: PathNode,
    pub identifier: String,
    pub aggr_op: AggrOp,
}

/// A dotted path of identifiers; backlink segments keep their full
/// `@links.Table.column` spelling as one element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathNode {
    pub elements: Vec<String>,
}

impl PathNode {
    pub fn add_element(&mut self, elem: impl Into<String>) {
        self.elements.push(elem.into());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorNode {
    /// Per-column paths and matching ascending flags.
    Sort {
        columns: Vec<Vec<String>>,
        ascending: Vec<bool>,
    },
    Distinct {
        columns: Vec<Vec<String>>,
    },
    Limit(usize),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescriptorOrderingNode {
    pub orderings: Vec<DescriptorNode>,
}

/// The parser's full output: a predicate and any trailing ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub predicate: OrNode,
    pub ordering: DescriptorOrderingNode,
}
