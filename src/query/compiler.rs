//! # Query Compiler
//!
//! This module lowers the predicate AST to an executable [`Query`]. It is
//! the mediator between the predicate language and the typed column
//! primitives of the storage layer.
//!
//! ## Two Compilation Paths
//!
//! Every comparison is tried against the **fast path** first: when one
//! operand is a property without link traversal, the other evaluates to a
//! constant, and the types match, the compiler emits a column-specialized
//! node: a typed column compared against a typed constant, no expression
//! tree at all. Everything else takes the **slow path**: a generic
//! `Compare` expression with the operands swapped so that `x > y` becomes
//! `Less(y, x)`, preserving the evaluator's left-vs-right convention.
//!
//! ObjectId equality deliberately has no specialization and always takes
//! the generic path.
//!
//! ## Constant Compilation
//!
//! Constants carry only their original text; the compiler interprets the
//! text under a type *hint*, the type of the opposing operand. `30`
//! against a decimal column parses as a decimal; against an int column as
//! an integer. `$N` arguments dispatch on the bound value's type, with a
//! Timestamp/ObjectId fallback in both directions (a bound value that
//! fails one accessor is retried through the other).
//!
//! ## Error Messages
//!
//! Diagnostics name the offending type and the original text, in the
//! storage engine's long-standing message shapes ("Cannot compare two
//! constants", "Unsupported comparison between type '…' and type '…'",
//! "has no property", …).

use eyre::{bail, Result};

use crate::parsing::{
    decode_base64, parse_decimal, parse_int_auto, parse_object_id, parse_timestamp, parse_uuid,
};
use crate::schema::{Group, TableKey};
use crate::types::{data_types_are_comparable, DataType, Decimal, QueryValue};

use super::args::Arguments;
use super::ast::{
    AndNode, AtomPredNode, ConstantKind, ConstantNode, DescriptorNode, DescriptorOrderingNode,
    EqualityNode, EqualityOp, LinkAggrNode, ListAggrNode, OrNode, PostOp, PropNode, PropertyNode,
    RelationalNode, RelationalOp, StringOp, StringOpsNode, ValueNode,
};
use super::descriptor::{
    DescriptorOrdering, DistinctDescriptor, LimitDescriptor, MergeMode, SortDescriptor,
};
use super::expr::{ColumnKind, Compare, ExprOp, Subexpr};
use super::link_chain::LinkChain;
use super::query::{CompareOp, Query, QueryNode, StringCompareOp};

fn type_name(dt: Option<DataType>) -> &'static str {
    match dt {
        Some(dt) => dt.name(),
        None => "unknown",
    }
}

/// Compiles textual predicates against one base table.
///
/// A compiler borrows the schema and the bound arguments for the duration
/// of a single `compile` call; instances are cheap and not reentrant.
pub struct QueryCompiler<'a> {
    group: &'a Group,
    base_table: TableKey,
    args: &'a dyn Arguments,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(group: &'a Group, base_table: TableKey, args: &'a dyn Arguments) -> Self {
        Self {
            group,
            base_table,
            args,
        }
    }

    /// Parses and compiles a predicate, including any ordering suffixes.
    pub fn compile(&self, text: &str) -> Result<Query> {
        let parsed = super::parser::parse(text)
            .map_err(|e| eyre::eyre!("Invalid predicate: '{}': {}", text, e))?;

        let mut query = self.visit_or(&parsed.predicate)?;
        if !parsed.ordering.orderings.is_empty() {
            let ordering = self.visit_ordering(&parsed.ordering)?;
            query.set_ordering(ordering);
        }
        Ok(query)
    }

    fn visit_or(&self, node: &OrNode) -> Result<Query> {
        if node.and_preds.len() == 1 {
            return self.visit_and(&node.and_preds[0]);
        }
        let mut iter = node.and_preds.iter();
        let mut query = self.visit_and(iter.next().expect("disjunction is non-empty"))?;
        query.or();
        for and_pred in iter {
            query.and_query(self.visit_and(and_pred)?);
        }
        Ok(query)
    }

    fn visit_and(&self, node: &AndNode) -> Result<Query> {
        if node.atom_preds.len() == 1 {
            return self.visit_atom(&node.atom_preds[0]);
        }
        let mut query = Query::new(self.base_table);
        for atom in &node.atom_preds {
            query.and_query(self.visit_atom(atom)?);
        }
        Ok(query)
    }

    fn visit_atom(&self, node: &AtomPredNode) -> Result<Query> {
        match node {
            AtomPredNode::Not(inner) => {
                let inner_query = self.visit_atom(inner)?;
                let mut query = Query::new(self.base_table);
                query.not();
                query.and_query(inner_query);
                Ok(query)
            }
            AtomPredNode::Parens(inner) => self.visit_or(inner),
            AtomPredNode::Equality(eq) => self.visit_equality(eq),
            AtomPredNode::Relational(rel) => self.visit_relational(rel),
            AtomPredNode::StringOps(ops) => self.visit_string_ops(ops),
            AtomPredNode::TrueOrFalse(value) => {
                let mut query = Query::new(self.base_table);
                query.push(if *value { QueryNode::True } else { QueryNode::False });
                Ok(query)
            }
        }
    }

    fn visit_equality(&self, node: &EqualityNode) -> Result<Query> {
        let (left, right) = self.cmp(&node.left, &node.right)?;

        let left_type = left.data_type();
        let right_type = right.data_type();

        if let (Some(l), Some(r)) = (left_type, right_type) {
            if !data_types_are_comparable(l, r) {
                bail!(
                    "Unsupported comparison between type '{}' and type '{}'",
                    l.name(),
                    r.name()
                );
            }
        }

        if let Some(prop) = left.as_column() {
            if let (ColumnKind::Scalar(dt), Some(col)) = (prop.kind, prop.col) {
                if !prop.links_exist() && right.has_constant_evaluation() {
                    let value = right.as_constant().expect("constant evaluation");
                    if value.is_null() {
                        let mut query = Query::new(self.base_table);
                        query.push(QueryNode::NullCompare {
                            col,
                            negated: node.op == EqualityOp::NotEqual,
                        });
                        return Ok(query);
                    }
                    if left_type == right_type {
                        let op = match node.op {
                            EqualityOp::Equal => CompareOp::Equal,
                            EqualityOp::NotEqual => CompareOp::NotEqual,
                        };
                        let string_op = match node.op {
                            EqualityOp::Equal => StringCompareOp::Equal,
                            EqualityOp::NotEqual => StringCompareOp::NotEqual,
                        };
                        let specialized = match (dt, value) {
                            (DataType::Int, QueryValue::Int(v)) => Some(QueryNode::IntCompare {
                                col,
                                op,
                                value: *v,
                            }),
                            (DataType::Bool, QueryValue::Bool(v)) => Some(QueryNode::BoolCompare {
                                col,
                                op,
                                value: *v,
                            }),
                            (DataType::String, QueryValue::String(v)) => {
                                Some(QueryNode::StringCompare {
                                    col,
                                    op: string_op,
                                    value: v.clone(),
                                    case_sensitive: node.case_sensitive,
                                })
                            }
                            (DataType::Binary, QueryValue::Binary(v)) => {
                                Some(QueryNode::BinaryCompare {
                                    col,
                                    op: string_op,
                                    value: v.clone(),
                                    case_sensitive: node.case_sensitive,
                                })
                            }
                            (DataType::Timestamp, QueryValue::Timestamp(v)) => {
                                Some(QueryNode::TimestampCompare { col, op, value: *v })
                            }
                            (DataType::Float, QueryValue::Float(v)) => {
                                Some(QueryNode::FloatCompare { col, op, value: *v })
                            }
                            (DataType::Double, QueryValue::Double(v)) => {
                                Some(QueryNode::DoubleCompare { col, op, value: *v })
                            }
                            (DataType::Decimal, QueryValue::Decimal(v)) => {
                                Some(QueryNode::DecimalCompare { col, op, value: *v })
                            }
                            (DataType::Uuid, QueryValue::Uuid(v)) => {
                                Some(QueryNode::UuidCompare { col, op, value: *v })
                            }
                            // ObjectId has no specialization and goes to
                            // the generic path.
                            _ => None,
                        };
                        if let Some(specialized) = specialized {
                            let mut query = Query::new(self.base_table);
                            query.push(specialized);
                            return Ok(query);
                        }
                    }
                }
            }
        }

        let op = match (node.op, node.case_sensitive) {
            (EqualityOp::Equal, true) => ExprOp::Equal,
            (EqualityOp::NotEqual, true) => ExprOp::NotEqual,
            (EqualityOp::Equal, false) => ExprOp::EqualIns,
            (EqualityOp::NotEqual, false) => ExprOp::NotEqualIns,
        };
        Ok(self.expression_query(op, left, right))
    }

    fn visit_relational(&self, node: &RelationalNode) -> Result<Query> {
        let (left, right) = self.cmp(&node.left, &node.right)?;

        let left_type = left.data_type();
        let right_type = right.data_type();

        if left_type == Some(DataType::Uuid) {
            bail!(
                "Unsupported operator {} in query. Only equal (==) and not equal (!=) are supported for this type.",
                node.op.as_str()
            );
        }

        let comparable = match (left_type, right_type) {
            (Some(l), Some(r)) => data_types_are_comparable(l, r),
            _ => false,
        };
        if !comparable {
            bail!(
                "Unsupported comparison between type '{}' and type '{}'",
                type_name(left_type),
                type_name(right_type)
            );
        }

        if let Some(prop) = left.as_column() {
            if let (ColumnKind::Scalar(dt), Some(col)) = (prop.kind, prop.col) {
                if !prop.links_exist()
                    && right.has_constant_evaluation()
                    && left_type == right_type
                {
                    let value = right.as_constant().expect("constant evaluation");
                    let op = match node.op {
                        RelationalOp::Greater => CompareOp::Greater,
                        RelationalOp::Less => CompareOp::Less,
                        RelationalOp::GreaterEqual => CompareOp::GreaterEqual,
                        RelationalOp::LessEqual => CompareOp::LessEqual,
                    };
                    let specialized = match (dt, value) {
                        (DataType::Int, QueryValue::Int(v)) => Some(QueryNode::IntCompare {
                            col,
                            op,
                            value: *v,
                        }),
                        (DataType::Timestamp, QueryValue::Timestamp(v)) => {
                            Some(QueryNode::TimestampCompare { col, op, value: *v })
                        }
                        (DataType::Float, QueryValue::Float(v)) => {
                            Some(QueryNode::FloatCompare { col, op, value: *v })
                        }
                        (DataType::Double, QueryValue::Double(v)) => {
                            Some(QueryNode::DoubleCompare { col, op, value: *v })
                        }
                        (DataType::Decimal, QueryValue::Decimal(v)) => {
                            Some(QueryNode::DecimalCompare { col, op, value: *v })
                        }
                        // Bool, String, Binary, and ObjectId relationals
                        // go to the generic path.
                        _ => None,
                    };
                    if let Some(specialized) = specialized {
                        let mut query = Query::new(self.base_table);
                        query.push(specialized);
                        return Ok(query);
                    }
                }
            }
        }

        // Swap operands so the evaluator's convention holds: x > y is
        // emitted as Less(y, x).
        let op = match node.op {
            RelationalOp::Greater => ExprOp::Less,
            RelationalOp::Less => ExprOp::Greater,
            RelationalOp::GreaterEqual => ExprOp::LessEqual,
            RelationalOp::LessEqual => ExprOp::GreaterEqual,
        };
        Ok(self.expression_query(op, left, right))
    }

    fn visit_string_ops(&self, node: &StringOpsNode) -> Result<Query> {
        let (left, right) = self.cmp(&node.left, &node.right)?;

        let right_type = right.data_type();
        if right_type != Some(DataType::String) && right_type != Some(DataType::Binary) {
            bail!(
                "Unsupported comparison operator '{}' against type '{}', right side must be a string or binary type",
                node.op.as_str(),
                type_name(right_type)
            );
        }

        if let Some(prop) = left.as_column() {
            if let (ColumnKind::Scalar(dt), Some(col)) = (prop.kind, prop.col) {
                if !prop.links_exist()
                    && right.has_constant_evaluation()
                    && Some(dt) == right_type
                {
                    let op = match node.op {
                        StringOp::BeginsWith => StringCompareOp::BeginsWith,
                        StringOp::EndsWith => StringCompareOp::EndsWith,
                        StringOp::Contains => StringCompareOp::Contains,
                        StringOp::Like => StringCompareOp::Like,
                    };
                    let value = right.as_constant().expect("constant evaluation");
                    match value {
                        QueryValue::String(v) => {
                            let mut query = Query::new(self.base_table);
                            query.push(QueryNode::StringCompare {
                                col,
                                op,
                                value: v.clone(),
                                case_sensitive: node.case_sensitive,
                            });
                            return Ok(query);
                        }
                        QueryValue::Binary(v) => {
                            let mut query = Query::new(self.base_table);
                            query.push(QueryNode::BinaryCompare {
                                col,
                                op,
                                value: v.clone(),
                                case_sensitive: node.case_sensitive,
                            });
                            return Ok(query);
                        }
                        _ => {}
                    }
                }
            }
        }

        let op = match (node.op, node.case_sensitive) {
            (StringOp::BeginsWith, true) => ExprOp::BeginsWith,
            (StringOp::EndsWith, true) => ExprOp::EndsWith,
            (StringOp::Contains, true) => ExprOp::Contains,
            (StringOp::Like, true) => ExprOp::Like,
            (StringOp::BeginsWith, false) => ExprOp::BeginsWithIns,
            (StringOp::EndsWith, false) => ExprOp::EndsWithIns,
            (StringOp::Contains, false) => ExprOp::ContainsIns,
            (StringOp::Like, false) => ExprOp::LikeIns,
        };
        Ok(self.expression_query(op, left, right))
    }

    fn expression_query(&self, op: ExprOp, left: Subexpr, right: Subexpr) -> Query {
        let mut query = Query::new(self.base_table);
        query.push(QueryNode::Expression(Compare {
            op,
            left: right,
            right: left,
        }));
        query
    }

    /// Compiles the two operands of a comparison. The non-constant side
    /// compiles first so its type can hint the constant side; two
    /// constants cannot be compared at all.
    fn cmp(&self, left: &ValueNode, right: &ValueNode) -> Result<(Subexpr, Subexpr)> {
        let (left, right) = match (left, right) {
            (ValueNode::Constant(_), ValueNode::Constant(_)) => {
                bail!("Cannot compare two constants");
            }
            (ValueNode::Property(left_prop), ValueNode::Constant(right_const)) => {
                let left = self.visit_property(left_prop)?;
                let right = self.visit_constant(right_const, left.data_type())?;
                (left, right)
            }
            (ValueNode::Constant(left_const), ValueNode::Property(right_prop)) => {
                let right = self.visit_property(right_prop)?;
                let left = self.visit_constant(left_const, right.data_type())?;
                (left, right)
            }
            (ValueNode::Property(left_prop), ValueNode::Property(right_prop)) => {
                let right = self.visit_property(right_prop)?;
                let left = self.visit_property(left_prop)?;
                (left, right)
            }
        };

        if left.is_list_column() && right.is_list_column() {
            bail!("Ordered comparison between two primitive lists is not implemented yet");
        }
        Ok((left, right))
    }

    fn visit_property(&self, node: &PropertyNode) -> Result<Subexpr> {
        match node {
            PropertyNode::Prop(prop) => self.visit_prop(prop),
            PropertyNode::LinkAggr(aggr) => self.visit_link_aggr(aggr),
            PropertyNode::ListAggr(aggr) => self.visit_list_aggr(aggr),
        }
    }

    fn visit_prop(&self, node: &PropNode) -> Result<Subexpr> {
        let mut chain = LinkChain::new(self.group, self.base_table, node.comp_type);
        for elem in &node.path.elements {
            chain.add(elem)?;
        }
        let subexpr = chain.column(&node.identifier)?;

        match node.post_op {
            None => Ok(subexpr),
            Some(post_op) => self.apply_post_op(post_op, subexpr),
        }
    }

    fn apply_post_op(&self, post_op: PostOp, subexpr: Subexpr) -> Result<Subexpr> {
        if let Subexpr::Column(col) = &subexpr {
            match col.kind {
                ColumnKind::Link | ColumnKind::LinkList | ColumnKind::Backlink => {
                    return Ok(Subexpr::Count(col.clone()));
                }
                ColumnKind::List(_) => return Ok(Subexpr::Size(col.clone())),
                ColumnKind::Scalar(DataType::String) | ColumnKind::Scalar(DataType::Binary) => {
                    return Ok(Subexpr::Size(col.clone()));
                }
                ColumnKind::Scalar(_) => {}
            }
        }
        bail!(
            "Operation '{}' is not supported on property of type '{}'",
            post_op.as_str(),
            type_name(subexpr.data_type())
        );
    }

    fn visit_link_aggr(&self, node: &LinkAggrNode) -> Result<Subexpr> {
        let mut chain = LinkChain::new(self.group, self.base_table, Default::default());
        for elem in &node.path.elements {
            chain.add(elem)?;
        }
        let subexpr = chain.column(&node.link)?;

        let link_col = match &subexpr {
            Subexpr::Column(col)
                if matches!(
                    col.kind,
                    ColumnKind::Link | ColumnKind::LinkList | ColumnKind::Backlink
                ) =>
            {
                col.clone()
            }
            _ => bail!(
                "Operation '{}' cannot apply to property '{}' because it is not a list",
                node.aggr_op.as_str(),
                node.link
            ),
        };

        let table = self.group.table(chain.current_table());
        let Some(col_key) = table.column_key(&node.prop) else {
            bail!("'{}' has no property: '{}'", table.name(), node.prop);
        };
        let data_type = match table.column_type(col_key) {
            crate::schema::ColumnType::Scalar(dt)
                if matches!(
                    dt,
                    DataType::Int | DataType::Float | DataType::Double | DataType::Decimal
                ) =>
            {
                dt
            }
            other => bail!(
                "collection aggregate not supported for type '{}'",
                other.data_type().name()
            ),
        };

        Ok(Subexpr::SubColumnAggregate {
            list: link_col,
            column: col_key,
            data_type,
            op: node.aggr_op,
        })
    }

    fn visit_list_aggr(&self, node: &ListAggrNode) -> Result<Subexpr> {
        let mut chain = LinkChain::new(self.group, self.base_table, Default::default());
        for elem in &node.path.elements {
            chain.add(elem)?;
        }
        let subexpr = chain.column(&node.identifier)?;

        match subexpr {
            Subexpr::Column(col) if col.is_list() => Ok(Subexpr::ListAggregate {
                column: col,
                op: node.aggr_op,
            }),
            _ => bail!("Cannot aggregate"),
        }
    }

    fn visit_constant(&self, node: &ConstantNode, hint: Option<DataType>) -> Result<Subexpr> {
        let text = node.text.as_str();
        let value: Option<QueryValue> = match node.kind {
            ConstantKind::Number => Some(if hint == Some(DataType::Decimal) {
                QueryValue::Decimal(parse_decimal(text)?)
            } else {
                QueryValue::Int(parse_int_auto(text)?)
            }),
            ConstantKind::Float => match hint {
                Some(DataType::Float) => Some(QueryValue::Float(
                    text.parse::<f32>()
                        .map_err(|_| eyre::eyre!("invalid float: '{}'", text))?,
                )),
                Some(DataType::Decimal) => Some(QueryValue::Decimal(parse_decimal(text)?)),
                _ => Some(QueryValue::Double(
                    text.parse::<f64>()
                        .map_err(|_| eyre::eyre!("invalid float: '{}'", text))?,
                )),
            },
            ConstantKind::Infinity => {
                let negative = text.starts_with('-');
                match hint {
                    Some(DataType::Float) => Some(QueryValue::Float(if negative {
                        f32::NEG_INFINITY
                    } else {
                        f32::INFINITY
                    })),
                    Some(DataType::Double) => Some(QueryValue::Double(if negative {
                        f64::NEG_INFINITY
                    } else {
                        f64::INFINITY
                    })),
                    Some(DataType::Decimal) => Some(QueryValue::Decimal(parse_decimal(text)?)),
                    _ => bail!("Infinity not supported for {}", type_name(hint)),
                }
            }
            ConstantKind::Nan => match hint {
                Some(DataType::Float) => Some(QueryValue::Float(f32::from_bits(0x7fc0_0000))),
                Some(DataType::Double) => {
                    Some(QueryValue::Double(f64::from_bits(0x7ff8_0000_0000_0000)))
                }
                Some(DataType::Decimal) => Some(QueryValue::Decimal(Decimal::nan())),
                _ => None,
            },
            ConstantKind::String => Some(QueryValue::String(strip_quotes(text).to_string())),
            ConstantKind::Base64 => {
                // B64"…": the payload sits between the opening and the
                // closing quote.
                let payload = &text[4..text.len() - 1];
                let bytes = decode_base64(payload)?;
                match hint {
                    Some(DataType::String) => Some(QueryValue::String(
                        String::from_utf8(bytes)
                            .map_err(|_| eyre::eyre!("Invalid base64 value"))?,
                    )),
                    Some(DataType::Binary) => Some(QueryValue::Binary(bytes)),
                    _ => None,
                }
            }
            ConstantKind::Timestamp => Some(QueryValue::Timestamp(parse_timestamp(text)?)),
            ConstantKind::Uuid => Some(QueryValue::Uuid(parse_uuid(
                &text[5..text.len() - 1],
            )?)),
            ConstantKind::Oid => Some(QueryValue::ObjectId(parse_object_id(
                &text[4..text.len() - 1],
            )?)),
            ConstantKind::Null => match hint {
                Some(DataType::String) => Some(QueryValue::String(String::new())),
                Some(DataType::Binary) => Some(QueryValue::Binary(Vec::new())),
                Some(DataType::LinkList) => bail!("Cannot compare linklist with NULL"),
                _ => Some(QueryValue::Null),
            },
            ConstantKind::True => Some(QueryValue::Bool(true)),
            ConstantKind::False => Some(QueryValue::Bool(false)),
            ConstantKind::Arg => {
                let arg_no: usize = text[1..]
                    .parse()
                    .map_err(|_| eyre::eyre!("invalid argument reference '{}'", text))?;
                if self.args.is_null(arg_no)? {
                    Some(QueryValue::Null)
                } else {
                    match self.args.type_for(arg_no)? {
                        DataType::Int => Some(QueryValue::Int(self.args.long_for(arg_no)?)),
                        DataType::String => {
                            Some(QueryValue::String(self.args.string_for(arg_no)?))
                        }
                        DataType::Binary => {
                            Some(QueryValue::Binary(self.args.binary_for(arg_no)?))
                        }
                        DataType::Bool => Some(QueryValue::Bool(self.args.bool_for(arg_no)?)),
                        DataType::Float => Some(QueryValue::Float(self.args.float_for(arg_no)?)),
                        DataType::Double => {
                            Some(QueryValue::Double(self.args.double_for(arg_no)?))
                        }
                        // A slot bound through the other accessor is
                        // accepted either way.
                        DataType::Timestamp => match self.args.timestamp_for(arg_no) {
                            Ok(ts) => Some(QueryValue::Timestamp(ts)),
                            Err(_) => Some(QueryValue::ObjectId(self.args.objectid_for(arg_no)?)),
                        },
                        DataType::ObjectId => match self.args.objectid_for(arg_no) {
                            Ok(oid) => Some(QueryValue::ObjectId(oid)),
                            Err(_) => {
                                Some(QueryValue::Timestamp(self.args.timestamp_for(arg_no)?))
                            }
                        },
                        DataType::Decimal => {
                            Some(QueryValue::Decimal(self.args.decimal_for(arg_no)?))
                        }
                        DataType::Uuid => Some(QueryValue::Uuid(self.args.uuid_for(arg_no)?)),
                        _ => None,
                    }
                }
            }
        };

        match value {
            Some(value) => Ok(Subexpr::Constant(value)),
            None => bail!(
                "Unsupported comparison between property of type '{}' and constant value '{}'",
                type_name(hint),
                text
            ),
        }
    }

    fn visit_ordering(&self, node: &DescriptorOrderingNode) -> Result<DescriptorOrdering> {
        let mut ordering = DescriptorOrdering::new();
        for cur in &node.orderings {
            match cur {
                DescriptorNode::Limit(limit) => {
                    ordering.append_limit(LimitDescriptor(*limit));
                }
                DescriptorNode::Sort { columns, ascending } => {
                    let property_columns = self.resolve_descriptor_paths(columns, false)?;
                    ordering.append_sort(
                        SortDescriptor {
                            columns: property_columns,
                            ascending: ascending.clone(),
                        },
                        MergeMode::Prepend,
                    );
                }
                DescriptorNode::Distinct { columns } => {
                    let property_columns = self.resolve_descriptor_paths(columns, true)?;
                    ordering.append_distinct(DistinctDescriptor {
                        columns: property_columns,
                    });
                }
            }
        }
        Ok(ordering)
    }

    fn resolve_descriptor_paths(
        &self,
        columns: &[Vec<String>],
        is_distinct: bool,
    ) -> Result<Vec<Vec<crate::schema::ColKey>>> {
        let clause = if is_distinct { "distinct" } else { "sort" };
        let mut property_columns = Vec::with_capacity(columns.len());

        for col_names in columns {
            let mut keys = Vec::with_capacity(col_names.len());
            let mut cur_table = self.base_table;
            for (idx, name) in col_names.iter().enumerate() {
                let table = self.group.table(cur_table);
                let Some(col_key) = table.column_key(name) else {
                    bail!(
                        "No property '{}' found on object type '{}' specified in '{}' clause",
                        name,
                        table.name(),
                        clause
                    );
                };
                keys.push(col_key);
                if idx < col_names.len() - 1 {
                    let Some(target) = table.column_type(col_key).link_target() else {
                        bail!(
                            "No property '{}' found on object type '{}' specified in '{}' clause",
                            col_names[idx + 1],
                            table.name(),
                            clause
                        );
                    };
                    cur_table = target;
                }
            }
            property_columns.push(keys);
        }
        Ok(property_columns)
    }
}

fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

impl Group {
    /// Parses and compiles a predicate against `table`, binding `$N`
    /// references through `args`.
    pub fn query(&self, table: TableKey, text: &str, args: &dyn Arguments) -> Result<Query> {
        QueryCompiler::new(self, table, args).compile(text)
    }
}
