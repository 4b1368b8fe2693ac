//! # Predicate Parser - Recursive Descent
//!
//! This module parses the predicate language into the owned AST of
//! [`super::ast`]. Statement structure is recursive descent; there is no
//! operator precedence to manage beyond OR < AND < NOT, so each level is a
//! dedicated function.
//!
//! ## Grammar
//!
//! ```text
//! query      := or_expr ordering* EOF
//! or_expr    := and_expr ( OR and_expr )*
//! and_expr   := atom ( AND atom )*
//! atom       := NOT atom
//!             | '(' or_expr ')'
//!             | TRUEPREDICATE | FALSEPREDICATE
//!             | value op [c]? value
//! value      := constant | property
//! property   := path_elem ( '.' path_elem )* post?
//! path_elem  := IDENT | '@links' '.' IDENT '.' IDENT
//! post       := '.' ( @count | @size | aggr ( '.' IDENT )? )
//! ordering   := SORT '(' sort_param ( ',' sort_param )* ')'
//!             | DISTINCT '(' path ( ',' path )* ')'
//!             | LIMIT '(' NUMBER ')'
//! ```
//!
//! ## Error Reporting
//!
//! The compiler entry point wraps any failure here as
//! `Invalid predicate: '<input>': <reason>`, matching the storage engine's
//! long-standing message shape.

use eyre::{bail, Result};

use super::ast::{
    AggrOp, AndNode, AtomPredNode, ComparisonType, ConstantKind, ConstantNode, DescriptorNode,
    DescriptorOrderingNode, EqualityNode, EqualityOp, LinkAggrNode, ListAggrNode, OrNode,
    ParsedQuery, PathNode, PostOp, PropNode, PropertyNode, RelationalNode, RelationalOp, StringOp,
    StringOpsNode, ValueNode,
};
use super::lexer::{Keyword, Lexer, Token};
use crate::parsing::parse_int_auto;

/// Parses a textual predicate (with optional ordering suffixes) into the
/// AST. Fails on the first syntax error.
pub fn parse(text: &str) -> Result<ParsedQuery> {
    let tokens = Lexer::new(text).tokenize();
    Parser { tokens, pos: 0 }.parse_query()
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Token<'a> {
        self.tokens.get(self.pos).copied().unwrap_or(Token::Eof)
    }

    fn peek_at(&self, n: usize) -> Token<'a> {
        self.tokens.get(self.pos + n).copied().unwrap_or(Token::Eof)
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token<'a>, what: &str) -> Result<()> {
        let token = self.advance();
        if token != expected {
            bail!("expected {}, found {:?}", what, token);
        }
        Ok(())
    }

    fn parse_query(&mut self) -> Result<ParsedQuery> {
        let predicate = self.parse_or()?;

        let mut ordering = DescriptorOrderingNode::default();
        loop {
            match self.peek() {
                Token::Keyword(Keyword::Sort) => ordering.orderings.push(self.parse_sort()?),
                Token::Keyword(Keyword::Distinct) => {
                    ordering.orderings.push(self.parse_distinct()?)
                }
                Token::Keyword(Keyword::Limit) => ordering.orderings.push(self.parse_limit()?),
                _ => break,
            }
        }

        match self.peek() {
            Token::Eof => Ok(ParsedQuery {
                predicate,
                ordering,
            }),
            Token::Error(text) => bail!("unrecognized input '{}'", text),
            other => bail!("unexpected trailing input {:?}", other),
        }
    }

    fn parse_or(&mut self) -> Result<OrNode> {
        let mut and_preds = vec![self.parse_and()?];
        while self.peek() == Token::Keyword(Keyword::Or) {
            self.advance();
            and_preds.push(self.parse_and()?);
        }
        Ok(OrNode { and_preds })
    }

    fn parse_and(&mut self) -> Result<AndNode> {
        let mut atom_preds = vec![self.parse_atom()?];
        while self.peek() == Token::Keyword(Keyword::And) {
            self.advance();
            atom_preds.push(self.parse_atom()?);
        }
        Ok(AndNode { atom_preds })
    }

    fn parse_atom(&mut self) -> Result<AtomPredNode> {
        match self.peek() {
            Token::Keyword(Keyword::Not) => {
                self.advance();
                Ok(AtomPredNode::Not(Box::new(self.parse_atom()?)))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(AtomPredNode::Parens(Box::new(inner)))
            }
            Token::Keyword(Keyword::TruePredicate) => {
                self.advance();
                Ok(AtomPredNode::TrueOrFalse(true))
            }
            Token::Keyword(Keyword::FalsePredicate) => {
                self.advance();
                Ok(AtomPredNode::TrueOrFalse(false))
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> Result<AtomPredNode> {
        let left = self.parse_value()?;

        let op_token = self.advance();
        let case_insensitive = if self.peek() == Token::CaseFlag {
            self.advance();
            true
        } else {
            false
        };

        match op_token {
            Token::Equal => {
                let right = self.parse_value()?;
                Ok(AtomPredNode::Equality(EqualityNode {
                    left,
                    right,
                    op: EqualityOp::Equal,
                    case_sensitive: !case_insensitive,
                }))
            }
            Token::NotEqual => {
                let right = self.parse_value()?;
                Ok(AtomPredNode::Equality(EqualityNode {
                    left,
                    right,
                    op: EqualityOp::NotEqual,
                    case_sensitive: !case_insensitive,
                }))
            }
            Token::Greater | Token::Less | Token::GreaterEqual | Token::LessEqual => {
                if case_insensitive {
                    bail!("case insensitivity is not supported for relational operators");
                }
                let op = match op_token {
                    Token::Greater => RelationalOp::Greater,
                    Token::Less => RelationalOp::Less,
                    Token::GreaterEqual => RelationalOp::GreaterEqual,
                    _ => RelationalOp::LessEqual,
                };
                let right = self.parse_value()?;
                Ok(AtomPredNode::Relational(RelationalNode {
                    left,
                    right,
                    op,
                }))
            }
            Token::Keyword(kw)
                if matches!(
                    kw,
                    Keyword::BeginsWith | Keyword::EndsWith | Keyword::Contains | Keyword::Like
                ) =>
            {
                let op = match kw {
                    Keyword::BeginsWith => StringOp::BeginsWith,
                    Keyword::EndsWith => StringOp::EndsWith,
                    Keyword::Contains => StringOp::Contains,
                    _ => StringOp::Like,
                };
                let right = self.parse_value()?;
                Ok(AtomPredNode::StringOps(StringOpsNode {
                    left,
                    right,
                    op,
                    case_sensitive: !case_insensitive,
                }))
            }
            other => bail!("expected a comparison operator, found {:?}", other),
        }
    }

    fn parse_value(&mut self) -> Result<ValueNode> {
        let constant = |kind, text: &str| {
            Ok(ValueNode::Constant(ConstantNode {
                kind,
                text: text.to_string(),
            }))
        };

        match self.peek() {
            Token::Number(text) => {
                self.advance();
                constant(ConstantKind::Number, text)
            }
            Token::Float(text) => {
                self.advance();
                constant(ConstantKind::Float, text)
            }
            Token::Infinity(text) => {
                self.advance();
                constant(ConstantKind::Infinity, text)
            }
            Token::Nan(text) => {
                self.advance();
                constant(ConstantKind::Nan, text)
            }
            Token::String(text) => {
                self.advance();
                constant(ConstantKind::String, text)
            }
            Token::Base64(text) => {
                self.advance();
                constant(ConstantKind::Base64, text)
            }
            Token::Timestamp(text) => {
                self.advance();
                constant(ConstantKind::Timestamp, text)
            }
            Token::UuidLiteral(text) => {
                self.advance();
                constant(ConstantKind::Uuid, text)
            }
            Token::OidLiteral(text) => {
                self.advance();
                constant(ConstantKind::Oid, text)
            }
            Token::Arg(text) => {
                self.advance();
                constant(ConstantKind::Arg, text)
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                constant(ConstantKind::True, "true")
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                constant(ConstantKind::False, "false")
            }
            Token::Keyword(Keyword::Null) => {
                self.advance();
                constant(ConstantKind::Null, "NULL")
            }
            Token::Ident(_) | Token::AtLinks => {
                Ok(ValueNode::Property(self.parse_property()?))
            }
            other => bail!("expected a value, found {:?}", other),
        }
    }

    fn parse_path_element(&mut self) -> Result<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name.to_string()),
            Token::AtLinks => {
                self.expect(Token::Dot, "'.' after @links")?;
                let table = match self.advance() {
                    Token::Ident(name) => name,
                    other => bail!("expected a table name after '@links.', found {:?}", other),
                };
                self.expect(Token::Dot, "'.' after the backlink table")?;
                let column = match self.advance() {
                    Token::Ident(name) => name,
                    other => bail!("expected a column name in backlink, found {:?}", other),
                };
                Ok(format!("@links.{}.{}", table, column))
            }
            other => bail!("expected a property name, found {:?}", other),
        }
    }

    fn parse_property(&mut self) -> Result<PropertyNode> {
        let mut elements = vec![self.parse_path_element()?];

        loop {
            if self.peek() != Token::Dot {
                break;
            }
            match self.peek_at(1) {
                Token::AtCount | Token::AtSize => {
                    self.advance();
                    let post_op = if self.advance() == Token::AtCount {
                        PostOp::Count
                    } else {
                        PostOp::Size
                    };
                    let identifier = elements.pop().expect("path has at least one element");
                    return Ok(PropertyNode::Prop(PropNode {
                        path: PathNode { elements },
                        identifier,
                        comp_type: ComparisonType::Any,
                        post_op: Some(post_op),
                    }));
                }
                Token::AtMax | Token::AtMin | Token::AtSum | Token::AtAvg => {
                    self.advance();
                    let aggr_op = match self.advance() {
                        Token::AtMax => AggrOp::Max,
                        Token::AtMin => AggrOp::Min,
                        Token::AtSum => AggrOp::Sum,
                        _ => AggrOp::Avg,
                    };
                    let last = elements.pop().expect("path has at least one element");
                    if self.peek() == Token::Dot && matches!(self.peek_at(1), Token::Ident(_)) {
                        self.advance();
                        let prop = match self.advance() {
                            Token::Ident(name) => name.to_string(),
                            _ => unreachable!("peeked an identifier"),
                        };
                        return Ok(PropertyNode::LinkAggr(LinkAggrNode {
                            path: PathNode { elements },
                            link: last,
                            aggr_op,
                            prop,
                        }));
                    }
                    return Ok(PropertyNode::ListAggr(ListAggrNode {
                        path: PathNode { elements },
                        identifier: last,
                        aggr_op,
                    }));
                }
                Token::Ident(_) | Token::AtLinks => {
                    self.advance();
                    elements.push(self.parse_path_element()?);
                }
                other => bail!("expected a property name after '.', found {:?}", other),
            }
        }

        let identifier = elements.pop().expect("path has at least one element");
        Ok(PropertyNode::Prop(PropNode {
            path: PathNode { elements },
            identifier,
            comp_type: ComparisonType::Any,
            post_op: None,
        }))
    }

    fn parse_dotted_path(&mut self) -> Result<Vec<String>> {
        let mut path = vec![match self.advance() {
            Token::Ident(name) => name.to_string(),
            other => bail!("expected a property name, found {:?}", other),
        }];
        while self.peek() == Token::Dot {
            self.advance();
            match self.advance() {
                Token::Ident(name) => path.push(name.to_string()),
                other => bail!("expected a property name after '.', found {:?}", other),
            }
        }
        Ok(path)
    }

    fn parse_sort(&mut self) -> Result<DescriptorNode> {
        self.advance(); // SORT
        self.expect(Token::LParen, "'(' after SORT")?;

        let mut columns = Vec::new();
        let mut ascending = Vec::new();
        loop {
            columns.push(self.parse_dotted_path()?);
            let direction = match self.peek() {
                Token::Keyword(Keyword::Asc) | Token::Keyword(Keyword::Ascending) => {
                    self.advance();
                    true
                }
                Token::Keyword(Keyword::Desc) | Token::Keyword(Keyword::Descending) => {
                    self.advance();
                    false
                }
                _ => true,
            };
            ascending.push(direction);

            if self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen, "')' after SORT clause")?;
        Ok(DescriptorNode::Sort { columns, ascending })
    }

    fn parse_distinct(&mut self) -> Result<DescriptorNode> {
        self.advance(); // DISTINCT
        self.expect(Token::LParen, "'(' after DISTINCT")?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_dotted_path()?);
            if self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen, "')' after DISTINCT clause")?;
        Ok(DescriptorNode::Distinct { columns })
    }

    fn parse_limit(&mut self) -> Result<DescriptorNode> {
        self.advance(); // LIMIT
        self.expect(Token::LParen, "'(' after LIMIT")?;
        let limit = match self.advance() {
            Token::Number(text) => {
                let value = parse_int_auto(text)?;
                if value < 0 {
                    bail!("LIMIT requires a non-negative count, got {}", value);
                }
                value as usize
            }
            other => bail!("expected a count in LIMIT, found {:?}", other),
        };
        self.expect(Token::RParen, "')' after LIMIT clause")?;
        Ok(DescriptorNode::Limit(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_equality() {
        let parsed = parse("age == 30").unwrap();

        assert_eq!(parsed.predicate.and_preds.len(), 1);
        let atom = &parsed.predicate.and_preds[0].atom_preds[0];
        match atom {
            AtomPredNode::Equality(eq) => {
                assert_eq!(eq.op, EqualityOp::Equal);
                assert!(eq.case_sensitive);
                assert!(matches!(eq.left, ValueNode::Property(_)));
                assert!(matches!(
                    &eq.right,
                    ValueNode::Constant(c) if c.kind == ConstantKind::Number && c.text == "30"
                ));
            }
            other => panic!("expected equality, got {:?}", other),
        }
    }

    #[test]
    fn parses_logical_structure() {
        let parsed = parse("a == 1 && b == 2 || c == 3").unwrap();

        assert_eq!(parsed.predicate.and_preds.len(), 2);
        assert_eq!(parsed.predicate.and_preds[0].atom_preds.len(), 2);
        assert_eq!(parsed.predicate.and_preds[1].atom_preds.len(), 1);
    }

    #[test]
    fn parses_not_and_parens() {
        let parsed = parse("!(a == 1 || b == 2)").unwrap();

        let atom = &parsed.predicate.and_preds[0].atom_preds[0];
        match atom {
            AtomPredNode::Not(inner) => assert!(matches!(**inner, AtomPredNode::Parens(_))),
            other => panic!("expected NOT, got {:?}", other),
        }
    }

    #[test]
    fn parses_case_insensitive_contains() {
        let parsed = parse("name CONTAINS[c] \"bo\"").unwrap();

        match &parsed.predicate.and_preds[0].atom_preds[0] {
            AtomPredNode::StringOps(ops) => {
                assert_eq!(ops.op, StringOp::Contains);
                assert!(!ops.case_sensitive);
            }
            other => panic!("expected string op, got {:?}", other),
        }
    }

    #[test]
    fn rejects_case_flag_on_relational() {
        assert!(parse("age >[c] 5").is_err());
    }

    #[test]
    fn parses_dotted_and_backlink_paths() {
        let parsed = parse("@links.Account.owner.balance > 100").unwrap();

        match &parsed.predicate.and_preds[0].atom_preds[0] {
            AtomPredNode::Relational(rel) => match &rel.left {
                ValueNode::Property(PropertyNode::Prop(prop)) => {
                    assert_eq!(prop.path.elements, vec!["@links.Account.owner"]);
                    assert_eq!(prop.identifier, "balance");
                }
                other => panic!("expected property, got {:?}", other),
            },
            other => panic!("expected relational, got {:?}", other),
        }
    }

    #[test]
    fn parses_post_ops() {
        let parsed = parse("items.@count > 3").unwrap();

        match &parsed.predicate.and_preds[0].atom_preds[0] {
            AtomPredNode::Relational(rel) => match &rel.left {
                ValueNode::Property(PropertyNode::Prop(prop)) => {
                    assert_eq!(prop.identifier, "items");
                    assert_eq!(prop.post_op, Some(PostOp::Count));
                }
                other => panic!("expected property, got {:?}", other),
            },
            other => panic!("expected relational, got {:?}", other),
        }
    }

    #[test]
    fn parses_list_and_link_aggregates() {
        let parsed = parse("scores.@max > 10").unwrap();
        match &parsed.predicate.and_preds[0].atom_preds[0] {
            AtomPredNode::Relational(rel) => {
                assert!(matches!(
                    &rel.left,
                    ValueNode::Property(PropertyNode::ListAggr(agg))
                        if agg.identifier == "scores" && agg.aggr_op == AggrOp::Max
                ));
            }
            other => panic!("expected relational, got {:?}", other),
        }

        let parsed = parse("items.@sum.price > 100").unwrap();
        match &parsed.predicate.and_preds[0].atom_preds[0] {
            AtomPredNode::Relational(rel) => {
                assert!(matches!(
                    &rel.left,
                    ValueNode::Property(PropertyNode::LinkAggr(agg))
                        if agg.link == "items" && agg.prop == "price" && agg.aggr_op == AggrOp::Sum
                ));
            }
            other => panic!("expected relational, got {:?}", other),
        }
    }

    #[test]
    fn parses_true_and_false_predicates() {
        let parsed = parse("TRUEPREDICATE").unwrap();
        assert!(matches!(
            parsed.predicate.and_preds[0].atom_preds[0],
            AtomPredNode::TrueOrFalse(true)
        ));

        let parsed = parse("FALSEPREDICATE").unwrap();
        assert!(matches!(
            parsed.predicate.and_preds[0].atom_preds[0],
            AtomPredNode::TrueOrFalse(false)
        ));
    }

    #[test]
    fn parses_ordering_suffixes() {
        let parsed = parse("age > 18 SORT(name ASC, age DESC) DISTINCT(city) LIMIT(10)").unwrap();

        assert_eq!(parsed.ordering.orderings.len(), 3);
        match &parsed.ordering.orderings[0] {
            DescriptorNode::Sort { columns, ascending } => {
                assert_eq!(columns, &vec![vec!["name".to_string()], vec!["age".to_string()]]);
                assert_eq!(ascending, &vec![true, false]);
            }
            other => panic!("expected sort, got {:?}", other),
        }
        match &parsed.ordering.orderings[1] {
            DescriptorNode::Distinct { columns } => {
                assert_eq!(columns, &vec![vec!["city".to_string()]]);
            }
            other => panic!("expected distinct, got {:?}", other),
        }
        assert_eq!(parsed.ordering.orderings[2], DescriptorNode::Limit(10));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("age == 30 xyz").is_err());
        assert!(parse("age ==").is_err());
        assert!(parse("== 30").is_err());
    }
}
