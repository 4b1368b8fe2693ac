//! # Link Chain Resolution
//!
//! A `LinkChain` resolves a dotted path from a base table into an ordered
//! list of link traversals plus a terminal column. Forward segments name
//! link columns on the current table; `@links.Table.column` segments walk
//! backwards through the named origin column.
//!
//! ## Terminal Columns
//!
//! [`LinkChain::column`] produces the `Subexpr` for the final path
//! segment: a scalar or list column of the appropriate element type, a
//! link column (which also extends the chain, so `.@count` and further
//! segments see the traversal), or a backlink terminal.
//!
//! ## Error Messages
//!
//! Unknown columns report the owning table; backlink failures report the
//! printable (class_-prefix-stripped) names of both tables involved, since
//! those names came from user input.

use eyre::{bail, Result};
use smallvec::SmallVec;

use crate::schema::{printable_table_name, ColumnType, Group, TableKey};

use super::ast::ComparisonType;
use super::expr::{ColumnExpr, ColumnKind, LinkStep, Subexpr};

/// A partially-resolved path: the traversal so far and the table it
/// landed on.
#[derive(Debug, Clone)]
pub struct LinkChain<'a> {
    group: &'a Group,
    base_table: TableKey,
    current_table: TableKey,
    steps: SmallVec<[LinkStep; 2]>,
    comparison: ComparisonType,
}

impl<'a> LinkChain<'a> {
    pub fn new(group: &'a Group, base_table: TableKey, comparison: ComparisonType) -> Self {
        Self {
            group,
            base_table,
            current_table: base_table,
            steps: SmallVec::new(),
            comparison,
        }
    }

    pub fn base_table(&self) -> TableKey {
        self.base_table
    }

    pub fn current_table(&self) -> TableKey {
        self.current_table
    }

    /// Follows a forward link segment: the named column must be a link or
    /// link-list; its target becomes the current table.
    pub fn link(&mut self, name: &str) -> Result<()> {
        let table = self.group.table(self.current_table);
        let Some(col) = table.column_key(name) else {
            bail!("'{}' has no property: '{}'", table.name(), name);
        };
        let Some(target) = table.column_type(col).link_target() else {
            bail!(
                "property '{}' in '{}' is not a link",
                name,
                table.name()
            );
        };
        self.steps.push(LinkStep::Forward { col });
        self.current_table = target;
        Ok(())
    }

    /// Follows a `@links.Table.column` segment backwards: looks up the
    /// origin table in the group and the origin column on it.
    pub fn backlink(&mut self, path_elem: &str) -> Result<()> {
        let payload = path_elem.strip_prefix("@links.").unwrap_or(path_elem);
        let (table_name, column_name) = payload.split_once('.').unwrap_or((payload, ""));

        let origin_table = self.group.table_key(table_name);
        let origin_col =
            origin_table.and_then(|t| self.group.table(t).column_key(column_name));

        let (Some(origin_table), Some(origin_col)) = (origin_table, origin_col) else {
            bail!(
                "No property '{}' found in type '{}' which links to type '{}'",
                column_name,
                printable_table_name(table_name),
                printable_table_name(self.group.table(self.current_table).name())
            );
        };

        self.steps.push(LinkStep::Backlink {
            origin_table,
            origin_col,
        });
        self.current_table = origin_table;
        Ok(())
    }

    /// Resolves a path segment, forward or backward as spelled.
    pub fn add(&mut self, path_elem: &str) -> Result<()> {
        if path_elem.starts_with("@links.") {
            self.backlink(path_elem)
        } else {
            self.link(path_elem)
        }
    }

    /// Produces the subexpression for the terminal path segment.
    ///
    /// Link terminals extend the chain, so post-ops and sub-columns see
    /// the traversal; backlink terminals produce a column-less backlink
    /// operand.
    pub fn column(&mut self, name: &str) -> Result<Subexpr> {
        if name.starts_with("@links.") {
            self.backlink(name)?;
            return Ok(Subexpr::Column(ColumnExpr {
                col: None,
                kind: ColumnKind::Backlink,
                links: self.steps.clone(),
                comparison: self.comparison,
            }));
        }

        let table = self.group.table(self.current_table);
        let Some(col) = table.column_key(name) else {
            bail!("'{}' has no property: '{}'", table.name(), name);
        };

        let kind = match table.column_type(col) {
            ColumnType::List(dt) => ColumnKind::List(dt),
            ColumnType::Scalar(dt) => ColumnKind::Scalar(dt),
            ColumnType::Link { target } => {
                self.steps.push(LinkStep::Forward { col });
                self.current_table = target;
                ColumnKind::Link
            }
            ColumnType::LinkList { target } => {
                self.steps.push(LinkStep::Forward { col });
                self.current_table = target;
                ColumnKind::LinkList
            }
        };

        Ok(Subexpr::Column(ColumnExpr {
            col: Some(col),
            kind,
            links: self.steps.clone(),
            comparison: self.comparison,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColKey;
    use crate::types::DataType;

    fn sample_group() -> (Group, TableKey, TableKey) {
        let mut group = Group::new();
        let person = group.add_table("class_Person");
        let account = group.add_table("class_Account");

        group
            .table_mut(person)
            .add_column("age", ColumnType::Scalar(DataType::Int));
        group
            .table_mut(person)
            .add_column("account", ColumnType::Link { target: account });
        group
            .table_mut(account)
            .add_column("balance", ColumnType::Scalar(DataType::Double));
        group
            .table_mut(account)
            .add_column("owner", ColumnType::Link { target: person });

        (group, person, account)
    }

    #[test]
    fn resolves_a_plain_column() {
        let (group, person, _) = sample_group();
        let mut chain = LinkChain::new(&group, person, ComparisonType::Any);

        let subexpr = chain.column("age").unwrap();
        match subexpr {
            Subexpr::Column(col) => {
                assert_eq!(col.col, Some(ColKey(0)));
                assert_eq!(col.kind, ColumnKind::Scalar(DataType::Int));
                assert!(!col.links_exist());
            }
            other => panic!("expected a column, got {:?}", other),
        }
    }

    #[test]
    fn follows_forward_links() {
        let (group, person, account) = sample_group();
        let mut chain = LinkChain::new(&group, person, ComparisonType::Any);

        chain.link("account").unwrap();
        assert_eq!(chain.current_table(), account);

        let subexpr = chain.column("balance").unwrap();
        match subexpr {
            Subexpr::Column(col) => {
                assert_eq!(col.kind, ColumnKind::Scalar(DataType::Double));
                assert!(col.links_exist());
            }
            other => panic!("expected a column, got {:?}", other),
        }
    }

    #[test]
    fn resolves_backlinks() {
        let (group, person, account) = sample_group();
        let mut chain = LinkChain::new(&group, person, ComparisonType::Any);

        chain.backlink("@links.class_Account.owner").unwrap();
        assert_eq!(chain.current_table(), account);
    }

    #[test]
    fn unknown_backlink_table_mentions_printable_names() {
        let (group, person, _) = sample_group();
        let mut chain = LinkChain::new(&group, person, ComparisonType::Any);

        let err = chain.backlink("@links.class_Missing.owner").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No property 'owner'"));
        assert!(msg.contains("'Missing'"), "table name is printable: {}", msg);
        assert!(msg.contains("'Person'"), "current table is printable: {}", msg);
    }

    #[test]
    fn unknown_column_fails_with_no_property() {
        let (group, person, _) = sample_group();
        let mut chain = LinkChain::new(&group, person, ComparisonType::Any);

        let err = chain.column("salary").unwrap_err();
        assert!(err.to_string().contains("has no property: 'salary'"));
    }

    #[test]
    fn non_link_segment_in_path_fails() {
        let (group, person, _) = sample_group();
        let mut chain = LinkChain::new(&group, person, ComparisonType::Any);

        assert!(chain.link("age").is_err());
    }

    #[test]
    fn link_terminal_extends_the_chain() {
        let (group, person, account) = sample_group();
        let mut chain = LinkChain::new(&group, person, ComparisonType::Any);

        let subexpr = chain.column("account").unwrap();
        match subexpr {
            Subexpr::Column(col) => {
                assert_eq!(col.kind, ColumnKind::Link);
                assert!(col.links_exist());
            }
            other => panic!("expected a column, got {:?}", other),
        }
        assert_eq!(chain.current_table(), account);
    }
}
