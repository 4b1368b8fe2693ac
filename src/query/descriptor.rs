//! # Descriptor Ordering
//!
//! Compiled SORT / DISTINCT / LIMIT clauses. Each sort or distinct clause
//! names one or more column paths; a path is the ordered list of column
//! keys to follow (links between segments, terminal column last).

use crate::schema::ColKey;

/// Which end of the existing sort order a newly appended sort merges
/// into. Query-string sorts prepend, so the last SORT clause written wins
/// the primary position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Prepend,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortDescriptor {
    pub columns: Vec<Vec<ColKey>>,
    pub ascending: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistinctDescriptor {
    pub columns: Vec<Vec<ColKey>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDescriptor(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Sort(SortDescriptor, MergeMode),
    Distinct(DistinctDescriptor),
    Limit(LimitDescriptor),
}

/// The ordered sequence of descriptors applied to a query's results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescriptorOrdering {
    descriptors: Vec<Descriptor>,
}

impl DescriptorOrdering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_sort(&mut self, sort: SortDescriptor, merge_mode: MergeMode) {
        self.descriptors.push(Descriptor::Sort(sort, merge_mode));
    }

    pub fn append_distinct(&mut self, distinct: DistinctDescriptor) {
        self.descriptors.push(Descriptor::Distinct(distinct));
    }

    pub fn append_limit(&mut self, limit: LimitDescriptor) {
        self.descriptors.push(Descriptor::Limit(limit));
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_keep_their_order() {
        let mut ordering = DescriptorOrdering::new();
        ordering.append_sort(
            SortDescriptor {
                columns: vec![vec![ColKey(0)]],
                ascending: vec![true],
            },
            MergeMode::Prepend,
        );
        ordering.append_distinct(DistinctDescriptor {
            columns: vec![vec![ColKey(1)]],
        });
        ordering.append_limit(LimitDescriptor(10));

        assert_eq!(ordering.descriptors().len(), 3);
        assert!(matches!(ordering.descriptors()[0], Descriptor::Sort(_, MergeMode::Prepend)));
        assert!(matches!(ordering.descriptors()[2], Descriptor::Limit(LimitDescriptor(10))));
    }
}
