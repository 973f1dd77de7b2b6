//! Descriptive statistics of a sequence collection.
use std::collections::HashSet;

use super::data::Sequence;
use super::{ItemId, UserId};

/// Distinct users, distinct items and ratings, gathered together.
#[derive(Debug, Default)]
struct Census {
    users: HashSet<UserId>,
    items: HashSet<ItemId>,
    ratings: usize,
}

/// Read-only statistics over a collection of sequences.
#[derive(Clone, Copy, Debug)]
pub struct Profiler<'a> {
    sequences: &'a [Sequence],
}

impl<'a> Profiler<'a> {
    /// Profile `sequences`.
    pub fn new(sequences: &'a [Sequence]) -> Self {
        Profiler { sequences }
    }

    fn census(&self) -> Census {
        self.sequences
            .iter()
            .fold(Census::default(), |mut census, sequence| {
                census.users.insert(sequence.user_id());
                census.items.extend(sequence.item_ids());
                census.ratings += sequence.len();
                census
            })
    }

    /// Number of distinct users owning a sequence.
    pub fn users(&self) -> usize {
        self.census().users.len()
    }

    /// Number of distinct items rated in any sequence.
    pub fn items(&self) -> usize {
        self.census().items.len()
    }

    /// Total number of ratings.
    pub fn ratings(&self) -> usize {
        self.sequences.iter().map(|x| x.len()).sum()
    }

    /// Number of sequences.
    pub fn sequences(&self) -> usize {
        self.sequences.len()
    }

    /// Fraction of the user-item matrix left empty, or 0 when the matrix has no cells.
    pub fn sparsity(&self) -> f64 {
        let census = self.census();
        let cells = census.users.len() * census.items.len();

        if cells == 0 {
            return 0.0;
        }

        1.0 - census.ratings as f64 / cells as f64
    }

    /// Mean number of ratings per sequence, or 0 when there are no sequences.
    pub fn sequence_length(&self) -> f64 {
        if self.sequences.is_empty() {
            return 0.0;
        }

        self.ratings() as f64 / self.sequences() as f64
    }
}
