//! Item-item similarity computed from training ratings.
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use itertools::{EitherOrBoth, Itertools};

use super::data::Sequence;
use super::{ItemId, Timestamp, UserId};

/// Trait describing item-item similarity measures.
pub trait Similarity {
    /// Similarity of two items in `[-1, 1]`; an item is fully similar to itself.
    fn similarity(&self, item_a: ItemId, item_b: ItemId) -> f64;

    /// One minus the similarity.
    fn dissimilarity(&self, item_a: ItemId, item_b: ItemId) -> f64 {
        1.0 - self.similarity(item_a, item_b)
    }
}

/// Cosine similarity between the user-indexed rating vectors of two items.
///
/// Pair similarities are computed on first use and cached for the lifetime
/// of the engine.
#[derive(Debug)]
pub struct CosineSimilarity {
    vectors: HashMap<ItemId, Vec<(UserId, f64)>>,
    norms: HashMap<ItemId, f64>,
    cache: RefCell<HashMap<(ItemId, ItemId), f64>>,
}

impl CosineSimilarity {
    /// Build the item vectors from the training sequences.
    ///
    /// When a user rated an item more than once, the latest rating counts.
    pub fn new(training: &[Sequence], items: &[ItemId]) -> Self {
        let mut latest: HashMap<ItemId, BTreeMap<UserId, (Timestamp, f32)>> =
            items.iter().map(|&item_id| (item_id, BTreeMap::new())).collect();

        for rating in training.iter().flat_map(|x| x.ratings()) {
            let entry = latest
                .entry(rating.item_id())
                .or_insert_with(BTreeMap::new)
                .entry(rating.user_id())
                .or_insert((rating.timestamp(), rating.value()));

            if rating.timestamp() >= entry.0 {
                *entry = (rating.timestamp(), rating.value());
            }
        }

        let vectors: HashMap<ItemId, Vec<(UserId, f64)>> = latest
            .into_iter()
            .map(|(item_id, users)| {
                let vector = users
                    .into_iter()
                    .map(|(user_id, (_, value))| (user_id, f64::from(value)))
                    .collect();
                (item_id, vector)
            })
            .collect();

        let norms = vectors
            .iter()
            .map(|(&item_id, vector)| {
                let norm = vector.iter().map(|&(_, value)| value * value).sum::<f64>().sqrt();
                (item_id, norm)
            })
            .collect();

        CosineSimilarity {
            vectors,
            norms,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn norm(&self, item_id: ItemId) -> f64 {
        self.norms.get(&item_id).cloned().unwrap_or(0.0)
    }

    fn dot(&self, item_a: ItemId, item_b: ItemId) -> f64 {
        match (self.vectors.get(&item_a), self.vectors.get(&item_b)) {
            (Some(a), Some(b)) => a
                .iter()
                .merge_join_by(b.iter(), |x, y| x.0.cmp(&y.0))
                .filter_map(|pair| match pair {
                    EitherOrBoth::Both(x, y) => Some(x.1 * y.1),
                    _ => None,
                })
                .sum(),
            _ => 0.0,
        }
    }

    fn compute(&self, item_a: ItemId, item_b: ItemId) -> f64 {
        let denominator = self.norm(item_a) * self.norm(item_b);

        if denominator == 0.0 {
            return 0.0;
        }

        (self.dot(item_a, item_b) / denominator).max(-1.0).min(1.0)
    }
}

impl Similarity for CosineSimilarity {
    fn similarity(&self, item_a: ItemId, item_b: ItemId) -> f64 {
        if item_a == item_b {
            return 1.0;
        }

        let key = if item_a < item_b {
            (item_a, item_b)
        } else {
            (item_b, item_a)
        };

        if let Some(&value) = self.cache.borrow().get(&key) {
            return value;
        }

        let value = self.compute(key.0, key.1);
        self.cache.borrow_mut().insert(key, value);

        value
    }
}
