//! Unigram and bigram language models over item sequences.
use std::collections::{HashMap, HashSet};

use rand::distributions::{Distribution, WeightedIndex};

use super::context_rng;
use crate::data::{ItemCounts, Rating, Sequence};
use crate::{ItemId, PredictionError, Recommendation, Recommender};

const NO_ITEMS: &[ItemId] = &[];

/// Unigram baseline: items sampled, with replacement, in proportion to
/// their training frequency.
#[derive(Clone, Debug)]
pub struct UnigramRecommender {
    counts: ItemCounts,
    items: Vec<ItemId>,
    distribution: Option<WeightedIndex<usize>>,
    seed: u64,
}

impl UnigramRecommender {
    /// Fit the unigram frequencies on the training sequences.
    pub fn new(training: &[Sequence], items: &[ItemId], seed: u64) -> Self {
        let counts = ItemCounts::new(training);

        let mut items = items.to_owned();
        items.sort();
        items.dedup();

        let distribution = WeightedIndex::new(items.iter().map(|&x| counts.count(x))).ok();

        UnigramRecommender {
            counts,
            items,
            distribution,
            seed,
        }
    }
}

impl Recommender for UnigramRecommender {
    fn name(&self) -> &str {
        "Unigram"
    }

    fn recommend(
        &self,
        context: &[Rating],
        length: usize,
    ) -> Result<Recommendation, PredictionError> {
        let distribution = self
            .distribution
            .as_ref()
            .ok_or(PredictionError::NoTrainingData)?;
        let mut rng = context_rng(self.seed, context);

        Ok(Recommendation::with_scores(
            (0..length)
                .map(|_| {
                    let item_id = self.items[distribution.sample(&mut rng)];
                    (item_id, self.counts.probability(item_id))
                })
                .collect(),
        ))
    }

    fn probability(&self, _context: &[Rating], item_id: ItemId) -> Result<f64, PredictionError> {
        Ok(self.counts.probability(item_id))
    }
}

/// Bigram baseline: greedily extends the context with the most likely
/// next item under add-one smoothed bigram probabilities.
#[derive(Clone, Debug)]
pub struct BigramRecommender {
    counts: ItemCounts,
    items: Vec<ItemId>,
    popular: Vec<ItemId>,
    pairs: HashMap<(ItemId, ItemId), usize>,
    outgoing: HashMap<ItemId, usize>,
    followers: HashMap<ItemId, Vec<ItemId>>,
}

impl BigramRecommender {
    /// Count the consecutive item pairs inside the training sequences.
    pub fn new(training: &[Sequence], items: &[ItemId]) -> Self {
        let counts = ItemCounts::new(training);

        let mut items = items.to_owned();
        items.sort();
        items.dedup();

        let mut pairs: HashMap<(ItemId, ItemId), usize> = HashMap::new();
        let mut outgoing: HashMap<ItemId, usize> = HashMap::new();

        for sequence in training {
            for window in sequence.ratings().windows(2) {
                let (previous, next) = (window[0].item_id(), window[1].item_id());
                *pairs.entry((previous, next)).or_insert(0) += 1;
                *outgoing.entry(previous).or_insert(0) += 1;
            }
        }

        let mut followers: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
        for &(previous, next) in pairs.keys() {
            followers.entry(previous).or_insert_with(Vec::new).push(next);
        }
        for (previous, next_items) in followers.iter_mut() {
            next_items.sort_by(|x, y| {
                pairs[&(*previous, *y)]
                    .cmp(&pairs[&(*previous, *x)])
                    .then_with(|| x.cmp(y))
            });
        }

        let mut popular = items.clone();
        popular.sort_by(|x, y| counts.count(*y).cmp(&counts.count(*x)).then_with(|| x.cmp(y)));

        BigramRecommender {
            counts,
            items,
            popular,
            pairs,
            outgoing,
            followers,
        }
    }

    fn conditional(&self, previous: Option<ItemId>, next: ItemId) -> f64 {
        if self.items.binary_search(&next).is_err() {
            return 0.0;
        }

        match previous {
            Some(previous) => {
                let pair = self.pairs.get(&(previous, next)).cloned().unwrap_or(0);
                let total = self.outgoing.get(&previous).cloned().unwrap_or(0);

                (pair + 1) as f64 / (total + self.items.len()) as f64
            }
            None => self.counts.probability(next),
        }
    }

    fn next_item(&self, previous: Option<ItemId>, generated: &HashSet<ItemId>) -> Option<ItemId> {
        let candidates = match previous {
            Some(previous) => {
                let seen = self.followers.get(&previous).map_or(NO_ITEMS, |x| x.as_slice());
                seen.iter().chain(self.items.iter())
            }
            None => NO_ITEMS.iter().chain(self.popular.iter()),
        };

        candidates
            .cloned()
            .find(|x| !generated.contains(x) && self.items.binary_search(x).is_ok())
    }
}

impl Recommender for BigramRecommender {
    fn name(&self) -> &str {
        "Bigram"
    }

    fn recommend(
        &self,
        context: &[Rating],
        length: usize,
    ) -> Result<Recommendation, PredictionError> {
        let mut previous = context.last().map(|x| x.item_id());
        let mut generated = HashSet::with_capacity(length);
        let mut scored = Vec::with_capacity(length);

        while scored.len() < length {
            let item_id = match self.next_item(previous, &generated) {
                Some(item_id) => item_id,
                None => break,
            };

            scored.push((item_id, self.conditional(previous, item_id)));
            generated.insert(item_id);
            previous = Some(item_id);
        }

        Ok(Recommendation::with_scores(scored))
    }

    fn probability(&self, context: &[Rating], item_id: ItemId) -> Result<f64, PredictionError> {
        Ok(self.conditional(context.last().map(|x| x.item_id()), item_id))
    }
}
