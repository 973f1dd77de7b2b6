//! Recommends catalog items uniformly at random.
use rand::seq::SliceRandom;

use super::context_rng;
use crate::data::Rating;
use crate::{ItemId, PredictionError, Recommendation, Recommender};

/// Random baseline: distinct items drawn uniformly from the catalog.
#[derive(Clone, Debug)]
pub struct RandomRecommender {
    items: Vec<ItemId>,
    seed: u64,
}

impl RandomRecommender {
    /// Build a random recommender over `items`.
    pub fn new(items: &[ItemId], seed: u64) -> Self {
        let mut items = items.to_owned();
        items.sort();
        items.dedup();

        RandomRecommender { items, seed }
    }

    fn uniform(&self) -> f64 {
        if self.items.is_empty() {
            0.0
        } else {
            1.0 / self.items.len() as f64
        }
    }
}

impl Recommender for RandomRecommender {
    fn name(&self) -> &str {
        "Random"
    }

    fn recommend(
        &self,
        context: &[Rating],
        length: usize,
    ) -> Result<Recommendation, PredictionError> {
        let mut rng = context_rng(self.seed, context);
        let score = self.uniform();

        Ok(Recommendation::with_scores(
            self.items
                .choose_multiple(&mut rng, length)
                .map(|&item_id| (item_id, score))
                .collect(),
        ))
    }

    fn probability(&self, _context: &[Rating], item_id: ItemId) -> Result<f64, PredictionError> {
        if self.items.binary_search(&item_id).is_ok() {
            Ok(self.uniform())
        } else {
            Ok(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn distinct_items_from_the_catalog() {
        let items: Vec<ItemId> = (0..50).collect();
        let model = RandomRecommender::new(&items, 42);
        let context = vec![Rating::new(1, 3, 100, 2.0)];

        let recommendation = model.recommend(&context, 10).unwrap();
        let distinct: HashSet<_> = recommendation.item_ids().iter().collect();

        assert_eq!(recommendation.len(), 10);
        assert_eq!(distinct.len(), 10);
        assert!(recommendation.item_ids().iter().all(|x| *x < 50));
        assert!((recommendation.scores().unwrap()[0] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn same_context_same_recommendation() {
        let items: Vec<ItemId> = (0..100).collect();
        let model = RandomRecommender::new(&items, 42);
        let context = vec![Rating::new(1, 3, 100, 2.0), Rating::new(1, 4, 160, 2.0)];

        assert_eq!(
            model.recommend(&context, 5).unwrap(),
            model.recommend(&context, 5).unwrap()
        );
    }

    #[test]
    fn catalog_smaller_than_length() {
        let model = RandomRecommender::new(&[4, 2, 4], 1);

        assert_eq!(model.recommend(&[], 5).unwrap().len(), 2);
        assert_eq!(model.probability(&[], 2).unwrap(), 0.5);
        assert_eq!(model.probability(&[], 3).unwrap(), 0.0);
    }
}
