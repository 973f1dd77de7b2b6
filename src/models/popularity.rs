//! Recommends the items rated most often in the training set.
use crate::data::{ItemCounts, Rating, Sequence};
use crate::{ItemId, PredictionError, Recommendation, Recommender};

/// Most-popular baseline: every context gets the same top items.
#[derive(Clone, Debug)]
pub struct MostPopularRecommender {
    counts: ItemCounts,
    ranking: Vec<(ItemId, f64)>,
}

impl MostPopularRecommender {
    /// Rank the catalog by training rating count, breaking ties by item id.
    pub fn new(training: &[Sequence], items: &[ItemId]) -> Self {
        let counts = ItemCounts::new(training);

        let mut ranking: Vec<(ItemId, f64)> = items
            .iter()
            .map(|&item_id| (item_id, counts.probability(item_id)))
            .collect();
        ranking.sort_by(|x, y| {
            counts
                .count(y.0)
                .cmp(&counts.count(x.0))
                .then_with(|| x.0.cmp(&y.0))
        });
        ranking.dedup_by_key(|x| x.0);

        MostPopularRecommender { counts, ranking }
    }
}

impl Recommender for MostPopularRecommender {
    fn name(&self) -> &str {
        "MostPopular"
    }

    fn recommend(
        &self,
        _context: &[Rating],
        length: usize,
    ) -> Result<Recommendation, PredictionError> {
        Ok(Recommendation::with_scores(
            self.ranking.iter().take(length).cloned().collect(),
        ))
    }

    fn probability(&self, _context: &[Rating], item_id: ItemId) -> Result<f64, PredictionError> {
        Ok(self.counts.probability(item_id))
    }
}
