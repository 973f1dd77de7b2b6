//! Offline evaluation of recommenders on held-out sequence suffixes.
//!
//! Every test sequence with at least two ratings is cut into a context and
//! a target: the target is the trailing `min(k, len - 1)` ratings, the
//! context everything before it. The recommender is queried with the
//! context and `k`, and each metric is averaged over the test sequences.
//!
//! The nDPM used here compares the order in which the target items were
//! rated with the order in which they were recommended, ignoring any
//! reported scores. Pairs of target
//! items where neither was recommended carry no ranking information and
//! are not counted; an unrecommended item ranks below every recommended one.
use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use super::data::{ItemCounts, Rating, Sequence};
use super::similarity::Similarity;
use super::{EvaluationError, ItemId, PredictionError, Recommendation, Recommender};

/// Probability assigned to targets a recommender deems impossible.
pub const PROBABILITY_FLOOR: f64 = 1e-9;

/// The scores of one recommender on the eight metrics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    /// Display name of the recommender.
    pub recommender: String,
    /// Share of the catalog ever recommended.
    pub coverage: f64,
    /// Share of the recommended slots holding a target item.
    pub precision: f64,
    /// Normalized distance-based performance measure (0 is best).
    pub ndpm: f64,
    /// Mean pairwise dissimilarity inside a recommendation.
    pub diversity: f64,
    /// Mean self-information of the recommended items.
    pub novelty: f64,
    /// Unexpectedness of the correct recommendations.
    pub serendipity: f64,
    /// Score of the top recommended item.
    pub confidence: f64,
    /// Perplexity of the target items (1 is best).
    pub perplexity: f64,
}

/// A test sequence cut into the part shown to the recommender and the part
/// it has to predict.
#[derive(Clone, Copy, Debug)]
struct Case<'a> {
    ratings: &'a [Rating],
    split: usize,
}

impl<'a> Case<'a> {
    fn context(&self) -> &'a [Rating] {
        &self.ratings[..self.split]
    }

    fn target(&self) -> &'a [Rating] {
        &self.ratings[self.split..]
    }

    fn target_ids(&self) -> Vec<ItemId> {
        self.target().iter().map(|x| x.item_id()).unique().collect()
    }
}

/// Scores recommenders against a fixed training/test split.
#[derive(Debug)]
pub struct Evaluator<'a> {
    training: &'a [Sequence],
    test: &'a [Sequence],
    items: HashSet<ItemId>,
    counts: ItemCounts,
    length: usize,
}

fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

impl<'a> Evaluator<'a> {
    /// Build an evaluator recommending `length` items per test sequence.
    pub fn new(
        training: &'a [Sequence],
        test: &'a [Sequence],
        items: &[ItemId],
        length: usize,
    ) -> Result<Self, EvaluationError> {
        if length == 0 {
            return Err(EvaluationError::InvalidLength(length));
        }

        Ok(Evaluator {
            training,
            test,
            items: items.iter().cloned().collect(),
            counts: ItemCounts::new(training),
            length,
        })
    }

    /// The training sequences.
    pub fn training(&self) -> &[Sequence] {
        self.training
    }

    /// The test sequences.
    pub fn test(&self) -> &[Sequence] {
        self.test
    }

    /// The recommendation length `k`.
    pub fn length(&self) -> usize {
        self.length
    }

    fn cases(&self) -> impl Iterator<Item = Case<'a>> + 'a {
        let test: &'a [Sequence] = self.test;
        let length = self.length;

        test.iter().filter(|x| x.len() > 1).map(move |sequence| {
            let ratings = sequence.ratings();
            let window = length.min(ratings.len() - 1);

            Case {
                ratings,
                split: ratings.len() - window,
            }
        })
    }

    fn recommend<R: Recommender + ?Sized>(
        &self,
        recommender: &R,
        context: &[Rating],
    ) -> Result<Recommendation, EvaluationError> {
        let recommendation = recommender.recommend(context, self.length)?;

        if recommendation.len() > self.length {
            return Err(EvaluationError::TooManyItems {
                recommender: recommender.name().to_owned(),
                returned: recommendation.len(),
                length: self.length,
            });
        }

        if let Some(&item_id) = recommendation
            .item_ids()
            .iter()
            .find(|&&x| !self.items.contains(&x))
        {
            return Err(EvaluationError::UnknownItem {
                recommender: recommender.name().to_owned(),
                item_id,
            });
        }

        if let Some(scores) = recommendation.scores() {
            if scores.len() != recommendation.len() || scores.iter().any(|x| !x.is_finite()) {
                return Err(PredictionError::InvalidPredictionValue.into());
            }
        }

        Ok(recommendation)
    }

    /// Run `metric` on the recommendation for every evaluable test sequence
    /// and average the values it reports.
    fn average<R, F>(&self, recommender: &R, mut metric: F) -> Result<Option<f64>, EvaluationError>
    where
        R: Recommender + ?Sized,
        F: FnMut(&Case<'a>, &Recommendation) -> Option<f64>,
    {
        let mut values = Vec::with_capacity(self.test.len());

        for case in self.cases() {
            let recommendation = self.recommend(recommender, case.context())?;

            if let Some(value) = metric(&case, &recommendation) {
                values.push(value);
            }
        }

        if values.is_empty() {
            warn!("No test sequence could be scored for {}", recommender.name());
        }

        Ok(mean(values))
    }

    /// Fraction of the catalog that appears in at least one recommendation.
    pub fn coverage<R: Recommender + ?Sized>(&self, recommender: &R) -> Result<f64, EvaluationError> {
        let mut recommended = HashSet::new();

        for case in self.cases() {
            let recommendation = self.recommend(recommender, case.context())?;
            recommended.extend(recommendation.item_ids().iter().cloned());
        }

        if self.items.is_empty() {
            return Ok(0.0);
        }

        Ok(recommended.len() as f64 / self.items.len() as f64)
    }

    /// Mean fraction of the `k` recommended slots filled with a target item.
    pub fn precision<R: Recommender + ?Sized>(&self, recommender: &R) -> Result<f64, EvaluationError> {
        let length = self.length as f64;

        let precision = self.average(recommender, |case, recommendation| {
            let target = case.target_ids();
            let hits = recommendation
                .item_ids()
                .iter()
                .unique()
                .filter(|x| target.contains(x))
                .count();

            Some(hits as f64 / length)
        })?;

        Ok(precision.unwrap_or(0.0))
    }

    /// Mean normalized distance-based performance measure of the
    /// recommended order of the target items against their true order.
    pub fn ndpm<R: Recommender + ?Sized>(&self, recommender: &R) -> Result<f64, EvaluationError> {
        let distance = self.average(recommender, |case, recommendation| {
            Some(ndpm(&case.target_ids(), recommendation))
        })?;

        Ok(distance.unwrap_or(0.0))
    }

    /// Mean pairwise dissimilarity of the items inside each recommendation.
    ///
    /// Recommendations of fewer than two items are skipped.
    pub fn diversity<R, S>(&self, recommender: &R, similarity: &S) -> Result<f64, EvaluationError>
    where
        R: Recommender + ?Sized,
        S: Similarity + ?Sized,
    {
        let diversity = self.average(recommender, |_, recommendation| {
            mean(
                recommendation
                    .item_ids()
                    .iter()
                    .tuple_combinations()
                    .map(|(&a, &b)| similarity.dissimilarity(a, b)),
            )
        })?;

        Ok(diversity.unwrap_or(0.0))
    }

    /// Mean self-information, `-log2(popularity)`, of the recommended items.
    ///
    /// Items never rated in training count as rated once.
    pub fn novelty<R: Recommender + ?Sized>(&self, recommender: &R) -> Result<f64, EvaluationError> {
        let total = self.counts.total();

        if total == 0 {
            return Ok(0.0);
        }

        let counts = &self.counts;
        let novelty = self.average(recommender, |_, recommendation| {
            mean(recommendation.item_ids().iter().map(|&item_id| {
                let count = counts.count(item_id).max(1);
                -(count as f64 / total as f64).log2()
            }))
        })?;

        Ok(novelty.unwrap_or(0.0))
    }

    /// Mean unexpectedness of the correct recommendations: each recommended
    /// target item contributes its mean dissimilarity to the context items,
    /// every other recommended item contributes zero.
    pub fn serendipity<R, S>(&self, recommender: &R, similarity: &S) -> Result<f64, EvaluationError>
    where
        R: Recommender + ?Sized,
        S: Similarity + ?Sized,
    {
        let serendipity = self.average(recommender, |case, recommendation| {
            if recommendation.is_empty() {
                return None;
            }

            let target = case.target_ids();
            let context: Vec<ItemId> = case.context().iter().map(|x| x.item_id()).unique().collect();

            let unexpectedness: f64 = recommendation
                .item_ids()
                .iter()
                .filter(|x| target.contains(x))
                .filter_map(|&item_id| {
                    mean(context.iter().map(|&seen| similarity.dissimilarity(item_id, seen)))
                })
                .sum();

            Some(unexpectedness / recommendation.len() as f64)
        })?;

        Ok(serendipity.unwrap_or(0.0))
    }

    /// Mean score of the top recommended item; recommenders without scores
    /// count as `1 / k`.
    pub fn confidence<R: Recommender + ?Sized>(&self, recommender: &R) -> Result<f64, EvaluationError> {
        let neutral = 1.0 / self.length as f64;

        let confidence = self.average(recommender, |_, recommendation| {
            if recommendation.is_empty() {
                return None;
            }

            Some(match recommendation.scores() {
                Some(scores) => scores[0],
                None => neutral,
            })
        })?;

        Ok(confidence.unwrap_or(0.0))
    }

    /// Mean per-sequence perplexity of the target items, each predicted from
    /// the context extended by the true items before it.
    pub fn perplexity<R: Recommender + ?Sized>(&self, recommender: &R) -> Result<f64, EvaluationError> {
        let mut values = Vec::with_capacity(self.test.len());

        for case in self.cases() {
            let mut log_likelihood = 0.0;

            for position in case.split..case.ratings.len() {
                let probability = recommender
                    .probability(&case.ratings[..position], case.ratings[position].item_id())?;

                if !probability.is_finite() {
                    return Err(PredictionError::InvalidPredictionValue.into());
                }

                log_likelihood += probability.max(PROBABILITY_FLOOR).min(1.0).ln();
            }

            let num_targets = (case.ratings.len() - case.split) as f64;
            values.push((-log_likelihood / num_targets).exp());
        }

        Ok(mean(values).unwrap_or(1.0))
    }

    /// Compute all eight metrics for `recommender`.
    pub fn evaluate<R, S>(&self, recommender: &R, similarity: &S) -> Result<Metrics, EvaluationError>
    where
        R: Recommender + ?Sized,
        S: Similarity + ?Sized,
    {
        let metrics = Metrics {
            recommender: recommender.name().to_owned(),
            coverage: self.coverage(recommender)?,
            precision: self.precision(recommender)?,
            ndpm: self.ndpm(recommender)?,
            diversity: self.diversity(recommender, similarity)?,
            novelty: self.novelty(recommender)?,
            serendipity: self.serendipity(recommender, similarity)?,
            confidence: self.confidence(recommender)?,
            perplexity: self.perplexity(recommender)?,
        };

        debug!("{:?}", metrics);

        Ok(metrics)
    }
}

/// Position of each recommended item, best first. Repeated items keep their
/// first position.
fn system_ranks(recommendation: &Recommendation) -> HashMap<ItemId, usize> {
    let mut ranks = HashMap::with_capacity(recommendation.len());

    for (position, &item_id) in recommendation.item_ids().iter().enumerate() {
        ranks.entry(item_id).or_insert(position);
    }

    ranks
}

fn ndpm(target: &[ItemId], recommendation: &Recommendation) -> f64 {
    let ranks = system_ranks(recommendation);

    let mut pairs = 0usize;
    let mut contradictions = 0usize;

    for (idx, before) in target.iter().enumerate() {
        for after in &target[idx + 1..] {
            match (ranks.get(before), ranks.get(after)) {
                (None, None) => continue,
                (Some(_), None) => {}
                (None, Some(_)) => contradictions += 1,
                (Some(x), Some(y)) => {
                    if y < x {
                        contradictions += 1;
                    }
                }
            }
            pairs += 1;
        }
    }

    if pairs == 0 {
        return if target.iter().any(|x| ranks.contains_key(x)) {
            0.0
        } else {
            1.0
        };
    }

    // Positions are distinct, so no pair is ever tied.
    contradictions as f64 / pairs as f64
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::data::{timestamp_split, Builder};
    use crate::models::{BigramRecommender, RandomRecommender};
    use crate::similarity::CosineSimilarity;

    fn sequence(user_id: usize, item_ids: &[ItemId]) -> Sequence {
        Sequence::new(
            user_id,
            item_ids
                .iter()
                .enumerate()
                .map(|(idx, &item_id)| Rating::new(user_id, item_id, (idx as u64) * 10, 1.0))
                .collect(),
        )
    }

    fn fixture() -> (Vec<Sequence>, Vec<Sequence>, Vec<ItemId>) {
        let training = vec![
            sequence(10, &[0, 1, 2, 3]),
            sequence(11, &[1, 2, 17]),
            sequence(12, &[4, 5, 6, 7, 8, 9]),
        ];
        let test = vec![
            sequence(0, &[0, 1, 2, 3, 4]),
            sequence(1, &[5, 6, 7, 8, 9]),
            sequence(2, &[3]),
            sequence(3, &[9, 2]),
        ];

        (training, test, (0..20).collect())
    }

    /// Knows the first held-out item of every test user.
    struct Oracle;

    impl Recommender for Oracle {
        fn name(&self) -> &str {
            "Oracle"
        }

        fn recommend(
            &self,
            context: &[Rating],
            length: usize,
        ) -> Result<Recommendation, PredictionError> {
            let next = match context[0].user_id() {
                0 => 2,
                1 => 7,
                _ => 2,
            };

            Ok(Recommendation::new(
                vec![next, 17, 18, 19].into_iter().take(length).collect(),
            ))
        }
    }

    struct Fixed {
        item_ids: Vec<ItemId>,
        scores: Option<Vec<f64>>,
        probability: f64,
    }

    impl Fixed {
        fn new(item_ids: &[ItemId]) -> Self {
            Fixed {
                item_ids: item_ids.to_owned(),
                scores: None,
                probability: 0.0,
            }
        }
    }

    impl Recommender for Fixed {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn recommend(
            &self,
            _context: &[Rating],
            _length: usize,
        ) -> Result<Recommendation, PredictionError> {
            Ok(match self.scores {
                Some(ref scores) => Recommendation::with_scores(
                    self.item_ids.iter().cloned().zip(scores.iter().cloned()).collect(),
                ),
                None => Recommendation::new(self.item_ids.clone()),
            })
        }

        fn probability(&self, _context: &[Rating], _item_id: ItemId) -> Result<f64, PredictionError> {
            Ok(self.probability)
        }
    }

    struct Constant(f64);

    impl Similarity for Constant {
        fn similarity(&self, item_a: ItemId, item_b: ItemId) -> f64 {
            if item_a == item_b {
                1.0
            } else {
                self.0
            }
        }
    }

    fn close(x: f64, y: f64) -> bool {
        (x - y).abs() < 1e-9
    }

    #[test]
    fn oracle_precision_and_ndpm() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();

        assert!(close(evaluator.precision(&Oracle).unwrap(), 1.0 / 3.0));
        assert_eq!(evaluator.ndpm(&Oracle).unwrap(), 0.0);
    }

    #[test]
    fn coverage_counts_distinct_recommended_items() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();

        assert!(close(evaluator.coverage(&Fixed::new(&[17, 18, 19])).unwrap(), 0.15));
        assert!(close(evaluator.coverage(&Oracle).unwrap(), 4.0 / 20.0));
    }

    #[test]
    fn identical_items_have_no_diversity() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();
        let cosine = CosineSimilarity::new(&training, &items);

        assert_eq!(evaluator.diversity(&Fixed::new(&[5, 5, 5]), &cosine).unwrap(), 0.0);
        assert!(close(evaluator.diversity(&Oracle, &Constant(0.25)).unwrap(), 0.75));
    }

    #[test]
    fn diversity_needs_two_items() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 1).unwrap();

        assert_eq!(evaluator.diversity(&Oracle, &Constant(0.0)).unwrap(), 0.0);
    }

    #[test]
    fn novelty_of_rare_and_unseen_items() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();

        let novelty = evaluator.novelty(&Fixed::new(&[1, 18])).unwrap();
        let expected = (6.5f64.log2() + 13.0f64.log2()) / 2.0;

        assert!(close(novelty, expected));
    }

    #[test]
    fn serendipity_rewards_unexpected_hits() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();

        assert!(close(evaluator.serendipity(&Oracle, &Constant(0.25)).unwrap(), 0.25));
        assert_eq!(
            evaluator.serendipity(&Fixed::new(&[17, 18]), &Constant(0.25)).unwrap(),
            0.0
        );
    }

    #[test]
    fn confidence_uses_the_top_score() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 4).unwrap();

        let scored = Fixed {
            item_ids: vec![1, 2],
            scores: Some(vec![0.7, 0.1]),
            probability: 0.0,
        };

        assert!(close(evaluator.confidence(&scored).unwrap(), 0.7));
        assert!(close(evaluator.confidence(&Oracle).unwrap(), 0.25));
    }

    #[test]
    fn perplexity_of_fixed_probabilities() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();

        let mut model = Fixed::new(&[1]);
        model.probability = 0.5;
        assert!(close(evaluator.perplexity(&model).unwrap(), 2.0));

        model.probability = 1.0;
        assert!(close(evaluator.perplexity(&model).unwrap(), 1.0));

        let floored = evaluator.perplexity(&Oracle).unwrap();
        assert!(((floored - 1.0 / PROBABILITY_FLOOR) / floored).abs() < 1e-9);
    }

    #[test]
    fn contract_violations_are_rejected() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();

        assert_eq!(
            evaluator.precision(&Fixed::new(&[1, 2, 3, 4])).unwrap_err(),
            EvaluationError::TooManyItems {
                recommender: "Fixed".to_owned(),
                returned: 4,
                length: 3,
            }
        );
        assert_eq!(
            evaluator.coverage(&Fixed::new(&[1, 99])).unwrap_err(),
            EvaluationError::UnknownItem {
                recommender: "Fixed".to_owned(),
                item_id: 99,
            }
        );

        let nan = Fixed {
            item_ids: vec![1],
            scores: Some(vec![std::f64::NAN]),
            probability: 0.0,
        };
        assert_eq!(
            evaluator.confidence(&nan).unwrap_err(),
            EvaluationError::Prediction(PredictionError::InvalidPredictionValue)
        );
    }

    #[test]
    fn zero_length_is_rejected() {
        let (training, test, items) = fixture();

        assert_eq!(
            Evaluator::new(&training, &test, &items, 0).unwrap_err(),
            EvaluationError::InvalidLength(0)
        );
    }

    #[test]
    fn short_sequences_use_a_shorter_window() {
        let training = vec![sequence(9, &[1, 2])];
        let test = vec![sequence(0, &[1, 2]), sequence(1, &[4])];
        let items: Vec<ItemId> = (0..5).collect();
        let evaluator = Evaluator::new(&training, &test, &items, 5).unwrap();

        let cases: Vec<_> = evaluator.cases().collect();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].context().len(), 1);
        assert_eq!(cases[0].target_ids(), vec![2]);
    }

    #[test]
    fn ndpm_counts_inverted_pairs() {
        let target = vec![1, 2, 3];

        assert_eq!(ndpm(&target, &Recommendation::new(vec![1, 2, 3])), 0.0);
        assert_eq!(ndpm(&target, &Recommendation::new(vec![3, 2, 1])), 1.0);
        assert_eq!(ndpm(&target, &Recommendation::new(vec![7, 8])), 1.0);
        assert_eq!(ndpm(&[4], &Recommendation::new(vec![4])), 0.0);

        // Only 2 is recommended: (1, 2) is inverted, (2, 3) agrees, (1, 3) is not counted.
        assert_eq!(ndpm(&target, &Recommendation::new(vec![2])), 0.5);
    }

    #[test]
    fn ndpm_follows_list_order_not_scores() {
        let target = vec![1, 2, 3];

        let flat = Recommendation::with_scores(vec![(1, 0.05), (2, 0.05), (3, 0.05)]);
        assert_eq!(ndpm(&target, &flat), 0.0);

        let rising = Recommendation::with_scores(vec![(1, 0.1), (2, 0.2), (3, 0.3)]);
        assert_eq!(ndpm(&target, &rising), 0.0);

        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();

        // In the true order of user 0's target, with scores rising.
        let scored = Fixed {
            item_ids: vec![2, 3, 4],
            scores: Some(vec![0.1, 0.2, 0.3]),
            probability: 0.0,
        };
        let recommendation = scored.recommend(&[], 3).unwrap();
        let case = evaluator.cases().next().unwrap();

        assert_eq!(case.target_ids(), vec![2, 3, 4]);
        assert_eq!(ndpm(&case.target_ids(), &recommendation), 0.0);
    }

    #[test]
    fn evaluate_reports_every_metric() {
        let (training, test, items) = fixture();
        let evaluator = Evaluator::new(&training, &test, &items, 3).unwrap();

        let metrics = evaluator.evaluate(&Oracle, &Constant(0.25)).unwrap();

        assert_eq!(metrics.recommender, "Oracle");
        assert!(close(metrics.precision, 1.0 / 3.0));
        assert_eq!(metrics.ndpm, 0.0);
        assert!(close(metrics.serendipity, 0.25));
        assert!(close(metrics.confidence, 1.0 / 3.0));
    }

    fn arb_ratings() -> impl Strategy<Value = Vec<Rating>> {
        prop::collection::vec((0usize..8, 0usize..15, 0u64..5_000), 2..150).prop_map(|raw| {
            raw.into_iter()
                .map(|(user_id, item_id, timestamp)| Rating::new(user_id, item_id, timestamp, 3.0))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn metrics_stay_in_range(ratings in arb_ratings(), length in 1usize..6, seed in any::<u64>()) {
            let builder = Builder::new(Duration::from_secs(1_000)).unwrap();
            let (sequences, items) = builder.build(&ratings).unwrap();
            let (training, test) = timestamp_split(&sequences, 0.5);

            let evaluator = Evaluator::new(&training, &test, &items, length).unwrap();
            let cosine = CosineSimilarity::new(&training, &items);

            let random = RandomRecommender::new(&items, seed);
            let bigram = BigramRecommender::new(&training, &items);
            let models: Vec<&dyn Recommender> = vec![&random, &bigram];

            for model in models {
                let metrics = evaluator.evaluate(model, &cosine).unwrap();

                prop_assert!(metrics.coverage >= 0.0 && metrics.coverage <= 1.0);
                prop_assert!(metrics.precision >= 0.0 && metrics.precision <= 1.0);
                prop_assert!(metrics.ndpm >= 0.0 && metrics.ndpm <= 1.0);
                prop_assert!(metrics.perplexity >= 1.0);
                prop_assert!(metrics.diversity >= 0.0 && metrics.diversity <= 2.0);
            }
        }
    }
}
