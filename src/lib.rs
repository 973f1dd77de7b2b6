#![deny(missing_docs)]
//! # sequeval
//!
//! `sequeval` evaluates sequence-aware recommender algorithms offline:
//! ratings are grouped into per-user sessions, the sessions are split into
//! training and test sets without leaking the future into the past, and a
//! recommender is scored on eight metrics (coverage, precision, nDPM,
//! diversity, novelty, serendipity, confidence and perplexity).
//!
//! ## Example
//!
//! ```rust
//! # extern crate rand;
//! # extern crate sequeval;
//! # use std::time::Duration;
//! # use rand::SeedableRng;
//! use sequeval::data::{Builder, Rating, Splitter};
//! use sequeval::evaluation::Evaluator;
//! use sequeval::models::MostPopularRecommender;
//! use sequeval::similarity::CosineSimilarity;
//!
//! let ratings: Vec<Rating> = (0..20)
//!     .flat_map(|user| (0..10).map(move |item| Rating::new(user, item, 60 * item as u64, 4.0)))
//!     .collect();
//!
//! let builder = Builder::new(Duration::from_secs(8 * 60 * 60)).unwrap();
//! let (sequences, items) = builder.build(&ratings).unwrap();
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let (train, test) = Splitter::random(0.2).unwrap().split(&sequences, &mut rng).unwrap();
//!
//! let evaluator = Evaluator::new(&train, &test, &items, 5).unwrap();
//! let cosine = CosineSimilarity::new(&train, &items);
//! let model = MostPopularRecommender::new(&train, &items);
//!
//! let metrics = evaluator.evaluate(&model, &cosine).unwrap();
//! println!("{:?}", metrics);
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate csv;
extern crate itertools;
extern crate rand;
extern crate serde;
extern crate siphasher;

pub mod data;
pub mod datasets;
pub mod evaluation;
pub mod models;
pub mod profiler;
pub mod similarity;

use data::Rating;

/// Alias for user identifiers.
pub type UserId = usize;
/// Alias for item identifiers.
pub type ItemId = usize;
/// Alias for timestamps, in seconds.
pub type Timestamp = u64;

/// Invalid input handed to the sequence builder or a splitter.
#[derive(Debug, Fail, PartialEq)]
pub enum DataError {
    /// No ratings to build sequences from.
    #[fail(display = "Cannot build sequences from an empty rating collection.")]
    EmptyRatings,
    /// The session gap must be strictly positive.
    #[fail(display = "The session gap must be greater than zero.")]
    InvalidDelta,
    /// The test ratio must lie in the open interval (0, 1).
    #[fail(display = "Invalid test ratio {}: expected a value in (0, 1).", _0)]
    InvalidRatio(f64),
}

/// Prediction error types.
#[derive(Debug, Fail, PartialEq)]
pub enum PredictionError {
    /// Failed prediction due to numerical issues.
    #[fail(display = "Invalid prediction value: non-finite or not a number.")]
    InvalidPredictionValue,
    /// The model has nothing to predict from.
    #[fail(display = "The model was fitted on an empty training set.")]
    NoTrainingData,
}

/// Evaluation error types.
#[derive(Debug, Fail, PartialEq)]
pub enum EvaluationError {
    /// The recommendation length must be strictly positive.
    #[fail(display = "Invalid recommendation length {}: expected at least 1.", _0)]
    InvalidLength(usize),
    /// The recommender returned a longer list than it was asked for.
    #[fail(
        display = "Recommender {} returned {} items, more than the requested {}.",
        recommender, returned, length
    )]
    TooManyItems {
        /// Name of the offending recommender.
        recommender: String,
        /// Number of items it returned.
        returned: usize,
        /// Number of items it was asked for.
        length: usize,
    },
    /// The recommender returned an item that is not in the catalog.
    #[fail(display = "Recommender {} returned unknown item {}.", recommender, item_id)]
    UnknownItem {
        /// Name of the offending recommender.
        recommender: String,
        /// The unknown item.
        item_id: ItemId,
    },
    /// The recommender failed to produce a prediction.
    #[fail(display = "Prediction failed: {}", _0)]
    Prediction(#[cause] PredictionError),
}

impl From<PredictionError> for EvaluationError {
    fn from(error: PredictionError) -> Self {
        EvaluationError::Prediction(error)
    }
}

/// An ordered list of recommended items, optionally paired with
/// the score or probability the recommender assigned to each of them.
#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    item_ids: Vec<ItemId>,
    scores: Option<Vec<f64>>,
}

impl Recommendation {
    /// Build an unscored recommendation.
    pub fn new(item_ids: Vec<ItemId>) -> Self {
        Recommendation {
            item_ids,
            scores: None,
        }
    }

    /// Build a recommendation from `(item, score)` pairs, in ranking order.
    pub fn with_scores(scored: Vec<(ItemId, f64)>) -> Self {
        let (item_ids, scores) = scored.into_iter().unzip();

        Recommendation {
            item_ids,
            scores: Some(scores),
        }
    }

    /// The recommended items, best first.
    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    /// Per-item scores, if the recommender reports them.
    pub fn scores(&self) -> Option<&[f64]> {
        self.scores.as_ref().map(|scores| scores.as_slice())
    }

    /// Number of recommended items.
    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    /// Whether nothing was recommended.
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }
}

/// Trait describing models that recommend the next items of a sequence
/// given the ratings that precede them.
///
/// Randomized implementations must be seeded so that the same context
/// always yields the same recommendation within one run.
pub trait Recommender {
    /// A stable display name.
    fn name(&self) -> &str;
    /// Recommend up to `length` items to follow `context`, best first.
    fn recommend(
        &self,
        context: &[Rating],
        length: usize,
    ) -> Result<Recommendation, PredictionError>;
    /// The probability that `item_id` is the next item after `context`.
    ///
    /// Models that cannot estimate it report zero.
    fn probability(&self, _context: &[Rating], _item_id: ItemId) -> Result<f64, PredictionError> {
        Ok(0.0)
    }
}
