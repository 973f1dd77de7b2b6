//! Ratings, session sequences, and the training/test splitters.
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::mem;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use super::{DataError, ItemId, Timestamp, UserId};

/// A user's rating of an item at a point in time.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Rating {
    user_id: UserId,
    item_id: ItemId,
    timestamp: Timestamp,
    value: f32,
}

impl Rating {
    /// Build a new rating.
    pub fn new(user_id: UserId, item_id: ItemId, timestamp: Timestamp, value: f32) -> Self {
        Rating {
            user_id,
            item_id,
            timestamp,
            value,
        }
    }

    /// The rating user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
    /// The rated item.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }
    /// Seconds since the epoch.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    /// The rating value.
    pub fn value(&self) -> f32 {
        self.value
    }
}

/// One user's session: ratings in timestamp order, each closer than
/// the builder's gap to the one before it.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Sequence {
    user_id: UserId,
    ratings: Vec<Rating>,
}

impl Sequence {
    pub(crate) fn new(user_id: UserId, ratings: Vec<Rating>) -> Self {
        Sequence { user_id, ratings }
    }

    /// The owning user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The ratings, oldest first.
    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    /// Number of ratings.
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    /// Whether the sequence holds no ratings.
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Iterate over the rated items in order.
    pub fn item_ids<'a>(&'a self) -> impl Iterator<Item = ItemId> + 'a {
        self.ratings.iter().map(|x| x.item_id())
    }

    /// Timestamp of the first rating.
    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.ratings.first().map(|x| x.timestamp())
    }

    /// Timestamp of the last rating.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.ratings.last().map(|x| x.timestamp())
    }
}

/// Number of ratings of each item in a sequence collection.
#[derive(Clone, Debug, Default)]
pub struct ItemCounts {
    counts: HashMap<ItemId, usize>,
    total: usize,
}

impl ItemCounts {
    /// Count the ratings in `sequences`.
    pub fn new(sequences: &[Sequence]) -> Self {
        let mut counts = HashMap::new();
        let mut total = 0;

        for item_id in sequences.iter().flat_map(|x| x.item_ids()) {
            *counts.entry(item_id).or_insert(0) += 1;
            total += 1;
        }

        ItemCounts { counts, total }
    }

    /// Ratings of `item_id`.
    pub fn count(&self, item_id: ItemId) -> usize {
        self.counts.get(&item_id).cloned().unwrap_or(0)
    }

    /// Ratings of all items.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Share of all ratings that went to `item_id`, or 0 when nothing was rated.
    pub fn probability(&self, item_id: ItemId) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        self.count(item_id) as f64 / self.total as f64
    }
}

fn cmp_timestamp(x: &Rating, y: &Rating) -> Ordering {
    let uid_comparison = x.user_id().cmp(&y.user_id());

    if uid_comparison == Ordering::Equal {
        x.timestamp().cmp(&y.timestamp())
    } else {
        uid_comparison
    }
}

fn cmp_last_timestamp(x: &Sequence, y: &Sequence) -> Ordering {
    x.last_timestamp()
        .cmp(&y.last_timestamp())
        .then_with(|| x.user_id().cmp(&y.user_id()))
        .then_with(|| x.first_timestamp().cmp(&y.first_timestamp()))
}

/// Groups ratings into per-user sessions separated by inactivity gaps.
#[derive(Clone, Debug)]
pub struct Builder {
    delta: Duration,
}

impl Builder {
    /// Build a sequence builder that starts a new session whenever two
    /// consecutive ratings of a user are at least `delta` apart.
    pub fn new(delta: Duration) -> Result<Self, DataError> {
        if delta == Duration::from_secs(0) {
            return Err(DataError::InvalidDelta);
        }

        Ok(Builder { delta })
    }

    /// The session gap.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    fn is_gap(&self, previous: &Rating, next: &Rating) -> bool {
        previous.user_id() != next.user_id()
            || Duration::from_secs(next.timestamp().saturating_sub(previous.timestamp()))
                >= self.delta
    }

    /// Build the session sequences and the item catalog.
    ///
    /// The catalog is returned sorted; the order of the sequences carries
    /// no meaning.
    pub fn build(&self, ratings: &[Rating]) -> Result<(Vec<Sequence>, Vec<ItemId>), DataError> {
        if ratings.is_empty() {
            return Err(DataError::EmptyRatings);
        }

        let mut data = ratings.to_owned();
        data.sort_by(cmp_timestamp);

        let mut sequences = Vec::new();
        let mut pending: Vec<Rating> = Vec::new();

        for rating in data {
            let closed = pending
                .last()
                .map_or(false, |previous| self.is_gap(previous, &rating));

            if closed {
                let user_id = pending[0].user_id();
                sequences.push(Sequence::new(user_id, mem::replace(&mut pending, Vec::new())));
            }

            pending.push(rating);
        }

        if let Some(first) = pending.first() {
            let user_id = first.user_id();
            sequences.push(Sequence::new(user_id, pending));
        }

        let items: Vec<ItemId> = ratings
            .iter()
            .map(|x| x.item_id())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        info!(
            "Built {} sequences from {} ratings of {} items",
            sequences.len(),
            ratings.len(),
            items.len()
        );

        Ok((sequences, items))
    }
}

/// Strategy used to partition sequences into training and test sets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Splitter {
    /// Assign a uniformly random subset of the sequences to the test set.
    Random {
        /// Fraction of the sequences routed to the test set.
        ratio: f64,
    },
    /// Assign the sequences that end last to the test set.
    Timestamp {
        /// Fraction of the sequences routed to the test set.
        ratio: f64,
    },
}

fn check_ratio(ratio: f64) -> Result<(), DataError> {
    if ratio > 0.0 && ratio < 1.0 {
        Ok(())
    } else {
        Err(DataError::InvalidRatio(ratio))
    }
}

fn test_size(num_sequences: usize, test_fraction: f64) -> usize {
    ((test_fraction * num_sequences as f64).floor() as usize).min(num_sequences)
}

impl Splitter {
    /// Build a random splitter.
    pub fn random(ratio: f64) -> Result<Self, DataError> {
        check_ratio(ratio)?;
        Ok(Splitter::Random { ratio })
    }

    /// Build a timestamp splitter.
    pub fn timestamp(ratio: f64) -> Result<Self, DataError> {
        check_ratio(ratio)?;
        Ok(Splitter::Timestamp { ratio })
    }

    /// Fraction of the sequences routed to the test set.
    pub fn ratio(&self) -> f64 {
        match *self {
            Splitter::Random { ratio } | Splitter::Timestamp { ratio } => ratio,
        }
    }

    /// Split `sequences` into `(training, test)`.
    ///
    /// The test set always holds `floor(ratio * sequences.len())` sequences.
    /// Only the random strategy draws from `rng`.
    pub fn split<R: Rng>(
        &self,
        sequences: &[Sequence],
        rng: &mut R,
    ) -> Result<(Vec<Sequence>, Vec<Sequence>), DataError> {
        check_ratio(self.ratio())?;

        let (train, test) = match *self {
            Splitter::Random { ratio } => random_split(sequences, rng, ratio),
            Splitter::Timestamp { ratio } => timestamp_split(sequences, ratio),
        };

        info!("Split into {} training and {} test sequences", train.len(), test.len());

        Ok((train, test))
    }
}

/// Shuffle the sequences and route the first `test_fraction` of them to the test set.
pub fn random_split<R: Rng>(
    sequences: &[Sequence],
    rng: &mut R,
    test_fraction: f64,
) -> (Vec<Sequence>, Vec<Sequence>) {
    let mut test = sequences.to_owned();
    test.shuffle(rng);

    let train = test.split_off(test_size(sequences.len(), test_fraction));

    (train, test)
}

/// Order the sequences by their last rating and route the latest
/// `test_fraction` of them to the test set.
pub fn timestamp_split(
    sequences: &[Sequence],
    test_fraction: f64,
) -> (Vec<Sequence>, Vec<Sequence>) {
    let mut train = sequences.to_owned();
    train.sort_by(cmp_last_timestamp);

    let cutoff = train.len() - test_size(sequences.len(), test_fraction);
    let test = train.split_off(cutoff);

    (train, test)
}
