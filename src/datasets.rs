//! Loading rating datasets from disk.
use std::collections::HashMap;
use std::path::Path;

use crate::data::Rating;
use crate::{ItemId, UserId};

/// Dataset error types.
#[derive(Debug, Fail, PartialEq)]
pub enum DatasetError {
    /// No ratings left after loading and filtering.
    #[fail(display = "The dataset contains no usable ratings.")]
    NoRatings,
}

#[derive(Debug, Deserialize)]
struct MovieLensRating {
    #[serde(rename = "userId")]
    user_id: UserId,
    #[serde(rename = "movieId")]
    item_id: ItemId,
    rating: f32,
    timestamp: u64,
}

impl From<MovieLensRating> for Rating {
    fn from(record: MovieLensRating) -> Self {
        Rating::new(record.user_id, record.item_id, record.timestamp, record.rating)
    }
}

/// Load a MovieLens `ratings.csv` file (header
/// `userId,movieId,rating,timestamp`), keeping only users and items with at
/// least `min_ratings` ratings each.
pub fn load_movielens<P: AsRef<Path>>(
    path: P,
    min_ratings: usize,
) -> Result<Vec<Rating>, failure::Error> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let ratings = reader
        .deserialize()
        .map(|record| record.map(|x: MovieLensRating| Rating::from(x)))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        "Read {} ratings from {}.",
        ratings.len(),
        path.as_ref().display()
    );

    let ratings = filter_min_ratings(ratings, min_ratings);

    if ratings.is_empty() {
        return Err(DatasetError::NoRatings.into());
    }

    Ok(ratings)
}

/// Drop users and items with fewer than `min_ratings` ratings.
///
/// Removing an item can push a user under the threshold and vice versa, so
/// the filter is repeated until nothing changes.
pub fn filter_min_ratings(mut ratings: Vec<Rating>, min_ratings: usize) -> Vec<Rating> {
    loop {
        let mut users: HashMap<UserId, usize> = HashMap::new();
        let mut items: HashMap<ItemId, usize> = HashMap::new();

        for rating in &ratings {
            *users.entry(rating.user_id()).or_insert(0) += 1;
            *items.entry(rating.item_id()).or_insert(0) += 1;
        }

        let before = ratings.len();
        ratings.retain(|x| users[&x.user_id()] >= min_ratings && items[&x.item_id()] >= min_ratings);

        if ratings.len() == before {
            break;
        }

        debug!(
            "Dropped {} ratings below {} per user and item.",
            before - ratings.len(),
            min_ratings
        );
    }

    info!("Kept {} ratings.", ratings.len());

    ratings
}
