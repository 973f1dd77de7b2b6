//! Baseline recommenders.
//!
//! All baselines are fitted on the training sequences and recommend from
//! the item catalog. Randomized baselines derive their generator from a
//! seed and the context, so the same context is always answered the same
//! way.
use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::SeedableRng;
use siphasher::sip::SipHasher;

use crate::data::Rating;

mod ngram;
mod popularity;
mod random;

pub use self::ngram::{BigramRecommender, UnigramRecommender};
pub use self::popularity::MostPopularRecommender;
pub use self::random::RandomRecommender;

const CONTEXT_KEY: u64 = 0x5eed_5e9e_ba11_0c0d;

fn context_rng(seed: u64, context: &[Rating]) -> StdRng {
    let mut hasher = SipHasher::new_with_keys(seed, CONTEXT_KEY);

    for rating in context {
        hasher.write_usize(rating.user_id());
        hasher.write_usize(rating.item_id());
        hasher.write_u64(rating.timestamp());
    }

    StdRng::seed_from_u64(hasher.finish())
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn context_rng_depends_on_seed_and_context() {
        let context = vec![Rating::new(1, 2, 3, 4.0)];
        let other = vec![Rating::new(1, 5, 3, 4.0)];

        let draw = |seed, context: &[Rating]| context_rng(seed, context).gen::<u64>();

        assert_eq!(draw(7, &context), draw(7, &context));
        assert_ne!(draw(7, &context), draw(8, &context));
        assert_ne!(draw(7, &context), draw(7, &other));
    }
}
