//! Answer option shuffling.

use rand::Rng;
use rand::seq::SliceRandom;

/// Build the display options for a question: the incorrect answers plus the
/// correct one, permuted with a Fisher–Yates shuffle driven by `rng`.
pub fn shuffle_options<R: Rng + ?Sized>(correct: &str, incorrect: &[String], rng: &mut R) -> Vec<String> {
    let mut options = Vec::with_capacity(incorrect.len() + 1);
    options.extend(incorrect.iter().cloned());
    options.push(correct.to_owned());
    options.shuffle(rng);
    options
}
