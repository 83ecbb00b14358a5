//! Synthetic track libraries.

use std::{collections::HashMap, ops::Range};

use rand::{Rng, distributions::Alphanumeric};

/// A 22 character base62 id, the shape of streaming-service track ids.
pub fn random_track_id(rng: &mut impl Rng) -> String {
    (0..22).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}

/// `size` tracks with tempos spread uniformly over `bpm`.
pub fn generate_library(size: usize, bpm: Range<f64>, rng: &mut impl Rng) -> HashMap<String, f64> {
    let mut library = HashMap::with_capacity(size);
    while library.len() < size {
        let tempo = (rng.gen_range(bpm.clone()) * 10.0).round() / 10.0;
        library.insert(random_track_id(rng), tempo);
    }
    library
}
