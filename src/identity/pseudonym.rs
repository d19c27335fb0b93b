//! Pseudonym generation for anonymized runs.
//!
//! A generator is owned by one run, so two runs never share a pool of
//! used names. Uniqueness only holds within a single generator.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;

/// Capability that hands out unique pseudonyms.
pub trait PseudonymGenerator: Send {
    /// Return a pseudonym not previously returned by this generator.
    fn next_pseudonym(&mut self) -> String;
}

/// Pool of first names used by [`FirstNamePseudonyms`].
pub const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Alma", "Amos", "Anya", "Arlo", "Basil", "Bea", "Boris", "Cora",
    "Cyril", "Dara", "Delia", "Edda", "Elio", "Enid", "Ezra", "Fern", "Flora", "Gil",
    "Greta", "Hana", "Hugo", "Ida", "Igor", "Ines", "Ivo", "Jada", "Jonas", "Juno",
    "Kai", "Kira", "Lars", "Lena", "Lior", "Mara", "Milo", "Nadia", "Nico", "Nora",
    "Odile", "Olaf", "Orla", "Otto", "Pia", "Quinn", "Rhea", "Rolf", "Rosa", "Saul",
    "Sela", "Soren", "Tam", "Tess", "Uma", "Ulf", "Vera", "Vik", "Wren", "Xavi",
    "Yara", "Yuri", "Zadie", "Zeno",
];

/// First names drawn from a seeded shuffle of [`FIRST_NAMES`].
///
/// Once the pool is used up, names repeat with a numeric suffix
/// (`"Ada 2"`, `"Alan 2"`, ...), so the generator never runs dry.
pub struct FirstNamePseudonyms {
    order: Vec<&'static str>,
    issued: usize,
    used: BTreeSet<String>,
}

impl FirstNamePseudonyms {
    /// Create a generator with a fixed seed. Same seed, same sequence.
    pub fn with_seed(seed: u64) -> Self {
        let mut order = FIRST_NAMES.to_vec();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        Self {
            order,
            issued: 0,
            used: BTreeSet::new(),
        }
    }

    /// Create a generator seeded from system entropy.
    pub fn from_entropy() -> Self {
        Self::with_seed(rand::random())
    }
}

impl PseudonymGenerator for FirstNamePseudonyms {
    fn next_pseudonym(&mut self) -> String {
        loop {
            let base = self.order[self.issued % self.order.len()];
            let round = self.issued / self.order.len();
            self.issued += 1;

            let candidate = if round == 0 {
                base.to_string()
            } else {
                format!("{} {}", base, round + 1)
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// `prefix-1`, `prefix-2`, ... in order.
#[derive(Debug, Clone)]
pub struct SequentialPseudonyms {
    prefix: String,
    next: u64,
}

impl SequentialPseudonyms {
    /// Create a generator with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequentialPseudonyms {
    fn default() -> Self {
        Self::new("contributor")
    }
}

impl PseudonymGenerator for SequentialPseudonyms {
    fn next_pseudonym(&mut self) -> String {
        let name = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_names_unique_past_pool_size() {
        let mut gen = FirstNamePseudonyms::with_seed(7);
        let names: Vec<String> = (0..FIRST_NAMES.len() * 3).map(|_| gen.next_pseudonym()).collect();
        let distinct: BTreeSet<_> = names.iter().collect();
        assert_eq!(distinct.len(), names.len());
        assert!(names[FIRST_NAMES.len()].ends_with(" 2"));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = FirstNamePseudonyms::with_seed(42);
        let mut b = FirstNamePseudonyms::with_seed(42);
        for _ in 0..10 {
            assert_eq!(a.next_pseudonym(), b.next_pseudonym());
        }
    }

    #[test]
    fn test_generators_are_independent() {
        // Two runs each get their own pool; the first name of one run
        // does not block it in the other.
        let mut a = SequentialPseudonyms::default();
        let mut b = SequentialPseudonyms::default();
        assert_eq!(a.next_pseudonym(), "contributor-1");
        assert_eq!(b.next_pseudonym(), "contributor-1");
        assert_eq!(a.next_pseudonym(), "contributor-2");
    }
}
