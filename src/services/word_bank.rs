use indexmap::IndexMap;
use rand::{
    Rng, rng,
    seq::{IndexedRandom, SliceRandom},
};

use crate::state::state_machine::{OPTION_COUNT, RoundWord};

/// Number of wrong options offered next to the word.
pub const DISTRACTOR_COUNT: usize = OPTION_COUNT - 1;

/// Supplier of words and multiple-choice options.
///
/// Every operation has a `*_with` variant taking the random source, so the
/// selection is reproducible under a seeded generator.
#[derive(Debug, Clone)]
pub struct WordBank {
    categories: IndexMap<String, Vec<String>>,
}

impl WordBank {
    /// Build a bank from validated categories.
    pub fn new(categories: IndexMap<String, Vec<String>>) -> Self {
        Self { categories }
    }

    /// Pick a uniformly random category, then a uniformly random word in it.
    pub fn pick_word_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(String, String)> {
        if self.categories.is_empty() {
            return None;
        }
        let (category, words) = self
            .categories
            .get_index(rng.random_range(0..self.categories.len()))?;
        let word = words.choose(rng)?;
        Some((category.clone(), word.clone()))
    }

    /// Sample `k` distinct words of `category` other than `word`.
    ///
    /// Draws uniformly with replacement and keeps unseen words; `k` is capped
    /// by what the category can provide so the loop always ends.
    pub fn distractors_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        word: &str,
        category: &str,
        k: usize,
    ) -> Vec<String> {
        let Some(words) = self.categories.get(category) else {
            return Vec::new();
        };
        let mut candidates: Vec<&String> = words.iter().filter(|w| *w != word).collect();
        candidates.sort();
        candidates.dedup();
        let wanted = k.min(candidates.len());

        let mut picked: Vec<String> = Vec::with_capacity(wanted);
        while picked.len() < wanted {
            let Some(candidate) = words.choose(rng) else {
                break;
            };
            if candidate != word && !picked.contains(candidate) {
                picked.push(candidate.clone());
            }
        }
        picked
    }

    /// `word` plus `distractors` in uniformly random order.
    pub fn shuffled_options_with<R: Rng + ?Sized>(
        rng: &mut R,
        word: &str,
        distractors: &[String],
    ) -> Vec<String> {
        let mut options = Vec::with_capacity(distractors.len() + 1);
        options.push(word.to_string());
        options.extend(distractors.iter().filter(|d| *d != word).cloned());
        options.shuffle(rng);
        options
    }

    /// Word, category and options for a new round.
    pub fn next_round_word_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<RoundWord> {
        let (category, word) = self.pick_word_with(rng)?;
        let distractors = self.distractors_with(rng, &word, &category, DISTRACTOR_COUNT);
        let options = Self::shuffled_options_with(rng, &word, &distractors);
        Some(RoundWord {
            category,
            word,
            options,
        })
    }

    /// [`Self::next_round_word_with`] using the thread-local generator.
    pub fn next_round_word(&self) -> Option<RoundWord> {
        self.next_round_word_with(&mut rng())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::config::AppConfig;

    fn bank() -> WordBank {
        WordBank::new(AppConfig::default().categories().clone())
    }

    #[test]
    fn distractors_are_distinct_members_of_the_category() {
        let bank = bank();
        let fruit = AppConfig::default().categories()["fruit"].clone();
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = bank.distractors_with(&mut rng, "apple", "fruit", 3);

            assert_eq!(picked.len(), 3);
            assert!(picked.iter().all(|w| fruit.contains(w)));
            assert!(!picked.iter().any(|w| w == "apple"));
            let mut unique = picked.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn options_hold_the_word_exactly_once() {
        let bank = bank();
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let round = bank.next_round_word_with(&mut rng).unwrap();

            assert_eq!(round.options.len(), OPTION_COUNT);
            assert_eq!(
                round.options.iter().filter(|o| **o == round.word).count(),
                1
            );
            assert!(
                AppConfig::default().categories()[round.category.as_str()].contains(&round.word)
            );
        }
    }

    #[test]
    fn word_position_varies() {
        let distractors = vec!["b".to_string(), "c".to_string(), "d".to_string()];
        let positions: std::collections::HashSet<_> = (0..64)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                WordBank::shuffled_options_with(&mut rng, "a", &distractors)
                    .iter()
                    .position(|o| o == "a")
                    .unwrap()
            })
            .collect();
        assert!(positions.len() > 1);
    }

    #[test]
    fn small_category_caps_the_distractor_count() {
        let mut categories = IndexMap::new();
        categories.insert("pair".to_string(), vec!["x".to_string(), "y".to_string()]);
        let bank = WordBank::new(categories);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(bank.distractors_with(&mut rng, "x", "pair", 3), vec!["y"]);
        assert!(bank.distractors_with(&mut rng, "x", "missing", 3).is_empty());
    }

    #[test]
    fn empty_bank_yields_nothing() {
        let bank = WordBank::new(IndexMap::new());
        assert!(bank.next_round_word().is_none());
    }
}
