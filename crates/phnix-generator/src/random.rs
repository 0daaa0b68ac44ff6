use crate::source::{RandSource, ThreadRandom};
use crate::Generator;
use phnix_core::{Candidate, CoreError, PhnScheme, PoiCode};

/// Generates PHN candidates with a uniformly random payload.
///
/// Every payload symbol is drawn independently from the scheme's permitted
/// alphabet, then the check character is appended and the whole candidate is
/// re-validated by [`PhnScheme::seal`].
#[derive(Debug)]
pub struct RandomPhnGenerator<R = ThreadRandom> {
    scheme: PhnScheme,
    source: R,
}

impl RandomPhnGenerator<ThreadRandom> {
    /// Creates a generator backed by the entropy-seeded thread RNG.
    pub fn new(scheme: PhnScheme) -> Self {
        Self::with_source(scheme, ThreadRandom)
    }
}

impl<R: RandSource> RandomPhnGenerator<R> {
    pub fn with_source(scheme: PhnScheme, source: R) -> Self {
        Self { scheme, source }
    }

    pub fn scheme(&self) -> &PhnScheme {
        &self.scheme
    }

    fn payload(&self) -> String {
        let symbols = self.scheme.permitted().symbols();
        (0..self.scheme.payload_length())
            .map(|_| symbols[self.source.index(symbols.len())])
            .collect()
    }
}

impl<R: RandSource> Generator for RandomPhnGenerator<R> {
    fn generate(&self, poi: &PoiCode) -> Result<Candidate, CoreError> {
        self.scheme.seal(poi, &self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SeededRandom;
    use phnix_core::Alphabet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed list of indices, wrapping around.
    struct Scripted {
        indices: Vec<usize>,
        cursor: AtomicUsize,
    }

    impl Scripted {
        fn new(indices: Vec<usize>) -> Self {
            Self {
                indices,
                cursor: AtomicUsize::new(0),
            }
        }
    }

    impl RandSource for Scripted {
        fn index(&self, upper: usize) -> usize {
            let at = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.indices[at % self.indices.len()] % upper
        }
    }

    fn poi() -> PoiCode {
        PoiCode::new("3053").unwrap()
    }

    #[test]
    fn candidate_layout_matches_scheme() {
        let generator = RandomPhnGenerator::with_source(PhnScheme::default(), SeededRandom::new(1));

        for _ in 0..200 {
            let candidate = generator.generate(&poi()).unwrap();
            let value = candidate.value();

            assert_eq!(value.len(), 11);
            assert!(value.starts_with("3053"));
            assert!(value[4..10]
                .chars()
                .all(|c| generator.scheme().permitted().contains(c)));

            let expected = generator
                .scheme()
                .checksum()
                .compute_checksum(&value[..10])
                .unwrap();
            assert_eq!(value.chars().nth(10), Some(expected));
        }
    }

    #[test]
    fn valid_candidates_always_validate() {
        let generator = RandomPhnGenerator::new(PhnScheme::default());
        let mut valid = 0;

        for _ in 0..500 {
            let candidate = generator.generate(&poi()).unwrap();
            if candidate.is_valid() {
                valid += 1;
                assert!(generator.scheme().validate(candidate.value()));
            }
        }

        // 24 of 26 check symbols are permitted
        assert!(valid > 300, "only {valid} of 500 candidates were valid");
    }

    #[test]
    fn scripted_source_selects_payload_symbols() {
        // indices into "2346789BCDFGHJKMPQRTVWXY"
        let source = Scripted::new(vec![7, 8, 9, 10, 11, 12]);
        let generator = RandomPhnGenerator::with_source(PhnScheme::default(), source);

        let candidate = generator.generate(&poi()).unwrap();
        assert!(candidate.value().starts_with("3053BCDFGH"));
    }

    #[test]
    fn same_seed_same_candidates() {
        let a = RandomPhnGenerator::with_source(PhnScheme::default(), SeededRandom::new(42));
        let b = RandomPhnGenerator::with_source(PhnScheme::default(), SeededRandom::new(42));

        for _ in 0..20 {
            assert_eq!(a.generate(&poi()).unwrap(), b.generate(&poi()).unwrap());
        }
    }

    #[test]
    fn custom_payload_length() {
        let scheme = PhnScheme::new(Alphabet::checksum_default(), Alphabet::payload_default(), 8)
            .unwrap();
        let generator = RandomPhnGenerator::with_source(scheme, SeededRandom::new(3));
        assert_eq!(generator.generate(&poi()).unwrap().value().len(), 13);
    }

    #[test]
    fn prefix_outside_checksum_alphabet_is_an_error() {
        let generator = RandomPhnGenerator::new(PhnScheme::default());
        let poi = PoiCode::new("AAAA").unwrap();
        assert!(matches!(
            generator.generate(&poi),
            Err(CoreError::InvalidCharacter { .. })
        ));
    }
}
