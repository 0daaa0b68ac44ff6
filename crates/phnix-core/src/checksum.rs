use crate::alphabet::Alphabet;
use crate::error::{CoreError, Result};

/// Luhn mod-N check character over an arbitrary [`Alphabet`].
///
/// Each symbol is replaced by its position in the alphabet. Walking from the
/// right, every second value (starting with the rightmost payload symbol) is
/// doubled, and each addend is folded back into `[0, N)` as
/// `addend / N + addend % N`. The check value brings the total to a multiple
/// of `N`.
///
/// With the alphabet `0123456789` this is the classic mod-10 Luhn digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuhnModN {
    alphabet: Alphabet,
}

impl LuhnModN {
    pub fn new(alphabet: Alphabet) -> Self {
        Self { alphabet }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Computes the check character for `payload`.
    ///
    /// Fails if `payload` contains a symbol outside the alphabet.
    pub fn compute_checksum(&self, payload: &str) -> Result<char> {
        let n = self.alphabet.len();
        let sum = self.weighted_sum(payload, 2)?;
        let check = (n - sum % n) % n;
        Ok(self.alphabet.symbols()[check])
    }

    /// Whether the trailing character of `full` is the check character of the
    /// rest of the string.
    ///
    /// Strings containing symbols outside the alphabet are invalid.
    pub fn validate(&self, full: &str) -> bool {
        if full.is_empty() {
            return false;
        }

        match self.weighted_sum(full, 1) {
            Ok(sum) => sum % self.alphabet.len() == 0,
            Err(_) => false,
        }
    }

    fn weighted_sum(&self, input: &str, first_factor: usize) -> Result<usize> {
        let n = self.alphabet.len();
        let len = input.chars().count();
        let mut factor = first_factor;
        let mut sum = 0;

        for (offset, character) in input.chars().rev().enumerate() {
            let value = self
                .alphabet
                .index_of(character)
                .ok_or(CoreError::InvalidCharacter {
                    character,
                    position: len - 1 - offset,
                })?;

            let addend = factor * value;
            sum += addend / n + addend % n;
            factor = if factor == 2 { 1 } else { 2 };
        }

        Ok(sum)
    }
}
