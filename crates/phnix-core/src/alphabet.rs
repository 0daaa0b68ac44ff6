use crate::error::CoreError;
use std::fmt::Display;
use std::str::FromStr;

/// Symbols the Luhn mod-N checksum is computed over.
///
/// Includes `0`, `3` and `5` so that numeric POI codes such as `3053` can be
/// folded into the checksum.
pub const DEFAULT_CHECKSUM_ALPHABET: &str = "234567890BCDFGHJKMPQRTVWXY";

/// Symbols a PHN payload and its check character may use.
///
/// Visually ambiguous characters (`0`, `1`, `5`, vowels, ...) are left out.
pub const DEFAULT_PAYLOAD_ALPHABET: &str = "2346789BCDFGHJKMPQRTVWXY";

const MIN_SYMBOLS: usize = 2;

/// An ordered, case-insensitive set of ASCII alphanumeric symbols.
///
/// The position of a symbol is its numeric value in checksum arithmetic.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Alphabet {
    symbols: Box<[char]>,
}

impl Alphabet {
    /// Creates an alphabet after validating the input.
    ///
    /// Symbols are upper-cased. Valid alphabets contain at least two distinct
    /// ASCII alphanumeric symbols.
    pub fn new(symbols: &str) -> Result<Self, CoreError> {
        let symbols: Vec<char> = symbols.chars().map(|c| c.to_ascii_uppercase()).collect();

        if symbols.len() < MIN_SYMBOLS {
            return Err(CoreError::InvalidAlphabet(format!(
                "at least {} symbols are required, got {}",
                MIN_SYMBOLS,
                symbols.len()
            )));
        }

        if let Some(bad) = symbols.iter().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidAlphabet(format!(
                "symbols must be ascii alphanumeric: '{}'",
                bad
            )));
        }

        for (i, c) in symbols.iter().enumerate() {
            if symbols[..i].contains(c) {
                return Err(CoreError::InvalidAlphabet(format!(
                    "duplicate symbol '{}'",
                    c
                )));
            }
        }

        Ok(Self {
            symbols: symbols.into_boxed_slice(),
        })
    }

    /// The alphabet the checksum is computed over by default.
    pub fn checksum_default() -> Self {
        Self::new(DEFAULT_CHECKSUM_ALPHABET).expect("default checksum alphabet is valid")
    }

    /// The alphabet payload and check characters are drawn from by default.
    pub fn payload_default() -> Self {
        Self::new(DEFAULT_PAYLOAD_ALPHABET).expect("default payload alphabet is valid")
    }

    /// Number of symbols, the `N` of Luhn mod-N.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns the value of `c`, ignoring case.
    pub fn index_of(&self, c: char) -> Option<usize> {
        let c = c.to_ascii_uppercase();
        self.symbols.iter().position(|&s| s == c)
    }

    /// Returns the symbol with value `index`.
    pub fn symbol(&self, index: usize) -> Option<char> {
        self.symbols.get(index).copied()
    }

    pub fn contains(&self, c: char) -> bool {
        self.index_of(c).is_some()
    }

    /// Whether every symbol of `self` also appears in `other`.
    pub fn is_subset_of(&self, other: &Alphabet) -> bool {
        self.symbols.iter().all(|&c| other.contains(c))
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }
}

impl FromStr for Alphabet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.symbols.iter().try_for_each(|c| write!(f, "{}", c))
    }
}

impl std::fmt::Debug for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Alphabet").field(&self.to_string()).finish()
    }
}
