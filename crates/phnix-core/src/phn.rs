use crate::alphabet::Alphabet;
use crate::authority::PoiCode;
use crate::checksum::LuhnModN;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Default number of random payload symbols in a PHN.
pub const DEFAULT_PAYLOAD_LENGTH: usize = 6;

/// A personal health number.
///
/// The value is stored upper-case. Construction does not check the checksum;
/// use [`PhnScheme::validate`] for values that come from outside.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Phn(String);

impl Phn {
    /// Wraps a value without checking it against any scheme.
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Phn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A freshly generated identifier that has not reached the ledger yet.
///
/// An invalid candidate is an expected outcome of random generation and is
/// simply discarded by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    value: String,
    valid: bool,
}

impl Candidate {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Promotes a valid candidate into a [`Phn`]; `None` for invalid ones.
    pub fn into_phn(self) -> Option<Phn> {
        self.valid.then(|| Phn::new_unchecked(self.value))
    }
}

/// The layout of a PHN: `{poi}{payload}{check}`.
///
/// The check character is computed with Luhn mod-N over the checksum alphabet
/// and must itself be one of the permitted payload symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhnScheme {
    checksum: LuhnModN,
    permitted: Alphabet,
    payload_length: usize,
}

impl PhnScheme {
    pub fn new(
        checksum_alphabet: Alphabet,
        permitted: Alphabet,
        payload_length: usize,
    ) -> Result<Self> {
        if payload_length == 0 {
            return Err(CoreError::InvalidScheme(
                "payload length must be positive".to_string(),
            ));
        }

        if !permitted.is_subset_of(&checksum_alphabet) {
            return Err(CoreError::InvalidScheme(format!(
                "payload alphabet {} is not contained in checksum alphabet {}",
                permitted, checksum_alphabet
            )));
        }

        Ok(Self {
            checksum: LuhnModN::new(checksum_alphabet),
            permitted,
            payload_length,
        })
    }

    pub fn checksum(&self) -> &LuhnModN {
        &self.checksum
    }

    /// Symbols the payload and check character are drawn from.
    pub fn permitted(&self) -> &Alphabet {
        &self.permitted
    }

    pub fn payload_length(&self) -> usize {
        self.payload_length
    }

    /// Total length of identifiers issued under `poi`.
    pub fn identifier_length(&self, poi: &PoiCode) -> usize {
        poi.as_str().len() + self.payload_length + 1
    }

    /// Checks that every symbol of `poi` can be folded into the checksum.
    pub fn check_prefix(&self, poi: &PoiCode) -> Result<()> {
        for (position, character) in poi.as_str().chars().enumerate() {
            if !self.checksum.alphabet().contains(character) {
                return Err(CoreError::InvalidCharacter {
                    character,
                    position,
                });
            }
        }
        Ok(())
    }

    /// Appends the check character to `poi + payload` and re-validates the
    /// result.
    ///
    /// The candidate is valid only if the full string passes the checksum
    /// and the check character is a permitted symbol.
    pub fn seal(&self, poi: &PoiCode, payload: &str) -> Result<Candidate> {
        let body = format!("{}{}", poi, payload.to_ascii_uppercase());
        let check = self.checksum.compute_checksum(&body)?;
        let value = format!("{}{}", body, check);
        let valid = self.checksum.validate(&value) && self.permitted.contains(check);
        Ok(Candidate { value, valid })
    }

    /// Validates an identifier issued under this scheme.
    pub fn validate(&self, value: &str) -> bool {
        value
            .chars()
            .last()
            .is_some_and(|check| self.permitted.contains(check))
            && self.checksum.validate(value)
    }
}

impl Default for PhnScheme {
    fn default() -> Self {
        Self {
            checksum: LuhnModN::new(Alphabet::checksum_default()),
            permitted: Alphabet::payload_default(),
            payload_length: DEFAULT_PAYLOAD_LENGTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi() -> PoiCode {
        PoiCode::new("3053").unwrap()
    }

    #[test]
    fn sealed_candidate_has_expected_layout() {
        let scheme = PhnScheme::default();
        let candidate = scheme.seal(&poi(), "BCDFGH").unwrap();

        assert_eq!(candidate.value().len(), 11);
        assert_eq!(scheme.identifier_length(&poi()), 11);
        assert!(candidate.value().starts_with("3053BCDFGH"));

        let (body, check) = candidate.value().split_at(10);
        let expected = scheme.checksum().compute_checksum(body).unwrap();
        assert_eq!(check.chars().next(), Some(expected));
    }

    #[test]
    fn check_character_outside_permitted_set_invalidates() {
        let scheme = PhnScheme::default();
        let symbols = scheme.permitted().symbols().to_vec();
        let mut seen_invalid = false;
        let mut seen_valid = false;

        for a in &symbols {
            for b in &symbols {
                let candidate = scheme.seal(&poi(), &format!("{a}{b}2222")).unwrap();
                let check = candidate.value().chars().last().unwrap();
                assert_eq!(candidate.is_valid(), scheme.permitted().contains(check));
                seen_invalid |= !candidate.is_valid();
                seen_valid |= candidate.is_valid();
            }
        }

        // '0' and '5' are checksum symbols but not permitted ones
        assert!(seen_invalid);
        assert!(seen_valid);
    }

    #[test]
    fn into_phn_only_for_valid_candidates() {
        let valid = Candidate {
            value: "3053BCDFGHX".to_string(),
            valid: true,
        };
        let invalid = Candidate {
            value: "3053BCDFGH0".to_string(),
            valid: false,
        };
        assert_eq!(valid.into_phn(), Some(Phn::new_unchecked("3053BCDFGHX")));
        assert_eq!(invalid.into_phn(), None);
    }

    #[test]
    fn validate_requires_permitted_check_character() {
        let scheme = PhnScheme::default();
        let symbols = scheme.permitted().symbols().to_vec();

        for a in &symbols {
            let candidate = scheme.seal(&poi(), &format!("{a}KM7XQ")).unwrap();
            assert_eq!(scheme.validate(candidate.value()), candidate.is_valid());
        }
        assert!(!scheme.validate(""));
    }

    #[test]
    fn rejects_payload_alphabet_not_in_checksum_alphabet() {
        let err = PhnScheme::new(
            Alphabet::new("0123456789").unwrap(),
            Alphabet::new("ABC").unwrap(),
            6,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidScheme(_)));
    }

    #[test]
    fn rejects_empty_payload() {
        let scheme = PhnScheme::new(Alphabet::checksum_default(), Alphabet::payload_default(), 0);
        assert!(scheme.is_err());
    }

    #[test]
    fn prefix_must_fit_checksum_alphabet() {
        let scheme = PhnScheme::default();
        assert!(scheme.check_prefix(&poi()).is_ok());
        assert_eq!(
            scheme.check_prefix(&PoiCode::new("30A3").unwrap()),
            Err(CoreError::InvalidCharacter {
                character: 'A',
                position: 2
            })
        );
    }

    #[test]
    fn phn_is_upper_cased() {
        assert_eq!(Phn::new_unchecked("3053bcdfghx").as_str(), "3053BCDFGHX");
    }
}
