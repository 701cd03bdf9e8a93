//! Participant name encoders.
//!
//! Every encoder shares one contract: a name goes in, a non-empty list of
//! candidate codes comes out. An empty name always encodes to `[""]`.
//! Double Metaphone is the only encoder that returns more than one
//! candidate; the others return exactly one.
//!
//! [`encode_case`] projects every participant of a case through a set of
//! encodings, producing one [`EncodedParticipant`] per participant per
//! encoding. A failing encoder/field pair leaves that field unset and is
//! reported as an [`EncodingFailure`]; the rest of the projection stands.

pub mod metaphone;
pub mod nysiis;
pub mod soundex;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::EncodeError;
use crate::models::{Case, EncodedParticipant, Participant};

/// Characters removed by the `normalized` encoder.
const PUNCTUATION: &str = "!\"#%'()*+,-./:;<=>?@[\\]^_`{|}~";

/// A registered name encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Exact,
    Normalized,
    Soundex,
    Metaphone,
    Nysiis,
}

impl Encoding {
    /// Every encoding, in display order.
    pub const ALL: [Encoding; 5] = [
        Encoding::Exact,
        Encoding::Normalized,
        Encoding::Soundex,
        Encoding::Metaphone,
        Encoding::Nysiis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Exact => "exact",
            Encoding::Normalized => "normalized",
            Encoding::Soundex => "soundex",
            Encoding::Metaphone => "metaphone",
            Encoding::Nysiis => "nysiis",
        }
    }

    /// Human-readable label used in search output.
    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Exact => "Exact match",
            Encoding::Normalized => "Ignore case",
            Encoding::Soundex => "Soundex",
            Encoding::Metaphone => "Metaphone",
            Encoding::Nysiis => "NYSIIS",
        }
    }

    /// Encode one name.
    pub fn encode(&self, text: &str) -> Result<Vec<String>, EncodeError> {
        if text.is_empty() {
            return Ok(vec![String::new()]);
        }
        match self {
            Encoding::Exact => Ok(vec![text.to_string()]),
            Encoding::Normalized => {
                let normalized: String = text
                    .to_lowercase()
                    .chars()
                    .filter(|c| !PUNCTUATION.contains(*c))
                    .collect();
                if normalized.is_empty() {
                    return Err(EncodeError::NoLetters(text.to_string()));
                }
                Ok(vec![normalized])
            }
            Encoding::Soundex => soundex::encode(text).map(|code| vec![code]),
            Encoding::Metaphone => metaphone::encode(text),
            Encoding::Nysiis => nysiis::encode(text).map(|code| vec![code]),
        }
    }

    /// Encode a search term, dropping empty candidates.
    pub fn encode_term(&self, term: &str) -> Result<Vec<String>, EncodeError> {
        let mut codes = self.encode(term.trim())?;
        codes.retain(|c| !c.is_empty());
        Ok(codes)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Encoding::ALL
            .iter()
            .copied()
            .find(|e| e.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Encoding::ALL.iter().map(|e| e.name()).collect();
                format!("unknown encoding '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// A participant name field that gets encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    First,
    Middle,
    Last,
}

impl NameField {
    pub const ALL: [NameField; 3] = [NameField::First, NameField::Middle, NameField::Last];

    pub fn name(&self) -> &'static str {
        match self {
            NameField::First => "first_name",
            NameField::Middle => "middle_name",
            NameField::Last => "last_name",
        }
    }

    fn value<'a>(&self, participant: &'a Participant) -> &'a str {
        match self {
            NameField::First => &participant.first_name,
            NameField::Middle => &participant.middle_name,
            NameField::Last => &participant.last_name,
        }
    }
}

/// One encoder that failed on one name field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingFailure {
    pub case_id: String,
    pub field: NameField,
    pub encoding: Encoding,
    pub value: String,
    pub error: EncodeError,
}

impl EncodingFailure {
    pub fn message(&self) -> String {
        format!(
            "Error encoding {} to {} for {} \"{}\" ({})",
            self.field.name(),
            self.encoding,
            self.case_id,
            self.value,
            self.error
        )
    }
}

/// Projections for every participant of one case, plus what failed.
#[derive(Debug, Clone, Default)]
pub struct EncodedCase {
    pub participants: Vec<EncodedParticipant>,
    pub failures: Vec<EncodingFailure>,
}

/// Encode every participant of `case` under each of `encodings`.
pub fn encode_case(case: &Case, encodings: &[Encoding]) -> EncodedCase {
    debug!(case = %case.id, "encoding names");
    let mut out = EncodedCase::default();
    for participant in &case.participants {
        for &encoding in encodings {
            let mut projection = EncodedParticipant {
                case_id: case.id.clone(),
                encoding,
                role: participant.role,
                full_name: participant.full_name.clone(),
                date: case.arrest_date,
                first_name: None,
                middle_name: None,
                last_name: None,
            };
            for field in NameField::ALL {
                let value = field.value(participant);
                match encoding.encode(value) {
                    Ok(codes) => {
                        let slot = match field {
                            NameField::First => &mut projection.first_name,
                            NameField::Middle => &mut projection.middle_name,
                            NameField::Last => &mut projection.last_name,
                        };
                        *slot = Some(codes);
                    }
                    Err(err) => {
                        let failure = EncodingFailure {
                            case_id: case.id.clone(),
                            field,
                            encoding,
                            value: value.to_string(),
                            error: err,
                        };
                        error!("{}", failure.message());
                        out.failures.push(failure);
                    }
                }
            }
            out.participants.push(projection);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_empty_input_encodes_to_empty_candidate() {
        for encoding in Encoding::ALL {
            assert_eq!(encoding.encode("").unwrap(), vec![String::new()], "{}", encoding);
        }
    }

    #[test]
    fn test_every_encoder_yields_a_candidate() {
        for name in ["Dougas", "Richard", "Hellmann", "O'Brien", "M.", "H.", "W.", "H", "W"] {
            for encoding in Encoding::ALL {
                let codes = encoding.encode(name).unwrap();
                assert!(!codes.is_empty());
                assert!(codes.iter().all(|c| !c.is_empty()), "{} {}", encoding, name);
            }
        }
    }

    #[test]
    fn test_normalized_strips_punctuation() {
        assert_eq!(Encoding::Normalized.encode("O'Brien-Smith").unwrap(), vec!["obriensmith"]);
        assert_eq!(Encoding::Exact.encode("O'Brien").unwrap(), vec!["O'Brien"]);
    }

    #[test]
    fn test_punctuation_only_fails() {
        assert!(Encoding::Normalized.encode("...").is_err());
        assert!(Encoding::Soundex.encode("...").is_err());
        assert!(Encoding::Exact.encode("...").is_ok());
    }

    #[test]
    fn test_encoding_names_round_trip() {
        for encoding in Encoding::ALL {
            assert_eq!(encoding.name().parse::<Encoding>().unwrap(), encoding);
        }
        assert!("fuzzy".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_encode_case_projects_each_encoding() {
        let mut case = Case::new("1902/6", "172", Some(170));
        case.participants.push(Participant::new(Role::Defendant, "Dougas Richard Hellmann"));
        let encoded = encode_case(&case, &Encoding::ALL);
        assert_eq!(encoded.participants.len(), Encoding::ALL.len());
        assert!(encoded.failures.is_empty());
        let soundex = encoded
            .participants
            .iter()
            .find(|p| p.encoding == Encoding::Soundex)
            .unwrap();
        assert_eq!(soundex.last_name, Some(vec!["H455".to_string()]));
        assert_eq!(soundex.case_id, "1902/6/172");
    }

    #[test]
    fn test_encode_case_isolates_failures() {
        let mut case = Case::new("1902/6", "1", None);
        case.participants.push(Participant::new(Role::Witness, "John ?? Smith"));
        let encoded = encode_case(&case, &[Encoding::Soundex]);
        assert_eq!(encoded.participants.len(), 1);
        assert_eq!(encoded.failures.len(), 1);
        let failure = &encoded.failures[0];
        assert_eq!(failure.field, NameField::Middle);
        assert!(failure
            .message()
            .starts_with("Error encoding middle_name to soundex for 1902/6/1 \"??\""));
        let p = &encoded.participants[0];
        assert!(p.middle_name.is_none());
        assert_eq!(p.last_name, Some(vec!["S530".to_string()]));
    }

    #[test]
    fn test_encode_term_drops_empty() {
        assert!(Encoding::Soundex.encode_term("").unwrap().is_empty());
    }
}
