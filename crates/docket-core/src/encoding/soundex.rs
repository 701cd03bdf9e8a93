//! American Soundex, four characters.

use crate::error::EncodeError;

const CODE_LEN: usize = 4;

fn digit(c: char) -> Option<char> {
    match c {
        'B' | 'F' | 'P' | 'V' => Some('1'),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
        'D' | 'T' => Some('3'),
        'L' => Some('4'),
        'M' | 'N' => Some('5'),
        'R' => Some('6'),
        _ => None,
    }
}

/// Encode `text` as a letter followed by three digits, e.g. `Robert` → `R163`.
///
/// Vowels separate repeated codes; `H` and `W` do not.
pub fn encode(text: &str) -> Result<String, EncodeError> {
    let letters: Vec<char> = text
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let Some((&first, rest)) = letters.split_first() else {
        return Err(EncodeError::NoLetters(text.to_string()));
    };

    let mut code = String::with_capacity(CODE_LEN);
    code.push(first);
    let mut last = digit(first);
    for &c in rest {
        if code.len() == CODE_LEN {
            break;
        }
        match c {
            'H' | 'W' => continue,
            'A' | 'E' | 'I' | 'O' | 'U' | 'Y' => last = None,
            _ => {
                let d = digit(c);
                if d.is_some() && d != last {
                    code.extend(d);
                }
                last = d;
            }
        }
    }
    while code.len() < CODE_LEN {
        code.push('0');
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_codes() {
        assert_eq!(encode("Robert").unwrap(), "R163");
        assert_eq!(encode("Rupert").unwrap(), "R163");
        assert_eq!(encode("Ashcraft").unwrap(), "A261");
        assert_eq!(encode("Tymczak").unwrap(), "T522");
        assert_eq!(encode("Pfister").unwrap(), "P236");
        assert_eq!(encode("Lee").unwrap(), "L000");
    }

    #[test]
    fn test_ignores_punctuation_and_case() {
        assert_eq!(encode("o'brien").unwrap(), encode("OBrien").unwrap());
        assert_eq!(encode("M.").unwrap(), "M000");
    }

    #[test]
    fn test_no_letters() {
        assert!(encode("...").is_err());
    }
}
