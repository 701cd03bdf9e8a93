//! Double Metaphone.
//!
//! Produces a primary code and, for names with more than one plausible
//! pronunciation, an alternate code. Both are at most four characters.
//! `0` stands for the "th" sound and `X` for "sh"/"ch".

use crate::error::EncodeError;

const MAX_CODE_LEN: usize = 4;

const L_R_N_M_B_H_F_V_W_SPACE: &[&str] = &["L", "R", "N", "M", "B", "H", "F", "V", "W", " "];
const ES_EP_EB_EL_EY_IB_IL_IN_IE_EI_ER: &[&str] =
    &["ES", "EP", "EB", "EL", "EY", "IB", "IL", "IN", "IE", "EI", "ER"];
const L_T_K_S_N_M_B_Z: &[&str] = &["L", "T", "K", "S", "N", "M", "B", "Z"];

/// Encode `text`, returning the primary code and the alternate when it differs.
///
/// Letters that are silent on their own (an initial such as `H.` or `W`)
/// encode as the upper-cased first letter.
pub fn encode(text: &str) -> Result<Vec<String>, EncodeError> {
    let Some(first) = text.chars().find(char::is_ascii_alphabetic) else {
        return Err(EncodeError::NoLetters(text.to_string()));
    };
    let (primary, alternate) = double_metaphone(text);
    if primary.is_empty() {
        return Ok(vec![first.to_ascii_uppercase().to_string()]);
    }
    if alternate.is_empty() || alternate == primary {
        Ok(vec![primary])
    } else {
        Ok(vec![primary, alternate])
    }
}

/// Compute `(primary, alternate)` codes for `text`.
pub fn double_metaphone(text: &str) -> (String, String) {
    let chars: Vec<char> = text.trim().to_uppercase().chars().collect();
    let mut dm = DoubleMetaphone::new(chars);
    dm.run();
    (dm.primary, dm.alternate)
}

struct DoubleMetaphone {
    w: Vec<char>,
    primary: String,
    alternate: String,
    slavo_germanic: bool,
}

impl DoubleMetaphone {
    fn new(w: Vec<char>) -> Self {
        let mut dm = Self {
            w,
            primary: String::new(),
            alternate: String::new(),
            slavo_germanic: false,
        };
        dm.slavo_germanic = dm.w.contains(&'W')
            || dm.w.contains(&'K')
            || dm.contains_anywhere("CZ")
            || dm.contains_anywhere("WITZ");
        dm
    }

    fn len(&self) -> isize {
        self.w.len() as isize
    }

    fn at(&self, i: isize) -> char {
        if i < 0 || i >= self.len() {
            '\0'
        } else {
            self.w[i as usize]
        }
    }

    fn is_vowel_at(&self, i: isize) -> bool {
        matches!(self.at(i), 'A' | 'E' | 'I' | 'O' | 'U' | 'Y')
    }

    /// Whether the `len` characters starting at `start` equal one of `options`.
    fn has(&self, start: isize, len: usize, options: &[&str]) -> bool {
        if start < 0 || start as usize + len > self.w.len() {
            return false;
        }
        let start = start as usize;
        let slice: String = self.w[start..start + len].iter().collect();
        options.iter().any(|o| *o == slice)
    }

    fn contains_anywhere(&self, needle: &str) -> bool {
        let needle: Vec<char> = needle.chars().collect();
        self.w.windows(needle.len()).any(|w| w == needle.as_slice())
    }

    fn push_primary(&mut self, s: &str) {
        let room = MAX_CODE_LEN.saturating_sub(self.primary.len());
        self.primary.extend(s.chars().take(room));
    }

    fn push_alternate(&mut self, s: &str) {
        let room = MAX_CODE_LEN.saturating_sub(self.alternate.len());
        self.alternate.extend(s.chars().take(room));
    }

    fn add(&mut self, both: &str) {
        self.push_primary(both);
        self.push_alternate(both);
    }

    fn add2(&mut self, primary: &str, alternate: &str) {
        self.push_primary(primary);
        self.push_alternate(alternate);
    }

    fn complete(&self) -> bool {
        self.primary.len() >= MAX_CODE_LEN && self.alternate.len() >= MAX_CODE_LEN
    }

    fn run(&mut self) {
        let silent_start = self.has(0, 2, &["GN", "KN", "PN", "WR", "PS"]);
        let mut i: isize = if silent_start { 1 } else { 0 };
        while !self.complete() && i < self.len() {
            i = match self.at(i) {
                'A' | 'E' | 'I' | 'O' | 'U' | 'Y' => {
                    if i == 0 {
                        self.add("A");
                    }
                    i + 1
                }
                'B' => {
                    self.add("P");
                    if self.at(i + 1) == 'B' { i + 2 } else { i + 1 }
                }
                'Ç' => {
                    self.add("S");
                    i + 1
                }
                'C' => self.handle_c(i),
                'D' => self.handle_d(i),
                'F' => {
                    self.add("F");
                    if self.at(i + 1) == 'F' { i + 2 } else { i + 1 }
                }
                'G' => self.handle_g(i),
                'H' => self.handle_h(i),
                'J' => self.handle_j(i),
                'K' => {
                    self.add("K");
                    if self.at(i + 1) == 'K' { i + 2 } else { i + 1 }
                }
                'L' => self.handle_l(i),
                'M' => {
                    self.add("M");
                    if self.condition_m0(i) { i + 2 } else { i + 1 }
                }
                'N' => {
                    self.add("N");
                    if self.at(i + 1) == 'N' { i + 2 } else { i + 1 }
                }
                'Ñ' => {
                    self.add("N");
                    i + 1
                }
                'P' => self.handle_p(i),
                'Q' => {
                    self.add("K");
                    if self.at(i + 1) == 'Q' { i + 2 } else { i + 1 }
                }
                'R' => self.handle_r(i),
                'S' => self.handle_s(i),
                'T' => self.handle_t(i),
                'V' => {
                    self.add("F");
                    if self.at(i + 1) == 'V' { i + 2 } else { i + 1 }
                }
                'W' => self.handle_w(i),
                'X' => self.handle_x(i),
                'Z' => self.handle_z(i),
                _ => i + 1,
            };
        }
    }

    fn handle_c(&mut self, i: isize) -> isize {
        if self.condition_c0(i) {
            self.add("K");
            i + 2
        } else if i == 0 && self.has(i, 6, &["CAESAR"]) {
            self.add("S");
            i + 2
        } else if self.has(i, 2, &["CH"]) {
            self.handle_ch(i)
        } else if self.has(i, 2, &["CZ"]) && !self.has(i - 2, 4, &["WICZ"]) {
            self.add2("S", "X");
            i + 2
        } else if self.has(i + 1, 3, &["CIA"]) {
            self.add("X");
            i + 3
        } else if self.has(i, 2, &["CC"]) && !(i == 1 && self.at(0) == 'M') {
            self.handle_cc(i)
        } else if self.has(i, 2, &["CK", "CG", "CQ"]) {
            self.add("K");
            i + 2
        } else if self.has(i, 2, &["CI", "CE", "CY"]) {
            if self.has(i, 3, &["CIO", "CIE", "CIA"]) {
                self.add2("S", "X");
            } else {
                self.add("S");
            }
            i + 2
        } else {
            self.add("K");
            if self.has(i + 1, 2, &[" C", " Q", " G"]) {
                i + 3
            } else if self.has(i + 1, 1, &["C", "K", "Q"]) && !self.has(i + 1, 2, &["CE", "CI"]) {
                i + 2
            } else {
                i + 1
            }
        }
    }

    fn condition_c0(&self, i: isize) -> bool {
        if self.has(i, 4, &["CHIA"]) {
            true
        } else if i <= 1 || self.is_vowel_at(i - 2) || !self.has(i - 1, 3, &["ACH"]) {
            false
        } else {
            let c = self.at(i + 2);
            (c != 'I' && c != 'E') || self.has(i - 2, 6, &["BACHER", "MACHER"])
        }
    }

    fn handle_cc(&mut self, i: isize) -> isize {
        if self.has(i + 2, 1, &["I", "E", "H"]) && !self.has(i + 2, 2, &["HU"]) {
            if (i == 1 && self.at(i - 1) == 'A') || self.has(i - 1, 5, &["UCCEE", "UCCES"]) {
                self.add("KS");
            } else {
                self.add("X");
            }
            i + 3
        } else {
            self.add("K");
            i + 2
        }
    }

    fn handle_ch(&mut self, i: isize) -> isize {
        if i > 0 && self.has(i, 4, &["CHAE"]) {
            self.add2("K", "X");
        } else if self.condition_ch0(i) || self.condition_ch1(i) {
            self.add("K");
        } else if i > 0 {
            if self.has(0, 2, &["MC"]) {
                self.add("K");
            } else {
                self.add2("X", "K");
            }
        } else {
            self.add("X");
        }
        i + 2
    }

    fn condition_ch0(&self, i: isize) -> bool {
        i == 0
            && (self.has(i + 1, 5, &["HARAC", "HARIS"])
                || self.has(i + 1, 3, &["HOR", "HYM", "HIA", "HEM"]))
            && !self.has(0, 5, &["CHORE"])
    }

    fn condition_ch1(&self, i: isize) -> bool {
        self.has(0, 4, &["VAN ", "VON "])
            || self.has(0, 3, &["SCH"])
            || self.has(i - 2, 6, &["ORCHES", "ARCHIT", "ORCHID"])
            || self.has(i + 2, 1, &["T", "S"])
            || ((self.has(i - 1, 1, &["A", "O", "U", "E"]) || i == 0)
                && (self.has(i + 2, 1, L_R_N_M_B_H_F_V_W_SPACE) || i + 1 == self.len() - 1))
    }

    fn handle_d(&mut self, i: isize) -> isize {
        if self.has(i, 2, &["DG"]) {
            if self.has(i + 2, 1, &["I", "E", "Y"]) {
                self.add("J");
                i + 3
            } else {
                self.add("TK");
                i + 2
            }
        } else if self.has(i, 2, &["DT", "DD"]) {
            self.add("T");
            i + 2
        } else {
            self.add("T");
            i + 1
        }
    }

    fn handle_g(&mut self, i: isize) -> isize {
        let next = self.at(i + 1);
        if next == 'H' {
            self.handle_gh(i)
        } else if next == 'N' {
            if i == 1 && self.is_vowel_at(0) && !self.slavo_germanic {
                self.add2("KN", "N");
            } else if !self.has(i + 2, 2, &["EY"]) && !self.slavo_germanic {
                self.add2("N", "KN");
            } else {
                self.add("KN");
            }
            i + 2
        } else if self.has(i + 1, 2, &["LI"]) && !self.slavo_germanic {
            self.add2("KL", "L");
            i + 2
        } else if i == 0 && (next == 'Y' || self.has(i + 1, 2, ES_EP_EB_EL_EY_IB_IL_IN_IE_EI_ER)) {
            self.add2("K", "J");
            i + 2
        } else if (self.has(i + 1, 2, &["ER"]) || next == 'Y')
            && !self.has(0, 6, &["DANGER", "RANGER", "MANGER"])
            && !self.has(i - 1, 1, &["E", "I"])
            && !self.has(i - 1, 3, &["RGY", "OGY"])
        {
            self.add2("K", "J");
            i + 2
        } else if self.has(i + 1, 1, &["E", "I", "Y"]) || self.has(i - 1, 4, &["AGGI", "OGGI"]) {
            if self.has(0, 4, &["VAN ", "VON "]) || self.has(0, 3, &["SCH"]) || self.has(i + 1, 2, &["ET"]) {
                self.add("K");
            } else if self.has(i + 1, 3, &["IER"]) {
                self.add("J");
            } else {
                self.add2("J", "K");
            }
            i + 2
        } else if next == 'G' {
            self.add("K");
            i + 2
        } else {
            self.add("K");
            i + 1
        }
    }

    fn handle_gh(&mut self, i: isize) -> isize {
        if i > 0 && !self.is_vowel_at(i - 1) {
            self.add("K");
        } else if i == 0 {
            if self.at(i + 2) == 'I' {
                self.add("J");
            } else {
                self.add("K");
            }
        } else if (i > 1 && self.has(i - 2, 1, &["B", "H", "D"]))
            || (i > 2 && self.has(i - 3, 1, &["B", "H", "D"]))
            || (i > 3 && self.has(i - 4, 1, &["B", "H"]))
        {
            // silent, as in "bough"
        } else if i > 2 && self.at(i - 1) == 'U' && self.has(i - 3, 1, &["C", "G", "L", "R", "T"]) {
            self.add("F");
        } else if i > 0 && self.at(i - 1) != 'I' {
            self.add("K");
        }
        i + 2
    }

    fn handle_h(&mut self, i: isize) -> isize {
        if (i == 0 || self.is_vowel_at(i - 1)) && self.is_vowel_at(i + 1) {
            self.add("H");
            i + 2
        } else {
            i + 1
        }
    }

    fn handle_j(&mut self, i: isize) -> isize {
        if self.has(i, 4, &["JOSE"]) || self.has(0, 4, &["SAN "]) {
            if (i == 0 && self.at(i + 4) == ' ') || self.len() == 4 || self.has(0, 4, &["SAN "]) {
                self.add("H");
            } else {
                self.add2("J", "H");
            }
            return i + 1;
        }
        if i == 0 && !self.has(i, 4, &["JOSE"]) {
            self.add2("J", "A");
        } else if self.is_vowel_at(i - 1)
            && !self.slavo_germanic
            && matches!(self.at(i + 1), 'A' | 'O')
        {
            self.add2("J", "H");
        } else if i == self.len() - 1 {
            self.push_primary("J");
        } else if !self.has(i + 1, 1, L_T_K_S_N_M_B_Z) && !self.has(i - 1, 1, &["S", "K", "L"]) {
            self.add("J");
        }
        if self.at(i + 1) == 'J' {
            i + 2
        } else {
            i + 1
        }
    }

    fn handle_l(&mut self, i: isize) -> isize {
        if self.at(i + 1) == 'L' {
            if self.condition_l0(i) {
                self.push_primary("L");
            } else {
                self.add("L");
            }
            i + 2
        } else {
            self.add("L");
            i + 1
        }
    }

    fn condition_l0(&self, i: isize) -> bool {
        let n = self.len();
        if i == n - 3 && self.has(i - 1, 4, &["ILLO", "ILLA", "ALLE"]) {
            true
        } else {
            (self.has(n - 2, 2, &["AS", "OS"]) || self.has(n - 1, 1, &["A", "O"]))
                && self.has(i - 1, 4, &["ALLE"])
        }
    }

    fn condition_m0(&self, i: isize) -> bool {
        if self.at(i + 1) == 'M' {
            return true;
        }
        self.has(i - 1, 3, &["UMB"]) && (i + 1 == self.len() - 1 || self.has(i + 2, 2, &["ER"]))
    }

    fn handle_p(&mut self, i: isize) -> isize {
        if self.at(i + 1) == 'H' {
            self.add("F");
            i + 2
        } else {
            self.add("P");
            if self.has(i + 1, 1, &["P", "B"]) {
                i + 2
            } else {
                i + 1
            }
        }
    }

    fn handle_r(&mut self, i: isize) -> isize {
        if i == self.len() - 1
            && !self.slavo_germanic
            && self.has(i - 2, 2, &["IE"])
            && !self.has(i - 4, 2, &["ME", "MA"])
        {
            self.push_alternate("R");
        } else {
            self.add("R");
        }
        if self.at(i + 1) == 'R' {
            i + 2
        } else {
            i + 1
        }
    }

    fn handle_s(&mut self, i: isize) -> isize {
        if self.has(i - 1, 3, &["ISL", "YSL"]) {
            i + 1
        } else if i == 0 && self.has(i, 5, &["SUGAR"]) {
            self.add2("X", "S");
            i + 1
        } else if self.has(i, 2, &["SH"]) {
            if self.has(i + 1, 4, &["HEIM", "HOEK", "HOLM", "HOLZ"]) {
                self.add("S");
            } else {
                self.add("X");
            }
            i + 2
        } else if self.has(i, 3, &["SIO", "SIA"]) || self.has(i, 4, &["SIAN"]) {
            if self.slavo_germanic {
                self.add("S");
            } else {
                self.add2("S", "X");
            }
            i + 3
        } else if (i == 0 && self.has(i + 1, 1, &["M", "N", "L", "W"])) || self.has(i + 1, 1, &["Z"]) {
            self.add2("S", "X");
            if self.has(i + 1, 1, &["Z"]) {
                i + 2
            } else {
                i + 1
            }
        } else if self.has(i, 2, &["SC"]) {
            self.handle_sc(i)
        } else {
            if i == self.len() - 1 && self.has(i - 2, 2, &["AI", "OI"]) {
                self.push_alternate("S");
            } else {
                self.add("S");
            }
            if self.has(i + 1, 1, &["S", "Z"]) {
                i + 2
            } else {
                i + 1
            }
        }
    }

    fn handle_sc(&mut self, i: isize) -> isize {
        if self.at(i + 2) == 'H' {
            if self.has(i + 3, 2, &["OO", "ER", "EN", "UY", "ED", "EM"]) {
                if self.has(i + 3, 2, &["ER", "EN"]) {
                    self.add2("X", "SK");
                } else {
                    self.add("SK");
                }
            } else if i == 0 && !self.is_vowel_at(3) && self.at(3) != 'W' {
                self.add2("X", "S");
            } else {
                self.add("X");
            }
        } else if self.has(i + 2, 1, &["I", "E", "Y"]) {
            self.add("S");
        } else {
            self.add("SK");
        }
        i + 3
    }

    fn handle_t(&mut self, i: isize) -> isize {
        if self.has(i, 4, &["TION"]) || self.has(i, 3, &["TIA", "TCH"]) {
            self.add("X");
            i + 3
        } else if self.has(i, 2, &["TH"]) || self.has(i, 3, &["TTH"]) {
            if self.has(i + 2, 2, &["OM", "AM"])
                || self.has(0, 4, &["VAN ", "VON "])
                || self.has(0, 3, &["SCH"])
            {
                self.add("T");
            } else {
                self.add2("0", "T");
            }
            i + 2
        } else {
            self.add("T");
            if self.has(i + 1, 1, &["T", "D"]) {
                i + 2
            } else {
                i + 1
            }
        }
    }

    fn handle_w(&mut self, i: isize) -> isize {
        if self.has(i, 2, &["WR"]) {
            self.add("R");
            return i + 2;
        }
        if i == 0 && (self.is_vowel_at(i + 1) || self.has(i, 2, &["WH"])) {
            if self.is_vowel_at(i + 1) {
                self.add2("A", "F");
            } else {
                self.add("A");
            }
            i + 1
        } else if (i == self.len() - 1 && self.is_vowel_at(i - 1))
            || self.has(i - 1, 5, &["EWSKI", "EWSKY", "OWSKI", "OWSKY"])
            || self.has(0, 3, &["SCH"])
        {
            self.push_alternate("F");
            i + 1
        } else if self.has(i, 4, &["WICZ", "WITZ"]) {
            self.add2("TS", "FX");
            i + 4
        } else {
            i + 1
        }
    }

    fn handle_x(&mut self, i: isize) -> isize {
        if i == 0 {
            self.add("S");
            return i + 1;
        }
        let silent_final = i == self.len() - 1
            && (self.has(i - 3, 3, &["IAU", "EAU"]) || self.has(i - 2, 2, &["AU", "OU"]));
        if !silent_final {
            self.add("KS");
        }
        if self.has(i + 1, 1, &["C", "X"]) {
            i + 2
        } else {
            i + 1
        }
    }

    fn handle_z(&mut self, i: isize) -> isize {
        if self.at(i + 1) == 'H' {
            self.add("J");
            return i + 2;
        }
        if self.has(i + 1, 2, &["ZO", "ZI", "ZA"]) || (self.slavo_germanic && i > 0 && self.at(i - 1) != 'T') {
            self.add2("S", "TS");
        } else {
            self.add("S");
        }
        if self.at(i + 1) == 'Z' {
            i + 2
        } else {
            i + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_code_names() {
        assert_eq!(encode("Thomas").unwrap(), vec!["TMS"]);
    }

    #[test]
    fn test_alternate_codes() {
        assert_eq!(encode("Smith").unwrap(), vec!["SM0", "XMT"]);
        assert_eq!(encode("Schmidt").unwrap(), vec!["XMT", "SMT"]);
    }

    #[test]
    fn test_no_letters() {
        assert!(encode("..").is_err());
    }

    #[test]
    fn test_silent_initials_keep_their_letter() {
        assert_eq!(double_metaphone("H.").0, "");
        assert_eq!(encode("H.").unwrap(), vec!["H"]);
        assert_eq!(encode("w").unwrap(), vec!["W"]);
    }
}
