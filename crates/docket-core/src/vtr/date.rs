//! Ledger dates: `DD Mon YYYY`.

use chrono::NaiveDate;

/// Historical month spellings that the calendar parser does not accept.
const MONTH_FIXES: &[(&str, &str)] = &[("Sept", "Sep"), ("July", "Jul")];

/// Parse a `day month-name year` date such as `30 Mar 1903`.
pub fn parse_date(text: &str) -> Result<NaiveDate, String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [day, month, year] = tokens.as_slice() else {
        return Err(format!("expected 'DD Mon YYYY', found {:?}", text));
    };
    if !is_digits(day) || !is_digits(year) || !month.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("expected 'DD Mon YYYY', found {:?}", text));
    }
    let month = MONTH_FIXES
        .iter()
        .find(|(bad, _)| bad == month)
        .map(|(_, good)| *good)
        .unwrap_or(*month);
    let normalized = format!("{} {} {}", day, month, year);
    NaiveDate::parse_from_str(&normalized, "%d %b %Y")
        .map_err(|e| format!("invalid date {:?}: {}", text, e))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
