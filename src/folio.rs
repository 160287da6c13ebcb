//! Simulated folio display.
//!
//! Purely cosmetic: shows the user what number the server will stamp on the
//! first page, without asking the server.

/// Format the start-number control's value as the folio the first stamped
/// page will carry.
///
/// The value is read like a browser's `parseInt` (optional sign, then
/// leading digits; trailing junk ignored). Anything unparsable, zero or
/// negative falls back to 1. Short numbers are zero-padded to four digits;
/// longer ones are printed digit for digit, however large.
///
/// ```rust
/// use foliator_client::folio::render;
///
/// assert_eq!(render("7"), "#0007");
/// assert_eq!(render("abc"), "#0001");
/// assert_eq!(render("12345"), "#12345");
/// ```
pub fn render(start_number: &str) -> String {
    format!("#{:0>4}", start_digits(start_number))
}

/// The significant leading digits of `value`, or `"1"` when there are none
/// or the number is not positive.
fn start_digits(value: &str) -> &str {
    let s = value.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let significant = digits[..end].trim_start_matches('0');

    if significant.is_empty() || negative {
        "1"
    } else {
        significant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_values() {
        assert_eq!(render("7"), "#0007");
        assert_eq!(render("123"), "#0123");
    }

    #[test]
    fn invalid_or_empty_falls_back_to_one() {
        assert_eq!(render("abc"), "#0001");
        assert_eq!(render(""), "#0001");
        assert_eq!(render("   "), "#0001");
    }

    #[test]
    fn non_positive_falls_back_to_one() {
        assert_eq!(render("0"), "#0001");
        assert_eq!(render("-3"), "#0001");
    }

    #[test]
    fn long_values_are_not_truncated() {
        assert_eq!(render("12345"), "#12345");
    }

    #[test]
    fn trailing_garbage_is_ignored() {
        assert_eq!(render("12abc"), "#0012");
        assert_eq!(render(" 9.5"), "#0009");
        assert_eq!(render("+8"), "#0008");
    }

    #[test]
    fn leading_zeros_are_not_doubled() {
        assert_eq!(render("007"), "#0007");
        assert_eq!(render("00012345"), "#12345");
        assert_eq!(render("-0"), "#0001");
    }

    #[test]
    fn numbers_beyond_u64_keep_every_digit() {
        assert_eq!(render("99999999999999999999"), "#99999999999999999999");
        assert_eq!(render("123456789012345678901234x"), "#123456789012345678901234");
    }
}
