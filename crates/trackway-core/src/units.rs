//! Number and unit conversion for route arguments.
//!
//! Route files are written by hand and frequently carry trailing junk,
//! embedded spaces or stray units. The legacy parsers accept the longest
//! numeric prefix of the whitespace-stripped text, which is what existing
//! content relies on. The strict parsers are used where a lenient reading
//! would misclassify an expression (track positions).

/// Characters that may appear in a decimal literal.
fn is_numeric_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')
}

/// Removes every whitespace character, including ones inside the text.
pub fn trim_inside(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parses a decimal literal without any surrounding text.
fn parse_exact(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || !s.chars().all(is_numeric_char) {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Legacy floating point parse: the longest prefix of the
/// whitespace-stripped text that forms a number.
pub fn parse_f64_legacy(s: &str) -> Option<f64> {
    let s = trim_inside(s);
    let run = s
        .char_indices()
        .find(|&(_, c)| !is_numeric_char(c))
        .map_or(s.len(), |(i, _)| i);
    (1..=run).rev().find_map(|n| s[..n].parse::<f64>().ok())
}

/// Legacy integer parse: a legacy float rounded half to even, rejected when
/// it does not fit in an `i32`.
pub fn parse_i32_legacy(s: &str) -> Option<i32> {
    let a = parse_f64_legacy(s)?;
    if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&a) {
        Some(a.round_ties_even() as i32)
    } else {
        None
    }
}

/// Applies a unit factor chain to a length written as `a`, `a:b`, `a:b:c`...
///
/// A plain number uses the last factor. A colon-separated value aligns its
/// parts with the tail of the chain and sums the products.
fn parse_length_with(
    s: &str,
    factors: &[f64],
    parse_part: impl Fn(&str) -> Option<f64>,
) -> Option<f64> {
    let last = *factors.last()?;
    if let Some(a) = parse_exact(s) {
        return Some(a * last);
    }
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > factors.len() {
        return None;
    }
    let offset = factors.len() - parts.len();
    parts.iter().enumerate().try_fold(0.0, |sum, (i, part)| {
        parse_part(part.trim()).map(|a| sum + a * factors[i + offset])
    })
}

/// Length argument with the lenient number rules.
pub fn parse_length(s: &str, factors: &[f64]) -> Option<f64> {
    parse_length_with(s, factors, parse_f64_legacy)
}

/// Length with strict number rules. Used to recognise track positions, where
/// `1000` is a position but `1000abc` is not.
pub fn parse_length_strict(s: &str, factors: &[f64]) -> Option<f64> {
    parse_length_with(s, factors, parse_exact)
}

/// Parses a clock time into seconds since midnight.
///
/// Accepted shapes are `H`, `H.M`, `H.MM`, `H.MMS` and `H.MMSS`. Hours may be
/// negative or exceed 24.
pub fn parse_time(s: &str) -> Option<f64> {
    let s = trim_inside(s);
    if s.is_empty() {
        return None;
    }
    let digits = |t: &str| -> Option<u32> {
        if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        t.parse().ok()
    };
    match s.find('.') {
        None => {
            let h: i32 = s.parse().ok()?;
            Some(3600.0 * f64::from(h))
        }
        Some(0) => None,
        Some(i) => {
            let h = f64::from(s[..i].parse::<i32>().ok()?);
            let frac = &s[i + 1..];
            match frac.len() {
                1 | 2 => {
                    let m = digits(frac)?;
                    Some(3600.0 * h + 60.0 * f64::from(m))
                }
                3 | 4 => {
                    let m = digits(&frac[..2])?;
                    let sec = digits(&frac[2..])?;
                    Some(3600.0 * h + 60.0 * f64::from(m) + f64::from(sec))
                }
                _ => None,
            }
        }
    }
}

/// Colour channel in `0..=255`.
pub fn parse_byte(s: &str) -> Option<u8> {
    s.trim().parse().ok()
}

/// Case-insensitive `true` / `false`.
pub fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_takes_longest_numeric_prefix() {
        assert_eq!(parse_f64_legacy("12.5m"), Some(12.5));
        assert_eq!(parse_f64_legacy(" 1 2 "), Some(12.0));
        assert_eq!(parse_f64_legacy("3e"), Some(3.0));
        assert_eq!(parse_f64_legacy("-0.5abc"), Some(-0.5));
        assert_eq!(parse_f64_legacy("abc"), None);
        assert_eq!(parse_f64_legacy(""), None);
    }

    #[test]
    fn legacy_rejects_word_literals() {
        assert_eq!(parse_f64_legacy("inf"), None);
        assert_eq!(parse_f64_legacy("NaN"), None);
    }

    #[test]
    fn legacy_int_rounds_half_to_even() {
        assert_eq!(parse_i32_legacy("2.5"), Some(2));
        assert_eq!(parse_i32_legacy("3.5"), Some(4));
        assert_eq!(parse_i32_legacy("-1.5"), Some(-2));
        assert_eq!(parse_i32_legacy("7x"), Some(7));
        assert_eq!(parse_i32_legacy("1e12"), None);
    }

    #[test]
    fn unit_chain_aligns_with_tail() {
        let factors = [1000.0, 1.0];
        assert_eq!(parse_length("25", &factors), Some(25.0));
        assert_eq!(parse_length("1:250", &factors), Some(1250.0));
        assert_eq!(parse_length("1:2:3", &factors), None);
        assert_eq!(parse_length("1:x", &factors), None);
    }

    #[test]
    fn unit_chain_applies_last_factor_to_plain_numbers() {
        let feet = [0.3048];
        let v = parse_length("100", &feet).unwrap();
        assert!((v - 30.48).abs() < 1e-12);
    }

    #[test]
    fn strict_length_rejects_trailing_text() {
        assert_eq!(parse_length_strict("1000", &[1.0]), Some(1000.0));
        assert_eq!(parse_length_strict("1000abc", &[1.0]), None);
        assert_eq!(parse_length_strict("Track.Rail", &[1.0]), None);
        assert_eq!(parse_length("1000abc", &[1.0]), Some(1000.0));
    }

    #[test]
    fn time_grammar() {
        assert_eq!(parse_time("8.30"), Some(30600.0));
        assert_eq!(parse_time("8.35"), Some(30900.0));
        assert_eq!(parse_time("8.3"), Some(28980.0));
        assert_eq!(parse_time("10.3015"), Some(37815.0));
        assert_eq!(parse_time("10.301"), Some(37801.0));
        assert_eq!(parse_time("9"), Some(32400.0));
        assert_eq!(parse_time("-1.00"), Some(-3600.0));
        assert_eq!(parse_time(".30"), None);
        assert_eq!(parse_time("8.30150"), None);
        assert_eq!(parse_time("8.x"), None);
        assert_eq!(parse_time(""), None);
    }

    #[test]
    fn byte_and_bool() {
        assert_eq!(parse_byte("255"), Some(255));
        assert_eq!(parse_byte("256"), None);
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("no"), None);
    }
}
