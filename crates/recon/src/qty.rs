//! Lenient quantity coercion.

/// Coerce quantity-ish cell text to an integer. Integer parse first, then a
/// float parse accepting a zero fractional part, so `"3"`, `" 3 "` and
/// `"3.0"` all coerce to 3. Anything else (`"3.5"`, `"abc"`, blank) has no
/// value — callers treat that as a mismatch, never an error.
pub fn to_int_lenient(raw: &str) -> Option<i64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(n) = t.parse::<i64>() {
        return Some(n);
    }
    let f: f64 = t.parse().ok()?;
    if f.fract() == 0.0 && f.abs() < 1e15 {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_forms_coerce() {
        assert_eq!(to_int_lenient("3"), Some(3));
        assert_eq!(to_int_lenient(" 3 "), Some(3));
        assert_eq!(to_int_lenient("3.0"), Some(3));
        assert_eq!(to_int_lenient("-2"), Some(-2));
        assert_eq!(to_int_lenient("0"), Some(0));
    }

    #[test]
    fn non_integers_have_no_value() {
        assert_eq!(to_int_lenient(""), None);
        assert_eq!(to_int_lenient("   "), None);
        assert_eq!(to_int_lenient("abc"), None);
        assert_eq!(to_int_lenient("3.5"), None);
        assert_eq!(to_int_lenient("1,5"), None);
        assert_eq!(to_int_lenient("NaN"), None);
        assert_eq!(to_int_lenient("inf"), None);
    }

    #[test]
    fn huge_floats_are_rejected() {
        assert_eq!(to_int_lenient("1e20"), None);
    }
}
