//! INN/OGRN input validation
//!
//! Identifiers are treated as opaque digit strings everywhere else in the
//! crate; this is the single place that knows their checksum rules.

/// Checks a 10- or 12-digit INN, including the control-digit checksums.
///
/// # Examples
///
/// ```
/// use kontragent_bot::validation::validate_inn;
/// assert!(validate_inn("7707083893"));
/// assert!(!validate_inn("7707083894"));
/// ```
#[must_use]
pub fn validate_inn(inn: &str) -> bool {
    if !inn.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = inn.chars().filter_map(|c| c.to_digit(10)).collect();
    match digits.len() {
        10 => {
            const WEIGHTS: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
            digits[9] == checksum(&digits[..9], &WEIGHTS)
        }
        12 => {
            const W11: [u32; 10] = [7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
            const W12: [u32; 11] = [3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
            digits[10] == checksum(&digits[..10], &W11) && digits[11] == checksum(&digits[..11], &W12)
        }
        _ => false,
    }
}

fn checksum(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    sum % 11 % 10
}

/// Normalizes raw user input into a lookup identifier.
///
/// Accepts a checksum-valid INN (10/12 digits) or an OGRN/OGRNIP (13/15
/// digits, length-checked only). Returns `None` for everything else.
#[must_use]
pub fn normalize_query(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 64 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match trimmed.len() {
        10 | 12 => validate_inn(trimmed).then(|| trimmed.to_string()),
        13 | 15 => Some(trimmed.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_valid_inns() {
        // Sberbank and a checksum-valid individual INN
        assert!(validate_inn("7707083893"));
        assert!(validate_inn("500100732259"));
    }

    #[test]
    fn test_invalid_checksum_rejected() {
        assert!(!validate_inn("7707083892"));
        assert!(!validate_inn("500100732250"));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(!validate_inn(""));
        assert!(!validate_inn("123"));
        assert!(!validate_inn("12345678901"));
    }

    #[test]
    fn test_non_digits_rejected() {
        assert!(!validate_inn("77070838ab"));
        assert!(!validate_inn("7707 08389"));
    }

    #[test]
    fn test_normalize_query_trims_and_classifies() {
        assert_eq!(
            normalize_query(" 7707083893 "),
            Some("7707083893".to_string())
        );
        // OGRN passes on length alone
        assert_eq!(
            normalize_query("1027700132195"),
            Some("1027700132195".to_string())
        );
        assert_eq!(normalize_query("7707083892"), None);
        assert_eq!(normalize_query("not-a-number"), None);
        assert_eq!(normalize_query(""), None);
    }

    fn with_checksum_10(base: &[u32; 9]) -> String {
        const WEIGHTS: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
        let control = checksum(base, &WEIGHTS);
        base.iter()
            .chain(std::iter::once(&control))
            .map(ToString::to_string)
            .collect()
    }

    proptest! {
        // Any 9-digit base with a freshly computed control digit must validate
        #[test]
        fn prop_computed_checksum_always_valid(base in proptest::array::uniform9(0u32..10)) {
            prop_assert!(validate_inn(&with_checksum_10(&base)));
        }
    }
}
