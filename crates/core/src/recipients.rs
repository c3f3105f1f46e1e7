//! Recipient normalization: turns operator-entered phone numbers into
//! digits-only canonical ids with the country prefix applied.
//!
//! Order is preserved and duplicates pass through untouched: every
//! occurrence of a number is sent independently.

/// A phone number as uploaded, alongside its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub raw_input: String,
    /// `None` when the input held no digits at all.
    pub canonical_id: Option<String>,
}

impl Recipient {
    pub fn parse(raw: &str, country_prefix: Option<&str>) -> Self {
        let prefix = country_prefix.map(clean_prefix).unwrap_or_default();
        Self::with_clean_prefix(raw, &prefix)
    }

    fn with_clean_prefix(raw: &str, prefix: &str) -> Self {
        Self {
            raw_input: raw.to_string(),
            canonical_id: canonicalize(raw, prefix),
        }
    }
}

/// Parse every entry, keeping the ones that yield a canonical id.
pub fn parse_all<S: AsRef<str>>(raw: &[S], country_prefix: Option<&str>) -> Vec<Recipient> {
    let prefix = country_prefix.map(clean_prefix).unwrap_or_default();
    raw.iter()
        .map(|entry| Recipient::with_clean_prefix(entry.as_ref(), &prefix))
        .filter(|recipient| recipient.canonical_id.is_some())
        .collect()
}

/// Normalize a raw recipient list into canonical ids.
///
/// Blank entries and entries with no digits are dropped. An empty result
/// means there is nothing to send.
pub fn normalize<S: AsRef<str>>(raw: &[S], country_prefix: Option<&str>) -> Vec<String> {
    parse_all(raw, country_prefix)
        .into_iter()
        .filter_map(|recipient| recipient.canonical_id)
        .collect()
}

/// Reduce a country code such as `+94` to its digits.
pub fn clean_prefix(code: &str) -> String {
    code.trim()
        .trim_start_matches('+')
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

fn canonicalize(raw: &str, prefix: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if !prefix.is_empty() && !digits.starts_with(prefix) {
        return Some(format!("{prefix}{digits}"));
    }
    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_applied_once() {
        let out = normalize(&["771234567", "94771234567"], Some("+94"));
        assert_eq!(out, vec!["94771234567", "94771234567"]);
    }

    #[test]
    fn test_strips_formatting() {
        let out = normalize(&["+1 (555) 010-9999", " 077-123 4567 "], None);
        assert_eq!(out, vec!["15550109999", "0771234567"]);
        assert!(out.iter().all(|id| id.chars().all(|c| c.is_ascii_digit())));
    }

    #[test]
    fn test_drops_blank_and_digitless() {
        let out = normalize(&["", "   ", "n/a", "abc-def", "0771234567"], Some("94"));
        assert_eq!(out, vec!["940771234567"]);
    }

    #[test]
    fn test_keeps_order_and_duplicates() {
        let out = normalize(&["333", "111", "333", "222"], None);
        assert_eq!(out, vec!["333", "111", "333", "222"]);
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let none: [&str; 0] = [];
        assert!(normalize(&none, Some("+94")).is_empty());
    }

    #[test]
    fn test_blank_prefix_is_ignored() {
        assert_eq!(normalize(&["0771234567"], Some("+")), vec!["0771234567"]);
        assert_eq!(normalize(&["0771234567"], Some("")), vec!["0771234567"]);
        assert_eq!(clean_prefix(" +94 "), "94");
    }

    #[test]
    fn test_recipient_keeps_raw_input() {
        let r = Recipient::parse("077 123 4567", Some("+94"));
        assert_eq!(r.raw_input, "077 123 4567");
        assert_eq!(r.canonical_id.as_deref(), Some("940771234567"));

        let empty = Recipient::parse("---", Some("+94"));
        assert!(empty.canonical_id.is_none());
    }

    #[test]
    fn test_parse_all_pairs_raw_with_canonical() {
        let parsed = parse_all(&["", "077-123 4567", "n/a"], Some("+94"));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].raw_input, "077-123 4567");
        assert_eq!(parsed[0].canonical_id.as_deref(), Some("940771234567"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn output_is_digits_only(
                raw in proptest::collection::vec(".{0,24}", 0..16),
                prefix in proptest::option::of("\\+?[0-9 ]{0,4}"),
            ) {
                let out = normalize(&raw, prefix.as_deref());
                for id in &out {
                    prop_assert!(!id.is_empty());
                    prop_assert!(id.chars().all(|c| c.is_ascii_digit()));
                }
            }

            #[test]
            fn never_grows_and_keeps_digit_entries(
                raw in proptest::collection::vec(".{0,24}", 0..16),
                prefix in proptest::option::of("[0-9]{1,3}"),
            ) {
                let out = normalize(&raw, prefix.as_deref());
                let with_digits = raw.iter().filter(|r| r.chars().any(|c| c.is_ascii_digit())).count();
                prop_assert_eq!(out.len(), with_digits);
                if let Some(prefix) = prefix {
                    prop_assert!(out.iter().all(|id| id.starts_with(&prefix)));
                }
            }
        }
    }
}
