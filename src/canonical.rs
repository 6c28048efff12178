use std::collections::HashMap;
use std::sync::OnceLock;

// Keys are normalised: lower-case, single-spaced, `&` spelled as `and`.
const SYNONYMS: &[(&str, &str)] = &[
    ("westbengal", "West Bengal"),
    ("west bangal", "West Bengal"),
    ("west bengal", "West Bengal"),
    ("orissa", "Odisha"),
    ("odisha", "Odisha"),
    ("andaman and nicobar islands", "Andaman & Nicobar Islands"),
    ("andaman and nicobar", "Andaman & Nicobar Islands"),
    ("jammu and kashmir", "Jammu & Kashmir"),
    ("dadra and nagar haveli", "Dadra & Nagar Haveli and Daman & Diu"),
    (
        "dadra and nagar haveli and daman and diu",
        "Dadra & Nagar Haveli and Daman & Diu",
    ),
    (
        "the dadra and nagar haveli and daman and diu",
        "Dadra & Nagar Haveli and Daman & Diu",
    ),
    ("daman and diu", "Dadra & Nagar Haveli and Daman & Diu"),
    ("pondicherry", "Puducherry"),
    ("puducherry", "Puducherry"),
    ("karnatka", "Karnataka"),
    ("telngana", "Telangana"),
    ("andhrapradesh", "Andhra Pradesh"),
    ("tamilnadu", "Tamil Nadu"),
    ("chhatisgarh", "Chhattisgarh"),
    ("uttaranchal", "Uttarakhand"),
    ("nct of delhi", "Delhi"),
    ("u.p.", "Uttar Pradesh"),
    ("m.p.", "Madhya Pradesh"),
    ("a.p.", "Andhra Pradesh"),
];

fn synonyms() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| SYNONYMS.iter().copied().collect())
}

fn normalise(name: &str) -> String {
    name.to_lowercase()
        .replace('&', "and")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.push(ch);
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Map a free-text region label onto its display name.
///
/// Known spellings resolve through the synonym table; anything else is
/// title-cased. Total and idempotent.
pub fn region_name(raw: &str) -> String {
    let key = normalise(raw);
    match synonyms().get(key.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => title_case(&key),
    }
}

/// Region labels that are empty or all digits are export defects.
pub fn is_recognised(canonical: &str) -> bool {
    !canonical.is_empty() && !canonical.chars().all(|c| c.is_numeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ampersand_and_word_forms_agree() {
        assert_eq!(region_name("Jammu & Kashmir"), "Jammu & Kashmir");
        assert_eq!(region_name("jammu and kashmir"), "Jammu & Kashmir");
        assert_eq!(region_name("  JAMMU   &  kashmir "), "Jammu & Kashmir");
    }

    #[test]
    fn synonyms_resolve_misspellings_and_former_names() {
        assert_eq!(region_name("Orissa"), "Odisha");
        assert_eq!(region_name("westbengal"), "West Bengal");
        assert_eq!(region_name("Pondicherry"), "Puducherry");
        assert_eq!(region_name("U.P."), "Uttar Pradesh");
        assert_eq!(region_name("Daman & Diu"), "Dadra & Nagar Haveli and Daman & Diu");
    }

    #[test]
    fn unknown_names_fall_back_to_title_case() {
        assert_eq!(region_name("tamil   nadu"), "Tamil Nadu");
        assert_eq!(region_name("HIMACHAL PRADESH"), "Himachal Pradesh");
        assert_eq!(region_name("foo & bar"), "Foo And Bar");
        assert_eq!(region_name(""), "");
    }

    #[test]
    fn canonicalisation_is_idempotent() {
        let inputs = [
            "Jammu & Kashmir",
            "orissa",
            "the dadra and nagar haveli and daman and diu",
            "andaman & nicobar islands",
            "new region & co",
            "12345",
            "o'neill district",
        ];
        for raw in inputs {
            let once = region_name(raw);
            assert_eq!(region_name(&once), once, "input {raw:?}");
        }
        for (_, canonical) in SYNONYMS {
            assert_eq!(region_name(canonical), *canonical);
        }
    }

    #[test]
    fn numeric_and_empty_labels_are_not_recognised() {
        assert!(!is_recognised("100000"));
        assert!(!is_recognised(""));
        assert!(is_recognised("Bihar"));
        assert!(is_recognised("Zone 7"));
    }
}
