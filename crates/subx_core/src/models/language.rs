//! Language tag normalisation.
//!
//! Containers tag tracks with ISO 639-2 codes (bibliographic or
//! terminologic), users tend to type ISO 639-1 codes or BCP 47 tags.
//! Everything is folded to the 639-2/B code so tags can be compared.

/// Undetermined language.
pub const UNDETERMINED: &str = "und";

/// (639-1, 639-2/B, 639-2/T) triples for the languages that show up on
/// disc and broadcast releases.
const LANGUAGE_CODES: &[(&str, &str, &str)] = &[
    ("ar", "ara", "ara"),
    ("bg", "bul", "bul"),
    ("ca", "cat", "cat"),
    ("cs", "cze", "ces"),
    ("da", "dan", "dan"),
    ("de", "ger", "deu"),
    ("el", "gre", "ell"),
    ("en", "eng", "eng"),
    ("es", "spa", "spa"),
    ("et", "est", "est"),
    ("eu", "baq", "eus"),
    ("fa", "per", "fas"),
    ("fi", "fin", "fin"),
    ("fr", "fre", "fra"),
    ("he", "heb", "heb"),
    ("hi", "hin", "hin"),
    ("hr", "hrv", "hrv"),
    ("hu", "hun", "hun"),
    ("id", "ind", "ind"),
    ("is", "ice", "isl"),
    ("it", "ita", "ita"),
    ("ja", "jpn", "jpn"),
    ("ko", "kor", "kor"),
    ("lt", "lit", "lit"),
    ("lv", "lav", "lav"),
    ("ms", "may", "msa"),
    ("nl", "dut", "nld"),
    ("no", "nor", "nor"),
    ("nb", "nob", "nob"),
    ("pl", "pol", "pol"),
    ("pt", "por", "por"),
    ("ro", "rum", "ron"),
    ("ru", "rus", "rus"),
    ("sk", "slo", "slk"),
    ("sl", "slv", "slv"),
    ("sr", "srp", "srp"),
    ("sv", "swe", "swe"),
    ("ta", "tam", "tam"),
    ("te", "tel", "tel"),
    ("th", "tha", "tha"),
    ("tr", "tur", "tur"),
    ("uk", "ukr", "ukr"),
    ("vi", "vie", "vie"),
    ("zh", "chi", "zho"),
];

/// Normalise a language tag to its ISO 639-2/B form.
///
/// Region and script subtags are dropped (`en-US` → `eng`). Unknown
/// three-letter codes pass through lowercased; empty input becomes `und`.
pub fn normalize_language(tag: &str) -> String {
    let primary = tag
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    if primary.is_empty() {
        return UNDETERMINED.to_string();
    }

    for (one, bib, term) in LANGUAGE_CODES {
        if primary == *one || primary == *bib || primary == *term {
            return (*bib).to_string();
        }
    }

    primary
}

/// Whether two language tags refer to the same language.
pub fn languages_match(a: &str, b: &str) -> bool {
    normalize_language(a) == normalize_language(b)
}

/// ISO 639-1 code for a tag, when one exists.
///
/// OCR engines usually take two-letter codes.
pub fn two_letter_code(tag: &str) -> Option<&'static str> {
    let normalized = normalize_language(tag);
    LANGUAGE_CODES
        .iter()
        .find(|(_, bib, _)| *bib == normalized)
        .map(|(one, _, _)| *one)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_variants_to_bibliographic_code() {
        assert_eq!(normalize_language("en"), "eng");
        assert_eq!(normalize_language("en-US"), "eng");
        assert_eq!(normalize_language("deu"), "ger");
        assert_eq!(normalize_language("FRA"), "fre");
        assert_eq!(normalize_language(""), "und");
        assert_eq!(normalize_language("xyz"), "xyz");
    }

    #[test]
    fn matches_across_code_systems() {
        assert!(languages_match("ger", "de"));
        assert!(languages_match("zh_CN", "chi"));
        assert!(!languages_match("eng", "spa"));
    }

    #[test]
    fn two_letter_lookup() {
        assert_eq!(two_letter_code("eng"), Some("en"));
        assert_eq!(two_letter_code("nld"), Some("nl"));
        assert_eq!(two_letter_code("und"), None);
    }
}
