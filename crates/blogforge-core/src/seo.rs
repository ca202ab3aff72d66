//! Local keyword-density metrics.
//!
//! The model proposes keywords and copy; the numbers are computed here so
//! they are exact and reproducible.

use crate::models::KeywordDensity;

/// Whitespace tokens, trimmed of surrounding punctuation and lowercased.
///
/// Tokens that are pure punctuation stay in the list as empty strings so
/// the total matches the whitespace word count and phrases never match
/// across them.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .collect()
}

/// Case-insensitive occurrences of `keyword` (a word or phrase).
pub fn count_occurrences(content: &str, keyword: &str) -> usize {
    let phrase: Vec<String> = tokenize(keyword).into_iter().filter(|t| !t.is_empty()).collect();
    if phrase.is_empty() {
        return 0;
    }
    tokenize(content)
        .windows(phrase.len())
        .filter(|window| window == &phrase.as_slice())
        .count()
}

/// Density of each keyword: `occurrences / total words × 100`, rounded to
/// two decimals. Empty content yields zero density.
pub fn keyword_density(content: &str, keywords: &[String]) -> Vec<KeywordDensity> {
    let total = content.split_whitespace().count();
    keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .map(|keyword| {
            let occurrences = count_occurrences(content, keyword);
            let density = if total == 0 {
                0.0
            } else {
                occurrences as f64 / total as f64 * 100.0
            };
            KeywordDensity {
                keyword: keyword.trim().to_string(),
                occurrences,
                density_percent: (density * 100.0).round() / 100.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_in_five_hundred_is_one_percent() {
        let mut words = vec!["filler"; 495];
        words.extend(["Apex"; 5]);
        let content = words.join(" ");
        let d = keyword_density(&content, &["apex".to_string()]);
        assert_eq!(d[0].occurrences, 5);
        assert_eq!(d[0].density_percent, 1.0);
    }

    #[test]
    fn test_phrase_and_punctuation() {
        let content = "REST APIs are great. Build rest apis, test REST-APIs. (rest apis)";
        assert_eq!(count_occurrences(content, "REST APIs"), 3);
        assert_eq!(count_occurrences(content, "rest"), 3);
        assert_eq!(count_occurrences(content, "  "), 0);
    }

    #[test]
    fn test_empty_content() {
        let d = keyword_density("", &["apex".to_string(), " ".to_string()]);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].density_percent, 0.0);
    }
}
