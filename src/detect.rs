use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum share of matching script characters in the cleaned text
const SCRIPT_RATIO_THRESHOLD: f64 = 0.3;

/// Targets whose script is Latin; script ratios cannot tell these apart,
/// so detection is left to the backend's source auto-detection
const LATIN_TARGETS: [&str; 7] = ["en", "es", "fr", "de", "pt", "id", "vi"];

// Whitespace, digits, punctuation and symbols carry no script information
static CLEAN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\d\p{P}\p{S}]+").expect("clean pattern must compile"));

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}')
}

fn is_japanese(c: char) -> bool {
    is_kana(c) || is_ideograph(c)
}

fn is_ideograph(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}')
}

/// Unicode range test for the remaining script-distinguishable targets
fn script_test(target_lang: &str) -> Option<fn(char) -> bool> {
    match target_lang {
        "ko" => Some(|c| matches!(c, '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}')),
        "th" => Some(|c| matches!(c, '\u{0E00}'..='\u{0E7F}')),
        "ar" => Some(|c| matches!(c, '\u{0600}'..='\u{06FF}')),
        "hi" => Some(|c| matches!(c, '\u{0900}'..='\u{097F}')),
        "ru" => Some(|c| matches!(c, '\u{0400}'..='\u{04FF}')),
        _ => None,
    }
}

fn ratio_of(text: &str, test: fn(char) -> bool) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let matching = text.chars().filter(|c| test(*c)).count();
    matching as f64 / total as f64
}

/// Classify a text string as already being in the target language.
///
/// Returns true when nothing would be gained by translating: either the
/// cleaned text is empty, or enough of it is written in the target's script.
/// Latin-alphabet targets and unrecognized targets always report false.
pub fn is_target_language(text: &str, target_lang: &str) -> bool {
    let cleaned = CLEAN_PATTERN.replace_all(text, "");
    if cleaned.is_empty() {
        return true;
    }

    if LATIN_TARGETS.contains(&target_lang) {
        return false;
    }

    if target_lang == "ja" {
        // Kanji alone reads as Chinese; kana is what marks Japanese text
        if !cleaned.chars().any(is_kana) {
            return false;
        }
        return ratio_of(&cleaned, is_japanese) >= SCRIPT_RATIO_THRESHOLD;
    }

    if target_lang == "zh-CN" || target_lang == "zh-TW" {
        // Any kana means the text is Japanese, not Chinese
        if cleaned.chars().any(is_kana) {
            return false;
        }
        return ratio_of(&cleaned, is_ideograph) >= SCRIPT_RATIO_THRESHOLD;
    }

    match script_test(target_lang) {
        Some(test) => ratio_of(&cleaned, test) >= SCRIPT_RATIO_THRESHOLD,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_after_cleaning_is_always_target() {
        assert!(is_target_language("", "ja"));
        assert!(is_target_language("  12345 !?  ", "ja"));
        assert!(is_target_language("... 42 ...", "en"));
        assert!(is_target_language("$100,000!", "ko"));
        assert!(is_target_language("†‡•", "unknown-lang"));
    }

    #[test]
    fn test_japanese_requires_kana() {
        // Pure kanji passes the ratio test but carries no kana
        assert!(!is_target_language("日本語翻訳機能", "ja"));
        // Kana plus kanji is Japanese
        assert!(is_target_language("こんにちは世界", "ja"));
        assert!(is_target_language("翻訳を確認します", "ja"));
    }

    #[test]
    fn test_japanese_ratio_threshold() {
        // One kana in a long Latin string stays below 0.3
        assert!(!is_target_language("aaaaaaaaaaaaaaaaaaaの", "ja"));
        // Majority kana clears it
        assert!(is_target_language("これはテストです", "ja"));
    }

    #[test]
    fn test_chinese_disqualified_by_kana() {
        assert!(!is_target_language("中文のテスト", "zh-CN"));
        assert!(!is_target_language("中文のテスト", "zh-TW"));
        assert!(is_target_language("简体中文翻译", "zh-CN"));
        assert!(is_target_language("繁體中文翻譯", "zh-TW"));
    }

    #[test]
    fn test_latin_targets_always_need_translation() {
        for target in LATIN_TARGETS {
            assert!(!is_target_language("Hello world", target));
            assert!(!is_target_language("こんにちは", target));
        }
    }

    #[test]
    fn test_script_table_targets() {
        assert!(is_target_language("안녕하세요", "ko"));
        assert!(!is_target_language("Hello world", "ko"));
        assert!(is_target_language("สวัสดีครับ", "th"));
        assert!(is_target_language("مرحبا بالعالم", "ar"));
        assert!(is_target_language("नमस्ते दुनिया", "hi"));
        assert!(is_target_language("Привет мир", "ru"));
        assert!(!is_target_language("Привет мир", "th"));
    }

    #[test]
    fn test_unknown_target_needs_translation() {
        assert!(!is_target_language("Hello world", "xx"));
        assert!(!is_target_language("こんにちは", "xx"));
    }

    #[test]
    fn test_cleaning_ignores_noise_around_script() {
        // Punctuation and digits do not dilute the ratio
        assert!(is_target_language("「こんにちは、世界!」 2024", "ja"));
        assert!(is_target_language("안녕!!! 123", "ko"));
    }
}
