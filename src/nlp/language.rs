//! Language detection with whatlang.
//!
//! Clinical PDFs are overwhelmingly English, but uploads in other languages
//! should be flagged because both pretrained models are English-only.

use whatlang::Lang;

use super::sentences::words;

pub const UNKNOWN: &str = "unknown";

// Below this many words trigram statistics are noise
const MIN_WORDS: usize = 5;

/// ISO 639-1 code of the detected language, or `"unknown"` when the text is
/// too short or whatlang is not confident.
pub fn detect_language(text: &str) -> String {
    if words(text).len() < MIN_WORDS {
        return UNKNOWN.to_string();
    }
    match whatlang::detect(text) {
        Some(info) if info.is_reliable() => iso_639_1(info.lang()).to_string(),
        _ => UNKNOWN.to_string(),
    }
}

// whatlang reports ISO 639-3; the two-letter form is kept where one exists
fn iso_639_1(lang: Lang) -> &'static str {
    match lang {
        Lang::Eng => "en",
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Dan => "da",
        Lang::Swe => "sv",
        Lang::Nob => "nb",
        Lang::Fin => "fi",
        Lang::Pol => "pl",
        Lang::Ces => "cs",
        Lang::Hun => "hu",
        Lang::Ron => "ro",
        Lang::Tur => "tr",
        Lang::Ell => "el",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Ara => "ar",
        Lang::Heb => "he",
        Lang::Hin => "hi",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        other => other.code(),
    }
}
