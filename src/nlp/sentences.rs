use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'-]*").expect("valid regex"));

/// Collapse runs of whitespace (PDF line breaks included) into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Sentences end at `.`, `!` or `?` followed by whitespace, so decimals
/// like "5.2 mmHg" stay intact.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = normalize_whitespace(text);
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            if let Some(&(next_i, next)) = chars.peek() {
                if next.is_whitespace() {
                    push_trimmed(&mut sentences, &text[start..next_i]);
                    start = next_i;
                }
            } else {
                push_trimmed(&mut sentences, &text[start..i + ch.len_utf8()]);
                start = text.len();
            }
        }
    }
    if start < text.len() {
        push_trimmed(&mut sentences, &text[start..]);
    }
    sentences
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}

/// Lowercased word tokens
pub fn words(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// First `max_chars` characters, never splitting a code point.
/// Returns the slice and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Split into pieces of at most `chunk_size` characters, breaking on
/// whitespace where possible.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > chunk_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len > chunk_size {
            // A single oversized token gets hard-split
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(chunk_size) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let s = split_sentences("Patients enrolled.\nBP fell by 5.2 mmHg! Was it\nsignificant? Yes");
        assert_eq!(
            s,
            vec!["Patients enrolled.", "BP fell by 5.2 mmHg!", "Was it significant?", "Yes"]
        );
    }

    #[test]
    fn empty_text_has_no_sentences() {
        assert!(split_sentences("   \n ").is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("abc", 10), ("abc", false));
        assert_eq!(truncate_chars("abc", 3), ("abc", false));
    }

    #[test]
    fn chunks_never_exceed_size() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = chunk_text(text, 12);
        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
        assert_eq!(chunks.join(" "), text);

        let long = chunk_text("abcdefghij", 4);
        assert_eq!(long, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn word_tokens() {
        assert_eq!(words("ARB-102 reduced BP, didn't it?"), vec!["arb-102", "reduced", "bp", "didn't", "it"]);
    }
}
