//! Text normalisation applied before tokenization

use once_cell::sync::Lazy;
use regex::Regex;

/// URLs, @mentions and the hashtag marker
static NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"http\S+|www\S+|@\w+|#").expect("noise pattern is valid"));

/// Anything that is neither a word character nor whitespace
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"));

/// Normalise raw user text the same way the training corpus was cleaned.
///
/// Lower-cases, removes URLs, mentions and `#` markers, drops punctuation and
/// trims surrounding whitespace. The hashtag word itself is kept.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_noise = NOISE.replace_all(&lowered, "");
    let without_punctuation = PUNCTUATION.replace_all(&without_noise, "");
    without_punctuation.trim().to_string()
}
