//! Unit tests for the text preprocessing pipeline

use sentiment_gateway::predictor::{
    text::normalize_text,
    tokenizer::{pad_sequences, WordTokenizer},
};

fn tokenizer() -> WordTokenizer {
    serde_json::from_str(
        r#"{
            "num_words": 10000,
            "oov_token": null,
            "word_index": {"i": 1, "love": 2, "this": 3, "video": 4, "blessed": 5}
        }"#,
    )
    .unwrap()
}

#[test]
fn test_clean_then_tokenize() {
    let cleaned = normalize_text("I LOVE this video!!! https://youtu.be/abc @creator #blessed");
    assert_eq!(cleaned, "i love this video   blessed");

    let sequence = tokenizer().text_to_sequence(&cleaned);
    assert_eq!(sequence, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_padding_matches_training_length() {
    let t = tokenizer();
    let sequences = t.texts_to_sequences(&["love this", "i"]);
    let padded = pad_sequences(&sequences, 100);

    assert_eq!(padded.shape(), &[2, 100]);
    assert_eq!(padded[[0, 98]], 2);
    assert_eq!(padded[[0, 99]], 3);
    assert!(padded.row(1).iter().take(99).all(|&v| v == 0));
    assert_eq!(padded[[1, 99]], 1);
}

#[test]
fn test_long_text_keeps_tail() {
    let t = tokenizer();
    let long = "i ".repeat(150) + "love";
    let padded = pad_sequences(&t.texts_to_sequences(&[long]), 100);
    assert_eq!(padded[[0, 99]], 2);
    assert!(padded.row(0).iter().take(99).all(|&v| v == 1));
}

#[test]
fn test_empty_text_is_all_padding() {
    let padded = pad_sequences(&tokenizer().texts_to_sequences(&[normalize_text("?!")]), 8);
    assert!(padded.iter().all(|&v| v == 0));
}
