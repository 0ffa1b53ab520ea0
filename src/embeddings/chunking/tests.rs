use super::*;

const DATA: &str = "adam green, bob blue, charlie red";

#[test]
fn windows_advance_by_step() {
    let chunks = chunk_text(DATA, 10, 1).expect("valid window");

    assert_eq!(
        chunks,
        vec!["adam green", "n, bob blu", "ue, charli", "e red"]
    );
}

#[test]
fn successive_windows_share_overlap() {
    let text = "abcdefghijklmnopqrstuvwxyz".repeat(7);
    let chunks = chunk_text(&text, 20, 5).expect("valid window");

    for pair in chunks.windows(2).filter(|pair| pair[0].chars().count() == 20) {
        let previous: Vec<char> = pair[0].chars().collect();
        let tail: String = previous[previous.len() - 5..].iter().collect();
        assert!(
            pair[1].starts_with(&tail),
            "{:?} should start with {:?}",
            pair[1],
            tail
        );
    }

    // Taking `step` chars from each window reproduces the source
    let mut rebuilt = String::new();
    for chunk in &chunks {
        rebuilt.extend(chunk.chars().take(15));
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn no_overlap_partitions_text() {
    let chunks = chunk_text("0123456789abcdefghij", 5, 0).expect("valid window");
    assert_eq!(chunks, vec!["01234", "56789", "abcde", "fghij"]);
    assert_eq!(chunks.concat(), "0123456789abcdefghij");
}

#[test]
fn short_trailing_window_is_dropped() {
    // 105 chars, window 100, no overlap: the trailing window holds 5 chars (< 10)
    let text = "x".repeat(105);
    let chunks = chunk_text(&text, 100, 0).expect("valid window");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].len(), 100);

    // 110 chars leaves exactly 10% which is kept
    let text = "x".repeat(110);
    let chunks = chunk_text(&text, 100, 0).expect("valid window");
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].len(), 10);
}

#[test]
fn empty_text_yields_no_chunks() {
    let chunks = chunk_text("", 10, 2).expect("valid window");
    assert!(chunks.is_empty());
}

#[test]
fn short_text_fits_in_one_window() {
    let chunks = chunk_text("hello", 8, 2).expect("valid window");
    assert_eq!(chunks, vec!["hello"]);
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    assert!(matches!(chunk_text(DATA, 10, 10), Err(RagError::Config(_))));
    assert!(matches!(chunk_text(DATA, 10, 11), Err(RagError::Config(_))));
    assert!(matches!(chunk_text(DATA, 0, 0), Err(RagError::Config(_))));
}

#[test]
fn chunking_is_deterministic() {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
    let first = chunk_text(&text, 64, 16).expect("valid window");
    let second = chunk_text(&text, 64, 16).expect("valid window");
    assert_eq!(first, second);
}

#[test]
fn multibyte_text_is_split_on_char_boundaries() {
    let text = "héllo wörld ünïcode ✓✓✓";
    let chunks = chunk_text(text, 6, 2).expect("valid window");

    assert!(!chunks.is_empty());
    assert_eq!(chunks[0], "héllo ");
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 6);
    }
}

#[test]
fn fractional_overlap_is_rounded() {
    let config = ChunkingConfig {
        chunk_size: 10,
        overlap_fraction: 0.15,
    };
    assert_eq!(config.absolute_overlap().expect("valid overlap"), 2);

    let config = ChunkingConfig {
        chunk_size: 4000,
        overlap_fraction: 0.15,
    };
    assert_eq!(config.absolute_overlap().expect("valid overlap"), 600);
}

#[test]
fn invalid_overlap_fraction_is_rejected() {
    let config = ChunkingConfig {
        chunk_size: 10,
        overlap_fraction: 1.0,
    };
    assert!(matches!(config.absolute_overlap(), Err(RagError::Config(_))));

    let config = ChunkingConfig {
        chunk_size: 10,
        overlap_fraction: -0.1,
    };
    assert!(matches!(config.absolute_overlap(), Err(RagError::Config(_))));

    // 0.96 * 10 rounds to 10, which would never advance
    let config = ChunkingConfig {
        chunk_size: 10,
        overlap_fraction: 0.96,
    };
    assert!(matches!(config.absolute_overlap(), Err(RagError::Config(_))));
}

#[test]
fn split_uses_configured_overlap() {
    let config = ChunkingConfig {
        chunk_size: 10,
        overlap_fraction: 0.1,
    };
    let chunks = config.split(DATA).expect("valid config");
    assert_eq!(chunks[0], "adam green");
    assert_eq!(chunks[1], "n, bob blu");
}
