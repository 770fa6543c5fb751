//! Lexical topic segmentation over ASR words
//!
//! A lightweight TextTiling: cosine similarity between bag-of-words of
//! adjacent token blocks, smoothed, with boundaries at similarity valleys.
//! Robust to ASR noise and cheap enough to recompute as transcripts grow.

use std::collections::HashMap;

use highlight_core::WordItem;

/// Tuning parameters for [`text_tiling_boundaries`].
#[derive(Debug, Clone, Copy)]
pub struct TilingParams {
    /// Tokens per comparison block (B)
    pub block_size: usize,
    /// Token stride between comparisons (S)
    pub step: usize,
    /// Moving-average radius over the similarity curve
    pub smoothing_width: usize,
    /// Valley cutoff: mean - cutoff_std * std
    pub cutoff_std: f64,
}

impl Default for TilingParams {
    fn default() -> Self {
        Self {
            block_size: 20,
            step: 10,
            smoothing_width: 2,
            cutoff_std: 0.5,
        }
    }
}

/// Compute topic boundaries from a flat word stream.
///
/// Words must carry absolute `start_time`s. Only pronunciation tokens are
/// used; tokens are lowercased and stripped of punctuation. Returns a sorted
/// list of boundary timestamps, deduplicated to 0.5s granularity, or an
/// empty list when fewer than `2 * block_size` usable tokens exist.
pub fn text_tiling_boundaries(words: &[WordItem], params: &TilingParams) -> Vec<f64> {
    let mut tokens: Vec<String> = Vec::new();
    let mut times: Vec<f64> = Vec::new();
    for word in words {
        if !word.is_spoken() {
            continue;
        }
        let normalized = normalize_token(&word.content);
        if normalized.is_empty() {
            continue;
        }
        tokens.push(normalized);
        times.push(word.start_time);
    }

    let n = tokens.len();
    let block = params.block_size;
    if block == 0 || params.step == 0 || n < 2 * block {
        return Vec::new();
    }

    let mut sims: Vec<f64> = Vec::new();
    let mut centers: Vec<usize> = Vec::new();
    let mut i = block;
    while i + block <= n {
        let left = bag_of_words(&tokens[i - block..i]);
        let right = bag_of_words(&tokens[i..i + block]);
        sims.push(cosine_similarity(&left, &right));
        centers.push(i);
        i += params.step;
    }

    if params.smoothing_width > 1 && sims.len() >= 2 {
        sims = smooth(&sims, params.smoothing_width);
    }

    let mean = sims.iter().sum::<f64>() / sims.len() as f64;
    let var = sims.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
        / (sims.len().saturating_sub(1).max(1)) as f64;
    let cutoff = mean - params.cutoff_std * var.sqrt();

    let mut boundaries: Vec<f64> = Vec::new();
    for j in 1..sims.len().saturating_sub(1) {
        if sims[j] < sims[j - 1] && sims[j] < sims[j + 1] && sims[j] < cutoff {
            let idx = centers[j];
            if idx < times.len() {
                boundaries.push((times[idx] * 1000.0).round() / 1000.0);
            }
        }
    }

    boundaries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    dedupe_close(&boundaries, 0.5)
}

fn normalize_token(token: &str) -> String {
    token
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '\'')
        .collect()
}

fn bag_of_words<'a>(tokens: &'a [String]) -> HashMap<&'a str, u32> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
}

fn cosine_similarity(a: &HashMap<&str, u32>, b: &HashMap<&str, u32>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(k, &va)| b.get(k).map(|&vb| va as f64 * vb as f64))
        .sum();
    let norm_a: f64 = a.values().map(|&v| (v as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|&v| (v as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn smooth(sims: &[f64], radius: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(sims.len());
    for j in 0..sims.len() {
        let lo = j.saturating_sub(radius);
        let hi = (j + radius + 1).min(sims.len());
        out.push(sims[lo..hi].iter().sum::<f64>() / (hi - lo) as f64);
    }
    out
}

fn dedupe_close(sorted: &[f64], min_gap: f64) -> Vec<f64> {
    let mut deduped: Vec<f64> = Vec::new();
    for &b in sorted {
        match deduped.last() {
            Some(&last) if (b - last).abs() <= min_gap => {}
            _ => deduped.push(b),
        }
    }
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlight_core::ItemType;

    fn spoken(content: &str, start: f64) -> WordItem {
        WordItem {
            content: content.to_string(),
            start_time: start,
            end_time: start + 0.3,
            item_type: ItemType::Pronunciation,
        }
    }

    fn vocab_stream(counts: &[(usize, [&str; 2])], spacing: f64) -> Vec<WordItem> {
        let mut words = Vec::new();
        let mut t = 0.0;
        for &(count, vocab) in counts {
            for i in 0..count {
                words.push(spoken(vocab[i % 2], t));
                t += spacing;
            }
        }
        words
    }

    #[test]
    fn test_too_few_tokens_returns_empty() {
        let words: Vec<WordItem> = (0..39).map(|i| spoken("word", i as f64 * 0.5)).collect();
        assert!(text_tiling_boundaries(&words, &TilingParams::default()).is_empty());
    }

    #[test]
    fn test_punctuation_tokens_ignored() {
        let mut words: Vec<WordItem> = (0..50).map(|i| spoken("word", i as f64 * 0.5)).collect();
        for word in words.iter_mut().step_by(3) {
            word.item_type = ItemType::Punctuation;
        }
        // 33 usable tokens < 2 * 20
        assert!(text_tiling_boundaries(&words, &TilingParams::default()).is_empty());
    }

    #[test]
    fn test_vocabulary_shift_yields_valley_boundary() {
        // 80 words of one vocabulary, then 40 of a different one. With
        // smoothing disabled the valley at the transition is a strict local
        // minimum well below the cutoff.
        let words = vocab_stream(&[(80, ["goal", "striker"]), (40, ["market", "shares"])], 0.5);
        let params = TilingParams {
            smoothing_width: 1,
            ..TilingParams::default()
        };
        let boundaries = text_tiling_boundaries(&words, &params);
        assert_eq!(boundaries.len(), 1);
        // The valley center lands at the first token of the new vocabulary.
        assert!((boundaries[0] - 40.0).abs() < 1e-9, "got {}", boundaries[0]);
    }

    #[test]
    fn test_uniform_vocabulary_has_no_boundaries() {
        let words = vocab_stream(&[(120, ["steady", "commentary"])], 0.5);
        let params = TilingParams {
            smoothing_width: 1,
            ..TilingParams::default()
        };
        assert!(text_tiling_boundaries(&words, &params).is_empty());
    }

    #[test]
    fn test_output_sorted_and_deduped() {
        let words = vocab_stream(
            &[
                (60, ["goal", "striker"]),
                (40, ["market", "shares"]),
                (60, ["weather", "storm"]),
            ],
            0.25,
        );
        let params = TilingParams {
            smoothing_width: 1,
            ..TilingParams::default()
        };
        let boundaries = text_tiling_boundaries(&words, &params);
        for pair in boundaries.windows(2) {
            assert!(pair[1] - pair[0] > 0.5);
        }
    }

    #[test]
    fn test_dedupe_close() {
        let sorted = vec![1.0, 1.2, 1.8, 5.0];
        assert_eq!(dedupe_close(&sorted, 0.5), vec![1.0, 1.8, 5.0]);
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("Hello,"), "hello");
        assert_eq!(normalize_token("it's"), "it's");
        assert_eq!(normalize_token("—"), "");
    }
}
