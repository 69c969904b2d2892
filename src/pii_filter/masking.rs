// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Masking strategies for detected PII

use sha2::{Digest, Sha256};
use std::borrow::Cow;
use uuid::Uuid;

use super::config::{MaskingStrategy, PIIConfig};
use super::detector::Detection;

/// Hex characters of the SHA-256 digest kept in a hash marker
const HASH_DIGEST_LEN: usize = 16;

const MASK_CHAR: char = '*';

/// Apply masking to detected PII in text
///
/// Detections must not overlap. Each detection's `replacement` is set to the
/// value substituted for it.
pub fn mask_pii<'a>(
    text: &'a str,
    detections: &mut [Detection],
    config: &PIIConfig,
) -> Cow<'a, str> {
    if detections.is_empty() {
        // Zero-copy optimization when no masking needed
        return Cow::Borrowed(text);
    }

    // Replace from the end so earlier offsets stay valid
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|a, b| detections[*b].start.cmp(&detections[*a].start));

    let mut result = text.to_string();
    for idx in order {
        let detection = &mut detections[idx];
        let masked = apply_mask_strategy(&detection.value, config.masking_strategy, config);
        result.replace_range(detection.start..detection.end, &masked);
        detection.replacement = Some(masked);
    }

    Cow::Owned(result)
}

/// Apply specific masking strategy to a value
pub fn apply_mask_strategy(value: &str, strategy: MaskingStrategy, config: &PIIConfig) -> String {
    match strategy {
        MaskingStrategy::Redact => config.redaction_text.clone(),
        MaskingStrategy::Partial => partial_mask(value, config.partial_reveal),
        MaskingStrategy::Hash => hash_mask(value),
        MaskingStrategy::Tokenize => tokenize_mask(),
    }
}

/// Partial masking - keep `reveal` chars at each end, star out the rest
///
/// Values too short to leave anything hidden are starred out entirely.
fn partial_mask(value: &str, reveal: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();

    let hidden = len.saturating_sub(reveal.saturating_mul(2));
    if hidden == 0 {
        return MASK_CHAR.to_string().repeat(len);
    }

    let mut masked = String::with_capacity(value.len());
    masked.extend(&chars[..reveal]);
    masked.extend(std::iter::repeat(MASK_CHAR).take(hidden));
    masked.extend(&chars[len - reveal..]);
    masked
}

/// Hash masking using SHA256
fn hash_mask(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("[HASH:{}]", &digest[..HASH_DIGEST_LEN])
}

/// Tokenize using UUID v4; the token-to-value mapping lives in an external vault
fn tokenize_mask() -> String {
    format!("[TOKEN:{}]", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(value: &str, start: usize) -> Detection {
        Detection {
            pattern_index: 0,
            value: value.to_string(),
            start,
            end: start + value.len(),
            replacement: None,
        }
    }

    #[test]
    fn test_partial_mask_email() {
        let result = partial_mask("john.doe@example.com", 2);
        assert_eq!(result, "jo****************om");
    }

    #[test]
    fn test_partial_mask_short_value() {
        assert_eq!(partial_mask("abcd", 2), "****");
        assert_eq!(partial_mask("abcde", 2), "ab*de");
        assert_eq!(partial_mask("abc", 0), "***");
    }

    #[test]
    fn test_partial_mask_huge_reveal() {
        assert_eq!(partial_mask("a@b.io", usize::MAX), "******");
        assert_eq!(partial_mask("a@b.io", usize::MAX / 2 + 1), "******");
    }

    #[test]
    fn test_partial_mask_multibyte() {
        assert_eq!(partial_mask("äöüßéè", 1), "ä****è");
    }

    #[test]
    fn test_hash_mask() {
        let result = hash_mask("sensitive");
        assert!(result.starts_with("[HASH:"));
        assert!(result.ends_with(']'));
        assert_eq!(result.len(), 7 + HASH_DIGEST_LEN); // [HASH:...]
        assert_eq!(result, hash_mask("sensitive"));
        assert_ne!(result, hash_mask("other"));
    }

    #[test]
    fn test_tokenize_mask() {
        let result = tokenize_mask();
        assert!(result.starts_with("[TOKEN:"));
        assert!(result.ends_with(']'));
        assert_ne!(result, tokenize_mask());
    }

    #[test]
    fn test_mask_pii_empty() {
        let config = PIIConfig::default();
        let text = "No PII here";

        let result = mask_pii(text, &mut [], &config);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, text);
    }

    #[test]
    fn test_mask_pii_records_replacements() {
        let config = PIIConfig::default();
        let text = "a 111 b 22 c";
        let mut detections = vec![detection("111", 2), detection("22", 8)];

        let result = mask_pii(text, &mut detections, &config);
        assert_eq!(result, "a [REDACTED] b [REDACTED] c");
        assert!(detections
            .iter()
            .all(|d| d.replacement.as_deref() == Some("[REDACTED]")));
    }
}
