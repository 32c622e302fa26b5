//! Token counting and truncation against a model's vocabulary.
//!
//! [`BpeTokenizer`] is exact: it uses the same byte-pair encoding the
//! OpenAI chat models use, so counts match what the backend will bill and
//! enforce. [`ApproxTokenizer`] is a character heuristic kept for models with
//! no known encoding; it reports `is_exact() == false`.

use crate::error::Result;
use crate::PipelineError;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Token counting and truncation.
///
/// Implementations must guarantee `count(&truncate(t, n)) <= n` and return
/// `t` unchanged when it already fits.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens `text` consumes.
    fn count(&self, text: &str) -> usize;

    /// Longest token-prefix of `text` that fits within `max_tokens`, decoded
    /// back to a string.
    fn truncate(&self, text: &str, max_tokens: usize) -> String;

    /// `false` for heuristic tokenizers whose counts are estimates.
    fn is_exact(&self) -> bool;
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn count(&self, text: &str) -> usize {
        (*self).count(text)
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        (*self).truncate(text, max_tokens)
    }

    fn is_exact(&self) -> bool {
        (*self).is_exact()
    }
}

/// Exact tokenizer backed by `tiktoken`.
pub struct BpeTokenizer {
    bpe: CoreBPE,
    encoding: &'static str,
}

impl BpeTokenizer {
    /// `cl100k_base`, the encoding used by `gpt-4` and `gpt-3.5-turbo`.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| PipelineError::InvalidConfig(format!("cl100k_base: {}", e)))?;
        Ok(Self {
            bpe,
            encoding: "cl100k_base",
        })
    }

    /// Tokenizer for a specific model id.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            PipelineError::InvalidConfig(format!("no tokenizer for model '{}': {}", model, e))
        })?;
        Ok(Self {
            bpe,
            encoding: "model",
        })
    }

    fn encode(&self, text: &str) -> Vec<tiktoken_rs::Rank> {
        self.bpe.encode_ordinary(text)
    }

    /// Decode the longest prefix of `tokens[..end]` that is valid UTF-8.
    ///
    /// A token boundary can fall inside a multi-byte character; those
    /// prefixes do not decode and are shortened one token at a time.
    fn decode_prefix(&self, tokens: &[tiktoken_rs::Rank], mut end: usize) -> (String, usize) {
        while end > 0 {
            if let Ok(text) = self.bpe.decode(tokens[..end].to_vec()) {
                return (text, end);
            }
            end -= 1;
        }
        (String::new(), 0)
    }
}

impl std::fmt::Debug for BpeTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BpeTokenizer")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Tokenizer for BpeTokenizer {
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.encode(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        let (mut prefix, mut end) = self.decode_prefix(&tokens, max_tokens);
        // Re-encoding a decoded prefix can merge differently at the cut.
        while end > 0 && self.count(&prefix) > max_tokens {
            let next = self.decode_prefix(&tokens, end - 1);
            prefix = next.0;
            end = next.1;
        }
        prefix
    }

    fn is_exact(&self) -> bool {
        true
    }
}

/// Character-based estimate: one token per four characters, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenizer;

const CHARS_PER_TOKEN: usize = 4;

impl Tokenizer for ApproxTokenizer {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        if self.count(text) <= max_tokens {
            return text.to_string();
        }
        text.chars().take(max_tokens * CHARS_PER_TOKEN).collect()
    }

    fn is_exact(&self) -> bool {
        false
    }
}

/// Pick the best tokenizer for `model`: an exact BPE encoding when one is
/// known, otherwise [`ApproxTokenizer`].
pub fn tokenizer_for_model(model: &str) -> Box<dyn Tokenizer> {
    match BpeTokenizer::for_model(model).or_else(|_| BpeTokenizer::cl100k()) {
        Ok(bpe) => Box::new(bpe),
        Err(e) => {
            warn!(model, error = %e, "no BPE encoding available; token counts are approximate");
            Box::new(ApproxTokenizer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bpe() -> BpeTokenizer {
        BpeTokenizer::cl100k().expect("cl100k_base")
    }

    fn long_text() -> String {
        "The quick brown fox jumps over the lazy dog. ".repeat(200)
    }

    #[test]
    fn test_count_matches_known_encoding() {
        // "hello world" is two tokens in cl100k_base.
        assert_eq!(bpe().count("hello world"), 2);
        assert_eq!(bpe().count(""), 0);
    }

    #[test]
    fn test_truncate_within_budget() {
        let tok = bpe();
        let text = long_text();
        for n in [0, 1, 7, 64, 500] {
            let out = tok.truncate(&text, n);
            assert!(tok.count(&out) <= n, "budget {} produced {}", n, tok.count(&out));
        }
    }

    #[test]
    fn test_truncate_noop_below_budget() {
        let tok = bpe();
        let text = "A short transcript line.";
        let n = tok.count(text);
        assert_eq!(tok.truncate(text, n), text);
        assert_eq!(tok.truncate(text, n + 10), text);
    }

    #[test]
    fn test_truncate_is_token_prefix() {
        let tok = bpe();
        let text = long_text();
        let full = tok.encode(&text);
        let out = tok.truncate(&text, 50);
        let prefix = tok.encode(&out);
        assert!(text.starts_with(&out));
        assert_eq!(&full[..prefix.len()], &prefix[..]);
    }

    #[test]
    fn test_truncate_idempotent() {
        let tok = bpe();
        let text = long_text();
        let once = tok.truncate(&text, 100);
        let twice = tok.truncate(&once, 100);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_truncate_multibyte_stays_valid() {
        let tok = bpe();
        let text = "日本語のテキストと絵文字 🎉🎉🎉 が混ざった文章です。".repeat(20);
        for n in 1..40 {
            let out = tok.truncate(&text, n);
            assert!(tok.count(&out) <= n);
            assert!(text.starts_with(&out));
        }
    }

    #[test]
    fn test_for_model_gpt4() {
        let tok = BpeTokenizer::for_model("gpt-4").expect("gpt-4 encoding");
        assert!(tok.is_exact());
        assert_eq!(tok.count("hello world"), 2);
    }

    #[test]
    fn test_tokenizer_for_unknown_model_still_exact() {
        let tok = tokenizer_for_model("some-local-model");
        assert!(tok.is_exact());
    }

    #[test]
    fn test_approx_count_and_truncate() {
        let tok = ApproxTokenizer;
        assert!(!tok.is_exact());
        assert_eq!(tok.count("abcd"), 1);
        assert_eq!(tok.count("abcde"), 2);

        let text = "é".repeat(100);
        let out = tok.truncate(&text, 5);
        assert_eq!(out.chars().count(), 20);
        assert!(tok.count(&out) <= 5);
        assert_eq!(tok.truncate(&out, 5), out);
    }

    #[test]
    fn test_truncate_respects_budget_across_inputs() {
        let texts = [
            String::new(),
            "a".to_string(),
            "hello world".to_string(),
            "  leading and trailing whitespace \n\n".to_string(),
            "naïve café façade résumé ".repeat(30),
            "🎉".repeat(50),
            "fn main() { println!(\"{}\", 1 + 2); }\n".repeat(25),
            long_text(),
        ];
        let exact = bpe();
        let approx = ApproxTokenizer;
        let tokenizers: [&dyn Tokenizer; 2] = [&exact, &approx];

        for tok in tokenizers {
            for text in &texts {
                let full = tok.count(text);
                // Exactly at the budget, just under it, and well below it.
                for n in [full, full.saturating_sub(1), full / 2, 1, 0] {
                    let out = tok.truncate(text, n);
                    assert!(
                        tok.count(&out) <= n,
                        "{:?} over budget {}: {}",
                        text.chars().take(20).collect::<String>(),
                        n,
                        tok.count(&out)
                    );
                    assert!(text.starts_with(&out));
                }
                assert_eq!(&tok.truncate(text, full), text);
            }
        }
    }
}
