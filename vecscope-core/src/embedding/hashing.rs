//! Feature-hashing embeddings
//!
//! Deterministic and dependency-free: every lowercase token is hashed into a
//! signed one-hot vector, token vectors are mean-pooled, then L2-normalized.
//! Only lexical overlap is captured, which is enough for offline runs.

use super::{l2_normalize, TextEmbedder};
use crate::error::{Result, VecscopeError};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Offline embedder mapping tokens to hashed buckets
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VecscopeError::invalid_input(
                "hashing dimension must be positive",
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut pooled = vec![0.0_f32; self.dimension];
        let mut tokens = 0usize;

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            pooled[bucket] += sign;
            tokens += 1;
        }

        if tokens > 0 {
            let scale = 1.0 / tokens as f32;
            pooled.iter_mut().for_each(|x| *x *= scale);
        }
        l2_normalize(&mut pooled);
        pooled
    }
}

impl TextEmbedder for HashingEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
