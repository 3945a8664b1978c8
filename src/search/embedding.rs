//! Embedding providers
//!
//! The retrieval core only needs "text → fixed-length vector". Providers
//! implement [`EmbeddingProvider`]; callers go through [`embed_or_zero`],
//! which turns every failure into the all-zero sentinel vector.
//!
//! The built-in [`HarmonicEmbedder`] is a deterministic, training-free
//! Harmonic Token Projection (https://arxiv.org/html/2511.20665):
//! each token is read as a base-2^16 integer, reduced modulo a set of
//! coprime moduli, and every residue is projected onto the unit circle.
//! Token vectors are mean-pooled and L2-normalized.

use std::f64::consts::PI;

use tracing::{debug, warn};

use crate::core::error::EmbeddingError;

/// Output dimension of the harmonic embedder (2 per modulus)
pub const EMBEDDING_DIM: usize = 384;

const NUM_MODULI: usize = EMBEDDING_DIM / 2;

/// Code points per token taken into account
const MAX_TOKEN_LENGTH: usize = 64;

/// First NUM_MODULI primes, coprime by construction
static COPRIME_MODULI: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313, 317,
    331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607,
    613, 617, 619, 631, 641, 643, 647, 653, 659, 661, 673, 677, 683, 691, 701,
    709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787, 797, 809, 811,
    821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911,
    919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997, 1009, 1013,
    1019, 1021, 1031, 1033, 1039, 1049, 1051, 1061, 1063, 1069, 1087, 1091,
    1093, 1097, 1103, 1109, 1117, 1123, 1129, 1151, 1153, 1163, 1171, 1181,
];

/// Maps text to a fixed-dimension vector
///
/// Implementations must be deterministic for a fixed `model_id`.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier recorded in the store so incompatible indexes are detected
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Embed `text`, degrading to the zero vector on empty input or failure
pub fn embed_or_zero(provider: &dyn EmbeddingProvider, text: &str) -> Vec<f32> {
    let dim = provider.dimension();
    if text.trim().is_empty() {
        debug!("empty text, using zero vector");
        return vec![0.0; dim];
    }

    match provider.embed(text) {
        Ok(vector) if vector.len() == dim => vector,
        Ok(vector) => {
            let err = EmbeddingError::Malformed {
                expected: dim,
                actual: vector.len(),
            };
            warn!(model = provider.model_id(), error = %err, "embedding degraded to zero vector");
            vec![0.0; dim]
        }
        Err(err) => {
            warn!(model = provider.model_id(), error = %err, "embedding degraded to zero vector");
            vec![0.0; dim]
        }
    }
}

/// Deterministic harmonic token projection embedder
pub struct HarmonicEmbedder {
    moduli: Vec<u64>,
}

impl HarmonicEmbedder {
    pub const MODEL_ID: &'static str = "htp-384-v1";

    pub fn new() -> Self {
        Self {
            moduli: COPRIME_MODULI[..NUM_MODULI].to_vec(),
        }
    }

    fn embed_token(&self, token: &str, acc: &mut [f64]) {
        let n = token_to_integer(token);
        for (i, &m) in self.moduli.iter().enumerate() {
            let theta = 2.0 * PI * ((n % m) as f64) / (m as f64);
            acc[2 * i] += theta.sin();
            acc[2 * i + 1] += theta.cos();
        }
    }
}

impl Default for HarmonicEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HarmonicEmbedder {
    fn model_id(&self) -> &str {
        Self::MODEL_ID
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIM]);
        }

        let mut sum = vec![0.0f64; EMBEDDING_DIM];
        for token in &tokens {
            self.embed_token(token, &mut sum);
        }

        let count = tokens.len() as f64;
        for val in &mut sum {
            *val /= count;
        }

        let norm: f64 = sum.iter().map(|x| x * x).sum::<f64>().sqrt();
        let embedding = if norm > 0.0 {
            sum.iter().map(|x| (*x / norm) as f32).collect()
        } else {
            sum.iter().map(|x| *x as f32).collect()
        };

        Ok(embedding)
    }
}

/// N = Σ u_j · B^(L-j) with B = 2^16, wrapping on overflow
fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_LENGTH)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

/// Lower-cased word tokens; any non-alphanumeric character separates words
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero-norm inputs
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
