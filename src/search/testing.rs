//! Test doubles for the embedding seam

use std::collections::HashMap;

use super::embedding::EmbeddingProvider;
use crate::core::error::EmbeddingError;

/// Returns fixed vectors for known texts and zeros for anything else
pub struct StubEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl StubEmbedder {
    pub fn new<const N: usize>(dimension: usize, vectors: &[(&str, [f32; N])]) -> Self {
        Self {
            dimension,
            vectors: vectors
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
        }
    }
}

impl EmbeddingProvider for StubEmbedder {
    fn model_id(&self) -> &str {
        "stub"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.dimension]))
    }
}
