use crate::error::{EmbeddingError, Result};
use crate::Embedder;

/// Hash-seeded vectors: the same text always maps to the same vector.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "stub embedding dimension must be greater than zero".to_string(),
            ));
        }
        log::info!("Using stub embeddings (dim {dimension})");
        Ok(Self { dimension })
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Embedder for StubEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| stub_embed(text, self.dimension))
            .collect())
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (0..dimension)
        .map(|_| {
            let bits = splitmix64(&mut state);
            let mantissa = ((bits >> 32) as u32) >> 9;
            let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
            unit.mul_add(2.0, -1.0)
        })
        .collect()
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_are_deterministic_and_sized() {
        let embedder = StubEmbedder::new(16).unwrap();
        let texts = vec!["two plus two".to_string(), "fractions".to_string()];
        let first = embedder.embed_batch(&texts).unwrap();
        let second = embedder.embed_batch(&texts).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|v| v.len() == 16));
        assert_ne!(first[0], first[1]);
        assert!(first[0].iter().all(|x| (-1.0..=1.0).contains(x)));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(StubEmbedder::new(0).is_err());
    }
}
