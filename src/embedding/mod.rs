//! Entity and relation embeddings.
//!
//! - [`Dimension`]: the fixed vector length of a store
//! - [`registry::Registry`]: append-only id → index registry
//! - [`store::EmbeddingStore`]: owned, explicitly passed vectors for every
//!   known entity and relation type
//!
//! The free functions here are the small amount of dense vector arithmetic
//! the scorer, the training loops and the prediction engines share.

pub mod registry;
pub mod store;

use serde::{Deserialize, Serialize};

/// Embedding dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension(pub usize);

impl Dimension {
    /// Default dimension for production models.
    pub const DEFAULT: Self = Self(128);

    /// Small dimension for fast tests.
    pub const TEST: Self = Self(16);
}

impl Default for Dimension {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dense embedding vector.
pub type Embedding = Vec<f32>;

/// Component-wise `a + b`.
pub fn add(a: &[f32], b: &[f32]) -> Embedding {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

/// Component-wise `h + r - t`.
pub fn translate(h: &[f32], r: &[f32], t: &[f32]) -> Embedding {
    debug_assert_eq!(h.len(), r.len());
    debug_assert_eq!(h.len(), t.len());
    h.iter()
        .zip(r)
        .zip(t)
        .map(|((h, r), t)| h + r - t)
        .collect()
}

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Dot product.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Component-wise mean of a set of equal-length vectors; `None` if empty.
pub fn mean<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Option<Embedding> {
    let mut iter = vectors.into_iter();
    let mut acc: Embedding = iter.next()?.to_vec();
    let mut n = 1usize;
    for v in iter {
        debug_assert_eq!(v.len(), acc.len());
        for (a, x) in acc.iter_mut().zip(v) {
            *a += x;
        }
        n += 1;
    }
    let n = n as f32;
    acc.iter_mut().for_each(|a| *a /= n);
    Some(acc)
}
