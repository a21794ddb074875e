//! Negative tail sampling.

use rand::Rng;

/// Draws a corrupted tail uniformly from every known entity except the true
/// tail.
#[derive(Debug, Clone, Copy)]
pub struct UniformTailSampler {
    entity_count: usize,
}

impl UniformTailSampler {
    pub fn new(entity_count: usize) -> Self {
        Self { entity_count }
    }

    /// One negative tail index, or `None` when `tail` is the only entity.
    pub fn sample<R: Rng + ?Sized>(&self, tail: usize, rng: &mut R) -> Option<usize> {
        let alternatives = if tail < self.entity_count {
            self.entity_count - 1
        } else {
            self.entity_count
        };
        if alternatives == 0 {
            return None;
        }
        let pick = rng.gen_range(0..alternatives);
        // Shift past the true tail so every other index is equally likely.
        Some(if tail < self.entity_count && pick >= tail {
            pick + 1
        } else {
            pick
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn never_returns_the_true_tail() {
        let sampler = UniformTailSampler::new(5);
        let mut rng = StdRng::seed_from_u64(7);
        for tail in 0..5 {
            for _ in 0..200 {
                let neg = sampler.sample(tail, &mut rng).unwrap();
                assert_ne!(neg, tail);
                assert!(neg < 5);
            }
        }
    }

    #[test]
    fn covers_every_alternative() {
        let sampler = UniformTailSampler::new(4);
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = [false; 4];
        for _ in 0..400 {
            seen[sampler.sample(2, &mut rng).unwrap()] = true;
        }
        assert_eq!(seen, [true, true, false, true]);
    }

    #[test]
    fn no_alternative_entity() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(UniformTailSampler::new(1).sample(0, &mut rng), None);
        assert_eq!(UniformTailSampler::new(0).sample(0, &mut rng), None);
    }
}
