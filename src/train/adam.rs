//! Adam optimiser (Kingma & Ba, 2014) over dense parameter rows.
//!
//! Moment state is created lazily per parameter row and each row keeps its
//! own step counter, so a row that receives no gradient in a step is neither
//! moved nor aged.

use std::collections::HashMap;

/// A trainable row: an entity or relation vector by registry index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Entity(usize),
    Relation(usize),
}

#[derive(Debug, Clone)]
struct Moments {
    m: Vec<f32>,
    v: Vec<f32>,
    step: i32,
}

#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    state: HashMap<Param, Moments>,
}

impl Adam {
    pub const BETA1: f32 = 0.9;
    pub const BETA2: f32 = 0.999;
    pub const EPS: f32 = 1e-8;

    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: Self::BETA1,
            beta2: Self::BETA2,
            eps: Self::EPS,
            state: HashMap::new(),
        }
    }

    /// Apply one bias-corrected update to `value` given its gradient.
    pub fn update(&mut self, param: Param, value: &mut [f32], grad: &[f32]) {
        debug_assert_eq!(value.len(), grad.len());
        let dim = value.len();
        let moments = self.state.entry(param).or_insert_with(|| Moments {
            m: vec![0.0; dim],
            v: vec![0.0; dim],
            step: 0,
        });
        moments.step += 1;
        let bc1 = 1.0 - self.beta1.powi(moments.step);
        let bc2 = 1.0 - self.beta2.powi(moments.step);

        for i in 0..dim {
            let g = grad[i];
            moments.m[i] = self.beta1 * moments.m[i] + (1.0 - self.beta1) * g;
            moments.v[i] = self.beta2 * moments.v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = moments.m[i] / bc1;
            let v_hat = moments.v[i] / bc2;
            value[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }

    /// Number of parameter rows with optimiser state.
    pub fn tracked(&self) -> usize {
        self.state.len()
    }

    /// Steps taken by one row.
    pub fn steps(&self, param: Param) -> usize {
        self.state.get(&param).map_or(0, |m| m.step as usize)
    }
}

/// Gradients for one optimiser step, merged per parameter row.
#[derive(Debug, Default)]
pub(crate) struct GradientBatch {
    rows: Vec<(Param, Vec<f32>)>,
}

impl GradientBatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `scale * grad` to the row's accumulated gradient.
    pub(crate) fn add(&mut self, param: Param, grad: &[f32], scale: f32) {
        match self.rows.iter_mut().find(|(p, _)| *p == param) {
            Some((_, acc)) => {
                for (a, g) in acc.iter_mut().zip(grad) {
                    *a += scale * g;
                }
            }
            None => self
                .rows
                .push((param, grad.iter().map(|g| scale * g).collect())),
        }
    }

    /// Step every accumulated row once.
    pub(crate) fn apply(
        self,
        optimizer: &mut Adam,
        entities: &mut [Vec<f32>],
        relations: &mut [Vec<f32>],
    ) {
        for (param, grad) in self.rows {
            let value = match param {
                Param::Entity(i) => &mut entities[i],
                Param::Relation(i) => &mut relations[i],
            };
            optimizer.update(param, value, &grad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        // With bias correction the first step is lr * sign(g).
        let mut adam = Adam::new(0.1);
        let mut value = vec![1.0, 1.0, 1.0];
        adam.update(Param::Entity(0), &mut value, &[2.0, -0.5, 0.0]);
        assert!((value[0] - 0.9).abs() < 1e-5);
        assert!((value[1] - 1.1).abs() < 1e-5);
        assert_eq!(value[2], 1.0);
    }

    #[test]
    fn state_is_per_row_and_lazy() {
        let mut adam = Adam::new(0.01);
        let mut a = vec![0.0; 2];
        adam.update(Param::Entity(3), &mut a, &[1.0, 1.0]);
        adam.update(Param::Entity(3), &mut a, &[1.0, 1.0]);
        let mut r = vec![0.0; 2];
        adam.update(Param::Relation(3), &mut r, &[1.0, 1.0]);

        assert_eq!(adam.tracked(), 2);
        assert_eq!(adam.steps(Param::Entity(3)), 2);
        assert_eq!(adam.steps(Param::Relation(3)), 1);
        assert_eq!(adam.steps(Param::Entity(0)), 0);
    }

    #[test]
    fn converges_on_a_quadratic() {
        // minimise (x - 3)^2
        let mut adam = Adam::new(0.1);
        let mut x = vec![0.0];
        for _ in 0..1000 {
            let grad = [2.0 * (x[0] - 3.0)];
            adam.update(Param::Relation(0), &mut x, &grad);
        }
        assert!((x[0] - 3.0).abs() < 0.1);
    }

    #[test]
    fn batch_merges_rows_before_stepping() {
        let mut batch = GradientBatch::new();
        batch.add(Param::Entity(0), &[1.0, 0.0], 1.0);
        batch.add(Param::Entity(0), &[-1.0, 0.0], 1.0);
        batch.add(Param::Relation(0), &[0.0, 2.0], -1.0);

        let mut entities = vec![vec![0.5, 0.5]];
        let mut relations = vec![vec![0.5, 0.5]];
        let mut adam = Adam::new(0.1);
        batch.apply(&mut adam, &mut entities, &mut relations);

        // The entity gradient cancelled out: the row is stepped but not moved.
        assert_eq!(entities[0], vec![0.5, 0.5]);
        assert_eq!(adam.steps(Param::Entity(0)), 1);
        assert!((relations[0][1] - 0.6).abs() < 1e-5);
    }
}
