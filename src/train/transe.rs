//! Static TransE training with a margin ranking loss.
//!
//! For every observed triple one corrupted tail is drawn and the loss
//!
//! ```text
//! max(0, ‖h + r - t‖ - ‖h + r - t'‖ + margin)
//! ```
//!
//! is minimised with one Adam step per triple. A triple whose loss is zero
//! still steps its rows with a zero gradient, so accumulated moments keep
//! acting on them.

use rand::Rng;

use crate::embedding::store::EmbeddingStore;
use crate::embedding::{l2_norm, translate};
use crate::graph::Triple;

use super::adam::{Adam, GradientBatch, Param};
use super::sampler::UniformTailSampler;
use super::{TrainingConfig, TrainingOutcome, TrainingReport, unit};

/// Train `store` on `triples`.
///
/// Triples whose head, relation or tail is not in the store are skipped.
/// Iteration order is the order of `triples`; negatives come from `rng`.
pub fn train<R: Rng + ?Sized>(
    store: &mut EmbeddingStore,
    triples: &[Triple],
    config: &TrainingConfig,
    rng: &mut R,
) -> TrainingReport {
    if let Err(reason) = config.check() {
        return TrainingReport::rejected(&reason);
    }
    let indexed = index_triples(store, triples);
    let sampler = UniformTailSampler::new(store.entities().len());

    if indexed.is_empty() || store.entities().len() < 2 {
        tracing::warn!(
            triples = triples.len(),
            "no usable triples for static training, store left unchanged"
        );
        return TrainingReport::empty();
    }

    tracing::info!(
        samples = indexed.len(),
        epochs = config.epochs,
        lr = config.learning_rate,
        "starting static training"
    );

    let mut entities = store.entity_vectors().to_vec();
    let mut relations = store.relation_vectors().to_vec();
    let mut optimizer = Adam::new(config.learning_rate);
    let mut loss_history = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        let mut total_loss = 0.0f32;
        let mut stepped = 0usize;

        for &(h, r, t) in &indexed {
            let Some(t_neg) = sampler.sample(t, rng) else {
                continue;
            };
            let p = translate(&entities[h], &relations[r], &entities[t]);
            let n = translate(&entities[h], &relations[r], &entities[t_neg]);
            let loss = (l2_norm(&p) - l2_norm(&n) + config.margin).max(0.0);
            total_loss += loss;
            stepped += 1;

            // The hinge is flat below zero.
            let active = if loss > 0.0 { 1.0 } else { 0.0 };
            let up = unit(&p);
            let un = unit(&n);
            let grad_h: Vec<f32> = up.iter().zip(&un).map(|(a, b)| a - b).collect();

            let mut batch = GradientBatch::new();
            batch.add(Param::Entity(h), &grad_h, active);
            batch.add(Param::Relation(r), &grad_h, active);
            batch.add(Param::Entity(t), &up, -active);
            batch.add(Param::Entity(t_neg), &un, active);
            batch.apply(&mut optimizer, &mut entities, &mut relations);
        }

        store.write_back(&entities, &relations);

        let mean_loss = if stepped > 0 {
            total_loss / stepped as f32
        } else {
            0.0
        };
        loss_history.push(mean_loss);
        tracing::info!(epoch = epoch + 1, loss = mean_loss, "static epoch finished");
    }

    TrainingReport {
        outcome: TrainingOutcome::Trained,
        epochs: config.epochs,
        samples: indexed.len(),
        loss_history,
    }
}

fn index_triples(store: &EmbeddingStore, triples: &[Triple]) -> Vec<(usize, usize, usize)> {
    triples
        .iter()
        .filter_map(|triple| {
            let h = store.entities().index_of(&triple.head);
            let r = store.relations().index_of(&triple.relation);
            let t = store.entities().index_of(&triple.tail);
            match (h, r, t) {
                (Some(h), Some(r), Some(t)) => Some((h, r, t)),
                _ => {
                    tracing::debug!(
                        head = %triple.head,
                        relation = %triple.relation,
                        tail = %triple.tail,
                        "skipping triple with unknown member"
                    );
                    None
                }
            }
        })
        .collect()
}
