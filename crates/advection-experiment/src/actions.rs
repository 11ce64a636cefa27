//! Actions evolving a scalar advection field on each element.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use element_kernel::{Action, ActionContext, ObservationId, TensorData, TypeOfObservation};

/// Field name for the advected scalar.
pub const FIELD_U: &str = "u";

/// First-order upwind update of the advected field.
///
/// Creates the field at local initialization (seeded per element, so
/// repeat runs are identical) and advances it by one explicit step per
/// invocation. The update is local to the element; the coupling across
/// element boundaries lives with the out-of-scope numerics.
#[derive(Debug, Clone)]
pub struct AdvectionStep {
    pub velocity: f64,
    pub seed: u64,
}

impl AdvectionStep {
    fn grid_spacing(points: usize) -> f64 {
        1.0 / points as f64
    }
}

impl Action for AdvectionStep {
    fn name(&self) -> &str {
        "advection_step"
    }

    fn initialize(&self, ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        let points = ctx.extents().first().copied().unwrap_or(2).max(2);
        let mut hasher = DefaultHasher::new();
        ctx.element().hash(&mut hasher);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ hasher.finish());
        let field: Vec<f64> = (0..points).map(|_| rng.gen_range(0.0..1.0)).collect();
        ctx.fields().create(FIELD_U, field)?;
        Ok(())
    }

    fn invoke(&self, ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        let dt = ctx.time().initial_dt;
        let points = ctx.extents().first().copied().unwrap_or(2).max(2);
        let courant = self.velocity * dt / Self::grid_spacing(points);

        let field = ctx.fields().get_mut::<Vec<f64>>(FIELD_U)?;
        let previous = field.clone();
        for (i, value) in field.iter_mut().enumerate() {
            let upwind = if i == 0 {
                previous[previous.len() - 1]
            } else {
                previous[i - 1]
            };
            *value = previous[i] - courant * (previous[i] - upwind);
        }
        Ok(())
    }
}

/// Emits observation contributions every `period` steps: the element's
/// squared L2 norm as reduction data and the field itself as volume data.
/// A period of zero never observes.
#[derive(Debug, Clone)]
pub struct ObserveField {
    pub period: u64,
}

impl Action for ObserveField {
    fn name(&self) -> &str {
        "observe_field"
    }

    fn invoke(&self, ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        // This runs after AdvectionStep in the pipeline, so the current
        // invocation has already advanced the field once.
        let completed = ctx.step() + 1;
        if self.period == 0 || completed % self.period != 0 {
            return Ok(());
        }

        let time = ctx.time();
        let observation_time = time.initial_time + completed as f64 * time.initial_dt;
        let observation = ObservationId::new(&completed, observation_time);

        let points = ctx.extents().first().copied().unwrap_or(2).max(2);
        let dx = 1.0 / points as f64;
        let field = ctx.fields().get::<Vec<f64>>(FIELD_U)?.clone();

        let norm_squared: f64 = field.iter().map(|value| value * value * dx).sum();
        let mut reduction = TensorData::new();
        reduction.insert("l2_norm_squared", vec![norm_squared]);
        ctx.emit(observation, TypeOfObservation::Reduction, reduction);

        // Volume components are element-qualified so the folded aggregate
        // keeps each element's buffer separate.
        let mut volume = TensorData::new();
        volume.insert(format!("{}@{}", FIELD_U, ctx.element()), field);
        ctx.emit(observation, TypeOfObservation::Volume, volume);

        Ok(())
    }
}
