//! Observation identities and tensor data.
//!
//! An [`ObservationId`] is the correlation key that lets independently
//! produced element contributions be matched to the same logical output
//! event. [`TensorData`] carries the contributed payload with a merge that
//! is commutative and associative, because arrival order across elements
//! is unspecified.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::element_id::ElementId;

/// Which output class an observation event belongs to.
///
/// Reduction and volume data are persisted under independent locks, so
/// the class decides which registry and which lock an event goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeOfObservation {
    Reduction,
    Volume,
    ReductionAndVolume,
}

impl TypeOfObservation {
    pub fn registers_reduction(self) -> bool {
        matches!(self, Self::Reduction | Self::ReductionAndVolume)
    }

    pub fn registers_volume(self) -> bool {
        matches!(self, Self::Volume | Self::ReductionAndVolume)
    }
}

/// Identity of one output event.
///
/// Two identities are equal iff both the hash and the value agree: a
/// matching hash with a differing value is a collision between logically
/// distinct events and must compare unequal. The value must be finite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObservationId {
    // Field order is the serialization order: hash, then value.
    hash: u64,
    value: f64,
}

impl ObservationId {
    /// Build an identity from a hashable temporal discriminant and an
    /// auxiliary value (typically the observation time).
    pub fn new<T: Hash>(temporal_id: &T, value: f64) -> Self {
        let mut hasher = DefaultHasher::new();
        temporal_id.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            value,
        }
    }

    /// Reconstruct an identity from its serialized parts.
    pub fn from_raw(hash: u64, value: f64) -> Self {
        Self { hash, value }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Stable key used when persisting aggregates: hash, then value.
    pub fn file_key(&self) -> String {
        format!("{:016x}:{}", self.hash, self.value)
    }
}

impl PartialEq for ObservationId {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.value == other.value
    }
}

impl Eq for ObservationId {}

impl Hash for ObservationId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}@{}", self.hash, self.value)
    }
}

/// Identifies the producing distributed component and the element within it.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ArrayComponentId {
    component: String,
    element: ElementId,
}

impl ArrayComponentId {
    pub fn new(component: impl Into<String>, element: ElementId) -> Self {
        Self {
            component: component.into(),
            element,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn element(&self) -> &ElementId {
        &self.element
    }
}

impl fmt::Display for ArrayComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.element)
    }
}

/// Named f64 buffers with component-wise accumulation as the merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    components: BTreeMap<String, Vec<f64>>,
}

impl TensorData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.components.insert(name.into(), values);
    }

    /// Merge another buffer into this one by component-wise addition.
    /// Shorter buffers are zero-padded, so the merge is total.
    pub fn merge(&mut self, other: &TensorData) {
        for (name, values) in &other.components {
            let entry = self.components.entry(name.clone()).or_default();
            if entry.len() < values.len() {
                entry.resize(values.len(), 0.0);
            }
            for (accumulated, value) in entry.iter_mut().zip(values) {
                *accumulated += value;
            }
        }
    }

    pub fn components(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Running aggregate for one observation event.
///
/// Contributions are keyed by the producing component and folded in key
/// order, so any arrival permutation of the same contribution set yields a
/// bit-identical final aggregate despite float addition not being
/// associative.
#[derive(Debug, Clone, Default)]
pub struct ObservationAggregate {
    contributions: BTreeMap<ArrayComponentId, TensorData>,
}

impl ObservationAggregate {
    pub fn contribute(&mut self, component: ArrayComponentId, data: &TensorData) {
        self.contributions.entry(component).or_default().merge(data);
    }

    pub fn contributor_count(&self) -> usize {
        self.contributions.len()
    }

    /// Fold all contributions in component order.
    pub fn fold(&self) -> TensorData {
        let mut folded = TensorData::new();
        for data in self.contributions.values() {
            folded.merge(data);
        }
        folded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(block: u32) -> ElementId {
        crate::element_id::initial_element_ids(block, &[1])
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn equality_requires_both_fields() {
        let a = ObservationId::from_raw(42, 1.5);
        let b = ObservationId::from_raw(42, 1.5);
        let c = ObservationId::from_raw(42, 2.5);
        assert_eq!(a, b);
        // Same hash, different value: distinct events (collision guard).
        assert_ne!(a, c);
    }

    #[test]
    fn hashing_uses_only_the_hash_field() {
        fn hash_of(id: &ObservationId) -> u64 {
            let mut hasher = DefaultHasher::new();
            Hash::hash(id, &mut hasher);
            hasher.finish()
        }
        let a = ObservationId::from_raw(42, 1.5);
        let c = ObservationId::from_raw(42, 2.5);
        assert_eq!(hash_of(&a), hash_of(&c));
        assert_ne!(a, c);
    }

    #[test]
    fn serializes_hash_then_value() {
        let id = ObservationId::from_raw(7, 0.5);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"hash":7,"value":0.5}"#);
        let back: ObservationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn temporal_discriminant_is_hashed_deterministically() {
        let a = ObservationId::new(&12_u64, 0.25);
        let b = ObservationId::new(&12_u64, 0.25);
        assert_eq!(a, b);
    }

    #[test]
    fn merge_is_commutative() {
        let mut left = TensorData::new();
        left.insert("u", vec![1.0, 2.0]);
        let mut right = TensorData::new();
        right.insert("u", vec![0.5, 0.5, 3.0]);

        let mut ab = left.clone();
        ab.merge(&right);
        let mut ba = right.clone();
        ba.merge(&left);
        assert_eq!(ab, ba);
        assert_eq!(ab.components()["u"], vec![1.5, 2.5, 3.0]);
    }

    #[test]
    fn fold_is_permutation_invariant() {
        let contributions: Vec<(ArrayComponentId, TensorData)> = (0..4)
            .map(|i| {
                let mut data = TensorData::new();
                data.insert("u", vec![0.1 * f64::from(i), 1.0 / f64::from(i + 1)]);
                (ArrayComponentId::new("array", element(i as u32)), data)
            })
            .collect();

        let mut forward = ObservationAggregate::default();
        for (component, data) in &contributions {
            forward.contribute(component.clone(), data);
        }
        let mut reversed = ObservationAggregate::default();
        for (component, data) in contributions.iter().rev() {
            reversed.contribute(component.clone(), data);
        }

        let a = forward.fold();
        let b = reversed.fold();
        // Bit-identical, not merely approximately equal.
        for (name, values) in a.components() {
            let other = &b.components()[name];
            for (x, y) in values.iter().zip(other) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }
}
