//! Per-element typed field store.
//!
//! Each element owns one `ElementFields`: a key-value store of statically
//! named, heterogeneously typed fields. Creation is append-only and happens
//! during local initialization; afterwards actions mutate fields in place
//! through typed accessors. No element ever touches another element's store.

use std::any::Any;
use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};

/// Append-only, typed field storage private to one element.
#[derive(Default)]
pub struct ElementFields {
    fields: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl ElementFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a field. A second create under the same name fails: the
    /// initial field set is fixed once local initialization has run.
    pub fn create<T: Send + 'static>(&mut self, name: &'static str, value: T) -> Result<()> {
        if self.fields.contains_key(name) {
            bail!("field {name:?} already created");
        }
        self.fields.insert(name, Box::new(value));
        Ok(())
    }

    pub fn get<T: 'static>(&self, name: &'static str) -> Result<&T> {
        self.fields
            .get(name)
            .ok_or_else(|| anyhow!("field {name:?} not created"))?
            .downcast_ref::<T>()
            .ok_or_else(|| anyhow!("field {name:?} holds a different type"))
    }

    pub fn get_mut<T: 'static>(&mut self, name: &'static str) -> Result<&mut T> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| anyhow!("field {name:?} not created"))?
            .downcast_mut::<T>()
            .ok_or_else(|| anyhow!("field {name:?} holds a different type"))
    }

    pub fn contains(&self, name: &'static str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl std::fmt::Debug for ElementFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementFields")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}
