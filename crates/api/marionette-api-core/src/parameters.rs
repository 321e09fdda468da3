//! Parameter-valued core model contract.
//!
//! The concrete core model belongs to a vendor runtime. Motion runtimes only
//! ever read and write named scalar parameters, which is what [`CoreModel`]
//! exposes. [`ParameterTable`] is the in-memory implementation used by the
//! reference runtime and by tests.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub trait CoreModel {
    fn parameter(&self, id: &str) -> Option<f32>;

    /// Write a parameter. Returns false when the model has no such id.
    fn set_parameter(&mut self, id: &str, value: f32) -> bool;
}

/// Ordered parameter id → value table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    values: IndexMap<String, f32>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, id: impl Into<String>, value: f32) -> Self {
        self.values.insert(id.into(), value);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: f32) -> Option<f32> {
        self.values.insert(id.into(), value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl CoreModel for ParameterTable {
    fn parameter(&self, id: &str) -> Option<f32> {
        self.values.get(id).copied()
    }

    fn set_parameter(&mut self, id: &str, value: f32) -> bool {
        match self.values.get_mut(id) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
