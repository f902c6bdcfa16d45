//! Hyperparameter grids

use crate::error::{PolyError, Result};
use crate::training::{ParamSet, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Candidate values per parameter name.
///
/// Expands to the cartesian product of all lists. Names are kept sorted and
/// the last name varies fastest, so the candidate order is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the candidate list of one parameter
    pub fn with<V: Into<ParamValue>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.insert(name, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn insert(&mut self, name: &str, values: Vec<ParamValue>) {
        self.params.insert(name.to_string(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.params.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Size of the cartesian product
    pub fn n_candidates(&self) -> usize {
        self.params.values().map(Vec::len).product()
    }

    /// Reject parameters with no candidate values
    pub fn validate(&self) -> Result<()> {
        for (name, values) in &self.params {
            if values.is_empty() {
                return Err(PolyError::config(format!(
                    "grid parameter '{}' has an empty candidate list",
                    name
                )));
            }
        }
        Ok(())
    }

    /// All parameter combinations in deterministic order
    pub fn candidates(&self) -> Result<Vec<ParamSet>> {
        self.validate()?;

        let mut combos = vec![ParamSet::new()];
        for (name, values) in &self.params {
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    values.iter().map(move |value| {
                        let mut next = combo.clone();
                        next.insert(name.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(combos)
    }
}

impl From<BTreeMap<String, Vec<ParamValue>>> for ParamGrid {
    fn from(params: BTreeMap<String, Vec<ParamValue>>) -> Self {
        Self { params }
    }
}
