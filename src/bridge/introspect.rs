//! Flat introspection listings.
//!
//! Field order is part of the host boundary:
//!
//! - actions, lists: `id, name, description`
//! - parameters, push parameters: `id, name, description, type`
//! - tables: `count`, then per table `id, name, description, columnCount`
//!   followed by `name, displayName, type, T|F` per column

use super::Bridge;
use crate::plugin::{CapabilityKind, DataType, Registry};

impl Bridge {
    /// Flat listing of all actions.
    pub fn get_actions(&self) -> Vec<String> {
        triples(&self.snapshot(), CapabilityKind::Action)
    }

    /// Flat listing of all parameters.
    pub fn get_parameters(&self) -> Vec<String> {
        typed_quads(&self.snapshot(), CapabilityKind::Parameter)
    }

    /// Flat listing of all list parameters.
    pub fn get_lists(&self) -> Vec<String> {
        triples(&self.snapshot(), CapabilityKind::List)
    }

    /// Flat listing of all push parameters.
    pub fn get_push_parameters(&self) -> Vec<String> {
        typed_quads(&self.snapshot(), CapabilityKind::Push)
    }

    /// Flat listing of all tables, prefixed by the table count.
    ///
    /// With no tables registered the listing is `["0"]`.
    pub fn get_tables(&self) -> Vec<String> {
        let registry = self.snapshot();
        let mut out = vec![registry.count(CapabilityKind::Table).to_string()];

        for entry in registry.iter_kind(CapabilityKind::Table) {
            out.push(entry.id.to_string());
            out.push(entry.name.clone());
            out.push(entry.description.clone());
            out.push(entry.columns.len().to_string());

            for column in &entry.columns {
                out.push(column.name.clone());
                out.push(column.display_name.clone());
                out.push(column.data_type.code().to_string());
                out.push(if column.instance { "T" } else { "F" }.to_string());
            }
        }

        out
    }
}

fn triples(registry: &Registry, kind: CapabilityKind) -> Vec<String> {
    registry
        .iter_kind(kind)
        .flat_map(|entry| [entry.id.to_string(), entry.name.clone(), entry.description.clone()])
        .collect()
}

fn typed_quads(registry: &Registry, kind: CapabilityKind) -> Vec<String> {
    registry
        .iter_kind(kind)
        .flat_map(|entry| {
            [
                entry.id.to_string(),
                entry.name.clone(),
                entry.description.clone(),
                entry.data_type.unwrap_or_default().code().to_string(),
            ]
        })
        .collect()
}
