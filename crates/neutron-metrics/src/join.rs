//! Merging of base records with extension attributes.

use serde::de::DeserializeOwned;

use std::collections::HashMap;

/// Extension attributes of a resource returned alongside base records (e.g., `provider:*` attributes
/// of networks).
pub trait Extension: DeserializeOwned + Default + Clone {
    /// Returns the ID of the resource these attributes belong to.
    fn resource_id(&self) -> &str;
}

/// Base record that can be joined with extension attributes.
pub trait Join: DeserializeOwned {
    /// Extension attributes.
    type Extension: Extension;
    /// Flat record containing base fields and extension fields.
    type Joined;

    /// Returns the ID of this resource.
    fn resource_id(&self) -> &str;

    /// Joins this record with the extension attributes. Base fields must be carried over unchanged.
    fn join(self, extension: Self::Extension) -> Self::Joined;
}

/// Joins base records with extensions by resource ID. Each base record produces exactly one joined record
/// in the original order; if no extension is found for a record, default (empty) extension fields are used.
pub fn join_records<B: Join>(base: Vec<B>, extensions: &[B::Extension]) -> Vec<B::Joined> {
    let extensions_by_id: HashMap<_, _> = extensions
        .iter()
        .map(|extension| (extension.resource_id(), extension))
        .collect();

    base.into_iter()
        .map(|record| {
            let extension = extensions_by_id
                .get(record.resource_id())
                .map(|&extension| extension.clone())
                .unwrap_or_default();
            record.join(extension)
        })
        .collect()
}
