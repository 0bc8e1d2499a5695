//! Typed builders for filters and field-level updates.
//!
//! Both builders keep their entries in insertion order, so the documents they
//! render are deterministic.

use std::collections::HashSet;

use bson::{Bson, Document};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// Field refreshed by every attribute update.
pub const UPDATED_AT_FIELD: &str = "updated_at";

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// A set of field-equality predicates combined with logical AND.
///
/// An empty selector matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    predicates: Vec<(String, Bson)>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector matching the document whose `_id` equals `id`.
    pub fn by_id(id: impl Into<Bson>) -> Self {
        Self::new().and_eq(ID_FIELD, id)
    }

    /// Add `field == value`. Dotted paths address nested fields.
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push(field, value);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        self.predicates.push((field.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bson)> {
        self.predicates.iter().map(|(f, v)| (f.as_str(), v))
    }

    /// Render the filter document.
    ///
    /// A field named more than once is not collapsed: the whole selector is
    /// rendered as an explicit `$and` of one-field predicates instead.
    pub fn to_document(&self) -> Document {
        let mut seen = HashSet::with_capacity(self.predicates.len());
        let repeated = self.predicates.iter().any(|(f, _)| !seen.insert(f.as_str()));

        if repeated {
            let clauses: Vec<Bson> = self
                .predicates
                .iter()
                .map(|(field, value)| {
                    let mut clause = Document::new();
                    clause.insert(field.clone(), value.clone());
                    Bson::Document(clause)
                })
                .collect();
            let mut filter = Document::new();
            filter.insert("$and", clauses);
            return filter;
        }

        self.predicates
            .iter()
            .map(|(f, v)| (f.clone(), v.clone()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Selector
where
    K: Into<String>,
    V: Into<Bson>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut selector = Self::new();
        for (field, value) in iter {
            selector.push(field, value);
        }
        selector
    }
}

impl From<&Selector> for Document {
    fn from(selector: &Selector) -> Self {
        selector.to_document()
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// An ordered set of `field = value` assignments for a partial update.
///
/// Setting a field twice keeps the last value at the field's original
/// position. Serializes as a map, so it can be passed anywhere an attribute
/// set is accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: Vec<(String, Bson)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.values.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.values.push((field, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn empty_selector_renders_unconstrained_filter() {
        assert_eq!(Selector::new().to_document(), Document::new());
    }

    #[test]
    fn predicates_keep_insertion_order() {
        let filter = Selector::new()
            .and_eq("zeta", 1)
            .and_eq("alpha", "a")
            .and_eq("mid.nested", true)
            .to_document();

        let keys: Vec<&str> = filter.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid.nested"]);
        assert_eq!(filter, doc! { "zeta": 1, "alpha": "a", "mid.nested": true });
    }

    #[test]
    fn repeated_field_becomes_explicit_and() {
        let filter = Selector::new()
            .and_eq("status", "open")
            .and_eq("status", "closed")
            .to_document();
        assert_eq!(
            filter,
            doc! { "$and": [ { "status": "open" }, { "status": "closed" } ] }
        );
    }

    #[test]
    fn by_id_targets_identifier_field() {
        assert_eq!(Selector::by_id("abc").to_document(), doc! { "_id": "abc" });
    }

    #[test]
    fn selector_collects_from_pairs() {
        let selector: Selector = vec![("owner", "ann"), ("kind", "note")].into_iter().collect();
        assert_eq!(selector.len(), 2);
        assert_eq!(selector.to_document(), doc! { "owner": "ann", "kind": "note" });
    }

    #[test]
    fn attributes_overwrite_in_place() {
        let attrs = Attributes::new().set("a", 1).set("b", 2).set("a", 3);
        assert_eq!(attrs.len(), 2);
        assert_eq!(bson::to_document(&attrs).unwrap(), doc! { "a": 3, "b": 2 });
    }
}
