//! Index specifications.

use std::fmt;

use bson::Document;

/// Sort direction of one index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Numeric form used in key documents (`1` / `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }

    /// Negative numbers are descending, anything else ascending.
    pub fn from_i32(value: i32) -> Self {
        if value < 0 {
            Self::Descending
        } else {
            Self::Ascending
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// One (possibly compound) index on a collection.
///
/// Keys are kept in the order they were added, which is the column order of
/// a compound index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSpec {
    keys: Vec<(String, Direction)>,
    unique: bool,
}

impl IndexSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascending(self, field: impl Into<String>) -> Self {
        self.key(field, Direction::Ascending)
    }

    pub fn descending(self, field: impl Into<String>) -> Self {
        self.key(field, Direction::Descending)
    }

    pub fn key(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Build from `(field, direction)` pairs where direction is `1` / `-1`.
    pub fn from_pairs<K, I>(pairs: I, unique: bool) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, i32)>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |spec, (field, dir)| spec.key(field, Direction::from_i32(dir)))
            .unique(unique)
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = (&str, Direction)> {
        self.keys.iter().map(|(f, d)| (f.as_str(), *d))
    }

    /// Key document in the form the store expects, e.g. `{ a: 1, b: -1 }`.
    pub fn keys_document(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, dir)| (field.clone(), bson::Bson::Int32(dir.as_i32())))
            .collect()
    }

    /// Name the store generates for this key set, e.g. `a_1_b_-1`.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, dir)| format!("{field}_{dir}"))
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn compound_keys_keep_declared_order() {
        let spec = IndexSpec::new().descending("tenant").ascending("email").unique(true);

        assert!(spec.is_unique());
        assert_eq!(spec.keys_document(), doc! { "tenant": -1, "email": 1 });
        assert_eq!(spec.default_name(), "tenant_-1_email_1");
    }

    #[test]
    fn from_pairs_maps_signs_to_directions() {
        let spec = IndexSpec::from_pairs([("a", 1), ("b", -1), ("c", 0)], false);
        let dirs: Vec<Direction> = spec.keys().map(|(_, d)| d).collect();
        assert_eq!(
            dirs,
            vec![Direction::Ascending, Direction::Descending, Direction::Ascending]
        );
        assert!(!spec.is_unique());
    }
}
