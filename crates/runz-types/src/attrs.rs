//! Task attributes — an insertion-ordered, multi-valued string mapping.
//!
//! Attributes are append-on-write: assigning `name=value` twice yields two
//! values under `name`, in assignment order. Once a name appears it always
//! has at least one value; values themselves may be empty strings.

use indexmap::IndexMap;

/// The attribute name that suppresses failure of an unknown task.
pub const IF_PRESENT: &str = "if-present";

/// Separator used when joining multi-valued attributes for the environment:
/// the ASCII record separator.
pub const VALUE_SEPARATOR: char = '\u{1e}';

/// Multi-valued attribute map with append semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attrs {
    values: IndexMap<String, Vec<String>>,
}

impl Attrs {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name`, creating the entry if needed.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    /// Append every value of `other`, preserving its order.
    pub fn extend(&mut self, other: &Attrs) {
        for (name, values) in &other.values {
            let slot = self.values.entry(name.clone()).or_default();
            slot.extend(values.iter().cloned());
        }
    }

    /// All values recorded under `name`, in assignment order.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Whether `name` has been assigned at all.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The last value assigned under `name`.
    pub fn last(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.last()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate `(name, values)` pairs in first-assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Render an attribute as an environment variable pair.
    ///
    /// The name is uppercased with non-alphanumeric characters mapped to `_`
    /// and prefixed with `RUN_Z_ATTR_`; multiple values are joined by the
    /// ASCII record separator.
    pub fn env_entry(name: &str, values: &[String]) -> (String, String) {
        let mut var = String::with_capacity("RUN_Z_ATTR_".len() + name.len());
        var.push_str("RUN_Z_ATTR_");
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                var.push(c.to_ascii_uppercase());
            } else {
                var.push('_');
            }
        }
        let mut joined = String::new();
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                joined.push(VALUE_SEPARATOR);
            }
            joined.push_str(v);
        }
        (var, joined)
    }

    /// Render the whole map as environment variable pairs.
    pub fn to_env(&self) -> Vec<(String, String)> {
        self.iter().map(|(n, v)| Self::env_entry(n, v)).collect()
    }
}

impl<S: Into<String>, V: Into<String>, const N: usize> From<[(S, V); N]> for Attrs {
    fn from(entries: [(S, V); N]) -> Self {
        let mut attrs = Attrs::new();
        for (name, value) in entries {
            attrs.add(name, value);
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_on_write() {
        let mut attrs = Attrs::new();
        attrs.add("attr3", "");
        attrs.add("attr3", "val3");
        assert_eq!(attrs.get("attr3"), Some(&["".to_string(), "val3".to_string()][..]));
        assert_eq!(attrs.last("attr3"), Some("val3"));
    }

    #[test]
    fn extend_preserves_order() {
        let mut a = Attrs::from([("x", "1")]);
        let b = Attrs::from([("x", "2"), ("y", "3")]);
        a.extend(&b);
        assert_eq!(a.get("x"), Some(&["1".to_string(), "2".to_string()][..]));
        assert_eq!(a.get("y"), Some(&["3".to_string()][..]));
    }

    #[test]
    fn env_entry_mangles_name() {
        let (var, val) = Attrs::env_entry("if-present", &["".to_string()]);
        assert_eq!(var, "RUN_Z_ATTR_IF_PRESENT");
        assert_eq!(val, "");
    }

    #[test]
    fn env_entry_joins_with_record_separator() {
        let (_, val) = Attrs::env_entry("mode", &["a".to_string(), "b".to_string()]);
        assert_eq!(val, "a\u{1e}b");
    }
}
