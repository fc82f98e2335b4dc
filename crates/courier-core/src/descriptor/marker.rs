//! Declarative markers.
//!
//! A marker is a named bag of JSON properties attached to a function or a
//! parameter. Markers are how listener flags, binder scopes, filters and
//! interceptors are declared.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A named set of properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    name: String,
    properties: Map<String, Value>,
}

impl Marker {
    /// Creates a marker without properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_properties(name, Map::new())
    }

    /// Creates a marker with the given properties.
    pub fn from_properties(name: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    /// Adds a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the marker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw properties.
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Returns one property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Deserializes the properties into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.properties.clone()))
    }
}

/// An ordered list of markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Markers(Vec<Marker>);

impl Markers {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a marker.
    pub fn push(&mut self, marker: Marker) {
        self.0.push(marker);
    }

    /// Removes every marker called `name`.
    pub fn remove_all(&mut self, name: &str) {
        self.0.retain(|m| m.name != name);
    }

    /// Returns `true` if a marker called `name` is present.
    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|m| m.name == name)
    }

    /// Returns the first marker called `name`.
    pub fn find(&self, name: &str) -> Option<&Marker> {
        self.0.iter().find(|m| m.name == name)
    }

    /// Returns every marker called `name`, in declaration order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Marker> + 'a {
        self.0.iter().filter(move |m| m.name == name)
    }

    /// Decodes the first marker called `name`.
    pub fn extract<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, serde_json::Error> {
        self.find(name).map(Marker::decode).transpose()
    }

    /// Decodes every marker called `name`.
    pub fn extract_all<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, serde_json::Error> {
        self.all(name).map(Marker::decode).collect()
    }

    /// Returns an iterator over all markers.
    pub fn iter(&self) -> std::slice::Iter<'_, Marker> {
        self.0.iter()
    }

    /// Returns the number of markers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no markers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Marker> for Markers {
    fn from_iter<I: IntoIterator<Item = Marker>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Markers {
    type Item = &'a Marker;
    type IntoIter = std::slice::Iter<'a, Marker>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        name: String,
    }

    #[test]
    fn test_lookup_and_decode() {
        let markers: Markers = [
            Marker::new("inject").property("name", "db"),
            Marker::new("filter").property("value", "^hi"),
            Marker::new("filter").property("value", "^bye"),
        ]
        .into_iter()
        .collect();

        assert!(markers.has("inject"));
        assert!(!markers.has("listener"));
        assert_eq!(markers.all("filter").count(), 2);
        assert_eq!(
            markers.extract::<Named>("inject").unwrap(),
            Some(Named { name: "db".into() })
        );
        assert!(markers.extract::<Named>("filter").is_err());
        assert!(markers.extract::<Named>("listener").unwrap().is_none());
    }
}
