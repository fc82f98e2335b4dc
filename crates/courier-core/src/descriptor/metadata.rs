//! Typed views over the well-known markers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::marker::Marker;

/// A typed marker payload.
pub trait MarkerMetadata: Serialize + DeserializeOwned {
    /// The marker name this payload is stored under.
    const MARKER: &'static str;

    /// Encodes this payload as a marker.
    fn to_marker(&self) -> Marker {
        let properties = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Marker::from_properties(Self::MARKER, properties)
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Flags of a listener function (marker `listener`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerMetadata {
    /// Explicit identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Priority, lower runs earlier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Whether the listener runs detached from the synchronous chain.
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
    /// Explicit target event types, by name.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    /// Requested `SPECIFY` binder ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub binders: Vec<String>,
}

impl MarkerMetadata for ListenerMetadata {
    const MARKER: &'static str = "listener";
}

// ============================================================================
// Binders
// ============================================================================

/// Where a binder function applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinderScope {
    /// Every listener.
    Global,
    /// Listeners requesting one of the binder's ids.
    Specify,
    /// Listener functions of the same enclosing type.
    Current,
    /// Inferred from the declaration.
    #[default]
    Default,
}

impl BinderScope {
    /// Returns the scope name as written in declarations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Specify => "SPECIFY",
            Self::Current => "CURRENT",
            Self::Default => "DEFAULT",
        }
    }
}

/// Declaration of a binder function (marker `binder`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderDeclaration {
    /// Declared scope.
    pub scope: BinderScope,
    /// Ids for `SPECIFY` scope.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    /// Factory priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Proposes an `Only` candidate instead of a `Normal` one.
    pub exclusive: bool,
}

impl MarkerMetadata for BinderDeclaration {
    const MARKER: &'static str = "binder";
}

// ============================================================================
// Filters
// ============================================================================

/// How a filter value is matched against the event text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// The whole text matches the regex.
    #[default]
    RegexMatches,
    /// Some part of the text matches the regex.
    RegexContains,
    /// Exact equality.
    TextEquals,
    /// Case-insensitive equality.
    TextEqualsIgnoreCase,
    /// Prefix.
    TextStartsWith,
    /// Suffix.
    TextEndsWith,
    /// Substring.
    TextContains,
}

impl MatchType {
    /// Returns `true` for the regex-based match types.
    pub fn is_regex(&self) -> bool {
        matches!(self, Self::RegexMatches | Self::RegexContains)
    }
}

/// Id lists a filter restricts the event to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterTargets {
    /// Accepted bot ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bots: Vec<String>,
    /// Accepted author ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Accepted group ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl FilterTargets {
    /// Returns `true` if no list restricts anything.
    pub fn is_empty(&self) -> bool {
        self.bots.is_empty() && self.authors.is_empty() && self.groups.is_empty()
    }
}

/// A single filter (marker `filter`, repeatable).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDeclaration {
    /// Value matched against the event text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// How `value` is matched.
    #[serde(rename = "match")]
    pub match_type: MatchType,
    /// Id restrictions.
    #[serde(skip_serializing_if = "FilterTargets::is_empty")]
    pub target: FilterTargets,
    /// Filter priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl MarkerMetadata for FilterDeclaration {
    const MARKER: &'static str = "filter";
}

/// How several filter declarations are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiFilterMode {
    /// At least one must pass.
    #[default]
    Any,
    /// Every one must pass.
    All,
}

/// Options for combining filters (marker `filters`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiFilterDeclaration {
    /// Combination mode.
    pub mode: MultiFilterMode,
    /// Priority of the combined filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl MarkerMetadata for MultiFilterDeclaration {
    const MARKER: &'static str = "filters";
}

// ============================================================================
// Interceptors
// ============================================================================

/// An interceptor attached to a listener (marker `interceptor`, repeatable).
///
/// `name` refers to an instance in the dependency lookup, `type` to a
/// registered interceptor type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorDeclaration {
    /// Lookup name of the interceptor instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Registered interceptor type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Priority, overriding the interceptor's own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl MarkerMetadata for InterceptorDeclaration {
    const MARKER: &'static str = "interceptor";
}

// ============================================================================
// Parameters
// ============================================================================

/// Binds a parameter from the dependency lookup (marker `inject`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectDeclaration {
    /// Lookup name; lookup by type when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MarkerMetadata for InjectDeclaration {
    const MARKER: &'static str = "inject";
}

/// Binds a parameter from the push attributes (marker `attribute`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDeclaration {
    /// Attribute name.
    pub key: String,
}

impl MarkerMetadata for AttributeDeclaration {
    const MARKER: &'static str = "attribute";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listener_metadata_roundtrip_through_marker() {
        let metadata = ListenerMetadata {
            id: Some("greet".into()),
            priority: Some(10),
            is_async: Some(true),
            ..Default::default()
        };

        let marker = metadata.to_marker();
        assert_eq!(marker.name(), "listener");
        assert_eq!(marker.get("async"), Some(&json!(true)));
        assert!(marker.get("targets").is_none());
        assert_eq!(marker.decode::<ListenerMetadata>().unwrap(), metadata);
    }

    #[test]
    fn test_filter_declaration_defaults() {
        let marker = Marker::new("filter").property("value", "^ping$");
        let filter: FilterDeclaration = marker.decode().unwrap();

        assert_eq!(filter.match_type, MatchType::RegexMatches);
        assert!(filter.target.is_empty());
        assert!(filter.priority.is_none());
    }

    #[test]
    fn test_binder_scope_names() {
        let marker = Marker::new("binder")
            .property("scope", "specify")
            .property("ids", json!(["a", "b"]));
        let declaration: BinderDeclaration = marker.decode().unwrap();

        assert_eq!(declaration.scope, BinderScope::Specify);
        assert_eq!(declaration.ids, vec!["a", "b"]);
        assert!(!declaration.exclusive);
    }
}
