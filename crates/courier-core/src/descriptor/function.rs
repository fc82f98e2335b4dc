//! Structured descriptions of callables.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;

use crate::descriptor::marker::{Marker, Markers};
use crate::descriptor::metadata::MarkerMetadata;
use crate::foundation::error::ConfigurationError;
use crate::foundation::event::{BoxedEvent, EventKind, EventTypeRef};

// ============================================================================
// Type Spec
// ============================================================================

/// The declared type of a parameter.
#[derive(Clone, PartialEq, Eq)]
pub struct TypeSpec {
    name: Cow<'static, str>,
    type_id: Option<TypeId>,
    nullable: bool,
    event_type: Option<EventTypeRef>,
}

impl TypeSpec {
    /// Describes the concrete type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            name: Cow::Borrowed(std::any::type_name::<T>()),
            type_id: Some(TypeId::of::<T>()),
            nullable: false,
            event_type: None,
        }
    }

    /// Describes the event type `E`.
    pub fn event<E: EventKind>() -> Self {
        Self::of::<E>().with_event_type(EventTypeRef::of::<E>())
    }

    /// Describes a type known only by name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            type_id: None,
            nullable: false,
            event_type: None,
        }
    }

    /// Sets whether `None` is an acceptable value.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Marks the type as an event type.
    pub fn with_event_type(mut self, event_type: EventTypeRef) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the Rust type id, if known.
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Returns `true` if `T` is the described type.
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == Some(TypeId::of::<T>())
    }

    /// Returns `true` if `None` is an acceptable value.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns the event type, if this is one.
    pub fn event_type(&self) -> Option<&EventTypeRef> {
        self.event_type.as_ref()
    }

    /// Returns `true` for event types, including the base [`BoxedEvent`].
    pub fn is_event(&self) -> bool {
        self.event_type.is_some() || self.is::<BoxedEvent>()
    }
}

impl fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.nullable {
            f.write_str("?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Parameter Spec
// ============================================================================

/// How a parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterKind {
    /// The implicit receiver of an event-extension style function.
    Receiver,
    /// A regular parameter.
    #[default]
    Value,
}

/// One parameter of a function.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    index: usize,
    name: Option<String>,
    kind: ParameterKind,
    type_spec: TypeSpec,
    markers: Markers,
}

impl ParameterSpec {
    /// Creates a regular parameter at `index`.
    pub fn new(index: usize, type_spec: TypeSpec) -> Self {
        Self {
            index,
            name: None,
            kind: ParameterKind::Value,
            type_spec,
            markers: Markers::new(),
        }
    }

    /// Sets the parameter name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the parameter as the implicit receiver.
    pub fn receiver(mut self) -> Self {
        self.kind = ParameterKind::Receiver;
        self
    }

    /// Attaches a marker.
    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Attaches a typed marker.
    pub fn metadata<M: MarkerMetadata>(self, metadata: &M) -> Self {
        self.marker(metadata.to_marker())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn type_spec(&self) -> &TypeSpec {
        &self.type_spec
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut Markers {
        &mut self.markers
    }

    /// Returns a short description used in diagnostics, e.g. `#1 name: u32`.
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("#{} {}: {:?}", self.index, name, self.type_spec),
            None => format!("#{}: {:?}", self.index, self.type_spec),
        }
    }
}

// ============================================================================
// Function Descriptor
// ============================================================================

/// The structured description of a callable.
///
/// This is what a [`DescriptorProvider`] hands to the listener resolver:
/// ordered parameters with their types and markers, the function's own
/// markers, and the event types the declarations refer to by name.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    name: String,
    enclosing: Option<String>,
    parameters: Vec<ParameterSpec>,
    markers: Markers,
    event_types: Vec<EventTypeRef>,
}

impl FunctionDescriptor {
    /// Creates a descriptor for a free function without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enclosing: None,
            parameters: Vec::new(),
            markers: Markers::new(),
            event_types: Vec::new(),
        }
    }

    /// Sets the enclosing type.
    pub fn enclosing(mut self, type_name: impl Into<String>) -> Self {
        self.enclosing = Some(type_name.into());
        self
    }

    /// Appends a parameter.
    pub fn parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Attaches a function-level marker.
    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Attaches a typed function-level marker.
    pub fn metadata<M: MarkerMetadata>(self, metadata: &M) -> Self {
        self.marker(metadata.to_marker())
    }

    /// Registers an event type that declarations may refer to by name.
    pub fn event_type(mut self, event_type: EventTypeRef) -> Self {
        self.event_types.push(event_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enclosing_type(&self) -> Option<&str> {
        self.enclosing.as_deref()
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut Markers {
        &mut self.markers
    }

    /// Returns the parameter at `index` for in-place changes.
    pub fn parameter_mut(&mut self, index: usize) -> Option<&mut ParameterSpec> {
        self.parameters.iter_mut().find(|p| p.index == index)
    }

    /// Registers an event type unless one with the same name is known.
    pub fn add_event_type(&mut self, event_type: EventTypeRef) {
        if !self.event_types.iter().any(|e| e.name() == event_type.name()) {
            self.event_types.push(event_type);
        }
    }

    pub fn event_types(&self) -> &[EventTypeRef] {
        &self.event_types
    }

    /// Returns the event type referred to by `name`.
    ///
    /// Both the registered event types and the event-typed parameters are
    /// searched. Unknown names produce a name-only reference, left to the
    /// event key resolver.
    pub fn find_event_type(&self, name: &str) -> EventTypeRef {
        self.event_types
            .iter()
            .chain(
                self.parameters
                    .iter()
                    .filter_map(|p| p.type_spec().event_type()),
            )
            .find(|event_type| {
                event_type.name() == name || event_type.key().is_some_and(|key| key.id() == name)
            })
            .cloned()
            .unwrap_or_else(|| EventTypeRef::named(name.to_string()))
    }

    /// Returns `"{enclosing}.{name}"`, or the bare name for free functions.
    pub fn qualified_name(&self) -> String {
        match &self.enclosing {
            Some(enclosing) => format!("{enclosing}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Decodes the first function-level marker of type `M`.
    pub fn read<M: MarkerMetadata>(&self) -> Result<Option<M>, ConfigurationError> {
        self.markers
            .extract(M::MARKER)
            .map_err(|e| self.malformed(M::MARKER, e))
    }

    /// Decodes every function-level marker of type `M`.
    pub fn read_all<M: MarkerMetadata>(&self) -> Result<Vec<M>, ConfigurationError> {
        self.markers
            .extract_all(M::MARKER)
            .map_err(|e| self.malformed(M::MARKER, e))
    }

    /// Decodes the first marker of type `M` on `parameter`.
    pub fn read_parameter<M: MarkerMetadata>(
        &self,
        parameter: &ParameterSpec,
    ) -> Result<Option<M>, ConfigurationError> {
        parameter
            .markers()
            .extract(M::MARKER)
            .map_err(|e| self.malformed(M::MARKER, e))
    }

    fn malformed(&self, marker: &str, err: serde_json::Error) -> ConfigurationError {
        ConfigurationError::MalformedMarker {
            function: self.qualified_name(),
            marker: marker.to_string(),
            reason: err.to_string(),
        }
    }
}

/// A source of [`FunctionDescriptor`]s.
///
/// Implemented by anything the resolver can turn into a listener or a
/// binder: typed closures build their descriptor from their parameter
/// types, raw functions carry a hand-written one.
pub trait DescriptorProvider {
    /// Returns the description of the callable.
    fn descriptor(&self) -> &FunctionDescriptor;
}
