//! Function descriptors and declarative metadata.
//!
//! The listener resolver never inspects callables directly. Everything it
//! needs (parameters, their types, and the markers on the function and on
//! each parameter) comes from a [`FunctionDescriptor`].

pub mod function;
pub mod marker;
pub mod metadata;

pub use function::{DescriptorProvider, FunctionDescriptor, ParameterKind, ParameterSpec, TypeSpec};
pub use marker::{Marker, Markers};
pub use metadata::{
    AttributeDeclaration, BinderDeclaration, BinderScope, FilterDeclaration, FilterTargets,
    InjectDeclaration, InterceptorDeclaration, ListenerMetadata, MarkerMetadata, MatchType,
    MultiFilterDeclaration, MultiFilterMode,
};
