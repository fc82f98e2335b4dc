//! Binder resolution engine.
//!
//! Reduces the candidates proposed for one parameter to a single
//! [`MergedBinder`] and runs it at invocation time.

use async_trait::async_trait;
use courier_core::descriptor::ParameterSpec;
use courier_core::{BindingFailure, BoxError};
use tracing::trace;

use super::{
    Argument, BinderCandidate, BoxedBinderFactory, BinderFactoryContext, ParameterBinder,
    ParameterBinderResult,
};
use crate::listener::ListenerContext;

// ============================================================================
// Accumulator
// ============================================================================

/// Collects classified candidates for one parameter.
#[derive(Debug, Default)]
pub struct BinderAccumulator {
    primary: Vec<BinderCandidate>,
    primary_is_only: bool,
    spare: Vec<BinderCandidate>,
}

impl BinderAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies one factory result.
    pub fn push(&mut self, result: ParameterBinderResult) {
        match result {
            ParameterBinderResult::Empty => {}
            ParameterBinderResult::Normal(candidate) => {
                if !self.primary_is_only {
                    self.primary.push(candidate);
                }
            }
            ParameterBinderResult::Only(candidate) => {
                self.primary.clear();
                self.primary.push(candidate);
                self.primary_is_only = true;
            }
            ParameterBinderResult::Spare(candidate) => self.spare.push(candidate),
        }
    }

    /// Builds the effective binder for `parameter`.
    ///
    /// Both lists are sorted by ascending priority (stable). Spares are
    /// promoted to primary when no primary candidate exists; with no
    /// candidate at all the result is an [`EmptyBinder`].
    pub fn finish(mut self, parameter: &ParameterSpec) -> MergedBinder {
        self.primary.sort_by_key(BinderCandidate::priority);
        self.spare.sort_by_key(BinderCandidate::priority);

        match (self.primary.is_empty(), self.spare.is_empty()) {
            (true, true) => MergedBinder::Empty(EmptyBinder::new(parameter)),
            (true, false) => {
                MergedBinder::Composite(CompositeBinder::new(parameter, self.spare, Vec::new()))
            }
            _ => MergedBinder::Composite(CompositeBinder::new(parameter, self.primary, self.spare)),
        }
    }
}

/// Runs every factory against `parameter` and merges their proposals.
///
/// `factories` must already be sorted by ascending priority.
pub fn resolve_parameter(
    factories: &[BoxedBinderFactory],
    ctx: &BinderFactoryContext<'_>,
) -> Result<MergedBinder, BindingFailure> {
    let mut accumulator = BinderAccumulator::new();
    for factory in factories {
        let result = factory
            .resolve(ctx)
            .map_err(|source| BindingFailure::Factory {
                parameter: ctx.parameter().describe(),
                source,
            })?;
        accumulator.push(result);
    }
    Ok(accumulator.finish(ctx.parameter()))
}

// ============================================================================
// Binders
// ============================================================================

/// The binder of a parameter no factory proposed anything for.
#[derive(Debug, Clone)]
pub struct EmptyBinder {
    parameter: String,
    nullable: bool,
}

impl EmptyBinder {
    pub fn new(parameter: &ParameterSpec) -> Self {
        Self {
            parameter: parameter.describe(),
            nullable: parameter.type_spec().is_nullable(),
        }
    }
}

#[async_trait]
impl ParameterBinder for EmptyBinder {
    async fn arg(&self, _ctx: &ListenerContext) -> Result<Argument, BoxError> {
        if self.nullable {
            Ok(None)
        } else {
            Err(BindingFailure::NoCandidate {
                parameter: self.parameter.clone(),
            }
            .into())
        }
    }
}

/// Tries primary candidates, then spares, until one succeeds.
#[derive(Debug, Clone)]
pub struct CompositeBinder {
    parameter: String,
    primary: Vec<BinderCandidate>,
    spare: Vec<BinderCandidate>,
}

impl CompositeBinder {
    pub fn new(
        parameter: &ParameterSpec,
        primary: Vec<BinderCandidate>,
        spare: Vec<BinderCandidate>,
    ) -> Self {
        Self {
            parameter: parameter.describe(),
            primary,
            spare,
        }
    }

    pub fn primary(&self) -> &[BinderCandidate] {
        &self.primary
    }

    pub fn spare(&self) -> &[BinderCandidate] {
        &self.spare
    }
}

#[async_trait]
impl ParameterBinder for CompositeBinder {
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError> {
        let mut causes = Vec::new();
        for candidate in self.primary.iter().chain(&self.spare) {
            match candidate.binder().arg(ctx).await {
                Ok(argument) => return Ok(argument),
                Err(cause) => {
                    trace!(parameter = %self.parameter, error = %cause, "binder candidate failed");
                    causes.push(cause);
                }
            }
        }
        Err(BindingFailure::AllFailed {
            parameter: self.parameter.clone(),
            causes,
        }
        .into())
    }
}

/// The effective binder of one parameter.
#[derive(Debug, Clone)]
pub enum MergedBinder {
    /// No candidate at all.
    Empty(EmptyBinder),
    /// At least one candidate.
    Composite(CompositeBinder),
}

#[async_trait]
impl ParameterBinder for MergedBinder {
    async fn arg(&self, ctx: &ListenerContext) -> Result<Argument, BoxError> {
        match self {
            Self::Empty(binder) => binder.arg(ctx).await,
            Self::Composite(binder) => binder.arg(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use courier_core::descriptor::TypeSpec;

    use super::*;
    use crate::binder::BoxedBinder;
    use crate::testing::{listener_context, text_event};

    struct Fixed(u32);

    #[async_trait]
    impl ParameterBinder for Fixed {
        async fn arg(&self, _ctx: &ListenerContext) -> Result<Argument, BoxError> {
            Ok(crate::binder::argument(self.0))
        }
    }

    struct Failing(&'static str, Arc<AtomicUsize>);

    #[async_trait]
    impl ParameterBinder for Failing {
        async fn arg(&self, _ctx: &ListenerContext) -> Result<Argument, BoxError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Err(self.0.into())
        }
    }

    fn parameter(nullable: bool) -> ParameterSpec {
        ParameterSpec::new(0, TypeSpec::of::<u32>().with_nullable(nullable)).named("value")
    }

    fn candidate(binder: impl ParameterBinder + 'static, priority: i32) -> BinderCandidate {
        BinderCandidate::new(Arc::new(binder) as BoxedBinder, priority)
    }

    async fn bound_value(binder: &MergedBinder) -> Option<u32> {
        let ctx = listener_context(text_event("hi"));
        binder
            .arg(&ctx)
            .await
            .unwrap()
            .and_then(|arg| arg.downcast_ref::<u32>().copied())
    }

    #[tokio::test]
    async fn test_normals_sorted_by_priority() {
        let mut accumulator = BinderAccumulator::new();
        accumulator.push(ParameterBinderResult::Normal(candidate(Fixed(1), 10)));
        accumulator.push(ParameterBinderResult::Empty);
        accumulator.push(ParameterBinderResult::Normal(candidate(Fixed(2), -5)));

        let merged = accumulator.finish(&parameter(false));
        let MergedBinder::Composite(composite) = &merged else {
            panic!("expected composite binder");
        };
        let priorities: Vec<i32> = composite.primary().iter().map(|c| c.priority()).collect();
        assert_eq!(priorities, vec![-5, 10]);
        assert_eq!(bound_value(&merged).await, Some(2));
    }

    #[tokio::test]
    async fn test_last_only_wins() {
        let mut accumulator = BinderAccumulator::new();
        accumulator.push(ParameterBinderResult::Normal(candidate(Fixed(1), -100)));
        accumulator.push(ParameterBinderResult::Only(candidate(Fixed(2), 0)));
        accumulator.push(ParameterBinderResult::Normal(candidate(Fixed(3), -200)));
        accumulator.push(ParameterBinderResult::Only(candidate(Fixed(4), 50)));
        accumulator.push(ParameterBinderResult::Normal(candidate(Fixed(5), -300)));

        let merged = accumulator.finish(&parameter(false));
        let MergedBinder::Composite(composite) = &merged else {
            panic!("expected composite binder");
        };
        assert_eq!(composite.primary().len(), 1);
        assert_eq!(composite.primary()[0].priority(), 50);
        assert_eq!(bound_value(&merged).await, Some(4));
    }

    #[tokio::test]
    async fn test_spares_promoted_when_no_primary() {
        let mut accumulator = BinderAccumulator::new();
        accumulator.push(ParameterBinderResult::Spare(candidate(Fixed(9), 0)));

        let merged = accumulator.finish(&parameter(false));
        let MergedBinder::Composite(composite) = &merged else {
            panic!("expected composite binder");
        };
        assert_eq!(composite.primary().len(), 1);
        assert!(composite.spare().is_empty());
        assert_eq!(bound_value(&merged).await, Some(9));
    }

    #[tokio::test]
    async fn test_empty_binder_nullable() {
        let nullable = BinderAccumulator::new().finish(&parameter(true));
        assert!(matches!(nullable, MergedBinder::Empty(_)));
        assert_eq!(bound_value(&nullable).await, None);

        let required = BinderAccumulator::new().finish(&parameter(false));
        let ctx = listener_context(text_event("hi"));
        let err = required.arg(&ctx).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BindingFailure>(),
            Some(BindingFailure::NoCandidate { .. })
        ));
    }

    #[tokio::test]
    async fn test_spare_not_tried_before_primaries_fail() {
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let spare_calls = Arc::new(AtomicUsize::new(0));

        let mut accumulator = BinderAccumulator::new();
        accumulator.push(ParameterBinderResult::Spare(candidate(
            Failing("spare", Arc::clone(&spare_calls)),
            -1000,
        )));
        accumulator.push(ParameterBinderResult::Normal(candidate(
            Failing("first", Arc::clone(&primary_calls)),
            0,
        )));
        accumulator.push(ParameterBinderResult::Normal(candidate(Fixed(7), 1)));

        let merged = accumulator.finish(&parameter(false));
        assert_eq!(bound_value(&merged).await, Some(7));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(spare_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_causes_recorded_in_attempt_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut accumulator = BinderAccumulator::new();
        accumulator.push(ParameterBinderResult::Spare(candidate(Failing("s1", Arc::clone(&calls)), 0)));
        accumulator.push(ParameterBinderResult::Normal(candidate(Failing("p2", Arc::clone(&calls)), 2)));
        accumulator.push(ParameterBinderResult::Normal(candidate(Failing("p1", Arc::clone(&calls)), 1)));

        let merged = accumulator.finish(&parameter(false));
        let ctx = listener_context(text_event("hi"));
        let err = merged.arg(&ctx).await.unwrap_err();
        let failure = err.downcast_ref::<BindingFailure>().unwrap();

        let causes: Vec<String> = failure.causes().iter().map(ToString::to_string).collect();
        assert_eq!(causes, vec!["p1", "p2", "s1"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
