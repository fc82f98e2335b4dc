//! The standard filter processor.

use async_trait::async_trait;
use courier_core::descriptor::{
    FilterDeclaration, FilterTargets, MatchType, MultiFilterMode,
};
use courier_core::{BoxError, ConfigurationError, Event, priority};
use regex::Regex;
use tracing::trace;

use super::{EventFilter, FilterProcessingContext, FilterProcessor, FilterRegistrar};
use crate::listener::ListenerContext;

/// Registers one [`DeclaredFilter`] for a single declaration, or one
/// [`CompositeFilter`] combining several.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFilterProcessor;

impl FilterProcessor for StandardFilterProcessor {
    fn process(
        &self,
        ctx: &FilterProcessingContext,
        registrar: &mut FilterRegistrar,
    ) -> Result<(), ConfigurationError> {
        let mut filters = ctx
            .declarations()
            .iter()
            .map(|declaration| DeclaredFilter::new(ctx.listener_id(), declaration))
            .collect::<Result<Vec<_>, _>>()?;

        if filters.len() == 1 {
            if let Some(filter) = filters.pop() {
                registrar.register(filter);
            }
            return Ok(());
        }

        if !filters.is_empty() {
            let (mode, priority) = ctx
                .multi()
                .map(|multi| (multi.mode, multi.priority.unwrap_or(priority::NORMAL)))
                .unwrap_or((MultiFilterMode::Any, priority::NORMAL));
            registrar.register(CompositeFilter::new(filters, mode, priority));
        }
        Ok(())
    }
}

// ============================================================================
// DeclaredFilter
// ============================================================================

#[derive(Debug, Clone)]
enum TextMatcher {
    Regex(Regex),
    Equals(String),
    EqualsIgnoreCase(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
}

impl TextMatcher {
    fn new(value: &str, match_type: MatchType) -> Result<Self, regex::Error> {
        Ok(match match_type {
            MatchType::RegexMatches => Self::Regex(Regex::new(&format!("^(?:{value})$"))?),
            MatchType::RegexContains => Self::Regex(Regex::new(value)?),
            MatchType::TextEquals => Self::Equals(value.to_string()),
            MatchType::TextEqualsIgnoreCase => Self::EqualsIgnoreCase(value.to_lowercase()),
            MatchType::TextStartsWith => Self::StartsWith(value.to_string()),
            MatchType::TextEndsWith => Self::EndsWith(value.to_string()),
            MatchType::TextContains => Self::Contains(value.to_string()),
        })
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(text),
            Self::Equals(value) => text == value,
            Self::EqualsIgnoreCase(value) => text.to_lowercase() == *value,
            Self::StartsWith(value) => text.starts_with(value.as_str()),
            Self::EndsWith(value) => text.ends_with(value.as_str()),
            Self::Contains(value) => text.contains(value.as_str()),
        }
    }
}

/// The filter built from one `filter` declaration.
///
/// Passes when every non-empty id list contains the event's id of that
/// kind, and when the declared value (if any) matches the event's text.
/// Events without text never match a declared value.
#[derive(Debug, Clone)]
pub struct DeclaredFilter {
    targets: FilterTargets,
    text: Option<TextMatcher>,
    priority: i32,
}

impl DeclaredFilter {
    /// Compiles a declaration. An invalid regex is a configuration error.
    pub fn new(listener: &str, declaration: &FilterDeclaration) -> Result<Self, ConfigurationError> {
        let text = declaration
            .value
            .as_deref()
            .map(|value| TextMatcher::new(value, declaration.match_type))
            .transpose()
            .map_err(|err| ConfigurationError::InvalidFilter {
                listener: listener.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Self {
            targets: declaration.target.clone(),
            text,
            priority: declaration.priority.unwrap_or(priority::NORMAL),
        })
    }

    /// Tests the event synchronously.
    pub fn matches(&self, event: &dyn Event) -> bool {
        if !id_accepted(&self.targets.bots, event.bot_id())
            || !id_accepted(&self.targets.authors, event.author_id())
            || !id_accepted(&self.targets.groups, event.group_id())
        {
            return false;
        }

        match &self.text {
            None => true,
            Some(matcher) => event
                .plain_text()
                .is_some_and(|text| matcher.matches(&text)),
        }
    }
}

fn id_accepted(accepted: &[String], id: Option<&str>) -> bool {
    accepted.is_empty() || id.is_some_and(|id| accepted.iter().any(|a| a == id))
}

#[async_trait]
impl EventFilter for DeclaredFilter {
    fn priority(&self) -> i32 {
        self.priority
    }

    async fn test(&self, ctx: &ListenerContext) -> Result<bool, BoxError> {
        let passed = self.matches(&**ctx.event());
        if !passed {
            trace!(listener = ctx.listener().id(), "declared filter rejected event");
        }
        Ok(passed)
    }
}

// ============================================================================
// CompositeFilter
// ============================================================================

/// Several declared filters combined under one mode.
#[derive(Debug, Clone)]
pub struct CompositeFilter {
    filters: Vec<DeclaredFilter>,
    mode: MultiFilterMode,
    priority: i32,
}

impl CompositeFilter {
    pub fn new(mut filters: Vec<DeclaredFilter>, mode: MultiFilterMode, priority: i32) -> Self {
        filters.sort_by_key(|f| f.priority);
        Self {
            filters,
            mode,
            priority,
        }
    }

    pub fn mode(&self) -> MultiFilterMode {
        self.mode
    }

    pub fn matches(&self, event: &dyn Event) -> bool {
        match self.mode {
            MultiFilterMode::Any => self.filters.iter().any(|f| f.matches(event)),
            MultiFilterMode::All => self.filters.iter().all(|f| f.matches(event)),
        }
    }
}

#[async_trait]
impl EventFilter for CompositeFilter {
    fn priority(&self) -> i32 {
        self.priority
    }

    async fn test(&self, ctx: &ListenerContext) -> Result<bool, BoxError> {
        Ok(self.matches(&**ctx.event()))
    }
}

#[cfg(test)]
mod tests {
    use courier_core::descriptor::MultiFilterDeclaration;

    use super::*;
    use crate::testing::{GroupText, text_event};

    fn declaration(value: &str, match_type: MatchType) -> FilterDeclaration {
        FilterDeclaration {
            value: Some(value.to_string()),
            match_type,
            ..Default::default()
        }
    }

    fn filter(value: &str, match_type: MatchType) -> DeclaredFilter {
        DeclaredFilter::new("test", &declaration(value, match_type)).unwrap()
    }

    #[test]
    fn test_match_types() {
        let event = GroupText::new("ping pong");

        assert!(!filter("ping", MatchType::RegexMatches).matches(&event));
        assert!(filter("ping.*", MatchType::RegexMatches).matches(&event));
        assert!(filter("p[io]ng", MatchType::RegexContains).matches(&event));
        assert!(filter("ping pong", MatchType::TextEquals).matches(&event));
        assert!(filter("PING Pong", MatchType::TextEqualsIgnoreCase).matches(&event));
        assert!(filter("ping", MatchType::TextStartsWith).matches(&event));
        assert!(filter("pong", MatchType::TextEndsWith).matches(&event));
        assert!(filter("g p", MatchType::TextContains).matches(&event));
        assert!(!filter("pang", MatchType::TextContains).matches(&event));
    }

    #[test]
    fn test_target_lists() {
        let event = GroupText::new("hi").with_author("alice").with_group("g1");
        let mut declaration = FilterDeclaration::default();

        declaration.target.authors = vec!["bob".into(), "alice".into()];
        assert!(DeclaredFilter::new("test", &declaration).unwrap().matches(&event));

        declaration.target.groups = vec!["g2".into()];
        assert!(!DeclaredFilter::new("test", &declaration).unwrap().matches(&event));

        declaration.target = FilterTargets {
            bots: vec!["bot".into()],
            ..Default::default()
        };
        assert!(!DeclaredFilter::new("test", &declaration).unwrap().matches(&event));
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let err = DeclaredFilter::new("broken", &declaration("(", MatchType::RegexContains))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidFilter { listener, .. } if listener == "broken"));
    }

    #[test]
    fn test_processor_combines_several_declarations() {
        let ctx = FilterProcessingContext::new(
            "test",
            vec![
                declaration("a", MatchType::TextEquals),
                declaration("b", MatchType::TextEquals),
            ],
            Some(MultiFilterDeclaration {
                mode: MultiFilterMode::All,
                priority: Some(5),
            }),
        );
        let mut registrar = FilterRegistrar::new();
        StandardFilterProcessor.process(&ctx, &mut registrar).unwrap();

        let filters = registrar.into_filters();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].priority(), 5);

        let either = CompositeFilter::new(
            vec![filter("a", MatchType::TextEquals), filter("b", MatchType::TextEquals)],
            MultiFilterMode::Any,
            0,
        );
        assert!(either.matches(&*text_event("b")));
        assert!(!either.matches(&*text_event("c")));
    }
}
