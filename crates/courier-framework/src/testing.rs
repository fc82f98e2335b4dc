//! Fixtures shared by the unit tests.

use std::any::Any;
use std::sync::Arc;
use std::time::SystemTime;

use courier_core::descriptor::FunctionDescriptor;
use courier_core::{BoxedEvent, Event, EventContext, EventKey, EventKind};

use crate::listener::{Listener, ListenerContext, ListenerParts, raw_listener_fn};

/// A group text message, key `msg.group` under `msg`.
#[derive(Debug, Clone)]
pub struct GroupText {
    pub text: String,
    pub author: Option<String>,
    pub group: Option<String>,
}

impl GroupText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: None,
            group: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

impl Event for GroupText {
    fn id(&self) -> &str {
        "group-text"
    }

    fn timestamp(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    fn key(&self) -> EventKey {
        Self::event_key()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn plain_text(&self) -> Option<String> {
        Some(self.text.clone())
    }

    fn author_id(&self) -> Option<&str> {
        self.author.as_deref()
    }

    fn group_id(&self) -> Option<&str> {
        self.group.as_deref()
    }
}

impl EventKind for GroupText {
    fn event_key() -> EventKey {
        EventKey::new("msg.group", [EventKey::root("msg")])
    }
}

pub fn text_event(text: &str) -> BoxedEvent {
    BoxedEvent::new(GroupText::new(text))
}

/// A context for `event` and a listener that does nothing.
pub fn listener_context(event: BoxedEvent) -> ListenerContext {
    let function = raw_listener_fn(FunctionDescriptor::new("noop"), |_ctx, _args| async {});
    let listener = Listener::new(ListenerParts {
        id: "noop".to_string(),
        priority: 0,
        is_async: false,
        binders: Vec::new(),
        targets: Vec::new(),
        filters: Vec::new(),
        interceptors: Vec::new(),
        function: Arc::new(function),
    });
    ListenerContext::new(Arc::new(EventContext::new(event)), Arc::new(listener))
}
