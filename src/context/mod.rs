//! # Event Context
//!
//! Per-event ambient data (actor, locales, shard) and its propagation across
//! synchronous handling and wrapped continuations.
//!
//! Each inbound event gets a fresh [`ContextData`] that is installed as the
//! thread's live context while it is handled. Continuations that will run
//! later, possibly on another thread, are wrapped with
//! [`ContextPropagation::wrap`] to carry a copy of that context with them.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Catch panicking termination listeners
//! - 1.1.0: One-argument continuations, `into_fn` adapters
//! - 1.0.0: Initial thread-bound context and callback wrapping

pub mod scope;

use dashmap::DashMap;
use log::{debug, error};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

use crate::commands::interaction::{InteractionEvent, UserRef};
use crate::locale::Locale;
use crate::platform::Platform;

pub use scope::{ContextAware, ScopeManager, ScopedObject};

/// Value stored in a context's attribute map.
pub type Attribute = Arc<dyn Any + Send + Sync>;

/// Ambient data for one inbound event.
///
/// Scalar fields are fixed at construction. The attribute map is the only
/// mutable part and is never shared with copies.
pub struct ContextData {
    id: Uuid,
    actor: Option<UserRef>,
    user_locale: Option<Locale>,
    guild_locale: Option<Locale>,
    session: Arc<dyn Platform>,
    shard: u32,
    attributes: DashMap<String, Attribute>,
}

impl ContextData {
    /// A fresh context on `session` with no actor or locales.
    pub fn new(session: Arc<dyn Platform>, shard: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: None,
            user_locale: None,
            guild_locale: None,
            session,
            shard,
            attributes: DashMap::new(),
        }
    }

    /// The user who triggered the event.
    pub fn with_actor(mut self, actor: UserRef) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Locale of the user's client.
    pub fn with_user_locale(mut self, locale: Locale) -> Self {
        self.user_locale = Some(locale);
        self
    }

    /// Only meaningful for events raised inside a guild.
    pub fn with_guild_locale(mut self, locale: Locale) -> Self {
        self.guild_locale = Some(locale);
        self
    }

    /// Build the context for an inbound interaction.
    pub fn from_interaction(event: &InteractionEvent, session: Arc<dyn Platform>) -> Self {
        Self {
            actor: event.user.clone(),
            user_locale: event.user_locale,
            guild_locale: event.guild_id.and(event.guild_locale),
            ..Self::new(session, event.shard)
        }
    }

    /// A distinct context with the same scalar fields and no attributes.
    pub fn copy(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: self.actor.clone(),
            user_locale: self.user_locale,
            guild_locale: self.guild_locale,
            session: Arc::clone(&self.session),
            shard: self.shard,
            attributes: DashMap::new(),
        }
    }

    /// Unique per instance; copies get their own.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The user who triggered the event, when the platform sent one.
    pub fn actor(&self) -> Option<&UserRef> {
        self.actor.as_ref()
    }

    /// Locale of the user's client, if sent.
    pub fn user_locale(&self) -> Option<Locale> {
        self.user_locale
    }

    /// Preferred locale of the guild, `None` outside guilds.
    pub fn guild_locale(&self) -> Option<Locale> {
        self.guild_locale
    }

    /// Session of the connection that received the event.
    pub fn session(&self) -> &Arc<dyn Platform> {
        &self.session
    }

    /// Shard the event arrived on.
    pub fn shard(&self) -> u32 {
        self.shard
    }

    /// True when both contexts carry the same scalar fields.
    pub fn same_scalars(&self, other: &ContextData) -> bool {
        self.actor == other.actor
            && self.user_locale == other.user_locale
            && self.guild_locale == other.guild_locale
            && self.shard == other.shard
            && Arc::ptr_eq(&self.session, &other.session)
    }

    /// Value stored under `key`, if any.
    pub fn attribute(&self, key: &str) -> Option<Attribute> {
        self.attributes.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `value` under `key`, returning what it replaced.
    pub fn set_attribute(&self, key: impl Into<String>, value: Attribute) -> Option<Attribute> {
        self.attributes.insert(key.into(), value)
    }

    /// Take the value under `key` out of the map.
    pub fn remove_attribute(&self, key: &str) -> Option<Attribute> {
        self.attributes.remove(key).map(|(_, value)| value)
    }

    /// Value under `key`, stored from `create` when absent.
    ///
    /// Concurrent callers for the same key all see the one stored value.
    pub fn attribute_or_insert_with(
        &self,
        key: &str,
        create: impl FnOnce() -> Attribute,
    ) -> Attribute {
        Arc::clone(self.attributes.entry(key.to_string()).or_insert_with(create).value())
    }

    /// Number of stored attributes.
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }
}

impl fmt::Debug for ContextData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextData")
            .field("id", &self.id)
            .field("actor", &self.actor)
            .field("user_locale", &self.user_locale)
            .field("guild_locale", &self.guild_locale)
            .field("shard", &self.shard)
            .field("attributes", &self.attributes.len())
            .finish()
    }
}

thread_local! {
    static LIVE: RefCell<Option<Arc<ContextData>>> = const { RefCell::new(None) };
}

/// The context live on the calling thread, if any.
pub fn current() -> Option<Arc<ContextData>> {
    LIVE.with(|live| live.borrow().clone())
}

/// Overwrite the calling thread's live context, returning the previous one.
fn install(context: Option<Arc<ContextData>>) -> Option<Arc<ContextData>> {
    LIVE.with(|live| live.replace(context))
}

/// Notified once when a context instance ends.
pub trait TerminationListener: Send + Sync {
    fn on_terminated(&self, context: &ContextData) -> anyhow::Result<()>;
}

/// Installs contexts around event handling and wraps continuations.
#[derive(Clone, Default)]
pub struct ContextPropagation {
    listeners: Arc<Vec<Arc<dyn TerminationListener>>>,
}

impl ContextPropagation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn TerminationListener>) -> Self {
        Arc::make_mut(&mut self.listeners).push(listener);
        self
    }

    /// Install `context` as the thread's live context until the guard drops.
    ///
    /// Dropping the guard publishes termination for `context` and clears the
    /// thread's live slot.
    pub fn enter(&self, context: ContextData) -> ContextGuard {
        let context = Arc::new(context);
        install(Some(Arc::clone(&context)));
        debug!("Entered context {} on shard {}", context.id, context.shard);
        ContextGuard {
            context,
            egress: Egress::Clear,
            events: self.clone(),
            _thread_bound: PhantomData,
        }
    }

    /// Run `f` with `context` live, terminating it afterwards even if `f` panics.
    pub fn scope<R>(&self, context: ContextData, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter(context);
        f()
    }

    /// Bind a callable to a copy of the live context.
    ///
    /// With no live context the callable comes back untouched as
    /// [`Scoped::Bare`].
    pub fn wrap<F>(&self, f: F) -> Scoped<F> {
        match current() {
            Some(live) => Scoped::Bound(BoundCallable {
                context: Arc::new(live.copy()),
                events: self.clone(),
                inner: f,
            }),
            None => Scoped::Bare(f),
        }
    }

    fn publish_terminated(&self, context: &ContextData) {
        for listener in self.listeners.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_terminated(context)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("An error occurred while terminating event context {}: {e:#}", context.id)
                }
                Err(_) => {
                    error!("A listener panicked while terminating event context {}", context.id)
                }
            }
        }
    }

    /// Install a wrapped copy, restoring whatever was live before on drop.
    fn install_restoring(&self, context: Arc<ContextData>) -> ContextGuard {
        let previous = install(Some(Arc::clone(&context)));
        ContextGuard {
            context,
            egress: Egress::Restore(previous),
            events: self.clone(),
            _thread_bound: PhantomData,
        }
    }
}

enum Egress {
    Clear,
    Restore(Option<Arc<ContextData>>),
}

/// Keeps a context live on the current thread; terminates it on drop.
#[must_use = "the context is terminated as soon as the guard is dropped"]
pub struct ContextGuard {
    context: Arc<ContextData>,
    egress: Egress,
    events: ContextPropagation,
    _thread_bound: PhantomData<*const ()>,
}

impl ContextGuard {
    pub fn context(&self) -> &Arc<ContextData> {
        &self.context
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.events.publish_terminated(&self.context);
        let restored = match &mut self.egress {
            Egress::Clear => None,
            Egress::Restore(previous) => previous.take(),
        };
        install(restored);
        debug!("Terminated context {}", self.context.id);
    }
}

/// A callable optionally bound to a context copy.
pub enum Scoped<F> {
    /// No context was live at wrap time; this is the original callable.
    Bare(F),
    Bound(BoundCallable<F>),
}

/// A callable carrying the context copy it will run under.
pub struct BoundCallable<F> {
    context: Arc<ContextData>,
    events: ContextPropagation,
    inner: F,
}

impl<F> Scoped<F> {
    pub fn is_bound(&self) -> bool {
        matches!(self, Scoped::Bound(_))
    }

    /// The copy this callable will install when invoked.
    pub fn context(&self) -> Option<&Arc<ContextData>> {
        match self {
            Scoped::Bare(_) => None,
            Scoped::Bound(bound) => Some(&bound.context),
        }
    }

    /// Unwrap the original callable, discarding any binding.
    pub fn into_inner(self) -> F {
        match self {
            Scoped::Bare(f) => f,
            Scoped::Bound(bound) => bound.inner,
        }
    }

    pub fn call<R>(self) -> R
    where
        F: FnOnce() -> R,
    {
        match self {
            Scoped::Bare(f) => f(),
            Scoped::Bound(bound) => {
                let _guard = bound.events.install_restoring(bound.context);
                (bound.inner)()
            }
        }
    }

    pub fn call_with<T, R>(self, arg: T) -> R
    where
        F: FnOnce(T) -> R,
    {
        match self {
            Scoped::Bare(f) => f(arg),
            Scoped::Bound(bound) => {
                let _guard = bound.events.install_restoring(bound.context);
                (bound.inner)(arg)
            }
        }
    }

    /// Adapt into a plain closure for APIs that take `FnOnce()`.
    pub fn into_fn<R>(self) -> impl FnOnce() -> R
    where
        F: FnOnce() -> R,
    {
        move || self.call()
    }

    /// Adapt into a plain closure for APIs that take `FnOnce(T)`.
    pub fn into_fn_with<T, R>(self) -> impl FnOnce(T) -> R
    where
        F: FnOnce(T) -> R,
    {
        move |arg| self.call_with(arg)
    }
}
