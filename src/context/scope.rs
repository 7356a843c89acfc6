//! Objects whose lifetime is bound to one event context
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: A foreign value in the scoped-objects slot is replaced
//! - 1.0.0: Lazy per-context instances, disposed on termination

use dashmap::DashMap;
use log::{debug, warn};
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use super::{current, Attribute, ContextData, TerminationListener};
use crate::core::ContextError;

/// Attribute under which a context keeps its scoped objects.
pub const SCOPED_OBJECTS_ATTRIBUTE: &str = "cordscope.scoped_objects";

/// Capability for scoped objects that want to see their owning context.
pub trait ContextAware {
    fn set_context(&mut self, context: &ContextData);
}

/// An object created at most once per context.
pub trait ScopedObject: Send + Sync + 'static {
    /// Expose the [`ContextAware`] capability, if implemented.
    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        None
    }

    /// Called when the owning context terminates.
    fn dispose(&self) {}
}

trait ScopedInstance: Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn dispose(&self);
}

impl<T: ScopedObject> ScopedInstance for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn dispose(&self) {
        ScopedObject::dispose(self)
    }
}

type Factory = Arc<dyn Fn(&ContextData) -> Arc<dyn ScopedInstance> + Send + Sync>;

#[derive(Default)]
struct ScopedObjects {
    instances: DashMap<TypeId, (&'static str, Arc<dyn ScopedInstance>)>,
}

/// Creates scoped objects on demand and disposes them with their context.
///
/// Register it as a [`TerminationListener`] on the
/// [`ContextPropagation`](super::ContextPropagation) that owns the contexts.
#[derive(Clone, Default)]
pub struct ScopeManager {
    factories: Arc<DashMap<TypeId, Factory>>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how instances of `T` are built.
    pub fn provide<T, F>(&self, factory: F)
    where
        T: ScopedObject,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |context: &ContextData| {
            let mut instance = factory();
            if let Some(aware) = instance.as_context_aware() {
                aware.set_context(context);
            }
            Arc::new(instance) as Arc<dyn ScopedInstance>
        });
        self.factories.insert(TypeId::of::<T>(), factory);
    }

    /// Whether scoped objects can be requested on this thread right now.
    pub fn is_active(&self) -> bool {
        current().is_some()
    }

    /// The live context's instance of `T`, created on first request.
    pub fn get<T: ScopedObject>(&self) -> Result<Arc<T>, ContextError> {
        let kind = type_name::<T>();
        let context = current().ok_or(ContextError::NoLiveContext { kind })?;
        let objects = scoped_objects(&context);

        let key = TypeId::of::<T>();
        let existing = objects
            .instances
            .get(&key)
            .map(|entry| Arc::clone(&entry.value().1));
        let instance = match existing {
            Some(instance) => instance,
            None => {
                let factory = self
                    .factories
                    .get(&key)
                    .map(|entry| Arc::clone(entry.value()))
                    .ok_or(ContextError::NoProvider { kind })?;
                // Built outside the map lock so factories may request other kinds.
                let created = factory(&context);
                let instance = Arc::clone(&objects.instances.entry(key).or_insert((kind, created)).1);
                debug!("Created scoped {kind} for context {}", context.id());
                instance
            }
        };

        instance
            .into_any()
            .downcast::<T>()
            .map_err(|_| ContextError::NoProvider { kind })
    }

    /// Dispose every scoped object of the live context.
    pub fn close_current(&self) {
        if let Some(context) = current() {
            dispose_all(&context);
        }
    }
}

impl TerminationListener for ScopeManager {
    fn on_terminated(&self, context: &ContextData) -> anyhow::Result<()> {
        dispose_all(context);
        Ok(())
    }
}

// The slot is owned by the manager; anything else stored there is dropped.
fn scoped_objects(context: &ContextData) -> Arc<ScopedObjects> {
    let attribute = context.attribute_or_insert_with(SCOPED_OBJECTS_ATTRIBUTE, || {
        Arc::new(ScopedObjects::default()) as Attribute
    });
    match attribute.downcast::<ScopedObjects>() {
        Ok(objects) => objects,
        Err(_) => {
            warn!(
                "Replacing foreign value under '{SCOPED_OBJECTS_ATTRIBUTE}' in context {}",
                context.id()
            );
            let objects = Arc::new(ScopedObjects::default());
            context.set_attribute(SCOPED_OBJECTS_ATTRIBUTE, Arc::clone(&objects) as Attribute);
            objects
        }
    }
}

fn dispose_all(context: &ContextData) {
    let Some(objects) = context
        .remove_attribute(SCOPED_OBJECTS_ATTRIBUTE)
        .and_then(|attribute| attribute.downcast::<ScopedObjects>().ok())
    else {
        return;
    };
    let keys: Vec<TypeId> = objects.instances.iter().map(|entry| *entry.key()).collect();
    for key in keys {
        if let Some((_, (kind, instance))) = objects.instances.remove(&key) {
            instance.dispose();
            debug!("Disposed scoped {kind} for context {}", context.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextPropagation;
    use crate::locale::Locale;
    use crate::platform::testing::RecordingPlatform;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        disposed: Arc<AtomicUsize>,
    }

    impl ScopedObject for Counter {
        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct LocaleSnapshot {
        locale: Option<Locale>,
        calls: usize,
    }

    impl ContextAware for LocaleSnapshot {
        fn set_context(&mut self, context: &ContextData) {
            self.locale = context.user_locale();
            self.calls += 1;
        }
    }

    impl ScopedObject for LocaleSnapshot {
        fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
            Some(self)
        }
    }

    struct Unprovided;

    impl ScopedObject for Unprovided {}

    fn setup() -> (ContextPropagation, ScopeManager, Arc<AtomicUsize>) {
        let scopes = ScopeManager::new();
        let disposed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disposed);
        scopes.provide(move || Counter {
            disposed: Arc::clone(&counter),
        });
        scopes.provide(LocaleSnapshot::default);
        let events = ContextPropagation::new().with_listener(Arc::new(scopes.clone()));
        (events, scopes, disposed)
    }

    fn context() -> ContextData {
        ContextData::new(Arc::new(RecordingPlatform::new()), 0).with_user_locale(Locale::Japanese)
    }

    #[test]
    fn test_get_without_context_fails() {
        let (_events, scopes, _) = setup();
        assert!(!scopes.is_active());
        assert!(matches!(
            scopes.get::<Counter>(),
            Err(ContextError::NoLiveContext { .. })
        ));
    }

    #[test]
    fn test_same_instance_within_context() {
        let (events, scopes, _) = setup();
        events.scope(context(), || {
            let first = scopes.get::<Counter>().unwrap();
            let second = scopes.get::<Counter>().unwrap();
            assert!(Arc::ptr_eq(&first, &second));
        });
    }

    #[test]
    fn test_new_instance_after_termination() {
        let (events, scopes, disposed) = setup();
        let first = events.scope(context(), || scopes.get::<Counter>().unwrap());
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        let second = events.scope(context(), || scopes.get::<Counter>().unwrap());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_context_aware_receives_context_once() {
        let (events, scopes, _) = setup();
        events.scope(context(), || {
            let snapshot = scopes.get::<LocaleSnapshot>().unwrap();
            assert_eq!(snapshot.locale, Some(Locale::Japanese));
            assert_eq!(snapshot.calls, 1);
            let again = scopes.get::<LocaleSnapshot>().unwrap();
            assert_eq!(again.calls, 1);
        });
    }

    #[test]
    fn test_foreign_slot_value_is_replaced() {
        let (events, scopes, disposed) = setup();
        let context = context();
        context.set_attribute(SCOPED_OBJECTS_ATTRIBUTE, Arc::new("not ours") as Attribute);

        events.scope(context, || {
            let first = scopes.get::<Counter>().unwrap();
            let second = scopes.get::<Counter>().unwrap();
            assert!(Arc::ptr_eq(&first, &second));
        });
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_provider() {
        let (events, scopes, _) = setup();
        events.scope(context(), || {
            assert!(matches!(
                scopes.get::<Unprovided>(),
                Err(ContextError::NoProvider { .. })
            ));
        });
    }

    #[test]
    fn test_termination_without_objects_is_noop() {
        let (events, _scopes, disposed) = setup();
        events.scope(context(), || {});
        assert_eq!(disposed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wrapped_copy_gets_its_own_instances() {
        let (events, scopes, disposed) = setup();
        let (original, wrapped) = events.scope(context(), || {
            let original = scopes.get::<Counter>().unwrap();
            let scopes = scopes.clone();
            (original, events.wrap(move || scopes.get::<Counter>().unwrap()))
        });
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        let continued = std::thread::spawn(move || wrapped.call()).join().unwrap();
        assert!(!Arc::ptr_eq(&original, &continued));
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_close_current_disposes() {
        let (events, scopes, disposed) = setup();
        events.scope(context(), || {
            let first = scopes.get::<Counter>().unwrap();
            scopes.close_current();
            assert_eq!(disposed.load(Ordering::SeqCst), 1);
            let second = scopes.get::<Counter>().unwrap();
            assert!(!Arc::ptr_eq(&first, &second));
        });
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }
}
