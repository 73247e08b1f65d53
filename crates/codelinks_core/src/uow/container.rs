//! Type-indexed registry of shared services resolved by repository constructors.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

/// Shared services keyed by their type, including trait objects.
///
/// Services are registered once at startup and cloned cheaply into scoped
/// copies, for example to swap the current user for one caller.
#[derive(Default, Clone)]
pub struct ServiceContainer {
    services: HashMap<TypeId, Rc<dyn Any>>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a concrete service value, replacing any earlier registration.
    pub fn register<T: 'static>(&mut self, service: T) -> &mut Self {
        self.register_shared(Rc::new(service))
    }

    /// Registers an already shared service; use this for trait objects.
    pub fn register_shared<T: ?Sized + 'static>(&mut self, service: Rc<T>) -> &mut Self {
        // Stored as `Rc<Rc<T>>` so unsized services survive the `Any` erasure.
        self.services.insert(TypeId::of::<T>(), Rc::new(service));
        self
    }

    pub fn resolve<T: ?Sized + 'static>(&self) -> Option<Rc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|service| service.downcast_ref::<Rc<T>>())
            .map(Rc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceContainer;
    use std::rc::Rc;

    trait Counter {
        fn count(&self) -> u32;
    }

    struct Fixed(u32);

    impl Counter for Fixed {
        fn count(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn resolves_concrete_and_trait_object_services() {
        let mut container = ServiceContainer::new();
        container
            .register(String::from("alice"))
            .register_shared::<dyn Counter>(Rc::new(Fixed(3)));

        let name = container.resolve::<String>().expect("string registered");
        assert_eq!(name.as_str(), "alice");
        let counter = container
            .resolve::<dyn Counter>()
            .expect("counter registered");
        assert_eq!(counter.count(), 3);
        assert!(container.resolve::<Fixed>().is_none());
    }

    #[test]
    fn clone_isolates_later_overrides() {
        let mut base = ServiceContainer::new();
        base.register(1_u32);
        let mut scoped = base.clone();
        scoped.register(2_u32);

        assert_eq!(*base.resolve::<u32>().expect("base value"), 1);
        assert_eq!(*scoped.resolve::<u32>().expect("scoped value"), 2);
    }
}
