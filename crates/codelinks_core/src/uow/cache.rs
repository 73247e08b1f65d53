//! Type-indexed repository cache.
//!
//! # Invariants
//! - A key identifies the (entity, contract, implementation) triple exactly.
//! - A stored value is always an `Rc<Contract>` for the key's contract type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

/// Cache key built from the three repository type parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepositoryKey {
    entity: TypeId,
    contract: TypeId,
    implementation: TypeId,
}

impl RepositoryKey {
    pub fn of<E, Contract, Impl>() -> Self
    where
        E: 'static,
        Contract: ?Sized + 'static,
        Impl: 'static,
    {
        Self {
            entity: TypeId::of::<E>(),
            contract: TypeId::of::<Contract>(),
            implementation: TypeId::of::<Impl>(),
        }
    }
}

/// Converts a shared implementation into the contract handed to callers.
///
/// Every type is its own contract; trait-object contracts are declared per
/// implementation with a one-line impl returning `self`.
pub trait IntoContract<Contract: ?Sized> {
    fn into_contract(self: Rc<Self>) -> Rc<Contract>;
}

impl<T: 'static> IntoContract<T> for T {
    fn into_contract(self: Rc<Self>) -> Rc<T> {
        self
    }
}

/// Repository instances built for the current transaction.
#[derive(Default)]
pub struct RepositoryCache {
    entries: HashMap<RepositoryKey, Box<dyn Any>>,
}

impl RepositoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance for `key`, sharing the same allocation.
    pub fn get<Contract: ?Sized + 'static>(&self, key: &RepositoryKey) -> Option<Rc<Contract>> {
        self.entries
            .get(key)
            .and_then(|entry| entry.downcast_ref::<Rc<Contract>>())
            .map(Rc::clone)
    }

    pub fn insert<Contract: ?Sized + 'static>(
        &mut self,
        key: RepositoryKey,
        repository: Rc<Contract>,
    ) {
        self.entries.insert(key, Box::new(repository));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{IntoContract, RepositoryCache, RepositoryKey};
    use std::rc::Rc;

    trait Greeter {
        fn greet(&self) -> &'static str;
    }

    struct English;
    struct Marker;
    struct OtherMarker;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    impl IntoContract<dyn Greeter> for English {
        fn into_contract(self: Rc<Self>) -> Rc<dyn Greeter> {
            self
        }
    }

    #[test]
    fn keys_differ_by_every_type_parameter() {
        let base = RepositoryKey::of::<Marker, dyn Greeter, English>();
        assert_eq!(base, RepositoryKey::of::<Marker, dyn Greeter, English>());
        assert_ne!(base, RepositoryKey::of::<OtherMarker, dyn Greeter, English>());
        assert_ne!(base, RepositoryKey::of::<Marker, English, English>());
        assert_ne!(base, RepositoryKey::of::<Marker, dyn Greeter, Marker>());
    }

    #[test]
    fn get_returns_same_allocation_for_trait_object_contract() {
        let mut cache = RepositoryCache::new();
        let key = RepositoryKey::of::<Marker, dyn Greeter, English>();
        let stored: Rc<dyn Greeter> = Rc::new(English).into_contract();
        cache.insert(key, Rc::clone(&stored));

        let loaded = cache
            .get::<dyn Greeter>(&key)
            .expect("entry should be cached");
        assert!(Rc::ptr_eq(&stored, &loaded));
        assert_eq!(loaded.greet(), "hello");
    }

    #[test]
    fn get_with_wrong_contract_misses_and_clear_empties() {
        let mut cache = RepositoryCache::new();
        let key = RepositoryKey::of::<Marker, English, English>();
        cache.insert(key, Rc::new(English));
        assert_eq!(cache.len(), 1);
        assert!(cache.get::<dyn Greeter>(&key).is_none());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get::<English>(&key).is_none());
    }
}
