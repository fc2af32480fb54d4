use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::error::RegistryError;
use crate::message::{Message, MessageType};

/// Builds a fresh, default-valued message ready to be decoded into.
pub type Factory = fn() -> Box<dyn Message>;

fn create_default<M: Message + Default>() -> Box<dyn Message> {
    Box::<M>::default()
}

/// One `type id -> factory` binding.
#[derive(Clone, Copy)]
pub struct Registration {
    type_id: i32,
    rust_type: TypeId,
    type_name: &'static str,
    factory: Factory,
}

impl Registration {
    /// Bind `M` under its own [`MessageType::TYPE_ID`].
    pub fn of<M: MessageType>() -> Self {
        Self::with_id::<M>(M::TYPE_ID)
    }

    /// Bind `M` under an explicit type id.
    pub fn with_id<M: Message + Default>(type_id: i32) -> Self {
        Self {
            type_id,
            rust_type: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
            factory: create_default::<M>,
        }
    }

    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("type_id", &self.type_id)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Type-id-keyed registry of message factories.
///
/// A process-wide instance is available through [`Registry::global`]; every
/// connection also owns a local one that is consulted first. Registration
/// and lookup share one lock, so lookups never observe a half-applied batch.
pub struct Registry {
    scope: &'static str,
    entries: RwLock<HashMap<i32, Registration>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::scoped("local")
    }

    /// Create an empty registry with a scope name used in diagnostics.
    pub fn scoped(scope: &'static str) -> Self {
        Self {
            scope,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    ///
    /// Created empty on first access and shared for the life of the process.
    /// Connections fall back to it unless given another registry.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::scoped("global"))))
    }

    /// Register `M` under its own type id.
    pub fn register<M: MessageType>(&self) -> Result<(), RegistryError> {
        self.register_all(&[Registration::of::<M>()])
    }

    /// Register a single binding.
    pub fn register_entry(&self, registration: Registration) -> Result<(), RegistryError> {
        self.register_all(&[registration])
    }

    /// Register a batch of bindings atomically.
    ///
    /// Either every binding is added or, on the first conflict, none is.
    /// A binding conflicts when its type id is taken, when its message type
    /// is already registered under any id, or when it repeats within the
    /// batch.
    pub fn register_all(&self, batch: &[Registration]) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        for (index, candidate) in batch.iter().enumerate() {
            if let Some(existing) = entries.get(&candidate.type_id) {
                return Err(RegistryError::DuplicateType {
                    type_id: candidate.type_id,
                    existing: existing.type_name,
                });
            }
            if let Some(existing) = entries
                .values()
                .find(|entry| entry.rust_type == candidate.rust_type)
            {
                return Err(RegistryError::DuplicateFactory {
                    type_name: candidate.type_name,
                    existing_id: existing.type_id,
                });
            }
            let repeated = batch[..index].iter().any(|earlier| {
                earlier.type_id == candidate.type_id || earlier.rust_type == candidate.rust_type
            });
            if repeated {
                return Err(RegistryError::DuplicateInBatch {
                    type_id: candidate.type_id,
                    type_name: candidate.type_name,
                });
            }
        }

        for registration in batch {
            debug!(
                scope = self.scope,
                type_id = registration.type_id,
                type_name = registration.type_name,
                "registered message type"
            );
            entries.insert(registration.type_id, *registration);
        }
        Ok(())
    }

    /// Build a fresh message for `type_id`, or `None` if it is not registered.
    pub fn create(&self, type_id: i32) -> Option<Box<dyn Message>> {
        let factory = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .map(|entry| entry.factory);

        match factory {
            Some(factory) => Some(factory()),
            None => {
                debug!(scope = self.scope, type_id, "message type not registered");
                None
            }
        }
    }

    /// Whether `type_id` is bound.
    pub fn contains(&self, type_id: i32) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&type_id)
    }

    /// Rust type name bound to `type_id`.
    pub fn type_name(&self, type_id: i32) -> Option<&'static str> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .map(|entry| entry.type_name)
    }

    /// Registered type ids in ascending order.
    pub fn type_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scope name used in diagnostics.
    pub fn scope(&self) -> &'static str {
        self.scope
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("scope", &self.scope)
            .field("type_ids", &self.type_ids())
            .finish()
    }
}

/// Resolve `type_id` against `registries` in order, first hit wins.
pub fn resolve(registries: &[&Registry], type_id: i32) -> Option<Box<dyn Message>> {
    registries
        .iter()
        .find_map(|registry| registry.create(type_id))
}
