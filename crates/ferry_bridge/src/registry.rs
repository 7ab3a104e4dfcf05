//! Process-wide class-id registry.
//!
//! Built once at startup with [`RegistryBuilder`], installed with
//! [`ClassRegistry::install`] and read-only afterwards. Registration after
//! installation is not possible: the builder is consumed.

use std::any::TypeId;
use std::sync::OnceLock;

use ahash::RandomState;
use ferry_core::{ClassId, ForeignClass};
use hashbrown::HashMap;

pub type FastHashMap<K, V> = HashMap<K, V, RandomState>;

fn fast_hasher() -> RandomState {
    RandomState::with_seeds(0, 0, 0, 0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassInfo {
    pub id: ClassId,
    pub name: &'static str,
    pub type_id: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("class {name} uses the reserved id 0")]
    ReservedId { name: &'static str },
    #[error("class id {id} is already taken by {existing}, cannot register {name}")]
    Duplicate {
        id: ClassId,
        existing: &'static str,
        name: &'static str,
    },
    #[error("a class registry is already installed")]
    AlreadyInstalled,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    classes: Vec<ClassInfo>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ForeignClass>(&mut self) -> Result<&mut Self, RegistryError> {
        if T::CLASS_ID == ClassId::NONE {
            return Err(RegistryError::ReservedId { name: T::CLASS_NAME });
        }
        if let Some(existing) = self.classes.iter().find(|c| c.id == T::CLASS_ID) {
            return Err(RegistryError::Duplicate {
                id: T::CLASS_ID,
                existing: existing.name,
                name: T::CLASS_NAME,
            });
        }
        self.classes.push(ClassInfo {
            id: T::CLASS_ID,
            name: T::CLASS_NAME,
            type_id: TypeId::of::<T>(),
        });
        Ok(self)
    }

    pub fn build(self) -> ClassRegistry {
        let mut by_id = HashMap::with_capacity_and_hasher(self.classes.len(), fast_hasher());
        for (slot, info) in self.classes.iter().enumerate() {
            by_id.insert(info.id, slot);
        }
        ClassRegistry {
            classes: self.classes,
            by_id,
        }
    }
}

#[derive(Debug)]
pub struct ClassRegistry {
    classes: Vec<ClassInfo>,
    by_id: FastHashMap<ClassId, usize>,
}

static GLOBAL: OnceLock<ClassRegistry> = OnceLock::new();

impl ClassRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassInfo> {
        self.by_id.get(&id).map(|&slot| &self.classes[slot])
    }

    pub fn name_of(&self, id: ClassId) -> Option<&'static str> {
        self.get(id).map(|c| c.name)
    }

    /// True when `T` is registered under its own class id.
    pub fn contains<T: ForeignClass>(&self) -> bool {
        self.get(T::CLASS_ID)
            .is_some_and(|c| c.type_id == TypeId::of::<T>())
    }

    /// Classes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Makes this the process-wide registry. Only the first call succeeds.
    pub fn install(self) -> Result<&'static ClassRegistry, RegistryError> {
        let count = self.classes.len();
        let mut installed = false;
        let reg = GLOBAL.get_or_init(|| {
            installed = true;
            self
        });
        if !installed {
            return Err(RegistryError::AlreadyInstalled);
        }
        tracing::debug!(target: "ferry::registry", classes = count, "class registry installed");
        Ok(reg)
    }
}

/// The installed registry, if any.
pub fn global() -> Option<&'static ClassRegistry> {
    GLOBAL.get()
}

/// Name of a class for messages: the registered name, or a generic label.
pub fn class_name(id: ClassId) -> &'static str {
    global()
        .and_then(|r| r.name_of(id))
        .unwrap_or("object of another class")
}
