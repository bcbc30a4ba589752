//! Reflective entity keys
//!
//! Keys are identity tokens minted by the transformation engine. Two keys
//! are equal only when they denote the same declared entity; a redefined
//! class gets fresh ids, so its keys never collide with the old ones.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of a declared entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Identity of a class loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub u64);

/// Global loader ID counter
static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

impl LoaderId {
    /// Allocate a process-unique loader id
    pub fn next() -> Self {
        LoaderId(NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loader#{}", self.0)
    }
}

/// A class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassKey(pub EntityId);

impl ClassKey {
    /// Create a class key
    pub fn new(id: u64) -> Self {
        ClassKey(EntityId(id))
    }
}

/// A field of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    /// Declaring class
    pub class: ClassKey,
    /// Field identity
    pub field: EntityId,
}

impl FieldKey {
    /// Create a field key
    pub fn new(class: ClassKey, id: u64) -> Self {
        Self {
            class,
            field: EntityId(id),
        }
    }
}

/// A method of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodKey {
    /// Declaring class
    pub class: ClassKey,
    /// Method identity
    pub method: EntityId,
}

impl MethodKey {
    /// Create a method key
    pub fn new(class: ClassKey, id: u64) -> Self {
        Self {
            class,
            method: EntityId(id),
        }
    }
}

/// A constructor of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstructorKey {
    /// Declaring class
    pub class: ClassKey,
    /// Constructor identity
    pub constructor: EntityId,
}

impl ConstructorKey {
    /// Create a constructor key
    pub fn new(class: ClassKey, id: u64) -> Self {
        Self {
            class,
            constructor: EntityId(id),
        }
    }
}

/// Any reflective entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectiveKey {
    /// A class
    Class(ClassKey),
    /// A field
    Field(FieldKey),
    /// A method
    Method(MethodKey),
    /// A constructor
    Constructor(ConstructorKey),
}

impl From<ClassKey> for ReflectiveKey {
    fn from(key: ClassKey) -> Self {
        ReflectiveKey::Class(key)
    }
}

impl From<FieldKey> for ReflectiveKey {
    fn from(key: FieldKey) -> Self {
        ReflectiveKey::Field(key)
    }
}

impl From<MethodKey> for ReflectiveKey {
    fn from(key: MethodKey) -> Self {
        ReflectiveKey::Method(key)
    }
}

impl From<ConstructorKey> for ReflectiveKey {
    fn from(key: ConstructorKey) -> Self {
        ReflectiveKey::Constructor(key)
    }
}

impl fmt::Display for ReflectiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReflectiveKey::Class(c) => write!(f, "class#{}", c.0 .0),
            ReflectiveKey::Field(k) => write!(f, "field#{}.{}", k.class.0 .0, k.field.0),
            ReflectiveKey::Method(k) => write!(f, "method#{}.{}", k.class.0 .0, k.method.0),
            ReflectiveKey::Constructor(k) => {
                write!(f, "constructor#{}.{}", k.class.0 .0, k.constructor.0)
            }
        }
    }
}
