//! Object instances

use crate::class::ClassRef;
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared reference to an object
pub type ObjectRef = Arc<Object>;

/// An instance of a loaded class
#[derive(Debug)]
pub struct Object {
    id: u64,
    class: ClassRef,
    fields: Mutex<FxHashMap<String, Value>>,
}

impl Object {
    /// Allocate an instance with every instance field along the
    /// superclass chain set to its default value
    pub(crate) fn allocate(class: &ClassRef) -> ObjectRef {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        let mut fields = FxHashMap::default();
        let mut current = Some(class);
        while let Some(cls) = current {
            for field in cls.fields().iter().filter(|f| !f.is_static()) {
                fields
                    .entry(field.name.clone())
                    .or_insert_with(|| Value::default_for(field.primitive_kind()));
            }
            current = cls.superclass();
        }

        Arc::new(Object {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            class: class.clone(),
            fields: Mutex::new(fields),
        })
    }

    /// Identity number, unique per process
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Runtime class
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Read a field; `None` if the class has no such field
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.lock().get(name).cloned()
    }

    /// Write a field; returns `false` if the class has no such field
    pub fn set_field(&self, name: &str, value: Value) -> bool {
        match self.fields.lock().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
