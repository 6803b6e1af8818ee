//! Loading contexts
//!
//! A [`LoadingContext`] resolves class names to class objects. A root
//! context defines every class it is asked for. An isolating context
//! (see [`IsolatingLoader`]) defines exactly one name itself and delegates
//! everything else to its parent, so the isolated class gets a fresh
//! identity and fresh static state while every other class is shared.

use crate::builtins;
use crate::loader::{BytecodeLoader, LoadError};
use crate::ClassRef;
use edutest_bytecode::ClassFile;
use parking_lot::{Mutex, ReentrantMutex};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Unique identifier for a loading context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Which names a context defines itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Define every requested name
    Root,
    /// Define only `target`; delegate everything else to the parent
    Isolating {
        /// The single self-defined name
        target: String,
    },
}

/// Hierarchical resolver of class names
pub struct LoadingContext {
    id: ContextId,
    parent: Option<Arc<LoadingContext>>,
    policy: LoadPolicy,
    loader: Arc<BytecodeLoader>,
    classes: Mutex<FxHashMap<String, ClassRef>>,
    in_progress: Mutex<FxHashSet<String>>,
    load_lock: ReentrantMutex<()>,
    me: Weak<LoadingContext>,
}

impl LoadingContext {
    /// Root context defining classes with `loader`
    pub fn root(loader: BytecodeLoader) -> Arc<Self> {
        Self::create(None, LoadPolicy::Root, Arc::new(loader))
    }

    /// Context that defines only `target` itself, sharing the parent's loader
    pub fn isolating(parent: &Arc<LoadingContext>, target: impl Into<String>) -> Arc<Self> {
        Self::create(
            Some(parent.clone()),
            LoadPolicy::Isolating {
                target: target.into(),
            },
            parent.loader.clone(),
        )
    }

    fn create(
        parent: Option<Arc<LoadingContext>>,
        policy: LoadPolicy,
        loader: Arc<BytecodeLoader>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| LoadingContext {
            id: ContextId::new(),
            parent,
            policy,
            loader,
            classes: Mutex::new(FxHashMap::default()),
            in_progress: Mutex::new(FxHashSet::default()),
            load_lock: ReentrantMutex::new(()),
            me: me.clone(),
        })
    }

    /// Unique id of this context
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Parent context
    pub fn parent(&self) -> Option<&Arc<LoadingContext>> {
        self.parent.as_ref()
    }

    /// Load policy
    pub fn policy(&self) -> &LoadPolicy {
        &self.policy
    }

    /// The isolated name, for isolating contexts
    pub fn isolation_target(&self) -> Option<&str> {
        match &self.policy {
            LoadPolicy::Root => None,
            LoadPolicy::Isolating { target } => Some(target),
        }
    }

    /// Loader used to define classes
    pub fn loader(&self) -> &BytecodeLoader {
        &self.loader
    }

    pub(crate) fn weak(&self) -> Weak<LoadingContext> {
        self.me.clone()
    }

    /// Class already defined by this context (not by its ancestors)
    pub fn find_loaded(&self, name: &str) -> Option<ClassRef> {
        self.classes.lock().get(name).cloned()
    }

    /// Resolve `name`
    ///
    /// Core classes come from the shared table. A root context defines the
    /// class on first request. An isolating context defines its target on
    /// first request, falling back to the parent only when no class file
    /// exists for it; every other name is delegated to the parent.
    pub fn load_class(&self, name: &str) -> Result<ClassRef, LoadError> {
        if let Some(class) = builtins::lookup(name) {
            return Ok(class);
        }
        match (&self.policy, &self.parent) {
            (LoadPolicy::Isolating { target }, Some(parent)) => {
                if target != name {
                    return parent.load_class(name);
                }
                match self.load_own(name) {
                    Err(e) if e.is_not_found() => {
                        log::debug!(
                            "isolated class {} not found in context {}, delegating to parent",
                            name,
                            self.id.0
                        );
                        parent.load_class(name)
                    }
                    other => other,
                }
            }
            _ => self.load_own(name),
        }
    }

    fn load_own(&self, name: &str) -> Result<ClassRef, LoadError> {
        let _guard = self.load_lock.lock();
        if let Some(class) = self.find_loaded(name) {
            return Ok(class);
        }
        if !self.in_progress.lock().insert(name.to_string()) {
            return Err(LoadError::CyclicInheritance(name.to_string()));
        }
        let result = self.loader.load_into(self, name);
        self.in_progress.lock().remove(name);
        result
    }

    /// Define `file` in this context
    pub fn define(&self, file: ClassFile) -> Result<ClassRef, LoadError> {
        let _guard = self.load_lock.lock();
        self.loader.define(self, file)
    }

    pub(crate) fn register(&self, class: ClassRef) -> Result<(), LoadError> {
        let mut classes = self.classes.lock();
        if classes.contains_key(class.name()) {
            return Err(LoadError::DuplicateDefinition(class.name().to_string()));
        }
        classes.insert(class.name().to_string(), class);
        Ok(())
    }
}

impl std::fmt::Debug for LoadingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingContext")
            .field("id", &self.id.0)
            .field("policy", &self.policy)
            .field("parent", &self.parent.as_ref().map(|p| p.id.0))
            .finish()
    }
}

/// Reloads a single named class into a fresh namespace
///
/// Every `IsolatingLoader` defines its target class anew, so the class it
/// returns is a distinct type from any other load of the same name and has
/// its own static state. All other names resolve through the parent.
#[derive(Debug, Clone)]
pub struct IsolatingLoader {
    context: Arc<LoadingContext>,
}

impl IsolatingLoader {
    /// Isolate `target` on top of `parent`
    pub fn new(parent: &Arc<LoadingContext>, target: impl Into<String>) -> Self {
        Self {
            context: LoadingContext::isolating(parent, target),
        }
    }

    /// The isolated name
    pub fn target(&self) -> &str {
        self.context.isolation_target().unwrap_or_default()
    }

    /// Underlying context
    pub fn context(&self) -> &Arc<LoadingContext> {
        &self.context
    }

    /// Resolve `name` through this loader
    pub fn load_class(&self, name: &str) -> Result<ClassRef, LoadError> {
        self.context.load_class(name)
    }
}
