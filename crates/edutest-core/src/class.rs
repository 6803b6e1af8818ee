//! Class objects
//!
//! A [`Class`] is produced by a loading context from a class file. It owns
//! its static field storage, so every definition of a class has its own
//! static state. Type references inside the class (superclass, parameter,
//! return and field types) resolve through the scope the class was defined
//! in, and the class's own name always resolves to itself.

use crate::context::{ContextId, LoadingContext};
use crate::fault::{kinds, Fault};
use crate::interpreter;
use crate::loader::LoadError;
use crate::member::{Constructor, Method};
use crate::native::NativeFn;
use crate::types::Type;
use crate::value::Value;
use edutest_bytecode::{access, PrimitiveType, TypeDesc, CONSTRUCTOR_NAME, STATIC_INIT_NAME};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// Shared reference to a class
pub type ClassRef = Arc<Class>;

/// Unique identifier for a class definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u64);

impl ClassId {
    fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ClassId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Field metadata
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Access flags
    pub access: u16,
    /// Declared type
    pub ty: TypeDesc,
}

impl FieldInfo {
    /// Whether this is a static field
    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    /// Primitive kind of the field, `None` for references
    pub fn primitive_kind(&self) -> Option<PrimitiveType> {
        match self.ty {
            TypeDesc::Primitive(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Linked method implementation
#[derive(Clone)]
pub(crate) enum Body {
    Code(Arc<[u8]>),
    Native(NativeFn),
    Abstract,
}

/// Linked method (constructors and static initializer included)
#[derive(Clone)]
pub(crate) struct MethodInfo {
    pub(crate) name: String,
    pub(crate) access: u16,
    pub(crate) params: Vec<TypeDesc>,
    pub(crate) return_type: TypeDesc,
    pub(crate) max_locals: u16,
    pub(crate) body: Body,
}

impl MethodInfo {
    pub(crate) fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    pub(crate) fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    pub(crate) fn is_ordinary(&self) -> bool {
        self.name != CONSTRUCTOR_NAME && self.name != STATIC_INIT_NAME
    }
}

/// Where a class's type references resolve
pub(crate) enum ClassScope {
    /// Core class, resolves only core classes
    Builtin,
    /// Defined by a context that owns it
    Context(Weak<LoadingContext>),
    /// Defined by an isolating context; everything but the class itself
    /// resolves through the parent
    Parent(Arc<LoadingContext>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Pending,
    Running(ThreadId),
    Done,
    Failed,
}

/// Everything needed to construct a class
pub(crate) struct ClassParts {
    pub(crate) name: String,
    pub(crate) access: u16,
    pub(crate) superclass: Option<ClassRef>,
    pub(crate) scope: ClassScope,
    pub(crate) context: Option<ContextId>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) strings: Vec<Arc<str>>,
}

/// A defined class
pub struct Class {
    id: ClassId,
    name: String,
    access: u16,
    superclass: Option<ClassRef>,
    scope: ClassScope,
    context: Option<ContextId>,
    fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) strings: Vec<Arc<str>>,
    statics: Mutex<FxHashMap<String, Value>>,
    init: Mutex<InitState>,
    init_done: Condvar,
    me: Weak<Class>,
}

impl Class {
    pub(crate) fn new(parts: ClassParts) -> ClassRef {
        let statics = parts
            .fields
            .iter()
            .filter(|f| f.is_static())
            .map(|f| (f.name.clone(), Value::default_for(f.primitive_kind())))
            .collect();

        Arc::new_cyclic(|me| Class {
            id: ClassId::new(),
            name: parts.name,
            access: parts.access,
            superclass: parts.superclass,
            scope: parts.scope,
            context: parts.context,
            fields: parts.fields,
            methods: parts.methods,
            strings: parts.strings,
            statics: Mutex::new(statics),
            init: Mutex::new(InitState::Pending),
            init_done: Condvar::new(),
            me: me.clone(),
        })
    }

    pub(crate) fn builtin(name: &str, superclass: Option<ClassRef>) -> ClassRef {
        let access = match superclass {
            Some(_) => access::PUBLIC | access::FINAL,
            None => access::PUBLIC,
        };
        let class = Class::new(ClassParts {
            name: name.to_string(),
            access,
            superclass,
            scope: ClassScope::Builtin,
            context: None,
            fields: Vec::new(),
            methods: Vec::new(),
            strings: Vec::new(),
        });
        *class.init.lock() = InitState::Done;
        class
    }

    /// Unique id of this definition
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Qualified name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without the package
    pub fn simple_name(&self) -> &str {
        edutest_bytecode::simple_name(&self.name)
    }

    /// Package part of the name, if any
    pub fn package(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(pkg, _)| pkg)
    }

    /// Access flags
    pub fn access(&self) -> u16 {
        self.access
    }

    /// Whether the class is public
    pub fn is_public(&self) -> bool {
        self.access & access::PUBLIC != 0
    }

    /// Whether the class is abstract
    pub fn is_abstract(&self) -> bool {
        self.access & access::ABSTRACT != 0
    }

    /// Whether this is one of the shared core classes
    pub fn is_builtin(&self) -> bool {
        matches!(self.scope, ClassScope::Builtin)
    }

    /// Direct superclass (`None` only for `lang.Object`)
    pub fn superclass(&self) -> Option<&ClassRef> {
        self.superclass.as_ref()
    }

    /// Id of the context that defined this class (`None` for core classes)
    pub fn context_id(&self) -> Option<ContextId> {
        self.context
    }

    /// Declared fields
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Whether `self` is `other` or one of its subclasses
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.id == other.id {
                return true;
            }
            current = class.superclass.as_deref();
        }
        false
    }

    /// Resolve a class name as seen from this class
    pub fn resolve(&self, name: &str) -> Result<ClassRef, LoadError> {
        if name == self.name {
            return self
                .me
                .upgrade()
                .ok_or_else(|| LoadError::ContextDropped(name.to_string()));
        }
        if let Some(class) = crate::builtins::lookup(name) {
            return Ok(class);
        }
        match &self.scope {
            ClassScope::Builtin => Err(LoadError::ClassNotFound(name.to_string())),
            ClassScope::Context(ctx) => ctx
                .upgrade()
                .ok_or_else(|| LoadError::ContextDropped(name.to_string()))?
                .load_class(name),
            ClassScope::Parent(parent) => parent.load_class(name),
        }
    }

    /// Resolve a type descriptor as seen from this class
    pub fn resolve_type(&self, desc: &TypeDesc) -> Result<Type, LoadError> {
        Ok(match desc {
            TypeDesc::Void => Type::Void,
            TypeDesc::Primitive(kind) => Type::Primitive(*kind),
            TypeDesc::Class(name) => Type::Class(self.resolve(name)?),
        })
    }

    fn desc_matches(&self, desc: &TypeDesc, ty: &Type) -> bool {
        match (desc, ty) {
            (TypeDesc::Void, Type::Void) => true,
            (TypeDesc::Primitive(a), Type::Primitive(b)) => a == b,
            (TypeDesc::Class(name), Type::Class(class)) => {
                name == class.name()
                    && self
                        .resolve(name)
                        .map(|found| Arc::ptr_eq(&found, class))
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    pub(crate) fn params_match(&self, declared: &[TypeDesc], wanted: &[Type]) -> bool {
        declared.len() == wanted.len()
            && declared
                .iter()
                .zip(wanted)
                .all(|(desc, ty)| self.desc_matches(desc, ty))
    }

    /// Method declared directly in this class with exactly these parameter types
    pub fn declared_method(self: &Arc<Self>, name: &str, params: &[Type]) -> Option<Method> {
        self.methods
            .iter()
            .position(|m| m.is_ordinary() && m.name == name && self.params_match(&m.params, params))
            .map(|index| Method::new(self.clone(), index))
    }

    /// All methods declared directly in this class
    pub fn declared_methods(self: &Arc<Self>) -> Vec<Method> {
        self.methods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_ordinary())
            .map(|(index, _)| Method::new(self.clone(), index))
            .collect()
    }

    /// Constructor with exactly these parameter types
    pub fn declared_constructor(self: &Arc<Self>, params: &[Type]) -> Option<Constructor> {
        self.methods
            .iter()
            .position(|m| m.is_constructor() && self.params_match(&m.params, params))
            .map(|index| Constructor::new(self.clone(), index))
    }

    /// All constructors
    pub fn declared_constructors(self: &Arc<Self>) -> Vec<Constructor> {
        self.methods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_constructor())
            .map(|(index, _)| Constructor::new(self.clone(), index))
            .collect()
    }

    /// Whether the static initializer has completed
    pub fn is_initialized(&self) -> bool {
        *self.init.lock() == InitState::Done
    }

    /// Run the static initializer if it hasn't run yet
    ///
    /// Superclasses are initialized first. A fault raised by the initializer
    /// is returned as is the first time; afterwards the class is unusable and
    /// every attempt fails with `NoClassDefFoundError`. A thread that is
    /// already initializing the class sees it as initialized.
    pub fn ensure_initialized(self: &Arc<Self>) -> Result<(), Fault> {
        let me = thread::current().id();
        {
            let mut state = self.init.lock();
            loop {
                match *state {
                    InitState::Done => return Ok(()),
                    InitState::Failed => {
                        return Err(Fault::with_message(
                            kinds::NO_CLASS_DEF,
                            format!("Could not initialize class {}", self.name),
                        ))
                    }
                    InitState::Running(owner) if owner == me => return Ok(()),
                    InitState::Running(_) => self.init_done.wait(&mut state),
                    InitState::Pending => {
                        *state = InitState::Running(me);
                        break;
                    }
                }
            }
        }

        let result = self.run_static_init();

        let mut state = self.init.lock();
        *state = if result.is_ok() {
            InitState::Done
        } else {
            InitState::Failed
        };
        self.init_done.notify_all();
        drop(state);

        if result.is_ok() {
            log::debug!("initialized class {} (#{})", self.name, self.id.0);
        }
        result
    }

    fn run_static_init(self: &Arc<Self>) -> Result<(), Fault> {
        if let Some(superclass) = &self.superclass {
            superclass.ensure_initialized()?;
        }
        match self
            .methods
            .iter()
            .position(|m| m.name == STATIC_INIT_NAME && m.is_static())
        {
            Some(index) => interpreter::execute(self, index, Vec::new()).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Class along the superclass chain declaring static field `name`
    pub(crate) fn static_owner(self: &Arc<Self>, name: &str) -> Option<ClassRef> {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.statics.lock().contains_key(name) {
                return Some(class.clone());
            }
            current = class.superclass.as_ref();
        }
        None
    }

    pub(crate) fn read_static(&self, name: &str) -> Option<Value> {
        self.statics.lock().get(name).cloned()
    }

    pub(crate) fn write_static(&self, name: &str, value: Value) -> bool {
        match self.statics.lock().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Read a static field, initializing its class first
    pub fn get_static(self: &Arc<Self>, name: &str) -> Result<Value, Fault> {
        let owner = self.static_owner(name).ok_or_else(|| no_such_field(self, name))?;
        owner.ensure_initialized()?;
        owner.read_static(name).ok_or_else(|| no_such_field(self, name))
    }

    /// Write a static field, initializing its class first
    pub fn set_static(self: &Arc<Self>, name: &str, value: Value) -> Result<(), Fault> {
        let owner = self.static_owner(name).ok_or_else(|| no_such_field(self, name))?;
        owner.ensure_initialized()?;
        owner.write_static(name, value);
        Ok(())
    }
}

pub(crate) fn no_such_field(class: &Class, name: &str) -> Fault {
    Fault::with_message(kinds::NO_SUCH_FIELD, format!("{}.{}", class.name(), name))
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({}#{})", self.name, self.id.0)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
