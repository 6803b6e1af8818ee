//! Class byte lookup and definition
//!
//! [`ResourceLookup`] maps a dotted class name to a byte stream.
//! [`BytecodeLoader`] reads those bytes, decodes and verifies the class file
//! and defines it in a loading context.

use crate::class::{Body, ClassParts, ClassScope, FieldInfo, MethodInfo};
use crate::context::{LoadPolicy, LoadingContext};
use crate::native::NativeRegistry;
use crate::ClassRef;
use edutest_bytecode::{
    access, verify_class, ClassFile, ClassFileError, MethodBody, MethodDef, TypeDesc, VerifyError,
    CONSTRUCTOR_NAME,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// File extension of class files on disk
pub const CLASS_FILE_EXTENSION: &str = "educ";

/// Errors raised while loading or defining a class
#[derive(Debug, Error)]
pub enum LoadError {
    /// No resource exists for the name
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// The resource exists but could not be read
    #[error("I/O error reading class {name}: {source}")]
    Io {
        /// Class being read
        name: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The bytes are not a valid class file
    #[error("malformed class file for {name}: {source}")]
    Format {
        /// Class being defined
        name: String,
        /// Decoder error
        #[source]
        source: ClassFileError,
    },

    /// A method body failed verification
    #[error("verification of {name} failed: {source}")]
    Verify {
        /// Class being defined
        name: String,
        /// Verifier error
        #[source]
        source: VerifyError,
    },

    /// The class file describes a different class than requested
    #[error("class file for {requested} defines {found}")]
    NameMismatch {
        /// Requested name
        requested: String,
        /// Name found in the class file
        found: String,
    },

    /// The superclass could not be loaded
    #[error("superclass {superclass} of {name} could not be loaded: {source}")]
    MissingSuperclass {
        /// Class being defined
        name: String,
        /// Superclass name
        superclass: String,
        /// Why the superclass failed to load
        #[source]
        source: Box<LoadError>,
    },

    /// A native method body names an unregistered symbol
    #[error("{name}.{method}: unknown native function {symbol}")]
    UnresolvedNative {
        /// Class being defined
        name: String,
        /// Method name
        method: String,
        /// Unknown symbol
        symbol: String,
    },

    /// The name is already defined in the target context
    #[error("class {0} is already defined in this context")]
    DuplicateDefinition(String),

    /// A class is (transitively) its own superclass
    #[error("cyclic inheritance involving {0}")]
    CyclicInheritance(String),

    /// The context a class was defined in no longer exists
    #[error("loading context for {0} has been dropped")]
    ContextDropped(String),
}

impl LoadError {
    /// Whether this is a plain "no such class" failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::ClassNotFound(_))
    }
}

/// Maps class names to byte streams
pub trait ResourceLookup: Send + Sync {
    /// Open the resource for `name`
    ///
    /// Returns `Ok(None)` if there is no such resource and `Err` if it
    /// exists but cannot be opened.
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>>;
}

/// Class files stored under a directory: `a.b.C` is `<root>/a/b/C.educ`
#[derive(Debug, Clone)]
pub struct DirectoryClassPath {
    root: PathBuf,
}

impl DirectoryClassPath {
    /// Use `root` as the class path root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Class path root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the class file for `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.split('.') {
            path.push(segment);
        }
        path.set_extension(CLASS_FILE_EXTENSION);
        path
    }
}

impl ResourceLookup for DirectoryClassPath {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
        match File::open(self.path_for(name)) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory class path
#[derive(Debug, Default)]
pub struct MemoryClassPath {
    classes: RwLock<FxHashMap<String, Arc<[u8]>>>,
}

impl MemoryClassPath {
    /// Create an empty class path
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the bytes for `name`
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.classes.write().insert(name.into(), Arc::from(bytes));
    }

    /// Encode and add a class file under its own name
    pub fn insert_class(&self, class: &ClassFile) {
        self.insert(class.name.clone(), class.encode());
    }

    /// Remove the bytes for `name`
    pub fn remove(&self, name: &str) -> bool {
        self.classes.write().remove(name).is_some()
    }
}

impl ResourceLookup for MemoryClassPath {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
        Ok(self
            .classes
            .read()
            .get(name)
            .map(|bytes| Box::new(Cursor::new(bytes.clone())) as Box<dyn Read + Send>))
    }
}

impl<T: ResourceLookup + ?Sized> ResourceLookup for Arc<T> {
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + Send>>> {
        (**self).open(name)
    }
}

/// Reads class bytes and defines classes in a loading context
pub struct BytecodeLoader {
    resources: Arc<dyn ResourceLookup>,
    natives: NativeRegistry,
}

impl BytecodeLoader {
    /// Loader over `resources` with no native methods
    pub fn new(resources: impl ResourceLookup + 'static) -> Self {
        Self {
            resources: Arc::new(resources),
            natives: NativeRegistry::new(),
        }
    }

    /// Use `natives` to link native method bodies
    pub fn with_natives(mut self, natives: NativeRegistry) -> Self {
        self.natives = natives;
        self
    }

    /// Native registry used for linking
    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    /// Read the complete class file for `name`
    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        let io_error = |source| LoadError::Io {
            name: name.to_string(),
            source,
        };
        let mut reader = self
            .resources
            .open(name)
            .map_err(io_error)?
            .ok_or_else(|| LoadError::ClassNotFound(name.to_string()))?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(io_error)?;
        Ok(bytes)
    }

    /// Read, decode and verify `name`, then define it in `ctx`
    pub fn load_into(&self, ctx: &LoadingContext, name: &str) -> Result<ClassRef, LoadError> {
        let bytes = self.read_bytes(name)?;
        let file = ClassFile::decode(&bytes).map_err(|source| LoadError::Format {
            name: name.to_string(),
            source,
        })?;
        if file.name != name {
            return Err(LoadError::NameMismatch {
                requested: name.to_string(),
                found: file.name,
            });
        }
        self.define(ctx, file)
    }

    /// Verify `file` and define it in `ctx`
    ///
    /// Defining is one-time per (name, context); a second definition fails
    /// with [`LoadError::DuplicateDefinition`].
    pub fn define(&self, ctx: &LoadingContext, file: ClassFile) -> Result<ClassRef, LoadError> {
        verify_class(&file).map_err(|source| LoadError::Verify {
            name: file.name.clone(),
            source,
        })?;

        if ctx.find_loaded(&file.name).is_some() {
            return Err(LoadError::DuplicateDefinition(file.name));
        }

        let superclass = match &file.super_name {
            Some(super_name) => Some(ctx.load_class(super_name).map_err(|source| {
                LoadError::MissingSuperclass {
                    name: file.name.clone(),
                    superclass: super_name.clone(),
                    source: Box::new(source),
                }
            })?),
            None => Some(crate::builtins::object()),
        };

        let mut methods = file
            .methods
            .iter()
            .map(|m| self.link_method(&file.name, m))
            .collect::<Result<Vec<_>, _>>()?;
        if !methods.iter().any(|m| m.is_constructor()) {
            methods.push(default_constructor(file.access));
        }

        let scope = match ctx.policy() {
            LoadPolicy::Root => ClassScope::Context(ctx.weak()),
            LoadPolicy::Isolating { .. } => match ctx.parent() {
                Some(parent) => ClassScope::Parent(parent.clone()),
                None => ClassScope::Context(ctx.weak()),
            },
        };

        let class = crate::class::Class::new(ClassParts {
            name: file.name,
            access: file.access,
            superclass,
            scope,
            context: Some(ctx.id()),
            fields: file
                .fields
                .into_iter()
                .map(|f| FieldInfo {
                    name: f.name,
                    access: f.access,
                    ty: f.ty,
                })
                .collect(),
            methods,
            strings: file.strings.into_iter().map(Arc::from).collect(),
        });

        ctx.register(class.clone())?;
        log::debug!(
            "defined class {} (#{}) in context {}",
            class.name(),
            class.id().as_u64(),
            ctx.id().as_u64()
        );
        Ok(class)
    }

    fn link_method(&self, class_name: &str, method: &MethodDef) -> Result<MethodInfo, LoadError> {
        let body = match &method.body {
            MethodBody::Code(code) => Body::Code(Arc::from(code.as_slice())),
            MethodBody::Abstract => Body::Abstract,
            MethodBody::Native(symbol) => {
                Body::Native(self.natives.get(symbol).ok_or_else(|| {
                    LoadError::UnresolvedNative {
                        name: class_name.to_string(),
                        method: method.name.clone(),
                        symbol: symbol.clone(),
                    }
                })?)
            }
        };
        Ok(MethodInfo {
            name: method.name.clone(),
            access: method.access,
            params: method.params.clone(),
            return_type: method.return_type.clone(),
            max_locals: method.max_locals,
            body,
        })
    }
}

/// No-argument constructor for classes that declare none, with the class's visibility
fn default_constructor(class_access: u16) -> MethodInfo {
    MethodInfo {
        name: CONSTRUCTOR_NAME.to_string(),
        access: class_access & access::VISIBILITY_MASK,
        params: Vec::new(),
        return_type: TypeDesc::Void,
        max_locals: 1,
        body: Body::Code(Arc::from(
            &[edutest_bytecode::Opcode::ReturnVoid.to_u8()][..],
        )),
    }
}

impl std::fmt::Debug for BytecodeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BytecodeLoader")
            .field("natives", &self.natives)
            .finish()
    }
}
