//! Class file format
//!
//! A class file describes exactly one class: its name, superclass, access
//! flags, fields and methods. Binary layout:
//!
//! - Header: magic (4 bytes) + version (u32) + flags (u32) + checksum (u32)
//! - Class header: name, optional superclass name, access flags
//! - String pool
//! - Field table
//! - Method table
//!
//! The checksum is the CRC32 of everything after the header.

use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use std::fmt;
use thiserror::Error;

/// Magic number for class files: "EDUC"
pub const MAGIC: [u8; 4] = *b"EDUC";

/// Current class file version
pub const VERSION: u32 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 16;

/// Method name used for constructors
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Method name used for the static initializer
pub const STATIC_INIT_NAME: &str = "<clinit>";

/// Access and property flags for classes, fields and methods
pub mod access {
    /// Visible everywhere
    pub const PUBLIC: u16 = 0x0001;
    /// Visible only inside the declaring class
    pub const PRIVATE: u16 = 0x0002;
    /// Visible to subclasses and the package
    pub const PROTECTED: u16 = 0x0004;
    /// Belongs to the class rather than to instances
    pub const STATIC: u16 = 0x0008;
    /// Cannot be overridden or reassigned
    pub const FINAL: u16 = 0x0010;
    /// Has no body / cannot be instantiated
    pub const ABSTRACT: u16 = 0x0400;

    /// Mask of the visibility bits
    pub const VISIBILITY_MASK: u16 = PUBLIC | PRIVATE | PROTECTED;
}

/// Class file encoding/decoding errors
#[derive(Debug, Error)]
pub enum ClassFileError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected EDUC, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum of the payload
        actual: u32,
    },

    /// Unknown tag byte in a type or body descriptor
    #[error("Invalid {what} tag {tag:#x}")]
    InvalidTag {
        /// Which descriptor was being decoded
        what: &'static str,
        /// The offending tag
        tag: u8,
    },
}

/// The eight primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl PrimitiveType {
    /// All primitive kinds, in declaration order
    pub const ALL: [PrimitiveType; 8] = [
        Self::Boolean,
        Self::Byte,
        Self::Char,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
    ];

    /// Source-level keyword for this kind
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// Fully qualified name of the boxed counterpart
    pub fn boxed_name(self) -> &'static str {
        match self {
            Self::Boolean => "lang.Boolean",
            Self::Byte => "lang.Byte",
            Self::Char => "lang.Character",
            Self::Short => "lang.Short",
            Self::Int => "lang.Integer",
            Self::Long => "lang.Long",
            Self::Float => "lang.Float",
            Self::Double => "lang.Double",
        }
    }

    fn tag(self) -> u8 {
        self as u8
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

/// A type reference as written in a class file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// No value (return type only)
    Void,
    /// A primitive kind
    Primitive(PrimitiveType),
    /// A class, by fully qualified name
    Class(String),
}

impl TypeDesc {
    /// Shorthand for a class type
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    /// Shorthand for `lang.String`
    pub fn string() -> Self {
        Self::Class("lang.String".to_string())
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        match self {
            TypeDesc::Void => writer.emit_u8(0),
            TypeDesc::Primitive(kind) => {
                writer.emit_u8(1);
                writer.emit_u8(kind.tag());
            }
            TypeDesc::Class(name) => {
                writer.emit_u8(2);
                writer.emit_string(name);
            }
        }
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, ClassFileError> {
        match reader.read_u8()? {
            0 => Ok(TypeDesc::Void),
            1 => {
                let tag = reader.read_u8()?;
                PrimitiveType::from_tag(tag)
                    .map(TypeDesc::Primitive)
                    .ok_or(ClassFileError::InvalidTag {
                        what: "primitive",
                        tag,
                    })
            }
            2 => Ok(TypeDesc::Class(reader.read_string()?)),
            tag => Err(ClassFileError::InvalidTag { what: "type", tag }),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => f.write_str("void"),
            TypeDesc::Primitive(kind) => f.write_str(kind.name()),
            TypeDesc::Class(name) => f.write_str(name),
        }
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Access flags
    pub access: u16,
    /// Declared type
    pub ty: TypeDesc,
}

impl FieldDef {
    /// Whether this is a static field
    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_u16(self.access);
        self.ty.encode(writer);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, ClassFileError> {
        Ok(Self {
            name: reader.read_string()?,
            access: reader.read_u16()?,
            ty: TypeDesc::decode(reader)?,
        })
    }
}

/// Implementation of a method
#[derive(Debug, Clone, PartialEq)]
pub enum MethodBody {
    /// Stack bytecode
    Code(Vec<u8>),
    /// A native function registered under the given name
    Native(String),
    /// No implementation
    Abstract,
}

impl MethodBody {
    fn encode(&self, writer: &mut BytecodeWriter) {
        match self {
            MethodBody::Code(code) => {
                writer.emit_u8(0);
                writer.emit_blob(code);
            }
            MethodBody::Native(symbol) => {
                writer.emit_u8(1);
                writer.emit_string(symbol);
            }
            MethodBody::Abstract => writer.emit_u8(2),
        }
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, ClassFileError> {
        match reader.read_u8()? {
            0 => Ok(MethodBody::Code(reader.read_blob()?)),
            1 => Ok(MethodBody::Native(reader.read_string()?)),
            2 => Ok(MethodBody::Abstract),
            tag => Err(ClassFileError::InvalidTag { what: "body", tag }),
        }
    }
}

/// Method definition (constructors and the static initializer included)
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Method name; `<init>` for constructors, `<clinit>` for the static initializer
    pub name: String,
    /// Access flags
    pub access: u16,
    /// Parameter types in declaration order
    pub params: Vec<TypeDesc>,
    /// Return type
    pub return_type: TypeDesc,
    /// Number of local slots, including `this` and the parameters
    pub max_locals: u16,
    /// Implementation
    pub body: MethodBody,
}

impl MethodDef {
    /// Whether this is a static method
    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    /// Whether this is a constructor
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// Whether this is the static initializer
    pub fn is_static_init(&self) -> bool {
        self.name == STATIC_INIT_NAME
    }

    /// Number of local slots occupied by the receiver and the parameters
    pub fn arg_slots(&self) -> usize {
        self.params.len() + usize::from(!self.is_static())
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_u16(self.access);
        writer.emit_u16(self.params.len() as u16);
        for param in &self.params {
            param.encode(writer);
        }
        self.return_type.encode(writer);
        writer.emit_u16(self.max_locals);
        self.body.encode(writer);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, ClassFileError> {
        let name = reader.read_string()?;
        let access = reader.read_u16()?;
        let param_count = reader.read_u16()? as usize;
        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            params.push(TypeDesc::decode(reader)?);
        }
        let return_type = TypeDesc::decode(reader)?;
        let max_locals = reader.read_u16()?;
        let body = MethodBody::decode(reader)?;
        Ok(Self {
            name,
            access,
            params,
            return_type,
            max_locals,
            body,
        })
    }
}

/// A decoded class file
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    /// Fully qualified class name (`pkg.sub.Name`)
    pub name: String,
    /// Superclass name; `None` means `lang.Object`
    pub super_name: Option<String>,
    /// Class access flags
    pub access: u16,
    /// String pool referenced by method bodies
    pub strings: Vec<String>,
    /// Field definitions
    pub fields: Vec<FieldDef>,
    /// Method definitions
    pub methods: Vec<MethodDef>,
}

impl ClassFile {
    /// Create an empty public class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: None,
            access: access::PUBLIC,
            strings: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Simple (unqualified) class name
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Encode the class to binary format (.educ)
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BytecodeWriter::new();

        writer.buffer.extend_from_slice(&MAGIC);
        writer.emit_u32(VERSION);
        writer.emit_u32(0);
        let checksum_offset = writer.offset();
        writer.emit_u32(0);

        writer.emit_string(&self.name);
        match &self.super_name {
            Some(name) => {
                writer.emit_u8(1);
                writer.emit_string(name);
            }
            None => writer.emit_u8(0),
        }
        writer.emit_u16(self.access);

        writer.emit_u32(self.strings.len() as u32);
        for s in &self.strings {
            writer.emit_string(s);
        }

        writer.emit_u32(self.fields.len() as u32);
        for field in &self.fields {
            field.encode(&mut writer);
        }

        writer.emit_u32(self.methods.len() as u32);
        for method in &self.methods {
            method.encode(&mut writer);
        }

        let checksum = crc32fast::hash(&writer.buffer[HEADER_SIZE..]);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }

    /// Decode a class from binary format
    pub fn decode(data: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = BytecodeReader::new(data);

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&reader.read_bytes(4)?);
        if magic != MAGIC {
            return Err(ClassFileError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ClassFileError::UnsupportedVersion(version));
        }

        let _flags = reader.read_u32()?;
        let stored_checksum = reader.read_u32()?;

        let calculated_checksum = crc32fast::hash(&data[HEADER_SIZE..]);
        if stored_checksum != calculated_checksum {
            return Err(ClassFileError::ChecksumMismatch {
                expected: stored_checksum,
                actual: calculated_checksum,
            });
        }

        let name = reader.read_string()?;
        let super_name = match reader.read_u8()? {
            0 => None,
            _ => Some(reader.read_string()?),
        };
        let access = reader.read_u16()?;

        let string_count = reader.read_u32()? as usize;
        let mut strings = Vec::with_capacity(string_count.min(data.len()));
        for _ in 0..string_count {
            strings.push(reader.read_string()?);
        }

        let field_count = reader.read_u32()? as usize;
        let mut fields = Vec::with_capacity(field_count.min(data.len()));
        for _ in 0..field_count {
            fields.push(FieldDef::decode(&mut reader)?);
        }

        let method_count = reader.read_u32()? as usize;
        let mut methods = Vec::with_capacity(method_count.min(data.len()));
        for _ in 0..method_count {
            methods.push(MethodDef::decode(&mut reader)?);
        }

        Ok(Self {
            name,
            super_name,
            access,
            strings,
            fields,
            methods,
        })
    }
}

/// The part of a qualified name after the last `.`
pub fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

    fn sample_class() -> ClassFile {
        let mut class = ClassFile::new("shapes.Point");
        class.strings.push("x".to_string());
        class.fields.push(FieldDef {
            name: "x".to_string(),
            access: access::PRIVATE,
            ty: TypeDesc::Primitive(PrimitiveType::Int),
        });

        let mut writer = BytecodeWriter::new();
        writer.emit_load_local(0);
        writer.emit_named(Opcode::GetField, 0);
        writer.emit_opcode(Opcode::Return);

        class.methods.push(MethodDef {
            name: "getX".to_string(),
            access: access::PUBLIC,
            params: vec![],
            return_type: TypeDesc::Primitive(PrimitiveType::Int),
            max_locals: 1,
            body: MethodBody::Code(writer.into_bytes()),
        });
        class.methods.push(MethodDef {
            name: "hash".to_string(),
            access: access::PUBLIC | access::STATIC,
            params: vec![TypeDesc::string(), TypeDesc::class("shapes.Point")],
            return_type: TypeDesc::Primitive(PrimitiveType::Long),
            max_locals: 2,
            body: MethodBody::Native("shapes.hash".to_string()),
        });
        class
    }

    #[test]
    fn test_class_encoding() {
        let class = sample_class();
        let decoded = ClassFile::decode(&class.encode()).unwrap();
        assert_eq!(decoded, class);
        assert_eq!(decoded.simple_name(), "Point");
    }

    #[test]
    fn test_class_with_superclass() {
        let mut class = ClassFile::new("shapes.Circle");
        class.super_name = Some("shapes.Shape".to_string());
        class.access = access::PUBLIC | access::FINAL;
        let decoded = ClassFile::decode(&class.encode()).unwrap();
        assert_eq!(decoded.super_name.as_deref(), Some("shapes.Shape"));
        assert_eq!(decoded.access, access::PUBLIC | access::FINAL);
    }

    #[test]
    fn test_class_checksum_validation() {
        let mut bytes = sample_class().encode();
        bytes[HEADER_SIZE + 2] ^= 0xFF;
        assert!(matches!(
            ClassFile::decode(&bytes),
            Err(ClassFileError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_magic_number() {
        let mut bytes = vec![b'X', b'X', b'X', b'X'];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            ClassFile::decode(&bytes),
            Err(ClassFileError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"EDUC");
        bytes.extend_from_slice(&999u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            ClassFile::decode(&bytes),
            Err(ClassFileError::UnsupportedVersion(999))
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            ClassFile::decode(b"EDU"),
            Err(ClassFileError::Decode(DecodeError::UnexpectedEnd(0)))
        ));
    }

    #[test]
    fn test_method_helpers() {
        let class = sample_class();
        assert!(!class.methods[0].is_static());
        assert_eq!(class.methods[0].arg_slots(), 1);
        assert!(class.methods[1].is_static());
        assert_eq!(class.methods[1].arg_slots(), 2);
        assert!(!class.methods[1].is_constructor());
    }

    #[test]
    fn test_type_display() {
        assert_eq!(TypeDesc::Void.to_string(), "void");
        assert_eq!(TypeDesc::Primitive(PrimitiveType::Char).to_string(), "char");
        assert_eq!(TypeDesc::string().to_string(), "lang.String");
        assert_eq!(PrimitiveType::Char.boxed_name(), "lang.Character");
        assert_eq!(simple_name("NoPackage"), "NoPackage");
    }
}
