//! Programmatic class file assembly
//!
//! ```
//! use edutest_bytecode::builder::{ClassBuilder, MethodSig};
//! use edutest_bytecode::{access, Opcode, PrimitiveType, TypeDesc};
//!
//! let int = TypeDesc::Primitive(PrimitiveType::Int);
//! let class = ClassBuilder::new("shapes.Point")
//!     .field("x", access::PRIVATE, int.clone())
//!     .method(MethodSig::new("getX", access::PUBLIC).returns(int), |code| {
//!         code.load(0);
//!         code.get_field("x");
//!         code.op(Opcode::Return);
//!     })
//!     .build();
//! assert_eq!(class.methods.len(), 1);
//! ```

use crate::class_file::{
    access, ClassFile, FieldDef, MethodBody, MethodDef, TypeDesc, CONSTRUCTOR_NAME,
    STATIC_INIT_NAME,
};
use crate::encoder::BytecodeWriter;
use crate::opcode::Opcode;
use rustc_hash::FxHashMap;

/// Interning string pool shared by all methods of a class
#[derive(Debug, Default)]
struct StringPool {
    strings: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl StringPool {
    fn intern(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }
}

/// Method signature: name, flags, parameter and return types
#[derive(Debug, Clone)]
pub struct MethodSig {
    name: String,
    access: u16,
    params: Vec<TypeDesc>,
    return_type: TypeDesc,
}

impl MethodSig {
    /// A method returning `void` with no parameters
    pub fn new(name: impl Into<String>, access: u16) -> Self {
        Self {
            name: name.into(),
            access,
            params: Vec::new(),
            return_type: TypeDesc::Void,
        }
    }

    /// A constructor
    pub fn constructor(access: u16) -> Self {
        Self::new(CONSTRUCTOR_NAME, access)
    }

    /// The static initializer
    pub fn static_init() -> Self {
        Self::new(STATIC_INIT_NAME, access::STATIC)
    }

    /// Append a parameter
    pub fn param(mut self, ty: TypeDesc) -> Self {
        self.params.push(ty);
        self
    }

    /// Append several parameters
    pub fn params(mut self, tys: impl IntoIterator<Item = TypeDesc>) -> Self {
        self.params.extend(tys);
        self
    }

    /// Set the return type
    pub fn returns(mut self, ty: TypeDesc) -> Self {
        self.return_type = ty;
        self
    }

    fn arg_slots(&self) -> u16 {
        (self.params.len() + usize::from(self.access & access::STATIC == 0)) as u16
    }

    fn into_def(self, max_locals: u16, body: MethodBody) -> MethodDef {
        MethodDef {
            name: self.name,
            access: self.access,
            params: self.params,
            return_type: self.return_type,
            max_locals,
            body,
        }
    }
}

/// Jump label handed out by [`CodeBuilder::label`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Emits one method body, interning names into the class string pool
pub struct CodeBuilder<'a> {
    writer: BytecodeWriter,
    pool: &'a mut StringPool,
    max_locals: u16,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
}

impl<'a> CodeBuilder<'a> {
    /// Emit an opcode that takes no operands
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        debug_assert_eq!(opcode.operand_size(), 0, "{} takes operands", opcode);
        self.writer.emit_opcode(opcode);
        self
    }

    /// Push `null`
    pub fn const_null(&mut self) -> &mut Self {
        self.op(Opcode::ConstNull)
    }

    /// Push a boolean
    pub fn const_bool(&mut self, value: bool) -> &mut Self {
        self.op(if value { Opcode::ConstTrue } else { Opcode::ConstFalse })
    }

    /// Push an `int`
    pub fn const_i32(&mut self, value: i32) -> &mut Self {
        self.writer.emit_const_i32(value);
        self
    }

    /// Push a `long`
    pub fn const_i64(&mut self, value: i64) -> &mut Self {
        self.writer.emit_const_i64(value);
        self
    }

    /// Push a `double`
    pub fn const_f64(&mut self, value: f64) -> &mut Self {
        self.writer.emit_const_f64(value);
        self
    }

    /// Push a string constant
    pub fn const_str(&mut self, value: &str) -> &mut Self {
        let idx = self.pool.intern(value);
        self.writer.emit_const_str(idx);
        self
    }

    /// Load a local slot
    pub fn load(&mut self, index: u16) -> &mut Self {
        self.touch_local(index);
        self.writer.emit_load_local(index);
        self
    }

    /// Store into a local slot
    pub fn store(&mut self, index: u16) -> &mut Self {
        self.touch_local(index);
        self.writer.emit_store_local(index);
        self
    }

    /// Read an instance field of the object on top of the stack
    pub fn get_field(&mut self, name: &str) -> &mut Self {
        self.named(Opcode::GetField, name)
    }

    /// Write an instance field; the stack holds `object, value`
    pub fn put_field(&mut self, name: &str) -> &mut Self {
        self.named(Opcode::PutField, name)
    }

    /// Read a static field of this class
    pub fn get_static(&mut self, name: &str) -> &mut Self {
        self.named(Opcode::GetStatic, name)
    }

    /// Write a static field of this class
    pub fn put_static(&mut self, name: &str) -> &mut Self {
        self.named(Opcode::PutStatic, name)
    }

    /// Call an instance method; the stack holds `receiver, args...`
    pub fn invoke(&mut self, name: &str, argc: u8) -> &mut Self {
        self.call(Opcode::Invoke, name, argc)
    }

    /// Call a static method of this class or a superclass
    pub fn invoke_static(&mut self, name: &str, argc: u8) -> &mut Self {
        self.call(Opcode::InvokeStatic, name, argc)
    }

    /// Instantiate `class` with the constructor taking `argc` arguments
    pub fn new_object(&mut self, class: &str, argc: u8) -> &mut Self {
        self.call(Opcode::New, class, argc)
    }

    /// Throw a fault of type `type_name`; the message is popped from the stack
    pub fn throw(&mut self, type_name: &str) -> &mut Self {
        self.named(Opcode::Throw, type_name)
    }

    /// Throw a fault of type `type_name` with a constant message
    pub fn throw_msg(&mut self, type_name: &str, message: &str) -> &mut Self {
        self.const_str(message);
        self.throw(type_name)
    }

    /// Allocate a new unbound label
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current offset
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.writer.offset());
        self
    }

    /// Emit a jump to `label`
    pub fn jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        self.writer.emit_opcode(opcode);
        let at = self.writer.reserve_i32();
        self.fixups.push((at, label));
        self
    }

    fn named(&mut self, opcode: Opcode, name: &str) -> &mut Self {
        let idx = self.pool.intern(name);
        self.writer.emit_named(opcode, idx);
        self
    }

    fn call(&mut self, opcode: Opcode, name: &str, argc: u8) -> &mut Self {
        let idx = self.pool.intern(name);
        self.writer.emit_call(opcode, idx, argc);
        self
    }

    fn touch_local(&mut self, index: u16) {
        self.max_locals = self.max_locals.max(index + 1);
    }

    /// # Panics
    ///
    /// Panics if a label was jumped to but never bound.
    fn finish(mut self) -> (Vec<u8>, u16) {
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label.0]
                .unwrap_or_else(|| panic!("label {} used but never bound", label.0));
            self.writer.patch_i32(at, target as i32 - (at as i32 + 4));
        }
        (self.writer.into_bytes(), self.max_locals)
    }
}

/// Fluent builder producing a [`ClassFile`]
pub struct ClassBuilder {
    class: ClassFile,
    pool: StringPool,
}

impl ClassBuilder {
    /// Start a public class extending `lang.Object`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            class: ClassFile::new(name),
            pool: StringPool::default(),
        }
    }

    /// Set the class access flags
    pub fn access(mut self, flags: u16) -> Self {
        self.class.access = flags;
        self
    }

    /// Set the superclass
    pub fn extends(mut self, name: impl Into<String>) -> Self {
        self.class.super_name = Some(name.into());
        self
    }

    /// Declare a field
    pub fn field(mut self, name: impl Into<String>, access: u16, ty: TypeDesc) -> Self {
        self.class.fields.push(FieldDef {
            name: name.into(),
            access,
            ty,
        });
        self
    }

    /// Declare a method with a bytecode body
    pub fn method(mut self, sig: MethodSig, body: impl FnOnce(&mut CodeBuilder<'_>)) -> Self {
        let mut code = CodeBuilder {
            writer: BytecodeWriter::new(),
            pool: &mut self.pool,
            max_locals: sig.arg_slots(),
            labels: Vec::new(),
            fixups: Vec::new(),
        };
        body(&mut code);
        let (bytes, max_locals) = code.finish();
        self.class
            .methods
            .push(sig.into_def(max_locals, MethodBody::Code(bytes)));
        self
    }

    /// Declare a method implemented by a registered native function
    pub fn native_method(mut self, sig: MethodSig, symbol: impl Into<String>) -> Self {
        let slots = sig.arg_slots();
        self.class
            .methods
            .push(sig.into_def(slots, MethodBody::Native(symbol.into())));
        self
    }

    /// Declare an abstract method
    pub fn abstract_method(mut self, mut sig: MethodSig) -> Self {
        sig.access |= access::ABSTRACT;
        let slots = sig.arg_slots();
        self.class
            .methods
            .push(sig.into_def(slots, MethodBody::Abstract));
        self
    }

    /// Finish and return the class file
    pub fn build(mut self) -> ClassFile {
        self.class.strings = self.pool.strings;
        self.class
    }

    /// Finish and encode the class file
    pub fn encode(self) -> Vec<u8> {
        self.build().encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_file::PrimitiveType;
    use crate::verify::verify_class;

    #[test]
    fn test_string_pool_interning() {
        let class = ClassBuilder::new("Test")
            .method(MethodSig::new("a", access::STATIC), |c| {
                c.const_str("x").const_str("x").op(Opcode::Pop).op(Opcode::Pop);
                c.op(Opcode::ReturnVoid);
            })
            .method(MethodSig::new("b", access::STATIC), |c| {
                c.get_static("x").op(Opcode::Pop).op(Opcode::ReturnVoid);
            })
            .build();
        assert_eq!(class.strings, vec!["x".to_string()]);
    }

    #[test]
    fn test_max_locals_tracking() {
        let int = TypeDesc::Primitive(PrimitiveType::Int);
        let class = ClassBuilder::new("Test")
            .method(MethodSig::new("f", access::PUBLIC).param(int.clone()), |c| {
                c.const_i32(1).store(4).op(Opcode::ReturnVoid);
            })
            .native_method(MethodSig::new("g", access::STATIC).param(int), "test.g")
            .build();
        assert_eq!(class.methods[0].max_locals, 5);
        assert_eq!(class.methods[1].max_locals, 1);
    }

    #[test]
    fn test_forward_and_backward_labels() {
        let class = ClassBuilder::new("Test")
            .method(MethodSig::new("loop", access::STATIC), |c| {
                let top = c.label();
                let done = c.label();
                c.bind(top);
                c.const_bool(false);
                c.jump(Opcode::JmpIfFalse, done);
                c.jump(Opcode::Jmp, top);
                c.bind(done);
                c.op(Opcode::ReturnVoid);
            })
            .build();
        assert!(verify_class(&class).is_ok());

        let MethodBody::Code(code) = &class.methods[0].body else {
            panic!("expected code body");
        };
        // CONST_FALSE(0) JMP_IF_FALSE(1..6) JMP(6..11) RETURN_VOID(11)
        assert_eq!(i32::from_le_bytes([code[2], code[3], code[4], code[5]]), 5);
        assert_eq!(i32::from_le_bytes([code[7], code[8], code[9], code[10]]), -11);
    }

    #[test]
    fn test_abstract_method_flags() {
        let class = ClassBuilder::new("Shape")
            .access(access::PUBLIC | access::ABSTRACT)
            .abstract_method(MethodSig::new("area", access::PUBLIC))
            .build();
        assert_eq!(class.methods[0].access, access::PUBLIC | access::ABSTRACT);
        assert!(verify_class(&class).is_ok());
    }
}
