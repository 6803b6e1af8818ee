//! Bytecode interpreter
//!
//! Executes method bodies on a per-call operand stack. Every call pushes a
//! frame on the thread's [call stack](crate::callstack), so faults carry a
//! trace. Backward jumps and calls are cancellation checkpoints, which is
//! what lets a supervisor stop a runaway loop.

use crate::callstack;
use crate::cancel;
use crate::class::{Body, ClassRef, MethodInfo};
use crate::fault::{kinds, Fault};
use crate::native::NativeCall;
use crate::object::{Object, ObjectRef};
use crate::types::Type;
use crate::value::{format_float, format_float32, Value};
use edutest_bytecode::{BytecodeReader, DecodeError, Opcode, TypeDesc};
use std::cmp::Ordering;
use std::sync::Arc;

/// Maximum nesting of interpreted and native calls on one thread
pub const MAX_CALL_DEPTH: usize = 1024;

/// Run method `index` of `class`
///
/// For instance methods `args[0]` is the receiver. Arguments must already
/// match the declared parameter types.
pub(crate) fn execute(class: &ClassRef, index: usize, args: Vec<Value>) -> Result<Value, Fault> {
    let method = &class.methods[index];
    if callstack::depth() >= MAX_CALL_DEPTH {
        return Err(Fault::new(kinds::STACK_OVERFLOW, None));
    }
    let _frame = callstack::enter(class.name(), method.name.as_str());

    match &method.body {
        Body::Native(function) => {
            let (this, rest) = if method.is_static() {
                (None, &args[..])
            } else {
                (args.first(), args.get(1..).unwrap_or(&[]))
            };
            let result = function(&NativeCall {
                class,
                this,
                args: rest,
            })?;
            coerce_return(class, method, result)
        }
        Body::Abstract => Err(Fault::with_message(
            kinds::ABSTRACT_METHOD,
            format!("{}.{}", class.name(), method.name),
        )),
        Body::Code(code) => Frame::new(class, method, code, args).run(),
    }
}

/// Most specific non-static method `name(params)` visible from `class`
pub(crate) fn find_override(
    class: &ClassRef,
    name: &str,
    params: &[TypeDesc],
) -> Option<(ClassRef, usize)> {
    find_in_chain(class, |m| {
        !m.is_static() && m.is_ordinary() && m.name == name && m.params == params
    })
}

fn find_in_chain(
    class: &ClassRef,
    pred: impl Fn(&MethodInfo) -> bool,
) -> Option<(ClassRef, usize)> {
    let mut current = Some(class);
    while let Some(cls) = current {
        if let Some(index) = cls.methods.iter().position(&pred) {
            return Some((cls.clone(), index));
        }
        current = cls.superclass();
    }
    None
}

fn coerce_return(class: &ClassRef, method: &MethodInfo, value: Value) -> Result<Value, Fault> {
    if method.return_type == TypeDesc::Void {
        return Ok(Value::Void);
    }
    let ty = resolve(class, &method.return_type)?;
    ty.coerce(&value).ok_or_else(|| {
        Fault::with_message(
            kinds::INTERNAL,
            format!(
                "{}.{} returned {} where {} was declared",
                class.name(),
                method.name,
                value.type_label(),
                ty.name()
            ),
        )
    })
}

fn coerce_args(class: &ClassRef, method: &MethodInfo, args: Vec<Value>) -> Result<Vec<Value>, Fault> {
    method
        .params
        .iter()
        .zip(args)
        .map(|(desc, arg)| {
            let ty = resolve(class, desc)?;
            ty.coerce(&arg).ok_or_else(|| {
                Fault::with_message(
                    kinds::ILLEGAL_ARGUMENT,
                    format!(
                        "{}.{}: expected {}, got {}",
                        class.name(),
                        method.name,
                        ty.name(),
                        arg.type_label()
                    ),
                )
            })
        })
        .collect()
}

fn resolve(class: &ClassRef, desc: &TypeDesc) -> Result<Type, Fault> {
    class
        .resolve_type(desc)
        .map_err(|e| Fault::with_message(kinds::NO_CLASS_DEF, e.to_string()))
}

fn malformed(e: DecodeError) -> Fault {
    Fault::with_message(kinds::INTERNAL, format!("malformed code: {}", e))
}

fn internal(message: impl Into<String>) -> Fault {
    Fault::with_message(kinds::INTERNAL, message)
}

struct Frame<'a> {
    class: &'a ClassRef,
    method: &'a MethodInfo,
    code: &'a [u8],
    locals: Vec<Value>,
    stack: Vec<Value>,
}

impl<'a> Frame<'a> {
    fn new(class: &'a ClassRef, method: &'a MethodInfo, code: &'a [u8], args: Vec<Value>) -> Self {
        let mut locals = args;
        let size = (method.max_locals as usize).max(locals.len());
        locals.resize(size, Value::Null);
        Frame {
            class,
            method,
            code,
            locals,
            stack: Vec::with_capacity(16),
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, Fault> {
        self.stack.pop().ok_or_else(|| {
            internal(format!(
                "operand stack underflow in {}.{}",
                self.class.name(),
                self.method.name
            ))
        })
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, Fault> {
        if self.stack.len() < count {
            return Err(internal(format!(
                "operand stack underflow in {}.{}",
                self.class.name(),
                self.method.name
            )));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn pop_bool(&mut self) -> Result<bool, Fault> {
        match self.pop()? {
            Value::Bool(b) => Ok(b),
            other => Err(internal(format!("expected boolean, got {}", other.type_label()))),
        }
    }

    fn pop_object(&mut self) -> Result<ObjectRef, Fault> {
        match self.pop()? {
            Value::Object(obj) => Ok(obj),
            Value::Null => Err(Fault::new(kinds::NULL_POINTER, None)),
            other => Err(internal(format!("expected object, got {}", other.type_label()))),
        }
    }

    fn string(&self, index: u32) -> Result<Arc<str>, Fault> {
        self.class
            .strings
            .get(index as usize)
            .cloned()
            .ok_or_else(|| internal(format!("string index {} out of range", index)))
    }

    fn local(&mut self, index: u16) -> Result<&mut Value, Fault> {
        self.locals
            .get_mut(index as usize)
            .ok_or_else(|| internal(format!("local {} out of range", index)))
    }

    /// Push a call result unless the callee was `void`
    fn push_result(&mut self, value: Value) {
        if !value.is_void() {
            self.push(value);
        }
    }

    fn run(mut self) -> Result<Value, Fault> {
        let mut reader = BytecodeReader::new(self.code);
        loop {
            if !reader.has_more() {
                return Err(internal(format!(
                    "execution fell off the end of {}.{}",
                    self.class.name(),
                    self.method.name
                )));
            }
            let op = reader.read_opcode().map_err(malformed)?;
            match op {
                Opcode::Nop => {}
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Dup => {
                    let top = self.pop()?;
                    self.push(top.clone());
                    self.push(top);
                }
                Opcode::Swap => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(b);
                    self.push(a);
                }
                Opcode::ConstNull => self.push(Value::Null),
                Opcode::ConstTrue => self.push(Value::Bool(true)),
                Opcode::ConstFalse => self.push(Value::Bool(false)),
                Opcode::ConstI32 => {
                    let v = reader.read_i32().map_err(malformed)?;
                    self.push(Value::Int(v));
                }
                Opcode::ConstI64 => {
                    let v = reader.read_i64().map_err(malformed)?;
                    self.push(Value::Long(v));
                }
                Opcode::ConstF64 => {
                    let v = reader.read_f64().map_err(malformed)?;
                    self.push(Value::Double(v));
                }
                Opcode::ConstStr => {
                    let index = reader.read_u32().map_err(malformed)?;
                    let s = self.string(index)?;
                    self.push(Value::Str(s));
                }
                Opcode::LoadLocal => {
                    let index = reader.read_u16().map_err(malformed)?;
                    let value = self.local(index)?.clone();
                    self.push(value);
                }
                Opcode::StoreLocal => {
                    let index = reader.read_u16().map_err(malformed)?;
                    let value = self.pop()?;
                    *self.local(index)? = value;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Rem => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(arithmetic(op, &a, &b)?);
                }
                Opcode::Neg => {
                    let a = self.pop()?;
                    self.push(negate(&a)?);
                }
                Opcode::Eq | Opcode::Ne => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let equal = values_equal(&a, &b);
                    self.push(Value::Bool(equal == (op == Opcode::Eq)));
                }
                Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(compare(op, &a, &b)?));
                }
                Opcode::Not => {
                    let a = self.pop_bool()?;
                    self.push(Value::Bool(!a));
                }
                Opcode::Concat => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let mut s = a.to_display_string()?;
                    s.push_str(&b.to_display_string()?);
                    self.push(Value::str(s));
                }
                Opcode::Jmp | Opcode::JmpIfFalse | Opcode::JmpIfTrue => {
                    let rel = reader.read_i32().map_err(malformed)?;
                    let taken = match op {
                        Opcode::Jmp => true,
                        Opcode::JmpIfFalse => !self.pop_bool()?,
                        _ => self.pop_bool()?,
                    };
                    if taken {
                        if rel < 0 {
                            cancel::checkpoint()?;
                        }
                        let target = reader.position() as i64 + rel as i64;
                        if target < 0 || target as usize >= self.code.len() {
                            return Err(internal(format!("jump target {} out of range", target)));
                        }
                        reader.seek(target as usize);
                    }
                }
                Opcode::Invoke => {
                    let name = self.string(reader.read_u32().map_err(malformed)?)?;
                    let argc = reader.read_u8().map_err(malformed)? as usize;
                    cancel::checkpoint()?;
                    let args = self.pop_n(argc)?;
                    let receiver = self.pop()?;
                    let result = invoke_virtual(receiver, &name, args)?;
                    self.push_result(result);
                }
                Opcode::InvokeStatic => {
                    let name = self.string(reader.read_u32().map_err(malformed)?)?;
                    let argc = reader.read_u8().map_err(malformed)? as usize;
                    cancel::checkpoint()?;
                    let args = self.pop_n(argc)?;
                    let result = invoke_static(self.class, &name, args)?;
                    self.push_result(result);
                }
                Opcode::Return => {
                    let value = self.pop()?;
                    return coerce_return(self.class, self.method, value);
                }
                Opcode::ReturnVoid => return Ok(Value::Void),
                Opcode::GetField => {
                    let name = self.string(reader.read_u32().map_err(malformed)?)?;
                    let obj = self.pop_object()?;
                    let value = obj
                        .get_field(&name)
                        .ok_or_else(|| crate::class::no_such_field(obj.class(), &name))?;
                    self.push(value);
                }
                Opcode::PutField => {
                    let name = self.string(reader.read_u32().map_err(malformed)?)?;
                    let value = self.pop()?;
                    let obj = self.pop_object()?;
                    if !obj.set_field(&name, value) {
                        return Err(crate::class::no_such_field(obj.class(), &name));
                    }
                }
                Opcode::GetStatic => {
                    let name = self.string(reader.read_u32().map_err(malformed)?)?;
                    let value = self.class.get_static(&name)?;
                    self.push(value);
                }
                Opcode::PutStatic => {
                    let name = self.string(reader.read_u32().map_err(malformed)?)?;
                    let value = self.pop()?;
                    self.class.set_static(&name, value)?;
                }
                Opcode::New => {
                    let name = self.string(reader.read_u32().map_err(malformed)?)?;
                    let argc = reader.read_u8().map_err(malformed)? as usize;
                    cancel::checkpoint()?;
                    let args = self.pop_n(argc)?;
                    let target = self
                        .class
                        .resolve(&name)
                        .map_err(|e| Fault::with_message(kinds::NO_CLASS_DEF, e.to_string()))?;
                    let object = instantiate(&target, args)?;
                    self.push(object);
                }
                Opcode::Throw => {
                    let type_name = self.string(reader.read_u32().map_err(malformed)?)?;
                    let message = match self.pop()? {
                        Value::Null => None,
                        other => Some(other.to_display_string()?),
                    };
                    return Err(Fault::new(type_name.to_string(), message));
                }
            }
        }
    }
}

fn invoke_virtual(receiver: Value, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
    let object = match receiver {
        Value::Object(obj) => obj,
        Value::Null => {
            return Err(Fault::with_message(
                kinds::NULL_POINTER,
                format!("cannot invoke {} on null", name),
            ))
        }
        Value::Str(s) => return invoke_string(&s, name, &args),
        other => {
            return Err(Fault::with_message(
                kinds::NO_SUCH_METHOD,
                format!("{}.{}", other.type_label(), name),
            ))
        }
    };
    let (class, index) = find_in_chain(object.class(), |m| {
        !m.is_static() && m.is_ordinary() && m.name == name && m.params.len() == args.len()
    })
    .ok_or_else(|| {
        Fault::with_message(
            kinds::NO_SUCH_METHOD,
            format!("{}.{}", object.class().name(), name),
        )
    })?;
    let method = &class.methods[index];
    let mut frame = Vec::with_capacity(args.len() + 1);
    frame.push(Value::Object(object.clone()));
    frame.extend(coerce_args(&class, method, args)?);
    execute(&class, index, frame)
}

fn invoke_string(s: &str, name: &str, args: &[Value]) -> Result<Value, Fault> {
    match (name, args) {
        ("length", []) => Ok(Value::Int(s.chars().count() as i32)),
        ("isEmpty", []) => Ok(Value::Bool(s.is_empty())),
        ("toString", []) => Ok(Value::str(s)),
        ("equals", [other]) => Ok(Value::Bool(other.as_str() == Some(s))),
        _ => Err(Fault::with_message(
            kinds::NO_SUCH_METHOD,
            format!("lang.String.{}", name),
        )),
    }
}

fn invoke_static(class: &ClassRef, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
    let (owner, index) = find_in_chain(class, |m| {
        m.is_static() && m.is_ordinary() && m.name == name && m.params.len() == args.len()
    })
    .ok_or_else(|| Fault::with_message(kinds::NO_SUCH_METHOD, format!("{}.{}", class.name(), name)))?;
    owner.ensure_initialized()?;
    let args = coerce_args(&owner, &owner.methods[index], args)?;
    execute(&owner, index, args)
}

fn instantiate(class: &ClassRef, args: Vec<Value>) -> Result<Value, Fault> {
    if class.is_abstract() {
        return Err(Fault::with_message(kinds::INSTANTIATION, class.name()));
    }
    let index = class
        .methods
        .iter()
        .position(|m| m.is_constructor() && m.params.len() == args.len())
        .ok_or_else(|| {
            Fault::with_message(
                kinds::NO_SUCH_METHOD,
                format!("{}.<init> with {} arguments", class.name(), args.len()),
            )
        })?;
    class.ensure_initialized()?;
    let object = Value::Object(Object::allocate(class));
    let mut frame = Vec::with_capacity(args.len() + 1);
    frame.push(object.clone());
    frame.extend(coerce_args(class, &class.methods[index], args)?);
    execute(class, index, frame)?;
    Ok(object)
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Int,
    Long,
    Float,
    Double,
}

fn rank(value: &Value) -> Option<Rank> {
    match value {
        Value::Byte(_) | Value::Short(_) | Value::Char(_) | Value::Int(_) => Some(Rank::Int),
        Value::Long(_) => Some(Rank::Long),
        Value::Float(_) => Some(Rank::Float),
        Value::Double(_) => Some(Rank::Double),
        _ => None,
    }
}

fn promote(a: &Value, b: &Value) -> Option<Rank> {
    Some(rank(a)?.max(rank(b)?))
}

fn bad_operands(op: Opcode, a: &Value, b: &Value) -> Fault {
    internal(format!(
        "{} not applicable to {} and {}",
        op.name(),
        a.type_label(),
        b.type_label()
    ))
}

fn division_by_zero() -> Fault {
    Fault::with_message(kinds::ARITHMETIC, "/ by zero")
}

macro_rules! integral_op {
    ($op:expr, $x:expr, $y:expr) => {
        match $op {
            Opcode::Add => $x.wrapping_add($y),
            Opcode::Sub => $x.wrapping_sub($y),
            Opcode::Mul => $x.wrapping_mul($y),
            Opcode::Div if $y == 0 => return Err(division_by_zero()),
            Opcode::Div => $x.wrapping_div($y),
            Opcode::Rem if $y == 0 => return Err(division_by_zero()),
            _ => $x.wrapping_rem($y),
        }
    };
}

macro_rules! float_op {
    ($op:expr, $x:expr, $y:expr) => {
        match $op {
            Opcode::Add => $x + $y,
            Opcode::Sub => $x - $y,
            Opcode::Mul => $x * $y,
            Opcode::Div => $x / $y,
            _ => $x % $y,
        }
    };
}

fn arithmetic(op: Opcode, a: &Value, b: &Value) -> Result<Value, Fault> {
    let rank = promote(a, b).ok_or_else(|| bad_operands(op, a, b))?;
    let ints = || a.as_i64().zip(b.as_i64()).ok_or_else(|| bad_operands(op, a, b));
    let floats = || a.as_f64().zip(b.as_f64()).ok_or_else(|| bad_operands(op, a, b));
    Ok(match rank {
        Rank::Int => {
            let (x, y) = ints()?;
            let (x, y) = (x as i32, y as i32);
            Value::Int(integral_op!(op, x, y))
        }
        Rank::Long => {
            let (x, y) = ints()?;
            Value::Long(integral_op!(op, x, y))
        }
        Rank::Float => {
            let (x, y) = floats()?;
            let (x, y) = (x as f32, y as f32);
            Value::Float(float_op!(op, x, y))
        }
        Rank::Double => {
            let (x, y) = floats()?;
            Value::Double(float_op!(op, x, y))
        }
    })
}

fn negate(a: &Value) -> Result<Value, Fault> {
    Ok(match *a {
        Value::Long(v) => Value::Long(v.wrapping_neg()),
        Value::Float(v) => Value::Float(-v),
        Value::Double(v) => Value::Double(-v),
        _ => match a.as_i64() {
            Some(v) => Value::Int((v as i32).wrapping_neg()),
            None => return Err(internal(format!("cannot negate {}", a.type_label()))),
        },
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match promote(a, b) {
        Some(Rank::Int | Rank::Long) => a.as_i64() == b.as_i64(),
        Some(_) => a.as_f64() == b.as_f64(),
        None => a == b,
    }
}

fn compare(op: Opcode, a: &Value, b: &Value) -> Result<bool, Fault> {
    let ordering = match promote(a, b).ok_or_else(|| bad_operands(op, a, b))? {
        Rank::Int | Rank::Long => a.as_i64().cmp(&b.as_i64()),
        _ => match a.as_f64().partial_cmp(&b.as_f64()) {
            Some(ordering) => ordering,
            // NaN compares false with everything
            None => return Ok(false),
        },
    };
    Ok(match op {
        Opcode::Lt => ordering == Ordering::Less,
        Opcode::Le => ordering != Ordering::Greater,
        Opcode::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

impl Value {
    /// Text form used by string concatenation and fault messages
    ///
    /// Objects use a declared no-argument `toString` when their class
    /// chain has one, which may run class code and fail.
    pub fn to_display_string(&self) -> Result<String, Fault> {
        Ok(match self {
            Value::Void => "void".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Char(v) => v.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => format_float32(*v),
            Value::Double(v) => format_float(*v),
            Value::Str(s) => s.to_string(),
            Value::Object(obj) => {
                match find_in_chain(obj.class(), |m| {
                    !m.is_static() && m.name == "toString" && m.params.is_empty()
                }) {
                    Some((class, index)) => {
                        match execute(&class, index, vec![self.clone()])? {
                            Value::Str(s) => s.to_string(),
                            other => other.to_display_string()?,
                        }
                    }
                    None => format!("{}@{:x}", obj.class().name(), obj.id()),
                }
            }
        })
    }
}
