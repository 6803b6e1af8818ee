//! Bytecode opcodes for method bodies
//!
//! Method bodies in a class file are sequences of single-byte opcodes, some
//! followed by little-endian operands.

/// Bytecode opcode enumeration
///
/// Opcodes are organized into categories:
/// - 0x00-0x0F: Stack manipulation & constants
/// - 0x10-0x1F: Local variables
/// - 0x20-0x2F: Arithmetic (operands are promoted to the wider kind)
/// - 0x50-0x5F: Comparison & logical
/// - 0x80-0x8F: String operations
/// - 0x90-0x9F: Control flow
/// - 0xA0-0xAF: Method calls
/// - 0xB0-0xBF: Object & static field operations
/// - 0xE0-0xEF: Error handling
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Duplicate top stack value
    Dup = 0x02,
    /// Swap top two stack values
    Swap = 0x03,

    /// Push null constant
    ConstNull = 0x04,
    /// Push true constant
    ConstTrue = 0x05,
    /// Push false constant
    ConstFalse = 0x06,
    /// Push 32-bit integer constant (operand: i32)
    ConstI32 = 0x07,
    /// Push 64-bit integer constant (operand: i64)
    ConstI64 = 0x08,
    /// Push 64-bit float constant (operand: f64)
    ConstF64 = 0x09,
    /// Push string constant from the class string pool (operand: u32 index)
    ConstStr = 0x0A,

    // ===== Local Variables (0x10-0x1F) =====
    /// Load local variable onto stack (operand: u16 index)
    LoadLocal = 0x10,
    /// Store top of stack into local variable (operand: u16 index)
    StoreLocal = 0x11,

    // ===== Arithmetic (0x20-0x2F) =====
    /// Add two numbers
    Add = 0x20,
    /// Subtract two numbers
    Sub = 0x21,
    /// Multiply two numbers
    Mul = 0x22,
    /// Divide two numbers (integer division by zero throws)
    Div = 0x23,
    /// Remainder of two numbers
    Rem = 0x24,
    /// Negate a number
    Neg = 0x25,

    // ===== Comparison & Logical (0x50-0x5F) =====
    /// Equality
    Eq = 0x50,
    /// Inequality
    Ne = 0x51,
    /// Less than
    Lt = 0x52,
    /// Less than or equal
    Le = 0x53,
    /// Greater than
    Gt = 0x54,
    /// Greater than or equal
    Ge = 0x55,
    /// Logical not
    Not = 0x56,

    // ===== String Operations (0x80-0x8F) =====
    /// Concatenate the display forms of the top two values
    Concat = 0x80,

    // ===== Control Flow (0x90-0x9F) =====
    /// Unconditional jump (operand: i32 offset relative to the next instruction)
    Jmp = 0x90,
    /// Jump if top of stack is false (operand: i32 offset)
    JmpIfFalse = 0x91,
    /// Jump if top of stack is true (operand: i32 offset)
    JmpIfTrue = 0x92,

    // ===== Method Calls (0xA0-0xAF) =====
    /// Call an instance method on the receiver below the arguments
    /// (operands: u32 name index, u8 argument count)
    Invoke = 0xA0,
    /// Call a static method of the current class or one of its superclasses
    /// (operands: u32 name index, u8 argument count)
    InvokeStatic = 0xA1,
    /// Return top of stack
    Return = 0xA2,
    /// Return without a value
    ReturnVoid = 0xA3,

    // ===== Object Operations (0xB0-0xBF) =====
    /// Load an instance field of the object on top of the stack (operand: u32 name index)
    GetField = 0xB0,
    /// Store into an instance field; stack is `object, value` (operand: u32 name index)
    PutField = 0xB1,
    /// Load a static field of the current class (operand: u32 name index)
    GetStatic = 0xB2,
    /// Store a static field of the current class (operand: u32 name index)
    PutStatic = 0xB3,
    /// Instantiate a class and run its constructor
    /// (operands: u32 class name index, u8 argument count)
    New = 0xB4,

    // ===== Error Handling (0xE0-0xEF) =====
    /// Throw a fault of the named type, using the top of stack as its message
    /// (`null` for none) (operand: u32 type name index)
    Throw = 0xE0,
}

impl Opcode {
    /// Convert a byte to an opcode
    ///
    /// Returns `None` if the byte doesn't correspond to a valid opcode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            // Stack manipulation & constants
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Pop),
            0x02 => Some(Self::Dup),
            0x03 => Some(Self::Swap),
            0x04 => Some(Self::ConstNull),
            0x05 => Some(Self::ConstTrue),
            0x06 => Some(Self::ConstFalse),
            0x07 => Some(Self::ConstI32),
            0x08 => Some(Self::ConstI64),
            0x09 => Some(Self::ConstF64),
            0x0A => Some(Self::ConstStr),

            // Local variables
            0x10 => Some(Self::LoadLocal),
            0x11 => Some(Self::StoreLocal),

            // Arithmetic
            0x20 => Some(Self::Add),
            0x21 => Some(Self::Sub),
            0x22 => Some(Self::Mul),
            0x23 => Some(Self::Div),
            0x24 => Some(Self::Rem),
            0x25 => Some(Self::Neg),

            // Comparison & logical
            0x50 => Some(Self::Eq),
            0x51 => Some(Self::Ne),
            0x52 => Some(Self::Lt),
            0x53 => Some(Self::Le),
            0x54 => Some(Self::Gt),
            0x55 => Some(Self::Ge),
            0x56 => Some(Self::Not),

            // Strings
            0x80 => Some(Self::Concat),

            // Control flow
            0x90 => Some(Self::Jmp),
            0x91 => Some(Self::JmpIfFalse),
            0x92 => Some(Self::JmpIfTrue),

            // Calls
            0xA0 => Some(Self::Invoke),
            0xA1 => Some(Self::InvokeStatic),
            0xA2 => Some(Self::Return),
            0xA3 => Some(Self::ReturnVoid),

            // Objects
            0xB0 => Some(Self::GetField),
            0xB1 => Some(Self::PutField),
            0xB2 => Some(Self::GetStatic),
            0xB3 => Some(Self::PutStatic),
            0xB4 => Some(Self::New),

            // Errors
            0xE0 => Some(Self::Throw),

            _ => None,
        }
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the mnemonic name of this opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::ConstNull => "CONST_NULL",
            Self::ConstTrue => "CONST_TRUE",
            Self::ConstFalse => "CONST_FALSE",
            Self::ConstI32 => "CONST_I32",
            Self::ConstI64 => "CONST_I64",
            Self::ConstF64 => "CONST_F64",
            Self::ConstStr => "CONST_STR",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Rem => "REM",
            Self::Neg => "NEG",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Not => "NOT",
            Self::Concat => "CONCAT",
            Self::Jmp => "JMP",
            Self::JmpIfFalse => "JMP_IF_FALSE",
            Self::JmpIfTrue => "JMP_IF_TRUE",
            Self::Invoke => "INVOKE",
            Self::InvokeStatic => "INVOKE_STATIC",
            Self::Return => "RETURN",
            Self::ReturnVoid => "RETURN_VOID",
            Self::GetField => "GET_FIELD",
            Self::PutField => "PUT_FIELD",
            Self::GetStatic => "GET_STATIC",
            Self::PutStatic => "PUT_STATIC",
            Self::New => "NEW",
            Self::Throw => "THROW",
        }
    }

    /// Size in bytes of the operands following this opcode
    pub fn operand_size(self) -> usize {
        match self {
            Self::ConstI32 | Self::ConstStr => 4,
            Self::ConstI64 | Self::ConstF64 => 8,
            Self::LoadLocal | Self::StoreLocal => 2,
            Self::Jmp | Self::JmpIfFalse | Self::JmpIfTrue => 4,
            Self::Invoke | Self::InvokeStatic | Self::New => 5,
            Self::GetField | Self::PutField | Self::GetStatic | Self::PutStatic => 4,
            Self::Throw => 4,
            _ => 0,
        }
    }

    /// Check if this opcode is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::JmpIfFalse | Self::JmpIfTrue)
    }

    /// Check if this opcode is a call instruction
    pub fn is_call(self) -> bool {
        matches!(self, Self::Invoke | Self::InvokeStatic | Self::New)
    }

    /// Check if this opcode ends execution of the current method
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Return | Self::ReturnVoid | Self::Throw | Self::Jmp)
    }

    /// Check if the operand of this opcode is an index into the string pool
    pub fn references_string_pool(self) -> bool {
        matches!(
            self,
            Self::ConstStr
                | Self::Invoke
                | Self::InvokeStatic
                | Self::GetField
                | Self::PutField
                | Self::GetStatic
                | Self::PutStatic
                | Self::New
                | Self::Throw
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
