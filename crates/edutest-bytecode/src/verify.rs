//! Bytecode verification
//!
//! Structural checks performed before a class is defined: every method body
//! must decode cleanly, jump only to instruction boundaries, reference only
//! existing pool strings and local slots, and end in a terminator.

use crate::class_file::{access, ClassFile, MethodBody, MethodDef};
use crate::encoder::BytecodeReader;
use crate::opcode::Opcode;
use rustc_hash::FxHashSet;

/// Bytecode verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Invalid opcode
    #[error("{method}: invalid opcode {opcode:#x} at offset {offset}")]
    InvalidOpcode {
        /// Method being verified
        method: String,
        /// The offending byte
        opcode: u8,
        /// Offset in the body
        offset: usize,
    },

    /// Operands run past the end of the body
    #[error("{method}: truncated instruction at offset {offset}")]
    Truncated {
        /// Method being verified
        method: String,
        /// Offset of the instruction
        offset: usize,
    },

    /// Invalid jump target
    #[error("{method}: invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// Method being verified
        method: String,
        /// Computed target
        target: i64,
        /// Offset of the jump
        offset: usize,
    },

    /// Invalid string pool reference
    #[error("{method}: invalid string pool reference {index} at offset {offset}")]
    InvalidStringRef {
        /// Method being verified
        method: String,
        /// Pool index
        index: u32,
        /// Offset of the instruction
        offset: usize,
    },

    /// Invalid local variable reference
    #[error("{method}: invalid local variable reference {index} (max {max}) at offset {offset}")]
    InvalidLocalRef {
        /// Method being verified
        method: String,
        /// Local index
        index: u16,
        /// Declared local count
        max: u16,
        /// Offset of the instruction
        offset: usize,
    },

    /// Fewer locals than the receiver and parameters need
    #[error("{method}: max_locals {max_locals} cannot hold {needed} arguments")]
    TooFewLocals {
        /// Method being verified
        method: String,
        /// Declared local count
        max_locals: u16,
        /// Slots needed for receiver and parameters
        needed: usize,
    },

    /// Execution falls off end
    #[error("{method}: execution falls off end of method at offset {offset}")]
    FallOffEnd {
        /// Method being verified
        method: String,
        /// Offset of the last instruction
        offset: usize,
    },

    /// Body kind doesn't match the method flags
    #[error("{method}: {reason}")]
    InvalidBody {
        /// Method being verified
        method: String,
        /// What is wrong
        reason: &'static str,
    },
}

/// Verify every method of a class
pub fn verify_class(class: &ClassFile) -> Result<(), VerifyError> {
    for method in &class.methods {
        verify_method(method, class)?;
    }
    Ok(())
}

/// Parsed instruction
#[derive(Debug, Clone, Copy)]
struct Instruction {
    offset: usize,
    opcode: Opcode,
    operand_offset: usize,
}

fn verify_method(method: &MethodDef, class: &ClassFile) -> Result<(), VerifyError> {
    let label = || format!("{}.{}", class.name, method.name);

    let code = match &method.body {
        MethodBody::Abstract => {
            if method.access & access::ABSTRACT == 0 {
                return Err(VerifyError::InvalidBody {
                    method: label(),
                    reason: "missing body on a non-abstract method",
                });
            }
            return Ok(());
        }
        MethodBody::Native(_) => return Ok(()),
        MethodBody::Code(code) => code,
    };

    if method.access & access::ABSTRACT != 0 {
        return Err(VerifyError::InvalidBody {
            method: label(),
            reason: "abstract method has a body",
        });
    }

    let needed = method.arg_slots();
    if (method.max_locals as usize) < needed {
        return Err(VerifyError::TooFewLocals {
            method: label(),
            max_locals: method.max_locals,
            needed,
        });
    }

    let instructions = parse_instructions(code, &label)?;
    let boundaries: FxHashSet<usize> = instructions.iter().map(|i| i.offset).collect();

    for instr in &instructions {
        let mut reader = BytecodeReader::new(code);
        reader.seek(instr.operand_offset);
        // Operand widths were checked by parse_instructions.
        let truncated = |_| VerifyError::Truncated {
            method: label(),
            offset: instr.offset,
        };

        if instr.opcode.is_jump() {
            let rel = reader.read_i32().map_err(truncated)?;
            let target = (instr.operand_offset + 4) as i64 + rel as i64;
            if target < 0 || !boundaries.contains(&(target as usize)) {
                return Err(VerifyError::InvalidJumpTarget {
                    method: label(),
                    target,
                    offset: instr.offset,
                });
            }
        } else if instr.opcode.references_string_pool() {
            let index = reader.read_u32().map_err(truncated)?;
            if index as usize >= class.strings.len() {
                return Err(VerifyError::InvalidStringRef {
                    method: label(),
                    index,
                    offset: instr.offset,
                });
            }
        } else if matches!(instr.opcode, Opcode::LoadLocal | Opcode::StoreLocal) {
            let index = reader.read_u16().map_err(truncated)?;
            if index >= method.max_locals {
                return Err(VerifyError::InvalidLocalRef {
                    method: label(),
                    index,
                    max: method.max_locals,
                    offset: instr.offset,
                });
            }
        }
    }

    match instructions.last() {
        Some(last) if last.opcode.is_terminator() => Ok(()),
        Some(last) => Err(VerifyError::FallOffEnd {
            method: label(),
            offset: last.offset,
        }),
        None => Err(VerifyError::FallOffEnd {
            method: label(),
            offset: 0,
        }),
    }
}

fn parse_instructions(
    code: &[u8],
    label: &dyn Fn() -> String,
) -> Result<Vec<Instruction>, VerifyError> {
    let mut instructions = Vec::new();
    let mut offset = 0usize;

    while offset < code.len() {
        let byte = code[offset];
        let opcode = Opcode::from_u8(byte).ok_or_else(|| VerifyError::InvalidOpcode {
            method: label(),
            opcode: byte,
            offset,
        })?;
        let operand_offset = offset + 1;
        let next = operand_offset + opcode.operand_size();
        if next > code.len() {
            return Err(VerifyError::Truncated {
                method: label(),
                offset,
            });
        }
        instructions.push(Instruction {
            offset,
            opcode,
            operand_offset,
        });
        offset = next;
    }

    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_file::{PrimitiveType, TypeDesc};
    use crate::encoder::BytecodeWriter;

    fn class_with(code: Vec<u8>, max_locals: u16) -> ClassFile {
        let mut class = ClassFile::new("Test");
        class.strings.push("value".to_string());
        class.methods.push(MethodDef {
            name: "run".to_string(),
            access: access::PUBLIC | access::STATIC,
            params: vec![TypeDesc::Primitive(PrimitiveType::Int)],
            return_type: TypeDesc::Primitive(PrimitiveType::Int),
            max_locals,
            body: MethodBody::Code(code),
        });
        class
    }

    #[test]
    fn test_verify_simple_method() {
        let mut writer = BytecodeWriter::new();
        writer.emit_load_local(0);
        writer.emit_const_i32(1);
        writer.emit_opcode(Opcode::Add);
        writer.emit_opcode(Opcode::Return);
        assert!(verify_class(&class_with(writer.into_bytes(), 1)).is_ok());
    }

    #[test]
    fn test_verify_invalid_opcode() {
        let result = verify_class(&class_with(vec![0x3F], 1));
        assert!(matches!(
            result,
            Err(VerifyError::InvalidOpcode { opcode: 0x3F, offset: 0, .. })
        ));
    }

    #[test]
    fn test_verify_truncated_operand() {
        let result = verify_class(&class_with(vec![Opcode::ConstI32.to_u8(), 1, 2], 1));
        assert!(matches!(result, Err(VerifyError::Truncated { offset: 0, .. })));
    }

    #[test]
    fn test_verify_invalid_local_ref() {
        let mut writer = BytecodeWriter::new();
        writer.emit_load_local(3);
        writer.emit_opcode(Opcode::Return);
        let result = verify_class(&class_with(writer.into_bytes(), 1));
        assert!(matches!(
            result,
            Err(VerifyError::InvalidLocalRef { index: 3, max: 1, .. })
        ));
    }

    #[test]
    fn test_verify_invalid_string_ref() {
        let mut writer = BytecodeWriter::new();
        writer.emit_const_str(7);
        writer.emit_opcode(Opcode::Return);
        let result = verify_class(&class_with(writer.into_bytes(), 1));
        assert!(matches!(result, Err(VerifyError::InvalidStringRef { index: 7, .. })));
    }

    #[test]
    fn test_verify_jump_into_operand() {
        let mut writer = BytecodeWriter::new();
        writer.emit_jump(Opcode::Jmp, 2);
        writer.emit_const_i32(5);
        writer.emit_opcode(Opcode::Return);
        let result = verify_class(&class_with(writer.into_bytes(), 1));
        assert!(matches!(result, Err(VerifyError::InvalidJumpTarget { target: 7, .. })));
    }

    #[test]
    fn test_verify_backward_jump() {
        let mut writer = BytecodeWriter::new();
        writer.emit_opcode(Opcode::Nop);
        writer.emit_jump(Opcode::Jmp, -6);
        assert!(verify_class(&class_with(writer.into_bytes(), 1)).is_ok());
    }

    #[test]
    fn test_verify_method_without_terminator() {
        let mut writer = BytecodeWriter::new();
        writer.emit_const_i32(5);
        let result = verify_class(&class_with(writer.into_bytes(), 1));
        assert!(matches!(result, Err(VerifyError::FallOffEnd { offset: 0, .. })));
    }

    #[test]
    fn test_verify_too_few_locals() {
        let result = verify_class(&class_with(vec![Opcode::ReturnVoid.to_u8()], 0));
        assert!(matches!(result, Err(VerifyError::TooFewLocals { needed: 1, .. })));
    }

    #[test]
    fn test_verify_abstract_body_mismatch() {
        let mut class = class_with(vec![], 1);
        class.methods[0].body = MethodBody::Abstract;
        assert!(matches!(
            verify_class(&class),
            Err(VerifyError::InvalidBody { .. })
        ));

        class.methods[0].access |= access::ABSTRACT;
        assert!(verify_class(&class).is_ok());
    }
}
