//! Bytecode encoding and decoding utilities
//!
//! `BytecodeWriter` emits method bodies and class file sections,
//! `BytecodeReader` reads them back.

use crate::opcode::Opcode;
use thiserror::Error;

/// Errors that can occur during bytecode decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Unexpected end of bytecode stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Invalid opcode
    #[error("Invalid opcode {0} at offset {1}")]
    InvalidOpcode(u8, usize),
}

/// Append-only little-endian buffer for method bodies and class file sections
pub struct BytecodeWriter {
    pub(crate) buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Bytes written so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Take the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Offset the next byte will land at
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    fn put<const N: usize>(&mut self, bytes: [u8; N]) {
        self.buffer.extend_from_slice(&bytes);
    }

    fn overwrite<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.buffer[offset..offset + N].copy_from_slice(&bytes);
    }

    /// Single byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Two-byte operand such as a local slot
    pub fn emit_u16(&mut self, value: u16) {
        self.put(value.to_le_bytes());
    }

    /// Four-byte operand such as a pool index or a length
    pub fn emit_u32(&mut self, value: u32) {
        self.put(value.to_le_bytes());
    }

    /// `u32` byte count followed by the UTF-8 bytes
    pub fn emit_string(&mut self, value: &str) {
        self.emit_blob(value.as_bytes());
    }

    /// `u32` byte count followed by the bytes
    pub fn emit_blob(&mut self, value: &[u8]) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value);
    }

    /// Bare opcode
    pub fn emit_opcode(&mut self, opcode: Opcode) {
        self.emit_u8(opcode.to_u8());
    }

    /// `CONST_I32` with its immediate
    pub fn emit_const_i32(&mut self, value: i32) {
        self.emit_opcode(Opcode::ConstI32);
        self.put(value.to_le_bytes());
    }

    /// `CONST_I64` with its immediate
    pub fn emit_const_i64(&mut self, value: i64) {
        self.emit_opcode(Opcode::ConstI64);
        self.put(value.to_le_bytes());
    }

    /// `CONST_F64` with its immediate
    pub fn emit_const_f64(&mut self, value: f64) {
        self.emit_opcode(Opcode::ConstF64);
        self.put(value.to_le_bytes());
    }

    /// `CONST_STR` referencing the string pool
    pub fn emit_const_str(&mut self, index: u32) {
        self.emit_named(Opcode::ConstStr, index);
    }

    /// `LOAD_LOCAL` from a slot
    pub fn emit_load_local(&mut self, index: u16) {
        self.emit_opcode(Opcode::LoadLocal);
        self.emit_u16(index);
    }

    /// `STORE_LOCAL` into a slot
    pub fn emit_store_local(&mut self, index: u16) {
        self.emit_opcode(Opcode::StoreLocal);
        self.emit_u16(index);
    }

    /// Jump whose offset is relative to the end of the instruction
    pub fn emit_jump(&mut self, opcode: Opcode, offset: i32) {
        debug_assert!(opcode.is_jump());
        self.emit_opcode(opcode);
        self.put(offset.to_le_bytes());
    }

    /// `INVOKE`, `INVOKE_STATIC` or `NEW`: name index, then argument count
    pub fn emit_call(&mut self, opcode: Opcode, name_index: u32, arg_count: u8) {
        debug_assert!(opcode.is_call());
        self.emit_named(opcode, name_index);
        self.emit_u8(arg_count);
    }

    /// Opcode whose only operand is a string pool index
    pub fn emit_named(&mut self, opcode: Opcode, name_index: u32) {
        self.emit_opcode(opcode);
        self.emit_u32(name_index);
    }

    /// Placeholder for a jump offset not known yet; returns where to patch
    pub fn reserve_i32(&mut self) -> usize {
        let offset = self.offset();
        self.put([0u8; 4]);
        offset
    }

    /// Fill a slot returned by [`reserve_i32`](Self::reserve_i32)
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        self.overwrite(offset, value.to_le_bytes());
    }

    /// Overwrite a length or count written earlier
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.overwrite(offset, value.to_le_bytes());
    }
}

impl Default for BytecodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over encoded bytes; every read fails with the offset where data ran out
pub struct BytecodeReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Cursor at offset zero
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Offset of the next unread byte
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether unread bytes remain
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Move the cursor, e.g. to a jump target
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.position + N;
        if end > self.buffer.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buffer[self.position..end]);
        self.position = end;
        Ok(bytes)
    }

    /// One byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    /// Local slot or other two-byte operand
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.take().map(u16::from_le_bytes)
    }

    /// Pool index, length or count
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.take().map(u32::from_le_bytes)
    }

    /// `CONST_I32` immediate or jump offset
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.take().map(i32::from_le_bytes)
    }

    /// `CONST_I64` immediate
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.take().map(i64::from_le_bytes)
    }

    /// `CONST_F64` immediate
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.take().map(f64::from_le_bytes)
    }

    /// Counterpart of [`BytecodeWriter::emit_string`]
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.position;
        let bytes = self.read_blob()?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    /// Counterpart of [`BytecodeWriter::emit_blob`]
    pub fn read_blob(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Exactly `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let bytes = self.buffer[self.position..end].to_vec();
        self.position = end;
        Ok(bytes)
    }

    /// Opcode byte, rejecting values outside the instruction set
    pub fn read_opcode(&mut self) -> Result<Opcode, DecodeError> {
        let offset = self.position;
        let byte = self.read_u8()?;
        Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, offset))
    }
}
