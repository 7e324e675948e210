//! Constant pool indexing and lazy resolution.
//!
//! The pool is swept exactly once at construction time to build an
//! offset-plus-one index (the offset of each `cp_info` body, one past its
//! tag). Nothing else is decoded eagerly: UTF-8 strings and dynamic constants
//! are resolved on first use and cached by constant pool index.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use jni_sys::{jdouble, jfloat, jint, jlong};
use log::trace;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::error::{DecodeError, DecodeErrorKind, Result};
use crate::read::ByteCursor;

pub(crate) const CONSTANT_UTF8: u8 = 1;
pub(crate) const CONSTANT_INTEGER: u8 = 3;
pub(crate) const CONSTANT_FLOAT: u8 = 4;
pub(crate) const CONSTANT_LONG: u8 = 5;
pub(crate) const CONSTANT_DOUBLE: u8 = 6;
pub(crate) const CONSTANT_CLASS: u8 = 7;
pub(crate) const CONSTANT_STRING: u8 = 8;
pub(crate) const CONSTANT_FIELD_REF: u8 = 9;
pub(crate) const CONSTANT_METHOD_REF: u8 = 10;
pub(crate) const CONSTANT_INTERFACE_METHOD_REF: u8 = 11;
pub(crate) const CONSTANT_NAME_AND_TYPE: u8 = 12;
pub(crate) const CONSTANT_METHOD_HANDLE: u8 = 15;
pub(crate) const CONSTANT_METHOD_TYPE: u8 = 16;
pub(crate) const CONSTANT_DYNAMIC: u8 = 17;
pub(crate) const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
pub(crate) const CONSTANT_MODULE: u8 = 19;
pub(crate) const CONSTANT_PACKAGE: u8 = 20;

/// The kind byte of a `CONSTANT_MethodHandle_info` entry.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

/// A resolved `CONSTANT_MethodHandle`.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    pub kind: ReferenceKind,
    /// Internal name of the class owning the referenced field or method.
    pub owner: Rc<str>,
    pub name: Rc<str>,
    pub descriptor: Rc<str>,
    /// Whether the owner is an interface (the reference went through a
    /// `CONSTANT_InterfaceMethodref`).
    pub is_interface: bool,
}

/// A resolved `CONSTANT_Dynamic` or `CONSTANT_InvokeDynamic`: the name and
/// descriptor of the call site plus the bootstrap method and its static
/// arguments out of the `BootstrapMethods` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDynamic {
    pub name: Rc<str>,
    pub descriptor: Rc<str>,
    pub bootstrap_method: Handle,
    pub bootstrap_arguments: Vec<ConstantValue>,
}

/// Any constant pool entry that can appear as an `ldc` operand, a bootstrap
/// argument, or a field `ConstantValue`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Integer(jint),
    Float(jfloat),
    Long(jlong),
    Double(jdouble),
    /// Internal name of a `CONSTANT_Class` (e.g. `java/lang/String` or
    /// `[Ljava/lang/Object;`).
    Class(Rc<str>),
    String(Rc<str>),
    MethodType(Rc<str>),
    MethodHandle(Handle),
    Dynamic(Rc<ConstantDynamic>),
}

/// The swept constant pool: body offsets by index, plus the lazy caches.
#[derive(Debug)]
pub struct ConstantPool {
    /// `cp_info` body offset for each index; 0 for index 0 and for the unused
    /// upper slot of `Long`/`Double` entries.
    offsets: Vec<u32>,
    /// Whether any `Dynamic`/`InvokeDynamic` tag was seen during the sweep.
    has_dynamic: bool,
    utf8_cache: RefCell<Vec<Option<Rc<str>>>>,
    dynamic_cache: RefCell<HashMap<u16, Rc<ConstantDynamic>>>,
    /// Shared decode scratch, sized to the largest `Utf8` entry.
    char_buffer: RefCell<Vec<char>>,
}

impl ConstantPool {
    /// Sweep the pool starting at the `constant_pool_count` field. Returns the
    /// pool and the offset of the byte after the last `cp_info`, which is the
    /// `access_flags` field of the class.
    pub(crate) fn parse(cur: ByteCursor<'_>, count_offset: usize) -> Result<(ConstantPool, usize)> {
        let count = cur.u16(count_offset)?;
        let mut offsets = vec![0u32; count as usize];
        let mut has_dynamic = false;
        let mut max_utf8 = 0usize;

        let mut current = count_offset + 2;
        let mut index = 1u32;
        while index < u32::from(count) {
            offsets[index as usize] = (current + 1) as u32;
            let tag = cur.u8(current)?;
            let entry_size = match tag {
                CONSTANT_UTF8 => {
                    let length = cur.u16(current + 1)? as usize;
                    // Conservative bound: the decoded character count never
                    // exceeds the cp_info byte size.
                    if 3 + length > max_utf8 {
                        max_utf8 = 3 + length;
                    }
                    3 + length
                }
                CONSTANT_METHOD_HANDLE => 4,
                CONSTANT_CLASS
                | CONSTANT_STRING
                | CONSTANT_METHOD_TYPE
                | CONSTANT_MODULE
                | CONSTANT_PACKAGE => 3,
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    // 8 byte constants take two indices; the second is unused.
                    index += 1;
                    9
                }
                CONSTANT_DYNAMIC | CONSTANT_INVOKE_DYNAMIC => {
                    has_dynamic = true;
                    5
                }
                CONSTANT_INTEGER
                | CONSTANT_FLOAT
                | CONSTANT_FIELD_REF
                | CONSTANT_METHOD_REF
                | CONSTANT_INTERFACE_METHOD_REF
                | CONSTANT_NAME_AND_TYPE => 5,
                x => return Err(DecodeError::new(current, DecodeErrorKind::BadConstantTag(x))),
            };

            // Make sure the entry body fits before trusting the offset.
            cur.bytes(current + 1, entry_size - 1)?;

            current += entry_size;
            index += 1;
        }

        trace!("swept {} constant pool slot(s)", count.saturating_sub(1));

        let pool = ConstantPool {
            utf8_cache: RefCell::new(vec![None; offsets.len()]),
            dynamic_cache: RefCell::new(HashMap::new()),
            char_buffer: RefCell::new(Vec::with_capacity(max_utf8)),
            offsets,
            has_dynamic,
        };

        Ok((pool, current))
    }

    /// Number of constant pool slots, including the reserved slot 0.
    pub fn item_count(&self) -> u16 {
        self.offsets.len() as u16
    }

    pub(crate) fn has_dynamic(&self) -> bool {
        self.has_dynamic
    }

    /// Body offset of entry `index`. `at` is the byte offset of the reference
    /// for error reporting.
    pub(crate) fn offset_of(&self, index: u16, at: usize) -> Result<usize> {
        match self.offsets.get(index as usize) {
            Some(&offset) if index != 0 && offset != 0 => Ok(offset as usize),
            _ => Err(DecodeError::new(at, DecodeErrorKind::BadConstantTag(0))),
        }
    }

    /// Tag byte of entry `index`.
    pub(crate) fn tag(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<u8> {
        cur.u8(self.offset_of(index, at)? - 1)
    }

    fn expect(
        &self,
        cur: ByteCursor<'_>,
        index: u16,
        expected: u8,
        at: usize,
    ) -> Result<usize> {
        let offset = self.offset_of(index, at)?;
        let tag = cur.u8(offset - 1)?;
        if tag != expected {
            return Err(DecodeError::new(offset - 1, DecodeErrorKind::BadConstantTag(tag)));
        }
        Ok(offset)
    }

    /// Decode a `CONSTANT_Utf8`, at most once; repeated reads return clones
    /// of the same cached `Rc`.
    pub fn utf8(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<Rc<str>> {
        if let Some(cached) = self
            .utf8_cache
            .borrow()
            .get(index as usize)
            .and_then(Option::clone)
        {
            return Ok(cached);
        }

        let offset = self.expect(cur, index, CONSTANT_UTF8, at)?;
        let length = cur.u16(offset)? as usize;
        let bytes = cur.bytes(offset + 2, length)?;

        let mut scratch = self.char_buffer.borrow_mut();
        let text: Rc<str> = decode_modified_utf8(bytes, offset + 2, &mut scratch)?.into();
        self.utf8_cache.borrow_mut()[index as usize] = Some(text.clone());
        Ok(text)
    }

    /// Resolve a `CONSTANT_Class` entry to its internal name.
    pub fn class_name(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<Rc<str>> {
        let offset = self.expect(cur, index, CONSTANT_CLASS, at)?;
        self.utf8(cur, cur.u16(offset)?, offset)
    }

    /// Resolve a `CONSTANT_Module` entry to its name.
    pub fn module_name(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<Rc<str>> {
        let offset = self.expect(cur, index, CONSTANT_MODULE, at)?;
        self.utf8(cur, cur.u16(offset)?, offset)
    }

    /// Resolve a `CONSTANT_Package` entry to its name.
    pub fn package_name(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<Rc<str>> {
        let offset = self.expect(cur, index, CONSTANT_PACKAGE, at)?;
        self.utf8(cur, cur.u16(offset)?, offset)
    }

    /// Resolve a `CONSTANT_NameAndType` entry to `(name, descriptor)`.
    pub fn name_and_type(
        &self,
        cur: ByteCursor<'_>,
        index: u16,
        at: usize,
    ) -> Result<(Rc<str>, Rc<str>)> {
        let offset = self.expect(cur, index, CONSTANT_NAME_AND_TYPE, at)?;
        let name = self.utf8(cur, cur.u16(offset)?, offset)?;
        let descriptor = self.utf8(cur, cur.u16(offset + 2)?, offset + 2)?;
        Ok((name, descriptor))
    }

    /// Resolve a `Fieldref`/`Methodref`/`InterfaceMethodref` entry to
    /// `(owner, name, descriptor, is_interface)`.
    pub fn member_ref(
        &self,
        cur: ByteCursor<'_>,
        index: u16,
        at: usize,
    ) -> Result<(Rc<str>, Rc<str>, Rc<str>, bool)> {
        let offset = self.offset_of(index, at)?;
        let tag = cur.u8(offset - 1)?;
        match tag {
            CONSTANT_FIELD_REF | CONSTANT_METHOD_REF | CONSTANT_INTERFACE_METHOD_REF => {}
            x => return Err(DecodeError::new(offset - 1, DecodeErrorKind::BadConstantTag(x))),
        }

        let owner = self.class_name(cur, cur.u16(offset)?, offset)?;
        let (name, descriptor) = self.name_and_type(cur, cur.u16(offset + 2)?, offset + 2)?;
        Ok((owner, name, descriptor, tag == CONSTANT_INTERFACE_METHOD_REF))
    }

    /// Resolve a `CONSTANT_MethodHandle` entry.
    pub fn method_handle(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<Handle> {
        let offset = self.expect(cur, index, CONSTANT_METHOD_HANDLE, at)?;
        let kind_byte = cur.u8(offset)?;
        let kind = ReferenceKind::from_u8(kind_byte)
            .ok_or_else(|| DecodeError::new(offset, DecodeErrorKind::BadConstantTag(kind_byte)))?;
        let (owner, name, descriptor, is_interface) =
            self.member_ref(cur, cur.u16(offset + 1)?, offset + 1)?;

        Ok(Handle {
            kind,
            owner,
            name,
            descriptor,
            is_interface,
        })
    }

    pub(crate) fn integer(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<jint> {
        let offset = self.expect(cur, index, CONSTANT_INTEGER, at)?;
        cur.i32(offset)
    }

    pub(crate) fn float(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<jfloat> {
        let offset = self.expect(cur, index, CONSTANT_FLOAT, at)?;
        cur.f32(offset)
    }

    pub(crate) fn long(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<jlong> {
        let offset = self.expect(cur, index, CONSTANT_LONG, at)?;
        cur.i64(offset)
    }

    pub(crate) fn double(&self, cur: ByteCursor<'_>, index: u16, at: usize) -> Result<jdouble> {
        let offset = self.expect(cur, index, CONSTANT_DOUBLE, at)?;
        cur.f64(offset)
    }

    pub(crate) fn cached_dynamic(&self, index: u16) -> Option<Rc<ConstantDynamic>> {
        self.dynamic_cache.borrow().get(&index).cloned()
    }

    pub(crate) fn cache_dynamic(&self, index: u16, value: Rc<ConstantDynamic>) {
        self.dynamic_cache.borrow_mut().insert(index, value);
    }
}

/// Decode the JVM's modified UTF-8 into a `String`.
///
/// One-byte form for `[0x01, 0x7F]`, two-byte form down to the overlong NUL
/// (`0xC0 0x80`), three-byte form up to U+FFFF, and supplementary code points
/// as CESU-8 surrogate pairs of three-byte forms. `base` is the buffer offset
/// of `bytes` for error reporting. Byte patterns a JVM would tolerate but
/// UTF-16 cannot pair (lone surrogates, stray continuation bytes) decode to
/// U+FFFD; only running out of bytes mid-sequence is an error.
pub(crate) fn decode_modified_utf8(
    bytes: &[u8],
    base: usize,
    scratch: &mut Vec<char>,
) -> Result<String> {
    scratch.clear();

    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];

        if byte & 0x80 == 0 {
            scratch.push(byte as char);
            index += 1;
            continue;
        }

        if byte & 0xe0 == 0xc0 {
            if index + 2 > bytes.len() {
                return Err(DecodeError::new(base + index, DecodeErrorKind::TruncatedInput));
            }
            let unit = (u32::from(byte & 0x1f) << 6) | u32::from(bytes[index + 1] & 0x3f);
            scratch.push(char::from_u32(unit).unwrap_or('\u{fffd}'));
            index += 2;
            continue;
        }

        if byte & 0xf0 == 0xe0 {
            if index + 3 > bytes.len() {
                return Err(DecodeError::new(base + index, DecodeErrorKind::TruncatedInput));
            }
            let unit = (u16::from(byte & 0x0f) << 12)
                | (u16::from(bytes[index + 1] & 0x3f) << 6)
                | u16::from(bytes[index + 2] & 0x3f);
            index += 3;

            // A high surrogate must be followed by a second three-byte form
            // holding the low surrogate.
            if (0xd800..=0xdbff).contains(&unit) {
                if index + 3 <= bytes.len() && bytes[index] & 0xf0 == 0xe0 {
                    let low = (u16::from(bytes[index] & 0x0f) << 12)
                        | (u16::from(bytes[index + 1] & 0x3f) << 6)
                        | u16::from(bytes[index + 2] & 0x3f);
                    if (0xdc00..=0xdfff).contains(&low) {
                        let code_point = 0x10000
                            + ((u32::from(unit) - 0xd800) << 10)
                            + (u32::from(low) - 0xdc00);
                        scratch.push(char::from_u32(code_point).unwrap_or('\u{fffd}'));
                        index += 3;
                        continue;
                    }
                }
                scratch.push('\u{fffd}');
                continue;
            }

            scratch.push(char::from_u32(u32::from(unit)).unwrap_or('\u{fffd}'));
            continue;
        }

        // Stray continuation or 4-byte lead; a JVM never emits these.
        scratch.push('\u{fffd}');
        index += 1;
    }

    Ok(scratch.iter().collect())
}
