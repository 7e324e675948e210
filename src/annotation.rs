//! Annotation decoding: the recursive `element_value` grammar, the
//! `Runtime*TypeAnnotations` target codec (`target_type` / `target_info` /
//! `target_path`), and the primitive-array fast paths.

use std::rc::Rc;

use jni_sys::{jbyte, jchar, jdouble, jfloat, jint, jlong, jshort};

use crate::class::ClassReader;
use crate::error::{DecodeError, DecodeErrorKind, Result};
use crate::visitor::{AnnotationVisitor, Label, LabelTable};

/// A decoded scalar, string, class or primitive-array annotation element.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Byte(jbyte),
    Boolean(bool),
    Char(jchar),
    Short(jshort),
    Int(jint),
    Long(jlong),
    Float(jfloat),
    Double(jdouble),
    String(Rc<str>),
    /// A type descriptor (tag `c`).
    Class(Rc<str>),
    ByteArray(Vec<jbyte>),
    BooleanArray(Vec<bool>),
    CharArray(Vec<jchar>),
    ShortArray(Vec<jshort>),
    IntArray(Vec<jint>),
    LongArray(Vec<jlong>),
    FloatArray(Vec<jfloat>),
    DoubleArray(Vec<jdouble>),
}

// target_type values (JVMS table 4.7.20-A/B).
/// Masked reference to the annotated position in a type. The high byte is the
/// `target_type`; which of the remaining bytes survive depends on the target
/// shape (see the `MASK_*` constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRef(u32);

impl TypeRef {
    pub const CLASS_TYPE_PARAMETER: u8 = 0x00;
    pub const METHOD_TYPE_PARAMETER: u8 = 0x01;
    pub const CLASS_EXTENDS: u8 = 0x10;
    pub const CLASS_TYPE_PARAMETER_BOUND: u8 = 0x11;
    pub const METHOD_TYPE_PARAMETER_BOUND: u8 = 0x12;
    pub const FIELD: u8 = 0x13;
    pub const METHOD_RETURN: u8 = 0x14;
    pub const METHOD_RECEIVER: u8 = 0x15;
    pub const METHOD_FORMAL_PARAMETER: u8 = 0x16;
    pub const THROWS: u8 = 0x17;
    pub const LOCAL_VARIABLE: u8 = 0x40;
    pub const RESOURCE_VARIABLE: u8 = 0x41;
    pub const EXCEPTION_PARAMETER: u8 = 0x42;
    pub const INSTANCEOF: u8 = 0x43;
    pub const NEW: u8 = 0x44;
    pub const CONSTRUCTOR_REFERENCE: u8 = 0x45;
    pub const METHOD_REFERENCE: u8 = 0x46;
    pub const CAST: u8 = 0x47;
    pub const CONSTRUCTOR_INVOCATION_TYPE_ARGUMENT: u8 = 0x48;
    pub const METHOD_INVOCATION_TYPE_ARGUMENT: u8 = 0x49;
    pub const CONSTRUCTOR_REFERENCE_TYPE_ARGUMENT: u8 = 0x4a;
    pub const METHOD_REFERENCE_TYPE_ARGUMENT: u8 = 0x4b;

    pub(crate) fn new(raw: u32) -> Self {
        TypeRef(raw)
    }

    /// The raw masked 32-bit value.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The `target_type` byte.
    pub fn sort(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// For `*_TYPE_PARAMETER` and `METHOD_FORMAL_PARAMETER` targets.
    pub fn parameter_index(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// For `*_TYPE_PARAMETER_BOUND` targets.
    pub fn bound_index(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// For `CLASS_EXTENDS`: 65535 designates the superclass, anything else an
    /// index into the interfaces array.
    pub fn supertype_index(self) -> u16 {
        (self.0 >> 8) as u16
    }

    /// For `THROWS` targets.
    pub fn exception_index(self) -> u16 {
        (self.0 >> 8) as u16
    }

    /// For `EXCEPTION_PARAMETER` targets.
    pub fn try_catch_block_index(self) -> u16 {
        (self.0 >> 8) as u16
    }

    /// For `*_TYPE_ARGUMENT` targets.
    pub fn type_argument_index(self) -> u8 {
        self.0 as u8
    }
}

/// Keeps `target_type` plus the one-byte parameter index in the second byte
/// (`type_parameter_target`, `formal_parameter_target`).
const MASK_TYPE_AND_PARAMETER: u32 = 0xFFFF_0000;
/// Keeps `target_type` plus a two-byte index shifted into bytes 1-2
/// (`supertype_target`, `type_parameter_bound_target` (u1+u1),
/// `throws_target`, `catch_target`).
const MASK_TYPE_AND_INDEX: u32 = 0xFFFF_FF00;
/// Keeps only `target_type` (`empty_target`, `localvar_target`,
/// `offset_target`; the bytecode offset is delivered positionally, not in the
/// reference).
const MASK_TYPE_ONLY: u32 = 0xFF00_0000;
/// Keeps `target_type` and the trailing type-argument index
/// (`type_argument_target`; the two offset bytes in between are dropped).
const MASK_TYPE_AND_ARGUMENT: u32 = 0xFF00_00FF;

/// Steps of a `type_path`, locating the annotated part within a compound
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePathStep {
    ArrayElement,
    InnerType,
    WildcardBound,
    TypeArgument(u8),
}

/// A decoded `type_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePath {
    steps: Vec<(u8, u8)>,
}

impl TypePath {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> TypePathStep {
        match self.steps[index] {
            (0, _) => TypePathStep::ArrayElement,
            (1, _) => TypePathStep::InnerType,
            (2, _) => TypePathStep::WildcardBound,
            (_, argument) => TypePathStep::TypeArgument(argument),
        }
    }
}

/// `localvar_target` ranges materialized as label pairs.
pub(crate) struct LocalVarTarget {
    pub start: Vec<Label>,
    pub end: Vec<Label>,
    pub index: Vec<u16>,
}

/// A parsed `target_type`/`target_info`/`target_path` prefix. `next` is the
/// offset of the annotation's type descriptor.
pub(crate) struct TypeAnnotationTarget {
    pub type_ref: TypeRef,
    pub type_path: Option<TypePath>,
    pub local_var: Option<LocalVarTarget>,
    pub next: usize,
}

/// Parse the target of one type annotation starting at `at`. `labels` is the
/// current method's label table when decoding inside a `Code` attribute;
/// in-code targets found without one fail with `BadTypeAnnotationTarget`.
pub(crate) fn read_type_annotation_target(
    reader: &ClassReader,
    at: usize,
    mut labels: Option<&mut LabelTable>,
) -> Result<TypeAnnotationTarget> {
    let cur = reader.cur();
    let raw = cur.u32(at)?;
    let target_type = (raw >> 24) as u8;
    let mut local_var = None;

    let (masked, mut offset) = match target_type {
        TypeRef::CLASS_TYPE_PARAMETER
        | TypeRef::METHOD_TYPE_PARAMETER
        | TypeRef::METHOD_FORMAL_PARAMETER => (raw & MASK_TYPE_AND_PARAMETER, at + 2),
        TypeRef::FIELD | TypeRef::METHOD_RETURN | TypeRef::METHOD_RECEIVER => {
            (raw & MASK_TYPE_ONLY, at + 1)
        }
        TypeRef::CLASS_EXTENDS
        | TypeRef::CLASS_TYPE_PARAMETER_BOUND
        | TypeRef::METHOD_TYPE_PARAMETER_BOUND
        | TypeRef::THROWS => (raw & MASK_TYPE_AND_INDEX, at + 3),
        TypeRef::EXCEPTION_PARAMETER => {
            let labels_present = labels.is_some();
            if !labels_present {
                return Err(DecodeError::new(
                    at,
                    DecodeErrorKind::BadTypeAnnotationTarget(target_type),
                ));
            }
            (raw & MASK_TYPE_AND_INDEX, at + 3)
        }
        TypeRef::LOCAL_VARIABLE | TypeRef::RESOURCE_VARIABLE => {
            let labels = labels.as_deref_mut().ok_or_else(|| {
                DecodeError::new(at, DecodeErrorKind::BadTypeAnnotationTarget(target_type))
            })?;

            let table_length = cur.u16(at + 1)?;
            let mut target = LocalVarTarget {
                start: Vec::with_capacity(table_length as usize),
                end: Vec::with_capacity(table_length as usize),
                index: Vec::with_capacity(table_length as usize),
            };

            let mut entry = at + 3;
            for _ in 0..table_length {
                let start_pc = cur.u16(entry)?;
                let length = cur.u16(entry + 2)?;
                let start = labels.create(u32::from(start_pc)).ok_or_else(|| {
                    DecodeError::new(entry, DecodeErrorKind::TruncatedInput)
                })?;
                let end = labels
                    .create(u32::from(start_pc) + u32::from(length))
                    .ok_or_else(|| DecodeError::new(entry, DecodeErrorKind::TruncatedInput))?;
                target.start.push(start);
                target.end.push(end);
                target.index.push(cur.u16(entry + 4)?);
                entry += 6;
            }

            local_var = Some(target);
            (raw & MASK_TYPE_ONLY, entry)
        }
        TypeRef::INSTANCEOF
        | TypeRef::NEW
        | TypeRef::CONSTRUCTOR_REFERENCE
        | TypeRef::METHOD_REFERENCE => {
            if labels.is_none() {
                return Err(DecodeError::new(
                    at,
                    DecodeErrorKind::BadTypeAnnotationTarget(target_type),
                ));
            }
            (raw & MASK_TYPE_ONLY, at + 3)
        }
        TypeRef::CAST
        | TypeRef::CONSTRUCTOR_INVOCATION_TYPE_ARGUMENT
        | TypeRef::METHOD_INVOCATION_TYPE_ARGUMENT
        | TypeRef::CONSTRUCTOR_REFERENCE_TYPE_ARGUMENT
        | TypeRef::METHOD_REFERENCE_TYPE_ARGUMENT => {
            if labels.is_none() {
                return Err(DecodeError::new(
                    at,
                    DecodeErrorKind::BadTypeAnnotationTarget(target_type),
                ));
            }
            (raw & MASK_TYPE_AND_ARGUMENT, at + 4)
        }
        x => {
            return Err(DecodeError::new(
                at,
                DecodeErrorKind::BadTypeAnnotationTarget(x),
            ))
        }
    };

    // target_path
    let path_length = cur.u8(offset)?;
    offset += 1;
    let type_path = if path_length == 0 {
        None
    } else {
        let mut steps = Vec::with_capacity(path_length as usize);
        for _ in 0..path_length {
            steps.push((cur.u8(offset)?, cur.u8(offset + 1)?));
            offset += 2;
        }
        Some(TypePath { steps })
    };

    Ok(TypeAnnotationTarget {
        type_ref: TypeRef::new(masked),
        type_path,
        local_var,
        next: offset,
    })
}

/// For in-code targets, the bytecode offset the annotation applies to.
pub(crate) fn type_annotation_bytecode_offset(
    reader: &ClassReader,
    annotation_offset: usize,
) -> Result<Option<u32>> {
    let cur = reader.cur();
    let target_type = cur.u8(annotation_offset)?;
    Ok(match target_type {
        TypeRef::INSTANCEOF
        | TypeRef::NEW
        | TypeRef::CONSTRUCTOR_REFERENCE
        | TypeRef::METHOD_REFERENCE
        | TypeRef::CAST
        | TypeRef::CONSTRUCTOR_INVOCATION_TYPE_ARGUMENT
        | TypeRef::METHOD_INVOCATION_TYPE_ARGUMENT
        | TypeRef::CONSTRUCTOR_REFERENCE_TYPE_ARGUMENT
        | TypeRef::METHOD_REFERENCE_TYPE_ARGUMENT => {
            Some(u32::from(cur.u16(annotation_offset + 1)?))
        }
        _ => None,
    })
}

/// Read `num_element_value_pairs` (or plain values when `named` is false)
/// and drive `visitor`; always returns the offset just past the structure,
/// with or without a visitor.
pub(crate) fn read_element_values<'a>(
    reader: &ClassReader,
    at: usize,
    named: bool,
    mut visitor: Option<&mut (dyn AnnotationVisitor + 'a)>,
) -> Result<usize> {
    let cur = reader.cur();
    let mut count = cur.u16(at)?;
    let mut offset = at + 2;

    while count > 0 {
        if named {
            let name = reader.pool().utf8(cur, cur.u16(offset)?, offset)?;
            offset = read_element_value(reader, offset + 2, Some(&name), visitor.as_deref_mut())?;
        } else {
            offset = read_element_value(reader, offset, None, visitor.as_deref_mut())?;
        }
        count -= 1;
    }

    if let Some(visitor) = visitor {
        visitor.visit_end();
    }
    Ok(offset)
}

/// Decode a single `element_value`; returns the offset just past it.
pub(crate) fn read_element_value<'a>(
    reader: &ClassReader,
    at: usize,
    name: Option<&str>,
    visitor: Option<&mut (dyn AnnotationVisitor + 'a)>,
) -> Result<usize> {
    let cur = reader.cur();
    let pool = reader.pool();
    let tag = cur.u8(at)?;
    let offset = at + 1;

    let visitor = match visitor {
        Some(v) => v,
        None => {
            // No visitor: advance over the full structural size only.
            return match tag {
                b'e' => Ok(offset + 4),
                b'@' => read_element_values(reader, offset + 2, true, None),
                b'[' => read_element_values(reader, offset, false, None),
                b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
                    Ok(offset + 2)
                }
                x => Err(DecodeError::new(at, DecodeErrorKind::BadAnnotationValueTag(x))),
            };
        }
    };

    match tag {
        b'B' => {
            let v = pool.integer(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Byte(v as jbyte));
            Ok(offset + 2)
        }
        b'C' => {
            let v = pool.integer(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Char(v as jchar));
            Ok(offset + 2)
        }
        b'S' => {
            let v = pool.integer(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Short(v as jshort));
            Ok(offset + 2)
        }
        b'Z' => {
            let v = pool.integer(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Boolean(v != 0));
            Ok(offset + 2)
        }
        b'I' => {
            let v = pool.integer(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Int(v));
            Ok(offset + 2)
        }
        b'J' => {
            let v = pool.long(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Long(v));
            Ok(offset + 2)
        }
        b'F' => {
            let v = pool.float(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Float(v));
            Ok(offset + 2)
        }
        b'D' => {
            let v = pool.double(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Double(v));
            Ok(offset + 2)
        }
        b's' => {
            let v = pool.utf8(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::String(v));
            Ok(offset + 2)
        }
        b'c' => {
            let v = pool.utf8(cur, cur.u16(offset)?, offset)?;
            visitor.visit(name, &AnnotationValue::Class(v));
            Ok(offset + 2)
        }
        b'e' => {
            let descriptor = pool.utf8(cur, cur.u16(offset)?, offset)?;
            let value = pool.utf8(cur, cur.u16(offset + 2)?, offset + 2)?;
            visitor.visit_enum(name, &descriptor, &value);
            Ok(offset + 4)
        }
        b'@' => {
            let descriptor = pool.utf8(cur, cur.u16(offset)?, offset)?;
            let nested = visitor.visit_annotation(name, &descriptor);
            read_element_values(reader, offset + 2, true, nested)
        }
        b'[' => {
            let num_values = cur.u16(offset)?;
            if num_values == 0 {
                return read_element_values(reader, offset, false, visitor.visit_array(name));
            }

            // Dispatch on the first element's tag: primitive arrays get one
            // event carrying the whole array.
            match cur.u8(offset + 2)? {
                b'B' => {
                    let v = read_scalar_array(reader, offset, |i| Ok(i as jbyte))?;
                    visitor.visit(name, &AnnotationValue::ByteArray(v.0));
                    Ok(v.1)
                }
                b'Z' => {
                    let v = read_scalar_array(reader, offset, |i| Ok(i != 0))?;
                    visitor.visit(name, &AnnotationValue::BooleanArray(v.0));
                    Ok(v.1)
                }
                b'S' => {
                    let v = read_scalar_array(reader, offset, |i| Ok(i as jshort))?;
                    visitor.visit(name, &AnnotationValue::ShortArray(v.0));
                    Ok(v.1)
                }
                b'C' => {
                    let v = read_scalar_array(reader, offset, |i| Ok(i as jchar))?;
                    visitor.visit(name, &AnnotationValue::CharArray(v.0));
                    Ok(v.1)
                }
                b'I' => {
                    let v = read_scalar_array(reader, offset, Ok)?;
                    visitor.visit(name, &AnnotationValue::IntArray(v.0));
                    Ok(v.1)
                }
                b'J' => {
                    let (values, end) = read_const_array(reader, offset, |p, c, i, a| {
                        p.long(c, i, a)
                    })?;
                    visitor.visit(name, &AnnotationValue::LongArray(values));
                    Ok(end)
                }
                b'F' => {
                    let (values, end) = read_const_array(reader, offset, |p, c, i, a| {
                        p.float(c, i, a)
                    })?;
                    visitor.visit(name, &AnnotationValue::FloatArray(values));
                    Ok(end)
                }
                b'D' => {
                    let (values, end) = read_const_array(reader, offset, |p, c, i, a| {
                        p.double(c, i, a)
                    })?;
                    visitor.visit(name, &AnnotationValue::DoubleArray(values));
                    Ok(end)
                }
                _ => read_element_values(reader, offset, false, visitor.visit_array(name)),
            }
        }
        x => Err(DecodeError::new(at, DecodeErrorKind::BadAnnotationValueTag(x))),
    }
}

/// Read a `num_values`-prefixed array of `CONSTANT_Integer`-backed elements
/// starting at the count; each element is a tag byte plus a pool index.
fn read_scalar_array<T>(
    reader: &ClassReader,
    at: usize,
    convert: fn(jint) -> Result<T>,
) -> Result<(Vec<T>, usize)> {
    let cur = reader.cur();
    let pool = reader.pool();
    let num_values = cur.u16(at)?;
    let mut offset = at + 2;
    let mut values = Vec::with_capacity(num_values as usize);
    for _ in 0..num_values {
        let index = cur.u16(offset + 1)?;
        values.push(convert(pool.integer(cur, index, offset + 1)?)?);
        offset += 3;
    }
    Ok((values, offset))
}

/// Same framing as [`read_scalar_array`] for the `long`/`float`/`double`
/// element kinds, resolved through the given pool accessor.
fn read_const_array<T>(
    reader: &ClassReader,
    at: usize,
    resolve: impl Fn(&crate::constant::ConstantPool, crate::read::ByteCursor<'_>, u16, usize) -> Result<T>,
) -> Result<(Vec<T>, usize)> {
    let cur = reader.cur();
    let pool = reader.pool();
    let num_values = cur.u16(at)?;
    let mut offset = at + 2;
    let mut values = Vec::with_capacity(num_values as usize);
    for _ in 0..num_values {
        let index = cur.u16(offset + 1)?;
        values.push(resolve(pool, cur, index, offset + 1)?);
        offset += 3;
    }
    Ok((values, offset))
}
