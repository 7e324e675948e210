//! Incremental `StackMapTable` / legacy `StackMap` decoding.
//!
//! One frame is consumed per call, updating the running [`FrameState`]. The
//! uniform offset rule: the state starts at the -1 sentinel and every frame
//! adds `offset_delta + 1`, so the first explicit frame lands at its raw
//! `offset_delta` and duplicates are impossible by construction.

use std::rc::Rc;

use crate::class::{AccessFlags, ClassReader};
use crate::error::{DecodeError, DecodeErrorKind, Result};
use crate::visitor::{LabelTable, MethodVisitor};

const ITEM_TOP: u8 = 0;
const ITEM_INTEGER: u8 = 1;
const ITEM_FLOAT: u8 = 2;
const ITEM_DOUBLE: u8 = 3;
const ITEM_LONG: u8 = 4;
const ITEM_NULL: u8 = 5;
const ITEM_UNINITIALIZED_THIS: u8 = 6;
const ITEM_OBJECT: u8 = 7;
pub(crate) const ITEM_UNINITIALIZED: u8 = 8;

/// The runtime category of one local or operand stack slot, as seen by the
/// verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// An initialized reference; carries the internal class name.
    Object(Rc<str>),
    /// A `new` result before its constructor ran; carries the label of the
    /// originating `new` instruction.
    Uninitialized(crate::visitor::Label),
}

/// Shape of a frame passed to `visit_frame`, determining which slices carry
/// payload:
///
/// * `New` — expanded frame; complete locals and stack.
/// * `Full` — compressed `full_frame`; complete locals and stack.
/// * `Append` — only the appended locals.
/// * `Chop(k)` — `k` locals removed; both slices empty.
/// * `Same` / `SameLocals1StackItem` — empty locals; zero or one stack entry.
/// * `Insert` — synthesized frame at an expanded-branch insertion point; both
///   slices empty, a downstream frame computation fills it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    New,
    Full,
    Append,
    Chop(u8),
    Same,
    SameLocals1StackItem,
    Insert,
}

/// Running state of the incremental walk.
pub(crate) struct FrameState {
    /// Bytecode offset of the most recently decoded frame; -1 until the
    /// first explicit frame is read.
    pub offset: i32,
    pub kind: FrameKind,
    /// Entries appended by the last `Append` frame.
    pub appended: usize,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

impl FrameState {
    pub fn new() -> Self {
        FrameState {
            offset: -1,
            kind: FrameKind::Same,
            appended: 0,
            locals: Vec::new(),
            stack: Vec::new(),
        }
    }
}

/// Synthesize the implicit entry frame from the method descriptor: receiver
/// first (`UninitializedThis` inside a constructor), then one entry per
/// parameter, with `Top` after each `Long`/`Double` to preserve the two slot
/// layout.
pub(crate) fn compute_implicit_frame(
    access: AccessFlags,
    method_name: &str,
    descriptor: &str,
    owner: &Rc<str>,
    state: &mut FrameState,
) {
    state.locals.clear();
    state.stack.clear();

    if !access.contains(AccessFlags::STATIC) {
        if method_name == "<init>" {
            state.locals.push(VerificationType::UninitializedThis);
        } else {
            state.locals.push(VerificationType::Object(owner.clone()));
        }
    }

    let bytes = descriptor.as_bytes();
    let mut i = 1; // past '('
    while i < bytes.len() && bytes[i] != b')' {
        let start = i;
        match bytes[i] {
            b'B' | b'C' | b'I' | b'S' | b'Z' => {
                state.locals.push(VerificationType::Integer);
                i += 1;
            }
            b'F' => {
                state.locals.push(VerificationType::Float);
                i += 1;
            }
            b'J' => {
                state.locals.push(VerificationType::Long);
                state.locals.push(VerificationType::Top);
                i += 1;
            }
            b'D' => {
                state.locals.push(VerificationType::Double);
                state.locals.push(VerificationType::Top);
                i += 1;
            }
            b'L' => {
                while i < bytes.len() && bytes[i] != b';' {
                    i += 1;
                }
                i += 1;
                // Internal name without the L; wrapper.
                let name = &descriptor[start + 1..i - 1];
                state.locals.push(VerificationType::Object(name.into()));
            }
            b'[' => {
                while i < bytes.len() && bytes[i] == b'[' {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'L' {
                    while i < bytes.len() && bytes[i] != b';' {
                        i += 1;
                    }
                }
                i += 1;
                // Array types keep their full descriptor as the name.
                let name = &descriptor[start..i.min(descriptor.len())];
                state.locals.push(VerificationType::Object(name.into()));
            }
            _ => break,
        }
    }
}

/// Read one `verification_type_info`; returns the type and the offset just
/// past it. `Uninitialized` entries intern a label at the referenced offset.
pub(crate) fn read_verification_type(
    reader: &ClassReader,
    at: usize,
    labels: &mut LabelTable,
) -> Result<(VerificationType, usize)> {
    let cur = reader.cur();
    let tag = cur.u8(at)?;
    Ok(match tag {
        ITEM_TOP => (VerificationType::Top, at + 1),
        ITEM_INTEGER => (VerificationType::Integer, at + 1),
        ITEM_FLOAT => (VerificationType::Float, at + 1),
        ITEM_DOUBLE => (VerificationType::Double, at + 1),
        ITEM_LONG => (VerificationType::Long, at + 1),
        ITEM_NULL => (VerificationType::Null, at + 1),
        ITEM_UNINITIALIZED_THIS => (VerificationType::UninitializedThis, at + 1),
        ITEM_OBJECT => {
            let name = reader.pool().class_name(cur, cur.u16(at + 1)?, at + 1)?;
            (VerificationType::Object(name), at + 3)
        }
        ITEM_UNINITIALIZED => {
            let offset = cur.u16(at + 1)?;
            let label = labels
                .create(u32::from(offset))
                .ok_or_else(|| DecodeError::new(at + 1, DecodeErrorKind::BadFrameType(tag)))?;
            (VerificationType::Uninitialized(label), at + 3)
        }
        x => return Err(DecodeError::new(at, DecodeErrorKind::BadFrameType(x))),
    })
}

/// Decode one stack map frame starting at `at`, updating `state` and
/// interning a label at the materialized offset. Returns the offset just past
/// the frame. `legacy` frames (the pre-50.0 `StackMap` attribute) have no
/// `frame_type` byte and are always full frames.
pub(crate) fn read_frame(
    reader: &ClassReader,
    at: usize,
    legacy: bool,
    code_length: u32,
    labels: &mut LabelTable,
    state: &mut FrameState,
) -> Result<usize> {
    let cur = reader.cur();
    let frame_start = at;
    let mut offset = at;
    let offset_delta;

    if legacy {
        offset_delta = cur.u16(offset)?;
        offset += 2;
        state.kind = FrameKind::Full;
        offset = read_full_frame_types(reader, offset, labels, state)?;
    } else {
        let frame_type = cur.u8(offset)?;
        offset += 1;
        match frame_type {
            0..=63 => {
                offset_delta = u16::from(frame_type);
                state.kind = FrameKind::Same;
                state.stack.clear();
            }
            64..=127 => {
                offset_delta = u16::from(frame_type - 64);
                state.kind = FrameKind::SameLocals1StackItem;
                state.stack.clear();
                let (ty, next) = read_verification_type(reader, offset, labels)?;
                state.stack.push(ty);
                offset = next;
            }
            128..=246 => {
                // Reserved for future use.
                return Err(DecodeError::new(
                    frame_start,
                    DecodeErrorKind::BadFrameType(frame_type),
                ));
            }
            247 => {
                offset_delta = cur.u16(offset)?;
                offset += 2;
                state.kind = FrameKind::SameLocals1StackItem;
                state.stack.clear();
                let (ty, next) = read_verification_type(reader, offset, labels)?;
                state.stack.push(ty);
                offset = next;
            }
            248..=250 => {
                offset_delta = cur.u16(offset)?;
                offset += 2;
                let chopped = 251 - frame_type;
                state.kind = FrameKind::Chop(chopped);
                state.stack.clear();
                let keep = state.locals.len().saturating_sub(usize::from(chopped));
                state.locals.truncate(keep);
            }
            251 => {
                offset_delta = cur.u16(offset)?;
                offset += 2;
                state.kind = FrameKind::Same;
                state.stack.clear();
            }
            252..=254 => {
                offset_delta = cur.u16(offset)?;
                offset += 2;
                let appended = usize::from(frame_type - 251);
                state.kind = FrameKind::Append;
                state.appended = appended;
                state.stack.clear();
                for _ in 0..appended {
                    let (ty, next) = read_verification_type(reader, offset, labels)?;
                    state.locals.push(ty);
                    offset = next;
                }
            }
            255 => {
                offset_delta = cur.u16(offset)?;
                offset += 2;
                state.kind = FrameKind::Full;
                offset = read_full_frame_types(reader, offset, labels, state)?;
            }
        }
    }

    state.offset += i32::from(offset_delta) + 1;
    if state.offset < 0 || state.offset as u32 > code_length {
        // Covers the legacy walker's sortedness assumption: a frame whose
        // accumulated offset leaves the code array is malformed.
        return Err(DecodeError::new(
            frame_start,
            DecodeErrorKind::BadFrameType(if legacy { 255 } else { cur.u8(frame_start)? }),
        ));
    }
    labels.create(state.offset as u32);

    Ok(offset)
}

fn read_full_frame_types(
    reader: &ClassReader,
    at: usize,
    labels: &mut LabelTable,
    state: &mut FrameState,
) -> Result<usize> {
    let cur = reader.cur();
    let mut offset = at;

    let num_local = cur.u16(offset)?;
    offset += 2;
    state.locals.clear();
    for _ in 0..num_local {
        let (ty, next) = read_verification_type(reader, offset, labels)?;
        state.locals.push(ty);
        offset = next;
    }

    let num_stack = cur.u16(offset)?;
    offset += 2;
    state.stack.clear();
    for _ in 0..num_stack {
        let (ty, next) = read_verification_type(reader, offset, labels)?;
        state.stack.push(ty);
        offset = next;
    }

    Ok(offset)
}

/// Emit the current frame, expanded or compressed per the caller's choice.
pub(crate) fn emit_frame(visitor: &mut dyn MethodVisitor, state: &FrameState, expand: bool) {
    if expand {
        visitor.visit_frame(FrameKind::New, &state.locals, &state.stack);
        return;
    }

    match state.kind {
        FrameKind::Same => visitor.visit_frame(FrameKind::Same, &[], &[]),
        FrameKind::SameLocals1StackItem => {
            visitor.visit_frame(FrameKind::SameLocals1StackItem, &[], &state.stack)
        }
        FrameKind::Chop(k) => visitor.visit_frame(FrameKind::Chop(k), &[], &[]),
        FrameKind::Append => {
            let start = state.locals.len() - state.appended.min(state.locals.len());
            visitor.visit_frame(FrameKind::Append, &state.locals[start..], &[])
        }
        FrameKind::Full | FrameKind::New => {
            visitor.visit_frame(FrameKind::Full, &state.locals, &state.stack)
        }
        FrameKind::Insert => visitor.visit_frame(FrameKind::Insert, &[], &[]),
    }
}
