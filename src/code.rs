//! The `Code` attribute decoder.
//!
//! Two passes over the instruction array: pass 1 discovers every branch,
//! switch, exception table and frame offset and interns labels for them;
//! pass 2 re-walks the array emitting instruction events with labels
//! resolved, interleaved with label, line number, frame and instruction
//! annotation events at the right offsets.

use crate::annotation::{self, TypeRef};
use crate::attribute::{Attribute, AttributePrototype};
use crate::class::{ClassReader, Context};
use crate::constant::CONSTANT_INVOKE_DYNAMIC;
use crate::error::{DecodeError, DecodeErrorKind, Result};
use crate::frame::{self, FrameKind, FrameState};
use crate::opcodes::*;
use crate::visitor::{Label, LabelTable, MethodVisitor};

/// The recorded `StackMapTable`/`StackMap` span: offset of the first frame,
/// number of frames, end of the attribute, legacy flag.
struct StackMapSpan {
    first_frame: usize,
    count: u16,
    end: usize,
    legacy: bool,
}

/// Intern a non-debug label at `base + delta`, failing when the target lies
/// outside the code array.
fn branch_target(labels: &mut LabelTable, base: u32, delta: i64, at: usize) -> Result<Label> {
    let target = i64::from(base) + delta;
    if target < 0 {
        return Err(DecodeError::new(at, DecodeErrorKind::TruncatedInput));
    }
    labels
        .create(target as u32)
        .ok_or_else(|| DecodeError::new(at, DecodeErrorKind::TruncatedInput))
}

/// Resolve a label pass 1 is guaranteed to have interned.
fn label_at(labels: &LabelTable, base: u32, delta: i64, at: usize) -> Result<Label> {
    let target = i64::from(base) + delta;
    if target < 0 {
        return Err(DecodeError::new(at, DecodeErrorKind::TruncatedInput));
    }
    labels
        .get(target as u32)
        .ok_or_else(|| DecodeError::new(at, DecodeErrorKind::TruncatedInput))
}

pub(crate) fn read_code(
    reader: &ClassReader,
    visitor: &mut dyn MethodVisitor,
    prototypes: &[&dyn AttributePrototype],
    context: &mut Context,
    at: usize,
) -> Result<()> {
    let cur = reader.cur();
    let pool = reader.pool();
    let options = context.options;

    let max_stack = cur.u16(at)?;
    let max_locals = cur.u16(at + 2)?;
    let code_length = cur.u32(at + 4)?;
    // The code array must fit in the remaining buffer.
    cur.bytes(at + 8, code_length as usize)?;

    let code_start = at + 8;
    let code_end = code_start + code_length as usize;
    let mut labels = LabelTable::with_code_length(code_length as usize);

    // Pass 1: label discovery.
    let mut offset = code_start;
    while offset < code_end {
        let bytecode_offset = (offset - code_start) as u32;
        let opcode = cur.u8(offset)?;

        offset += match opcode {
            NOP..=DCONST_1
            | ILOAD_0..=SALOAD
            | ISTORE_0..=SASTORE
            | POP..=LXOR
            | I2L..=DCMPG
            | IRETURN..=RETURN
            | ARRAYLENGTH
            | ATHROW
            | MONITORENTER
            | MONITOREXIT => 1,
            BIPUSH | LDC | ILOAD..=ALOAD | ISTORE..=ASTORE | RET | NEWARRAY => 2,
            SIPUSH
            | LDC_W
            | LDC2_W
            | GETSTATIC..=INVOKESTATIC
            | NEW
            | ANEWARRAY
            | CHECKCAST
            | INSTANCEOF
            | IINC => 3,
            IFEQ..=JSR | IFNULL | IFNONNULL => {
                let delta = cur.i16(offset + 1)?;
                branch_target(&mut labels, bytecode_offset, i64::from(delta), offset + 1)?;
                3
            }
            GOTO_W | JSR_W | EXT_GOTO_W => {
                let delta = cur.i32(offset + 1)?;
                branch_target(&mut labels, bytecode_offset, i64::from(delta), offset + 1)?;
                5
            }
            EXT_IFEQ..=EXT_IFNONNULL => {
                // Extended-offset forms carry an unsigned 16-bit offset.
                let delta = cur.u16(offset + 1)?;
                branch_target(&mut labels, bytecode_offset, i64::from(delta), offset + 1)?;
                3
            }
            TABLESWITCH => {
                // Skip 0-3 alignment padding bytes.
                let table = offset + 4 - (bytecode_offset as usize & 3);
                branch_target(&mut labels, bytecode_offset, i64::from(cur.i32(table)?), table)?;
                let low = cur.i32(table + 4)?;
                let high = cur.i32(table + 8)?;
                if high < low {
                    return Err(DecodeError::new(table + 4, DecodeErrorKind::BadOpcode(opcode)));
                }
                let cases = (high - low + 1) as usize;
                for case in 0..cases {
                    let case_offset = table + 12 + 4 * case;
                    branch_target(
                        &mut labels,
                        bytecode_offset,
                        i64::from(cur.i32(case_offset)?),
                        case_offset,
                    )?;
                }
                table + 12 + 4 * cases - offset
            }
            LOOKUPSWITCH => {
                let table = offset + 4 - (bytecode_offset as usize & 3);
                branch_target(&mut labels, bytecode_offset, i64::from(cur.i32(table)?), table)?;
                let pair_count = cur.i32(table + 4)?;
                if pair_count < 0 {
                    return Err(DecodeError::new(table + 4, DecodeErrorKind::BadOpcode(opcode)));
                }
                let pairs = pair_count as usize;
                for pair in 0..pairs {
                    let pair_offset = table + 8 + 8 * pair + 4;
                    branch_target(
                        &mut labels,
                        bytecode_offset,
                        i64::from(cur.i32(pair_offset)?),
                        pair_offset,
                    )?;
                }
                table + 8 + 8 * pairs - offset
            }
            WIDE => match cur.u8(offset + 1)? {
                ILOAD..=ALOAD | ISTORE..=ASTORE | RET => 4,
                IINC => 6,
                x => return Err(DecodeError::new(offset + 1, DecodeErrorKind::BadOpcode(x))),
            },
            INVOKEINTERFACE | INVOKEDYNAMIC => 5,
            MULTIANEWARRAY => 4,
            x => return Err(DecodeError::new(offset, DecodeErrorKind::BadOpcode(x))),
        };
    }

    // Exception table: labels first, then the try-catch events themselves.
    let mut exception_count = cur.u16(code_end)?;
    let mut offset = code_end + 2;
    while exception_count > 0 {
        let start = u32::from(cur.u16(offset)?);
        let end = u32::from(cur.u16(offset + 2)?);
        let handler = u32::from(cur.u16(offset + 4)?);
        let truncated = || DecodeError::new(offset, DecodeErrorKind::TruncatedInput);
        let start = labels.create(start).ok_or_else(truncated)?;
        let end = labels.create(end).ok_or_else(truncated)?;
        let handler = labels.create(handler).ok_or_else(truncated)?;
        let catch_type = match cur.u16(offset + 6)? {
            0 => None,
            index => Some(pool.class_name(cur, index, offset + 6)?),
        };
        visitor.visit_try_catch_block(start, end, handler, catch_type.as_deref());
        offset += 8;
        exception_count -= 1;
    }

    // Code attribute table.
    let mut stack_map: Option<StackMapSpan> = None;
    let mut local_variable_table = None;
    let mut local_variable_type_table = None;
    let mut visible_type_annotations: Vec<usize> = Vec::new();
    let mut invisible_type_annotations: Vec<usize> = Vec::new();
    let mut code_attributes: Vec<Attribute> = Vec::new();

    let mut attribute_count = cur.u16(offset)?;
    offset += 2;
    while attribute_count > 0 {
        let name = pool.utf8(cur, cur.u16(offset)?, offset)?;
        let length = cur.u32(offset + 2)? as usize;
        let payload = offset + 6;
        cur.bytes(payload, length)?;

        match &*name {
            "LocalVariableTable" => {
                if !options.skip_debug() {
                    local_variable_table = Some(payload);
                    let mut entry_count = cur.u16(payload)?;
                    let mut entry = payload + 2;
                    while entry_count > 0 {
                        let start_pc = u32::from(cur.u16(entry)?);
                        let range = u32::from(cur.u16(entry + 2)?);
                        let truncated =
                            || DecodeError::new(entry, DecodeErrorKind::TruncatedInput);
                        labels.create_debug(start_pc).ok_or_else(truncated)?;
                        labels.create_debug(start_pc + range).ok_or_else(truncated)?;
                        entry += 10;
                        entry_count -= 1;
                    }
                }
            }
            "LocalVariableTypeTable" => local_variable_type_table = Some(payload),
            "LineNumberTable" => {
                if !options.skip_debug() {
                    let mut entry_count = cur.u16(payload)?;
                    let mut entry = payload + 2;
                    while entry_count > 0 {
                        let start_pc = u32::from(cur.u16(entry)?);
                        let line = cur.u16(entry + 2)?;
                        labels
                            .create_debug(start_pc)
                            .ok_or_else(|| DecodeError::new(entry, DecodeErrorKind::TruncatedInput))?;
                        labels.add_line(start_pc, line);
                        entry += 4;
                        entry_count -= 1;
                    }
                }
            }
            "RuntimeVisibleTypeAnnotations" => {
                visible_type_annotations =
                    read_code_type_annotations(reader, payload, &mut labels)?;
            }
            "RuntimeInvisibleTypeAnnotations" => {
                invisible_type_annotations =
                    read_code_type_annotations(reader, payload, &mut labels)?;
            }
            "StackMapTable" => {
                if !options.skip_frames() {
                    stack_map = Some(StackMapSpan {
                        first_frame: payload + 2,
                        count: cur.u16(payload)?,
                        end: payload + length,
                        legacy: false,
                    });
                }
            }
            "StackMap" => {
                if !options.skip_frames() {
                    stack_map = Some(StackMapSpan {
                        first_frame: payload + 2,
                        count: cur.u16(payload)?,
                        end: payload + length,
                        legacy: true,
                    });
                }
            }
            _ => code_attributes.push(reader.read_attribute(
                prototypes,
                &name,
                payload,
                length,
                Some(code_start),
                Some(&mut labels),
            )?),
        }

        offset = payload + length;
        attribute_count -= 1;
    }

    // Conservative scan of the frame table span for ITEM_Uninitialized
    // entries: any three-byte sequence whose tag byte is 8 and whose offset
    // lands on a `new` opcode gets a label. False positives only produce
    // unused labels; missing one would lose the label.
    if let Some(span) = &stack_map {
        let scan_end = span.end.saturating_sub(2);
        let mut scan = span.first_frame.saturating_sub(2);
        while scan < scan_end {
            if cur.u8(scan)? == frame::ITEM_UNINITIALIZED {
                let potential = cur.u16(scan + 1)?;
                if u32::from(potential) < code_length
                    && cur.u8(code_start + potential as usize)? == NEW
                {
                    labels.create(u32::from(potential));
                }
            }
            scan += 1;
        }
    }

    // Implicit entry frame, synthesized from the method descriptor.
    let mut frame_state = FrameState::new();
    let expand = options.expand_frames();
    if stack_map.is_some() && expand {
        let owner = reader.class_name()?;
        frame::compute_implicit_frame(
            context.method_access,
            &context.method_name,
            &context.method_descriptor,
            &owner,
            &mut frame_state,
        );
    }

    // Exception parameter annotations follow the try-catch blocks.
    for (annotation_offsets, visible) in [
        (&visible_type_annotations, true),
        (&invisible_type_annotations, false),
    ]
    .iter()
    {
        for &annotation_offset in annotation_offsets.iter() {
            if cur.u8(annotation_offset)? == TypeRef::EXCEPTION_PARAMETER {
                let target =
                    annotation::read_type_annotation_target(reader, annotation_offset, Some(&mut labels))?;
                let descriptor = pool.utf8(cur, cur.u16(target.next)?, target.next)?;
                let nested = visitor.visit_try_catch_annotation(
                    target.type_ref,
                    target.type_path.as_ref(),
                    &descriptor,
                    *visible,
                );
                annotation::read_element_values(reader, target.next + 2, true, nested)?;
            }
        }
    }

    // Pass 2: emit instructions with labels, frames and annotations resolved.
    let wide_jump_delta = if options.expand_internal() {
        0
    } else {
        WIDE_JUMP_DELTA
    };
    let mut frames_remaining = stack_map.as_ref().map(|s| s.count).unwrap_or(0);
    let mut frame_cursor = stack_map.as_ref().map(|s| s.first_frame).unwrap_or(0);
    let legacy_frames = stack_map.as_ref().map(|s| s.legacy).unwrap_or(false);
    let mut frames_active = stack_map.is_some();
    let mut insert_frame = false;
    let mut visible_index = 0usize;
    let mut invisible_index = 0usize;

    let mut offset = code_start;
    while offset < code_end {
        let bytecode_offset = (offset - code_start) as u32;

        if let Some(info) = labels.info(bytecode_offset) {
            let lines = info.lines.clone();
            visitor.visit_label(Label(bytecode_offset));
            if !options.skip_debug() {
                for line in lines {
                    visitor.visit_line_number(line, Label(bytecode_offset));
                }
            }
        }

        while frames_active
            && (frame_state.offset == bytecode_offset as i32 || frame_state.offset == -1)
        {
            if frame_state.offset != -1 {
                frame::emit_frame(visitor, &frame_state, expand);
            }
            if frames_remaining > 0 {
                frame_cursor = frame::read_frame(
                    reader,
                    frame_cursor,
                    legacy_frames,
                    code_length,
                    &mut labels,
                    &mut frame_state,
                )?;
                frames_remaining -= 1;
            } else {
                frames_active = false;
            }
        }

        if insert_frame {
            if !options.skip_frames() {
                visitor.visit_frame(FrameKind::Insert, &[], &[]);
            }
            insert_frame = false;
        }

        let opcode = cur.u8(offset)?;
        offset += match opcode {
            NOP..=DCONST_1
            | IALOAD..=SALOAD
            | IASTORE..=SASTORE
            | POP..=LXOR
            | I2L..=DCMPG
            | IRETURN..=RETURN
            | ARRAYLENGTH
            | ATHROW
            | MONITORENTER
            | MONITOREXIT => {
                visitor.visit_insn(opcode);
                1
            }
            ILOAD_0..=ALOAD_3 => {
                // Short form: normalize to the generic opcode plus index.
                let form = opcode - ILOAD_0;
                visitor.visit_var_insn(ILOAD + (form >> 2), u16::from(form & 0x3));
                1
            }
            ISTORE_0..=ASTORE_3 => {
                let form = opcode - ISTORE_0;
                visitor.visit_var_insn(ISTORE + (form >> 2), u16::from(form & 0x3));
                1
            }
            BIPUSH => {
                visitor.visit_int_insn(opcode, i32::from(cur.i8(offset + 1)?));
                2
            }
            SIPUSH => {
                visitor.visit_int_insn(opcode, i32::from(cur.i16(offset + 1)?));
                3
            }
            NEWARRAY => {
                visitor.visit_int_insn(opcode, i32::from(cur.u8(offset + 1)?));
                2
            }
            LDC => {
                let value = reader.read_const(u16::from(cur.u8(offset + 1)?))?;
                visitor.visit_ldc_insn(&value);
                2
            }
            LDC_W | LDC2_W => {
                let value = reader.read_const(cur.u16(offset + 1)?)?;
                visitor.visit_ldc_insn(&value);
                3
            }
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => {
                visitor.visit_var_insn(opcode, u16::from(cur.u8(offset + 1)?));
                2
            }
            IINC => {
                visitor.visit_iinc_insn(
                    u16::from(cur.u8(offset + 1)?),
                    i16::from(cur.i8(offset + 2)?),
                );
                3
            }
            IFEQ..=JSR | IFNULL | IFNONNULL => {
                let delta = cur.i16(offset + 1)?;
                let target = label_at(&labels, bytecode_offset, i64::from(delta), offset + 1)?;
                visitor.visit_jump_insn(opcode, target);
                3
            }
            GOTO_W | JSR_W => {
                let delta = cur.i32(offset + 1)?;
                let target = label_at(&labels, bytecode_offset, i64::from(delta), offset + 1)?;
                visitor.visit_jump_insn(opcode - wide_jump_delta, target);
                5
            }
            EXT_IFEQ..=EXT_IFNONNULL => {
                // Rewritten forward branch with an unsigned 16-bit offset.
                let standard = if opcode < EXT_IFNULL {
                    opcode - EXT_OPCODE_DELTA
                } else {
                    opcode - EXT_NULL_DELTA
                };
                let delta = cur.u16(offset + 1)?;
                let target = label_at(&labels, bytecode_offset, i64::from(delta), offset + 1)?;
                if standard == GOTO || standard == JSR {
                    visitor.visit_jump_insn(standard + WIDE_JUMP_DELTA, target);
                } else {
                    // Complementary condition: skip over a synthesized wide
                    // goto when the condition does not hold.
                    let inverted = if standard < GOTO {
                        ((standard + 1) ^ 1) - 1
                    } else {
                        standard ^ 1
                    };
                    let endif = labels.create(bytecode_offset + 3).ok_or_else(|| {
                        DecodeError::new(offset, DecodeErrorKind::TruncatedInput)
                    })?;
                    visitor.visit_jump_insn(inverted, endif);
                    visitor.visit_jump_insn(GOTO_W, target);
                    insert_frame = true;
                }
                3
            }
            EXT_GOTO_W => {
                let delta = cur.i32(offset + 1)?;
                let target = label_at(&labels, bytecode_offset, i64::from(delta), offset + 1)?;
                visitor.visit_jump_insn(GOTO_W, target);
                insert_frame = true;
                5
            }
            WIDE => match cur.u8(offset + 1)? {
                IINC => {
                    visitor.visit_iinc_insn(cur.u16(offset + 2)?, cur.i16(offset + 4)?);
                    6
                }
                wide_opcode => {
                    visitor.visit_var_insn(wide_opcode, cur.u16(offset + 2)?);
                    4
                }
            },
            TABLESWITCH => {
                let table = offset + 4 - (bytecode_offset as usize & 3);
                let default =
                    label_at(&labels, bytecode_offset, i64::from(cur.i32(table)?), table)?;
                let low = cur.i32(table + 4)?;
                let high = cur.i32(table + 8)?;
                let cases = (high - low + 1) as usize;
                let mut targets = Vec::with_capacity(cases);
                for case in 0..cases {
                    let case_offset = table + 12 + 4 * case;
                    targets.push(label_at(
                        &labels,
                        bytecode_offset,
                        i64::from(cur.i32(case_offset)?),
                        case_offset,
                    )?);
                }
                visitor.visit_table_switch_insn(low, high, default, &targets);
                table + 12 + 4 * cases - offset
            }
            LOOKUPSWITCH => {
                let table = offset + 4 - (bytecode_offset as usize & 3);
                let default =
                    label_at(&labels, bytecode_offset, i64::from(cur.i32(table)?), table)?;
                let pairs = cur.i32(table + 4)? as usize;
                let mut keys = Vec::with_capacity(pairs);
                let mut targets = Vec::with_capacity(pairs);
                for pair in 0..pairs {
                    let pair_offset = table + 8 + 8 * pair;
                    keys.push(cur.i32(pair_offset)?);
                    targets.push(label_at(
                        &labels,
                        bytecode_offset,
                        i64::from(cur.i32(pair_offset + 4)?),
                        pair_offset + 4,
                    )?);
                }
                visitor.visit_lookup_switch_insn(default, &keys, &targets);
                table + 8 + 8 * pairs - offset
            }
            GETSTATIC..=PUTFIELD => {
                let (owner, name, descriptor, _) =
                    pool.member_ref(cur, cur.u16(offset + 1)?, offset + 1)?;
                visitor.visit_field_insn(opcode, &owner, &name, &descriptor);
                3
            }
            INVOKEVIRTUAL..=INVOKEINTERFACE => {
                let (owner, name, descriptor, is_interface) =
                    pool.member_ref(cur, cur.u16(offset + 1)?, offset + 1)?;
                visitor.visit_method_insn(opcode, &owner, &name, &descriptor, is_interface);
                if opcode == INVOKEINTERFACE {
                    5
                } else {
                    3
                }
            }
            INVOKEDYNAMIC => {
                let index = cur.u16(offset + 1)?;
                let entry = pool.offset_of(index, offset + 1)?;
                let tag = cur.u8(entry - 1)?;
                if tag != CONSTANT_INVOKE_DYNAMIC {
                    return Err(DecodeError::new(entry - 1, DecodeErrorKind::BadConstantTag(tag)));
                }
                let bootstrap_index = cur.u16(entry)?;
                let (name, descriptor) = pool.name_and_type(cur, cur.u16(entry + 2)?, entry + 2)?;
                let (handle, arguments) = reader.read_bootstrap_method(bootstrap_index, entry)?;
                visitor.visit_invoke_dynamic_insn(&name, &descriptor, &handle, &arguments);
                5
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                let type_name = pool.class_name(cur, cur.u16(offset + 1)?, offset + 1)?;
                visitor.visit_type_insn(opcode, &type_name);
                3
            }
            MULTIANEWARRAY => {
                let descriptor = pool.class_name(cur, cur.u16(offset + 1)?, offset + 1)?;
                let dimensions = cur.u8(offset + 3)?;
                visitor.visit_multi_a_new_array_insn(&descriptor, dimensions);
                4
            }
            x => return Err(DecodeError::new(offset, DecodeErrorKind::BadOpcode(x))),
        };

        // Instruction-targeted type annotations at this offset.
        emit_insn_annotations_at(
            reader,
            visitor,
            &mut labels,
            &visible_type_annotations,
            &mut visible_index,
            bytecode_offset,
            true,
        )?;
        emit_insn_annotations_at(
            reader,
            visitor,
            &mut labels,
            &invisible_type_annotations,
            &mut invisible_index,
            bytecode_offset,
            false,
        )?;
    }

    // Trailing label just past the last instruction.
    if labels.info(code_length).is_some() {
        visitor.visit_label(Label(code_length));
    }

    // Local variable tables, with generic signatures joined on
    // (start_pc, index).
    if let Some(table) = local_variable_table {
        let mut type_entries: Vec<(u16, u16, usize)> = Vec::new();
        if let Some(type_table) = local_variable_type_table {
            let mut entry_count = cur.u16(type_table)?;
            let mut entry = type_table + 2;
            while entry_count > 0 {
                type_entries.push((cur.u16(entry)?, cur.u16(entry + 8)?, entry + 6));
                entry += 10;
                entry_count -= 1;
            }
        }

        let mut entry_count = cur.u16(table)?;
        let mut entry = table + 2;
        while entry_count > 0 {
            let start_pc = cur.u16(entry)?;
            let range = cur.u16(entry + 2)?;
            let name = pool.utf8(cur, cur.u16(entry + 4)?, entry + 4)?;
            let descriptor = pool.utf8(cur, cur.u16(entry + 6)?, entry + 6)?;
            let index = cur.u16(entry + 8)?;

            let signature = match type_entries
                .iter()
                .find(|&&(s, i, _)| s == start_pc && i == index)
            {
                Some(&(_, _, signature_offset)) => reader.read_utf8(signature_offset)?,
                None => None,
            };

            let truncated = || DecodeError::new(entry, DecodeErrorKind::TruncatedInput);
            let start = labels.get(u32::from(start_pc)).ok_or_else(truncated)?;
            let end = labels
                .get(u32::from(start_pc) + u32::from(range))
                .ok_or_else(truncated)?;
            visitor.visit_local_variable(
                &name,
                &descriptor,
                signature.as_deref(),
                start,
                end,
                index,
            );
            entry += 10;
            entry_count -= 1;
        }
    }

    // Local variable annotations.
    for (annotation_offsets, visible) in [
        (&visible_type_annotations, true),
        (&invisible_type_annotations, false),
    ]
    .iter()
    {
        for &annotation_offset in annotation_offsets.iter() {
            let target_type = cur.u8(annotation_offset)?;
            if target_type == TypeRef::LOCAL_VARIABLE || target_type == TypeRef::RESOURCE_VARIABLE
            {
                let target = annotation::read_type_annotation_target(
                    reader,
                    annotation_offset,
                    Some(&mut labels),
                )?;
                let descriptor = pool.utf8(cur, cur.u16(target.next)?, target.next)?;
                let local_var = match target.local_var {
                    Some(v) => v,
                    None => continue,
                };
                let nested = visitor.visit_local_variable_annotation(
                    target.type_ref,
                    target.type_path.as_ref(),
                    &local_var.start,
                    &local_var.end,
                    &local_var.index,
                    &descriptor,
                    *visible,
                );
                annotation::read_element_values(reader, target.next + 2, true, nested)?;
            }
        }
    }

    for attribute in code_attributes {
        visitor.visit_attribute(attribute);
    }

    visitor.visit_maxs(max_stack, max_locals);
    Ok(())
}

/// Walk a `Runtime*TypeAnnotations` attribute inside a `Code` attribute,
/// interning labels for local variable ranges, and return the start offset of
/// each annotation for the second pass.
fn read_code_type_annotations(
    reader: &ClassReader,
    at: usize,
    labels: &mut LabelTable,
) -> Result<Vec<usize>> {
    let cur = reader.cur();
    let mut count = cur.u16(at)?;
    let mut offset = at + 2;
    let mut offsets = Vec::with_capacity(count as usize);

    while count > 0 {
        offsets.push(offset);
        let target = annotation::read_type_annotation_target(reader, offset, Some(labels))?;
        // Descriptor plus element values, structurally skipped.
        offset = annotation::read_element_values(reader, target.next + 2, true, None)?;
        count -= 1;
    }

    Ok(offsets)
}

/// Emit the instruction-targeted annotations applying at `bytecode_offset`,
/// advancing `next_index` through the (offset-sorted) annotation table.
/// Entries aimed at other target kinds — local variable ranges, exception
/// parameters — are stepped over, not treated as a stop: the table freely
/// interleaves them with instruction targets, and stalling on one would drop
/// every later instruction annotation in the method.
#[allow(clippy::too_many_arguments)]
fn emit_insn_annotations_at(
    reader: &ClassReader,
    visitor: &mut dyn MethodVisitor,
    labels: &mut LabelTable,
    annotation_offsets: &[usize],
    next_index: &mut usize,
    bytecode_offset: u32,
    visible: bool,
) -> Result<()> {
    while *next_index < annotation_offsets.len() {
        let annotation_offset = annotation_offsets[*next_index];
        match annotation::type_annotation_bytecode_offset(reader, annotation_offset)? {
            Some(target_offset) if target_offset > bytecode_offset => break,
            Some(target_offset) if target_offset == bytecode_offset => {
                *next_index += 1;
                emit_insn_annotation(reader, visitor, labels, annotation_offset, visible)?;
            }
            _ => *next_index += 1,
        }
    }
    Ok(())
}

fn emit_insn_annotation(
    reader: &ClassReader,
    visitor: &mut dyn MethodVisitor,
    labels: &mut LabelTable,
    annotation_offset: usize,
    visible: bool,
) -> Result<()> {
    let cur = reader.cur();
    let target = annotation::read_type_annotation_target(reader, annotation_offset, Some(labels))?;
    let descriptor = reader
        .pool()
        .utf8(cur, cur.u16(target.next)?, target.next)?;
    let nested = visitor.visit_insn_annotation(
        target.type_ref,
        target.type_path.as_ref(),
        &descriptor,
        visible,
    );
    annotation::read_element_values(reader, target.next + 2, true, nested)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ParseOptions;
    use crate::test_util::{decode, ClassFileBuilder, EventVisitor};
    use byteorder::{BigEndian, WriteBytesExt};

    fn method_events(events: &[String]) -> Vec<&String> {
        events
            .iter()
            .skip_while(|e| !e.starts_with("method "))
            .take_while(|e| *e != "class_end")
            .collect()
    }

    #[test]
    fn goto_back_to_start() {
        let mut builder = ClassFileBuilder::new("A");
        let code = builder.code_attribute(0, 1, &[GOTO, 0, 0], &[], &[]);
        builder.add_method(0x0001, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert_eq!(
            method_events(&events),
            vec![
                "method acc=0x1 m ()V sig=None throws=[]",
                "code",
                "label L0",
                "jump goto L0",
                "maxs 0 1",
                "method_end",
            ]
        );
    }

    #[test]
    fn table_switch_padding_at_offset_two() {
        let mut builder = ClassFileBuilder::new("A");
        let mut code = vec![ICONST_0, ICONST_0, TABLESWITCH, 0];
        // default and the three case targets all point at offset 28.
        for delta in &[26i32, 0, 2, 26, 26, 26] {
            code.write_i32::<BigEndian>(*delta).unwrap();
        }
        code.push(RETURN);
        assert_eq!(code.len(), 29);

        let code = builder.code_attribute(1, 1, &code, &[], &[]);
        builder.add_method(0x0001, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert_eq!(
            method_events(&events),
            vec![
                "method acc=0x1 m ()V sig=None throws=[]",
                "code",
                "insn iconst_0",
                "insn iconst_0",
                "tableswitch 0..2 default=L28 targets=[L28 L28 L28]",
                "label L28",
                "insn return",
                "maxs 1 1",
                "method_end",
            ]
        );
    }

    #[test]
    fn lookup_switch_pairs() {
        let mut builder = ClassFileBuilder::new("A");
        let mut code = vec![ICONST_0, LOOKUPSWITCH, 0, 0];
        // default, npairs, then (key, offset) pairs relative to offset 1.
        for value in &[27i32, 2, -5, 27, 100, 27] {
            code.write_i32::<BigEndian>(*value).unwrap();
        }
        code.push(RETURN);
        assert_eq!(code.len(), 29);

        let code = builder.code_attribute(1, 1, &code, &[], &[]);
        builder.add_method(0x0001, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert!(method_events(&events).contains(
            &&"lookupswitch default=L28 keys=[-5, 100] targets=[L28 L28]".to_string()
        ));
    }

    #[test]
    fn append_frame_offset_delta() {
        let mut builder = ClassFileBuilder::new("A");

        // frame_type 252 (append one local), offset_delta 5, Integer.
        let mut stack_map = Vec::new();
        stack_map.write_u16::<BigEndian>(1).unwrap();
        stack_map.extend_from_slice(&[252, 0, 5, 1]);
        let stack_map = builder.attribute("StackMapTable", &stack_map);

        let bytecode = [ICONST_0, ISTORE_0 + 1, NOP, NOP, NOP, RETURN];
        let code = builder.code_attribute(1, 2, &bytecode, &[], &[stack_map]);
        builder.add_method(0x0009, "m", "()V", &[code]);
        let image = builder.build();

        let events = decode(image.clone(), ParseOptions::empty());
        let events = method_events(&events);
        let frame = events.iter().position(|e| e.starts_with("frame")).unwrap();
        assert_eq!(*events[frame], "frame Append locals=[Integer] stack=[]");
        assert_eq!(*events[frame - 1], "label L5");
        assert_eq!(*events[frame + 1], "insn return");

        // Expanded form resolves the full frame against the implicit one.
        let expanded = decode(image, ParseOptions::EXPAND_FRAMES);
        assert!(expanded
            .iter()
            .any(|e| e == "frame New locals=[Integer] stack=[]"));
    }

    #[test]
    fn skip_frames_suppresses_frame_events() {
        let mut builder = ClassFileBuilder::new("A");
        let mut stack_map = Vec::new();
        stack_map.write_u16::<BigEndian>(1).unwrap();
        stack_map.extend_from_slice(&[252, 0, 5, 1]);
        let stack_map = builder.attribute("StackMapTable", &stack_map);

        let bytecode = [ICONST_0, ISTORE_0 + 1, NOP, NOP, NOP, RETURN];
        let code = builder.code_attribute(1, 2, &bytecode, &[], &[stack_map]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::SKIP_FRAMES);
        assert!(!events.iter().any(|e| e.starts_with("frame")));
    }

    #[test]
    fn reserved_frame_type_fails() {
        let mut builder = ClassFileBuilder::new("A");
        let mut stack_map = Vec::new();
        stack_map.write_u16::<BigEndian>(1).unwrap();
        stack_map.extend_from_slice(&[130, 0, 0]);
        let stack_map = builder.attribute("StackMapTable", &stack_map);

        let code = builder.code_attribute(0, 1, &[RETURN], &[], &[stack_map]);
        builder.add_method(0x0001, "m", "()V", &[code]);

        let reader = crate::class::ClassReader::new(builder.build()).unwrap();
        let mut visitor = EventVisitor::new();
        let err = reader
            .accept(&mut visitor, &[], ParseOptions::empty())
            .unwrap_err();
        assert_eq!(err.kind, crate::error::DecodeErrorKind::BadFrameType(130));
    }

    #[test]
    fn uninitialized_frame_entry_finds_new_instruction() {
        let mut builder = ClassFileBuilder::new("A");
        let widget = builder.class_const("Widget");
        let constructor = builder.method_ref("Widget", "<init>", "()V");

        let mut bytecode = vec![NOP; 10];
        bytecode.push(NEW);
        bytecode.write_u16::<BigEndian>(widget).unwrap();
        bytecode.push(DUP);
        bytecode.push(INVOKESPECIAL);
        bytecode.write_u16::<BigEndian>(constructor).unwrap();
        bytecode.push(RETURN);
        assert_eq!(bytecode.len(), 18);

        // full_frame at 17 with stack [Uninitialized(10)].
        let mut stack_map = Vec::new();
        stack_map.write_u16::<BigEndian>(1).unwrap();
        stack_map.push(255);
        stack_map.write_u16::<BigEndian>(17).unwrap();
        stack_map.write_u16::<BigEndian>(0).unwrap();
        stack_map.write_u16::<BigEndian>(1).unwrap();
        stack_map.push(8);
        stack_map.write_u16::<BigEndian>(10).unwrap();
        let stack_map = builder.attribute("StackMapTable", &stack_map);

        let code = builder.code_attribute(1, 1, &bytecode, &[], &[stack_map]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        let events = method_events(&events);

        let new_label = events.iter().position(|e| *e == "label L10").unwrap();
        assert_eq!(*events[new_label + 1], "type_insn new Widget");
        assert!(events
            .iter()
            .any(|e| *e == "frame Full locals=[] stack=[Uninitialized(Label(10))]"));
    }

    #[test]
    fn ldc_variants_resolve_constants() {
        let mut builder = ClassFileBuilder::new("A");
        let text = builder.string_const("hi");
        assert!(text <= u8::MAX as u16);
        let wide_float = builder.float(1.5);
        let long_value = builder.long(-2);
        let double_value = builder.double(0.25);

        let mut bytecode = vec![LDC, text as u8, LDC_W];
        bytecode.write_u16::<BigEndian>(wide_float).unwrap();
        bytecode.push(LDC2_W);
        bytecode.write_u16::<BigEndian>(long_value).unwrap();
        bytecode.push(LDC2_W);
        bytecode.write_u16::<BigEndian>(double_value).unwrap();
        bytecode.push(RETURN);

        let code = builder.code_attribute(2, 1, &bytecode, &[], &[]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert!(events.contains(&"ldc String(\"hi\")".to_string()));
        assert!(events.contains(&"ldc Float(1.5)".to_string()));
        assert!(events.contains(&"ldc Long(-2)".to_string()));
        assert!(events.contains(&"ldc Double(0.25)".to_string()));
    }

    #[test]
    fn field_and_method_instructions_resolve_member_refs() {
        let mut builder = ClassFileBuilder::new("A");
        let field = builder.field_ref("A", "count", "I");
        let method = builder.method_ref("java/io/PrintStream", "println", "(I)V");

        let mut bytecode = vec![GETSTATIC];
        bytecode.write_u16::<BigEndian>(field).unwrap();
        bytecode.push(INVOKEVIRTUAL);
        bytecode.write_u16::<BigEndian>(method).unwrap();
        bytecode.push(RETURN);

        let code = builder.code_attribute(1, 1, &bytecode, &[], &[]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert!(events.contains(&"field_insn getstatic A.count I".to_string()));
        assert!(events.contains(
            &"method_insn invokevirtual java/io/PrintStream.println (I)V itf=false".to_string()
        ));
    }

    #[test]
    fn invoke_dynamic_resolves_bootstrap_method() {
        let mut builder = ClassFileBuilder::new("A");

        let factory = builder.method_ref(
            "java/lang/invoke/LambdaMetafactory",
            "metafactory",
            "(Ljava/lang/invoke/MethodHandles$Lookup;)Ljava/lang/invoke/CallSite;",
        );
        let handle = builder.method_handle(6, factory);
        let extra = builder.integer(7);
        let call_site = builder.invoke_dynamic(0, "run", "()Ljava/lang/Runnable;");

        let mut bootstrap = Vec::new();
        bootstrap.write_u16::<BigEndian>(1).unwrap();
        bootstrap.write_u16::<BigEndian>(handle).unwrap();
        bootstrap.write_u16::<BigEndian>(1).unwrap();
        bootstrap.write_u16::<BigEndian>(extra).unwrap();
        let bootstrap = builder.attribute("BootstrapMethods", &bootstrap);
        builder.add_class_attribute(bootstrap);

        let mut bytecode = vec![INVOKEDYNAMIC];
        bytecode.write_u16::<BigEndian>(call_site).unwrap();
        bytecode.extend_from_slice(&[0, 0, RETURN]);

        let code = builder.code_attribute(1, 1, &bytecode, &[], &[]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert!(events.contains(
            &"invokedynamic run ()Ljava/lang/Runnable; bsm=java/lang/invoke/LambdaMetafactory.metafactory args=[Integer(7)]"
                .to_string()
        ));
    }

    #[test]
    fn wide_prefix_forms() {
        let mut builder = ClassFileBuilder::new("A");
        let mut bytecode = vec![WIDE, ILOAD, 1, 0, WIDE, IINC];
        bytecode.write_u16::<BigEndian>(300).unwrap();
        bytecode.write_i16::<BigEndian>(-1).unwrap();
        bytecode.push(RETURN);

        let code = builder.code_attribute(1, 301, &bytecode, &[], &[]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert!(events.contains(&"var_insn iload 256".to_string()));
        assert!(events.contains(&"iinc 300 -1".to_string()));
    }

    #[test]
    fn unknown_wide_operand_fails() {
        let mut builder = ClassFileBuilder::new("A");
        let code = builder.code_attribute(0, 1, &[WIDE, NOP, RETURN], &[], &[]);
        builder.add_method(0x0001, "m", "()V", &[code]);

        let reader = crate::class::ClassReader::new(builder.build()).unwrap();
        let mut visitor = EventVisitor::new();
        let err = reader
            .accept(&mut visitor, &[], ParseOptions::empty())
            .unwrap_err();
        assert_eq!(err.kind, crate::error::DecodeErrorKind::BadOpcode(NOP));
    }

    #[test]
    fn short_form_locals_are_normalized() {
        let mut builder = ClassFileBuilder::new("A");
        let bytecode = [ICONST_0, ISTORE_0 + 2, 0x1c /* iload_2 */, POP, RETURN];
        let code = builder.code_attribute(1, 3, &bytecode, &[], &[]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert!(events.contains(&"var_insn istore 2".to_string()));
        assert!(events.contains(&"var_insn iload 2".to_string()));
    }

    #[test]
    fn exception_table_and_handler_labels() {
        let mut builder = ClassFileBuilder::new("A");
        let throwable = builder.class_const("java/lang/Throwable");
        let bytecode = [NOP, NOP, RETURN, ATHROW];
        let code = builder.code_attribute(1, 1, &bytecode, &[(0, 2, 3, throwable)], &[]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        let events = method_events(&events);
        assert_eq!(
            *events[1..].first().unwrap(),
            "code"
        );
        assert_eq!(
            *events[2],
            "try_catch L0 L2 L3 Some(\"java/lang/Throwable\")"
        );
        // Labels are emitted before the instructions they mark.
        let label0 = events.iter().position(|e| *e == "label L0").unwrap();
        let label3 = events.iter().position(|e| *e == "label L3").unwrap();
        assert!(label0 < label3);
        assert_eq!(*events[label3 + 1], "insn athrow");
    }

    #[test]
    fn line_numbers_and_local_variables() {
        let mut builder = ClassFileBuilder::new("A");

        let mut line_numbers = Vec::new();
        line_numbers.write_u16::<BigEndian>(1).unwrap();
        line_numbers.write_u16::<BigEndian>(0).unwrap();
        line_numbers.write_u16::<BigEndian>(7).unwrap();
        let line_numbers = builder.attribute("LineNumberTable", &line_numbers);

        let variable_name = builder.utf8("x");
        let variable_descriptor = builder.utf8("I");
        let mut variables = Vec::new();
        variables.write_u16::<BigEndian>(1).unwrap();
        variables.write_u16::<BigEndian>(0).unwrap(); // start_pc
        variables.write_u16::<BigEndian>(3).unwrap(); // length
        variables.write_u16::<BigEndian>(variable_name).unwrap();
        variables.write_u16::<BigEndian>(variable_descriptor).unwrap();
        variables.write_u16::<BigEndian>(1).unwrap(); // slot
        let variables = builder.attribute("LocalVariableTable", &variables);

        let bytecode = [ICONST_0, ISTORE_0 + 1, RETURN];
        let code = builder.code_attribute(1, 2, &bytecode, &[], &[line_numbers, variables]);
        builder.add_method(0x0009, "m", "()V", &[code]);
        let image = builder.build();

        let events = decode(image.clone(), ParseOptions::empty());
        assert!(events.contains(&"label L0".to_string()));
        assert!(events.contains(&"line 7 L0".to_string()));
        assert!(events.contains(&"label L3".to_string()));
        assert!(events.contains(&"local_variable x I sig=None L0..L3 slot=1".to_string()));

        let events = decode(image, ParseOptions::SKIP_DEBUG);
        assert!(!events.iter().any(|e| e.starts_with("label")
            || e.starts_with("line")
            || e.starts_with("local_variable")));
    }

    #[test]
    fn wide_goto_collapses_without_internal_expansion() {
        let mut builder = ClassFileBuilder::new("A");
        let mut bytecode = vec![GOTO_W];
        bytecode.write_i32::<BigEndian>(5).unwrap();
        bytecode.push(RETURN);
        let code = builder.code_attribute(0, 1, &bytecode, &[], &[]);
        builder.add_method(0x0009, "m", "()V", &[code]);
        let image = builder.build();

        let events = decode(image.clone(), ParseOptions::empty());
        assert!(events.contains(&"jump goto L5".to_string()));

        let events = decode(image, ParseOptions::EXPAND_INTERNAL_INSNS);
        assert!(events.contains(&"jump goto_w L5".to_string()));
    }

    #[test]
    fn extended_conditional_jump_expands() {
        let mut builder = ClassFileBuilder::new("A");
        // Reserved conditional form of ifeq with an unsigned 16-bit offset.
        let bytecode = [EXT_IFEQ, 0, 6, RETURN, NOP, NOP, RETURN];
        let code = builder.code_attribute(1, 1, &bytecode, &[], &[]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::EXPAND_INTERNAL_INSNS);
        let events = method_events(&events);
        assert_eq!(
            events[1..],
            [
                "code",
                "jump ifne L3",
                "jump goto_w L6",
                "label L3",
                "frame Insert locals=[] stack=[]",
                "insn return",
                "insn nop",
                "insn nop",
                "label L6",
                "insn return",
                "maxs 1 1",
                "method_end",
            ]
        );
    }

    #[test]
    fn instruction_type_annotation_is_emitted_at_its_offset() {
        let mut builder = ClassFileBuilder::new("A");
        let widget = builder.class_const("Widget");
        let descriptor = builder.utf8("LTyped;");

        // INSTANCEOF target at bytecode offset 1.
        let mut annotations = Vec::new();
        annotations.write_u16::<BigEndian>(1).unwrap();
        annotations.push(0x43);
        annotations.write_u16::<BigEndian>(1).unwrap();
        annotations.push(0); // empty target_path
        annotations.write_u16::<BigEndian>(descriptor).unwrap();
        annotations.write_u16::<BigEndian>(0).unwrap();
        let annotations = builder.attribute("RuntimeVisibleTypeAnnotations", &annotations);

        let mut bytecode = vec![ACONST_NULL, INSTANCEOF];
        bytecode.write_u16::<BigEndian>(widget).unwrap();
        bytecode.extend_from_slice(&[POP, RETURN]);
        let code = builder.code_attribute(1, 1, &bytecode, &[], &[annotations]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        let events = method_events(&events);
        let check = events
            .iter()
            .position(|e| *e == "type_insn instanceof Widget")
            .unwrap();
        assert_eq!(
            *events[check + 1],
            "insn_annotation ref=0x43000000 LTyped; visible=true"
        );
    }

    #[test]
    fn insn_annotation_after_local_variable_annotation_still_emits() {
        let mut builder = ClassFileBuilder::new("A");
        let widget = builder.class_const("Widget");
        let local_descriptor = builder.utf8("LLocal;");
        let insn_descriptor = builder.utf8("LTyped;");

        // A LOCAL_VARIABLE entry precedes the INSTANCEOF entry in the same
        // table, the order javac produces.
        let mut annotations = Vec::new();
        annotations.write_u16::<BigEndian>(2).unwrap();
        annotations.push(0x40);
        annotations.write_u16::<BigEndian>(1).unwrap(); // one range
        annotations.write_u16::<BigEndian>(0).unwrap(); // start_pc
        annotations.write_u16::<BigEndian>(6).unwrap(); // length
        annotations.write_u16::<BigEndian>(0).unwrap(); // slot
        annotations.push(0); // empty target_path
        annotations.write_u16::<BigEndian>(local_descriptor).unwrap();
        annotations.write_u16::<BigEndian>(0).unwrap();
        annotations.push(0x43); // INSTANCEOF at bytecode offset 1
        annotations.write_u16::<BigEndian>(1).unwrap();
        annotations.push(0);
        annotations.write_u16::<BigEndian>(insn_descriptor).unwrap();
        annotations.write_u16::<BigEndian>(0).unwrap();
        let annotations = builder.attribute("RuntimeVisibleTypeAnnotations", &annotations);

        let mut bytecode = vec![ACONST_NULL, INSTANCEOF];
        bytecode.write_u16::<BigEndian>(widget).unwrap();
        bytecode.extend_from_slice(&[POP, RETURN]);
        let code = builder.code_attribute(1, 1, &bytecode, &[], &[annotations]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        let events = method_events(&events);
        let check = events
            .iter()
            .position(|e| *e == "type_insn instanceof Widget")
            .unwrap();
        assert_eq!(
            *events[check + 1],
            "insn_annotation ref=0x43000000 LTyped; visible=true"
        );
        assert!(events.iter().any(|e| *e
            == "local_variable_annotation ref=0x40000000 start=[L0] end=[L6] slots=[0] LLocal; visible=true"));
    }

    #[test]
    fn invisible_insn_annotation_after_exception_parameter_still_emits() {
        let mut builder = ClassFileBuilder::new("A");
        let widget = builder.class_const("Widget");
        let throwable = builder.class_const("java/lang/Throwable");
        let catch_descriptor = builder.utf8("LCaught;");
        let insn_descriptor = builder.utf8("LTyped;");

        // An EXCEPTION_PARAMETER entry precedes the INSTANCEOF entry.
        let mut annotations = Vec::new();
        annotations.write_u16::<BigEndian>(2).unwrap();
        annotations.push(0x42);
        annotations.write_u16::<BigEndian>(0).unwrap(); // exception table index
        annotations.push(0); // empty target_path
        annotations.write_u16::<BigEndian>(catch_descriptor).unwrap();
        annotations.write_u16::<BigEndian>(0).unwrap();
        annotations.push(0x43); // INSTANCEOF at bytecode offset 1
        annotations.write_u16::<BigEndian>(1).unwrap();
        annotations.push(0);
        annotations.write_u16::<BigEndian>(insn_descriptor).unwrap();
        annotations.write_u16::<BigEndian>(0).unwrap();
        let annotations = builder.attribute("RuntimeInvisibleTypeAnnotations", &annotations);

        let mut bytecode = vec![ACONST_NULL, INSTANCEOF];
        bytecode.write_u16::<BigEndian>(widget).unwrap();
        bytecode.extend_from_slice(&[POP, RETURN]);
        let code = builder.code_attribute(1, 1, &bytecode, &[(0, 4, 4, throwable)], &[annotations]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        let events = method_events(&events);
        assert!(events.iter().any(|e| *e
            == "try_catch_annotation ref=0x42000000 LCaught; visible=false"));
        let check = events
            .iter()
            .position(|e| *e == "type_insn instanceof Widget")
            .unwrap();
        assert_eq!(
            *events[check + 1],
            "insn_annotation ref=0x43000000 LTyped; visible=false"
        );
    }

    #[test]
    fn legacy_stack_map_frames_are_full_frames() {
        let mut builder = ClassFileBuilder::new("A");
        builder.version(49, 0);

        // Legacy frames carry no frame_type byte: offset, locals, stack.
        let mut stack_map = Vec::new();
        stack_map.write_u16::<BigEndian>(1).unwrap();
        stack_map.write_u16::<BigEndian>(2).unwrap(); // offset_delta
        stack_map.write_u16::<BigEndian>(1).unwrap(); // one local
        stack_map.push(1); // Integer
        stack_map.write_u16::<BigEndian>(0).unwrap(); // empty stack
        let stack_map = builder.attribute("StackMap", &stack_map);

        let bytecode = [NOP, NOP, RETURN];
        let code = builder.code_attribute(0, 1, &bytecode, &[], &[stack_map]);
        builder.add_method(0x0009, "m", "()V", &[code]);

        let events = decode(builder.build(), ParseOptions::empty());
        assert!(events.contains(&"frame Full locals=[Integer] stack=[]".to_string()));
    }

    #[test]
    fn code_longer_than_buffer_is_truncated_input() {
        let mut builder = ClassFileBuilder::new("A");
        let mut payload = Vec::new();
        payload.write_u16::<BigEndian>(0).unwrap();
        payload.write_u16::<BigEndian>(0).unwrap();
        payload.write_u32::<BigEndian>(0x0100_0000).unwrap();
        let code = builder.attribute("Code", &payload);
        builder.add_method(0x0001, "m", "()V", &[code]);

        let reader = crate::class::ClassReader::new(builder.build()).unwrap();
        let mut visitor = EventVisitor::new();
        let err = reader
            .accept(&mut visitor, &[], ParseOptions::empty())
            .unwrap_err();
        assert_eq!(err.kind, crate::error::DecodeErrorKind::TruncatedInput);
    }
}
