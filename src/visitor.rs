//! The event surface driven by [`crate::ClassReader::accept`].
//!
//! Every trait method has a no-op default so a consumer implements only what
//! it cares about. Methods that open a nested structure (annotations, fields,
//! methods, module, record components) return `Option<&mut dyn …>`; returning
//! `None` skips the corresponding events, but the decoder still walks the
//! full structure so that later offsets stay correct.

use std::fmt;
use std::rc::Rc;

use crate::annotation::{AnnotationValue, TypePath, TypeRef};
use crate::attribute::Attribute;
use crate::class::{AccessFlags, ClassVersion};
use crate::constant::{ConstantValue, Handle};
use crate::frame::{FrameKind, VerificationType};

/// An interned marker for one bytecode offset within one method. Exactly one
/// label exists per mentioned offset; the interning state lives in the
/// per-method [`LabelTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl Label {
    /// The bytecode offset this label marks, relative to the start of the
    /// method's code array.
    pub fn bytecode_offset(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LabelInfo {
    /// Set when the label only exists because a debug table mentioned the
    /// offset; cleared as soon as a control-flow creator sees the same offset.
    pub debug_only: bool,
    /// `LineNumberTable` entries attached to this offset, in table order.
    pub lines: Vec<u16>,
}

/// Per-method label interning: one slot per bytecode offset, plus one for the
/// offset just past the last instruction.
pub struct LabelTable {
    slots: Vec<Option<LabelInfo>>,
}

impl LabelTable {
    pub(crate) fn with_code_length(code_length: usize) -> Self {
        LabelTable {
            slots: vec![None; code_length + 1],
        }
    }

    /// The label at `offset`, if one has been interned.
    pub fn get(&self, offset: u32) -> Option<Label> {
        match self.slots.get(offset as usize) {
            Some(Some(_)) => Some(Label(offset)),
            _ => None,
        }
    }

    /// Intern a control-flow label at `offset`. Returns `None` when the
    /// offset lies outside the code array.
    pub fn create(&mut self, offset: u32) -> Option<Label> {
        let slot = self.slots.get_mut(offset as usize)?;
        match slot {
            Some(info) => info.debug_only = false,
            None => *slot = Some(LabelInfo::default()),
        }
        Some(Label(offset))
    }

    /// Intern a label that only debug tables reference.
    pub(crate) fn create_debug(&mut self, offset: u32) -> Option<Label> {
        let slot = self.slots.get_mut(offset as usize)?;
        if slot.is_none() {
            *slot = Some(LabelInfo {
                debug_only: true,
                lines: Vec::new(),
            });
        }
        Some(Label(offset))
    }

    pub(crate) fn add_line(&mut self, offset: u32, line: u16) {
        if let Some(Some(info)) = self.slots.get_mut(offset as usize) {
            info.lines.push(line);
        }
    }

    pub(crate) fn info(&self, offset: u32) -> Option<&LabelInfo> {
        self.slots.get(offset as usize).and_then(Option::as_ref)
    }
}

/// Visitor for the recursive `element_value` grammar of annotations.
pub trait AnnotationVisitor {
    /// A primitive, string, class or primitive-array element. `name` is
    /// `None` inside array values and for `AnnotationDefault`.
    fn visit(&mut self, _name: Option<&str>, _value: &AnnotationValue) {}

    fn visit_enum(&mut self, _name: Option<&str>, _descriptor: &str, _value: &str) {}

    fn visit_annotation(
        &mut self,
        _name: Option<&str>,
        _descriptor: &str,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_array(&mut self, _name: Option<&str>) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_end(&mut self) {}
}

/// Visitor for a `Module` attribute.
pub trait ModuleVisitor {
    fn visit_main_class(&mut self, _main_class: &str) {}

    fn visit_package(&mut self, _package: &str) {}

    fn visit_require(&mut self, _module: &str, _access: AccessFlags, _version: Option<&str>) {}

    fn visit_export(&mut self, _package: &str, _access: AccessFlags, _targets: &[Rc<str>]) {}

    fn visit_open(&mut self, _package: &str, _access: AccessFlags, _targets: &[Rc<str>]) {}

    fn visit_use(&mut self, _service: &str) {}

    fn visit_provide(&mut self, _service: &str, _providers: &[Rc<str>]) {}

    fn visit_end(&mut self) {}
}

/// Visitor for one field declaration.
pub trait FieldVisitor {
    fn visit_annotation(
        &mut self,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_type_annotation(
        &mut self,
        _type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_attribute(&mut self, _attribute: Attribute) {}

    fn visit_end(&mut self) {}
}

/// Visitor for one record component.
pub trait RecordComponentVisitor {
    fn visit_annotation(
        &mut self,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_type_annotation(
        &mut self,
        _type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_attribute(&mut self, _attribute: Attribute) {}

    fn visit_end(&mut self) {}
}

/// Visitor for one method declaration and its code.
///
/// Within a method the decoder calls, in order: declaration-level events
/// (parameters, annotation default, annotations, parameter annotations,
/// opaque attributes), then `visit_code`, the exception table, and the
/// instruction stream interleaved with matching label / line-number / frame /
/// instruction-annotation events, then local variable tables, local variable
/// annotations, code-level opaque attributes, `visit_maxs`, `visit_end`.
pub trait MethodVisitor {
    fn visit_parameter(&mut self, _name: Option<&str>, _access: AccessFlags) {}

    fn visit_annotation_default(&mut self) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_annotation(
        &mut self,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_type_annotation(
        &mut self,
        _type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    /// Number of parameter slots carrying runtime (in)visible parameter
    /// annotations; emitted before the per-parameter annotation events.
    fn visit_annotable_parameter_count(&mut self, _parameter_count: u8, _visible: bool) {}

    fn visit_parameter_annotation(
        &mut self,
        _parameter: u8,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_attribute(&mut self, _attribute: Attribute) {}

    fn visit_code(&mut self) {}

    /// A stack map frame. See [`FrameKind`] for which slices carry payload.
    fn visit_frame(
        &mut self,
        _kind: FrameKind,
        _locals: &[VerificationType],
        _stack: &[VerificationType],
    ) {
    }

    /// A zero-operand instruction (also the normalized `ldc`-free constants,
    /// array loads/stores, arithmetic, returns, …).
    fn visit_insn(&mut self, _opcode: u8) {}

    /// `bipush`, `sipush` or `newarray`.
    fn visit_int_insn(&mut self, _opcode: u8, _operand: i32) {}

    /// A local variable load/store or `ret`; short forms are normalized to
    /// the generic opcode plus index.
    fn visit_var_insn(&mut self, _opcode: u8, _var: u16) {}

    /// `new`, `anewarray`, `checkcast` or `instanceof`.
    fn visit_type_insn(&mut self, _opcode: u8, _type_name: &str) {}

    fn visit_field_insn(&mut self, _opcode: u8, _owner: &str, _name: &str, _descriptor: &str) {}

    fn visit_method_insn(
        &mut self,
        _opcode: u8,
        _owner: &str,
        _name: &str,
        _descriptor: &str,
        _is_interface: bool,
    ) {
    }

    fn visit_invoke_dynamic_insn(
        &mut self,
        _name: &str,
        _descriptor: &str,
        _bootstrap_method: &Handle,
        _bootstrap_arguments: &[ConstantValue],
    ) {
    }

    fn visit_jump_insn(&mut self, _opcode: u8, _target: Label) {}

    fn visit_label(&mut self, _label: Label) {}

    fn visit_line_number(&mut self, _line: u16, _start: Label) {}

    fn visit_ldc_insn(&mut self, _value: &ConstantValue) {}

    fn visit_iinc_insn(&mut self, _var: u16, _increment: i16) {}

    fn visit_table_switch_insn(
        &mut self,
        _low: i32,
        _high: i32,
        _default: Label,
        _targets: &[Label],
    ) {
    }

    fn visit_lookup_switch_insn(&mut self, _default: Label, _keys: &[i32], _targets: &[Label]) {}

    fn visit_multi_a_new_array_insn(&mut self, _descriptor: &str, _dimensions: u8) {}

    fn visit_insn_annotation(
        &mut self,
        _type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_try_catch_block(
        &mut self,
        _start: Label,
        _end: Label,
        _handler: Label,
        _catch_type: Option<&str>,
    ) {
    }

    fn visit_try_catch_annotation(
        &mut self,
        _type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_local_variable(
        &mut self,
        _name: &str,
        _descriptor: &str,
        _signature: Option<&str>,
        _start: Label,
        _end: Label,
        _index: u16,
    ) {
    }

    fn visit_local_variable_annotation(
        &mut self,
        _type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        _start: &[Label],
        _end: &[Label],
        _index: &[u16],
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_maxs(&mut self, _max_stack: u16, _max_locals: u16) {}

    fn visit_end(&mut self) {}
}

/// Visitor for one class file. Events arrive in the canonical class file
/// order: header, source, module, nest host, outer class, annotations, type
/// annotations, opaque attributes, nest members, permitted subclasses, inner
/// classes, record components, fields, methods, end.
pub trait ClassVisitor {
    #[allow(clippy::too_many_arguments)]
    fn visit(
        &mut self,
        _version: ClassVersion,
        _access: AccessFlags,
        _name: &str,
        _signature: Option<&str>,
        _super_name: Option<&str>,
        _interfaces: &[Rc<str>],
    ) {
    }

    fn visit_source(&mut self, _source: Option<&str>, _debug: Option<&str>) {}

    fn visit_module(
        &mut self,
        _name: &str,
        _access: AccessFlags,
        _version: Option<&str>,
    ) -> Option<&mut dyn ModuleVisitor> {
        None
    }

    fn visit_nest_host(&mut self, _nest_host: &str) {}

    /// The `EnclosingMethod` attribute; `name`/`descriptor` are `None` for a
    /// class enclosed in an instance initializer or field initializer.
    fn visit_outer_class(&mut self, _owner: &str, _name: Option<&str>, _descriptor: Option<&str>) {}

    fn visit_annotation(
        &mut self,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_type_annotation(
        &mut self,
        _type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        _descriptor: &str,
        _visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        None
    }

    fn visit_attribute(&mut self, _attribute: Attribute) {}

    fn visit_nest_member(&mut self, _nest_member: &str) {}

    fn visit_permitted_subclass(&mut self, _permitted_subclass: &str) {}

    fn visit_inner_class(
        &mut self,
        _name: &str,
        _outer_name: Option<&str>,
        _inner_name: Option<&str>,
        _access: AccessFlags,
    ) {
    }

    fn visit_record_component(
        &mut self,
        _name: &str,
        _descriptor: &str,
        _signature: Option<&str>,
    ) -> Option<&mut dyn RecordComponentVisitor> {
        None
    }

    fn visit_field(
        &mut self,
        _access: AccessFlags,
        _name: &str,
        _descriptor: &str,
        _signature: Option<&str>,
        _value: Option<&ConstantValue>,
    ) -> Option<&mut dyn FieldVisitor> {
        None
    }

    fn visit_method(
        &mut self,
        _access: AccessFlags,
        _name: &str,
        _descriptor: &str,
        _signature: Option<&str>,
        _exceptions: &[Rc<str>],
    ) -> Option<&mut dyn MethodVisitor> {
        None
    }

    fn visit_end(&mut self) {}
}
