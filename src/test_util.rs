//! Test-only helpers: a small class file assembler and a visitor that
//! records every event as a string so ordering is assertable.

use std::collections::HashMap;
use std::rc::Rc;

use byteorder::{BigEndian, WriteBytesExt};

use crate::annotation::{AnnotationValue, TypePath, TypeRef};
use crate::attribute::Attribute;
use crate::class::{AccessFlags, ClassVersion};
use crate::constant::{ConstantValue, Handle};
use crate::frame::{FrameKind, VerificationType};
use crate::opcodes;
use crate::visitor::{
    AnnotationVisitor, ClassVisitor, FieldVisitor, Label, MethodVisitor, ModuleVisitor,
    RecordComponentVisitor,
};

/// Assembles a well-formed class file image byte by byte. Constants are
/// interned on demand; member and attribute blobs are produced up front and
/// spliced into the final image by `build`.
pub(crate) struct ClassFileBuilder {
    version: (u16, u16),
    access: u16,
    this_class: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    constants: Vec<u8>,
    constant_count: u16,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        ClassFileBuilder {
            version: (52, 0),
            access: 0x0021, // ACC_PUBLIC | ACC_SUPER
            this_class: name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            constants: Vec::new(),
            constant_count: 1,
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn version(&mut self, major: u16, minor: u16) -> &mut Self {
        self.version = (major, minor);
        self
    }

    pub fn access(&mut self, access: u16) -> &mut Self {
        self.access = access;
        self
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        self.interfaces.push(name.to_string());
        self
    }

    fn take_index(&mut self, slots: u16) -> u16 {
        let index = self.constant_count;
        self.constant_count += slots;
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&index) = self.utf8_cache.get(text) {
            return index;
        }
        let index = self.take_index(1);
        self.constants.write_u8(1).unwrap();
        self.constants
            .write_u16::<BigEndian>(text.len() as u16)
            .unwrap();
        self.constants.extend_from_slice(text.as_bytes());
        self.utf8_cache.insert(text.to_string(), index);
        index
    }

    pub fn class_const(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.class_cache.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let index = self.take_index(1);
        self.constants.write_u8(7).unwrap();
        self.constants.write_u16::<BigEndian>(name_index).unwrap();
        self.class_cache.insert(name.to_string(), index);
        index
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let index = self.take_index(1);
        self.constants.write_u8(3).unwrap();
        self.constants.write_i32::<BigEndian>(value).unwrap();
        index
    }

    pub fn float(&mut self, value: f32) -> u16 {
        let index = self.take_index(1);
        self.constants.write_u8(4).unwrap();
        self.constants
            .write_u32::<BigEndian>(value.to_bits())
            .unwrap();
        index
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let index = self.take_index(2);
        self.constants.write_u8(5).unwrap();
        self.constants.write_i64::<BigEndian>(value).unwrap();
        index
    }

    pub fn double(&mut self, value: f64) -> u16 {
        let index = self.take_index(2);
        self.constants.write_u8(6).unwrap();
        self.constants
            .write_u64::<BigEndian>(value.to_bits())
            .unwrap();
        index
    }

    pub fn string_const(&mut self, text: &str) -> u16 {
        let text_index = self.utf8(text);
        let index = self.take_index(1);
        self.constants.write_u8(8).unwrap();
        self.constants.write_u16::<BigEndian>(text_index).unwrap();
        index
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let index = self.take_index(1);
        self.constants.write_u8(12).unwrap();
        self.constants.write_u16::<BigEndian>(name_index).unwrap();
        self.constants
            .write_u16::<BigEndian>(descriptor_index)
            .unwrap();
        index
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_const(owner);
        let name_and_type_index = self.name_and_type(name, descriptor);
        let index = self.take_index(1);
        self.constants.write_u8(tag).unwrap();
        self.constants.write_u16::<BigEndian>(class_index).unwrap();
        self.constants
            .write_u16::<BigEndian>(name_and_type_index)
            .unwrap();
        index
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, owner, name, descriptor)
    }

    pub fn module_const(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        let index = self.take_index(1);
        self.constants.write_u8(19).unwrap();
        self.constants.write_u16::<BigEndian>(name_index).unwrap();
        index
    }

    pub fn package_const(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        let index = self.take_index(1);
        self.constants.write_u8(20).unwrap();
        self.constants.write_u16::<BigEndian>(name_index).unwrap();
        index
    }

    pub fn method_handle(&mut self, kind: u8, reference_index: u16) -> u16 {
        let index = self.take_index(1);
        self.constants.write_u8(15).unwrap();
        self.constants.write_u8(kind).unwrap();
        self.constants
            .write_u16::<BigEndian>(reference_index)
            .unwrap();
        index
    }

    pub fn invoke_dynamic(&mut self, bootstrap_index: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type_index = self.name_and_type(name, descriptor);
        let index = self.take_index(1);
        self.constants.write_u8(18).unwrap();
        self.constants
            .write_u16::<BigEndian>(bootstrap_index)
            .unwrap();
        self.constants
            .write_u16::<BigEndian>(name_and_type_index)
            .unwrap();
        index
    }

    /// Assemble a complete `attribute_info` blob.
    pub fn attribute(&mut self, name: &str, payload: &[u8]) -> Vec<u8> {
        let name_index = self.utf8(name);
        let mut blob = Vec::with_capacity(6 + payload.len());
        blob.write_u16::<BigEndian>(name_index).unwrap();
        blob.write_u32::<BigEndian>(payload.len() as u32).unwrap();
        blob.extend_from_slice(payload);
        blob
    }

    /// Assemble a `Code` attribute with the given bytecode, exception table
    /// entries `(start, end, handler, catch_type_index)` and nested
    /// attributes.
    pub fn code_attribute(
        &mut self,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
        exceptions: &[(u16, u16, u16, u16)],
        sub_attributes: &[Vec<u8>],
    ) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.write_u16::<BigEndian>(max_stack).unwrap();
        payload.write_u16::<BigEndian>(max_locals).unwrap();
        payload.write_u32::<BigEndian>(code.len() as u32).unwrap();
        payload.extend_from_slice(code);
        payload
            .write_u16::<BigEndian>(exceptions.len() as u16)
            .unwrap();
        for &(start, end, handler, catch_type) in exceptions {
            payload.write_u16::<BigEndian>(start).unwrap();
            payload.write_u16::<BigEndian>(end).unwrap();
            payload.write_u16::<BigEndian>(handler).unwrap();
            payload.write_u16::<BigEndian>(catch_type).unwrap();
        }
        payload
            .write_u16::<BigEndian>(sub_attributes.len() as u16)
            .unwrap();
        for attribute in sub_attributes {
            payload.extend_from_slice(attribute);
        }
        self.attribute("Code", &payload)
    }

    pub fn add_field(&mut self, access: u16, name: &str, descriptor: &str, attributes: &[Vec<u8>]) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut blob = Vec::new();
        blob.write_u16::<BigEndian>(access).unwrap();
        blob.write_u16::<BigEndian>(name_index).unwrap();
        blob.write_u16::<BigEndian>(descriptor_index).unwrap();
        blob.write_u16::<BigEndian>(attributes.len() as u16).unwrap();
        for attribute in attributes {
            blob.extend_from_slice(attribute);
        }
        self.fields.push(blob);
    }

    pub fn add_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        attributes: &[Vec<u8>],
    ) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut blob = Vec::new();
        blob.write_u16::<BigEndian>(access).unwrap();
        blob.write_u16::<BigEndian>(name_index).unwrap();
        blob.write_u16::<BigEndian>(descriptor_index).unwrap();
        blob.write_u16::<BigEndian>(attributes.len() as u16).unwrap();
        for attribute in attributes {
            blob.extend_from_slice(attribute);
        }
        self.methods.push(blob);
    }

    pub fn add_class_attribute(&mut self, attribute: Vec<u8>) {
        self.attributes.push(attribute);
    }

    pub fn build(&mut self) -> Vec<u8> {
        let this_index = self.class_const(&self.this_class.clone());
        let super_index = match self.super_class.clone() {
            Some(name) => self.class_const(&name),
            None => 0,
        };
        let interface_indexes: Vec<u16> = self
            .interfaces
            .clone()
            .iter()
            .map(|name| self.class_const(name))
            .collect();

        let mut image = Vec::new();
        image.write_u32::<BigEndian>(0xCAFE_BABE).unwrap();
        image.write_u16::<BigEndian>(self.version.1).unwrap();
        image.write_u16::<BigEndian>(self.version.0).unwrap();
        image.write_u16::<BigEndian>(self.constant_count).unwrap();
        image.extend_from_slice(&self.constants);
        image.write_u16::<BigEndian>(self.access).unwrap();
        image.write_u16::<BigEndian>(this_index).unwrap();
        image.write_u16::<BigEndian>(super_index).unwrap();
        image
            .write_u16::<BigEndian>(interface_indexes.len() as u16)
            .unwrap();
        for index in interface_indexes {
            image.write_u16::<BigEndian>(index).unwrap();
        }
        image.write_u16::<BigEndian>(self.fields.len() as u16).unwrap();
        for field in &self.fields {
            image.extend_from_slice(field);
        }
        image
            .write_u16::<BigEndian>(self.methods.len() as u16)
            .unwrap();
        for method in &self.methods {
            image.extend_from_slice(method);
        }
        image
            .write_u16::<BigEndian>(self.attributes.len() as u16)
            .unwrap();
        for attribute in &self.attributes {
            image.extend_from_slice(attribute);
        }
        image
    }
}

fn verification_types(types: &[VerificationType]) -> String {
    let rendered: Vec<String> = types.iter().map(|t| format!("{:?}", t)).collect();
    format!("[{}]", rendered.join(" "))
}

fn labels(values: &[Label]) -> String {
    let rendered: Vec<String> = values.iter().map(|l| l.to_string()).collect();
    format!("[{}]", rendered.join(" "))
}

/// Records every visitor event as one line.
pub(crate) struct EventVisitor {
    pub events: Vec<String>,
}

impl EventVisitor {
    pub fn new() -> Self {
        EventVisitor { events: Vec::new() }
    }

    fn push(&mut self, event: String) {
        self.events.push(event);
    }
}

impl ClassVisitor for EventVisitor {
    fn visit(
        &mut self,
        version: ClassVersion,
        access: AccessFlags,
        name: &str,
        signature: Option<&str>,
        super_name: Option<&str>,
        interfaces: &[Rc<str>],
    ) {
        self.push(format!(
            "visit {}.{} acc={:#x} {} sig={:?} super={:?} interfaces={:?}",
            version.major, version.minor, access.bits(), name, signature, super_name, interfaces
        ));
    }

    fn visit_source(&mut self, source: Option<&str>, debug: Option<&str>) {
        self.push(format!("source {:?} {:?}", source, debug));
    }

    fn visit_module(
        &mut self,
        name: &str,
        access: AccessFlags,
        version: Option<&str>,
    ) -> Option<&mut dyn ModuleVisitor> {
        self.push(format!("module {} acc={:#x} {:?}", name, access.bits(), version));
        Some(self)
    }

    fn visit_nest_host(&mut self, nest_host: &str) {
        self.push(format!("nest_host {}", nest_host));
    }

    fn visit_outer_class(&mut self, owner: &str, name: Option<&str>, descriptor: Option<&str>) {
        self.push(format!("outer_class {} {:?} {:?}", owner, name, descriptor));
    }

    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!("class_annotation {} visible={}", descriptor, visible));
        Some(self)
    }

    fn visit_type_annotation(
        &mut self,
        type_ref: TypeRef,
        type_path: Option<&TypePath>,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!(
            "class_type_annotation ref={:#010x} path={:?} {} visible={}",
            type_ref.raw(),
            type_path.map(TypePath::len),
            descriptor,
            visible
        ));
        Some(self)
    }

    fn visit_attribute(&mut self, attribute: Attribute) {
        self.push(format!(
            "class_attribute {} {} bytes",
            attribute.type_name,
            attribute.content.len()
        ));
    }

    fn visit_nest_member(&mut self, nest_member: &str) {
        self.push(format!("nest_member {}", nest_member));
    }

    fn visit_permitted_subclass(&mut self, permitted_subclass: &str) {
        self.push(format!("permitted_subclass {}", permitted_subclass));
    }

    fn visit_inner_class(
        &mut self,
        name: &str,
        outer_name: Option<&str>,
        inner_name: Option<&str>,
        access: AccessFlags,
    ) {
        self.push(format!(
            "inner_class {} {:?} {:?} acc={:#x}",
            name,
            outer_name,
            inner_name,
            access.bits()
        ));
    }

    fn visit_record_component(
        &mut self,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
    ) -> Option<&mut dyn RecordComponentVisitor> {
        self.push(format!("record_component {} {} sig={:?}", name, descriptor, signature));
        Some(self)
    }

    fn visit_field(
        &mut self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        value: Option<&ConstantValue>,
    ) -> Option<&mut dyn FieldVisitor> {
        self.push(format!(
            "field acc={:#x} {} {} sig={:?} value={:?}",
            access.bits(),
            name,
            descriptor,
            signature,
            value
        ));
        Some(self)
    }

    fn visit_method(
        &mut self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        exceptions: &[Rc<str>],
    ) -> Option<&mut dyn MethodVisitor> {
        self.push(format!(
            "method acc={:#x} {} {} sig={:?} throws={:?}",
            access.bits(),
            name,
            descriptor,
            signature,
            exceptions
        ));
        Some(self)
    }

    fn visit_end(&mut self) {
        self.push("class_end".to_string());
    }
}

impl FieldVisitor for EventVisitor {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!("field_annotation {} visible={}", descriptor, visible));
        Some(self)
    }

    fn visit_type_annotation(
        &mut self,
        type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!(
            "field_type_annotation ref={:#010x} {} visible={}",
            type_ref.raw(),
            descriptor,
            visible
        ));
        Some(self)
    }

    fn visit_attribute(&mut self, attribute: Attribute) {
        self.push(format!("field_attribute {}", attribute.type_name));
    }

    fn visit_end(&mut self) {
        self.push("field_end".to_string());
    }
}

impl RecordComponentVisitor for EventVisitor {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!("component_annotation {} visible={}", descriptor, visible));
        Some(self)
    }

    fn visit_type_annotation(
        &mut self,
        type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!(
            "component_type_annotation ref={:#010x} {} visible={}",
            type_ref.raw(),
            descriptor,
            visible
        ));
        Some(self)
    }

    fn visit_attribute(&mut self, attribute: Attribute) {
        self.push(format!("component_attribute {}", attribute.type_name));
    }

    fn visit_end(&mut self) {
        self.push("component_end".to_string());
    }
}

impl AnnotationVisitor for EventVisitor {
    fn visit(&mut self, name: Option<&str>, value: &AnnotationValue) {
        self.push(format!("ann {:?} {:?}", name, value));
    }

    fn visit_enum(&mut self, name: Option<&str>, descriptor: &str, value: &str) {
        self.push(format!("ann_enum {:?} {} {}", name, descriptor, value));
    }

    fn visit_annotation(
        &mut self,
        name: Option<&str>,
        descriptor: &str,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!("ann_nested {:?} {}", name, descriptor));
        Some(self)
    }

    fn visit_array(&mut self, name: Option<&str>) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!("ann_array {:?}", name));
        Some(self)
    }

    fn visit_end(&mut self) {
        self.push("ann_end".to_string());
    }
}

impl ModuleVisitor for EventVisitor {
    fn visit_main_class(&mut self, main_class: &str) {
        self.push(format!("module_main_class {}", main_class));
    }

    fn visit_package(&mut self, package: &str) {
        self.push(format!("module_package {}", package));
    }

    fn visit_require(&mut self, module: &str, access: AccessFlags, version: Option<&str>) {
        self.push(format!(
            "module_require {} acc={:#x} {:?}",
            module,
            access.bits(),
            version
        ));
    }

    fn visit_export(&mut self, package: &str, access: AccessFlags, targets: &[Rc<str>]) {
        self.push(format!(
            "module_export {} acc={:#x} to={:?}",
            package,
            access.bits(),
            targets
        ));
    }

    fn visit_open(&mut self, package: &str, access: AccessFlags, targets: &[Rc<str>]) {
        self.push(format!(
            "module_open {} acc={:#x} to={:?}",
            package,
            access.bits(),
            targets
        ));
    }

    fn visit_use(&mut self, service: &str) {
        self.push(format!("module_use {}", service));
    }

    fn visit_provide(&mut self, service: &str, providers: &[Rc<str>]) {
        self.push(format!("module_provide {} with={:?}", service, providers));
    }

    fn visit_end(&mut self) {
        self.push("module_end".to_string());
    }
}

impl MethodVisitor for EventVisitor {
    fn visit_parameter(&mut self, name: Option<&str>, access: AccessFlags) {
        self.push(format!("parameter {:?} acc={:#x}", name, access.bits()));
    }

    fn visit_annotation_default(&mut self) -> Option<&mut dyn AnnotationVisitor> {
        self.push("annotation_default".to_string());
        Some(self)
    }

    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!("method_annotation {} visible={}", descriptor, visible));
        Some(self)
    }

    fn visit_type_annotation(
        &mut self,
        type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!(
            "method_type_annotation ref={:#010x} {} visible={}",
            type_ref.raw(),
            descriptor,
            visible
        ));
        Some(self)
    }

    fn visit_annotable_parameter_count(&mut self, parameter_count: u8, visible: bool) {
        self.push(format!(
            "annotable_parameter_count {} visible={}",
            parameter_count, visible
        ));
    }

    fn visit_parameter_annotation(
        &mut self,
        parameter: u8,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!(
            "parameter_annotation {} {} visible={}",
            parameter, descriptor, visible
        ));
        Some(self)
    }

    fn visit_attribute(&mut self, attribute: Attribute) {
        self.push(format!("method_attribute {}", attribute.type_name));
    }

    fn visit_code(&mut self) {
        self.push("code".to_string());
    }

    fn visit_frame(
        &mut self,
        kind: FrameKind,
        locals: &[VerificationType],
        stack: &[VerificationType],
    ) {
        self.push(format!(
            "frame {:?} locals={} stack={}",
            kind,
            verification_types(locals),
            verification_types(stack)
        ));
    }

    fn visit_insn(&mut self, opcode: u8) {
        self.push(format!("insn {}", opcodes::mnemonic(opcode)));
    }

    fn visit_int_insn(&mut self, opcode: u8, operand: i32) {
        self.push(format!("int_insn {} {}", opcodes::mnemonic(opcode), operand));
    }

    fn visit_var_insn(&mut self, opcode: u8, var: u16) {
        self.push(format!("var_insn {} {}", opcodes::mnemonic(opcode), var));
    }

    fn visit_type_insn(&mut self, opcode: u8, type_name: &str) {
        self.push(format!("type_insn {} {}", opcodes::mnemonic(opcode), type_name));
    }

    fn visit_field_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) {
        self.push(format!(
            "field_insn {} {}.{} {}",
            opcodes::mnemonic(opcode),
            owner,
            name,
            descriptor
        ));
    }

    fn visit_method_insn(
        &mut self,
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) {
        self.push(format!(
            "method_insn {} {}.{} {} itf={}",
            opcodes::mnemonic(opcode),
            owner,
            name,
            descriptor,
            is_interface
        ));
    }

    fn visit_invoke_dynamic_insn(
        &mut self,
        name: &str,
        descriptor: &str,
        bootstrap_method: &Handle,
        bootstrap_arguments: &[ConstantValue],
    ) {
        self.push(format!(
            "invokedynamic {} {} bsm={}.{} args={:?}",
            name,
            descriptor,
            bootstrap_method.owner,
            bootstrap_method.name,
            bootstrap_arguments
        ));
    }

    fn visit_jump_insn(&mut self, opcode: u8, target: Label) {
        self.push(format!("jump {} {}", opcodes::mnemonic(opcode), target));
    }

    fn visit_label(&mut self, label: Label) {
        self.push(format!("label {}", label));
    }

    fn visit_line_number(&mut self, line: u16, start: Label) {
        self.push(format!("line {} {}", line, start));
    }

    fn visit_ldc_insn(&mut self, value: &ConstantValue) {
        self.push(format!("ldc {:?}", value));
    }

    fn visit_iinc_insn(&mut self, var: u16, increment: i16) {
        self.push(format!("iinc {} {}", var, increment));
    }

    fn visit_table_switch_insn(&mut self, low: i32, high: i32, default: Label, targets: &[Label]) {
        self.push(format!(
            "tableswitch {}..{} default={} targets={}",
            low,
            high,
            default,
            labels(targets)
        ));
    }

    fn visit_lookup_switch_insn(&mut self, default: Label, keys: &[i32], targets: &[Label]) {
        self.push(format!(
            "lookupswitch default={} keys={:?} targets={}",
            default,
            keys,
            labels(targets)
        ));
    }

    fn visit_multi_a_new_array_insn(&mut self, descriptor: &str, dimensions: u8) {
        self.push(format!("multianewarray {} {}", descriptor, dimensions));
    }

    fn visit_insn_annotation(
        &mut self,
        type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!(
            "insn_annotation ref={:#010x} {} visible={}",
            type_ref.raw(),
            descriptor,
            visible
        ));
        Some(self)
    }

    fn visit_try_catch_block(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&str>,
    ) {
        self.push(format!(
            "try_catch {} {} {} {:?}",
            start, end, handler, catch_type
        ));
    }

    fn visit_try_catch_annotation(
        &mut self,
        type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!(
            "try_catch_annotation ref={:#010x} {} visible={}",
            type_ref.raw(),
            descriptor,
            visible
        ));
        Some(self)
    }

    fn visit_local_variable(
        &mut self,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        start: Label,
        end: Label,
        index: u16,
    ) {
        self.push(format!(
            "local_variable {} {} sig={:?} {}..{} slot={}",
            name, descriptor, signature, start, end, index
        ));
    }

    fn visit_local_variable_annotation(
        &mut self,
        type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        start: &[Label],
        end: &[Label],
        index: &[u16],
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        self.push(format!(
            "local_variable_annotation ref={:#010x} start={} end={} slots={:?} {} visible={}",
            type_ref.raw(),
            labels(start),
            labels(end),
            index,
            descriptor,
            visible
        ));
        Some(self)
    }

    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        self.push(format!("maxs {} {}", max_stack, max_locals));
    }

    fn visit_end(&mut self) {
        self.push("method_end".to_string());
    }
}

/// Decode `image` with the recording visitor and return the event log.
pub(crate) fn decode(image: Vec<u8>, options: crate::class::ParseOptions) -> Vec<String> {
    let reader = crate::class::ClassReader::new(image).expect("header decode");
    let mut visitor = EventVisitor::new();
    reader
        .accept(&mut visitor, &[], options)
        .expect("accept succeeds");
    visitor.events
}
