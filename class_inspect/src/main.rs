use std::path::{Path, PathBuf};
use std::process::exit;
use std::rc::Rc;

use clap::{App, Arg};

use class_reader::opcodes;
use class_reader::{
    AccessFlags, AnnotationValue, AnnotationVisitor, ClassPath, ClassReader, ClassVersion,
    ClassVisitor, ConstantValue, FieldVisitor, FrameKind, Handle, Label, MethodVisitor,
    ParseOptions, RecordComponentVisitor, TypePath, TypeRef, VerificationType,
};

fn main() {
    pretty_env_logger::init();

    let app = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("class")
                .takes_value(true)
                .required(true)
                .help("Path to a .class file, or an internal class name resolved on the class path"),
        )
        .arg(
            Arg::with_name("classpath")
                .long("classpath")
                .takes_value(true)
                .help("Directories and jars to search for classes (defaults to .)"),
        )
        .arg(
            Arg::with_name("skip-code")
                .long("skip-code")
                .help("Do not decode method bodies"),
        )
        .arg(
            Arg::with_name("skip-debug")
                .long("skip-debug")
                .help("Skip source, line number and local variable debug information"),
        )
        .arg(
            Arg::with_name("skip-frames")
                .long("skip-frames")
                .help("Skip stack map frames"),
        )
        .arg(
            Arg::with_name("expand-frames")
                .long("expand-frames")
                .help("Print stack map frames in expanded form"),
        )
        .get_matches();

    let mut options = ParseOptions::empty();
    if app.is_present("skip-code") {
        options |= ParseOptions::SKIP_CODE;
    }
    if app.is_present("skip-debug") {
        options |= ParseOptions::SKIP_DEBUG;
    }
    if app.is_present("skip-frames") {
        options |= ParseOptions::SKIP_FRAMES;
    }
    if app.is_present("expand-frames") {
        options |= ParseOptions::EXPAND_FRAMES;
    }

    let target = app.value_of("class").unwrap();
    let bytes = match load_bytes(target, app.value_of("classpath")) {
        Ok(v) => v,
        Err(message) => {
            eprintln!("{}", message);
            exit(1);
        }
    };

    let reader = match ClassReader::new(bytes) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("unable to decode {}: {}", target, e);
            exit(1);
        }
    };

    println!("// constant pool: {} slot(s)", reader.item_count());

    if let Err(e) = reader.accept(&mut Dump, &[], options) {
        eprintln!("unable to decode {}: {}", target, e);
        exit(1);
    }
}

fn load_bytes(target: &str, classpath: Option<&str>) -> Result<Vec<u8>, String> {
    if target.ends_with(".class") && Path::new(target).is_file() {
        return std::fs::read(target).map_err(|e| format!("unable to read {}: {}", target, e));
    }

    let roots: Vec<PathBuf> = classpath
        .unwrap_or(".")
        .split(':')
        .map(PathBuf::from)
        .collect();
    let mut class_path = ClassPath::new(roots);
    class_path
        .preload()
        .map_err(|e| format!("unable to index class path: {}", e))?;
    class_path
        .class_bytes(target)
        .map_err(|e| format!("unable to load {}: {}", target, e))
}

struct Dump;

fn access_names(access: AccessFlags) -> String {
    let mut names = Vec::new();
    for (flag, name) in &[
        (AccessFlags::PUBLIC, "public"),
        (AccessFlags::PRIVATE, "private"),
        (AccessFlags::PROTECTED, "protected"),
        (AccessFlags::STATIC, "static"),
        (AccessFlags::FINAL, "final"),
        (AccessFlags::ABSTRACT, "abstract"),
        (AccessFlags::SYNTHETIC, "synthetic"),
        (AccessFlags::DEPRECATED, "deprecated"),
    ] {
        if access.contains(*flag) {
            names.push(*name);
        }
    }
    names.join(" ")
}

fn constant(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Integer(v) => format!("{}", v),
        ConstantValue::Float(v) => format!("{}f", v),
        ConstantValue::Long(v) => format!("{}L", v),
        ConstantValue::Double(v) => format!("{}d", v),
        ConstantValue::Class(v) => format!("class {}", v),
        ConstantValue::String(v) => format!("{:?}", v),
        ConstantValue::MethodType(v) => format!("method type {}", v),
        ConstantValue::MethodHandle(v) => format!("handle {}.{}", v.owner, v.name),
        ConstantValue::Dynamic(v) => format!("dynamic {}:{}", v.name, v.descriptor),
    }
}

impl ClassVisitor for Dump {
    fn visit(
        &mut self,
        version: ClassVersion,
        access: AccessFlags,
        name: &str,
        _signature: Option<&str>,
        super_name: Option<&str>,
        interfaces: &[Rc<str>],
    ) {
        println!("// class file version {}.{}", version.major, version.minor);
        print!("{} class {}", access_names(access), name);
        if let Some(super_name) = super_name {
            print!(" extends {}", super_name);
        }
        if !interfaces.is_empty() {
            let joined: Vec<&str> = interfaces.iter().map(|i| &**i).collect();
            print!(" implements {}", joined.join(", "));
        }
        println!(" {{");
    }

    fn visit_source(&mut self, source: Option<&str>, _debug: Option<&str>) {
        if let Some(source) = source {
            println!("  // compiled from {}", source);
        }
    }

    fn visit_nest_host(&mut self, nest_host: &str) {
        println!("  // nest host {}", nest_host);
    }

    fn visit_outer_class(&mut self, owner: &str, name: Option<&str>, _descriptor: Option<&str>) {
        match name {
            Some(name) => println!("  // enclosed in {}.{}", owner, name),
            None => println!("  // enclosed in {}", owner),
        }
    }

    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        println!("  @{} (visible={})", descriptor, visible);
        Some(self)
    }

    fn visit_inner_class(
        &mut self,
        name: &str,
        _outer_name: Option<&str>,
        _inner_name: Option<&str>,
        _access: AccessFlags,
    ) {
        println!("  // inner class {}", name);
    }

    fn visit_record_component(
        &mut self,
        name: &str,
        descriptor: &str,
        _signature: Option<&str>,
    ) -> Option<&mut dyn RecordComponentVisitor> {
        println!("  record component {} {}", descriptor, name);
        Some(self)
    }

    fn visit_field(
        &mut self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        _signature: Option<&str>,
        value: Option<&ConstantValue>,
    ) -> Option<&mut dyn FieldVisitor> {
        match value {
            Some(value) => println!(
                "  {} field {} {} = {}",
                access_names(access),
                descriptor,
                name,
                constant(value)
            ),
            None => println!("  {} field {} {}", access_names(access), descriptor, name),
        }
        Some(self)
    }

    fn visit_method(
        &mut self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        _signature: Option<&str>,
        exceptions: &[Rc<str>],
    ) -> Option<&mut dyn MethodVisitor> {
        print!("  {} method {}{}", access_names(access), name, descriptor);
        if !exceptions.is_empty() {
            let joined: Vec<&str> = exceptions.iter().map(|e| &**e).collect();
            print!(" throws {}", joined.join(", "));
        }
        println!();
        Some(self)
    }

    fn visit_end(&mut self) {
        println!("}}");
    }
}

impl FieldVisitor for Dump {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        println!("    @{} (visible={})", descriptor, visible);
        Some(self)
    }
}

impl RecordComponentVisitor for Dump {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        println!("    @{} (visible={})", descriptor, visible);
        Some(self)
    }
}

impl AnnotationVisitor for Dump {
    fn visit(&mut self, name: Option<&str>, value: &AnnotationValue) {
        println!("      {} = {:?}", name.unwrap_or("value"), value);
    }

    fn visit_enum(&mut self, name: Option<&str>, descriptor: &str, value: &str) {
        println!("      {} = {}.{}", name.unwrap_or("value"), descriptor, value);
    }
}

impl MethodVisitor for Dump {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        println!("    @{} (visible={})", descriptor, visible);
        Some(self)
    }

    fn visit_frame(
        &mut self,
        kind: FrameKind,
        locals: &[VerificationType],
        stack: &[VerificationType],
    ) {
        println!(
            "    // frame {:?} locals={:?} stack={:?}",
            kind, locals, stack
        );
    }

    fn visit_insn(&mut self, opcode: u8) {
        println!("    {}", opcodes::mnemonic(opcode));
    }

    fn visit_int_insn(&mut self, opcode: u8, operand: i32) {
        println!("    {} {}", opcodes::mnemonic(opcode), operand);
    }

    fn visit_var_insn(&mut self, opcode: u8, var: u16) {
        println!("    {} {}", opcodes::mnemonic(opcode), var);
    }

    fn visit_type_insn(&mut self, opcode: u8, type_name: &str) {
        println!("    {} {}", opcodes::mnemonic(opcode), type_name);
    }

    fn visit_field_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) {
        println!(
            "    {} {}.{} : {}",
            opcodes::mnemonic(opcode),
            owner,
            name,
            descriptor
        );
    }

    fn visit_method_insn(
        &mut self,
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
        _is_interface: bool,
    ) {
        println!(
            "    {} {}.{}{}",
            opcodes::mnemonic(opcode),
            owner,
            name,
            descriptor
        );
    }

    fn visit_invoke_dynamic_insn(
        &mut self,
        name: &str,
        descriptor: &str,
        bootstrap_method: &Handle,
        _bootstrap_arguments: &[ConstantValue],
    ) {
        println!(
            "    invokedynamic {}{} via {}.{}",
            name, descriptor, bootstrap_method.owner, bootstrap_method.name
        );
    }

    fn visit_jump_insn(&mut self, opcode: u8, target: Label) {
        println!("    {} {}", opcodes::mnemonic(opcode), target);
    }

    fn visit_label(&mut self, label: Label) {
        println!("   {}:", label);
    }

    fn visit_line_number(&mut self, line: u16, _start: Label) {
        println!("    // line {}", line);
    }

    fn visit_ldc_insn(&mut self, value: &ConstantValue) {
        println!("    ldc {}", constant(value));
    }

    fn visit_iinc_insn(&mut self, var: u16, increment: i16) {
        println!("    iinc {} {}", var, increment);
    }

    fn visit_table_switch_insn(&mut self, low: i32, high: i32, default: Label, targets: &[Label]) {
        println!("    tableswitch {}..{} default {}", low, high, default);
        for (case, target) in targets.iter().enumerate() {
            println!("      {} -> {}", low + case as i32, target);
        }
    }

    fn visit_lookup_switch_insn(&mut self, default: Label, keys: &[i32], targets: &[Label]) {
        println!("    lookupswitch default {}", default);
        for (key, target) in keys.iter().zip(targets) {
            println!("      {} -> {}", key, target);
        }
    }

    fn visit_multi_a_new_array_insn(&mut self, descriptor: &str, dimensions: u8) {
        println!("    multianewarray {} dims={}", descriptor, dimensions);
    }

    fn visit_insn_annotation(
        &mut self,
        _type_ref: TypeRef,
        _type_path: Option<&TypePath>,
        descriptor: &str,
        visible: bool,
    ) -> Option<&mut dyn AnnotationVisitor> {
        println!("    // @{} (visible={})", descriptor, visible);
        Some(self)
    }

    fn visit_try_catch_block(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&str>,
    ) {
        println!(
            "    try {}..{} catch({}) -> {}",
            start,
            end,
            catch_type.unwrap_or("<any>"),
            handler
        );
    }

    fn visit_local_variable(
        &mut self,
        name: &str,
        descriptor: &str,
        _signature: Option<&str>,
        start: Label,
        end: Label,
        index: u16,
    ) {
        println!(
            "    // local {} {} slot={} range={}..{}",
            descriptor, name, index, start, end
        );
    }

    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        println!("    // stack={} locals={}", max_stack, max_locals);
    }
}
