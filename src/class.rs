//! The class file reader: construction-time constant pool sweep, header
//! accessors, and the `accept` driver that walks the class structure and
//! fires visitor events.

use std::cmp::Ordering;
use std::io::{self, Read};
use std::rc::Rc;

use bitflags::bitflags;
use log::{debug, trace};

use crate::annotation;
use crate::attribute::{Attribute, AttributePrototype};
use crate::code;
use crate::constant::{
    ConstantDynamic, ConstantPool, ConstantValue, CONSTANT_CLASS, CONSTANT_DOUBLE,
    CONSTANT_DYNAMIC, CONSTANT_FLOAT, CONSTANT_INTEGER, CONSTANT_LONG, CONSTANT_METHOD_HANDLE,
    CONSTANT_METHOD_TYPE, CONSTANT_STRING,
};
use crate::error::{DecodeError, DecodeErrorKind, LoadError, Result};
use crate::module;
use crate::read::ByteCursor;
use crate::visitor::{ClassVisitor, LabelTable};

/// Highest class file major version this reader accepts (Java 25).
pub const MAX_SUPPORTED_MAJOR: u16 = 69;

/// A class file version, ordered by `(major, minor)`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ClassVersion {
    pub major: u16,
    pub minor: u16,
}

impl ClassVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        ClassVersion { major, minor }
    }
}

impl PartialOrd for ClassVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => self.minor.cmp(&other.minor),
            x => x,
        }
    }
}

bitflags! {
    /// JVMS access and property flags for classes, members, parameters and
    /// module declarations. Several on-disk values are shared between sites
    /// (e.g. `SUPER`/`SYNCHRONIZED`/`OPEN`/`TRANSITIVE`); the bit pattern is
    /// what the class file stores. `RECORD` and `DEPRECATED` do not exist on
    /// disk as access bits: they are synthesized from the `Record` and
    /// `Deprecated` attributes.
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const OPEN = 0x0020;
        const TRANSITIVE = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const STATIC_PHASE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
        const MANDATED = 0x8000;
        const RECORD = 0x1_0000;
        const DEPRECATED = 0x2_0000;
    }
}

bitflags! {
    /// Options controlling what `accept` decodes and emits.
    pub struct ParseOptions: u32 {
        /// Omit `Code` attribute parsing; method declarations still appear.
        const SKIP_CODE = 1;
        /// Omit `SourceFile`, `SourceDebugExtension`, `LineNumberTable`,
        /// `LocalVariableTable`/`Type` and `MethodParameters`.
        const SKIP_DEBUG = 2;
        /// Omit `StackMapTable`/`StackMap` emission.
        const SKIP_FRAMES = 4;
        /// Emit frames in expanded form and synthesize the implicit entry
        /// frame from the method descriptor.
        const EXPAND_FRAMES = 8;
        /// Keep wide jumps as-is and expand the reserved extended-offset
        /// branch opcodes; required when re-reading the output of a paired
        /// writer.
        const EXPAND_INTERNAL_INSNS = 256;
    }
}

impl ParseOptions {
    pub(crate) fn skip_debug(self) -> bool {
        self.contains(ParseOptions::SKIP_DEBUG)
    }

    pub(crate) fn skip_frames(self) -> bool {
        self.contains(ParseOptions::SKIP_FRAMES)
    }

    pub(crate) fn expand_frames(self) -> bool {
        self.contains(ParseOptions::EXPAND_FRAMES)
    }

    pub(crate) fn expand_internal(self) -> bool {
        self.contains(ParseOptions::EXPAND_INTERNAL_INSNS)
    }
}

/// Per-`accept` method state threaded through the code decoder.
pub(crate) struct Context {
    pub options: ParseOptions,
    pub method_access: AccessFlags,
    pub method_name: Rc<str>,
    pub method_descriptor: Rc<str>,
}

/// A streaming decoder for one `ClassFile` buffer.
///
/// Construction sweeps the constant pool once; everything else happens inside
/// [`ClassReader::accept`], which drives a [`ClassVisitor`] with the class
/// contents in canonical order. The reader never mutates the buffer, and all
/// decode failures are [`DecodeError`]s naming a byte offset.
#[derive(Debug)]
pub struct ClassReader {
    data: Vec<u8>,
    class_file_offset: usize,
    version: ClassVersion,
    pool: ConstantPool,
    /// Offset of the `access_flags` field, one past the last `cp_info`.
    header: usize,
    /// Start offset of each `bootstrap_method` struct; populated at
    /// construction when any `Dynamic`/`InvokeDynamic` constant exists.
    bootstrap_offsets: Vec<u32>,
}

impl ClassReader {
    /// Decode the header of a class file starting at offset 0.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        Self::with_offset(data, 0)
    }

    /// Decode the header of a class file starting at `class_file_offset`.
    pub fn with_offset(data: Vec<u8>, class_file_offset: usize) -> Result<Self> {
        let cur = ByteCursor::new(&data);

        // The magic is not validated beyond contributing its four bytes.
        let minor = cur.u16(class_file_offset + 4)?;
        let major = cur.u16(class_file_offset + 6)?;
        if major > MAX_SUPPORTED_MAJOR {
            return Err(DecodeError::new(
                class_file_offset + 6,
                DecodeErrorKind::UnsupportedVersion(major),
            ));
        }

        let (pool, header) = ConstantPool::parse(cur, class_file_offset + 8)?;
        trace!(
            "class file version {}.{}, header at {}",
            major,
            minor,
            header
        );

        let mut reader = ClassReader {
            data,
            class_file_offset,
            version: ClassVersion::new(major, minor),
            pool,
            header,
            bootstrap_offsets: Vec::new(),
        };

        if reader.pool.has_dynamic() {
            reader.bootstrap_offsets = reader.read_bootstrap_offsets()?;
        }

        Ok(reader)
    }

    /// Drain `input` into a buffer and decode it. No incremental parsing over
    /// streams is supported.
    pub fn from_reader<R: Read>(input: &mut R) -> std::result::Result<Self, LoadError> {
        let mut data = Vec::new();
        input.read_to_end(&mut data).map_err(io::Error::from)?;
        Ok(Self::new(data)?)
    }

    pub(crate) fn cur(&self) -> ByteCursor<'_> {
        ByteCursor::new(&self.data)
    }

    pub(crate) fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    /// The class file version from the header.
    pub fn version(&self) -> ClassVersion {
        self.version
    }

    /// Number of constant pool slots, including the reserved slot 0.
    pub fn item_count(&self) -> u16 {
        self.pool.item_count()
    }

    /// Offset of the `access_flags` field.
    pub fn header_offset(&self) -> usize {
        self.header
    }

    /// The class access flags, without attribute-synthesized bits.
    pub fn access_flags(&self) -> Result<AccessFlags> {
        Ok(AccessFlags::from_bits_truncate(u32::from(
            self.cur().u16(self.header)?,
        )))
    }

    /// Internal name of this class.
    pub fn class_name(&self) -> Result<Rc<str>> {
        let cur = self.cur();
        self.pool
            .class_name(cur, cur.u16(self.header + 2)?, self.header + 2)
    }

    /// Internal name of the superclass, `None` for `java/lang/Object`.
    pub fn super_name(&self) -> Result<Option<Rc<str>>> {
        let cur = self.cur();
        match cur.u16(self.header + 4)? {
            0 => Ok(None),
            index => Ok(Some(self.pool.class_name(cur, index, self.header + 4)?)),
        }
    }

    /// Internal names of the direct interfaces.
    pub fn interfaces(&self) -> Result<Vec<Rc<str>>> {
        let cur = self.cur();
        let count = cur.u16(self.header + 6)?;
        let mut names = Vec::with_capacity(count as usize);
        let mut offset = self.header + 8;
        for _ in 0..count {
            names.push(self.pool.class_name(cur, cur.u16(offset)?, offset)?);
            offset += 2;
        }
        Ok(names)
    }

    // Public read primitives for attribute prototypes.

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.cur().u8(offset)
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        self.cur().u16(offset)
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16> {
        self.cur().i16(offset)
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        self.cur().i32(offset)
    }

    pub fn read_i64(&self, offset: usize) -> Result<i64> {
        self.cur().i64(offset)
    }

    /// Read the constant pool index stored at `offset` and resolve it as a
    /// UTF-8 constant; index 0 yields `None`.
    pub fn read_utf8(&self, offset: usize) -> Result<Option<Rc<str>>> {
        let cur = self.cur();
        match cur.u16(offset)? {
            0 => Ok(None),
            index => Ok(Some(self.pool.utf8(cur, index, offset)?)),
        }
    }

    /// Resolve constant pool entry `index` as a UTF-8 constant.
    pub fn read_utf8_item(&self, index: u16) -> Result<Rc<str>> {
        self.pool.utf8(self.cur(), index, self.class_file_offset)
    }

    /// Read the pool index at `offset` and resolve it as a class name; index
    /// 0 yields `None`.
    pub fn read_class(&self, offset: usize) -> Result<Option<Rc<str>>> {
        let cur = self.cur();
        match cur.u16(offset)? {
            0 => Ok(None),
            index => Ok(Some(self.pool.class_name(cur, index, offset)?)),
        }
    }

    /// Read the pool index at `offset` and resolve it as a module name.
    pub fn read_module(&self, offset: usize) -> Result<Option<Rc<str>>> {
        let cur = self.cur();
        match cur.u16(offset)? {
            0 => Ok(None),
            index => Ok(Some(self.pool.module_name(cur, index, offset)?)),
        }
    }

    /// Read the pool index at `offset` and resolve it as a package name.
    pub fn read_package(&self, offset: usize) -> Result<Option<Rc<str>>> {
        let cur = self.cur();
        match cur.u16(offset)? {
            0 => Ok(None),
            index => Ok(Some(self.pool.package_name(cur, index, offset)?)),
        }
    }

    /// Resolve any loadable constant pool entry to a tagged value.
    pub fn read_const(&self, index: u16) -> Result<ConstantValue> {
        let cur = self.cur();
        let at = self.class_file_offset;
        let offset = self.pool.offset_of(index, at)?;
        let tag = cur.u8(offset - 1)?;

        Ok(match tag {
            CONSTANT_INTEGER => ConstantValue::Integer(cur.i32(offset)?),
            CONSTANT_FLOAT => ConstantValue::Float(cur.f32(offset)?),
            CONSTANT_LONG => ConstantValue::Long(cur.i64(offset)?),
            CONSTANT_DOUBLE => ConstantValue::Double(cur.f64(offset)?),
            CONSTANT_CLASS => {
                ConstantValue::Class(self.pool.class_name(cur, index, offset)?)
            }
            CONSTANT_STRING => {
                ConstantValue::String(self.pool.utf8(cur, cur.u16(offset)?, offset)?)
            }
            CONSTANT_METHOD_TYPE => {
                ConstantValue::MethodType(self.pool.utf8(cur, cur.u16(offset)?, offset)?)
            }
            CONSTANT_METHOD_HANDLE => {
                ConstantValue::MethodHandle(self.pool.method_handle(cur, index, offset)?)
            }
            CONSTANT_DYNAMIC => ConstantValue::Dynamic(self.read_constant_dynamic(index)?),
            x => return Err(DecodeError::new(offset - 1, DecodeErrorKind::BadConstantTag(x))),
        })
    }

    /// Lazily resolve a `CONSTANT_Dynamic`; results are cached by index and
    /// repeated reads are value-equal.
    fn read_constant_dynamic(&self, index: u16) -> Result<Rc<ConstantDynamic>> {
        if let Some(cached) = self.pool.cached_dynamic(index) {
            return Ok(cached);
        }

        let cur = self.cur();
        let offset = self.pool.offset_of(index, self.class_file_offset)?;
        let bootstrap_index = cur.u16(offset)?;
        let (name, descriptor) = self.pool.name_and_type(cur, cur.u16(offset + 2)?, offset + 2)?;

        let (bootstrap_method, bootstrap_arguments) =
            self.read_bootstrap_method(bootstrap_index, offset)?;

        let value = Rc::new(ConstantDynamic {
            name,
            descriptor,
            bootstrap_method,
            bootstrap_arguments,
        });
        self.pool.cache_dynamic(index, value.clone());
        Ok(value)
    }

    /// Resolve bootstrap method `bootstrap_index` out of the offset table.
    pub(crate) fn read_bootstrap_method(
        &self,
        bootstrap_index: u16,
        at: usize,
    ) -> Result<(crate::constant::Handle, Vec<ConstantValue>)> {
        let cur = self.cur();
        let method_offset = match self.bootstrap_offsets.get(bootstrap_index as usize) {
            Some(&offset) => offset as usize,
            None => return Err(DecodeError::new(at, DecodeErrorKind::TruncatedInput)),
        };

        let handle = self
            .pool
            .method_handle(cur, cur.u16(method_offset)?, method_offset)?;
        let argument_count = cur.u16(method_offset + 2)?;
        let mut arguments = Vec::with_capacity(argument_count as usize);
        let mut offset = method_offset + 4;
        for _ in 0..argument_count {
            arguments.push(self.read_const(cur.u16(offset)?)?);
            offset += 2;
        }
        Ok((handle, arguments))
    }

    /// Offset of the class `attributes_count` field, skipping the interface,
    /// field and method tables.
    pub fn first_attribute_offset(&self) -> Result<usize> {
        let cur = self.cur();
        let interfaces_count = cur.u16(self.header + 6)? as usize;
        let mut offset = self.header + 8 + 2 * interfaces_count;

        // Fields, then methods: 8 bytes of fixed fields plus attributes.
        for _ in 0..2 {
            let member_count = cur.u16(offset)?;
            offset += 2;
            for _ in 0..member_count {
                let mut attribute_count = cur.u16(offset + 6)?;
                offset += 8;
                while attribute_count > 0 {
                    let length = cur.u32(offset + 2)? as usize;
                    offset += 6 + length;
                    attribute_count -= 1;
                }
            }
        }

        Ok(offset)
    }

    /// Locate `BootstrapMethods` in the class attribute table and record the
    /// start offset of each `bootstrap_method` struct.
    fn read_bootstrap_offsets(&self) -> Result<Vec<u32>> {
        let cur = self.cur();
        let attributes_offset = self.first_attribute_offset()?;
        let mut attribute_count = cur.u16(attributes_offset)?;
        let mut offset = attributes_offset + 2;

        while attribute_count > 0 {
            let name = self.pool.utf8(cur, cur.u16(offset)?, offset)?;
            let length = cur.u32(offset + 2)? as usize;
            let payload = offset + 6;

            if &*name == "BootstrapMethods" {
                let num_methods = cur.u16(payload)?;
                let mut offsets = Vec::with_capacity(num_methods as usize);
                let mut method_offset = payload + 2;
                for _ in 0..num_methods {
                    offsets.push(method_offset as u32);
                    let argument_count = cur.u16(method_offset + 2)? as usize;
                    method_offset += 4 + 2 * argument_count;
                }
                return Ok(offsets);
            }

            offset = payload + length;
            attribute_count -= 1;
        }

        Ok(Vec::new())
    }

    /// Read one attribute through the prototype list, falling back to a
    /// generic opaque attribute holding the raw payload bytes.
    pub(crate) fn read_attribute(
        &self,
        prototypes: &[&dyn AttributePrototype],
        name: &str,
        payload_offset: usize,
        payload_length: usize,
        code_offset: Option<usize>,
        labels: Option<&mut LabelTable>,
    ) -> Result<Attribute> {
        for prototype in prototypes {
            if prototype.type_name() == name {
                return prototype.read(self, payload_offset, payload_length, code_offset, labels);
            }
        }
        Ok(Attribute::opaque(
            name,
            self.cur().bytes(payload_offset, payload_length)?,
        ))
    }

    /// Drive `visitor` with the full contents of the class file.
    pub fn accept(
        &self,
        visitor: &mut dyn ClassVisitor,
        prototypes: &[&dyn AttributePrototype],
        options: ParseOptions,
    ) -> Result<()> {
        let cur = self.cur();
        let pool = &self.pool;

        let mut access = AccessFlags::from_bits_truncate(u32::from(cur.u16(self.header)?));
        let this_class = self.class_name()?;
        let super_class = self.super_name()?;
        let interfaces = self.interfaces()?;
        debug!("decoding class {}", this_class);

        // Class attribute walk: record offsets of known attributes, collect
        // the rest in source order.
        let mut source_file = None;
        let mut source_debug_extension = None;
        let mut signature = None;
        let mut inner_classes_offset = None;
        let mut enclosing_method_offset = None;
        let mut nest_host = None;
        let mut nest_members_offset = None;
        let mut permitted_subclasses_offset = None;
        let mut record_offset = None;
        let mut module_offset = None;
        let mut module_packages_offset = None;
        let mut module_main_class = None;
        let mut visible_annotations = None;
        let mut invisible_annotations = None;
        let mut visible_type_annotations = None;
        let mut invisible_type_annotations = None;
        let mut attributes: Vec<Attribute> = Vec::new();

        let attributes_offset = self.first_attribute_offset()?;
        let mut attribute_count = cur.u16(attributes_offset)?;
        let mut offset = attributes_offset + 2;
        while attribute_count > 0 {
            let name = pool.utf8(cur, cur.u16(offset)?, offset)?;
            let length = cur.u32(offset + 2)? as usize;
            let payload = offset + 6;
            cur.bytes(payload, length)?;

            match &*name {
                "SourceFile" => source_file = self.read_utf8(payload)?,
                "InnerClasses" => inner_classes_offset = Some(payload),
                "EnclosingMethod" => enclosing_method_offset = Some(payload),
                "NestHost" => nest_host = self.read_class(payload)?,
                "NestMembers" => nest_members_offset = Some(payload),
                "PermittedSubclasses" => permitted_subclasses_offset = Some(payload),
                "Signature" => signature = self.read_utf8(payload)?,
                "RuntimeVisibleAnnotations" => visible_annotations = Some(payload),
                "RuntimeInvisibleAnnotations" => invisible_annotations = Some(payload),
                "RuntimeVisibleTypeAnnotations" => visible_type_annotations = Some(payload),
                "RuntimeInvisibleTypeAnnotations" => invisible_type_annotations = Some(payload),
                "Deprecated" => access |= AccessFlags::DEPRECATED,
                "Synthetic" => access |= AccessFlags::SYNTHETIC,
                "SourceDebugExtension" => {
                    let bytes = cur.bytes(payload, length)?;
                    let mut scratch = Vec::new();
                    source_debug_extension = Some(crate::constant::decode_modified_utf8(
                        bytes,
                        payload,
                        &mut scratch,
                    )?);
                }
                "Record" => {
                    record_offset = Some(payload);
                    access |= AccessFlags::RECORD;
                }
                "Module" => module_offset = Some(payload),
                "ModuleMainClass" => module_main_class = self.read_class(payload)?,
                "ModulePackages" => module_packages_offset = Some(payload),
                // Indexed at construction time; never re-emitted.
                "BootstrapMethods" => {}
                _ => attributes.push(self.read_attribute(
                    prototypes,
                    &name,
                    payload,
                    length,
                    None,
                    None,
                )?),
            }

            offset = payload + length;
            attribute_count -= 1;
        }

        visitor.visit(
            self.version,
            access,
            &this_class,
            signature.as_deref(),
            super_class.as_deref(),
            &interfaces,
        );

        if !options.skip_debug() && (source_file.is_some() || source_debug_extension.is_some()) {
            visitor.visit_source(source_file.as_deref(), source_debug_extension.as_deref());
        }

        if let Some(module_offset) = module_offset {
            module::read_module_attributes(
                self,
                visitor,
                module_offset,
                module_packages_offset,
                module_main_class,
            )?;
        }

        if let Some(nest_host) = &nest_host {
            visitor.visit_nest_host(nest_host);
        }

        if let Some(enclosing) = enclosing_method_offset {
            let owner = pool.class_name(cur, cur.u16(enclosing)?, enclosing)?;
            let method = match cur.u16(enclosing + 2)? {
                0 => None,
                index => Some(pool.name_and_type(cur, index, enclosing + 2)?),
            };
            visitor.visit_outer_class(
                &owner,
                method.as_ref().map(|(name, _)| &**name),
                method.as_ref().map(|(_, descriptor)| &**descriptor),
            );
        }

        if let Some(at) = visible_annotations {
            self.read_annotations(visitor, at, true)?;
        }
        if let Some(at) = invisible_annotations {
            self.read_annotations(visitor, at, false)?;
        }
        if let Some(at) = visible_type_annotations {
            self.read_class_type_annotations(visitor, at, true)?;
        }
        if let Some(at) = invisible_type_annotations {
            self.read_class_type_annotations(visitor, at, false)?;
        }

        for attribute in attributes {
            visitor.visit_attribute(attribute);
        }

        if let Some(mut at) = nest_members_offset {
            let mut count = cur.u16(at)?;
            at += 2;
            while count > 0 {
                let member = pool.class_name(cur, cur.u16(at)?, at)?;
                visitor.visit_nest_member(&member);
                at += 2;
                count -= 1;
            }
        }

        if let Some(mut at) = permitted_subclasses_offset {
            let mut count = cur.u16(at)?;
            at += 2;
            while count > 0 {
                let subclass = pool.class_name(cur, cur.u16(at)?, at)?;
                visitor.visit_permitted_subclass(&subclass);
                at += 2;
                count -= 1;
            }
        }

        if let Some(mut at) = inner_classes_offset {
            let mut count = cur.u16(at)?;
            at += 2;
            while count > 0 {
                let inner = pool.class_name(cur, cur.u16(at)?, at)?;
                let outer = match cur.u16(at + 2)? {
                    0 => None,
                    index => Some(pool.class_name(cur, index, at + 2)?),
                };
                let inner_name = match cur.u16(at + 4)? {
                    0 => None,
                    index => Some(pool.utf8(cur, index, at + 4)?),
                };
                let inner_access =
                    AccessFlags::from_bits_truncate(u32::from(cur.u16(at + 6)?));
                visitor.visit_inner_class(
                    &inner,
                    outer.as_deref(),
                    inner_name.as_deref(),
                    inner_access,
                );
                at += 8;
                count -= 1;
            }
        }

        if let Some(at) = record_offset {
            let mut count = cur.u16(at)?;
            let mut component_offset = at + 2;
            while count > 0 {
                component_offset =
                    self.read_record_component(visitor, prototypes, component_offset)?;
                count -= 1;
            }
        }

        let mut member_offset = self.header + 8 + 2 * interfaces.len();
        let mut field_count = cur.u16(member_offset)?;
        member_offset += 2;
        while field_count > 0 {
            member_offset = self.read_field(visitor, prototypes, member_offset)?;
            field_count -= 1;
        }

        let mut method_count = cur.u16(member_offset)?;
        member_offset += 2;
        while method_count > 0 {
            member_offset = self.read_method(visitor, prototypes, options, member_offset)?;
            method_count -= 1;
        }

        visitor.visit_end();
        Ok(())
    }

    /// Runtime (in)visible annotations on the class itself.
    fn read_annotations(
        &self,
        visitor: &mut dyn ClassVisitor,
        at: usize,
        visible: bool,
    ) -> Result<()> {
        let cur = self.cur();
        let mut count = cur.u16(at)?;
        let mut offset = at + 2;
        while count > 0 {
            let descriptor = self.pool.utf8(cur, cur.u16(offset)?, offset)?;
            let nested = visitor.visit_annotation(&descriptor, visible);
            offset = annotation::read_element_values(self, offset + 2, true, nested)?;
            count -= 1;
        }
        Ok(())
    }

    fn read_class_type_annotations(
        &self,
        visitor: &mut dyn ClassVisitor,
        at: usize,
        visible: bool,
    ) -> Result<()> {
        let cur = self.cur();
        let mut count = cur.u16(at)?;
        let mut offset = at + 2;
        while count > 0 {
            let target = annotation::read_type_annotation_target(self, offset, None)?;
            let descriptor = self.pool.utf8(cur, cur.u16(target.next)?, target.next)?;
            let nested = visitor.visit_type_annotation(
                target.type_ref,
                target.type_path.as_ref(),
                &descriptor,
                visible,
            );
            offset = annotation::read_element_values(self, target.next + 2, true, nested)?;
            count -= 1;
        }
        Ok(())
    }

    /// Decode one `field_info`; returns the offset just past it.
    fn read_field(
        &self,
        visitor: &mut dyn ClassVisitor,
        prototypes: &[&dyn AttributePrototype],
        at: usize,
    ) -> Result<usize> {
        let cur = self.cur();
        let pool = &self.pool;

        let mut access = AccessFlags::from_bits_truncate(u32::from(cur.u16(at)?));
        let name = pool.utf8(cur, cur.u16(at + 2)?, at + 2)?;
        let descriptor = pool.utf8(cur, cur.u16(at + 4)?, at + 4)?;
        trace!("field {} {}", name, descriptor);

        let mut constant_value = None;
        let mut signature = None;
        let mut visible_annotations = None;
        let mut invisible_annotations = None;
        let mut visible_type_annotations = None;
        let mut invisible_type_annotations = None;
        let mut attributes: Vec<Attribute> = Vec::new();

        let mut attribute_count = cur.u16(at + 6)?;
        let mut offset = at + 8;
        while attribute_count > 0 {
            let attr_name = pool.utf8(cur, cur.u16(offset)?, offset)?;
            let length = cur.u32(offset + 2)? as usize;
            let payload = offset + 6;
            cur.bytes(payload, length)?;

            match &*attr_name {
                "ConstantValue" => {
                    constant_value = Some(self.read_const(cur.u16(payload)?)?);
                }
                "Signature" => signature = self.read_utf8(payload)?,
                "Deprecated" => access |= AccessFlags::DEPRECATED,
                "Synthetic" => access |= AccessFlags::SYNTHETIC,
                "RuntimeVisibleAnnotations" => visible_annotations = Some(payload),
                "RuntimeInvisibleAnnotations" => invisible_annotations = Some(payload),
                "RuntimeVisibleTypeAnnotations" => visible_type_annotations = Some(payload),
                "RuntimeInvisibleTypeAnnotations" => invisible_type_annotations = Some(payload),
                _ => attributes.push(self.read_attribute(
                    prototypes,
                    &attr_name,
                    payload,
                    length,
                    None,
                    None,
                )?),
            }

            offset = payload + length;
            attribute_count -= 1;
        }

        let field_visitor = match visitor.visit_field(
            access,
            &name,
            &descriptor,
            signature.as_deref(),
            constant_value.as_ref(),
        ) {
            Some(v) => v,
            None => return Ok(offset),
        };

        for &(annotations, visible) in &[
            (visible_annotations, true),
            (invisible_annotations, false),
        ] {
            if let Some(at) = annotations {
                let mut count = cur.u16(at)?;
                let mut annotation_offset = at + 2;
                while count > 0 {
                    let descriptor =
                        pool.utf8(cur, cur.u16(annotation_offset)?, annotation_offset)?;
                    let nested = field_visitor.visit_annotation(&descriptor, visible);
                    annotation_offset = annotation::read_element_values(
                        self,
                        annotation_offset + 2,
                        true,
                        nested,
                    )?;
                    count -= 1;
                }
            }
        }

        for &(type_annotations, visible) in &[
            (visible_type_annotations, true),
            (invisible_type_annotations, false),
        ] {
            if let Some(at) = type_annotations {
                let mut count = cur.u16(at)?;
                let mut annotation_offset = at + 2;
                while count > 0 {
                    let target =
                        annotation::read_type_annotation_target(self, annotation_offset, None)?;
                    let descriptor = pool.utf8(cur, cur.u16(target.next)?, target.next)?;
                    let nested = field_visitor.visit_type_annotation(
                        target.type_ref,
                        target.type_path.as_ref(),
                        &descriptor,
                        visible,
                    );
                    annotation_offset =
                        annotation::read_element_values(self, target.next + 2, true, nested)?;
                    count -= 1;
                }
            }
        }

        for attribute in attributes {
            field_visitor.visit_attribute(attribute);
        }

        field_visitor.visit_end();
        Ok(offset)
    }

    /// Decode one `record_component_info`; returns the offset just past it.
    fn read_record_component(
        &self,
        visitor: &mut dyn ClassVisitor,
        prototypes: &[&dyn AttributePrototype],
        at: usize,
    ) -> Result<usize> {
        let cur = self.cur();
        let pool = &self.pool;

        let name = pool.utf8(cur, cur.u16(at)?, at)?;
        let descriptor = pool.utf8(cur, cur.u16(at + 2)?, at + 2)?;

        let mut signature = None;
        let mut visible_annotations = None;
        let mut invisible_annotations = None;
        let mut visible_type_annotations = None;
        let mut invisible_type_annotations = None;
        let mut attributes: Vec<Attribute> = Vec::new();

        let mut attribute_count = cur.u16(at + 4)?;
        let mut offset = at + 6;
        while attribute_count > 0 {
            let attr_name = pool.utf8(cur, cur.u16(offset)?, offset)?;
            let length = cur.u32(offset + 2)? as usize;
            let payload = offset + 6;
            cur.bytes(payload, length)?;

            match &*attr_name {
                "Signature" => signature = self.read_utf8(payload)?,
                "RuntimeVisibleAnnotations" => visible_annotations = Some(payload),
                "RuntimeInvisibleAnnotations" => invisible_annotations = Some(payload),
                "RuntimeVisibleTypeAnnotations" => visible_type_annotations = Some(payload),
                "RuntimeInvisibleTypeAnnotations" => invisible_type_annotations = Some(payload),
                _ => attributes.push(self.read_attribute(
                    prototypes,
                    &attr_name,
                    payload,
                    length,
                    None,
                    None,
                )?),
            }

            offset = payload + length;
            attribute_count -= 1;
        }

        let component_visitor =
            match visitor.visit_record_component(&name, &descriptor, signature.as_deref()) {
                Some(v) => v,
                None => return Ok(offset),
            };

        for &(annotations, visible) in &[
            (visible_annotations, true),
            (invisible_annotations, false),
        ] {
            if let Some(at) = annotations {
                let mut count = cur.u16(at)?;
                let mut annotation_offset = at + 2;
                while count > 0 {
                    let descriptor =
                        pool.utf8(cur, cur.u16(annotation_offset)?, annotation_offset)?;
                    let nested = component_visitor.visit_annotation(&descriptor, visible);
                    annotation_offset = annotation::read_element_values(
                        self,
                        annotation_offset + 2,
                        true,
                        nested,
                    )?;
                    count -= 1;
                }
            }
        }

        for &(type_annotations, visible) in &[
            (visible_type_annotations, true),
            (invisible_type_annotations, false),
        ] {
            if let Some(at) = type_annotations {
                let mut count = cur.u16(at)?;
                let mut annotation_offset = at + 2;
                while count > 0 {
                    let target =
                        annotation::read_type_annotation_target(self, annotation_offset, None)?;
                    let descriptor = pool.utf8(cur, cur.u16(target.next)?, target.next)?;
                    let nested = component_visitor.visit_type_annotation(
                        target.type_ref,
                        target.type_path.as_ref(),
                        &descriptor,
                        visible,
                    );
                    annotation_offset =
                        annotation::read_element_values(self, target.next + 2, true, nested)?;
                    count -= 1;
                }
            }
        }

        for attribute in attributes {
            component_visitor.visit_attribute(attribute);
        }

        component_visitor.visit_end();
        Ok(offset)
    }

    /// Decode one `method_info`; returns the offset just past it.
    fn read_method(
        &self,
        visitor: &mut dyn ClassVisitor,
        prototypes: &[&dyn AttributePrototype],
        options: ParseOptions,
        at: usize,
    ) -> Result<usize> {
        let cur = self.cur();
        let pool = &self.pool;

        let mut access = AccessFlags::from_bits_truncate(u32::from(cur.u16(at)?));
        let name = pool.utf8(cur, cur.u16(at + 2)?, at + 2)?;
        let descriptor = pool.utf8(cur, cur.u16(at + 4)?, at + 4)?;
        trace!("method {} {}", name, descriptor);

        let mut code_offset = None;
        let mut exceptions_offset = None;
        let mut signature = None;
        let mut annotation_default = None;
        let mut method_parameters = None;
        let mut visible_annotations = None;
        let mut invisible_annotations = None;
        let mut visible_type_annotations = None;
        let mut invisible_type_annotations = None;
        let mut visible_parameter_annotations = None;
        let mut invisible_parameter_annotations = None;
        let mut attributes: Vec<Attribute> = Vec::new();

        let mut attribute_count = cur.u16(at + 6)?;
        let mut offset = at + 8;
        while attribute_count > 0 {
            let attr_name = pool.utf8(cur, cur.u16(offset)?, offset)?;
            let length = cur.u32(offset + 2)? as usize;
            let payload = offset + 6;
            cur.bytes(payload, length)?;

            match &*attr_name {
                "Code" => {
                    if !options.contains(ParseOptions::SKIP_CODE) {
                        code_offset = Some(payload);
                    }
                }
                "Exceptions" => exceptions_offset = Some(payload),
                "Signature" => signature = self.read_utf8(payload)?,
                "Deprecated" => access |= AccessFlags::DEPRECATED,
                "Synthetic" => access |= AccessFlags::SYNTHETIC,
                "RuntimeVisibleAnnotations" => visible_annotations = Some(payload),
                "RuntimeInvisibleAnnotations" => invisible_annotations = Some(payload),
                "RuntimeVisibleTypeAnnotations" => visible_type_annotations = Some(payload),
                "RuntimeInvisibleTypeAnnotations" => invisible_type_annotations = Some(payload),
                "RuntimeVisibleParameterAnnotations" => {
                    visible_parameter_annotations = Some(payload)
                }
                "RuntimeInvisibleParameterAnnotations" => {
                    invisible_parameter_annotations = Some(payload)
                }
                "AnnotationDefault" => annotation_default = Some(payload),
                "MethodParameters" => {
                    if !options.skip_debug() {
                        method_parameters = Some(payload);
                    }
                }
                _ => attributes.push(self.read_attribute(
                    prototypes,
                    &attr_name,
                    payload,
                    length,
                    None,
                    None,
                )?),
            }

            offset = payload + length;
            attribute_count -= 1;
        }

        let exceptions = match exceptions_offset {
            Some(mut exceptions_at) => {
                let mut count = cur.u16(exceptions_at)?;
                exceptions_at += 2;
                let mut names = Vec::with_capacity(count as usize);
                while count > 0 {
                    names.push(pool.class_name(cur, cur.u16(exceptions_at)?, exceptions_at)?);
                    exceptions_at += 2;
                    count -= 1;
                }
                names
            }
            None => Vec::new(),
        };

        let method_visitor = match visitor.visit_method(
            access,
            &name,
            &descriptor,
            signature.as_deref(),
            &exceptions,
        ) {
            Some(v) => v,
            None => return Ok(offset),
        };

        if let Some(mut parameters_at) = method_parameters {
            let mut count = cur.u8(parameters_at)?;
            parameters_at += 1;
            while count > 0 {
                let parameter_name = self.read_utf8(parameters_at)?;
                let parameter_access =
                    AccessFlags::from_bits_truncate(u32::from(cur.u16(parameters_at + 2)?));
                method_visitor.visit_parameter(parameter_name.as_deref(), parameter_access);
                parameters_at += 4;
                count -= 1;
            }
        }

        if let Some(default_at) = annotation_default {
            match method_visitor.visit_annotation_default() {
                Some(nested) => {
                    annotation::read_element_value(self, default_at, None, Some(&mut *nested))?;
                    nested.visit_end();
                }
                None => {
                    annotation::read_element_value(self, default_at, None, None)?;
                }
            }
        }

        for &(annotations, visible) in &[
            (visible_annotations, true),
            (invisible_annotations, false),
        ] {
            if let Some(annotations_at) = annotations {
                let mut count = cur.u16(annotations_at)?;
                let mut annotation_offset = annotations_at + 2;
                while count > 0 {
                    let annotation_descriptor =
                        pool.utf8(cur, cur.u16(annotation_offset)?, annotation_offset)?;
                    let nested =
                        method_visitor.visit_annotation(&annotation_descriptor, visible);
                    annotation_offset = annotation::read_element_values(
                        self,
                        annotation_offset + 2,
                        true,
                        nested,
                    )?;
                    count -= 1;
                }
            }
        }

        for &(type_annotations, visible) in &[
            (visible_type_annotations, true),
            (invisible_type_annotations, false),
        ] {
            if let Some(annotations_at) = type_annotations {
                let mut count = cur.u16(annotations_at)?;
                let mut annotation_offset = annotations_at + 2;
                while count > 0 {
                    let target =
                        annotation::read_type_annotation_target(self, annotation_offset, None)?;
                    let annotation_descriptor =
                        pool.utf8(cur, cur.u16(target.next)?, target.next)?;
                    let nested = method_visitor.visit_type_annotation(
                        target.type_ref,
                        target.type_path.as_ref(),
                        &annotation_descriptor,
                        visible,
                    );
                    annotation_offset =
                        annotation::read_element_values(self, target.next + 2, true, nested)?;
                    count -= 1;
                }
            }
        }

        for &(parameter_annotations, visible) in &[
            (visible_parameter_annotations, true),
            (invisible_parameter_annotations, false),
        ] {
            if let Some(annotations_at) = parameter_annotations {
                let parameter_count = cur.u8(annotations_at)?;
                method_visitor.visit_annotable_parameter_count(parameter_count, visible);

                let mut annotation_offset = annotations_at + 1;
                for parameter in 0..parameter_count {
                    let mut count = cur.u16(annotation_offset)?;
                    annotation_offset += 2;
                    while count > 0 {
                        let annotation_descriptor =
                            pool.utf8(cur, cur.u16(annotation_offset)?, annotation_offset)?;
                        let nested = method_visitor.visit_parameter_annotation(
                            parameter,
                            &annotation_descriptor,
                            visible,
                        );
                        annotation_offset = annotation::read_element_values(
                            self,
                            annotation_offset + 2,
                            true,
                            nested,
                        )?;
                        count -= 1;
                    }
                }
            }
        }

        for attribute in attributes {
            method_visitor.visit_attribute(attribute);
        }

        if let Some(code_at) = code_offset {
            let mut context = Context {
                options,
                method_access: access,
                method_name: name.clone(),
                method_descriptor: descriptor.clone(),
            };
            method_visitor.visit_code();
            code::read_code(self, method_visitor, prototypes, &mut context, code_at)?;
        }

        method_visitor.visit_end();
        Ok(offset)
    }
}
