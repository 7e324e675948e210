//! A streaming decoder for the JVM `ClassFile` format, aimed at compliance
//! with the Java SE 17+ class file specification. The reader performs a
//! single constant-pool sweep at construction time and then drives a
//! user-supplied [`ClassVisitor`] with the class contents in canonical order:
//! header, attributes, record components, fields, and methods with their
//! bytecode, stack map frames and annotations.
//!
//! ```no_run
//! use class_reader::{ClassReader, ClassVisitor, ParseOptions};
//!
//! struct NamePrinter;
//!
//! impl ClassVisitor for NamePrinter {}
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("Example.class")?;
//! let reader = ClassReader::new(bytes)?;
//! println!("read {}", reader.class_name()?);
//! reader.accept(&mut NamePrinter, &[], ParseOptions::empty())?;
//! # Ok(())
//! # }
//! ```

pub mod annotation;
pub mod attribute;
pub mod class;
pub mod code;
pub mod constant;
pub mod error;
pub mod frame;
pub mod loader;
pub mod module;
pub mod opcodes;
pub mod read;
pub mod visitor;

#[cfg(test)]
pub(crate) mod test_util;

pub use crate::annotation::{AnnotationValue, TypePath, TypePathStep, TypeRef};
pub use crate::attribute::{Attribute, AttributePrototype};
pub use crate::class::{
    AccessFlags, ClassReader, ClassVersion, ParseOptions, MAX_SUPPORTED_MAJOR,
};
pub use crate::constant::{ConstantDynamic, ConstantValue, Handle, ReferenceKind};
pub use crate::error::{DecodeError, DecodeErrorKind, LoadError, Result};
pub use crate::frame::{FrameKind, VerificationType};
pub use crate::loader::ClassPath;
pub use crate::visitor::{
    AnnotationVisitor, ClassVisitor, FieldVisitor, Label, LabelTable, MethodVisitor,
    ModuleVisitor, RecordComponentVisitor,
};
