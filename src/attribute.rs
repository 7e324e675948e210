//! Non-standard attribute handling.
//!
//! Attributes the walker does not recognize by name are handed to a consumer
//! supplied list of [`AttributePrototype`]s; the first prototype whose
//! `type_name` matches reads the payload. When none matches, the walker
//! builds a generic [`Attribute`] holding the raw bytes.

use crate::class::ClassReader;
use crate::error::Result;
use crate::visitor::LabelTable;

/// A decoded non-standard attribute: its name and an opaque payload. The
/// default payload is the attribute's raw bytes; prototypes may store any
/// pre-digested form instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub type_name: String,
    pub content: Vec<u8>,
}

impl Attribute {
    pub(crate) fn opaque(type_name: &str, content: &[u8]) -> Self {
        Attribute {
            type_name: type_name.to_string(),
            content: content.to_vec(),
        }
    }
}

/// Consumer extension point for attributes outside the JVMS set.
///
/// `read` receives the reader (for its public read primitives), the offset
/// and length of the attribute payload (past the six-byte attribute header),
/// and — for attributes inside a `Code` attribute — the offset of the code
/// array plus the method's label table, so bytecode offsets can be resolved
/// to labels.
pub trait AttributePrototype {
    /// The attribute name this prototype recognizes.
    fn type_name(&self) -> &str;

    fn read(
        &self,
        reader: &ClassReader,
        payload_offset: usize,
        payload_length: usize,
        code_offset: Option<usize>,
        labels: Option<&mut LabelTable>,
    ) -> Result<Attribute>;
}
