//! On-disk layout of the module container this engine reads and writes.
//!
//! This is a private, internally-consistent binary format (there is no
//! external reader/writer to stay bug-for-bug compatible with) —
//! `writer::write_module` and `reader::parse_module` are each other's
//! only client. The layout is intentionally table-shaped, the way the
//! metadata tables in real managed object formats are, even though
//! nothing outside this crate needs to parse it:
//!
//! ```text
//! header
//!   magic: [u8; 4]            b"CVM1"
//!   module_name: string
//!   type_count: u32
//!   method_count: u32
//!   field_count: u32
//! type table (type_count rows)
//!   namespace: string, name: string
//!   declaring_type: u32 (u32::MAX = none)
//!   attributes: string_list
//!   method_count: u32, method ids: u32 * method_count
//!   field_count: u32, field ids: u32 * field_count
//! method table (method_count rows)
//!   name: string, declaring_type: u32, attributes: string_list
//!   is_native: bool, is_static_constructor: bool
//!   return_type: u32 (u32::MAX = void)
//!   has_body: bool
//!   [if has_body] body
//! field table (field_count rows)
//!   name: string, declaring_type: u32, type_ref: u32
//! ```
//!
//! A method body is encoded as:
//! ```text
//!   local_count: u32, local type ids: u32 * local_count
//!   instruction_count: u32, instructions
//!   handler_count: u32, handlers
//! ```
//! Each instruction is one opcode tag byte, an opcode-specific payload,
//! then one operand (tag byte + payload). `Operand::Instr`/`InstrList`
//! payloads are encoded as byte offsets into this body's instruction
//! stream, resolved against the writer's freshly computed
//! `MethodBody::final_offsets` and the reader's running offset counter.

use zerocopy::{AsBytes, FromZeroes, KnownLayout, Unaligned, FromBytes, LE, U32};

pub const MAGIC: [u8; 4] = *b"CVM1";
pub const NO_TYPE: u32 = u32::MAX;

/// The module container's fixed-size leading header. Everything after
/// it (the module name and the type/method/field tables) is
/// variable-length and is decoded by `reader`/`writer` directly, the
/// way the teacher's DBI Modules Substream pairs a fixed
/// `ModuleInfoFixed` header with trailing NUL-terminated strings.
#[derive(Unaligned, AsBytes, FromBytes, FromZeroes, KnownLayout, Clone, Debug)]
#[repr(C)]
pub struct ModuleHeaderFixed {
    pub magic: [u8; 4],
    pub type_count: U32<LE>,
    pub method_count: U32<LE>,
    pub field_count: U32<LE>,
}

static_assertions::const_assert_eq!(std::mem::size_of::<ModuleHeaderFixed>(), 16);
