//! Handles used to identify members of a [`crate::Module`].
//!
//! Types, methods and fields are addressed by dense indices into the
//! module's own tables. Instructions are addressed by an [`InstrId`]
//! that is assigned once, at parse time or at construction time, and
//! is never reused for the lifetime of the owning [`crate::MethodBody`] —
//! even instructions inserted by splicing get a fresh id. This lets
//! operands and exception-handler boundaries keep referring to "the
//! instruction that used to be here" across a splice without tracking
//! vector positions by hand.

use std::fmt;

macro_rules! index_type {
    ($name:ident) => {
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(pub u32);

        impl $name {
            #[allow(missing_docs)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self(v as u32)
            }
        }
    };
}

index_type!(TypeId);
index_type!(MethodId);
index_type!(FieldId);

/// Identifies a single instruction within one [`crate::MethodBody`].
///
/// Ids are scoped to the owning body; comparing ids from two different
/// bodies is meaningless. `0` is a valid id (the body's first
/// instruction, at parse time).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct InstrId(pub u64);

impl fmt::Debug for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I#{}", self.0)
    }
}
