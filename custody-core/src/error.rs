//! Stable error taxonomy, shared between the safe tree API and the FFI shim.
//!
//! Mirrors `angzarr-ffi::KernelError` in spirit: a flat `#[repr(u8)]` enum of
//! stable identifiers, one per documented failure mode. `Success` is not a
//! member here, since the idiomatic Rust surface represents it as `Ok(..)`;
//! only `custody-ffi` needs a wire-level status code that also covers the
//! success case, and builds that on top of this enum (see
//! `custody_ffi::CustodyStatus`).

/// Every non-success outcome a custody-tracking operation can report.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CustodyError {
    /// The tree handle passed to an FFI entry point was null.
    NullTree,
    /// An iterator handle was expected to reference a live node but did not.
    NullNode,
    /// An out-parameter meant to receive a range was null.
    NullRange,
    /// `create` was asked for a zero-capacity arena.
    SizeZero,
    /// `create` was asked for a capacity above `MAX_CAPACITY`.
    ExceededMaxSize,
    /// Arena allocation failed (out of memory).
    MemErr,
    /// The arena has no free node to satisfy an insert or split.
    FailTreeFull,
    /// `insert` was called with a value already covered by some range.
    FailInsertDuplicate,
    /// `delete` was called with a value not covered by any range.
    FailValueNotFound,
}

/// The subset of [`CustodyError`] that `create` can return.
///
/// A narrower type than `CustodyError` because most of the flat taxonomy
/// (`FailTreeFull`, `FailInsertDuplicate`, ...) cannot arise before a tree
/// exists; `NullTree` likewise cannot arise in the safe API, where ownership
/// of a `CustodyTree` value replaces a nullable handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CreateError {
    SizeZero,
    ExceededMaxSize,
    MemErr,
}

impl From<CreateError> for CustodyError {
    fn from(e: CreateError) -> Self {
        match e {
            CreateError::SizeZero => CustodyError::SizeZero,
            CreateError::ExceededMaxSize => CustodyError::ExceededMaxSize,
            CreateError::MemErr => CustodyError::MemErr,
        }
    }
}
