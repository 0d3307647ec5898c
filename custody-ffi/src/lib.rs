//! Literal opaque-handle C surface over [`custody_rbtree::CustodyTree`].
//!
//! `custody-rbtree`'s own `CustodyTree` is the idiomatic Rust API: it
//! returns `Result`, borrows `self`, and drops its arena the ordinary way.
//! This crate exists only for external collaborators (the bundle codec,
//! storage plug-ins, scripting bindings) that can only consume a stable
//! `extern "C"` surface: a nullable opaque handle, a flat `#[repr(i32)]`
//! status code, and out-parameters in place of return values. Grounded in
//! `angzarr-ffi`'s `KernelPtr`/`KernelError`/`KernelResult` pattern.

#![cfg_attr(not(test), no_std)]
#![allow(non_camel_case_types)]

extern crate alloc;

use alloc::boxed::Box;
use core::ptr;

use libc::{c_int, size_t};

use custody_core::CustodyError;
use custody_rbtree::{CreateError, CustodyTree, InsertOutcome, NodeHandle};

static_assertions::assert_eq_size!(CustodyHandle, *mut core::ffi::c_void);
static_assertions::assert_eq_size!(CustodyNodeHandle, u32);
static_assertions::assert_eq_size!(CustodyStatus, i32);

/// Flat `#[repr(i32)]` mirror of [`CustodyError`] plus the `Success` case
/// the error-only type deliberately omits.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CustodyStatus {
    Success = 0,
    NullTree = 1,
    NullNode = 2,
    NullRange = 3,
    SizeZero = 4,
    ExceededMaxSize = 5,
    MemErr = 6,
    FailTreeFull = 7,
    FailInsertDuplicate = 8,
    FailValueNotFound = 9,
}

impl From<CustodyError> for CustodyStatus {
    fn from(e: CustodyError) -> Self {
        match e {
            CustodyError::NullTree => CustodyStatus::NullTree,
            CustodyError::NullNode => CustodyStatus::NullNode,
            CustodyError::NullRange => CustodyStatus::NullRange,
            CustodyError::SizeZero => CustodyStatus::SizeZero,
            CustodyError::ExceededMaxSize => CustodyStatus::ExceededMaxSize,
            CustodyError::MemErr => CustodyStatus::MemErr,
            CustodyError::FailTreeFull => CustodyStatus::FailTreeFull,
            CustodyError::FailInsertDuplicate => CustodyStatus::FailInsertDuplicate,
            CustodyError::FailValueNotFound => CustodyStatus::FailValueNotFound,
        }
    }
}

impl From<CreateError> for CustodyStatus {
    fn from(e: CreateError) -> Self {
        CustodyStatus::from(CustodyError::from(e))
    }
}

/// Opaque, nullable handle to a boxed [`CustodyTree`]. `custody_create`
/// produces one; `custody_destroy` consumes it.
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct CustodyHandle(*mut CustodyTree);

impl CustodyHandle {
    const NULL: CustodyHandle = CustodyHandle(ptr::null_mut());

    /// # Safety
    /// `self` must be either `NULL` or a pointer produced by
    /// `custody_create` and not yet passed to `custody_destroy`.
    unsafe fn as_mut(&self) -> Option<&mut CustodyTree> {
        self.0.as_mut()
    }
}

/// Opaque handle into a tree's in-order walk, returned by
/// `custody_iterator_first`/`custody_iterator_next`.
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct CustodyNodeHandle(u32);

impl CustodyNodeHandle {
    const NONE: CustodyNodeHandle = CustodyNodeHandle(u32::MAX);

    fn to_node_handle(self) -> NodeHandle {
        NodeHandle::from_raw(self.0)
    }

    fn from_node_handle(h: NodeHandle) -> Self {
        CustodyNodeHandle(h.to_raw())
    }
}

/// Create a tree with capacity for `max_size` ranges and write its handle
/// to `*out_handle`. `out_handle` must not be null.
///
/// # Safety
/// `out_handle` must point to valid, writable memory for a `CustodyHandle`.
#[no_mangle]
pub unsafe extern "C" fn custody_create(
    max_size: u32,
    out_handle: *mut CustodyHandle,
) -> CustodyStatus {
    if out_handle.is_null() {
        return CustodyStatus::NullTree;
    }
    match CustodyTree::create(max_size) {
        Ok(tree) => {
            let boxed = Box::into_raw(Box::new(tree));
            *out_handle = CustodyHandle(boxed);
            CustodyStatus::Success
        }
        Err(e) => {
            *out_handle = CustodyHandle::NULL;
            CustodyStatus::from(e)
        }
    }
}

/// Release a tree's arena. `handle` must not be used again afterward.
///
/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create` that has
/// not already been passed to `custody_destroy`.
#[no_mangle]
pub unsafe extern "C" fn custody_destroy(handle: CustodyHandle) -> CustodyStatus {
    if handle.0.is_null() {
        return CustodyStatus::NullTree;
    }
    drop(Box::from_raw(handle.0));
    CustodyStatus::Success
}

/// Empty the tree without releasing its arena.
///
/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`.
#[no_mangle]
pub unsafe extern "C" fn custody_clear(handle: CustodyHandle) -> CustodyStatus {
    match handle.as_mut() {
        Some(tree) => {
            tree.clear();
            CustodyStatus::Success
        }
        None => CustodyStatus::NullTree,
    }
}

/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`;
/// `out_is_empty` must point to valid, writable memory.
#[no_mangle]
pub unsafe extern "C" fn custody_is_empty(
    handle: CustodyHandle,
    out_is_empty: *mut bool,
) -> CustodyStatus {
    match handle.as_mut() {
        Some(tree) => {
            if out_is_empty.is_null() {
                return CustodyStatus::NullRange;
            }
            *out_is_empty = tree.is_empty();
            CustodyStatus::Success
        }
        None => CustodyStatus::NullTree,
    }
}

/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`;
/// `out_is_full` must point to valid, writable memory.
#[no_mangle]
pub unsafe extern "C" fn custody_is_full(
    handle: CustodyHandle,
    out_is_full: *mut bool,
) -> CustodyStatus {
    match handle.as_mut() {
        Some(tree) => {
            if out_is_full.is_null() {
                return CustodyStatus::NullRange;
            }
            *out_is_full = tree.is_full();
            CustodyStatus::Success
        }
        None => CustodyStatus::NullTree,
    }
}

/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`;
/// `out_size` must point to valid, writable memory.
#[no_mangle]
pub unsafe extern "C" fn custody_size(
    handle: CustodyHandle,
    out_size: *mut size_t,
) -> CustodyStatus {
    match handle.as_mut() {
        Some(tree) => {
            if out_size.is_null() {
                return CustodyStatus::NullRange;
            }
            *out_size = tree.len() as size_t;
            CustodyStatus::Success
        }
        None => CustodyStatus::NullTree,
    }
}

/// Insert `v`. Returns `FailInsertDuplicate` (not an error on the safe
/// Rust side, but a distinct status code on this wire surface) when `v`
/// was already covered by some range.
///
/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`.
#[no_mangle]
pub unsafe extern "C" fn custody_insert(handle: CustodyHandle, v: u32) -> CustodyStatus {
    match handle.as_mut() {
        Some(tree) => match tree.insert(v) {
            Ok(InsertOutcome::Inserted) => CustodyStatus::Success,
            Ok(InsertOutcome::AlreadyPresent) => CustodyStatus::FailInsertDuplicate,
            Err(e) => CustodyStatus::from(e),
        },
        None => CustodyStatus::NullTree,
    }
}

/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`.
#[no_mangle]
pub unsafe extern "C" fn custody_delete(handle: CustodyHandle, v: u32) -> CustodyStatus {
    match handle.as_mut() {
        Some(tree) => match tree.delete(v) {
            Ok(()) => CustodyStatus::Success,
            Err(e) => CustodyStatus::from(e),
        },
        None => CustodyStatus::NullTree,
    }
}

/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`;
/// `out_contains` must point to valid, writable memory.
#[no_mangle]
pub unsafe extern "C" fn custody_contains(
    handle: CustodyHandle,
    v: u32,
    out_contains: *mut bool,
) -> CustodyStatus {
    match handle.as_mut() {
        Some(tree) => {
            if out_contains.is_null() {
                return CustodyStatus::NullRange;
            }
            *out_contains = tree.contains(v);
            CustodyStatus::Success
        }
        None => CustodyStatus::NullTree,
    }
}

/// Write the first (leftmost) node's handle to `*out_node`. Writes
/// `CustodyNodeHandle::NONE` when the tree is empty.
///
/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`;
/// `out_node` must point to valid, writable memory.
#[no_mangle]
pub unsafe extern "C" fn custody_iterator_first(
    handle: CustodyHandle,
    out_node: *mut CustodyNodeHandle,
) -> CustodyStatus {
    match handle.as_mut() {
        Some(tree) => {
            if out_node.is_null() {
                return CustodyStatus::NullNode;
            }
            *out_node = CustodyNodeHandle::from_node_handle(tree.first());
            CustodyStatus::Success
        }
        None => CustodyStatus::NullTree,
    }
}

/// Read the range `node` refers to into `*out_value`/`*out_offset`, advance
/// past it (removing it first when `pop` is set, rebalancing afterward only
/// when `rebalance` is also set), and write the handle to continue from
/// into `*out_next`. Writes `CustodyNodeHandle::NONE` to `*out_next` once
/// the walk is exhausted.
///
/// # Safety
/// `handle` must be `NULL` or a value produced by `custody_create`; the
/// output pointers must point to valid, writable memory.
#[no_mangle]
pub unsafe extern "C" fn custody_iterator_next(
    handle: CustodyHandle,
    node: CustodyNodeHandle,
    pop: bool,
    rebalance: bool,
    out_value: *mut u32,
    out_offset: *mut u32,
    out_next: *mut CustodyNodeHandle,
) -> CustodyStatus {
    let tree = match handle.as_mut() {
        Some(tree) => tree,
        None => return CustodyStatus::NullTree,
    };
    if out_value.is_null() || out_offset.is_null() || out_next.is_null() {
        return CustodyStatus::NullRange;
    }

    match tree.iterator_next(node.to_node_handle(), pop, rebalance) {
        Some((range, next)) => {
            *out_value = range.value;
            *out_offset = range.offset;
            *out_next = CustodyNodeHandle::from_node_handle(next);
            CustodyStatus::Success
        }
        None => {
            *out_next = CustodyNodeHandle::NONE;
            CustodyStatus::NullNode
        }
    }
}
