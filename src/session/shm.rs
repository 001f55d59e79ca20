// Copyright 2026 The xkbwin Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The shared session region and its mapping.
//!
//! A privileged server process owns a shared-memory section laid out as a
//! [`SessionHeader`] followed by a dense array of fixed-size
//! [`SessionObject`] slots. Clients map it read-only; every mutation happens
//! server-side and is reached through explicit request/reply round trips,
//! never through the mapping.

use std::marker::PhantomData;
use std::mem;
use std::num::NonZeroUsize;
use std::os::fd::AsFd;
use std::os::fd::BorrowedFd;
use std::os::fd::OwnedFd;
use std::ptr;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use nix::libc::c_void;
use nix::sys::mman;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;
use nix::sys::stat::fstat;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;
use static_assertions::const_assert;
use static_assertions::const_assert_eq;
use thiserror::Error;

use crate::prelude::*;

/// Identifies `"winsess "` little-endian in the header of a live region.
pub const SESSION_MAGIC: u64 = u64::from_le_bytes(*b"winsess ");

pub const OBJECT_DATA_WORDS: usize = 8;

#[repr(C)]
pub struct SessionHeader {
    pub magic: u64,
    pub version: u32,
    _reserved: u32,
    /// Number of object slots following the header. Grows when the server
    /// resizes the section; a mapping made before the growth only covers the
    /// old count, which is how staleness is detected.
    pub object_capacity: AtomicU64,
}

/// One object slot. The sequence counter is the seqlock described in
/// [`crate::session::seqlock`]; `id` is the server-assigned identity of the
/// object currently occupying the slot. Slots are recycled across object
/// lifetimes, so the id must be revalidated on every completed read.
#[repr(C)]
pub struct SessionObject {
    pub seq: AtomicU64,
    pub id: u64,
    pub kind: u32,
    _reserved: u32,
    pub data: [u64; OBJECT_DATA_WORDS],
}

const_assert_eq!(mem::size_of::<SessionHeader>(), 24);
const_assert_eq!(mem::size_of::<SessionObject>(), 24 + OBJECT_DATA_WORDS * 8);

/// Desktop payload: global input state published for every thread attached
/// to the desktop.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DesktopShm {
    pub flags: u64,
    pub cursor_x: i32,
    pub cursor_y: i32,
    pub cursor_last_change: u32,
    pub foreground_tid: u32,
}

/// Message-queue payload: the wake/changed bit state of one thread's queue.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct QueueShm {
    pub wake_bits: u32,
    pub wake_mask: u32,
    pub changed_bits: u32,
    pub changed_mask: u32,
}

const_assert!(mem::size_of::<DesktopShm>() <= OBJECT_DATA_WORDS * 8);
const_assert!(mem::size_of::<QueueShm>() <= OBJECT_DATA_WORDS * 8);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ObjectKind {
    Desktop = 1,
    Queue = 2,
}

pub const OBJECT_KINDS: usize = 2;

impl ObjectKind {
    pub(crate) fn cache_slot(self) -> usize {
        (u32::from(self) - 1) as usize
    }
}

/// The two failures a caller can actually see: the object doesn't exist (or
/// the request was malformed), or the server/section cannot be reached.
/// Retry states never surface here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("object does not exist")]
    InvalidHandle,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("shared session unavailable: {0}")]
    Unavailable(#[from] nix::Error),
}

/// Server resolution result for a (thread, kind) pair. An `index` of -1
/// means no such object.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ObjectInfo {
    pub id: u64,
    pub index: i32,
}

/// The server seam: opening the session section and resolving objects both
/// go through explicit round trips behind this trait.
pub trait SessionServer {
    fn open_session(&self) -> Result<OwnedFd, SessionError>;
    fn object_info(&self, tid: u32, kind: ObjectKind) -> Result<ObjectInfo, SessionError>;
}

/// A raw pointer to a structure inside the shared mapping.
///
/// A `&T` would be unsound here: the server mutates the memory concurrently,
/// so every read goes through a volatile whole-struct copy and is only
/// trustworthy once the surrounding seqlock post-check passes. Validity is
/// tied to the session that produced the pointer; the [`super::ObjectLock`]
/// holding that session reference is what keeps it alive.
#[derive(Debug, Eq, PartialEq)]
pub struct ObjectPtr<T> {
    ptr: *const T,
    _marker: PhantomData<*const T>,
}

impl<T> Copy for ObjectPtr<T> {}

impl<T> Clone for ObjectPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

// SAFETY: the pointer is only dereferenced through volatile reads and its
// target outlives the session reference paired with it.
unsafe impl<T> Send for ObjectPtr<T> {}

impl<T> ObjectPtr<T> {
    /// # Safety
    /// `ptr` must be non-null, aligned, and valid for volatile reads for as
    /// long as the mapping that contains it stays mapped.
    pub(crate) unsafe fn new(ptr: *const T) -> Self {
        assert!(!ptr.is_null());
        assert!(ptr.is_aligned());
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    pub fn ptr(self) -> *const T {
        self.ptr
    }
}

impl<T: Copy> ObjectPtr<T> {
    /// Copies the current value out of shared memory. The copy may be torn
    /// if a write overlaps it; callers decide with the seqlock post-check.
    pub fn get(self) -> T {
        // SAFETY: construction precondition.
        unsafe { ptr::read_volatile(self.ptr) }
    }
}

impl ObjectPtr<SessionObject> {
    pub(crate) fn seq(&self) -> &AtomicU64 {
        // SAFETY: construction precondition; the counter is only accessed
        // atomically on both sides of the protocol.
        unsafe { &(*self.ptr).seq }
    }

    pub(crate) fn id(&self) -> u64 {
        // SAFETY: construction precondition.
        unsafe { ptr::read_volatile(&raw const (*self.ptr).id) }
    }

    /// Views the payload as a typed object.
    pub fn payload<P: Copy>(self) -> ObjectPtr<P> {
        const { assert!(mem::size_of::<P>() <= OBJECT_DATA_WORDS * 8) };
        let data = unsafe { &raw const (*self.ptr).data };
        // SAFETY: the payload array lives exactly as long as the slot, and
        // the size of P was checked against it above.
        unsafe { ObjectPtr::new(data.cast()) }
    }
}

struct Mapping {
    ptr: NonNull<c_void>,
    len: usize,
}

// SAFETY: the mapping is plain memory; all concurrent access goes through
// atomics or volatile reads.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: ptr/len come from the successful mmap in SharedSession::map.
        unsafe {
            mman::munmap(self.ptr, self.len).warn(loc!()).ok();
        }
    }
}

/// One read-only view of the session section. Immutable once mapped: a
/// session whose capacity no longer matches the live header is discarded and
/// replaced, never remapped in place.
pub struct SharedSession {
    object_capacity: usize,
    map: Mapping,
}

impl SharedSession {
    fn map(fd: BorrowedFd) -> Result<Self, SessionError> {
        let len = fstat(fd)?.st_size as usize;
        let min_len = mem::size_of::<SessionHeader>();
        let Some(map_len) = NonZeroUsize::new(len) else {
            return Err(nix::Error::EINVAL.into());
        };
        if len < min_len {
            return Err(nix::Error::EINVAL.into());
        }

        // SAFETY: mapping a whole file shared and read-only.
        let ptr = unsafe {
            mman::mmap(
                None,
                map_len,
                ProtFlags::PROT_READ,
                MapFlags::MAP_SHARED,
                fd,
                0,
            )?
        };
        let session = Self {
            object_capacity: 0,
            map: Mapping { ptr, len },
        };

        let header = session.header();
        if header.magic != SESSION_MAGIC {
            return Err(nix::Error::EBADF.into());
        }
        let capacity = header.object_capacity.load(Ordering::Acquire) as usize;
        let fits = (len - min_len) / mem::size_of::<SessionObject>();
        if capacity > fits {
            // The server grew the header before the section itself became
            // visible at the new size; treat the mapping as unusable.
            return Err(nix::Error::EOVERFLOW.into());
        }

        Ok(Self {
            object_capacity: capacity,
            ..session
        })
    }

    fn header(&self) -> &SessionHeader {
        // SAFETY: map() verified the mapping covers a header; concurrent
        // server writes only touch the atomic capacity field.
        unsafe { &*self.map.ptr.as_ptr().cast::<SessionHeader>() }
    }

    /// Slot count covered by this mapping.
    pub fn object_capacity(&self) -> usize {
        self.object_capacity
    }

    /// Whether the live header still agrees with the capacity this mapping
    /// was made with.
    pub(crate) fn is_current(&self) -> bool {
        self.object_capacity as u64 == self.header().object_capacity.load(Ordering::Acquire)
    }

    /// # Panics
    /// If `index` is out of bounds for this mapping.
    pub(crate) fn object(&self, index: usize) -> ObjectPtr<SessionObject> {
        assert!(index < self.object_capacity);
        // SAFETY: the mapping covers object_capacity slots past the header.
        unsafe {
            let base = self
                .map
                .ptr
                .as_ptr()
                .cast::<u8>()
                .add(mem::size_of::<SessionHeader>())
                .cast::<SessionObject>();
            ObjectPtr::new(base.add(index))
        }
    }
}

/// Owns the process's current session mapping. Acquiring, validating and
/// replacing the current session all happen under one lock; reads of the
/// mapped bytes themselves are governed by the per-object seqlock instead.
pub struct SessionManager<S> {
    server: S,
    current: Mutex<Option<Arc<SharedSession>>>,
}

impl<S: SessionServer> SessionManager<S> {
    pub fn new(server: S) -> Self {
        Self {
            server,
            current: Mutex::new(None),
        }
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    /// Returns the current session, remapping if it went stale or `force`
    /// is set. Stale sessions are dropped, not fixed up: readers still
    /// holding one keep a consistent (if outdated) view until they release.
    pub(crate) fn get_session(&self, force: bool) -> Result<Arc<SharedSession>, SessionError> {
        let mut current = self.current.lock().unwrap();

        if !force
            && let Some(session) = &*current
            && session.is_current()
        {
            return Ok(session.clone());
        }

        *current = None;
        let fd = self.server.open_session()?;
        let session = Arc::new(SharedSession::map(fd.as_fd())?);
        trace!(
            "mapped shared session with {} object slots",
            session.object_capacity()
        );
        *current = Some(session.clone());
        Ok(session)
    }
}
