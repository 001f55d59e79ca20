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

//! Resolving a (thread, object-kind) pair to a live slot in the shared
//! session and reading it consistently.
//!
//! [`get_thread_session_object`] is a two-phase protocol driven by the
//! caller: a `Pending` result means "the seqlock is held open over the slot,
//! read your fields and call again with the same lock"; the next call
//! verifies that no write overlapped the read and that the slot still holds
//! the same object, and either completes with `Ready` or keeps the caller in
//! the loop. Genuine failures (object gone, server unreachable) are the only
//! errors; every retry condition stays internal to the loop.

use std::sync::Arc;

use crate::prelude::*;
use crate::session::seqlock;
use crate::session::shm::DesktopShm;
use crate::session::shm::ObjectInfo;
use crate::session::shm::ObjectKind;
use crate::session::shm::ObjectPtr;
use crate::session::shm::QueueShm;
use crate::session::shm::SessionError;
use crate::session::shm::SessionManager;
use crate::session::shm::SessionObject;
use crate::session::shm::SessionServer;
use crate::session::shm::SharedSession;

/// Non-error resolution states. `Pending` is loop control, not completion:
/// the caller must call back with the same lock to finish the read cycle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Poll {
    Pending,
    Ready,
}

/// Reader-side state carried across the two phases of a read.
///
/// A nonzero `id` implies `session` holds the reference the seqlock was
/// acquired against and `object` points into that session's mapping; the
/// three are only ever set and cleared together.
#[derive(Default)]
pub struct ObjectLock {
    id: u64,
    seq: u64,
    session: Option<Arc<SharedSession>>,
    object: Option<ObjectPtr<SessionObject>>,
}

impl ObjectLock {
    pub fn new() -> Self {
        Self::default()
    }
}

// Bound on discard-and-remap iterations. Each pass does a fresh server
// resolution against a forced remap, so two sides that never agree indicate
// a protocol violation rather than a transient race.
const SESSION_RETRY_LIMIT: usize = 8;

/// Resolves `(tid, kind)` to a slot and drives one seqlock read cycle.
///
/// Returns `Pending` while a read is open, `Ready` once a read was verified
/// consistent. Stale cached slots (the server recycled the slot for another
/// object) restart resolution transparently; a session mapping whose
/// capacity no longer covers the slot index is discarded and remapped.
pub fn get_thread_session_object<S: SessionServer>(
    manager: &SessionManager<S>,
    tid: u32,
    kind: ObjectKind,
    info: &mut ObjectInfo,
    lock: &mut ObjectLock,
    object_shm: &mut Option<ObjectPtr<SessionObject>>,
) -> Result<Poll, SessionError> {
    if lock.id != 0 {
        match (lock.session.take(), lock.object) {
            (Some(session), Some(object)) => {
                let valid = object.id() == lock.id;
                if !seqlock::release_seqlock(object.seq(), lock.seq) {
                    // A write overlapped the read. The slot is still the
                    // right one; reopen the read window and have the caller
                    // retry without re-resolving.
                    lock.seq = seqlock::acquire_seqlock(object.seq());
                    lock.session = Some(session);
                    return Ok(Poll::Pending);
                }
                drop(session);
                *lock = ObjectLock::default();
                if valid {
                    return Ok(Poll::Ready);
                }
                // The slot now holds a different object; resolve afresh.
                info.id = 0;
            },
            _ => *lock = ObjectLock::default(),
        }
    }

    let mut force = false;
    for _ in 0..SESSION_RETRY_LIMIT {
        let session = match manager.get_session(force) {
            Ok(session) => session,
            Err(err) => {
                warn!("unable to map the shared session: {err}");
                *info = ObjectInfo::default();
                return Err(err);
            },
        };

        if info.id == 0 {
            *info = manager.server().object_info(tid, kind)?;
            if info.index < 0 || info.id == 0 {
                *info = ObjectInfo::default();
                return Err(SessionError::InvalidHandle);
            }
        }

        let index = info.index as usize;
        if index < session.object_capacity() {
            let object = session.object(index);
            lock.seq = seqlock::acquire_seqlock(object.seq());
            lock.id = info.id;
            lock.object = Some(object);
            lock.session = Some(session);
            *object_shm = Some(object);
            return Ok(Poll::Pending);
        }

        // The object table grew after this session was mapped: drop the
        // mapping, re-resolve, and force a remap on the next pass.
        drop(session);
        *info = ObjectInfo::default();
        force = true;
    }

    warn!("session capacity never covered the resolved index");
    *info = ObjectInfo::default();
    Err(SessionError::InvalidHandle)
}

/// Per-thread view of the session: the manager plus cached resolution info,
/// so repeated reads of the same object skip the server round trip until
/// the cached identity goes stale.
pub struct ThreadSession<'a, S: SessionServer> {
    manager: &'a SessionManager<S>,
    tid: u32,
    cached: [ObjectInfo; super::shm::OBJECT_KINDS],
}

impl<'a, S: SessionServer> ThreadSession<'a, S> {
    pub fn new(manager: &'a SessionManager<S>, tid: u32) -> Self {
        Self {
            manager,
            tid,
            cached: Default::default(),
        }
    }

    /// A view for the calling OS thread.
    pub fn current(manager: &'a SessionManager<S>) -> Self {
        Self::new(manager, nix::unistd::gettid().as_raw() as u32)
    }

    pub fn tid(&self) -> u32 {
        self.tid
    }

    fn object(
        &mut self,
        kind: ObjectKind,
        lock: &mut ObjectLock,
    ) -> Result<(Poll, Option<ObjectPtr<SessionObject>>), SessionError> {
        let mut object = None;
        let status = get_thread_session_object(
            self.manager,
            self.tid,
            kind,
            &mut self.cached[kind.cache_slot()],
            lock,
            &mut object,
        )?;
        Ok((status, object))
    }

    /// One step of a desktop read. On `Pending` the pointer is valid to read
    /// until the next call on the same lock.
    pub fn shared_desktop(
        &mut self,
        lock: &mut ObjectLock,
        desktop_shm: &mut Option<ObjectPtr<DesktopShm>>,
    ) -> Result<Poll, SessionError> {
        let (status, object) = self.object(ObjectKind::Desktop, lock)?;
        if let Some(object) = object {
            *desktop_shm = Some(object.payload());
        }
        Ok(status)
    }

    /// One step of a message-queue read. Queues are only readable by their
    /// own thread; any other tid is rejected before shared memory is
    /// touched.
    pub fn shared_queue(
        &mut self,
        tid: u32,
        lock: &mut ObjectLock,
        queue_shm: &mut Option<ObjectPtr<QueueShm>>,
    ) -> Result<Poll, SessionError> {
        if tid != self.tid {
            return Err(SessionError::InvalidParameter);
        }
        let (status, object) = self.object(ObjectKind::Queue, lock)?;
        if let Some(object) = object {
            *queue_shm = Some(object.payload());
        }
        Ok(status)
    }

    /// Runs the canonical retry loop to completion for a desktop read.
    pub fn read_desktop<R>(
        &mut self,
        mut f: impl FnMut(&DesktopShm) -> R,
    ) -> Result<R, SessionError> {
        let mut lock = ObjectLock::new();
        let mut shm = None;
        let mut value = None;
        loop {
            match self.shared_desktop(&mut lock, &mut shm)? {
                Poll::Pending => {
                    if let Some(ptr) = shm {
                        value = Some(f(&ptr.get()));
                    }
                },
                Poll::Ready => break,
            }
        }
        // Ready is only reachable after at least one Pending pass.
        value.ok_or(SessionError::InvalidHandle)
    }

    /// Runs the canonical retry loop to completion for the calling thread's
    /// queue.
    pub fn read_queue<R>(&mut self, mut f: impl FnMut(&QueueShm) -> R) -> Result<R, SessionError> {
        let tid = self.tid;
        let mut lock = ObjectLock::new();
        let mut shm = None;
        let mut value = None;
        loop {
            match self.shared_queue(tid, &mut lock, &mut shm)? {
                Poll::Pending => {
                    if let Some(ptr) = shm {
                        value = Some(f(&ptr.get()));
                    }
                },
                Poll::Ready => break,
            }
        }
        value.ok_or(SessionError::InvalidHandle)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs::File;
    use std::mem;
    use std::num::NonZeroUsize;
    use std::os::fd::OwnedFd;
    use std::ptr::NonNull;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::AtomicU64;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::atomic::fence;
    use std::thread;

    use nix::fcntl::OFlag;
    use nix::libc::c_void;
    use nix::sys::mman;
    use nix::sys::mman::MapFlags;
    use nix::sys::mman::ProtFlags;
    use nix::sys::stat::Mode;

    use super::*;
    use crate::session::shm::SESSION_MAGIC;
    use crate::session::shm::SessionHeader;

    static REGION_COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Server side of the protocol for tests: a read-write mapping of the
    /// same section the client maps read-only.
    struct TestRegion {
        file: File,
        ptr: NonNull<c_void>,
        len: usize,
    }

    unsafe impl Send for TestRegion {}
    unsafe impl Sync for TestRegion {}

    impl TestRegion {
        /// The backing file always holds `file_slots` slots; the header
        /// starts out advertising only `capacity` of them, so growth is a
        /// single header update.
        fn create(file_slots: usize, capacity: u64) -> Self {
            let name = format!(
                "/xkbwin-test-{}-{}",
                std::process::id(),
                REGION_COUNTER.fetch_add(1, Ordering::Relaxed)
            );
            let fd = mman::shm_open(
                name.as_str(),
                OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
                Mode::S_IRUSR | Mode::S_IWUSR,
            )
            .unwrap();
            mman::shm_unlink(name.as_str()).unwrap();

            let len =
                mem::size_of::<SessionHeader>() + file_slots * mem::size_of::<SessionObject>();
            nix::unistd::ftruncate(&fd, len as i64).unwrap();
            let ptr = unsafe {
                mman::mmap(
                    None,
                    NonZeroUsize::new(len).unwrap(),
                    ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                    MapFlags::MAP_SHARED,
                    &fd,
                    0,
                )
                .unwrap()
            };

            let region = Self {
                file: File::from(fd),
                ptr,
                len,
            };
            let header = region.header_ptr();
            unsafe {
                (&raw mut (*header).magic).write(SESSION_MAGIC);
                (&raw mut (*header).version).write(1);
            }
            region.header().object_capacity.store(capacity, Ordering::Release);
            region
        }

        fn header_ptr(&self) -> *mut SessionHeader {
            self.ptr.as_ptr().cast::<SessionHeader>()
        }

        fn header(&self) -> &SessionHeader {
            unsafe { &*self.header_ptr() }
        }

        fn grow(&self, capacity: u64) {
            self.header().object_capacity.store(capacity, Ordering::Release);
        }

        fn slot(&self, index: usize) -> *mut SessionObject {
            unsafe {
                self.ptr
                    .as_ptr()
                    .cast::<u8>()
                    .add(mem::size_of::<SessionHeader>())
                    .cast::<SessionObject>()
                    .add(index)
            }
        }

        fn seq(&self, index: usize) -> &AtomicU64 {
            unsafe { &(*self.slot(index)).seq }
        }

        fn write_object<P: Copy>(&self, index: usize, id: u64, kind: ObjectKind, payload: P) {
            let obj = self.slot(index);
            let seq = self.seq(index);
            let started = seq.load(Ordering::Relaxed);
            seq.store(started + 1, Ordering::Relaxed);
            fence(Ordering::Release);
            unsafe {
                (&raw mut (*obj).id).write_volatile(id);
                (&raw mut (*obj).kind).write_volatile(u32::from(kind));
                (&raw mut (*obj).data).cast::<P>().write_volatile(payload);
            }
            seq.store(started + 2, Ordering::Release);
        }

        fn write_desktop(&self, index: usize, id: u64, desktop: DesktopShm) {
            self.write_object(index, id, ObjectKind::Desktop, desktop);
        }
    }

    impl Drop for TestRegion {
        fn drop(&mut self) {
            unsafe {
                mman::munmap(self.ptr, self.len).unwrap();
            }
        }
    }

    struct TestServer {
        region: TestRegion,
        infos: Mutex<HashMap<(u32, ObjectKind), ObjectInfo>>,
        available: AtomicBool,
        grow_on_resolve: Mutex<Option<u64>>,
        opens: AtomicUsize,
        resolves: AtomicUsize,
    }

    impl TestServer {
        fn new(region: TestRegion) -> Self {
            Self {
                region,
                infos: Mutex::new(HashMap::new()),
                available: AtomicBool::new(true),
                grow_on_resolve: Mutex::new(None),
                opens: AtomicUsize::new(0),
                resolves: AtomicUsize::new(0),
            }
        }

        fn set_info(&self, tid: u32, kind: ObjectKind, id: u64, index: i32) {
            self.infos
                .lock()
                .unwrap()
                .insert((tid, kind), ObjectInfo { id, index });
        }
    }

    impl SessionServer for TestServer {
        fn open_session(&self) -> Result<OwnedFd, SessionError> {
            if !self.available.load(Ordering::Acquire) {
                return Err(SessionError::Unavailable(nix::Error::ECONNREFUSED));
            }
            self.opens.fetch_add(1, Ordering::Relaxed);
            let file = self
                .region
                .file
                .try_clone()
                .map_err(|_| SessionError::Unavailable(nix::Error::EIO))?;
            Ok(file.into())
        }

        fn object_info(&self, tid: u32, kind: ObjectKind) -> Result<ObjectInfo, SessionError> {
            self.resolves.fetch_add(1, Ordering::Relaxed);
            if let Some(capacity) = self.grow_on_resolve.lock().unwrap().take() {
                self.region.grow(capacity);
            }
            Ok(self
                .infos
                .lock()
                .unwrap()
                .get(&(tid, kind))
                .copied()
                .unwrap_or(ObjectInfo { id: 0, index: -1 }))
        }
    }

    const TID: u32 = 42;

    fn desktop(x: i32, y: i32) -> DesktopShm {
        DesktopShm {
            cursor_x: x,
            cursor_y: y,
            ..Default::default()
        }
    }

    fn manager_with(region: TestRegion) -> SessionManager<TestServer> {
        SessionManager::new(TestServer::new(region))
    }

    #[test]
    fn test_pending_then_ready_with_stable_pointer() {
        let region = TestRegion::create(4, 4);
        region.write_desktop(0, 7, desktop(3, 3));
        let manager = manager_with(region);
        manager.server().set_info(TID, ObjectKind::Desktop, 7, 0);
        let mut session = ThreadSession::new(&manager, TID);

        let mut lock = ObjectLock::new();
        let mut shm = None;
        assert_eq!(
            session.shared_desktop(&mut lock, &mut shm).unwrap(),
            Poll::Pending
        );
        let ptr = shm.unwrap();
        let value = ptr.get();
        assert_eq!(
            session.shared_desktop(&mut lock, &mut shm).unwrap(),
            Poll::Ready
        );

        // The pointer handed out on the pending call is the one whose read
        // the ready call just validated.
        assert_eq!(shm.unwrap().ptr(), ptr.ptr());
        assert_eq!(value.cursor_x, 3);
        assert_eq!(value.cursor_y, 3);
    }

    #[test]
    fn test_cached_info_skips_resolution() {
        let region = TestRegion::create(4, 4);
        region.write_desktop(0, 7, desktop(1, 1));
        let manager = manager_with(region);
        manager.server().set_info(TID, ObjectKind::Desktop, 7, 0);
        let mut session = ThreadSession::new(&manager, TID);

        assert_eq!(session.read_desktop(|d| d.cursor_x).unwrap(), 1);
        assert_eq!(session.read_desktop(|d| d.cursor_x).unwrap(), 1);
        assert_eq!(manager.server().resolves.load(Ordering::Relaxed), 1);
        assert_eq!(manager.server().opens.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_stale_slot_is_detected_and_reresolved() {
        let region = TestRegion::create(4, 4);
        region.write_desktop(0, 7, desktop(1, 1));
        let manager = manager_with(region);
        manager.server().set_info(TID, ObjectKind::Desktop, 7, 0);
        let mut session = ThreadSession::new(&manager, TID);

        let mut lock = ObjectLock::new();
        let mut shm = None;
        assert_eq!(
            session.shared_desktop(&mut lock, &mut shm).unwrap(),
            Poll::Pending
        );

        // The server tears the object down and reuses slot 0 for a
        // different object before the reader comes back.
        manager.server().region.write_desktop(0, 9, desktop(5, 5));
        manager.server().set_info(TID, ObjectKind::Desktop, 9, 0);

        // The overlapping write fails the seqlock post-check first: same
        // slot, reopened read window, no re-resolution yet.
        assert_eq!(
            session.shared_desktop(&mut lock, &mut shm).unwrap(),
            Poll::Pending
        );
        assert_eq!(manager.server().resolves.load(Ordering::Relaxed), 1);

        // Now the read verifies, but the identity no longer matches: the
        // stale cache is discarded and resolution runs again.
        assert_eq!(
            session.shared_desktop(&mut lock, &mut shm).unwrap(),
            Poll::Pending
        );
        assert_eq!(manager.server().resolves.load(Ordering::Relaxed), 2);

        let value = shm.unwrap().get();
        assert_eq!(
            session.shared_desktop(&mut lock, &mut shm).unwrap(),
            Poll::Ready
        );
        assert_eq!(value.cursor_x, 5);
    }

    #[test]
    fn test_capacity_growth_forces_remap() {
        let region = TestRegion::create(8, 2);
        region.write_desktop(5, 11, desktop(9, 9));
        let manager = manager_with(region);
        manager.server().set_info(TID, ObjectKind::Desktop, 11, 5);
        // The table grows when the reader resolves, modeling a session that
        // was mapped before the growth became visible.
        *manager.server().grow_on_resolve.lock().unwrap() = Some(8);
        let mut session = ThreadSession::new(&manager, TID);

        assert_eq!(session.read_desktop(|d| d.cursor_x).unwrap(), 9);
        // One initial mapping plus one forced remap.
        assert_eq!(manager.server().opens.load(Ordering::Relaxed), 2);
        assert_eq!(manager.server().resolves.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_missing_object_is_invalid_handle() {
        let region = TestRegion::create(2, 2);
        let manager = manager_with(region);
        let mut session = ThreadSession::new(&manager, TID);

        assert!(matches!(
            session.read_desktop(|d| d.flags),
            Err(SessionError::InvalidHandle)
        ));
    }

    #[test]
    fn test_unreachable_server_propagates() {
        let region = TestRegion::create(2, 2);
        let manager = manager_with(region);
        manager
            .server()
            .available
            .store(false, Ordering::Release);
        let mut session = ThreadSession::new(&manager, TID);

        assert!(matches!(
            session.read_desktop(|d| d.flags),
            Err(SessionError::Unavailable(_))
        ));
    }

    #[test]
    fn test_queue_rejects_foreign_tid() {
        let region = TestRegion::create(2, 2);
        let manager = manager_with(region);
        let mut session = ThreadSession::new(&manager, TID);

        let mut lock = ObjectLock::new();
        let mut shm = None;
        assert!(matches!(
            session.shared_queue(TID + 1, &mut lock, &mut shm),
            Err(SessionError::InvalidParameter)
        ));
        // Rejected before any server traffic or shared-memory access.
        assert_eq!(manager.server().resolves.load(Ordering::Relaxed), 0);
        assert_eq!(manager.server().opens.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_queue_read() {
        let region = TestRegion::create(4, 4);
        let queue = QueueShm {
            wake_bits: 0x5,
            wake_mask: 0xff,
            changed_bits: 0x1,
            changed_mask: 0xff,
        };
        region.write_object(1, 3, ObjectKind::Queue, queue);
        let manager = manager_with(region);
        manager.server().set_info(TID, ObjectKind::Queue, 3, 1);
        let mut session = ThreadSession::new(&manager, TID);

        assert_eq!(session.read_queue(|q| q.wake_bits).unwrap(), 0x5);
    }

    // Every branch combination of (valid, release-success) must leave the
    // session reference count balanced.
    #[test]
    fn test_reference_count_balance() {
        let region = TestRegion::create(4, 4);
        region.write_desktop(0, 7, desktop(1, 1));
        let manager = manager_with(region);
        manager.server().set_info(TID, ObjectKind::Desktop, 7, 0);
        let mut session = ThreadSession::new(&manager, TID);

        let baseline = |manager: &SessionManager<TestServer>| {
            let probe = manager.get_session(false).unwrap();
            Arc::strong_count(&probe) - 1
        };

        // valid + release-success.
        session.read_desktop(|d| d.flags).unwrap();
        assert_eq!(baseline(&manager), 1);

        // release-failure (contended write) followed by valid completion.
        let mut lock = ObjectLock::new();
        let mut shm = None;
        session.shared_desktop(&mut lock, &mut shm).unwrap();
        manager.server().region.write_desktop(0, 7, desktop(2, 2));
        while session.shared_desktop(&mut lock, &mut shm).unwrap() == Poll::Pending {}
        assert_eq!(baseline(&manager), 1);

        // invalid + release-success (stale id) through to completion.
        let mut lock = ObjectLock::new();
        let mut shm = None;
        session.shared_desktop(&mut lock, &mut shm).unwrap();
        manager.server().region.write_desktop(0, 8, desktop(3, 3));
        manager.server().set_info(TID, ObjectKind::Desktop, 8, 0);
        while session.shared_desktop(&mut lock, &mut shm).unwrap() == Poll::Pending {}
        assert_eq!(baseline(&manager), 1);

        // An abandoned pending lock releases its reference on drop.
        let mut lock = ObjectLock::new();
        let mut shm = None;
        session.shared_desktop(&mut lock, &mut shm).unwrap();
        drop(lock);
        assert_eq!(baseline(&manager), 1);
    }

    // The torn-read property through the public read path: the writer keeps
    // both cursor coordinates equal, so any completed read that observes
    // unequal coordinates means the seqlock let a torn snapshot through.
    #[test]
    fn test_reads_are_never_torn() {
        let region = TestRegion::create(1, 1);
        region.write_desktop(0, 7, desktop(0, 0));
        let manager = manager_with(region);
        manager.server().set_info(TID, ObjectKind::Desktop, 7, 0);

        thread::scope(|s| {
            s.spawn(|| {
                for i in 1..=100_000 {
                    manager.server().region.write_desktop(0, 7, desktop(i, i));
                    if i % 64 == 0 {
                        thread::yield_now();
                    }
                }
            });

            s.spawn(|| {
                let mut session = ThreadSession::new(&manager, TID);
                for _ in 0..500 {
                    let (x, y) = session.read_desktop(|d| (d.cursor_x, d.cursor_y)).unwrap();
                    assert_eq!(x, y, "torn read slipped past the seqlock");
                }
            });
        });
    }
}
