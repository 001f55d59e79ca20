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

//! Cross-process shared session state: a server-owned object table in
//! shared memory, read lock-free through a per-object seqlock.

pub mod object;
pub mod seqlock;
pub mod shm;

pub use object::ObjectLock;
pub use object::Poll;
pub use object::ThreadSession;
pub use object::get_thread_session_object;
pub use shm::DesktopShm;
pub use shm::ObjectInfo;
pub use shm::ObjectKind;
pub use shm::ObjectPtr;
pub use shm::QueueShm;
pub use shm::SessionError;
pub use shm::SessionManager;
pub use shm::SessionServer;
pub use shm::SharedSession;
