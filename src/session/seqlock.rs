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

//! The seqlock reader primitive.
//!
//! Each shared object carries a sequence counter; the writer makes it odd
//! before mutating the payload and even again afterwards. A reader spins
//! until the counter is even, reads the payload, and then checks that the
//! counter is still the same value. A read is only trustworthy after that
//! post-check passes; anything read before it must be discarded on failure.

use std::hint;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::atomic::fence;

/// Spins until the object's sequence counter is even and returns it.
///
/// The Acquire load orders every subsequent payload read after the counter
/// observation. There is no spin bound: a writer that dies mid-update
/// starves its readers, which the protocol accepts.
pub fn acquire_seqlock(seq: &AtomicU64) -> u64 {
    loop {
        let observed = seq.load(Ordering::Acquire);
        if observed & 1 == 0 {
            return observed;
        }
        hint::spin_loop();
    }
}

/// Returns true iff no write overlapped the read window that started at
/// `observed`. On false, everything read since [`acquire_seqlock`] is
/// potentially torn and must be re-read.
#[must_use]
pub fn release_seqlock(seq: &AtomicU64, observed: u64) -> bool {
    // Order the payload reads before the re-check.
    fence(Ordering::Acquire);
    seq.load(Ordering::Relaxed) == observed
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::thread;

    use super::*;

    #[test]
    fn test_acquire_returns_even() {
        let seq = AtomicU64::new(4);
        assert_eq!(acquire_seqlock(&seq), 4);
    }

    #[test]
    fn test_release_detects_change() {
        let seq = AtomicU64::new(2);
        let observed = acquire_seqlock(&seq);
        assert!(release_seqlock(&seq, observed));

        seq.store(4, Ordering::Release);
        assert!(!release_seqlock(&seq, observed));
    }

    #[test]
    fn test_acquire_waits_for_writer() {
        let seq = AtomicU64::new(1);
        let done = AtomicBool::new(false);

        thread::scope(|s| {
            s.spawn(|| {
                let observed = acquire_seqlock(&seq);
                assert_eq!(observed & 1, 0);
                done.store(true, Ordering::Release);
            });
            // The reader cannot finish while the counter is odd.
            thread::sleep(std::time::Duration::from_millis(10));
            assert!(!done.load(Ordering::Acquire));
            seq.store(2, Ordering::Release);
        });
        assert!(done.load(Ordering::Acquire));
    }

    // A reader that passes the post-check never sees a torn payload: the
    // writer keeps the two halves equal, so observing unequal halves after a
    // successful release would mean the protocol let a torn read through.
    #[test]
    fn test_no_torn_reads_under_contention() {
        let seq = AtomicU64::new(0);
        let a = AtomicU64::new(0);
        let b = AtomicU64::new(0);

        thread::scope(|s| {
            s.spawn(|| {
                for i in 1..=100_000u64 {
                    let started = seq.load(Ordering::Relaxed);
                    seq.store(started + 1, Ordering::Relaxed);
                    fence(Ordering::Release);
                    a.store(i, Ordering::Relaxed);
                    b.store(i, Ordering::Relaxed);
                    seq.store(started + 2, Ordering::Release);
                }
            });

            s.spawn(|| {
                let mut confirmed = 0u64;
                while confirmed < 10_000 {
                    let observed = acquire_seqlock(&seq);
                    let got_a = a.load(Ordering::Relaxed);
                    let got_b = b.load(Ordering::Relaxed);
                    if release_seqlock(&seq, observed) {
                        assert_eq!(got_a, got_b, "torn read slipped past the post-check");
                        confirmed += 1;
                    }
                }
            });
        });
    }
}
