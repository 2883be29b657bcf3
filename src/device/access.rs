//! Exclusive access to the device buffer.
//!
//! One holder at a time. Callers that find the buffer taken fail fast with
//! [`DriverError::Busy`]; the wait queue only records *that* they tried and
//! when, it never wakes or retries anybody.
//!
//! The guard owns the `MutexGuard`, so the lock, the role counters and the
//! queue bookkeeping are all released by `Drop` on every exit path.
//!
//! `is_locked` is a diagnostic mirror of the mutex. Each holder stamps it
//! with its own token after admission and only clears its own token once
//! the mutex is unlocked, so a release never hides a newer holder.

use super::error::DriverError;
use chrono::{DateTime, Utc};
use std::{
    collections::VecDeque,
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    sync::{
        Mutex, MutexGuard, PoisonError, TryLockError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

/// What the holder is going to do with the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reader,
    Writer,
    /// IOCTL housekeeping; counted in neither reader nor writer totals.
    Admin,
}

#[derive(Debug)]
pub struct AccessController<T> {
    resource:       Mutex<T>,
    /// Token of the current holder, 0 when free.
    holder:         AtomicU64,
    next_token:     AtomicU64,
    wait_queue:     Mutex<VecDeque<DateTime<Utc>>>,
    active_readers: AtomicUsize,
    active_writers: AtomicUsize,
    contended:      AtomicU64,
}

impl<T> AccessController<T> {
    pub fn new(resource: T) -> Self {
        Self {
            resource:       Mutex::new(resource),
            holder:         AtomicU64::new(0),
            next_token:     AtomicU64::new(1),
            wait_queue:     Mutex::new(VecDeque::new()),
            active_readers: AtomicUsize::new(0),
            active_writers: AtomicUsize::new(0),
            contended:      AtomicU64::new(0),
        }
    }

    /// Non-blocking acquisition. On contention the arrival time is queued
    /// and `Busy` is returned.
    pub fn try_acquire(
        &self,
        role: Role,
        arrived: DateTime<Utc>,
    ) -> Result<AccessGuard<'_, T>, DriverError> {
        let inner = match self.resource.try_lock() {
            Ok(guard) => guard,
            // the ring is never left half-updated, so a panicked holder is harmless
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.queue().push_back(arrived);
                self.contended.fetch_add(1, Ordering::Relaxed);
                return Err(DriverError::Busy);
            }
        };
        Ok(self.admit(inner, role))
    }

    /// Blocking acquisition for callers that must not fail on contention.
    pub fn acquire(&self, role: Role) -> AccessGuard<'_, T> {
        let inner = self.resource.lock().unwrap_or_else(PoisonError::into_inner);
        self.admit(inner, role)
    }

    fn admit<'a>(&'a self, inner: MutexGuard<'a, T>, role: Role) -> AccessGuard<'a, T> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.holder.store(token, Ordering::Release);
        match role {
            Role::Reader => self.enter_reader(),
            Role::Writer => self.enter_writer(),
            Role::Admin => {}
        }
        AccessGuard { inner: ManuallyDrop::new(inner), controller: self, role, token }
    }

    pub fn enter_reader(&self) {
        self.active_readers.fetch_add(1, Ordering::AcqRel);
    }

    pub fn exit_reader(&self) {
        saturating_decrement(&self.active_readers);
    }

    pub fn enter_writer(&self) {
        self.active_writers.fetch_add(1, Ordering::AcqRel);
    }

    pub fn exit_writer(&self) {
        saturating_decrement(&self.active_writers);
    }

    /// Set from a holder's admission until just after its mutex unlocks.
    pub fn is_locked(&self) -> bool {
        self.holder.load(Ordering::Acquire) != 0
    }

    pub fn active_readers(&self) -> usize {
        self.active_readers.load(Ordering::Acquire)
    }

    pub fn active_writers(&self) -> usize {
        self.active_writers.load(Ordering::Acquire)
    }

    pub fn queue_len(&self) -> usize {
        self.queue().len()
    }

    /// Oldest-first copy of the recorded contention arrivals.
    pub fn queued_arrivals(&self) -> Vec<DateTime<Utc>> {
        self.queue().iter().copied().collect()
    }

    /// Contention events since construction; unlike the queue this never
    /// shrinks.
    pub fn contention_events(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }

    /// Zeroes the role counters and empties the wait queue without touching
    /// the lock itself. Holders still running keep their guard; their later
    /// release saturates at zero.
    pub fn force_reset(&self) {
        self.active_readers.store(0, Ordering::Release);
        self.active_writers.store(0, Ordering::Release);
        self.queue().clear();
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<DateTime<Utc>>> {
        self.wait_queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn saturating_decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}

/// Held exclusive access. Derefs to the protected resource.
#[derive(Debug)]
pub struct AccessGuard<'a, T> {
    inner:      ManuallyDrop<MutexGuard<'a, T>>,
    controller: &'a AccessController<T>,
    role:       Role,
    token:      u64,
}

impl<T> AccessGuard<'_, T> {
    pub fn role(&self) -> Role {
        self.role
    }
}

impl<T> Deref for AccessGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for AccessGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for AccessGuard<'_, T> {
    fn drop(&mut self) {
        match self.role {
            Role::Reader => self.controller.exit_reader(),
            Role::Writer => self.controller.exit_writer(),
            Role::Admin => {}
        }
        self.controller.queue().pop_front();

        // SAFETY: `inner` is dropped exactly once, here, and never read again.
        unsafe { ManuallyDrop::drop(&mut self.inner) };

        // a newer holder may already have stamped its own token
        let _ = self.controller.holder.compare_exchange(
            self.token,
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn second_acquire_fails_busy_and_is_queued() {
        let ctl = AccessController::new(0u32);
        let now = Utc::now();

        let guard = ctl.try_acquire(Role::Writer, now).unwrap();
        assert!(ctl.is_locked());
        assert_eq!(ctl.active_writers(), 1);

        assert_eq!(ctl.try_acquire(Role::Reader, now).unwrap_err(), DriverError::Busy);
        assert_eq!(ctl.queue_len(), 1);
        assert_eq!(ctl.queued_arrivals(), vec![now]);
        assert_eq!(ctl.active_readers(), 0);

        drop(guard);
        assert!(!ctl.is_locked());
        assert_eq!(ctl.active_writers(), 0);
        assert_eq!(ctl.queue_len(), 0, "release pops the oldest arrival");
        assert_eq!(ctl.contention_events(), 1);
    }

    #[test]
    fn guard_mutates_the_resource() {
        let ctl = AccessController::new(Vec::<u8>::new());
        {
            let mut guard = ctl.try_acquire(Role::Writer, Utc::now()).unwrap();
            guard.push(7);
        }
        assert_eq!(*ctl.acquire(Role::Admin), vec![7]);
    }

    #[test]
    fn guard_is_released_on_early_return() {
        fn fails(ctl: &AccessController<u8>) -> Result<(), DriverError> {
            let _guard = ctl.try_acquire(Role::Reader, Utc::now())?;
            Err(DriverError::BufferFull { requested: 1 })
        }

        let ctl = AccessController::new(0u8);
        assert!(fails(&ctl).is_err());
        assert!(!ctl.is_locked());
        assert_eq!(ctl.active_readers(), 0);
        assert!(ctl.try_acquire(Role::Writer, Utc::now()).is_ok());
    }

    #[test]
    fn admin_role_is_not_counted() {
        let ctl = AccessController::new(());
        let guard = ctl.acquire(Role::Admin);
        assert_eq!(ctl.active_readers() + ctl.active_writers(), 0);
        assert!(ctl.is_locked());
        drop(guard);
        assert!(!ctl.is_locked());
    }

    #[test]
    fn force_reset_clears_bookkeeping_and_release_saturates() {
        let ctl = AccessController::new(());
        let guard = ctl.try_acquire(Role::Writer, Utc::now()).unwrap();
        let _ = ctl.try_acquire(Role::Writer, Utc::now());
        let _ = ctl.try_acquire(Role::Reader, Utc::now());
        assert_eq!(ctl.queue_len(), 2);

        ctl.force_reset();
        assert_eq!(ctl.active_writers(), 0);
        assert_eq!(ctl.queue_len(), 0);

        drop(guard);
        assert_eq!(ctl.active_writers(), 0);
    }

    #[test]
    fn holders_always_see_the_lock_flag_set() {
        let ctl = Arc::new(AccessController::new(0u64));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let ctl = Arc::clone(&ctl);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let mut guard = ctl.acquire(Role::Admin);
                        assert!(ctl.is_locked(), "an earlier release cleared a live holder");
                        *guard += 1;
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert!(!ctl.is_locked());
        assert_eq!(*ctl.try_acquire(Role::Reader, Utc::now()).unwrap(), 8_000);
    }

    #[test]
    fn at_most_one_holder_across_threads() {
        let ctl = Arc::new(AccessController::new(0usize));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let ctl = Arc::clone(&ctl);
                thread::spawn(move || {
                    for _ in 0..500 {
                        if let Ok(mut guard) = ctl.try_acquire(Role::Writer, Utc::now()) {
                            assert_eq!(ctl.active_readers() + ctl.active_writers(), 1);
                            *guard += 1;
                        }
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert!(*ctl.acquire(Role::Admin) > 0);
        assert_eq!(ctl.active_writers(), 0);
    }
}
