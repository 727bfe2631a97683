//! Per-mailroom package number allocation.
//!
//! Each mailroom owns its own [`NumberPool`] behind its own mutex. The outer
//! map is only read-locked long enough to clone the pool handle, so
//! allocations in different mailrooms never wait on each other.
//!
//! Next to the mutex every mailroom has an async gate. Work that binds a
//! number to a package or frees it through a package holds the gate shared
//! across its store calls; a reset holds it exclusively while it reads which
//! numbers packages still hold.

use crate::core::pool::NumberPool;
use crate::domain::model::{MailroomId, PoolStatus};
use crate::utils::error::{EngineError, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock as AsyncRwLock};

#[derive(Debug)]
struct PoolEntry {
    numbers: Mutex<NumberPool>,
    gate: Arc<AsyncRwLock<()>>,
}

type SharedPool = Arc<PoolEntry>;

#[derive(Debug, Default)]
pub struct Allocator {
    pools: RwLock<HashMap<MailroomId, SharedPool>>,
}

impl Allocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision the 999 slots of a mailroom.
    pub fn initialize_pool(&self, mailroom: &MailroomId) -> Result<()> {
        let mut pools = self
            .pools
            .write()
            .map_err(|_| EngineError::LockPoisoned("allocator pool map".to_string()))?;

        if pools.contains_key(mailroom) {
            return Err(EngineError::AlreadyInitialized(mailroom.clone()));
        }

        pools.insert(
            mailroom.clone(),
            Arc::new(PoolEntry {
                numbers: Mutex::new(NumberPool::new(mailroom.clone())),
                gate: Arc::new(AsyncRwLock::new(())),
            }),
        );
        tracing::info!(mailroom = %mailroom, "Initialized number pool");
        Ok(())
    }

    pub fn allocate(&self, mailroom: &MailroomId) -> Result<u16> {
        let pool = self.pool(mailroom)?;
        let result = lock(&pool, mailroom)?.allocate();

        match &result {
            Ok(number) => tracing::debug!(mailroom = %mailroom, number, "Allocated package number"),
            Err(e) => tracing::warn!(mailroom = %mailroom, error = %e, "Allocation failed"),
        }
        result
    }

    /// Allocate a number that goes back to the pool unless the returned guard
    /// is committed.
    pub fn allocate_guarded<'a>(&'a self, mailroom: &MailroomId) -> Result<AllocationGuard<'a>> {
        let number = self.allocate(mailroom)?;
        Ok(AllocationGuard {
            allocator: self,
            mailroom: mailroom.clone(),
            number,
            committed: false,
        })
    }

    pub fn release(&self, mailroom: &MailroomId, number: u16) -> Result<()> {
        let pool = self.pool(mailroom)?;
        let result = lock(&pool, mailroom)?.release(number);

        match &result {
            Ok(()) => tracing::debug!(mailroom = %mailroom, number, "Released package number"),
            Err(e) => tracing::error!(mailroom = %mailroom, number, error = %e, "Release rejected"),
        }
        result
    }

    /// Administrative reset: every number outside `held` becomes available
    /// again. Callers hold the mailroom's [`Allocator::maintenance_gate`].
    pub fn reset(&self, mailroom: &MailroomId, held: &BTreeSet<u16>) -> Result<usize> {
        let pool = self.pool(mailroom)?;
        let released = lock(&pool, mailroom)?.reset(held);
        tracing::warn!(
            mailroom = %mailroom,
            released,
            kept = held.len(),
            "Number pool reset"
        );
        Ok(released)
    }

    /// Shared hold on the mailroom gate, taken by registrations and
    /// transitions for as long as they talk to the package store.
    pub async fn package_gate(
        &self,
        mailroom: &MailroomId,
    ) -> Result<OwnedRwLockReadGuard<()>> {
        let gate = Arc::clone(&self.pool(mailroom)?.gate);
        Ok(gate.read_owned().await)
    }

    /// Exclusive hold on the mailroom gate. No package binds or frees a number
    /// in this mailroom while it is held.
    pub async fn maintenance_gate(
        &self,
        mailroom: &MailroomId,
    ) -> Result<OwnedRwLockWriteGuard<()>> {
        let gate = Arc::clone(&self.pool(mailroom)?.gate);
        Ok(gate.write_owned().await)
    }

    pub fn status(&self, mailroom: &MailroomId, with_slots: bool) -> Result<PoolStatus> {
        let pool = self.pool(mailroom)?;
        let status = lock(&pool, mailroom)?.status(with_slots);
        Ok(status)
    }

    pub fn is_in_use(&self, mailroom: &MailroomId, number: u16) -> Result<bool> {
        let pool = self.pool(mailroom)?;
        let in_use = lock(&pool, mailroom)?.is_in_use(number);
        Ok(in_use)
    }

    fn pool(&self, mailroom: &MailroomId) -> Result<SharedPool> {
        let pools = self
            .pools
            .read()
            .map_err(|_| EngineError::LockPoisoned("allocator pool map".to_string()))?;

        pools
            .get(mailroom)
            .cloned()
            .ok_or_else(|| EngineError::PoolNotInitialized(mailroom.clone()))
    }
}

fn lock<'a>(pool: &'a SharedPool, mailroom: &MailroomId) -> Result<MutexGuard<'a, NumberPool>> {
    pool.numbers
        .lock()
        .map_err(|_| EngineError::LockPoisoned(format!("number pool {}", mailroom)))
}

/// A freshly allocated number that has not been bound to a persisted package.
///
/// Dropping the guard without calling [`AllocationGuard::commit`] releases the
/// number, including when the owning future is cancelled.
#[derive(Debug)]
pub struct AllocationGuard<'a> {
    allocator: &'a Allocator,
    mailroom: MailroomId,
    number: u16,
    committed: bool,
}

impl AllocationGuard<'_> {
    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn commit(mut self) -> u16 {
        self.committed = true;
        self.number
    }
}

impl Drop for AllocationGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        tracing::info!(
            mailroom = %self.mailroom,
            number = self.number,
            "Rolling back uncommitted allocation"
        );
        if let Err(e) = self.allocator.release(&self.mailroom, self.number) {
            tracing::error!(
                mailroom = %self.mailroom,
                number = self.number,
                error = %e,
                "Rollback release failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn mailroom(id: &str) -> MailroomId {
        MailroomId::new(id)
    }

    #[test]
    fn test_initialize_twice_fails() {
        let allocator = Allocator::new();
        allocator.initialize_pool(&mailroom("a")).unwrap();
        assert!(matches!(
            allocator.initialize_pool(&mailroom("a")),
            Err(EngineError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_uninitialized_pool() {
        let allocator = Allocator::new();
        assert!(matches!(
            allocator.allocate(&mailroom("missing")),
            Err(EngineError::PoolNotInitialized(_))
        ));
        assert!(matches!(
            allocator.release(&mailroom("missing"), 1),
            Err(EngineError::PoolNotInitialized(_))
        ));
    }

    #[test]
    fn test_pools_are_independent() {
        let allocator = Allocator::new();
        allocator.initialize_pool(&mailroom("a")).unwrap();
        allocator.initialize_pool(&mailroom("b")).unwrap();

        assert_eq!(allocator.allocate(&mailroom("a")).unwrap(), 1);
        assert_eq!(allocator.allocate(&mailroom("a")).unwrap(), 2);
        assert_eq!(allocator.allocate(&mailroom("b")).unwrap(), 1);
        assert!(allocator.release(&mailroom("b"), 2).is_err());
    }

    #[test]
    fn test_held_pool_does_not_block_other_mailroom() {
        let allocator = Arc::new(Allocator::new());
        allocator.initialize_pool(&mailroom("a")).unwrap();
        allocator.initialize_pool(&mailroom("b")).unwrap();

        let pool_a = allocator.pool(&mailroom("a")).unwrap();
        let _held = pool_a.numbers.lock().unwrap();

        let (tx, rx) = mpsc::channel();
        let other = Arc::clone(&allocator);
        thread::spawn(move || {
            let _ = tx.send(other.allocate(&mailroom("b")));
        });

        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("allocation in mailroom b waited on mailroom a");
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_maintenance_gate_waits_for_package_work() {
        let allocator = Allocator::new();
        allocator.initialize_pool(&mailroom("a")).unwrap();
        allocator.initialize_pool(&mailroom("b")).unwrap();

        let shared = allocator.package_gate(&mailroom("a")).await.unwrap();
        let blocked = tokio::time::timeout(
            Duration::from_millis(20),
            allocator.maintenance_gate(&mailroom("a")),
        )
        .await;
        assert!(blocked.is_err());

        // other mailrooms are unaffected
        allocator.maintenance_gate(&mailroom("b")).await.unwrap();

        drop(shared);
        allocator.maintenance_gate(&mailroom("a")).await.unwrap();
    }

    #[test]
    fn test_reset_keeps_held_numbers() {
        let allocator = Allocator::new();
        allocator.initialize_pool(&mailroom("a")).unwrap();
        for _ in 0..3 {
            allocator.allocate(&mailroom("a")).unwrap();
        }

        let held: BTreeSet<u16> = [2].into_iter().collect();
        assert_eq!(allocator.reset(&mailroom("a"), &held).unwrap(), 2);
        assert!(allocator.is_in_use(&mailroom("a"), 2).unwrap());
        assert_eq!(allocator.allocate(&mailroom("a")).unwrap(), 1);
        assert_eq!(allocator.allocate(&mailroom("a")).unwrap(), 3);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let allocator = Allocator::new();
        allocator.initialize_pool(&mailroom("a")).unwrap();

        {
            let guard = allocator.allocate_guarded(&mailroom("a")).unwrap();
            assert_eq!(guard.number(), 1);
            assert!(allocator.is_in_use(&mailroom("a"), 1).unwrap());
        }
        assert!(!allocator.is_in_use(&mailroom("a"), 1).unwrap());

        let guard = allocator.allocate_guarded(&mailroom("a")).unwrap();
        assert_eq!(guard.commit(), 1);
        assert!(allocator.is_in_use(&mailroom("a"), 1).unwrap());
    }

    #[test]
    fn test_parallel_threads_get_distinct_numbers() {
        let allocator = Arc::new(Allocator::new());
        allocator.initialize_pool(&mailroom("a")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || {
                    (0..25)
                        .map(|_| allocator.allocate(&mailroom("a")).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let numbers: Vec<u16> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<u16> = numbers.iter().copied().collect();

        assert_eq!(numbers.len(), 200);
        assert_eq!(unique.len(), 200);
        assert_eq!(unique, (1..=200).collect());
    }
}
