use crate::domain::model::{MailroomId, PoolStatus, Slot, SlotState, MAX_PACKAGE_NUMBER};
use crate::utils::error::{EngineError, Result};
use chrono::Utc;
use std::collections::BTreeSet;

/// Fixed slot table for one mailroom.
///
/// `slots[n - 1]` describes number `n`. `free` mirrors every slot with
/// `available == true`, ordered so the lowest free number is always first.
#[derive(Debug, Clone)]
pub struct NumberPool {
    mailroom: MailroomId,
    slots: Vec<Slot>,
    free: BTreeSet<u16>,
}

impl NumberPool {
    pub fn new(mailroom: MailroomId) -> Self {
        let slots = (1..=MAX_PACKAGE_NUMBER)
            .map(|number| Slot {
                number,
                available: true,
                last_used_at: None,
            })
            .collect();

        Self {
            mailroom,
            slots,
            free: (1..=MAX_PACKAGE_NUMBER).collect(),
        }
    }

    /// Take the lowest available number.
    pub fn allocate(&mut self) -> Result<u16> {
        let number = self.free.pop_first().ok_or_else(|| EngineError::Exhausted {
            mailroom: self.mailroom.clone(),
        })?;

        let slot = &mut self.slots[usize::from(number) - 1];
        slot.available = false;
        slot.last_used_at = Some(Utc::now());
        Ok(number)
    }

    /// Return a number to the pool. Releasing a number that is out of range or
    /// already available is reported, never ignored.
    pub fn release(&mut self, number: u16) -> Result<()> {
        if !self.is_in_use(number) {
            return Err(EngineError::SlotNotInUse {
                mailroom: self.mailroom.clone(),
                number,
            });
        }

        self.slots[usize::from(number) - 1].available = true;
        self.free.insert(number);
        Ok(())
    }

    /// Free every in-use number that is not in `held`. Returns how many
    /// numbers were freed.
    pub fn reset(&mut self, held: &BTreeSet<u16>) -> usize {
        let leaked: Vec<u16> = self
            .slots
            .iter()
            .filter(|slot| !slot.available && !held.contains(&slot.number))
            .map(|slot| slot.number)
            .collect();

        for &number in &leaked {
            self.slots[usize::from(number) - 1].available = true;
            self.free.insert(number);
        }
        leaked.len()
    }

    pub fn is_in_use(&self, number: u16) -> bool {
        self.slot(number).map(|slot| !slot.available).unwrap_or(false)
    }

    pub fn slot(&self, number: u16) -> Option<&Slot> {
        if number == 0 {
            return None;
        }
        self.slots.get(usize::from(number) - 1)
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn in_use(&self) -> usize {
        self.total() - self.available()
    }

    pub fn status(&self, with_slots: bool) -> PoolStatus {
        let slots = if with_slots {
            self.slots
                .iter()
                .map(|slot| SlotState {
                    number: slot.number,
                    available: slot.available,
                })
                .collect()
        } else {
            Vec::new()
        };

        PoolStatus {
            mailroom: self.mailroom.clone(),
            total: self.total(),
            in_use: self.in_use(),
            available: self.available(),
            slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> NumberPool {
        NumberPool::new(MailroomId::new("mr-test"))
    }

    #[test]
    fn test_new_pool_is_fully_available() {
        let pool = pool();
        assert_eq!(pool.total(), 999);
        assert_eq!(pool.available(), 999);
        assert_eq!(pool.in_use(), 0);
        assert!(pool.slot(0).is_none());
        assert!(pool.slot(1000).is_none());
    }

    #[test]
    fn test_allocates_lowest_first() {
        let mut pool = pool();
        assert_eq!(pool.allocate().unwrap(), 1);
        assert_eq!(pool.allocate().unwrap(), 2);
        assert_eq!(pool.allocate().unwrap(), 3);
        assert!(pool.slot(2).unwrap().last_used_at.is_some());
    }

    #[test]
    fn test_fragmented_pool_refills_smallest_gap() {
        let mut pool = pool();
        for _ in 0..10 {
            pool.allocate().unwrap();
        }
        // free every other number: 2, 4, 6, 8, 10
        for n in (2..=10).step_by(2) {
            pool.release(n).unwrap();
        }
        assert_eq!(pool.allocate().unwrap(), 2);
        assert_eq!(pool.allocate().unwrap(), 4);
        pool.release(3).unwrap();
        assert_eq!(pool.allocate().unwrap(), 3);
        assert_eq!(pool.allocate().unwrap(), 6);
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = pool();
        for expected in 1..=999u16 {
            assert_eq!(pool.allocate().unwrap(), expected);
        }
        assert!(matches!(pool.allocate(), Err(EngineError::Exhausted { .. })));
        assert_eq!(pool.in_use(), 999);

        pool.release(500).unwrap();
        assert_eq!(pool.allocate().unwrap(), 500);
    }

    #[test]
    fn test_double_release_is_reported() {
        let mut pool = pool();
        let n = pool.allocate().unwrap();
        pool.release(n).unwrap();
        assert!(matches!(
            pool.release(n),
            Err(EngineError::SlotNotInUse { number: 1, .. })
        ));
    }

    #[test]
    fn test_release_out_of_range() {
        let mut pool = pool();
        assert!(pool.release(0).is_err());
        assert!(pool.release(1000).is_err());
        assert!(pool.release(42).is_err());
    }

    #[test]
    fn test_reset_frees_everything_not_held() {
        let mut pool = pool();
        for _ in 0..5 {
            pool.allocate().unwrap();
        }
        assert_eq!(pool.reset(&BTreeSet::new()), 5);
        assert_eq!(pool.available(), 999);
        assert_eq!(pool.allocate().unwrap(), 1);
    }

    #[test]
    fn test_reset_keeps_held_numbers() {
        let mut pool = pool();
        for _ in 0..5 {
            pool.allocate().unwrap();
        }
        let held: BTreeSet<u16> = [2, 4].into_iter().collect();

        assert_eq!(pool.reset(&held), 3);
        assert!(pool.is_in_use(2));
        assert!(pool.is_in_use(4));
        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.allocate().unwrap(), 1);
        assert_eq!(pool.allocate().unwrap(), 3);
    }

    #[test]
    fn test_status_lists_slots_on_request() {
        let mut pool = pool();
        pool.allocate().unwrap();
        let status = pool.status(true);
        assert_eq!(status.slots.len(), 999);
        assert!(!status.slots[0].available);
        assert!(status.slots[1].available);
        assert!(pool.status(false).slots.is_empty());
    }
}
