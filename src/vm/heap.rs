//! Slab-allocated object heap with manual reference counts.
//!
//! Every slot carries a generation counter that is bumped when the slot is
//! freed, so a stale `RawObj` is detected instead of resolving to whatever
//! object reused the slot.

use super::fault::{Fault, FaultKind};
use super::obj::{ObjKind, RawObj};

pub(crate) struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    capacity: Option<usize>,
}

struct Slot {
    generation: u32,
    refcount: u32,
    /// `None` while the slot sits on the free list.
    kind: Option<ObjKind>,
}

impl Heap {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            capacity,
        }
    }

    /// Allocate an object with a reference count of one.
    pub fn alloc(&mut self, kind: ObjKind) -> Result<RawObj, Fault> {
        if let Some(cap) = self.capacity {
            if self.live >= cap {
                return Err(Fault::new(
                    FaultKind::Memory,
                    format!("object heap capacity of {cap} exhausted"),
                ));
            }
        }
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.refcount = 1;
                slot.kind = Some(kind);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 1,
                    refcount: 1,
                    kind: Some(kind),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.live += 1;
        Ok(RawObj::new(index, self.slots[index as usize].generation))
    }

    fn slot(&self, r: RawObj) -> Result<&Slot, Fault> {
        self.slots
            .get(r.index() as usize)
            .filter(|slot| slot.generation == r.generation() && slot.kind.is_some())
            .ok_or_else(|| expired(r))
    }

    fn slot_mut(&mut self, r: RawObj) -> Result<&mut Slot, Fault> {
        self.slots
            .get_mut(r.index() as usize)
            .filter(|slot| slot.generation == r.generation() && slot.kind.is_some())
            .ok_or_else(|| expired(r))
    }

    pub fn get(&self, r: RawObj) -> Result<&ObjKind, Fault> {
        match &self.slot(r)?.kind {
            Some(kind) => Ok(kind),
            None => Err(expired(r)),
        }
    }

    pub fn get_mut(&mut self, r: RawObj) -> Result<&mut ObjKind, Fault> {
        match &mut self.slot_mut(r)?.kind {
            Some(kind) => Ok(kind),
            None => Err(expired(r)),
        }
    }

    /// Add one share; returns the new count.
    pub fn incref(&mut self, r: RawObj) -> Result<u32, Fault> {
        let slot = self.slot_mut(r)?;
        slot.refcount += 1;
        Ok(slot.refcount)
    }

    /// Release one share; returns the remaining count.
    ///
    /// Dropping the last share frees the object and releases the shares it
    /// holds in its children, iteratively.
    pub fn decref(&mut self, r: RawObj) -> Result<u32, Fault> {
        let remaining = self.decref_one(r)?;
        if remaining == 0 {
            let mut work = self.free_slot(r);
            while let Some(child) = work.pop() {
                // Children are owned by their parent, so they must be live.
                if let Ok(0) = self.decref_one(child) {
                    work.extend(self.free_slot(child));
                }
            }
        }
        Ok(remaining)
    }

    fn decref_one(&mut self, r: RawObj) -> Result<u32, Fault> {
        let slot = self.slot_mut(r)?;
        debug_assert!(slot.refcount > 0, "live slot with zero refcount");
        slot.refcount -= 1;
        Ok(slot.refcount)
    }

    /// Free a slot whose count reached zero, returning the child references
    /// it owned.
    fn free_slot(&mut self, r: RawObj) -> Vec<RawObj> {
        let slot = &mut self.slots[r.index() as usize];
        let Some(kind) = slot.kind.take() else {
            return Vec::new();
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(r.index());
        self.live -= 1;
        kind.children()
    }

    pub fn refcount(&self, r: RawObj) -> Option<u32> {
        self.slot(r).ok().map(|slot| slot.refcount)
    }

    pub fn live(&self) -> usize {
        self.live
    }

    /// One description per live object, for the shutdown leak audit.
    pub fn live_report(&self) -> Vec<String> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.kind.as_ref().map(|kind| {
                    format!(
                        "#{}.{} {} rc={}",
                        index,
                        slot.generation,
                        kind.type_name(),
                        slot.refcount
                    )
                })
            })
            .collect()
    }
}

fn expired(r: RawObj) -> Fault {
    Fault::new(
        FaultKind::Expired,
        format!("reference {r} is expired or was never allocated"),
    )
}
