use skirmish_core::{EntityId, EntityLiveness};

/// Generation-checked slot allocator for every entity in the world.
#[derive(Clone, Debug, Default)]
pub(crate) struct EntityArena {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    live: usize,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    occupied: bool,
}

impl EntityArena {
    /// Issues a fresh handle, reusing the most recently freed slot first.
    pub(crate) fn allocate(&mut self) -> EntityId {
        self.live += 1;
        if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            slot.occupied = true;
            return EntityId::new(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            occupied: true,
        });
        EntityId::new(index, 0)
    }

    /// Frees the slot addressed by `entity`. Stale handles are ignored.
    pub(crate) fn free(&mut self, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.index() as usize];
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(entity.index());
        self.live -= 1;
        true
    }

    /// Number of live entities.
    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

impl EntityLiveness for EntityArena {
    fn is_alive(&self, entity: EntityId) -> bool {
        self.slots
            .get(entity.index() as usize)
            .map_or(false, |slot| {
                slot.occupied && slot.generation == entity.generation()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_slots_are_reused_with_a_new_generation() {
        let mut arena = EntityArena::default();
        let first = arena.allocate();
        let second = arena.allocate();
        assert_eq!(arena.len(), 2);

        assert!(arena.free(first));
        assert!(!arena.free(first), "double free is ignored");
        let recycled = arena.allocate();

        assert_eq!(recycled.index(), first.index());
        assert_ne!(recycled.generation(), first.generation());
        assert!(!arena.is_alive(first), "stale handle must not resolve");
        assert!(arena.is_alive(recycled));
        assert!(arena.is_alive(second));
    }

    #[test]
    fn unknown_handles_are_not_alive() {
        let arena = EntityArena::default();
        assert!(!arena.is_alive(EntityId::new(12, 0)));
    }
}
