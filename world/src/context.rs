use std::time::Duration;

use skirmish_core::Event;

use crate::World;

/// Per-tick context handed to every command and capability.
///
/// Bundles the authoritative world, the simulated time step and the event
/// sink so nothing in the simulation reaches for global state.
#[derive(Debug)]
pub struct SimContext<'a> {
    /// World mutated during the tick.
    pub world: &'a mut World,
    /// Simulated time covered by the tick.
    pub dt: Duration,
    /// Events produced during the tick.
    pub events: &'a mut Vec<Event>,
}

impl<'a> SimContext<'a> {
    /// Creates a context over the provided world and event sink.
    #[must_use]
    pub fn new(world: &'a mut World, dt: Duration, events: &'a mut Vec<Event>) -> Self {
        Self { world, dt, events }
    }

    /// Seconds covered by the tick.
    #[must_use]
    pub fn dt_secs(&self) -> f32 {
        self.dt.as_secs_f32()
    }

    /// Appends an event to the sink.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}
