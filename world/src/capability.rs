use std::fmt::Debug;

use skirmish_core::{BehaviorState, EntityId, ResourceKind};

use crate::SimContext;

/// Per-agent harvesting behaviour driven by the harvest command.
pub trait HarvestCapability: Debug {
    /// Assigns a node to harvest, restarting the behaviour around it.
    fn set_harvest_target(&mut self, agent: EntityId, target: EntityId, ctx: &mut SimContext<'_>);
    /// Node currently pursued, if any.
    fn harvest_target(&self) -> Option<EntityId>;
    /// Advances the behaviour by one tick.
    fn tick_harvest(&mut self, agent: EntityId, ctx: &mut SimContext<'_>);
    /// Abandons the current target and releases everything held for it.
    fn stop_harvesting(&mut self, agent: EntityId, ctx: &mut SimContext<'_>);
    /// Current behaviour state.
    fn state(&self) -> BehaviorState;
    /// Resource currently carried and its amount.
    fn carried(&self) -> Option<(ResourceKind, u32)>;
    /// Maximum amount carried before a deposit trip.
    fn capacity(&self) -> u32;
}

/// Per-agent construction behaviour driven by the build command.
pub trait BuildCapability: Debug {
    /// Assigns a site to construct, restarting the behaviour around it.
    fn set_build_target(&mut self, agent: EntityId, target: EntityId, ctx: &mut SimContext<'_>);
    /// Site currently pursued, if any.
    fn build_target(&self) -> Option<EntityId>;
    /// Advances the behaviour by one tick.
    fn tick_build(&mut self, agent: EntityId, ctx: &mut SimContext<'_>);
    /// Abandons the current site and releases its slot.
    fn stop_building(&mut self, agent: EntityId, ctx: &mut SimContext<'_>);
    /// Current behaviour state.
    fn state(&self) -> BehaviorState;
}

/// Per-agent combat behaviour driven by the attack command.
pub trait CombatCapability: Debug {
    /// Engages `target`, replacing any current engagement.
    fn set_attack_target(&mut self, agent: EntityId, target: EntityId, ctx: &mut SimContext<'_>);
    /// Entity currently engaged, if any.
    fn attack_target(&self) -> Option<EntityId>;
    /// Advances chasing, cooldowns and pending shots by one tick.
    fn tick_attack(&mut self, agent: EntityId, ctx: &mut SimContext<'_>);
    /// Reports whether the engagement ended, either because no valid target
    /// remains or because it was stopped.
    fn is_attack_finished(&self) -> bool;
    /// Disengages, halting movement and dropping pending shots.
    fn stop_attacking(&mut self, agent: EntityId, ctx: &mut SimContext<'_>);
}
