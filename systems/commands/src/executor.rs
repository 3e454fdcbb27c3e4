use std::collections::VecDeque;

use skirmish_core::{CommandKind, EntityId};
use skirmish_world::SimContext;

use crate::{AgentCapabilities, Command, CommandStatus};

/// Per-agent scheduler holding a FIFO of commands and at most one active command.
///
/// An empty executor behaves as if an idle command were active. Queued
/// commands are never updated; only the active one receives ticks.
#[derive(Clone, Debug, Default)]
pub struct CommandExecutor {
    queue: VecDeque<Command>,
    active: Option<Command>,
}

impl CommandExecutor {
    /// Creates an idle executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `command` to the queue.
    ///
    /// An idle placeholder that is currently active is dropped so the new
    /// command gets promoted on the next tick.
    pub fn enqueue(&mut self, command: Command) {
        if self.active_kind() == Some(CommandKind::Idle) {
            self.active = None;
        }
        self.queue.push_back(command);
    }

    /// Replaces whatever the agent is doing with `command`.
    ///
    /// The active command is cancelled and queued commands are dropped
    /// without ever having started.
    pub fn set_command(
        &mut self,
        command: Command,
        agent: EntityId,
        capabilities: &mut AgentCapabilities,
        ctx: &mut SimContext<'_>,
    ) {
        self.clear(agent, capabilities, ctx);
        self.queue.push_back(command);
    }

    /// Cancels the active command and drops the queue.
    pub fn clear(
        &mut self,
        agent: EntityId,
        capabilities: &mut AgentCapabilities,
        ctx: &mut SimContext<'_>,
    ) {
        if let Some(mut active) = self.active.take() {
            active.cancel(agent, capabilities, ctx);
        }
        self.queue.clear();
    }

    /// Drives exactly one command for one simulation step.
    pub fn tick(
        &mut self,
        agent: EntityId,
        capabilities: &mut AgentCapabilities,
        ctx: &mut SimContext<'_>,
    ) {
        if self.active_kind() == Some(CommandKind::Idle) && !self.queue.is_empty() {
            self.active = None;
        }
        if self.active.is_none() {
            self.active = self.queue.pop_front();
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };
        let status = active.update(agent, capabilities, ctx);
        if status.is_terminal() {
            self.active = None;
        }
    }

    /// Command currently receiving ticks.
    #[must_use]
    pub fn active(&self) -> Option<&Command> {
        self.active.as_ref()
    }

    /// Variant of the command currently receiving ticks.
    #[must_use]
    pub fn active_kind(&self) -> Option<CommandKind> {
        self.active.as_ref().map(Command::kind)
    }

    /// Lifecycle phase of the active command.
    #[must_use]
    pub fn active_status(&self) -> Option<CommandStatus> {
        self.active.as_ref().map(Command::status)
    }

    /// Number of commands waiting behind the active one.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Reports whether nothing but an idle placeholder is left to run.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
            && self
                .active_kind()
                .map_or(true, |kind| kind == CommandKind::Idle)
    }
}
