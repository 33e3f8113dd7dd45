//! Lifecycle driver: run/pause state, frame clock, and external commands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{Agent, AgentId, FrameSnapshot, TickEvents, WorldState, WorldStateError};

/// Whether frame callbacks advance the simulation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Running,
    Paused,
}

/// Commands an embedder can queue from its UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ControlCommand {
    Pause,
    Resume,
    RemoveAgent(AgentId),
    ResizeDish { width: f32, height: f32 },
}

/// Errors produced when a lifecycle command cannot be applied.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("agents can only be removed while the simulation is paused")]
    NotPaused,
    #[error(transparent)]
    World(#[from] WorldStateError),
}

/// Wall-clock bookkeeping between frame callbacks.
///
/// Time is observed but never scales motion: one callback is one step.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<Instant>,
    last_delta: Duration,
    total_elapsed: Duration,
    frames: u64,
}

impl FrameClock {
    fn record(&mut self, now: Instant) {
        self.last_delta = match self.last {
            Some(previous) => now.saturating_duration_since(previous),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        self.total_elapsed += self.last_delta;
        self.frames += 1;
    }

    /// Time between the two most recent callbacks.
    #[must_use]
    pub fn last_delta(&self) -> Duration {
        self.last_delta
    }

    /// Time since the first callback, paused periods included.
    #[must_use]
    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    /// Number of callbacks observed, paused or not.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Owns a world and decides, per animation callback, whether it advances.
#[derive(Debug)]
pub struct SimulationDriver {
    world: WorldState,
    state: RunState,
    clock: FrameClock,
}

impl SimulationDriver {
    #[must_use]
    pub fn new(world: WorldState) -> Self {
        Self {
            world,
            state: RunState::Running,
            clock: FrameClock::default(),
        }
    }

    /// Handle one animation callback. The clock always advances; the world steps only while
    /// running, so resuming never fast-forwards.
    pub fn on_frame(&mut self, now: Instant) -> Option<TickEvents> {
        self.clock.record(now);
        match self.state {
            RunState::Paused => None,
            RunState::Running => Some(self.world.step()),
        }
    }

    pub fn pause(&mut self) {
        if self.state != RunState::Paused {
            debug!(tick = self.world.tick().0, "simulation paused");
        }
        self.state = RunState::Paused;
    }

    pub fn resume(&mut self) {
        if self.state != RunState::Running {
            debug!(tick = self.world.tick().0, "simulation resumed");
        }
        self.state = RunState::Running;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// Delete one agent from the live set. Only valid while paused; an unknown id is `Ok(None)`.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<Option<Agent>, ControlError> {
        if !self.is_paused() {
            warn!(agent = id.0, "remove_agent rejected while running");
            return Err(ControlError::NotPaused);
        }
        Ok(self.world.remove_agent(id))
    }

    /// Update dish bounds used by subsequent steps.
    pub fn set_dish(&mut self, width: f32, height: f32) -> Result<(), WorldStateError> {
        self.world.set_dish(width, height).inspect_err(|err| {
            warn!(%err, width, height, "dish resize rejected");
        })
    }

    /// Apply a queued command.
    pub fn apply(&mut self, command: ControlCommand) -> Result<(), ControlError> {
        debug!(?command, "applying control command");
        match command {
            ControlCommand::Pause => self.pause(),
            ControlCommand::Resume => self.resume(),
            ControlCommand::RemoveAgent(id) => {
                self.remove_agent(id)?;
            }
            ControlCommand::ResizeDish { width, height } => self.set_dish(width, height)?,
        }
        Ok(())
    }

    /// Last committed frame.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FrameSnapshot> {
        self.world.snapshot()
    }

    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    #[must_use]
    pub fn into_world(self) -> WorldState {
        self.world
    }
}
