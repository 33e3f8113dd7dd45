//! Core types and world state for the petri-dish cell ecosystem.

pub mod combat;
pub mod control;
pub mod genome;
pub mod motion;
pub mod stats;
pub mod vitals;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use petridish_index::{NeighborhoodIndex, UniformGridIndex};
use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use combat::{CombatOutcome, CombatParams};
pub use control::{ControlCommand, ControlError, FrameClock, RunState, SimulationDriver};
pub use genome::{GenomeSeed, MutationParams, TraitBounds, TraitDescriptor, TraitKind};
pub use motion::{Kinematics, PhysicsParams, SteeringParams};
pub use stats::{CombatStats, SeededStatDeriver, StatDeriver};
pub use vitals::{Vitals, VitalsParams};

use genome::{FULL_CIRCLE_DEG, symmetric_noise};

/// Simulation clock (frames processed since the world was created).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Lineage depth (the seed agent is generation zero).
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Generation(pub u32);

impl Generation {
    /// Advances to the next lineage generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Stable identifier of an agent, unique for the lifetime of a world.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct AgentId(pub u64);

/// Stable identifier of a food item, unique for the lifetime of a world.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct FoodId(pub u64);

/// Point in dish coordinates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    /// Construct a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Per-frame displacement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    /// Construct a new velocity vector.
    #[must_use]
    pub const fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    #[must_use]
    pub fn magnitude(self) -> f32 {
        self.vx.hypot(self.vy)
    }
}

/// Per-frame change in velocity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Acceleration {
    pub ax: f32,
    pub ay: f32,
}

impl Acceleration {
    #[must_use]
    pub const fn new(ax: f32, ay: f32) -> Self {
        Self { ax, ay }
    }
}

/// Bounding rectangle `[0, width] x [0, height]` every position is confined to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Dish {
    pub width: f32,
    pub height: f32,
}

impl Dish {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn center(self) -> Position {
        Position::new(self.width * 0.5, self.height * 0.5)
    }

    /// Hard clamp into the rectangle.
    #[must_use]
    pub fn clamp(self, position: Position) -> Position {
        Position::new(
            position.x.clamp(0.0, self.width),
            position.y.clamp(0.0, self.height),
        )
    }

    #[must_use]
    pub fn contains(self, position: Position) -> bool {
        (0.0..=self.width).contains(&position.x) && (0.0..=self.height).contains(&position.y)
    }
}

/// A single simulated cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub position: Position,
    pub velocity: Velocity,
    pub acceleration: Acceleration,
    /// Non-negative, unbounded above.
    pub energy: f32,
    /// Within `[0, max_health]`; an agent at or below zero is dropped.
    pub health: f32,
    pub traits: TraitDescriptor,
    /// Derived once at creation and never recomputed.
    pub stats: CombatStats,
    pub generation: Generation,
}

impl Agent {
    #[must_use]
    pub fn vitals(&self) -> Vitals {
        Vitals::new(self.energy, self.health)
    }

    #[must_use]
    pub fn kinematics(&self) -> Kinematics {
        Kinematics {
            position: self.position,
            velocity: self.velocity,
            acceleration: self.acceleration,
        }
    }

    /// Size trait clamped into its valid range.
    #[must_use]
    pub fn size(&self) -> f32 {
        self.traits.effective_size()
    }
}

/// A consumable point resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Food {
    pub id: FoodId,
    pub position: Position,
    pub energy: f32,
}

impl Food {
    #[must_use]
    pub const fn new(id: FoodId, position: Position, energy: f32) -> Self {
        Self {
            id,
            position,
            energy,
        }
    }
}

/// Fully committed frame: every agent and food item alive after `tick`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameSnapshot {
    pub tick: Tick,
    pub agents: Vec<Agent>,
    pub food: Vec<Food>,
}

impl FrameSnapshot {
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    #[must_use]
    pub fn population(&self) -> usize {
        self.agents.len()
    }
}

/// Events emitted after processing a frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickEvents {
    pub tick: Tick,
    pub births: usize,
    pub deaths: usize,
    pub food_eaten: usize,
    pub food_spawned: Option<FoodId>,
}

/// Aggregate statistics recorded after each frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickSummary {
    pub tick: Tick,
    pub agent_count: usize,
    pub food_count: usize,
    pub births: usize,
    pub deaths: usize,
    pub average_energy: f32,
    pub average_health: f32,
}

/// Errors that can occur when constructing or reconfiguring world state.
#[derive(Debug, Error)]
pub enum WorldStateError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a petri-dish world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PetriDishConfig {
    /// Dish width in world units.
    pub dish_width: f32,
    /// Dish height in world units.
    pub dish_height: f32,
    /// Edge length of the food bucketing grid.
    pub food_cell_size: f32,
    /// Maximum distance at which an agent senses food.
    pub detection_range: f32,
    /// Pull toward food for an agent with `reaction == reaction_reference`.
    pub steering_force: f32,
    /// Reaction stat that yields exactly `steering_force`.
    pub reaction_reference: f32,
    /// Half-width of the per-axis random roam impulse.
    pub roam_jitter: f32,
    /// Multiplier applied to acceleration every frame.
    pub acceleration_damping: f32,
    /// Multiplier applied to velocity every frame.
    pub friction: f32,
    /// Speed stat divided by this gives the per-frame speed cap.
    pub speed_divisor: f32,
    /// Fraction of velocity kept (reversed) on a wall hit.
    pub bounce_restitution: f32,
    /// Energy drained per frame per unit of size.
    pub energy_drain: f32,
    /// Health lost per frame per unit of size once energy is exhausted.
    pub starvation_rate: f32,
    /// Eating reach per unit of size.
    pub eat_radius: f32,
    /// Health restored by one meal (capped at `max_health`).
    pub eat_health_restore: f32,
    /// Upper bound of agent health; also the starting health.
    pub max_health: f32,
    /// Energy every new agent starts with.
    pub initial_energy: f32,
    /// Half-width of the per-axis random starting velocity.
    pub initial_speed: f32,
    /// Combat reach per unit of defender size.
    pub contact_radius: f32,
    /// Hue distance (degrees) above which agents are enemies.
    pub enemy_hue_threshold: f32,
    /// Scales `attack / defense` into per-frame damage.
    pub combat_damage_scale: f32,
    /// Velocity impulse per attacker in contact.
    pub knockback: f32,
    /// Floor for defense in the damage division.
    pub min_defense: f32,
    /// Energy needed to reproduce.
    pub reproduction_energy_threshold: f32,
    /// Population cap enforced by reproduction.
    pub max_population: usize,
    /// Half-width of the per-axis offset of a child from its parent.
    pub spawn_jitter: f32,
    /// Per-trait mutation probability.
    pub mutation_rate: f32,
    /// Half-width of hue mutation noise, in degrees.
    pub hue_mutation_range: f32,
    /// Half-width of mutation noise for every other trait.
    pub trait_mutation_range: f32,
    /// Food count at which spawning stops.
    pub max_food: usize,
    /// Probability of spawning one food item per frame while under the cap.
    pub food_spawn_chance: f32,
    /// Energy value of every spawned food item.
    pub food_energy: f32,
    /// Number of frame summaries retained in history.
    pub history_capacity: usize,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
}

impl Default for PetriDishConfig {
    fn default() -> Self {
        Self {
            dish_width: 800.0,
            dish_height: 600.0,
            food_cell_size: 50.0,
            detection_range: 150.0,
            steering_force: 0.2,
            reaction_reference: 50.0,
            roam_jitter: 0.075,
            acceleration_damping: 0.85,
            friction: 0.99,
            speed_divisor: 30.0,
            bounce_restitution: 0.5,
            energy_drain: 0.08,
            starvation_rate: 0.5,
            eat_radius: 20.0,
            eat_health_restore: 10.0,
            max_health: 100.0,
            initial_energy: 100.0,
            initial_speed: 1.0,
            contact_radius: 40.0,
            enemy_hue_threshold: 45.0,
            combat_damage_scale: 0.1,
            knockback: 0.2,
            min_defense: 1.0,
            reproduction_energy_threshold: 150.0,
            max_population: 50,
            spawn_jitter: 10.0,
            mutation_rate: 0.2,
            hue_mutation_range: 60.0,
            trait_mutation_range: 0.25,
            max_food: 30,
            food_spawn_chance: 0.05,
            food_energy: 40.0,
            history_capacity: 256,
            rng_seed: None,
        }
    }
}

fn require(ok: bool, message: &'static str) -> Result<(), WorldStateError> {
    if ok {
        Ok(())
    } else {
        Err(WorldStateError::InvalidConfig(message))
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

fn unit(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

impl PetriDishConfig {
    /// Check every field against its documented domain.
    pub fn validate(&self) -> Result<(), WorldStateError> {
        validate_dish(self.dish_width, self.dish_height)?;
        require(
            positive(self.food_cell_size),
            "food_cell_size must be positive",
        )?;
        require(
            positive(self.detection_range),
            "detection_range must be positive",
        )?;
        require(
            non_negative(self.steering_force),
            "steering_force must be non-negative",
        )?;
        require(
            positive(self.reaction_reference),
            "reaction_reference must be positive",
        )?;
        require(
            non_negative(self.roam_jitter),
            "roam_jitter must be non-negative",
        )?;
        require(
            unit(self.acceleration_damping),
            "acceleration_damping must be within [0, 1]",
        )?;
        require(unit(self.friction), "friction must be within [0, 1]")?;
        require(
            positive(self.speed_divisor),
            "speed_divisor must be positive",
        )?;
        require(
            unit(self.bounce_restitution),
            "bounce_restitution must be within [0, 1]",
        )?;
        require(
            non_negative(self.energy_drain),
            "energy_drain must be non-negative",
        )?;
        require(
            non_negative(self.starvation_rate),
            "starvation_rate must be non-negative",
        )?;
        require(positive(self.eat_radius), "eat_radius must be positive")?;
        require(
            non_negative(self.eat_health_restore),
            "eat_health_restore must be non-negative",
        )?;
        require(positive(self.max_health), "max_health must be positive")?;
        require(
            non_negative(self.initial_energy),
            "initial_energy must be non-negative",
        )?;
        require(
            non_negative(self.initial_speed),
            "initial_speed must be non-negative",
        )?;
        require(
            positive(self.contact_radius),
            "contact_radius must be positive",
        )?;
        require(
            (0.0..=180.0).contains(&self.enemy_hue_threshold),
            "enemy_hue_threshold must be within [0, 180]",
        )?;
        require(
            non_negative(self.combat_damage_scale),
            "combat_damage_scale must be non-negative",
        )?;
        require(non_negative(self.knockback), "knockback must be non-negative")?;
        require(positive(self.min_defense), "min_defense must be positive")?;
        require(
            positive(self.reproduction_energy_threshold),
            "reproduction_energy_threshold must be positive",
        )?;
        require(self.max_population >= 1, "max_population must be at least 1")?;
        require(
            non_negative(self.spawn_jitter),
            "spawn_jitter must be non-negative",
        )?;
        require(
            unit(self.mutation_rate),
            "mutation_rate must be within [0, 1]",
        )?;
        require(
            non_negative(self.hue_mutation_range),
            "hue_mutation_range must be non-negative",
        )?;
        require(
            non_negative(self.trait_mutation_range),
            "trait_mutation_range must be non-negative",
        )?;
        require(
            unit(self.food_spawn_chance),
            "food_spawn_chance must be within [0, 1]",
        )?;
        require(
            non_negative(self.food_energy),
            "food_energy must be non-negative",
        )?;
        require(
            self.history_capacity >= 1,
            "history_capacity must be at least 1",
        )?;
        Ok(())
    }

    #[must_use]
    pub fn dish(&self) -> Dish {
        Dish::new(self.dish_width, self.dish_height)
    }

    #[must_use]
    pub fn steering_params(&self) -> SteeringParams {
        SteeringParams {
            detection_range: self.detection_range,
            force: self.steering_force,
            reaction_reference: self.reaction_reference,
            damping: self.acceleration_damping,
        }
    }

    #[must_use]
    pub fn physics_params(&self) -> PhysicsParams {
        PhysicsParams {
            friction: self.friction,
            speed_divisor: self.speed_divisor,
            restitution: self.bounce_restitution,
        }
    }

    #[must_use]
    pub fn vitals_params(&self) -> VitalsParams {
        VitalsParams {
            energy_drain: self.energy_drain,
            starvation_rate: self.starvation_rate,
            eat_radius: self.eat_radius,
            eat_health_restore: self.eat_health_restore,
            max_health: self.max_health,
        }
    }

    #[must_use]
    pub fn combat_params(&self) -> CombatParams {
        CombatParams {
            contact_radius: self.contact_radius,
            enemy_hue_threshold: self.enemy_hue_threshold,
            damage_scale: self.combat_damage_scale,
            knockback: self.knockback,
            min_defense: self.min_defense,
        }
    }

    #[must_use]
    pub fn mutation_params(&self) -> MutationParams {
        MutationParams {
            rate: self.mutation_rate,
            hue_range: self.hue_mutation_range,
            trait_range: self.trait_mutation_range,
        }
    }

    /// Returns the configured RNG, seeded from entropy if no seed is set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

fn validate_dish(width: f32, height: f32) -> Result<(), WorldStateError> {
    require(positive(width), "dish_width must be positive")?;
    require(positive(height), "dish_height must be positive")
}

/// Per-agent result of the parallel intent phase.
#[derive(Debug, Clone, Copy)]
struct AgentIntent {
    kinematics: Kinematics,
    vitals: Vitals,
    combat: CombatOutcome,
}

/// Frame under construction during the reduction phase.
#[derive(Debug, Default)]
struct FrameBuilder {
    agents: Vec<Agent>,
    food: Vec<Food>,
    births: usize,
    deaths: usize,
    food_eaten: usize,
}

/// Simulation context: owns the committed frame and every source of randomness.
pub struct WorldState {
    config: PetriDishConfig,
    tick: Tick,
    rng: Box<dyn RngCore + Send>,
    stats: Arc<dyn StatDeriver>,
    index: UniformGridIndex,
    current: Arc<FrameSnapshot>,
    next_agent_id: u64,
    next_food_id: u64,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("agent_count", &self.current.agents.len())
            .field("food_count", &self.current.food.len())
            .finish()
    }
}

impl WorldState {
    /// Instantiate an empty world using the supplied configuration.
    pub fn new(config: PetriDishConfig) -> Result<Self, WorldStateError> {
        config.validate()?;
        let rng = config.seeded_rng();
        Self::with_rng(config, Box::new(rng))
    }

    /// Instantiate an empty world drawing every random number from `rng`.
    pub fn with_rng(
        config: PetriDishConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, WorldStateError> {
        config.validate()?;
        let history_capacity = config.history_capacity;
        Ok(Self {
            index: UniformGridIndex::new(config.food_cell_size),
            config,
            tick: Tick::zero(),
            rng,
            stats: Arc::new(SeededStatDeriver),
            current: Arc::new(FrameSnapshot::default()),
            next_agent_id: 0,
            next_food_id: 0,
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Replace the stat derivation used for agents created from now on.
    pub fn set_stat_deriver<D: StatDeriver + 'static>(&mut self, deriver: D) {
        self.stats = Arc::new(deriver);
    }

    /// Derive combat stats for `traits` with the active deriver (traits are clamped first).
    #[must_use]
    pub fn derive_stats(&self, traits: &TraitDescriptor) -> CombatStats {
        self.stats.derive(&traits.clamped())
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &PetriDishConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn dish(&self) -> Dish {
        self.config.dish()
    }

    /// Resize the dish. Live agents keep their positions until physics next clamps them.
    pub fn set_dish(&mut self, width: f32, height: f32) -> Result<(), WorldStateError> {
        validate_dish(width, height)?;
        self.config.dish_width = width;
        self.config.dish_height = height;
        debug!(width, height, "dish resized");
        Ok(())
    }

    /// Shared handle to the last committed frame.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FrameSnapshot> {
        Arc::clone(&self.current)
    }

    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.current.agents
    }

    #[must_use]
    pub fn food(&self) -> &[Food] {
        &self.current.food
    }

    #[must_use]
    pub fn population(&self) -> usize {
        self.current.agents.len()
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.current.agent(id)
    }

    /// Mutable access to a live agent (copy-on-write if a snapshot is still held elsewhere).
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        Arc::make_mut(&mut self.current)
            .agents
            .iter_mut()
            .find(|agent| agent.id == id)
    }

    /// Remove an agent from the live set. A missing id yields `None`.
    ///
    /// Editors go through [`SimulationDriver::remove_agent`], which only allows this while paused.
    pub(crate) fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        let idx = self.current.agents.iter().position(|agent| agent.id == id)?;
        let removed = Arc::make_mut(&mut self.current).agents.remove(idx);
        debug!(agent = removed.id.0, "agent removed");
        Some(removed)
    }

    /// Insert a new generation-zero agent. Traits are clamped and the position is clamped
    /// into the dish.
    pub fn spawn_agent(&mut self, traits: TraitDescriptor, position: Position) -> AgentId {
        let agent = self.create_agent(traits, position, Generation::default());
        let id = agent.id;
        Arc::make_mut(&mut self.current).agents.push(agent);
        id
    }

    /// Seed the dish with the starter genome at its centre, using a random hue.
    pub fn spawn_initial_agent(&mut self) -> AgentId {
        let hue = self.rng.random_range(0.0..FULL_CIRCLE_DEG);
        let centre = self.dish().center();
        self.spawn_agent(TraitDescriptor::starter(hue), centre)
    }

    /// Insert a food item worth `food_energy` at `position` (clamped into the dish).
    pub fn spawn_food(&mut self, position: Position) -> FoodId {
        let food = Food::new(
            self.allocate_food_id(),
            self.dish().clamp(position),
            self.config.food_energy,
        );
        let id = food.id;
        Arc::make_mut(&mut self.current).food.push(food);
        id
    }

    /// Frame summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    #[must_use]
    pub fn last_summary(&self) -> Option<&TickSummary> {
        self.history.back()
    }

    /// Mutable access to the world's random source.
    pub fn rng(&mut self) -> &mut dyn RngCore {
        self.rng.as_mut()
    }

    /// Execute one frame: intents against the previous snapshot, then an ordered reduction.
    pub fn step(&mut self) -> TickEvents {
        let next_tick = self.tick.next();
        let previous = Arc::clone(&self.current);

        self.stage_index_food(&previous);
        let roams = self.stage_roam(previous.agents.len());
        let intents = self.stage_intents(&previous, &roams);
        let mut frame = self.stage_resolve(&previous, intents);
        let food_spawned = self.stage_food_spawn(&mut frame);

        let events = TickEvents {
            tick: next_tick,
            births: frame.births,
            deaths: frame.deaths,
            food_eaten: frame.food_eaten,
            food_spawned,
        };
        self.stage_commit(next_tick, frame);
        debug!(
            tick = next_tick.0,
            agents = self.current.agents.len(),
            food = self.current.food.len(),
            births = events.births,
            deaths = events.deaths,
            "frame committed"
        );
        events
    }

    fn stage_index_food(&mut self, previous: &FrameSnapshot) {
        let positions: Vec<(f32, f32)> = previous
            .food
            .iter()
            .map(|food| (food.position.x, food.position.y))
            .collect();
        if let Err(err) = self.index.rebuild(&positions) {
            warn!(%err, "food index rebuild failed");
        }
    }

    /// Roam impulses are drawn up front, in snapshot order, so the parallel phase stays
    /// deterministic.
    fn stage_roam(&mut self, count: usize) -> Vec<Acceleration> {
        let jitter = self.config.roam_jitter;
        (0..count)
            .map(|_| {
                let ax = symmetric_noise(self.rng.as_mut(), jitter);
                let ay = symmetric_noise(self.rng.as_mut(), jitter);
                Acceleration::new(ax, ay)
            })
            .collect()
    }

    fn stage_intents(
        &self,
        previous: &FrameSnapshot,
        roams: &[Acceleration],
    ) -> Vec<AgentIntent> {
        let steering = self.config.steering_params();
        let physics = self.config.physics_params();
        let vitals_params = self.config.vitals_params();
        let combat_params = self.config.combat_params();
        let dish = self.config.dish();
        let index = &self.index;

        previous
            .agents
            .par_iter()
            .zip(roams.par_iter())
            .map(|(agent, &roam)| {
                let target = motion::sense_food(
                    index,
                    &previous.food,
                    agent.position,
                    steering.detection_range,
                );
                let acceleration = motion::steer(
                    agent.acceleration,
                    agent.position,
                    agent.stats.reaction,
                    target,
                    roam,
                    &steering,
                );
                let kinematics = motion::integrate(
                    Kinematics {
                        acceleration,
                        ..agent.kinematics()
                    },
                    agent.stats.speed,
                    dish,
                    &physics,
                );
                AgentIntent {
                    kinematics,
                    vitals: vitals::metabolize(agent.vitals(), agent.size(), &vitals_params),
                    combat: combat::resolve(
                        agent.id,
                        kinematics.position,
                        agent,
                        &previous.agents,
                        &combat_params,
                    ),
                }
            })
            .collect()
    }

    /// Apply intents in snapshot order: the first agent to reach a food item eats it.
    fn stage_resolve(
        &mut self,
        previous: &FrameSnapshot,
        intents: Vec<AgentIntent>,
    ) -> FrameBuilder {
        let vitals_params = self.config.vitals_params();
        let threshold = self.config.reproduction_energy_threshold;
        let cap = self.config.max_population;
        let mut frame = FrameBuilder {
            agents: Vec::with_capacity(previous.agents.len() + 1),
            food: previous.food.clone(),
            ..FrameBuilder::default()
        };

        for (agent, intent) in previous.agents.iter().zip(intents) {
            let mut vitals = intent.vitals;
            if vitals.is_dead() {
                trace!(agent = agent.id.0, "agent starved");
                frame.deaths += 1;
                continue;
            }

            let position = intent.kinematics.position;
            let reachable = vitals::find_meal(position, agent.size(), &frame.food, &vitals_params);
            if let Some(idx) = reachable {
                let meal = frame.food.remove(idx);
                vitals = vitals::eat(vitals, meal.energy, &vitals_params);
                frame.food_eaten += 1;
            }

            vitals.health = (vitals.health - intent.combat.damage).min(vitals_params.max_health);
            if vitals.is_dead() {
                trace!(
                    agent = agent.id.0,
                    attackers = intent.combat.attackers,
                    "agent killed in combat"
                );
                frame.deaths += 1;
                continue;
            }

            let mut velocity = intent.kinematics.velocity;
            velocity.vx += intent.combat.knockback.vx;
            velocity.vy += intent.combat.knockback.vy;

            let mut survivor = Agent {
                position,
                velocity,
                acceleration: intent.kinematics.acceleration,
                energy: vitals.energy,
                health: vitals.health,
                ..agent.clone()
            };

            if survivor.energy >= threshold && previous.agents.len() + frame.births < cap {
                survivor.energy /= 2.0;
                let child = self.spawn_child(&survivor);
                trace!(
                    parent = survivor.id.0,
                    child = child.id.0,
                    generation = child.generation.0,
                    "agent reproduced"
                );
                frame.agents.push(child);
                frame.births += 1;
            }
            frame.agents.push(survivor);
        }
        frame
    }

    fn stage_food_spawn(&mut self, frame: &mut FrameBuilder) -> Option<FoodId> {
        if frame.food.len() >= self.config.max_food {
            return None;
        }
        if self.rng.random::<f32>() >= self.config.food_spawn_chance {
            return None;
        }
        let dish = self.dish();
        let position = Position::new(
            self.rng.random_range(0.0..=dish.width),
            self.rng.random_range(0.0..=dish.height),
        );
        let food = Food::new(self.allocate_food_id(), position, self.config.food_energy);
        frame.food.push(food);
        Some(food.id)
    }

    fn stage_commit(&mut self, tick: Tick, frame: FrameBuilder) {
        let count = frame.agents.len();
        let (average_energy, average_health) = if count == 0 {
            (0.0, 0.0)
        } else {
            let energy: f32 = frame.agents.iter().map(|agent| agent.energy).sum();
            let health: f32 = frame.agents.iter().map(|agent| agent.health).sum();
            (energy / count as f32, health / count as f32)
        };
        let summary = TickSummary {
            tick,
            agent_count: count,
            food_count: frame.food.len(),
            births: frame.births,
            deaths: frame.deaths,
            average_energy,
            average_health,
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);

        self.current = Arc::new(FrameSnapshot {
            tick,
            agents: frame.agents,
            food: frame.food,
        });
        self.tick = tick;
    }

    fn spawn_child(&mut self, parent: &Agent) -> Agent {
        let traits = genome::mutate(
            &parent.traits,
            &self.config.mutation_params(),
            self.rng.as_mut(),
        );
        let jitter = self.config.spawn_jitter;
        let dx = symmetric_noise(self.rng.as_mut(), jitter);
        let dy = symmetric_noise(self.rng.as_mut(), jitter);
        let position = Position::new(parent.position.x + dx, parent.position.y + dy);
        self.create_agent(traits, position, parent.generation.next())
    }

    fn create_agent(
        &mut self,
        traits: TraitDescriptor,
        position: Position,
        generation: Generation,
    ) -> Agent {
        let traits = traits.clamped();
        let stats = self.stats.derive(&traits);
        let speed = self.config.initial_speed;
        let vx = symmetric_noise(self.rng.as_mut(), speed);
        let vy = symmetric_noise(self.rng.as_mut(), speed);
        Agent {
            id: self.allocate_agent_id(),
            position: self.dish().clamp(position),
            velocity: Velocity::new(vx, vy),
            acceleration: Acceleration::default(),
            energy: self.config.initial_energy,
            health: self.config.max_health,
            traits,
            stats,
            generation,
        }
    }

    fn allocate_agent_id(&mut self) -> AgentId {
        let id = AgentId(self.next_agent_id);
        self.next_agent_id += 1;
        id
    }

    fn allocate_food_id(&mut self) -> FoodId {
        let id = FoodId(self.next_food_id);
        self.next_food_id += 1;
        id
    }
}
