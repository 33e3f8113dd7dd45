//! Energy metabolism, starvation, and eating.

use serde::{Deserialize, Serialize};

use crate::{Food, Position};

/// Tunables for metabolism and eating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VitalsParams {
    /// Energy lost per frame per unit of size.
    pub energy_drain: f32,
    /// Health lost per frame per unit of size while energy is exhausted.
    pub starvation_rate: f32,
    /// Eating reach per unit of size.
    pub eat_radius: f32,
    pub eat_health_restore: f32,
    pub max_health: f32,
}

/// Energy and health of a single agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    pub energy: f32,
    pub health: f32,
}

impl Vitals {
    #[must_use]
    pub const fn new(energy: f32, health: f32) -> Self {
        Self { energy, health }
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

/// Apply one frame of metabolism. Larger agents burn and starve faster.
#[must_use]
pub fn metabolize(vitals: Vitals, size: f32, params: &VitalsParams) -> Vitals {
    let mut energy = vitals.energy - params.energy_drain * size;
    let mut health = vitals.health;
    if energy <= 0.0 {
        energy = 0.0;
        health -= params.starvation_rate * size;
    }
    Vitals { energy, health }
}

/// Index of the first food item (in list order) within `eat_radius * size` of `position`.
#[must_use]
pub fn find_meal(
    position: Position,
    size: f32,
    food: &[Food],
    params: &VitalsParams,
) -> Option<usize> {
    let reach = params.eat_radius * size;
    food.iter()
        .position(|item| item.position.distance_to(position) < reach)
}

/// Credit a meal: full energy value, plus a capped health restore.
#[must_use]
pub fn eat(vitals: Vitals, meal_energy: f32, params: &VitalsParams) -> Vitals {
    Vitals {
        energy: vitals.energy + meal_energy,
        health: (vitals.health + params.eat_health_restore).min(params.max_health),
    }
}
