//! Hue-based hostility and contact damage.

use serde::{Deserialize, Serialize};

use crate::genome::hue_distance;
use crate::{Agent, AgentId, Position, Velocity};

/// Tunables for [`resolve`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CombatParams {
    /// Contact reach per unit of defender size.
    pub contact_radius: f32,
    /// Hue distance (degrees) above which two agents are enemies.
    pub enemy_hue_threshold: f32,
    pub damage_scale: f32,
    /// Magnitude of the velocity impulse per attacker in contact.
    pub knockback: f32,
    /// Floor applied to the defender's defense before dividing.
    pub min_defense: f32,
}

/// Accumulated effect of every attacker on one defender for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CombatOutcome {
    pub damage: f32,
    pub knockback: Velocity,
    pub attackers: u32,
}

/// Two hues are hostile when their circular distance exceeds the threshold.
#[must_use]
pub fn is_enemy(a_hue: f32, b_hue: f32, threshold: f32) -> bool {
    hue_distance(a_hue, b_hue) > threshold
}

/// Resolve one defender against every other agent of the previous frame.
///
/// `defender_position` is the defender's freshly integrated position; attacker positions come
/// from the snapshot. Damage per attacker is `attack / max(defense, min_defense) * damage_scale`
/// and every frame of contact deals it again.
#[must_use]
pub fn resolve(
    defender_id: AgentId,
    defender_position: Position,
    defender: &Agent,
    snapshot: &[Agent],
    params: &CombatParams,
) -> CombatOutcome {
    let reach = params.contact_radius * defender.traits.effective_size();
    let defense = defender.stats.defense.max(params.min_defense);
    let mut outcome = CombatOutcome::default();

    for other in snapshot {
        if other.id == defender_id {
            continue;
        }
        if !is_enemy(defender.traits.hue, other.traits.hue, params.enemy_hue_threshold) {
            continue;
        }
        let dx = defender_position.x - other.position.x;
        let dy = defender_position.y - other.position.y;
        let dist = dx.hypot(dy);
        if dist >= reach {
            continue;
        }
        outcome.damage += other.stats.attack.max(0.0) / defense * params.damage_scale;
        let (ux, uy) = if dist > f32::EPSILON {
            (dx / dist, dy / dist)
        } else {
            (1.0, 0.0)
        };
        outcome.knockback.vx += ux * params.knockback;
        outcome.knockback.vy += uy * params.knockback;
        outcome.attackers += 1;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::TraitDescriptor;
    use crate::stats::CombatStats;
    use crate::{Acceleration, Generation};

    const PARAMS: CombatParams = CombatParams {
        contact_radius: 40.0,
        enemy_hue_threshold: 45.0,
        damage_scale: 0.1,
        knockback: 0.2,
        min_defense: 1.0,
    };

    fn agent(id: u64, hue: f32, x: f32, y: f32, stats: CombatStats) -> Agent {
        Agent {
            id: AgentId(id),
            position: Position::new(x, y),
            velocity: Velocity::default(),
            acceleration: Acceleration::default(),
            energy: 100.0,
            health: 100.0,
            traits: TraitDescriptor {
                size: 1.0,
                ..TraitDescriptor::starter(hue)
            },
            stats,
            generation: Generation::default(),
        }
    }

    #[test]
    fn hostility_uses_circular_hue_distance() {
        assert!(is_enemy(0.0, 200.0, 45.0));
        assert!(!is_enemy(350.0, 20.0, 45.0));
        assert!(!is_enemy(0.0, 45.0, 45.0));
        assert!(is_enemy(0.0, 45.5, 45.0));
    }

    #[test]
    fn similar_hues_never_fight() {
        let stats = CombatStats::new(60.0, 30.0, 80.0, 50.0);
        let a = agent(1, 10.0, 100.0, 100.0, stats);
        let b = agent(2, 50.0, 100.0, 100.0, stats);
        let snapshot = vec![a.clone(), b.clone()];
        let outcome = resolve(a.id, a.position, &a, &snapshot, &PARAMS);
        assert_eq!(outcome, CombatOutcome::default());
    }

    #[test]
    fn enemies_in_contact_take_damage_and_are_pushed_apart() {
        let a = agent(1, 0.0, 100.0, 100.0, CombatStats::new(60.0, 20.0, 40.0, 50.0));
        let b = agent(2, 200.0, 120.0, 100.0, CombatStats::new(60.0, 50.0, 30.0, 50.0));
        let snapshot = vec![a.clone(), b.clone()];

        let on_a = resolve(a.id, a.position, &a, &snapshot, &PARAMS);
        assert!((on_a.damage - 30.0 / 20.0 * 0.1).abs() < 1e-6);
        assert!(on_a.knockback.vx < 0.0, "a is pushed away from b");
        assert!((on_a.knockback.vx + 0.2).abs() < 1e-6);
        assert_eq!(on_a.attackers, 1);

        let on_b = resolve(b.id, b.position, &b, &snapshot, &PARAMS);
        assert!((on_b.damage - 40.0 / 50.0 * 0.1).abs() < 1e-6);
        assert!(on_b.knockback.vx > 0.0);
        assert!(on_a.damage > on_b.damage, "weaker defense suffers more");
    }

    #[test]
    fn out_of_reach_enemies_are_ignored() {
        let stats = CombatStats::new(60.0, 30.0, 40.0, 50.0);
        let a = agent(1, 0.0, 100.0, 100.0, stats);
        let b = agent(2, 180.0, 140.0, 100.0, stats);
        let snapshot = vec![a.clone(), b];
        let outcome = resolve(a.id, a.position, &a, &snapshot, &PARAMS);
        assert_eq!(outcome.attackers, 0);
        assert_eq!(outcome.damage, 0.0);
    }

    #[test]
    fn zero_defense_is_floored() {
        let a = agent(1, 0.0, 100.0, 100.0, CombatStats::new(60.0, 0.0, 40.0, 50.0));
        let b = agent(2, 180.0, 100.0, 100.0, CombatStats::new(60.0, 30.0, 40.0, 50.0));
        let snapshot = vec![a.clone(), b];
        let outcome = resolve(a.id, a.position, &a, &snapshot, &PARAMS);
        assert!(outcome.damage.is_finite());
        assert!((outcome.damage - 4.0).abs() < 1e-6);
        assert!((outcome.knockback.vx - 0.2).abs() < 1e-6);
    }
}
