//! Combat stats and the trait-to-stat derivation seam.

use serde::{Deserialize, Serialize};

use crate::genome::TraitDescriptor;

/// Derived combat numbers, cached on an agent at creation time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CombatStats {
    pub speed: f32,
    pub defense: f32,
    pub attack: f32,
    pub reaction: f32,
}

impl CombatStats {
    #[must_use]
    pub const fn new(speed: f32, defense: f32, attack: f32, reaction: f32) -> Self {
        Self {
            speed,
            defense,
            attack,
            reaction,
        }
    }
}

/// Pure, deterministic mapping from a trait descriptor to combat stats.
///
/// Called exactly once per agent, when the agent is created.
pub trait StatDeriver: Send + Sync {
    fn derive(&self, traits: &TraitDescriptor) -> CombatStats;
}

impl<F> StatDeriver for F
where
    F: Fn(&TraitDescriptor) -> CombatStats + Send + Sync,
{
    fn derive(&self, traits: &TraitDescriptor) -> CombatStats {
        self(traits)
    }
}

/// Stat formula keyed on body plan plus a per-genome pseudo-random jitter.
///
/// The jitter is derived by hashing the seed token together with every trait value, so two
/// genomes that differ only in their seed still get slightly different stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeededStatDeriver;

impl SeededStatDeriver {
    fn composite_hash(traits: &TraitDescriptor) -> i32 {
        let key = format!(
            "{}-{}-{}-{}-{}-{}-{}-{}-{}-{}",
            traits.seed.0,
            traits.hue,
            traits.size,
            traits.eccentricity,
            traits.eye_size,
            traits.eye_distance,
            traits.mouth_curve,
            traits.mouth_width,
            traits.tail_length,
            traits.tail_waviness,
        );
        key.bytes().fold(0_i32, |hash, byte| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(byte))
        })
    }

    fn jitter(traits: &TraitDescriptor) -> [f32; 4] {
        let base = f64::from(Self::composite_hash(traits));
        let mut out = [0.0_f32; 4];
        for (offset, slot) in out.iter_mut().enumerate() {
            let x = (base + offset as f64).sin() * 10_000.0;
            *slot = (x - x.floor()) as f32;
        }
        out
    }
}

impl StatDeriver for SeededStatDeriver {
    fn derive(&self, traits: &TraitDescriptor) -> CombatStats {
        let traits = traits.clamped();
        let [r0, r1, r2, r3] = Self::jitter(&traits);
        let anger = 50.0 - traits.mouth_curve;

        let speed = 50.0
            + (2.0 - traits.size) * 20.0
            + (traits.eccentricity - 0.5) * 10.0
            + traits.tail_length * 5.0
            + traits.tail_waviness * 2.0
            + r0 * 20.0;
        let defense = 20.0 + traits.size * 20.0 + traits.eccentricity * 10.0 + r1 * 15.0;
        let attack = 30.0 + anger * 0.4 + r2 * 25.0;
        let reaction = 50.0 - anger * 0.3 + r3 * 15.0;

        CombatStats {
            speed: speed.round().max(0.0),
            defense: defense.round().max(0.0),
            attack: attack.round().max(0.0),
            reaction: reaction.round().max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeSeed;

    #[test]
    fn derivation_is_deterministic() {
        let traits = TraitDescriptor::starter(42.0);
        let a = SeededStatDeriver.derive(&traits);
        let b = SeededStatDeriver.derive(&traits);
        assert_eq!(a, b);
    }

    #[test]
    fn stats_are_rounded_and_within_formula_envelope() {
        let traits = TraitDescriptor::starter(10.0);
        let stats = SeededStatDeriver.derive(&traits);
        for value in [stats.speed, stats.defense, stats.attack, stats.reaction] {
            assert_eq!(value, value.round());
            assert!(value >= 0.0);
        }
        // size 0.8, eccentricity 1.2, tail 1.0 / 0.5, mouth 0
        assert!((87.0..=107.0).contains(&stats.speed), "speed {}", stats.speed);
        assert!((48.0..=63.0).contains(&stats.defense), "defense {}", stats.defense);
        assert!((50.0..=75.0).contains(&stats.attack), "attack {}", stats.attack);
        assert!((35.0..=50.0).contains(&stats.reaction), "reaction {}", stats.reaction);
    }

    #[test]
    fn angrier_mouths_hit_harder_and_react_slower() {
        let calm = TraitDescriptor {
            mouth_curve: 50.0,
            seed: GenomeSeed(1),
            ..TraitDescriptor::starter(0.0)
        };
        let angry = TraitDescriptor {
            mouth_curve: -50.0,
            ..calm
        };
        let calm_stats = SeededStatDeriver.derive(&calm);
        let angry_stats = SeededStatDeriver.derive(&angry);
        // 40 points of attack swing dominates the 25 point jitter.
        assert!(angry_stats.attack > calm_stats.attack);
        // 30 points of reaction swing dominates the 15 point jitter.
        assert!(angry_stats.reaction < calm_stats.reaction);
    }

    #[test]
    fn out_of_range_traits_are_clamped_before_use() {
        let wild = TraitDescriptor {
            size: 50.0,
            ..TraitDescriptor::starter(0.0)
        };
        let clamped = wild.clamped();
        assert_eq!(
            SeededStatDeriver.derive(&wild),
            SeededStatDeriver.derive(&clamped)
        );
    }

    #[test]
    fn closures_act_as_derivers() {
        let fixed = |_: &TraitDescriptor| CombatStats::new(60.0, 30.0, 40.0, 50.0);
        let stats = fixed.derive(&TraitDescriptor::default());
        assert_eq!(stats.defense, 30.0);
    }
}
