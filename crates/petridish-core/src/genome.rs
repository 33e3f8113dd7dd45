//! Genetic trait descriptors, their valid ranges, and offspring mutation.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Full circle in degrees; hue lives in `[0, FULL_CIRCLE_DEG)`.
pub const FULL_CIRCLE_DEG: f32 = 360.0;

/// Opaque token consumed only by stat derivation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GenomeSeed(pub u64);

impl GenomeSeed {
    /// Draw a fresh token from the supplied random source.
    pub fn random(rng: &mut dyn RngCore) -> Self {
        Self(rng.next_u64())
    }
}

/// Named numeric traits of a [`TraitDescriptor`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TraitKind {
    Hue,
    Size,
    Eccentricity,
    EyeSize,
    EyeDistance,
    MouthCurve,
    MouthWidth,
    TailLength,
    TailWaviness,
}

impl TraitKind {
    /// Every numeric trait, in mutation order.
    pub const ALL: [Self; 9] = [
        Self::Hue,
        Self::Size,
        Self::Eccentricity,
        Self::EyeSize,
        Self::EyeDistance,
        Self::MouthCurve,
        Self::MouthWidth,
        Self::TailLength,
        Self::TailWaviness,
    ];

    /// Inclusive valid range for the trait. Hue is circular and excludes its upper bound.
    #[must_use]
    pub const fn bounds(self) -> TraitBounds {
        match self {
            Self::Hue => TraitBounds::new(0.0, FULL_CIRCLE_DEG),
            Self::Size
            | Self::Eccentricity
            | Self::EyeSize
            | Self::EyeDistance
            | Self::MouthWidth => TraitBounds::new(0.5, 2.0),
            Self::MouthCurve => TraitBounds::new(-50.0, 50.0),
            Self::TailLength => TraitBounds::new(0.5, 3.0),
            Self::TailWaviness => TraitBounds::new(0.0, 5.0),
        }
    }

    /// Whether the trait wraps around instead of clamping.
    #[must_use]
    pub const fn is_circular(self) -> bool {
        matches!(self, Self::Hue)
    }
}

/// Closed numeric range for a trait.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TraitBounds {
    pub min: f32,
    pub max: f32,
}

impl TraitBounds {
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the range; NaN collapses to `min`.
    #[must_use]
    pub fn clamp(self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    #[must_use]
    pub fn contains(self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Wrap an angle in degrees into `[0, 360)`.
#[must_use]
pub fn wrap_hue(hue: f32) -> f32 {
    if !hue.is_finite() {
        return 0.0;
    }
    let wrapped = hue.rem_euclid(FULL_CIRCLE_DEG);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= FULL_CIRCLE_DEG {
        0.0
    } else {
        wrapped
    }
}

/// Shortest angular distance between two hues, in `[0, 180]`.
#[must_use]
pub fn hue_distance(a: f32, b: f32) -> f32 {
    let diff = (wrap_hue(a) - wrap_hue(b)).abs();
    diff.min(FULL_CIRCLE_DEG - diff)
}

/// Immutable genetic record describing an agent's body plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TraitDescriptor {
    pub hue: f32,
    pub size: f32,
    pub eccentricity: f32,
    pub eye_size: f32,
    pub eye_distance: f32,
    pub mouth_curve: f32,
    pub mouth_width: f32,
    pub tail_length: f32,
    pub tail_waviness: f32,
    pub seed: GenomeSeed,
}

impl Default for TraitDescriptor {
    fn default() -> Self {
        Self::starter(0.0)
    }
}

impl TraitDescriptor {
    /// Body plan of the single agent a fresh dish is seeded with.
    #[must_use]
    pub fn starter(hue: f32) -> Self {
        Self {
            hue: wrap_hue(hue),
            size: 0.8,
            eccentricity: 1.2,
            eye_size: 1.0,
            eye_distance: 1.0,
            mouth_curve: 0.0,
            mouth_width: 1.0,
            tail_length: 1.0,
            tail_waviness: 0.5,
            seed: GenomeSeed::default(),
        }
    }

    #[must_use]
    pub const fn get(&self, kind: TraitKind) -> f32 {
        match kind {
            TraitKind::Hue => self.hue,
            TraitKind::Size => self.size,
            TraitKind::Eccentricity => self.eccentricity,
            TraitKind::EyeSize => self.eye_size,
            TraitKind::EyeDistance => self.eye_distance,
            TraitKind::MouthCurve => self.mouth_curve,
            TraitKind::MouthWidth => self.mouth_width,
            TraitKind::TailLength => self.tail_length,
            TraitKind::TailWaviness => self.tail_waviness,
        }
    }

    fn set(&mut self, kind: TraitKind, value: f32) {
        let slot = match kind {
            TraitKind::Hue => &mut self.hue,
            TraitKind::Size => &mut self.size,
            TraitKind::Eccentricity => &mut self.eccentricity,
            TraitKind::EyeSize => &mut self.eye_size,
            TraitKind::EyeDistance => &mut self.eye_distance,
            TraitKind::MouthCurve => &mut self.mouth_curve,
            TraitKind::MouthWidth => &mut self.mouth_width,
            TraitKind::TailLength => &mut self.tail_length,
            TraitKind::TailWaviness => &mut self.tail_waviness,
        };
        *slot = value;
    }

    /// Copy with every trait forced into its valid range.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let mut out = *self;
        for kind in TraitKind::ALL {
            let value = self.get(kind);
            let fixed = if kind.is_circular() {
                wrap_hue(value)
            } else {
                kind.bounds().clamp(value)
            };
            out.set(kind, fixed);
        }
        out
    }

    /// Size clamped into range, as used by metabolism and contact radii.
    #[must_use]
    pub fn effective_size(&self) -> f32 {
        TraitKind::Size.bounds().clamp(self.size)
    }

    /// Whether every trait already lies within its valid range.
    #[must_use]
    pub fn is_within_bounds(&self) -> bool {
        TraitKind::ALL.iter().all(|&kind| {
            let value = self.get(kind);
            if kind.is_circular() {
                (0.0..FULL_CIRCLE_DEG).contains(&value)
            } else {
                kind.bounds().contains(value)
            }
        })
    }
}

/// Parameters controlling offspring mutation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MutationParams {
    /// Per-trait probability of perturbation.
    pub rate: f32,
    /// Half-width of the uniform hue perturbation, in degrees.
    pub hue_range: f32,
    /// Half-width of the uniform perturbation applied to every other trait.
    pub trait_range: f32,
}

impl Default for MutationParams {
    fn default() -> Self {
        Self {
            rate: 0.2,
            hue_range: 60.0,
            trait_range: 0.25,
        }
    }
}

/// Uniform draw in `[-half_width, half_width]`; zero for a non-positive width.
pub(crate) fn symmetric_noise(rng: &mut dyn RngCore, half_width: f32) -> f32 {
    if half_width <= 0.0 {
        return 0.0;
    }
    rng.random_range(-half_width..=half_width)
}

/// Produce a child descriptor from `parent`.
///
/// The child always receives a new seed token. Each trait is perturbed with probability
/// `params.rate`; untouched traits are copied bit-for-bit.
pub fn mutate(
    parent: &TraitDescriptor,
    params: &MutationParams,
    rng: &mut dyn RngCore,
) -> TraitDescriptor {
    let mut child = *parent;
    child.seed = GenomeSeed::random(rng);
    for kind in TraitKind::ALL {
        if rng.random::<f32>() >= params.rate {
            continue;
        }
        let value = parent.get(kind);
        let mutated = if kind.is_circular() {
            wrap_hue(value + symmetric_noise(rng, params.hue_range))
        } else {
            kind.bounds()
                .clamp(value + symmetric_noise(rng, params.trait_range))
        };
        child.set(kind, mutated);
    }
    child
}
