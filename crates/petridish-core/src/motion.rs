//! Steering toward sensed food and damped point-mass integration inside the dish.

use petridish_index::NeighborhoodIndex;
use serde::{Deserialize, Serialize};

use crate::{Acceleration, Dish, Food, Position, Velocity};

/// Tunables for [`steer`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SteeringParams {
    /// Maximum distance at which food is sensed.
    pub detection_range: f32,
    /// Pull strength toward food for an agent whose reaction equals `reaction_reference`.
    pub force: f32,
    pub reaction_reference: f32,
    /// Damping applied to the summed acceleration every frame.
    pub damping: f32,
}

/// Tunables for [`integrate`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PhysicsParams {
    pub friction: f32,
    /// Speed stat is divided by this to obtain the per-frame speed cap.
    pub speed_divisor: f32,
    /// Fraction of velocity kept (and reversed) when hitting a wall.
    pub restitution: f32,
}

/// Position, velocity and acceleration of one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kinematics {
    pub position: Position,
    pub velocity: Velocity,
    pub acceleration: Acceleration,
}

/// Position of the closest food strictly inside the detection range, if any.
pub fn sense_food<I: NeighborhoodIndex + ?Sized>(
    index: &I,
    food: &[Food],
    origin: Position,
    detection_range: f32,
) -> Option<Position> {
    let (idx, _) = index.nearest_within((origin.x, origin.y), detection_range)?;
    food.get(idx).map(|item| item.position)
}

/// Compute the next acceleration.
///
/// With a target, the desired impulse is the unit vector toward it scaled by
/// `force * reaction / reaction_reference`; without one, `roam` is used as-is. The sum of the
/// previous acceleration and the desired impulse is damped, so acceleration decays toward zero
/// whenever input stops.
#[must_use]
pub fn steer(
    previous: Acceleration,
    position: Position,
    reaction: f32,
    target: Option<Position>,
    roam: Acceleration,
    params: &SteeringParams,
) -> Acceleration {
    let desired = match target {
        Some(target) => {
            let dx = target.x - position.x;
            let dy = target.y - position.y;
            let dist = dx.hypot(dy);
            if dist > f32::EPSILON {
                let force = params.force * (reaction.max(0.0) / params.reaction_reference);
                Acceleration::new(dx / dist * force, dy / dist * force)
            } else {
                // Target under the agent has no direction and is already within eating reach.
                Acceleration::default()
            }
        }
        None => roam,
    };
    Acceleration::new(
        (previous.ax + desired.ax) * params.damping,
        (previous.ay + desired.ay) * params.damping,
    )
}

/// Advance one frame: accelerate, apply friction, cap speed, move, bounce and clamp.
///
/// Wall reflection is decided from the tentative (unclamped) position; only afterwards is the
/// position clamped into the dish.
#[must_use]
pub fn integrate(
    state: Kinematics,
    speed_stat: f32,
    dish: Dish,
    params: &PhysicsParams,
) -> Kinematics {
    let Kinematics {
        position,
        mut velocity,
        mut acceleration,
    } = state;

    velocity.vx = (velocity.vx + acceleration.ax) * params.friction;
    velocity.vy = (velocity.vy + acceleration.ay) * params.friction;

    let speed = velocity.magnitude();
    let max_speed = speed_stat.max(0.0) / params.speed_divisor;
    if speed > max_speed && speed > 0.0 {
        let scale = max_speed / speed;
        velocity.vx *= scale;
        velocity.vy *= scale;
    }

    let tentative = Position::new(position.x + velocity.vx, position.y + velocity.vy);
    if tentative.x < 0.0 || tentative.x > dish.width {
        velocity.vx *= -params.restitution;
        acceleration.ax = -acceleration.ax;
    }
    if tentative.y < 0.0 || tentative.y > dish.height {
        velocity.vy *= -params.restitution;
        acceleration.ay = -acceleration.ay;
    }

    Kinematics {
        position: dish.clamp(tentative),
        velocity,
        acceleration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FoodId;
    use petridish_index::UniformGridIndex;

    const STEERING: SteeringParams = SteeringParams {
        detection_range: 150.0,
        force: 0.2,
        reaction_reference: 50.0,
        damping: 0.85,
    };

    const PHYSICS: PhysicsParams = PhysicsParams {
        friction: 0.99,
        speed_divisor: 30.0,
        restitution: 0.5,
    };

    const DISH: Dish = Dish {
        width: 800.0,
        height: 600.0,
    };

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn food_directly_underneath_adds_no_pull() {
        let previous = Acceleration::new(0.4, -0.2);
        let here = Position::new(120.0, 80.0);
        let accel = steer(
            previous,
            here,
            100.0,
            Some(here),
            Acceleration::new(5.0, 5.0),
            &STEERING,
        );
        assert!(approx(accel.ax, 0.4 * 0.85));
        assert!(approx(accel.ay, -0.2 * 0.85));
    }

    #[test]
    fn steering_pulls_toward_target_scaled_by_reaction() {
        let accel = steer(
            Acceleration::default(),
            Position::new(0.0, 0.0),
            100.0,
            Some(Position::new(30.0, 40.0)),
            Acceleration::new(5.0, 5.0),
            &STEERING,
        );
        // force = 0.2 * 2 = 0.4 along (0.6, 0.8), then damped
        assert!(approx(accel.ax, 0.6 * 0.4 * 0.85));
        assert!(approx(accel.ay, 0.8 * 0.4 * 0.85));
    }

    #[test]
    fn steering_roams_without_target_and_decays() {
        let roam = Acceleration::new(0.05, -0.07);
        let accel = steer(
            Acceleration::new(1.0, 1.0),
            Position::new(10.0, 10.0),
            50.0,
            None,
            roam,
            &STEERING,
        );
        assert!(approx(accel.ax, (1.0 + 0.05) * 0.85));
        assert!(approx(accel.ay, (1.0 - 0.07) * 0.85));

        let mut decaying = Acceleration::new(1.0, 0.0);
        for _ in 0..200 {
            decaying = steer(
                decaying,
                Position::default(),
                50.0,
                None,
                Acceleration::default(),
                &STEERING,
            );
        }
        assert!(decaying.ax.abs() < 1e-6);
    }

    #[test]
    fn sense_food_respects_detection_range() {
        let food = vec![
            Food::new(FoodId(1), Position::new(400.0, 300.0), 40.0),
            Food::new(FoodId(2), Position::new(100.0, 100.0), 40.0),
        ];
        let mut index = UniformGridIndex::new(50.0);
        let positions: Vec<(f32, f32)> = food
            .iter()
            .map(|item| (item.position.x, item.position.y))
            .collect();
        index.rebuild(&positions).expect("rebuild");

        let near = sense_food(&index, &food, Position::new(150.0, 100.0), 150.0);
        assert_eq!(near, Some(Position::new(100.0, 100.0)));
        let none = sense_food(&index, &food, Position::new(700.0, 550.0), 150.0);
        assert_eq!(none, None);
    }

    #[test]
    fn speed_is_capped_by_stat() {
        let state = Kinematics {
            position: Position::new(400.0, 300.0),
            velocity: Velocity::new(10.0, 0.0),
            acceleration: Acceleration::default(),
        };
        let next = integrate(state, 60.0, DISH, &PHYSICS);
        assert!(approx(next.velocity.magnitude(), 2.0));
        assert!(approx(next.position.x, 402.0));
    }

    #[test]
    fn zero_velocity_is_left_alone() {
        let state = Kinematics {
            position: Position::new(10.0, 10.0),
            ..Kinematics::default()
        };
        let next = integrate(state, 0.0, DISH, &PHYSICS);
        assert_eq!(next.velocity, Velocity::default());
        assert_eq!(next.position, Position::new(10.0, 10.0));
        assert!(next.velocity.vx.is_finite());
    }

    #[test]
    fn wall_hit_reflects_from_tentative_position_then_clamps() {
        let state = Kinematics {
            position: Position::new(799.0, 300.0),
            velocity: Velocity::new(2.0, 0.0),
            acceleration: Acceleration::new(0.1, 0.0),
        };
        let next = integrate(state, 300.0, DISH, &PHYSICS);
        let expected_vx = (2.0 + 0.1) * 0.99;
        assert!(approx(next.velocity.vx, -expected_vx * 0.5));
        assert!(approx(next.acceleration.ax, -0.1));
        assert_eq!(next.position.x, 800.0);
        assert!(approx(next.position.y, 300.0));
    }

    #[test]
    fn floor_and_ceiling_bounce_vertically() {
        let state = Kinematics {
            position: Position::new(100.0, 0.5),
            velocity: Velocity::new(0.0, -1.0),
            acceleration: Acceleration::new(0.0, -0.2),
        };
        let next = integrate(state, 300.0, DISH, &PHYSICS);
        assert!(next.velocity.vy > 0.0);
        assert!(next.acceleration.ay > 0.0);
        assert_eq!(next.position.y, 0.0);
        assert!(approx(next.velocity.vx, 0.0));
    }
}
