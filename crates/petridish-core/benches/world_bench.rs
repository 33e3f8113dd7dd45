use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use petridish_core::{PetriDishConfig, Position, TraitDescriptor, WorldState};
use std::time::Duration;

fn populated_world(agents: usize) -> WorldState {
    let config = PetriDishConfig {
        rng_seed: Some(0xBEEF),
        max_population: agents.max(1),
        food_spawn_chance: 0.5,
        history_capacity: 1,
        ..PetriDishConfig::default()
    };
    let mut world = WorldState::new(config).expect("world");
    let dish = world.dish();
    let columns = (agents as f32).sqrt().ceil().max(1.0) as usize;
    for i in 0..agents {
        let x = (i % columns) as f32 + 0.5;
        let y = (i / columns) as f32 + 0.5;
        let position = Position::new(
            x / columns as f32 * dish.width,
            y / columns as f32 * dish.height,
        );
        let hue = (i as f32 * 37.0) % 360.0;
        world.spawn_agent(TraitDescriptor::starter(hue), position);
    }
    for i in 0..world.config().max_food {
        let t = i as f32 / world.config().max_food as f32;
        world.spawn_food(Position::new(t * dish.width, (1.0 - t) * dish.height));
    }
    world
}

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    let samples: usize = std::env::var("PD_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30);
    let steps: usize = std::env::var("PD_BENCH_STEPS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64);
    group.sample_size(samples);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(5));

    for agents in [50_usize, 500, 2000] {
        group.bench_function(format!("steps{steps}_agents{agents}"), |b| {
            b.iter_batched(
                || populated_world(agents),
                |mut world| {
                    for _ in 0..steps {
                        world.step();
                    }
                    world
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_steps);
criterion_main!(benches);
