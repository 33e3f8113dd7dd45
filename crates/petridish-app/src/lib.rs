//! Headless shell around the petri-dish engine: settings, frame loop, and JSON run report.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use petridish_core::{FrameSnapshot, PetriDishConfig, SimulationDriver, TickSummary, WorldState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "PETRIDISH_CONFIG";
pub const FRAMES_ENV: &str = "PETRIDISH_HEADLESS_FRAMES";
pub const REPORT_ENV: &str = "PETRIDISH_REPORT";

pub const DEFAULT_HEADLESS_FRAMES: usize = 600;
pub const MAX_HEADLESS_FRAMES: usize = 100_000;

/// Nominal spacing of synthetic frame callbacks (60 Hz).
const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Everything the binary needs to run one headless session.
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub config: PetriDishConfig,
    pub frames: usize,
    pub report_path: Option<PathBuf>,
}

impl AppSettings {
    /// Read settings from `PETRIDISH_CONFIG`, `PETRIDISH_HEADLESS_FRAMES` and `PETRIDISH_REPORT`.
    pub fn from_env() -> Result<Self> {
        let config = match non_empty_env_path(CONFIG_ENV) {
            Some(path) => load_config(&path)?,
            None => PetriDishConfig::default(),
        };
        Ok(Self {
            config,
            frames: frame_budget(std::env::var(FRAMES_ENV).ok().as_deref()),
            report_path: non_empty_env_path(REPORT_ENV),
        })
    }
}

/// Parse a JSON configuration file; missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<PetriDishConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: PetriDishConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// Frame budget from a raw env value: positive integers are capped, anything else is the default.
#[must_use]
pub fn frame_budget(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .map(|value| value.min(MAX_HEADLESS_FRAMES))
        .unwrap_or(DEFAULT_HEADLESS_FRAMES)
}

fn non_empty_env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).and_then(|raw| {
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    })
}

/// Build a world seeded with a single starter agent and drive it for `settings.frames`
/// callbacks. Writes the report when `report_path` is set.
pub fn run_headless(settings: &AppSettings) -> Result<HeadlessReport> {
    let mut world =
        WorldState::new(settings.config.clone()).context("failed to build world state")?;
    let seed_agent = world.spawn_initial_agent();
    debug!(agent = seed_agent.0, "seeded initial agent");

    let mut driver = SimulationDriver::new(world);
    let mut report = HeadlessReport::new(&driver.snapshot());
    let start = Instant::now();
    for frame in 0..settings.frames {
        let now = start + FRAME_INTERVAL * u32::try_from(frame).unwrap_or(u32::MAX);
        if driver.on_frame(now).is_none() {
            continue;
        }
        if let Some(summary) = driver.world().last_summary() {
            report.record(summary);
        }
    }
    report.finalize();

    info!(
        frames = report.summary.frame_count,
        final_tick = report.summary.final_tick,
        initial_agents = report.initial.agent_count,
        final_agents = report.summary.final_agent_count,
        final_food = report.summary.final_food_count,
        total_births = report.summary.total_births,
        total_deaths = report.summary.total_deaths,
        avg_energy_mean = report.summary.avg_energy_mean,
        "headless run complete"
    );

    if let Some(path) = &settings.report_path {
        report
            .write_json(path)
            .with_context(|| format!("failed to write headless report to {}", path.display()))?;
        info!(path = %path.display(), "headless report written");
    }
    Ok(report)
}

/// Per-frame statistics plus an aggregate summary of a headless run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessReport {
    pub initial: FrameStats,
    pub frames: Vec<FrameStats>,
    pub summary: ReportSummary,
}

impl HeadlessReport {
    fn new(initial: &FrameSnapshot) -> Self {
        Self {
            initial: FrameStats::from_snapshot(initial),
            frames: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    fn record(&mut self, summary: &TickSummary) {
        self.frames.push(FrameStats::from(summary));
    }

    fn finalize(&mut self) {
        self.summary = ReportSummary::from_frames(&self.initial, &self.frames);
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameStats {
    pub tick: u64,
    pub agent_count: usize,
    pub food_count: usize,
    pub births: usize,
    pub deaths: usize,
    pub avg_energy: f32,
}

impl FrameStats {
    fn from_snapshot(snapshot: &FrameSnapshot) -> Self {
        let agent_count = snapshot.agents.len();
        let avg_energy = if agent_count == 0 {
            0.0
        } else {
            snapshot.agents.iter().map(|agent| agent.energy).sum::<f32>() / agent_count as f32
        };
        Self {
            tick: snapshot.tick.0,
            agent_count,
            food_count: snapshot.food.len(),
            births: 0,
            deaths: 0,
            avg_energy,
        }
    }
}

impl From<&TickSummary> for FrameStats {
    fn from(summary: &TickSummary) -> Self {
        Self {
            tick: summary.tick.0,
            agent_count: summary.agent_count,
            food_count: summary.food_count,
            births: summary.births,
            deaths: summary.deaths,
            avg_energy: summary.average_energy,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub frame_count: usize,
    pub ticks_simulated: u64,
    pub final_tick: u64,
    pub final_agent_count: usize,
    pub final_food_count: usize,
    pub total_births: usize,
    pub total_deaths: usize,
    pub avg_energy_mean: f32,
    pub avg_energy_min: f32,
    pub avg_energy_max: f32,
}

impl ReportSummary {
    fn from_frames(initial: &FrameStats, frames: &[FrameStats]) -> Self {
        let Some(final_stats) = frames.last() else {
            return Self {
                final_tick: initial.tick,
                final_agent_count: initial.agent_count,
                final_food_count: initial.food_count,
                avg_energy_mean: initial.avg_energy,
                avg_energy_min: initial.avg_energy,
                avg_energy_max: initial.avg_energy,
                ..Self::default()
            };
        };

        let mut min_energy = f32::INFINITY;
        let mut max_energy = f32::NEG_INFINITY;
        let mut energy_sum = 0.0_f32;
        for frame in frames {
            min_energy = min_energy.min(frame.avg_energy);
            max_energy = max_energy.max(frame.avg_energy);
            energy_sum += frame.avg_energy;
        }

        Self {
            frame_count: frames.len(),
            ticks_simulated: final_stats.tick.saturating_sub(initial.tick),
            final_tick: final_stats.tick,
            final_agent_count: final_stats.agent_count,
            final_food_count: final_stats.food_count,
            total_births: frames.iter().map(|frame| frame.births).sum(),
            total_deaths: frames.iter().map(|frame| frame.deaths).sum(),
            avg_energy_mean: energy_sum / frames.len() as f32,
            avg_energy_min: min_energy,
            avg_energy_max: max_energy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_budget_parses_and_caps() {
        assert_eq!(frame_budget(None), DEFAULT_HEADLESS_FRAMES);
        assert_eq!(frame_budget(Some(" 42 ")), 42);
        assert_eq!(frame_budget(Some("0")), DEFAULT_HEADLESS_FRAMES);
        assert_eq!(frame_budget(Some("lots")), DEFAULT_HEADLESS_FRAMES);
        assert_eq!(frame_budget(Some("999999999")), MAX_HEADLESS_FRAMES);
    }

    #[test]
    fn empty_run_summarises_initial_frame() {
        let initial = FrameStats {
            tick: 0,
            agent_count: 1,
            food_count: 0,
            births: 0,
            deaths: 0,
            avg_energy: 100.0,
        };
        let summary = ReportSummary::from_frames(&initial, &[]);
        assert_eq!(summary.frame_count, 0);
        assert_eq!(summary.final_agent_count, 1);
        assert_eq!(summary.avg_energy_min, 100.0);
        assert_eq!(summary.avg_energy_max, 100.0);
    }

    #[test]
    fn summary_aggregates_frames() {
        let frame = |tick: u64, births: usize, avg_energy: f32| FrameStats {
            tick,
            agent_count: 2,
            food_count: 3,
            births,
            deaths: 0,
            avg_energy,
        };
        let initial = frame(0, 0, 100.0);
        let frames = [frame(1, 1, 90.0), frame(2, 0, 110.0), frame(3, 2, 100.0)];
        let summary = ReportSummary::from_frames(&initial, &frames);
        assert_eq!(summary.frame_count, 3);
        assert_eq!(summary.ticks_simulated, 3);
        assert_eq!(summary.total_births, 3);
        assert_eq!(summary.avg_energy_min, 90.0);
        assert_eq!(summary.avg_energy_max, 110.0);
        assert!((summary.avg_energy_mean - 100.0).abs() < 1e-4);
    }
}
