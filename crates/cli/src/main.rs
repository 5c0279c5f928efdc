//! vidseq CLI - image sequence to video progress simulation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vidseq_core::{CombinedEta, StepDefinition, TrackerState};
use vidseq_progress::{
    format_duration, Clock, ManualClock, ProgressObserver, ProgressUpdate, StatisticsSnapshot,
    StepRegistry, StepUpdate, Tracker, TrackerConfig,
};

#[derive(Parser)]
#[command(name = "vidseq")]
#[command(about = "Progress and ETA tracking for image sequence to video pipelines", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate converting an image sequence to video
    Simulate {
        /// Number of images in the sequence
        #[arg(long, default_value = "120")]
        images: u64,
        /// Simulated milliseconds per image
        #[arg(long, default_value = "40")]
        item_ms: u64,
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the final report to this file (JSON)
        #[arg(long)]
        report: Option<PathBuf>,
        /// Fail the run when this step starts
        #[arg(long)]
        fail_at: Option<String>,
    },
    /// Show the pipeline steps
    Steps {
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Pipeline configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PipelineConfig {
    tracker: TrackerConfig,
    steps: Vec<StepDefinition>,
    /// Rescale step weights instead of rejecting sums other than 1.0
    normalize: bool,
}

impl PipelineConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    fn registry(&self) -> Result<StepRegistry> {
        let steps = self.steps.clone();
        let registry = if self.normalize {
            StepRegistry::normalized(steps)?
        } else {
            StepRegistry::new(steps)?
        };
        if registry.is_empty() {
            return Ok(StepRegistry::default_pipeline());
        }
        Ok(registry)
    }
}

/// Prints a progress line each time overall progress crosses a 10% mark
/// or a new step starts.
#[derive(Default)]
struct ConsoleObserver {
    progress: Option<ProgressUpdate>,
    step: Option<String>,
    last_bucket: Option<i64>,
    announce: bool,
}

impl ProgressObserver for ConsoleObserver {
    fn on_progress_update(&mut self, update: &ProgressUpdate) {
        let bucket = (update.overall_progress / 10.0).floor() as i64;
        if self.last_bucket != Some(bucket) {
            self.last_bucket = Some(bucket);
            self.announce = true;
        }
        self.progress = Some(update.clone());
    }

    fn on_step_update(&mut self, update: &StepUpdate) {
        if update.step_name != self.step {
            if let Some(name) = &update.step_name {
                println!("==> {} ({}/{})", name, update.completed_steps + 1, update.total_steps);
            }
            self.step = update.step_name.clone();
        }
    }

    fn on_eta_update(&mut self, eta: &CombinedEta) {
        if !self.announce {
            return;
        }
        self.announce = false;
        if let Some(progress) = &self.progress {
            let methods: Vec<_> = eta.contributing_methods.iter().map(|m| m.as_str()).collect();
            println!(
                "[{:>5.1}%] step {:>5.1}% | ETA {} ({} confidence; {})",
                progress.overall_progress,
                progress.step_progress,
                eta.formatted,
                eta.confidence,
                if methods.is_empty() { "no data".to_string() } else { methods.join(", ") },
            );
        }
    }
}

fn items_for(def: &StepDefinition, images: u64) -> u64 {
    match def.id.as_str() {
        "encoder_init" | "finalization" => 1,
        _ => images,
    }
}

fn simulate(
    images: u64,
    item_ms: u64,
    config: PipelineConfig,
    report: Option<PathBuf>,
    fail_at: Option<String>,
) -> Result<()> {
    let registry = config.registry()?;
    let clock = ManualClock::new();
    let mut tracker = Tracker::with_clock(clock.clone()).with_config(config.tracker);
    tracker.subscribe(ConsoleObserver::default());

    let steps: Vec<StepDefinition> = registry.definitions().to_vec();
    tracker.start_tracking(steps.len(), images, Some(registry));
    tracker.set_operation_name(format!("Encode {} images", images));
    tracker.record_metric("images", images);
    tracker.record_metric("item_ms", item_ms);

    let mut failed = false;
    for def in &steps {
        if fail_at.as_deref() == Some(def.id.as_str()) {
            tracker.fail_tracking(&format!("simulated failure at {}", def.id));
            failed = true;
            break;
        }

        let items = items_for(def, images);
        let per_item = ((def.weight * 5.0) * item_ms as f64).round().max(1.0) as u64;
        tracker.start_step(def.id.clone(), None, items);
        for n in 1..=items {
            clock.advance_ms(per_item);
            let label = format!("image_{:04}", n);
            tracker.update_step_progress(Some(n), Some(&label), None);
        }
        tracker.complete_step();
    }

    let snapshot = if failed {
        tracker.statistics()
    } else {
        let elapsed_ms = u64::try_from(clock.now().as_millis()).unwrap_or(u64::MAX);
        tracker.record_metric("simulated_ms", elapsed_ms);
        tracker.complete_tracking()
    };
    print_summary(&snapshot);

    if let Some(path) = report {
        let json = tracker.report().to_json_pretty()?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}

fn print_summary(snapshot: &StatisticsSnapshot) {
    let status = match snapshot.state {
        TrackerState::Completed => "completed",
        TrackerState::Failed => "failed",
        _ => "incomplete",
    };
    println!();
    println!("Run {}", status);
    println!("  Steps: {}/{}", snapshot.completed_steps, snapshot.total_steps);
    println!("  Items: {}/{}", snapshot.processed_items, snapshot.total_items);
    println!("  Progress: {:.1}%", snapshot.overall_progress);
    println!("  Elapsed: {}", format_duration(snapshot.elapsed));
    if let Some(rate) = snapshot.session_throughput {
        println!("  Throughput: {:.2} items/s", rate);
    }
    if let Some(average) = snapshot.average_step_duration {
        println!("  Average step: {}", format_duration(average));
    }
    for step in &snapshot.step_history {
        println!(
            "    {:<14} {:>10} {:>6} items",
            step.id.as_str(),
            step.duration.map(format_duration).unwrap_or_else(|| "-".to_string()),
            step.processed_items,
        );
    }
    if snapshot.error_count > 0 || snapshot.warning_count > 0 {
        println!("  Errors: {}  Warnings: {}", snapshot.error_count, snapshot.warning_count);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Simulate { images, item_ms, config, report, fail_at } => {
            let config = PipelineConfig::load(config.as_deref())?;
            simulate(images, item_ms, config, report, fail_at)?;
        }
        Commands::Steps { config } => {
            let config = PipelineConfig::load(config.as_deref())?;
            let registry = config.registry()?;
            println!("Steps ({})", registry.len());
            for def in registry.iter() {
                println!(
                    "  {:<14} | {:>5.1}% | ~{} - {}",
                    def.id.as_str(),
                    def.weight * 100.0,
                    format_duration(def.estimated_duration),
                    def.name,
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_default_pipeline() {
        let registry = PipelineConfig::default().registry().unwrap();
        assert_eq!(registry, StepRegistry::default_pipeline());
    }

    #[test]
    fn test_config_normalizes_weights() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "normalize": true,
                "tracker": {"history_window": 5},
                "steps": [
                    {"id": "load", "name": "Load", "weight": 1.0},
                    {"id": "encode", "name": "Encode", "weight": 3.0, "estimated_secs": 12.5}
                ]
            }"#,
        )
        .unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.get(&"encode".into()).map(|d| d.weight), Some(0.75));
        assert_eq!(
            registry.get(&"encode".into()).map(|d| d.estimated_duration),
            Some(std::time::Duration::from_millis(12_500))
        );
        assert_eq!(config.tracker.history_window, 5);
    }

    #[test]
    fn test_config_rejects_unnormalized_weights() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"steps": [{"id": "load", "name": "Load", "weight": 2.0}]}"#,
        )
        .unwrap();
        assert!(config.registry().is_err());
    }

    #[test]
    fn test_single_item_steps() {
        let registry = StepRegistry::default_pipeline();
        let items: Vec<u64> = registry.iter().map(|def| items_for(def, 30)).collect();
        assert_eq!(items, vec![30, 30, 1, 30, 1]);
    }
}
