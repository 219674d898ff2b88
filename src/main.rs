use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, trace, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use diffusion_common::EnvironmentConfig;
use diffusion_engine::emitter::EmitterGroup;
use diffusion_engine::recorder::{self, FieldRecorder, OutputFormat, SnapshotRecorder};
use diffusion_engine::Environment;

/// Command-line arguments for the diffusion engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Recorded run (.json, .bin or .msgpack) to continue from instead of the initial concentrations
    #[arg(long)]
    resume: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting Diffusion Engine (CPU Parallel)...");

    // --- Load Configuration ---
    let config = EnvironmentConfig::load(&args.config)?;
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Environment ---
    let mut env = match &args.resume {
        Some(path) => resume_from(path, &config)?,
        None => Environment::from_config(&config)?,
    };

    let stable_dt = env.stable_timestep();
    let dt = match config.timing.dt {
        Some(dt) => dt,
        None if stable_dt.is_finite() => stable_dt,
        None => anyhow::bail!("No dt configured and no diffusing ligand to derive a stable time step from."),
    };
    if dt > stable_dt {
        warn!(
            "Time step {:.6} exceeds the stable time step {:.6}; the field will diverge.",
            dt, stable_dt
        );
    }
    debug!("Environment: {:#?}", env.geometry());

    let mut emitters = config
        .emitters
        .iter()
        .map(|emitter| EmitterGroup::new(emitter, &env))
        .collect::<Result<Vec<_>>>()?;
    info!("{} emitter group(s) registered.", emitters.len());

    // --- Simulation Loop ---
    let total_steps = (config.timing.total_time / dt).ceil() as u64;
    let mut record_interval_steps = (config.timing.record_interval.max(0.0) / dt).round() as u64;
    if record_interval_steps == 0 {
        warn!(
            "Record interval ({:.4}) is smaller than the time step ({:.4}). Recording every step.",
            config.timing.record_interval, dt
        );
        record_interval_steps = 1;
    }
    info!(
        "Recording fields every {} steps ({:.4} time units).",
        record_interval_steps,
        record_interval_steps as f64 * dt
    );

    let mut recorder = SnapshotRecorder::new();
    recorder.record_metadata(&env.metadata(dt))?;
    info!("Recording initial fields (t={:.4})...", env.time());
    if let Err(e) = recorder.record_fields(&env) {
        error!("Error recording initial fields: {}", e);
        anyhow::bail!("Failed to record initial fields.");
    }

    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        for group in &mut emitters {
            if let Err(e) = group.emit(&mut env, dt) {
                error!("Emitter for ligand {} failed at step {}: {}", group.ligand_id(), step + 1, e);
                anyhow::bail!("Emitter update failed.");
            }
        }
        env.step(dt);
        let step_duration = step_start_time.elapsed();

        let current_time = Instant::now();
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= 5.0;
        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step + 1 == total_steps;

        if should_print_status || is_record_step || is_last_step {
            let summary: Vec<String> = env
                .ligands()
                .iter()
                .filter_map(|ligand| {
                    env.field_of(ligand.id)
                        .ok()
                        .map(|channel| format!("{}: mean {:.4e} max {:.4e}", ligand.name, channel.mean(), channel.max()))
                })
                .collect();
            info!(
                "Step [{}/{}] (t={:.4}) | {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step + 1,
                total_steps,
                env.time(),
                summary.join(", "),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if is_record_step || is_last_step {
                if let Err(e) = recorder.record_fields(&env) {
                    error!("Error recording fields at step {}: {}", step + 1, e);
                    anyhow::bail!("Failed to record fields.");
                }
            }
        } else {
            trace!(
                "Step [{}/{}] completed in {:.2} ms",
                step + 1,
                total_steps,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }

    let total_duration = start_time.elapsed();
    info!("Simulation finished in {:.3} seconds.", total_duration.as_secs_f64());

    // --- Save Recorded Data ---
    info!("Saving recorded data...");
    if config.output.save_stats {
        let format = OutputFormat::from_name(config.output.format.as_deref().unwrap_or("json"));
        if let Err(e) = recorder.write(&config.output.base_filename, format) {
            error!("Error saving recorded fields: {:#}", e);
        }
    } else {
        info!("Skipping saving field snapshots as per config (save_stats is false).");
    }

    if config.output.save_final_fields {
        let filename = format!("{}_final_fields.csv", config.output.base_filename);
        if let Err(e) = recorder::write_fields_csv(&env, Path::new(&filename)) {
            error!("Error saving CSV file '{}': {:#}", filename, e);
        }
    } else {
        info!("Skipping saving final fields as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

/// Restores the latest recorded fields, refusing runs made with different ligands.
fn resume_from(path: &Path, config: &EnvironmentConfig) -> Result<Environment> {
    info!("Resuming from recorded run {}...", path.display());
    let run = recorder::read_run(path)?;
    if run.metadata.ligands != config.ligands {
        anyhow::bail!("Recorded run '{}' was made with a different ligand set.", path.display());
    }
    let env = Environment::from_recorded(&run)
        .with_context(|| format!("restoring environment from '{}'", path.display()))?;
    info!("Resumed at tick {} (t={:.4}).", env.tick(), env.time());
    Ok(env)
}
