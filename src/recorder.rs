//! Persistence hand-off: metadata once at setup, interior snapshots per tick.

use crate::environment::Environment;
use anyhow::{Context, Result};
use diffusion_common::{FieldSnapshot, GridMetadata, RecordedRun};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Receiver of the environment's time series.
///
/// The environment never calls this itself; the simulation loop records after
/// a tick has finished, so storage never interleaves with diffusion.
pub trait FieldRecorder {
    fn record_metadata(&mut self, metadata: &GridMetadata) -> Result<()>;

    fn record_fields(&mut self, env: &Environment) -> Result<()>;
}

/// On-disk encoding of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Bincode,
    MessagePack,
}

impl OutputFormat {
    /// Parses the config value; unknown names fall back to JSON.
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => OutputFormat::Json,
            "bincode" => OutputFormat::Bincode,
            "messagepack" => OutputFormat::MessagePack,
            other => {
                warn!("Unknown output format: {}. Using JSON instead.", other);
                OutputFormat::Json
            }
        }
    }

    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => OutputFormat::Bincode,
            Some("msgpack") => OutputFormat::MessagePack,
            _ => OutputFormat::Json,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Bincode => "bin",
            OutputFormat::MessagePack => "msgpack",
        }
    }
}

/// Keeps every recorded snapshot in memory until the run is written out.
#[derive(Debug, Default)]
pub struct SnapshotRecorder {
    metadata: Option<GridMetadata>,
    snapshots: Vec<FieldSnapshot>,
}

impl SnapshotRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> Option<&GridMetadata> {
        self.metadata.as_ref()
    }

    pub fn snapshots(&self) -> &[FieldSnapshot] {
        &self.snapshots
    }

    /// Snapshots of one ligand in recording order.
    pub fn series(&self, ligand_id: u32) -> impl Iterator<Item = &FieldSnapshot> {
        self.snapshots.iter().filter(move |s| s.ligand_id == ligand_id)
    }

    pub fn into_run(self) -> Result<RecordedRun> {
        let metadata = self
            .metadata
            .context("no metadata recorded before the snapshots")?;
        Ok(RecordedRun {
            metadata,
            snapshots: self.snapshots,
        })
    }

    /// Writes the run to `<base>_fields.<ext>` and returns the path.
    pub fn write(self, base_filename: &str, format: OutputFormat) -> Result<PathBuf> {
        let run = self.into_run()?;
        let path = PathBuf::from(format!("{}_fields.{}", base_filename, format.extension()));
        write_run(&run, &path, format)?;
        Ok(path)
    }
}

impl FieldRecorder for SnapshotRecorder {
    fn record_metadata(&mut self, metadata: &GridMetadata) -> Result<()> {
        if self.metadata.is_some() {
            anyhow::bail!("metadata already recorded");
        }
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    fn record_fields(&mut self, env: &Environment) -> Result<()> {
        if self.metadata.is_none() {
            anyhow::bail!("record_metadata must be called before record_fields");
        }
        let snapshots = env.snapshots();
        debug!("Recording {} field snapshot(s) at t = {:.4}.", snapshots.len(), env.time());
        self.snapshots.extend(snapshots);
        Ok(())
    }
}

pub fn write_run(run: &RecordedRun, path: &Path, format: OutputFormat) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    match format {
        OutputFormat::Json => serde_json::to_writer(&mut writer, run)
            .with_context(|| format!("serializing run to JSON '{}'", path.display()))?,
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, run)
            .with_context(|| format!("serializing run to bincode '{}'", path.display()))?,
        OutputFormat::MessagePack => rmp_serde::encode::write(&mut writer, run)
            .with_context(|| format!("serializing run to MessagePack '{}'", path.display()))?,
    }
    writer.flush()?;
    info!("Recorded run saved to {} ({} snapshot(s)).", path.display(), run.snapshots.len());
    Ok(())
}

/// Reads a run written by [`write_run`]; the format follows the extension.
pub fn read_run(path: &Path) -> Result<RecordedRun> {
    let file = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let reader = BufReader::new(file);
    let run: RecordedRun = match OutputFormat::from_path(path) {
        OutputFormat::Json => serde_json::from_reader(reader)
            .with_context(|| format!("parsing JSON run '{}'", path.display()))?,
        OutputFormat::Bincode => bincode::deserialize_from(reader)
            .with_context(|| format!("parsing bincode run '{}'", path.display()))?,
        OutputFormat::MessagePack => rmp_serde::decode::from_read(reader)
            .with_context(|| format!("parsing MessagePack run '{}'", path.display()))?,
    };
    Ok(run)
}

/// One interior cell in the final-fields CSV; `(x, y)` is the grid node
/// [`crate::coupling::sample`] reads that cell at.
#[derive(Debug, Serialize)]
struct FieldRow<'a> {
    ligand_id: u32,
    name: &'a str,
    row: usize,
    col: usize,
    x: f64,
    y: f64,
    concentration: f64,
}

/// Writes the current interior of every ligand as CSV, one row per cell.
pub fn write_fields_csv(env: &Environment, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV '{}'", path.display()))?;
    let resolution = env.geometry().resolution;
    for ligand in env.ligands() {
        let channel = env.field_of(ligand.id)?;
        for (row, values) in channel.row_slices().enumerate() {
            for (col, &concentration) in values.iter().enumerate() {
                writer.serialize(FieldRow {
                    ligand_id: ligand.id,
                    name: &ligand.name,
                    row,
                    col,
                    x: col as f64 * resolution,
                    y: row as f64 * resolution,
                    concentration,
                })?;
            }
        }
    }
    writer.flush()?;
    info!("Final fields saved to {}", path.display());
    Ok(())
}
