//! Job commands: load a payload file, run the job, emit the result.

use std::path::Path;

use anyhow::Context;
use gaia_core::module_outline::{GenerateModuleOutline, ModuleOutline};
use gaia_tasks::TaskClient;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::progress::spawn_progress_logger;

/// The generation jobs the CLI can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Outline from title, about, minutes and persona.
    Outline,
    /// Full module from an outline.
    Module,
    /// Full module in one request to the crew endpoint.
    Crew,
}

impl Job {
    pub fn name(self) -> &'static str {
        match self {
            Job::Outline => "outline",
            Job::Module => "module",
            Job::Crew => "crew",
        }
    }
}

/// Read and deserialize a JSON payload file.
pub fn load_payload<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid payload in {}", path.display()))
}

/// Run `job` with the payload at `input` and return the result as JSON.
///
/// Progress for subscription-backed jobs is logged as it arrives.
pub async fn run(client: &TaskClient, job: Job, input: &Path) -> anyhow::Result<Value> {
    tracing::info!(job = job.name(), input = %input.display(), "Running job");

    let result = match job {
        Job::Outline => {
            let request: GenerateModuleOutline = load_payload(input)?;
            let (progress, logger) = spawn_progress_logger(job.name());
            let outline = client.generate_module_outline(&request, Some(progress)).await;
            let _ = logger.await;
            serde_json::to_value(outline.map_err(describe)?)?
        }
        Job::Module => {
            let outline: ModuleOutline = load_payload(input)?;
            let (progress, logger) = spawn_progress_logger(job.name());
            let module = client.generate_module(&outline, Some(progress)).await;
            let _ = logger.await;
            serde_json::to_value(module.map_err(describe)?)?
        }
        Job::Crew => {
            let request: GenerateModuleOutline = load_payload(input)?;
            serde_json::to_value(client.generate_module_crew(&request).await.map_err(describe)?)?
        }
    };

    Ok(result)
}

/// Pretty-print `value` to `out`, or to stdout when `out` is `None`.
pub fn write_output(value: &Value, out: Option<&Path>) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, rendered + "\n")
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn describe(err: gaia_tasks::GenerationError) -> anyhow::Error {
    let kind = err.kind();
    anyhow::Error::new(err).context(format!("Generation failed ({kind})"))
}
