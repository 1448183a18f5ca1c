use anyhow::{Context, Result};
use ort::execution_providers::XNNPACKExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use std::path::Path;

pub use ort::session::Session;

pub fn initialize_model(models_dir: &Path, model_file: &str, threads: usize) -> Result<Session> {
    let path = models_dir.join(model_file);

    let model = Session::builder()?
        .with_execution_providers([XNNPACKExecutionProvider::default().build()])?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_parallel_execution(true)?
        .with_inter_threads(threads.saturating_sub(2).max(1))?
        .commit_from_file(&path)
        .with_context(|| format!("loading model {}", path.display()))?;

    Ok(model)
}
