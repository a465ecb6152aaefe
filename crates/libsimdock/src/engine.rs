//! Simulation engine seam.
//!
//! The orchestrator treats the engine as an opaque long-running computation:
//! it is handed a workspace path and a config name, may report progress any
//! number of times, and must invoke the finalize callback exactly once just
//! before it discards its own scratch files. Engine failures are captured by
//! the orchestrator and reported through the task registry, never as panics.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use thiserror::Error;

use simdock_protocol::Progress;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("simulation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file produced by the engine in its scratch area, offered to the
/// finalize hook before the scratch area is deleted.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    /// Name the artifact should get inside the session's results directory.
    pub name: String,
    /// Absolute path of the scratch file.
    pub path: PathBuf,
}

/// Callbacks and cancellation wiring injected into an engine run.
pub struct JobContext<'a> {
    /// Replaces the registry's progress field; last call wins.
    pub progress: &'a mut dyn FnMut(Progress),
    /// Invoked exactly once with the full result payload and the scratch
    /// artifacts, before the engine deletes them.
    pub finalize: &'a mut dyn FnMut(&Value, &[ArtifactFile]),
    /// Cooperative cancellation flag; engines should poll it between units
    /// of work. Engines that ignore it simply run to completion.
    pub cancel: Arc<AtomicBool>,
}

pub trait SimulationEngine: Send + Sync {
    /// Run one simulation against `workspace` using the named config file.
    /// Must tolerate a workspace that does not exist (return an error).
    fn run(
        &self,
        workspace: &Path,
        config: &str,
        ctx: &mut JobContext<'_>,
    ) -> Result<Value, EngineError>;
}

/// Normalize a config name coming from a client.
///
/// The engine joins `workspace/project/config` with the provided name, so
/// the value should be a bare filename like `base.yaml`. Clients sometimes
/// send `project/config/base.yaml` or `config/base.yaml`; strip those
/// prefixes and fall back to the basename.
pub fn normalize_config(config: Option<&str>) -> String {
    let Some(raw) = config else {
        return "base.yaml".to_string();
    };
    let s = raw.replace('\\', "/").trim().to_string();
    if s.is_empty() {
        return "base.yaml".to_string();
    }
    let lower = s.to_ascii_lowercase();
    for prefix in ["project/config/", "config/"] {
        if lower.starts_with(prefix) {
            return s[prefix.len()..].to_string();
        }
    }
    match s.rsplit_once('/') {
        Some((_, tail)) => tail.to_string(),
        None => s,
    }
}

/// Deterministic built-in engine used by tests and local runs.
///
/// Parses `project/config/<cfg>` from the workspace, reports staged
/// progress, writes a couple of CSV artifacts into a private scratch
/// directory, hands them to the finalize hook, and removes the scratch
/// directory afterwards.
pub struct DemoEngine {
    pub steps: u32,
    pub step_delay: Duration,
}

impl Default for DemoEngine {
    fn default() -> Self {
        Self {
            steps: 5,
            step_delay: Duration::from_millis(10),
        }
    }
}

impl SimulationEngine for DemoEngine {
    fn run(
        &self,
        workspace: &Path,
        config: &str,
        ctx: &mut JobContext<'_>,
    ) -> Result<Value, EngineError> {
        let started = Instant::now();
        let config_path = workspace.join("project").join("config").join(config);
        let config_doc: Value = match fs::read_to_string(&config_path) {
            Ok(text) => serde_yaml::from_str::<serde_yaml::Value>(&text)
                .ok()
                .and_then(|v| serde_json::to_value(v).ok())
                .unwrap_or(Value::Null),
            Err(e) => {
                return Err(EngineError::Config(format!(
                    "cannot read {}: {e}",
                    config_path.display()
                )));
            }
        };

        for step in 0..self.steps {
            if ctx.cancel.load(Ordering::Relaxed) {
                return Err(EngineError::Cancelled);
            }
            (ctx.progress)(Progress {
                elapsed_secs: started.elapsed().as_secs_f64(),
                percent: Some(f64::from(step) / f64::from(self.steps) * 100.0),
                message: format!("step {}/{}", step + 1, self.steps),
            });
            std::thread::sleep(self.step_delay);
        }

        let scratch = std::env::temp_dir().join(format!(
            "simdock-job-{}",
            uuid::Uuid::new_v4().simple()
        ));
        fs::create_dir_all(&scratch)?;

        let events = scratch.join("events.csv");
        fs::write(&events, "step,event\n0,start\n1,finish\n")?;
        let operations = scratch.join("operations.csv");
        fs::write(&operations, "op,count\nsimulate,1\n")?;

        let result = json!({
            "status": "finished",
            "config": config,
            "results": {
                "steps": self.steps,
                "duration_secs": started.elapsed().as_secs_f64(),
                "config_keys": config_doc
                    .as_object()
                    .map(|m| m.len())
                    .unwrap_or(0),
            },
        });

        let artifacts = vec![
            ArtifactFile {
                name: "events.csv".to_string(),
                path: events,
            },
            ArtifactFile {
                name: "operations.csv".to_string(),
                path: operations,
            },
        ];
        (ctx.finalize)(&result, &artifacts);

        // Scratch files are gone after this point; only what finalize
        // harvested survives.
        if let Err(e) = fs::remove_dir_all(&scratch) {
            tracing::warn!(scratch = %scratch.display(), error = %e, "failed to remove scratch dir");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace_with_config() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("project/config")).unwrap();
        fs::write(dir.path().join("project/config/base.yaml"), "a: 1\nb: 2\n").unwrap();
        dir
    }

    #[test]
    fn normalize_config_strips_known_prefixes() {
        assert_eq!(normalize_config(Some("project/config/base.yaml")), "base.yaml");
        assert_eq!(normalize_config(Some("config/alt.yaml")), "alt.yaml");
        assert_eq!(normalize_config(Some("deep/dir/x.yaml")), "x.yaml");
        assert_eq!(normalize_config(Some("base.yaml")), "base.yaml");
        assert_eq!(normalize_config(Some("  ")), "base.yaml");
        assert_eq!(normalize_config(None), "base.yaml");
    }

    #[test]
    fn demo_engine_reports_progress_and_finalizes_once() {
        let ws = workspace_with_config();
        let mut updates = Vec::new();
        let mut finalize_calls = 0usize;
        let mut harvested = Vec::new();

        let mut progress = |p: Progress| updates.push(p);
        let mut finalize = |_result: &Value, artifacts: &[ArtifactFile]| {
            finalize_calls += 1;
            for a in artifacts {
                harvested.push(fs::read_to_string(&a.path).unwrap());
            }
        };
        let mut ctx = JobContext {
            progress: &mut progress,
            finalize: &mut finalize,
            cancel: Arc::new(AtomicBool::new(false)),
        };

        let engine = DemoEngine {
            steps: 3,
            step_delay: Duration::from_millis(1),
        };
        let result = engine.run(ws.path(), "base.yaml", &mut ctx).unwrap();

        assert_eq!(result["status"], "finished");
        assert_eq!(result["results"]["config_keys"], 2);
        assert_eq!(updates.len(), 3);
        assert_eq!(finalize_calls, 1);
        // Artifacts were readable at finalize time even though scratch is
        // deleted afterwards.
        assert_eq!(harvested.len(), 2);
    }

    #[test]
    fn demo_engine_missing_workspace_errors() {
        let mut progress = |_p: Progress| {};
        let mut finalize = |_r: &Value, _a: &[ArtifactFile]| {};
        let mut ctx = JobContext {
            progress: &mut progress,
            finalize: &mut finalize,
            cancel: Arc::new(AtomicBool::new(false)),
        };

        let engine = DemoEngine::default();
        let result = engine.run(Path::new("/nonexistent-simdock-ws"), "base.yaml", &mut ctx);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn demo_engine_honors_cancellation() {
        let ws = workspace_with_config();
        let mut progress = |_p: Progress| {};
        let mut finalize = |_r: &Value, _a: &[ArtifactFile]| {};
        let mut ctx = JobContext {
            progress: &mut progress,
            finalize: &mut finalize,
            cancel: Arc::new(AtomicBool::new(true)),
        };

        let engine = DemoEngine::default();
        let result = engine.run(ws.path(), "base.yaml", &mut ctx);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
