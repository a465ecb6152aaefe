//! Background-task orchestration: an in-memory registry of simulation jobs
//! plus one worker thread per in-flight job.
//!
//! Concurrency contract: the registry map is safe for concurrent inserts and
//! lookups from any context; after insertion, exactly one worker mutates a
//! given entry (single-writer invariant), and pollers only ever take
//! point-in-time snapshots. Entries live for the lifetime of the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use simdock_protocol::{Progress, SessionId, TaskId, TaskStatus, TaskStatusResponse};

use crate::engine::{ArtifactFile, JobContext, SimulationEngine, normalize_config};
use crate::store;

struct TaskEntry {
    session_id: SessionId,
    status: TaskStatus,
    progress: Progress,
    result: Option<Value>,
    files: Option<simdock_protocol::FileListing>,
}

/// Launches jobs and serves pollable status snapshots.
pub struct TaskOrchestrator {
    tasks: Arc<DashMap<TaskId, TaskEntry>>,
    engine: Arc<dyn SimulationEngine>,
}

/// Per-job handles shared with the owning session.
pub struct JobHandles {
    /// Flipped true while the job runs, false on completion.
    pub running: Arc<AtomicBool>,
    /// Cooperative cancellation flag, set when the session ends.
    pub cancel: Arc<AtomicBool>,
}

impl TaskOrchestrator {
    pub fn new(engine: Arc<dyn SimulationEngine>) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            engine,
        }
    }

    /// Register a task and start its worker thread. Never blocks on job
    /// completion.
    pub fn launch(
        &self,
        session_id: &SessionId,
        session_root: PathBuf,
        config: Option<String>,
        handles: JobHandles,
    ) -> TaskId {
        let task_id = uuid::Uuid::new_v4().simple().to_string();
        self.tasks.insert(
            task_id.clone(),
            TaskEntry {
                session_id: session_id.clone(),
                status: TaskStatus::Running,
                progress: Progress::queued(),
                result: None,
                files: None,
            },
        );

        let tasks = Arc::clone(&self.tasks);
        let engine = Arc::clone(&self.engine);
        let worker_id = task_id.clone();
        let thread_name = format!("sim-task-{task_id}");
        handles.running.store(true, Ordering::SeqCst);

        let spawned = std::thread::Builder::new().name(thread_name).spawn(move || {
            run_worker(tasks, engine, worker_id, session_root, config, &handles);
            handles.running.store(false, Ordering::SeqCst);
        });
        if let Err(e) = spawned {
            error!(task_id = %task_id, error = %e, "failed to spawn worker thread");
            if let Some(mut entry) = self.tasks.get_mut(&task_id) {
                entry.status = TaskStatus::Failed;
                entry.result = Some(json!({"error": format!("failed to start worker: {e}")}));
                entry.progress.percent = Some(100.0);
                entry.progress.message = "failed".to_string();
            }
        }

        info!(task_id = %task_id, session_id = %session_id, "simulation task launched");
        task_id
    }

    /// Point-in-time status snapshot. Unknown ids report `not_found` rather
    /// than erroring; the transport layer treats that like a 404.
    pub fn status(&self, task_id: &str) -> TaskStatusResponse {
        match self.tasks.get(task_id) {
            Some(entry) => TaskStatusResponse {
                task_id: task_id.to_string(),
                status: entry.status,
                progress: Some(entry.progress.clone()),
                result: entry.result.clone(),
                files: entry.files.clone(),
            },
            None => TaskStatusResponse::not_found(task_id.to_string()),
        }
    }

    /// Session owning a task, if the task is known.
    pub fn owner_of(&self, task_id: &str) -> Option<SessionId> {
        self.tasks.get(task_id).map(|e| e.session_id.clone())
    }
}

fn run_worker(
    tasks: Arc<DashMap<TaskId, TaskEntry>>,
    engine: Arc<dyn SimulationEngine>,
    task_id: TaskId,
    session_root: PathBuf,
    config: Option<String>,
    handles: &JobHandles,
) {
    let config = normalize_config(config.as_deref());

    let progress_tasks = Arc::clone(&tasks);
    let progress_id = task_id.clone();
    let mut progress = move |p: Progress| {
        if let Some(mut entry) = progress_tasks.get_mut(&progress_id) {
            entry.progress = p;
        }
    };

    let finalize_root = session_root.clone();
    let mut finalize = move |result: &Value, artifacts: &[ArtifactFile]| {
        harvest_artifacts(&finalize_root, result, artifacts);
    };

    let mut ctx = JobContext {
        progress: &mut progress,
        finalize: &mut finalize,
        cancel: Arc::clone(&handles.cancel),
    };

    let outcome = engine.run(&session_root, &config, &mut ctx);

    let files = store::scan_files(&session_root);
    let Some(mut entry) = tasks.get_mut(&task_id) else {
        return;
    };
    match outcome {
        Ok(result) => {
            entry.status = TaskStatus::Finished;
            entry.result = Some(result);
            entry.files = Some(files);
            entry.progress.percent = Some(100.0);
            entry.progress.message = "finished".to_string();
            info!(task_id = %task_id, "simulation task finished");
        }
        Err(e) => {
            entry.status = TaskStatus::Failed;
            entry.result = Some(json!({"error": e.to_string()}));
            entry.files = Some(files);
            // Forced terminal progress so pollers always see a finished bar.
            entry.progress.percent = Some(100.0);
            entry.progress.message = "failed".to_string();
            error!(task_id = %task_id, error = %e, "simulation task failed");
        }
    }
}

/// Copy job-produced artifacts into the session root before the engine
/// deletes its scratch files. The simulation result is more valuable than
/// the copies, so every failure here is logged and swallowed.
fn harvest_artifacts(session_root: &Path, result: &Value, artifacts: &[ArtifactFile]) {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let base_dir = format!("results/{stamp}");

    match serde_yaml::to_string(result) {
        Ok(summary) => {
            if let Err(e) = store::write_file(
                session_root,
                &format!("{base_dir}/summary.yaml"),
                Some(&Value::String(summary)),
            ) {
                warn!(error = %e, "failed to write result summary");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize result summary"),
    }

    for artifact in artifacts {
        let content = match std::fs::read_to_string(&artifact.path) {
            Ok(c) => c,
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "failed to read artifact");
                continue;
            }
        };
        let target = format!("{base_dir}/{}", artifact.name);
        if let Err(e) = store::write_file(session_root, &target, Some(&Value::String(content))) {
            warn!(artifact = %artifact.name, error = %e, "failed to harvest artifact");
        }
    }
}
