//! Session lifecycle: provisioning, lookup, and teardown of isolated
//! per-client workspace roots.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::{info, warn};

use simdock_protocol::SessionId;

use crate::error::SimdockError;
use crate::fsutil::{copy_tree, remove_tree_best_effort};
use crate::snapshot::backup_slot;
use crate::tasks::JobHandles;

/// Directory-name prefix for session roots. The orphan sweeper recognizes
/// session directories purely by this naming convention.
pub const SESSION_DIR_PREFIX: &str = "sess-";

/// Deterministic directory name for a session id.
pub fn session_dir_name(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("{SESSION_DIR_PREFIX}{prefix}")
}

/// Mutable simulation state attached to a session. Both flags are shared
/// with the worker thread of an in-flight job.
#[derive(Clone)]
pub struct SimState {
    pub running: Arc<AtomicBool>,
    pub cancel: Arc<AtomicBool>,
}

impl SimState {
    fn idle() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct Session {
    root: PathBuf,
    sim: SimState,
    last_selected_file: Option<String>,
    #[allow(dead_code)]
    created_at: SystemTime,
}

/// Creates, looks up, and destroys sessions. Each session exclusively owns
/// one workspace root under the temp area.
pub struct SessionManager {
    temp_dir: PathBuf,
    template_dir: Option<PathBuf>,
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionManager {
    pub fn new(temp_dir: PathBuf, template_dir: Option<PathBuf>) -> Result<Self, SimdockError> {
        fs::create_dir_all(&temp_dir)?;
        Ok(Self {
            temp_dir,
            template_dir,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Create a session: allocate an id and synchronously provision its root
    /// by copying the template workspace. A provisioning failure removes the
    /// partial root and the session never becomes visible.
    pub async fn create(&self) -> Result<SessionId, SimdockError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let root = self.temp_dir.join(session_dir_name(&id));

        if let Err(e) = self.provision_root(&root) {
            remove_tree_best_effort(&root);
            return Err(e);
        }

        let session = Session {
            root: root.clone(),
            sim: SimState::idle(),
            last_selected_file: None,
            created_at: SystemTime::now(),
        };
        self.sessions.write().await.insert(id.clone(), session);

        info!(session_id = %id, root = %root.display(), "session created");
        Ok(id)
    }

    fn provision_root(&self, root: &Path) -> Result<(), SimdockError> {
        fs::create_dir_all(root)?;
        if let Some(template) = &self.template_dir {
            copy_tree(template, root)?;
        }
        Ok(())
    }

    /// End a session: signal cancellation of any in-flight job, drop the
    /// table entry, and best-effort delete the root and its backup slot.
    /// Safe to call with an unknown id (no-op).
    pub async fn end(&self, id: &str) {
        let removed = self.sessions.write().await.remove(id);
        let Some(session) = removed else {
            return;
        };

        session.sim.cancel.store(true, Ordering::SeqCst);
        remove_tree_best_effort(&session.root);
        remove_tree_best_effort(&backup_slot(&session.root));
        info!(session_id = %id, "session ended");
    }

    /// Workspace root for a session, or `None` for unknown ids. Callers must
    /// check before touching the filesystem.
    pub async fn root_for(&self, id: &str) -> Option<PathBuf> {
        self.sessions.read().await.get(id).map(|s| s.root.clone())
    }

    pub async fn has_session(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remember the most recently read file, used to disambiguate save
    /// targets for partial updates.
    pub async fn set_last_selected(&self, id: &str, rel_path: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            session.last_selected_file = Some(rel_path.to_string());
        }
    }

    pub async fn last_selected(&self, id: &str) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(id)
            .and_then(|s| s.last_selected_file.clone())
    }

    /// Hand out the job flags for a launch, resetting the cancel flag so a
    /// previous session-end signal does not kill the new job.
    pub async fn begin_job(&self, id: &str) -> Option<(PathBuf, JobHandles)> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        session.sim.cancel = Arc::new(AtomicBool::new(false));
        Some((
            session.root.clone(),
            JobHandles {
                running: Arc::clone(&session.sim.running),
                cancel: Arc::clone(&session.sim.cancel),
            },
        ))
    }

    pub async fn is_running(&self, id: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| s.sim.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Force-clear a session's root back to an empty directory. Returns
    /// false for unknown sessions or failed deletes.
    pub async fn clear_temp(&self, id: &str) -> bool {
        let Some(root) = self.root_for(id).await else {
            return false;
        };
        if root.exists() && !remove_tree_best_effort(&root) {
            return false;
        }
        match fs::create_dir_all(&root) {
            Ok(()) => {
                info!(session_id = %id, "session temp cleared");
                true
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "failed to recreate session root");
                false
            }
        }
    }

    /// Directory names belonging to live sessions, for the orphan sweeper.
    pub async fn live_dir_names(&self) -> HashSet<String> {
        self.sessions
            .read()
            .await
            .values()
            .filter_map(|s| {
                s.root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .collect()
    }
}
