use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::StreamExt;
use futures::stream;
use tracing::{debug, warn};

use super::platform::{ProcError, ProcessSource};
use super::process::ProcessIdentity;

type Resolver = Box<dyn Fn(u32) -> Option<String> + Send + Sync>;

/// Read-mostly uid to user-name cache.
///
/// Lookups that fail are cached as the numeric uid so the same miss is not
/// retried every poll.
pub struct UserCache {
    names: RwLock<HashMap<u32, String>>,
    resolve: Resolver,
}

impl Default for UserCache {
    fn default() -> Self {
        Self::with_resolver(|uid| {
            users::get_user_by_uid(uid).map(|u| u.name().to_string_lossy().to_string())
        })
    }
}

impl UserCache {
    pub fn with_resolver(resolve: impl Fn(u32) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            names: RwLock::new(HashMap::new()),
            resolve: Box::new(resolve),
        }
    }

    pub fn name(&self, uid: u32) -> String {
        if let Ok(names) = self.names.read()
            && let Some(name) = names.get(&uid)
        {
            return name.clone();
        }

        let name = (self.resolve)(uid).unwrap_or_else(|| {
            debug!(uid, "no user entry, using numeric uid");
            uid.to_string()
        });
        if let Ok(mut names) = self.names.write() {
            names.entry(uid).or_insert_with(|| name.clone());
        }
        name
    }

    pub fn len(&self) -> usize {
        self.names.read().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lists every visible process with its identity.
///
/// Per-process reads run on the blocking pool, at most `workers` at a time, so
/// enumeration cost never turns into unbounded concurrency.
pub struct Enumerator {
    source: Arc<dyn ProcessSource>,
    users: Arc<UserCache>,
    workers: usize,
}

impl Enumerator {
    pub fn new(source: Arc<dyn ProcessSource>, users: Arc<UserCache>, workers: usize) -> Self {
        Self {
            source,
            users,
            workers: workers.max(1),
        }
    }

    /// Fails only when the process list itself cannot be read.
    pub async fn list_all(&self) -> Result<Vec<ProcessIdentity>, ProcError> {
        let source = Arc::clone(&self.source);
        let pids = tokio::task::spawn_blocking(move || source.all_pids())
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "pid listing task failed");
                Ok(Vec::new())
            })?;

        let mut identities: Vec<ProcessIdentity> = stream::iter(pids)
            .map(|pid| {
                let source = Arc::clone(&self.source);
                let users = Arc::clone(&self.users);
                async move {
                    tokio::task::spawn_blocking(move || read_identity(source.as_ref(), &users, pid))
                        .await
                        .unwrap_or_else(|err| {
                            warn!(pid, error = %err, "identity worker failed");
                            ProcessIdentity {
                                pid,
                                ..Default::default()
                            }
                        })
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        identities.sort_unstable_by_key(|p| p.pid);
        debug!(count = identities.len(), "enumerated processes");
        Ok(identities)
    }
}

/// Reads name, owner and command line; any part that fails stays empty.
pub fn read_identity(source: &dyn ProcessSource, users: &UserCache, pid: u32) -> ProcessIdentity {
    let name = source.comm(pid).unwrap_or_default();
    let user = source
        .owner_uid(pid)
        .map(|uid| users.name(uid))
        .unwrap_or_default();
    let command = source
        .cmdline(pid)
        .map(|argv| argv.join(" "))
        .unwrap_or_default();
    ProcessIdentity {
        pid,
        name,
        user,
        command,
    }
}
