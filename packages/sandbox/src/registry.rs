// ABOUTME: In-memory registry of running workspace sandboxes
// ABOUTME: Owns port assignment and per-workspace mutation locks for the server's lifetime

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::error::Result;
use crate::ports::{PortAllocator, PortReservation};
use crate::types::Workspace;

/// Registry of workspaces whose sandbox is believed to be running
pub struct SandboxRegistry {
    entries: RwLock<HashMap<String, Workspace>>,
    allocator: PortAllocator,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SandboxRegistry {
    pub fn new(allocator: PortAllocator) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            allocator,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Serialize start/stop for one workspace id.
    ///
    /// Different ids never contend with each other.
    pub async fn lock_workspace(&self, workspace_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop locks nobody holds or waits on
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(
                locks
                    .entry(workspace_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Reserve a port not used by any registered workspace
    pub async fn reserve_port(&self) -> Result<PortReservation> {
        let entries = self.entries.read().await;
        let in_use: HashSet<u16> = entries.values().map(|w| w.port).collect();
        self.allocator.allocate(&in_use)
    }

    /// Record a started workspace, consuming the reservation for its port
    pub async fn insert(&self, workspace: Workspace, reservation: PortReservation) {
        debug_assert_eq!(workspace.port, reservation.port());
        let mut entries = self.entries.write().await;
        info!(
            "Registered workspace {} on port {}",
            workspace.id, workspace.port
        );
        entries.insert(workspace.id.clone(), workspace);
        // Entry holds the port from here on
        drop(reservation);
    }

    /// Remove a workspace, freeing its port
    pub async fn remove(&self, workspace_id: &str) -> Option<Workspace> {
        let removed = self.entries.write().await.remove(workspace_id);
        if let Some(workspace) = &removed {
            debug!(
                "Unregistered workspace {} (port {})",
                workspace.id, workspace.port
            );
        }
        removed
    }

    pub async fn get(&self, workspace_id: &str) -> Option<Workspace> {
        self.entries.read().await.get(workspace_id).cloned()
    }

    pub async fn contains(&self, workspace_id: &str) -> bool {
        self.entries.read().await.contains_key(workspace_id)
    }

    pub async fn list(&self) -> Vec<Workspace> {
        let mut workspaces: Vec<Workspace> = self.entries.read().await.values().cloned().collect();
        workspaces.sort_by(|a, b| a.id.cmp(&b.id));
        workspaces
    }

    pub async fn active_ports(&self) -> HashSet<u16> {
        self.entries.read().await.values().map(|w| w.port).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SandboxHandle, WorkspaceStatus};
    use chrono::Utc;
    use std::time::Duration;

    fn workspace(id: &str, port: u16) -> Workspace {
        Workspace {
            id: id.to_string(),
            status: WorkspaceStatus::Running,
            port,
            sandbox: SandboxHandle {
                container_id: format!("container-{}", id),
                name: format!("wharf-{}", id),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_registered_ports_are_not_reallocated() {
        let registry = SandboxRegistry::new(PortAllocator::new(3001, 10));

        let reservation = registry.reserve_port().await.unwrap();
        let port = reservation.port();
        registry.insert(workspace("ws-1", port), reservation).await;

        let next = registry.reserve_port().await.unwrap();
        assert_ne!(next.port(), port);
        assert_eq!(next.port(), 3002);
    }

    #[tokio::test]
    async fn test_remove_frees_port() {
        let registry = SandboxRegistry::new(PortAllocator::new(3001, 10));

        let reservation = registry.reserve_port().await.unwrap();
        registry.insert(workspace("ws-1", 3001), reservation).await;
        assert!(registry.contains("ws-1").await);

        let removed = registry.remove("ws-1").await.unwrap();
        assert_eq!(removed.port, 3001);
        assert!(registry.is_empty().await);

        let again = registry.reserve_port().await.unwrap();
        assert_eq!(again.port(), 3001);
    }

    #[tokio::test]
    async fn test_workspace_lock_serializes_same_id() {
        let registry = Arc::new(SandboxRegistry::new(PortAllocator::new(3001, 10)));

        let guard = registry.lock_workspace("ws-1").await;

        let contender = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let _guard = registry.lock_workspace("ws-1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different id is not blocked
        let _other = registry.lock_workspace("ws-2").await;

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let registry = SandboxRegistry::new(PortAllocator::new(3001, 10));
        for id in ["ws-b", "ws-a"] {
            let reservation = registry.reserve_port().await.unwrap();
            let port = reservation.port();
            registry.insert(workspace(id, port), reservation).await;
        }

        let ids: Vec<String> = registry.list().await.into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec!["ws-a".to_string(), "ws-b".to_string()]);
        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.active_ports().await, HashSet::from([3001, 3002]));
    }
}
