//! Persistence boundary for server rows

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_common::{RelayResult, ServerRole};

/// Durable server row, as repopulated at boot
#[derive(Debug, Clone)]
pub struct StoredServer {
    pub id: i64,
    pub host: String,
    pub role: ServerRole,
    pub status: i32,
    pub desc: String,
}

/// Relational store boundary.
///
/// The real implementation lives outside this crate. Registration treats a
/// rejected insert as fatal to that registration: in-memory state is only
/// updated after the row is durable.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Insert a server row, returning its id
    async fn insert_server(
        &self,
        host: &str,
        role: ServerRole,
        status: i32,
        desc: &str,
    ) -> RelayResult<i64>;

    /// Load every server row, used once at boot
    async fn load_servers(&self) -> RelayResult<Vec<StoredServer>>;
}

/// In-memory store for tests and single-process deployments
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredServer>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing registration
    pub fn push(&self, row: StoredServer) {
        self.rows.lock().push(row);
    }
}

#[async_trait]
impl ServerStore for MemoryStore {
    async fn insert_server(
        &self,
        host: &str,
        role: ServerRole,
        status: i32,
        desc: &str,
    ) -> RelayResult<i64> {
        let mut rows = self.rows.lock();
        let id = rows.len() as i64 + 1;
        rows.push(StoredServer {
            id,
            host: host.to_string(),
            role,
            status,
            desc: desc.to_string(),
        });
        Ok(id)
    }

    async fn load_servers(&self) -> RelayResult<Vec<StoredServer>> {
        Ok(self.rows.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let id = store
            .insert_server("10.0.0.1", ServerRole::Origin, 0, "rack 4")
            .await
            .unwrap();
        assert_eq!(id, 1);
        let rows = store.load_servers().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].host, "10.0.0.1");
        assert_eq!(rows[0].role, ServerRole::Origin);
    }
}
