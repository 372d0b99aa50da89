use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use redis::{Client, aio::ConnectionManager};

use crate::TiergateError;

/// A round-robin set of [`redis::aio::ConnectionManager`]s.
pub struct TiergateRedisClient {
    connection_managers: Arc<Vec<ConnectionManager>>,
    track_index: AtomicUsize,
}

impl std::fmt::Debug for TiergateRedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiergateRedisClient")
            .field("connection_count", &self.connection_managers.len())
            .field("track_index", &self.track_index)
            .finish()
    }
}

impl TiergateRedisClient {
    /// Create a client with a single connection manager.
    pub async fn default_from_client(client: Client) -> Result<Self, TiergateError> {
        Self::from_client(client, 1).await
    }

    /// Create a client with `connection_count` connection managers.
    pub async fn from_client(
        client: Client,
        connection_count: usize,
    ) -> Result<Self, TiergateError> {
        if connection_count == 0 {
            return Err(TiergateError::InvalidRedisClientConnectionCount(
                "connection count must be > 0".to_string(),
            ));
        }

        let mut connection_managers = Vec::with_capacity(connection_count);

        for _ in 0..connection_count {
            connection_managers.push(client.get_connection_manager().await?);
        }

        Self::from_connection_managers(connection_managers)
    }

    /// Wrap already established connection managers.
    pub fn from_connection_managers(
        connection_managers: Vec<ConnectionManager>,
    ) -> Result<Self, TiergateError> {
        if connection_managers.is_empty() {
            return Err(TiergateError::InvalidRedisClientConnectionCount(
                "at least one connection manager is required".to_string(),
            ));
        }

        Ok(Self {
            connection_managers: Arc::new(connection_managers),
            track_index: AtomicUsize::new(0),
        })
    }

    /// Get the next connection manager.
    pub(crate) fn get(&self) -> ConnectionManager {
        let index = self.track_index.fetch_add(1, Ordering::Relaxed);
        self.connection_managers[index % self.connection_managers.len()].clone()
    } // end method get

    /// Number of pooled connection managers.
    pub fn connection_count(&self) -> usize {
        self.connection_managers.len()
    }
} // end impl TiergateRedisClient

impl Clone for TiergateRedisClient {
    fn clone(&self) -> Self {
        Self {
            connection_managers: self.connection_managers.clone(),
            track_index: AtomicUsize::new(0),
        }
    }
}
