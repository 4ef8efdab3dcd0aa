use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisResult, Script};
use tracing::{debug, info};

use super::scripts::{COMPARE_AND_DELETE, COMPARE_AND_EXTEND};
use super::{Extend, LeaseStore, ttl_millis};
use crate::config::RedisConfig;
use crate::error::{LockError, StoreError};

/// Redis-backed lease store.
///
/// Uses a [`ConnectionManager`], which multiplexes commands over one
/// connection and reconnects on its own; clones share that connection.
/// The ownership-checked primitives run as Lua scripts, sent by SHA with a
/// transparent fallback to a full `EVAL` when the server has not cached them.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    extend_script: Arc<Script>,
    delete_script: Arc<Script>,
    response_timeout: Option<Duration>,
    address: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("address", &self.address)
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect using `config` and verify the server answers `PING`.
    pub async fn connect(config: &RedisConfig) -> Result<Self, LockError> {
        let url = config.url()?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| LockError::configuration(format!("invalid Redis connection info: {e}")))?;

        debug!(address = %config.address, db = config.db, "connecting to Redis");
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "connect",
                timeout: config.connect_timeout,
            })?
            .map_err(|e| StoreError::transport("connect", e.to_string()))?;

        let mut store = Self::from_connection(conn);
        store.response_timeout = config.response_timeout;
        store.address.clone_from(&config.address);

        let reply = store.ping().await?;
        info!(address = %config.address, db = config.db, reply = %reply, "connected to Redis");
        Ok(store)
    }

    /// Wrap an already established connection
    #[must_use]
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            extend_script: Arc::new(Script::new(COMPARE_AND_EXTEND)),
            delete_script: Arc::new(Script::new(COMPARE_AND_DELETE)),
            response_timeout: None,
            address: String::from("<unknown>"),
        }
    }

    /// Bound every command by `timeout`
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Round-trip a `PING`
    pub async fn ping(&self) -> Result<String, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded("ping", async move {
            redis::cmd("PING").query_async::<String>(&mut conn).await
        })
        .await
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        let result = match self.response_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| StoreError::Timeout { operation, timeout })?,
            None => call.await,
        };
        result.map_err(|e| StoreError::transport(operation, e.to_string()))
    }
}

fn script_flag(operation: &'static str, reply: i64) -> Result<bool, StoreError> {
    match reply {
        1 => Ok(true),
        0 => Ok(false),
        other => Err(StoreError::Unexpected {
            operation,
            reply: other.to_string(),
        }),
    }
}

#[async_trait]
impl LeaseStore for RedisStore {
    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply = self
            .bounded("set_if_absent", async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(token)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async::<Option<String>>(&mut conn)
                    .await
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<Extend, StoreError> {
        let mut conn = self.conn.clone();
        let script = Arc::clone(&self.extend_script);
        let reply = self
            .bounded("compare_and_extend", async move {
                script
                    .key(key)
                    .arg(token)
                    .arg(ttl_millis(ttl))
                    .invoke_async::<i64>(&mut conn)
                    .await
            })
            .await?;
        if script_flag("compare_and_extend", reply)? {
            Ok(Extend::Extended)
        } else {
            Ok(Extend::NotOwner)
        }
    }

    async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let script = Arc::clone(&self.delete_script);
        let reply = self
            .bounded("compare_and_delete", async move {
                script
                    .key(key)
                    .arg(token)
                    .invoke_async::<i64>(&mut conn)
                    .await
            })
            .await?;
        script_flag("compare_and_delete", reply)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed = self
            .bounded("delete", async move {
                redis::cmd("DEL").arg(key).query_async::<i64>(&mut conn).await
            })
            .await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_replies_map_to_flags() {
        assert!(script_flag("compare_and_extend", 1).unwrap());
        assert!(!script_flag("compare_and_extend", 0).unwrap());
        assert!(matches!(
            script_flag("compare_and_delete", 7),
            Err(StoreError::Unexpected { reply, .. }) if reply == "7"
        ));
    }
}
