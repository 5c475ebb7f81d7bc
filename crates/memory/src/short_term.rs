//! Short-term working memory
//!
//! A bounded-lifetime Redis list per session. The persistent message log is
//! authoritative; this buffer only feeds recent history into the prompt and
//! expires on its own.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use mnemo_core::ChatMessage;

use crate::MemoryError;

#[derive(Clone)]
pub struct ShortTermMemory {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

fn key(session_id: &str) -> String {
    format!("session:{session_id}")
}

impl ShortTermMemory {
    pub async fn connect(url: &str, ttl_seconds: u64) -> Result<Self, MemoryError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!(url = %url, "Connected to short-term store");
        Ok(Self { conn, ttl_seconds })
    }

    /// Append a turn and refresh the session TTL
    pub async fn append_turn(
        &self,
        session_id: &str,
        message: &ChatMessage,
    ) -> Result<(), MemoryError> {
        let key = key(session_id);
        let payload = serde_json::to_string(message)?;
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(&key, payload).await?;
        conn.expire::<_, ()>(&key, self.ttl_seconds as i64).await?;
        Ok(())
    }

    /// All buffered turns in append order
    pub async fn turns(&self, session_id: &str) -> Result<Vec<ChatMessage>, MemoryError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(key(session_id), 0, -1).await?;
        let mut turns = Vec::with_capacity(raw.len());
        for item in raw {
            match serde_json::from_str::<ChatMessage>(&item) {
                Ok(msg) => turns.push(msg),
                Err(e) => tracing::warn!(session_id, error = %e, "Dropping unreadable short-term turn"),
            }
        }
        Ok(turns)
    }

    pub async fn turn_count(&self, session_id: &str) -> Result<i64, MemoryError> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(key(session_id)).await?)
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), MemoryError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key(session_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(key("abc-123"), "session:abc-123");
    }
}
