use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::OptionalExt;
use crate::models::{ts_at, uuid_at};
use crate::{Database, now, timestamp};

impl Database {
    // -- Refresh tokens --

    /// Only a hash of the token is stored.
    pub fn store_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (id, user_id, token_hash, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    user_id.to_string(),
                    token_hash,
                    now(),
                    timestamp(expires_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Consumes a refresh token. Returns its owner if the token existed and
    /// had not expired at `at`. A token can be consumed only once.
    pub fn take_refresh_token(&self, token_hash: &str, at: DateTime<Utc>) -> Result<Option<Uuid>> {
        let taken = self.with_conn(|conn| {
            conn.query_row(
                "DELETE FROM refresh_tokens WHERE token_hash = ?1 RETURNING user_id, expires_at",
                [token_hash],
                |row| Ok((uuid_at(row, 0)?, ts_at(row, 1)?)),
            )
            .optional()
        })?;

        Ok(taken.and_then(|(user_id, expires_at)| (expires_at > at).then_some(user_id)))
    }

    pub fn revoke_refresh_token(&self, token_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed =
                conn.execute("DELETE FROM refresh_tokens WHERE token_hash = ?1", [token_hash])?;
            Ok(removed > 0)
        })
    }

    pub fn revoke_user_tokens(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM refresh_tokens WHERE user_id = ?1",
                [user_id.to_string()],
            )?;
            Ok(removed)
        })
    }

    pub fn purge_expired_tokens(&self, at: DateTime<Utc>) -> Result<usize> {
        let removed = self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
                [timestamp(at)],
            )?;
            Ok(removed)
        })?;
        if removed > 0 {
            info!("Purged {} expired refresh tokens", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{db, user};
    use chrono::Duration;
    use deals_types::models::Role;

    #[test]
    fn tokens_are_single_use() {
        let db = db();
        let alice = user(&db, "alice", Role::User);
        let now = Utc::now();
        db.store_refresh_token(alice, "hash-1", now + Duration::days(7))
            .unwrap();

        assert_eq!(db.take_refresh_token("hash-1", now).unwrap(), Some(alice));
        assert_eq!(db.take_refresh_token("hash-1", now).unwrap(), None);
    }

    #[test]
    fn expired_tokens_are_refused_and_purged() {
        let db = db();
        let alice = user(&db, "alice", Role::User);
        let now = Utc::now();
        db.store_refresh_token(alice, "old", now - Duration::minutes(1))
            .unwrap();
        db.store_refresh_token(alice, "older", now - Duration::days(1))
            .unwrap();
        db.store_refresh_token(alice, "fresh", now + Duration::days(1))
            .unwrap();

        assert_eq!(db.take_refresh_token("old", now).unwrap(), None);
        assert_eq!(db.purge_expired_tokens(now).unwrap(), 1);
        assert_eq!(db.revoke_user_tokens(alice).unwrap(), 1);
        assert!(!db.revoke_refresh_token("fresh").unwrap());
    }
}
