use chrono::{DateTime, Utc};

use super::{Db, Session};
use crate::Result;

impl Db {
    pub async fn create_session(&self, id: &str, jti: &str, user_id: &str, expires_at: DateTime<Utc>) -> Result<Session> {
        sqlx::query(
            "INSERT INTO sessions (id, jti, user_id, created_at, expires_at, revoked) VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(id)
        .bind(jti)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.find_session_by_jti(jti)
            .await?
            .ok_or_else(|| crate::Error::Fatal("session vanished after insert".into()))
    }

    pub async fn find_session_by_jti(&self, jti: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE jti = ?")
            .bind(jti)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    pub async fn revoke_session(&self, jti: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET revoked = 1 WHERE jti = ?")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// A session is valid iff it exists, is not revoked, and has not expired.
    pub async fn session_is_valid(&self, jti: &str) -> Result<bool> {
        let Some(session) = self.find_session_by_jti(jti).await? else {
            return Ok(false);
        };
        Ok(!session.revoked && session.expires_at > Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use chrono::Duration;

    #[tokio::test]
    async fn revoked_session_is_invalid() {
        let db = Db::connect_in_memory().await.unwrap();
        db.create_session("s1", "jti-1", "user-1", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(db.session_is_valid("jti-1").await.unwrap());

        db.revoke_session("jti-1").await.unwrap();
        assert!(!db.session_is_valid("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn expired_session_is_invalid() {
        let db = Db::connect_in_memory().await.unwrap();
        db.create_session("s2", "jti-2", "user-1", Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert!(!db.session_is_valid("jti-2").await.unwrap());
    }
}
