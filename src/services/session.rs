use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::Row;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::db::DatabasePool;
use crate::error::AppResult;
use crate::models::{Theme, User};

const ACCESS_TOKEN_KEY: &str = "access_token";
const USER_KEY: &str = "user";
const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub access_token: Option<String>,
    pub user: Option<User>,
    pub theme: Theme,
    // not persisted
    pub nav_items: BTreeMap<String, bool>,
}

pub struct SessionStore {
    db: DatabasePool,
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub async fn load(db: DatabasePool) -> AppResult<Self> {
        let rows = sqlx::query("SELECT key, value FROM session_entries")
            .fetch_all(db.sqlite())
            .await?;

        let mut state = SessionState::default();
        for row in rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match key.as_str() {
                ACCESS_TOKEN_KEY => state.access_token = decode(&key, &value),
                USER_KEY => state.user = decode(&key, &value),
                THEME_KEY => state.theme = decode(&key, &value).unwrap_or_default(),
                other => debug!("Ignoring unknown session entry {}", other),
            }
        }

        debug!(
            "Session loaded (authenticated: {}, theme: {})",
            state.access_token.is_some(),
            state.theme
        );

        Ok(Self {
            db,
            state: RwLock::new(state),
        })
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.access_token.is_some()
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn sign_in(&self, token: String, user: Option<User>) -> AppResult<()> {
        let mut state = self.state.write().await;
        self.put(ACCESS_TOKEN_KEY, &token).await?;
        match &user {
            Some(user) => self.put(USER_KEY, user).await?,
            None => self.delete(USER_KEY).await?,
        }
        state.access_token = Some(token);
        state.user = user;
        Ok(())
    }

    pub async fn clear_credentials(&self) -> AppResult<()> {
        let mut state = self.state.write().await;
        self.delete(ACCESS_TOKEN_KEY).await?;
        self.delete(USER_KEY).await?;
        state.access_token = None;
        state.user = None;
        info!("Session credentials cleared");
        Ok(())
    }

    pub async fn theme(&self) -> Theme {
        self.state.read().await.theme
    }

    pub async fn set_theme(&self, theme: Theme) -> AppResult<()> {
        let mut state = self.state.write().await;
        self.put(THEME_KEY, &theme).await?;
        state.theme = theme;
        Ok(())
    }

    pub async fn nav_item(&self, key: &str) -> bool {
        self.state
            .read()
            .await
            .nav_items
            .get(key)
            .copied()
            .unwrap_or(false)
    }

    pub async fn set_nav_item(&self, key: &str, open: bool) {
        self.state
            .write()
            .await
            .nav_items
            .insert(key.to_string(), open);
    }

    pub async fn toggle_nav_item(&self, key: &str) -> bool {
        let mut state = self.state.write().await;
        let open = !state.nav_items.get(key).copied().unwrap_or(false);
        state.nav_items.insert(key.to_string(), open);
        open
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let value = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO session_entries (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(self.db.sqlite())
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM session_entries WHERE key = ?1")
            .bind(key)
            .execute(self.db.sqlite())
            .await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: &str) -> Option<T> {
    match serde_json::from_str(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Discarding unreadable session entry {}: {}", key, e);
            None
        }
    }
}
