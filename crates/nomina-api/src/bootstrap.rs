//! # Startup Bootstrap
//!
//! Seeds the administrator account named by `NOMINA_ADMIN_USERNAME` and
//! `NOMINA_ADMIN_PASSWORD` so a fresh deployment can issue its first
//! token. An existing user with that name is left untouched.

use chrono::Utc;
use nomina_core::ADMIN_SCOPE;
use zeroize::Zeroizing;

use crate::auth;
use crate::state::{AppState, UserRecord};

/// Errors during bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Only one of the admin username and password was configured.
    #[error("NOMINA_ADMIN_USERNAME and NOMINA_ADMIN_PASSWORD must be set together")]
    IncompleteAdmin,

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),

    /// The seeded user could not be written to the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Create the configured admin user if it does not exist yet.
///
/// Returns the id of the user created, if any. Call after
/// [`AppState::hydrate_from_db`] so existing users are visible.
pub async fn seed_admin(state: &AppState) -> Result<Option<i64>, BootstrapError> {
    let (username, password) = match (
        state.config.admin_username.clone(),
        state.config.admin_password.clone(),
    ) {
        (Some(u), Some(p)) => (u, p),
        (None, None) => return Ok(None),
        _ => return Err(BootstrapError::IncompleteAdmin),
    };

    if state.users.any(|u| u.username.eq_ignore_ascii_case(&username)) {
        tracing::debug!(username = %username, "admin user already present");
        return Ok(None);
    }

    let password_hash = hash(password).await?;
    let record = state.users.insert_with(|id| UserRecord {
        id,
        username: username.clone(),
        name: username.clone(),
        password_hash,
        scopes: vec![ADMIN_SCOPE.to_string()],
        active: true,
        created_on: Utc::now(),
    });

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::save(pool, &record).await {
            state.users.remove(record.id);
            return Err(e.into());
        }
    }

    tracing::info!(user_id = record.id, username = %username, "admin user created");
    Ok(Some(record.id))
}

async fn hash(password: Zeroizing<String>) -> Result<String, BootstrapError> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| BootstrapError::Hash(e.to_string()))?
        .map_err(|e| BootstrapError::Hash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;

    fn state_with(username: Option<&str>, password: Option<&str>) -> AppState {
        let config = AppConfig {
            admin_username: username.map(str::to_string),
            admin_password: password.map(|p| Zeroizing::new(p.to_string())),
            ..AppConfig::default()
        };
        AppState::with_config(config, None)
    }

    #[tokio::test]
    async fn seeds_admin_once() {
        let state = state_with(Some("root"), Some("s3cret"));
        let id = seed_admin(&state).await.unwrap().unwrap();
        let user = state.users.get(id).unwrap();
        assert_eq!(user.scopes, vec!["Admin".to_string()]);
        assert!(auth::verify_password("s3cret", &user.password_hash));

        assert_eq!(seed_admin(&state).await.unwrap(), None);
        assert_eq!(state.users.len(), 1);
    }

    #[tokio::test]
    async fn nothing_configured_is_a_no_op() {
        let state = state_with(None, None);
        assert_eq!(seed_admin(&state).await.unwrap(), None);
        assert!(state.users.is_empty());
    }

    #[tokio::test]
    async fn username_without_password_is_rejected() {
        let state = state_with(Some("root"), None);
        assert!(matches!(
            seed_admin(&state).await,
            Err(BootstrapError::IncompleteAdmin)
        ));
    }
}
