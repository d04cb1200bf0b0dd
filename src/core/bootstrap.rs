use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::services::users::NewUser;

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let login = &admin.first_superuser_login;

    if let Some(mut user) = state.store().find_user_by_login(login).await? {
        let mut needs_update = false;
        let verified =
            security::verify_password(&admin.first_superuser_password, &user.hashed_password)
                .unwrap_or(false);
        if !verified {
            user.hashed_password = security::hash_password(&admin.first_superuser_password)?;
            needs_update = true;
        }
        if !user.is_admin {
            user.is_admin = true;
            needs_update = true;
        }
        if !user.is_active {
            user.is_active = true;
            needs_update = true;
        }

        if needs_update {
            user.updated_at = primitive_now_utc();
            state.store().update_user(&user).await?;
            tracing::info!("Updated default superuser {login}");
        } else {
            tracing::info!("Default superuser already up to date");
        }
        return Ok(());
    }

    state
        .users()
        .register(NewUser {
            login: login.clone(),
            password: admin.first_superuser_password.clone(),
            full_name: "Super Admin".to_string(),
            email: None,
            is_admin: true,
        })
        .await?;

    tracing::info!("Created default superuser {login}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::config::Settings;
    use crate::repositories::InMemoryStore;
    use crate::test_support::{self, MemoryBlobStore, RecordingSink};

    fn bootstrap_state(password: Option<&str>) -> AppState {
        test_support::set_test_env();
        std::env::set_var("FIRST_SUPERUSER_LOGIN", "root");
        if let Some(password) = password {
            std::env::set_var("FIRST_SUPERUSER_PASSWORD", password);
        }
        let settings = Settings::load().expect("settings");
        std::env::remove_var("FIRST_SUPERUSER_LOGIN");
        std::env::remove_var("FIRST_SUPERUSER_PASSWORD");

        AppState::new(
            settings,
            Arc::new(InMemoryStore::new()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(RecordingSink::new()),
        )
    }

    #[tokio::test]
    async fn creates_then_repairs_the_superuser() {
        let _guard = test_support::env_lock().await;
        let state = bootstrap_state(Some("root-pass"));

        ensure_superuser(&state).await.expect("create superuser");
        let mut root = state.store().find_user_by_login("root").await.unwrap().unwrap();
        assert!(root.is_admin);
        assert!(root.is_active);

        root.is_admin = false;
        root.is_active = false;
        root.hashed_password = security::hash_password("stale").unwrap();
        assert!(state.store().update_user(&root).await.unwrap());

        ensure_superuser(&state).await.expect("repair superuser");
        let root = state.store().find_user_by_login("root").await.unwrap().unwrap();
        assert!(root.is_admin);
        assert!(root.is_active);
        assert!(security::verify_password("root-pass", &root.hashed_password).unwrap());
        assert_eq!(state.store().list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn skips_without_a_password() {
        let _guard = test_support::env_lock().await;
        let state = bootstrap_state(None);

        ensure_superuser(&state).await.expect("skip");
        assert!(state.store().list_users().await.unwrap().is_empty());
    }
}
