//! Minimal credential cache for the `login`/`logout` verbs.
//!
//! The engine's backends each resolve their own credentials from the
//! environment or ambient provider chains (see `backend/config.rs`); this
//! module only satisfies the CLI contract that `login` caches a token for
//! later commands and `logout` forgets it, mirroring a `GetToken`/
//! `RefreshOnChallenge` credential capability with a token cached per process.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dialoguer::Password;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    token: String,
    obtained_at: DateTime<Utc>,
}

fn credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".conveyor")
        .join("credentials.json")
}

pub async fn login() -> Result<u8> {
    let token = Password::new()
        .with_prompt("Token")
        .interact()
        .context("failed to read token")?;

    let credential = StoredCredential {
        token,
        obtained_at: Utc::now(),
    };

    let path = credentials_path();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.context("failed to create the credentials directory")?;
    }
    let contents = serde_json::to_string_pretty(&credential)?;
    tokio::fs::write(&path, contents).await.context("failed to write the credentials file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(&path, perms);
    }

    println!("login succeeded; credential cached at {}", path.display());
    Ok(0)
}

/// Reads back the token cached by `login`, if any. Used to seed the
/// engine's `CredentialProvider` so a scheduler run can attempt a refresh
/// on an auth challenge instead of treating every failure as final.
pub async fn load_cached_token() -> Option<String> {
    let path = credentials_path();
    let contents = tokio::fs::read_to_string(&path).await.ok()?;
    let credential: StoredCredential = serde_json::from_str(&contents).ok()?;
    Some(credential.token)
}

pub async fn logout() -> Result<u8> {
    let path = credentials_path();
    match tokio::fs::remove_file(&path).await {
        Ok(()) => println!("logged out"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => println!("already logged out"),
        Err(e) => return Err(e).context("failed to remove the cached credential"),
    }
    Ok(0)
}
