//! # Credential Subcommands
//!
//! Password hashing and token minting, using the same argon2 parameters
//! and claim layout as the API service so the output can be loaded into
//! the `users` table or sent as a bearer token directly.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use zeroize::Zeroizing;

use nomina_api::auth::{self, Claims, JwtSecret};
use nomina_core::Scope;

/// Arguments for `nomina hash-password`.
#[derive(Args, Debug)]
pub struct HashPasswordArgs {
    /// Password to hash.
    #[arg(value_name = "PASSWORD")]
    pub password: String,
}

/// Arguments for `nomina token`.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// HS256 secret the API is configured with (`NOMINA_JWT_SECRET`).
    #[arg(long, env = "NOMINA_JWT_SECRET", hide_env_values = true)]
    pub secret: String,
    /// Username (`sub` claim).
    #[arg(long)]
    pub username: String,
    /// User id (`uid` claim). Must match the stored user.
    #[arg(long)]
    pub user_id: i64,
    /// Display name (default: the username).
    #[arg(long)]
    pub name: Option<String>,
    /// Granted scope. Repeat for several.
    #[arg(long = "scope", value_name = "SCOPE")]
    pub scopes: Vec<String>,
    /// Token lifetime in minutes.
    #[arg(long, default_value_t = 20)]
    pub ttl_minutes: i64,
}

/// Execute `nomina hash-password`.
pub fn run_hash_password(args: &HashPasswordArgs) -> Result<u8> {
    let phc = hash(&args.password)?;
    println!("{phc}");
    Ok(0)
}

fn hash(password: &str) -> Result<String> {
    if password.is_empty() {
        bail!("password must not be empty");
    }
    let password = Zeroizing::new(password.to_string());
    auth::hash_password(&password).map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))
}

/// Execute `nomina token`.
pub fn run_token(args: &TokenArgs) -> Result<u8> {
    let token = mint(args)?;
    println!("{token}");
    Ok(0)
}

fn mint(args: &TokenArgs) -> Result<String> {
    if args.secret.is_empty() {
        bail!("secret must not be empty");
    }
    if !(1..=auth::MAX_TOKEN_TTL_MINUTES).contains(&args.ttl_minutes) {
        bail!(
            "ttl must be between 1 and {} minutes, got {}",
            auth::MAX_TOKEN_TTL_MINUTES,
            args.ttl_minutes
        );
    }
    for scope in &args.scopes {
        Scope::new(scope.as_str()).with_context(|| format!("invalid scope {scope:?}"))?;
    }

    let secret = JwtSecret::new(args.secret.as_bytes().to_vec());
    let claims = Claims::new(
        args.user_id,
        args.username.as_str(),
        args.name.as_deref().unwrap_or(&args.username),
        args.scopes.clone(),
        Utc::now(),
        args.ttl_minutes,
    );
    tracing::debug!(uid = claims.uid, exp = claims.exp, "minting token");
    auth::issue_token(&secret, &claims).context("failed to sign token")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_args(scopes: &[&str]) -> TokenArgs {
        TokenArgs {
            secret: "s".repeat(32),
            username: "admin".into(),
            user_id: 1,
            name: None,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            ttl_minutes: 20,
        }
    }

    #[test]
    fn hash_verifies() {
        let phc = hash("hunter2").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(auth::verify_password("hunter2", &phc));
        assert!(!auth::verify_password("hunter3", &phc));
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(hash("").is_err());
    }

    #[test]
    fn minted_token_decodes_with_same_secret() {
        let args = token_args(&["Admin", "employees:read"]);
        let token = mint(&args).unwrap();
        let claims = auth::decode_token(&JwtSecret::new(args.secret.as_bytes().to_vec()), &token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.name, "admin");
        assert_eq!(claims.uid, 1);
        assert_eq!(claims.scopes, vec!["Admin".to_string(), "employees:read".to_string()]);
        assert!(auth::decode_token(&JwtSecret::new(b"other".to_vec()), &token).is_err());
    }

    #[test]
    fn bad_scope_is_rejected() {
        assert!(mint(&token_args(&["not a scope"])).is_err());
    }

    #[test]
    fn out_of_range_ttl_is_rejected() {
        let mut args = token_args(&[]);
        for ttl in [0, -1, auth::MAX_TOKEN_TTL_MINUTES + 1, i64::MAX] {
            args.ttl_minutes = ttl;
            assert!(mint(&args).is_err(), "ttl {ttl}");
        }
    }
}
