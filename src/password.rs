//! bcrypt hashing on the blocking pool.

use crate::error::AppError;
use tokio::sync::OnceCell;

pub const BCRYPT_COST: u32 = 10;

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

pub async fn hash_password(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, BCRYPT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("hash task: {}", e)))?
        .map_err(|e| AppError::Internal(format!("hash: {}", e)))
}

/// False for a wrong password and for a stored value that is not a bcrypt hash.
pub async fn verify_password(plain: String, hash: String) -> Result<bool, AppError> {
    let result = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task: {}", e)))?;
    match result {
        Ok(ok) => Ok(ok),
        Err(e) => {
            tracing::warn!(error = %e, "stored password is not a valid bcrypt hash");
            Ok(false)
        }
    }
}

/// Run a full verification against a throwaway hash and report failure, so a missing
/// account takes as long to reject as a wrong password.
pub async fn verify_missing_account(plain: String) -> Result<bool, AppError> {
    let hash = DUMMY_HASH
        .get_or_try_init(|| hash_password("f1db-missing-account".into()))
        .await?
        .clone();
    verify_password(plain, hash).await?;
    Ok(false)
}
