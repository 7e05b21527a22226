use crate::errors::RegistryError;

use super::db::DbHandle;
use super::models::JobRecord;
use super::signature;

/// Write-once store of job registrations.
///
/// `register` is the only place a signing secret is ever minted; the secret
/// is returned exactly once in the resulting [`JobRecord`] and afterwards
/// only used internally for signing and verification.
#[derive(Clone)]
pub struct JobRegistry {
    db: DbHandle,
}

impl JobRegistry {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Register a job id with its callback destination and opaque metadata.
    ///
    /// Mints a fresh signing secret for the job. Registrations never
    /// overwrite: a second call for the same id fails with `DuplicateJob`
    /// and leaves the original row untouched.
    pub async fn register(
        &self,
        job_id: &str,
        callback_url: &str,
        metadata: serde_json::Value,
    ) -> Result<JobRecord, RegistryError> {
        if job_id.trim().is_empty() {
            return Err(RegistryError::BadRequest(
                "jobId must not be empty".to_string(),
            ));
        }
        if !callback_url.starts_with("http://") && !callback_url.starts_with("https://") {
            return Err(RegistryError::BadRequest(format!(
                "callbackUrl must be an http(s) URL, got '{}'",
                callback_url
            )));
        }

        let secret = signature::generate_signing_secret();
        let id = job_id.to_string();
        let url = callback_url.to_string();
        let inserted = self
            .db
            .call(move |db| db.insert_job(&id, &url, Some(&secret), &metadata))
            .await?;

        inserted.ok_or_else(|| RegistryError::DuplicateJob {
            job_id: job_id.to_string(),
        })
    }

    /// Look up a registration by job id.
    pub async fn lookup(&self, job_id: &str) -> Result<JobRecord, RegistryError> {
        let id = job_id.to_string();
        let found = self.db.call(move |db| db.get_job(&id)).await?;
        found.ok_or_else(|| RegistryError::JobNotFound {
            job_id: job_id.to_string(),
        })
    }
}
