#![forbid(unsafe_code)]

use crate::config::Config;
use crate::error::TaskDbError;
use std::path::PathBuf;
use td_storage::{AwsCredentials, SyncTarget};
use uuid::Uuid;

/// Picks the sync backend from `sync.*` settings.
///
/// Every required setting is checked here, before the engine is called.
pub fn sync_target(config: &Config) -> Result<SyncTarget, TaskDbError> {
    let origin = config.get("sync.server.origin");
    let url = config.get("sync.server.url");
    let server_dir = config.get("sync.local.server_dir");
    let aws_bucket = config.get("sync.aws.bucket");
    let gcp_bucket = config.get("sync.gcp.bucket");
    let encryption_secret = config.get("sync.encryption_secret");

    let server_url = if url.is_empty() { origin } else { url };
    if !origin.is_empty() {
        tracing::warn!("sync.server.origin is deprecated. Use sync.server.url instead.");
    }

    if !server_dir.is_empty() {
        return Ok(SyncTarget::Local {
            server_dir: PathBuf::from(server_dir),
        });
    }

    if !aws_bucket.is_empty() {
        let region = config.get("sync.aws.region");
        if region.is_empty() {
            return Err(configuration("sync.aws.region is required"));
        }
        if encryption_secret.is_empty() {
            return Err(configuration("sync.encryption_secret is required"));
        }

        let profile = config.get("sync.aws.profile");
        let access_key_id = config.get("sync.aws.access_key_id");
        let secret_access_key = config.get("sync.aws.secret_access_key");
        let using_profile = !profile.is_empty();
        let using_keys = !access_key_id.is_empty() || !secret_access_key.is_empty();
        let using_default = !config.get("sync.aws.default_credentials").is_empty();

        let methods = [using_profile, using_keys, using_default]
            .iter()
            .filter(|used| **used)
            .count();
        if methods != 1 {
            return Err(configuration(
                "exactly one method of specifying AWS credentials is required",
            ));
        }

        let credentials = if using_profile {
            AwsCredentials::Profile(profile.to_string())
        } else if using_keys {
            AwsCredentials::AccessKey {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
            }
        } else {
            AwsCredentials::Default
        };

        return Ok(SyncTarget::Aws {
            region: region.to_string(),
            bucket: aws_bucket.to_string(),
            credentials,
            encryption_secret: encryption_secret.to_string(),
        });
    }

    if !gcp_bucket.is_empty() {
        if encryption_secret.is_empty() {
            return Err(configuration("sync.encryption_secret is required"));
        }
        let credential_path = config.get("sync.gcp.credential_path");
        return Ok(SyncTarget::Gcp {
            bucket: gcp_bucket.to_string(),
            credential_path: (!credential_path.is_empty()).then(|| credential_path.to_string()),
            encryption_secret: encryption_secret.to_string(),
        });
    }

    if !server_url.is_empty() {
        let client_id = config.get("sync.server.client_id");
        if client_id.is_empty() || encryption_secret.is_empty() {
            return Err(configuration(
                "sync.server.client_id and sync.encryption_secret are required",
            ));
        }
        let client_id = Uuid::try_parse(client_id).map_err(|_| {
            configuration(&format!("sync.server.client_id {client_id:?} is not a uuid"))
        })?;
        return Ok(SyncTarget::Remote {
            url: server_url.to_string(),
            client_id,
            encryption_secret: encryption_secret.to_string(),
        });
    }

    Err(TaskDbError::NotFound(
        "No sync.* settings are configured. See task-sync(5).".to_string(),
    ))
}

fn configuration(message: &str) -> TaskDbError {
    TaskDbError::Configuration(message.to_string())
}
