//! Backblaze B2 storage over the native v2 API.
//!
//! Uploads authorize once per batch (`open_session`), then request one upload
//! URL per object. Reads and deletes authorize per call.

use crate::keys;
use crate::traits::{ByteStream, ObjectRef, Storage, StorageError, StorageResult, StorageSession};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use fleetdocs_core::B2Config;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeAccountResponse {
    authorization_token: String,
    api_url: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
    authorization_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileVersion {
    file_id: String,
    file_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFileNamesResponse {
    files: Vec<FileVersion>,
}

/// Validated credentials borrowed from the configuration.
struct Credentials<'a> {
    key_id: &'a str,
    application_key: &'a str,
    bucket_id: &'a str,
    bucket_name: &'a str,
}

/// Backblaze B2 storage implementation
///
/// Holds one `reqwest::Client` for the whole process.
pub struct B2Storage {
    client: Client,
    config: B2Config,
}

impl B2Storage {
    pub fn new(config: B2Config) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create B2 client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn credentials(&self) -> StorageResult<Credentials<'_>> {
        fn required<'a>(value: &'a Option<String>, name: &str) -> StorageResult<&'a str> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StorageError::MissingConfiguration(name.to_string()))
        }

        Ok(Credentials {
            key_id: required(&self.config.key_id, "B2_KEY_ID")?,
            application_key: required(&self.config.application_key, "B2_APPLICATION_KEY")?,
            bucket_id: required(&self.config.bucket_id, "B2_BUCKET_ID")?,
            bucket_name: required(&self.config.bucket_name, "B2_BUCKET_NAME")?,
        })
    }

    async fn authorize(&self, credentials: &Credentials<'_>) -> StorageResult<AuthorizeAccountResponse> {
        let start = std::time::Instant::now();
        let url = format!("{}/b2api/v2/b2_authorize_account", self.config.api_url);

        let response = self
            .client
            .get(&url)
            .basic_auth(credentials.key_id, Some(credentials.application_key))
            .send()
            .await
            .map_err(|e| StorageError::BackendError(format!("B2 authorization failed: {}", e)))?;

        let response = ensure_success(response, "authorization", StorageError::BackendError).await?;
        let authorization: AuthorizeAccountResponse = response.json().await.map_err(|e| {
            StorageError::BackendError(format!("Failed to parse B2 authorization: {}", e))
        })?;

        tracing::debug!(
            api_url = %authorization.api_url,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "B2 account authorized"
        );

        Ok(authorization)
    }

    /// Resolves the id of the latest version of `key` when the caller only has the name.
    async fn resolve_file_id(
        &self,
        authorization: &AuthorizeAccountResponse,
        bucket_id: &str,
        object: &ObjectRef,
    ) -> StorageResult<String> {
        if let Some(ref file_id) = object.file_id {
            return Ok(file_id.clone());
        }

        let response = self
            .client
            .post(format!("{}/b2api/v2/b2_list_file_names", authorization.api_url))
            .header("Authorization", &authorization.authorization_token)
            .json(&json!({
                "bucketId": bucket_id,
                "startFileName": object.key,
                "maxFileCount": 1,
            }))
            .send()
            .await
            .map_err(|e| StorageError::BackendError(format!("B2 file lookup failed: {}", e)))?;

        let response = ensure_success(response, "file lookup", StorageError::BackendError).await?;
        let listing: ListFileNamesResponse = response.json().await.map_err(|e| {
            StorageError::BackendError(format!("Failed to parse B2 file listing: {}", e))
        })?;

        listing
            .files
            .into_iter()
            .find(|file| file.file_name == object.key)
            .map(|file| file.file_id)
            .ok_or_else(|| StorageError::NotFound(object.key.clone()))
    }
}

#[async_trait]
impl Storage for B2Storage {
    async fn open_session(&self) -> StorageResult<Arc<dyn StorageSession>> {
        let credentials = self.credentials()?;
        let authorization = self.authorize(&credentials).await?;

        Ok(Arc::new(B2Session {
            client: self.client.clone(),
            bucket_id: credentials.bucket_id.to_string(),
            bucket_name: credentials.bucket_name.to_string(),
            authorization,
        }))
    }

    async fn read_object(&self, object: &ObjectRef) -> StorageResult<ByteStream> {
        let credentials = self.credentials()?;
        let authorization = self.authorize(&credentials).await?;
        let file_id = self
            .resolve_file_id(&authorization, credentials.bucket_id, object)
            .await?;

        let response = self
            .client
            .get(format!(
                "{}/b2api/v2/b2_download_file_by_id",
                authorization.download_url
            ))
            .query(&[("fileId", file_id.as_str())])
            .header("Authorization", &authorization.authorization_token)
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("B2 download failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(object.key.clone()));
        }
        let response = ensure_success(response, "download", StorageError::DownloadFailed).await?;

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }

    async fn delete_object(&self, object: &ObjectRef) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let credentials = self.credentials()?;
        let authorization = self.authorize(&credentials).await?;
        let file_id = self
            .resolve_file_id(&authorization, credentials.bucket_id, object)
            .await?;

        let response = self
            .client
            .post(format!("{}/b2api/v2/b2_get_file_info", authorization.api_url))
            .header("Authorization", &authorization.authorization_token)
            .json(&json!({ "fileId": file_id }))
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(format!("B2 file info failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(object.key.clone()));
        }
        let response = ensure_success(response, "file info", StorageError::DeleteFailed).await?;
        let info: FileVersion = response.json().await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to parse B2 file info: {}", e))
        })?;

        let response = self
            .client
            .post(format!(
                "{}/b2api/v2/b2_delete_file_version",
                authorization.api_url
            ))
            .header("Authorization", &authorization.authorization_token)
            .json(&json!({ "fileName": info.file_name, "fileId": info.file_id }))
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(format!("B2 delete failed: {}", e)))?;
        ensure_success(response, "delete", StorageError::DeleteFailed).await?;

        tracing::info!(
            key = %object.key,
            file_id = %info.file_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "B2 delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::B2
    }
}

/// Authorized B2 account bound to one bucket, shared by a batch.
struct B2Session {
    client: Client,
    bucket_id: String,
    bucket_name: String,
    authorization: AuthorizeAccountResponse,
}

impl B2Session {
    async fn get_upload_url(&self) -> StorageResult<UploadUrlResponse> {
        let response = self
            .client
            .post(format!(
                "{}/b2api/v2/b2_get_upload_url",
                self.authorization.api_url
            ))
            .header("Authorization", &self.authorization.authorization_token)
            .json(&json!({ "bucketId": self.bucket_id }))
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("B2 get upload url failed: {}", e)))?;

        let response = ensure_success(response, "get upload url", StorageError::UploadFailed).await?;
        response.json().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to parse B2 upload url: {}", e))
        })
    }
}

#[async_trait]
impl StorageSession for B2Session {
    async fn write_object(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<ObjectRef> {
        keys::validate_key(key)?;
        let start = std::time::Instant::now();
        let size = data.len();
        let sha1 = hex::encode(Sha1::digest(&data));

        let target = self.get_upload_url().await?;

        let response = self
            .client
            .post(&target.upload_url)
            .header("Authorization", &target.authorization_token)
            .header("X-Bz-File-Name", keys::encode_key(key))
            .header("Content-Type", content_type)
            .header("X-Bz-Content-Sha1", sha1)
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("B2 upload failed: {}", e)))?;

        let response = ensure_success(response, "upload", StorageError::UploadFailed).await?;
        let uploaded: FileVersion = response.json().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to parse B2 upload response: {}", e))
        })?;

        tracing::info!(
            key = %key,
            file_id = %uploaded.file_id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "B2 upload successful"
        );

        Ok(ObjectRef::with_file_id(uploaded.file_name, uploaded.file_id))
    }

    /// `{downloadUrl}/file/{bucket}/{key}` with each key segment percent-encoded,
    /// so names with spaces or reserved characters still form a valid URL.
    /// Generated names are URL-safe and come out unchanged.
    fn public_url(&self, object: &ObjectRef) -> String {
        format!(
            "{}/file/{}/{}",
            self.authorization.download_url,
            self.bucket_name,
            keys::encode_key(&object.key)
        )
    }
}

async fn ensure_success(
    response: Response,
    operation: &str,
    error: fn(String) -> StorageError,
) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(error(format!(
        "B2 {} failed: {} - {}",
        operation, status, error_text
    )))
}
