//! Google Docs/Drive mirror. Metadata comes from Drive v3, appends go
//! through the Docs v1 batchUpdate endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use super::{DocMeta, DocMirror, MirrorError};

const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";
const DOCS_BASE: &str = "https://docs.googleapis.com/v1";

pub struct GoogleDocsMirror {
    client: reqwest::Client,
    drive_base: String,
    docs_base: String,
}

impl GoogleDocsMirror {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            drive_base: DRIVE_BASE.into(),
            docs_base: DOCS_BASE.into(),
        }
    }

    /// Point at a different API host. Used by tests against a stub server.
    pub fn with_base_urls(client: reqwest::Client, drive_base: &str, docs_base: &str) -> Self {
        Self {
            client,
            drive_base: drive_base.trim_end_matches('/').into(),
            docs_base: docs_base.trim_end_matches('/').into(),
        }
    }
}

/// 401/403 mean the token is unusable; everything else non-2xx is a plain
/// vendor error.
async fn check(res: reqwest::Response) -> Result<reqwest::Response, MirrorError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(MirrorError::ReauthRequired);
    }
    let body = res.text().await.unwrap_or_default();
    Err(MirrorError::Api {
        status: status.as_u16(),
        body: crate::util::truncate_chars(&body, 200),
    })
}

#[derive(Deserialize)]
struct DriveFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "modifiedTime", default)]
    modified_time: Option<String>,
    #[serde(rename = "webViewLink", default)]
    web_view_link: Option<String>,
}

#[derive(Deserialize)]
struct DocBody {
    body: DocContentList,
}

#[derive(Deserialize)]
struct DocContentList {
    content: Vec<DocElement>,
}

#[derive(Deserialize)]
struct DocElement {
    #[serde(rename = "endIndex", default)]
    end_index: Option<i64>,
}

#[async_trait]
impl DocMirror for GoogleDocsMirror {
    async fn fetch_meta(&self, doc_id: &str, access_token: &str) -> Result<DocMeta, MirrorError> {
        let url = format!(
            "{}/files/{doc_id}?fields=name,modifiedTime,webViewLink",
            self.drive_base
        );
        let res = self.client.get(&url).bearer_auth(access_token).send().await?;
        let file: DriveFile = check(res).await?.json().await?;

        let modified_ms = file
            .modified_time
            .as_deref()
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0);

        Ok(DocMeta {
            doc_id: doc_id.to_string(),
            url: file
                .web_view_link
                .unwrap_or_else(|| format!("https://docs.google.com/document/d/{doc_id}/edit")),
            name: file.name.unwrap_or_else(|| "Unknown Document".into()),
            modified_ms,
        })
    }

    async fn append_handoff(
        &self,
        doc_id: &str,
        content: &str,
        access_token: &str,
    ) -> Result<(), MirrorError> {
        // end index of the document body, for the insert location
        let url = format!("{}/documents/{doc_id}", self.docs_base);
        let res = self.client.get(&url).bearer_auth(access_token).send().await?;
        let doc: DocBody = check(res).await?.json().await?;
        let end_index = doc
            .body
            .content
            .last()
            .and_then(|e| e.end_index)
            .ok_or_else(|| MirrorError::BadPayload("document body has no end index".into()))?;

        let url = format!("{}/documents/{doc_id}:batchUpdate", self.docs_base);
        let payload = serde_json::json!({
            "requests": [{
                "insertText": {
                    "location": { "index": end_index - 1 },
                    "text": format!("\n{content}\n"),
                }
            }]
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }
}
