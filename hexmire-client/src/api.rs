//! REST API client for the content server.
//!
//! Thin typed wrapper over reqwest. Every read appends a cache-busting
//! timestamp query parameter and disables HTTP caching, so the browser or
//! any intermediary proxy never serves stale generator output; the offline
//! cache in `hexmire-store` is the only cache layer we trust.
//!
//! Non-2xx responses always surface as [`ApiError::Status`] with the HTTP
//! status embedded. The UI layer is the single place that converts these
//! into user-visible messages.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use hexmire_core::{HexCode, Language, OverlayGrid, OverlayHexDetail, OverlayIndex, VersionStamp};

use crate::config::ClientConfig;

/// Response header carrying the server's content generation stamp.
const VERSION_HEADER: &str = "x-content-version";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// One hex worth of generated content, as served by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HexResponse {
    pub hex: String,
    pub content: String,
}

/// The exported content archive plus the version stamp it was cut at.
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub bytes: Vec<u8>,
    pub version: Option<VersionStamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LanguagePayload {
    language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoreOverview {
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateHexRequest {
    hex: String,
}

/// Typed client for the content server's REST endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    // ------------------------------------------------------------------
    // World hexes
    // ------------------------------------------------------------------

    pub async fn get_hex(&self, hex: HexCode) -> Result<HexResponse, ApiError> {
        self.get_json(&format!("/api/hex/{hex}")).await
    }

    pub async fn generate_hex(&self, hex: HexCode) -> Result<HexResponse, ApiError> {
        self.post_json(
            "/api/generate-hex",
            Some(&GenerateHexRequest {
                hex: hex.to_string(),
            }),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Language
    // ------------------------------------------------------------------

    pub async fn get_language(&self) -> Result<Language, ApiError> {
        let payload: LanguagePayload = self.get_json("/api/set-language").await?;
        Ok(payload.language)
    }

    pub async fn set_language(&self, language: &Language) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json(
                "/api/set-language",
                Some(&LanguagePayload {
                    language: language.clone(),
                }),
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // World-level operations
    // ------------------------------------------------------------------

    pub async fn reset_continent(&self) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json::<serde_json::Value, ()>("/api/reset-continent", None)
            .await?;
        Ok(())
    }

    pub async fn lore_overview(&self) -> Result<String, ApiError> {
        let overview: LoreOverview = self.get_json("/api/lore-overview").await?;
        Ok(overview.content)
    }

    /// Upload a previously exported archive.
    pub async fn import_archive(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let url = format!("{}/api/import", self.base_url);
        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Download the full content archive (gzip tar, one markdown document
    /// per hex) together with the version stamp it was cut at.
    pub async fn export_archive(&self) -> Result<ExportArchive, ApiError> {
        let response = self
            .read_request("/api/export")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let version = version_from_headers(response.headers());
        let bytes = response.bytes().await?.to_vec();
        Ok(ExportArchive { bytes, version })
    }

    /// Advertised content generation, read from the export endpoint's
    /// headers without downloading the body.
    pub async fn server_version(&self) -> Result<Option<VersionStamp>, ApiError> {
        let url = self.read_url("/api/export");
        let response = self
            .client
            .head(url)
            .headers(no_cache_headers())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(version_from_headers(response.headers()))
    }

    // ------------------------------------------------------------------
    // City overlays
    // ------------------------------------------------------------------

    pub async fn list_city_overlays(&self) -> Result<OverlayIndex, ApiError> {
        let overlays: Vec<String> = self.get_json("/api/city-overlays").await?;
        Ok(OverlayIndex { overlays })
    }

    pub async fn get_city_overlay(&self, name: &str) -> Result<OverlayGrid, ApiError> {
        let grid: serde_json::Value = self
            .get_json(&format!("/api/city-overlay/{name}"))
            .await?;
        Ok(OverlayGrid {
            name: name.to_string(),
            grid,
        })
    }

    /// ASCII rendering of an overlay grid, served as plain text.
    pub async fn get_city_overlay_ascii(&self, name: &str) -> Result<String, ApiError> {
        let response = self
            .read_request(&format!("/api/city-overlay/{name}/ascii"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.text().await?)
    }

    pub async fn get_city_overlay_hex(
        &self,
        name: &str,
        hex_id: &str,
    ) -> Result<OverlayHexDetail, ApiError> {
        let detail: serde_json::Value = self
            .get_json(&format!("/api/city-overlay/{name}/hex/{hex_id}"))
            .await?;
        Ok(OverlayHexDetail {
            overlay: name.to_string(),
            hex_id: hex_id.to_string(),
            detail,
        })
    }

    pub async fn get_city_context(&self, name: &str) -> Result<serde_json::Value, ApiError> {
        self.get_json(&format!("/api/city-context/{name}")).await
    }

    pub async fn get_district(
        &self,
        overlay: &str,
        district: &str,
    ) -> Result<serde_json::Value, ApiError> {
        self.get_json(&format!("/api/city-overlay/{overlay}/district/{district}"))
            .await
    }

    pub async fn set_district(
        &self,
        overlay: &str,
        district: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.post_json(
            &format!("/api/city-overlay/{overlay}/district/{district}"),
            Some(body),
        )
        .await
    }

    pub async fn regenerate_overlay_hex(
        &self,
        overlay: &str,
        hex_id: &str,
    ) -> Result<OverlayHexDetail, ApiError> {
        let detail: serde_json::Value = self
            .post_json::<serde_json::Value, ()>(
                &format!("/api/regenerate-hex/{overlay}/{hex_id}"),
                None,
            )
            .await?;
        Ok(OverlayHexDetail {
            overlay: overlay.to_string(),
            hex_id: hex_id.to_string(),
            detail,
        })
    }

    pub async fn regenerate_overlay(&self, overlay: &str) -> Result<serde_json::Value, ApiError> {
        self.post_json::<serde_json::Value, ()>(&format!("/api/regenerate-overlay/{overlay}"), None)
            .await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Read URL with the cache-busting timestamp appended.
    fn read_url(&self, path: &str) -> String {
        let stamp = Utc::now().timestamp_millis();
        let joiner = if path.contains('?') { '&' } else { '?' };
        format!("{}{}{}t={}", self.base_url, path, joiner, stamp)
    }

    fn read_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.read_url(path)).headers(no_cache_headers())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.read_request(path).send().await?;
        parse_json_response(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        parse_json_response(response).await
    }
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

fn version_from_headers(headers: &HeaderMap) -> Option<VersionStamp> {
    headers
        .get(VERSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| VersionStamp(value.to_string()))
}

async fn parse_json_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}
