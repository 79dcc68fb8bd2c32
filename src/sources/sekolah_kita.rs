//! Sekolah Kita directory backend (sekolah.data.kemendikdasmen.go.id).

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::config::{ApiConfig, Config};
use crate::models::{PageRequest, PageResponse};
use crate::sources::{RequestError, SchoolDirectory};
use crate::utils::RateLimitedClient;

const LISTING_PATH: &str = "/v1/sekolah-service/sekolah/cari-sekolah";
const DETAIL_PATH: &str = "/v1/sekolah-service/sekolah/full-detail";

/// Sekolah Kita REST API
///
/// Listing pages are `POST`ed to the search endpoint; details are fetched with
/// a path-parameterized `GET`.
#[derive(Debug, Clone)]
pub struct SekolahKitaApi {
    client: RateLimitedClient,
    listing_url: Url,
    detail_base: Url,
    listing_timeout: Duration,
    detail_timeout: Duration,
}

impl SekolahKitaApi {
    /// Create a backend over an existing client
    pub fn new(client: RateLimitedClient, api: &ApiConfig) -> Result<Self, RequestError> {
        let base = Url::parse(&api.base_url)?;
        Ok(Self {
            client,
            listing_url: base.join(LISTING_PATH)?,
            detail_base: base.join(&format!("{}/", DETAIL_PATH))?,
            listing_timeout: api.listing_timeout(),
            detail_timeout: api.detail_timeout(),
        })
    }

    /// Create a backend and its client from application configuration
    pub fn from_config(config: &Config) -> Result<Self, RequestError> {
        let client = RateLimitedClient::new(
            &config.api.user_agent,
            config.rate_limit.clone(),
            config.retry,
        )?;
        Self::new(client, &config.api)
    }

    fn detail_url(&self, school_id: &str) -> Result<Url, RequestError> {
        let encoded = urlencoding::encode(school_id.trim());
        Ok(self.detail_base.join(&encoded)?)
    }
}

#[async_trait]
impl SchoolDirectory for SekolahKitaApi {
    fn name(&self) -> &str {
        "Sekolah Kita"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, RequestError> {
        let body = serde_json::to_value(request)?;
        let value = self
            .client
            .post_json(self.listing_url.as_str(), &body, self.listing_timeout)
            .await?;

        let page: PageResponse = serde_json::from_value(value)?;
        tracing::debug!(
            "Page {} (size {}): {} records, reported total {:?}",
            request.page,
            request.size,
            page.data.len(),
            page.total
        );
        Ok(page)
    }

    async fn fetch_detail(&self, school_id: &str) -> Result<serde_json::Value, RequestError> {
        let url = self.detail_url(school_id)?;
        self.client.get_json(url.as_str(), self.detail_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::models::ListingFilter;
    use crate::utils::RetryConfig;
    use mockito::Matcher;
    use serde_json::json;

    fn api_for(server_url: &str) -> SekolahKitaApi {
        let client = RateLimitedClient::new(
            "sekolah-export-test",
            RateLimitConfig::disabled(),
            RetryConfig::immediate(2),
        )
        .unwrap();
        let api = ApiConfig {
            base_url: server_url.to_string(),
            ..Default::default()
        };
        SekolahKitaApi::new(client, &api).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_posts_filter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", LISTING_PATH)
            .match_body(Matcher::PartialJson(json!({
                "page": 1,
                "size": 3,
                "kabupaten_kota": "Kota Bandung",
                "bentuk_pendidikan": "TK,KB"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "total": 7,
                    "data": [
                        {"sekolah_id": "s4", "nama": "TK Empat", "bentuk_pendidikan": "TK"},
                        {"sekolah_id": "s5", "nama": "KB Lima", "bentuk_pendidikan": "KB"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let api = api_for(&server.url());
        let filter = ListingFilter::unfiltered()
            .region("Kota Bandung")
            .category("TK,KB");
        let page = api
            .fetch_page(&PageRequest::new(1, 3, &filter))
            .await
            .unwrap();

        assert_eq!(page.total, Some(7));
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].identifier(), Some("s4"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_page_unexpected_shape() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", LISTING_PATH)
            .with_status(200)
            .with_body(r#"{"total": "many", "data": 5}"#)
            .create_async()
            .await;

        let api = api_for(&server.url());
        let result = api
            .fetch_page(&PageRequest::new(0, 10, &ListingFilter::default()))
            .await;
        assert!(matches!(result, Err(RequestError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fetch_detail_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", format!("{}/ABC-123", DETAIL_PATH).as_str())
            .with_status(200)
            .with_body(r#"{"data": {"sekolah": [{"nomor_telepon": "022-555"}]}}"#)
            .create_async()
            .await;

        let api = api_for(&server.url());
        let detail = api.fetch_detail("ABC-123").await.unwrap();

        assert_eq!(detail["data"]["sekolah"][0]["nomor_telepon"], "022-555");
        mock.assert_async().await;
    }

    #[test]
    fn test_detail_url_encodes_id() {
        let api = api_for("https://example.org");
        let url = api.detail_url("a b/c").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.org/v1/sekolah-service/sekolah/full-detail/a%20b%2Fc"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let client = RateLimitedClient::new(
            "sekolah-export-test",
            RateLimitConfig::disabled(),
            RetryConfig::immediate(1),
        )
        .unwrap();
        let api = ApiConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            SekolahKitaApi::new(client, &api),
            Err(RequestError::InvalidUrl(_))
        ));
    }
}
