//! Product catalog client.
//!
//! Read-only JSON API (`/products`, `/products/{id}`, `/products/categories`).
//! Responses are cached with `moka` for the configured TTL.

mod cache;
mod types;

pub use types::{CatalogProduct, RawPrice, Rating};

use std::sync::Arc;

use moka::future::Cache;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogConfig;
use cache::CacheValue;

/// Errors that can occur when talking to the catalog API.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the API.
    #[error("catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse JSON response.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Product not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Request path could not be joined onto the base URL.
    #[error("invalid catalog URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

// =============================================================================
// CatalogClient
// =============================================================================

/// Client for the product catalog API.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<String, CacheValue>,
}

impl CatalogClient {
    /// Create a new catalog client.
    #[must_use]
    pub fn new(config: &CatalogConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .build();

        Self {
            inner: Arc::new(CatalogClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                cache,
            }),
        }
    }

    /// GET a path relative to the base URL and return the body text.
    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> Result<String, CatalogError> {
        let mut url = self.inner.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let response = self
            .inner
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CatalogError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(path.to_string()));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Catalog API returned non-success status"
            );
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        Ok(body)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let body = self.fetch(path, query).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse catalog response"
            );
            CatalogError::Parse(e)
        })
    }

    /// Every product in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Vec<CatalogProduct>, CatalogError> {
        let cache_key = "products:all".to_string();

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<CatalogProduct> = self.fetch_json("./products", &[]).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// The first `limit` products, as shown in the home page carousel.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn products_limited(&self, limit: u32) -> Result<Vec<CatalogProduct>, CatalogError> {
        let cache_key = format!("products:limit:{limit}");

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for limited products");
            return Ok(products);
        }

        let products: Vec<CatalogProduct> = self
            .fetch_json("./products", &[("limit", limit.to_string())])
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Products in one category, filtered from the full listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn products_in_category(
        &self,
        category: &str,
    ) -> Result<Vec<CatalogProduct>, CatalogError> {
        let products = self.products().await?;
        Ok(products
            .into_iter()
            .filter(|p| p.in_category(category))
            .collect())
    }

    /// A single product.
    ///
    /// The API answers unknown ids with an empty body or `null`; both map to
    /// [`CatalogError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or the request fails.
    #[instrument(skip(self))]
    pub async fn product(&self, id: &str) -> Result<CatalogProduct, CatalogError> {
        let cache_key = format!("product:{id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let path = format!("./products/{}", encode_segment(id));
        let body = self.fetch(&path, &[]).await?;
        let product = parse_product(&body)?
            .ok_or_else(|| CatalogError::NotFound(format!("Product not found: {id}")))?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// All category names.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<String>, CatalogError> {
        let cache_key = "categories".to_string();

        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<String> = self.fetch_json("./products/categories", &[]).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

/// Decode a single-product body; empty and `null` mean absent.
fn parse_product(body: &str) -> Result<Option<CatalogProduct>, CatalogError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

/// Percent-encode a path segment.
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> CatalogClient {
        CatalogClient::new(&CatalogConfig {
            base_url: Url::parse("https://fakestoreapi.com/").unwrap(),
            cache_ttl: Duration::from_secs(300),
        })
    }

    #[test]
    fn test_parse_product_empty_and_null() {
        assert!(parse_product("").unwrap().is_none());
        assert!(parse_product("  null\n").unwrap().is_none());
        assert!(parse_product("{").is_err());
    }

    #[test]
    fn test_parse_product() {
        let product = parse_product(r#"{"id":7,"title":"Widget","price":9.99}"#)
            .unwrap()
            .unwrap();
        assert_eq!(product.title.as_deref(), Some("Widget"));
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("7"), "7");
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_join_keeps_base_path() {
        let base = Url::parse("http://localhost:8080/api/").unwrap();
        assert_eq!(
            base.join("./products/categories").unwrap().as_str(),
            "http://localhost:8080/api/products/categories"
        );
    }

    #[tokio::test]
    async fn test_cached_products_skip_network() {
        let client = client();
        let cached = vec![CatalogProduct {
            id: Some(shopez_core::ProductId::from(1)),
            category: Some("jewelery".to_string()),
            ..CatalogProduct::default()
        }];
        client
            .inner
            .cache
            .insert("products:all".to_string(), CacheValue::Products(cached.clone()))
            .await;

        assert_eq!(client.products().await.unwrap(), cached);
        assert_eq!(client.products_in_category("jewelery").await.unwrap().len(), 1);
        assert!(client.products_in_category("electronics").await.unwrap().is_empty());
    }

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::NotFound("Product not found: 42".to_string());
        assert_eq!(err.to_string(), "Not found: Product not found: 42");
    }
}
