//! Realtime database REST client.
//!
//! Point operations are plain REST calls on `<base>/carts/{uid}/items/{pid}.json`.
//! Subscriptions open a streaming GET (`Accept: text/event-stream`) on the
//! `items` node and keep a JSON mirror of it, publishing a decoded [`Cart`]
//! after every `put` or `patch`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use shopez_core::{Cart, CartItem, ProductId, UserId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::events::{
    EventParser, RealtimeEvent, apply_patch, apply_put, cart_from_value, item_from_value,
};
use super::{CartStore, CartSubscription, StoreError};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Supplies the ID token appended to every request as `?auth=`.
///
/// Called once per request, so implementations can refresh expired tokens.
#[async_trait]
pub trait AccessToken: Send + Sync {
    /// Current ID token, `None` when signed out.
    async fn access_token(&self) -> Option<SecretString>;
}

/// Cart store backed by the hosted realtime database.
#[derive(Clone)]
pub struct RealtimeDbStore {
    inner: Arc<RealtimeDbStoreInner>,
}

struct RealtimeDbStoreInner {
    client: reqwest::Client,
    base_url: Url,
    auth: Option<Arc<dyn AccessToken>>,
}

impl RealtimeDbStore {
    /// Create an unauthenticated client; only useful against open rules.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self::build(base_url, None)
    }

    /// Create a client that authenticates every request.
    #[must_use]
    pub fn with_auth(base_url: Url, auth: Arc<dyn AccessToken>) -> Self {
        Self::build(base_url, Some(auth))
    }

    fn build(base_url: Url, auth: Option<Arc<dyn AccessToken>>) -> Self {
        Self {
            inner: Arc::new(RealtimeDbStoreInner {
                client: reqwest::Client::new(),
                base_url,
                auth,
            }),
        }
    }
}

impl RealtimeDbStoreInner {
    /// Build `<base>/carts/{uid}/items[/{pid}].json` with the auth token.
    async fn node_url(
        &self,
        user: &UserId,
        product: Option<&ProductId>,
    ) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| StoreError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("carts").push(user.as_str());
            match product {
                Some(product) => {
                    segments
                        .push("items")
                        .push(&format!("{}.json", product.as_str()));
                }
                None => {
                    segments.push("items.json");
                }
            }
        }

        if let Some(auth) = &self.auth
            && let Some(token) = auth.access_token().await
        {
            url.query_pairs_mut()
                .append_pair("auth", token.expose_secret());
        }

        Ok(url)
    }

    /// Send a request and return the body, mapping failure statuses.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, StoreError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::PermissionDenied);
        }

        let body = response.text().await?;

        if !status.is_success() {
            error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Realtime database returned non-success status"
            );
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        Ok(body)
    }

    /// Open the event stream for a user's items node.
    async fn open_stream(&self, user: &UserId) -> Result<reqwest::Response, StoreError> {
        let url = self.node_url(user, None).await?;
        let response = self
            .client
            .get(url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::PermissionDenied);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CartStore for RealtimeDbStore {
    #[instrument(skip(self), fields(user = %user, product = %product))]
    async fn get_item(
        &self,
        user: &UserId,
        product: &ProductId,
    ) -> Result<Option<CartItem>, StoreError> {
        let url = self.inner.node_url(user, Some(product)).await?;
        let body = self.inner.execute(self.inner.client.get(url)).await?;

        let value: Value = serde_json::from_str(&body)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(item_from_value(&value)))
    }

    #[instrument(skip(self, item), fields(user = %user, product = %product, quantity = item.quantity))]
    async fn set_item(
        &self,
        user: &UserId,
        product: &ProductId,
        item: &CartItem,
    ) -> Result<(), StoreError> {
        let url = self.inner.node_url(user, Some(product)).await?;
        self.inner
            .execute(self.inner.client.put(url).json(item))
            .await?;
        debug!("Cart item written");
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user, product = %product))]
    async fn update_quantity(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let url = self.inner.node_url(user, Some(product)).await?;
        self.inner
            .execute(
                self.inner
                    .client
                    .patch(url)
                    .json(&json!({ "quantity": quantity })),
            )
            .await?;
        debug!("Cart item quantity updated");
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user, product = %product))]
    async fn remove_item(&self, user: &UserId, product: &ProductId) -> Result<(), StoreError> {
        let url = self.inner.node_url(user, Some(product)).await?;
        self.inner.execute(self.inner.client.delete(url)).await?;
        debug!("Cart item removed");
        Ok(())
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn subscribe(&self, user: &UserId) -> Result<CartSubscription, StoreError> {
        let response = self.inner.open_stream(user).await?;

        let (tx, rx) = watch::channel(Cart::new());
        let cancel = CancellationToken::new();

        tokio::spawn(run_stream(
            Arc::clone(&self.inner),
            user.clone(),
            response,
            tx,
            cancel.clone(),
        ));

        info!("Cart subscription opened");
        Ok(CartSubscription::new(rx, cancel))
    }
}

// =============================================================================
// Streaming
// =============================================================================

enum StreamEnd {
    /// Connection dropped or server closed it; reconnect.
    Closed,
    /// Token expired; reconnect with a fresh one.
    AuthRevoked,
    /// Server revoked access; stop.
    Cancelled,
}

/// Pump events into `tx` until cancelled, reconnecting on dropped streams.
async fn run_stream(
    inner: Arc<RealtimeDbStoreInner>,
    user: UserId,
    mut response: reqwest::Response,
    tx: watch::Sender<Cart>,
    cancel: CancellationToken,
) {
    loop {
        let end = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            end = pump(&mut response, &tx) => end,
        };

        match end {
            StreamEnd::Cancelled => {
                warn!(user = %user, "Cart subscription cancelled by server");
                return;
            }
            StreamEnd::AuthRevoked => {
                info!(user = %user, "Cart subscription credential revoked, reconnecting");
            }
            StreamEnd::Closed => {
                debug!(user = %user, "Cart stream closed, reconnecting");
            }
        }

        match reconnect(&inner, &user, &cancel).await {
            Some(next) => response = next,
            None => return,
        }
    }
}

/// Retry opening the stream with capped exponential backoff.
///
/// Returns `None` when cancelled or when access is denied.
async fn reconnect(
    inner: &RealtimeDbStoreInner,
    user: &UserId,
    cancel: &CancellationToken,
) -> Option<reqwest::Response> {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(backoff) => {}
        }

        match inner.open_stream(user).await {
            Ok(response) => return Some(response),
            Err(StoreError::PermissionDenied) => {
                warn!(user = %user, "Cart stream permission denied, giving up");
                return None;
            }
            Err(e) => {
                warn!(user = %user, error = %e, backoff = ?backoff, "Cart stream reconnect failed");
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Read one connection to the end, publishing a cart on every change.
async fn pump(response: &mut reqwest::Response, tx: &watch::Sender<Cart>) -> StreamEnd {
    let mut parser = EventParser::default();
    let mut tree = Value::Null;

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return StreamEnd::Closed,
            Err(e) => {
                warn!(error = %e, "Cart stream read failed");
                return StreamEnd::Closed;
            }
        };

        for raw in parser.push(&chunk) {
            match RealtimeEvent::decode(&raw) {
                Ok(RealtimeEvent::Put { path, data }) => {
                    apply_put(&mut tree, &path, data);
                    tx.send_replace(cart_from_value(&tree));
                }
                Ok(RealtimeEvent::Patch { path, data }) => {
                    apply_patch(&mut tree, &path, data);
                    tx.send_replace(cart_from_value(&tree));
                }
                Ok(RealtimeEvent::KeepAlive) => {}
                Ok(RealtimeEvent::Cancel) => return StreamEnd::Cancelled,
                Ok(RealtimeEvent::AuthRevoked) => return StreamEnd::AuthRevoked,
                Ok(RealtimeEvent::Unknown(name)) => {
                    debug!(event = %name, "Ignoring unknown stream event");
                }
                Err(e) => {
                    warn!(event = %raw.event, error = %e, "Undecodable stream event");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FixedToken(&'static str);

    #[async_trait]
    impl AccessToken for FixedToken {
        async fn access_token(&self) -> Option<SecretString> {
            Some(SecretString::from(self.0))
        }
    }

    fn base() -> Url {
        Url::parse("https://demo-default-rtdb.firebaseio.com/").unwrap()
    }

    #[tokio::test]
    async fn test_item_url() {
        let store = RealtimeDbStore::new(base());
        let url = store
            .inner
            .node_url(&UserId::parse("u1").unwrap(), Some(&ProductId::from(7)))
            .await
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://demo-default-rtdb.firebaseio.com/carts/u1/items/7.json"
        );
    }

    #[tokio::test]
    async fn test_items_url_with_auth_and_nested_base() {
        let store = RealtimeDbStore::with_auth(
            Url::parse("http://localhost:9000/ns/").unwrap(),
            Arc::new(FixedToken("tok")),
        );
        let url = store
            .inner
            .node_url(&UserId::parse("u 1").unwrap(), None)
            .await
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:9000/ns/carts/u%201/items.json?auth=tok"
        );
    }
}
