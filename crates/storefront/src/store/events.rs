//! Server-sent event decoding for the realtime database streaming API.
//!
//! A streaming request yields events of the form
//!
//! ```text
//! event: put
//! data: {"path":"/","data":{"7":{"quantity":1,"product":{...}}}}
//! ```
//!
//! `put` replaces the value at `path`, `patch` merges the children of `data`
//! into `path`. The subscriber keeps a JSON tree of the whole subtree and
//! re-decodes the cart after every change.

use serde::Deserialize;
use serde_json::{Map, Value};
use shopez_core::{Cart, CartItem, ProductId, ProductSnapshot};
use tracing::warn;

/// One raw event from the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental parser; feed it chunks as they arrive.
#[derive(Debug, Default)]
pub struct EventParser {
    buffer: Vec<u8>,
}

impl EventParser {
    /// Append a chunk and return every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().filter(|&&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
        }
        events
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => value.clone_into(&mut event.event),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if event.event.is_empty() && data_lines.is_empty() {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}

// =============================================================================
// Decoded events
// =============================================================================

/// Stream event after decoding its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Put { path: String, data: Value },
    Patch { path: String, data: Value },
    KeepAlive,
    /// Server revoked read access to the location.
    Cancel,
    /// Credential expired; reconnect with a fresh one.
    AuthRevoked,
    Unknown(String),
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    #[serde(default)]
    data: Value,
}

impl RealtimeEvent {
    pub fn decode(event: &SseEvent) -> Result<Self, serde_json::Error> {
        Ok(match event.event.as_str() {
            "put" => {
                let payload: PathData = serde_json::from_str(&event.data)?;
                Self::Put {
                    path: payload.path,
                    data: payload.data,
                }
            }
            "patch" => {
                let payload: PathData = serde_json::from_str(&event.data)?;
                Self::Patch {
                    path: payload.path,
                    data: payload.data,
                }
            }
            "keep-alive" => Self::KeepAlive,
            "cancel" => Self::Cancel,
            "auth_revoked" => Self::AuthRevoked,
            other => Self::Unknown(other.to_string()),
        })
    }
}

// =============================================================================
// JSON tree
// =============================================================================

/// Replace the value at `path`. `null` deletes it.
pub fn apply_put(tree: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *tree = data;
        return;
    };

    let mut node = tree;
    for segment in parents {
        if data.is_null() && !node_has(node, segment) {
            return;
        }
        let Some(object) = make_object(node) else {
            return;
        };
        node = object.entry((*segment).to_string()).or_insert(Value::Null);
    }

    let Some(object) = make_object(node) else {
        return;
    };
    if data.is_null() {
        object.remove(*last);
    } else {
        object.insert((*last).to_string(), data);
    }
}

/// Merge each child of `data` into the node at `path`.
pub fn apply_patch(tree: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        warn!(path, "Ignoring patch with non-object payload");
        return;
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        apply_put(tree, &format!("{base}/{key}"), value);
    }
}

fn node_has(node: &Value, key: &str) -> bool {
    match node {
        Value::Object(map) => map.contains_key(key),
        Value::Array(items) => key
            .parse::<usize>()
            .is_ok_and(|i| items.get(i).is_some_and(|v| !v.is_null())),
        _ => false,
    }
}

/// View a node as an object, converting arrays (index keys) and scalars.
fn make_object(node: &mut Value) -> Option<&mut Map<String, Value>> {
    if !node.is_object() {
        let converted = match node.take() {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Map::new(),
        };
        *node = Value::Object(converted);
    }
    node.as_object_mut()
}

/// Decode the `items` subtree into a cart.
///
/// `null` is an empty cart. Arrays appear when every key is a small integer;
/// their indices are the product ids. Records that fail to decode are skipped.
pub fn cart_from_value(value: &Value) -> Cart {
    match value {
        Value::Null => Cart::new(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, item)| decode_entry(key, item))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .filter_map(|(i, item)| decode_entry(&i.to_string(), item))
            .collect(),
        other => {
            warn!(value = %other, "Cart subtree is not an object, treating as empty");
            Cart::new()
        }
    }
}

fn decode_entry(key: &str, value: &Value) -> Option<(ProductId, CartItem)> {
    let product_id = match ProductId::parse(key) {
        Ok(id) => id,
        Err(e) => {
            warn!(key, error = %e, "Skipping cart entry with invalid product id");
            return None;
        }
    };
    match CartItem::deserialize(value) {
        Ok(item) if item.quantity > 0 => Some((product_id, item)),
        Ok(_) => {
            warn!(product_id = %product_id, "Skipping cart entry without a positive quantity");
            None
        }
        Err(e) => {
            warn!(product_id = %product_id, error = %e, "Skipping malformed cart entry");
            None
        }
    }
}

/// Decode one stored line, salvaging what it can from a malformed record.
///
/// A quantity that is not a non-negative integer reads as zero and an
/// unreadable product reads as an empty snapshot, so a later rich add can
/// overwrite the record instead of failing on it.
pub fn item_from_value(value: &Value) -> CartItem {
    if let Ok(item) = CartItem::deserialize(value) {
        return item;
    }

    let quantity = value
        .get("quantity")
        .and_then(Value::as_u64)
        .map_or(0, |q| u32::try_from(q).unwrap_or(u32::MAX));
    let product = value
        .get("product")
        .and_then(|product| ProductSnapshot::deserialize(product).ok())
        .unwrap_or_default();
    warn!(quantity, "Stored cart line is malformed, reading it leniently");
    CartItem::new(quantity, product)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parser_handles_split_chunks_and_crlf() {
        let mut parser = EventParser::default();
        assert!(parser.push(b"event: put\r\ndata: {\"path\":").is_empty());

        let events = parser.push(b"\"/\",\"data\":null}\r\n\r\nevent: keep-alive\ndata: null\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "put");
        assert_eq!(events[0].data, "{\"path\":\"/\",\"data\":null}");
        assert_eq!(events[1].event, "keep-alive");
    }

    #[test]
    fn test_parser_ignores_comments() {
        let mut parser = EventParser::default();
        assert!(parser.push(b": ping\n\n").is_empty());
    }

    #[test]
    fn test_decode_event_kinds() {
        let put = SseEvent {
            event: "put".to_string(),
            data: r#"{"path":"/7","data":{"quantity":1}}"#.to_string(),
        };
        assert_eq!(
            RealtimeEvent::decode(&put).unwrap(),
            RealtimeEvent::Put {
                path: "/7".to_string(),
                data: json!({"quantity": 1})
            }
        );

        let revoked = SseEvent {
            event: "auth_revoked".to_string(),
            data: "credential is no longer valid".to_string(),
        };
        assert_eq!(
            RealtimeEvent::decode(&revoked).unwrap(),
            RealtimeEvent::AuthRevoked
        );

        let bad = SseEvent {
            event: "patch".to_string(),
            data: "not json".to_string(),
        };
        assert!(RealtimeEvent::decode(&bad).is_err());
    }

    #[test]
    fn test_put_patch_and_delete() {
        let mut tree = Value::Null;
        apply_put(
            &mut tree,
            "/",
            json!({"7": {"quantity": 1, "product": {"title": "Widget"}}}),
        );
        apply_patch(&mut tree, "/7", json!({"quantity": 3}));
        apply_put(&mut tree, "/5", json!({"quantity": 2}));

        assert_eq!(tree["7"]["quantity"], 3);
        assert_eq!(tree["7"]["product"]["title"], "Widget");

        apply_put(&mut tree, "/5", Value::Null);
        assert!(tree.get("5").is_none());

        apply_put(&mut tree, "/9/quantity", Value::Null);
        assert!(tree.get("9").is_none());
    }

    #[test]
    fn test_put_into_array_converts_to_object() {
        let mut tree = json!([null, {"quantity": 1}]);
        apply_put(&mut tree, "/3", json!({"quantity": 2}));

        assert_eq!(tree, json!({"1": {"quantity": 1}, "3": {"quantity": 2}}));
    }

    #[test]
    fn test_cart_from_value_shapes() {
        assert!(cart_from_value(&Value::Null).is_empty());

        let cart = cart_from_value(&json!([null, {"quantity": 2}, null, {"quantity": 1}]));
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.get(&ProductId::from(1)).unwrap().quantity, 2);
        assert_eq!(cart.get(&ProductId::from(3)).unwrap().quantity, 1);
    }

    #[test]
    fn test_cart_from_value_skips_bad_entries() {
        let cart = cart_from_value(&json!({
            "7": {"quantity": 1, "product": {"id": 7, "title": "Widget", "price": 9.99, "image": "u"}},
            "8": {"quantity": "lots"},
            "9": {"quantity": 0},
        }));

        assert_eq!(cart.len(), 1);
        assert!(cart.get(&ProductId::from(7)).unwrap().product.is_rich());
    }

    #[test]
    fn test_item_from_value_salvages_malformed_record() {
        let item = item_from_value(&json!({
            "quantity": "lots",
            "product": {"title": "Widget", "price": 9.99, "image": "u"}
        }));
        assert_eq!(item.quantity, 0);
        assert_eq!(item.product.title.as_deref(), Some("Widget"));

        let item = item_from_value(&json!({"quantity": 2, "product": "oops"}));
        assert_eq!(item.quantity, 2);
        assert_eq!(item.product, ProductSnapshot::default());

        assert_eq!(item_from_value(&json!("junk")), CartItem::default());
        assert_eq!(
            item_from_value(&json!({"quantity": 3})),
            CartItem::new(3, ProductSnapshot::default())
        );
    }
}
