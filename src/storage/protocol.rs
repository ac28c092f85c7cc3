//! Namespace HTTP Protocol
//!
//! Endpoint paths and the JSON bodies exchanged with clients of the node.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Public endpoint for publishing a key.
pub const ENDPOINT_PUT: &str = "/api/v1/put";
/// Public endpoint for prefix queries.
pub const ENDPOINT_GET_MANY: &str = "/api/v1/getMany";
/// Plain-text dump of the overlay state.
pub const ENDPOINT_DHT_DEBUG: &str = "/dht/debug";
/// Pings every known overlay node.
pub const ENDPOINT_DHT_PING: &str = "/dht/ping";
/// Raw fetch of one key from the first peer announcing it.
pub const ENDPOINT_DHT_GET: &str = "/dht/get";

// --- Data Transfer Objects ---

/// Body of a publish request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
}

/// One entry of a prefix query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetManyParams {
    /// Missing prefix is treated as the empty prefix.
    pub prefix: Option<String>,
}

/// Response of the raw single-key fetch debug endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct DhtGetResponse {
    pub peer: String,
    pub key: String,
    pub value: String,
}
