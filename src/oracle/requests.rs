//! Pending oracle requests.
//!
//! An asset refresh issues a request to the oracle network and returns
//! immediately; the answer arrives later as a fulfillment carrying the same
//! [`RequestId`]. The [`PendingRequests`] table links the two halves and
//! guarantees each request is consumed at most once.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::constants::ORACLE_RESULT_LENGTH;
use crate::utils::crypto::{Address, Hash};

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique identifier of an oracle request
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Hash);

impl RequestId {
    /// Derive the id of the `nonce`-th request issued by `requester` for `symbol`
    pub fn derive(requester: &Address, nonce: u64, symbol: &str) -> Self {
        let mut data = Vec::with_capacity(20 + 8 + symbol.len());
        data.extend_from_slice(requester.as_bytes());
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(symbol.as_bytes());
        Self(Hash::sha256(&data))
    }

    /// Wrap raw id bytes
    pub fn from_hash(hash: Hash) -> Self {
        Self(hash)
    }

    /// Underlying hash
    pub fn as_hash(&self) -> &Hash {
        &self.0
    }

    /// Hex string
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", &self.0.to_hex()[..16])
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw 32-byte big-endian fulfillment payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult([u8; ORACLE_RESULT_LENGTH]);

impl OracleResult {
    /// Wrap raw payload bytes
    pub fn new(bytes: [u8; ORACLE_RESULT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a payload from a slice of exactly 32 bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; ORACLE_RESULT_LENGTH] =
            slice.try_into().map_err(|_| Error::InvalidPrice(format!(
                "oracle result must be {} bytes, got {}",
                ORACLE_RESULT_LENGTH,
                slice.len()
            )))?;
        Ok(Self(bytes))
    }

    /// Encode a price the way the oracle network delivers it
    pub fn from_price(price: u64) -> Self {
        let mut bytes = [0u8; ORACLE_RESULT_LENGTH];
        bytes[ORACLE_RESULT_LENGTH - 8..].copy_from_slice(&price.to_be_bytes());
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; ORACLE_RESULT_LENGTH] {
        &self.0
    }

    /// Decode the big-endian unsigned value; fails if it does not fit a `u64`
    pub fn decode(&self) -> Result<u64> {
        let (high, low) = self.0.split_at(ORACLE_RESULT_LENGTH - 8);
        if high.iter().any(|b| *b != 0) {
            return Err(Error::InvalidPrice(format!(
                "oracle result 0x{} exceeds u64",
                hex::encode(self.0)
            )));
        }

        let mut buf = [0u8; 8];
        buf.copy_from_slice(low);
        Ok(u64::from_be_bytes(buf))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PENDING REQUESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// An outstanding request for the price of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Request identifier
    pub request_id: RequestId,
    /// Asset symbol
    pub symbol: String,
    /// Timestamp the request was issued
    pub created_at: u64,
}

/// Table of requests awaiting fulfillment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingRequests {
    requests: HashMap<RequestId, OracleRequest>,
}

impl PendingRequests {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request
    pub fn insert(&mut self, request: OracleRequest) {
        self.requests.insert(request.request_id, request);
    }

    /// Remove and return the request, failing if unknown or already consumed
    pub fn consume(&mut self, request_id: &RequestId) -> Result<OracleRequest> {
        self.requests
            .remove(request_id)
            .ok_or_else(|| Error::UnknownRequest(request_id.to_hex()))
    }

    /// Look up a request without consuming it
    pub fn get(&self, request_id: &RequestId) -> Option<&OracleRequest> {
        self.requests.get(request_id)
    }

    /// Whether the request is outstanding
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.requests.contains_key(request_id)
    }

    /// Outstanding requests for `symbol`
    pub fn for_symbol<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a OracleRequest> + 'a {
        self.requests.values().filter(move |r| r.symbol == symbol)
    }

    /// All outstanding requests, oldest first
    pub fn iter_sorted(&self) -> Vec<&OracleRequest> {
        let mut all: Vec<_> = self.requests.values().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        all
    }

    /// Number of outstanding requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
