// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Context
//!
//! The categorical lookup key every decision carries: which tenant, which
//! agent, what kind of transaction and roughly how large. A context is never
//! persisted as-is; only the embedding derived from it
//! ([`crate::domain::embedding::embed`]) is stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Isolated customer account. Every store and query is partitioned by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of agent making the decision (`categorizer`, `payment_matcher`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentType(pub String);

impl AgentType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Coarse amount band. Buckets keep the embedding categorical: two invoices of
/// R1 250 and R1 900 should land on the same learning neighbourhood.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmountBucket(pub String);

impl AmountBucket {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Bucket a signed amount in cents. The sign is ignored: a R500 debit and
    /// a R500 credit share a bucket.
    pub fn from_cents(cents: i64) -> Self {
        let rands = cents.unsigned_abs() / 100;
        let label = match rands {
            0..=99 => "under_100",
            100..=999 => "100_to_1k",
            1_000..=9_999 => "1k_to_10k",
            10_000..=99_999 => "10k_to_100k",
            _ => "over_100k",
        };
        Self(label.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AmountBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionContext {
    pub tenant_id: TenantId,
    pub agent_type: AgentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_bucket: Option<AmountBucket>,
}

impl DecisionContext {
    pub fn new(tenant_id: TenantId, agent_type: impl Into<AgentType>) -> Self {
        Self {
            tenant_id,
            agent_type: agent_type.into(),
            transaction_class: None,
            amount_bucket: None,
        }
    }

    pub fn with_transaction_class(mut self, class: impl Into<String>) -> Self {
        self.transaction_class = Some(class.into());
        self
    }

    pub fn with_amount_bucket(mut self, bucket: AmountBucket) -> Self {
        self.amount_bucket = Some(bucket);
        self
    }
}

impl From<String> for AgentType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_buckets() {
        assert_eq!(AmountBucket::from_cents(0).as_str(), "under_100");
        assert_eq!(AmountBucket::from_cents(9_999).as_str(), "under_100");
        assert_eq!(AmountBucket::from_cents(10_000).as_str(), "100_to_1k");
        assert_eq!(AmountBucket::from_cents(-250_000).as_str(), "1k_to_10k");
        assert_eq!(AmountBucket::from_cents(5_000_000).as_str(), "10k_to_100k");
        assert_eq!(AmountBucket::from_cents(i64::MIN).as_str(), "over_100k");
    }

    #[test]
    fn test_context_builder() {
        let tenant = TenantId::new();
        let ctx = DecisionContext::new(tenant, "categorizer")
            .with_transaction_class("bank_fee")
            .with_amount_bucket(AmountBucket::from_cents(12_345));

        assert_eq!(ctx.tenant_id, tenant);
        assert_eq!(ctx.agent_type.as_str(), "categorizer");
        assert_eq!(ctx.transaction_class.as_deref(), Some("bank_fee"));
        assert_eq!(ctx.amount_bucket.unwrap().as_str(), "100_to_1k");
    }
}
