//! Stream registry

use super::types::StreamDefinition;
use crate::error::{Error, Result};
use crate::schema::embedded_schema;

/// Partition key shared by every account-scoped stream
const ACCOUNT_KEY: &str = "accountID";

/// Ordered collection of stream definitions
#[derive(Debug, Clone, Default)]
pub struct StreamRegistry {
    streams: Vec<StreamDefinition>,
}

impl StreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The Lightspeed Retail R-Series streams
    pub fn lightspeed() -> Result<Self> {
        let account = StreamDefinition::new(
            "account",
            "/Account.json",
            "Account",
            embedded_schema("account")?,
        )
        .with_primary_key("accountID")
        .with_child_context(ACCOUNT_KEY, "accountID")
        .with_child_context("account_name", "name");

        let mut registry = Self::new();
        registry.register(account);

        for (name, file, records_key, primary_key, relations) in [
            ("items", "Item", "Item", "itemID", "all"),
            ("vendors", "Vendor", "Vendor", "vendorID", r#"["Contact"]"#),
            ("orders", "Order", "Order", "orderID", r#"["OrderLines"]"#),
            ("sales", "Sale", "Sale", "saleID", r#"["SaleLines"]"#),
            (
                "shipments",
                "Shipment",
                "OrderShipment",
                "orderShipmentID",
                r#"["OrderShipmentItems"]"#,
            ),
            ("shops", "Shop", "Shop", "shopID", r#"["Contact"]"#),
        ] {
            let stream = StreamDefinition::new(
                name,
                format!("/Account/{{{ACCOUNT_KEY}}}/{file}.json"),
                records_key,
                embedded_schema(name)?,
            )
            .with_primary_key(primary_key)
            .with_replication_key("timeStamp")
            .with_parent("account", &[ACCOUNT_KEY])
            .paged(Some(relations));
            registry.register(stream);
        }

        Ok(registry)
    }

    /// Add a stream (replaces one with the same name)
    pub fn register(&mut self, stream: StreamDefinition) {
        match self.streams.iter_mut().find(|s| s.name == stream.name) {
            Some(existing) => *existing = stream,
            None => self.streams.push(stream),
        }
    }

    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Look up a stream by name, failing if unknown
    pub fn require(&self, name: &str) -> Result<&StreamDefinition> {
        self.get(name).ok_or_else(|| Error::StreamNotFound {
            stream: name.to_string(),
        })
    }

    /// All streams in registration order
    pub fn streams(&self) -> &[StreamDefinition] {
        &self.streams
    }

    /// Stream names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Registration index of a stream
    pub fn position(&self, name: &str) -> Option<usize> {
        self.streams.iter().position(|s| s.name == name)
    }

    /// Context keys the parent of `stream` injects into its records
    pub fn context_keys(&self, stream: &StreamDefinition) -> Vec<String> {
        stream
            .parent
            .as_deref()
            .and_then(|parent| self.get(parent))
            .map(|parent| {
                parent
                    .child_context_fields
                    .iter()
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
