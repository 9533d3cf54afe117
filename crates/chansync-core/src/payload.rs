//! # Adapter Payloads
//!
//! Records exchanged with channel adapters. Adapters translate a channel's
//! wire format into these shapes; the engine never sees the wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tax_rate::TaxRate;

/// An order as a channel reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalOrder {
    /// The order's identifier on the channel.
    pub channel_identifier: String,
    /// Human-readable reference; the identifier is used when absent.
    pub reference: Option<String>,
    /// Channel-reported state code.
    pub state_code: String,
    /// Channel-reported state name, used when the code is auto-provisioned.
    pub state_name: Option<String>,
    pub currency: Option<String>,
    /// Channel carrier code the order ships with.
    pub carrier_code: Option<String>,
    pub lines: Vec<ExternalOrderLine>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ExternalOrder {
    pub fn reference(&self) -> &str {
        self.reference.as_deref().unwrap_or(&self.channel_identifier)
    }
}

/// A line of an external order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalOrderLine {
    pub channel_identifier: Option<String>,
    /// The product's identifier on the channel.
    pub product_identifier: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax: Option<ExternalTax>,
}

/// A tax descriptor as a channel reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTax {
    /// Matched together with the rate when present.
    pub name: Option<String>,
    pub rate: TaxRate,
}

/// A product as a channel reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalProduct {
    /// The product's identifier on the channel.
    pub identifier: String,
    /// Local product code to create the product under.
    pub code: String,
    pub name: String,
    pub list_price_cents: i64,
}

/// One entry of a channel's order-status vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalOrderState {
    pub code: String,
    pub name: String,
}

/// A shipping carrier a channel knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCarrier {
    pub code: String,
    pub name: String,
}

/// A status change the channel reports for an already-imported order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalStatusChange {
    pub channel_identifier: String,
    pub state_code: String,
    pub state_name: Option<String>,
}
