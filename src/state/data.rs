/// Shared data structures for the storefront
///
/// These structs represent the data model that flows between
/// the catalog layer, the cart store, and checkout.

use serde::{Deserialize, Serialize};

/// One (image, print-option) pairing in the cart
///
/// `size` and `price` are snapshots taken at add-time. They are deliberately
/// never re-fetched: a price change after add-to-cart does not retroactively
/// affect items already in the cart.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartLineItem {
    /// Unique per line: "{image_id}-{option_id}-{millis at creation}"
    pub id: String,
    /// Weak reference to the photograph; resolved via the metadata cache
    pub image_id: String,
    /// Weak reference to the print option of that photograph
    pub option_id: String,
    /// Size label snapshot at add-time (e.g. "30x40cm")
    pub size: String,
    /// Unit price snapshot at add-time
    pub price: f64,
    /// Invariant: >= 1 while the line exists (0 removes the line)
    pub quantity: u32,
}

impl CartLineItem {
    /// Serialize a full line-item list for durable local storage
    pub fn list_to_json(items: &[CartLineItem]) -> Result<String, serde_json::Error> {
        serde_json::to_string(items)
    }

    /// Parse a line-item list back from storage
    pub fn list_from_json(json: &str) -> Result<Vec<CartLineItem>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A purchasable size/price/stock variant of a photograph
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrintOption {
    pub id: String,
    /// Size label (e.g. "30x40cm")
    pub size: String,
    /// Unit price for this size
    pub price: f64,
    pub in_stock: bool,
}

/// A photograph in the gallery, with its print options
///
/// Cached copies of this struct live in the cart's metadata cache purely for
/// display; the catalog remains the system of record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GalleryImage {
    pub id: String,
    pub title: String,
    /// Source URL of the full-resolution asset
    pub url: String,
    pub description: String,
    /// Gallery section (e.g. "landscape", "portrait")
    pub category: String,
    pub print_options: Vec<PrintOption>,
}

/// A blog entry shown on the portfolio site
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Unix timestamp (seconds)
    pub published_at: i64,
}

/// Customer contact details collected at checkout
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// A denormalized order line: title/size/price are copied into the order so
/// later catalog edits cannot change what the customer bought
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderLineItem {
    pub title: String,
    pub size: String,
    pub price: f64,
    pub quantity: u32,
}

impl OrderLineItem {
    /// Serialize order lines for the orders table's JSON column
    pub fn list_to_json(items: &[OrderLineItem]) -> Result<String, serde_json::Error> {
        serde_json::to_string(items)
    }

    /// Parse order lines back from the orders table
    pub fn list_from_json(json: &str) -> Result<Vec<OrderLineItem>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// The amounts shown at checkout and stored with the order
///
/// All values are unrounded floats; formatting to 2 decimal places happens
/// at presentation time only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub shipping: f64,
    pub tax: f64,
    pub grand_total: f64,
}

/// A persisted order as returned by the catalog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub customer: CustomerInfo,
    pub items: Vec<OrderLineItem>,
    pub totals: OrderTotals,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}
