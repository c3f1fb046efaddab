//! Cart and wishlist documents.
//!
//! Field names on the wire are fixed by the stored collections (`userId`,
//! `productId`, `price`, `image_url`); serde renames keep the Rust names
//! idiomatic without migrating stored data.
//!
//! The logical key of both collections is (userId, productId): at most one
//! active record may exist per pair per collection. The store does not
//! enforce this; the reconciler's query-then-write sequences do.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use velvet_bean_core::{CurrencyCode, Price, ProductId, RecordId, UserId};

/// One stored cart line for a (user, product) pair.
///
/// Invariant: a stored line always has `quantity >= 1`. A quantity that
/// would reach zero deletes the record instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    pub image_url: String,
    pub quantity: u32,
}

impl CartLine {
    /// Unit price presented in the given currency.
    #[must_use]
    pub const fn price_in(&self, currency: CurrencyCode) -> Price {
        Price::new(self.unit_price, currency)
    }
}

/// One stored wishlist entry for a (user, product) pair.
///
/// Presence alone is the signal; there is no quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    pub image_url: String,
}

/// The product payload a UI trigger hands to the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
}

impl ProductSummary {
    /// Build the cart line inserted for this product at a given quantity.
    #[must_use]
    pub fn cart_line(&self, user_id: UserId, quantity: u32) -> CartLine {
        CartLine {
            user_id,
            product_id: self.id.clone(),
            name: self.name.clone(),
            unit_price: self.price,
            image_url: self.image_url.clone(),
            quantity,
        }
    }

    /// Build the wishlist entry inserted for this product.
    #[must_use]
    pub fn wishlist_entry(&self, user_id: UserId) -> WishlistEntry {
        WishlistEntry {
            user_id,
            product_id: self.id.clone(),
            name: self.name.clone(),
            unit_price: self.price,
            image_url: self.image_url.clone(),
        }
    }
}

/// A cart line together with its store-assigned record id.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLineRecord {
    pub id: RecordId,
    pub line: CartLine,
}

impl CartLineRecord {
    /// Exact total for this line in the given currency.
    #[must_use]
    pub fn line_total(&self, currency: CurrencyCode) -> Decimal {
        self.line.price_in(currency).line_total(self.line.quantity)
    }
}
