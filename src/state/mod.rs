/// State management module
///
/// This module handles all storefront state, including:
/// - The shopping cart store and its durable persistence (cart.rs)
/// - Shared data structures (data.rs)
/// - Order totals and checkout submission (checkout.rs)
/// - The SQLite catalog backend (catalog.rs)

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod data;
