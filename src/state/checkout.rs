/// Order totals and checkout submission
///
/// The totals are a pure derivation over the cart: flat shipping below a
/// free-shipping threshold, a flat tax rate, no rounding until presentation.
/// Submission denormalizes the line items, persists the order through the
/// backend, clears the cart, and fires off notifications whose failure is
/// never allowed to block a completed order.

use thiserror::Error;

use super::cart::{CartStorage, CartStore};
use super::data::{CustomerInfo, OrderLineItem, OrderTotals};

/// Orders above this subtotal ship free (strictly above: 1000 still pays)
const FREE_SHIPPING_THRESHOLD: f64 = 1000.0;
/// Flat shipping fee below the threshold
const FLAT_SHIPPING_FEE: f64 = 100.0;
/// Flat tax rate applied to the subtotal
const TAX_RATE: f64 = 0.18;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Cannot submit an empty cart")]
    EmptyCart,

    #[error("Invalid customer info: {0}")]
    Validation(String),

    #[error("Order submission failed: {0}")]
    Backend(String),
}

/// Compute the checkout amounts for a given subtotal
///
/// Pure and reproducible from the cart lines alone:
/// - shipping = 0 if subtotal > 1000, else 100
/// - tax = subtotal x 0.18, unrounded
/// - grand total = subtotal + shipping + tax
pub fn compute_totals(subtotal: f64) -> OrderTotals {
    let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
        0.0
    } else {
        FLAT_SHIPPING_FEE
    };
    let tax = subtotal * TAX_RATE;

    OrderTotals {
        subtotal,
        shipping,
        tax,
        grand_total: subtotal + shipping + tax,
    }
}

/// Format a monetary value for display (2 decimal places)
///
/// Only the presentation is rounded; stored totals stay unrounded.
pub fn format_money(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Checkout-form validation, one message per failed field
pub fn validate_customer(customer: &CustomerInfo) -> Vec<String> {
    let mut problems = Vec::new();

    if customer.name.trim().is_empty() {
        problems.push("name is required".to_string());
    }
    if !customer.email.contains('@') {
        problems.push("email address is invalid".to_string());
    }
    if customer.phone.trim().is_empty() {
        problems.push("phone number is required".to_string());
    }
    if customer.address.trim().is_empty() {
        problems.push("shipping address is required".to_string());
    }

    problems
}

/// Persists a complete order payload and returns the generated order id
pub trait OrderBackend {
    fn create_order(
        &self,
        customer: &CustomerInfo,
        items: &[OrderLineItem],
        totals: &OrderTotals,
    ) -> impl std::future::Future<Output = Result<String, String>>;
}

/// Fire-and-forget confirmation dispatch (email + SMS)
pub trait Notifier {
    fn send_email(
        &self,
        order_id: &str,
        customer: &CustomerInfo,
    ) -> impl std::future::Future<Output = Result<(), String>>;

    fn send_sms(
        &self,
        order_id: &str,
        customer: &CustomerInfo,
    ) -> impl std::future::Future<Output = Result<(), String>>;
}

/// Console-only notifier used by the maintenance binary
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send_email(&self, order_id: &str, customer: &CustomerInfo) -> Result<(), String> {
        println!("📧 Confirmation email for {} -> {}", order_id, customer.email);
        Ok(())
    }

    async fn send_sms(&self, order_id: &str, customer: &CustomerInfo) -> Result<(), String> {
        println!("📱 Confirmation SMS for {} -> {}", order_id, customer.phone);
        Ok(())
    }
}

/// Submit the cart as an order
///
/// Line items are denormalized with titles from the metadata cache (falling
/// back to the image id when a fetch never resolved). On success the cart is
/// cleared and confirmations are dispatched; a notification failure is
/// reported as a warning only. A backend failure leaves the cart intact so
/// the user can retry.
pub async fn submit_order<S, B, N>(
    cart: &mut CartStore<S>,
    customer: &CustomerInfo,
    backend: &B,
    notifier: &N,
) -> Result<String, CheckoutError>
where
    S: CartStorage,
    B: OrderBackend,
    N: Notifier,
{
    if cart.items().is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let problems = validate_customer(customer);
    if !problems.is_empty() {
        return Err(CheckoutError::Validation(problems.join("; ")));
    }

    let items: Vec<OrderLineItem> = cart
        .items()
        .iter()
        .map(|line| OrderLineItem {
            title: cart
                .get_image(&line.image_id)
                .map(|image| image.title.clone())
                .unwrap_or_else(|| line.image_id.clone()),
            size: line.size.clone(),
            price: line.price,
            quantity: line.quantity,
        })
        .collect();

    let totals = compute_totals(cart.total());

    let order_id = backend
        .create_order(customer, &items, &totals)
        .await
        .map_err(CheckoutError::Backend)?;

    cart.clear_cart();
    println!(
        "✅ Order {} submitted: total {}",
        order_id,
        format_money(totals.grand_total)
    );

    if let Err(e) = notifier.send_email(&order_id, customer).await {
        eprintln!("⚠️  Confirmation email failed (order is unaffected): {}", e);
    }
    if let Err(e) = notifier.send_sms(&order_id, customer).await {
        eprintln!("⚠️  Confirmation SMS failed (order is unaffected): {}", e);
    }

    Ok(order_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cart::tests::{sample_image, MemoryCartStorage};
    use std::sync::Mutex;

    fn customer() -> CustomerInfo {
        CustomerInfo {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "+33123456789".to_string(),
            address: "12 Rue des Lilas, Paris".to_string(),
        }
    }

    struct FakeOrderBackend {
        fail: bool,
        captured: Mutex<Vec<(Vec<OrderLineItem>, OrderTotals)>>,
    }

    impl FakeOrderBackend {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                captured: Mutex::new(Vec::new()),
            }
        }
    }

    impl OrderBackend for FakeOrderBackend {
        async fn create_order(
            &self,
            _customer: &CustomerInfo,
            items: &[OrderLineItem],
            totals: &OrderTotals,
        ) -> Result<String, String> {
            if self.fail {
                return Err("backend down".to_string());
            }
            self.captured.lock().unwrap().push((items.to_vec(), *totals));
            Ok("ORD-1".to_string())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        async fn send_email(&self, _: &str, _: &CustomerInfo) -> Result<(), String> {
            Err("smtp timeout".to_string())
        }

        async fn send_sms(&self, _: &str, _: &CustomerInfo) -> Result<(), String> {
            Err("sms gateway down".to_string())
        }
    }

    #[test]
    fn test_totals_formula() {
        let totals = compute_totals(130.0);

        assert_eq!(totals.subtotal, 130.0);
        assert_eq!(totals.shipping, 100.0);
        assert_eq!(totals.tax, 130.0 * 0.18);
        assert_eq!(totals.grand_total, 130.0 + 100.0 + 130.0 * 0.18);
    }

    #[test]
    fn test_free_shipping_threshold_is_strict() {
        // Exactly 1000 still pays shipping; anything above does not
        assert_eq!(compute_totals(1000.0).shipping, 100.0);
        assert_eq!(compute_totals(1000.01).shipping, 0.0);
        assert_eq!(compute_totals(0.0).shipping, 100.0);
    }

    #[test]
    fn test_totals_hold_across_subtotals() {
        for subtotal in [0.0, 1.0, 49.99, 500.0, 999.99, 1000.0, 1000.01, 2500.0] {
            let totals = compute_totals(subtotal);
            let shipping = if subtotal > 1000.0 { 0.0 } else { 100.0 };

            assert_eq!(totals.grand_total, subtotal + shipping + subtotal * 0.18);
        }
    }

    #[test]
    fn test_format_money_two_decimals() {
        assert_eq!(format_money(130.0), "130.00");
        assert_eq!(format_money(23.4), "23.40");
        assert_eq!(format_money(23.456), "23.46");
    }

    #[test]
    fn test_validate_customer_reports_each_field() {
        let problems = validate_customer(&CustomerInfo {
            name: " ".to_string(),
            email: "not-an-email".to_string(),
            phone: String::new(),
            address: String::new(),
        });

        assert_eq!(problems.len(), 4);
    }

    #[tokio::test]
    async fn test_submit_denormalizes_and_clears_cart() {
        let mut cart = CartStore::load(MemoryCartStorage::new());
        cart.add_to_cart("img1", "A", "30x40cm", 50.0, Some(sample_image("img1", "Dunes")));
        cart.add_to_cart("img1", "A", "30x40cm", 50.0, None);
        // img2 metadata never resolves; the id stands in for the title
        cart.add_to_cart("img2", "B", "20x30cm", 30.0, None);

        let backend = FakeOrderBackend::new(false);
        let order_id = submit_order(&mut cart, &customer(), &backend, &LogNotifier)
            .await
            .unwrap();

        assert_eq!(order_id, "ORD-1");
        assert_eq!(cart.items().len(), 0);

        let captured = backend.captured.lock().unwrap();
        let (items, totals) = &captured[0];
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Dunes");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].title, "img2");
        assert_eq!(totals.subtotal, 130.0);
        assert_eq!(totals.grand_total, 130.0 + 100.0 + 130.0 * 0.18);
    }

    #[tokio::test]
    async fn test_catalog_resolved_add_reaches_a_submitted_order() {
        // Full storefront path: catalog record -> cart line -> stored order
        let catalog = crate::state::catalog::Catalog::open_in_memory().unwrap();
        let image = sample_image("img1", "Dunes");
        catalog.insert_image(&image).unwrap();

        let mut cart = CartStore::load(MemoryCartStorage::new());
        let fetched = catalog.get_image("img1").unwrap().unwrap();
        cart.add_option(&fetched, "a").unwrap();

        let order_id = submit_order(&mut cart, &customer(), &catalog, &LogNotifier)
            .await
            .unwrap();

        assert_eq!(cart.items().len(), 0);
        let order = catalog.get_order(&order_id).unwrap().unwrap();
        assert_eq!(order.items[0].title, "Dunes");
        assert_eq!(order.items[0].price, 50.0);
        assert_eq!(order.totals.subtotal, 50.0);
    }

    #[tokio::test]
    async fn test_submit_empty_cart_is_rejected() {
        let mut cart: CartStore<MemoryCartStorage> = CartStore::load(MemoryCartStorage::new());

        let result = submit_order(&mut cart, &customer(), &FakeOrderBackend::new(false), &LogNotifier).await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_invalid_customer_blocks_submission() {
        let mut cart = CartStore::load(MemoryCartStorage::new());
        cart.add_to_cart("img1", "A", "30x40cm", 50.0, None);

        let bad = CustomerInfo {
            email: "nope".to_string(),
            ..customer()
        };
        let backend = FakeOrderBackend::new(false);
        let result = submit_order(&mut cart, &bad, &backend, &LogNotifier).await;

        assert!(matches!(result, Err(CheckoutError::Validation(_))));
        // Submission blocked, cart untouched
        assert_eq!(cart.items().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_cart_for_retry() {
        let mut cart = CartStore::load(MemoryCartStorage::new());
        cart.add_to_cart("img1", "A", "30x40cm", 50.0, None);

        let result = submit_order(&mut cart, &customer(), &FakeOrderBackend::new(true), &LogNotifier).await;

        assert!(matches!(result, Err(CheckoutError::Backend(_))));
        assert_eq!(cart.items().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_the_order() {
        let mut cart = CartStore::load(MemoryCartStorage::new());
        cart.add_to_cart("img1", "A", "30x40cm", 50.0, None);

        let backend = FakeOrderBackend::new(false);
        let result = submit_order(&mut cart, &customer(), &backend, &FailingNotifier).await;

        assert!(result.is_ok());
        assert_eq!(cart.items().len(), 0);
    }
}
