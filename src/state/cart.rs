/// The shopping cart store
///
/// Single source of truth for the cart: line items, the derived total and
/// count, and a display-only metadata cache of the photographs referenced by
/// those lines. Every mutation synchronously writes the full line-item list
/// to durable local storage; startup rehydrates from the same slot and a
/// corrupt snapshot falls back to an empty cart instead of crashing.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use super::data::{CartLineItem, GalleryImage};

/// Durable local storage: one synchronous string slot
///
/// `set` is fire-and-forget; `get` may return nothing or malformed data,
/// both of which mean "no saved cart".
pub trait CartStorage {
    fn get(&self) -> Option<String>;
    fn set(&self, snapshot: &str);
}

/// Cart snapshot stored as a JSON file in the user's data directory
pub struct FileCartStorage {
    path: PathBuf,
}

impl FileCartStorage {
    pub fn new() -> Self {
        Self {
            path: Self::get_cart_path(),
        }
    }

    /// Get the path where the cart snapshot should be stored
    fn get_cart_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .expect("Could not determine user data directory");

        path.push("print-shop");
        path.push("cart.json");
        path
    }
}

impl Default for FileCartStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CartStorage for FileCartStorage {
    fn get(&self) -> Option<String> {
        fs::read_to_string(&self.path).ok()
    }

    fn set(&self, snapshot: &str) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        // Fire-and-forget: a failed write must not block cart mutations
        if let Err(e) = fs::write(&self.path, snapshot) {
            eprintln!("⚠️  Failed to persist cart to {}: {}", self.path.display(), e);
        }
    }
}

/// The "fetch one image by id" slice of the persistence backend
pub trait ImageBackend {
    fn fetch_image(
        &self,
        image_id: &str,
    ) -> impl std::future::Future<Output = Result<GalleryImage, String>>;
}

/// Cart state plus its metadata cache
///
/// Constructed once at application bootstrap and passed by reference to
/// whatever needs it; there is no global instance.
pub struct CartStore<S: CartStorage> {
    storage: S,
    items: Vec<CartLineItem>,
    /// image_id -> last-known photograph record. Last-write-wins per key,
    /// display-only, never invalidated within a session.
    images: HashMap<String, GalleryImage>,
}

impl<S: CartStorage> CartStore<S> {
    /// Rehydrate the cart from storage
    ///
    /// A malformed snapshot is logged and treated as an empty cart; this can
    /// never fail.
    pub fn load(storage: S) -> Self {
        let items = match storage.get() {
            Some(json) => match CartLineItem::list_from_json(&json) {
                Ok(items) => items,
                Err(e) => {
                    eprintln!("⚠️  Corrupt saved cart, starting empty: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let store = Self {
            storage,
            items,
            images: HashMap::new(),
        };

        if !store.items.is_empty() {
            println!("🛒 Restored cart: {} items", store.count());
        }

        store
    }

    /// Add one unit of a print option to the cart
    ///
    /// At most one line exists per (image, option) pair: adding the same
    /// pair again bumps the existing line's quantity instead of creating a
    /// duplicate. A supplied snapshot refreshes the metadata cache; without
    /// one, a later [`resolve_metadata`](Self::resolve_metadata) pass fills
    /// the gap.
    pub fn add_to_cart(
        &mut self,
        image_id: &str,
        option_id: &str,
        size: &str,
        price: f64,
        snapshot: Option<GalleryImage>,
    ) {
        if let Some(image) = snapshot {
            self.images.insert(image_id.to_string(), image);
        }

        if let Some(existing) = self
            .items
            .iter()
            .find(|item| item.image_id == image_id && item.option_id == option_id)
        {
            let line_id = existing.id.clone();
            let bumped = existing.quantity + 1;
            self.update_quantity(&line_id, bumped);
            return;
        }

        self.items.push(CartLineItem {
            id: format!("{}-{}-{}", image_id, option_id, Utc::now().timestamp_millis()),
            image_id: image_id.to_string(),
            option_id: option_id.to_string(),
            size: size.to_string(),
            price,
            quantity: 1,
        });
        self.persist();
    }

    /// Add one unit of a catalog record's print option
    ///
    /// Resolves the size/price snapshot from the record itself and caches it
    /// as metadata. Errs when the image carries no such option or the option
    /// is out of stock; the cart is untouched in both cases.
    pub fn add_option(&mut self, image: &GalleryImage, option_id: &str) -> Result<(), String> {
        let Some(option) = image.print_options.iter().find(|o| o.id == option_id) else {
            return Err(format!("Image {} has no print option {}", image.id, option_id));
        };
        if !option.in_stock {
            return Err(format!(
                "Print option {} of {} is out of stock",
                option_id, image.id
            ));
        }

        let size = option.size.clone();
        let price = option.price;
        self.add_to_cart(&image.id, option_id, &size, price, Some(image.clone()));
        Ok(())
    }

    /// Remove a line unconditionally; an unknown id is a no-op
    ///
    /// A no-op does not write through to storage.
    pub fn remove_from_cart(&mut self, line_id: &str) {
        let before = self.items.len();
        self.items.retain(|item| item.id != line_id);
        if self.items.len() != before {
            self.persist();
        }
    }

    /// Replace a line's quantity; zero removes the line
    ///
    /// The price and size snapshots on the line are never touched here, and
    /// an unknown line id is a no-op without a storage write.
    pub fn update_quantity(&mut self, line_id: &str, quantity: u32) {
        if quantity == 0 {
            self.remove_from_cart(line_id);
            return;
        }

        let Some(item) = self.items.iter_mut().find(|item| item.id == line_id) else {
            return;
        };
        item.quantity = quantity;
        self.persist();
    }

    /// Empty the cart
    ///
    /// The metadata cache survives: re-adding an item in the same session
    /// should not need another fetch.
    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.persist();
    }

    /// Synchronous metadata lookup; absent means "render a placeholder"
    pub fn get_image(&self, image_id: &str) -> Option<&GalleryImage> {
        self.images.get(image_id)
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Σ price × quantity over current lines, recomputed on every read
    pub fn total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.price * item.quantity as f64)
            .sum()
    }

    /// Σ quantity over current lines
    pub fn count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Fetch metadata for any line whose image is not cached yet
    ///
    /// A failed fetch is logged and leaves the entry absent; displays keep
    /// showing a placeholder and the next pass retries. Out-of-order
    /// resolution is harmless because the cache is last-write-wins per key.
    pub async fn resolve_metadata<B: ImageBackend>(&mut self, backend: &B) {
        let mut missing: Vec<String> = Vec::new();
        for item in &self.items {
            if !self.images.contains_key(&item.image_id) && !missing.contains(&item.image_id) {
                missing.push(item.image_id.clone());
            }
        }

        for image_id in missing {
            match backend.fetch_image(&image_id).await {
                Ok(image) => {
                    self.images.insert(image_id, image);
                }
                Err(e) => {
                    eprintln!("⚠️  Failed to fetch image {}: {}", image_id, e);
                }
            }
        }
    }

    /// Write the full line-item list through to storage
    fn persist(&self) {
        match CartLineItem::list_to_json(&self.items) {
            Ok(json) => self.storage.set(&json),
            Err(e) => eprintln!("⚠️  Failed to serialize cart: {}", e),
        }
    }
}
