/// The Catalog is the local persistence backend for the storefront.
/// It stores gallery images, their print options, blog posts, and orders.

use rusqlite::{Connection, ErrorCode, Result as SqlResult};
use std::path::{Path, PathBuf};

use chrono::Utc;
use walkdir::WalkDir;

use super::cart::ImageBackend;
use super::checkout::OrderBackend;
use super::data::{
    BlogPost, CustomerInfo, GalleryImage, Order, OrderLineItem, OrderTotals, PrintOption,
};

/// Image file extensions accepted by gallery import
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Result of a gallery folder import
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported_count: usize,
    pub skipped_count: usize,
}

pub struct Catalog {
    conn: Connection,
    db_path: PathBuf,
}

impl Catalog {
    /// Create a new Catalog instance and initialize the database.
    ///
    /// The database file is created in the user's data directory:
    /// - Linux: ~/.local/share/print-shop/print_shop.db
    /// - macOS: ~/Library/Application Support/print-shop/print_shop.db
    /// - Windows: %APPDATA%\print-shop\print_shop.db
    pub fn new() -> SqlResult<Self> {
        let db_path = Self::get_db_path();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .expect("Failed to create application data directory");
        }

        let conn = Connection::open(&db_path)?;

        println!("📁 Catalog initialized at: {}", db_path.display());

        let catalog = Catalog { conn, db_path };
        catalog.init_schema()?;

        Ok(catalog)
    }

    /// In-memory catalog for tests and dry runs
    pub fn open_in_memory() -> SqlResult<Self> {
        let catalog = Catalog {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Get the path where the database should be stored
    fn get_db_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(|| dirs::home_dir())
            .expect("Could not determine user data directory");

        path.push("print-shop");
        path.push("print_shop.db");
        path
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS images (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                url             TEXT NOT NULL UNIQUE,
                description     TEXT NOT NULL DEFAULT '',
                category        TEXT NOT NULL DEFAULT '',
                created_at      INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS print_options (
                id              TEXT PRIMARY KEY,
                image_id        TEXT NOT NULL,
                size            TEXT NOT NULL,
                price           REAL NOT NULL,
                in_stock        INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY(image_id) REFERENCES images(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // Line items are stored denormalized as JSON: later catalog edits
        // must not change what a customer already bought
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS orders (
                id              TEXT PRIMARY KEY,
                customer_name   TEXT NOT NULL,
                email           TEXT NOT NULL,
                phone           TEXT NOT NULL,
                address         TEXT NOT NULL,
                items_json      TEXT NOT NULL,
                subtotal        REAL NOT NULL,
                shipping        REAL NOT NULL,
                tax             REAL NOT NULL,
                grand_total     REAL NOT NULL,
                created_at      INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS blog_posts (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                body            TEXT NOT NULL,
                published_at    INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_print_options_image_id
             ON print_options(image_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_images_category
             ON images(category)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_orders_created_at
             ON orders(created_at DESC)",
            [],
        )?;

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Get a count of images in the catalog
    pub fn image_count(&self) -> SqlResult<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert a gallery image together with its print options
    pub fn insert_image(&self, image: &GalleryImage) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO images (id, title, url, description, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                image.id,
                image.title,
                image.url,
                image.description,
                image.category,
                Utc::now().timestamp(),
            ],
        )?;

        for option in &image.print_options {
            self.insert_print_option(&image.id, option)?;
        }

        Ok(())
    }

    /// Add a print option to an existing image
    pub fn insert_print_option(&self, image_id: &str, option: &PrintOption) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO print_options (id, image_id, size, price, in_stock)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![option.id, image_id, option.size, option.price, option.in_stock],
        )?;
        Ok(())
    }

    /// Fetch one image by id, with its print options
    pub fn get_image(&self, image_id: &str) -> SqlResult<Option<GalleryImage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, url, description, category FROM images WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map([image_id], |row| {
            Ok(GalleryImage {
                id: row.get(0)?,
                title: row.get(1)?,
                url: row.get(2)?,
                description: row.get(3)?,
                category: row.get(4)?,
                print_options: Vec::new(),
            })
        })?;

        match rows.next() {
            Some(row) => {
                let mut image = row?;
                image.print_options = self.options_for(&image.id)?;
                Ok(Some(image))
            }
            None => Ok(None),
        }
    }

    /// Get all gallery images ordered by creation date (newest first)
    pub fn all_images(&self) -> SqlResult<Vec<GalleryImage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, url, description, category FROM images ORDER BY created_at DESC",
        )?;

        let image_iter = stmt.query_map([], |row| {
            Ok(GalleryImage {
                id: row.get(0)?,
                title: row.get(1)?,
                url: row.get(2)?,
                description: row.get(3)?,
                category: row.get(4)?,
                print_options: Vec::new(),
            })
        })?;

        let mut images = Vec::new();
        for image in image_iter {
            let mut image = image?;
            image.print_options = self.options_for(&image.id)?;
            images.push(image);
        }

        Ok(images)
    }

    /// Remove an image and (via cascade) its print options
    pub fn delete_image(&self, image_id: &str) -> SqlResult<()> {
        self.conn
            .execute("DELETE FROM images WHERE id = ?1", [image_id])?;
        self.conn
            .execute("DELETE FROM print_options WHERE image_id = ?1", [image_id])?;
        Ok(())
    }

    fn options_for(&self, image_id: &str) -> SqlResult<Vec<PrintOption>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, size, price, in_stock FROM print_options WHERE image_id = ?1",
        )?;

        let option_iter = stmt.query_map([image_id], |row| {
            Ok(PrintOption {
                id: row.get(0)?,
                size: row.get(1)?,
                price: row.get(2)?,
                in_stock: row.get(3)?,
            })
        })?;

        let mut options = Vec::new();
        for option in option_iter {
            options.push(option?);
        }

        Ok(options)
    }

    /// Persist a complete order payload, returning the generated order id
    pub fn insert_order(
        &self,
        customer: &CustomerInfo,
        items: &[OrderLineItem],
        totals: &OrderTotals,
    ) -> SqlResult<String> {
        let order_id = format!("ORD-{}", Utc::now().timestamp_millis());
        let items_json = OrderLineItem::list_to_json(items)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        self.conn.execute(
            "INSERT INTO orders (id, customer_name, email, phone, address, items_json,
                                 subtotal, shipping, tax, grand_total, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                order_id,
                customer.name,
                customer.email,
                customer.phone,
                customer.address,
                items_json,
                totals.subtotal,
                totals.shipping,
                totals.tax,
                totals.grand_total,
                Utc::now().timestamp(),
            ],
        )?;

        println!("📦 Order {} persisted ({} line items)", order_id, items.len());
        Ok(order_id)
    }

    /// Fetch one order by id
    pub fn get_order(&self, order_id: &str) -> SqlResult<Option<Order>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, customer_name, email, phone, address, items_json,
                    subtotal, shipping, tax, grand_total, created_at
             FROM orders WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map([order_id], |row| {
            let items_json: String = row.get(5)?;
            let items = OrderLineItem::list_from_json(&items_json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

            Ok(Order {
                id: row.get(0)?,
                customer: CustomerInfo {
                    name: row.get(1)?,
                    email: row.get(2)?,
                    phone: row.get(3)?,
                    address: row.get(4)?,
                },
                items,
                totals: OrderTotals {
                    subtotal: row.get(6)?,
                    shipping: row.get(7)?,
                    tax: row.get(8)?,
                    grand_total: row.get(9)?,
                },
                created_at: row.get(10)?,
            })
        })?;

        match rows.next() {
            Some(order) => Ok(Some(order?)),
            None => Ok(None),
        }
    }

    /// Get a count of persisted orders
    pub fn order_count(&self) -> SqlResult<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Publish a blog post
    pub fn insert_post(&self, post: &BlogPost) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO blog_posts (id, title, body, published_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![post.id, post.title, post.body, post.published_at],
        )?;
        Ok(())
    }

    /// Get all blog posts, newest first
    pub fn all_posts(&self) -> SqlResult<Vec<BlogPost>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, body, published_at FROM blog_posts ORDER BY published_at DESC",
        )?;

        let post_iter = stmt.query_map([], |row| {
            Ok(BlogPost {
                id: row.get(0)?,
                title: row.get(1)?,
                body: row.get(2)?,
                published_at: row.get(3)?,
            })
        })?;

        let mut posts = Vec::new();
        for post in post_iter {
            posts.push(post?);
        }

        Ok(posts)
    }

    /// Import all image files from a folder into the gallery
    ///
    /// Walks the folder recursively, inserts every supported image file as a
    /// gallery entry whose URL lives under `public_prefix`, and skips files
    /// already imported (UNIQUE constraint on the URL).
    pub fn import_folder(&self, folder_path: &Path, public_prefix: &str) -> ImportResult {
        let mut imported_count = 0;
        let mut skipped_count = 0;

        println!("🔍 Scanning folder: {}", folder_path.display());

        for entry in WalkDir::new(folder_path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            // Check if this is an image file by extension
            if let Some(extension) = path.extension() {
                let ext = extension.to_string_lossy().to_lowercase();
                if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                    continue;
                }
            } else {
                continue;
            }

            let filename = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            let stem = path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();

            let image = GalleryImage {
                id: stem.clone(),
                title: stem.replace(['_', '-'], " "),
                url: format!("{}/{}", public_prefix.trim_end_matches('/'), filename),
                description: String::new(),
                category: String::new(),
                print_options: Vec::new(),
            };

            match self.insert_image(&image) {
                Ok(_) => {
                    imported_count += 1;
                    if imported_count % 100 == 0 {
                        println!("⏳ Imported {} files...", imported_count);
                    }
                }
                Err(rusqlite::Error::SqliteFailure(err, _)) => {
                    // UNIQUE constraint violation means this file is already in
                    if err.code == ErrorCode::ConstraintViolation {
                        skipped_count += 1;
                    } else {
                        eprintln!("⚠️  Error importing {}: {:?}", filename, err);
                    }
                }
                Err(e) => {
                    eprintln!("⚠️  Error importing {}: {:?}", filename, e);
                }
            }
        }

        println!(
            "✅ Import complete: {} new, {} skipped",
            imported_count, skipped_count
        );

        ImportResult {
            imported_count,
            skipped_count,
        }
    }
}

impl ImageBackend for Catalog {
    async fn fetch_image(&self, image_id: &str) -> Result<GalleryImage, String> {
        self.get_image(image_id)
            .map_err(|e| format!("Failed to fetch image {}: {}", image_id, e))?
            .ok_or_else(|| format!("No image with id {}", image_id))
    }
}

impl OrderBackend for Catalog {
    async fn create_order(
        &self,
        customer: &CustomerInfo,
        items: &[OrderLineItem],
        totals: &OrderTotals,
    ) -> Result<String, String> {
        self.insert_order(customer, items, totals)
            .map_err(|e| format!("Failed to persist order: {}", e))
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cart::tests::sample_image;

    fn customer() -> CustomerInfo {
        CustomerInfo {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "+33123456789".to_string(),
            address: "12 Rue des Lilas, Paris".to_string(),
        }
    }

    #[test]
    fn test_insert_and_fetch_image_with_options() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_image(&sample_image("img1", "Dunes at Dawn")).unwrap();

        let fetched = catalog.get_image("img1").unwrap().unwrap();

        assert_eq!(fetched.title, "Dunes at Dawn");
        assert_eq!(fetched.print_options.len(), 1);
        assert_eq!(fetched.print_options[0].price, 50.0);
        assert_eq!(catalog.image_count().unwrap(), 1);
    }

    #[test]
    fn test_missing_image_is_none() {
        let catalog = Catalog::open_in_memory().unwrap();

        assert!(catalog.get_image("ghost").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_url_is_rejected() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_image(&sample_image("img1", "Dunes")).unwrap();

        // Same id/url again hits the UNIQUE constraints
        let result = catalog.insert_image(&sample_image("img1", "Dunes"));

        assert!(result.is_err());
        assert_eq!(catalog.image_count().unwrap(), 1);
    }

    #[test]
    fn test_delete_image_removes_options() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_image(&sample_image("img1", "Dunes")).unwrap();

        catalog.delete_image("img1").unwrap();

        assert!(catalog.get_image("img1").unwrap().is_none());
        assert_eq!(catalog.image_count().unwrap(), 0);
    }

    #[test]
    fn test_order_round_trip() {
        let catalog = Catalog::open_in_memory().unwrap();
        let items = vec![OrderLineItem {
            title: "Dunes".to_string(),
            size: "30x40cm".to_string(),
            price: 50.0,
            quantity: 2,
        }];
        let totals = crate::state::checkout::compute_totals(100.0);

        let order_id = catalog.insert_order(&customer(), &items, &totals).unwrap();
        let order = catalog.get_order(&order_id).unwrap().unwrap();

        assert_eq!(order.items, items);
        assert_eq!(order.totals, totals);
        assert_eq!(order.customer.email, "ada@example.com");
        assert_eq!(catalog.order_count().unwrap(), 1);
    }

    #[test]
    fn test_blog_posts_newest_first() {
        let catalog = Catalog::open_in_memory().unwrap();
        for (id, ts) in [("older", 100), ("newer", 200)] {
            catalog
                .insert_post(&BlogPost {
                    id: id.to_string(),
                    title: id.to_string(),
                    body: "…".to_string(),
                    published_at: ts,
                })
                .unwrap();
        }

        let posts = catalog.all_posts().unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "newer");
    }

    #[test]
    fn test_import_folder_skips_duplicates() {
        let dir = crate::cdn::preload::tests::unique_temp_dir("import");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("sunset_ridge.jpg"), b"fake").unwrap();
        std::fs::write(dir.join("notes.txt"), b"not an image").unwrap();

        let catalog = Catalog::open_in_memory().unwrap();
        let prefix = "https://cdn.example.com/storage/v1/object/public/gallery";

        let first = catalog.import_folder(&dir, prefix);
        assert_eq!(first.imported_count, 1);
        assert_eq!(first.skipped_count, 0);

        let second = catalog.import_folder(&dir, prefix);
        assert_eq!(second.imported_count, 0);
        assert_eq!(second.skipped_count, 1);

        let image = catalog.get_image("sunset_ridge").unwrap().unwrap();
        assert_eq!(image.title, "sunset ridge");
        assert!(image.url.ends_with("/gallery/sunset_ridge.jpg"));
    }

    #[tokio::test]
    async fn test_catalog_serves_the_image_backend_seam() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_image(&sample_image("img1", "Dunes")).unwrap();

        let image = catalog.fetch_image("img1").await.unwrap();
        assert_eq!(image.title, "Dunes");

        assert!(catalog.fetch_image("ghost").await.is_err());
    }
}
