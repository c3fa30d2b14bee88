use std::env;
use std::path::PathBuf;
use std::sync::Arc;

// Declare the modules
mod cdn;
mod state;

use cdn::preload::FsImageFetcher;
use cdn::preloader::{get_preload_cache_dir, SmartImagePreloader};
use cdn::transform::progressive_image_urls;
use state::cart::{CartStore, FileCartStorage};
use state::catalog::Catalog;
use state::checkout::{compute_totals, format_money, submit_order, LogNotifier};
use state::data::CustomerInfo;

/// Public object prefix gallery imports are published under
const PUBLIC_GALLERY_PREFIX: &str =
    "https://cdn.example.com/storage/v1/object/public/gallery";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // If this fails, the app cannot function without its catalog
    let catalog = Catalog::new()
        .expect("Failed to initialize catalog. Check permissions and disk space.");

    let mut cart = CartStore::load(FileCartStorage::new());
    cart.resolve_metadata(&catalog).await;

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("import") => {
            let Some(folder) = args.get(2) else {
                eprintln!("Usage: print-shop import <folder>");
                return;
            };
            let result = catalog.import_folder(&PathBuf::from(folder), PUBLIC_GALLERY_PREFIX);
            println!(
                "📊 Import summary: {} new, {} skipped",
                result.imported_count, result.skipped_count
            );
        }
        Some("gallery") => show_gallery(&catalog),
        Some("add") => {
            let (Some(image_id), Some(option_id)) = (args.get(2), args.get(3)) else {
                eprintln!("Usage: print-shop add <image_id> <option_id>");
                return;
            };
            add_to_cart(&mut cart, &catalog, image_id, option_id);
        }
        Some("remove") => {
            let Some(line_id) = args.get(2) else {
                eprintln!("Usage: print-shop remove <line_id>");
                return;
            };
            cart.remove_from_cart(line_id);
            println!(
                "🛒 Cart: {} items, subtotal {}",
                cart.count(),
                format_money(cart.total())
            );
        }
        Some("cart") => show_cart(&cart),
        Some("preload") => {
            let root = args.get(2).cloned().unwrap_or_else(|| ".".to_string());
            preload_gallery(&catalog, root).await;
        }
        Some("checkout") => {
            // Back-office flow for phone orders: submit the saved cart
            let [name, email, phone, address] = [2, 3, 4, 5].map(|i| args.get(i).cloned());
            let (Some(name), Some(email), Some(phone), Some(address)) =
                (name, email, phone, address)
            else {
                eprintln!("Usage: print-shop checkout <name> <email> <phone> <address>");
                return;
            };

            let customer = CustomerInfo {
                name,
                email,
                phone,
                address,
            };
            match submit_order(&mut cart, &customer, &catalog, &LogNotifier).await {
                Ok(order_id) => println!("📦 Created order {}", order_id),
                Err(e) => eprintln!("❌ {}", e),
            }
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!(
                "Usage: print-shop [import <folder> | gallery | add <image_id> <option_id> | cart | remove <line_id> | preload [root] | checkout <name> <email> <phone> <address>]"
            );
        }
        None => show_status(&catalog, &cart),
    }
}

/// Print catalog and cart summary
fn show_status(catalog: &Catalog, cart: &CartStore<FileCartStorage>) {
    let image_count = catalog.image_count().unwrap_or(0);
    let order_count = catalog.order_count().unwrap_or(0);

    println!("🎨 print-shop: {} images, {} orders", image_count, order_count);
    println!(
        "🛒 Cart: {} items, subtotal {}",
        cart.count(),
        format_money(cart.total())
    );
}

/// Add one unit of a catalog image's print option to the saved cart
fn add_to_cart(
    cart: &mut CartStore<FileCartStorage>,
    catalog: &Catalog,
    image_id: &str,
    option_id: &str,
) {
    let image = match catalog.get_image(image_id) {
        Ok(Some(image)) => image,
        Ok(None) => {
            eprintln!("❌ No image with id {}", image_id);
            return;
        }
        Err(e) => {
            eprintln!("❌ Failed to look up {}: {}", image_id, e);
            return;
        }
    };

    match cart.add_option(&image, option_id) {
        Ok(()) => println!(
            "🛒 Added {} to cart: {} items, subtotal {}",
            image.title,
            cart.count(),
            format_money(cart.total())
        ),
        Err(e) => eprintln!("❌ {}", e),
    }
}

/// List the saved cart line by line with the order total preview
fn show_cart(cart: &CartStore<FileCartStorage>) {
    if cart.items().is_empty() {
        println!("🛒 Cart is empty");
        return;
    }

    for line in cart.items() {
        let title = cart
            .get_image(&line.image_id)
            .map(|image| image.title.clone())
            .unwrap_or_else(|| line.image_id.clone());
        println!(
            "🛒 {} ({}) x{} @ {} [{}]",
            title,
            line.size,
            line.quantity,
            format_money(line.price),
            line.id
        );
    }

    let totals = compute_totals(cart.total());
    println!(
        "📊 Subtotal {} + shipping {} + tax {} = {}",
        format_money(totals.subtotal),
        format_money(totals.shipping),
        format_money(totals.tax),
        format_money(totals.grand_total)
    );
}

/// List gallery images with their progressive rendition URLs
fn show_gallery(catalog: &Catalog) {
    let images = match catalog.all_images() {
        Ok(images) => images,
        Err(e) => {
            eprintln!("❌ Failed to read gallery: {}", e);
            return;
        }
    };

    for image in &images {
        let urls = progressive_image_urls(&image.url);
        println!("📷 {} [{}]", image.title, image.id);
        println!("   thumb: {}", urls.thumbnail);
        println!("   full:  {}", urls.full);
    }

    println!("✅ {} images in gallery", images.len());
}

/// Preload every gallery asset through the fallback chain, caching to disk
async fn preload_gallery(catalog: &Catalog, root: String) {
    let urls: Vec<String> = match catalog.all_images() {
        Ok(images) => images.into_iter().map(|image| image.url).collect(),
        Err(e) => {
            eprintln!("❌ Failed to read gallery: {}", e);
            return;
        }
    };

    let fetcher = Arc::new(FsImageFetcher::new(root));
    let preloader = SmartImagePreloader::new().with_cache_dir(get_preload_cache_dir());

    let summary = preloader
        .preload_all(&urls, fetcher, |progress| {
            println!(
                "⏳ {:.0}% ({}/{} loaded)",
                progress.percent, progress.loaded, progress.total
            );
        })
        .await;

    println!(
        "📊 Preload summary: {} loaded, {} failed of {}",
        summary.loaded, summary.failed, summary.total
    );
}
