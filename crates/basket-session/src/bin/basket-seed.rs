//! # Demo Cart Seeder
//!
//! Writes a priced demo cart into a JSON file store for manual inspection.
//!
//! ## Usage
//! ```bash
//! # Seed ./carts/main.json
//! cargo run -p basket-session --bin basket-seed
//!
//! # Custom directory and instance
//! cargo run -p basket-session --bin basket-seed -- --dir /tmp/carts --instance demo
//!
//! # More logging
//! RUST_LOG=debug cargo run -p basket-session --bin basket-seed
//! ```
//!
//! ## Seeded Cart
//! - Shirt, 5 × 100.00, with a +5 price fee, a -5% sale and 10% VAT
//! - Mug, 2 × 12.50, in a blue variant
//! - Cart-level -5% discount and 10% tax
//!
//! Existing snapshots are replaced.

use std::env;

use basket_core::{Condition, ItemInput, Target, DISCOUNT, OTHER, TAX};
use basket_session::{CartSession, JsonFileStore, TracingSink};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut dir = "./carts".to_string();
    let mut instance = "main".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" | "-d" => {
                if i + 1 < args.len() {
                    dir = args[i + 1].clone();
                    i += 1;
                }
            }
            "--instance" | "-i" => {
                if i + 1 < args.len() {
                    instance = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Basket Demo Cart Seeder");
                println!();
                println!("Usage: basket-seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --dir <PATH>        Snapshot directory (default: ./carts)");
                println!("  -i, --instance <NAME>   Cart instance (default: main)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    println!("Basket Demo Cart Seeder");
    println!("=======================");
    println!("Directory: {}", dir);
    println!("Instance:  {}", instance);
    println!();

    let mut session = CartSession::new(JsonFileStore::new(&dir), TracingSink);
    session.instance(&instance)?;
    session.destroy()?;

    session.add(vec![
        ItemInput::new("sku-shirt", "Shirt", 100.0, 5)
            .condition(&Condition::new("Fee", OTHER, Target::Price).with_action("+5"))
            .condition(&Condition::new("Sale", DISCOUNT, Target::Subtotal).with_action("-5%"))
            .condition(&Condition::new("VAT", TAX, Target::Subtotal).with_action("10%")),
        ItemInput::new("sku-mug", "Mug", 12.5, 2)
            .weight(0.4)
            .attribute("colour", "blue", 0.0),
    ])?;
    session.add_condition(
        Condition::new("Cart discount", DISCOUNT, Target::Subtotal).with_action("-5%"),
    )?;
    session.add_condition(Condition::new("Cart tax", TAX, Target::Subtotal).with_action("10%"))?;

    println!("✓ Cart seeded");
    println!();

    for item in session.items()? {
        println!(
            "  {:<8} {:>3} × {:>8.2}  = {:>10.4}   [{}]",
            item.name(),
            item.quantity(),
            item.price(),
            item.subtotal_with_conditions(),
            item.row_id()
        );
    }

    let totals = session.totals()?;
    println!();
    println!("  Lines:      {}", totals.item_count);
    println!("  Quantity:   {}", totals.total_quantity);
    println!("  Subtotal:   {:.6}", totals.subtotal);
    println!("  Discounts:  {:.6}", totals.discounts);
    println!("  Taxes:      {:.6}", totals.taxes);
    println!("  Total:      {:.6}", totals.total);
    println!();
    println!("✓ Snapshot written to {}/{}.json", dir, instance);

    Ok(())
}

/// Initializes tracing with `RUST_LOG` support.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,basket_session=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
