//! # Demo Shift Generator
//!
//! Fills a database with one open shift and a handful of records, for
//! trying the register without a real drawer.
//!
//! ## Usage
//! ```bash
//! # Demo shift in ./kiosco_dev.db
//! cargo run -p kiosco-db --bin seed
//!
//! # More sales, other file
//! cargo run -p kiosco-db --bin seed -- --sales 40 --db ./data/kiosco.db
//! ```
//!
//! ## Generated Records
//! - Opening cash of $1000.00 (the seed sale)
//! - Sales cycling through cash, transfer, account credit and combined
//! - One withdrawal of a quarter of the cash in the drawer

use std::env;

use kiosco_core::{Money, PaymentBreakdown, PaymentMethod, ProductSnapshot, SaleDraft, SaleItem};
use kiosco_db::{Database, DbConfig};

/// Demo catalog: (id, name, category, price in pesos)
const PRODUCTS: &[(&str, &str, &str, i64)] = &[
    ("BEB-001", "Agua mineral 500ml", "Bebidas", 80),
    ("BEB-002", "Gaseosa cola 1.5L", "Bebidas", 250),
    ("GOL-001", "Alfajor triple", "Golosinas", 150),
    ("GOL-002", "Chicles menta", "Golosinas", 60),
    ("LIM-001", "Lavandina 1L", "Limpieza", 320),
    ("ALM-001", "Yerba 1kg", "Almacén", 900),
];

const CUSTOMERS: &[&str] = &["Lucía", "Martín", "Sofía", "Diego"];

const METHODS: &[PaymentMethod] = &[
    PaymentMethod::Cash,
    PaymentMethod::Transfer,
    PaymentMethod::Cash,
    PaymentMethod::AccountCredit,
    PaymentMethod::Combined,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut sales: usize = 12;
    let mut db_path = String::from("./kiosco_dev.db");
    let mut admin = String::from("Demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales = args[i + 1].parse().unwrap_or(12);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin" | "-a" => {
                if i + 1 < args.len() {
                    admin = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kiosco Demo Shift Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --sales <N>      Number of sales to record (default: 12)");
                println!("  -d, --db <PATH>      Database file path (default: ./kiosco_dev.db)");
                println!("  -a, --admin <NAME>   Administrator of the demo shift (default: Demo)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kiosco Demo Shift Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("Sales:    {}", sales);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if let Some(active) = db.shifts().get_active().await? {
        println!("⚠ Shift of {} is still open", active.admin_name);
        println!("  Skipping seed to keep its records intact.");
        println!("  Close it or delete the database file to regenerate.");
        return Ok(());
    }

    let ledger = db.shifts().open(&admin, Money::from_pesos(1000)).await?;
    let shift_id = ledger.shift.id.clone();
    let mut version = ledger.shift.version;
    println!("✓ Opened shift for {} with $1000.00", admin);

    println!();
    println!("Recording sales...");
    for n in 0..sales {
        let (id, name, category, price) = PRODUCTS[n % PRODUCTS.len()];
        let quantity = (n % 3) as i64 + 1;
        let item = SaleItem::new(
            ProductSnapshot {
                id: id.to_string(),
                name: name.to_string(),
                category: category.to_string(),
                price: Money::from_pesos(price),
            },
            quantity,
            None,
        );
        let total = item.subtotal;
        let method = METHODS[n % METHODS.len()];
        let breakdown = (method == PaymentMethod::Combined).then(|| PaymentBreakdown::even_split(total));

        let draft = SaleDraft {
            items: vec![item],
            payment_method: method,
            breakdown,
            // Account credit is billed to a named customer and lot
            customer_name: Some(CUSTOMERS[n % CUSTOMERS.len()].to_string()),
            lot_number: Some(format!("{}", 10 + n % 7)),
        };

        match db.shifts().record_sale(&shift_id, version, draft).await {
            Ok(recorded) => {
                version = recorded.shift.version;
                println!(
                    "  {} {:>10} {}",
                    recorded.record.receipt_number, recorded.record.total, method
                );
            }
            Err(e) => eprintln!("Failed to record sale {}: {}", n + 1, e),
        }
    }

    let totals = db.shifts().load_ledger(&shift_id).await?.totals();
    let amount = Money::from_cents(totals.cash.cents() / 4);
    if amount.is_positive() {
        let recorded = db
            .shifts()
            .record_withdrawal(&shift_id, version, amount, "Depósito banco")
            .await?;
        println!();
        println!("✓ Withdrawal {} of {}", recorded.record.withdrawal_id, amount);
    }

    let totals = db.shifts().load_ledger(&shift_id).await?.totals();
    println!();
    println!("Shift totals");
    println!("  Efectivo:       {}", totals.cash);
    println!("  Transferencia:  {}", totals.transfer);
    println!("  Expensa:        {}", totals.account_credit);
    println!("  General:        {}", totals.general);
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
