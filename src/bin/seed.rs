//! Seed script for development: publishes sample bank templates through the
//! maker/checker flow and prints bearer tokens for each role.
//!
//! Usage: `cargo run --bin seed`
//!
//! Reads the same environment as the server (.env included).

use anyhow::Context;
use smsledger::config::AppConfig;
use smsledger::models::category::Category;
use smsledger::models::pattern::{
    BankAlias, CreateBankAlias, CreatePattern, Decision, Field, FieldMap, GroupRef,
};
use smsledger::models::transaction::TransactionType;
use smsledger::models::user::{Actor, UserRole};
use smsledger::services::{aliases, approval, auth};
use smsledger::AppState;
use uuid::Uuid;

const TOKEN_EXPIRY_SECS: i64 = 7 * 24 * 3600;

fn actor(id: u128, username: &str, role: UserRole) -> Actor {
    Actor {
        id: Uuid::from_u128(id),
        username: username.to_string(),
        role,
    }
}

fn templates() -> Vec<CreatePattern> {
    vec![
        CreatePattern {
            bank_address: "HDFCBK".to_string(),
            bank_name: "HDFC Bank".to_string(),
            merchant_name: None,
            pattern_type: Some(TransactionType::Debited),
            regex_pattern: r"A/c XX(\d+) debited for INR ([0-9,.]+) on (\d{2}-\w{3}-\d{2})"
                .to_string(),
            message: "A/c XX5678 debited for INR 2,500.00 on 10-Jan-26".to_string(),
            category: None,
            priority: Some(10),
            field_map: FieldMap::new()
                .with(Field::Account, GroupRef::Index(1))
                .with(Field::Amount, GroupRef::Index(2))
                .with(Field::Date, GroupRef::Index(3)),
            date_format: None,
            alt_date_format: None,
            negate_amount: false,
        },
        CreatePattern {
            bank_address: "HDFCBK".to_string(),
            bank_name: "HDFC Bank".to_string(),
            merchant_name: None,
            pattern_type: Some(TransactionType::Credited),
            regex_pattern: r"INR (?P<amount>[0-9,.]+) credited to A/c XX(?P<accountNumber>\d+) on (?P<date>\d{2}-\d{2}-\d{4})\. Avl Bal INR (?P<balance>[0-9,.]+)"
                .to_string(),
            message: "INR 10,000.00 credited to A/c XX5678 on 12-01-2026. Avl Bal INR 42,310.55"
                .to_string(),
            category: Some(Category::Others),
            priority: Some(5),
            field_map: FieldMap::new(),
            date_format: Some("%d-%m-%Y".to_string()),
            alt_date_format: None,
            negate_amount: false,
        },
        CreatePattern {
            bank_address: "ICICIB".to_string(),
            bank_name: "ICICI Bank".to_string(),
            merchant_name: None,
            pattern_type: Some(TransactionType::Debited),
            regex_pattern: r"INR ([0-9,.]+) spent on ICICI Bank Card XX(\d+) on (\d{2}-\w{3}-\d{2}) at (.+?)\. Avl Limit: INR ([0-9,.]+)"
                .to_string(),
            message: "INR 349.00 spent on ICICI Bank Card XX1234 on 03-Feb-26 at SWIGGY. Avl Limit: INR 88,120.00"
                .to_string(),
            category: None,
            priority: Some(0),
            field_map: FieldMap::new()
                .with(Field::Amount, GroupRef::Index(1))
                .with(Field::Account, GroupRef::Index(2))
                .with(Field::Date, GroupRef::Index(3))
                .with(Field::Merchant, GroupRef::Index(4))
                .with(Field::Balance, GroupRef::Index(5)),
            date_format: None,
            alt_date_format: None,
            negate_amount: false,
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let secret = config.jwt_secret.clone();
    let state = AppState::from_config(config).await?;
    let store = state.store.as_ref();

    println!("=== SMS Ledger Seed Script ===");

    let maker = actor(1, "maker", UserRole::Maker);
    let checker = actor(2, "checker", UserRole::Checker);
    let admin = actor(3, "admin", UserRole::Admin);
    let user = actor(4, "user", UserRole::User);

    let active = approval::list_active(store).await?;
    for input in templates() {
        let exists = active
            .iter()
            .any(|p| p.bank_address == input.bank_address && p.regex_pattern == input.regex_pattern);
        if exists {
            println!("[skip] {} template already active", input.bank_address);
            continue;
        }

        let pending = approval::create_and_submit(
            store,
            &input,
            &maker,
            state.config.regex_size_limit,
        )
        .await?;
        let approved = approval::decide(
            store,
            &state.registry,
            pending.id,
            Decision::Approved,
            &checker,
            Some("seeded".to_string()),
        )
        .await?;
        println!("[done] Published {} template {}", approved.bank_address, approved.id);
    }

    let alias: BankAlias = aliases::register(
        store,
        &state.registry,
        &CreateBankAlias {
            alias: "VM-HDFCBK".to_string(),
            address: "HDFCBK".to_string(),
        },
        &maker,
    )
    .await?;
    println!("[done] Alias {} -> {}", alias.alias, alias.address);

    println!("\n=== Seed complete! ===");
    for who in [&maker, &checker, &admin, &user] {
        let token = auth::issue_access_token(who, &secret, TOKEN_EXPIRY_SECS)?;
        println!("{:<8} {token}", who.username);
    }

    Ok(())
}
