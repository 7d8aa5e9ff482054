//! CLI command implementations.

pub mod broker;
pub mod migrate;

use secrecy::SecretString;

/// Resolve the billing database URL, falling back to `DATABASE_URL`.
fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();
    std::env::var("BILLING_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
