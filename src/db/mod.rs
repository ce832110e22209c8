mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::{MollieClient, PayPalClient};
use crate::retry::RetryPolicy;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and the gateway adapters.
///
/// Adapters are constructed once at startup from explicit configuration; a
/// provider without credentials is simply absent and its endpoints refuse
/// to create payments.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for webhook/redirect callbacks (e.g. https://api.example.com)
    pub base_url: String,
    pub paypal: Option<PayPalClient>,
    pub mollie: Option<MollieClient>,
    pub retry: RetryPolicy,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
