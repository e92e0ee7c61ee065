mod rows;
pub mod store;

pub use store::{QueryRow, SqliteStore};
