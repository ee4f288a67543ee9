pub mod accounts;
pub mod manager;
pub mod models;
pub mod page;
pub mod query_builder;
pub mod record;
pub mod repository;

pub use accounts::{AccountError, AccountStore, PgAccountStore};
pub use manager::{DatabaseError, DatabaseManager};
pub use page::{Page, PageRequest};
pub use record::{RecordError, RecordInput};
pub use repository::{EntityRepository, PgRepository, RepositoryError};
