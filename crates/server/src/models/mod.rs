//! Domain models persisted by the stores.

pub mod product;
pub mod provider_account;
pub mod search_request;

pub use product::{Product, ProductDraft};
pub use provider_account::ProviderAccount;
pub use search_request::SearchRequest;
