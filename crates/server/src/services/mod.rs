//! Application services on top of the Armtek layer and the stores.

pub mod characteristics;
pub mod credentials;
pub mod query;
pub mod search_flow;
pub mod secrets;

pub use characteristics::{CharacteristicsRecord, CharacteristicsStore, CharacteristicsUpdate};
pub use credentials::{CredentialService, CredentialSource, CredentialSummary};
pub use search_flow::{BulkInput, SearchFlow, SearchOutcome};
pub use secrets::SecretCipher;
