//! Container registry credential adapters.
//!
//! Each registry provider implements [`registry::RegistryAdapter`]: building a
//! credential from a request payload, validating it (field rules plus a live
//! login check), encrypting its secrets for storage and listing the images it
//! can reach.

pub mod encryption;
pub mod error;
pub mod registry;
pub mod settings;

pub use error::RegistryError;
pub use registry::{new_adapter, AdapterContext, RegistryAdapter, RegistryType};
