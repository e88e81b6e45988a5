pub mod local;

pub use local::LocalEncryptionProvider;
