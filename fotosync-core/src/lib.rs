mod client;

pub use client::{ApiErrorClass, StorageClient, StorageError};
