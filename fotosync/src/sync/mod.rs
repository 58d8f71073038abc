pub mod differ;
pub mod error;
pub mod listing;
pub mod names;
pub mod progress;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod uploader;

#[cfg(test)]
pub(crate) mod testing;
