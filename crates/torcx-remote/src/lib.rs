mod fetch;
mod store;

pub use fetch::{image_url, RemoteFetcher};
pub use store::{RemoteEntry, RemoteStore, REMOTE_MANIFEST_FILE};

#[cfg(test)]
mod tests;
