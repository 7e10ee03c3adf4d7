pub mod blob_store;
pub mod content_generator;
pub mod image_provider;

pub use blob_store::BlobStoreClient;
pub use content_generator::ContentGeneratorClient;
pub use image_provider::ImageProviderClient;
