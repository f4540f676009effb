pub mod default;
pub mod error;
pub mod handler;
pub mod hls;
pub mod providers;
pub mod registry;

pub use error::ExtractorError;
pub use handler::{Extractor, Resolution, ResolveContext, StreamHandler};
pub use registry::{ProviderDescriptor, ProviderRegistry};
