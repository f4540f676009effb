pub mod mirror;
pub mod quality;
pub mod record;
pub mod resolved;

pub use mirror::MirrorEntry;
pub use quality::Quality;
pub use record::{BehaviorHints, ProxyHeaders, StreamRecord, StreamsResponse};
pub use resolved::{HeaderPairs, ResolvedMedia, ResolvedStream, StreamHeaders};
