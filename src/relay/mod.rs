pub mod registry;
pub mod stream;

pub use registry::CancellationRegistry;
pub use stream::StreamRelay;
