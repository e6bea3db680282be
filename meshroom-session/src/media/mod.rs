mod media_source;
mod media_stream;
mod media_track;
mod stream_registry;

pub use media_source::*;
pub use media_stream::*;
pub use media_track::*;
pub use stream_registry::*;
