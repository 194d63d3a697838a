//! Dependency-tree preloader, load queue, and small-object block allocator
//! sitting on top of the factory.

#![warn(missing_docs)]

mod block_allocator;
mod error;
mod hints;
mod preloader;
mod queue;
mod request;
mod stream;

pub use block_allocator::{BlockAllocator, BlockHandle};
pub use error::{PreloaderError, PreloaderResult};
pub use hints::{HintStage, NoHints, PreloadHintProvider};
pub use preloader::{HintProviderMap, Preloader, PreloaderStatus, RootOutcome};
pub use queue::{LoadQueue, QueueMode, BYTES_WAITING_THROTTLE, QUEUE_SLOTS};
pub use request::{NodeIx, NodePool, NodeResult, PreloadNode, MAX_REQUESTS};
pub use stream::{preload_data, StreamChunk};
