pub mod collector;
pub mod error;
pub mod feed;
pub mod normalize;
pub mod traits;
pub mod window;

mod retry;

pub use collector::{CollectionOutcome, CollectorConfig, StopReason, WindowCollector};
pub use error::CollectError;
pub use feed::SearchFeedClient;
pub use traits::{FetchedPage, PageFetcher, RawRecord, SourceAdvancer};
pub use window::CollectionWindow;
