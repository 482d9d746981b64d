pub mod job;
pub mod posting;
pub mod search;

pub use job::{EmploymentType, LocationType, NormalizedJob};
pub use posting::{content_hash, RawPosting};
pub use search::{SearchParams, SearchRecord, SearchStatus};
