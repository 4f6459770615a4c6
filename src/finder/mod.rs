pub mod cache;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod keywords;
pub mod matcher;
pub mod util;
pub mod walk;

pub use cache::{DirectoryCache, Fingerprint};
pub use cancel::CancellationToken;
pub use classify::ContentClass;
pub use config::{sort_by_size, FinderConfig, MatchResult, SearchRequest, SortOrder};
pub use coordinator::{SearchOutcome, Searcher};
pub use error::{FinderError, Result};
pub use events::{SearchEvent, SearchObserver};
pub use keywords::{parse_extensions, parse_keywords};
pub use matcher::{match_file, FileMatcher, MatchTerms};
