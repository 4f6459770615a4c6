mod logger;
pub mod progress;

pub use logger::{init_logger, log_results_to_file, RESULT_LOG_FILE};
pub use progress::ProgressManager;
