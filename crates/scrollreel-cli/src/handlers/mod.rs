//! Command handlers - extracted from main.rs for testability

pub mod record;

pub use record::{
    browser_config, execute_record, exit_code, render_record_json, render_record_text,
    RecordSummary, EXIT_COMPLETE, EXIT_DEGRADED, EXIT_FATAL, EXIT_IMAGE_FAILED,
};
