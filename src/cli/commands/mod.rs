//! CLI command implementations.

mod config;
mod delete;
mod doctor;
mod list;
mod reprocess;
mod search;
mod serve;
mod show;
mod transcribe;

pub use config::run_config;
pub use delete::run_delete;
pub use doctor::run_doctor;
pub use list::run_list;
pub use reprocess::run_reprocess;
pub use search::run_search;
pub use serve::run_serve;
pub use show::run_show;
pub use transcribe::run_transcribe;
