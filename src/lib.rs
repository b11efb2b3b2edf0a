pub mod agent;
pub mod config;
pub mod errors;
pub mod github;
pub mod logging;
pub mod orchestrator;
pub mod phase;
pub mod state;
pub mod tracker;
pub mod util;
