pub mod git;

pub use git::{GitTracker, VersionControl};
