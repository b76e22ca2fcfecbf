//! Study Buddy Core
//!
//! Everything a study-buddy voice agent needs besides the voice pipeline
//! itself: prompt templating, the tools the language model calls, the session
//! ledger and the end-of-session report.

pub mod agent;
pub mod display;
pub mod documents;
pub mod generic_types;
pub mod ledger;
pub mod shutdown;
pub mod summary;
pub mod template;
pub mod usage;
