//! Plan artifact import.
//!
//! The importer is strict about shape and lenient about encoding: a plan may
//! be JSON or a CMake list file, but it must carry all three collections and
//! the transform/append lists must line up one-to-one. Entry order is kept
//! exactly as written because positions encode the rewrite mapping.

mod cmake;
mod load;

pub use load::{PlanFormat, PlanLoadError, load_plan, parse_plan};
