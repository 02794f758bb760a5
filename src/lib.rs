#[cfg(feature = "json")]
extern crate serde_derive;
#[cfg(feature = "json")]
extern crate serde_json;

mod comparator;
mod fileref;
mod orchestrator;
mod path_resolve;
mod sink;
mod size_index;
mod walker;

pub use crate::comparator::{compare_candidate_set, BLOCK_SIZE};
pub use crate::fileref::{dir_ref, DirRef, FileRef};
pub use crate::orchestrator::{Counters, Orchestrator};
#[cfg(feature = "json")]
pub use crate::sink::JsonReportSink;
pub use crate::sink::{ReportSink, SilentSink, TextReportSink};
pub use crate::size_index::{DupOptions, SizeIndex};
