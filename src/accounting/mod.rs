//! The accounting subsystem as slurp sees it.
//!
//! - [`record`]: observed account state ([`AccountRecord`], [`MaxJobs`])
//! - [`parser`]: strict parser for the association listing
//! - [`reader`]: runs the listing query ([`AccountingReader`])
//! - [`command`]: renders intents as accounting commands

pub mod command;
pub mod parser;
pub mod reader;
pub mod record;

pub use parser::{parse_associations, ParsedAssociations};
pub use reader::AccountingReader;
pub use record::{apply_intent, AccountRecord, AccountState, MaxJobs};
