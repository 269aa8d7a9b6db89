//! Input table and output reports

pub mod tables;

pub use tables::{read_input, write_results, write_roster, ROSTER_HEADER};
