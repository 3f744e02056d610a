mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::{OutputMode, query_json, run, run_with_format};
pub use util::{parse_output_mode, read_questions};
