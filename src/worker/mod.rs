pub mod instance_reader;
pub mod parser;
pub mod worker;

pub use instance_reader::InstanceReader;
pub use parser::{parse_logs, ParseResult, ParsedLog};
pub use worker::StakingWorker;
