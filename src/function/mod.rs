pub mod config;
pub mod error;
pub mod payload;
pub mod target;
pub mod probe;
pub mod vulnerability;
pub mod verifier;
pub mod baseline;
pub mod crawler;
pub mod scanner;
pub mod report;

pub use self::config::{Config, ScanSettings};
pub use self::error::ScanError;
pub use self::report::{Evidence, Finding, ReportSink};
pub use self::scanner::{run_scan, ScanPlan, Scanner};
pub use self::target::Target;
pub use self::vulnerability::{DetectionMode, ModeSelection};
