pub mod cull;
pub mod ingest;
pub mod report;
pub mod scanner;
pub mod similarity;

pub use cull::Culler;
pub use ingest::{IngestError, IngestionLoop, PassSummary, TickOutcome};
pub use report::{ReportError, ReportWriter};
pub use scanner::{ScanOptions, ScannerService};
pub use similarity::{OracleError, PerceptualOracle, SimilarityOracle};
