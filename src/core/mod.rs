pub mod duplicate;
pub mod exif;
pub mod hash;
pub mod image;
pub mod ledger;

pub use self::duplicate::{canonicalize, CanonicalSignature, Canonicalized, PairCanonicalizer};
pub use self::exif::ExifService;
pub use self::hash::HashService;
pub use self::image::{DuplicateRecord, ImageIdentifier, SimilarityObservation};
pub use self::ledger::{DirectoryLedger, DirectoryState, LedgerError};
