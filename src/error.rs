use crate::domain::address::Address;
use crate::domain::codec::CodecError;
use crate::domain::coins::Coins;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisbursementError {
    #[error("transfer list holds {count} records, the limit is {max}")]
    OversizedList { count: usize, max: usize },
    #[error("insufficient funding: {required} required, {supplied} supplied")]
    InsufficientFunding { required: Coins, supplied: Coins },
    #[error("caller {caller} is not authorized to continue this job")]
    Unauthorized { caller: Address, supplied: Coins },
    #[error("malformed transfer encoding: {0}")]
    MalformedEncoding(#[from] CodecError),
    #[error("persisted job state is inconsistent: {0}")]
    CorruptState(String),
    #[error("a job with {count} transfers needs a controller (single-step limit is {quota})")]
    ControllerRequired { count: usize, quota: usize },
    #[error("job {job} is already finished")]
    AlreadyFinished { job: String, supplied: Coins },
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error("job {0} already exists")]
    JobAlreadyExists(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("arithmetic overflow while computing {0}")]
    ArithmeticOverflow(&'static str),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
    #[error("activation aborted: {source}")]
    Aborted {
        #[source]
        source: Box<DisbursementError>,
        supplied: Coins,
    },
}

impl DisbursementError {
    /// Value that goes back to the caller when an activation aborts.
    pub fn refund(&self) -> Option<Coins> {
        match self {
            DisbursementError::InsufficientFunding { supplied, .. }
            | DisbursementError::Unauthorized { supplied, .. }
            | DisbursementError::AlreadyFinished { supplied, .. }
            | DisbursementError::Aborted { supplied, .. } => Some(*supplied),
            _ => None,
        }
    }

    /// Marks `self` as the abort of an activation that brought `supplied`.
    ///
    /// Errors that already carry their refund are returned unchanged.
    pub fn aborting(self, supplied: Coins) -> Self {
        if self.refund().is_some() {
            return self;
        }
        DisbursementError::Aborted {
            source: Box::new(self),
            supplied,
        }
    }

    /// The underlying failure, looking through [`DisbursementError::Aborted`].
    pub fn cause(&self) -> &DisbursementError {
        match self {
            DisbursementError::Aborted { source, .. } => source.cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, DisbursementError>;
