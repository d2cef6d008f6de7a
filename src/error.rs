use chrono::NaiveDate;
use ulid::Ulid;

use crate::engine::Shortfall;
use crate::model::{BookingStatus, Resource};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input, rejected before anything is persisted.
    #[error("invalid booking: {0}")]
    Validation(String),

    /// Requested capacity exceeds what is left on some date.
    #[error("{resource} unavailable on {date}: requested {requested}, available {available}")]
    Availability {
        date: NaiveDate,
        resource: Resource,
        requested: u32,
        available: u32,
    },

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("payment rejected: {0}")]
    Payment(String),

    #[error("booking not found: {0}")]
    NotFound(Ulid),

    #[error("booking {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Ulid,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

impl Error {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Availability { .. } => "availability",
            Error::Storage(_) => "storage",
            Error::Payment(_) => "payment",
            Error::NotFound(_) => "not_found",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::LimitExceeded(_) => "limit_exceeded",
        }
    }
}

impl From<Shortfall> for Error {
    fn from(s: Shortfall) -> Self {
        Error::Availability {
            date: s.date,
            resource: s.resource,
            requested: s.requested,
            available: s.available,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
