use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use supplier_order_engine::{
    task_queue::JobError,
    OrderApiError,
    PlacementError,
    PriceVerificationError,
    StoreError,
    TwoFactorError,
    ValidationError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    /// The request is valid, but not in the order's or challenge's current state.
    #[error("{0}")]
    Conflict(String),
    #[error("No user id was provided in the sog_user_id header")]
    MissingUserId,
    #[error("The sog_user_id header is not a valid user id. {0}")]
    InvalidUserId(String),
    #[error("The supplier could not be reached. {0}")]
    SupplierError(String),
    #[error("The server cannot accept work right now. {0}")]
    Unavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidUserId(_) => StatusCode::BAD_REQUEST,
            Self::MissingUserId => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::SupplierError(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DatabaseError(_) => Self::BackendError(e.to_string()),
            StoreError::OrderNotFound(_)
            | StoreError::ItemNotFound(..)
            | StoreError::SupplierNotFound(_)
            | StoreError::ProductNotFound(_)
            | StoreError::CredentialNotFound(_) => Self::NoRecordFound(e.to_string()),
            StoreError::InvalidTransition { .. }
            | StoreError::OrderNotEditable(..)
            | StoreError::OrderNotDeletable(_) => Self::Conflict(e.to_string()),
            StoreError::SupplierMismatch { .. } | StoreError::InvalidQuantity(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
        }
    }
}

impl From<JobError> for ServerError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::QueueClosed => Self::Unavailable(e.to_string()),
            _ => Self::BackendError(e.to_string()),
        }
    }
}

impl From<OrderApiError> for ServerError {
    fn from(e: OrderApiError) -> Self {
        match e {
            OrderApiError::Store(e) => e.into(),
            OrderApiError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
        }
    }
}

impl From<ValidationError> for ServerError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Store(e) => e.into(),
            ValidationError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ValidationError::Blocked { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl From<PlacementError> for ServerError {
    fn from(e: PlacementError) -> Self {
        match e {
            PlacementError::Store(e) => e.into(),
            PlacementError::Validation(e) => e.into(),
            PlacementError::Scheduling(e) => e.into(),
            PlacementError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            PlacementError::VerificationHeld(_)
            | PlacementError::PriceReviewRequired(_)
            | PlacementError::NotPlaceable(..) => Self::Conflict(e.to_string()),
            PlacementError::Retryable(..) | PlacementError::Unexpected(..) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<PriceVerificationError> for ServerError {
    fn from(e: PriceVerificationError) -> Self {
        match e {
            PriceVerificationError::Store(e) => e.into(),
            PriceVerificationError::Scheduling(e) => e.into(),
            PriceVerificationError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            PriceVerificationError::NotVerifiable(..) => Self::Conflict(e.to_string()),
            PriceVerificationError::Timeout(_) => Self::SupplierError(e.to_string()),
        }
    }
}

impl From<TwoFactorError> for ServerError {
    fn from(e: TwoFactorError) -> Self {
        match e {
            TwoFactorError::Store(e) => e.into(),
            TwoFactorError::Scheduling(e) => e.into(),
            TwoFactorError::ChallengeNotFound | TwoFactorError::CredentialNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            TwoFactorError::NotPending(_) | TwoFactorError::Expired | TwoFactorError::AttemptsExhausted => {
                Self::Conflict(e.to_string())
            },
            TwoFactorError::Adapter(_) => Self::SupplierError(e.to_string()),
        }
    }
}
