use actix_web::{http::StatusCode, HttpResponse, ResponseError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Profile not found")]
    ProfileNotFound,

    #[error("Referrer not found")]
    ReferrerNotFound,

    #[error("Nothing to collect")]
    NothingToCollect,

    #[error("Already checked in today")]
    AlreadyCheckedIn,

    #[error("Task already completed")]
    TaskAlreadyCompleted,

    #[error("Task already completed today")]
    TaskAlreadyCompletedToday,

    #[error("Task already completed this week")]
    TaskAlreadyCompletedThisWeek,

    #[error("Invalid referral code")]
    InvalidReferralCode,

    #[error("Cannot refer yourself")]
    SelfReferral,

    #[error("User already has a referrer")]
    AlreadyReferred,

    #[error("Internal server error")]
    Db(#[from] sqlx::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ProfileNotFound | ApiError::ReferrerNotFound => StatusCode::NOT_FOUND,
            ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Db(e) = self {
            log::error!("❌ Database error: {}", e);
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "ok": false,
            "error": self.to_string()
        }))
    }
}
