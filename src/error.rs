use std::fmt::Display;

use jsonwebtoken::errors::Error as JwtError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::{serde_json, Json},
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::rules::{Denial, PhaseError, VoteRejection};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] argon2::Error),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// 404, with a message like "Candidate not found."
    pub fn not_found(what: impl Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found."))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Io(_) | Self::Json(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(_) => Status::Unauthorized,
            Self::Status(status, _) => *status,
        }
    }
}

impl From<PhaseError> for Error {
    fn from(e: PhaseError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<VoteRejection> for Error {
    fn from(e: VoteRejection) -> Self {
        let status = match e {
            VoteRejection::UnknownCandidate => Status::NotFound,
            VoteRejection::Ineligible(_) => Status::Forbidden,
            VoteRejection::AlreadyVoted(_) => Status::Conflict,
            VoteRejection::MissingCandidate
            | VoteRejection::NotOpen
            | VoteRejection::NotStarted
            | VoteRejection::WindowClosed => Status::BadRequest,
        };
        Self::Status(status, e.to_string())
    }
}

impl From<Denial> for Error {
    fn from(e: Denial) -> Self {
        Self::Status(e.status(), e.to_string())
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let message = if status.class() == StatusClass::ServerError {
            // Internal details stay in the log.
            error!("{self}");
            "Internal server error.".to_string()
        } else {
            match self {
                Self::Status(_, message) => message,
                Self::Jwt(_) => "Invalid or expired token.".to_string(),
                other => other.to_string(),
            }
        };
        (status, Json(ErrorMessage { message })).respond_to(req)
    }
}
