use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

pub type ServiceResult<T> = Result<T, AppError>;
pub type ServiceResponse<T> = ServiceResult<Json<T>>;

#[track_caller]
pub fn unexpected<T, E: Into<anyhow::Error>>(e: E) -> ServiceResult<T> {
    let caller = std::panic::Location::caller();
    error!("An unexpected error has occurred at {caller}: {}", e.into());
    Err(AppError::Unexpected)
}

#[derive(Debug)]
pub enum AppError {
    Unexpected,
    Unauthorized,
    DecodingRequestFailed,
    InternalServerError(&'static str),

    CommunitiesNotFound,
    CommunitiesNotMember,

    ContainersInvalidKey,

    ConversationsNotFound,
    ConversationsNotParticipant,
    ConversationsSelfConversation,

    GroupsNotFound,
    GroupsUnauthorized,
    GroupsNotMember,
    GroupsAlreadyMember,
    GroupsLastAdmin,
    GroupsInvalidName,

    MessagesNotFound,
    MessagesEmpty,
    MessagesInvalidLength,

    SessionsSignedOut,

    SyncInactive,

    UsersNotFound,
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    #[track_caller]
    fn from(e: E) -> Self {
        unexpected::<(), E>(e).unwrap_err()
    }
}

impl AppError {
    pub const fn as_str(&self) -> &str {
        self.code()
    }

    pub const fn code(&self) -> &'static str {
        match self {
            AppError::Unexpected => "unexpected",
            AppError::Unauthorized => "unauthorized",
            AppError::DecodingRequestFailed => "decoding_request_failed",
            AppError::InternalServerError(_) => "internal_server_error",

            AppError::CommunitiesNotFound => "communities.not_found",
            AppError::CommunitiesNotMember => "communities.not_member",

            AppError::ContainersInvalidKey => "containers.invalid_key",

            AppError::ConversationsNotFound => "conversations.not_found",
            AppError::ConversationsNotParticipant => "conversations.not_participant",
            AppError::ConversationsSelfConversation => "conversations.self_conversation",

            AppError::GroupsNotFound => "groups.not_found",
            AppError::GroupsUnauthorized => "groups.unauthorized",
            AppError::GroupsNotMember => "groups.not_member",
            AppError::GroupsAlreadyMember => "groups.already_member",
            AppError::GroupsLastAdmin => "groups.last_admin",
            AppError::GroupsInvalidName => "groups.invalid_name",

            AppError::MessagesNotFound => "messages.not_found",
            AppError::MessagesEmpty => "messages.empty",
            AppError::MessagesInvalidLength => "messages.invalid_length",

            AppError::SessionsSignedOut => "sessions.signed_out",

            AppError::SyncInactive => "sync.inactive",

            AppError::UsersNotFound => "users.not_found",
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            AppError::Unexpected => "An unexpected error has occurred.",
            AppError::Unauthorized => "You are not authorized to perform this action.",
            AppError::DecodingRequestFailed => "Failed to decode request",
            AppError::InternalServerError(_) => "An internal server error has occurred.",

            AppError::CommunitiesNotFound => "Community not found",
            AppError::CommunitiesNotMember => "You are not a member of this community.",

            AppError::ContainersInvalidKey => {
                "Invalid container key (expected `direct:<id>`, `group:<id>` or `community:<id>`)"
            }

            AppError::ConversationsNotFound => "Conversation not found",
            AppError::ConversationsNotParticipant => {
                "You are not a participant of this conversation."
            }
            AppError::ConversationsSelfConversation => {
                "You cannot start a conversation with yourself."
            }

            AppError::GroupsNotFound => "Group chat not found",
            AppError::GroupsUnauthorized => {
                "You do not have sufficient privileges to manage this group."
            }
            AppError::GroupsNotMember => "This user is not a member of this group.",
            AppError::GroupsAlreadyMember => "This user is already a member of this group.",
            AppError::GroupsLastAdmin => "A group must always keep at least one admin.",
            AppError::GroupsInvalidName => "Group names must be between 1 and 64 characters.",

            AppError::MessagesNotFound => "Message not found",
            AppError::MessagesEmpty => "Messages must contain text or a shared post.",
            AppError::MessagesInvalidLength => {
                "Your message was too long. It has not been sent."
            }

            AppError::SessionsSignedOut => "You are not signed in.",

            AppError::SyncInactive => "No conversation is open.",

            AppError::UsersNotFound => "This user does not exist.",
        }
    }

    pub const fn http_status_code(&self) -> StatusCode {
        match self {
            AppError::DecodingRequestFailed
            | AppError::ContainersInvalidKey
            | AppError::ConversationsSelfConversation
            | AppError::GroupsInvalidName
            | AppError::MessagesEmpty
            | AppError::MessagesInvalidLength => StatusCode::BAD_REQUEST,

            AppError::Unauthorized | AppError::SessionsSignedOut => StatusCode::UNAUTHORIZED,

            AppError::CommunitiesNotMember
            | AppError::ConversationsNotParticipant
            | AppError::GroupsUnauthorized
            | AppError::GroupsNotMember => StatusCode::FORBIDDEN,

            AppError::CommunitiesNotFound
            | AppError::ConversationsNotFound
            | AppError::GroupsNotFound
            | AppError::MessagesNotFound
            | AppError::UsersNotFound => StatusCode::NOT_FOUND,

            AppError::GroupsAlreadyMember | AppError::GroupsLastAdmin | AppError::SyncInactive => {
                StatusCode::CONFLICT
            }

            AppError::Unexpected | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The viewer may not see the container, or it no longer exists
    pub const fn is_access_denied(&self) -> bool {
        matches!(
            self,
            AppError::CommunitiesNotFound
                | AppError::CommunitiesNotMember
                | AppError::ConversationsNotFound
                | AppError::ConversationsNotParticipant
                | AppError::GroupsNotFound
                | AppError::GroupsNotMember
        )
    }

    pub const fn response_parts(&self) -> (StatusCode, Json<ErrorResponse>) {
        let status = self.http_status_code();
        let response = ErrorResponse {
            code: self.code(),
            message: self.message(),
        };
        (status, Json(response))
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.response_parts().into_response()
    }
}
