use crate::mail::MailError;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::borrow::Cow;
use tracing::error;
use vain_registry::RegistryError;

/// Failures of an HTTP handler, rendered as plain-text responses.
#[vain_derive::vain_error]
pub enum ApiError {
    #[error("{source}{}", format_context(.context))]
    Registry { source: RegistryError, context: Option<Cow<'static, str>> },

    #[error("Missing bearer token{}", format_context(.context))]
    MissingToken { context: Option<Cow<'static, str>> },

    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("{source}{}", format_context(.context))]
    Mail { source: MailError, context: Option<Cow<'static, str>> },

    #[error("Internal server error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest { message: message.into(), context: None }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Registry { source, .. } => StatusCode::from_u16(source.kind().status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::MissingToken { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Mail { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let retry_after = match &self {
            Self::Registry { source, .. } => source.retry_after(),
            _ => None,
        };

        let mut response = (status, format!("{self}\n")).into_response();
        if let Some(wait) = retry_after {
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
