//! Error translation: outcome to status + JSON error body.
//!
//! Every failed call gets the same shape, whatever went wrong:
//!
//! ```text
//! {"errors":[{"msg":"The 'message' parameter is missing"}]}
//! ```

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::warn;

use crate::error::{Message, WsError};
use crate::i18n::I18n;
use crate::response::{ContentType, Response};
use crate::status::Status;

/// Text sent for any failure the caller is not meant to see the details of.
pub const UNEXPECTED_MESSAGE: &str = "Unexpected";

#[derive(Serialize)]
struct ErrorBody<'m> {
    errors: Vec<ErrorEntry<'m>>,
}

#[derive(Serialize)]
struct ErrorEntry<'m> {
    msg: &'m str,
}

/// Renders messages in one caller's locale.
pub struct Translator<'a> {
    i18n: Option<&'a dyn I18n>,
    locale: &'a str,
}

impl<'a> Translator<'a> {
    pub fn new(i18n: Option<&'a dyn I18n>, locale: &'a str) -> Self {
        Self { i18n, locale }
    }

    /// Literal text verbatim; keys through the translator, or the key itself.
    pub fn render(&self, message: &Message) -> String {
        match message {
            Message::Text(text) => text.clone(),
            Message::Key { key, args } => self
                .i18n
                .and_then(|i18n| self.translate(i18n, key, args))
                .unwrap_or_else(|| key.clone()),
        }
    }

    /// A translator that panics counts as having no translation.
    fn translate(&self, i18n: &dyn I18n, key: &str, args: &[String]) -> Option<String> {
        match panic::catch_unwind(AssertUnwindSafe(|| i18n.message(self.locale, key, key, args))) {
            Ok(text) => text,
            Err(_) => {
                warn!(key, locale = self.locale, "message translation panicked");
                None
            }
        }
    }

    /// Status for an error outcome. `None` for a client abort: nothing is
    /// written for a caller that is gone.
    pub fn status_of(err: &WsError) -> Option<Status> {
        if err.is_client_abort() {
            return None;
        }
        match err {
            WsError::BadRequest(_) | WsError::Bug(_) => Some(Status::BadRequest),
            WsError::Unexpected(_) | WsError::ClientAbort(_) => Some(Status::InternalServerError),
        }
    }

    /// Serialized `{"errors":[...]}` body for `err`.
    pub fn error_body(&self, err: &WsError) -> Vec<u8> {
        let texts: Vec<String> = match err {
            WsError::BadRequest(errors) => errors.messages().iter().map(|m| self.render(m)).collect(),
            WsError::Bug(message) => vec![message.clone()],
            WsError::Unexpected(_) | WsError::ClientAbort(_) => vec![UNEXPECTED_MESSAGE.to_owned()],
        };
        encode(&texts)
    }

    /// Writes the status, media type and error body for `err` into `response`.
    pub(crate) fn write_error(&self, err: &WsError, response: &mut Response) -> Result<(), WsError> {
        let Some(status) = Self::status_of(err) else {
            return Ok(());
        };
        response.set_status(status);
        response.set_content_type(ContentType::Json);
        response.write_body(&self.error_body(err))
    }
}

fn encode(texts: &[String]) -> Vec<u8> {
    let body = ErrorBody {
        errors: texts.iter().map(|msg| ErrorEntry { msg }).collect(),
    };
    // Serializing plain strings cannot fail; keep the shape even if it did.
    serde_json::to_vec(&body).unwrap_or_else(|_| br#"{"errors":[]}"#.to_vec())
}
