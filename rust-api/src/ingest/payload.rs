//! Inbound webhook payload parsing and validation.
//!
//! Fields are deserialized leniently and then checked one by one, so a bad
//! payload reports every violation at once instead of the first serde error.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FieldError;
use crate::store::{parse_timestamp, Message, MAX_TEXT_LEN};

lazy_static! {
    /// E.164-like phone number: `+` followed by digits.
    pub static ref MSISDN: Regex = Regex::new(r"^\+\d+$").expect("valid MSISDN pattern");
}

/// Wire shape of `POST /webhook`.
///
/// Fields stay untyped JSON until [`WebhookPayload::validate`] so a wrongly
/// typed field is reported against its own name.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub message_id: Option<Value>,
    pub from: Option<Value>,
    pub to: Option<Value>,
    pub ts: Option<Value>,
    pub text: Option<Value>,
}

/// Parse and validate a raw body into a [`Message`].
pub fn parse_payload(body: &[u8]) -> Result<Message, Vec<FieldError>> {
    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|e| vec![FieldError::new("body", format!("invalid JSON: {e}"))])?;
    payload.validate()
}

/// A payload field after its JSON type has been checked.
enum Field {
    Missing,
    Invalid,
    Present(String),
}

impl Field {
    fn read(name: &str, value: Option<Value>, errors: &mut Vec<FieldError>) -> Self {
        match value {
            None | Some(Value::Null) => Field::Missing,
            Some(Value::String(s)) => Field::Present(s),
            Some(_) => {
                errors.push(FieldError::new(name, "must be a string"));
                Field::Invalid
            }
        }
    }

    /// Like [`Field::read`], but a missing value is a violation too.
    fn required(name: &str, value: Option<Value>, errors: &mut Vec<FieldError>) -> Option<String> {
        match Self::read(name, value, errors) {
            Field::Present(s) => Some(s),
            Field::Invalid => None,
            Field::Missing => {
                errors.push(FieldError::new(name, "field required"));
                None
            }
        }
    }
}

impl WebhookPayload {
    pub fn validate(self) -> Result<Message, Vec<FieldError>> {
        let mut errors = Vec::new();

        let message_id = match Field::required("message_id", self.message_id, &mut errors) {
            Some(id) if id.is_empty() => {
                errors.push(FieldError::new("message_id", "must not be empty"));
                None
            }
            id => id,
        };

        let from = check_msisdn("from", self.from, &mut errors);
        let to = check_msisdn("to", self.to, &mut errors);

        let timestamp = Field::required("ts", self.ts, &mut errors).and_then(|raw| {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                errors.push(FieldError::new("ts", "must be an RFC 3339 date-time"));
            }
            parsed
        });

        let text = match Field::read("text", self.text, &mut errors) {
            Field::Present(text) if text.chars().count() > MAX_TEXT_LEN => {
                errors.push(FieldError::new(
                    "text",
                    format!("must be at most {MAX_TEXT_LEN} characters"),
                ));
                None
            }
            Field::Present(text) => Some(text),
            Field::Missing | Field::Invalid => None,
        };

        match (message_id, from, to, timestamp) {
            (Some(message_id), Some(from), Some(to), Some(timestamp)) if errors.is_empty() => {
                Ok(Message::new(message_id, from, to, timestamp, text))
            }
            _ => Err(errors),
        }
    }
}

fn check_msisdn(
    field: &str,
    value: Option<Value>,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let value = Field::required(field, value, errors)?;
    if !MSISDN.is_match(&value) {
        errors.push(FieldError::new(field, "must match ^\\+\\d+$"));
        return None;
    }
    Some(value)
}
