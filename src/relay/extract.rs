//! Best-effort extraction of notification fields from monday.com payloads.
//!
//! Automation webhooks wrap the useful data in `payload` (with board and item
//! ids sometimes only on `event`), while the board UI posts flat objects. Every
//! logical field is resolved through an ordered list of aliases; the first
//! present value wins. Nothing here fails: validation happens in the service.

use serde_json::{Map, Value};

use crate::error::RelayError;
use crate::relay::request::{NotificationRequest, ProviderCredentials};

const ADDRESSEE_KEYS: &[&str] = &["phone_number", "phone", "to"];
const MESSAGE_KEYS: &[&str] = &["message", "body", "text"];
const SENDER_KEYS: &[&str] = &["sender_id", "sender"];
const ACCOUNT_ID_KEYS: &[&str] = &["nimba_sid", "sid"];
const ACCOUNT_SECRET_KEYS: &[&str] = &["nimba_secret", "secret"];
const EVENT_BOARD_KEYS: &[&str] = &["boardId"];
const EVENT_ITEM_KEYS: &[&str] = &["itemId", "pulseId", "pulse_id"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFields {
    pub addressees: Vec<String>,
    pub message: Option<String>,
    pub sender_id: Option<String>,
    pub account_id: Option<String>,
    pub account_secret: Option<String>,
    pub board_id: Option<i64>,
    pub item_id: Option<i64>,
    pub status_column_id: Option<String>,
    pub status_label: Option<String>,
    pub update_body: Option<String>,
    pub dry_run: bool,
}

impl CandidateFields {
    pub fn credentials(&self) -> Option<ProviderCredentials> {
        ProviderCredentials::from_parts(self.account_id.clone(), self.account_secret.clone())
    }

    pub fn into_request(self) -> Result<NotificationRequest, RelayError> {
        let credentials = self.credentials();
        let message = match self.message {
            Some(message) if !self.addressees.is_empty() => message,
            _ => {
                return Err(RelayError::BadRequest(
                    "missing number or message".to_string(),
                ));
            }
        };
        Ok(NotificationRequest {
            addressees: self.addressees,
            message,
            sender_id: self.sender_id,
            credentials,
            board_id: self.board_id,
            item_id: self.item_id,
            status_column_id: self.status_column_id,
            status_label: self.status_label,
            update_body: self.update_body,
            dry_run: self.dry_run,
        })
    }
}

pub fn extract(raw: &Value) -> CandidateFields {
    let empty = Map::new();
    let root = raw.as_object().unwrap_or(&empty);
    let payload = root
        .get("payload")
        .and_then(Value::as_object)
        .unwrap_or(root);
    let event = root
        .get("event")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let board_id = first_present(payload, &["board_id"])
        .and_then(coerce_id)
        .or_else(|| first_present(event, EVENT_BOARD_KEYS).and_then(coerce_id));
    let item_id = first_present(payload, &["item_id"])
        .and_then(coerce_id)
        .or_else(|| first_present(event, EVENT_ITEM_KEYS).and_then(coerce_id));

    CandidateFields {
        addressees: first_present(payload, ADDRESSEE_KEYS)
            .map(coerce_addressees)
            .unwrap_or_default(),
        message: text_field(payload, MESSAGE_KEYS),
        sender_id: text_field(payload, SENDER_KEYS),
        account_id: text_field(payload, ACCOUNT_ID_KEYS),
        account_secret: text_field(payload, ACCOUNT_SECRET_KEYS),
        board_id,
        item_id,
        status_column_id: text_field(payload, &["status_column_id"]),
        status_label: text_field(payload, &["status_label"]),
        update_body: text_field(payload, &["update_body"]),
        dry_run: payload.get("dry_run").map(is_truthy).unwrap_or(false),
    }
}

/// A key counts as present when its value is not null, `""` or `[]`.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| is_present(value))
}

pub fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_present(object, keys).and_then(coerce_text)
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn coerce_addressees(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(coerce_text).collect(),
        other => coerce_text(other).into_iter().collect(),
    }
}

fn coerce_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|n| n.trunc() as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (id != 0).then_some(id)
}
