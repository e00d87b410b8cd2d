use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::new("not_found", format!("{} not found", what))
            .with_details(serde_json::json!({ "id": id }))
    }

    /// Maps a storage-layer error, keeping the whole context chain.
    pub fn db(code: &'static str, e: impl std::fmt::Display) -> Self {
        Self::new(code, e.to_string())
    }

    pub fn response(self, id: &str) -> Value {
        tracing::warn!(id, code = self.code, message = %self.message, "request failed");
        err(id, self.code, self.message, self.details)
    }
}

pub type HandlerResult = Result<Value, HandlerErr>;

pub fn respond(req: &Request, result: HandlerResult) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

/// Shorthand for `.map_err(|e| HandlerErr::db(code, e))` on anyhow results.
pub trait DbResultExt<T> {
    fn db_err(self, code: &'static str) -> Result<T, HandlerErr>;
}

impl<T> DbResultExt<T> for anyhow::Result<T> {
    fn db_err(self, code: &'static str) -> Result<T, HandlerErr> {
        self.map_err(|e| HandlerErr::db(code, format!("{e:#}")))
    }
}

impl<T> DbResultExt<T> for rusqlite::Result<T> {
    fn db_err(self, code: &'static str) -> Result<T, HandlerErr> {
        self.map_err(|e| HandlerErr::db(code, e))
    }
}

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Like [`required_str`] but also rejects blank values.
pub fn required_text(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let v = required_str(params, key)?;
    let t = v.trim();
    if t.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(t.to_string())
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Deserializes `params[key]` into `T`.
pub fn required_obj<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    serde_json::from_value(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e)))
}

pub fn required_array<'a>(params: &'a Value, key: &str) -> Result<&'a Vec<Value>, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {} array", key)))
}

/// `null` stays `None`; numbers are clamped into `[0, 100]`.
pub fn score_value(v: &Value, field: &str) -> Result<Option<f64>, HandlerErr> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_f64() {
            Some(x) if x.is_finite() => Ok(Some(x.clamp(0.0, 100.0))),
            _ => Err(HandlerErr::bad_params(format!("{} is not a finite number", field))),
        },
        _ => Err(HandlerErr::bad_params(format!(
            "{} must be a number or null",
            field
        ))),
    }
}

pub fn to_value<T: serde::Serialize>(v: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(v).map_err(|e| HandlerErr::new("io_failed", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scores_are_clamped_or_rejected() {
        assert_eq!(score_value(&json!(null), "s").expect("null"), None);
        assert_eq!(score_value(&json!(105), "s").expect("high"), Some(100.0));
        assert_eq!(score_value(&json!(-3.5), "s").expect("low"), Some(0.0));
        assert_eq!(score_value(&json!(88.5), "s").expect("ok"), Some(88.5));
        let e = score_value(&json!("90"), "s").expect_err("string");
        assert_eq!(e.code, "bad_params");
    }

    #[test]
    fn blank_text_is_rejected() {
        let p = json!({ "name": "   ", "nip": " 1980 " });
        assert_eq!(required_text(&p, "name").expect_err("blank").code, "bad_params");
        assert_eq!(required_text(&p, "nip").expect("nip"), "1980");
        assert!(optional_str(&p, "name").is_none());
    }
}
