//! Structural validation of inbound input messages.
//!
//! [`validate`] is a cheap shape gate: it checks that the `"type"` is a known
//! input kind and that every field has the expected primitive type.  It does
//! **not** check ranges; a `move` with `dx = 80000` is valid here and is
//! narrowed later by [`crate::sanitize`].  The distinction matters: a value
//! that is merely too large still carries the user's intent (a fast drag),
//! while a value of the wrong type carries none.
//!
//! Rejections are dropped silently at the protocol level, but every rejection
//! carries a [`Rejection`] reason so callers can log it and tests can assert
//! on it.
//!
//! # Why not plain `serde` deserialisation?
//!
//! Serde would happily coerce or default some of these shapes, and its error
//! messages are not a closed set.  Checking by hand keeps the acceptance rules
//! explicit and lets us reject non-finite numbers that arrive through
//! programmatic construction of a [`Value`].

use serde_json::{Map, Value};
use thiserror::Error;

use super::messages::{InputKind, InputMessage, MouseButton};

/// Why a message was refused by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string `type` field")]
    MissingKind,

    #[error("unknown message kind `{0}`")]
    UnknownKind(String),

    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{0}` must be a finite number")]
    NotFinite(&'static str),

    #[error("unknown mouse button `{0}`")]
    UnknownButton(String),

    #[error("scroll needs at least one of `dx` or `dy`")]
    NoScrollAxis,
}

/// Validates a parsed JSON value and converts it into an [`InputMessage`].
///
/// # Errors
///
/// Returns a [`Rejection`] describing the first problem found.
///
/// # Example
///
/// ```rust
/// use rein_core::{validate, InputMessage};
/// use serde_json::json;
///
/// let msg = validate(&json!({"type": "move", "dx": 4, "dy": -2})).unwrap();
/// assert_eq!(msg, InputMessage::Move { dx: 4.0, dy: -2.0 });
/// ```
pub fn validate(raw: &Value) -> Result<InputMessage, Rejection> {
    let obj = raw.as_object().ok_or(Rejection::NotAnObject)?;
    let kind_name = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(Rejection::MissingKind)?;
    let kind =
        InputKind::from_wire(kind_name).ok_or_else(|| Rejection::UnknownKind(kind_name.into()))?;

    match kind {
        InputKind::Move => Ok(InputMessage::Move {
            dx: required_number(obj, "dx")?,
            dy: required_number(obj, "dy")?,
        }),
        InputKind::Click => {
            let button = required_str(obj, "button")?;
            let button = MouseButton::from_wire(button)
                .ok_or_else(|| Rejection::UnknownButton(button.to_string()))?;
            let press = match obj.get("press") {
                Some(Value::Bool(b)) => *b,
                Some(_) => {
                    return Err(Rejection::WrongType {
                        field: "press",
                        expected: "a boolean",
                    })
                }
                None => return Err(Rejection::MissingField("press")),
            };
            Ok(InputMessage::Click { button, press })
        }
        InputKind::Scroll => {
            let dx = optional_number(obj, "dx")?;
            let dy = optional_number(obj, "dy")?;
            if dx.is_none() && dy.is_none() {
                return Err(Rejection::NoScrollAxis);
            }
            Ok(InputMessage::Scroll {
                dx: dx.unwrap_or(0.0),
                dy: dy.unwrap_or(0.0),
            })
        }
        InputKind::Zoom => Ok(InputMessage::Zoom {
            delta: required_number(obj, "delta")?,
        }),
        InputKind::Key => Ok(InputMessage::Key {
            key: required_str(obj, "key")?.to_string(),
        }),
        InputKind::Text => Ok(InputMessage::Text {
            text: required_str(obj, "text")?.to_string(),
        }),
        InputKind::Combo => {
            let keys = match obj.get("keys") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(Rejection::WrongType {
                        field: "keys",
                        expected: "an array of strings",
                    })
                }
                None => return Err(Rejection::MissingField("keys")),
            };
            let keys = keys
                .iter()
                .map(|k| {
                    k.as_str().map(str::to_string).ok_or(Rejection::WrongType {
                        field: "keys",
                        expected: "an array of strings",
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(InputMessage::Combo { keys })
        }
        InputKind::ClipboardCopy => Ok(InputMessage::ClipboardCopy),
        InputKind::ClipboardPaste => {
            let text = match obj.get("text") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(_) => {
                    return Err(Rejection::WrongType {
                        field: "text",
                        expected: "a string",
                    })
                }
            };
            Ok(InputMessage::ClipboardPaste { text })
        }
    }
}

// ── Field helpers ─────────────────────────────────────────────────────────────

fn required_number(obj: &Map<String, Value>, field: &'static str) -> Result<f64, Rejection> {
    optional_number(obj, field)?.ok_or(Rejection::MissingField(field))
}

/// `Ok(None)` when the field is absent.  A present field must be a finite
/// number; `null` counts as present (it is what `NaN` becomes in JSON).
fn optional_number(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<f64>, Rejection> {
    match obj.get(field) {
        None => Ok(None),
        Some(Value::Number(n)) => {
            let v = n.as_f64().ok_or(Rejection::NotFinite(field))?;
            if v.is_finite() {
                Ok(Some(v))
            } else {
                Err(Rejection::NotFinite(field))
            }
        }
        Some(_) => Err(Rejection::WrongType {
            field,
            expected: "a finite number",
        }),
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, Rejection> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(Rejection::WrongType {
            field,
            expected: "a string",
        }),
        None => Err(Rejection::MissingField(field)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
