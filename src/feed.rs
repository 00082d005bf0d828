//! Streamed feed records.
//!
//! Raw records are JSON objects with a `type` tag. Only three tags matter for
//! book maintenance:
//!
//! | `type` | Required fields | Variant |
//! |--------|-----------------|---------|
//! | `open` | `order_id`, `side`, `price`, `size` or `remaining_size` | [`FeedMessage::Open`] |
//! | `done` | `order_id` or `taker_order_id` | [`FeedMessage::Done`] |
//! | `match` | `order_id` or `taker_order_id` | [`FeedMessage::Match`] |
//!
//! Every other tag parses to [`FeedMessage::Ignored`]. A record with no
//! string `type` is malformed.

use std::fmt;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::{BookError, Result};
use crate::types::{decimal_from_value, Order, Side};

/// Type tag of a feed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Open,
    Done,
    Match,
    /// Any tag irrelevant to book maintenance
    Other,
}

impl MessageKind {
    /// Map a wire tag to its kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "open" => MessageKind::Open,
            "done" => MessageKind::Done,
            "match" => MessageKind::Match,
            _ => MessageKind::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Open => "open",
            MessageKind::Done => "done",
            MessageKind::Match => "match",
            MessageKind::Other => "other",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order entering the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOrder {
    pub order_id: String,
    pub order: Order,
}

impl OpenOrder {
    pub fn new(order_id: impl Into<String>, order: Order) -> Self {
        Self {
            order_id: order_id.into(),
            order,
        }
    }
}

/// An order leaving the book (`done` or `match`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRemoval {
    pub order_id: String,
}

impl OrderRemoval {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
        }
    }
}

/// A parsed feed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Open(OpenOrder),
    Done(OrderRemoval),
    Match(OrderRemoval),
    /// Carries the original tag
    Ignored(String),
}

impl FeedMessage {
    /// Convenience constructor for an `open` record.
    ///
    /// The order is not validated here; the reconstructor rejects a
    /// non-positive price or size when the message is applied.
    pub fn open(order_id: impl Into<String>, side: Side, price: Decimal, size: Decimal) -> Self {
        FeedMessage::Open(OpenOrder::new(order_id, Order::new(side, price, size)))
    }

    /// Convenience constructor for a `done` record.
    pub fn done(order_id: impl Into<String>) -> Self {
        FeedMessage::Done(OrderRemoval::new(order_id))
    }

    /// Convenience constructor for a `match` record.
    pub fn matched(order_id: impl Into<String>) -> Self {
        FeedMessage::Match(OrderRemoval::new(order_id))
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            FeedMessage::Open(_) => MessageKind::Open,
            FeedMessage::Done(_) => MessageKind::Done,
            FeedMessage::Match(_) => MessageKind::Match,
            FeedMessage::Ignored(_) => MessageKind::Other,
        }
    }

    /// Parse a raw JSON text record.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Parse an already-decoded record.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or(BookError::MissingType)?;
        let tag = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(BookError::MissingType)?;

        match MessageKind::from_tag(tag) {
            MessageKind::Open => parse_open(obj).map(FeedMessage::Open),
            MessageKind::Done => parse_removal(obj, "done").map(FeedMessage::Done),
            MessageKind::Match => parse_removal(obj, "match").map(FeedMessage::Match),
            MessageKind::Other => Ok(FeedMessage::Ignored(tag.to_string())),
        }
    }
}

fn parse_open(obj: &Map<String, Value>) -> Result<OpenOrder> {
    const TYPE: &str = "open";

    let order_id = id_field(obj, "order_id")?.ok_or(BookError::MissingField {
        msg_type: TYPE,
        field: "order_id",
    })?;

    let raw_side = obj.get("side").ok_or(BookError::MissingField {
        msg_type: TYPE,
        field: "side",
    })?;
    let side = raw_side
        .as_str()
        .ok_or_else(|| BookError::InvalidSide(raw_side.to_string()))?
        .parse::<Side>()?;

    let price = decimal_field(obj, TYPE, "price")?;

    // `size` wins when both are present
    let quantity = if obj.contains_key("size") {
        decimal_field(obj, TYPE, "size")?
    } else if obj.contains_key("remaining_size") {
        decimal_field(obj, TYPE, "remaining_size")?
    } else {
        return Err(BookError::MissingField {
            msg_type: TYPE,
            field: "size",
        });
    };

    let order = Order::try_new(side, price, quantity)?;
    Ok(OpenOrder { order_id, order })
}

fn parse_removal(obj: &Map<String, Value>, msg_type: &'static str) -> Result<OrderRemoval> {
    let order_id = match id_field(obj, "order_id")? {
        Some(id) => id,
        None => id_field(obj, "taker_order_id")?.ok_or(BookError::MissingField {
            msg_type,
            field: "order_id",
        })?,
    };
    Ok(OrderRemoval { order_id })
}

/// Read an id field as a string. Numeric ids are accepted and stringified.
fn id_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(BookError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

fn decimal_field(
    obj: &Map<String, Value>,
    msg_type: &'static str,
    field: &'static str,
) -> Result<Decimal> {
    let raw = obj
        .get(field)
        .ok_or(BookError::MissingField { msg_type, field })?;
    decimal_from_value(raw).ok_or_else(|| BookError::InvalidField {
        field,
        value: raw.to_string(),
    })
}
