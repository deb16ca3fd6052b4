//! ASCII convention for channel traffic.
//!
//! Text programs exchange one character per value, lines terminated by 10.
//! A value outside the ASCII range conventionally carries a numeric answer
//! and ends the text.

use crate::virtual_machine::channel::Channel;
use crate::virtual_machine::memory::Value;

pub const NEWLINE: Value = 10;

/// Converts a value to its ASCII character, if it is one.
pub fn to_char(value: Value) -> Option<char> {
    u8::try_from(value)
        .ok()
        .filter(u8::is_ascii)
        .map(char::from)
}

/// Encodes `text` followed by a newline.
pub fn encode_line(text: &str) -> Vec<Value> {
    text.chars()
        .map(|c| Value::from(u32::from(c)))
        .chain(std::iter::once(NEWLINE))
        .collect()
}

/// Queues `text` and a terminating newline on `channel`.
pub fn push_line(channel: &Channel, text: &str) {
    for value in encode_line(text) {
        channel.send(value);
    }
}

/// Splits output into its text and the first non-ASCII value.
///
/// Values after the non-ASCII one are ignored.
pub fn decode(values: &[Value]) -> (String, Option<Value>) {
    let mut text = String::with_capacity(values.len());
    for &value in values {
        match to_char(value) {
            Some(c) => text.push(c),
            None => return (text, Some(value)),
        }
    }
    (text, None)
}
