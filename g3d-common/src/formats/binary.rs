//! `.g3db` binary encoder
//!
//! UBJSON in the dialect read by libGDX's `UBJsonReader` with `oldFormat` enabled.
//! All multi-byte values are big-endian.
//!
//! | Marker | Payload |
//! |--------|---------|
//! | `i` | int16 |
//! | `I` | int32 |
//! | `L` | int64 |
//! | `d` | float32 |
//! | `S` | size, then UTF-8 bytes |
//! | `[` | `#` size, then that many values |
//! | `{` | `#` size, then that many (key, value) pairs; keys are size + bytes |
//!
//! A size is itself tagged: `i` + u8, `I` + u16 or `l` + u32, whichever is smallest.

use std::io::{self, Write};

use super::value::{ToValue, Value};

const MARKER_INT16: u8 = b'i';
const MARKER_INT32: u8 = b'I';
const MARKER_INT64: u8 = b'L';
const MARKER_FLOAT32: u8 = b'd';
const MARKER_STRING: u8 = b'S';
const MARKER_ARRAY: u8 = b'[';
const MARKER_OBJECT: u8 = b'{';
const MARKER_COUNT: u8 = b'#';

const SIZE_U8: u8 = b'i';
const SIZE_U16: u8 = b'I';
const SIZE_U32: u8 = b'l';

/// Encode a model (or any lowered value) as `.g3db` bytes.
///
/// Fails only when a container holds more than `u32::MAX` elements.
pub fn encode_binary<T: ToValue + ?Sized>(value: &T) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    write_value(&mut out, &value.to_value())?;
    Ok(out)
}

/// Stream a value tree to any writer
pub fn write_value<W: Write>(w: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Int(v) => write_int(w, *v),
        Value::Float(v) => {
            w.write_all(&[MARKER_FLOAT32])?;
            w.write_all(&v.to_be_bytes())
        }
        Value::Str(s) => {
            w.write_all(&[MARKER_STRING])?;
            write_sized_bytes(w, s.as_bytes())
        }
        Value::Array(items) | Value::Rows { items, .. } => {
            w.write_all(&[MARKER_ARRAY, MARKER_COUNT])?;
            write_size(w, items.len())?;
            for item in items {
                write_value(w, item)?;
            }
            Ok(())
        }
        Value::Object(fields) => {
            w.write_all(&[MARKER_OBJECT, MARKER_COUNT])?;
            write_size(w, fields.len())?;
            for (key, item) in fields {
                write_sized_bytes(w, key.as_bytes())?;
                write_value(w, item)?;
            }
            Ok(())
        }
    }
}

fn write_int<W: Write>(w: &mut W, value: i64) -> io::Result<()> {
    if let Ok(v) = i16::try_from(value) {
        w.write_all(&[MARKER_INT16])?;
        w.write_all(&v.to_be_bytes())
    } else if let Ok(v) = i32::try_from(value) {
        w.write_all(&[MARKER_INT32])?;
        w.write_all(&v.to_be_bytes())
    } else {
        w.write_all(&[MARKER_INT64])?;
        w.write_all(&value.to_be_bytes())
    }
}

fn write_size<W: Write>(w: &mut W, size: usize) -> io::Result<()> {
    if let Ok(v) = u8::try_from(size) {
        w.write_all(&[SIZE_U8, v])
    } else if let Ok(v) = u16::try_from(size) {
        w.write_all(&[SIZE_U16])?;
        w.write_all(&v.to_be_bytes())
    } else {
        let v = u32::try_from(size).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "container too large for UBJSON")
        })?;
        w.write_all(&[SIZE_U32])?;
        w.write_all(&v.to_be_bytes())
    }
}

fn write_sized_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    write_size(w, bytes.len())?;
    w.write_all(bytes)
}
