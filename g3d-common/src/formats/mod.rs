//! G3D model encoders
//!
//! Both encoders lower the model into the same [`Value`] tree:
//! - [`text`] - `.g3dj`, indented JSON with attribute-aware line breaks
//! - [`binary`] - `.g3db`, UBJSON

pub mod binary;
pub mod text;
pub mod value;

pub use binary::{encode_binary, write_value};
pub use text::{encode_text, format_float};
pub use value::{ToValue, Value, INDICES_PER_ROW};

/// File extension for text models
pub const TEXT_EXTENSION: &str = "g3dj";
/// File extension for binary models
pub const BINARY_EXTENSION: &str = "g3db";
