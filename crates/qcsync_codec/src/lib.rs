//! # qcsync Codec
//!
//! Closed value model and canonical text codec for qcsync.
//!
//! Every piece of data that crosses the statement executor or the wire
//! is expressed as a [`Value`]: null, bool, integer, float, text, ordered
//! sequences and string-keyed maps. The text form is JSON with sorted map
//! keys, so identical values always produce identical text.
//!
//! ## Usage
//!
//! ```
//! use qcsync_codec::{decode_arguments, encode_arguments, Value};
//!
//! let args = vec![Value::from("x"), Value::Integer(1)];
//! let text = encode_arguments(&args).unwrap();
//! assert_eq!(text, r#"["x",1]"#);
//! assert_eq!(decode_arguments(&text).unwrap(), args);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod text;
mod value;

pub use error::{CodecError, CodecResult};
pub use text::{decode_arguments, encode_arguments, from_text, to_text};
pub use value::Value;
