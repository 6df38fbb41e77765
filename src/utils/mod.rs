pub mod base64;
pub mod string;

pub use base64::{base64_decode, base64_decode_strict, base64_encode, base64_pad};
pub use string::{is_uuid, normalize_remark, unescape_json_literal, url_decode};
