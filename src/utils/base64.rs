use base64::{engine::general_purpose, Engine as _};

/// Encodes a string to Base64 format.
pub fn base64_encode(input: &str) -> String {
    general_purpose::STANDARD.encode(input)
}

/// Pads a Base64 string to a multiple of four characters.
///
/// Subscription generators routinely strip padding, so every decode path
/// re-pads before handing the string to the engine.
pub fn base64_pad(input: &str) -> String {
    let mut padded = input.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    padded
}

/// Decodes a Base64 string, tolerating missing padding and URL-safe alphabets.
///
/// # Returns
/// The decoded UTF-8 string, or `None` if the input is not valid Base64
/// (or decodes to invalid UTF-8).
pub fn base64_decode(input: &str) -> Option<String> {
    let padded = base64_pad(input.trim());
    if let Ok(bytes) = general_purpose::STANDARD.decode(padded.as_bytes()) {
        if let Ok(s) = String::from_utf8(bytes) {
            return Some(s);
        }
    }
    let reversed = base64_pad(&url_safe_base64_reverse(input.trim()));
    match general_purpose::STANDARD.decode(reversed.as_bytes()) {
        Ok(bytes) => String::from_utf8(bytes).ok(),
        Err(_) => None,
    }
}

/// Strictly decodes a Base64 string without padding repair.
///
/// Used by the subscription-body sniff, where a lenient decode would
/// misclassify plaintext bodies as Base64.
pub fn base64_decode_strict(input: &str) -> Option<String> {
    match general_purpose::STANDARD.decode(input.as_bytes()) {
        Ok(bytes) => String::from_utf8(bytes).ok(),
        Err(_) => None,
    }
}

/// Reverses a URL-safe Base64 string to standard Base64 format.
pub fn url_safe_base64_reverse(input: &str) -> String {
    input.replace('-', "+").replace('_', "/")
}
