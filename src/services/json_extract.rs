use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ParseError {
    #[error("no JSON object found in model output")]
    NoObject,
    #[error("JSON object in model output could not be decoded: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Returns the balanced `{...}` span that opens earliest in `text`. Braces inside string
/// literals are ignored, so prose or code fences around the object do not confuse the
/// scan. Unclosed braces are skipped in the same pass.
pub(crate) fn first_object(text: &str) -> Option<&str> {
    let mut opens: Vec<usize> = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (index, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' if !opens.is_empty() => in_string = true,
            b'{' => opens.push(index),
            b'}' => {
                let Some(open) = opens.pop() else { continue };
                // Matched pairs are nested or disjoint; keep the one that opens first.
                if best.map_or(true, |(start, _)| open < start) {
                    best = Some((open, index));
                }
                if opens.is_empty() {
                    break;
                }
            }
            _ => {}
        }
    }

    best.map(|(open, close)| &text[open..=close])
}

pub(crate) fn extract_value(text: &str) -> Result<Value, ParseError> {
    let object = first_object(text).ok_or(ParseError::NoObject)?;
    Ok(serde_json::from_str(object)?)
}

pub(crate) fn extract<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let object = first_object(text).ok_or(ParseError::NoObject)?;
    Ok(serde_json::from_str(object)?)
}
