//! Share links: the board serialised into a URL fragment.

use super::model::Canvas;
use super::{CanvasError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

const FRAGMENT_KEY: &str = "#canvas=";

/// Encodes `canvas` as `<base>#canvas=<base64url json>`.
pub fn encode(base: &str, canvas: &Canvas) -> Result<String> {
    let json = serde_json::to_vec(canvas)?;
    let base = base.split('#').next().unwrap_or_default();
    Ok(format!("{}{}{}", base, FRAGMENT_KEY, URL_SAFE_NO_PAD.encode(json)))
}

/// Decodes a share link, or a bare payload, back into a canvas.
pub fn decode(link: &str) -> Result<Canvas> {
    let payload = link
        .split_once(FRAGMENT_KEY)
        .map(|(_, payload)| payload)
        .unwrap_or(link)
        .trim();

    // Other fragment parameters may follow the payload
    let payload = payload.split('&').next().unwrap_or_default();

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| CanvasError::InvalidShareLink(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| CanvasError::InvalidShareLink(e.to_string()))
}
