//! PEM encoding helpers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::signature::SignatureError;

/// Extracts the DER bytes of the first PEM block.
///
/// Input without PEM armour is treated as bare base64.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>, SignatureError> {
    pem_blocks(pem)?
        .into_iter()
        .next()
        .map(|(_, der)| der)
        .ok_or_else(|| SignatureError::InvalidKey("no PEM block found".to_string()))
}

/// Extracts every PEM block as `(label, der)` pairs.
pub fn pem_blocks(pem: &str) -> Result<Vec<(String, Vec<u8>)>, SignatureError> {
    if !pem.contains("-----BEGIN ") {
        let cleaned: String = pem.chars().filter(|c| !c.is_whitespace()).collect();
        if cleaned.is_empty() {
            return Ok(Vec::new());
        }
        let der = STANDARD
            .decode(cleaned)
            .map_err(|e| SignatureError::InvalidKey(format!("invalid base64: {e}")))?;
        return Ok(vec![(String::new(), der)]);
    }

    let mut blocks = Vec::new();
    let mut label: Option<String> = None;
    let mut body = String::new();

    for line in pem.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("-----BEGIN ") {
            label = Some(rest.trim_end_matches('-').to_string());
            body.clear();
        } else if line.starts_with("-----END ") {
            if let Some(l) = label.take() {
                let der = STANDARD
                    .decode(&body)
                    .map_err(|e| SignatureError::InvalidKey(format!("invalid PEM body: {e}")))?;
                blocks.push((l, der));
            }
        } else if label.is_some() {
            body.push_str(line);
        }
    }

    Ok(blocks)
}

/// Encodes DER bytes as PEM with the given label.
#[must_use]
pub fn der_to_pem(label: &str, der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for chunk in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}
