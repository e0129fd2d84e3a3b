//! BLAKE3 fingerprints of linearized plans.

use super::planner::PlannedStep;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Fingerprint an ordered step list via its canonical JSON form.
pub fn fingerprint_steps(steps: &[PlannedStep]) -> String {
    let mut hasher = blake3::Hasher::new();
    for step in steps {
        // Serializing plain data (strings, enums, JSON values) cannot fail
        let json = serde_json::to_string(step).unwrap_or_default();
        hasher.update(json.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}
