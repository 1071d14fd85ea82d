//! Tool-call identity.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of generated tool-call IDs.
pub const TOOL_CALL_ID_LEN: usize = 9;

/// Generate a fresh alphanumeric tool-call ID.
pub fn generate_tool_call_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOOL_CALL_ID_LEN)
        .map(char::from)
        .collect()
}

/// Use the model-assigned ID when there is one, otherwise mint a new one.
pub fn resolve_tool_call_id(model_tool_call_id: Option<&str>) -> String {
    match model_tool_call_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => generate_tool_call_id(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_alphanumeric() {
        let id = generate_tool_call_id();
        assert_eq!(id.len(), TOOL_CALL_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_tool_call_id(), generate_tool_call_id());
    }

    #[test]
    fn model_id_is_reused_verbatim() {
        assert_eq!(resolve_tool_call_id(Some("call_abc-123")), "call_abc-123");
        assert_eq!(resolve_tool_call_id(Some("")).len(), TOOL_CALL_ID_LEN);
        assert_eq!(resolve_tool_call_id(None).len(), TOOL_CALL_ID_LEN);
    }
}
