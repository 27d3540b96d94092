//! Deterministic string encodings fed into hashing and signing. Kept
//! separate from the types themselves (`covenant-core`) so every crate
//! that needs a canonical payload goes through the same join logic
//! rather than re-deriving `format!` strings ad hoc.

/// Joins already-ordered field strings with `|`, matching the separator
/// every `signable_payload`/`details_hash` computation in the workspace
/// uses. Callers are responsible for field order and for pre-sorting any
/// map-typed field (see `covenant_core::request::LabelMap`, a `BTreeMap`
/// for exactly this reason).
pub fn join_fields(fields: &[&str]) -> String {
    fields.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_order_sensitive() {
        assert_ne!(join_fields(&["a", "b"]), join_fields(&["b", "a"]));
    }
}
