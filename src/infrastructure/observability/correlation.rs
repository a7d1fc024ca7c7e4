// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Correlation id plumbing (spec §4.8, §6: `X-Correlation-Id`). Generated once
// per request at the presentation boundary and threaded through every
// pipeline stage and the final audit entry.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an inbound `X-Correlation-Id` header value, falling back to a
    /// freshly generated id if the caller didn't supply one or it isn't a
    /// valid UUID (the header is advisory, not authenticated).
    pub fn from_header(value: Option<&str>) -> Self {
        match value.and_then(|v| Uuid::parse_str(v).ok()) {
            Some(uuid) => Self(uuid),
            None => Self::new(),
        }
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_generated_id_on_garbage_header() {
        let id = CorrelationId::from_header(Some("not-a-uuid"));
        assert_ne!(id.0, Uuid::nil());
    }

    #[test]
    fn round_trips_a_valid_header() {
        let original = Uuid::new_v4();
        let id = CorrelationId::from_header(Some(&original.to_string()));
        assert_eq!(id.0, original);
    }
}
