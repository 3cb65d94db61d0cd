//! Aggregated load diagnostics.
//!
//! Instead of scattering warnings through the log while building, every
//! non-fatal problem lands in one [`LoadReport`] returned with the loaded
//! knowledge base. A partial load is thereby distinguishable from a
//! legitimately empty source without inspecting logs.

/// A reference that resolved nowhere reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// The id that failed to resolve.
    pub id: String,
    /// Where the reference occurred (slice id, "children of Q7", …).
    pub context: String,
}

/// Everything non-fatal that went wrong during a load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// References whose ids resolved nowhere; the owning edge, operand, or
    /// slice was omitted as a recorded hole.
    pub unresolved: Vec<UnresolvedReference>,
    /// Condition `type` strings no built-in branch or extension claimed.
    pub unclaimed_condition_types: Vec<String>,
    /// Action `type` strings no built-in branch or extension claimed.
    pub unclaimed_action_types: Vec<String>,
    /// Unparsable numbers, scores, intervals, enum values; the field stayed
    /// unset and loading continued.
    pub format_issues: Vec<String>,
    /// Container-index entries dropped for an unusable location or missing key.
    pub dropped_index_entries: Vec<String>,
    /// Ids that resolve in more than one namespace of the legacy search order.
    pub namespace_collisions: Vec<String>,
}

impl LoadReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an unresolved reference.
    pub fn unresolved(&mut self, id: impl Into<String>, context: impl Into<String>) {
        self.unresolved.push(UnresolvedReference {
            id: id.into(),
            context: context.into(),
        });
    }

    /// Record a format issue.
    pub fn format_issue(&mut self, message: impl Into<String>) {
        self.format_issues.push(message.into());
    }

    /// The unresolved ids as one flat list.
    pub fn unresolved_ids(&self) -> Vec<&str> {
        self.unresolved.iter().map(|r| r.id.as_str()).collect()
    }

    /// Whether the load completed without recording anything.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
            && self.unclaimed_condition_types.is_empty()
            && self.unclaimed_action_types.is_empty()
            && self.format_issues.is_empty()
            && self.dropped_index_entries.is_empty()
            && self.namespace_collisions.is_empty()
    }

    /// Fold another report's findings into this one.
    pub fn merge(&mut self, other: LoadReport) {
        self.unresolved.extend(other.unresolved);
        self.unclaimed_condition_types
            .extend(other.unclaimed_condition_types);
        self.unclaimed_action_types.extend(other.unclaimed_action_types);
        self.format_issues.extend(other.format_issues);
        self.dropped_index_entries.extend(other.dropped_index_entries);
        self.namespace_collisions.extend(other.namespace_collisions);
    }
}
