//! Collision-free naming for new vault entries.
//!
//! [`resolve`] never prompts. When the desired name is taken it returns a
//! [`NameConflict`] carrying everything an operator needs to decide, and the
//! caller turns the decision into a [`ResolvedName`] with
//! [`NameConflict::decide`].

use sarc_types::{LogicalName, RegistryEntry};
use tracing::debug;

use crate::error::RegistryResult;
use crate::names::validate_logical_name;
use crate::registry::Registry;

/// Outcome of resolving a desired name against the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The name is free; use it as-is.
    Free(ResolvedName),
    /// The name is taken; an operator decision is needed.
    Conflict(NameConflict),
}

/// A collision between a desired name and an existing entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameConflict {
    /// The name the operator asked for.
    pub requested: String,
    /// The first free name in the ` (n)` sequence.
    pub alternate: String,
    /// The entry currently stored under `requested`.
    pub existing: RegistryEntry,
}

/// The two ways to settle a [`NameConflict`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Overwrite the existing entry and its vault object.
    Replace,
    /// Store the new entry under the alternate name.
    KeepBoth,
}

impl ConflictChoice {
    /// Parse an operator response: exactly `"1"` (replace) or `"2"` (keep both).
    ///
    /// Anything else yields `None` so the caller can ask again.
    pub fn from_response(response: &str) -> Option<Self> {
        match response.trim() {
            "1" => Some(Self::Replace),
            "2" => Some(Self::KeepBoth),
            _ => None,
        }
    }
}

/// A name the ingest pipeline may write to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedName {
    name: String,
    replaces_existing: bool,
}

impl ResolvedName {
    /// The logical name to write.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` when writing will overwrite an existing entry.
    pub fn replaces_existing(&self) -> bool {
        self.replaces_existing
    }
}

impl NameConflict {
    /// Settle the conflict.
    pub fn decide(self, choice: ConflictChoice) -> ResolvedName {
        match choice {
            ConflictChoice::Replace => ResolvedName {
                name: self.requested,
                replaces_existing: true,
            },
            ConflictChoice::KeepBoth => ResolvedName {
                name: self.alternate,
                replaces_existing: false,
            },
        }
    }
}

/// Resolve `desired` against the registry.
///
/// Fails only if `desired` is not a valid logical name.
pub fn resolve(desired: &str, registry: &Registry) -> RegistryResult<Resolution> {
    validate_logical_name(desired)?;
    let Some(existing) = registry.get(desired) else {
        return Ok(Resolution::Free(ResolvedName {
            name: desired.to_string(),
            replaces_existing: false,
        }));
    };
    let alternate = next_free_name(desired, |candidate| registry.contains(candidate));
    debug!(requested = desired, alternate = %alternate, "name conflict");
    Ok(Resolution::Conflict(NameConflict {
        requested: desired.to_string(),
        alternate,
        existing: existing.clone(),
    }))
}

/// First name after `desired` in the ` (n)` sequence for which `taken` is false.
///
/// `"report"` tries `"report (1)"`, `"report (2)"`, ...; `"report (4)"`
/// tries `"report (5)"`, ... . Gaps are filled: with `"report (1)"` and
/// `"report (3)"` taken, `"report"` yields `"report (2)"`.
pub fn next_free_name(desired: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = LogicalName::parse(desired);
    loop {
        candidate = match candidate.successor() {
            Some(next) => next,
            // Counter exhausted: restart the sequence on the full name.
            None => LogicalName::new(candidate.to_string(), Some(1)),
        };
        let rendered = candidate.to_string();
        if !taken(&rendered) {
            return rendered;
        }
    }
}
