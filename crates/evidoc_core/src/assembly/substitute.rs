//! Scalar placeholder substitution.

use crate::engine::{DocumentSession, EngineResult};
use crate::models::{FieldSet, Placeholder};

/// Replace every scalar marker with its field value.
///
/// All five markers are processed; absent fields become empty text and
/// markers missing from the template are a no-op. Returns the number of
/// replacements made per placeholder.
pub fn substitute_fields(
    session: &mut dyn DocumentSession,
    fields: &FieldSet,
) -> EngineResult<Vec<(Placeholder, usize)>> {
    let mut counts = Vec::with_capacity(Placeholder::ALL.len());
    for field in Placeholder::ALL {
        let replaced = session.replace_all(&field.marker(), fields.value_or_empty(field))?;
        tracing::trace!(field = %field, replaced, "Substituted placeholder");
        counts.push((field, replaced));
    }
    Ok(counts)
}
