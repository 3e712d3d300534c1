//! Decides which directory events are producer sentinels.

/// Index of a family in the configured family list.
///
/// All per-family state is held in fixed-size arrays indexed by this id, so
/// nothing downstream ever dispatches on the name itself.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FamilyId(pub(crate) usize);

impl FamilyId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Outcome of classifying one event filename.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Classification {
    /// A producer sentinel for the given family.
    Sentinel(FamilyId),
    /// Anything else; dropped without further processing.
    Ignore,
}

/// Classifies a bare filename from a directory event.
///
/// A sentinel has the form `<family>.<stamp>.bak`: `.bak` must be the
/// terminal suffix, the stamp must be present (a bare `<family>.bak` is a
/// self-generated artifact, not a producer sentinel), and the name must
/// contain one of the configured family tokens. First match wins, which is
/// why overlapping family tokens are rejected at configuration time.
///
/// Pure function of its arguments; no filesystem access.
#[must_use]
pub fn classify(name: &str, families: &[String]) -> Classification {
    if !name.contains(".bak") {
        return Classification::Ignore;
    }
    // `.bak.` means `.bak` is not terminal (tool artifacts like `x.bak.1`).
    if name.contains(".bak.") {
        return Classification::Ignore;
    }
    if let Some(stem) = name.strip_suffix(".bak") {
        if families.iter().any(|family| family == stem) {
            return Classification::Ignore;
        }
    }
    for (idx, family) in families.iter().enumerate() {
        if name.contains(family.as_str()) {
            return Classification::Sentinel(FamilyId(idx));
        }
    }
    Classification::Ignore
}
