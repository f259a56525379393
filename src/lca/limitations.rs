use std::collections::BTreeSet;

use anyhow::Result;
use csrmat::CsrMatrix;

use crate::{error::RegionalError, inventory::Key, spatial::IndexSpace};

/// What a limitation restricts the extension table to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LimitationKind {
    /// Rows of the inventory mapping.
    Activities,
    /// Columns of the characterization matrix.
    Flows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitationMode {
    /// Keep only the listed keys.
    Include,
    /// Zero the listed keys.
    Exclude,
}

/// Restricts an extension table calculation to (or away from) some
/// activities or flows.
///
/// Applied by zeroing matrix entries, not by dropping index positions:
/// an activity limitation zeroes rows of `M` and a flow limitation zeroes
/// columns of `R`. Excluded activities or flows therefore keep their place
/// in every result and lose all of their characterization, so their
/// contribution to the score is zero rather than absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Limitation {
    pub kind: LimitationKind,
    pub mode: LimitationMode,
    pub keys: BTreeSet<Key>,
}

impl Limitation {
    /// Parse `kind` (`activities` or `flows`) and `mode` (`include` or `exclude`).
    pub fn new(kind: &str, mode: &str, keys: impl IntoIterator<Item = Key>) -> Result<Self> {
        let kind = match kind {
            "activities" => LimitationKind::Activities,
            "flows" => LimitationKind::Flows,
            other => return Err(RegionalError::InvalidLimitation(format!("unknown kind {other:?}")).into()),
        };
        let mode = match mode {
            "include" => LimitationMode::Include,
            "exclude" => LimitationMode::Exclude,
            other => return Err(RegionalError::InvalidLimitation(format!("unknown mode {other:?}")).into()),
        };
        Ok(Self { kind, mode, keys: keys.into_iter().collect() })
    }

    pub fn include(kind: LimitationKind, keys: impl IntoIterator<Item = Key>) -> Self {
        Self { kind, mode: LimitationMode::Include, keys: keys.into_iter().collect() }
    }

    pub fn exclude(kind: LimitationKind, keys: impl IntoIterator<Item = Key>) -> Self {
        Self { kind, mode: LimitationMode::Exclude, keys: keys.into_iter().collect() }
    }

    fn keeps(&self, key: Option<&Key>) -> bool {
        let listed = key.is_some_and(|key| self.keys.contains(key));
        match self.mode {
            LimitationMode::Include => listed,
            LimitationMode::Exclude => !listed,
        }
    }

    /// Apply to the rows of `matrix`, indexed by `space`.
    pub(crate) fn apply_rows(&self, matrix: &CsrMatrix, space: &IndexSpace<Key>) -> CsrMatrix {
        matrix.retain_rows(|i| self.keeps(space.key(i)))
    }

    /// Apply to the columns of `matrix`, indexed by `space`.
    pub(crate) fn apply_cols(&self, matrix: &CsrMatrix, space: &IndexSpace<Key>) -> CsrMatrix {
        matrix.retain_cols(|j| self.keeps(space.key(j)))
    }
}

/// At most one limitation per kind.
pub(crate) fn validate_limitations(limitations: &[Limitation]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for limitation in limitations {
        if !seen.insert(limitation.kind) {
            return Err(RegionalError::InvalidLimitation(format!(
                "more than one limitation on {:?}",
                limitation.kind
            )).into());
        }
    }
    Ok(())
}
