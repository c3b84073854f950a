use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MutabilityClass
// ---------------------------------------------------------------------------

/// Policy attached to an attribute-group usage.
///
/// This classification is the sole authority for whether a live/declared
/// mismatch in a dataset may be patched in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutabilityClass {
    RequiredImmutable,
    RequiredChangeable,
    OptionalImmutable,
    OptionalChangeable,
    OnlineSourceOnly,
    OnlineDrainOnly,
    OnlineEither,
}

impl MutabilityClass {
    pub const ALL: [MutabilityClass; 7] = [
        MutabilityClass::RequiredImmutable,
        MutabilityClass::RequiredChangeable,
        MutabilityClass::OptionalImmutable,
        MutabilityClass::OptionalChangeable,
        MutabilityClass::OnlineSourceOnly,
        MutabilityClass::OnlineDrainOnly,
        MutabilityClass::OnlineEither,
    ];

    /// `true` if a configuration dataset under this usage may be patched in place.
    pub fn is_changeable(self) -> bool {
        matches!(
            self,
            MutabilityClass::RequiredChangeable | MutabilityClass::OptionalChangeable
        )
    }

    /// `true` if every object carrying the group must hold a dataset for it.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            MutabilityClass::RequiredImmutable | MutabilityClass::RequiredChangeable
        )
    }

    /// `true` for usages that carry configuration data (as opposed to online data).
    pub fn is_configuring(self) -> bool {
        !matches!(
            self,
            MutabilityClass::OnlineSourceOnly
                | MutabilityClass::OnlineDrainOnly
                | MutabilityClass::OnlineEither
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MutabilityClass::RequiredImmutable => "required_immutable",
            MutabilityClass::RequiredChangeable => "required_changeable",
            MutabilityClass::OptionalImmutable => "optional_immutable",
            MutabilityClass::OptionalChangeable => "optional_changeable",
            MutabilityClass::OnlineSourceOnly => "online_source_only",
            MutabilityClass::OnlineDrainOnly => "online_drain_only",
            MutabilityClass::OnlineEither => "online_either",
        }
    }
}

// ---------------------------------------------------------------------------
// Set / reference semantics
// ---------------------------------------------------------------------------

/// How an owner relates to the objects it references or contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Association,
    Aggregation,
    Composition,
}

impl ReferenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceKind::Association => "association",
            ReferenceKind::Aggregation => "aggregation",
            ReferenceKind::Composition => "composition",
        }
    }
}

/// Persistence of dynamic objects across restarts of the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    Transient,
    Persistent,
    PersistentInvalidOnRestart,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleAccuracy {
    Float,
    #[default]
    Double,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAccuracy {
    Seconds,
    #[default]
    Milliseconds,
}

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------

/// Free-text documentation carried by every object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub description: String,
}

impl Info {
    pub fn new(short: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            description: description.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.short.is_empty() && self.description.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changeable_classes_are_exactly_the_two_changeable_variants() {
        let changeable: Vec<_> = MutabilityClass::ALL
            .iter()
            .copied()
            .filter(|c| c.is_changeable())
            .collect();
        assert_eq!(
            changeable,
            vec![
                MutabilityClass::RequiredChangeable,
                MutabilityClass::OptionalChangeable
            ]
        );
    }

    #[test]
    fn online_classes_are_not_configuring() {
        assert!(!MutabilityClass::OnlineEither.is_configuring());
        assert!(!MutabilityClass::OnlineDrainOnly.is_required());
        assert!(MutabilityClass::OptionalImmutable.is_configuring());
    }
}
