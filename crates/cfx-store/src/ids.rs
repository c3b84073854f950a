use serde::{Deserialize, Serialize};
use std::fmt;

/// Version number of a configuration area. `0` means "none" / "open-ended".
pub type Version = u32;

/// Store-assigned object identity. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The four published version numbers of a configuration area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaVersions {
    /// Currently live.
    pub active: Version,
    /// Approved for local activation.
    pub activatable: Version,
    /// Approved for cross-authority transfer.
    pub transferable: Version,
}

impl AreaVersions {
    /// Highest version approved in any way.
    pub fn released(&self) -> Version {
        self.active.max(self.activatable).max(self.transferable)
    }

    /// Current draft version; every write of a run targets it.
    pub fn modifiable(&self) -> Version {
        self.released() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiable_follows_highest_released_version() {
        let v = AreaVersions {
            active: 3,
            activatable: 5,
            transferable: 4,
        };
        assert_eq!(v.released(), 5);
        assert_eq!(v.modifiable(), 6);
        assert_eq!(AreaVersions::default().modifiable(), 1);
    }
}
