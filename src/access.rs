use serde::{Deserialize, Serialize};

/// A backend user group and the elements its members may not use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub title: String,
    /// Comma-separated list of denied items, as stored on the group record.
    #[serde(default)]
    pub access_deny: String,
}

/// An authenticated backend user, passed explicitly to whoever needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendUser {
    pub username: String,
    #[serde(default)]
    pub groups: Vec<UserGroup>,
}

impl BackendUser {
    /// Merges the deny lists of all the user's groups, in group order.
    ///
    /// Entries are trimmed and empty ones dropped. Duplicates across groups
    /// are kept.
    pub fn deny_list(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|group| split_list(&group.access_deny))
            .collect()
    }

    pub fn is_denied(&self, item: &str) -> bool {
        self.groups
            .iter()
            .any(|group| split_list(&group.access_deny).any(|denied| denied == item))
    }
}

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}
