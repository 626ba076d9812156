use super::group::GroupMember;
use serde::{Deserialize, Serialize};

/// A roster entry as supplied by the group service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: String,
    pub display_name: String,
}

impl From<&GroupMember> for RosterEntry {
    fn from(member: &GroupMember) -> Self {
        RosterEntry {
            id: member.id.clone(),
            display_name: member.display_name.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub user_id: String,
    pub display_name: String,
    pub selected: bool,
    pub owed_amount: u64,
}

impl Participant {
    pub fn from_roster(entry: RosterEntry) -> Self {
        Participant {
            user_id: entry.id,
            display_name: entry.display_name,
            selected: true,
            owed_amount: 0,
        }
    }
}
