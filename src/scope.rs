use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::Role;

/// The three chat surfaces that share one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatScope {
    /// Staff to staff.
    Internal,
    /// Staff to patient consultation.
    Patient,
    /// Support staff to anonymous guest.
    Guest,
}

impl ChatScope {
    pub const ALL: [ChatScope; 3] = [ChatScope::Internal, ChatScope::Patient, ChatScope::Guest];

    /// Whether `role` may send in this scope and accumulate its unread counts.
    pub fn visible_to(self, role: Role) -> bool {
        use Role::*;
        match self {
            ChatScope::Internal => matches!(role, Admin | Doctor | Staff | Support),
            ChatScope::Patient => matches!(role, Admin | Doctor | Staff | Patient),
            ChatScope::Guest => matches!(role, Support | Guest),
        }
    }

    /// Scope used when a send command does not name one.
    pub fn default_for(role: Role) -> Self {
        match role {
            Role::Patient => ChatScope::Patient,
            Role::Guest => ChatScope::Guest,
            _ => ChatScope::Internal,
        }
    }
}

impl fmt::Display for ChatScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ChatScope::Internal => "internal",
            ChatScope::Patient => "patient",
            ChatScope::Guest => "guest",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_support_and_guests_see_guest_scope() {
        let viewers: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|role| ChatScope::Guest.visible_to(*role))
            .collect();
        assert_eq!(viewers, vec![Role::Support, Role::Guest]);
    }

    #[test]
    fn patients_never_see_internal_scope() {
        assert!(!ChatScope::Internal.visible_to(Role::Patient));
        assert!(ChatScope::Patient.visible_to(Role::Patient));
    }

    #[test]
    fn default_scope_is_always_visible_to_its_role() {
        for role in Role::ALL {
            assert!(ChatScope::default_for(role).visible_to(role), "{role:?}");
        }
    }
}
