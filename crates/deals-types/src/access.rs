use uuid::Uuid;

use crate::models::Role;

/// Privileged operations. Everything else only needs an authenticated user
/// (plus ownership where the resource has an owner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Approve or reject submissions, list the moderation queues.
    Moderate,
    /// Edit content owned by someone else.
    EditAnyContent,
    /// Delete content owned by someone else.
    DeleteAnyContent,
    /// Delete accounts and read other users' submissions.
    ManageUsers,
    /// Change another account's role.
    AssignRoles,
}

impl Role {
    pub fn can(self, cap: Capability) -> bool {
        match cap {
            Capability::Moderate
            | Capability::EditAnyContent
            | Capability::DeleteAnyContent
            | Capability::ManageUsers => matches!(self, Role::Moderator | Role::Admin),
            Capability::AssignRoles => self == Role::Admin,
        }
    }

    /// Owners may always act on their own resources; others need `cap`.
    pub fn owner_or(self, actor: Uuid, owner: Uuid, cap: Capability) -> bool {
        actor == owner || self.can(cap)
    }
}
