use crate::models::User;

/// Resolves a chat display name against the tracker's user listing.
///
/// The comparison is case-sensitive and the first match in listing order
/// wins. `None` means the sender has no tracker account; callers render an
/// empty report for that case rather than failing.
pub fn find_user_id(users: &[User], login: &str) -> Option<u32> {
    users.iter().find(|user| user.login == login).map(|user| user.id)
}
