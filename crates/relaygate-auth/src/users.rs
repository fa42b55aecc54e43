//! The credential directory: who may connect.
//!
//! A [`UserList`] is built once and shared as `Arc<UserList>`. The admission
//! layer only reads it; replacing the directory means installing a new
//! `Arc` on the manager.

use std::collections::HashMap;
use std::fmt;

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of a user's credential secret.
pub const USER_SECRET_LEN: usize = 32;

/// One user allowed to authenticate.
///
/// Only a derived secret is kept, never the password itself.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct User {
    name: String,
    secret: [u8; USER_SECRET_LEN],
}

impl User {
    /// Creates a user from a name and a password.
    pub fn new(name: impl Into<String>, password: &str) -> Self {
        let name = name.into();
        let secret = derive_secret(&name, password);
        Self {
            name,
            secret: *secret,
        }
    }

    /// The user's login name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn secret(&self) -> &[u8; USER_SECRET_LEN] {
        &self.secret
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Derives the credential secret both sides of the handshake key their
/// client proof with: `SHA-256(name ":" password)`.
pub fn derive_secret(name: &str, password: &str) -> Zeroizing<[u8; USER_SECRET_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize();

    let mut secret = Zeroizing::new([0u8; USER_SECRET_LEN]);
    secret.copy_from_slice(&digest);
    digest.as_mut_slice().zeroize();
    secret
}

/// Read-only lookup of the users allowed to connect.
#[derive(Debug, Default)]
pub struct UserList {
    users: HashMap<String, User>,
}

impl UserList {
    /// Creates an empty list. Every handshake against it is rejected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, replacing any previous user with the same name.
    pub fn add(&mut self, user: User) {
        self.users.insert(user.name.clone(), user);
    }

    /// Looks a user up by name.
    pub fn find(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    /// Whether a user with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.users.contains_key(name)
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if there are no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl FromIterator<User> for UserList {
    fn from_iter<I: IntoIterator<Item = User>>(iter: I) -> Self {
        let mut list = Self::new();
        for user in iter {
            list.add(user);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_user_returns_it() {
        let list: UserList = [User::new("alice", "wonderland")].into_iter().collect();

        let user = list.find("alice").expect("alice should exist");

        assert_eq!(user.name(), "alice");
        assert!(list.find("bob").is_none());
    }

    #[test]
    fn test_add_same_name_replaces_user() {
        let mut list = UserList::new();
        list.add(User::new("alice", "old"));
        list.add(User::new("alice", "new"));

        assert_eq!(list.len(), 1);
        assert_eq!(
            list.find("alice").unwrap().secret(),
            &*derive_secret("alice", "new")
        );
    }

    #[test]
    fn test_derive_secret_depends_on_name_and_password() {
        let a = derive_secret("alice", "pw");
        let b = derive_secret("bob", "pw");
        let c = derive_secret("alice", "pw2");

        assert_ne!(*a, *b);
        assert_ne!(*a, *c);
        assert_eq!(*a, *derive_secret("alice", "pw"));
    }

    #[test]
    fn test_debug_hides_secret() {
        let user = User::new("alice", "pw");
        let printed = format!("{user:?}");
        assert!(printed.contains("alice"));
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn test_empty_list() {
        let list = UserList::new();
        assert!(list.is_empty());
        assert!(!list.contains("alice"));
    }
}
