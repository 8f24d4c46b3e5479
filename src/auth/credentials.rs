//! Credential storage and management
//!
//! A credential couples a username/password pair with the root directory it
//! may access and the set of actions it may perform there.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::PermissionError;

/// An action a credential may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// CWD, LIST, NLST, RETR, SIZE
    Read,
    /// STOR
    Write,
    /// DELE
    Delete,
    /// RNFR / RNTO
    Rename,
    /// MKD
    MakeDir,
    /// RMD
    RemoveDir,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::Read,
        Permission::Write,
        Permission::Delete,
        Permission::Rename,
        Permission::MakeDir,
        Permission::RemoveDir,
    ];
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
            Permission::Rename => "rename",
            Permission::MakeDir => "make_dir",
            Permission::RemoveDir => "remove_dir",
        };
        f.write_str(name)
    }
}

/// One account: login pair, its root directory and granted permissions.
#[derive(Clone)]
pub struct Credential {
    username: String,
    password: String,
    root_directory: PathBuf,
    permissions: BTreeSet<Permission>,
}

impl Credential {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        root_directory: impl Into<PathBuf>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            root_directory: root_directory.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Fails with [`PermissionError`] when `permission` is not granted.
    pub fn require(&self, permission: Permission) -> Result<(), PermissionError> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(PermissionError(permission))
        }
    }
}

// The password never appears in debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("root_directory", &self.root_directory)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_checks_the_granted_set() {
        let cred = Credential::new("bob", "secret", "/srv", [Permission::Read]);
        assert!(cred.require(Permission::Read).is_ok());
        let err = cred.require(Permission::Delete).unwrap_err();
        assert_eq!(err.0, Permission::Delete);
    }

    #[test]
    fn debug_output_hides_password() {
        let cred = Credential::new("bob", "secret", "/srv", Permission::ALL);
        let dbg = format!("{cred:?}");
        assert!(dbg.contains("bob"));
        assert!(!dbg.contains("secret"));
    }
}
