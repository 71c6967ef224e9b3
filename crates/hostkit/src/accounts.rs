//! User and group lookups.

use crate::error::{Error, Result};

/// Map account names to numeric ids.
pub trait Accounts: Send + Sync {
    fn uid(&self, user: &str) -> Result<u32>;

    fn gid(&self, group: &str) -> Result<u32>;
}

/// Lookups through the system password and group databases.
#[derive(Debug, Default)]
pub struct SystemAccounts;

impl Accounts for SystemAccounts {
    #[cfg(unix)]
    fn uid(&self, user: &str) -> Result<u32> {
        use std::ffi::CString;

        let name = CString::new(user).map_err(|_| Error::UnknownAccount {
            kind: "user",
            name: user.to_string(),
        })?;
        // getpwnam returns a pointer into static storage, read it right away
        unsafe {
            let entry = libc::getpwnam(name.as_ptr());
            if entry.is_null() {
                return Err(Error::UnknownAccount {
                    kind: "user",
                    name: user.to_string(),
                });
            }
            Ok((*entry).pw_uid)
        }
    }

    #[cfg(unix)]
    fn gid(&self, group: &str) -> Result<u32> {
        use std::ffi::CString;

        let name = CString::new(group).map_err(|_| Error::UnknownAccount {
            kind: "group",
            name: group.to_string(),
        })?;
        unsafe {
            let entry = libc::getgrnam(name.as_ptr());
            if entry.is_null() {
                return Err(Error::UnknownAccount {
                    kind: "group",
                    name: group.to_string(),
                });
            }
            Ok((*entry).gr_gid)
        }
    }

    #[cfg(not(unix))]
    fn uid(&self, _user: &str) -> Result<u32> {
        Err(Error::Other("account lookup not supported on this platform".to_string()))
    }

    #[cfg(not(unix))]
    fn gid(&self, _group: &str) -> Result<u32> {
        Err(Error::Other("account lookup not supported on this platform".to_string()))
    }
}
