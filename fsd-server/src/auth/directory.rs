//! The user directory behind password logins. Kept behind a trait so a
//! deployment can plug in a real account database; the bundled
//! implementation is a JSON file loaded into memory.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::wire::NetworkRating;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub cid: u32,
    pub password: String,
    pub network_rating: i32,
    #[serde(default)]
    pub pilot_rating: i32,
}

impl UserRecord {
    pub fn rating(&self) -> Option<NetworkRating> {
        NetworkRating::from_i32(self.network_rating)
    }
}

pub trait UserDirectory: Send + Sync {
    /// Checks a CID/password pair, returning the stored record on success.
    fn authenticate(&self, cid: u32, password: &str) -> Option<UserRecord>;

    /// Looks a CID up without checking credentials (token logins).
    fn lookup(&self, cid: u32) -> Option<UserRecord>;
}

#[derive(Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<u32, UserRecord>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of user records.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        let records: Vec<UserRecord> = serde_json::from_slice(&raw)?;
        let directory = Self::new();
        {
            let mut users = directory.users.write();
            for record in records {
                users.insert(record.cid, record);
            }
        }
        Ok(directory)
    }

    pub fn insert(&self, record: UserRecord) {
        self.users.write().insert(record.cid, record);
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Seeds CID 1 as Administrator with a random password so a fresh
    /// server is reachable. Returns the generated password for logging.
    pub fn bootstrap_admin(&self) -> String {
        let password = hex::encode(rand::random::<[u8; 8]>());
        self.insert(UserRecord {
            cid: 1,
            password: password.clone(),
            network_rating: NetworkRating::Administrator.as_i32(),
            pilot_rating: 0,
        });
        password
    }
}

impl UserDirectory for MemoryDirectory {
    fn authenticate(&self, cid: u32, password: &str) -> Option<UserRecord> {
        let users = self.users.read();
        let record = users.get(&cid)?;
        if record.password == password {
            Some(record.clone())
        } else {
            None
        }
    }

    fn lookup(&self, cid: u32) -> Option<UserRecord> {
        self.users.read().get(&cid).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn authenticates_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"cid": 1000000, "password": "12345", "network_rating": 1}}]"#
        )
        .unwrap();
        let directory = MemoryDirectory::load(file.path()).unwrap();
        assert!(directory.authenticate(1000000, "12345").is_some());
        assert!(directory.authenticate(1000000, "wrong").is_none());
        assert!(directory.authenticate(999, "12345").is_none());
        assert_eq!(
            directory.lookup(1000000).unwrap().rating(),
            Some(NetworkRating::Observer)
        );
    }

    #[test]
    fn bootstrap_seeds_admin() {
        let directory = MemoryDirectory::new();
        assert!(directory.is_empty());
        let password = directory.bootstrap_admin();
        let record = directory.authenticate(1, &password).unwrap();
        assert_eq!(record.rating(), Some(NetworkRating::Administrator));
    }
}
