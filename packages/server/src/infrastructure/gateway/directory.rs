//! Directory of known users and rooms, loaded from TOML.
//!
//! ```toml
//! [[users]]
//! id = 1
//! username = "alice"
//!
//! [[rooms]]
//! id = "general"
//! name = "General"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{RoomId, UserId, Username, ValueObjectError};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read directory file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse directory file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid directory entry: {0}")]
    Invalid(#[from] ValueObjectError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Directory {
    pub users: Vec<UserEntry>,
    pub rooms: Vec<RoomEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Directory {
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, DirectoryError> {
        let directory: Directory = toml::from_str(raw)?;
        // Reject bad entries at startup rather than on first use
        directory.users()?;
        directory.rooms()?;
        Ok(directory)
    }

    pub fn users(&self) -> Result<Vec<(UserId, Username)>, ValueObjectError> {
        self.users
            .iter()
            .map(|entry| {
                Ok((
                    UserId::new(entry.id)?,
                    Username::new(entry.username.clone())?,
                ))
            })
            .collect()
    }

    /// Rooms with their display name (defaults to the room id).
    pub fn rooms(&self) -> Result<Vec<(RoomId, String)>, ValueObjectError> {
        self.rooms
            .iter()
            .map(|entry| {
                let room_id = RoomId::new(entry.id.clone())?;
                let name = entry.name.clone().unwrap_or_else(|| entry.id.clone());
                Ok((room_id, name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directory() {
        // テスト項目: TOML のディレクトリが users / rooms に展開される
        // given (前提条件):
        let raw = r#"
            [[users]]
            id = 1
            username = "alice"

            [[users]]
            id = 2
            username = "bob"

            [[rooms]]
            id = "general"
            name = "General"

            [[rooms]]
            id = "random"
        "#;

        // when (操作):
        let directory = Directory::parse(raw).unwrap();

        // then (期待する結果):
        let users = directory.users().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].1.as_str(), "alice");
        let rooms = directory.rooms().unwrap();
        assert_eq!(rooms[0].1, "General");
        assert_eq!(rooms[1].1, "random");
    }

    #[test]
    fn test_parse_empty_directory() {
        // テスト項目: 空のファイルは空のディレクトリになる
        // given (前提条件):
        let raw = "";

        // when (操作):
        let directory = Directory::parse(raw).unwrap();

        // then (期待する結果):
        assert!(directory.users.is_empty());
        assert!(directory.rooms.is_empty());
    }

    #[test]
    fn test_parse_rejects_invalid_user_id() {
        // テスト項目: 不正な user id を含むディレクトリは起動時に拒否される
        // given (前提条件):
        let raw = r#"
            [[users]]
            id = 0
            username = "nobody"
        "#;

        // when (操作):
        let result = Directory::parse(raw);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(DirectoryError::Invalid(ValueObjectError::NonPositiveUserId(0)))
        ));
    }
}
