//! Namespace (tenant) records.
//!
//! # Purpose
//! Defines the tenant record and its member set. The member set is a typed,
//! insertion-ordered set: decoding fails on duplicate or non-string entries so
//! membership checks never need runtime casts.
use crate::model::claims::MemberRole;
use crate::model::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MemberSet(Vec<UserId>);

impl MemberSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.0.iter().any(|member| member == user)
    }

    /// Insert `user`; returns `false` if it was already present.
    pub fn insert(&mut self, user: UserId) -> bool {
        if self.contains(&user) {
            return false;
        }
        self.0.push(user);
        true
    }

    /// Remove `user`; returns `false` if it was not present.
    pub fn remove(&mut self, user: &UserId) -> bool {
        let before = self.0.len();
        self.0.retain(|member| member != user);
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for MemberSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let members = Vec::<UserId>::deserialize(deserializer)?;
        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            if !seen.insert(member) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate namespace member: {member}"
                )));
            }
        }
        Ok(Self(members))
    }
}

impl FromIterator<UserId> for MemberSet {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        let mut set = MemberSet::new();
        for user in iter {
            set.insert(user);
        }
        set
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSettings {
    #[serde(default)]
    pub session_record: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub tenant_id: String,
    pub name: String,
    pub owner: UserId,
    pub members: MemberSet,
    #[serde(default)]
    pub settings: NamespaceSettings,
    #[serde(default)]
    pub max_devices: Option<u32>,
    /// Accepted devices; a projection filled in on lookup, never stored.
    #[serde(default)]
    pub devices_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Namespace {
    /// New namespace whose member set starts with the owner.
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>, owner: UserId) -> Self {
        let members = std::iter::once(owner.clone()).collect();
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
            owner,
            members,
            settings: NamespaceSettings::default(),
            max_devices: None,
            devices_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn role_of(&self, user: &UserId) -> Option<MemberRole> {
        if &self.owner == user {
            Some(MemberRole::Owner)
        } else if self.members.contains(user) {
            Some(MemberRole::Member)
        } else {
            None
        }
    }
}
