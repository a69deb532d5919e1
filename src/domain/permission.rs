use bitmask_enum::bitmask;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Capability flags granted through a role. Single flags and unions share
/// this type; the values are fixed (FOLLOW=1 through ADMIN=16) because they
/// are persisted on `roles.permissions`.
#[bitmask(i32)]
pub enum Permission {
    /// Follow other users
    Follow,
    /// Comment on posts
    Comment,
    /// Write posts
    WriteArticles,
    /// Disable and restore comments
    Moderate,
    /// Edit anything
    Admin,
}

const NAMES: [(Permission, &str); 5] = [
    (Permission::Follow, "follow"),
    (Permission::Comment, "comment"),
    (Permission::WriteArticles, "write_articles"),
    (Permission::Moderate, "moderate"),
    (Permission::Admin, "admin"),
];

impl Default for Permission {
    fn default() -> Self {
        Self::none()
    }
}

impl Permission {
    pub const FLAGS: [Permission; 5] = [
        Permission::Follow,
        Permission::Comment,
        Permission::WriteArticles,
        Permission::Moderate,
        Permission::Admin,
    ];

    /// Union of every known flag.
    pub fn known() -> Self {
        Self::FLAGS
            .into_iter()
            .fold(Self::none(), |acc, flag| acc | flag)
    }

    /// Rejects masks carrying bits outside the known flag set.
    pub fn from_known_bits(bits: i32) -> Option<Self> {
        let permissions = Self::from(bits);
        (permissions & !Self::known() == Self::none()).then_some(permissions)
    }

    /// Drops unknown bits from a stored mask.
    pub fn from_stored_bits(bits: i32) -> Self {
        Self::from(bits) & Self::known()
    }

    /// True when every flag of `other` is also set here.
    pub fn has(&self, other: Self) -> bool {
        *self & other == other
    }

    pub fn iter_flags(self) -> impl Iterator<Item = Permission> {
        Self::FLAGS
            .into_iter()
            .filter(move |flag| self.has(*flag))
    }

    /// Name of a single flag; `None` for unions and the empty set.
    pub fn flag_name(&self) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|(flag, _)| flag == self)
            .map(|(_, name)| *name)
    }

    fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .find(|(_, known)| *known == name)
            .map(|(flag, _)| *flag)
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter_flags().filter_map(|flag| flag.flag_name()))
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names.iter().try_fold(Self::none(), |acc, name| {
            Self::from_name(name)
                .map(|flag| acc | flag)
                .ok_or_else(|| D::Error::custom(format!("unknown permission `{}`", name)))
        })
    }
}
