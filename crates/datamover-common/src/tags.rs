//! Tag model and identity tags for data movers
//!
//! Every resource that makes up a data mover carries the same identity tags.
//! The resource index answers "list/describe by group" queries purely from
//! these tags, since DataSync has no native grouping.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `spinup:org` | Owning organization |
//! | `spinup:type` | Resource type ("storage") |
//! | `spinup:flavor` | Resource flavor ("datamover") |
//! | `spinup:spaceid` | Owning group (space) |

use serde::{Deserialize, Serialize};

/// Tag key for the owning organization
pub const TAG_ORG: &str = "spinup:org";

/// Tag key for the resource type
pub const TAG_TYPE: &str = "spinup:type";

/// Tag value for the resource type
pub const TAG_TYPE_VALUE: &str = "storage";

/// Tag key for the resource flavor
pub const TAG_FLAVOR: &str = "spinup:flavor";

/// Tag value for the resource flavor
pub const TAG_FLAVOR_VALUE: &str = "datamover";

/// Tag key for the owning group
pub const TAG_GROUP: &str = "spinup:spaceid";

/// Legacy organization key, still stripped from user input
pub const TAG_LEGACY_ORG: &str = "yale:org";

/// Keys a caller may never set.
pub const RESERVED_KEYS: &[&str] = &[TAG_LEGACY_ORG, TAG_ORG, TAG_TYPE, TAG_FLAVOR, TAG_GROUP];

/// Key prefixes owned by the cloud provider.
pub const RESERVED_PREFIXES: &[&str] = &["aws:"];

/// A single key/value tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether the key is reserved for identity tags or the cloud provider.
    pub fn is_reserved(&self) -> bool {
        RESERVED_KEYS.contains(&self.key.as_str())
            || RESERVED_PREFIXES.iter().any(|p| self.key.starts_with(p))
    }
}

/// An ordered tag set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity tags for a mover owned by `org` and `group`.
    pub fn identity(org: &str, group: &str) -> Self {
        Self(vec![
            Tag::new(TAG_ORG, org),
            Tag::new(TAG_TYPE, TAG_TYPE_VALUE),
            Tag::new(TAG_FLAVOR, TAG_FLAVOR_VALUE),
            Tag::new(TAG_GROUP, group),
        ])
    }

    /// Enforce identity tags.
    ///
    /// Reserved and cloud-prefixed keys supplied by the caller are dropped,
    /// then the identity tags are placed first. Applying this to an already
    /// normalized set returns the same set.
    pub fn normalize(&self, org: &str, group: &str) -> Self {
        let mut normalized = Self::identity(org, group);
        normalized
            .0
            .extend(self.0.iter().filter(|t| !t.is_reserved()).cloned());
        normalized
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// True if there is an org tag matching `org`.
    pub fn in_org(&self, org: &str) -> bool {
        self.0.iter().any(|t| t.key == TAG_ORG && t.value == org)
    }

    /// True if there is a group tag matching `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.0.iter().any(|t| t.key == TAG_GROUP && t.value == group)
    }

    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Tag>> for Tags {
    fn from(tags: Vec<Tag>) -> Self {
        Self(tags)
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A tag-index filter: resources must carry `key` with one of `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub values: Vec<String>,
}

impl TagFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: vec![value.into()],
        }
    }

    pub fn matches(&self, tags: &Tags) -> bool {
        tags.get(&self.key)
            .is_some_and(|v| self.values.iter().any(|want| want == v))
    }
}

/// Filters selecting every mover resource in `org`, narrowed to `group`
/// when one is given.
pub fn identity_filters(org: &str, group: Option<&str>) -> Vec<TagFilter> {
    let mut filters = vec![
        TagFilter::new(TAG_ORG, org),
        TagFilter::new(TAG_TYPE, TAG_TYPE_VALUE),
        TagFilter::new(TAG_FLAVOR, TAG_FLAVOR_VALUE),
    ];
    if let Some(group) = group.filter(|g| !g.is_empty()) {
        filters.push(TagFilter::new(TAG_GROUP, group));
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_enforces_identity() {
        let user = Tags::from(vec![
            Tag::new("spinup:org", "evil"),
            Tag::new("yale:org", "legacy"),
            Tag::new("aws:cloudformation:stack-name", "x"),
            Tag::new("Name", "my-mover"),
        ]);

        let tags = user.normalize("acme", "group1");
        assert_eq!(tags.len(), 5);
        assert!(tags.in_org("acme"));
        assert!(!tags.in_org("evil"));
        assert!(tags.in_group("group1"));
        assert_eq!(tags.get(TAG_TYPE), Some("storage"));
        assert_eq!(tags.get(TAG_FLAVOR), Some("datamover"));
        assert_eq!(tags.get("Name"), Some("my-mover"));
        assert_eq!(tags.get("yale:org"), None);
        assert_eq!(tags.get("aws:cloudformation:stack-name"), None);
    }

    #[test]
    fn test_identity_filters() {
        assert_eq!(identity_filters("acme", None).len(), 3);
        assert_eq!(identity_filters("acme", Some("")).len(), 3);

        let filters = identity_filters("acme", Some("g1"));
        assert_eq!(filters.len(), 4);
        assert_eq!(filters[3], TagFilter::new(TAG_GROUP, "g1"));
    }

    #[test]
    fn test_filter_matches() {
        let tags = Tags::identity("acme", "g1");
        assert!(identity_filters("acme", Some("g1")).iter().all(|f| f.matches(&tags)));
        assert!(!TagFilter::new(TAG_GROUP, "g2").matches(&tags));
        assert!(!TagFilter::new("missing", "x").matches(&tags));
    }

    #[test]
    fn test_tags_serde_shape() {
        let tags = Tags::from(vec![Tag::new("Name", "x")]);
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"[{"Key":"Name","Value":"x"}]"#);
    }

    fn arb_key() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(TAG_ORG.to_string()),
            Just(TAG_GROUP.to_string()),
            Just(TAG_LEGACY_ORG.to_string()),
            "aws:[a-z]{1,8}",
            "[A-Za-z][A-Za-z0-9:_-]{0,12}",
        ]
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(
            pairs in proptest::collection::vec((arb_key(), "[a-z0-9]{0,8}"), 0..12),
            org in "[a-z]{1,8}",
            group in "[a-z0-9]{1,8}",
        ) {
            let tags: Tags = pairs.into_iter().map(|(k, v)| Tag::new(k, v)).collect();
            let once = tags.normalize(&org, &group);
            let twice = once.normalize(&org, &group);
            prop_assert_eq!(once, twice);
        }
    }
}
