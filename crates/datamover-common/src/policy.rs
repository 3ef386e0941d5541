//! IAM policy documents
//!
//! Policies are generated as typed documents and compared structurally: two
//! documents are equivalent when they grant the same thing, regardless of
//! statement order, action order, or whether a single action was written as
//! a string or a one-element list.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::defaults::TRANSFER_SERVICE_PRINCIPAL;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// A list of strings that also accepts a bare string when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StringList(pub Vec<String>);

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(s) => Self(vec![s]),
            Repr::Many(v) => Self(v),
        })
    }
}

impl StringList {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn canonical(&self) -> Vec<&str> {
        let mut items: Vec<&str> = self.0.iter().map(String::as_str).collect();
        items.sort_unstable();
        items.dedup();
        items
    }
}

impl<S: Into<String>> FromIterator<S> for StringList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Principal block, e.g. `{"Service": ["datasync.amazonaws.com"]}`.
pub type Principal = BTreeMap<String, StringList>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatementEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sid: String,
    pub effect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub action: StringList,
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub resource: StringList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

impl StatementEntry {
    /// An `Allow` statement over `actions` on `resources`.
    pub fn allow<A, R>(sid: &str, actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            sid: sid.to_string(),
            effect: "Allow".to_string(),
            principal: None,
            action: actions.into_iter().collect(),
            resource: resources.into_iter().collect(),
            condition: None,
        }
    }

    fn canonical(&self) -> String {
        let principal = self.principal.as_ref().map(|p| {
            p.iter()
                .map(|(k, v)| (k.as_str(), v.canonical()))
                .collect::<BTreeMap<_, _>>()
        });
        serde_json::json!({
            "sid": self.sid,
            "effect": self.effect,
            "principal": principal,
            "action": self.action.canonical(),
            "resource": self.resource.canonical(),
            "condition": self.condition,
        })
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<StatementEntry>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<StatementEntry>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    /// Parse a policy document from JSON.
    pub fn from_json(doc: &str) -> serde_json::Result<Self> {
        serde_json::from_str(doc)
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Structural comparison, ignoring ordering and string/list spelling.
    pub fn equivalent(&self, other: &PolicyDocument) -> bool {
        if self.version != other.version || self.statement.len() != other.statement.len() {
            return false;
        }
        let canonical = |doc: &PolicyDocument| {
            let mut statements: Vec<String> =
                doc.statement.iter().map(StatementEntry::canonical).collect();
            statements.sort_unstable();
            statements
        };
        canonical(self) == canonical(other)
    }
}

/// Access policy for a DataSync bucket access role.
///
/// Grants list/locate on the bucket and object read/write/delete/tagging on
/// its contents, nothing else.
pub fn bucket_access_policy(bucket_arn: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        StatementEntry::allow(
            "ListBucket",
            [
                "s3:GetBucketLocation",
                "s3:ListBucket",
                "s3:ListBucketMultipartUploads",
            ],
            [bucket_arn],
        ),
        StatementEntry::allow(
            "GetBucketObjects",
            [
                "s3:AbortMultipartUpload",
                "s3:DeleteObject",
                "s3:GetObject",
                "s3:ListMultipartUploadParts",
                "s3:GetObjectTagging",
                "s3:PutObjectTagging",
                "s3:PutObject",
            ],
            [format!("{bucket_arn}/*")],
        ),
    ])
}

static ASSUME_ROLE_POLICY: LazyLock<String> = LazyLock::new(|| {
    serde_json::json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": [TRANSFER_SERVICE_PRINCIPAL] },
            "Action": ["sts:AssumeRole"],
        }],
    })
    .to_string()
});

/// Trust policy letting the DataSync service assume a bucket access role.
pub fn assume_role_policy() -> &'static str {
    &ASSUME_ROLE_POLICY
}

fn org_role_resource(org: &str) -> String {
    format!("arn:aws:iam::*:role/spinup/{org}/*")
}

/// Inline session policy for creating movers in `org`.
pub fn mover_create_policy(org: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        StatementEntry::allow(
            "CreateRole",
            [
                "iam:CreateRole",
                "iam:GetRole",
                "iam:GetRolePolicy",
                "iam:ListAttachedRolePolicies",
                "iam:ListRolePolicies",
                "iam:AttachRolePolicy",
                "iam:PutRolePolicy",
                "iam:TagRole",
                "iam:UntagRole",
            ],
            [org_role_resource(org)],
        ),
        StatementEntry::allow(
            "DeleteRole",
            [
                "iam:DeleteRole",
                "iam:DetachRolePolicy",
                "iam:DeleteRolePolicy",
            ],
            [org_role_resource(org)],
        ),
    ])
}

/// Inline session policy for deleting movers in `org`.
pub fn mover_delete_policy(org: &str) -> PolicyDocument {
    PolicyDocument::new(vec![StatementEntry::allow(
        "DeleteRole",
        [
            "iam:DeleteRole",
            "iam:GetRole",
            "iam:GetRolePolicy",
            "iam:ListAttachedRolePolicies",
            "iam:ListRolePolicies",
            "iam:DetachRolePolicy",
            "iam:DeleteRolePolicy",
        ],
        [org_role_resource(org)],
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "arn:aws:s3:::my-bucket";

    #[test]
    fn test_bucket_policy_scope() {
        let policy = bucket_access_policy(BUCKET);
        assert_eq!(policy.version, POLICY_VERSION);
        assert_eq!(policy.statement.len(), 2);
        assert_eq!(policy.statement[0].resource.0, vec![BUCKET.to_string()]);
        assert_eq!(
            policy.statement[1].resource.0,
            vec!["arn:aws:s3:::my-bucket/*".to_string()]
        );
        assert!(
            policy
                .statement
                .iter()
                .flat_map(|s| s.action.0.iter())
                .all(|a| a.starts_with("s3:"))
        );
    }

    #[test]
    fn test_equivalent_ignores_ordering_and_spelling() {
        let generated = bucket_access_policy(BUCKET);
        let stored = r#"{
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Sid": "GetBucketObjects",
                    "Effect": "Allow",
                    "Action": [
                        "s3:PutObject", "s3:PutObjectTagging", "s3:GetObjectTagging",
                        "s3:ListMultipartUploadParts", "s3:GetObject", "s3:DeleteObject",
                        "s3:AbortMultipartUpload"
                    ],
                    "Resource": "arn:aws:s3:::my-bucket/*"
                },
                {
                    "Sid": "ListBucket",
                    "Effect": "Allow",
                    "Action": ["s3:ListBucketMultipartUploads", "s3:ListBucket", "s3:GetBucketLocation"],
                    "Resource": ["arn:aws:s3:::my-bucket"]
                }
            ]
        }"#;
        let stored = PolicyDocument::from_json(stored).unwrap();
        assert_ne!(generated, stored);
        assert!(generated.equivalent(&stored));
    }

    #[test]
    fn test_equivalent_detects_changes() {
        let generated = bucket_access_policy(BUCKET);
        assert!(!generated.equivalent(&bucket_access_policy("arn:aws:s3:::other")));

        let mut widened = generated.clone();
        widened.statement[1].action.0.push("s3:*".to_string());
        assert!(!generated.equivalent(&widened));

        let mut truncated = generated.clone();
        truncated.statement.pop();
        assert!(!generated.equivalent(&truncated));
    }

    #[test]
    fn test_roundtrip_through_json_is_equivalent() {
        let policy = mover_create_policy("acme");
        let parsed = PolicyDocument::from_json(&policy.to_json().unwrap()).unwrap();
        assert!(policy.equivalent(&parsed));
    }

    #[test]
    fn test_assume_role_policy_is_cached() {
        let first = assume_role_policy();
        let second = assume_role_policy();
        assert!(std::ptr::eq(first, second));

        let doc = PolicyDocument::from_json(first).unwrap();
        let principal = doc.statement[0].principal.as_ref().unwrap();
        assert_eq!(principal["Service"].0, vec![TRANSFER_SERVICE_PRINCIPAL]);
        assert_eq!(doc.statement[0].action.0, vec!["sts:AssumeRole"]);
    }

    #[test]
    fn test_session_policies_scoped_to_org() {
        for policy in [mover_create_policy("acme"), mover_delete_policy("acme")] {
            for statement in &policy.statement {
                assert_eq!(
                    statement.resource.0,
                    vec!["arn:aws:iam::*:role/spinup/acme/*".to_string()]
                );
            }
        }
    }
}
