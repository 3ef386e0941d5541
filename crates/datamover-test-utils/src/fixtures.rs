//! Request fixtures

use datamover_common::{LocationInput, MoverCreateRequest, S3LocationInput, Tag, Tags};
use uuid::Uuid;

/// A unique, valid mover name.
pub fn mover_name() -> String {
    format!("mover-{}", &Uuid::new_v4().simple().to_string()[..12])
}

pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}

/// An S3 location input for `bucket`.
pub fn s3_location(bucket: &str) -> LocationInput {
    LocationInput::s3(S3LocationInput {
        s3_bucket_arn: bucket_arn(bucket),
        ..Default::default()
    })
}

/// A create request moving data from `source_bucket` to `destination_bucket`.
///
/// Carries one user tag plus a reserved one that must be dropped.
pub fn s3_request(name: &str, source_bucket: &str, destination_bucket: &str) -> MoverCreateRequest {
    MoverCreateRequest {
        name: Some(name.to_string()),
        source: Some(s3_location(source_bucket)),
        destination: Some(s3_location(destination_bucket)),
        tags: Tags::from(vec![
            Tag::new("Project", "archive"),
            Tag::new("spinup:org", "someone-else"),
        ]),
    }
}
