//! In-memory registry fixtures

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use talos_image::{
    CandidateSelector, Error, ImageInspection, ImageRegistry, ParsedImage, Result, TagParser,
};

/// Registry answering from a fixed table of `untagged -> [(tag, digest)]`
#[derive(Default)]
pub struct StaticRegistry {
    images: HashMap<String, Vec<(String, String)>>,
}

impl StaticRegistry {
    pub fn with_image(mut self, untagged: &str, tags: &[(&str, &str)]) -> Self {
        self.images.insert(
            untagged.to_string(),
            tags.iter()
                .map(|(t, d)| (t.to_string(), d.to_string()))
                .collect(),
        );
        self
    }

    /// The standard fixture images
    pub fn standard() -> Self {
        Self::default()
            .with_image(
                "image2",
                &[("latest", "sha:001"), ("stable", "sha:002"), ("debian", "sha:003")],
            )
            .with_image(
                "image3",
                &[
                    ("v2.3.3", "sha:002"),
                    ("v2.3.4", "sha:006"),
                    ("v2.3.5", "sha:003"),
                    ("v2.4.0", "sha:004"),
                    ("v3.0.0", "sha:005"),
                    ("v2.3.5-alpine", "sha:007"),
                ],
            )
    }
}

/// Creation time derived from the digest so newer digests look newer
pub fn created_at_for(digest: &str) -> DateTime<Utc> {
    let n: i64 = digest
        .rsplit(':')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    Utc.timestamp_opt(1_700_000_000 + n * 60, 0).unwrap()
}

#[async_trait]
impl ImageRegistry for StaticRegistry {
    async fn list_tags(&self, image: &ParsedImage) -> Result<Vec<String>> {
        self.images
            .get(image.untagged())
            .map(|tags| tags.iter().map(|(t, _)| t.clone()).collect())
            .ok_or_else(|| Error::registry(format!("unknown image {}", image.untagged())))
    }

    async fn inspect(&self, image: &ParsedImage) -> Result<ImageInspection> {
        let tag = image
            .tag()
            .map(|t| t.to_string())
            .ok_or_else(|| Error::registry("inspect without tag"))?;
        self.images
            .get(image.untagged())
            .and_then(|tags| tags.iter().find(|(t, _)| *t == tag))
            .map(|(_, digest)| ImageInspection {
                digest: digest.clone(),
                created_at: created_at_for(digest),
            })
            .ok_or_else(|| Error::registry(format!("unknown tag {}", image)))
    }
}

pub fn standard_selector() -> CandidateSelector {
    CandidateSelector::new(Arc::new(StaticRegistry::standard()), TagParser::default())
}

pub fn image(text: &str) -> ParsedImage {
    ParsedImage::parse(text, false, &TagParser::default()).unwrap()
}
