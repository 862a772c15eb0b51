use super::{expect_span, scalar_span, Snapshot};
use crate::error::{Error, Result};
use crate::identity::UpdateIdentity;
use crate::stage::FileStage;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use talos_core::TalosSettings;

/// Image of one Compose service (`services.<service>.image`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeLocation {
    pub identity: UpdateIdentity,
    pub settings: TalosSettings,
    pub file: Utf8PathBuf,
    pub service: String,
    pub snapshot: Snapshot,
}

impl ComposeLocation {
    pub(crate) fn stage_write(&self, new_image: &str, stage: &mut dyn FileStage) -> Result<Snapshot> {
        let content = stage.read(&self.file)?;
        let (start, end) = find_service_image(&self.file, &content, &self.service)?;
        expect_span(&self.file, &content, start, end, &self.snapshot.image)?;
        stage.replace(&self.file, start, end, new_image)?;
        Ok(Snapshot::image(new_image))
    }
}

/// An `image:` key found under a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceImage {
    pub service: String,
    /// 0-based line index of the `image:` key
    pub line: usize,
    /// Absolute byte range of the value, or why it cannot be edited
    pub span: std::result::Result<(usize, usize), String>,
}

/// Services declared under the top-level `services:` key, with their images
#[derive(Debug, Default)]
pub(crate) struct ComposeServices {
    pub declared: Vec<String>,
    pub images: Vec<ServiceImage>,
}

fn key_of(text: &str) -> Option<&str> {
    let (key, _) = text.split_once(':')?;
    let key = key.trim();
    let key = key
        .strip_prefix('"')
        .and_then(|k| k.strip_suffix('"'))
        .or_else(|| key.strip_prefix('\'').and_then(|k| k.strip_suffix('\'')))
        .unwrap_or(key);
    (!key.is_empty()).then_some(key)
}

/// Line scan of a block-style Compose file.
///
/// Only `services.<name>.image` is considered; everything else is skipped
/// without interpretation so that comments, anchors elsewhere and key order
/// never matter.
pub(crate) fn scan_services(content: &str) -> ComposeServices {
    let mut result = ComposeServices::default();
    let mut in_services = false;
    let mut service_indent: Option<usize> = None;
    let mut current: Option<String> = None;
    let mut child_indent: Option<usize> = None;
    let mut offset = 0;

    for (index, raw) in content.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += raw.len();

        let line = raw.trim_end_matches('\n').trim_end_matches('\r');
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - trimmed.len();

        if indent == 0 {
            in_services = key_of(trimmed) == Some("services");
            service_indent = None;
            current = None;
            continue;
        }
        if !in_services {
            continue;
        }

        let service_level = *service_indent.get_or_insert(indent);
        if indent == service_level {
            current = key_of(trimmed).map(str::to_string);
            if let Some(name) = &current {
                result.declared.push(name.clone());
            }
            child_indent = None;
            continue;
        }
        if indent < service_level {
            continue;
        }

        let Some(service) = &current else {
            continue;
        };
        let child_level = *child_indent.get_or_insert(indent);
        if indent != child_level || key_of(trimmed) != Some("image") {
            continue;
        }

        let value_offset = indent + trimmed.find(':').map_or(trimmed.len(), |i| i + 1);
        let span = scalar_span(line, value_offset)
            .map(|(start, end)| (line_start + start, line_start + end));
        result.images.push(ServiceImage {
            service: service.clone(),
            line: index,
            span,
        });
    }

    result
}

/// Absolute byte range of `service`'s image value
pub(crate) fn find_service_image(
    path: &Utf8Path,
    content: &str,
    service: &str,
) -> Result<(usize, usize)> {
    let services = scan_services(content);
    let mut matches = services.images.iter().filter(|i| i.service == service);

    match (matches.next(), matches.next()) {
        (Some(image), None) => image.span.clone().map_err(|reason| {
            Error::invalid_location(path, format!("service '{}': {}", service, reason))
        }),
        (Some(_), Some(_)) => Err(Error::invalid_location(
            path,
            format!("service '{}' declares more than one image", service),
        )),
        (None, _) if services.declared.iter().any(|s| s == service) => Err(Error::conflict(
            path,
            format!("service '{}' no longer has an image", service),
        )),
        (None, _) => Err(Error::invalid_location(
            path,
            format!("service '{}' is not declared", service),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = "\
# stack
x-defaults: &defaults
  restart: always

services:
  web:
    <<: *defaults
    image: nginx:1.25.3 # front
    ports:
      - \"80:80\"

  'db':
    environment:
      image: not-a-service-key
    image: \"postgres:16.1\"
  cache:
    image: *cache_image
volumes:
  data: {}
";

    #[test]
    fn test_scan_finds_service_images() {
        let services = scan_services(COMPOSE);
        assert_eq!(services.declared, vec!["web", "db", "cache"]);
        assert_eq!(services.images.len(), 3);

        let web = &services.images[0];
        let (s, e) = web.span.clone().unwrap();
        assert_eq!(&COMPOSE[s..e], "nginx:1.25.3");

        let db = &services.images[1];
        let (s, e) = db.span.clone().unwrap();
        assert_eq!(&COMPOSE[s..e], "postgres:16.1");

        assert!(services.images[2].span.is_err());
    }

    #[test]
    fn test_find_service_image_errors() {
        let path = Utf8Path::new("compose.yml");
        assert!(find_service_image(path, COMPOSE, "web").is_ok());

        let err = find_service_image(path, COMPOSE, "cache").unwrap_err();
        assert!(err.to_string().contains("aliases"));

        let err = find_service_image(path, COMPOSE, "worker").unwrap_err();
        assert!(err.to_string().contains("not declared"));

        let err = find_service_image(path, "services:\n  web:\n    build: .\n", "web").unwrap_err();
        assert!(matches!(err, Error::ConcurrencyConflict { .. }));
    }
}
