use super::{line_bounds, splice, Snapshot};
use crate::error::{Error, Result};
use crate::identity::UpdateIdentity;
use crate::stage::FileStage;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use talos_core::TalosSettings;

/// Image on a Dockerfile `FROM` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerfileLocation {
    pub identity: UpdateIdentity,
    pub settings: TalosSettings,
    pub file: Utf8PathBuf,
    /// 0-based line index
    pub line: usize,
    /// Byte offset of the image within the line
    pub column: usize,
    pub snapshot: Snapshot,
}

impl DockerfileLocation {
    pub(crate) fn stage_write(&self, new_image: &str, stage: &mut dyn FileStage) -> Result<Snapshot> {
        let content = stage.read(&self.file)?;
        let (start, end) = line_bounds(&content, self.line).ok_or_else(|| {
            Error::conflict(&self.file, format!("line {} no longer exists", self.line + 1))
        })?;

        let line = &content[start..end];
        if self.snapshot.line.as_deref() != Some(line) {
            return Err(Error::conflict(
                &self.file,
                format!(
                    "line {} changed: expected '{}', found '{}'",
                    self.line + 1,
                    self.snapshot.line.as_deref().unwrap_or_default(),
                    line
                ),
            ));
        }

        let image_start = start + self.column;
        let image_end = image_start + self.snapshot.image.len();
        super::expect_span(&self.file, &content, image_start, image_end, &self.snapshot.image)?;

        let new_line = splice(line, self.column, self.column + self.snapshot.image.len(), new_image);
        stage.replace(&self.file, image_start, image_end, new_image)?;

        Ok(Snapshot {
            image: new_image.to_string(),
            line: Some(new_line),
        })
    }
}
