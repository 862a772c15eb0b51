use super::{expect_span, Snapshot};
use crate::error::{Error, Result};
use crate::identity::UpdateIdentity;
use crate::stage::FileStage;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use talos_core::TalosSettings;

/// Image at an absolute byte range of a YAML file, as scanned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YamlLocation {
    pub identity: UpdateIdentity,
    pub settings: TalosSettings,
    pub file: Utf8PathBuf,
    pub start: usize,
    pub end: usize,
    pub snapshot: Snapshot,
}

impl YamlLocation {
    pub(crate) fn stage_write(&self, new_image: &str, stage: &mut dyn FileStage) -> Result<Snapshot> {
        let content = stage.read(&self.file)?;
        let (start, end) = stage.locate(&self.file, self.start, self.end).ok_or_else(|| {
            Error::conflict(
                &self.file,
                format!("{}..{} was already rewritten", self.start, self.end),
            )
        })?;
        expect_span(&self.file, &content, start, end, &self.snapshot.image)?;
        stage.replace(&self.file, start, end, new_image)?;
        Ok(Snapshot::image(new_image))
    }
}
