//! A directory as a document.
//!
//! Each `*.txt` file is an item; `*.comment.txt` files are non-primary.
//! Verdicts are written next to the item as `<stem>.verdict.json` sidecars,
//! which double as the "already annotated" marker across restarts. Identity
//! markers live in an in-memory table keyed by path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{AnnotationSink, Document};
use crate::error::{Error, Result};
use crate::model::{Category, ItemIdentity};

const ITEM_EXTENSION: &str = "txt";
const COMMENT_SUFFIX: &str = ".comment.txt";
const SIDECAR_EXTENSION: &str = "verdict.json";

/// Contents of a sidecar file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub identity: ItemIdentity,
    pub category: Category,
    pub display: String,
    pub raw: String,
    pub annotated_at: DateTime<Utc>,
}

pub struct DirDocument {
    root: PathBuf,
    markers: HashMap<PathBuf, ItemIdentity>,
}

impl DirDocument {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            markers: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read back the verdict written for `node`, if any.
    pub fn read_annotation(&self, node: &Path) -> Result<Option<Annotation>> {
        let path = sidecar_path(node);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

fn sidecar_path(node: &Path) -> PathBuf {
    node.with_extension(SIDECAR_EXTENSION)
}

/// Cheap change signature for a directory: number of entries plus the most
/// recent modification time. Two equal signatures mean "probably unchanged".
pub fn signature(root: &Path) -> Result<(usize, Option<SystemTime>)> {
    let mut count = 0;
    let mut latest = None;
    for entry in std::fs::read_dir(root)? {
        let modified = entry?.metadata()?.modified()?;
        count += 1;
        latest = latest.max(Some(modified));
    }
    Ok((count, latest))
}

impl Document for DirDocument {
    type Node = PathBuf;

    fn list_candidates(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            Error::Extraction(format!("cannot read {}: {e}", self.root.display()))
        })?;

        let mut nodes = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == ITEM_EXTENSION) {
                nodes.push(path);
            }
        }
        nodes.sort();
        Ok(nodes)
    }

    fn extract_content(&self, node: &PathBuf) -> Result<String> {
        std::fs::read_to_string(node)
            .map(|text| text.trim().to_string())
            .map_err(|e| Error::Extraction(format!("cannot read {}: {e}", node.display())))
    }

    fn is_non_primary(&self, node: &PathBuf) -> bool {
        node.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(COMMENT_SUFFIX))
    }

    fn identity_marker(&self, node: &PathBuf) -> Option<ItemIdentity> {
        self.markers.get(node).cloned()
    }

    fn set_identity_marker(&mut self, node: &PathBuf, identity: &ItemIdentity) {
        self.markers.insert(node.clone(), identity.clone());
    }
}

impl AnnotationSink for DirDocument {
    fn annotate(
        &mut self,
        node: &PathBuf,
        identity: &ItemIdentity,
        category: Category,
        raw_result: &str,
    ) -> Result<()> {
        let annotation = Annotation {
            identity: identity.clone(),
            category,
            display: category.display_text(raw_result).to_string(),
            raw: raw_result.to_string(),
            annotated_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&annotation)?;
        std::fs::write(sidecar_path(node), json)?;
        Ok(())
    }

    fn has_annotation(&self, node: &PathBuf) -> bool {
        sidecar_path(node).exists()
    }

    fn clear_annotation(&mut self, node: &PathBuf) -> Result<()> {
        match std::fs::remove_file(sidecar_path(node)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
