//! Container index: the manifests describing what a container holds.
//!
//! The primary index names the one required primary document and any
//! auxiliary documents by loader id. The case-repository index is a
//! parallel, optional manifest; when it is absent or malformed the
//! container simply has no case repositories. A single bad entry never
//! aborts the whole parse — it is logged, recorded, and dropped.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::persist::report::LoadReport;

/// Location of the primary index inside a container.
pub const KB_INDEX_LOCATION: &str = "kb-inf/index.toml";
/// Location of the case-repository index inside a container.
pub const CRS_INDEX_LOCATION: &str = "crs-inf/index.toml";

#[derive(Debug, Serialize, Deserialize)]
struct KbIndexFile {
    #[serde(rename = "knowledge-base")]
    knowledge_base: KbIndexSection,
}

#[derive(Debug, Serialize, Deserialize)]
struct KbIndexSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    primary: Option<String>,
    #[serde(default)]
    auxiliary: Vec<RawEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CrsIndexFile {
    #[serde(default)]
    repository: Vec<RawEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    loader: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

/// The parsed container index.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerIndex {
    /// Location of the primary document, relative to the container root.
    pub primary: PathBuf,
    /// Auxiliary documents: (loader id, relative location), in declaration order.
    pub auxiliaries: Vec<(String, PathBuf)>,
    /// Case repositories: (loader id, relative location), in declaration order.
    pub case_repositories: Vec<(String, PathBuf)>,
}

impl ContainerIndex {
    /// Read both manifests from an extracted container root.
    ///
    /// A missing or unparsable primary index, or one naming no primary
    /// document, fails the whole load. The case-repository index falls back
    /// to empty on any error of its own.
    pub fn read(root: &Path, report: &mut LoadReport) -> Result<Self, PersistError> {
        let kb_index_path = root.join(KB_INDEX_LOCATION);
        let raw = std::fs::read_to_string(&kb_index_path).map_err(|e| {
            PersistError::Structural {
                message: format!("primary index {KB_INDEX_LOCATION} unreadable: {e}"),
            }
        })?;
        let parsed: KbIndexFile =
            toml::from_str(&raw).map_err(|e| PersistError::Structural {
                message: format!("primary index {KB_INDEX_LOCATION} unparsable: {e}"),
            })?;

        let primary = parsed
            .knowledge_base
            .primary
            .as_deref()
            .and_then(sanitize_location)
            .ok_or_else(|| PersistError::Structural {
                message: "primary index names no usable primary document".into(),
            })?;

        let auxiliaries = collect_entries(parsed.knowledge_base.auxiliary, "auxiliary", report);
        let case_repositories =
            collect_entries(read_crs_entries(root), "case repository", report);

        Ok(Self {
            primary,
            auxiliaries,
            case_repositories,
        })
    }

    /// Render the primary index manifest for saving.
    pub fn kb_index_document(
        primary: &str,
        auxiliaries: impl Iterator<Item = (String, String)>,
    ) -> String {
        let file = KbIndexFile {
            knowledge_base: KbIndexSection {
                primary: Some(primary.to_string()),
                auxiliary: auxiliaries
                    .map(|(loader, location)| RawEntry {
                        loader: Some(loader),
                        location: Some(location),
                    })
                    .collect(),
            },
        };
        toml::to_string_pretty(&file).expect("index manifest serializes")
    }

    /// Render the case-repository index manifest for saving.
    pub fn crs_index_document(entries: impl Iterator<Item = (String, String)>) -> String {
        let file = CrsIndexFile {
            repository: entries
                .map(|(loader, location)| RawEntry {
                    loader: Some(loader),
                    location: Some(location),
                })
                .collect(),
        };
        toml::to_string_pretty(&file).expect("index manifest serializes")
    }
}

fn read_crs_entries(root: &Path) -> Vec<RawEntry> {
    let path = root.join(CRS_INDEX_LOCATION);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };
    match toml::from_str::<CrsIndexFile>(&raw) {
        Ok(parsed) => parsed.repository,
        Err(e) => {
            tracing::warn!(
                location = CRS_INDEX_LOCATION,
                error = %e,
                "case-repository index unparsable, treating as empty"
            );
            Vec::new()
        }
    }
}

fn collect_entries(
    raw: Vec<RawEntry>,
    kind: &str,
    report: &mut LoadReport,
) -> Vec<(String, PathBuf)> {
    let mut entries = Vec::new();
    for entry in raw {
        let (Some(loader), Some(location)) = (entry.loader, entry.location) else {
            tracing::warn!(kind, "index entry missing loader or ref, dropping");
            report
                .dropped_index_entries
                .push(format!("{kind} entry missing loader or ref"));
            continue;
        };
        match sanitize_location(&location) {
            Some(path) => entries.push((loader, path)),
            None => {
                tracing::warn!(kind, loader = %loader, location = %location, "unusable index location, dropping");
                report
                    .dropped_index_entries
                    .push(format!("{kind} \"{loader}\": unusable location \"{location}\""));
            }
        }
    }
    entries
}

/// Accept only relative locations that stay inside the container root.
fn sanitize_location(location: &str) -> Option<PathBuf> {
    if location.is_empty() {
        return None;
    }
    let path = Path::new(location);
    if path.is_absolute() {
        return None;
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn parses_full_index() {
        let dir = tempfile::TempDir::new().unwrap();
        write(
            dir.path(),
            KB_INDEX_LOCATION,
            r#"
            [knowledge-base]
            primary = "kb/basic.json"

            [[knowledge-base.auxiliary]]
            loader = "xclpattern"
            ref = "kb/xcl.json"
            "#,
        );
        write(
            dir.path(),
            CRS_INDEX_LOCATION,
            r#"
            [[repository]]
            loader = "train"
            ref = "cases/train.json"
            "#,
        );

        let mut report = LoadReport::new();
        let index = ContainerIndex::read(dir.path(), &mut report).unwrap();
        assert_eq!(index.primary, PathBuf::from("kb/basic.json"));
        assert_eq!(
            index.auxiliaries,
            vec![("xclpattern".to_string(), PathBuf::from("kb/xcl.json"))]
        );
        assert_eq!(
            index.case_repositories,
            vec![("train".to_string(), PathBuf::from("cases/train.json"))]
        );
        assert!(report.is_clean());
    }

    #[test]
    fn missing_primary_is_structural() {
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), KB_INDEX_LOCATION, "[knowledge-base]\n");
        let err = ContainerIndex::read(dir.path(), &mut LoadReport::new()).unwrap_err();
        assert!(matches!(err, PersistError::Structural { .. }));
    }

    #[test]
    fn missing_index_file_is_structural() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ContainerIndex::read(dir.path(), &mut LoadReport::new()).unwrap_err();
        assert!(matches!(err, PersistError::Structural { .. }));
    }

    #[test]
    fn bad_entry_is_dropped_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        write(
            dir.path(),
            KB_INDEX_LOCATION,
            r#"
            [knowledge-base]
            primary = "kb/basic.json"

            [[knowledge-base.auxiliary]]
            loader = "escaper"
            ref = "../outside.json"

            [[knowledge-base.auxiliary]]
            loader = "good"
            ref = "kb/good.json"

            [[knowledge-base.auxiliary]]
            ref = "kb/no-loader.json"
            "#,
        );

        let mut report = LoadReport::new();
        let index = ContainerIndex::read(dir.path(), &mut report).unwrap();
        assert_eq!(index.auxiliaries.len(), 1);
        assert_eq!(index.auxiliaries[0].0, "good");
        assert_eq!(report.dropped_index_entries.len(), 2);
    }

    #[test]
    fn malformed_crs_index_falls_back_to_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        write(
            dir.path(),
            KB_INDEX_LOCATION,
            "[knowledge-base]\nprimary = \"kb/basic.json\"\n",
        );
        write(dir.path(), CRS_INDEX_LOCATION, "not valid toml [[[");

        let mut report = LoadReport::new();
        let index = ContainerIndex::read(dir.path(), &mut report).unwrap();
        assert!(index.case_repositories.is_empty());
    }

    #[test]
    fn round_trips_through_rendered_manifest() {
        let rendered = ContainerIndex::kb_index_document(
            "kb/basic.json",
            vec![("xclpattern".to_string(), "kb/xcl.json".to_string())].into_iter(),
        );
        let dir = tempfile::TempDir::new().unwrap();
        write(dir.path(), KB_INDEX_LOCATION, &rendered);

        let index = ContainerIndex::read(dir.path(), &mut LoadReport::new()).unwrap();
        assert_eq!(index.primary, PathBuf::from("kb/basic.json"));
        assert_eq!(index.auxiliaries[0].0, "xclpattern");
    }
}
