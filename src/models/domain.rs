//! Catalog domain model
//!
//! Plain value structures describing archival objects. Nothing here knows
//! about persistence; both storage backends hand these types in and out.
//!
//! ```text
//! IntellectualObject
//! ├── filesets[]          Fileset (one page / unit)
//! │   ├── object_files[]  ObjectFile ── checksums[], premis_events[]
//! │   └── premis_events[]
//! ├── object_files[]      descriptor / metadata files of the object itself
//! ├── premis_events[]
//! └── collections[]       many-to-many membership
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// `file_function` tag of the files counted by `total_data_size`
pub const SOURCE_FILE_FUNCTION: &str = "function:source";

/// Actor reference embedded in a PREMIS event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkingAgent {
    pub value: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub role: String,
}

/// Provenance record. Append-only once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremisEvent {
    pub identifier: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub detail: String,
    pub date_time: DateTime<Utc>,
    pub outcome: String,
    pub outcome_detail_note: String,
    pub linking_agent: LinkingAgent,
}

/// Event handled by the event store, optionally pointing at an object's
/// logical identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPremisEvent {
    #[serde(flatten)]
    pub event: PremisEvent,
    pub intellectual_object_identifier: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: String,
    pub digest: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFile {
    pub identifier: Uuid,
    /// Location inside the object's storage tree
    pub path: String,
    pub file_format: String,
    pub file_function: String,
    pub size: i64,
    pub digest: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_fixity_check: DateTime<Utc>,
    pub checksums: Vec<Checksum>,
    pub premis_events: Vec<PremisEvent>,
}

impl ObjectFile {
    /// Final component of `path`
    pub fn name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.path)
    }

    pub fn is_source(&self) -> bool {
        self.file_function == SOURCE_FILE_FUNCTION
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fileset {
    pub identifier: Uuid,
    pub alternate_identifiers: Vec<String>,
    pub title: String,
    pub revision_number: i64,
    pub created_at: DateTime<Utc>,
    /// Sequencing hint, e.g. the page number
    pub order_label: String,
    pub object_files: Vec<ObjectFile>,
    pub premis_events: Vec<PremisEvent>,
}

impl Fileset {
    /// Sum of the sizes of the `function:source` files. Service and
    /// derivative copies are not counted.
    pub fn total_data_size(&self) -> i64 {
        self.object_files
            .iter()
            .filter(|file| file.is_source())
            .map(|file| file.size)
            .sum()
    }

    pub fn source_object_file(&self) -> Option<&ObjectFile> {
        self.object_files.iter().find(|file| file.is_source())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub identifier: Uuid,
    pub alternate_identifiers: Vec<String>,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub collection_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntellectualObject {
    /// Logical identity, stable across revisions
    pub identifier: Uuid,
    /// Ingest bin shared by the object and its filesets
    pub bin_identifier: Uuid,
    pub alternate_identifiers: Vec<String>,
    #[serde(rename = "type")]
    pub object_type: String,
    pub revision_number: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub filesets: Vec<Fileset>,
    pub object_files: Vec<ObjectFile>,
    pub premis_events: Vec<PremisEvent>,
    pub collections: Vec<Collection>,
}

impl IntellectualObject {
    /// Sum of the filesets' `total_data_size`. The object's own descriptor
    /// and metadata files are not part of the rollup.
    pub fn total_data_size(&self) -> i64 {
        self.filesets.iter().map(Fileset::total_data_size).sum()
    }

    /// All collection alternate identifiers joined with `/`
    pub fn collections_summary(&self) -> String {
        self.collections
            .iter()
            .flat_map(|collection| collection.alternate_identifiers.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Top-level objects own their bin; only those are listed by `find`
    pub fn is_top_level(&self) -> bool {
        self.bin_identifier == self.identifier
    }

    /// Every event in the tree, object first, then filesets and their files
    pub fn all_premis_events(&self) -> impl Iterator<Item = &PremisEvent> {
        self.premis_events
            .iter()
            .chain(
                self.object_files
                    .iter()
                    .flat_map(|file| file.premis_events.iter()),
            )
            .chain(self.filesets.iter().flat_map(|fileset| {
                fileset.premis_events.iter().chain(
                    fileset
                        .object_files
                        .iter()
                        .flat_map(|file| file.premis_events.iter()),
                )
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 17, 12, 0, 0).unwrap()
    }

    fn file(path: &str, function: &str, size: i64) -> ObjectFile {
        ObjectFile {
            identifier: Uuid::new_v4(),
            path: path.to_string(),
            file_format: "image/tiff".to_string(),
            file_function: function.to_string(),
            size,
            digest: vec![0xab; 32],
            created_at: timestamp(),
            updated_at: timestamp(),
            last_fixity_check: timestamp(),
            checksums: vec![],
            premis_events: vec![],
        }
    }

    fn fileset(files: Vec<ObjectFile>) -> Fileset {
        Fileset {
            identifier: Uuid::new_v4(),
            alternate_identifiers: vec!["page-1".to_string()],
            title: "Page 1".to_string(),
            revision_number: 1,
            created_at: timestamp(),
            order_label: "1".to_string(),
            object_files: files,
            premis_events: vec![],
        }
    }

    fn collection(alternate_identifiers: &[&str]) -> Collection {
        Collection {
            identifier: Uuid::new_v4(),
            alternate_identifiers: alternate_identifiers.iter().map(|s| s.to_string()).collect(),
            title: "Box".to_string(),
            description: String::new(),
            collection_type: "types:box".to_string(),
            created_at: timestamp(),
            updated_at: timestamp(),
        }
    }

    fn object(filesets: Vec<Fileset>) -> IntellectualObject {
        let identifier = Uuid::new_v4();
        IntellectualObject {
            identifier,
            bin_identifier: identifier,
            alternate_identifiers: vec![],
            object_type: "types:monograph".to_string(),
            revision_number: 1,
            created_at: timestamp(),
            updated_at: timestamp(),
            title: "Object".to_string(),
            description: String::new(),
            filesets,
            object_files: vec![file("meta/descriptor.xml", "function:descriptor", 999)],
            premis_events: vec![],
            collections: vec![],
        }
    }

    #[test]
    fn test_fileset_counts_only_source_files() {
        let fileset = fileset(vec![
            file("data/0001.tif", "function:source", 100),
            file("data/0001.jp2", "function:service", 50),
        ]);
        assert_eq!(fileset.total_data_size(), 100);
    }

    #[test]
    fn test_object_rolls_up_fileset_sizes() {
        let page = || {
            fileset(vec![
                file("data/0001.tif", "function:source", 100),
                file("data/0001.jp2", "function:service", 50),
            ])
        };
        let object = object(vec![page(), page()]);

        // descriptor file of size 999 is excluded
        assert_eq!(object.total_data_size(), 200);
    }

    #[test]
    fn test_empty_object_has_zero_size() {
        assert_eq!(object(vec![]).total_data_size(), 0);
    }

    #[test]
    fn test_source_object_file() {
        let fileset = fileset(vec![
            file("data/0001.jp2", "function:service", 50),
            file("data/0001.tif", "function:source", 100),
        ]);
        let source = fileset.source_object_file().unwrap();
        assert_eq!(source.path, "data/0001.tif");

        let without_source = self::fileset(vec![file("a.jp2", "function:service", 1)]);
        assert!(without_source.source_object_file().is_none());
    }

    #[test]
    fn test_object_file_name() {
        let f = file("abc/data/0001.function:source.tif", "function:source", 1);
        assert_eq!(f.name(), "0001.function:source.tif");
    }

    #[test]
    fn test_collections_summary() {
        let mut object = object(vec![]);
        object.collections = vec![collection(&["box-1", "amjewess"]), collection(&["box-2"])];
        assert_eq!(object.collections_summary(), "box-1/amjewess/box-2");
    }

    #[test]
    fn test_top_level_detection() {
        let mut object = object(vec![]);
        assert!(object.is_top_level());
        object.bin_identifier = Uuid::new_v4();
        assert!(!object.is_top_level());
    }
}
