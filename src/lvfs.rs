//! Firmware metadata for cabinets published through the Linux Vendor
//! Firmware Service (LVFS).
//!
//! An LVFS cabinet carries an AppStream `*.metainfo.xml` file describing the
//! firmware component.  The component ID and the version of the *first*
//! listed release are taken as the cabinet's identity.  AppStream allows
//! several releases to be listed (newest first, by convention), so this is an
//! assumption rather than a guarantee.

use std::cmp::Ordering;
use std::io::{Read, Seek};

use serde::Deserialize;
use thiserror::Error;

use crate::cabinet::Cabinet;

/// Suffix identifying the metadata file within an LVFS cabinet.
pub const METAINFO_SUFFIX: &str = ".metainfo.xml";

/// Errors produced while extracting LVFS metadata.
#[derive(Debug, Error)]
pub enum Error {
    /// The cabinet itself could not be read.
    #[error(transparent)]
    Cabinet(#[from] crate::Error),

    /// No file name ends in `.metainfo.xml`.
    #[error("LVFS cabinet does not contain a {METAINFO_SUFFIX} file")]
    MissingMetadata,

    /// The metadata file is not well-formed XML.
    #[error("could not parse metadata file {file:?}: {source}")]
    Xml {
        /// Name of the metadata file.
        file: String,
        /// Parser error.
        #[source]
        source: quick_xml::de::DeError,
    },

    /// The component has no (or an empty) `<id>`.
    #[error("could not determine component ID from metadata file {file:?}")]
    MissingComponentId {
        /// Name of the metadata file.
        file: String,
    },

    /// There is no release, or the first release has no version.
    #[error(
        "could not extract release information from metadata file {file:?}"
    )]
    MissingRelease {
        /// Name of the metadata file.
        file: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct Component {
    #[serde(default)]
    id: String,
    #[serde(default)]
    releases: Releases,
}

#[derive(Debug, Default, Deserialize)]
struct Releases {
    #[serde(default)]
    release: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(rename = "@version", default)]
    version: String,
}

/// The identity of a firmware component.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Metadata {
    id: String,
    version: String,
}

impl Metadata {
    /// Parses an AppStream component document.  `file` names the document
    /// in error messages.
    pub fn from_xml(xml: &str, file: &str) -> Result<Metadata, Error> {
        let component: Component =
            quick_xml::de::from_str(xml).map_err(|source| Error::Xml {
                file: file.to_string(),
                source,
            })?;
        if component.id.is_empty() {
            return Err(Error::MissingComponentId { file: file.to_string() });
        }
        let version = match component.releases.release.into_iter().next() {
            Some(release) if !release.version.is_empty() => release.version,
            _ => return Err(Error::MissingRelease { file: file.to_string() }),
        };
        Ok(Metadata { id: component.id, version })
    }

    /// Returns the component ID, e.g. `com.vendor.device.firmware`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the version of the first listed release.
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// A cabinet together with its parsed LVFS metadata.
pub struct LvfsCabinet<R> {
    cabinet: Cabinet<R>,
    metadata: Metadata,
}

impl<R: Read + Seek> LvfsCabinet<R> {
    /// Opens a cabinet and reads its metadata file.
    pub fn open(reader: R) -> Result<LvfsCabinet<R>, Error> {
        let mut cabinet = Cabinet::new(reader)?;
        let file = cabinet
            .file_list()
            .into_iter()
            .find(|name| name.ends_with(METAINFO_SUFFIX))
            .map(str::to_string)
            .ok_or(Error::MissingMetadata)?;
        let data = cabinet.content(&file)?;
        let xml = String::from_utf8_lossy(&data);
        let metadata = Metadata::from_xml(&xml, &file)?;
        Ok(LvfsCabinet { cabinet, metadata })
    }
}

impl<R> LvfsCabinet<R> {
    /// Returns the component ID.
    pub fn id(&self) -> &str {
        self.metadata.id()
    }

    /// Returns the firmware version.
    pub fn version(&self) -> &str {
        self.metadata.version()
    }

    /// Returns the parsed metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the underlying cabinet.
    pub fn cabinet(&self) -> &Cabinet<R> {
        &self.cabinet
    }

    /// Returns the underlying cabinet, for reading other files.
    pub fn cabinet_mut(&mut self) -> &mut Cabinet<R> {
        &mut self.cabinet
    }

    /// Consumes this value, returning the underlying cabinet.
    pub fn into_cabinet(self) -> Cabinet<R> {
        self.cabinet
    }
}

/// Compares two LVFS version strings.
///
/// If both parse as semantic versions (`MAJOR.MINOR.PATCH`), they are
/// compared by semver precedence.  Otherwise they are compared byte by byte,
/// so `"12" < "9"`.
pub fn compare_versions(v1: &str, v2: &str) -> Ordering {
    match (semver::Version::parse(v1), semver::Version::parse(v2)) {
        (Ok(s1), Ok(s2)) => (s1.major, s1.minor, s1.patch, &s1.pre)
            .cmp(&(s2.major, s2.minor, s2.patch, &s2.pre)),
        _ => v1.cmp(v2),
    }
}
