//! Project metadata: the optional `AUTHORS.yml` file and value resolution.
//!
//! Every document field resolves through the same precedence chain:
//! command-line override, then the config file's `document` block, then a
//! project-level fallback, then a hard default. Resolution happens once per
//! assembler pass and yields a [`DocumentMeta`] handed to the template.
//!
//! ```yaml
//! project_name: Edgequake
//! organization: Acme Corp
//! copyright: "© 2025 Acme Corp"
//! document:
//!   title: Operations Manual
//!   subtitle: Administrator Guide
//!   author: Platform Team
//!   header: Ops Manual
//!   footer: Internal use only
//! ```

use crate::config::{ConversionConfig, DEFAULT_VERSION};
use crate::error::BuildWarning;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Contents of the project metadata file. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project_name: Option<String>,
    pub organization: Option<String>,
    pub copyright: Option<String>,
    pub document: DocumentSection,
}

/// The `document:` block of [`ProjectConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSection {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl ProjectConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserialises to `null`; treat it as "no settings".
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Load the config file, degrading to defaults on any failure.
    ///
    /// Failures are logged and appended to `warnings`; they never abort.
    pub fn load_or_default(path: &Path, warnings: &mut Vec<BuildWarning>) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                let w = BuildWarning::ConfigUnreadable {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                };
                warn!("{w}");
                warnings.push(w);
                return Self::default();
            }
        };
        match Self::from_yaml(&text) {
            Ok(cfg) => {
                info!("Loaded config: {}", path.display());
                cfg
            }
            Err(e) => {
                let w = BuildWarning::ConfigInvalid {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                };
                warn!("{w}");
                warnings.push(w);
                Self::default()
            }
        }
    }
}

/// Fully resolved document metadata handed to the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMeta {
    pub title: String,
    pub subtitle: String,
    pub version: String,
    pub date: String,
    pub author: String,
    pub header: String,
    pub footer: String,
    pub copyright: String,
}

/// First non-empty value in precedence order, or `""`.
fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or("")
        .to_string()
}

impl DocumentMeta {
    /// Resolve every field from CLI overrides, the project config and defaults.
    pub fn resolve(config: &ConversionConfig, project: &ProjectConfig) -> Self {
        let doc = &project.document;

        let title = first_non_empty([
            config.title.as_deref(),
            doc.title.as_deref(),
            project.project_name.as_deref(),
            Some("Document"),
        ]);
        let subtitle = first_non_empty([config.subtitle.as_deref(), doc.subtitle.as_deref()]);
        let author = first_non_empty([
            config.author.as_deref(),
            doc.author.as_deref(),
            project.organization.as_deref(),
        ]);
        let copyright = first_non_empty([
            project.copyright.as_deref(),
            project.organization.as_deref(),
        ]);
        let version = first_non_empty([config.version.as_deref(), Some(DEFAULT_VERSION)]);

        let default_header = if subtitle.is_empty() {
            title.clone()
        } else {
            format!("{title} - {subtitle}")
        };
        let header = first_non_empty([
            config.header.as_deref(),
            doc.header.as_deref(),
            Some(default_header.as_str()),
        ]);
        let footer = first_non_empty([
            config.footer.as_deref(),
            doc.footer.as_deref(),
            Some(author.as_str()),
        ]);

        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let date = first_non_empty([config.date.as_deref(), Some(today.as_str())]);

        Self {
            title,
            subtitle,
            version,
            date,
            author,
            header,
            footer,
            copyright,
        }
    }
}
