use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{DownloaderError, Result};
use crate::target::{Category, ForgeKind, ForgeSource, Target, TargetSource};

/// Root of the download configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Default branch/ref for every target that doesn't name one
    #[serde(rename = "MWREL", default)]
    pub mwrel: String,

    #[serde(rename = "Extensions", default)]
    pub extensions: CategoryConfig,

    #[serde(rename = "Skins", default)]
    pub skins: CategoryConfig,
}

/// Targets of one category, grouped by source kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(rename = "WMF", default, skip_serializing_if = "Vec::is_empty")]
    pub wmf: Vec<String>,

    #[serde(rename = "Git", default, skip_serializing_if = "IndexMap::is_empty")]
    pub git: IndexMap<String, GitConfig>,

    #[serde(rename = "http", default, skip_serializing_if = "IndexMap::is_empty")]
    pub http: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl GitConfig {
    fn to_source(&self) -> ForgeSource {
        ForgeSource {
            kind: ForgeKind::from(self.kind.as_str()),
            repo: self.repo.clone(),
            branch: self.branch.clone().filter(|b| !b.is_empty()),
        }
    }
}

impl DownloaderConfig {
    /// Flatten every category and source kind into a list of targets.
    ///
    /// Order follows the file: extensions before skins, and within a category
    /// WMF, then Git, then http entries. A name may appear only once per category.
    pub fn targets(&self) -> Result<Vec<Target>> {
        let mut targets = Vec::new();
        self.extensions.collect(Category::Extension, &mut targets)?;
        self.skins.collect(Category::Skin, &mut targets)?;
        Ok(targets)
    }
}

impl CategoryConfig {
    pub fn is_empty(&self) -> bool {
        self.wmf.is_empty() && self.git.is_empty() && self.http.is_empty()
    }

    fn collect(&self, category: Category, out: &mut Vec<Target>) -> Result<()> {
        let mut seen = HashSet::new();
        let mut push = |target: Target| -> Result<()> {
            if !seen.insert(target.id.name.clone()) {
                return Err(DownloaderError::Config(format!(
                    "{} is listed more than once",
                    target.id
                )));
            }
            log::debug!(
                "Added {} {} to download queue.",
                target.source.kind_name(),
                target.id
            );
            out.push(target);
            Ok(())
        };

        for name in &self.wmf {
            push(Target::new(category, name, TargetSource::Distribution))?;
        }
        for (name, git) in &self.git {
            push(Target::new(category, name, TargetSource::Forge(git.to_source())))?;
        }
        for (name, url) in &self.http {
            push(Target::new(category, name, TargetSource::Url(url.clone())))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "MWREL": "REL1_40",
        "Extensions": {
            "WMF": ["Cite", "ParserFunctions"],
            "Git": {
                "Foo": { "type": "github", "repo": "org/Foo", "branch": "main" },
                "Bar": { "type": "gitlab", "repo": "group/Bar", "branch": "" }
            },
            "http": { "Baz": "https://example.org/Baz-$mwrel.zip" }
        },
        "Skins": {
            "WMF": ["Vector"]
        }
    }"#;

    #[test]
    fn test_parse_config() {
        let config: DownloaderConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.mwrel, "REL1_40");
        assert_eq!(config.extensions.wmf, vec!["Cite", "ParserFunctions"]);
        assert_eq!(config.extensions.git["Foo"].kind, "github");
        assert_eq!(config.extensions.git["Foo"].branch.as_deref(), Some("main"));
        assert!(config.skins.git.is_empty());
        assert!(!config.skins.is_empty());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let config: DownloaderConfig = serde_json::from_str("{}").unwrap();
        assert!(config.mwrel.is_empty());
        assert!(config.extensions.is_empty());
        assert!(config.skins.is_empty());
        assert!(config.targets().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_git_keys_are_ignored() {
        let json = r#"{ "Extensions": { "Git": {
            "Foo": { "type": "github", "repo": "org/Foo", "repoUrl": "https://x" }
        } } }"#;
        let config: DownloaderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.extensions.git["Foo"].repo, "org/Foo");
    }

    #[test]
    fn test_targets_in_file_order() {
        let config: DownloaderConfig = serde_json::from_str(SAMPLE).unwrap();
        let targets = config.targets().unwrap();

        let names: Vec<_> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Cite", "ParserFunctions", "Foo", "Bar", "Baz", "Vector"]);

        assert_eq!(targets[0].source, TargetSource::Distribution);
        assert_eq!(targets[5].category(), Category::Skin);
        assert_eq!(
            targets[4].source,
            TargetSource::Url("https://example.org/Baz-$mwrel.zip".to_string())
        );
    }

    #[test]
    fn test_empty_branch_means_default() {
        let config: DownloaderConfig = serde_json::from_str(SAMPLE).unwrap();
        let targets = config.targets().unwrap();
        let bar = targets.iter().find(|t| t.name() == "Bar").unwrap();

        match &bar.source {
            TargetSource::Forge(forge) => {
                assert_eq!(forge.kind, ForgeKind::GitLab);
                assert_eq!(forge.branch, None);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_name_in_category_is_rejected() {
        let json = r#"{ "Extensions": {
            "WMF": ["Foo"],
            "http": { "Foo": "https://example.org/Foo.zip" }
        } }"#;
        let config: DownloaderConfig = serde_json::from_str(json).unwrap();
        let err = config.targets().unwrap_err();
        assert!(matches!(err, DownloaderError::Config(_)));
    }

    #[test]
    fn test_same_name_in_different_categories_is_allowed() {
        let json = r#"{ "Extensions": { "WMF": ["Foo"] }, "Skins": { "WMF": ["Foo"] } }"#;
        let config: DownloaderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.targets().unwrap().len(), 2);
    }
}
