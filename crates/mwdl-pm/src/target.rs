//! Download targets: one named extension or skin and where to get it from.

use std::fmt;

/// Which tree a target is installed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Extension,
    Skin,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Extension => "extension",
            Category::Skin => "skin",
        }
    }

    /// Directory name under the target tree, also used in upstream URLs
    pub fn plural(&self) -> &'static str {
        match self {
            Category::Extension => "extensions",
            Category::Skin => "skins",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Git forge hosting a repository snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgeKind {
    GitHub,
    GitLab,
    Other(String),
}

impl From<&str> for ForgeKind {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "github" => ForgeKind::GitHub,
            "gitlab" => ForgeKind::GitLab,
            _ => ForgeKind::Other(value.to_string()),
        }
    }
}

impl fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeKind::GitHub => f.write_str("github"),
            ForgeKind::GitLab => f.write_str("gitlab"),
            ForgeKind::Other(kind) => f.write_str(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeSource {
    pub kind: ForgeKind,
    /// `owner/repo` path on the forge
    pub repo: String,
    /// Branch or tag; the run's default ref when `None`
    pub branch: Option<String>,
}

/// Where a target's archive comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    /// Packaged release from the Wikimedia distribution service
    Distribution,
    /// Archive snapshot of a forge-hosted git repository
    Forge(ForgeSource),
    /// Literal URL, `$mwrel` is replaced by the default ref
    Url(String),
}

impl TargetSource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TargetSource::Distribution => "WMF",
            TargetSource::Forge(_) => "Git",
            TargetSource::Url(_) => "Url",
        }
    }
}

/// Identity of a target within one run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId {
    pub category: Category,
    pub name: String,
}

impl TargetId {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    /// File name stem for this target's scratch files. Unique per run since
    /// an extension and a skin may share a name.
    pub fn scratch_stem(&self) -> String {
        format!("{}-{}", self.category, self.name)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.category, self.name)
    }
}

/// One unit of work for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: TargetId,
    pub source: TargetSource,
}

impl Target {
    pub fn new(category: Category, name: impl Into<String>, source: TargetSource) -> Self {
        Self {
            id: TargetId::new(category, name),
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn category(&self) -> Category {
        self.id.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        assert_eq!(Category::Extension.as_str(), "extension");
        assert_eq!(Category::Extension.plural(), "extensions");
        assert_eq!(Category::Skin.as_str(), "skin");
        assert_eq!(Category::Skin.plural(), "skins");
    }

    #[test]
    fn test_forge_kind_from_str() {
        assert_eq!(ForgeKind::from("github"), ForgeKind::GitHub);
        assert_eq!(ForgeKind::from("GitLab"), ForgeKind::GitLab);
        assert_eq!(
            ForgeKind::from("gitea"),
            ForgeKind::Other("gitea".to_string())
        );
    }

    #[test]
    fn test_target_id_display() {
        let target = Target::new(Category::Skin, "Vector", TargetSource::Distribution);
        assert_eq!(target.id.to_string(), "skin \"Vector\"");
        assert_eq!(target.name(), "Vector");
        assert_eq!(target.category(), Category::Skin);
    }

    #[test]
    fn test_scratch_stem_includes_category() {
        let extension = TargetId::new(Category::Extension, "Foo");
        let skin = TargetId::new(Category::Skin, "Foo");
        assert_eq!(extension.scratch_stem(), "extension-Foo");
        assert_eq!(skin.scratch_stem(), "skin-Foo");
    }
}
