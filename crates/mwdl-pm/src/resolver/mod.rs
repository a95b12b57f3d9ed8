//! URL resolution: turns a configured target into the URL of an archive.
//!
//! Direct URLs and forge snapshots are pure string building. Distribution
//! targets need a revision lookup first; when that fails the resolver
//! degrades to a forge snapshot of the same ref instead of giving up, records
//! the failure on the [`RunState`], and reports [`Resolution::Degraded`].

mod revision;

pub use revision::{parse_revision, short_revision, strip_framing, BranchInfo, SHORT_REVISION_LEN};

use crate::error::Result;
use crate::http::HttpClient;
use crate::state::RunState;
use crate::target::{Category, ForgeKind, ForgeSource, Target, TargetId, TargetSource};

/// Token in direct URLs replaced by the default ref
pub const MWREL_TOKEN: &str = "$mwrel";

const DEFAULT_REVISION_BASE: &str = "https://gerrit.wikimedia.org/r";
const DEFAULT_DIST_BASE: &str = "https://extdist.wmflabs.org";
const DEFAULT_GITHUB_BASE: &str = "https://github.com";
const DEFAULT_GITLAB_BASE: &str = "https://gitlab.com";

/// Base URLs of every service the resolver talks to or builds URLs for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverEndpoints {
    /// Revision lookup REST root
    pub revision_base: String,
    /// Host serving packaged distribution tarballs
    pub dist_base: String,
    /// GitHub host, also used for the distribution fallback snapshot
    pub github_base: String,
    pub gitlab_base: String,
}

impl Default for ResolverEndpoints {
    fn default() -> Self {
        Self {
            revision_base: DEFAULT_REVISION_BASE.to_string(),
            dist_base: DEFAULT_DIST_BASE.to_string(),
            github_base: DEFAULT_GITHUB_BASE.to_string(),
            gitlab_base: DEFAULT_GITLAB_BASE.to_string(),
        }
    }
}

impl ResolverEndpoints {
    pub fn with_revision_base(mut self, base: impl Into<String>) -> Self {
        self.revision_base = base.into();
        self
    }

    pub fn with_dist_base(mut self, base: impl Into<String>) -> Self {
        self.dist_base = base.into();
        self
    }
}

/// Outcome of resolving one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The URL the source kind asks for
    Exact(String),
    /// Lower-fidelity URL used after the preferred resolution failed
    Degraded { url: String, reason: String },
    /// No URL could be built at all
    Unresolved { reason: String },
}

impl Resolution {
    pub fn url(&self) -> Option<&str> {
        match self {
            Resolution::Exact(url) | Resolution::Degraded { url, .. } => Some(url.as_str()),
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Resolution::Degraded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDownload {
    pub id: TargetId,
    pub resolution: Resolution,
}

impl ResolvedDownload {
    /// Download URL, empty when resolution failed outright
    pub fn url(&self) -> &str {
        self.resolution.url().unwrap_or_default()
    }
}

/// Replace every `$mwrel` token with the default ref
pub fn substitute_mwrel(url: &str, default_ref: &str) -> String {
    url.replace(MWREL_TOKEN, default_ref)
}

pub struct UrlResolver {
    http: HttpClient,
    endpoints: ResolverEndpoints,
}

impl UrlResolver {
    pub fn new(http: HttpClient, endpoints: ResolverEndpoints) -> Self {
        Self { http, endpoints }
    }

    /// Resolve a target's download URL. Never fails: degraded and unresolved
    /// outcomes are logged and set the run's failure flag.
    pub async fn resolve(&self, target: &Target, state: &RunState) -> ResolvedDownload {
        let default_ref = state.default_ref();

        let resolution = match &target.source {
            TargetSource::Url(url) => Resolution::Exact(substitute_mwrel(url, default_ref)),
            TargetSource::Forge(forge) => match self.forge_url(forge, default_ref) {
                Some(url) => Resolution::Exact(url),
                None => Resolution::Unresolved {
                    reason: format!("unsupported git forge type \"{}\"", forge.kind),
                },
            },
            TargetSource::Distribution => {
                self.resolve_distribution(target.category(), target.name(), default_ref)
                    .await
            }
        };

        match &resolution {
            Resolution::Exact(url) => {
                log::debug!("Resolved {} to \"{}\"", target.id, url);
            }
            Resolution::Degraded { url, reason } => {
                log::error!(
                    "Failed to resolve {} from distribution: {}. Falling back to \"{}\"",
                    target.id,
                    reason,
                    url
                );
                state.mark_failed();
            }
            Resolution::Unresolved { reason } => {
                log::error!("Failed to resolve {}: {}", target.id, reason);
                state.mark_failed();
            }
        }

        ResolvedDownload {
            id: target.id.clone(),
            resolution,
        }
    }

    /// Archive snapshot URL on a supported forge
    pub fn forge_url(&self, forge: &ForgeSource, default_ref: &str) -> Option<String> {
        let branch = forge.branch.as_deref().unwrap_or(default_ref);

        match forge.kind {
            ForgeKind::GitHub => Some(format!(
                "{}/{}/archive/{}.tar.gz",
                self.endpoints.github_base, forge.repo, branch
            )),
            ForgeKind::GitLab => Some(format!(
                "{}/{}/-/archive/{}.tar.gz",
                self.endpoints.gitlab_base, forge.repo, branch
            )),
            ForgeKind::Other(_) => None,
        }
    }

    /// Revision lookup URL for a ref of an extension or skin repository
    pub fn revision_url(&self, category: Category, name: &str, git_ref: &str) -> String {
        format!(
            "{}/projects/mediawiki%2F{}%2F{}/branches/{}",
            self.endpoints.revision_base,
            category.plural(),
            urlencoding::encode(name),
            urlencoding::encode(git_ref)
        )
    }

    pub fn distribution_url(
        &self,
        category: Category,
        name: &str,
        git_ref: &str,
        short_rev: &str,
    ) -> String {
        format!(
            "{}/dist/{}/{}-{}-{}.tar.gz",
            self.endpoints.dist_base,
            category.plural(),
            name,
            git_ref,
            short_rev
        )
    }

    /// Forge snapshot of the same ref, used when the revision lookup fails
    pub fn fallback_url(&self, category: Category, name: &str, git_ref: &str) -> String {
        format!(
            "{}/wikimedia/mediawiki-{}-{}/archive/{}.tar.gz",
            self.endpoints.github_base,
            category.plural(),
            name,
            git_ref
        )
    }

    /// Query the full revision hash of `git_ref`
    pub async fn lookup_revision(
        &self,
        category: Category,
        name: &str,
        git_ref: &str,
    ) -> Result<String> {
        let url = self.revision_url(category, name, git_ref);
        log::debug!("Looking up revision at \"{}\"", url);

        let body = self.http.get_bytes(&url).await?;
        parse_revision(&body)
    }

    async fn resolve_distribution(&self, category: Category, name: &str, git_ref: &str) -> Resolution {
        match self.lookup_revision(category, name, git_ref).await {
            Ok(revision) => Resolution::Exact(self.distribution_url(
                category,
                name,
                git_ref,
                short_revision(&revision),
            )),
            Err(e) => Resolution::Degraded {
                url: self.fallback_url(category, name, git_ref),
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn resolver(endpoints: ResolverEndpoints) -> UrlResolver {
        UrlResolver::new(HttpClient::new().unwrap(), endpoints)
    }

    fn state(default_ref: &str) -> RunState {
        RunState::new("/srv/wiki", "/tmp/work", default_ref)
    }

    /// Serve `body` to every request on a local port
    fn serve(status: u16, body: &'static [u8]) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let response = tiny_http::Response::from_data(body).with_status_code(status);
                let _ = request.respond(response);
            }
        });
        format!("http://127.0.0.1:{}", port)
    }

    #[test]
    fn test_substitute_mwrel() {
        assert_eq!(
            substitute_mwrel("https://x/$mwrel.zip", "REL1_40"),
            "https://x/REL1_40.zip"
        );
        assert_eq!(
            substitute_mwrel("https://x/$mwrel/$mwrel.tar.gz", "master"),
            "https://x/master/master.tar.gz"
        );
        assert_eq!(substitute_mwrel("https://x/y.zip", "master"), "https://x/y.zip");
    }

    #[test]
    fn test_forge_urls() {
        let resolver = resolver(ResolverEndpoints::default());
        let github = ForgeSource {
            kind: ForgeKind::GitHub,
            repo: "org/Foo".to_string(),
            branch: Some("main".to_string()),
        };
        assert_eq!(
            resolver.forge_url(&github, "REL1_40").unwrap(),
            "https://github.com/org/Foo/archive/main.tar.gz"
        );

        let gitlab = ForgeSource {
            kind: ForgeKind::GitLab,
            repo: "group/Bar".to_string(),
            branch: None,
        };
        assert_eq!(
            resolver.forge_url(&gitlab, "REL1_40").unwrap(),
            "https://gitlab.com/group/Bar/-/archive/REL1_40.tar.gz"
        );

        let other = ForgeSource {
            kind: ForgeKind::Other("gitea".to_string()),
            repo: "x/y".to_string(),
            branch: None,
        };
        assert_eq!(resolver.forge_url(&other, "master"), None);
    }

    #[test]
    fn test_revision_url_encodes_components() {
        let resolver = resolver(ResolverEndpoints::default());
        assert_eq!(
            resolver.revision_url(Category::Extension, "Cite", "REL1_40"),
            "https://gerrit.wikimedia.org/r/projects/mediawiki%2Fextensions%2FCite/branches/REL1_40"
        );
        assert_eq!(
            resolver.revision_url(Category::Skin, "My Skin", "wmf/1.42"),
            "https://gerrit.wikimedia.org/r/projects/mediawiki%2Fskins%2FMy%20Skin/branches/wmf%2F1.42"
        );
    }

    #[test]
    fn test_distribution_and_fallback_urls() {
        let resolver = resolver(ResolverEndpoints::default());
        assert_eq!(
            resolver.distribution_url(Category::Skin, "Vector", "REL1_40", "012345678"),
            "https://extdist.wmflabs.org/dist/skins/Vector-REL1_40-012345678.tar.gz"
        );
        assert_eq!(
            resolver.fallback_url(Category::Extension, "Cite", "REL1_40"),
            "https://github.com/wikimedia/mediawiki-extensions-Cite/archive/REL1_40.tar.gz"
        );
    }

    #[tokio::test]
    async fn test_resolve_direct_url() {
        let resolver = resolver(ResolverEndpoints::default());
        let state = state("REL1_40");
        let target = Target::new(
            Category::Extension,
            "Foo",
            TargetSource::Url("https://x/$mwrel.zip".to_string()),
        );

        let resolved = resolver.resolve(&target, &state).await;
        assert_eq!(resolved.resolution, Resolution::Exact("https://x/REL1_40.zip".to_string()));
        assert!(!state.has_failed());
    }

    #[tokio::test]
    async fn test_resolve_unknown_forge_is_unresolved() {
        let resolver = resolver(ResolverEndpoints::default());
        let state = state("master");
        let target = Target::new(
            Category::Extension,
            "Foo",
            TargetSource::Forge(ForgeSource {
                kind: ForgeKind::Other("gitea".to_string()),
                repo: "x/Foo".to_string(),
                branch: None,
            }),
        );

        let resolved = resolver.resolve(&target, &state).await;
        assert!(matches!(resolved.resolution, Resolution::Unresolved { .. }));
        assert_eq!(resolved.url(), "");
        assert!(state.has_failed());
    }

    #[tokio::test]
    async fn test_resolve_distribution_with_revision() {
        let base = serve(
            200,
            b")]}'\n{\"ref\":\"refs/heads/REL1_40\",\"revision\":\"abcdef0123456789abcdef\"}\n",
        );
        let resolver = resolver(ResolverEndpoints::default().with_revision_base(base));
        let state = state("REL1_40");
        let target = Target::new(Category::Extension, "Cite", TargetSource::Distribution);

        let resolved = resolver.resolve(&target, &state).await;
        assert_eq!(
            resolved.resolution,
            Resolution::Exact(
                "https://extdist.wmflabs.org/dist/extensions/Cite-REL1_40-abcdef012.tar.gz"
                    .to_string()
            )
        );
        assert!(!state.has_failed());
    }

    #[tokio::test]
    async fn test_resolve_distribution_unreachable_falls_back() {
        let resolver = resolver(
            ResolverEndpoints::default().with_revision_base("http://127.0.0.1:1"),
        );
        let state = state("REL1_40");
        let target = Target::new(Category::Skin, "Vector", TargetSource::Distribution);

        let resolved = resolver.resolve(&target, &state).await;
        assert!(resolved.resolution.is_degraded());
        assert_eq!(
            resolved.url(),
            "https://github.com/wikimedia/mediawiki-skins-Vector/archive/REL1_40.tar.gz"
        );
        assert!(state.has_failed());
    }

    #[tokio::test]
    async fn test_resolve_distribution_bad_body_falls_back() {
        let base = serve(200, b"<html>maintenance</html>");
        let resolver = resolver(ResolverEndpoints::default().with_revision_base(base));
        let state = state("master");
        let target = Target::new(Category::Extension, "Cite", TargetSource::Distribution);

        let resolved = resolver.resolve(&target, &state).await;
        assert_eq!(
            resolved.url(),
            "https://github.com/wikimedia/mediawiki-extensions-Cite/archive/master.tar.gz"
        );
        assert!(state.has_failed());
    }

    #[tokio::test]
    async fn test_resolve_distribution_not_found_falls_back() {
        let base = serve(404, b"Not Found");
        let resolver = resolver(ResolverEndpoints::default().with_revision_base(base));
        let state = state("REL1_41");
        let target = Target::new(Category::Extension, "Missing", TargetSource::Distribution);

        let resolved = resolver.resolve(&target, &state).await;
        assert!(resolved.resolution.is_degraded());
        assert!(state.has_failed());
    }
}
