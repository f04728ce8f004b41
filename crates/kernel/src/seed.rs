//! Site seeding from a YAML site definition.
//!
//! ```yaml
//! pages:
//!   - slug: home
//!     type: home
//!     publish: true
//!     content:
//!       - kind: hero
//!         value: { title: Welcome, cta_style: primary }
//!     children:
//!       - slug: blog
//!         type: blog_index
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::content::{PageService, codec};

/// Built-in portfolio site.
const PORTFOLIO_SITE: &str = include_str!("../sites/portfolio.yaml");

/// A site: its root pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteDefinition {
    #[serde(default)]
    pub pages: Vec<PageDefinition>,
}

/// One page and its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDefinition {
    pub slug: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub members_only: bool,
    /// Publish the content revision after saving it.
    #[serde(default)]
    pub publish: bool,
    /// Body in wire form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PageDefinition>,
}

/// What [`apply_site`] created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub pages: usize,
    pub revisions: usize,
    pub published: usize,
}

/// Parse a site definition.
pub fn parse_site(yaml: &str) -> Result<SiteDefinition> {
    serde_yml::from_str(yaml).context("invalid site definition")
}

/// Read and parse a site definition file.
pub fn load_site(path: &Path) -> Result<SiteDefinition> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read site definition {}", path.display()))?;
    parse_site(&yaml).with_context(|| format!("in {}", path.display()))
}

/// The built-in portfolio site.
pub fn portfolio_site() -> Result<SiteDefinition> {
    parse_site(PORTFOLIO_SITE)
}

/// Create every page of `site`, parents before children.
///
/// Content is decoded and validated in the service's validation mode.
/// Stops at the first failure; pages created before it are kept.
pub fn apply_site(service: &PageService, site: &SiteDefinition) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    for page in &site.pages {
        apply_page(service, None, page, page.slug.clone(), &mut summary)?;
    }
    info!(
        pages = summary.pages,
        revisions = summary.revisions,
        published = summary.published,
        "site seeded"
    );
    Ok(summary)
}

fn apply_page(
    service: &PageService,
    parent: Option<Uuid>,
    page: &PageDefinition,
    trail: String,
    summary: &mut SeedSummary,
) -> Result<()> {
    let node = service
        .create_page(parent, &page.slug, &page.type_tag)
        .with_context(|| format!("failed to create page '{trail}'"))?;
    summary.pages += 1;

    if page.members_only {
        service.set_members_only(node.id, true)?;
    }

    match &page.content {
        Some(json) => {
            let document =
                codec::decode_with_mode(json, service.registry(), service.validation_mode())
                    .with_context(|| format!("invalid content for page '{trail}'"))?;
            let sequence = service
                .save_revision(node.id, document, page.author.as_deref())
                .with_context(|| format!("invalid content for page '{trail}'"))?;
            summary.revisions += 1;
            if page.publish {
                service
                    .publish(node.id, sequence)
                    .with_context(|| format!("failed to publish page '{trail}'"))?;
                summary.published += 1;
            }
        }
        None if page.publish => bail!("page '{trail}' has no content to publish"),
        None => {}
    }

    for child in &page.children {
        apply_page(
            service,
            Some(node.id),
            child,
            format!("{trail}/{}", child.slug),
            summary,
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::library::standard_registry;
    use crate::models::PublishState;

    #[test]
    fn portfolio_site_seeds_cleanly() {
        let service = PageService::new(standard_registry().unwrap());
        let summary = apply_site(&service, &portfolio_site().unwrap()).unwrap();
        assert_eq!(summary.pages, 8);
        assert_eq!(summary.revisions, 8);
        assert_eq!(summary.published, 7);

        let tree = service.snapshot();
        let project = tree.resolve(&["home", "projects", "ramo"]).unwrap();
        let project = service.page(project.id).unwrap();
        assert!(project.members_only);
        assert_eq!(project.state, PublishState::Live);

        let cookies = tree.resolve(&["home", "cookie-policy"]).unwrap();
        assert_eq!(service.page(cookies.id).unwrap().state, PublishState::Draft);
    }

    #[test]
    fn errors_name_the_slug_trail() {
        let site = parse_site(
            r#"
pages:
  - slug: home
    type: home
    children:
      - slug: broken
        type: legal
        publish: true
        content:
          - kind: divider
            value: { divider_style: zigzag, spacing: small }
"#,
        )
        .unwrap();
        let service = PageService::new(standard_registry().unwrap());
        let err = apply_site(&service, &site).unwrap_err();
        assert!(format!("{err:#}").contains("home/broken"), "{err:#}");
    }

    #[test]
    fn publish_without_content_is_refused() {
        let site =
            parse_site("pages:\n  - slug: home\n    type: home\n    publish: true\n").unwrap();
        let service = PageService::new(standard_registry().unwrap());
        assert!(apply_site(&service, &site).is_err());
    }

    #[test]
    fn missing_slug_is_rejected() {
        assert!(parse_site("pages:\n  - type: home\n").is_err());
    }
}
