//! Standard block library and page types of a personal/portfolio site.
//!
//! Scalars are registered once under generic tags (`text`, `url`, ...).
//! Fields that need a tighter constraint declare an inline scalar with the
//! same tag, so the constraint travels with the field and the wire form
//! stays unchanged.

use ramo_sdk::schema::{
    FieldDescriptor, FieldGroup, KindDescriptor, PageTypeSchema, PrimitiveType,
};
use serde_json::json;
use tracing::debug;

use super::BlockRegistry;
use crate::error::CoreResult;

/// Kinds allowed at the top level of a general-purpose page body.
pub const SECTION_KINDS: &[&str] = &[
    "hero",
    "intro_text",
    "card_grid",
    "post_list",
    "quote",
    "stats",
    "logos",
    "cta_section",
    "faq",
    "contact",
    "divider",
];

/// Build a registry holding the standard kinds and page types.
pub fn standard_registry() -> CoreResult<BlockRegistry> {
    let registry = BlockRegistry::new();
    register_standard_kinds(&registry)?;
    register_standard_page_types(&registry)?;
    Ok(registry)
}

/// Register the standard scalar, struct and list kinds.
pub fn register_standard_kinds(registry: &BlockRegistry) -> CoreResult<()> {
    registry.register_all(scalar_kinds())?;
    registry.register_all(section_kinds())?;
    debug!(kinds = registry.len(), "standard block kinds registered");
    Ok(())
}

/// Register the standard page types.
pub fn register_standard_page_types(registry: &BlockRegistry) -> CoreResult<()> {
    let page_types = [
        PageTypeSchema::new("home", "Home Page")
            .allow_all(SECTION_KINDS)
            .allow("social_link"),
        PageTypeSchema::new("blog_index", "Blog Index Page").allow_all(&[
            "intro_text",
            "post_list",
            "cta_section",
            "divider",
        ]),
        PageTypeSchema::new("blog", "Blog Post")
            .allow_all(&["intro_text", "quote", "card_grid", "cta_section", "divider"])
            .blocks(1, None),
        PageTypeSchema::new("project_index", "Project Index Page").allow_all(&[
            "intro_text",
            "card_grid",
            "stats",
            "logos",
            "cta_section",
            "divider",
        ]),
        PageTypeSchema::new("project", "Project Page")
            .allow_all(&[
                "intro_text",
                "stats",
                "quote",
                "card_grid",
                "cta_section",
                "divider",
            ])
            .blocks(1, None),
        PageTypeSchema::new("contact", "Contact Page").allow_all(&[
            "intro_text",
            "contact",
            "faq",
            "social_link",
            "divider",
        ]),
        PageTypeSchema::new("legal", "Legal Page")
            .allow_all(&["intro_text", "divider"])
            .blocks(1, None),
    ];
    for page_type in page_types {
        registry.register_page_type(page_type)?;
    }
    Ok(())
}

fn scalar_kinds() -> Vec<KindDescriptor> {
    vec![
        KindDescriptor::scalar("text", PrimitiveType::Text),
        KindDescriptor::scalar("rich_text", PrimitiveType::RichText),
        KindDescriptor::scalar("integer", PrimitiveType::Integer),
        KindDescriptor::scalar("boolean", PrimitiveType::Boolean),
        KindDescriptor::scalar("url", PrimitiveType::Url),
        KindDescriptor::scalar("email", PrimitiveType::Email),
        KindDescriptor::scalar("image", PrimitiveType::MediaRef).label("Image"),
    ]
}

fn text(max_length: usize) -> KindDescriptor {
    KindDescriptor::scalar("text", PrimitiveType::Text).max_length(max_length)
}

fn choice(kind: &str, options: &[(&str, &str)], default: &str) -> KindDescriptor {
    KindDescriptor::choice(kind, options).default_value(json!(default))
}

fn button_style() -> KindDescriptor {
    choice(
        "button_style",
        &[
            ("primary", "Primary Button"),
            ("secondary", "Secondary Button"),
            ("outline", "Outline Button"),
        ],
        "primary",
    )
}

/// Optional heading and description shared by most sections.
fn section_intro() -> FieldGroup {
    FieldGroup::new("section_intro")
        .field(
            FieldDescriptor::new("heading", text(200))
                .optional()
                .help("Section heading"),
        )
        .field(
            FieldDescriptor::new("description", text(500))
                .optional()
                .help("Section description"),
        )
}

fn section_kinds() -> Vec<KindDescriptor> {
    let intro = section_intro();

    vec![
        KindDescriptor::structure("hero")
            .label("Hero Section")
            .field(FieldDescriptor::new("title", text(200)).help("Hero title"))
            .field(FieldDescriptor::new("subtitle", text(500)).optional())
            .field(FieldDescriptor::new("background_image", "image").optional())
            .field(
                FieldDescriptor::new(
                    "background_color",
                    text(7).pattern("#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})"),
                )
                .optional()
                .help("Background color (hex code, e.g., #ffffff)"),
            )
            .field(FieldDescriptor::new("cta_text", text(50)).optional())
            .field(FieldDescriptor::new("cta_link", "url").optional())
            .field(FieldDescriptor::new("cta_style", button_style())),
        KindDescriptor::structure("intro_text")
            .label("Intro Text")
            .field(FieldDescriptor::new("heading", text(200)).optional())
            .field(FieldDescriptor::new("text", "rich_text").help("Main text content"))
            .field(FieldDescriptor::new("image", "image").optional())
            .field(
                FieldDescriptor::new(
                    "image_position",
                    choice(
                        "image_position",
                        &[
                            ("left", "Left"),
                            ("right", "Right"),
                            ("top", "Top"),
                            ("bottom", "Bottom"),
                        ],
                        "right",
                    ),
                )
                .help("Image position relative to text"),
            ),
        KindDescriptor::structure("card")
            .field(FieldDescriptor::new("title", text(200)))
            .field(FieldDescriptor::new("description", text(300)))
            .field(FieldDescriptor::new("image", "image").optional())
            .field(FieldDescriptor::new("link", "url").optional())
            .field(
                FieldDescriptor::new("link_text", text(50))
                    .optional()
                    .default_value(json!("Learn more")),
            ),
        KindDescriptor::structure("card_grid")
            .label("Card Grid")
            .group(&intro)
            .field(FieldDescriptor::new(
                "cards",
                KindDescriptor::list("cards", "card").count(1, Some(12)),
            ))
            .field(
                FieldDescriptor::new(
                    "columns",
                    choice(
                        "columns",
                        &[("2", "2 Columns"), ("3", "3 Columns"), ("4", "4 Columns")],
                        "3",
                    ),
                )
                .help("Number of columns on desktop"),
            ),
        KindDescriptor::structure("post_list")
            .label("Post List")
            .group(&intro)
            .field(
                FieldDescriptor::new(
                    "post_count",
                    KindDescriptor::scalar("integer", PrimitiveType::Integer)
                        .range(Some(1), Some(12)),
                )
                .default_value(json!(3)),
            )
            .field(FieldDescriptor::new("show_featured_only", "boolean").optional())
            .field(FieldDescriptor::new("tag_filter", text(100)).optional())
            .field(
                FieldDescriptor::new("show_images", "boolean")
                    .optional()
                    .default_value(json!(true)),
            )
            .field(
                FieldDescriptor::new("show_excerpts", "boolean")
                    .optional()
                    .default_value(json!(true)),
            ),
        KindDescriptor::structure("quote")
            .label("Quote")
            .field(FieldDescriptor::new("quote", "text"))
            .field(FieldDescriptor::new("author", text(100)).optional())
            .field(FieldDescriptor::new("author_title", text(200)).optional())
            .field(FieldDescriptor::new("author_image", "image").optional())
            .field(FieldDescriptor::new(
                "quote_style",
                choice(
                    "quote_style",
                    &[
                        ("testimonial", "Testimonial Style"),
                        ("pullquote", "Pull Quote Style"),
                        ("blockquote", "Block Quote Style"),
                    ],
                    "testimonial",
                ),
            )),
        KindDescriptor::structure("stat")
            .field(FieldDescriptor::new("number", text(20)))
            .field(FieldDescriptor::new("label", text(100)))
            .field(FieldDescriptor::new("description", text(200)).optional()),
        KindDescriptor::structure("stats")
            .label("Statistics")
            .group(&intro)
            .field(FieldDescriptor::new(
                "stats",
                KindDescriptor::list("stat_items", "stat").count(1, Some(8)),
            )),
        KindDescriptor::structure("logo")
            .field(FieldDescriptor::new("logo", "image"))
            .field(FieldDescriptor::new("company_name", text(100)))
            .field(FieldDescriptor::new("link", "url").optional()),
        KindDescriptor::structure("logos")
            .label("Logos Grid")
            .group(&intro)
            .field(FieldDescriptor::new(
                "logos",
                KindDescriptor::list("logo_items", "logo").count(1, Some(20)),
            ))
            .field(
                FieldDescriptor::new("grayscale", "boolean")
                    .optional()
                    .default_value(json!(true)),
            ),
        KindDescriptor::structure("cta_section")
            .label("CTA Section")
            .field(FieldDescriptor::new("headline", text(200)))
            .field(FieldDescriptor::new("subheadline", text(500)).optional())
            .field(FieldDescriptor::new("button_text", text(50)))
            .field(FieldDescriptor::new("button_link", "url"))
            .field(FieldDescriptor::new("button_style", button_style()))
            .field(FieldDescriptor::new(
                "background_color",
                choice(
                    "background_color",
                    &[
                        ("white", "White"),
                        ("gray", "Light Gray"),
                        ("primary", "Primary Color"),
                        ("dark", "Dark"),
                    ],
                    "gray",
                ),
            )),
        KindDescriptor::structure("faq_item")
            .field(FieldDescriptor::new("question", text(300)))
            .field(FieldDescriptor::new("answer", "rich_text")),
        KindDescriptor::structure("faq")
            .label("FAQ")
            .group(&intro)
            .field(FieldDescriptor::new(
                "faqs",
                KindDescriptor::list("faq_items", "faq_item").count(1, None),
            )),
        KindDescriptor::structure("contact")
            .label("Contact")
            .group(&intro)
            .field(FieldDescriptor::new(
                "contact_type",
                choice(
                    "contact_type",
                    &[
                        ("form", "Contact Form"),
                        ("info", "Contact Information"),
                        ("both", "Form and Information"),
                    ],
                    "both",
                ),
            ))
            .field(FieldDescriptor::new("email", "email").optional())
            .field(FieldDescriptor::new("phone", text(20)).optional())
            .field(FieldDescriptor::new("address", "text").optional())
            .field(
                FieldDescriptor::new("form_title", text(100))
                    .optional()
                    .default_value(json!("Get in Touch")),
            ),
        KindDescriptor::structure("divider")
            .label("Divider")
            .field(FieldDescriptor::new(
                "divider_style",
                choice(
                    "divider_style",
                    &[
                        ("line", "Simple Line"),
                        ("dots", "Dots"),
                        ("wave", "Wave"),
                        ("space", "Just Space"),
                    ],
                    "line",
                ),
            ))
            .field(FieldDescriptor::new(
                "spacing",
                choice(
                    "spacing",
                    &[
                        ("small", "Small (2rem)"),
                        ("medium", "Medium (4rem)"),
                        ("large", "Large (6rem)"),
                    ],
                    "medium",
                ),
            )),
        KindDescriptor::structure("social_link")
            .label("Social Link")
            .field(FieldDescriptor::new("platform", text(50)))
            .field(FieldDescriptor::new("url", "url"))
            .field(FieldDescriptor::new("icon", text(50)).help("Icon class or name")),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::{ValidationMode, decode, validate, validate_for_page_type};

    #[test]
    fn standard_registry_has_no_dangling_references() {
        let registry = standard_registry().unwrap();
        assert!(registry.dangling_references().is_empty());
        for kind in SECTION_KINDS {
            assert!(registry.contains(kind), "missing section kind '{kind}'");
        }
        assert!(registry.page_type("project").is_some());
    }

    #[test]
    fn every_section_instantiates_from_defaults() {
        let registry = standard_registry().unwrap();
        for kind in SECTION_KINDS {
            let block = registry.instantiate(kind).unwrap();
            assert_eq!(block.kind, *kind);
        }
        let divider = registry.instantiate("divider").unwrap();
        let doc = ramo_sdk::types::Document::new().with(divider);
        assert!(validate(&doc, &registry, ValidationMode::Strict).is_ok());
    }

    #[test]
    fn card_grid_limits() {
        let registry = standard_registry().unwrap();
        let card = json!({"title": "Ramo", "description": "A CMS core"});
        let grid = |n: usize| {
            json!([{"kind": "card_grid", "value": {
                "cards": vec![card.clone(); n],
                "columns": "3"
            }}])
        };

        let ok = decode(&grid(12), &registry).unwrap();
        assert!(validate(&ok, &registry, ValidationMode::Strict).is_ok());

        let too_many = decode(&grid(13), &registry).unwrap();
        let report = validate(&too_many, &registry, ValidationMode::Strict).unwrap_err();
        assert_eq!(report.violations()[0].path.to_string(), "$[0].cards");
    }

    #[test]
    fn hero_title_length_is_enforced() {
        let registry = standard_registry().unwrap();
        let json = json!([{"kind": "hero", "value": {
            "title": "x".repeat(201),
            "cta_style": "primary"
        }}]);
        let doc = decode(&json, &registry).unwrap();
        let report = validate(&doc, &registry, ValidationMode::Strict).unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].path.to_string(), "$[0].title");
    }

    #[test]
    fn legal_page_rejects_sections_it_does_not_allow() {
        let registry = standard_registry().unwrap();
        let page_type = registry.page_type("legal").unwrap();
        let json = json!([{"kind": "divider", "value": {
            "divider_style": "line", "spacing": "small"
        }}, {"kind": "social_link", "value": {
            "platform": "GitHub", "url": "https://github.com/example", "icon": "github"
        }}]);
        let doc = decode(&json, &registry).unwrap();
        let report =
            validate_for_page_type(&doc, &registry, &page_type, ValidationMode::Strict)
                .unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].path.to_string(), "$[1]");
    }
}
