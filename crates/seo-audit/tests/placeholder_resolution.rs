use std::collections::BTreeMap;

use seo_audit::audit::{ContentUnit, ContentUnitId, FieldValue, UnitType};
use seo_audit::placeholder::{
    extract_placeholders, validate_placeholders, MissingFieldPolicy, PlaceholderError,
    PlaceholderResolver, SyntaxIssue,
};

fn blog_post() -> ContentUnit {
    let mut fields = BTreeMap::new();
    fields.insert("title".to_string(), FieldValue::Text("Hello World".to_string()));
    fields.insert(
        "intro".to_string(),
        FieldValue::RichText(
            "<h2>Our first loaf</h2><p>It took <em>three</em> attempts.<br>Worth it.</p>"
                .to_string(),
        ),
    );
    fields.insert("reading_minutes".to_string(), FieldValue::Number(4));
    fields.insert("featured".to_string(), FieldValue::Flag(true));
    ContentUnit {
        id: ContentUnitId("hello-world".to_string()),
        unit_type: UnitType::new("blog_page"),
        url: Some("https://bakery.example/blog/hello-world/".to_string()),
        fields,
    }
}

#[test]
fn resolves_fields_with_truncation() {
    let resolver = PlaceholderResolver::default();
    let post = blog_post();

    assert_eq!(resolver.resolve_unit("{title}", &post), Ok("Hello World".to_string()));
    assert_eq!(resolver.resolve_unit("{title[:5]}", &post), Ok("Hello".to_string()));
    assert_eq!(
        resolver.resolve_unit("{intro}", &post),
        Ok("Our first loaf It took three attempts. Worth it.".to_string())
    );
    assert_eq!(
        resolver.resolve_unit("{reading_minutes} min read, featured: {featured}", &post),
        Ok("4 min read, featured: true".to_string())
    );
}

#[test]
fn missing_fields_use_the_configured_fallback() {
    let post = blog_post();

    let empty = PlaceholderResolver::new(MissingFieldPolicy::Empty);
    assert_eq!(empty.resolve_unit("{missing}", &post), Ok(String::new()));

    let literal = PlaceholderResolver::new(MissingFieldPolicy::LeaveLiteral);
    assert_eq!(
        literal.resolve_unit("{title} {missing}", &post),
        Ok("Hello World {missing}".to_string())
    );
}

#[test]
fn structured_data_templates_escape_braces() {
    let resolver = PlaceholderResolver::default().with_global("site_name", "Bakery Demo");
    let template =
        r#"{{"@type": "BlogPosting", "headline": "{title[:40]}", "publisher": "{site_name}"}}"#;

    assert_eq!(
        resolver.resolve_unit(template, &blog_post()),
        Ok(r#"{"@type": "BlogPosting", "headline": "Hello World", "publisher": "Bakery Demo"}"#
            .to_string())
    );
}

#[test]
fn malformed_tokens_fail_with_location() {
    let resolver = PlaceholderResolver::default();
    let post = blog_post();

    let cases = [
        ("{title", 0, "{title", SyntaxIssue::UnclosedBrace),
        ("Read } more", 5, "}", SyntaxIssue::UnmatchedClosingBrace),
        ("Intro: {intro[:ten]}", 7, "{intro[:ten]}", SyntaxIssue::NonNumericLength),
        ("{title[:0]}", 0, "{title[:0]}", SyntaxIssue::NonPositiveLength),
    ];
    for (template, offset, fragment, issue) in cases {
        assert_eq!(
            resolver.resolve_unit(template, &post),
            Err(PlaceholderError::InvalidSyntax {
                offset,
                fragment: fragment.to_string(),
                issue,
            }),
            "template {template:?}"
        );
    }
}

#[test]
fn resolution_is_idempotent_on_token_free_output() {
    let resolver = PlaceholderResolver::default();
    let post = blog_post();
    let once = resolver
        .resolve_unit("{title} | Bakery", &post)
        .expect("valid template");
    let twice = resolver.resolve_unit(&once, &post).expect("valid template");
    assert_eq!(once, twice);
}

#[test]
fn bulk_edit_validation_reports_unknown_fields() {
    let post = blog_post();
    let template = "{title[:60]} | {site_name} - {subtitle}";

    let referenced = extract_placeholders(template).expect("valid template");
    assert_eq!(referenced.len(), 3);

    let mut available: Vec<&str> = post.fields.keys().map(String::as_str).collect();
    available.push("site_name");
    assert_eq!(
        validate_placeholders(template, available),
        Ok(vec!["subtitle".to_string()])
    );
}
