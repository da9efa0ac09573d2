#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Common test utilities for jsonapi-resources integration tests

use std::sync::Arc;

use jsonapi_query::{
    AttributeDescriptor, FilterDescriptor, IdKind, KeyFormat, RawParams, RelationshipDescriptor,
    ResourceSchema, SchemaRegistry, ValueFormatter, ValueKind,
};
use jsonapi_resources::{
    Engine, EngineConfig, InMemoryRepository, Record, RecordRef, Response, Rule,
};
use serde_json::{Value, json};

/// Title-cases every word on output; stores names as given.
#[derive(Debug)]
pub struct TitleFormatter;

impl ValueFormatter for TitleFormatter {
    fn format(&self, value: &Value) -> Value {
        let Some(s) = value.as_str() else {
            return value.clone();
        };
        let titled: Vec<String> = s
            .split(' ')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect();
        Value::String(titled.join(" "))
    }

    fn unformat(&self, value: &Value) -> Option<Value> {
        value.as_str().map(|s| Value::String(s.to_lowercase()))
    }
}

fn name_is_long_enough(value: &str) -> bool {
    value.chars().count() > 1
}

fn person_without_posts(record: &Record) -> Option<String> {
    record
        .linkage("posts")
        .filter(|l| !l.is_empty())
        .map(|_| "A person with posts cannot be deleted.".to_owned())
}

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::from_schemas([
        ResourceSchema::builder("people")
            .attribute("name", ValueKind::String)
            .attribute("email", ValueKind::String)
            .attribute("date_joined", ValueKind::DateTime)
            .to_many("posts", "posts")
            .to_many("comments", "comments")
            .filter(FilterDescriptor::new("name").verified_by(name_is_long_enough))
            .build(),
        ResourceSchema::builder("posts")
            .attribute("title", ValueKind::String)
            .attribute("body", ValueKind::String)
            .to_one("author", "people")
            .to_one("section", "sections")
            .to_many("tags", "tags")
            .to_many("comments", "comments")
            .filters(["title", "author", "tags", "comments"])
            .sortable(["title", "body"])
            .updatable(["title", "body", "section", "tags", "comments"])
            .build(),
        ResourceSchema::builder("comments")
            .attribute("body", ValueKind::String)
            .to_one("author", "people")
            .to_one("post", "posts")
            .to_many("tags", "tags")
            .build(),
        ResourceSchema::builder("tags")
            .attribute("name", ValueKind::String)
            .to_many("posts", "posts")
            .build(),
        ResourceSchema::builder("sections")
            .attribute("name", ValueKind::String)
            .build(),
        ResourceSchema::builder("expense_entries")
            .attribute("transaction_date", ValueKind::Date)
            .attribute("cost", ValueKind::Float)
            .to_one("employee", "people")
            .to_one("iso_currency", "iso_currencies")
            .build(),
        ResourceSchema::builder("iso_currencies")
            .id_kind(IdKind::String)
            .key_param("code")
            .attribute("name", ValueKind::String)
            .attribute("country_name", ValueKind::String)
            .attribute("minor_unit", ValueKind::String)
            .filters(["country_name"])
            .sortable(["name", "country_name"])
            .build(),
        ResourceSchema::builder("breeds")
            .attribute_with(
                AttributeDescriptor::new("name", ValueKind::String)
                    .with_formatter(Arc::new(TitleFormatter)),
            )
            .build(),
        ResourceSchema::builder("preferences")
            .singleton()
            .attribute("advanced_mode", ValueKind::Boolean)
            .build(),
        ResourceSchema::builder("facts")
            .attribute("spouse_name", ValueKind::String)
            .attribute("bio", ValueKind::String)
            .attribute("quality_rating", ValueKind::Float)
            .attribute("salary", ValueKind::Float)
            .attribute("children", ValueKind::Integer)
            .attribute("date_time_joined", ValueKind::DateTime)
            .attribute("birthday", ValueKind::Date)
            .attribute("bedtime", ValueKind::Time)
            .attribute("photo", ValueKind::String)
            .attribute("cool", ValueKind::Boolean)
            .attribute("extra", ValueKind::Json)
            .build(),
        ResourceSchema::builder("pictures")
            .attribute("name", ValueKind::String)
            .relationship(RelationshipDescriptor::to_one("imageable", "imageables").polymorphic())
            .build(),
        ResourceSchema::builder("products")
            .attribute("name", ValueKind::String)
            .build(),
        ResourceSchema::builder("documents")
            .attribute("name", ValueKind::String)
            .build(),
    ])
    .unwrap()
}

fn refs(resource_type: &str, ids: &[i64]) -> Vec<RecordRef> {
    ids.iter().map(|id| RecordRef::new(resource_type, *id)).collect()
}

fn person(id: i64, name: &str, email: &str, posts: &[i64], comments: &[i64]) -> Record {
    Record::new("people", id)
        .with_attribute("name", name)
        .with_attribute("email", email)
        .with_attribute("date_joined", "2013-08-07T20:25:00.000Z")
        .with_to_many("posts", refs("posts", posts))
        .with_to_many("comments", refs("comments", comments))
}

fn post(id: i64, title: &str, body: &str, author: i64, tags: &[i64], comments: &[i64]) -> Record {
    Record::new("posts", id)
        .with_attribute("title", title)
        .with_attribute("body", body)
        .with_to_one("author", Some(RecordRef::new("people", author)))
        .with_to_one("section", None)
        .with_to_many("tags", refs("tags", tags))
        .with_to_many("comments", refs("comments", comments))
}

fn tag(id: i64, name: &str, posts: &[i64]) -> Record {
    Record::new("tags", id)
        .with_attribute("name", name)
        .with_to_many("posts", refs("posts", posts))
}

fn comment(id: i64, body: &str, author: i64, post: i64, tags: &[i64]) -> Record {
    Record::new("comments", id)
        .with_attribute("body", body)
        .with_to_one("author", Some(RecordRef::new("people", author)))
        .with_to_one("post", Some(RecordRef::new("posts", post)))
        .with_to_many("tags", refs("tags", tags))
}

fn currency(code: &str, name: &str, country_name: &str) -> Record {
    Record::new("iso_currencies", code)
        .with_attribute("name", name)
        .with_attribute("country_name", country_name)
        .with_attribute("minor_unit", "Cent")
}

fn named(resource_type: &str, id: i64, name: &str) -> Record {
    Record::new(resource_type, id).with_attribute("name", name)
}

/// Repository seeded with the shared fixture set.
pub fn repository() -> Arc<InMemoryRepository> {
    let repo = InMemoryRepository::new()
        .with_rule("people", Rule::Required("name".to_owned()))
        .with_rule("people", Rule::Required("date_joined".to_owned()))
        .with_rule("posts", Rule::Required("author".to_owned()))
        .with_rule("posts", Rule::MaxLength("title".to_owned(), 35))
        .with_delete_guard("people", person_without_posts);

    for record in [
        person(1, "Joe Author", "joe@xyz.fake", &[1, 2, 11], &[1]),
        person(2, "Fred Reader", "fred@xyz.fake", &[], &[2, 3]),
        person(3, "Lazy Author", "lazy@xyz.fake", &[3, 4, 5, 6, 7, 8, 9, 10], &[]),
        person(4, "Tag Crazy Author", "taggy@xyz.fake", &[12, 13], &[]),
        post(1, "New post", "A body!!!", 1, &[1, 2, 3], &[1, 2]),
        post(2, "JR Solves your serialization woes!", "Use JR", 1, &[5], &[3]),
        post(3, "Update This Later", "AAAA", 3, &[], &[]),
        post(4, "Delete This Later - Single", "AAAA", 3, &[], &[]),
        post(5, "Delete This Later - Multiple1", "AAAA", 3, &[], &[]),
        post(6, "Delete This Later - Multiple2", "AAAA", 3, &[], &[]),
        post(7, "Delete This Later - A", "ZZZZ", 3, &[], &[]),
        post(8, "Delete This Later - A", "AAAA", 3, &[], &[]),
        post(9, "Delete This Later - Single2", "AAAA", 3, &[], &[]),
        post(10, "Update This Later - Multiple", "AAAA", 3, &[], &[]),
        post(11, "JR How To", "Use JR to write API apps", 1, &[5], &[]),
        post(12, "Tagged up", "XXXX", 4, &[6, 7], &[]),
        post(13, "Tagged again", "YYYY", 4, &[8, 9], &[]),
        comment(1, "what a dumb post", 1, 1, &[]),
        comment(2, "i liked it", 2, 1, &[]),
        comment(3, "Thanks man. Great post. But what is JR?", 2, 2, &[5]),
        tag(1, "short", &[1]),
        tag(2, "whiny", &[1]),
        tag(3, "grumpy", &[1]),
        tag(4, "happy", &[]),
        tag(5, "JR", &[2, 11]),
        tag(6, "important", &[12]),
        tag(7, "optional", &[12]),
        tag(8, "urgent", &[13]),
        tag(9, "later", &[13]),
        named("sections", 1, "javascript"),
        named("sections", 2, "ruby"),
        Record::new("expense_entries", 1)
            .with_attribute("transaction_date", "2014-04-15")
            .with_attribute("cost", 12.05)
            .with_to_one("employee", Some(RecordRef::new("people", 3)))
            .with_to_one("iso_currency", Some(RecordRef::new("iso_currencies", "USD"))),
        Record::new("expense_entries", 2)
            .with_attribute("transaction_date", "2014-04-15")
            .with_attribute("cost", 12.06)
            .with_to_one("employee", Some(RecordRef::new("people", 3)))
            .with_to_one("iso_currency", Some(RecordRef::new("iso_currencies", "USD"))),
        currency("USD", "United States Dollar", "United States"),
        currency("EUR", "Euro Member Countries", "Euro Member Countries"),
        currency("CAD", "Canadian dollar", "Canada"),
        named("breeds", 0, "persian"),
        named("breeds", 1, "siamese"),
        named("breeds", 2, "sphinx"),
        named("breeds", 3, "cat"),
        Record::new("preferences", 1).with_attribute("advanced_mode", false),
        Record::new("facts", 1)
            .with_attribute("spouse_name", "Jane Author")
            .with_attribute("bio", "First man to run across Antartica.")
            .with_attribute("quality_rating", 23.89 / 45.6)
            .with_attribute("salary", 47000.56)
            .with_attribute("children", 2)
            .with_attribute("date_time_joined", "2013-08-07T20:25:00+00:00")
            .with_attribute("birthday", "1965-06-30")
            .with_attribute("bedtime", "2000-01-01T20:00:00Z")
            .with_attribute("photo", "abc")
            .with_attribute("cool", false)
            .with_attribute("extra", json!({"shoe_size": 11})),
        named("products", 1, "Enterprise Gizmo"),
        named("documents", 1, "Company Brochure"),
        named("pictures", 1, "enterprise gizmo")
            .with_to_one("imageable", Some(RecordRef::new("products", 1))),
        named("pictures", 2, "company brochure")
            .with_to_one("imageable", Some(RecordRef::new("documents", 1))),
        named("pictures", 3, "another gizmo")
            .with_to_one("imageable", Some(RecordRef::new("products", 1))),
    ] {
        repo.insert(record);
    }
    Arc::new(repo)
}

pub fn engine_with(config: &EngineConfig) -> (Engine, Arc<InMemoryRepository>) {
    let repo = repository();
    let engine = Engine::new(registry(), repo.clone(), config);
    (engine, repo)
}

pub fn engine() -> (Engine, Arc<InMemoryRepository>) {
    engine_with(&EngineConfig::default())
}

pub fn engine_keyed(key_format: KeyFormat) -> Engine {
    engine_with(&EngineConfig::default().with_key_format(key_format)).0
}

pub fn params(value: Value) -> RawParams {
    match value {
        Value::Object(map) => map,
        other => panic!("params must be an object, got {other}"),
    }
}

pub fn no_params() -> RawParams {
    params(json!({}))
}

pub fn doc(response: &Response) -> &Value {
    response.document.as_ref().expect("response has a document")
}

pub fn details(response: &Response) -> Vec<String> {
    response
        .errors()
        .iter()
        .map(|e| e["detail"].as_str().unwrap_or_default().to_owned())
        .collect()
}

pub fn ids(values: &Value) -> Vec<String> {
    values
        .as_array()
        .expect("an array of resource objects")
        .iter()
        .map(|o| o["id"].as_str().unwrap().to_owned())
        .collect()
}

/// Ids currently linked through `relationship` on a stored record.
pub fn linked_ids(
    repo: &InMemoryRepository,
    resource_type: &str,
    id: i64,
    relationship: &str,
) -> Vec<String> {
    repo.get(resource_type, id)
        .expect("record exists")
        .linkage(relationship)
        .map(|l| l.refs().into_iter().map(|r| r.id.to_string()).collect())
        .unwrap_or_default()
}
