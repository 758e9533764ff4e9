#![allow(dead_code)]

use bson::{Document, doc};
use mimic_db::{Database, DatabaseConfig};
use mimic_query::FindOptions;
use mimic_store::MemoryStore;

pub const COLLECTION: &str = "accounts";

// 2014-03-16T14:25:36.789Z (a Sunday)
pub const MARCH_16_2014: i64 = 1_394_979_936_789;
// 2013-01-01T00:00:00.000Z (a Tuesday)
pub const JAN_1_2013: i64 = 1_356_998_400_000;

pub fn temp_db() -> Database<MemoryStore> {
    Database::open(MemoryStore::new(), DatabaseConfig::default())
}

/// Insert 5 seed records.
pub fn seed_records(db: &Database<MemoryStore>) {
    db.insert_many(
        COLLECTION,
        vec![
            doc! {
                "_id": "acct-1", "name": "Acme Corp", "revenue": 50000.0, "status": "active",
                "tags": ["enterprise", "renewal_due"],
                "owner": { "first": "Ada", "last": "Lovelace" },
                "created": bson::DateTime::from_millis(MARCH_16_2014),
                "items": [
                    { "sku": "a", "qty": 1, "price": 10 },
                    { "sku": "b", "qty": 5, "price": 150 },
                    { "sku": "c", "qty": 2, "price": 100 },
                ],
            },
            doc! {
                "_id": "acct-2", "name": "Globex", "revenue": 80000.0, "status": "snoozed",
                "tags": ["high_value"],
                "owner": { "first": "Grace", "last": "hopper" },
                "created": bson::DateTime::from_millis(JAN_1_2013),
                "items": [{ "sku": "d", "qty": 2, "price": 200 }],
            },
            doc! {
                "_id": "acct-3", "name": "Initech", "revenue": 12000.0, "status": "rejected",
                "tags": [],
                "items": [],
            },
            doc! {
                "_id": "acct-4", "name": "Umbrella", "revenue": 95000.0, "status": "active",
                "tags": ["enterprise"],
                "owner": { "first": "Albert", "last": "Wesker" },
            },
            doc! {
                "_id": "acct-5", "name": "Stark Industries", "revenue": 200000.0,
                "status": "active", "nickname": "Stark",
                "tags": ["enterprise", "high_value", "churning"],
                "owner": { "first": "Tony", "last": "Stark" },
                "created": bson::DateTime::from_millis(JAN_1_2013 + 5 * 86_400_000),
                "items": [
                    { "sku": "e", "qty": 10, "price": 99 },
                    { "sku": "f", "qty": 1, "price": 500 },
                ],
            },
        ],
    )
    .unwrap();
}

pub fn all(db: &Database<MemoryStore>, collection: &str) -> Vec<Document> {
    db.find(collection, doc! {}, FindOptions::default()).unwrap()
}

pub fn by_id<'a>(docs: &'a [Document], id: &str) -> &'a Document {
    docs.iter()
        .find(|d| d.get_str("_id").ok() == Some(id))
        .unwrap_or_else(|| panic!("no document {id}"))
}

pub fn keys(doc: &Document) -> Vec<&str> {
    doc.keys().map(String::as_str).collect()
}
