#![allow(dead_code)]

use bson::{Bson, Document, doc};
use mimic_db::{Database, DatabaseConfig};
use mimic_store::MemoryStore;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

// ── Constants ───────────────────────────────────────────────

pub const COLLECTION: &str = "bench";
pub const STATUSES: &[&str] = &["active", "rejected", "snoozed"];
pub const TAGS: &[&str] = &[
    "renewal_due",
    "high_value",
    "churning",
    "new_customer",
    "enterprise",
];
pub const SKUS: &[&str] = &["WidgetA", "WidgetB", "GadgetX", "GadgetY"];

// 2014-01-01T00:00:00Z
const EPOCH_2014: i64 = 1_388_534_400_000;

// ── Helpers ─────────────────────────────────────────────────

pub fn generate_realistic_doc(rng: &mut StdRng, seq: usize) -> Document {
    let tags: Vec<Bson> = TAGS
        .iter()
        .filter(|_| rng.gen_bool(0.4))
        .map(|t| Bson::String(t.to_string()))
        .collect();
    let items: Vec<Bson> = (0..rng.gen_range(0..6))
        .map(|_| {
            Bson::Document(doc! {
                "sku": SKUS[rng.gen_range(0..SKUS.len())],
                "qty": rng.gen_range(1_i32..20),
                "price": rng.gen_range(1_i32..500),
            })
        })
        .collect();

    let mut doc = doc! {
        "_id": format!("rec-{seq}"),
        "name": format!("Company-{seq}"),
        "status": STATUSES[rng.gen_range(0..STATUSES.len())],
        "revenue": rng.gen_range(1_000.0..250_000.0),
        "tags": tags,
        "items": items,
        "created": bson::DateTime::from_millis(EPOCH_2014 + rng.gen_range(0..365 * 86_400_000_i64)),
        "owner": { "first": format!("First-{seq}"), "last": format!("Last-{seq}") },
    };
    if rng.gen_bool(0.3) {
        doc.insert("nickname", format!("Co{seq}"));
    }
    doc
}

pub fn generate_realistic_batch(n: usize) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|i| generate_realistic_doc(&mut rng, i)).collect()
}

/// A MemoryStore-backed database holding `n` generated documents.
pub fn seeded_db(n: usize) -> Database<MemoryStore> {
    let db = Database::open(MemoryStore::new(), DatabaseConfig::default());
    db.insert_many(COLLECTION, generate_realistic_batch(n)).unwrap();
    db
}
