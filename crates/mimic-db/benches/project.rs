mod common;
use common::*;

use bson::{Document, doc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn bench_spec(c: &mut Criterion, group_name: &str, pipeline: Vec<Document>) {
    let mut group = c.benchmark_group(group_name);
    for n in [1_000, 10_000] {
        let db = seeded_db(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            // aggregate works on a scratch copy, so the source stays seeded
            b.iter(|| db.aggregate(COLLECTION, &pipeline).unwrap().len())
        });
    }
    group.finish();
}

fn bench_project_inclusion(c: &mut Criterion) {
    bench_spec(
        c,
        "project_inclusion",
        vec![doc! { "$project": { "name": 1, "status": 1 } }],
    );
}

fn bench_project_rename(c: &mut Criterion) {
    bench_spec(
        c,
        "project_rename",
        vec![doc! { "$project": { "label": "$name", "first": "$owner.first", "last": "$owner.last" } }],
    );
}

fn bench_project_exclusion(c: &mut Criterion) {
    bench_spec(
        c,
        "project_exclusion",
        vec![doc! { "$project": { "items": 0, "tags": 0 } }],
    );
}

fn bench_project_string_ops(c: &mut Criterion) {
    bench_spec(
        c,
        "project_string_ops",
        vec![doc! { "$project": {
            "display": { "$concat": ["$owner.first", " ", "$owner.last"] },
            "upper": { "$toUpper": "$name" },
            "short": { "$substr": ["$name", 0, 4] },
            "nick": { "$ifNull": ["$nickname", "$name"] },
        } }],
    );
}

fn bench_project_dates(c: &mut Criterion) {
    bench_spec(
        c,
        "project_dates",
        vec![doc! { "$project": {
            "year": { "$year": "$created" },
            "month": { "$month": "$created" },
            "week": { "$week": "$created" },
            "dow": { "$dayOfWeek": "$created" },
        } }],
    );
}

fn bench_project_cond(c: &mut Criterion) {
    bench_spec(
        c,
        "project_cond",
        vec![doc! { "$project": {
            "tier": { "$cond": [{ "$gte": ["$revenue", 100_000] }, "large", "small"] },
            "tagCount": { "$size": "$tags" },
        } }],
    );
}

fn bench_project_filter(c: &mut Criterion) {
    bench_spec(
        c,
        "project_filter",
        vec![doc! { "$project": {
            "expensive": { "$filter": {
                "input": "$items", "as": "item", "cond": { "$gte": ["$$item.price", 250] },
            } },
        } }],
    );
}

fn bench_pipeline_two_stages(c: &mut Criterion) {
    bench_spec(
        c,
        "pipeline_two_stages",
        vec![
            doc! { "$project": { "name": 1, "tagCount": { "$size": "$tags" }, "created": 1 } },
            doc! { "$project": { "_id": 0, "label": { "$toLower": "$name" }, "year": { "$year": "$created" }, "tagCount": 1 } },
        ],
    );
}

criterion_group!(
    benches,
    bench_project_inclusion,
    bench_project_rename,
    bench_project_exclusion,
    bench_project_string_ops,
    bench_project_dates,
    bench_project_cond,
    bench_project_filter,
    bench_pipeline_two_stages,
);
criterion_main!(benches);
