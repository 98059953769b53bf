//! Access check throughput benchmarks.
//!
//! Measures full checks against group hierarchies of increasing depth and
//! pushes with increasing numbers of ref changes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gitward_access::{
    AccessServices, AuthenticationAbilities, Change, Changes, GitAccessCheck, Protocol,
};
use gitward_auth::{AccessActor, AccessLevel, AuthStore, Group, Member, Namespace, Project, RefKind, User};
use std::hint::black_box;
use std::sync::Arc;

const OLD: &str = "570e7b2abdd848b95f2f578043fc23bd6f6fd24d";
const NEW: &str = "6f6d7e7ed97bb5f0054f2b1df789b39ca89b6ff9";

/// A project `depth` groups deep, with the user a Developer at the root.
fn nested_store(depth: u64) -> Arc<AuthStore> {
    let store = Arc::new(AuthStore::new());
    store.add_user(User::new(1, "alice")).unwrap();
    store.add_group(Group::new(1, "g1")).unwrap();
    for id in 2..=depth {
        store
            .add_group(Group::child_of(id, format!("g{}", id), id - 1))
            .unwrap();
    }
    store
        .add_project(Project::new(1, "api", Namespace::Group(depth)))
        .unwrap();
    store
        .set_member(Member::group(1, 1, AccessLevel::Developer))
        .unwrap();
    store.protect_ref(1, RefKind::Branch, "main").unwrap();
    store.protect_ref(1, RefKind::Branch, "release-*").unwrap();
    store.protect_ref(1, RefKind::Tag, "v*").unwrap();
    store
}

fn check_for(store: &Arc<AuthStore>) -> GitAccessCheck {
    let services = Arc::new(AccessServices::from_store(store.clone()));
    GitAccessCheck::new(
        services,
        AccessActor::User(store.get_user(1).unwrap()),
        store.get_project(1),
        Protocol::Ssh,
        AuthenticationAbilities::full(),
    )
}

/// Benchmark pulls through deep group hierarchies
fn bench_upload_pack_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload_pack_depth");

    for depth in [1u64, 10, 100, 1000].iter() {
        let store = nested_store(*depth);
        let check = check_for(&store);
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, _| {
            b.iter(|| black_box(check.check("git-upload-pack", &Changes::Any).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark pushes with many ref changes
fn bench_receive_pack_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("receive_pack_changes");
    let store = nested_store(5);
    let check = check_for(&store);

    for count in [1usize, 10, 100, 1000].iter() {
        let changes = Changes::from(
            (0..*count)
                .map(|i| Change::new(OLD, NEW, format!("refs/heads/feature-{}", i)))
                .collect::<Vec<_>>(),
        );
        group.bench_with_input(BenchmarkId::new("changes", count), count, |b, _| {
            b.iter(|| black_box(check.check("git-receive-pack", &changes).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_upload_pack_depth, bench_receive_pack_changes);
criterion_main!(benches);
