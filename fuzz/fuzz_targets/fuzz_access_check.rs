#![no_main]

use arbitrary::Arbitrary;
use gitward_access::{
    AccessServices, AuthenticationAbilities, Changes, GitAccessCheck, Protocol, RepositoryKind,
};
use gitward_auth::{AccessActor, AccessLevel, AuthStore, Member, Namespace, Project, RefKind, User};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

#[derive(Debug, Arbitrary)]
struct Input {
    command: String,
    protocol: u8,
    kind: u8,
    level: u8,
    changes: String,
}

fuzz_target!(|input: Input| {
    let store = Arc::new(AuthStore::new());
    let _ = store.add_user(User::new(1, "owner"));
    let _ = store.add_user(User::new(2, "fuzzer"));
    let _ = store.add_project(Project::new(1, "repo", Namespace::User(1)));
    let level = AccessLevel::ALL[input.level as usize % AccessLevel::ALL.len()];
    let _ = store.set_member(Member::project(2, 1, level));
    let _ = store.protect_ref(1, RefKind::Branch, "main");

    let protocol = [Protocol::Ssh, Protocol::Http, Protocol::Web][input.protocol as usize % 3];
    let kind = [RepositoryKind::Project, RepositoryKind::Wiki, RepositoryKind::Design]
        [input.kind as usize % 3];
    let changes = Changes::parse(&input.changes).unwrap_or_default();

    let services = Arc::new(AccessServices::from_store(store.clone()));
    let check = GitAccessCheck::new(
        services,
        AccessActor::User(store.get_user(2).unwrap()),
        store.get_project(1),
        protocol,
        AuthenticationAbilities::full(),
    )
    .with_repository_kind(kind);

    // Decisions never panic, and granted pushes need at least Developer
    if let Ok(result) = check.check(&input.command, &changes) {
        if result.command.is_write() && kind == RepositoryKind::Project {
            assert!(level.has(AccessLevel::Developer));
        }
    }
});
