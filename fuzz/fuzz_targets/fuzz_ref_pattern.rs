#![no_main]

use arbitrary::Arbitrary;
use gitward_auth::{glob_match, AccessLevel, ProtectedRefPolicy, ProtectedRefRule, RefActor, RefName};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    patterns: Vec<String>,
    ref_name: String,
    level: u8,
}

fuzz_target!(|input: Input| {
    let ref_name = RefName::parse(&input.ref_name);
    let level = AccessLevel::ALL[input.level as usize % AccessLevel::ALL.len()];

    for pattern in &input.patterns {
        let _ = glob_match(pattern, ref_name.name());
        // A pattern without wildcards only matches itself
        if !pattern.contains('*') {
            assert_eq!(glob_match(pattern, ref_name.name()), pattern == ref_name.name());
        }
    }

    let rules = input
        .patterns
        .iter()
        .take(16)
        .enumerate()
        .map(|(i, pattern)| ProtectedRefRule::branch(i as u64 + 1, 1, pattern.clone()))
        .collect();
    let policy = ProtectedRefPolicy::new(rules);

    if let Some(rule) = policy.matching_rule(&ref_name) {
        assert!(rule.matches(&ref_name));
    }
    let actor = RefActor::User(1);
    let _ = policy.can_push(actor, &ref_name, level);
    let _ = policy.can_create(actor, &ref_name, level);
    let _ = policy.can_delete(actor, &ref_name, level);
});
