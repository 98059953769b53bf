//! CLI command implementations.

use crate::snapshot::{LoadedSnapshot, Snapshot};
use anyhow::{anyhow, bail, Context, Result};
use gitward_access::{
    prefix_lines, AccessConfig, AccessServices, AuditLog, AuthenticationAbilities, Change,
    Changes, GitAccessCheck, Protocol, RepositoryKind,
};
use gitward_auth::{
    AccessActor, AccessGrant, AccessLevel, AccessList, AuthStore, MembershipSource,
    ProjectAuthorizationResolver, ProtectedRefPolicy, PublicKey, RefName,
};
use std::path::Path;
use std::sync::Arc;

/// One access question, as given on the command line.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub actor: String,
    pub project: String,
    pub protocol: String,
    pub command: String,
    pub kind: RepositoryKind,
    pub abilities: Option<String>,
    pub ssh_key: Option<String>,
    pub changes: Changes,
    pub push_size: u64,
    pub json: bool,
}

fn load(snapshot: &Path) -> Result<LoadedSnapshot> {
    Snapshot::load_yaml(snapshot)
        .and_then(Snapshot::into_store)
        .with_context(|| format!("loading snapshot {}", snapshot.display()))
}

/// Resolve `anonymous`, `user:<username>`, `key:<id>`, `token:<id>` or `job:<id>`.
pub fn parse_actor(store: &AuthStore, actor: &str) -> Result<AccessActor> {
    if actor == "anonymous" {
        return Ok(AccessActor::Anonymous);
    }

    let (kind, value) = actor
        .split_once(':')
        .ok_or_else(|| anyhow!("invalid actor {actor:?}, expected anonymous or kind:value"))?;

    match kind {
        "user" => store
            .find_user_by_username(value)
            .map(AccessActor::User)
            .ok_or_else(|| anyhow!("unknown user {value:?}")),
        "key" => {
            let id = value
                .parse()
                .with_context(|| format!("invalid deploy key id {value:?}"))?;
            store
                .get_deploy_key(id)
                .map(AccessActor::DeployKey)
                .ok_or_else(|| anyhow!("unknown deploy key {id}"))
        }
        "token" => {
            let id = value
                .parse()
                .with_context(|| format!("invalid deploy token id {value:?}"))?;
            store
                .get_deploy_token(id)
                .map(AccessActor::DeployToken)
                .ok_or_else(|| anyhow!("unknown deploy token {id}"))
        }
        "job" => {
            let id = value
                .parse()
                .with_context(|| format!("invalid job id {value:?}"))?;
            store
                .get_job(id)
                .map(AccessActor::CiBuild)
                .ok_or_else(|| anyhow!("unknown job {id}"))
        }
        _ => bail!("unknown actor kind {kind:?}"),
    }
}

/// Credential scope by name.
pub fn parse_abilities(name: &str) -> Result<AuthenticationAbilities> {
    match name {
        "full" => Ok(AuthenticationAbilities::full()),
        "read-only" | "read_only" => Ok(AuthenticationAbilities::read_only()),
        "build" => Ok(AuthenticationAbilities::build()),
        "none" => Ok(AuthenticationAbilities::none()),
        _ => bail!("unknown abilities {name:?}, expected full, read-only, build or none"),
    }
}

/// Changes from `--change` lines or a file of hook lines.
pub fn read_changes(lines: &[String], file: Option<&Path>) -> Result<Changes> {
    if let Some(path) = file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading changes from {}", path.display()))?;
        return Ok(Changes::parse(&text)?);
    }
    if lines.is_empty() {
        return Ok(Changes::Any);
    }
    let changes = lines
        .iter()
        .map(|line| Change::parse(line))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Changes::from(changes))
}

/// Run an access check. Returns whether access was granted.
pub fn check(snapshot: &Path, config: &AccessConfig, request: CheckRequest) -> Result<bool> {
    let loaded = load(snapshot)?;
    let store = &loaded.store;

    let actor = parse_actor(store, &request.actor)?;
    let protocol = Protocol::parse(&request.protocol)
        .ok_or_else(|| anyhow!("unknown protocol {:?}", request.protocol))?;
    let abilities = match &request.abilities {
        Some(name) => parse_abilities(name)?,
        None if matches!(actor, AccessActor::CiBuild(_)) => AuthenticationAbilities::build(),
        None => AuthenticationAbilities::full(),
    };

    let audit = Arc::new(AuditLog::new());
    let services = Arc::new(
        AccessServices::from_store(store.clone())
            .with_quota(loaded.quota.clone())
            .with_audit(audit.clone())
            .with_config(config.clone()),
    );

    let resolved = store.resolve_path(&request.project);
    let project = resolved.as_ref().map(|(project, _)| project.clone());
    let mut access = GitAccessCheck::new(services, actor, project, protocol, abilities)
        .with_repository_kind(request.kind)
        .with_push_size(request.push_size);
    if let Some((project, true)) = &resolved {
        access = access.redirected(request.project.as_str(), store.full_path(project));
    }
    if let Some(key) = &request.ssh_key {
        let key: PublicKey = key
            .parse()
            .map_err(|e: String| anyhow!("invalid --ssh-key: {e}"))?;
        access = access.with_ssh_key(key);
    }

    let outcome = access.check(&request.command, &request.changes);

    if request.json {
        let value = match &outcome {
            Ok(result) => serde_json::json!({
                "allowed": true,
                "result": result,
                "audit": audit.recent(1),
            }),
            Err(err) => serde_json::json!({
                "allowed": false,
                "kind": err.kind(),
                "status": err.status_code(),
                "message": err.message(),
                "audit": audit.recent(1),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match &outcome {
            Ok(result) => {
                for notice in &result.notices {
                    eprintln!("{}", prefix_lines(notice, &config.message_prefix));
                }
                println!("allowed: {} as {}", result.command, result.access_level);
            }
            Err(err) => eprintln!("{}", err.client_message(&config.message_prefix)),
        }
    }

    Ok(outcome.is_ok())
}

/// Show a user's effective level on a project and every path granting it.
pub fn level(snapshot: &Path, username: &str, project_path: &str) -> Result<()> {
    let loaded = load(snapshot)?;
    let store = &loaded.store;

    let user = store
        .find_user_by_username(username)
        .ok_or_else(|| anyhow!("unknown user {username:?}"))?;
    let (project, _) = store
        .resolve_path(project_path)
        .ok_or_else(|| anyhow!("unknown project {project_path:?}"))?;

    let resolver = ProjectAuthorizationResolver::new(store.clone());
    let level = resolver.user_access_level(&user, &project)?;

    println!("{} on {}: {}", user.username, store.full_path(&project), level);
    for (source, level) in store.direct_and_inherited_levels(user.id, project.id)? {
        println!("  {:<24} {}", source.to_string(), level);
    }

    Ok(())
}

/// List every project a user reaches, with the effective level.
pub fn authorizations(snapshot: &Path, username: &str) -> Result<()> {
    let loaded = load(snapshot)?;
    let store = &loaded.store;

    let user = store
        .find_user_by_username(username)
        .ok_or_else(|| anyhow!("unknown user {username:?}"))?;

    let mut rows: Vec<(String, AccessLevel)> = store
        .project_authorizations(user.id)
        .into_iter()
        .filter_map(|authorization| {
            store
                .get_project(authorization.project_id)
                .map(|project| (store.full_path(&project), authorization.access_level))
        })
        .collect();
    rows.sort();

    if rows.is_empty() {
        println!("{} has no project authorizations", user.username);
    }
    for (path, level) in rows {
        println!("{path:<40} {level}");
    }

    Ok(())
}

fn describe(list: &AccessList) -> String {
    if list.is_no_one() {
        return "no one".to_string();
    }
    let grants: Vec<String> = list
        .0
        .iter()
        .map(|grant| match grant {
            AccessGrant::Role(level) => format!("{level}+"),
            AccessGrant::User(id) => format!("user:{id}"),
            AccessGrant::DeployKey(id) => format!("key:{id}"),
            AccessGrant::NoOne => "no one".to_string(),
        })
        .collect();
    if grants.is_empty() {
        "none".to_string()
    } else {
        grants.join(",")
    }
}

/// List a project's protected ref rules, or the rule protecting one ref.
pub fn rules(snapshot: &Path, project_path: &str, ref_name: Option<&str>) -> Result<()> {
    let loaded = load(snapshot)?;
    let store = &loaded.store;

    let (project, _) = store
        .resolve_path(project_path)
        .ok_or_else(|| anyhow!("unknown project {project_path:?}"))?;
    let rules = store.list_rules(project.id);

    match ref_name {
        Some(name) => {
            let policy = ProtectedRefPolicy::new(rules);
            match policy.matching_rule(&RefName::parse(name)) {
                Some(rule) => println!("{name} is protected by rule {} ({})", rule.id, rule.pattern),
                None => println!("{name} is not protected"),
            }
        }
        None => {
            if rules.is_empty() {
                println!("{} has no protected refs", store.full_path(&project));
            }
            for rule in &rules {
                println!(
                    "{:>4} {:<6} {:<24} push={} merge={} create={} force_push={}",
                    rule.id,
                    rule.kind.to_string(),
                    rule.pattern,
                    describe(&rule.push),
                    describe(&rule.merge),
                    rule.create.as_ref().map_or_else(|| "push or merge".to_string(), describe),
                    rule.allow_force_push
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"
users:
  - { id: 1, username: alice }
groups:
  - { id: 1, path: acme }
projects:
  - { id: 10, path: api, namespace: { kind: group, id: 1 } }
members:
  - { user_id: 1, source: { kind: project, id: 10 }, level: reporter }
deploy_keys:
  - { id: 3, title: deployer, user_id: 1, projects: [{ project_id: 10, can_push: true }] }
deploy_tokens:
  - { id: 5, name: registry, project_ids: [10] }
jobs:
  - { id: 99, project_id: 10, ref_name: main }
rules:
  - { id: 1, project_id: 10, kind: branch, pattern: main }
"#;

    fn snapshot_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        file
    }

    fn request(actor: &str, command: &str) -> CheckRequest {
        CheckRequest {
            actor: actor.to_string(),
            project: "acme/api".to_string(),
            protocol: "ssh".to_string(),
            command: command.to_string(),
            kind: RepositoryKind::Project,
            abilities: None,
            ssh_key: None,
            changes: Changes::Any,
            push_size: 0,
            json: true,
        }
    }

    #[test]
    fn test_parse_actor() {
        let store = Snapshot::from_yaml_str(SNAPSHOT)
            .unwrap()
            .into_store()
            .unwrap()
            .store;

        assert_eq!(parse_actor(&store, "anonymous").unwrap(), AccessActor::Anonymous);
        assert!(matches!(parse_actor(&store, "user:alice").unwrap(), AccessActor::User(_)));
        assert!(matches!(parse_actor(&store, "key:3").unwrap(), AccessActor::DeployKey(_)));
        assert!(matches!(parse_actor(&store, "job:99").unwrap(), AccessActor::CiBuild(_)));
        assert!(matches!(parse_actor(&store, "token:5").unwrap(), AccessActor::DeployToken(_)));
        assert!(parse_actor(&store, "token:6").is_err());
        assert!(parse_actor(&store, "user:nobody").is_err());
        assert!(parse_actor(&store, "key:abc").is_err());
        assert!(parse_actor(&store, "robot:1").is_err());
        assert!(parse_actor(&store, "alice").is_err());
    }

    #[test]
    fn test_parse_abilities() {
        assert_eq!(parse_abilities("read-only").unwrap(), AuthenticationAbilities::read_only());
        assert_eq!(parse_abilities("build").unwrap(), AuthenticationAbilities::build());
        assert!(parse_abilities("root").is_err());
    }

    #[test]
    fn test_read_changes() {
        assert!(read_changes(&[], None).unwrap().is_any());

        let line = format!("{} {} refs/heads/main", "a".repeat(40), "b".repeat(40));
        assert_eq!(read_changes(&[line.clone()], None).unwrap().len(), 1);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{line}\n\n{line}").unwrap();
        assert_eq!(read_changes(&[], Some(file.path())).unwrap().len(), 2);

        assert!(read_changes(&["garbage".to_string()], None).is_err());
    }

    #[test]
    fn test_check() {
        let file = snapshot_file();
        let config = AccessConfig::default();

        assert!(check(file.path(), &config, request("user:alice", "git-upload-pack")).unwrap());
        assert!(!check(file.path(), &config, request("user:alice", "git-receive-pack")).unwrap());
        assert!(check(file.path(), &config, request("job:99", "git-upload-pack")).unwrap());
        assert!(!check(file.path(), &config, request("anonymous", "git-upload-pack")).unwrap());
        assert!(check(file.path(), &config, request("token:5", "git-upload-pack")).unwrap());
        assert!(!check(file.path(), &config, request("token:5", "git-receive-pack")).unwrap());
    }

    #[test]
    fn test_check_ssh_key() {
        let file = snapshot_file();
        let config = AccessConfig::from_toml_str("[key_restrictions]\nrsa = 4096").unwrap();
        let with_key = |key: &str| CheckRequest {
            ssh_key: Some(key.to_string()),
            ..request("user:alice", "git-upload-pack")
        };

        assert!(!check(file.path(), &config, with_key("rsa:2048")).unwrap());
        assert!(check(file.path(), &config, with_key("ed25519:256")).unwrap());
        assert!(check(file.path(), &config, with_key("rsa:4096x")).is_err());
    }

    #[test]
    fn test_inspection_commands() {
        let file = snapshot_file();
        level(file.path(), "alice", "acme/api").unwrap();
        authorizations(file.path(), "alice").unwrap();
        rules(file.path(), "acme/api", None).unwrap();
        rules(file.path(), "acme/api", Some("refs/heads/main")).unwrap();

        assert!(level(file.path(), "alice", "acme/missing").is_err());
        assert!(load(Path::new("/nonexistent/snapshot.yaml")).is_err());
    }

    #[test]
    fn test_describe_access_list() {
        assert_eq!(describe(&AccessList::role(AccessLevel::Maintainer)), "maintainer+");
        assert_eq!(describe(&AccessList::no_one()), "no one");
        assert_eq!(
            describe(&AccessList::role(AccessLevel::Developer).with(AccessGrant::User(4))),
            "developer+,user:4"
        );
    }
}
