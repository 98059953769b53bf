//! The Git access check.
//!
//! A check runs an ordered list of stages. Each stage either passes or ends
//! the check with an [`AccessError`]. The stage list is selected by the
//! repository kind and the capability set of the actor:
//!
//! | kind / capabilities | stages |
//! |---|---|
//! | project, full | actor, project, protocol, command, refs, quota |
//! | wiki, full | actor, project, protocol, command, quota |
//! | design | actor, protocol, project, command |
//! | any, job scoped | actor, project, protocol, command |
//!
//! Every check emits one audit event, whatever the outcome.

use crate::ability::{Ability, AuthenticationAbilities, Permissions};
use crate::audit::{AccessAuditEvent, AccessOutcome, AuditEmitter, NoopAudit};
use crate::change::Changes;
use crate::command::{GitCommand, Protocol};
use crate::config::{AccessConfig, KeyViolation};
use crate::error::{AccessError, Result};
use crate::messages;
use crate::quota::{NoQuota, QuotaSource};
use crate::refs::RefCheck;
use gitward_auth::{
    AccessActor, AccessLevel, AuthStore, FeatureAccess, MembershipSource, Project,
    ProjectAuthorizationResolver, ProtectedRefPolicy, ProtectedRefStore, PublicKey, RefActor,
    RefKind, User, UserId, UserSource, UserState,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collaborators and settings shared by every check.
#[derive(Clone)]
pub struct AccessServices {
    resolver: ProjectAuthorizationResolver,
    rules: Arc<dyn ProtectedRefStore>,
    quota: Arc<dyn QuotaSource>,
    audit: Arc<dyn AuditEmitter>,
    users: Option<Arc<dyn UserSource>>,
    config: AccessConfig,
}

impl fmt::Debug for AccessServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessServices")
            .field("resolver", &self.resolver)
            .field("users", &self.users.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AccessServices {
    /// Services with no quota, no audit sink and default settings.
    pub fn new(membership: Arc<dyn MembershipSource>, rules: Arc<dyn ProtectedRefStore>) -> Self {
        Self {
            resolver: ProjectAuthorizationResolver::new(membership),
            rules,
            quota: Arc::new(NoQuota),
            audit: Arc::new(NoopAudit),
            users: None,
            config: AccessConfig::default(),
        }
    }

    /// Services backed by an in-memory store for memberships, rules and users.
    pub fn from_store(store: Arc<AuthStore>) -> Self {
        Self::new(store.clone(), store.clone()).with_users(store)
    }

    /// Use a repository size source.
    pub fn with_quota(mut self, quota: Arc<dyn QuotaSource>) -> Self {
        self.quota = quota;
        self
    }

    /// Use an audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditEmitter>) -> Self {
        self.audit = audit;
        self
    }

    /// Use instance settings.
    pub fn with_config(mut self, config: AccessConfig) -> Self {
        self.config = config;
        self
    }

    /// Look up the users behind deploy keys and CI jobs.
    pub fn with_users(mut self, users: Arc<dyn UserSource>) -> Self {
        self.users = Some(users);
        self
    }

    /// Instance settings.
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Membership resolver.
    pub fn resolver(&self) -> &ProjectAuthorizationResolver {
        &self.resolver
    }
}

/// Which repository of a project is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// The code repository.
    #[default]
    Project,
    /// The wiki repository.
    Wiki,
    /// The design management repository.
    Design,
}

/// What kind of grants the actor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitySet {
    /// Membership, visibility and key grants.
    Full,
    /// CI job token: read-only, scoped to the job's projects.
    JobScoped,
}

impl CapabilitySet {
    /// Capabilities of an actor.
    pub fn for_actor(actor: &AccessActor) -> Self {
        match actor {
            AccessActor::CiBuild(_) => CapabilitySet::JobScoped,
            _ => CapabilitySet::Full,
        }
    }
}

/// State reached once a stage passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Account states verified.
    ActorResolved,
    /// Project found and visible.
    ProjectResolved,
    /// Transport allowed.
    ProtocolChecked,
    /// Command mapped to a granted ability.
    CommandAuthorized,
    /// Every ref change allowed.
    RefsChecked,
    /// Repository size within limits.
    QuotaChecked,
}

impl Stage {
    /// Snake-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ActorResolved => "actor_resolved",
            Stage::ProjectResolved => "project_resolved",
            Stage::ProtocolChecked => "protocol_checked",
            Stage::CommandAuthorized => "command_authorized",
            Stage::RefsChecked => "refs_checked",
            Stage::QuotaChecked => "quota_checked",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Step = fn(&GitAccessCheck, &mut CheckState<'_>) -> Result<()>;

/// Facts gathered while a check runs.
struct CheckState<'a> {
    command: Option<GitCommand>,
    changes: &'a Changes,
    /// Membership level as resolved.
    member_level: AccessLevel,
    /// Level after admin elevation.
    level: AccessLevel,
    notices: Vec<String>,
}

impl CheckState<'_> {
    /// The requested command; unknown commands are refused.
    fn command(&self) -> Result<GitCommand> {
        self.command
            .ok_or_else(|| AccessError::Forbidden(messages::COMMAND_NOT_ALLOWED.to_string()))
    }
}

/// A granted access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCheckResult {
    /// Correlation ID, also found in the audit event.
    pub check_id: Uuid,
    /// The command that was authorized.
    pub command: GitCommand,
    /// Effective level of the actor on the project.
    pub access_level: AccessLevel,
    /// Console messages for the client (e.g. project moved guidance).
    pub notices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Redirect {
    old_path: String,
    new_path: String,
    reject_writes: bool,
}

/// One access question: may this actor run a command on this project?
#[derive(Debug, Clone)]
pub struct GitAccessCheck {
    services: Arc<AccessServices>,
    actor: AccessActor,
    project: Option<Project>,
    protocol: Protocol,
    authentication_abilities: AuthenticationAbilities,
    kind: RepositoryKind,
    capabilities: CapabilitySet,
    redirect: Option<Redirect>,
    ssh_key: Option<PublicKey>,
    push_size: u64,
}

impl GitAccessCheck {
    /// Prepare a check against the project repository.
    ///
    /// `project` is `None` when the requested path resolved to nothing.
    pub fn new(
        services: Arc<AccessServices>,
        actor: AccessActor,
        project: Option<Project>,
        protocol: Protocol,
        authentication_abilities: AuthenticationAbilities,
    ) -> Self {
        let capabilities = CapabilitySet::for_actor(&actor);
        Self {
            services,
            actor,
            project,
            protocol,
            authentication_abilities,
            kind: RepositoryKind::Project,
            capabilities,
            redirect: None,
            ssh_key: None,
            push_size: 0,
        }
    }

    /// Check a different repository of the project.
    pub fn with_repository_kind(mut self, kind: RepositoryKind) -> Self {
        self.kind = kind;
        self
    }

    /// The client reached the project through `old_path`.
    ///
    /// The check still succeeds and carries guidance to update the remote.
    pub fn redirected(mut self, old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        self.redirect = Some(Redirect {
            old_path: old_path.into(),
            new_path: new_path.into(),
            reject_writes: false,
        });
        self
    }

    /// Refuse writes through a redirected path with [`AccessError::ProjectMoved`].
    pub fn reject_moved_writes(mut self) -> Self {
        if let Some(redirect) = &mut self.redirect {
            redirect.reject_writes = true;
        }
        self
    }

    /// The SSH key the user authenticated with.
    pub fn with_ssh_key(mut self, key: PublicKey) -> Self {
        self.ssh_key = Some(key);
        self
    }

    /// Bytes the push adds to the repository.
    pub fn with_push_size(mut self, bytes: u64) -> Self {
        self.push_size = bytes;
        self
    }

    /// Repository kind being checked.
    pub fn repository_kind(&self) -> RepositoryKind {
        self.kind
    }

    /// Capability set of the actor.
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    /// Stages run by this check, in order.
    pub fn stages(&self) -> Vec<Stage> {
        self.pipeline().into_iter().map(|(stage, _)| stage).collect()
    }

    /// Decide whether `cmd` (e.g. `"git-receive-pack"`) with `changes` is allowed.
    pub fn check(&self, cmd: &str, changes: &Changes) -> Result<AccessCheckResult> {
        let check_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "git_access",
            check_id = %check_id,
            actor = %self.actor,
            protocol = %self.protocol,
            command = cmd,
        );
        let _guard = span.enter();

        let mut state = CheckState {
            command: GitCommand::parse(cmd),
            changes,
            member_level: AccessLevel::NoAccess,
            level: AccessLevel::NoAccess,
            notices: Vec::new(),
        };

        let outcome = self.run(&mut state).and_then(|()| {
            Ok(AccessCheckResult {
                check_id,
                command: state.command()?,
                access_level: state.level,
                notices: std::mem::take(&mut state.notices),
            })
        });

        match &outcome {
            Ok(result) => info!(level = %result.access_level, "git access allowed"),
            Err(err) => info!(kind = ?err.kind(), reason = err.message(), "git access denied"),
        }

        self.emit_audit(check_id, cmd, changes, &outcome);
        outcome
    }

    fn run(&self, state: &mut CheckState<'_>) -> Result<()> {
        for (stage, step) in self.pipeline() {
            step(self, state)?;
            debug!(stage = %stage, "stage passed");
        }
        Ok(())
    }

    fn pipeline(&self) -> Vec<(Stage, Step)> {
        let mut steps: Vec<(Stage, Step)> = Vec::with_capacity(6);
        steps.push((Stage::ActorResolved, check_actor));

        match (self.kind, self.capabilities) {
            (RepositoryKind::Design, capabilities) => {
                steps.push((Stage::ProtocolChecked, check_protocol));
                steps.push((Stage::ProjectResolved, check_project));
                match capabilities {
                    CapabilitySet::Full => {
                        steps.push((Stage::CommandAuthorized, authorize_design_command))
                    }
                    CapabilitySet::JobScoped => {
                        steps.push((Stage::CommandAuthorized, authorize_job_command))
                    }
                }
            }
            (_, CapabilitySet::JobScoped) => {
                steps.push((Stage::ProjectResolved, check_project));
                steps.push((Stage::ProtocolChecked, check_protocol));
                steps.push((Stage::CommandAuthorized, authorize_job_command));
            }
            (RepositoryKind::Project, CapabilitySet::Full) => {
                steps.push((Stage::ProjectResolved, check_project));
                steps.push((Stage::ProtocolChecked, check_protocol));
                steps.push((Stage::CommandAuthorized, authorize_project_command));
                steps.push((Stage::RefsChecked, check_refs));
                steps.push((Stage::QuotaChecked, check_quota));
            }
            (RepositoryKind::Wiki, CapabilitySet::Full) => {
                steps.push((Stage::ProjectResolved, check_project));
                steps.push((Stage::ProtocolChecked, check_protocol));
                steps.push((Stage::CommandAuthorized, authorize_wiki_command));
                steps.push((Stage::QuotaChecked, check_quota));
            }
        }

        steps
    }

    fn config(&self) -> &AccessConfig {
        &self.services.config
    }

    fn project(&self) -> Result<&Project> {
        self.project.as_ref().ok_or_else(project_not_found)
    }

    fn permissions<'a>(&'a self, project: &'a Project, level: AccessLevel) -> Permissions<'a> {
        Permissions::new(&self.actor, project, level, self.config().admin_mode)
    }

    fn check_user(&self, user: &User) -> Result<()> {
        self.check_user_state(user)?;

        if user.password_expired_for_git() {
            return Err(forbidden(messages::PASSWORD_EXPIRED));
        }

        // CI builds run on behalf of the user and are not held to the terms.
        if self.config().enforce_terms
            && !user.bot
            && !user.terms_accepted
            && !self.authentication_abilities.is_build_only()
        {
            return Err(AccessError::Forbidden(messages::render(
                messages::TERMS_NOT_ACCEPTED,
                &[("username", &user.username), ("url", &self.config().base_url)],
            )));
        }

        Ok(())
    }

    fn check_user_state(&self, user: &User) -> Result<()> {
        match user.state {
            UserState::Active => Ok(()),
            UserState::Blocked => Err(forbidden(messages::ACCOUNT_BLOCKED)),
            UserState::BlockedPendingApproval => Err(forbidden(messages::ACCOUNT_PENDING_APPROVAL)),
            UserState::Deactivated => Err(AccessError::Forbidden(messages::render(
                messages::ACCOUNT_DEACTIVATED,
                &[("url", &self.config().base_url)],
            ))),
        }
    }

    /// Type and size rules for the key the actor authenticated with.
    fn check_key(&self) -> Result<()> {
        let key = match &self.actor {
            AccessActor::DeployKey(deploy_key) => deploy_key.key.as_ref(),
            AccessActor::User(_) => self.ssh_key.as_ref(),
            _ => None,
        };
        let Some(key) = key else {
            return Ok(());
        };

        match self.config().key_restrictions.check(key) {
            Ok(()) => Ok(()),
            Err(KeyViolation::TooSmall(bits)) => Err(AccessError::Forbidden(messages::render(
                messages::KEY_TOO_SMALL,
                &[("bits", &bits.to_string())],
            ))),
            Err(KeyViolation::TypeForbidden(allowed)) => {
                let labels: Vec<&str> = allowed.iter().map(|algorithm| algorithm.label()).collect();
                Err(AccessError::Forbidden(messages::render(
                    messages::KEY_TYPE_FORBIDDEN,
                    &[("allowed_types", &messages::sentence(&labels))],
                )))
            }
        }
    }

    /// Blocked states of the user a deploy key or CI job acts for.
    fn check_delegated_user(&self, user_id: Option<UserId>) -> Result<()> {
        let (Some(users), Some(user_id)) = (&self.services.users, user_id) else {
            return Ok(());
        };
        match users.find_user(user_id)? {
            Some(user) => self.check_user_state(&user),
            None => Ok(()),
        }
    }

    /// Reads accept either user download credentials or CI build credentials.
    fn authorize_download(
        &self,
        permissions: &Permissions<'_>,
        ability: Ability,
        denied: &str,
    ) -> Result<()> {
        let abilities = &self.authentication_abilities;
        let as_user = abilities.allows(Ability::DownloadCode);
        let as_build = abilities.allows(Ability::BuildDownloadCode);
        if !as_user && !as_build {
            return Err(forbidden(messages::AUTH_DOWNLOAD));
        }

        if (as_user && permissions.can(ability))
            || (as_build && permissions.can(Ability::BuildDownloadCode))
        {
            Ok(())
        } else {
            Err(forbidden(denied))
        }
    }

    /// Checks shared by every write to a repository.
    fn authorize_write(&self, project: &Project) -> Result<()> {
        if matches!(self.actor, AccessActor::DeployToken(_)) {
            return Err(forbidden(messages::PUSH_CODE));
        }
        if matches!(self.actor, AccessActor::Anonymous)
            || !self.authentication_abilities.allows(Ability::PushCode)
        {
            return Err(forbidden(messages::AUTH_UPLOAD));
        }
        if self.config().read_only_instance {
            return Err(forbidden(messages::READ_ONLY_INSTANCE));
        }
        if project.read_only {
            return Err(forbidden(messages::READ_ONLY_REPOSITORY));
        }
        if project.archived {
            return Err(forbidden(messages::ARCHIVED));
        }
        Ok(())
    }

    fn authorize_push(
        &self,
        permissions: &Permissions<'_>,
        project: &Project,
        ability: Ability,
        denied: &str,
    ) -> Result<()> {
        self.authorize_write(project)?;
        if let AccessActor::DeployKey(key) = &self.actor {
            if !key.can_push_to(project.id) {
                return Err(forbidden(messages::DEPLOY_KEY_UPLOAD));
            }
        }
        if !permissions.can(ability) {
            return Err(forbidden(denied));
        }
        Ok(())
    }

    fn emit_audit(
        &self,
        check_id: Uuid,
        cmd: &str,
        changes: &Changes,
        outcome: &Result<AccessCheckResult>,
    ) {
        let event = AccessAuditEvent {
            check_id,
            actor: self.actor.to_string(),
            user_id: self.actor.attributed_user_id(),
            project_id: self.project.as_ref().map(|project| project.id),
            command: cmd.to_string(),
            protocol: self.protocol,
            outcome: match outcome {
                Ok(_) => AccessOutcome::Allowed,
                Err(err) => AccessOutcome::Denied(err.kind()),
            },
            message: outcome.as_ref().err().map(|err| err.message().to_string()),
            changes: changes.len(),
        };

        if let Err(err) = self.services.audit.record(&event) {
            warn!(error = %err, "failed to record access audit event");
        }
    }
}

fn forbidden(message: &str) -> AccessError {
    AccessError::Forbidden(message.to_string())
}

fn project_not_found() -> AccessError {
    AccessError::NotFound(messages::PROJECT_NOT_FOUND.to_string())
}

fn check_actor(check: &GitAccessCheck, _state: &mut CheckState<'_>) -> Result<()> {
    check.check_key()?;
    match &check.actor {
        AccessActor::Anonymous | AccessActor::DeployToken(_) => Ok(()),
        AccessActor::User(user) => check.check_user(user),
        AccessActor::DeployKey(key) => check.check_delegated_user(key.user_id),
        AccessActor::CiBuild(job) => check.check_delegated_user(job.user_id),
    }
}

fn check_project(check: &GitAccessCheck, state: &mut CheckState<'_>) -> Result<()> {
    let command = state.command()?;
    let project = check.project()?;

    let level = check.services.resolver.access_level(&check.actor, project)?;
    let permissions = check.permissions(project, level);
    if !permissions.can(Ability::ReadProject) {
        return Err(project_not_found());
    }
    state.member_level = level;
    state.level = permissions.level();

    if let Some(redirect) = &check.redirect {
        let message = messages::project_moved(
            &redirect.old_path,
            &redirect.new_path,
            &check.config().url_to_repo(&redirect.new_path),
        );
        if redirect.reject_writes && command.is_write() {
            return Err(AccessError::ProjectMoved {
                old_path: redirect.old_path.clone(),
                new_path: redirect.new_path.clone(),
                message,
            });
        }
        state.notices.push(message);
    }

    if check.kind == RepositoryKind::Project && command.is_read() && !project.repository_exists {
        return Err(AccessError::NotFound(messages::NO_REPO.to_string()));
    }

    Ok(())
}

fn check_protocol(check: &GitAccessCheck, state: &mut CheckState<'_>) -> Result<()> {
    if check.kind == RepositoryKind::Design && check.protocol != Protocol::Web {
        return Err(forbidden(messages::DESIGN_PROTOCOL_NOT_ALLOWED));
    }

    let config = check.config();
    if !config.protocol_allowed(check.protocol) {
        return Err(forbidden(match check.protocol {
            Protocol::Ssh => messages::SSH_DISABLED,
            _ => messages::HTTP_DISABLED,
        }));
    }

    if check.protocol == Protocol::Http {
        match state.command()? {
            GitCommand::UploadPack if !config.upload_pack_over_http => {
                return Err(forbidden(messages::UPLOAD_PACK_DISABLED_OVER_HTTP));
            }
            GitCommand::ReceivePack if !config.receive_pack_over_http => {
                return Err(forbidden(messages::RECEIVE_PACK_DISABLED_OVER_HTTP));
            }
            _ => {}
        }
    }

    Ok(())
}

fn authorize_project_command(check: &GitAccessCheck, state: &mut CheckState<'_>) -> Result<()> {
    let project = check.project()?;
    let permissions = check.permissions(project, state.member_level);

    match state.command()? {
        GitCommand::UploadPack | GitCommand::UploadArchive => {
            check.authorize_download(&permissions, Ability::DownloadCode, messages::DOWNLOAD)
        }
        GitCommand::LfsDownload => {
            if !project.lfs_enabled {
                return Err(forbidden(messages::LFS_DISABLED));
            }
            check.authorize_download(
                &permissions,
                Ability::DownloadLfsObject,
                messages::LFS_DOWNLOAD,
            )
        }
        GitCommand::ReceivePack => {
            check.authorize_push(&permissions, project, Ability::PushCode, messages::PUSH_CODE)
        }
        GitCommand::LfsUpload => {
            if !project.lfs_enabled {
                return Err(forbidden(messages::LFS_DISABLED));
            }
            check.authorize_push(
                &permissions,
                project,
                Ability::UploadLfsObject,
                messages::LFS_UPLOAD,
            )
        }
    }
}

fn authorize_wiki_command(check: &GitAccessCheck, state: &mut CheckState<'_>) -> Result<()> {
    let project = check.project()?;
    if project.wiki_access == FeatureAccess::Disabled {
        return Err(forbidden(messages::WIKI_DISABLED));
    }
    let permissions = check.permissions(project, state.member_level);

    if state.command()?.is_write() {
        check.authorize_write(project)?;
        if !permissions.can(Ability::CreateWiki) {
            return Err(forbidden(messages::WIKI_WRITE));
        }
        Ok(())
    } else {
        check.authorize_download(&permissions, Ability::DownloadWikiCode, messages::WIKI_READ)
    }
}

fn authorize_design_command(check: &GitAccessCheck, state: &mut CheckState<'_>) -> Result<()> {
    let project = check.project()?;
    if !project.design_management_enabled {
        return Err(forbidden(messages::DESIGN_DISABLED));
    }
    let permissions = check.permissions(project, state.member_level);

    if state.command()?.is_write() {
        if matches!(check.actor, AccessActor::Anonymous) {
            return Err(forbidden(messages::AUTH_UPLOAD));
        }
        if check.config().read_only_instance {
            return Err(forbidden(messages::READ_ONLY_INSTANCE));
        }
        if !permissions.can(Ability::CreateDesign) {
            return Err(forbidden(messages::DESIGN_WRITE));
        }
    } else if !permissions.can(Ability::ReadDesign) {
        return Err(forbidden(messages::DESIGN_READ));
    }

    Ok(())
}

fn authorize_job_command(check: &GitAccessCheck, state: &mut CheckState<'_>) -> Result<()> {
    let command = state.command()?;
    if command.is_write() {
        return Err(forbidden(messages::AUTH_UPLOAD));
    }

    let abilities = &check.authentication_abilities;
    if !abilities.allows(Ability::BuildDownloadCode) && !abilities.allows(Ability::DownloadCode)
    {
        return Err(forbidden(messages::AUTH_DOWNLOAD));
    }

    let project = check.project()?;
    if command == GitCommand::LfsDownload && !project.lfs_enabled {
        return Err(forbidden(messages::LFS_DISABLED));
    }

    let permissions = check.permissions(project, state.member_level);
    let ability = match check.kind {
        RepositoryKind::Project => Ability::BuildDownloadCode,
        RepositoryKind::Wiki => Ability::DownloadWikiCode,
        RepositoryKind::Design => Ability::ReadDesign,
    };
    if !permissions.can(ability) {
        return Err(forbidden(messages::DOWNLOAD));
    }

    Ok(())
}

fn check_refs(check: &GitAccessCheck, state: &mut CheckState<'_>) -> Result<()> {
    if !state.command()?.is_write() {
        return Ok(());
    }
    let changes = state.changes.as_slice();
    let Some(first) = changes.first() else {
        return Ok(());
    };
    let project = check.project()?;

    let timed_out = |_| AccessError::Timeout(messages::push_timed_out(&first.ref_name));
    let mut rules = check
        .services
        .rules
        .rules_for(project.id, RefKind::Branch)
        .map_err(timed_out)?;
    rules.extend(
        check
            .services
            .rules
            .rules_for(project.id, RefKind::Tag)
            .map_err(timed_out)?,
    );
    let policy = ProtectedRefPolicy::new(rules);

    let permissions = check.permissions(project, state.member_level);
    let ref_check = RefCheck {
        policy: &policy,
        actor: RefActor::for_project(&check.actor, project.id),
        level: state.level,
        can_admin_tag: permissions.can(Ability::AdminTag),
        protocol: check.protocol,
        default_branch: &project.default_branch,
    };

    for change in changes {
        ref_check.validate(change)?;
    }

    debug!(changes = changes.len(), rules = policy.len(), "ref changes allowed");
    Ok(())
}

fn check_quota(check: &GitAccessCheck, state: &mut CheckState<'_>) -> Result<()> {
    if !state.command()?.is_write() {
        return Ok(());
    }
    let project = check.project()?;
    if check
        .services
        .quota
        .exceeds_size_limit(project.id, check.push_size)?
    {
        return Err(forbidden(messages::SIZE_LIMIT_EXCEEDED));
    }
    Ok(())
}
