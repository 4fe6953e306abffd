use crate::model::{
    BatchChange, BatchSpec, BranchChangeset, Changeset, ChangesetSpec, ChangesetSpecKind,
    ExternalServiceType, ExternalState, Id, PublicationIntent, PublicationState, ReconcilerState,
    Repo,
};
use crate::store::InMemoryStore;
use anyhow::Result;
use chrono::Utc;
use log::info;

/// Batch spec that was last applied to the demo batch change.
pub const SEED_APPLIED_BATCH_SPEC_ID: Id = 1;
/// Batch spec that can be previewed against the demo batch change.
pub const SEED_BATCH_SPEC_ID: Id = 2;
pub const SEED_BATCH_CHANGE_ID: Id = 1;

const NAMESPACE: &str = "acme";
const NAME: &str = "upgrade-logging";

/// Loads a demo batch change whose next batch spec exercises every kind of
/// preview: an update, a publication, a removal, a new changeset on an
/// inaccessible repository and a tracked changeset.
pub async fn load_seed_data(store: &InMemoryStore) -> Result<()> {
    load_repos(store);
    load_batch_specs(store);
    load_changeset_specs(store);
    load_changesets(store);

    info!(
        "Seed data loaded: preview batch spec {} against batch change {}",
        SEED_BATCH_SPEC_ID, SEED_BATCH_CHANGE_ID
    );
    Ok(())
}

fn load_repos(store: &InMemoryStore) {
    store.insert_repo(Repo::new(1, "github.com/acme/api", ExternalServiceType::GitHub));
    store.insert_repo(Repo::new(2, "gitlab.com/acme/web", ExternalServiceType::GitLab));
    store.insert_repo(Repo::new(
        3,
        "bitbucket.acme.internal/OPS/deploy",
        ExternalServiceType::BitbucketServer,
    ));
    store.insert_repo(Repo::new(4, "github.com/acme/secret-sauce", ExternalServiceType::GitHub));
    store.insert_repo(Repo::new(5, "github.com/acme/cli", ExternalServiceType::GitHub));
    store.hide_repo(4);
}

fn load_batch_specs(store: &InMemoryStore) {
    let mut applied = BatchSpec::new(SEED_APPLIED_BATCH_SPEC_ID, NAMESPACE, NAME);
    applied.description = Some("Move every service to structured logging".to_string());
    store.insert_batch_spec(applied);

    let mut next = BatchSpec::new(SEED_BATCH_SPEC_ID, NAMESPACE, NAME);
    next.description = Some("Move every service to structured logging, now with JSON output".to_string());
    store.insert_batch_spec(next);

    let mut batch_change = BatchChange::new(
        SEED_BATCH_CHANGE_ID,
        NAMESPACE,
        NAME,
        SEED_APPLIED_BATCH_SPEC_ID,
    );
    batch_change.description = Some("Move every service to structured logging".to_string());
    store.insert_batch_change(batch_change);
}

fn logging_branch(title: &str, diff: &str, published: Option<PublicationIntent>) -> ChangesetSpecKind {
    ChangesetSpecKind::Branch(BranchChangeset {
        title: title.to_string(),
        body: "Replaces ad-hoc print statements with the shared logger.".to_string(),
        diff: diff.to_string(),
        base_ref: "refs/heads/main".to_string(),
        base_rev: "4f1c2d9".to_string(),
        head_ref: "refs/heads/upgrade-logging".to_string(),
        commit_message: "Upgrade logging".to_string(),
        commit_author_name: "Batch Bot".to_string(),
        commit_author_email: "batch-bot@acme.dev".to_string(),
        published,
    })
}

fn load_changeset_specs(store: &InMemoryStore) {
    let applied = SEED_APPLIED_BATCH_SPEC_ID;
    let next = SEED_BATCH_SPEC_ID;
    let published = Some(PublicationIntent::Published);

    store.insert_changeset_spec(ChangesetSpec::new(
        1,
        applied,
        1,
        logging_branch("Upgrade logging", "+use log::info;\n", published),
    ));
    store.insert_changeset_spec(ChangesetSpec::new(
        2,
        applied,
        2,
        logging_branch("Upgrade logging", "+import logger\n", None),
    ));
    store.insert_changeset_spec(ChangesetSpec::new(
        3,
        applied,
        3,
        logging_branch("Upgrade logging", "+logger.info()\n", published),
    ));

    // Same branch on repo 1 with a new diff and title: push and update.
    store.insert_changeset_spec(ChangesetSpec::new(
        11,
        next,
        1,
        logging_branch("Upgrade logging (JSON)", "+use log::info;\n+json\n", published),
    ));
    // Unchanged on repo 2 but published this time.
    store.insert_changeset_spec(ChangesetSpec::new(
        12,
        next,
        2,
        logging_branch("Upgrade logging", "+import logger\n", published),
    ));
    // New on an inaccessible repository.
    store.insert_changeset_spec(ChangesetSpec::new(
        14,
        next,
        4,
        logging_branch("Upgrade logging", "+secret\n", published),
    ));
    // Tracks a changeset opened by hand; already synced, so nothing to import.
    store.insert_changeset_spec(ChangesetSpec::new(
        15,
        next,
        5,
        ChangesetSpecKind::Existing {
            external_id: "87".to_string(),
        },
    ));
}

fn load_changesets(store: &InMemoryStore) {
    let now = Utc::now();

    let mut api = Changeset::new(101, 1, ExternalServiceType::GitHub);
    api.external_id = Some("1204".to_string());
    api.owned_by_batch_change_id = Some(SEED_BATCH_CHANGE_ID);
    api.current_spec_id = Some(1);
    api.publication_state = PublicationState::Published;
    api.external_state = Some(ExternalState::Open);
    api.reconciler_state = ReconcilerState::Completed;
    api.synced_at = Some(now);
    api.attach(SEED_BATCH_CHANGE_ID);
    store.insert_changeset(api);

    let mut web = Changeset::new(102, 2, ExternalServiceType::GitLab);
    web.owned_by_batch_change_id = Some(SEED_BATCH_CHANGE_ID);
    web.current_spec_id = Some(2);
    web.reconciler_state = ReconcilerState::Completed;
    web.attach(SEED_BATCH_CHANGE_ID);
    store.insert_changeset(web);

    let mut deploy = Changeset::new(103, 3, ExternalServiceType::BitbucketServer);
    deploy.external_id = Some("31".to_string());
    deploy.owned_by_batch_change_id = Some(SEED_BATCH_CHANGE_ID);
    deploy.current_spec_id = Some(3);
    deploy.publication_state = PublicationState::Published;
    deploy.external_state = Some(ExternalState::Open);
    deploy.reconciler_state = ReconcilerState::Completed;
    deploy.synced_at = Some(now);
    deploy.attach(SEED_BATCH_CHANGE_ID);
    store.insert_changeset(deploy);

    let mut cli = Changeset::new(105, 5, ExternalServiceType::GitHub);
    cli.external_id = Some("87".to_string());
    cli.publication_state = PublicationState::Published;
    cli.external_state = Some(ExternalState::Open);
    cli.reconciler_state = ReconcilerState::Completed;
    cli.synced_at = Some(now);
    store.insert_changeset(cli);
}
