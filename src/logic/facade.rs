use log::{debug, info, warn};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{PreviewError, PreviewResult};
use crate::logic::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::logic::memo::{Memo, MemoMap};
use crate::logic::preview::{ApplyPreview, PreviewContext, TargetKind};
use crate::logic::search::parse_text_search;
use crate::model::{
    ApplyPreviewRequest, ApplyPreviewStats, BatchChange, BatchSpec, ChangesetState,
    GetRewirerMappingsOpts, Id, MappingKey, PageArgs, PageInfo, PublicationIntent,
    ReconcilerOperation, RewirerMapping, TextSearchTerm,
};
use crate::store::Store;

/// One page of previews.
pub struct PreviewPage<S: Store> {
    pub nodes: Vec<Arc<ApplyPreview<S>>>,
    pub total_count: usize,
    pub page_info: PageInfo,
}

/// A page together with the statistics of the whole preview.
pub struct ApplyPreviewConnection<S: Store> {
    pub page: Arc<PreviewPage<S>>,
    pub stats: ApplyPreviewStats,
}

/// Validated request parameters.
#[derive(Debug, Clone)]
struct PreviewScope {
    batch_spec_id: Id,
    batch_change_id: Option<Id>,
    text_search: Vec<TextSearchTerm>,
    current_state: Option<ChangesetState>,
    publication_states: Arc<HashMap<String, PublicationIntent>>,
}

/// Request-scoped orchestration of an apply preview.
///
/// Owns the lazily loaded batch spec, dry-run batch change and mapping set
/// of one request, and memoizes resolvers, pages and statistics on top of
/// them. Nothing outlives the facade.
pub struct ApplyPreviewFacade<S: Store> {
    store: Arc<S>,
    scope: PreviewScope,
    batch_spec: Memo<BatchSpec>,
    batch_change: Memo<BatchChange>,
    mappings: Memo<Arc<Vec<RewirerMapping>>>,
    resolvers: MemoMap<MappingKey, Memo<Arc<ApplyPreview<S>>>>,
    pages: MemoMap<PageArgs, Memo<Arc<PreviewPage<S>>>>,
    stats: Memo<ApplyPreviewStats>,
    cancel_handle: CancelHandle,
    cancel: CancelToken,
}

impl<S: Store> ApplyPreviewFacade<S> {
    /// Validates the request. Invalid input is rejected here, before
    /// anything is loaded or cached.
    pub async fn open(store: Arc<S>, request: ApplyPreviewRequest) -> PreviewResult<Self> {
        let text_search = match request.search.as_deref() {
            Some(search) => parse_text_search(search).map_err(PreviewError::InvalidInput)?,
            None => Vec::new(),
        };
        let current_state = request
            .current_state
            .as_deref()
            .map(ChangesetState::from_str)
            .transpose()
            .map_err(PreviewError::InvalidInput)?;

        if !request.publication_states.is_empty() {
            validate_publication_states(store.as_ref(), &request).await?;
        }

        let (cancel_handle, cancel) = cancel_pair();
        Ok(Self {
            store,
            scope: PreviewScope {
                batch_spec_id: request.batch_spec_id,
                batch_change_id: request.batch_change_id,
                text_search,
                current_state,
                publication_states: Arc::new(request.publication_states),
            },
            batch_spec: Memo::new(),
            batch_change: Memo::new(),
            mappings: Memo::new(),
            resolvers: MemoMap::new(),
            pages: MemoMap::new(),
            stats: Memo::new(),
            cancel_handle,
            cancel,
        })
    }

    /// Cancels every pending and future load of this request.
    pub fn cancel(&self) {
        info!("cancelling apply preview of batch spec {}", self.scope.batch_spec_id);
        self.cancel_handle.cancel();
    }

    pub async fn batch_spec(&self) -> PreviewResult<BatchSpec> {
        let id = self.scope.batch_spec_id;
        self.batch_spec
            .get_or_try_init(|| {
                self.cancel.guard(async move {
                    debug!("loading batch spec {}", id);
                    self.store
                        .get_batch_spec(id)
                        .await
                        .map_err(PreviewError::store)?
                        .ok_or(PreviewError::BatchSpecNotFound(id))
                })
            })
            .await
    }

    /// The batch change the batch spec would be applied to. Unsaved when
    /// applying would create it.
    pub async fn batch_change(&self) -> PreviewResult<BatchChange> {
        self.batch_change
            .get_or_try_init(|| self.cancel.guard(self.reconcile()))
            .await
    }

    async fn reconcile(&self) -> PreviewResult<BatchChange> {
        let batch_spec = self.batch_spec().await?;
        let (batch_change, is_new) = self
            .store
            .reconcile_batch_change(&batch_spec)
            .await
            .map_err(|err| PreviewError::Reconciliation(err.to_string()))?;

        if let Some(requested) = self.scope.batch_change_id {
            if requested != batch_change.id {
                return Err(PreviewError::Reconciliation(format!(
                    "batch spec {} applies to batch change {}, not {}",
                    batch_spec.id, batch_change.id, requested
                )));
            }
        }
        debug!(
            "batch spec {} applies to batch change {} (new: {})",
            batch_spec.id, batch_change.id, is_new
        );
        Ok(batch_change)
    }

    /// Loads the mapping set of the request. Every other query builds on it.
    pub async fn compute(&self) -> PreviewResult<Arc<Vec<RewirerMapping>>> {
        self.mappings
            .get_or_try_init(|| self.cancel.guard(self.load_mappings()))
            .await
    }

    async fn load_mappings(&self) -> PreviewResult<Arc<Vec<RewirerMapping>>> {
        let result = self.query_mappings().await;
        if let Err(err) = &result {
            warn!("apply preview of batch spec {} failed: {}", self.scope.batch_spec_id, err);
        }
        result
    }

    async fn query_mappings(&self) -> PreviewResult<Arc<Vec<RewirerMapping>>> {
        let batch_change = self.batch_change().await?;
        let opts = GetRewirerMappingsOpts {
            batch_spec_id: self.scope.batch_spec_id,
            batch_change_id: batch_change.id,
            text_search: self.scope.text_search.clone(),
            current_state: self.scope.current_state,
        };
        let mappings = self
            .store
            .get_rewirer_mappings(&opts)
            .await
            .map_err(PreviewError::store)?;
        info!(
            "loaded {} mapping(s) for batch spec {} into batch change {}",
            mappings.len(),
            opts.batch_spec_id,
            opts.batch_change_id
        );
        Ok(Arc::new(mappings))
    }

    /// The resolver of `mapping`, shared by every page and statistic of the
    /// request.
    pub async fn resolver(&self, mapping: &RewirerMapping) -> PreviewResult<Arc<ApplyPreview<S>>> {
        let batch_change = self.batch_change().await?;
        let memo = self.resolvers.get_or_insert_with(mapping.key(), Memo::new);
        memo.get_or_try_init(|| async {
            debug!("creating resolver for mapping {}", mapping.key());
            let context = PreviewContext {
                store: Arc::clone(&self.store),
                batch_change_id: batch_change.id,
                publication_states: Arc::clone(&self.scope.publication_states),
                cancel: self.cancel.clone(),
            };
            ApplyPreview::new(mapping.clone(), context).map(Arc::new)
        })
        .await
    }

    pub async fn page(&self, args: PageArgs) -> PreviewResult<Arc<PreviewPage<S>>> {
        let memo = self.pages.get_or_insert_with(args, Memo::new);
        memo.get_or_try_init(|| self.cancel.guard(self.compute_page(args)))
            .await
    }

    async fn compute_page(&self, args: PageArgs) -> PreviewResult<Arc<PreviewPage<S>>> {
        let mappings = self.compute().await?;

        let mut previews = Vec::with_capacity(mappings.len());
        for mapping in mappings.iter() {
            let preview = self.resolver(mapping).await?;
            if let Some(action) = args.action {
                // Hidden previews have no operations and never match.
                if !preview.operations().await?.contains(&action) {
                    continue;
                }
            }
            previews.push(preview);
        }

        let total_count = previews.len();
        let (start, end) = clamp_page(total_count, args.limit, args.offset);
        let has_next_page = end < total_count;
        debug!(
            "page {:?}: {}..{} of {} preview(s)",
            args, start, end, total_count
        );

        Ok(Arc::new(PreviewPage {
            nodes: previews[start..end].to_vec(),
            total_count,
            page_info: PageInfo {
                end_cursor: has_next_page.then(|| end.to_string()),
                has_next_page,
            },
        }))
    }

    /// Statistics over every visible mapping, ignoring any action filter.
    pub async fn stats(&self) -> PreviewResult<ApplyPreviewStats> {
        self.stats
            .get_or_try_init(|| self.cancel.guard(self.compute_stats()))
            .await
    }

    async fn compute_stats(&self) -> PreviewResult<ApplyPreviewStats> {
        let mappings = self.compute().await?;
        let mut stats = ApplyPreviewStats::default();

        for mapping in mappings.iter() {
            let preview = self.resolver(mapping).await?;
            if preview.is_hidden() {
                continue;
            }
            match preview.targets().kind() {
                TargetKind::Attach => stats.added += 1,
                TargetKind::Update => stats.modified += 1,
                TargetKind::Detach => stats.removed += 1,
            }
            for op in preview.operations().await? {
                stats.record(op);
            }
        }

        Ok(stats)
    }

    pub async fn connection(&self, args: PageArgs) -> PreviewResult<ApplyPreviewConnection<S>> {
        let page = self.page(args).await?;
        let stats = self.stats().await?;
        Ok(ApplyPreviewConnection { page, stats })
    }
}

/// Publication overrides must name specs of the batch spec that leave
/// `published` unset.
async fn validate_publication_states<S: Store>(
    store: &S,
    request: &ApplyPreviewRequest,
) -> PreviewResult<()> {
    let specs = store
        .list_changeset_specs(request.batch_spec_id)
        .await
        .map_err(PreviewError::store)?;

    for rand_id in request.publication_states.keys() {
        let spec = specs
            .iter()
            .find(|spec| &spec.rand_id == rand_id)
            .ok_or_else(|| {
                PreviewError::InvalidInput(format!(
                    "changeset spec {} is not part of batch spec {}",
                    rand_id, request.batch_spec_id
                ))
            })?;
        if spec.published().is_some() {
            return Err(PreviewError::InvalidInput(format!(
                "changeset spec {} already sets its publication state",
                rand_id
            )));
        }
    }
    Ok(())
}

/// Bounds `[start, end)` of a page over `len` items. `limit == 0` means
/// everything from `offset`; an offset past the end yields an empty page.
pub fn clamp_page(len: usize, limit: usize, offset: usize) -> (usize, usize) {
    if offset > len {
        return (len, len);
    }
    if limit == 0 {
        return (offset, len);
    }
    (offset, offset.saturating_add(limit).min(len))
}

/// Parses an `after` cursor. A missing cursor starts at the first page.
pub fn parse_cursor(after: Option<&str>) -> PreviewResult<usize> {
    match after {
        None => Ok(0),
        Some(cursor) => cursor
            .parse()
            .map_err(|_| PreviewError::InvalidInput(format!("malformed cursor '{}'", cursor))),
    }
}

pub fn page_args(first: usize, after: Option<&str>, action: Option<&str>) -> PreviewResult<PageArgs> {
    let action = action
        .map(ReconcilerOperation::from_str)
        .transpose()
        .map_err(PreviewError::InvalidInput)?;
    Ok(PageArgs {
        limit: first,
        offset: parse_cursor(after)?,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BranchChangeset, Changeset, ChangesetSpec, ChangesetSpecKind, ExternalServiceType,
        ExternalState, PublicationState, ReconcilerState, Repo,
    };
    use crate::store::{ChangesetSpecStore, InMemoryStore};
    use chrono::Utc;

    const BATCH_SPEC: Id = 20;
    const BATCH_CHANGE: Id = 5;

    fn branch_spec(id: Id, batch_spec_id: Id, repo_id: Id, diff: &str) -> ChangesetSpec {
        ChangesetSpec::new(
            id,
            batch_spec_id,
            repo_id,
            ChangesetSpecKind::Branch(BranchChangeset {
                title: format!("Change {}", repo_id),
                body: String::new(),
                diff: diff.to_string(),
                base_ref: "refs/heads/main".to_string(),
                base_rev: "abc".to_string(),
                head_ref: "refs/heads/change".to_string(),
                commit_message: "Change".to_string(),
                commit_author_name: "Jo".to_string(),
                commit_author_email: "jo@example.com".to_string(),
                published: None,
            }),
        )
    }

    fn published(id: Id, repo_id: Id, current_spec_id: Id) -> Changeset {
        let mut changeset = Changeset::new(id, repo_id, ExternalServiceType::GitHub);
        changeset.owned_by_batch_change_id = Some(BATCH_CHANGE);
        changeset.current_spec_id = Some(current_spec_id);
        changeset.publication_state = PublicationState::Published;
        changeset.external_state = Some(ExternalState::Open);
        changeset.reconciler_state = ReconcilerState::Completed;
        changeset.synced_at = Some(Utc::now());
        changeset.attach(BATCH_CHANGE);
        changeset
    }

    /// Repo 1: new spec. Repo 2: spec with a changed diff. Repo 3: changeset
    /// without spec. Repo 4: hidden, changed diff.
    fn seeded() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        for (id, name) in [(1, "a/one"), (2, "a/two"), (3, "a/three"), (4, "a/four")] {
            store.insert_repo(Repo::new(id, name, ExternalServiceType::GitHub));
        }
        store.hide_repo(4);
        store.insert_batch_spec(BatchSpec::new(10, "acme", "change"));
        store.insert_batch_spec(BatchSpec::new(BATCH_SPEC, "acme", "change"));
        store.insert_batch_change(BatchChange::new(BATCH_CHANGE, "acme", "change", 10));

        store.insert_changeset_spec(branch_spec(1, BATCH_SPEC, 1, "one"));
        store.insert_changeset_spec(branch_spec(2, 10, 2, "old"));
        store.insert_changeset_spec(branch_spec(3, BATCH_SPEC, 2, "new"));
        store.insert_changeset_spec(branch_spec(4, 10, 3, "three"));
        store.insert_changeset_spec(branch_spec(5, 10, 4, "old"));
        store.insert_changeset_spec(branch_spec(6, BATCH_SPEC, 4, "new"));

        store.insert_changeset(published(100, 2, 2));
        store.insert_changeset(published(101, 3, 4));
        store.insert_changeset(published(102, 4, 5));
        Arc::new(store)
    }

    fn request() -> ApplyPreviewRequest {
        ApplyPreviewRequest {
            batch_spec_id: BATCH_SPEC,
            ..Default::default()
        }
    }

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(5, 2, 0), (0, 2));
        assert_eq!(clamp_page(5, 0, 1), (1, 5));
        assert_eq!(clamp_page(5, 10, 3), (3, 5));
        assert_eq!(clamp_page(5, 2, 5), (5, 5));
        assert_eq!(clamp_page(5, 2, 9), (5, 5));
        assert_eq!(clamp_page(5, usize::MAX, 1), (1, 5));
    }

    #[test]
    fn test_page_args_validation() {
        let args = page_args(10, Some("20"), Some("push")).unwrap();
        assert_eq!(args.offset, 20);
        assert_eq!(args.action, Some(ReconcilerOperation::Push));

        assert!(matches!(parse_cursor(Some("abc")), Err(PreviewError::InvalidInput(_))));
        assert!(matches!(
            page_args(10, None, Some("explode")),
            Err(PreviewError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_loading() {
        let store = seeded();
        let bad_search = ApplyPreviewRequest {
            search: Some("\"unterminated".to_string()),
            ..request()
        };
        assert!(matches!(
            ApplyPreviewFacade::open(Arc::clone(&store), bad_search).await,
            Err(PreviewError::InvalidInput(_))
        ));
        let bad_state = ApplyPreviewRequest {
            current_state: Some("exploded".to_string()),
            ..request()
        };
        assert!(matches!(
            ApplyPreviewFacade::open(Arc::clone(&store), bad_state).await,
            Err(PreviewError::InvalidInput(_))
        ));
        let unknown_spec = ApplyPreviewRequest {
            publication_states: HashMap::from([("nope".to_string(), PublicationIntent::Published)]),
            ..request()
        };
        assert!(matches!(
            ApplyPreviewFacade::open(Arc::clone(&store), unknown_spec).await,
            Err(PreviewError::InvalidInput(_))
        ));
        assert_eq!(store.mapping_loads(), 0);
        assert_eq!(store.batch_spec_loads(), 0);
    }

    #[tokio::test]
    async fn test_publication_state_conflicting_with_spec_is_rejected() {
        let store = seeded();
        let mut declared = branch_spec(7, BATCH_SPEC, 3, "declared");
        if let ChangesetSpecKind::Branch(branch) = &mut declared.kind {
            branch.published = Some(PublicationIntent::Published);
        }
        let rand_id = declared.rand_id.clone();
        store.insert_changeset_spec(declared);

        let conflicting = ApplyPreviewRequest {
            publication_states: HashMap::from([(rand_id, PublicationIntent::Draft)]),
            ..request()
        };
        assert!(matches!(
            ApplyPreviewFacade::open(Arc::clone(&store), conflicting).await,
            Err(PreviewError::InvalidInput(_))
        ));
        assert_eq!(store.mapping_loads(), 0);
    }

    #[tokio::test]
    async fn test_publication_state_override_publishes_draft() {
        let store = seeded();
        let rand_id = store
            .list_changeset_specs(BATCH_SPEC)
            .await
            .unwrap()
            .into_iter()
            .find(|spec| spec.id == 1)
            .map(|spec| spec.rand_id)
            .unwrap();
        let facade = ApplyPreviewFacade::open(
            store,
            ApplyPreviewRequest {
                publication_states: HashMap::from([(rand_id, PublicationIntent::Draft)]),
                ..request()
            },
        )
        .await
        .unwrap();

        let drafts = facade
            .page(PageArgs {
                action: Some(ReconcilerOperation::PublishDraft),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(drafts.total_count, 1);
        assert_eq!(drafts.nodes[0].key().repo_id, 1);
        assert_eq!(
            drafts.nodes[0].operations().await.unwrap(),
            vec![ReconcilerOperation::Push, ReconcilerOperation::PublishDraft]
        );
    }

    #[tokio::test]
    async fn test_archived_changeset_is_not_removed_again() {
        let store = seeded();
        store.insert_repo(Repo::new(5, "a/five", ExternalServiceType::GitHub));
        store.insert_changeset_spec(branch_spec(7, 10, 5, "five"));
        let mut archived = published(103, 5, 7);
        archived.batch_changes[0].is_archived = true;
        store.insert_changeset(archived);

        let facade = ApplyPreviewFacade::open(Arc::clone(&store), request()).await.unwrap();
        let page = facade.page(PageArgs::default()).await.unwrap();
        assert!(page.nodes.iter().all(|node| node.key().changeset_id != Some(103)));

        let stats = facade.stats().await.unwrap();
        assert_eq!((stats.added, stats.modified, stats.removed), (1, 1, 1));
        assert_eq!(stats.close, 1);
    }

    #[tokio::test]
    async fn test_pages_and_stats_load_mappings_once() {
        let store = seeded();
        let facade = ApplyPreviewFacade::open(Arc::clone(&store), request()).await.unwrap();

        let first = facade.page(PageArgs { limit: 2, ..Default::default() }).await.unwrap();
        let again = facade.page(PageArgs { limit: 2, ..Default::default() }).await.unwrap();
        let rest = facade
            .page(PageArgs { limit: 2, offset: 2, action: None })
            .await
            .unwrap();
        facade.stats().await.unwrap();
        facade.stats().await.unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.total_count, 4);
        assert_eq!(first.page_info.end_cursor.as_deref(), Some("2"));
        assert!(first.page_info.has_next_page);
        assert_eq!(rest.nodes.len(), 2);
        assert!(!rest.page_info.has_next_page);
        assert_eq!(rest.page_info.end_cursor, None);
        assert_eq!(store.mapping_loads(), 1);
        assert_eq!(store.batch_spec_loads(), 1);
    }

    #[tokio::test]
    async fn test_resolvers_are_shared_across_pages() {
        let store = seeded();
        let facade = ApplyPreviewFacade::open(store, request()).await.unwrap();

        let all = facade.page(PageArgs::default()).await.unwrap();
        let second = facade
            .page(PageArgs { limit: 1, offset: 1, action: None })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&all.nodes[1], &second.nodes[0]));
    }

    #[tokio::test]
    async fn test_stats_are_consistent_with_operations() {
        let store = seeded();
        let facade = ApplyPreviewFacade::open(store, request()).await.unwrap();

        let stats = facade.stats().await.unwrap();
        let page = facade.page(PageArgs::default()).await.unwrap();

        let mut expected = ApplyPreviewStats::default();
        let mut visible = 0;
        for preview in &page.nodes {
            if preview.is_hidden() {
                continue;
            }
            visible += 1;
            for op in preview.operations().await.unwrap() {
                expected.record(op);
            }
        }
        for op in ReconcilerOperation::ALL {
            assert_eq!(stats.count(op), expected.count(op), "{}", op);
        }
        assert_eq!(stats.added + stats.modified + stats.removed, visible);
        assert_eq!((stats.added, stats.modified, stats.removed), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_hidden_mapping_never_matches_action_filter() {
        let store = seeded();
        let facade = ApplyPreviewFacade::open(store, request()).await.unwrap();

        let pushes = facade
            .page(PageArgs {
                action: Some(ReconcilerOperation::Push),
                ..Default::default()
            })
            .await
            .unwrap();

        // Repo 4 has a changed diff too, but is hidden.
        assert_eq!(pushes.total_count, 1);
        let key = pushes.nodes[0].key();
        assert_eq!(key.repo_id, 2);
        assert_eq!(facade.stats().await.unwrap().push, 1);
    }

    #[tokio::test]
    async fn test_mismatched_batch_change_fails_request() {
        let store = seeded();
        let facade = ApplyPreviewFacade::open(
            Arc::clone(&store),
            ApplyPreviewRequest {
                batch_change_id: Some(99),
                ..request()
            },
        )
        .await
        .unwrap();

        let first = facade.stats().await;
        let second = facade.page(PageArgs::default()).await;
        assert!(matches!(first, Err(PreviewError::Reconciliation(_))));
        assert!(matches!(second, Err(PreviewError::Reconciliation(_))));
        assert_eq!(store.mapping_loads(), 0);
    }

    #[tokio::test]
    async fn test_missing_batch_spec_is_not_found() {
        let facade = ApplyPreviewFacade::open(
            seeded(),
            ApplyPreviewRequest {
                batch_spec_id: 404,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let err = facade.compute().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancelled_request_returns_cancelled() {
        let store = seeded();
        let facade = ApplyPreviewFacade::open(Arc::clone(&store), request()).await.unwrap();
        facade.cancel();

        assert!(matches!(facade.stats().await, Err(PreviewError::Cancelled)));
        assert_eq!(store.mapping_loads(), 0);
    }
}
