use crate::services::link_store::{LinkStore, LinkStoreError, NewTest, TestRecord};
use crate::services::uploads::FileUpload;

pub(crate) const DEFAULT_DURATION_MINUTES: u32 = 60;
const SESSION_PATH: &str = "/test/";

#[derive(Debug, Clone)]
pub(crate) struct CreatedTest {
    pub(crate) test: TestRecord,
    pub(crate) link: String,
}

/// Shareable link for a test: `<origin>/test/<id>`.
pub(crate) fn test_link(public_origin: &str, test_id: &str) -> String {
    format!("{}{SESSION_PATH}{test_id}", public_origin.trim_end_matches('/'))
}

/// Accepts a full link, a `/test/<id>` path or a bare id.
pub(crate) fn test_id_from_link(link: &str) -> Option<String> {
    let trimmed = link.trim();
    let without_query = trimmed.split(['?', '#']).next().unwrap_or_default();

    let candidate = match without_query.rfind(SESSION_PATH) {
        Some(index) => &without_query[index + SESSION_PATH.len()..],
        None if !without_query.contains('/') => without_query,
        None => return None,
    };
    let candidate = candidate.trim_end_matches('/');

    if candidate.is_empty() || candidate.contains('/') {
        return None;
    }
    Some(candidate.to_string())
}

pub(crate) async fn create_timed_test(
    store: &LinkStore,
    public_origin: &str,
    document: Option<FileUpload>,
    duration_minutes: u32,
    created_by: Option<String>,
) -> Result<CreatedTest, LinkStoreError> {
    let test = store.create_test(NewTest { document, duration_minutes, created_by }).await?;
    let link = test_link(public_origin, &test.id);

    tracing::info!(test_id = %test.id, link = %link, "Shareable link issued");
    Ok(CreatedTest { test, link })
}
