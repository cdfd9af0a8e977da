//! Filtered, paginated entity lists

use super::{CallsFilter, ListParams, Page, ReviewsFilter};
use crate::errors::Result;
use crate::models::{
    BusinessRecord, CallRecord, KnowledgeDocument, PlanRecord, ReviewRow, ReviewWire,
    SubscriptionRow, SubscriptionWire,
};
use crate::store::{tables, DataStore, Embed, Query};
use tracing::warn;

const BUSINESS_SEARCH_COLUMNS: &[&str] = &["business_name", "email", "category"];
const CALL_SEARCH_COLUMNS: &[&str] = &["caller_name", "caller_phone", "summary"];
const REVIEW_SEARCH_COLUMNS: &[&str] = &["reviewer_name", "review_text"];

pub async fn list_businesses(
    store: &dyn DataStore,
    params: &ListParams,
) -> Result<Page<BusinessRecord>> {
    let query = params.apply(
        Query::from(tables::BUSINESSES)
            .is_in("subscription_status", &params.status)
            .search(BUSINESS_SEARCH_COLUMNS, params.search_term())
            .order("created_at", false),
    );
    Page::decode(store.select(&query).await?)
}

pub async fn list_calls(store: &dyn DataStore, filter: &CallsFilter) -> Result<Page<CallRecord>> {
    let params = &filter.list;
    let query = params.apply(
        Query::from(tables::CALLS)
            .is_in("status", &params.status)
            .is_in("category", &filter.category)
            .search(CALL_SEARCH_COLUMNS, params.search_term())
            .order("created_at", false),
    );
    Page::decode(store.select(&query).await?)
}

pub async fn list_reviews(store: &dyn DataStore, filter: &ReviewsFilter) -> Result<Page<ReviewRow>> {
    let params = &filter.list;
    let query = params.apply(
        Query::from(tables::REVIEWS)
            .embed(Embed::new(tables::BUSINESSES).columns(&["business_name"]))
            .is_in("rating", &filter.rating)
            .is_in("source", &filter.source)
            .search(REVIEW_SEARCH_COLUMNS, params.search_term())
            .order("created_at", false),
    );
    let page: Page<ReviewWire> = Page::decode(store.select(&query).await?)?;
    Ok(page.map(ReviewRow::from))
}

/// Subscriptions with their plan; free-text search does not apply here
pub async fn list_subscriptions(
    store: &dyn DataStore,
    params: &ListParams,
) -> Result<Page<SubscriptionRow>> {
    let query = params.apply(
        Query::from(tables::SUBSCRIPTIONS)
            .embed(Embed::new(tables::PLANS).columns(&["name", "price_amount", "interval"]))
            .is_in("status", &params.status)
            .order("created_at", false),
    );
    let page: Page<SubscriptionWire> = Page::decode(store.select(&query).await?)?;
    Ok(page.map(SubscriptionRow::from))
}

/// Plan catalog, cheapest first
pub async fn list_plans(store: &dyn DataStore) -> Result<Vec<PlanRecord>> {
    let query = Query::from(tables::PLANS).order("price_amount", true);
    store.select(&query).await?.decode()
}

/// Uploaded knowledge documents, newest first
///
/// The table is optional in some deployments; any failure yields an empty list.
pub async fn knowledge_documents(store: &dyn DataStore) -> Vec<KnowledgeDocument> {
    let query = Query::from(tables::KNOWLEDGE_DOCUMENTS).order("uploaded_at", false);
    match store
        .select(&query)
        .await
        .and_then(|response| response.decode())
    {
        Ok(documents) => documents,
        Err(e) => {
            warn!(error = %e, "Knowledge documents unavailable");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::store::InMemoryStore;

    async fn all_calls(store: &InMemoryStore) -> Vec<CallRecord> {
        let filter = CallsFilter {
            list: ListParams::page(1, 100),
            ..CallsFilter::default()
        };
        list_calls(store, &filter).await.unwrap().rows
    }

    #[tokio::test]
    async fn test_total_is_independent_of_page() {
        let store = fixtures::demo_store().await;
        let mut totals = Vec::new();
        for page in 1..=4 {
            let filter = CallsFilter {
                list: ListParams::page(page, 4),
                ..CallsFilter::default()
            };
            let result = list_calls(&store, &filter).await.unwrap();
            assert!(result.rows.len() <= 4);
            totals.push(result.total);
        }
        assert!(totals.iter().all(|t| *t == fixtures::CALL_COUNT));
    }

    #[tokio::test]
    async fn test_page_window_matches_offset() {
        let store = fixtures::demo_store().await;
        let everything = all_calls(&store).await;

        let filter = CallsFilter {
            list: ListParams::page(2, 5),
            ..CallsFilter::default()
        };
        let page = list_calls(&store, &filter).await.unwrap();
        let ids: Vec<&str> = page.rows.iter().map(|c| c.id.as_str()).collect();
        let expected: Vec<&str> = everything[5..10].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, expected);

        // newest first
        assert!(everything
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[tokio::test]
    async fn test_status_is_set_membership() {
        let store = fixtures::demo_store().await;
        let params = ListParams::page(1, 100).with_status(["active", "trialing"]);
        let page = list_businesses(&store, &params).await.unwrap();

        assert_eq!(page.total, 4);
        for business in &page.rows {
            let status = business.subscription_status.as_deref().unwrap_or_default();
            assert!(status == "active" || status == "trialing", "got {status}");
        }
    }

    #[tokio::test]
    async fn test_call_search_and_category() {
        let store = fixtures::demo_store().await;
        let filter = CallsFilter {
            list: ListParams::page(1, 10).with_search("SMITH"),
            ..CallsFilter::default()
        };
        let page = list_calls(&store, &filter).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].caller_name.as_deref(), Some("Mary Smith"));

        let filter = CallsFilter {
            list: ListParams::page(1, 100).with_status(["missed"]),
            category: vec!["booking".into()],
        };
        let page = list_calls(&store, &filter).await.unwrap();
        assert!(page.total > 0);
        assert!(page.rows.iter().all(|c| c.status.as_deref() == Some("missed")
            && c.category.as_deref() == Some("booking")));
    }

    #[tokio::test]
    async fn test_reviews_carry_business_name() {
        let store = fixtures::demo_store().await;
        let filter = ReviewsFilter {
            rating: vec![5],
            ..ReviewsFilter::default()
        };
        let page = list_reviews(&store, &filter).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.rows.iter().all(|r| r.review.rating == 5));
        assert!(page.rows.iter().all(|r| r.business_name.is_some()));
    }

    #[tokio::test]
    async fn test_subscriptions_and_plans() {
        let store = fixtures::demo_store().await;
        let page = list_subscriptions(&store, &ListParams::default().with_status(["active"]))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(
            page.rows[0].plan.as_ref().and_then(|p| p.name.as_deref()),
            Some("Pro")
        );

        let plans = list_plans(&store).await.unwrap();
        assert!(plans
            .windows(2)
            .all(|pair| pair[0].price_amount <= pair[1].price_amount));
    }

    #[tokio::test]
    async fn test_unknown_column_is_a_query_error() {
        let store = fixtures::demo_store().await;
        let query = Query::from(tables::CALLS).is_in("mood", &["happy"]);
        let err = store.select(&query).await.unwrap_err();
        assert!(matches!(err, crate::errors::AppError::Query { .. }));
    }
}
