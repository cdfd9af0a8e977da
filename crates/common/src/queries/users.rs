//! User list fan-out and the composite user detail

use super::{ListParams, Page};
use crate::errors::{AppError, Result};
use crate::models::{
    BusinessRecord, CallRecord, InvoiceRecord, OneOrMany, PlanRecord, Profile, ProfileWire,
    SubscriptionDetail, SubscriptionRecord, UsageStats, UserDetail, UserSubscriptionWire,
    UserSummary,
};
use crate::store::{tables, DataStore, Embed, Query};
use futures::future::try_join_all;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Recent calls shown in the user detail; also bounds the duration sum
pub const RECENT_CALLS_CAP: u64 = 10;
pub const RECENT_INVOICES_CAP: u64 = 5;

const USER_SEARCH_COLUMNS: &[&str] = &["full_name", "contact_phone"];

/// One page of users
///
/// The page of profiles comes first. Subscriptions for the ids on that page
/// are then read with one `in` query, and calls are counted per user with an
/// exact head count, so a max-rows cap on the store cannot truncate them.
pub async fn list_users(store: &dyn DataStore, params: &ListParams) -> Result<Page<UserSummary>> {
    let business = Embed::new(tables::BUSINESSES).columns(&[
        "business_name",
        "subscription_status",
        "category",
        "created_at",
    ]);
    // the status filter must drop profiles, not just their embedded rows
    let business = if params.status.is_empty() {
        business
    } else {
        business.inner()
    };

    let query = params.apply(
        Query::from(tables::PROFILES)
            .embed(business)
            .is_in("businesses.subscription_status", &params.status)
            .search(USER_SEARCH_COLUMNS, params.search_term())
            .order("created_at", false),
    );

    let page: Page<ProfileWire> = Page::decode(store.select(&query).await?)?;
    if page.rows.is_empty() {
        return Ok(Page {
            rows: Vec::new(),
            total: page.total,
        });
    }

    let ids: Vec<String> = page
        .rows
        .iter()
        .map(|wire| wire.profile.user_id.clone())
        .collect();

    let subscriptions_query = Query::from(tables::SUBSCRIPTIONS)
        .select(&["user_id", "status"])
        .embed(Embed::new(tables::PLANS).columns(&["name", "price_amount", "interval"]))
        .is_in("user_id", &ids)
        .order("created_at", false);
    let call_counts = try_join_all(ids.iter().map(|user_id| {
        let query = Query::from(tables::CALLS).eq("user_id", user_id.as_str()).head();
        async move { Ok::<_, AppError>(store.select(&query).await?.count.unwrap_or(0)) }
    }));

    let (subscriptions, call_counts) =
        tokio::try_join!(store.select(&subscriptions_query), call_counts)?;

    // newest first, so the first row per user is the current subscription
    let mut subscription_by_user: HashMap<String, UserSubscriptionWire> = HashMap::new();
    for subscription in subscriptions.decode::<UserSubscriptionWire>()? {
        subscription_by_user
            .entry(subscription.user_id.clone())
            .or_insert(subscription);
    }

    let calls_by_user: HashMap<&str, u64> = ids
        .iter()
        .map(String::as_str)
        .zip(call_counts)
        .collect();

    debug!(
        users = ids.len(),
        subscriptions = subscription_by_user.len(),
        "Merged user list fan-out"
    );

    Ok(page.map(|wire| {
        let user_id = wire.profile.user_id.clone();
        let business = wire.businesses.and_then(OneOrMany::into_first);
        let (status, plan) = match subscription_by_user.remove(&user_id) {
            Some(subscription) => (
                subscription.status,
                subscription.plans.and_then(OneOrMany::into_first),
            ),
            None => (None, None),
        };
        let total_calls = calls_by_user.get(user_id.as_str()).copied().unwrap_or(0);
        UserSummary::assemble(wire.profile, business, status, plan, total_calls)
    }))
}

#[derive(Deserialize)]
struct SubscriptionDetailWire {
    #[serde(flatten)]
    subscription: SubscriptionRecord,

    #[serde(default)]
    plans: Option<OneOrMany<PlanRecord>>,
}

/// Log and drop a failed secondary read of the user detail
fn degrade<T>(part: &str, user_id: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(user_id, part, error = %e, "User detail part unavailable");
            None
        }
    }
}

/// Everything the user drawer shows, in one object
///
/// A missing profile is `NotFound`. A missing or unreadable business,
/// subscription or invoice list is reported as absent. Call reads are
/// required.
pub async fn user_detail(store: &dyn DataStore, user_id: &str) -> Result<UserDetail> {
    let profile_query = Query::from(tables::PROFILES).eq("user_id", user_id).limit(1);
    let profile: Profile = store
        .select(&profile_query)
        .await?
        .decode::<Profile>()?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("user", user_id))?;

    let business_query = Query::from(tables::BUSINESSES)
        .eq("user_id", user_id)
        .order("created_at", false)
        .limit(1);
    let subscription_query = Query::from(tables::SUBSCRIPTIONS)
        .embed(Embed::new(tables::PLANS))
        .eq("user_id", user_id)
        .order("created_at", false)
        .limit(1);
    let calls_query = Query::from(tables::CALLS)
        .eq("user_id", user_id)
        .order("created_at", false)
        .limit(RECENT_CALLS_CAP)
        .count_exact();
    let invoices_query = Query::from(tables::INVOICES)
        .eq("user_id", user_id)
        .order("created_at", false)
        .limit(RECENT_INVOICES_CAP);

    let (business, subscription, calls, invoices) = tokio::join!(
        store.select(&business_query),
        store.select(&subscription_query),
        store.select(&calls_query),
        store.select(&invoices_query),
    );

    let business = degrade(
        "business",
        user_id,
        business.and_then(|r| r.decode::<BusinessRecord>()),
    )
    .and_then(|rows| rows.into_iter().next());

    let subscription = degrade(
        "subscription",
        user_id,
        subscription.and_then(|r| r.decode::<SubscriptionDetailWire>()),
    )
    .and_then(|rows| rows.into_iter().next())
    .map(|wire| SubscriptionDetail {
        subscription: wire.subscription,
        plan: wire.plans.and_then(OneOrMany::into_first),
    });

    let invoices = degrade(
        "invoices",
        user_id,
        invoices.and_then(|r| r.decode::<InvoiceRecord>()),
    )
    .unwrap_or_default();

    let calls = calls?;
    let exact_calls = calls.count;
    let recent_calls: Vec<CallRecord> = calls.decode()?;

    // sums only the capped recent calls, not the lifetime total
    let total_duration_seconds = recent_calls.iter().map(|c| c.duration_seconds).sum();

    Ok(UserDetail {
        id: profile.user_id,
        full_name: profile
            .full_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "N/A".to_string()),
        phone: profile.contact_phone.unwrap_or_default(),
        avatar_url: profile.avatar_url,
        timezone: profile.timezone,
        created_at: profile.created_at,
        business,
        subscription,
        usage: UsageStats {
            total_calls: exact_calls.unwrap_or(recent_calls.len() as u64),
            total_duration_seconds,
            recent_calls,
        },
        invoices,
    })
}
