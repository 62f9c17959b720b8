//! Grouping collected items into per-bucket category and keyword counts.
//!
//! Runs only after the completion barrier has fired for a job, so no
//! concurrent writer touches the same snapshot keys. Matching is a
//! case-insensitive whole-token comparison of wordbag keywords against the
//! item content; an item matching several keywords contributes one count
//! per match, and items matching nothing drop out entirely.

use std::collections::{HashMap, HashSet};

use spikewatch_core::{
    CategoryKey, CategorySnapshot, CollectedItem, KeywordSnapshot, TimeBucket, WordbagFile,
};

use crate::stores::SnapshotStore;
use crate::PipelineError;

/// Tokens shorter than this carry no keyword signal.
const MIN_TOKEN_LEN: usize = 2;

/// The aggregated counts for one job, ready to persist.
#[derive(Debug, Default)]
pub struct BucketCounts {
    pub categories: Vec<CategorySnapshot>,
    pub keywords: Vec<KeywordSnapshot>,
}

fn tokenize(content: &str) -> HashSet<String> {
    content
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Maps items against the wordbag and groups matches into per-bucket
/// category and keyword counts.
///
/// Buckets derive from each item's observed timestamp. Output order is
/// deterministic (sorted by key then bucket) so repeated aggregation of the
/// same input persists identical rows.
#[must_use]
pub fn count_mentions(
    items: &[CollectedItem],
    wordbag: &WordbagFile,
    bucket_width_minutes: u32,
) -> BucketCounts {
    let entries: Vec<(&str, String)> = wordbag.entries().collect();

    let mut category_counts: HashMap<(CategoryKey, TimeBucket), u64> = HashMap::new();
    let mut keyword_counts: HashMap<(CategoryKey, String, TimeBucket), u64> = HashMap::new();

    for item in items {
        let tokens = tokenize(&item.content);
        if tokens.is_empty() {
            continue;
        }
        let bucket = TimeBucket::containing(item.observed_timestamp, bucket_width_minutes);

        for (category, keyword) in &entries {
            if !tokens.contains(keyword) {
                continue;
            }
            let key = CategoryKey {
                channel: item.channel.clone(),
                query: item.query.clone(),
                category: (*category).to_string(),
            };
            *category_counts.entry((key.clone(), bucket)).or_insert(0) += 1;
            *keyword_counts
                .entry((key, keyword.clone(), bucket))
                .or_insert(0) += 1;
        }
    }

    let mut categories: Vec<CategorySnapshot> = category_counts
        .iter()
        .map(|((key, bucket), count)| CategorySnapshot {
            key: key.clone(),
            bucket: *bucket,
            count: *count,
        })
        .collect();
    categories.sort_by(|a, b| {
        (&a.key.channel, &a.key.query, &a.key.category, a.bucket).cmp(&(
            &b.key.channel,
            &b.key.query,
            &b.key.category,
            b.bucket,
        ))
    });

    let mut keywords: Vec<KeywordSnapshot> = keyword_counts
        .into_iter()
        .map(|((key, keyword, bucket), count_keyword)| {
            let count_category = category_counts
                .get(&(key.clone(), bucket))
                .copied()
                .unwrap_or(0);
            KeywordSnapshot {
                key,
                keyword,
                bucket,
                count_keyword,
                count_category,
            }
        })
        .collect();
    keywords.sort_by(|a, b| {
        (
            &a.key.channel,
            &a.key.query,
            &a.key.category,
            &a.keyword,
            a.bucket,
        )
            .cmp(&(
                &b.key.channel,
                &b.key.query,
                &b.key.category,
                &b.keyword,
                b.bucket,
            ))
    });

    BucketCounts {
        categories,
        keywords,
    }
}

/// Persists aggregated counts through the snapshot store (idempotent
/// upserts).
///
/// # Errors
///
/// Returns [`PipelineError`] if any upsert fails.
pub async fn persist_counts<S: SnapshotStore + ?Sized>(
    store: &S,
    counts: &BucketCounts,
) -> Result<(), PipelineError> {
    for snapshot in &counts.categories {
        store.put_category(snapshot).await?;
    }
    for snapshot in &counts.keywords {
        store.put_keyword(snapshot).await?;
    }
    tracing::info!(
        categories = counts.categories.len(),
        keywords = counts.keywords.len(),
        "persisted bucket counts"
    );
    Ok(())
}
