//! Upsert-by-video-id merge of freshly fetched statistics into a channel's
//! persisted table.
//!
//! The merge is whole-row: when a video id is present on both sides the newly
//! fetched row replaces the stored one, including the channel snapshot
//! columns. Videos removed upstream are never dropped.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::models::{Channel, FetchedVideo, StatisticsTable, SubscriberObservation, VideoRecord};

/// Outcome of reconciling one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub table: StatisticsTable,
    pub observation: SubscriberObservation,
    pub inserted: usize,
    pub updated: usize,
}

/// Concatenate `existing` and `fresh`, keeping the last row per video id.
///
/// Survivors stay in concatenation order; nothing is re-sorted, so callers
/// pass `fresh` already ordered by publish time.
pub fn merge_rows(existing: Vec<VideoRecord>, fresh: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut rows = existing;
    rows.extend(fresh);

    let mut last_index: HashMap<&str, usize> = HashMap::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        last_index.insert(row.video_id.as_str(), i);
    }
    let keep: Vec<bool> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| last_index.get(row.video_id.as_str()) == Some(&i))
        .collect();

    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}

/// Merge a channel's fresh fetch into its table and produce the run's
/// subscriber observation.
pub fn reconcile(
    existing: StatisticsTable,
    channel: &Channel,
    fresh: Vec<FetchedVideo>,
    observed_at: NaiveDateTime,
) -> Reconciled {
    let known: HashSet<&str> = existing.rows.iter().map(|r| r.video_id.as_str()).collect();
    let fresh_ids: HashSet<&str> = fresh.iter().map(|v| v.video_id.as_str()).collect();
    let updated = fresh_ids.iter().filter(|id| known.contains(*id)).count();
    let inserted = fresh_ids.len() - updated;

    let stamped: Vec<VideoRecord> = fresh
        .into_iter()
        .map(|video| VideoRecord::stamped(channel, video))
        .collect();

    let rows = merge_rows(existing.rows, stamped);
    debug!(
        "{}: {} rows ({} new, {} refreshed)",
        channel.id,
        rows.len(),
        inserted,
        updated
    );

    Reconciled {
        table: StatisticsTable::new(rows),
        observation: SubscriberObservation::of(channel, observed_at),
        inserted,
        updated,
    }
}
