use crate::models::{SubscriberObservation, ERROR_CHANNEL_NAME};
use crate::utils::fmt_signed;
use tracing::debug;

/// Change between the two most recent observations of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberDiff {
    pub channel_name: String,
    pub diff: i64,
    /// The latest value looks like a failed lookup rather than a real change.
    pub suspect: bool,
}

impl SubscriberDiff {
    pub fn line(&self) -> String {
        format!(
            "{}\t{}{}",
            self.channel_name,
            fmt_signed(self.diff),
            if self.suspect { " (suspect)" } else { "" }
        )
    }
}

/// Diff one channel's log. `None` with fewer than two rows or no change.
pub fn diff_log(log: &[SubscriberObservation]) -> Option<SubscriberDiff> {
    let mut rows: Vec<&SubscriberObservation> = log.iter().collect();
    rows.sort_by_key(|o| o.observed_at);

    let [.., prev, latest] = rows.as_slice() else {
        return None;
    };
    let diff = latest.subscriber_count as i64 - prev.subscriber_count as i64;
    if diff == 0 {
        return None;
    }

    let errored = latest.channel_name == ERROR_CHANNEL_NAME;
    let collapsed = latest.subscriber_count == 0 && prev.subscriber_count != 0;
    let channel_name = if errored {
        prev.channel_name.clone()
    } else {
        latest.channel_name.clone()
    };

    Some(SubscriberDiff {
        channel_name,
        diff,
        suspect: errored || collapsed,
    })
}

/// Diffs for every log that changed, in log order.
pub fn subscriber_diffs(logs: &[(String, Vec<SubscriberObservation>)]) -> Vec<SubscriberDiff> {
    logs.iter()
        .filter_map(|(stem, log)| {
            let diff = diff_log(log);
            if diff.is_none() {
                debug!("{}: no change ({} rows)", stem, log.len());
            }
            diff
        })
        .collect()
}
