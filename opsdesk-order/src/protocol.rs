use chrono::NaiveDate;

use crate::session::OrderStore;
use crate::OrderError;

const SEQ_WIDTH: usize = 3;

/// Generates the daily-scoped protocol number for orders.
///
/// Format: `YYYYMMDD` + zero-padded 3-digit counter, e.g. `20260103001`.
/// Protocols are date-scoped only, not per company. The number must be
/// computed and persisted inside the same transaction that inserts the
/// owning order; the store's unique protocol constraint backstops the
/// compute-then-insert race.
///
/// The 3-digit tail caps a day at 999 orders: number 1000 would sort below
/// `...999`, so the scan keeps proposing a taken protocol and creation
/// fails on the unique constraint until the next day.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceAssigner;

impl SequenceAssigner {
    pub fn new() -> Self {
        Self
    }

    pub async fn next_protocol(
        &self,
        store: &mut dyn OrderStore,
        date: NaiveDate,
    ) -> Result<String, OrderError> {
        let prefix = date.format("%Y%m%d").to_string();

        // A malformed tail restarts the day's counter at 1, matching the
        // lenient parse of the data this scheme inherited.
        let sequence = match store.latest_protocol(&prefix).await? {
            Some(latest) => latest
                .get(latest.len().saturating_sub(SEQ_WIDTH)..)
                .and_then(|tail| tail.parse::<u32>().ok())
                .unwrap_or(0)
                .saturating_add(1),
            None => 1,
        };

        Ok(format!("{}{:03}", prefix, sequence))
    }
}
