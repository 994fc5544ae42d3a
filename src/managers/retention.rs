//! Retention policy: which aged backups to delete

const SECONDS_PER_DAY: i64 = 86_400;

/// Anything with an embedded capture time
pub trait Timestamped {
    fn timestamp(&self) -> i64;
}

impl Timestamped for super::naming::BackupName {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Backups to delete, oldest first
///
/// Nothing is selected while `backups.len() <= minimum_keeping`. Otherwise
/// the oldest backups older than `lifetime_days` are selected, at most
/// `len - minimum_keeping` of them. Age comes from the embedded timestamp.
pub fn select_expired<T: Timestamped + Clone>(
    backups: &[T],
    lifetime_days: u32,
    minimum_keeping: u32,
    now: i64,
) -> Vec<T> {
    let minimum_keeping = minimum_keeping as usize;
    if backups.len() <= minimum_keeping {
        return Vec::new();
    }

    let mut sorted = backups.to_vec();
    sorted.sort_by_key(Timestamped::timestamp);

    let max_age = i64::from(lifetime_days) * SECONDS_PER_DAY;
    let deletable = backups.len() - minimum_keeping;

    sorted
        .into_iter()
        .take_while(|backup| now - backup.timestamp() > max_age)
        .take(deletable)
        .collect()
}
