//! DataStore area - persisted counter with change notification

pub mod counter;
pub mod preferences;

pub use counter::{CounterStore, CounterSubscription};
pub use preferences::PreferencesStore;

/// Unique scratch directory for tests that touch the filesystem
#[cfg(test)]
pub(crate) fn scratch_dir(tag: &str) -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("devicelab-{}-{}-{}", tag, std::process::id(), nanos))
}
