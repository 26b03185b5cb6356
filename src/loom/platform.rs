use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

thread_local! {
    static THREAD_HASH: usize = {
        let mut hasher = FxHasher::default();
        std::thread::current().id().hash(&mut hasher);
        hasher.finish() as usize
    };
}

/// Number of partial slots a parallel reduction spreads its updates over.
pub fn shard_count() -> usize {
    let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
    (2 * threads).next_power_of_two()
}

/// Picks the partial slot of the calling thread among `count`.
#[inline]
pub fn shard(count: usize) -> usize {
    THREAD_HASH.with(|&hash| hash % count.max(1))
}

/// Installs a global `tracing` subscriber that forwards launch spans to Tracy.
#[cfg(feature = "trace")]
pub fn init_trace() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    use tracing_subscriber::layer::SubscriberExt;

    let subscriber = tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default());
    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::{shard, shard_count};

    #[test]
    fn test_shard_is_stable() {
        let count = shard_count();
        assert!(count.is_power_of_two());
        let first = shard(count);
        assert!(first < count);
        assert_eq!(shard(count), first);
        assert_eq!(shard(1), 0);
    }
}
