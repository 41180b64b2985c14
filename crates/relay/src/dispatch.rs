//! Size-based choice between the single-shot and chunked paths.

use crate::types::TransferDescriptor;

/// Files at or above this size go through the chunked path: 95 MiB.
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 95 * 1024 * 1024;

/// Upload path for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SingleShot,
    Chunked,
}

/// Picks the route from the descriptor's declared length.
pub fn dispatch(descriptor: &TransferDescriptor, threshold: u64) -> Route {
    dispatch_length(None, descriptor.declared_length, threshold)
}

/// Picks the route from the best known length.
///
/// A measured length (the source's `Content-Length`) wins over the declared
/// one. With neither known the file always goes single-shot.
pub fn dispatch_length(measured: Option<u64>, declared: u64, threshold: u64) -> Route {
    let known = measured
        .filter(|&len| len > 0)
        .or((declared > 0).then_some(declared));
    match known {
        Some(len) if len >= threshold => Route::Chunked,
        _ => Route::SingleShot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn unknown_length_goes_single_shot() {
        assert_eq!(dispatch_length(None, 0, DEFAULT_CHUNK_THRESHOLD), Route::SingleShot);
        assert_eq!(dispatch_length(Some(0), 0, 1), Route::SingleShot);
    }

    #[test]
    fn threshold_is_inclusive() {
        let t = DEFAULT_CHUNK_THRESHOLD;
        assert_eq!(dispatch_length(None, t - 1, t), Route::SingleShot);
        assert_eq!(dispatch_length(None, t, t), Route::Chunked);
        assert_eq!(dispatch_length(None, 300 * MIB, t), Route::Chunked);
    }

    #[test]
    fn measured_length_wins() {
        let t = DEFAULT_CHUNK_THRESHOLD;
        assert_eq!(dispatch_length(Some(10 * MIB), 500 * MIB, t), Route::SingleShot);
        assert_eq!(dispatch_length(Some(200 * MIB), 1, t), Route::Chunked);
        assert_eq!(dispatch_length(Some(0), 200 * MIB, t), Route::Chunked);
    }

    #[test]
    fn dispatch_uses_declared_length() {
        let d = TransferDescriptor::new("https://cdn.example/a", "a", "https://files.example", "t");
        assert_eq!(dispatch(&d, DEFAULT_CHUNK_THRESHOLD), Route::SingleShot);
        let d = d.with_declared_length(DEFAULT_CHUNK_THRESHOLD);
        assert_eq!(dispatch(&d, DEFAULT_CHUNK_THRESHOLD), Route::Chunked);
    }
}
