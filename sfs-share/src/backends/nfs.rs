//! NFS share backend.
//!
//! Export locations look like `<server>:<path>`, e.g. `10.0.0.5:/share1`.
//! The split always happens at the last colon, so an IPv6 literal server
//! is not supported.

use tracing::debug;

use super::traits::{BuildSourceArgs, ShareBackend};
use crate::error::{Result, ShareError};
use crate::types::{NfsVolumeSource, VolumeSource};

/// Protocol name served by [`NfsBackend`].
pub const NFS_PROTOCOL: &str = "NFS";

/// NFS backend. Always produces read-write mounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NfsBackend;

impl NfsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ShareBackend for NfsBackend {
    fn name(&self) -> &str {
        NFS_PROTOCOL
    }

    fn build_source(&self, args: &BuildSourceArgs) -> Result<VolumeSource> {
        let (server, path) = split_export_location(&args.location)?;
        debug!(server = %server, path = %path, "Parsed NFS export location");

        Ok(VolumeSource::Nfs(NfsVolumeSource {
            server: server.to_string(),
            path: path.to_string(),
            read_only: false,
        }))
    }
}

/// Split `location` at its last colon into `(server, path)`.
///
/// Fails when there is no colon or the server part would be empty.
pub fn split_export_location(location: &str) -> Result<(&str, &str)> {
    match location.rfind(':') {
        Some(pos) if pos > 0 => Ok((&location[..pos], &location[pos + 1..])),
        _ => Err(ShareError::MalformedLocation(location.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nfs(location: &str) -> Result<NfsVolumeSource> {
        NfsBackend::new()
            .build_source(&BuildSourceArgs::new(location))
            .map(|source| match source {
                VolumeSource::Nfs(nfs) => nfs,
            })
    }

    #[test]
    fn test_build_source() {
        let source = nfs("10.0.0.5:/share1").unwrap();
        assert_eq!(source.server, "10.0.0.5");
        assert_eq!(source.path, "/share1");
        assert!(!source.read_only);
    }

    #[test]
    fn test_splits_on_last_colon() {
        let source = nfs("fe80::1:/exports/a").unwrap();
        assert_eq!(source.server, "fe80::1");
        assert_eq!(source.path, "/exports/a");

        let source = nfs("host:/a:b").unwrap();
        assert_eq!(source.server, "host:/a");
        assert_eq!(source.path, "b");
    }

    #[test]
    fn test_malformed_locations() {
        for location in ["", "no-colon-here", ":/share1", ":"] {
            let err = nfs(location).unwrap_err();
            assert!(
                matches!(err, ShareError::MalformedLocation(ref l) if l == location),
                "expected MalformedLocation for {:?}",
                location
            );
        }
    }

    #[test]
    fn test_empty_path_is_accepted() {
        let source = nfs("server:").unwrap();
        assert_eq!(source.server, "server");
        assert_eq!(source.path, "");
    }

    #[test]
    fn test_backend_name() {
        assert_eq!(NfsBackend::new().name(), "NFS");
    }
}
