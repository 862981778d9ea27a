use std::path::{Path, PathBuf};

/// One piece of content to bring from the store onto the node.
///
/// # Examples
///
/// ```
/// use stevedore_fetch::FetchRequest;
///
/// let request = FetchRequest::new("App1Type/App1Type.Code.1.0", "/run/App1Type_App1/Code.1.0")
///     .checksum_source("App1Type/App1Type.Code.1.0.checksum")
///     .check_archive(true);
/// assert!(request.expected_checksum.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Location relative to the store root.
    pub source: PathBuf,

    /// Where the content ends up on the node. Ignored when `cache_only` is set.
    pub destination: PathBuf,

    /// Store-relative file holding the expected checksum.
    ///
    /// Consulted only when `expected_checksum` is absent.
    pub checksum_source: Option<PathBuf>,

    /// Expected lowercase hex SHA-256 content digest.
    pub expected_checksum: Option<String>,

    /// Re-copy from the store even when the cache already holds the content.
    ///
    /// Default: false
    pub refresh_cache: bool,

    /// Stop after populating the cache.
    ///
    /// Default: false
    pub cache_only: bool,

    /// Accept `<source>.tar.gz` when `source` itself is absent.
    ///
    /// Default: false
    pub check_archive: bool,
}

impl FetchRequest {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source:            source.into(),
            destination:       destination.into(),
            checksum_source:   None,
            expected_checksum: None,
            refresh_cache:     false,
            cache_only:        false,
            check_archive:     false,
        }
    }

    #[must_use]
    pub fn checksum_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.checksum_source = Some(path.into());
        self
    }

    #[must_use]
    pub fn expected_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.expected_checksum = Some(checksum.into());
        self
    }

    #[must_use]
    pub fn refresh_cache(mut self, refresh: bool) -> Self {
        self.refresh_cache = refresh;
        self
    }

    #[must_use]
    pub fn cache_only(mut self, cache_only: bool) -> Self {
        self.cache_only = cache_only;
        self
    }

    #[must_use]
    pub fn check_archive(mut self, check: bool) -> Self {
        self.check_archive = check;
        self
    }

    pub fn source(&self) -> &Path { &self.source }

    pub fn destination(&self) -> &Path { &self.destination }
}
