use stevedore_fetch::FetchError;

/// What is being downloaded. Drives retry budget, health and deletion checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    ApplicationPackage,
    ServicePackage,
    ServiceManifest,
    PlatformUpgrade,
}

/// Behavioral switches of an [`ArtifactKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// A missing package may mean its application was deleted; ask before retrying.
    pub checks_deletion: bool,
    pub reports_health:  bool,
    /// Folder and link setup runs after a successful fetch.
    pub provisions:      bool,
}

impl ArtifactKind {
    pub fn capabilities(self) -> Capabilities {
        match self {
            ArtifactKind::ApplicationPackage | ArtifactKind::ServicePackage => Capabilities {
                checks_deletion: true,
                reports_health:  true,
                provisions:      true,
            },
            ArtifactKind::ServiceManifest => Capabilities {
                checks_deletion: false,
                reports_health:  false,
                provisions:      false,
            },
            ArtifactKind::PlatformUpgrade => Capabilities {
                checks_deletion: false,
                reports_health:  true,
                provisions:      false,
            },
        }
    }

    /// Errors that end the download at once instead of being retried.
    pub fn is_terminal_error(self, error: &FetchError) -> bool {
        match self {
            ArtifactKind::ServiceManifest => matches!(
                error,
                FetchError::NotFound { .. }
                    | FetchError::ManifestNotFound { .. }
                    | FetchError::PreDeploymentNotAllowed
                    | FetchError::InvalidSharingPolicy { .. }
            ),
            _ => false,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::ApplicationPackage => write!(f, "ApplicationPackage"),
            ArtifactKind::ServicePackage => write!(f, "ServicePackage"),
            ArtifactKind::ServiceManifest => write!(f, "ServiceManifest"),
            ArtifactKind::PlatformUpgrade => write!(f, "PlatformUpgrade"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_upgrade_never_checks_deletion() {
        assert!(!ArtifactKind::PlatformUpgrade.capabilities().checks_deletion);
        assert!(ArtifactKind::ApplicationPackage.capabilities().checks_deletion);
        assert!(ArtifactKind::ServicePackage.capabilities().checks_deletion);
    }

    #[test]
    fn test_service_manifest_terminal_errors() {
        let not_found = FetchError::NotFound { path: "m.xml".into() };
        assert!(ArtifactKind::ServiceManifest.is_terminal_error(&not_found));
        assert!(ArtifactKind::ServiceManifest.is_terminal_error(&FetchError::PreDeploymentNotAllowed));
        assert!(!ArtifactKind::ServiceManifest.is_terminal_error(&FetchError::Other("x".into())));
        assert!(!ArtifactKind::ServicePackage.is_terminal_error(&not_found));
        assert!(!ArtifactKind::ServiceManifest.capabilities().reports_health);
    }
}
