//! Identities of deployed entities and the download keys derived from them.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

const SYSTEM_TYPE_NAME: &str = "__FabricSystem";
const SYSTEM_NUMBER: u64 = u32::MAX as u64;

/// Owner name of downloads made on behalf of the platform itself.
pub const SYSTEM_APPLICATION_NAME: &str = "fabric:/System";

/// An application instance on the cluster, rendered `"{type_name}_App{number}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct ApplicationId {
    pub type_name: String,
    pub number:    u64,
}

impl ApplicationId {
    pub fn new(type_name: impl Into<String>, number: u64) -> Self {
        Self {
            type_name: type_name.into(),
            number,
        }
    }

    /// The platform's own application. It owns upgrades and is never provisioned.
    pub fn system() -> Self { Self::new(SYSTEM_TYPE_NAME, SYSTEM_NUMBER) }

    pub fn is_system(&self) -> bool { self.type_name == SYSTEM_TYPE_NAME && self.number == SYSTEM_NUMBER }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}_App{}", self.type_name, self.number) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid application id '{0}', expected '<type>_App<number>'")]
pub struct ParseApplicationIdError(pub String);

impl FromStr for ApplicationId {
    type Err = ParseApplicationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_name, number) = s
            .rsplit_once("_App")
            .ok_or_else(|| ParseApplicationIdError(s.to_string()))?;
        if type_name.is_empty() {
            return Err(ParseApplicationIdError(s.to_string()));
        }
        let number = number.parse().map_err(|_| ParseApplicationIdError(s.to_string()))?;
        Ok(Self::new(type_name, number))
    }
}

impl TryFrom<String> for ApplicationId {
    type Error = ParseApplicationIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

/// A service package of one application, rendered `"{application}:{name}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServicePackageId {
    pub application_id: ApplicationId,
    pub name:           String,
}

impl ServicePackageId {
    pub fn new(application_id: ApplicationId, name: impl Into<String>) -> Self {
        Self {
            application_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for ServicePackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}:{}", self.application_id, self.name) }
}

/// Identity of one logical download target.
///
/// Each artifact kind has its own constructor and format, so keys of
/// different kinds never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadKey(String);

impl DownloadKey {
    pub fn application(application_id: &ApplicationId, version: &str) -> Self {
        Self(format!("Download:{application_id}:{version}"))
    }

    pub fn service_package(package: &ServicePackageId, version: &str) -> Self {
        Self(format!("Download:{package}:{version}"))
    }

    pub fn platform(version: &str) -> Self { Self(format!("Download:{version}")) }

    pub fn service_manifest(type_name: &str, type_version: &str, manifest_name: &str) -> Self {
        Self(format!("Download:{type_name}:{type_version}:{manifest_name}"))
    }

    /// A key taken verbatim, for callers that compose their own requests.
    pub fn from_raw(key: impl Into<String>) -> Self { Self(key.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DownloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for DownloadKey {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Health property of application and service package downloads.
pub fn download_health_property(version: &str) -> String { format!("Download:{version}") }

/// Health property of platform upgrade downloads.
pub fn platform_health_property(version: &str) -> String { format!("FabricDownload:{version}") }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_id_round_trip() {
        let id: ApplicationId = "CalcType_App12".parse().unwrap();
        assert_eq!(id, ApplicationId::new("CalcType", 12));
        assert_eq!(id.to_string(), "CalcType_App12");
    }

    #[test]
    fn test_application_id_type_may_contain_separator() {
        let id: ApplicationId = "My_AppType_App3".parse().unwrap();
        assert_eq!(id.type_name, "My_AppType");
        assert_eq!(id.number, 3);
    }

    #[test]
    fn test_application_id_rejects_garbage() {
        assert!("Calc".parse::<ApplicationId>().is_err());
        assert!("_App1".parse::<ApplicationId>().is_err());
        assert!("Calc_Appx".parse::<ApplicationId>().is_err());
    }

    #[test]
    fn test_system_application() {
        assert!(ApplicationId::system().is_system());
        assert!(!ApplicationId::new("Calc", 1).is_system());
    }

    #[test]
    fn test_key_formats() {
        let app = ApplicationId::new("Calc", 1);
        assert_eq!(DownloadKey::application(&app, "1.0").as_str(), "Download:Calc_App1:1.0");
        assert_eq!(
            DownloadKey::service_package(&ServicePackageId::new(app, "Frontend"), "1.0").as_str(),
            "Download:Calc_App1:Frontend:1.0"
        );
        assert_eq!(DownloadKey::platform("7.1.0").as_str(), "Download:7.1.0");
        assert_eq!(
            DownloadKey::service_manifest("Calc", "1.0", "Frontend").as_str(),
            "Download:Calc:1.0:Frontend"
        );
        assert_eq!(download_health_property("1.0"), "Download:1.0");
        assert_eq!(platform_health_property("7.1.0"), "FabricDownload:7.1.0");
    }
}
