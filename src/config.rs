//! Runtime configuration, loaded from environment variables.

use thiserror::Error;

use crate::credential::Credential;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub issuance: IssuanceConfig,
    pub routes: RouteConfig,
}

/// Paths of the endpoints that mint or revoke credentials.
///
/// These are never bearer-decorated and never trigger refresh recovery.
#[derive(Debug, Clone)]
pub struct IssuanceConfig {
    /// Additional undecorated issuer paths (e.g. registration)
    pub extra_paths: Vec<String>,
    pub login_path: String,
    pub logout_path: String,
    pub refresh_path: String,
}

impl IssuanceConfig {
    pub fn is_issuance(&self, route: &str) -> bool {
        route == self.login_path
            || route == self.logout_path
            || route == self.refresh_path
            || self.extra_paths.iter().any(|path| route == path)
    }
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            extra_paths: vec!["/auth/register".to_string()],
            login_path: "/auth/login".to_string(),
            logout_path: "/auth/logout".to_string(),
            refresh_path: "/auth/refresh".to_string(),
        }
    }
}

/// A role granting its holders a dedicated default destination.
#[derive(Debug, Clone)]
pub struct RoleHome {
    pub destination: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Fallback default destination for authenticated subjects
    pub home: String,
    pub login: String,
    /// Checked in order; first entry whose role the subject holds wins
    pub role_homes: Vec<RoleHome>,
}

impl RouteConfig {
    /// Default destination for a subject: the first matching role-home
    /// entry, or home for subjects with no mapped role.
    pub fn role_home(&self, credential: &Credential) -> String {
        self.role_homes
            .iter()
            .find(|entry| credential.has_role(&entry.role))
            .map(|entry| entry.destination.clone())
            .unwrap_or_else(|| self.home.clone())
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            home: "/home".to_string(),
            login: "/login".to_string(),
            role_homes: vec![RoleHome {
                destination: "/kiosk".to_string(),
                role: "KIOSK".to_string(),
            }],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let issuance_defaults = IssuanceConfig::default();
        let route_defaults = RouteConfig::default();

        let config = Config {
            issuance: IssuanceConfig {
                extra_paths: std::env::var("AUTH_EXTRA_PATHS")
                    .map(|raw| parse_list(&raw))
                    .unwrap_or(issuance_defaults.extra_paths),
                login_path: std::env::var("AUTH_LOGIN_PATH")
                    .unwrap_or(issuance_defaults.login_path),
                logout_path: std::env::var("AUTH_LOGOUT_PATH")
                    .unwrap_or(issuance_defaults.logout_path),
                refresh_path: std::env::var("AUTH_REFRESH_PATH")
                    .unwrap_or(issuance_defaults.refresh_path),
            },
            routes: RouteConfig {
                home: std::env::var("HOME_ROUTE").unwrap_or(route_defaults.home),
                login: std::env::var("LOGIN_ROUTE").unwrap_or(route_defaults.login),
                role_homes: std::env::var("ROLE_HOMES")
                    .map(|raw| parse_role_homes(&raw))
                    .unwrap_or(route_defaults.role_homes),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let paths = [
            &self.issuance.login_path,
            &self.issuance.logout_path,
            &self.issuance.refresh_path,
            &self.routes.home,
            &self.routes.login,
        ];
        for path in paths.into_iter().chain(&self.issuance.extra_paths) {
            require_absolute(path)?;
        }

        for entry in &self.routes.role_homes {
            if entry.role.is_empty() {
                return Err(ConfigError::ValidationError(
                    "ROLE_HOMES entry with empty role".to_string(),
                ));
            }
            require_absolute(&entry.destination)?;
        }

        Ok(())
    }
}

fn require_absolute(path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "path must start with '/': {path}"
        )))
    }
}

/// Parse a comma-separated list, ignoring empty entries.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Parse `ROLE=/destination` pairs from a comma-separated list.
fn parse_role_homes(raw: &str) -> Vec<RoleHome> {
    raw.split(',')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(role, destination)| RoleHome {
            destination: destination.trim().to_string(),
            role: role.trim().to_string(),
        })
        .filter(|entry| !entry.role.is_empty())
        .collect()
}
