use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Business events
    pub service_name: String,
    pub service_component: String,

    // Correlation
    pub echo_request_id: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup (the process environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Environment::parse(&lookup("ENV").unwrap_or_else(|| "dev".to_string()));
        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        // Business events
        let service_name =
            lookup("SERVICE_NAME").unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let service_component =
            lookup("SERVICE_COMPONENT").unwrap_or_else(|| "http".to_string());

        // Correlation
        let echo_request_id = lookup("ECHO_REQUEST_ID")
            .map(|v| parse_bool(&v))
            .transpose()
            .context("ECHO_REQUEST_ID must be a boolean")?
            .unwrap_or(true);

        if service_name.trim().is_empty() {
            bail!("SERVICE_NAME must not be empty");
        }

        Ok(Settings {
            env,
            server_addr,
            service_name,
            service_component,
            echo_request_id,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognised boolean {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.env, Environment::Dev);
        assert_eq!(settings.server_addr, "0.0.0.0:8080");
        assert_eq!(settings.service_name, "call-context");
        assert_eq!(settings.service_component, "http");
        assert!(settings.echo_request_id);
    }

    #[test]
    fn overrides() {
        let settings = settings(&[
            ("ENV", "Production"),
            ("SERVICE_NAME", "cartservice"),
            ("SERVICE_COMPONENT", "grpc"),
            ("ECHO_REQUEST_ID", "off"),
        ])
        .unwrap();

        assert!(settings.env.is_prod());
        assert_eq!(settings.service_name, "cartservice");
        assert_eq!(settings.service_component, "grpc");
        assert!(!settings.echo_request_id);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(settings(&[("ECHO_REQUEST_ID", "maybe")]).is_err());
        assert!(settings(&[("SERVICE_NAME", "  ")]).is_err());
    }

    #[test]
    fn unknown_environment_is_dev() {
        assert_eq!(Environment::parse("qa"), Environment::Dev);
        assert_eq!(Environment::parse("STAGING"), Environment::Staging);
    }
}
