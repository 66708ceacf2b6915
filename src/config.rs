use crate::{fs::read_config, types::Service};
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Base URL of every service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targets {
    pub users: String,
    pub restaurants: String,
    pub orders: String,
    pub payments: String,
    pub deliveries: String,
    pub notifications: String,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            users: "http://localhost:5001/api/users".to_string(),
            restaurants: "http://localhost:5002/api/restaurants".to_string(),
            orders: "http://localhost:5003/api/orders".to_string(),
            payments: "http://localhost:5004/api/payments".to_string(),
            deliveries: "http://localhost:5005/api/deliveries".to_string(),
            notifications: "http://localhost:5006/api/notifications".to_string(),
        }
    }
}

impl Targets {
    pub fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Users => &self.users,
            Service::Restaurants => &self.restaurants,
            Service::Orders => &self.orders,
            Service::Payments => &self.payments,
            Service::Deliveries => &self.deliveries,
            Service::Notifications => &self.notifications,
        }
    }

    pub fn base_url_mut(&mut self, service: Service) -> &mut String {
        match service {
            Service::Users => &mut self.users,
            Service::Restaurants => &mut self.restaurants,
            Service::Orders => &mut self.orders,
            Service::Payments => &mut self.payments,
            Service::Deliveries => &mut self.deliveries,
            Service::Notifications => &mut self.notifications,
        }
    }

    /// Points every service at one host, keeping the `/api/<service>` paths.
    pub fn all_at(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        let mut targets = Targets::default();
        for svc in Service::all() {
            *targets.base_url_mut(*svc) = format!("{}/api/{}", host, svc);
        }
        targets
    }

    fn normalize(&mut self) {
        for svc in Service::all() {
            let url = self.base_url_mut(*svc);
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }
    }
}

/// Everything the console reads at start-up.
///
/// Defaults, then the JSON file, then `FIREPOWER_<SERVICE>_URL` variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub targets: Targets,
    pub count: Option<u32>,
    pub delay_ms: Option<u64>,
    pub error_rate: Option<f64>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(p) => read_config(p)?,
            None => Config::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.targets.normalize();
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for svc in Service::all() {
            let key = format!("FIREPOWER_{}_URL", svc.as_str().to_uppercase());
            if let Some(url) = lookup(&key).filter(|u| !u.trim().is_empty()) {
                debug!("{} overrides {} base URL", key, svc);
                *self.targets.base_url_mut(*svc) = url;
            }
        }
    }
}
