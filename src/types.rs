use crate::{
    catalog,
    fault::Mutation,
    session::{Bindings, Slot},
};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => bail!("Unsupported HTTP method: {}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Users,
    Restaurants,
    Orders,
    Payments,
    Deliveries,
    Notifications,
}

impl Service {
    pub fn all() -> &'static [Service] {
        &[
            Service::Users,
            Service::Restaurants,
            Service::Orders,
            Service::Payments,
            Service::Deliveries,
            Service::Notifications,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Users => "users",
            Service::Restaurants => "restaurants",
            Service::Orders => "orders",
            Service::Payments => "payments",
            Service::Deliveries => "deliveries",
            Service::Notifications => "notifications",
        }
    }

    pub fn operations(&self) -> &'static [Operation] {
        catalog::operations(*self)
    }

    /// JSON pointer of the created-resource id in a success body, and where it goes.
    pub fn capture(&self) -> (&'static str, Slot) {
        match self {
            Service::Users => ("/user/id", Slot::UserId),
            Service::Restaurants => ("/restaurant/id", Slot::RestaurantId),
            Service::Orders => ("/order/id", Slot::OrderId),
            Service::Payments => ("/transaction_id", Slot::TransactionId),
            Service::Deliveries => ("/delivery_id", Slot::DeliveryId),
            Service::Notifications => ("/notification/id", Slot::NotificationId),
        }
    }

    /// Finds an operation by slug (`register-user`), label, or 1-based index.
    pub fn find(&self, reference: &str) -> Result<&'static Operation> {
        let ops = self.operations();
        if let Ok(i) = reference.parse::<usize>() {
            if let Some(op) = i.checked_sub(1).and_then(|i| ops.get(i)) {
                return Ok(op);
            }
            bail!("{} has no operation #{}", self, i);
        }
        let wanted = slugify(reference);
        match ops.iter().find(|op| op.slug() == wanted) {
            Some(op) => Ok(op),
            None => bail!("{} has no operation named {}", self, reference),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Service {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase();
        match Service::all()
            .iter()
            .find(|svc| svc.as_str() == key || svc.as_str().trim_end_matches('s') == key)
        {
            Some(svc) => Ok(*svc),
            None => bail!("Unknown service: {}", s),
        }
    }
}

/// Static description of one request a panel can fire.
pub struct Operation {
    pub service: Service,
    pub label: &'static str,
    pub method: HttpMethod,
    /// Relative to the service base URL; `{slot}` placeholders are filled from the session.
    pub path: &'static str,
    pub requires: &'static [Slot],
    pub payload: fn(&Bindings) -> Option<Value>,
    /// Body that breaks the target's validation contract.
    pub invalid_payload: fn(&Bindings) -> Value,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("service", &self.service)
            .field("label", &self.label)
            .field("method", &self.method)
            .field("path", &self.path)
            .finish()
    }
}

impl Operation {
    pub fn slug(&self) -> String {
        slugify(self.label)
    }

    pub fn missing(&self, bindings: &Bindings) -> Vec<Slot> {
        self.requires
            .iter()
            .copied()
            .filter(|slot| !bindings.contains_key(slot))
            .collect()
    }

    pub fn is_available(&self, bindings: &Bindings) -> bool {
        self.missing(bindings).is_empty()
    }

    /// Refuses operations whose ids have not been created yet.
    pub fn check_available(&self, bindings: &Bindings) -> Result<()> {
        let missing = self.missing(bindings);
        if !missing.is_empty() {
            let names: Vec<_> = missing.iter().map(Slot::as_str).collect();
            bail!(
                "{} is unavailable until {} is set; fire a create operation first or seed it with --with",
                self.label,
                names.join(" and ")
            );
        }
        Ok(())
    }

    pub fn resolve_path(&self, bindings: &Bindings) -> Option<String> {
        let mut path = self.path.to_string();
        for slot in Slot::all() {
            let placeholder = format!("{{{}}}", slot);
            if path.contains(&placeholder) {
                path = path.replace(&placeholder, bindings.get(slot)?);
            }
        }
        Some(path)
    }

    /// Builds the organic request, or `None` when a required slot is unbound.
    pub fn build(&self, base_url: &str, bindings: &Bindings) -> Option<FiredRequest> {
        if !self.is_available(bindings) {
            return None;
        }
        let path = self.resolve_path(bindings)?;
        Some(FiredRequest {
            method: self.method,
            url: format!("{}{}", base_url, path),
            body: (self.payload)(bindings),
            label: self.label.to_string(),
            mutation: None,
        })
    }
}

/// One concrete request, built fresh per iteration and dropped after logging.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
    pub label: String,
    pub mutation: Option<Mutation>,
}

/// One request of a scenario file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Step {
    pub name: Option<String>,
    pub service: Service,
    pub method: HttpMethod,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Step {
    pub fn label(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => format!("{} {}{}", self.method, self.service, self.path),
        }
    }
}

pub fn slugify(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_names_round_trip_through_from_str() {
        for svc in Service::all() {
            assert_eq!(svc.as_str().parse::<Service>().unwrap(), *svc);
        }
        assert_eq!("user".parse::<Service>().unwrap(), Service::Users);
        assert!("kitchen".parse::<Service>().is_err());
    }

    #[test]
    fn methods_parse_case_insensitively() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Update Order Status"), "update-order-status");
        assert_eq!(slugify("  get--User "), "get-user");
    }

    #[test]
    fn find_by_slug_label_and_index() {
        let by_slug = Service::Users.find("get-user").unwrap();
        assert_eq!(by_slug.label, "Get User");
        let by_label = Service::Users.find("Register User").unwrap();
        assert_eq!(by_label.label, "Register User");
        let by_index = Service::Users.find("1").unwrap();
        assert_eq!(by_index.label, "Register User");
        assert!(Service::Users.find("0").is_err());
        assert!(Service::Users.find("99").is_err());
        assert!(Service::Users.find("delete-user").is_err());
    }

    #[test]
    fn build_requires_bound_slots() {
        let get_user = Service::Users.find("get-user").unwrap();
        let mut b = Bindings::new();
        assert!(get_user.build("http://h/api/users", &b).is_none());
        assert_eq!(get_user.missing(&b), vec![Slot::UserId]);
        let err = get_user.check_available(&b).unwrap_err();
        assert!(err.to_string().contains("user_id"));

        b.insert(Slot::UserId, "u-1".into());
        let req = get_user.build("http://h/api/users", &b).unwrap();
        assert_eq!(req.url, "http://h/api/users/u-1");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.body, None);
        assert_eq!(req.mutation, None);
    }
}
