use crate::types::FiredRequest;
use anyhow::{bail, Context, Result};
use rand::Rng;
use serde_json::{json, Value};
use std::{fmt, str::FromStr};

/// Path suffix that no target service routes.
pub const BAD_ENDPOINT_SUFFIX: &str = "/invalid_endpoint";

/// Percentage of iterations to corrupt, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct ErrorRate(f64);

impl ErrorRate {
    pub const NONE: ErrorRate = ErrorRate(0.0);
    pub const ALWAYS: ErrorRate = ErrorRate(100.0);

    pub fn new(percent: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&percent) {
            bail!("Error rate must be between 0 and 100, got {}", percent);
        }
        Ok(ErrorRate(percent))
    }

    pub fn percent(&self) -> f64 {
        self.0
    }
}

impl FromStr for ErrorRate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let percent: f64 = s
            .trim()
            .trim_end_matches('%')
            .parse()
            .with_context(|| format!("Error rate is not a number: {}", s))?;
        ErrorRate::new(percent)
    }
}

impl fmt::Display for ErrorRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// `roll` is a uniform draw in `[0, 100)`.
pub fn is_fault(roll: f64, rate: ErrorRate) -> bool {
    roll < rate.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Unexpected error: the request goes to a route that does not exist.
    BadEndpoint,
    /// Expected error: the body violates the target's validation contract.
    BadPayload,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::BadEndpoint => "bad-endpoint",
            Mutation::BadPayload => "bad-payload",
        }
    }

    pub fn apply(self, req: &mut FiredRequest, invalid_body: impl FnOnce() -> Value) {
        match self {
            Mutation::BadEndpoint => req.url.push_str(BAD_ENDPOINT_SUFFIX),
            Mutation::BadPayload => req.body = Some(invalid_body()),
        }
        req.mutation = Some(self);
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Body used when a request has no operation-specific invalid payload.
pub fn generic_invalid_body() -> Value {
    json!({ "invalid": true, "payload": null })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FaultInjector {
    rate: ErrorRate,
}

impl FaultInjector {
    pub fn new(rate: ErrorRate) -> Self {
        Self { rate }
    }

    /// Decides whether this iteration is corrupted and, if so, how.
    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Mutation> {
        let roll = rng.gen_range(0.0..100.0);
        if !is_fault(roll, self.rate) {
            return None;
        }
        if rng.gen_bool(0.5) {
            Some(Mutation::BadEndpoint)
        } else {
            Some(Mutation::BadPayload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpMethod;
    use rand::{rngs::StdRng, SeedableRng};

    fn request() -> FiredRequest {
        FiredRequest {
            method: HttpMethod::Post,
            url: "http://h/api/users/register".into(),
            body: Some(json!({ "name": "User-abcde" })),
            label: "Register User".into(),
            mutation: None,
        }
    }

    #[test]
    fn rate_is_validated() {
        assert!(ErrorRate::new(-0.1).is_err());
        assert!(ErrorRate::new(100.1).is_err());
        assert!(ErrorRate::new(f64::NAN).is_err());
        assert_eq!("25".parse::<ErrorRate>().unwrap().percent(), 25.0);
        assert_eq!("40%".parse::<ErrorRate>().unwrap().percent(), 40.0);
        assert!("lots".parse::<ErrorRate>().is_err());
    }

    #[test]
    fn decision_is_a_threshold_on_the_roll() {
        assert!(!is_fault(0.0, ErrorRate::NONE));
        assert!(is_fault(99.999, ErrorRate::ALWAYS));
        let thirty = ErrorRate::new(30.0).unwrap();
        assert!(is_fault(29.9, thirty));
        assert!(!is_fault(30.0, thirty));
    }

    #[test]
    fn zero_rate_never_mutates() {
        let mut rng = StdRng::seed_from_u64(7);
        let injector = FaultInjector::new(ErrorRate::NONE);
        assert!((0..1000).all(|_| injector.plan(&mut rng).is_none()));
    }

    #[test]
    fn full_rate_always_mutates_with_both_strategies() {
        let mut rng = StdRng::seed_from_u64(11);
        let injector = FaultInjector::new(ErrorRate::ALWAYS);
        let plans: Vec<_> = (0..1000).map(|_| injector.plan(&mut rng)).collect();
        assert!(plans.iter().all(Option::is_some));
        assert!(plans.contains(&Some(Mutation::BadEndpoint)));
        assert!(plans.contains(&Some(Mutation::BadPayload)));
    }

    #[test]
    fn bad_endpoint_only_touches_the_url() {
        let mut req = request();
        Mutation::BadEndpoint.apply(&mut req, generic_invalid_body);
        assert_eq!(req.url, "http://h/api/users/register/invalid_endpoint");
        assert_eq!(req.body, Some(json!({ "name": "User-abcde" })));
        assert_eq!(req.mutation, Some(Mutation::BadEndpoint));
    }

    #[test]
    fn bad_payload_only_touches_the_body() {
        let mut req = request();
        Mutation::BadPayload.apply(&mut req, || json!({ "email": 42 }));
        assert_eq!(req.url, "http://h/api/users/register");
        assert_eq!(req.body, Some(json!({ "email": 42 })));
        assert_eq!(req.mutation, Some(Mutation::BadPayload));
    }
}
