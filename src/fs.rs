use crate::{config::Config, types::Step};
use anyhow::{bail, Context, Result};
use std::{fs, path::Path};

/// Reads a scenario file holding either one step or a list of steps.
pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Vec<Step>>
where
    P: std::fmt::Debug,
{
    let file = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to open file: {:?}", path))?;
    parse_steps(&file).with_context(|| format!("Failed to parse scenario: {:?}", path))
}

pub fn parse_steps(file: &str) -> Result<Vec<Step>> {
    let steps: Result<Vec<Step>, serde_json::error::Error> = serde_json::from_str(file);
    match steps {
        Ok(s) => Ok(s),
        Err(list_err) => {
            let step: Result<Step, serde_json::error::Error> = serde_json::from_str(file);
            match step {
                Ok(s) => Ok(vec![s]),
                Err(_) => bail!("Failed to parse json: {}", list_err),
            }
        }
    }
}

pub fn read_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let file = fs::read_to_string(path)
        .with_context(|| format!("Failed to open config file: {}", path.display()))?;
    serde_json::from_str(&file)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HttpMethod, Service};
    use serde_json::json;

    #[test]
    fn single_step_becomes_a_list() {
        let steps = parse_steps(
            r#"{ "service": "users", "method": "POST", "path": "/register",
                 "body": { "name": "Ada" } }"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].service, Service::Users);
        assert_eq!(steps[0].method, HttpMethod::Post);
        assert_eq!(steps[0].body, Some(json!({ "name": "Ada" })));
        assert_eq!(steps[0].label(), "POST users/register");
    }

    #[test]
    fn lists_keep_their_order() {
        let steps = parse_steps(
            r#"[
                { "name": "make", "service": "restaurants", "method": "POST" },
                { "service": "restaurants", "method": "GET", "path": "/$$restaurant_id/menu" }
            ]"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].label(), "make");
        assert_eq!(steps[0].path, "");
        assert_eq!(steps[1].path, "/$$restaurant_id/menu");
    }

    #[test]
    fn bundled_demos_parse() {
        let steps = parse_steps(include_str!("../demos/order_flow.json")).unwrap();
        assert_eq!(steps.len(), 7);
        assert_eq!(steps[2].body.as_ref().unwrap()["userId"], "$$user_id");
        let config: Config =
            serde_json::from_str(include_str!("../demos/firepower.json")).unwrap();
        assert_eq!(
            config,
            Config {
                count: Some(1),
                delay_ms: Some(0),
                error_rate: Some(0.0),
                ..Config::default()
            }
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_steps("{ not json").is_err());
        assert!(parse_steps(r#"{ "service": "kitchen", "method": "GET" }"#).is_err());
    }

    #[test]
    fn missing_files_report_the_path() {
        let err = open_file("/definitely/not/here.json").unwrap_err();
        assert!(format!("{:?}", err).contains("/definitely/not/here.json"));
        assert!(read_config("/definitely/not/here.json").is_err());
    }
}
