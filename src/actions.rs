use crate::{
    catalog::all_operations,
    config::{Config, Targets},
    fault::ErrorRate,
    fire::{Engine, FirePlan, FireReport, Target},
    fs::open_file,
    log_sink::LogSink,
    session::{Bindings, SessionState},
    shell::run_shell,
    types::{Operation, Service},
};
use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde_json::Value;
use std::{future::Future, process};
use tokio::runtime::Runtime;

pub fn action_list(c: &seahorse::Context) {
    exit_on_error(list(c));
}

pub fn action_fire(c: &seahorse::Context) {
    exit_on_error(fire(c));
}

pub fn action_spam(c: &seahorse::Context) {
    exit_on_error(spam(c));
}

pub fn action_run(c: &seahorse::Context) {
    exit_on_error(run(c));
}

pub fn action_shell(c: &seahorse::Context) {
    exit_on_error(shell(c));
}

fn exit_on_error(res: Result<()>) {
    res.unwrap_or_else(|e| {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    })
}

/// Everything the flags resolve to.
struct Settings {
    config: Config,
    plan: FirePlan,
    session: SessionState,
}

fn settings(c: &seahorse::Context) -> Result<Settings> {
    let mut config = Config::load(flag(c, "config"))?;
    if let Some(host) = flag(c, "host") {
        config.targets = Targets::all_at(&host);
    }
    let count = match flag(c, "count") {
        Some(v) => v
            .parse::<u32>()
            .with_context(|| format!("Count is not a positive number: {}", v))?,
        None => config.count.unwrap_or(1),
    };
    let delay_ms = match flag(c, "delay") {
        Some(v) => v
            .parse::<u64>()
            .with_context(|| format!("Delay is not a number of milliseconds: {}", v))?,
        None => config.delay_ms.unwrap_or(0),
    };
    let error_rate = match flag(c, "error-rate") {
        Some(v) => v.parse::<ErrorRate>()?,
        None => ErrorRate::new(config.error_rate.unwrap_or(0.0))?,
    };
    let plan = FirePlan::new(count, delay_ms, error_rate)?;
    let session = SessionState::new();
    if let Some(pairs) = flag(c, "with") {
        session.seed(&pairs)?;
    }
    info!(
        "plan: count={} delay={:?} error_rate={}",
        plan.count,
        plan.delay,
        plan.error_rate.percent()
    );
    Ok(Settings {
        config,
        plan,
        session,
    })
}

fn flag(c: &seahorse::Context, name: &str) -> Option<String> {
    c.string_flag(name).ok().filter(|v| !v.trim().is_empty())
}

fn block_on<F: Future<Output = Result<()>>>(fut: F) -> Result<()> {
    Runtime::new()
        .with_context(|| "Failed to start the async runtime.")?
        .block_on(fut)
}

fn engine(settings: &Settings, log: LogSink) -> Result<Engine> {
    Engine::new(
        settings.config.targets.clone(),
        settings.session.clone(),
        log,
    )
}

fn list(c: &seahorse::Context) -> Result<()> {
    let settings = settings(c)?;
    let services = match c.args.first() {
        Some(s) => vec![s.parse::<Service>()?],
        None => Service::all().to_vec(),
    };
    print!(
        "{}",
        render_menu(&services, &settings.config.targets, &settings.session.snapshot())
    );
    Ok(())
}

pub fn render_menu(
    services: &[Service],
    targets: &Targets,
    bindings: &Bindings,
) -> String {
    let mut out = String::new();
    for svc in services {
        out.push_str(&format!("{} ({})\n", svc, targets.base_url(*svc)));
        for (i, op) in svc.operations().iter().enumerate() {
            let needs = match op.missing(bindings) {
                m if m.is_empty() => String::new(),
                m => {
                    let names: Vec<_> = m.iter().map(|s| s.as_str()).collect();
                    format!("  [needs {}]", names.join(", "))
                }
            };
            out.push_str(&format!(
                "  {:>2}. {:<24} {:<6} {}{}\n",
                i + 1,
                op.slug(),
                op.method,
                op.path,
                needs
            ));
        }
    }
    out
}

fn fire(c: &seahorse::Context) -> Result<()> {
    let settings = settings(c)?;
    let (service, refs) = match c.args.split_first() {
        Some((svc, refs)) if !refs.is_empty() => (svc.parse::<Service>()?, refs),
        _ => bail!("Usage: firepower fire <service> <operation> [<operation>...]"),
    };
    let ops = refs
        .iter()
        .map(|r| service.find(r))
        .collect::<Result<Vec<_>>>()?;
    let payload = flag(c, "payload").and_then(|raw| custom_payload(&raw));
    let engine = engine(&settings, LogSink::echoing())?;
    let plan = settings.plan;
    block_on(async move {
        fire_ops(engine, ops, plan, payload).await?;
        Ok(())
    })
}

/// Fires each operation in turn, refusing one whose ids are not known yet.
pub async fn fire_ops(
    engine: Engine,
    ops: Vec<&'static Operation>,
    plan: FirePlan,
    payload: Option<Value>,
) -> Result<Vec<FireReport>> {
    let mut reports = Vec::with_capacity(ops.len());
    for op in ops {
        op.check_available(&engine.session().snapshot())?;
        let target = match &payload {
            Some(body) => Target::Custom(op, body.clone()),
            None => Target::Single(op),
        };
        let report = engine.fire(&target, &plan).await;
        println!("{} / {}: {}", op.service, op.label, report);
        reports.push(report);
    }
    Ok(reports)
}

/// Parses a hand-written payload; anything that is not JSON is ignored.
pub fn custom_payload(raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring payload that is not valid JSON: {}", e);
            None
        }
    }
}

pub fn menu(service: Option<Service>) -> Vec<&'static Operation> {
    match service {
        Some(svc) => svc.operations().iter().collect(),
        None => all_operations(),
    }
}

fn spam(c: &seahorse::Context) -> Result<()> {
    let settings = settings(c)?;
    let service = c.args.first().map(|s| s.parse::<Service>()).transpose()?;
    let engine = engine(&settings, LogSink::echoing())?;
    let plan = settings.plan;
    block_on(async move {
        let report = engine.fire(&Target::Menu(menu(service)), &plan).await;
        println!("random spam: {}", report);
        Ok(())
    })
}

fn run(c: &seahorse::Context) -> Result<()> {
    let settings = settings(c)?;
    if c.args.is_empty() {
        bail!("Usage: firepower run [path to json files]");
    }
    let scenarios = c
        .args
        .iter()
        .map(|path| open_file(path).map(|steps| (path.clone(), steps)))
        .collect::<Result<Vec<_>>>()?;
    let engine = engine(&settings, LogSink::echoing())?;
    let plan = settings.plan;
    block_on(async move {
        let mut handles = vec![];
        for (path, steps) in scenarios {
            let engine = engine.with_session(SessionState::new());
            handles.push(tokio::spawn(async move {
                let report = engine.run_steps(&steps, &plan).await;
                (path, report)
            }));
        }
        for h in handles {
            let (path, report) = h.await.with_context(|| "Scenario task panicked.")?;
            println!("{}: {}", path, report);
        }
        Ok(())
    })
}

fn shell(c: &seahorse::Context) -> Result<()> {
    let settings = settings(c)?;
    let engine = engine(&settings, LogSink::echoing())?;
    let plan = settings.plan;
    block_on(run_shell(engine, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Slot;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn bad_custom_payloads_are_ignored() {
        assert_eq!(custom_payload(r#"{"userId": 1}"#), Some(json!({ "userId": 1 })));
        assert_eq!(custom_payload("{ oops"), None);
    }

    #[test]
    fn menu_covers_one_or_all_services() {
        assert_eq!(menu(Some(Service::Payments)).len(), 3);
        assert_eq!(menu(None).len(), all_operations().len());
    }

    #[test]
    fn rendered_menu_marks_missing_ids() {
        let mut b = Bindings::new();
        let text = render_menu(&[Service::Users], &Targets::default(), &b);
        assert!(text.starts_with("users (http://localhost:5001/api/users)\n"));
        assert!(text.contains("register-user"));
        assert!(text.contains("[needs user_id]"));

        b.insert(Slot::UserId, "u-1".into());
        let text = render_menu(&[Service::Users], &Targets::default(), &b);
        assert!(!text.contains("[needs"));
    }

    #[tokio::test]
    async fn fire_ops_refuses_dependent_operation_without_id() {
        let server = MockServer::start().await;
        let engine = Engine::new(
            Targets::all_at(&server.uri()),
            SessionState::new(),
            LogSink::new(),
        )
        .unwrap();
        let get_user = Service::Users.find("get-user").unwrap();

        let err = fire_ops(engine.clone(), vec![get_user], FirePlan::default(), None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Get User is unavailable"));
        assert!(engine.log().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fire_ops_chains_register_then_get() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/register"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "user": { "id": "u-5" } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/users/u-5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "u-5" })))
            .mount(&server)
            .await;
        let engine = Engine::new(
            Targets::all_at(&server.uri()),
            SessionState::new(),
            LogSink::new(),
        )
        .unwrap();
        let ops = vec![
            Service::Users.find("register-user").unwrap(),
            Service::Users.find("get-user").unwrap(),
        ];

        let reports = fire_ops(engine.clone(), ops, FirePlan::default(), None)
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.succeeded == 1));
        let entries = engine.log().entries();
        assert_eq!(
            entries[1].message,
            format!("Get User ✅ (200): {}/api/users/u-5", server.uri())
        );
    }
}
