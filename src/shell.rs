//! Interactive panel: every `fire` and `spam` runs as its own loop, so
//! several of them can race on the log pane at once.

use crate::{
    actions::{custom_payload, fire_ops, menu, render_menu},
    fault::ErrorRate,
    fire::{Engine, FirePlan, Target},
    session::Slot,
    types::Service,
};
use anyhow::{bail, Context, Result};
use log::debug;
use serde_json::Value;
use std::{io::Write, time::Duration};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    task::JoinSet,
};

const HELP: &str = "\
commands:
  fire <service> <op> [<op>...] [n=N] [delay=MS] [errors=PCT] [payload=JSON]
  spam [service] [n=N] [delay=MS] [errors=PCT]
  ops [service]        list operations and what they still need
  log                  print the whole log pane
  clear                empty the log pane
  session              show remembered ids
  set <slot> <value>   remember an id by hand
  reset                forget every remembered id
  wait                 block until running loops finish
  help
  quit                 wait for running loops, then exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fire {
        service: Service,
        ops: Vec<String>,
        plan: FirePlan,
        payload: Option<Value>,
    },
    Spam {
        service: Option<Service>,
        plan: FirePlan,
    },
    Ops(Option<Service>),
    Log,
    Clear,
    Session,
    Set(Slot, String),
    Reset,
    Wait,
    Help,
    Quit,
}

/// Parses one input line; blank lines yield `None`.
pub fn parse_line(line: &str, defaults: &FirePlan) -> Result<Option<Command>> {
    let (knobs, words): (Vec<&str>, Vec<&str>) = line
        .split_whitespace()
        .partition(|w| w.contains('='));
    let Some((&verb, rest)) = words.split_first() else {
        return Ok(None);
    };
    let cmd = match verb.to_lowercase().as_str() {
        "fire" => {
            let (service, ops) = match rest.split_first() {
                Some((svc, ops)) if !ops.is_empty() => (svc.parse::<Service>()?, ops),
                _ => bail!("usage: fire <service> <op> [<op>...]"),
            };
            let (plan, payload) = parse_knobs(&knobs, defaults)?;
            Command::Fire {
                service,
                ops: ops.iter().map(|s| s.to_string()).collect(),
                plan,
                payload,
            }
        }
        "spam" => {
            let service = rest.first().map(|s| s.parse::<Service>()).transpose()?;
            let (plan, payload) = parse_knobs(&knobs, defaults)?;
            if payload.is_some() {
                bail!("spam does not take a payload");
            }
            Command::Spam { service, plan }
        }
        "ops" | "list" => Command::Ops(rest.first().map(|s| s.parse::<Service>()).transpose()?),
        "log" => Command::Log,
        "clear" => Command::Clear,
        "session" => Command::Session,
        "set" => match rest {
            [slot, value] => Command::Set(slot.parse::<Slot>()?, value.to_string()),
            _ => bail!("usage: set <slot> <value>"),
        },
        "reset" => Command::Reset,
        "wait" => Command::Wait,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command: {} (try help)", other),
    };
    Ok(Some(cmd))
}

fn parse_knobs(knobs: &[&str], defaults: &FirePlan) -> Result<(FirePlan, Option<Value>)> {
    let mut plan = *defaults;
    let mut payload = None;
    for knob in knobs {
        let (k, v) = knob.split_once('=').unwrap_or((*knob, ""));
        match k {
            "n" | "count" => {
                let count: u32 = v
                    .parse()
                    .with_context(|| format!("count is not a number: {}", v))?;
                plan = FirePlan::new(count, plan.delay.as_millis() as u64, plan.error_rate)?;
            }
            "delay" => {
                let ms: u64 = v
                    .parse()
                    .with_context(|| format!("delay is not a number: {}", v))?;
                plan.delay = Duration::from_millis(ms);
            }
            "errors" | "rate" => plan.error_rate = v.parse::<ErrorRate>()?,
            // the payload is the rest of the token, so it must not contain spaces
            "payload" => payload = custom_payload(v),
            other => bail!("unknown setting: {}", other),
        }
    }
    Ok((plan, payload))
}

pub async fn run_shell(engine: Engine, defaults: FirePlan) -> Result<()> {
    println!("{}", HELP);
    let mut loops = JoinSet::new();
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout()
            .flush()
            .with_context(|| "Failed to flush stdout.")?;
        let Some(line) = lines
            .next_line()
            .await
            .with_context(|| "Failed to read from stdin.")?
        else {
            break;
        };
        let cmd = match parse_line(&line, &defaults) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{:#}", e);
                continue;
            }
        };
        match cmd {
            Command::Fire {
                service,
                ops,
                plan,
                payload,
            } => {
                let ops = match ops
                    .iter()
                    .map(|r| service.find(r))
                    .collect::<Result<Vec<_>>>()
                {
                    Ok(ops) => ops,
                    Err(e) => {
                        println!("{:#}", e);
                        continue;
                    }
                };
                if let Err(e) = ops[0].check_available(&engine.session().snapshot()) {
                    println!("{:#}", e);
                    continue;
                }
                let engine = engine.clone();
                loops.spawn(async move {
                    if let Err(e) = fire_ops(engine, ops, plan, payload).await {
                        println!("{:#}", e);
                    }
                });
            }
            Command::Spam { service, plan } => {
                let engine = engine.clone();
                loops.spawn(async move {
                    let report = engine.fire(&Target::Menu(menu(service)), &plan).await;
                    println!("random spam: {}", report);
                });
            }
            Command::Ops(service) => {
                let services = match service {
                    Some(s) => vec![s],
                    None => Service::all().to_vec(),
                };
                print!(
                    "{}",
                    render_menu(&services, engine.targets(), &engine.session().snapshot())
                );
            }
            Command::Log => println!("{}", engine.log().render()),
            Command::Clear => engine.log().clear(),
            Command::Session => {
                let bindings = engine.session().snapshot();
                for slot in Slot::all() {
                    match bindings.get(slot) {
                        Some(v) => println!("{:<16} {}", slot, v),
                        None => println!("{:<16} -", slot),
                    }
                }
            }
            Command::Set(slot, value) => engine.session().set(slot, value),
            Command::Reset => engine.session().clear(),
            Command::Wait => drain(&mut loops).await,
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
        }
    }
    drain(&mut loops).await;
    Ok(())
}

async fn drain(loops: &mut JoinSet<()>) {
    if !loops.is_empty() {
        println!("waiting for {} running loop(s)", loops.len());
    }
    while let Some(res) = loops.join_next().await {
        if let Err(e) = res {
            debug!("fire loop task ended abnormally: {}", e);
        }
    }
}
