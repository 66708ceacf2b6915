mod actions;
mod catalog;
mod config;
mod dispatch;
mod fault;
mod fire;
mod fs;
mod ids;
mod log_sink;
mod session;
mod shell;
mod types;
use actions::{action_fire, action_list, action_run, action_shell, action_spam};
use anyhow::Result;
use seahorse::{App, Command, Flag, FlagType};
use std::env;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Vec<String> = env::args().collect();
    let app = App::new(env!("CARGO_PKG_NAME"))
        .description(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .usage("firepower [command] [args]")
        .command(common_flags(
            Command::new("list")
                .description("List services and their operations")
                .usage("firepower list [service]")
                .action(action_list),
        ))
        .command(
            plan_flags(common_flags(
                Command::new("fire")
                    .description("Fire operations of one service, one after another")
                    .usage("firepower fire <service> <operation> [<operation>...]")
                    .action(action_fire),
            ))
            .flag(
                Flag::new("payload", FlagType::String)
                    .description("JSON body replacing the generated one")
                    .alias("p"),
            ),
        )
        .command(plan_flags(common_flags(
            Command::new("spam")
                .description("Fire random operations across every service, or one")
                .usage("firepower spam [service]")
                .action(action_spam),
        )))
        .command(plan_flags(common_flags(
            Command::new("run")
                .description("Run scenario files; $$slot strings resolve to created ids")
                .usage("firepower run [path to json files]")
                .action(action_run),
        )))
        .command(plan_flags(common_flags(
            Command::new("shell")
                .description("Interactive panel with a live log pane")
                .usage("firepower shell")
                .action(action_shell),
        )));
    app.run(args);
    Ok(())
}

fn common_flags(cmd: Command) -> Command {
    cmd.flag(
        Flag::new("config", FlagType::String)
            .description("JSON config file with base URLs and defaults")
            .alias("c"),
    )
    .flag(
        Flag::new("host", FlagType::String)
            .description("Send every service to one host, e.g. http://gateway:8080"),
    )
    .flag(
        Flag::new("with", FlagType::String)
            .description("Known ids, e.g. user_id=abc,order_id=xyz")
            .alias("w"),
    )
}

fn plan_flags(cmd: Command) -> Command {
    cmd.flag(
        Flag::new("count", FlagType::String)
            .description("Iterations per operation (default 1)")
            .alias("n"),
    )
    .flag(
        Flag::new("delay", FlagType::String)
            .description("Milliseconds between iterations (default 0)")
            .alias("d"),
    )
    .flag(
        Flag::new("error-rate", FlagType::String)
            .description("Percentage of iterations to corrupt, 0-100 (default 0)")
            .alias("e"),
    )
}
