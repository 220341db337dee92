use clap::{Parser as ClapParser, ValueEnum};
use std::process;

use roles::{
    DispatchSettings, MAX_CACHE_LINES, Object, ReadRolePropertyNode, Record,
    SourceLocation, UndefinedNameError, Value,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Scenario {
    All,
    Shadowing,
    Removal,
    Plain,
    Coercion,
    Promotion,
}

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Which scenario to run
    #[arg(long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Cache lines per call site before it goes generic
    #[arg(long, default_value_t = roles::CACHE_LINE_LIMIT)]
    cache_line_limit: usize,

    /// Capability handles cached on the generic paths
    #[arg(long, default_value_t = roles::CAPABILITY_HANDLE_LIMIT)]
    capability_handle_limit: usize,

    /// Distinct receivers read at one site in the promotion workload
    #[arg(long, default_value_t = 8)]
    receivers: usize,

    /// Passes over the receivers in the promotion workload
    #[arg(long, default_value_t = 3)]
    iterations: usize,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let settings = DispatchSettings {
        cache_line_limit: cli.cache_line_limit,
        capability_handle_limit: cli.capability_handle_limit,
    };
    if let Err(err) = settings.validate() {
        eprintln!("Invalid settings: {err} (max {MAX_CACHE_LINES} lines)");
        process::exit(2);
    }

    if let Err(err) = run(&cli, settings) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(cli: &Cli, settings: DispatchSettings) -> Result<(), UndefinedNameError> {
    let selected = |scenario: Scenario| {
        cli.scenario == Scenario::All || cli.scenario == scenario
    };

    if selected(Scenario::Shadowing) {
        println!("== shadowing ==");
        shadowing(settings)?;
    }
    if selected(Scenario::Removal) {
        println!("== removal ==");
        removal(settings)?;
    }
    if selected(Scenario::Plain) {
        println!("== plain ==");
        plain(settings)?;
    }
    if selected(Scenario::Coercion) {
        println!("== coercion ==");
        coercion(settings);
    }
    if selected(Scenario::Promotion) {
        println!("== promotion ==");
        promotion(cli, settings)?;
    }
    Ok(())
}

fn site(line: u32, settings: DispatchSettings) -> ReadRolePropertyNode {
    ReadRolePropertyNode::with_settings(
        SourceLocation::new(line, 1),
        settings,
    )
}

fn report(
    site: &ReadRolePropertyNode,
    receiver: &Value,
    name: &Value,
) -> Result<Value, UndefinedNameError> {
    let value = site.execute(receiver, name)?;
    println!("{name} -> {value:?} [{:?}]", site.tier());
    Ok(value)
}

fn report_error(site: &ReadRolePropertyNode, receiver: &Value, name: &Value) {
    match site.execute(receiver, name) {
        Ok(value) => println!("{name:?} -> {value:?} (unexpected)"),
        Err(err) => println!("{name:?} -> {err}"),
    }
}

fn shadowing(settings: DispatchSettings) -> Result<(), UndefinedNameError> {
    let receiver = Object::new();
    receiver.add_role(Object::with_members([("x", Value::Int(1))]).into());
    receiver.add_role(Object::with_members([("x", Value::Int(2))]).into());

    report(&site(1, settings), &receiver.into(), &"x".into())?;
    Ok(())
}

fn removal(settings: DispatchSettings) -> Result<(), UndefinedNameError> {
    let b = Value::from(Object::with_members([("x", Value::Int(2))]));
    let receiver = Object::new();
    receiver.add_role(Object::with_members([("x", Value::Int(1))]).into());
    receiver.add_role(b.clone());

    let site = site(2, settings);
    let recv = Value::from(receiver.clone());
    report(&site, &recv, &"x".into())?;
    receiver.remove_role(&b);
    report(&site, &recv, &"x".into())?;
    Ok(())
}

fn plain(settings: DispatchSettings) -> Result<(), UndefinedNameError> {
    let site = site(3, settings);
    let receiver = Value::from(Object::with_members([("y", Value::Int(5))]));
    report(&site, &receiver, &"y".into())?;
    report_error(&site, &receiver, &"z".into());

    let record = Value::foreign(Record::new([("y", Value::str("record"))]));
    report(&site, &record, &"y".into())?;
    Ok(())
}

fn coercion(settings: DispatchSettings) {
    let site = site(4, settings);
    let receiver = Value::from(Object::with_members([("y", Value::Int(5))]));
    report_error(&site, &receiver, &Value::Nil);
    report_error(&site, &receiver, &Object::new().into());
}

fn promotion(
    cli: &Cli,
    settings: DispatchSettings,
) -> Result<(), UndefinedNameError> {
    let site = site(5, settings);
    let receivers: Vec<Value> = (0..cli.receivers as i64)
        .map(|i| {
            let receiver = Object::new();
            let role = Object::with_members([("x", Value::Int(i))]);
            receiver.add_role(role.into());
            receiver.into()
        })
        .collect();

    for pass in 0..cli.iterations {
        let mut sum = 0;
        for receiver in &receivers {
            if let Value::Int(value) = site.execute(receiver, &"x".into())? {
                sum += value;
            }
        }
        println!("pass {pass}: sum {sum} [{:?}]", site.tier());
    }
    Ok(())
}
