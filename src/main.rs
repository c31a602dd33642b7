use clap::{Arg, ArgAction, Command};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use envy::config::{Project, CONFIG_FILE_NAME};
use envy::error::{EnvyError, EnvyResult, ErrorKind};
use envy::logging;
use envy::sync::{DiffSide, ListSource, PullOptions, PushOptions, SyncEngine};
use envy::validation::{validate, RuleSet};

mod commands {
	pub const INIT: &str = "init";
	pub const CONFIGURE: &str = "configure";
	pub const PUSH: &str = "push";
	pub const PULL: &str = "pull";
	pub const LIST: &str = "list";
	pub const DIFF: &str = "diff";
	pub const RUN: &str = "run";
	pub const VALIDATE: &str = "validate";
	pub const CACHE: &str = "cache";
	pub const VERSION: &str = "version";
}

const RELEASE_URL: &str = "https://releases.envy.dev/latest.json";

fn cli() -> Command {
	Command::new("envy")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Sync local env files with a remote parameter/secret store")
		.subcommand_required(true)
		.arg(Arg::new("config").long("config").value_name("FILE").help("Config file path"))
		.arg(Arg::new("debug").long("debug").action(ArgAction::SetTrue).help("Debug logging"))
		.arg(
			Arg::new("verbose")
				.long("verbose")
				.action(ArgAction::SetTrue)
				.help("Verbose output"),
		)
		.arg(Arg::new("quiet").long("quiet").action(ArgAction::SetTrue).help("Errors only"))
		.arg(
			Arg::new("no-color")
				.long("no-color")
				.action(ArgAction::SetTrue)
				.help("Disable colored output"),
		)
		.arg(
			Arg::new("no-cache")
				.long("no-cache")
				.action(ArgAction::SetTrue)
				.help("Bypass the cache for this invocation"),
		)
		.arg(
			Arg::new("clear-cache")
				.long("clear-cache")
				.action(ArgAction::SetTrue)
				.help("Clear the cache before running"),
		)
		.subcommand(Command::new(commands::INIT).about("Create a project configuration"))
		.subcommand(Command::new(commands::CONFIGURE).about("Show the resolved configuration"))
		.subcommand(
			Command::new(commands::PUSH)
				.about("Push local variables to the remote store")
				.arg(Arg::new("env").long("env").value_name("NAME").help("Environment"))
				.arg(Arg::new("prefix").long("prefix").value_name("PATH").help("Path prefix override"))
				.arg(
					Arg::new("vars")
						.long("vars")
						.value_name("NAMES")
						.value_delimiter(',')
						.action(ArgAction::Append)
						.help("Only push these variables"),
				)
				.arg(Arg::new("force").long("force").action(ArgAction::SetTrue).help("Overwrite existing values"))
				.arg(Arg::new("dry-run").long("dry-run").action(ArgAction::SetTrue).help("Plan without changing anything"))
				.arg(Arg::new("all").long("all").action(ArgAction::SetTrue).help("Push every configured environment"))
				.arg(Arg::new("diff").long("diff").action(ArgAction::SetTrue).help("Show the change against the remote"))
				.arg(Arg::new("parallel").long("parallel").action(ArgAction::SetTrue).help("Parallel upload (default)"))
				.arg(
					Arg::new("max-workers")
						.long("max-workers")
						.value_name("N")
						.value_parser(clap::value_parser!(usize))
						.help("Worker pool size"),
				)
				.arg(
					Arg::new("batch-size")
						.long("batch-size")
						.value_name("N")
						.value_parser(clap::value_parser!(usize))
						.help("Items per batch"),
				)
				.arg(Arg::new("skip-empty").long("skip-empty").action(ArgAction::SetTrue).help("Skip empty values"))
				.arg(
					Arg::new("allow-duplicate")
						.long("allow-duplicate")
						.action(ArgAction::SetTrue)
						.help("Accept duplicate keys, last value wins"),
				)
				.arg(Arg::new("no-progress").long("no-progress").action(ArgAction::SetTrue).help("Disable the progress line")),
		)
		.subcommand(
			Command::new(commands::PULL)
				.about("Pull remote variables into the local env file")
				.arg(Arg::new("env").long("env").value_name("NAME").help("Environment"))
				.arg(Arg::new("prefix").long("prefix").value_name("PATH").help("Path prefix override"))
				.arg(
					Arg::new("stdout")
						.long("stdout")
						.action(ArgAction::SetTrue)
						.help("Print instead of writing the env file"),
				),
		)
		.subcommand(
			Command::new(commands::LIST)
				.about("List variables")
				.arg(Arg::new("env").long("env").value_name("NAME").help("Environment"))
				.arg(
					Arg::new("source")
						.long("source")
						.value_name("SOURCE")
						.value_parser(["local", "remote", "both"])
						.default_value("both")
						.help("Which side to list"),
				),
		)
		.subcommand(
			Command::new(commands::DIFF)
				.about("Diff two snapshots")
				.arg(Arg::new("from").value_name("FROM").default_value("remote"))
				.arg(Arg::new("to").value_name("TO").default_value("local"))
				.arg(Arg::new("env").long("env").value_name("NAME").help("Environment")),
		)
		.subcommand(
			Command::new(commands::RUN)
				.about("Run a command with the pulled environment")
				.arg(Arg::new("env").long("env").value_name("NAME").help("Environment"))
				.arg(
					Arg::new("command")
						.required(true)
						.num_args(1..)
						.trailing_var_arg(true)
						.help("Command and arguments"),
				),
		)
		.subcommand(
			Command::new(commands::VALIDATE)
				.about("Validate local variables against a rule file")
				.arg(Arg::new("env").long("env").value_name("NAME").help("Environment"))
				.arg(
					Arg::new("rules")
						.long("rules")
						.value_name("FILE")
						.default_value("envy-rules.toml")
						.help("Rule file"),
				),
		)
		.subcommand(
			Command::new(commands::CACHE)
				.about("Inspect or clear the cache")
				.subcommand_required(true)
				.subcommand(Command::new("stats").about("Show cache statistics"))
				.subcommand(Command::new("clear").about("Delete every cache entry")),
		)
		.subcommand(Command::new(commands::VERSION).about("Show version and check for updates"))
}

#[tokio::main]
async fn main() -> ExitCode {
	let matches = cli().get_matches();
	let debug = matches.get_flag("debug");
	let verbose = matches.get_flag("verbose");
	logging::init_tracing(debug, verbose, matches.get_flag("quiet"));

	match dispatch(&matches).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("{}", err.render(debug || verbose));
			ExitCode::from(err.kind.exit_code() as u8)
		}
	}
}

fn load_project(matches: &clap::ArgMatches) -> EnvyResult<Project> {
	match matches.get_one::<String>("config") {
		Some(path) => Project::load(path),
		None => {
			let cwd = std::env::current_dir().map_err(|e| {
				EnvyError::wrap(ErrorKind::Internal, "Cannot determine working directory", e)
			})?;
			Project::discover(&cwd).map(|(project, _)| project)
		}
	}
}

fn build_engine(matches: &clap::ArgMatches) -> EnvyResult<SyncEngine> {
	let project = load_project(matches)?;
	let mut engine = SyncEngine::new(project)?;
	if matches.get_flag("no-cache") {
		engine = engine.without_cache();
	}
	if matches.get_flag("clear-cache") {
		engine.cache().clear();
	}
	let _ = engine.cache().spawn_sweeper(engine.cancellation());
	Ok(engine)
}

async fn dispatch(matches: &clap::ArgMatches) -> EnvyResult<()> {
	match matches.subcommand() {
		Some((commands::INIT, _)) => init(),
		Some((commands::CONFIGURE, _)) => configure(matches),
		Some((commands::PUSH, sub)) => push(matches, sub).await,
		Some((commands::PULL, sub)) => pull(matches, sub).await,
		Some((commands::LIST, sub)) => list(matches, sub).await,
		Some((commands::DIFF, sub)) => diff_cmd(matches, sub).await,
		Some((commands::RUN, sub)) => run(matches, sub).await,
		Some((commands::VALIDATE, sub)) => validate_cmd(matches, sub),
		Some((commands::CACHE, sub)) => cache_cmd(matches, sub),
		Some((commands::VERSION, _)) => version().await,
		_ => unreachable!("subcommand_required"),
	}
}

fn init() -> EnvyResult<()> {
	let path = PathBuf::from(CONFIG_FILE_NAME);
	if path.exists() {
		return Err(EnvyError::new(
			ErrorKind::ConfigInvalid,
			format!("{} already exists in this directory", CONFIG_FILE_NAME),
		));
	}

	let mut project = Project {
		name: std::env::current_dir()
			.ok()
			.and_then(|d| d.file_name().map(|n| n.to_string_lossy().to_string()))
			.unwrap_or_else(|| "app".to_string()),
		..Default::default()
	};
	let name = project.name.clone();
	project.environments.insert(
		"development".to_string(),
		envy::config::Environment {
			files: vec![PathBuf::from(".env")],
			path: format!("/{}/development/", name),
			use_secret_store: false,
		},
	);

	std::fs::write(&path, project.to_toml()?)
		.map_err(|e| envy::error::file_write_error(path.display(), e))?;
	println!("Wrote {}", path.display());
	Ok(())
}

fn configure(matches: &clap::ArgMatches) -> EnvyResult<()> {
	let project = load_project(matches)?;
	print!("{}", project.to_toml()?);
	Ok(())
}

async fn push(matches: &clap::ArgMatches, sub: &clap::ArgMatches) -> EnvyResult<()> {
	// CLI flags are the highest-priority configuration layer
	let mut project = load_project(matches)?;
	if let Some(workers) = sub.get_one::<usize>("max-workers") {
		project.performance.max_workers = (*workers).max(1);
	}
	if let Some(batch) = sub.get_one::<usize>("batch-size") {
		project.performance.batch_size = (*batch).max(1);
	}
	let mut engine = SyncEngine::new(project)?;
	if matches.get_flag("no-cache") {
		engine = engine.without_cache();
	}
	if matches.get_flag("clear-cache") {
		engine.cache().clear();
	}

	let environments: Vec<Option<String>> = if sub.get_flag("all") {
		engine.project().environments.keys().cloned().map(Some).collect()
	} else {
		vec![sub.get_one::<String>("env").cloned()]
	};

	for environment in environments {
		let options = PushOptions {
			environment,
			prefix: sub.get_one::<String>("prefix").cloned(),
			variables: sub
				.get_many::<String>("vars")
				.map(|vals| vals.cloned().collect()),
			force: sub.get_flag("force"),
			dry_run: sub.get_flag("dry-run"),
			show_diff: sub.get_flag("diff"),
			skip_empty: sub.get_flag("skip-empty"),
			allow_duplicate: sub.get_flag("allow-duplicate"),
		};

		let summary = engine.push(&options).await?;
		if let Some(change) = &summary.diff {
			print_diff(change);
		}
		if summary.dry_run {
			println!(
				"[{}] dry run: {} variables would be pushed",
				summary.environment, summary.total
			);
		} else {
			println!("[{}] pushed {} variables", summary.environment, summary.pushed);
		}
	}
	Ok(())
}

async fn pull(matches: &clap::ArgMatches, sub: &clap::ArgMatches) -> EnvyResult<()> {
	let engine = build_engine(matches)?;
	let options = PullOptions {
		environment: sub.get_one::<String>("env").cloned(),
		prefix: sub.get_one::<String>("prefix").cloned(),
		write: !sub.get_flag("stdout"),
	};
	let result = engine.pull(&options).await?;
	match &result.written {
		Some(path) => println!(
			"[{}] wrote {} variables to {}",
			result.environment,
			result.file.len(),
			path.display()
		),
		None => print!("{}", result.file.to_string()),
	}
	Ok(())
}

async fn list(matches: &clap::ArgMatches, sub: &clap::ArgMatches) -> EnvyResult<()> {
	let engine = build_engine(matches)?;
	let source = match sub.get_one::<String>("source").map(String::as_str) {
		Some("local") => ListSource::Local,
		Some("remote") => ListSource::Remote,
		_ => ListSource::Both,
	};
	let entries = engine
		.list(sub.get_one::<String>("env").map(String::as_str), source)
		.await?;

	for (name, entry) in entries {
		let location = match entry.location {
			envy::sync::ListLocation::LocalOnly => "local",
			envy::sync::ListLocation::RemoteOnly => "remote",
			envy::sync::ListLocation::Both => "both",
		};
		let value = entry.local.or(entry.remote).unwrap_or_default();
		println!("{:<32} {:<8} {}", name, location, envy::remote::display_value(&name, &value));
	}
	Ok(())
}

async fn diff_cmd(matches: &clap::ArgMatches, sub: &clap::ArgMatches) -> EnvyResult<()> {
	let engine = build_engine(matches)?;
	let from = DiffSide::parse(sub.get_one::<String>("from").map(String::as_str).unwrap_or("remote"));
	let to = DiffSide::parse(sub.get_one::<String>("to").map(String::as_str).unwrap_or("local"));
	let change = engine
		.diff(&from, &to, sub.get_one::<String>("env").map(String::as_str))
		.await?;
	print_diff(&change);
	if change.is_empty() {
		println!("No differences");
	}
	Ok(())
}

fn print_diff(change: &envy::diff::DiffResult) {
	for (name, value) in &change.added {
		println!("+ {}={}", name, envy::remote::display_value(name, value));
	}
	for (name, (old, new)) in &change.modified {
		println!(
			"~ {}: {} -> {}",
			name,
			envy::remote::display_value(name, old),
			envy::remote::display_value(name, new)
		);
	}
	for (name, value) in &change.deleted {
		println!("- {}={}", name, envy::remote::display_value(name, value));
	}
}

async fn run(matches: &clap::ArgMatches, sub: &clap::ArgMatches) -> EnvyResult<()> {
	let engine = build_engine(matches)?;
	let result = engine
		.pull(&PullOptions {
			environment: sub.get_one::<String>("env").cloned(),
			prefix: None,
			write: false,
		})
		.await?;

	let argv: Vec<&String> = match sub.get_many::<String>("command") {
		Some(values) => values.collect(),
		None => Vec::new(),
	};
	let (program, args) = argv.split_first().ok_or_else(|| {
		EnvyError::new(ErrorKind::InvalidArgument, "run requires a command to execute")
	})?;

	let mut command = std::process::Command::new(program);
	command.args(args);
	for variable in result.file.iter() {
		command.env(&variable.key, &variable.value);
	}

	let status = command.status().map_err(|e| {
		EnvyError::wrap(ErrorKind::Internal, format!("Failed to execute '{}'", program), e)
	})?;
	if !status.success() {
		std::process::exit(status.code().unwrap_or(1));
	}
	Ok(())
}

fn validate_cmd(matches: &clap::ArgMatches, sub: &clap::ArgMatches) -> EnvyResult<()> {
	let engine = build_engine(matches)?;
	let (_, environment) = engine
		.project()
		.environment(sub.get_one::<String>("env").map(String::as_str))?;

	let mut vars: BTreeMap<String, String> = BTreeMap::new();
	for path in &environment.files {
		let file = envy::envfile::EnvFile::load(path)?;
		vars.extend(file.to_map());
	}

	let rules_path = sub.get_one::<String>("rules").expect("defaulted");
	let rules: RuleSet = match std::fs::read_to_string(rules_path) {
		Ok(content) => toml::from_str(&content).map_err(|e| {
			EnvyError::wrap(
				ErrorKind::ConfigParse,
				format!("Failed to parse rule file '{}'", rules_path),
				e,
			)
		})?,
		Err(_) => RuleSet::default(),
	};

	let outcome = validate(&vars, &rules);
	for warning in &outcome.warnings {
		println!("warning: {}", warning.message);
	}
	for fix in &outcome.fixes {
		println!("fix: {}", fix.description);
	}
	for error in &outcome.errors {
		println!("error: {}", error.message);
	}

	if outcome.is_valid() {
		println!("{} variables OK", vars.len());
		Ok(())
	} else {
		Err(EnvyError::new(
			ErrorKind::ValidationFailed,
			format!("Validation failed with {} errors", outcome.errors.len()),
		))
	}
}

fn cache_cmd(matches: &clap::ArgMatches, sub: &clap::ArgMatches) -> EnvyResult<()> {
	let engine = build_engine(matches)?;
	match sub.subcommand() {
		Some(("stats", _)) => {
			let stats = engine.cache().stats();
			println!("entries:  {}", stats.entries);
			println!("size:     {} bytes", stats.size_bytes);
			println!("hits:     {}", stats.hits);
			println!("misses:   {}", stats.misses);
			println!("hit rate: {:.1}%", stats.hit_rate * 100.0);
			Ok(())
		}
		Some(("clear", _)) => {
			engine.cache().clear();
			println!("Cache cleared");
			Ok(())
		}
		_ => unreachable!("subcommand_required"),
	}
}

async fn version() -> EnvyResult<()> {
	let current = env!("CARGO_PKG_VERSION");
	println!("envy {}", current);
	if let Some(latest) = envy::update_check::check(current, RELEASE_URL).await {
		println!("A newer version is available: {}", latest);
	}
	Ok(())
}

// vim: ts=4
