use std::path::{Path, PathBuf};

use archive_ui::config::{ConfigError, UiConfig};
use archive_ui::pagination::{MemoryRouter, PageSummary, PaginationService, QueryParams};
use archive_ui::registry::{DisplayContext, ManifestError, RegistryError, RegistryManifest, ViewMode};
use archive_ui::theme::{RouteTarget, ThemeError, ThemeSet};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to read {path}: {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown theme `{0}`")]
    UnknownTheme(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "archive-ui", about = "Inspect browse UI themes, component registrations and pagination URLs")]
struct Cli {
    /// UI configuration YAML; built-in defaults when absent.
    #[arg(long, env = "ARCHIVE_UI_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Themes(ThemesCommand),
    Resolve(ResolveArgs),
    Paginate(PaginateArgs),
}

#[derive(Args, Debug)]
struct ThemesCommand {
    #[command(subcommand)]
    command: ThemesSubcommand,
}

#[derive(Subcommand, Debug)]
enum ThemesSubcommand {
    /// Validate the configuration and print every theme's inheritance chain.
    Check,
    /// Print one theme's inheritance chain.
    Chain { name: String },
    /// Print the theme applied to a route.
    Match {
        url: String,
        #[arg(long = "handle")]
        handles: Vec<String>,
        #[arg(long = "uuid")]
        uuids: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Registration manifest YAML.
    #[arg(long)]
    manifest: PathBuf,

    /// Candidate object types, most specific first.
    #[arg(long = "type", required = true)]
    types: Vec<String>,

    #[arg(long, default_value_t = ViewMode::default())]
    view_mode: ViewMode,

    #[arg(long, default_value_t = DisplayContext::default())]
    context: DisplayContext,

    #[arg(long)]
    theme: Option<String>,
}

#[derive(Args, Debug)]
struct PaginateArgs {
    /// Pagination id owning the `{id}.*` parameters.
    id: String,

    /// A URL (`/browse?x.page=2`) or a bare query string.
    target: String,

    /// Total result count, to include a pager summary.
    #[arg(long)]
    total: Option<u64>,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Themes(themes) => run_themes(&config, themes),
        Command::Resolve(args) => run_resolve(&config, args),
        Command::Paginate(args) => run_paginate(&config, args),
    }
}

fn load_config(path: Option<&Path>) -> Result<UiConfig, CliError> {
    let mut config = match path {
        Some(path) => UiConfig::from_path(path)?,
        None => UiConfig::default(),
    };
    config.apply_env_overrides()?;
    tracing::debug!(themes = config.themes.len(), "loaded configuration");
    Ok(config)
}

fn run_themes(config: &UiConfig, themes: ThemesCommand) -> Result<(), CliError> {
    let set = config.theme_set()?;
    match themes.command {
        ThemesSubcommand::Check => {
            config.validate()?;
            print_json(&theme_chains(&set)?)
        }
        ThemesSubcommand::Chain { name } => {
            if set.get(&name).is_none() {
                return Err(CliError::UnknownTheme(name));
            }
            print_json(&json!(set.chain(&name)?))
        }
        ThemesSubcommand::Match { url, handles, uuids } => {
            let target = RouteTarget { handles, uuids };
            let theme = set.match_route(&url, &target).map(|theme| theme.name.clone());
            print_json(&json!({ "url": url, "theme": theme }))
        }
    }
}

fn theme_chains(set: &ThemeSet) -> Result<Value, CliError> {
    let chains = set
        .iter()
        .map(|theme| Ok(json!({ "name": theme.name, "chain": set.chain(&theme.name)? })))
        .collect::<Result<Vec<_>, ThemeError>>()?;
    Ok(Value::Array(chains))
}

fn run_resolve(config: &UiConfig, args: ResolveArgs) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(&args.manifest).map_err(|source| CliError::Io {
        path: args.manifest.clone(),
        source,
    })?;
    let registry = RegistryManifest::from_yaml_str(&raw)?.into_registry(config.theme_set()?)?;
    let resolution = registry.resolve(&args.types, args.view_mode, args.context, args.theme.as_deref())?;
    print_json(&json!({
        "component": resolution.component,
        "key": resolution.key,
        "relevancy": resolution.relevancy,
    }))
}

fn run_paginate(config: &UiConfig, args: PaginateArgs) -> Result<(), CliError> {
    let value = paginate(config, &args.id, &args.target, args.total)?;
    print_json(&value)
}

/// Pagination and sort state of `id` as the browser would derive it from `target`.
fn paginate(config: &UiConfig, id: &str, target: &str, total: Option<u64>) -> Result<Value, CliError> {
    let defaults = config.pagination_defaults(id);
    let service = PaginationService::new(MemoryRouter::new(&route_url(target)))
        .with_default_pagination(defaults.clone())
        .with_default_sort(config.default_sort.clone());
    let pagination = service.current_pagination(id, &defaults);
    let find = service.find_list_options(id, &defaults, Some(&config.default_sort), false);
    let mut value = json!({
        "pagination": &pagination,
        "sort": service.current_sort(id, Some(&config.default_sort), false),
        "find_list_options": find,
    });
    if let Some(total) = total {
        value["summary"] = serde_json::to_value(PageSummary::new(&pagination, total))?;
    }
    Ok(value)
}

/// Accept a path, an absolute URL or a bare query string.
fn route_url(target: &str) -> String {
    if target.starts_with('/') {
        return target.to_owned();
    }
    let query = if target.contains('?') {
        QueryParams::split_url(target).1
    } else {
        QueryParams::parse(target)
    };
    format!("/?{}", query.to_query_string())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
