//! Purpose: `apigw` CLI entry point for the API gateway management backend.
//! Role: Binary crate root; parses args, builds the client, emits JSON on stdout.
//! Invariants: Successful commands print exactly one JSON document on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr; notices are JSON lines.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use apigw_console::api::{
    ClientConfig, CookieJar, DEFAULT_PAGE_SIZE, Error, ErrorKind, HttpClient, PageQuery,
    PluginScope, SdkLanguage, UreqTransport, timeout_from_millis, to_exit_code,
};
use apigw_console::notice::NoticeHooks;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint("Try `apigw --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, &cli.connection)
        .map_err(add_transport_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

/// `RUST_LOG` wins; otherwise only warnings reach stderr.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "apigw",
    version,
    about = "Manage API gateways from the command line",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Talks to the gateway management backend with your browser session cookie.
Output is JSON on stdout; errors and notices go to stderr.
"#,
    after_help = r#"EXAMPLES
  $ export APIGW_BASE_URL=https://apigw.example.com/backend/
  $ export APIGW_COOKIE='csrftoken=...; bk_token=...'
  $ apigw gateway list --keyword demo
  $ apigw stage --gateway 12 list
  $ apigw resource --gateway 12 export --format yaml
  $ apigw request GET /gateways/12/stages/

LEARN MORE
  $ apigw <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        global = true,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug, Default)]
struct ConnectionArgs {
    #[arg(
        long,
        env = "APIGW_BASE_URL",
        global = true,
        help = "Backend base URL (e.g. https://apigw.example.com/backend/)",
        value_hint = ValueHint::Url
    )]
    base_url: Option<String>,
    #[arg(
        long,
        env = "APIGW_COOKIE",
        global = true,
        hide_env_values = true,
        help = "Session cookies as a Cookie header value ('a=1; b=2')"
    )]
    cookie: Option<String>,
    #[arg(
        long,
        env = "APIGW_CSRF_COOKIE_NAME",
        global = true,
        help = "Cookie holding the CSRF token (default: csrftoken)"
    )]
    csrf_cookie_name: Option<String>,
    #[arg(
        long,
        env = "APIGW_CSRF_HEADER_NAME",
        global = true,
        help = "Header carrying the CSRF token (default: X-CSRFToken)"
    )]
    csrf_header: Option<String>,
    #[arg(
        long,
        env = "APIGW_LOGIN_URL",
        global = true,
        help = "Login page reported when the session expires",
        value_hint = ValueHint::Url
    )]
    login_url: Option<String>,
    #[arg(
        long,
        env = "APIGW_TIMEOUT_MS",
        global = true,
        help = "Per-request timeout in milliseconds (0 disables)"
    )]
    timeout_ms: Option<u64>,
    #[arg(
        long,
        env = "APIGW_DOWNLOAD_DIR",
        global = true,
        help = "Directory for downloaded files (default: current directory)",
        value_hint = ValueHint::DirPath
    )]
    download_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "PEM bundle of extra trusted CA certificates",
        value_hint = ValueHint::FilePath
    )]
    tls_ca_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        conflicts_with = "tls_ca_file",
        help = "Skip TLS certificate verification (development only)"
    )]
    tls_skip_verify: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Args, Clone, Copy, Debug)]
struct GatewayArg {
    #[arg(
        long = "gateway",
        short = 'g',
        env = "APIGW_GATEWAY_ID",
        help = "Gateway id the command operates on"
    )]
    id: u64,
}

#[derive(Args, Clone, Copy, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, help = "Page size")]
    limit: u32,
    #[arg(long, default_value_t = 0, help = "Offset of the first row")]
    offset: u64,
    #[arg(long, help = "Follow pagination and return every row")]
    all: bool,
}

impl PageArgs {
    fn query(&self) -> PageQuery {
        PageQuery::new(self.limit, self.offset)
    }
}

#[derive(Args, Clone, Copy, Debug)]
#[group(required = true, multiple = false)]
struct ScopeArgs {
    #[arg(long, help = "Bind on a stage")]
    stage: Option<u64>,
    #[arg(long, help = "Bind on a resource")]
    resource: Option<u64>,
}

impl ScopeArgs {
    fn scope(&self) -> Result<PluginScope, Error> {
        match (self.stage, self.resource) {
            (Some(id), None) => Ok(PluginScope::Stage(id)),
            (None, Some(id)) => Ok(PluginScope::Resource(id)),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("exactly one of --stage or --resource is required")),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(arg_required_else_help = true, about = "List and manage gateways")]
    Gateway {
        #[command(subcommand)]
        command: GatewayCommand,
    },
    #[command(arg_required_else_help = true, about = "Manage stages of a gateway")]
    Stage {
        #[command(flatten)]
        gateway: GatewayArg,
        #[command(subcommand)]
        command: StageCommand,
    },
    #[command(arg_required_else_help = true, about = "Manage resources (routes) of a gateway")]
    Resource {
        #[command(flatten)]
        gateway: GatewayArg,
        #[command(subcommand)]
        command: ResourceCommand,
    },
    #[command(arg_required_else_help = true, about = "Grant and revoke app permissions")]
    Permission {
        #[command(flatten)]
        gateway: GatewayArg,
        #[command(subcommand)]
        command: PermissionCommand,
    },
    #[command(arg_required_else_help = true, about = "Bind plugins to stages or resources")]
    Plugin {
        #[command(flatten)]
        gateway: GatewayArg,
        #[command(subcommand)]
        command: PluginCommand,
    },
    #[command(arg_required_else_help = true, about = "Publish versions and read release history")]
    Release {
        #[command(flatten)]
        gateway: GatewayArg,
        #[command(subcommand)]
        command: ReleaseCommand,
    },
    #[command(arg_required_else_help = true, about = "Alarm strategies and records")]
    Alarm {
        #[command(flatten)]
        gateway: GatewayArg,
        #[command(subcommand)]
        command: AlarmCommand,
    },
    #[command(arg_required_else_help = true, about = "List and generate SDKs")]
    Sdk {
        #[command(flatten)]
        gateway: GatewayArg,
        #[command(subcommand)]
        command: SdkCommand,
    },
    #[command(
        arg_required_else_help = true,
        about = "Send a raw request to the backend",
        after_help = r#"EXAMPLES
  $ apigw request GET /gateways/ --params '{"limit": 5}'
  $ apigw request POST /gateways/12/releases/ --params @publish.json
  $ apigw request POST /gateways/12/resources/export/ --output download"#
    )]
    Request(RequestArgs),
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ apigw completion bash > ~/.local/share/bash-completion/completions/apigw
  $ apigw completion zsh > ~/.zfunc/_apigw
  $ apigw completion fish > ~/.config/fish/completions/apigw.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Gateway { .. } => "gateway",
            Command::Stage { .. } => "stage",
            Command::Resource { .. } => "resource",
            Command::Permission { .. } => "permission",
            Command::Plugin { .. } => "plugin",
            Command::Release { .. } => "release",
            Command::Alarm { .. } => "alarm",
            Command::Sdk { .. } => "sdk",
            Command::Request(_) => "request",
            Command::Completion { .. } => "completion",
        }
    }
}

#[derive(Subcommand)]
enum GatewayCommand {
    #[command(about = "List gateways")]
    List {
        #[arg(long, help = "Filter by name or description")]
        keyword: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "Show one gateway")]
    Get { id: u64 },
    #[command(about = "Create a gateway")]
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, help = "Make the gateway visible to every developer")]
        public: bool,
        #[arg(long = "maintainer", help = "Maintainer username (repeatable)")]
        maintainers: Vec<String>,
    },
    #[command(about = "Update gateway attributes")]
    Update {
        id: u64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        public: Option<bool>,
        #[arg(long = "maintainer", help = "Replace maintainers (repeatable)")]
        maintainers: Vec<String>,
    },
    #[command(about = "Activate a gateway")]
    Enable { id: u64 },
    #[command(about = "Deactivate a gateway")]
    Disable { id: u64 },
    #[command(about = "Delete an inactive gateway")]
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum StageCommand {
    #[command(about = "List stages")]
    List,
    #[command(about = "Show one stage")]
    Get { id: u64 },
    #[command(about = "Create a stage")]
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "var", value_parser = parse_key_value, help = "Stage variable KEY=VALUE (repeatable)")]
        vars: Vec<(String, String)>,
    },
    #[command(about = "Replace a stage's attributes")]
    Update {
        id: u64,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "var", value_parser = parse_key_value, help = "Stage variable KEY=VALUE (repeatable)")]
        vars: Vec<(String, String)>,
    },
    #[command(about = "Bring a stage online")]
    Enable { id: u64 },
    #[command(about = "Take a stage offline")]
    Disable { id: u64 },
    #[command(about = "Delete a stage")]
    Delete { id: u64 },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ExportFormatCli {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum ResourceCommand {
    #[command(about = "List resources")]
    List {
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[arg(long = "label")]
        label_name: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "Show one resource")]
    Get { id: u64 },
    #[command(about = "Create a resource from a JSON document")]
    Create {
        #[arg(long, help = "JSON body, @file, or - for stdin")]
        body: String,
    },
    #[command(about = "Replace a resource from a JSON document")]
    Update {
        id: u64,
        #[arg(long, help = "JSON body, @file, or - for stdin")]
        body: String,
    },
    #[command(about = "Delete resources")]
    Delete {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    #[command(about = "Export resource definitions to a file")]
    Export {
        #[arg(long, value_enum, default_value = "yaml")]
        format: ExportFormatCli,
        #[arg(long = "id", help = "Export only these resource ids (repeatable)")]
        ids: Vec<u64>,
    },
}

#[derive(Subcommand)]
enum PermissionCommand {
    #[command(about = "List app permissions")]
    List {
        #[arg(long = "app")]
        bk_app_code: Option<String>,
        #[arg(long)]
        resource_id: Option<u64>,
        #[arg(long)]
        keyword: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "Grant an app access to the gateway or to specific resources")]
    Grant {
        #[arg(long = "app")]
        bk_app_code: String,
        #[arg(long = "resource-id", help = "Grant per resource (repeatable); omit for the whole gateway")]
        resource_ids: Vec<u64>,
        #[arg(long, help = "Validity in days; omit for a permanent grant")]
        expire_days: Option<u32>,
    },
    #[command(about = "Extend existing grants")]
    Renew {
        #[arg(long = "id", required = true)]
        ids: Vec<u64>,
        #[arg(long, default_value_t = 180)]
        expire_days: u32,
    },
    #[command(about = "Revoke grants")]
    Revoke {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
}

#[derive(Subcommand)]
enum PluginCommand {
    #[command(about = "List plugin types available for a scope")]
    Types {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        keyword: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "List where a plugin is bound")]
    Bindings { code: String },
    #[command(about = "Bind a plugin with a YAML config")]
    Bind {
        #[command(flatten)]
        scope: ScopeArgs,
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, help = "YAML config file, or - for stdin", value_hint = ValueHint::FilePath)]
        config: String,
    },
    #[command(about = "Remove a plugin binding")]
    Unbind {
        #[command(flatten)]
        scope: ScopeArgs,
        code: String,
        config_id: u64,
    },
}

#[derive(Subcommand)]
enum ReleaseCommand {
    #[command(about = "Publish a resource version to a stage")]
    Publish {
        #[arg(long)]
        stage_id: u64,
        #[arg(long = "version-id")]
        resource_version_id: u64,
        #[arg(long, default_value = "")]
        comment: String,
    },
    #[command(about = "List release history")]
    History {
        #[arg(long)]
        stage_id: Option<u64>,
        #[arg(long)]
        created_by: Option<String>,
        #[arg(long, help = "RFC 3339 lower bound")]
        since: Option<String>,
        #[arg(long, help = "RFC 3339 upper bound")]
        until: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum AlarmCommand {
    #[command(about = "List alarm strategies")]
    Strategies {
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        alarm_type: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "Enable an alarm strategy")]
    Enable { id: u64 },
    #[command(about = "Disable an alarm strategy")]
    Disable { id: u64 },
    #[command(about = "List alarm records")]
    Records {
        #[arg(long)]
        strategy_id: Option<u64>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, help = "RFC 3339 lower bound")]
        since: Option<String>,
        #[arg(long, help = "RFC 3339 upper bound")]
        until: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum SdkCommand {
    #[command(about = "List generated SDKs")]
    List {
        #[arg(long, value_parser = parse_language)]
        language: Option<SdkLanguage>,
        #[arg(long)]
        keyword: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "Generate an SDK for a resource version")]
    Generate {
        #[arg(long = "version-id")]
        resource_version_id: u64,
        #[arg(long, value_parser = parse_language)]
        language: SdkLanguage,
        #[arg(long, default_value = "", help = "SDK version; derived from the resource version when empty")]
        version: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputKind {
    Json,
    Text,
    Download,
}

#[derive(Args)]
struct RequestArgs {
    #[arg(help = "HTTP method: GET, POST, PUT, PATCH, DELETE")]
    method: String,
    #[arg(help = "Path relative to the base URL")]
    path: String,
    #[arg(long, help = "Query (GET/DELETE) or body as JSON, @file, or - for stdin")]
    params: Option<String>,
    #[arg(long = "header", value_parser = parse_header, help = "Extra header NAME:VALUE (repeatable)")]
    headers: Vec<(String, String)>,
    #[arg(long, value_enum, default_value = "json")]
    output: OutputKind,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME:VALUE, got `{raw}`")),
    }
}

fn parse_language(raw: &str) -> Result<SdkLanguage, String> {
    raw.parse::<SdkLanguage>()
        .map_err(|err| err.message().unwrap_or("invalid language").to_string())
}

fn build_client(args: &ConnectionArgs, cmd: &str) -> Result<HttpClient, Error> {
    let base_url = args.base_url.as_deref().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("missing backend base url")
            .with_hint("Pass --base-url or set APIGW_BASE_URL.")
    })?;
    let mut config = ClientConfig::new(base_url)?;
    if let Some(raw) = &args.cookie {
        config = config.with_cookies(CookieJar::parse(raw));
    }
    if let Some(name) = &args.csrf_cookie_name {
        config.csrf_cookie_name = name.clone();
    }
    if let Some(name) = &args.csrf_header {
        config.csrf_header_name = name.clone();
    }
    if let Some(raw) = &args.login_url {
        config = config.with_login_url(raw)?;
    }
    if let Some(millis) = args.timeout_ms {
        config = config.with_timeout(timeout_from_millis(millis));
    }
    if let Some(dir) = &args.download_dir {
        config = config.with_download_dir(dir);
    }

    let transport = if let Some(path) = &args.tls_ca_file {
        UreqTransport::with_tls_ca_file(path)?
    } else if args.tls_skip_verify {
        UreqTransport::with_tls_skip_verify()
    } else {
        UreqTransport::new()
    };
    Ok(HttpClient::new(config)
        .with_transport(transport)
        .with_hooks(NoticeHooks::new(cmd)))
}

/// Reads a JSON argument given inline, as `@path`, or as `-` for stdin.
fn read_json_arg(raw: &str) -> Result<Value, Error> {
    let text = read_text_arg(raw)?;
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid JSON argument")
            .with_hint("Pass a JSON document inline, as @file, or - for stdin.")
            .with_source(err)
    })
}

fn read_text_arg(raw: &str) -> Result<String, Error> {
    if raw == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read stdin")
                .with_source(err)
        })?;
        return Ok(text);
    }
    match raw.strip_prefix('@') {
        Some(path) => read_file(Path::new(path)),
        None => Ok(raw.to_string()),
    }
}

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read file")
            .with_path(path)
            .with_source(err)
    })
}

/// RFC 3339 timestamp to unix seconds.
fn parse_time_arg(flag: &str, raw: Option<&str>) -> Result<Option<i64>, Error> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let ts = time::OffsetDateTime::parse(raw.trim(), &time::format_description::well_known::Rfc3339)
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("{flag} must be an RFC 3339 timestamp"))
                .with_hint("Example: 2026-02-01T00:00:00Z")
                .with_source(err)
        })?;
    Ok(Some(ts.unix_timestamp()))
}

fn emit_json(value: Value) {
    let is_tty = io::stdout().is_terminal();
    let json = if is_tty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Transport => "backend unreachable".to_string(),
        ErrorKind::Http => "request failed".to_string(),
        ErrorKind::Business => "backend rejected the request".to_string(),
        ErrorKind::Unauthorized => "login required".to_string(),
        ErrorKind::Cancelled => "request cancelled".to_string(),
        ErrorKind::Decode => "unexpected response".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(code) = err.code() {
        inner.insert("code".to_string(), json!(code));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(code) = err.code() {
        lines.push(format!(
            "{} {code}",
            colorize_label("code:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(status) = err.status() {
        lines.push(format!(
            "{} {status}",
            colorize_label("status:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn add_transport_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Transport || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check --base-url and that the backend is reachable.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint("Re-run with RUST_LOG=debug for request traces.")
}
