//! connector-setup - CloudConnexa Connector Setup
//!
//! Configures this host as a CloudConnexa connector using OpenVPN 3 Linux.
//!
//! # Usage
//!
//! ```bash
//! # Import the profile and start it at boot (systemd-unit mode)
//! sudo connector-setup --token <SETUP_TOKEN>
//!
//! # Write the profile for openvpn3-autoload instead
//! sudo connector-setup --mode autoload --token <SETUP_TOKEN>
//! ```

use clap::{Parser, ValueEnum};
use libconnector::autoload::AutoloadConfig;
use libconnector::dbus::polkit::{is_root, MANAGE_UNIT_FILES_ACTION};
use libconnector::dbus::systemd::{session_unit_name, AUTOLOAD_UNIT};
use libconnector::dbus::{system_bus, ConfigImport, PolkitAuthCheck, SystemdServiceUnit};
use libconnector::validation;
use libconnector::{ConnectorConfig, ConnectorError, ConnectorResult, ProfileFetch, SetupToken};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use zbus::Connection;

/// How the downloaded profile is stored and started
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfigMode {
    /// Files read by openvpn3-autoload.service
    Autoload,
    /// Configuration manager import started by openvpn3-session@.service
    SystemdUnit,
}

impl std::fmt::Display for ConfigMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigMode::Autoload => write!(f, "autoload"),
            ConfigMode::SystemdUnit => write!(f, "systemd-unit"),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "connector-setup")]
#[command(version)]
#[command(about = "CloudConnexa Connector Setup utility", long_about = None)]
struct Cli {
    /// Defines how configuration profiles are imported and stored
    #[arg(long, value_enum, default_value_t = ConfigMode::SystemdUnit)]
    mode: ConfigMode,

    /// This value is provided by the CloudConnexa web portal
    #[arg(long, value_name = "TOKEN_VALUE")]
    token: Option<String>,

    /// Configuration profile name to use
    #[arg(long, default_value = "CloudConnexa")]
    name: String,

    /// Overwrite configuration profile if it already exists
    #[arg(long)]
    force: bool,

    /// Configuration filename prefix for autoload files
    #[arg(long, default_value = "connector")]
    autoload_file_prefix: String,

    /// Do not start and configure the profile to start at boot
    #[arg(long)]
    no_start: bool,

    /// Use OpenVPN Data Channel Offload (DCO) by default
    #[arg(long)]
    dco: bool,

    /// Read settings from a TOML file; environment overrides still apply
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

const INTRO: &str = "CloudConnexa Connector Setup

This utility is used to configure this host as an OpenVPN Connector
for CloudConnexa.  Before this utility can be run, you must have
configured a connector in the CloudConnexa web portal where a setup
token is provided.  This token is used by this utility to download the
proper VPN configuration profile and complete the configuration.
";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match ConnectorConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("\n** ERROR **  {}", e);
                process::exit(e.exit_code());
            }
        },
        None => ConnectorConfig::default(),
    };
    config.apply_env_overrides(|name| std::env::var(name).ok());

    init_logging(&config);

    if config.debug {
        println!("Run mode: {}", cli.mode);
    }

    if cli.mode == ConfigMode::Autoload && config.is_system_root() && !is_root() {
        eprintln!(
            "connector-setup must be run as root with \"{}\" as top level installation directory",
            config.root_dir.display()
        );
        process::exit(2);
    }

    let raw_token = match &cli.token {
        Some(token) => token.clone(),
        None => match prompt_token() {
            Ok(token) => token,
            Err(_) => {
                println!("\n\nAborting\n");
                process::exit(1);
            }
        },
    };

    if let Err(e) = run(&cli, &config, raw_token.trim()).await {
        report_error(&e, &config);
        process::exit(e.exit_code());
    }
}

/// Initialize logging; OPENVPN_CONNECTOR_DEBUG raises the default level
fn init_logging(config: &ConnectorConfig) {
    let default_level = if config.debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Ask for the setup token on stdin; EOF counts as an abort
fn prompt_token() -> io::Result<String> {
    println!("{}", INTRO);
    print!("Enter setup token: ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no token given"));
    }
    println!();
    Ok(line)
}

fn report_error(e: &ConnectorError, config: &ConnectorConfig) {
    match e {
        ConnectorError::Download { url, .. } => {
            eprintln!("\n** ERROR ** {}", e);
            eprintln!("URL: {}", url);
        }
        ConnectorError::Decrypt(cause) => {
            eprintln!("\n** ERROR ** Failed decrypting the downloaded profile: {}", cause);
        }
        _ => {
            eprintln!("\n** ERROR **  {}", e);
            if config.debug {
                eprintln!("\n{:?}", e);
            }
        }
    }
}

/// Print a progress label, run the step, then print "Done"
macro_rules! step {
    ($label:expr, $op:expr) => {{
        print!("{} ... ", $label);
        let _ = io::stdout().flush();
        let result = $op;
        if result.is_ok() {
            println!("Done");
        }
        result
    }};
}

/// System bus connection, opened the first time a step needs it
struct Bus {
    connection: Option<Connection>,
}

impl Bus {
    fn new() -> Self {
        Self { connection: None }
    }

    async fn get(&mut self) -> ConnectorResult<Connection> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }
        let connection = system_bus().await?;
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    /// Root, or authorized by polkit to manage unit files
    async fn admin_access(&mut self) -> ConnectorResult<bool> {
        if is_root() {
            return Ok(true);
        }
        let polkit = PolkitAuthCheck::new(self.get().await?);
        polkit.check_authorization(MANAGE_UNIT_FILES_ACTION, false).await
    }
}

async fn run(cli: &Cli, config: &ConnectorConfig, raw_token: &str) -> ConnectorResult<()> {
    // The token carries the file reference to download and the key to decrypt it
    let token = SetupToken::decode(raw_token, config.file_ref_len)?;
    let mut bus = Bus::new();

    // Check the profile name before spending a download on it
    let mut cfgimport = None;
    match cli.mode {
        ConfigMode::SystemdUnit => {
            let import = ConfigImport::new(bus.get().await?, &cli.name, cli.force).await?;
            if import.name_was_changed() {
                println!(
                    "** INFO **  Spaces stripped from configuration name. New name: {}",
                    import.config_name()
                );
            }
            cfgimport = Some(import);
        }
        ConfigMode::Autoload => validation::validate_file_prefix(&cli.autoload_file_prefix)?,
    }

    let mut profile = ProfileFetch::new(token, config)?;
    step!("Downloading CloudConnexa Connector profile", profile.download().await)?;

    match cfgimport {
        Some(import) => setup_systemd_unit(cli, &mut bus, import, &profile).await,
        None => setup_autoload(cli, config, &mut bus, &profile).await,
    }
}

async fn setup_autoload(
    cli: &Cli,
    config: &ConnectorConfig,
    bus: &mut Bus,
    profile: &ProfileFetch,
) -> ConnectorResult<()> {
    let dir = config.autoload_dir();
    tokio::fs::create_dir_all(&dir).await?;

    let profile_path = dir.join(format!("{}.conf", cli.autoload_file_prefix));
    profile.save(&profile_path).await?;

    let mut autoload = AutoloadConfig::new(&profile_path);
    autoload.set_name(&cli.name);
    autoload.set_autostart(true);
    autoload.set_tunnel_param("persist", true)?;
    autoload.save()?;

    if config.debug {
        println!("Profile: {}", profile_path.display());
        println!("Autoload configuration: {}", autoload.path().display());
    }

    if cli.dco {
        println!("** WARNING ** The openvpn3-autoload mode does not support enabling DCO");
    }

    if !cli.no_start && config.is_system_root() && bus.admin_access().await? {
        let service = SystemdServiceUnit::new(bus.get().await?, AUTOLOAD_UNIT);
        step!(format!("Enabling {} during boot", AUTOLOAD_UNIT), service.enable().await)?;
        step!(format!("Starting {}", AUTOLOAD_UNIT), service.start().await)?;
    }
    Ok(())
}

async fn setup_systemd_unit(
    cli: &Cli,
    bus: &mut Bus,
    mut import: ConfigImport,
    profile: &ProfileFetch,
) -> ConnectorResult<()> {
    if import.will_overwrite() {
        println!("** Warning **  Removing old configuration profile with same name");
    }
    step!(
        format!("Importing VPN configuration profile \"{}\"", import.config_name()),
        import.import(profile.profile()?).await
    )?;

    if cli.dco {
        step!("Enabling Data Channel Offload (DCO)", import.enable_dco().await)?;
    }

    if !is_root() {
        step!(
            "Granting root user access to profile",
            import.enable_ownership_transfer().await
        )?;
    }

    if cli.no_start {
        return Ok(());
    }

    let unit = session_unit_name(import.config_name());
    if bus.admin_access().await? {
        let service = SystemdServiceUnit::new(bus.get().await?, unit.as_str());
        step!(format!("Enabling {} during boot", unit), service.enable().await)?;
        step!(format!("Starting {}", unit), service.start().await)?;
    } else {
        println!(
            "\n** INFO **   You did not run this command as root, so it will not\n\
             \x20            start the connection automatically during boot.  To start\n\
             \x20            at boot time, as root, run this command: \n\n\
             \x20            # systemctl enable --now {}\n",
            unit
        );
    }
    Ok(())
}
