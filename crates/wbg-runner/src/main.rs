use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use wbg_contracts::{
    DEFAULT_GUEST_WASM, ENV_GUEST_WASM, WBG_BINDING_PLAN_SCHEMA_VERSION,
    WBG_RUNNER_REPORT_SCHEMA_VERSION,
};
use wbg_host::config::resolve_unknown_imports;
use wbg_host::{GuestSession, HostConfig, ImportBinding, UnknownImportPolicy};
use wbg_keys::{KeyPair, PrivateKey, SignatureAlgorithm};

mod logging;

use logging::{LogFormat, LogLevel};

#[derive(Parser)]
#[command(name = "wbg-runner")]
#[command(
    about = "Loads a wasm-bindgen key-management guest against an emulated host and exercises its key API.",
    long_about = None
)]
struct Cli {
    /// Compiled guest module.
    #[arg(long, env = ENV_GUEST_WASM, default_value = DEFAULT_GUEST_WASM)]
    wasm: PathBuf,

    #[arg(long, value_enum, default_value_t = SignatureAlgorithm::Ed25519)]
    algorithm: SignatureAlgorithm,

    /// Number of key pairs to generate.
    #[arg(long, default_value_t = 2)]
    iterations: u32,

    /// Overrides WBG_UNKNOWN_IMPORTS.
    #[arg(long, value_enum)]
    unknown_imports: Option<UnknownImportPolicy>,

    #[arg(long)]
    no_string_dedupe: bool,

    /// Print the import binding plan and exit.
    #[arg(long)]
    list_imports: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Serialize)]
struct BindingPlanReport<'a> {
    schema_version: &'static str,
    wasm: String,
    unknown_imports: &'static str,
    imports: &'a [ImportBinding],
}

#[derive(Serialize)]
struct RunReport<'a> {
    schema_version: &'static str,
    wasm: String,
    unknown_imports: &'static str,
    imports: &'a [ImportBinding],
    iterations: Vec<IterationReport>,
    guest_calls: u64,
    typed_arrays: usize,
    entropy_short_reads: u64,
}

#[derive(Serialize)]
struct IterationReport {
    index: u32,
    algorithm: &'static str,
    private_key: String,
    public_key: String,
    /// The private key string parsed back by the guest reproduces itself.
    private_key_round_trip: bool,
    handle_table_size: usize,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.log_level, cli.log_format);

    let config = HostConfig {
        unknown_imports: resolve_unknown_imports(cli.unknown_imports)?,
        dedupe_strings: !cli.no_string_dedupe,
        ..HostConfig::default()
    };
    tracing::info!(
        wasm = %cli.wasm.display(),
        unknown_imports = %config.unknown_imports,
        "loading guest"
    );
    let mut session = GuestSession::from_file(&cli.wasm, &config)
        .with_context(|| format!("load guest: {}", cli.wasm.display()))?;
    let wasm = cli.wasm.display().to_string();

    if cli.list_imports {
        let report = BindingPlanReport {
            schema_version: WBG_BINDING_PLAN_SCHEMA_VERSION,
            wasm,
            unknown_imports: config.unknown_imports.as_str(),
            imports: session.binding_plan(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    let mut iterations = Vec::new();
    for index in 0..cli.iterations {
        iterations.push(
            run_iteration(&mut session, cli.algorithm, index)
                .with_context(|| format!("key pair #{index} ({})", cli.algorithm))?,
        );
    }

    let env = session.env();
    let report = RunReport {
        schema_version: WBG_RUNNER_REPORT_SCHEMA_VERSION,
        wasm,
        unknown_imports: config.unknown_imports.as_str(),
        imports: session.binding_plan(),
        iterations,
        guest_calls: session.guest_calls(),
        typed_arrays: env.arrays().len(),
        entropy_short_reads: env.entropy().short_reads(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

fn run_iteration(
    session: &mut GuestSession,
    algorithm: SignatureAlgorithm,
    index: u32,
) -> Result<IterationReport> {
    let pair = KeyPair::new(session, algorithm)?;
    let private_key = pair.private_key(session)?.to_string(session)?;
    let public_key = pair.public_key(session)?.to_string(session)?;

    let reparsed = PrivateKey::from_string(session, &private_key)?;
    let private_key_round_trip = reparsed.to_string(session)? == private_key;
    if !private_key_round_trip {
        tracing::warn!(index, "private key did not survive a string round trip");
    }
    tracing::info!(index, %algorithm, "key pair generated");

    Ok(IterationReport {
        index,
        algorithm: algorithm.as_str(),
        private_key,
        public_key,
        private_key_round_trip,
        handle_table_size: session.env().handles().live_count(),
    })
}
