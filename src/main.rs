use anyhow::{Context, Result};
use autumnus::{FormatterOption, Options, highlight, themes};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use iocraft::prelude::*;
use std::{
    io::{self, Write},
    path::PathBuf,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::{
    client::DicomWebClient,
    config::Config,
    dicom_json::StowReport,
    ui::{
        ConfigHeader, ErrorMessage, InputPrompt, SeriesList, StowReportView, SuccessMessage,
        WarningMessage,
    },
};

mod client;
mod config;
mod dicom_json;
mod multipart;
mod qido;
mod stow;
mod ui;
mod wado;

const EXAMPLE_DICOMWEB_URL: &str = "http://localhost:8042/dicom-web/";

#[derive(Parser)]
#[command(name = "dicomweb-samples")]
#[command(version)]
#[command(about = "Sample DICOMweb clients: STOW-RS upload, QIDO-RS search and WADO-RS retrieval")]
struct Cli {
    /// Log requests and attachments to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload DICOM files to a STOW-RS endpoint in a single multipart request
    #[command(after_help = "Example: dicomweb-samples stow http://localhost:8042/dicom-web/studies hello.dcm world.dcm")]
    Stow {
        /// STOW-RS endpoint, absolute or relative to the configured DICOMweb root
        #[arg(value_name = "StowUri")]
        stow_uri: String,
        /// DICOM files to upload
        #[arg(value_name = "file", value_hint = ValueHint::AnyPath)]
        files: Vec<PathBuf>,
        /// Upload the files found beneath directory arguments
        #[arg(short, long)]
        recursive: bool,
        /// Also print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Retrieve a study, series or instance over WADO-RS and store each part as a DICOM file
    #[command(after_help = "Example: dicomweb-samples wado http://localhost:8042/dicom-web/studies/1.3.51.0.1.1.192.168.29.133.1681753.1681732")]
    Wado {
        /// WADO-RS URI, absolute or relative to the configured DICOMweb root
        #[arg(value_name = "Uri")]
        uri: String,
        /// Directory receiving the retrieved files
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        output: Option<PathBuf>,
    },
    /// Search for series over QIDO-RS
    #[command(after_help = "Example: dicomweb-samples qido http://localhost:8042/dicom-web/series PatientID=1234")]
    Qido {
        /// QIDO-RS URI, absolute or relative to the configured DICOMweb root
        #[arg(value_name = "Uri")]
        uri: String,
        /// Search parameters, by keyword or tag
        #[arg(value_name = "key=value", value_parser = qido::parse_query_param)]
        query: Vec<(String, String)>,
        /// Also print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Configure dicomweb-samples interactively
    Config,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .finish(),
    );
}

fn main() -> Result<()> {
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    rt.block_on(async {
        match cli.command {
            Commands::Config => interactive_config(),
            command => {
                let config = config::read_config()?;
                let client = DicomWebClient::new();

                match command {
                    Commands::Stow {
                        stow_uri,
                        files,
                        recursive,
                        json,
                    } => send_stow(&client, &config, &stow_uri, files, recursive, json).await,
                    Commands::Wado { uri, output } => {
                        retrieve_wado(&client, &config, &uri, output).await
                    }
                    Commands::Qido { uri, query, json } => {
                        search_qido(&client, &config, &uri, &query, json).await
                    }
                    Commands::Config => unreachable!("handled before reading the configuration"),
                }
            }
        }
    })
}

async fn send_stow(
    client: &DicomWebClient,
    config: &Config,
    stow_uri: &str,
    files: Vec<PathBuf>,
    recursive: bool,
    json: bool,
) -> Result<()> {
    let url = config.resolve_url(stow_uri)?;
    let files = if recursive {
        stow::expand_directories(&files)
    } else {
        files
    };

    let batch = stow::build_batch(&files);
    for skipped in batch.skipped() {
        element!(WarningMessage(
            message: format!("Ignoring {}: {}", skipped.path.display(), skipped.error)
        ))
        .print();
    }
    println!(
        "Uploading {} DICOM file(s) to {}",
        batch.attached().count(),
        url
    );

    let response = client
        .store_instances(url, &batch.content_type, batch.body)
        .await?;

    if !response.status.is_success() {
        warn!(status = %response.status, "STOW-RS server reported an error status");
    }

    if json {
        print_json(&response.body)?;
    }

    let report = StowReport::from_response(&response.body);
    element!(StowReportView(report: report)).print();

    Ok(())
}

fn print_json(body: &serde_json::Value) -> Result<()> {
    let output = highlight(
        &serde_json::to_string_pretty(body)?,
        Options {
            formatter: FormatterOption::Terminal {
                theme: Some(themes::get("ayu_light").expect("Syntax highlighting theme not found")),
            },
            lang_or_file: Some("json"),
        },
    );
    println!("{}", output);
    Ok(())
}

async fn retrieve_wado(
    client: &DicomWebClient,
    config: &Config,
    uri: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let url = config.resolve_url(uri)?;
    let output_dir = output.unwrap_or_else(|| config.output_dir.clone());

    let response = client.retrieve(url).await?;
    let parts = wado::related_parts(&response)?;
    let stored = wado::store_parts(&parts, &output_dir)?;

    for path in &stored {
        println!("Storing DICOM file: {}", path.display());
    }
    element!(SuccessMessage(
        message: format!("Retrieved {} DICOM file(s) into {}", stored.len(), output_dir.display())
    ))
    .print();

    Ok(())
}

async fn search_qido(
    client: &DicomWebClient,
    config: &Config,
    uri: &str,
    query: &[(String, String)],
    json: bool,
) -> Result<()> {
    let url = config.resolve_url(uri)?;
    let response = client.search(url, query).await?;

    if json {
        print_json(&response)?;
    }

    let matches = qido::series_matches(&response)?;
    element!(SeriesList(matches: matches)).print();

    Ok(())
}

fn read_input(prompt: &str, default: Option<&str>, description: Option<&str>) -> Result<String> {
    element! {
        InputPrompt(
            prompt: prompt.to_string(),
            default: default.map(|s| s.to_string()),
            description: description.map(|s| s.to_string())
        )
    }
    .print();

    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();

    match (input.is_empty(), default) {
        (true, Some(def)) => Ok(def.to_string()),
        _ => Ok(input),
    }
}

fn interactive_config() -> Result<()> {
    element!(ConfigHeader()).print();

    let dicomweb_url = loop {
        let url_str = read_input(
            "DICOMweb root URL",
            Some(EXAMPLE_DICOMWEB_URL),
            Some("Relative STOW-RS, QIDO-RS and WADO-RS URIs are resolved against this URL"),
        )?;

        match Url::parse(&url_str) {
            Ok(url) => break url,
            Err(e) => {
                element!(ErrorMessage(message: format!("Invalid URL: {}", e))).print();
                println!();
            }
        }
    };

    let output_dir = read_input(
        "WADO-RS output directory",
        None,
        Some("Optional: where retrieved files are stored (defaults to the current directory)"),
    )?;
    let output_dir = if output_dir.is_empty() {
        None
    } else {
        Some(PathBuf::from(output_dir))
    };

    let path = config::write_config(config::ConfigFile {
        dicomweb_url: Some(dicomweb_url),
        output_dir,
    })?;

    element!(SuccessMessage(message: format!("Configuration written to {}", path.display()))).print();

    Ok(())
}
