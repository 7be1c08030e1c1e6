use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gatekeeper-cli")]
#[command(about = "Client for the upload gatekeeper", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000", env = "GATEKEEPER_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and print the verdict
    Upload {
        /// File to send
        path: PathBuf,

        /// Filename to claim instead of the file's own name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Check server status
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Upload { path, name } => {
            let data = tokio::fs::read(&path).await?;
            let claimed = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let form = Form::new().part("file", Part::bytes(data).file_name(claimed));
            client
                .post(format!("{base}/upload"))
                .multipart(form)
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{base}/health")).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }

    if status.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Error: server returned status {status}");
        Ok(ExitCode::FAILURE)
    }
}
