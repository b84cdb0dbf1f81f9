use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "ppsctl")]
#[command(about = "Command-line client for the ppsd job and pipeline APIs", long_about = None)]
struct Cli {
    #[arg(short, long, env = "PPSD_URL", default_value = "http://localhost:651")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a one-off job
    CreateJob {
        #[arg(long)]
        image: String,
        /// Command and arguments
        #[arg(last = true)]
        cmd: Vec<String>,
    },
    /// Show a job and its latest state
    InspectJob { id: String },
    /// List jobs, optionally for one pipeline
    ListJob {
        #[arg(long)]
        pipeline: Option<String>,
    },
    /// Print captured job output
    Logs { id: String },
    /// Create a pipeline fed by a repository
    CreatePipeline {
        name: String,
        #[arg(long)]
        image: String,
        #[arg(long)]
        input_repo: String,
        #[arg(last = true)]
        cmd: Vec<String>,
    },
    /// Show one pipeline
    GetPipeline { name: String },
    /// List all pipelines
    ListPipeline,
    /// Delete a pipeline and stop its controller
    DeletePipeline { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let (method, body) = match cli.command {
        Commands::CreateJob { image, cmd } => {
            ("pps.JobAPI/CreateJob", json!({ "image": image, "cmd": cmd }))
        }
        Commands::InspectJob { id } => ("pps.JobAPI/InspectJob", json!({ "id": id })),
        Commands::ListJob { pipeline } => {
            ("pps.JobAPI/ListJob", json!({ "pipeline_name": pipeline }))
        }
        Commands::Logs { id } => ("pps.JobAPI/GetJobLogs", json!({ "id": id })),
        Commands::CreatePipeline { name, image, input_repo, cmd } => (
            "pps.PipelineAPI/CreatePipeline",
            json!({ "name": name, "image": image, "input_repo": input_repo, "cmd": cmd }),
        ),
        Commands::GetPipeline { name } => ("pps.PipelineAPI/GetPipeline", json!({ "name": name })),
        Commands::ListPipeline => ("pps.PipelineAPI/ListPipeline", json!({})),
        Commands::DeletePipeline { name } => {
            ("pps.PipelineAPI/DeletePipeline", json!({ "name": name }))
        }
    };

    let res = client
        .post(format!("{}/{}", cli.url.trim_end_matches('/'), method))
        .json(&body)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: ppsd returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    match json.get("output").and_then(Value::as_str) {
        Some(output) => print!("{}", output),
        None => println!("{}", serde_json::to_string_pretty(&json)?),
    }
    Ok(())
}
