use clap::{ArgAction, Parser, Subcommand};
use graph_sdk::{Graph, GraphConfig, GraphEdge, NodeKind, Params, RequestOptions, params};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "graph-cli")]
#[command(about = "Command-line host for the Graph SDK")]
struct Cli {
    /// Falls back to FACEBOOK_APP_ID.
    #[arg(long, global = true)]
    app_id: Option<String>,
    /// Falls back to FACEBOOK_APP_SECRET.
    #[arg(long, global = true)]
    app_secret: Option<String>,
    #[arg(long, global = true)]
    access_token: Option<String>,
    #[arg(long, global = true)]
    graph_version: Option<String>,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    beta: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Get(GetArgs),
    UploadVideo(UploadVideoArgs),
    LoginUrl(LoginUrlArgs),
}

#[derive(clap::Args, Debug)]
struct GetArgs {
    endpoint: String,
    /// Follow `next` pages until this many pages were printed.
    #[arg(long, default_value_t = 1)]
    pages: u32,
}

#[derive(clap::Args, Debug)]
struct UploadVideoArgs {
    /// Node that receives the video, e.g. `me` or a page id.
    target: String,
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Budget for all transfer attempts of the upload. Successful chunks
    /// count too, so it must exceed the number of chunks the server asks for.
    #[arg(long, default_value_t = 100)]
    max_tries: u32,
}

#[derive(clap::Args, Debug)]
struct LoginUrlArgs {
    #[arg(long)]
    redirect_url: String,
    #[arg(long = "scope")]
    scopes: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match build_graph(&cli) {
        Ok(graph) => {
            let options = request_options(&cli);
            match cli.command {
                Commands::Get(args) => get_command(&graph, args, options).await,
                Commands::UploadVideo(args) => upload_video_command(&graph, args, options).await,
                Commands::LoginUrl(args) => login_url_command(&graph, args).await,
            }
        }
        Err(error) => Err(error),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn build_graph(cli: &Cli) -> Result<Graph, String> {
    Graph::new(GraphConfig {
        app_id: cli.app_id.clone(),
        app_secret: cli.app_secret.clone(),
        default_graph_version: cli.graph_version.clone(),
        enable_beta_mode: cli.beta,
        ..GraphConfig::default()
    })
    .map_err(|error| error.to_string())
}

fn request_options(cli: &Cli) -> RequestOptions {
    match cli.access_token.as_deref() {
        Some(token) => RequestOptions::new().with_access_token(token),
        None => RequestOptions::new(),
    }
}

async fn get_command(
    graph: &Graph,
    args: GetArgs,
    options: RequestOptions,
) -> Result<ExitCode, String> {
    let response = graph
        .get(&args.endpoint, options)
        .await
        .map_err(|error| error.to_string())?;

    let is_list = response
        .decoded_body()
        .get("data")
        .is_some_and(Value::is_array);
    if !is_list || args.pages <= 1 {
        print_json(response.decoded_body())?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut edge = response.graph_edge(NodeKind::Node);
    let mut printed = 1;
    print_edge(&edge)?;
    while printed < args.pages {
        match graph.next(&edge).await.map_err(|error| error.to_string())? {
            Some(next) if !next.is_empty() => {
                print_edge(&next)?;
                edge = next;
                printed += 1;
            }
            _ => break,
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn upload_video_command(
    graph: &Graph,
    args: UploadVideoArgs,
    options: RequestOptions,
) -> Result<ExitCode, String> {
    let metadata: Params = params(
        [("title", args.title), ("description", args.description)]
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value))),
    );

    let result = graph
        .upload_video(&args.target, &args.file, metadata, options, args.max_tries)
        .await
        .map_err(|error| error.to_string())?;
    let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

async fn login_url_command(graph: &Graph, args: LoginUrlArgs) -> Result<ExitCode, String> {
    let scopes: Vec<&str> = args.scopes.iter().map(String::as_str).collect();
    let url = graph
        .redirect_login_helper()
        .login_url(&args.redirect_url, &scopes)
        .await
        .map_err(|error| error.to_string())?;
    println!("{url}");
    Ok(ExitCode::SUCCESS)
}

fn print_edge(edge: &GraphEdge) -> Result<(), String> {
    let nodes: Vec<&Value> = edge.iter().map(|node| node.fields()).collect();
    print_json(&json!({ "data": nodes }))
}

fn print_json(value: &Value) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}
