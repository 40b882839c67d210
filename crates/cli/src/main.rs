mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use clap::{Args, Parser, Subcommand};
use runtime::{
    CompletionRequest, GenerationParameters, GenerationResult, Message, Orchestrator,
    ProviderRegistry, TaskType, prompts,
};
use storage::{UsageRecord, UsageStore};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Be concise and direct.";

#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "Route chat completions across LLM providers", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./conduit.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log routing decisions and vendor calls to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Provider and model choice shared by every completion command.
#[derive(Args, Debug, Default)]
struct RouteArgs {
    /// Provider to use (defaults to the first configured one)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model to use (defaults to the provider's recommendation)
    #[arg(short, long)]
    model: Option<String>,

    /// Task hint for picking a model: general, complex, fast, creative
    #[arg(short, long)]
    task: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        #[command(flatten)]
        route: RouteArgs,
        /// System prompt for the conversation
        #[arg(short, long)]
        system: Option<String>,
        /// Print replies as they are generated
        #[arg(long)]
        stream: bool,
    },
    /// Send a single prompt and print the reply
    Ask {
        prompt: String,
        #[command(flatten)]
        route: RouteArgs,
        #[arg(short, long)]
        system: Option<String>,
        #[arg(long)]
        stream: bool,
    },
    /// List configured providers and their models
    Providers,
    /// Show recorded usage
    Usage {
        /// Show only the last N calls
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Turn a natural-language question into SQL
    Sql {
        question: String,
        /// File describing the database schema
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Extra guidance for the model
        #[arg(long, default_value = "")]
        context: String,
        #[command(flatten)]
        route: RouteArgs,
    },
    /// Ask for an analysis of query results
    Analyze {
        request: String,
        /// The SQL query that produced the results
        #[arg(long)]
        query: String,
        /// JSON file holding the query results
        #[arg(long)]
        results: PathBuf,
        #[command(flatten)]
        route: RouteArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.config.as_deref())?;
    let app = App::new(config);

    match cli.command {
        Some(Commands::Chat {
            route,
            system,
            stream,
        }) => app.chat(&route, system.as_deref(), stream).await,
        None => app.chat(&RouteArgs::default(), None, false).await,
        Some(Commands::Ask {
            prompt,
            route,
            system,
            stream,
        }) => {
            let mut request = CompletionRequest::new(prompt);
            if let Some(system) = system {
                request = request.system_prompt(system);
            }
            let text = app.run(app.route(request, &route), stream).await?;
            if !stream {
                println!("{text}");
            }
            Ok(())
        }
        Some(Commands::Providers) => {
            app.providers();
            Ok(())
        }
        Some(Commands::Usage { limit }) => app.usage(limit),
        Some(Commands::Sql {
            question,
            schema,
            context,
            route,
        }) => {
            let schema = match schema {
                Some(path) => read_input(&path)?,
                None => String::new(),
            };
            let request = prompts::sql_generation(&question, &schema, &context);
            let reply = app.run(app.route(request, &route), false).await?;
            println!("{}", prompts::extract_sql(&reply));
            Ok(())
        }
        Some(Commands::Analyze {
            request,
            query,
            results,
            route,
        }) => {
            let results: serde_json::Value = serde_json::from_str(&read_input(&results)?)?;
            let request = prompts::data_analysis(&query, &results, &request);
            let reply = app.run(app.route(request, &route), false).await?;
            println!("{reply}");
            Ok(())
        }
    }
}

struct App {
    orchestrator: Orchestrator,
    parameters: GenerationParameters,
    usage_path: PathBuf,
}

impl App {
    fn new(config: Config) -> Self {
        let registry = ProviderRegistry::from_config(&config.providers);
        let usage_path = config
            .storage
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join("usage.db"));
        Self {
            orchestrator: Orchestrator::new(registry),
            parameters: config.generation.parameters(),
            usage_path,
        }
    }

    /// Apply command-line routing choices and configured parameters.
    fn route(&self, request: CompletionRequest, route: &RouteArgs) -> CompletionRequest {
        let mut request = request.parameters(self.parameters.clone());
        if let Some(task) = &route.task {
            request = request.task(TaskType::parse_lossy(task));
        }
        if let Some(provider) = &route.provider {
            request = request.provider(provider);
        }
        if let Some(model) = &route.model {
            request = request.model(model);
        }
        request
    }

    /// Run a request and return the full reply text. Streamed fragments are
    /// printed as they arrive.
    async fn run(&self, request: CompletionRequest, stream: bool) -> Result<String> {
        if !stream {
            let result = self.orchestrator.generate(request).await?;
            self.record(&result);
            return Ok(result.text);
        }

        let mut fragments = self.orchestrator.stream(request).await?;
        let mut stdout = io::stdout();
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            print!("{fragment}");
            stdout.flush()?;
            text.push_str(&fragment);
        }
        println!();
        Ok(text)
    }

    /// Append a finished call to the usage ledger. Failures are logged, not
    /// fatal: the reply has already been produced.
    fn record(&self, result: &GenerationResult) {
        let record = UsageRecord::new(
            &result.provider,
            &result.model,
            result.usage.input_tokens,
            result.usage.output_tokens,
            result.elapsed_ms,
        );
        let appended = self
            .usage_path
            .parent()
            .map_or(Ok(()), |dir| std::fs::create_dir_all(dir))
            .map_err(Error::from)
            .and_then(|()| Ok(UsageStore::open(&self.usage_path)?))
            .and_then(|store| Ok(store.append(&record)?));
        if let Err(e) = appended {
            warn!(path = %self.usage_path.display(), error = %e, "failed to record usage");
        }
    }

    async fn chat(&self, route: &RouteArgs, system: Option<&str>, stream: bool) -> Result<()> {
        println!("conduit v{}", env!("CARGO_PKG_VERSION"));

        let resolved = self.orchestrator.registry().resolve(
            route.provider.as_deref(),
            route.model.as_deref(),
            route.task.as_deref().map_or(TaskType::General, TaskType::parse_lossy),
        )?;
        println!("Provider: {}", resolved.provider_name());
        println!("Model: {}", resolved.model);
        println!("Type 'quit' or Ctrl+D to exit.\n");

        let system = system.unwrap_or(SYSTEM_PROMPT);
        let mut history: Vec<Message> = Vec::new();
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF
                break;
            }

            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if input == "quit" || input == "exit" {
                break;
            }

            let request = CompletionRequest::new(input)
                .system_prompt(system)
                .history(history.clone());
            if stream {
                println!();
            }
            match self.run(self.route(request, route), stream).await {
                Ok(reply) => {
                    if stream {
                        println!();
                    } else {
                        println!("\n{reply}\n");
                    }
                    history.push(Message::user(input));
                    history.push(Message::assistant(reply));
                }
                Err(e) => {
                    eprintln!("Error: {e}\n");
                }
            }
        }

        println!("\nSession ended.");
        Ok(())
    }

    fn providers(&self) {
        let registry = self.orchestrator.registry();
        if registry.is_empty() {
            println!("No providers configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY.");
            return;
        }

        let default = registry.default_provider();
        for (name, models) in registry.all_models() {
            let marker = if default.as_deref() == Some(name.as_str()) {
                " (default)"
            } else {
                ""
            };
            println!("{name}{marker}");
            let picks: Vec<(TaskType, Option<String>)> = TaskType::ALL
                .iter()
                .map(|&task| (task, registry.recommended_model(&name, task)))
                .collect();
            for model in models {
                let tasks: Vec<&str> = picks
                    .iter()
                    .filter(|(_, pick)| pick.as_deref() == Some(model.as_str()))
                    .map(|(task, _)| task.as_str())
                    .collect();
                if tasks.is_empty() {
                    println!("  {model}");
                } else {
                    println!("  {model}  [{}]", tasks.join(", "));
                }
            }
        }
    }

    fn usage(&self, limit: usize) -> Result<()> {
        if !self.usage_path.exists() {
            return Err(Error::DatabaseNotFound {
                path: self.usage_path.clone(),
            });
        }
        let store = UsageStore::open(&self.usage_path)?;
        let records = store.recent(limit)?;

        if records.is_empty() {
            println!("No usage recorded.");
            return Ok(());
        }

        println!(
            "{:<16}  {:<10}  {:<28}  {:>8}  {:>8}  {:>9}",
            "TIME", "PROVIDER", "MODEL", "IN", "OUT", "MS"
        );
        println!("{}", "-".repeat(88));
        for record in &records {
            let time = Local
                .from_utc_datetime(&record.timestamp.naive_utc())
                .format("%Y-%m-%d %H:%M");
            println!(
                "{:<16}  {:<10}  {:<28}  {:>8}  {:>8}  {:>9.0}",
                time.to_string(),
                record.provider,
                record.model,
                record.input_tokens,
                record.output_tokens,
                record.elapsed_ms
            );
        }

        let summary = store.summary()?;
        println!(
            "\n{} requests, {} input tokens, {} output tokens",
            summary.total_requests, summary.total_input_tokens, summary.total_output_tokens
        );
        for p in &summary.by_provider {
            println!(
                "  {:<10}  {} requests, {} in, {} out",
                p.provider, p.requests, p.input_tokens, p.output_tokens
            );
        }
        Ok(())
    }
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::ReadInput {
        path: path.to_path_buf(),
        source,
    })
}

fn data_dir() -> PathBuf {
    dirs_data_dir().unwrap_or_else(|| ".conduit".into())
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/conduit"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("conduit"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("conduit"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
