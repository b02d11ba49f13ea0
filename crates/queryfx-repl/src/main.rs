//! QueryFx command-line entry point.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use queryfx::Direction;
use queryfx_repl::config::{resolve_data_path, resolve_engine_config};
use queryfx_repl::session::manager::parse_key_type;
use queryfx_repl::DatasetSession;

#[derive(Parser)]
#[command(
    name = "queryfx",
    about = "Query JSON datasets with lambda expressions",
    version
)]
struct Cli {
    /// Path to a JSON array dataset.
    #[arg(short, long, global = true)]
    data: Option<String>,

    /// Comma-separated imports (core, collections, sequences).
    #[arg(long, global = true)]
    imports: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum QueryOp {
    Where,
    Select,
    OrderBy,
    OrderByDesc,
    First,
    Single,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch interactive REPL mode (default).
    Repl,

    /// Run code and print its value as JSON.
    Eval {
        /// Statements and/or a trailing expression.
        code: String,
    },

    /// Apply one operator to the dataset and print the result as JSON.
    ///
    /// Examples:
    ///   queryfx query where 'r => r.age > 40' --data people.json
    ///   queryfx query order-by 'r => r.name' --key string
    Query {
        op: QueryOp,

        /// Predicate, selector or key selector.
        expression: Option<String>,

        /// Key type for order-by (bool, int, double, char, string).
        #[arg(long, default_value = "int")]
        key: String,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   queryfx completions bash > ~/.local/share/bash-completion/completions/queryfx
    ///   queryfx completions zsh > ~/.zfunc/_queryfx
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_engine_config(cli.imports.as_deref())?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            queryfx_repl::repl::run(cli.data.as_deref(), config)?;
        }

        Commands::Eval { code } => {
            if let Some(value) = queryfx::run_with(&queryfx::Engine::new(config), &code)? {
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }

        Commands::Query {
            op,
            expression,
            key,
        } => {
            let data_path = resolve_data_path(cli.data.as_deref());
            let mut session = DatasetSession::open(&data_path, config)?;
            let expr = expression.as_deref();
            let require = || {
                expr.ok_or_else(|| anyhow::anyhow!("this operator needs an expression"))
            };

            let output = match op {
                QueryOp::Where => {
                    session.filter(require()?)?;
                    serde_json::to_value(session.rows())?
                }
                QueryOp::Select => serde_json::to_value(session.select(require()?)?)?,
                QueryOp::OrderBy | QueryOp::OrderByDesc => {
                    let direction = match op {
                        QueryOp::OrderByDesc => Direction::Descending,
                        _ => Direction::Ascending,
                    };
                    session.order(require()?, parse_key_type(&key)?, direction)?;
                    serde_json::to_value(session.rows())?
                }
                QueryOp::First => session.first(expr)?,
                QueryOp::Single => session.single(expr)?,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "queryfx", &mut std::io::stdout());
        }
    }

    Ok(())
}
