use clap::{Parser, Subcommand};

use lex_conntool::commands::{config_ops, matrix_ops};
use lex_conntool::trace_init::init_tracing;

#[derive(Parser)]
#[command(name = "conntool", about = "Connection-cost matrix build and check tool")]
struct Cli {
    /// Engine config TOML (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a `rid lid cost` text table into an LXCC matrix
    Compile {
        /// Input text file
        input_txt: String,
        /// Output binary file
        output_file: String,
        /// Input is the dense one-cost-per-line form
        #[arg(long)]
        dense: bool,
    },
    /// Show dimensions and size of a compiled matrix
    Info {
        /// Compiled matrix file
        file: String,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the transition cost for one (right_id, left_id) pair
    Lookup {
        /// Compiled matrix file
        file: String,
        right_id: u16,
        left_id: u16,
    },
    /// Compare a compiled matrix against its source text table
    Verify {
        /// Compiled matrix file
        conn_file: String,
        /// Source text table
        input_txt: String,
        /// Leading records checked exhaustively
        #[arg(long, default_value = "10000")]
        prefix: usize,
        /// After the prefix, check one record in this many
        #[arg(long, default_value = "1")]
        sample: usize,
    },
    /// Print the default config TOML
    ConfigExport,
    /// Validate a config TOML file
    ConfigValidate {
        /// Config file
        file: String,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Command::Compile {
            input_txt,
            output_file,
            dense,
        } => matrix_ops::compile(&input_txt, &output_file, dense, config),
        Command::Info { file, json } => matrix_ops::info(&file, json),
        Command::Lookup {
            file,
            right_id,
            left_id,
        } => matrix_ops::lookup(&file, right_id, left_id, config),
        Command::Verify {
            conn_file,
            input_txt,
            prefix,
            sample,
        } => matrix_ops::verify(&conn_file, &input_txt, prefix, sample, config),
        Command::ConfigExport => config_ops::config_export(),
        Command::ConfigValidate { file } => config_ops::config_validate(&file),
    }
}
