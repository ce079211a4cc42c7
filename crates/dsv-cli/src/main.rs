//! DSV Table CLI
//!
//! Command-line tool for viewing, converting and transforming delimiter-separated tables.

use clap::{Args, Parser, Subcommand};
use dsv_core::{
    load_file, run_batch, save_file, BatchFile, ColumnRef, Delimiter, Encoding, LineTerminator,
    LoadOptions, RaggedPolicy, RuleFile, RuleSpec, SaveOptions, Session, SessionConfig, Table,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dsv-cli")]
#[command(about = "Delimiter-separated table tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How input files are parsed
#[derive(Args, Clone)]
struct LoadArgs {
    /// Field delimiter (single character, or "tab")
    #[arg(short, long, default_value = "tab")]
    delimiter: Delimiter,

    /// Treat the first row as a header
    #[arg(long)]
    header: bool,

    /// Input encoding (utf-8, utf-8-bom, utf-16le, utf-16be)
    #[arg(short, long, default_value = "utf-8")]
    encoding: Encoding,

    /// Ragged-row policy (reject, pad, fit)
    #[arg(long, default_value = "reject")]
    ragged: RaggedPolicy,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        LoadOptions::new(self.header, self.delimiter, self.encoding).with_ragged(self.ragged)
    }
}

/// How output files are written; anything unset mirrors the input
#[derive(Args, Clone)]
struct SaveArgs {
    /// Output delimiter
    #[arg(long)]
    out_delimiter: Option<Delimiter>,

    /// Output encoding
    #[arg(long)]
    out_encoding: Option<Encoding>,

    /// Write CRLF line endings
    #[arg(long)]
    crlf: bool,
}

impl SaveArgs {
    fn options(&self, load: &LoadOptions) -> SaveOptions {
        let mut save = SaveOptions::from(load);
        if let Some(delimiter) = self.out_delimiter {
            save = save.with_delimiter(delimiter);
        }
        if let Some(encoding) = self.out_encoding {
            save = save.with_encoding(encoding);
        }
        if self.crlf {
            save = save.with_line_terminator(LineTerminator::CrLf);
        }
        save
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and display a single file
    Show {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Print the table as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Re-encode a file with a different delimiter, encoding or line ending
    Convert {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        #[command(flatten)]
        save: SaveArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Apply a rule file to a single file
    Apply {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,

        /// Path to the rule file (JSON)
        #[arg(short, long)]
        rules: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        #[command(flatten)]
        save: SaveArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Write the partial result if a rule fails
        #[arg(long)]
        keep_partial: bool,
    },

    /// Run a batch of files through a rule file
    Batch {
        /// Path to batch file (JSON)
        #[arg(short, long)]
        batch: PathBuf,
    },

    /// Create a rule file template
    CreateRules {
        /// Name for the rule file
        #[arg(short, long)]
        name: String,

        /// Output path for the rule file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create a batch file template
    CreateBatch {
        /// Output path for the batch file
        #[arg(short, long)]
        output: PathBuf,

        /// Root directories to include
        #[arg(short, long)]
        root: Vec<PathBuf>,

        /// Output directory for transformed files
        #[arg(long)]
        export_dir: PathBuf,

        /// Rule file to apply
        #[arg(long)]
        rules: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> dsv_core::Result<()> {
    match command {
        Commands::Show {
            file,
            load,
            limit,
            json,
        } => cmd_show(&file, &load.options(), limit, json),
        Commands::Convert {
            file,
            load,
            save,
            output,
        } => {
            let load = load.options();
            cmd_convert(&file, &load, &save.options(&load), &output)
        }
        Commands::Apply {
            file,
            rules,
            load,
            save,
            output,
            keep_partial,
        } => {
            let load = load.options();
            let save = save.options(&load);
            cmd_apply(&file, &rules, load, &save, &output, keep_partial)
        }
        Commands::Batch { batch } => cmd_batch(&batch),
        Commands::CreateRules { name, output } => cmd_create_rules(&name, &output),
        Commands::CreateBatch {
            output,
            root,
            export_dir,
            rules,
        } => cmd_create_batch(&output, &root, &export_dir, &rules),
    }
}

fn print_table(table: &Table, limit: usize) {
    if let Some(header) = table.header() {
        let names: Vec<&str> = header.iter().collect();
        println!("{}", names.join("\t"));
        println!("{}", "-".repeat(names.len() * 12));
    }

    for row in table.data_rows().iter().take(limit) {
        let values: Vec<&str> = row.iter().collect();
        println!("{}", values.join("\t"));
    }

    if table.data_row_count() > limit {
        println!("... ({} more rows)", table.data_row_count() - limit);
    }
}

fn cmd_show(file: &PathBuf, options: &LoadOptions, limit: usize, json: bool) -> dsv_core::Result<()> {
    let table = load_file(file, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Columns: {}", table.column_count());
    println!("Rows: {}", table.data_row_count());
    println!();
    print_table(&table, limit);

    Ok(())
}

fn cmd_convert(
    file: &PathBuf,
    load: &LoadOptions,
    save: &SaveOptions,
    output: &PathBuf,
) -> dsv_core::Result<()> {
    let table = load_file(file, load)?;
    save_file(output, &table, save)?;

    println!(
        "Converted {} rows: {} ({}, {}) -> {} ({}, {})",
        table.row_count(),
        file.display(),
        load.delimiter(),
        load.encoding(),
        output.display(),
        save.delimiter(),
        save.encoding()
    );

    Ok(())
}

fn cmd_apply(
    file: &PathBuf,
    rules_path: &PathBuf,
    load: LoadOptions,
    save: &SaveOptions,
    output: &PathBuf,
    keep_partial: bool,
) -> dsv_core::Result<()> {
    let rules = RuleFile::load(rules_path)?;
    println!("Loaded rule file '{}' with {} rules", rules.name, rules.rules.len());

    let mut session = Session::open(file, load, SessionConfig::from_env())?;
    log::debug!("history capacity: {:?}", session.history().capacity());
    let pipeline = rules.pipeline();

    match session.run_pipeline(&pipeline) {
        Ok(applied) => {
            println!("Applied {} rules", applied);
        }
        Err(failure) => {
            println!(
                "\nStopped at rule {} ('{}'): {}",
                failure.index, failure.rule, failure.error
            );
            println!("{} rules applied before the failure", failure.index);
            if !keep_partial {
                return Err(failure.error);
            }
        }
    }

    session.save(output, save)?;
    println!("Wrote {} rows to {}", session.table().row_count(), output.display());

    let labels = session.history().undo_labels();
    if !labels.is_empty() {
        println!("\nSteps:");
        for (i, label) in labels.iter().enumerate() {
            println!("  {}. {}", i + 1, label);
        }
    }

    Ok(())
}

fn cmd_batch(batch_path: &PathBuf) -> dsv_core::Result<()> {
    let batch = BatchFile::load(batch_path)?;

    println!("Running batch with rule file {}", batch.rules.display());
    println!("Roots: {:?}", batch.roots);
    println!("Output: {}", batch.output_dir.display());
    println!();

    let report = run_batch(&batch)?;

    println!("Batch complete:");
    println!("  {} files written", report.files_written.len());
    for path in &report.files_written {
        println!("  - {}", path.display());
    }

    if !report.errors.is_empty() {
        println!("\nErrors ({}):", report.errors.len());
        for (path, err) in &report.errors {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}

fn cmd_create_rules(name: &str, output: &PathBuf) -> dsv_core::Result<()> {
    let mut rules = RuleFile::new(name);
    rules.add_rule(RuleSpec::Trim { column: None });
    rules.add_rule(RuleSpec::Replace {
        column: ColumnRef::Name("ColumnName".to_string()),
        find: "old".to_string(),
        replace: "new".to_string(),
    });

    rules.save(output)?;
    println!("Created rule file: {}", output.display());
    println!("Rules: {}", rules.rules.len());
    println!();
    println!("Edit the file to describe your changes, then run:");
    println!(
        "  dsv-cli apply --file <input> --rules {} --output <output>",
        output.display()
    );

    Ok(())
}

fn cmd_create_batch(
    output: &PathBuf,
    roots: &[PathBuf],
    export_dir: &PathBuf,
    rules: &PathBuf,
) -> dsv_core::Result<()> {
    let batch = BatchFile {
        roots: roots.to_vec(),
        extensions: vec!["csv".to_string(), "tsv".to_string()],
        output_dir: export_dir.clone(),
        rules: rules.clone(),
        load: LoadOptions::default(),
        save: None,
    };

    batch.save(output)?;
    println!("Created batch file: {}", output.display());
    println!();
    println!("Edit the file to configure your batch, then run:");
    println!("  dsv-cli batch --batch {}", output.display());

    Ok(())
}
