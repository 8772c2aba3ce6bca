//! CLI for litman - manage papers and build bibliographies from citations.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use litman::{
    assemble_bibliography, check_bibliography, import_bib, import_pdf, logging, search, stats,
    BibliographyDocument, CitationExtractor, Config, ItemFilter, ItemStore, JournalAbbreviationMap,
    LookupError, Normalizer, Pdftotext, StoreError,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Manage a literature collection and generate bibliographies
#[derive(Parser)]
#[command(name = "litman")]
#[command(version)]
#[command(after_help = "\
Examples:
  litman gen-bib paper.tex
  litman gen-bib chapters/ -o thesis.bib --normalize-titles --expand-journals
  litman check-bib thesis.bib --journal-map journals.json
  litman show Smith2020 --fuzzy")]
struct Cli {
    /// Config file (default: $LITMAN_CONFIG or ~/.config/litman/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Literature directory, overriding the config file
    #[arg(long, global = true)]
    lit_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable coloured log output
    #[arg(long, global = true)]
    no_colour: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a .bib file from the citations in a source file or directory
    #[command(after_help = "\
Examples:
  litman gen-bib paper.tex              # writes paper.bib
  litman gen-bib chapters/ -o thesis.bib
  litman gen-bib paper.tex --dry-run --normalize-titles")]
    GenBib {
        /// Source file, or directory scanned for source files
        input: PathBuf,

        /// Output file (default: input with a .bib extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the bibliography instead of writing it
        #[arg(short, long)]
        dry_run: bool,

        /// Title-case titles and protect them with braces
        #[arg(long)]
        normalize_titles: bool,

        /// Replace abbreviated journal names with full names
        #[arg(long)]
        expand_journals: bool,

        /// Journal abbreviation table (JSON), overriding the config file
        #[arg(long)]
        journal_map: Option<PathBuf>,
    },

    /// Report inconsistent names and fields in a .bib file
    CheckBib {
        /// BibTeX file to check
        bibfile: PathBuf,

        /// Journal abbreviation table (JSON), overriding the config file
        #[arg(long)]
        journal_map: Option<PathBuf>,
    },

    /// Print the citation keys found in a source file or directory
    Cites {
        input: PathBuf,
    },

    /// Import every entry of the .bib files below a directory
    ImportBib {
        dir: PathBuf,
    },

    /// Import every PDF below a directory and extract its text
    ImportPdf {
        dir: PathBuf,
    },

    /// List items
    List {
        /// Only items with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Only items with bib data
        #[arg(long, conflicts_with = "no_bib")]
        has_bib: bool,

        /// Only items without bib data
        #[arg(long)]
        no_bib: bool,

        /// Only items with a PDF
        #[arg(long, conflicts_with = "no_pdf")]
        has_pdf: bool,

        /// Only items without a PDF
        #[arg(long)]
        no_pdf: bool,

        #[arg(short, long, value_enum, default_value_t = SortKey::Name)]
        sort: SortKey,

        /// Reverse the order
        #[arg(short, long)]
        reverse: bool,
    },

    /// Show one item
    Show {
        key: String,

        /// Accept a unique prefix of the item name
        #[arg(long)]
        fuzzy: bool,
    },

    /// Open the DOI of an item in the browser
    OpenDoi {
        key: String,

        /// Accept a unique prefix of the item name
        #[arg(long)]
        fuzzy: bool,

        /// Print the URL without opening it
        #[arg(long)]
        print: bool,
    },

    /// Open one of an item's files in $EDITOR
    Edit {
        key: String,

        #[arg(value_enum)]
        file: ItemFile,
    },

    /// Add a tag to an item
    Tag {
        key: String,
        tag: String,
    },

    /// Regex search over extracted PDF text
    Search {
        pattern: String,

        #[arg(short, long)]
        ignore_case: bool,

        /// Only print the number of matches per item
        #[arg(short, long)]
        num_matches_only: bool,

        /// Characters of context either side of a match
        #[arg(short, long, default_value_t = litman::search::DEFAULT_CONTEXT)]
        context: usize,
    },

    /// Tag and bib field counts
    Stats,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ItemFile {
    Bib,
    Notes,
    Title,
    Tags,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortKey {
    Name,
    Year,
}

// ---------------------------------------------------------------------------
// AppError: semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10: source or bib file not found / unreadable / invalid
    Input(String),
    /// Exit 11: literature directory cannot be read or written
    Store(String),
    /// Exit 12: journal map missing or invalid
    JournalMap(String),
    /// Exit 13: no item matches the key
    ItemNotFound(String),
    /// Exit 14: config file invalid
    Config(String),
    /// Exit 15: cannot write output
    Output(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Input(_) => 10,
            AppError::Store(_) => 11,
            AppError::JournalMap(_) => 12,
            AppError::ItemNotFound(_) => 13,
            AppError::Config(_) => 14,
            AppError::Output(_) => 15,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Input(msg) => {
                write!(f, "{}\n  hint: verify the path is correct", msg)
            }
            AppError::Store(msg) => {
                write!(
                    f,
                    "{}\n  hint: check --lit-dir or lit_dir in the config file",
                    msg
                )
            }
            AppError::JournalMap(msg) => {
                write!(
                    f,
                    "{}\n  hint: pass --journal-map or set journal_map in the config file; the file must be a JSON object of abbreviation to full name",
                    msg
                )
            }
            AppError::ItemNotFound(msg) => {
                write!(f, "{}\n  hint: use 'litman list' to see item names", msg)
            }
            AppError::Config(msg) => {
                write!(f, "{}", msg)
            }
            AppError::Output(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e.to_string())
    }
}

impl From<LookupError> for AppError {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::Ambiguous { key, candidates } => AppError::ItemNotFound(format!(
                "'{}' is ambiguous, candidates: {}",
                key,
                candidates.join(", ")
            )),
            LookupError::NotFound(_) => AppError::ItemNotFound(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    logging::init(
        logging::level_for(cli.verbose, cli.quiet),
        !cli.no_colour,
        cli.log_file.as_deref(),
    )
    .map_err(|e| AppError::Output(format!("log file: {}", e)))?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(|e| AppError::Config(e.to_string()))?;
    if let Some(lit_dir) = cli.lit_dir {
        config.lit_dir = lit_dir;
    }

    match cli.command {
        Commands::GenBib {
            input,
            output,
            dry_run,
            normalize_titles,
            expand_journals,
            journal_map,
        } => {
            let options = GenBibOptions {
                output,
                dry_run,
                normalize_titles,
                expand_journals,
                journal_map,
            };
            gen_bib_command(&config, &input, options)?;
        }
        Commands::CheckBib {
            bibfile,
            journal_map,
        } => {
            check_bib_command(&config, &bibfile, journal_map.as_deref())?;
        }
        Commands::Cites { input } => {
            cites_command(&config, &input)?;
        }
        Commands::ImportBib { dir } => {
            let mut store = open_store(&config)?;
            let summary = import_bib(&mut store, &dir)?;
            eprintln!(
                "imported {}: {} created, {} attached, {} skipped",
                dir.display(),
                summary.created,
                summary.attached,
                summary.skipped
            );
        }
        Commands::ImportPdf { dir } => {
            let mut store = open_store(&config)?;
            let summary = import_pdf(&mut store, &dir, &Pdftotext)?;
            eprintln!(
                "imported {}: {} created, {} attached, {} skipped",
                dir.display(),
                summary.created,
                summary.attached,
                summary.skipped
            );
        }
        Commands::List {
            tag,
            has_bib,
            no_bib,
            has_pdf,
            no_pdf,
            sort,
            reverse,
        } => {
            let filter = ItemFilter {
                tag,
                has_bib: presence(has_bib, no_bib),
                has_pdf: presence(has_pdf, no_pdf),
                ..Default::default()
            };
            list_command(&config, &filter, sort, reverse)?;
        }
        Commands::Show { key, fuzzy } => {
            show_command(&config, &key, fuzzy)?;
        }
        Commands::OpenDoi { key, fuzzy, print } => {
            open_doi_command(&config, &key, fuzzy, print)?;
        }
        Commands::Edit { key, file } => {
            edit_command(&config, &key, file)?;
        }
        Commands::Tag { key, tag } => {
            let mut store = open_store(&config)?;
            let name = store.resolve(&key, false)?.name().to_string();
            if let Some(item) = store.get_mut(&name) {
                item.append_tag(&tag)?;
            }
        }
        Commands::Search {
            pattern,
            ignore_case,
            num_matches_only,
            context,
        } => {
            search_command(&config, &pattern, ignore_case, num_matches_only, context)?;
        }
        Commands::Stats => {
            stats_command(&config)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct GenBibOptions {
    output: Option<PathBuf>,
    dry_run: bool,
    normalize_titles: bool,
    expand_journals: bool,
    journal_map: Option<PathBuf>,
}

/// Extract citations, assemble the bibliography, normalize, write.
fn gen_bib_command(config: &Config, input: &Path, options: GenBibOptions) -> Result<(), AppError> {
    // 1. Extract citation keys
    let extractor = extractor_for(config)?;
    let cites = extractor
        .extract_input(input, &config.source_extension)
        .map_err(|e| AppError::Input(e.to_string()))?;

    // 2. Assemble records from the store
    let store = open_store(config)?;
    let mut assembly = assemble_bibliography(&cites.keys, &store);

    // 3. Normalize
    let journals = if options.expand_journals {
        Some(load_journals(config, options.journal_map.as_deref())?)
    } else {
        None
    };
    let mut normalizer = Normalizer::new();
    if options.normalize_titles {
        normalizer = normalizer.with_title_case(config.title_exceptions.iter().cloned());
    }
    if let Some(map) = &journals {
        normalizer = normalizer.with_journals(map);
    }
    normalizer.apply(&mut assembly.document);

    // 4. Write to file or stdout
    if options.dry_run {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{}", assembly.document.to_bibtex())
            .map_err(|e| AppError::Output(format!("stdout: {}", e)))?;
    } else {
        let output = options
            .output
            .unwrap_or_else(|| input.with_extension("bib"));
        assembly
            .document
            .write_to(&output)
            .map_err(|e| AppError::Output(format!("'{}': {}", output.display(), e)))?;
        eprintln!(
            "wrote {} entries to {} ({} missing, {} without bib)",
            assembly.document.len(),
            output.display(),
            assembly.missing.len(),
            assembly.without_bib.len()
        );
    }

    Ok(())
}

fn check_bib_command(
    config: &Config,
    bibfile: &Path,
    journal_map: Option<&Path>,
) -> Result<(), AppError> {
    let doc = BibliographyDocument::from_file(bibfile)
        .map_err(|e| AppError::Input(format!("'{}': {}", bibfile.display(), e)))?;

    let journals = match journal_map.or(config.journal_map.as_deref()) {
        Some(_) => Some(load_journals(config, journal_map)?),
        None => None,
    };

    let findings = check_bibliography(&doc, journals.as_ref());
    for finding in &findings {
        println!("{}", finding);
    }
    eprintln!("checked {} entries, {} finding(s)", doc.len(), findings.len());
    Ok(())
}

fn cites_command(config: &Config, input: &Path) -> Result<(), AppError> {
    let extractor = extractor_for(config)?;
    let cites = extractor
        .extract_input(input, &config.source_extension)
        .map_err(|e| AppError::Input(e.to_string()))?;

    for (command, keys) in &cites.by_command {
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        println!("{}: {}", command, keys.join(", "));
    }
    eprintln!("{} unique key(s)", cites.keys.len());
    Ok(())
}

fn list_command(
    config: &Config,
    filter: &ItemFilter,
    sort: SortKey,
    reverse: bool,
) -> Result<(), AppError> {
    let store = open_store(config)?;
    let mut items = store.items(filter);
    if sort == SortKey::Year {
        items.sort_by_key(|item| item.year());
    }
    if reverse {
        items.reverse();
    }

    let width = items.iter().map(|i| i.name().len()).max().unwrap_or(0);
    for item in items {
        let year = item.year().map(|y| y.to_string()).unwrap_or_default();
        let title: String = item.title().chars().take(50).collect();
        let tags: Vec<&str> = item.tags().iter().map(String::as_str).collect();
        println!(
            "{:width$}  {:4}  {}{}  {:50}  {}",
            item.name(),
            year,
            if item.has_pdf() { 'P' } else { '-' },
            if item.has_bib() { 'B' } else { '-' },
            title,
            tags.join(","),
            width = width
        );
    }
    Ok(())
}

/// `--has-x` / `--no-x` pair as a filter value.
fn presence(has: bool, has_not: bool) -> Option<bool> {
    match (has, has_not) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn open_doi_command(config: &Config, key: &str, fuzzy: bool, print: bool) -> Result<(), AppError> {
    let store = open_store(config)?;
    let item = store.resolve(key, fuzzy)?;
    let url = item
        .doi_url()
        .ok_or_else(|| AppError::Input(format!("'{}' has no DOI", item.name())))?;

    println!("Name: {}", item.name());
    println!("{}", url);
    if !print {
        open::that(&url).map_err(|e| AppError::Output(format!("cannot open {}: {}", url, e)))?;
    }
    Ok(())
}

fn edit_command(config: &Config, key: &str, file: ItemFile) -> Result<(), AppError> {
    let store = open_store(config)?;
    let item = store.resolve(key, false)?;
    let path = match file {
        ItemFile::Bib => item.bib_path(),
        ItemFile::Notes => item.notes_path(),
        ItemFile::Title => item.title_path(),
        ItemFile::Tags => item.tags_path(),
    };

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());
    tracing::debug!("{} {}", editor, path.display());
    let status = process::Command::new(&editor)
        .arg(&path)
        .status()
        .map_err(|e| AppError::Output(format!("cannot run editor '{}': {}", editor, e)))?;
    if !status.success() {
        return Err(AppError::Output(format!("editor '{}' exited with {}", editor, status)));
    }
    Ok(())
}

fn show_command(config: &Config, key: &str, fuzzy: bool) -> Result<(), AppError> {
    let store = open_store(config)?;
    let item = store.resolve(key, fuzzy)?;
    let tags: Vec<&str> = item.tags().iter().map(String::as_str).collect();

    println!("Name: {}", item.name());
    println!("DOI: {}", item.doi_url().unwrap_or_default());
    println!("title: {}", item.title());
    println!("authors: {}", item.authors());
    println!(
        "year: {}",
        item.year().map(|y| y.to_string()).unwrap_or_default()
    );
    println!("has_pdf: {}", item.has_pdf());
    println!("has_bib: {}", item.has_bib());
    println!("has_extracted_text: {}", item.has_extracted_text());
    println!("tags: {}", tags.join(","));
    if let Some(record) = item.bib() {
        println!("===============");
        print!("{}", record.to_bibtex());
        println!("===============");
    }
    if let Some(text) = item.extracted_text()? {
        println!("===============");
        for line in text.lines().take(20) {
            println!("{}", line);
        }
        println!("===============");
    }
    Ok(())
}

fn search_command(
    config: &Config,
    pattern: &str,
    ignore_case: bool,
    num_matches_only: bool,
    context: usize,
) -> Result<(), AppError> {
    let store = open_store(config)?;
    let results = search(&store, pattern, ignore_case, context).map_err(|e| match e {
        litman::SearchError::Store(e) => AppError::Store(e.to_string()),
        e => AppError::Input(e.to_string()),
    })?;

    for item in &results {
        if num_matches_only {
            println!("{}:{}", item.name, item.matches.len());
            continue;
        }
        for m in &item.matches {
            println!("{}:{}", item.name, m.context);
        }
    }
    Ok(())
}

fn stats_command(config: &Config) -> Result<(), AppError> {
    let store = open_store(config)?;
    let stats = stats(&store);

    println!("items: {}", stats.items);
    println!("tags");
    for (tag, count) in &stats.tags {
        println!("  {}: {}", tag, count);
    }
    for (field, counts) in &stats.fields {
        println!("{}", field);
        for (value, count) in counts {
            println!("  {}: {}", value, count);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_store(config: &Config) -> Result<ItemStore, AppError> {
    ItemStore::open(&config.lit_dir)
        .map_err(|e| AppError::Store(format!("'{}': {}", config.lit_dir.display(), e)))
}

fn extractor_for(config: &Config) -> Result<CitationExtractor, AppError> {
    CitationExtractor::new(&config.cite_commands).map_err(|e| AppError::Config(e.to_string()))
}

/// Loads the journal table from `flag`, falling back to the config file.
fn load_journals(config: &Config, flag: Option<&Path>) -> Result<JournalAbbreviationMap, AppError> {
    let path = flag
        .or(config.journal_map.as_deref())
        .ok_or_else(|| AppError::JournalMap("no journal map configured".to_string()))?;
    JournalAbbreviationMap::load(path)
        .map_err(|e| AppError::JournalMap(format!("'{}': {}", path.display(), e)))
}
