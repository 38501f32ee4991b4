mod ai;
mod clock;
mod config;
mod db;
mod error;
mod export;
mod governor;
mod models;
mod tui;
mod views;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ai::{ExtractionProvider, GeminiProvider};
use clock::SystemClock;
use config::{ApiKeySource, Config};
use db::{estimate_size_bytes, Database, API_KEY_KEY};
use governor::{Governor, DAILY_LIMIT, MINUTE_LIMIT};
use models::{normalize_rating, Card, CardDraft, CardIcon, CompanyData, ThemeColor};
use views::{Period, STORAGE_SOFT_LIMIT_BYTES};

#[derive(Parser)]
#[command(name = "intel")]
#[command(about = "Company intelligence cards - salary bands, ratings, and notes per company")]
struct Cli {
    /// Path to the card database
    #[arg(long, global = true, env = "INTEL_DB")]
    db: Option<PathBuf>,

    /// Gemini model used for direct extraction
    #[arg(long, global = true, env = "INTEL_MODEL")]
    model: Option<String>,

    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Print the extraction prompt for a company URL (paste it into a chat)
    Prompt {
        /// Company website
        url: String,
    },

    /// Save a card from pasted AI JSON output
    Paste {
        /// Read the JSON from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Company URL; overrides the website in the JSON
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Extract a card directly through the API (rate limited)
    Extract {
        /// Company website
        url: String,

        /// Print the result without saving it
        #[arg(long)]
        no_save: bool,
    },

    /// Add a card by hand
    Add {
        /// Company name
        company: String,

        #[command(flatten)]
        fields: CardFields,
    },

    /// List saved cards
    List {
        /// Case-insensitive match on company name or role
        #[arg(short, long, default_value = "")]
        search: String,

        /// Exact company type (Startup, Enterprise, ...) or All
        #[arg(short = 't', long = "type", default_value = views::ALL_TYPES)]
        company_type: String,

        /// Show salaries per year or per month
        #[arg(short, long, default_value = "year")]
        period: Period,
    },

    /// Show card details
    Show {
        /// Card ID
        id: String,

        #[arg(short, long, default_value = "year")]
        period: Period,
    },

    /// Edit fields of a saved card
    Edit {
        /// Card ID
        id: String,

        /// New company name
        #[arg(long)]
        company: Option<String>,

        #[command(flatten)]
        fields: CardFields,
    },

    /// Delete a card
    Delete {
        /// Card ID
        id: String,
    },

    /// Delete every saved card
    Clear {
        /// Confirm; this cannot be undone
        #[arg(long)]
        yes: bool,
    },

    /// List company types present in the collection
    Types,

    /// Show storage usage against the soft limit
    Storage,

    /// Show API request usage
    Usage,

    /// Export all cards
    Export {
        /// csv or tsv
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Output file (csv defaults to company_intel_data_<date>.csv, tsv to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Browse the deck interactively
    Browse,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store an API key
    Set {
        key: String,
    },

    /// Remove the stored API key
    Clear,

    /// Show whether a key is available
    Status,
}

#[derive(Args, Default)]
struct CardFields {
    /// Role title
    #[arg(long)]
    role: Option<String>,

    /// Annual entry-level salary
    #[arg(long)]
    entry: Option<u64>,

    /// Annual mid-level salary
    #[arg(long)]
    mid: Option<u64>,

    /// Currency code (USD, EUR, VND, ...)
    #[arg(long)]
    currency: Option<String>,

    /// Country or location
    #[arg(long)]
    country: Option<String>,

    /// Product kind (Product, Tech, Service, Platform)
    #[arg(long)]
    kind: Option<String>,

    /// Company type (Startup, Scale-up, Enterprise, ...)
    #[arg(long = "company-type")]
    company_type: Option<String>,

    /// Industry domain (SaaS, FinTech, ...)
    #[arg(long)]
    domain: Option<String>,

    #[arg(long)]
    website: Option<String>,

    /// Where the salary numbers come from
    #[arg(long)]
    explanation: Option<String>,

    /// Workplace rating 1-5
    #[arg(long)]
    workplace: Option<u8>,

    /// Size rating 1-5
    #[arg(long)]
    size: Option<u8>,

    /// Theme color
    #[arg(long)]
    theme: Option<ThemeColor>,

    /// Icon glyph or "briefcase"
    #[arg(long)]
    icon: Option<CardIcon>,
}

impl CardFields {
    fn apply(&self, data: &mut CompanyData) {
        if let Some(v) = &self.role {
            data.role = v.clone();
        }
        if let Some(v) = self.entry {
            data.entry_level_salary = v;
        }
        if let Some(v) = self.mid {
            data.mid_level_salary = v;
        }
        if let Some(v) = &self.currency {
            data.currency = v.to_uppercase();
        }
        if let Some(v) = &self.country {
            data.country = v.clone();
        }
        if let Some(v) = &self.kind {
            data.kind = v.clone();
        }
        if let Some(v) = &self.company_type {
            data.company_type = v.clone();
        }
        if let Some(v) = &self.domain {
            data.industry_domain = v.clone();
        }
        if let Some(v) = &self.website {
            data.website = v.clone();
        }
        if let Some(v) = &self.explanation {
            data.salary_explanation = v.clone();
        }
        if let Some(v) = self.workplace {
            data.workplace_rating = normalize_rating(Some(v as f64), data.workplace_rating);
        }
        if let Some(v) = self.size {
            data.size_rating = normalize_rating(Some(v as f64), data.size_rating);
        }
    }

    fn look(&self, draft: CardDraft) -> CardDraft {
        draft.with_look(self.theme, self.icon)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn save_card(db: &Database, data: CompanyData, fields: Option<&CardFields>) -> Result<Card> {
    let draft = CardDraft::new(data);
    let draft = match fields {
        Some(fields) => fields.look(draft),
        None => draft,
    };
    Ok(db.put_card(draft)?)
}

fn print_card(card: &Card, period: Period) {
    let d = &card.data;
    println!("{} {}  ({})", card.icon.glyph(), d.company_name, card.id);
    println!("Role: {}", d.role);
    println!("Location: {}", d.country);
    println!("Type: {} / {}", d.company_type, d.kind);
    println!("Domain: {}", d.industry_domain);
    if !d.website.is_empty() {
        println!("Website: {}", d.website);
    }
    println!(
        "Entry salary: {} per {}",
        views::format_salary(d.entry_level_salary, &d.currency, period),
        period
    );
    println!(
        "Mid salary:   {} per {}",
        views::format_salary(d.mid_level_salary, &d.currency, period),
        period
    );
    println!("Workplace: {}", tui::rating_bar(d.workplace_rating, '★', '☆'));
    println!("Size:      {}", tui::rating_bar(d.size_rating, '■', '□'));
    println!("Theme: {}", card.theme_color);
    println!("Saved: {}", tui::format_timestamp(card.timestamp));
    if !d.salary_explanation.is_empty() {
        println!("\n--- Salary Notes ---\n{}", textwrap::fill(&d.salary_explanation, 80));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::resolve(cli.db, cli.model);
    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Prompt { url } => {
            println!("{}", ai::extraction_prompt(&url));
        }

        Commands::Paste { file, url } => {
            db.ensure_initialized()?;
            let text = match &file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read JSON from stdin")?;
                    buf
                }
            };
            let data = ai::parse_for_url(&text, url.as_deref())?;
            let card = save_card(&db, data, None)?;
            println!("Saved card {} ({})", card.data.company_name, card.id);
        }

        Commands::Extract { url, no_save } => {
            db.ensure_initialized()?;
            let key = config::resolve_api_key(&db, std::env::var(config::API_KEY_ENV).ok())?
                .ok_or_else(|| {
                    anyhow!(
                        "No API key available. Run 'intel key set <key>' or set {}, \
                         or use 'intel prompt <url>' and 'intel paste'.",
                        config::API_KEY_ENV
                    )
                })?;

            Governor::new(&db, SystemClock).check_and_record()?;

            let provider = GeminiProvider::new(key.key().to_string(), config.model.clone());
            println!("Extracting {} with {}...", url, provider.model_name());
            let data = ai::extract_company(&provider, &url)?;

            if no_save {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let card = save_card(&db, data, None)?;
                print_card(&card, Period::Year);
            }
        }

        Commands::Add { company, fields } => {
            db.ensure_initialized()?;
            if company.trim().is_empty() {
                return Err(anyhow!("Company name is required"));
            }
            let mut data = CompanyData::manual(company.trim());
            fields.apply(&mut data);
            if data.role.trim().is_empty() {
                return Err(anyhow!("Role is required"));
            }
            let card = save_card(&db, data, Some(&fields))?;
            println!("Added card {} ({})", card.data.company_name, card.id);
        }

        Commands::List { search, company_type, period } => {
            db.ensure_initialized()?;
            let cards = db.list_cards()?;
            let cards = views::filter_by(&cards, &search, &company_type);
            if cards.is_empty() {
                println!("No cards found.");
            } else {
                println!(
                    "{:<36} {:<22} {:<20} {:<12} {:>16} {:>16}",
                    "ID", "COMPANY", "ROLE", "TYPE", "ENTRY", "MID"
                );
                println!("{}", "-".repeat(127));
                for card in cards {
                    let d = &card.data;
                    println!(
                        "{:<36} {:<22} {:<20} {:<12} {:>16} {:>16}",
                        card.id,
                        truncate(&d.company_name, 20),
                        truncate(&d.role, 18),
                        truncate(&d.company_type, 10),
                        views::format_salary(d.entry_level_salary, &d.currency, period),
                        views::format_salary(d.mid_level_salary, &d.currency, period),
                    );
                }
            }
        }

        Commands::Show { id, period } => {
            db.ensure_initialized()?;
            match db.get_card(&id)? {
                Some(card) => print_card(&card, period),
                None => println!("Card {} not found.", id),
            }
        }

        Commands::Edit { id, company, fields } => {
            db.ensure_initialized()?;
            let mut card = db
                .get_card(&id)?
                .ok_or_else(|| anyhow!("Card {} not found", id))?;
            if let Some(name) = company.filter(|n| !n.trim().is_empty()) {
                card.data.company_name = name.trim().to_string();
            }
            fields.apply(&mut card.data);
            let card = db.put_card(fields.look(CardDraft::Saved(card)))?;
            println!("Updated card {} ({})", card.data.company_name, card.id);
        }

        Commands::Delete { id } => {
            db.ensure_initialized()?;
            if db.delete_card(&id)? {
                println!("Deleted card {}.", id);
            } else {
                println!("Card {} not found.", id);
            }
        }

        Commands::Clear { yes } => {
            db.ensure_initialized()?;
            if !yes {
                println!("This deletes every saved card and cannot be undone. Re-run with --yes.");
            } else {
                let removed = db.clear_cards()?;
                println!("Removed {} card(s).", removed);
            }
        }

        Commands::Types => {
            db.ensure_initialized()?;
            for t in views::distinct_types(&db.list_cards()?) {
                println!("{}", t);
            }
        }

        Commands::Storage => {
            db.ensure_initialized()?;
            let cards = db.list_cards()?;
            let used = estimate_size_bytes(&cards);
            let percent = views::usage_percentage(used, STORAGE_SOFT_LIMIT_BYTES);
            println!("Records: {}", cards.len());
            println!("Usage:   {:.2} KB", used as f64 / 1024.0);
            println!(
                "Limit:   {} MB soft limit ({:.1}% used)",
                STORAGE_SOFT_LIMIT_BYTES / (1024 * 1024),
                percent.min(100.0)
            );
        }

        Commands::Usage => {
            db.ensure_initialized()?;
            let usage = Governor::new(&db, SystemClock).current_usage()?;
            println!("Today:      {}/{}", usage.daily, DAILY_LIMIT);
            println!("Last min:   {}/{}", usage.minute, MINUTE_LIMIT);
            if usage.daily_exhausted() {
                println!("Daily limit reached; use 'intel prompt' + 'intel paste' until it resets.");
            }
        }

        Commands::Export { format, output } => {
            db.ensure_initialized()?;
            let cards = db.list_cards()?;
            match format.to_lowercase().as_str() {
                "csv" => {
                    let path = output.unwrap_or_else(|| {
                        PathBuf::from(export::default_csv_name(chrono::Local::now().date_naive()))
                    });
                    std::fs::write(&path, export::to_csv(&cards))
                        .with_context(|| format!("Failed to write to {}", path.display()))?;
                    println!("Exported {} card(s) to {}", cards.len(), path.display());
                }
                "tsv" => {
                    let text = export::to_tsv(&cards);
                    match output {
                        Some(path) => {
                            std::fs::write(&path, text)
                                .with_context(|| format!("Failed to write to {}", path.display()))?;
                            println!("Exported {} card(s) to {}", cards.len(), path.display());
                        }
                        None => println!("{}", text),
                    }
                }
                other => return Err(anyhow!("Unknown export format '{}'. Use csv or tsv", other)),
            }
        }

        Commands::Key { command } => {
            db.ensure_initialized()?;
            match command {
                KeyCommands::Set { key } => {
                    if key.trim().is_empty() {
                        return Err(anyhow!("API key must not be empty"));
                    }
                    db.set_setting(API_KEY_KEY, key.trim())?;
                    println!("API key stored. Direct extraction is enabled.");
                }
                KeyCommands::Clear => {
                    db.delete_setting(API_KEY_KEY)?;
                    println!("API key removed.");
                }
                KeyCommands::Status => {
                    match config::resolve_api_key(&db, std::env::var(config::API_KEY_ENV).ok())? {
                        Some(ApiKeySource::Stored(_)) => println!("Using stored API key."),
                        Some(ApiKeySource::Env(_)) => {
                            println!("Using API key from {}.", config::API_KEY_ENV)
                        }
                        None => println!(
                            "No API key. Use 'intel prompt <url>' and 'intel paste' instead."
                        ),
                    }
                }
            }
        }

        Commands::Browse => {
            db.ensure_initialized()?;
            tui::run_browse(&db)?;
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_manual_add() {
        let cli = Cli::try_parse_from([
            "intel", "add", "Acme", "--mid", "120000", "--theme", "teal", "--icon", "⚡",
        ])
        .unwrap();
        let Commands::Add { company, fields } = cli.command else {
            panic!("expected add");
        };
        assert_eq!(company, "Acme");
        assert_eq!(fields.mid, Some(120_000));
        assert_eq!(fields.theme, Some(ThemeColor::Teal));
        assert_eq!(fields.icon, Some(CardIcon::Bolt));
    }

    #[test]
    fn test_cli_list_defaults() {
        let cli = Cli::try_parse_from(["intel", "list", "--period", "month"]).unwrap();
        let Commands::List { search, company_type, period } = cli.command else {
            panic!("expected list");
        };
        assert_eq!(search, "");
        assert_eq!(company_type, "All");
        assert_eq!(period, Period::Month);
    }

    #[test]
    fn test_fields_apply_clamps_ratings() {
        let fields = CardFields {
            workplace: Some(9),
            size: Some(0),
            currency: Some("eur".into()),
            ..Default::default()
        };
        let mut data = CompanyData::manual("Acme");
        fields.apply(&mut data);
        assert_eq!(data.workplace_rating, 5);
        assert_eq!(data.size_rating, 2);
        assert_eq!(data.currency, "EUR");
    }

    #[test]
    fn test_save_card_applies_look() {
        let db = Database::open_in_memory().unwrap();
        let fields = CardFields {
            theme: Some(ThemeColor::Rose),
            ..Default::default()
        };
        let card = save_card(&db, CompanyData::manual("Acme"), Some(&fields)).unwrap();
        assert_eq!(card.theme_color, ThemeColor::Rose);
        assert_eq!(card.icon, CardIcon::Briefcase);

        let stored = db.get_card(&card.id).unwrap().unwrap();
        assert_eq!(stored, card);
        assert_eq!(db.list_cards().unwrap().len(), 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long company name", 10), "a very ...");
    }
}
