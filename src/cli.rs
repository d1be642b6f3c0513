//! Command-line front end for the payment and unit clients
//!
//! Commands run against the [`PaymentApi`] / [`UnitApi`] traits and return the
//! lines to print, so the binary stays a thin shell around them.

use crate::auth::{ChainedTokens, EnvToken, FileTokenStore, StaticToken, TokenProvider, TOKEN_KEY};
use crate::config::ClientConfig;
use crate::models::{Payment, PaymentSummary, Unit, UnitPatch};
use crate::services::{ImageUpload, PaymentApi, UnitApi, UnitFilters};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Environment variable consulted for a bearer token
pub const TOKEN_ENV: &str = "RENTAL_TOKEN";

#[derive(Debug, Parser)]
#[command(name = "rental", version, about = "Manage rental units and payments")]
pub struct Cli {
    /// API root, e.g. http://localhost:3000/api (overrides RENTAL_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Bearer token to use instead of RENTAL_TOKEN or the token file
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Persisted key-value store holding the `token` entry
    #[arg(long, global = true, default_value = ".rental/storage.json")]
    pub token_file: PathBuf,

    /// Request timeout in seconds (at least 1)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Print raw JSON instead of a summary
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Payment operations
    #[command(subcommand)]
    Payments(PaymentCommand),
    /// Rental unit operations
    #[command(subcommand)]
    Units(UnitCommand),
    /// Manage the stored bearer token
    #[command(subcommand)]
    Token(TokenCommand),
}

#[derive(Debug, Subcommand)]
pub enum PaymentCommand {
    /// Payments still owed
    Due,
    /// Payments falling due this month
    DueThisMonth,
    /// Landlord payment summary
    Summary,
    /// Mark a payment as paid
    Pay { id: String },
}

#[derive(Debug, Subcommand)]
pub enum UnitCommand {
    /// List your units
    List(FilterArgs),
    /// Create a unit from a JSON file
    Create {
        #[arg(long)]
        file: PathBuf,
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Update a unit from a JSON file holding the changed fields
    Update {
        id: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
}

#[derive(Debug, Default, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub min_price: Option<f64>,
    #[arg(long)]
    pub max_price: Option<f64>,
    #[arg(long)]
    pub rooms: Option<u32>,
    #[arg(long)]
    pub location: Option<String>,
    /// Repeat for several amenities
    #[arg(long = "amenity")]
    pub amenities: Vec<String>,
}

impl FilterArgs {
    pub fn to_filters(&self) -> Option<UnitFilters> {
        let filters = UnitFilters {
            min_price: self.min_price,
            max_price: self.max_price,
            rooms: self.rooms,
            location: self.location.clone(),
            amenities: (!self.amenities.is_empty()).then(|| self.amenities.clone()),
        };
        (!filters.is_empty()).then_some(filters)
    }
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Store a token for later commands
    Set { token: String },
    /// Forget the stored token
    Clear,
}

impl Cli {
    /// Environment config with command-line overrides applied
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(secs) = self.timeout {
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn token_store(&self) -> FileTokenStore {
        FileTokenStore::new(&self.token_file)
    }

    /// `--token`, then `RENTAL_TOKEN`, then the token file
    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        let mut chain = ChainedTokens::new();
        if let Some(token) = &self.token {
            chain = chain.with(StaticToken::new(token.clone()));
        }
        Arc::new(chain.with(EnvToken::new(TOKEN_ENV)).with(self.token_store()))
    }
}

pub async fn run_payments(api: &dyn PaymentApi, command: &PaymentCommand, json: bool) -> Result<Vec<String>> {
    let today = Local::now().date_naive();

    match command {
        PaymentCommand::Due => {
            let due = api.get_due_payments().await.context("Failed to fetch due payments")?;
            if json {
                return to_json(&due);
            }
            let mut lines = Vec::new();
            if let Some(message) = &due.message {
                lines.push(message.clone());
            }
            lines.push(format!("Total due: {:.2} ({} payments)", due.total_due, due.payments.len()));
            lines.extend(due.payments.iter().map(|p| payment_line(p, today)));
            Ok(lines)
        }
        PaymentCommand::DueThisMonth => {
            let month = api
                .get_due_payments_this_month()
                .await
                .context("Failed to fetch payments due this month")?;
            if json {
                return to_json(&month);
            }
            let mut lines = vec![format!(
                "Due this month: {} payments, {:.2} total",
                month.total_due_payments, month.total_amount_due
            )];
            lines.extend(month.payments.iter().map(|p| payment_line(p, today)));
            Ok(lines)
        }
        PaymentCommand::Summary => {
            let summary = api.get_payment_summary().await.context("Failed to fetch payment summary")?;
            if json {
                return to_json(&summary);
            }
            Ok(summary_lines(&summary))
        }
        PaymentCommand::Pay { id } => {
            info!("Marking payment {} as paid", id);
            let payment = api
                .mark_payment_as_paid(id)
                .await
                .with_context(|| format!("Failed to mark payment {} as paid", id))?;
            if json {
                return to_json(&payment);
            }
            Ok(vec![payment_line(&payment, today)])
        }
    }
}

pub async fn run_units(api: &dyn UnitApi, command: &UnitCommand, json: bool) -> Result<Vec<String>> {
    match command {
        UnitCommand::List(args) => {
            let filters = args.to_filters();
            let units = api.get_units(filters.as_ref()).await.context("Failed to fetch units")?;
            if json {
                return to_json(&units);
            }
            let mut lines = vec![format!("{} units", units.len())];
            lines.extend(units.iter().map(unit_line));
            Ok(lines)
        }
        UnitCommand::Create { file, images } => {
            let unit: Unit = read_json(file).await?;
            let images = load_images(images).await?;
            info!("Creating unit '{}' with {} images", unit.title, images.len());
            let created = api.create_unit(&unit, &images).await.context("Failed to create unit")?;
            if json {
                return to_json(&created);
            }
            Ok(vec![format!("Created {}", unit_line(&created))])
        }
        UnitCommand::Update { id, file, images } => {
            let patch: UnitPatch = read_json(file).await?;
            let images = load_images(images).await?;
            info!("Updating unit {} with {} images", id, images.len());
            let updated = api
                .update_unit(id, &patch, &images)
                .await
                .with_context(|| format!("Failed to update unit {}", id))?;
            if json {
                return to_json(&updated);
            }
            Ok(vec![format!("Updated {}", unit_line(&updated))])
        }
    }
}

pub async fn run_token(store: &FileTokenStore, command: &TokenCommand) -> Result<Vec<String>> {
    match command {
        TokenCommand::Set { token } => {
            store
                .set(TOKEN_KEY, token)
                .await
                .with_context(|| format!("Failed to write {}", store.path().display()))?;
            Ok(vec![format!("Token saved to {}", store.path().display())])
        }
        TokenCommand::Clear => {
            let removed = store
                .remove(TOKEN_KEY)
                .await
                .with_context(|| format!("Failed to update {}", store.path().display()))?;
            Ok(vec![if removed {
                "Token removed".to_string()
            } else {
                "No token stored".to_string()
            }])
        }
    }
}

fn payment_line(payment: &Payment, today: NaiveDate) -> String {
    let mut line = format!(
        "{}  {:>10.2}  due {}  {}",
        payment.id, payment.amount, payment.due_date, payment.status
    );
    if payment.is_past_due(today) {
        line.push_str("  (past due)");
    }
    if let Some(booking) = &payment.booking_id {
        line.push_str(&format!("  booking {}", booking));
    }
    line
}

fn summary_lines(summary: &PaymentSummary) -> Vec<String> {
    vec![
        format!("Properties:       {}", summary.total_properties),
        format!("Payments:         {}", summary.total_payments),
        format!("  pending:        {}", summary.pending_payments),
        format!("  overdue:        {}", summary.overdue_payments),
        format!("  paid:           {}", summary.paid_payments),
        format!("Total amount due: {:.2}", summary.total_amount_due),
    ]
}

fn unit_line(unit: &Unit) -> String {
    let status = unit.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {} ({}, {})  {} rooms  {:.2}/month  {}",
        unit.id.as_deref().unwrap_or("<new>"),
        unit.title,
        unit.location.city,
        unit.location.province,
        unit.rooms,
        unit.rent_amount,
        status
    )
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<String>> {
    Ok(vec![serde_json::to_string_pretty(value)?])
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageUpload>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let image = ImageUpload::from_path(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        images.push(image);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, Result as ClientResult};
    use crate::models::{DuePayments, Location, MonthlyDuePayments, PaymentStatus, UnitStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn payment(id: &str, status: PaymentStatus) -> Payment {
        Payment {
            id: id.to_string(),
            amount: 950.0,
            due_date: "2020-01-01".to_string(),
            status,
            booking_id: None,
        }
    }

    fn unit(id: Option<&str>, title: &str) -> Unit {
        Unit {
            id: id.map(str::to_string),
            title: title.to_string(),
            description: "Cozy".to_string(),
            location: Location {
                address: "5 Elm St".to_string(),
                city: "Moncton".to_string(),
                province: "NB".to_string(),
                zip_code: "E1C 1A1".to_string(),
                country: "Canada".to_string(),
            },
            rent_amount: 1100.0,
            rooms: 1,
            status: Some(UnitStatus::Available),
            photos: vec![],
            amenities: vec![],
        }
    }

    #[derive(Default)]
    struct FakePayments {
        paid: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PaymentApi for FakePayments {
        async fn get_due_payments(&self) -> ClientResult<DuePayments> {
            Ok(DuePayments {
                payments: vec![payment("p1", PaymentStatus::Pending)],
                total_due: 950.0,
                message: Some("You have 1 due payment".to_string()),
            })
        }

        async fn mark_payment_as_paid(&self, payment_id: &str) -> ClientResult<Payment> {
            self.paid.lock().unwrap().push(payment_id.to_string());
            Ok(payment(payment_id, PaymentStatus::Paid))
        }

        async fn get_due_payments_this_month(&self) -> ClientResult<MonthlyDuePayments> {
            Err(ClientError::request(500, "boom"))
        }

        async fn get_payment_summary(&self) -> ClientResult<PaymentSummary> {
            Ok(PaymentSummary {
                total_properties: 3,
                total_payments: 10,
                pending_payments: 2,
                overdue_payments: 1,
                paid_payments: 7,
                total_amount_due: 1500.0,
            })
        }
    }

    #[derive(Default)]
    struct FakeUnits {
        filters: Mutex<Vec<Option<UnitFilters>>>,
        uploads: Mutex<Vec<(Option<String>, usize)>>,
    }

    #[async_trait]
    impl UnitApi for FakeUnits {
        async fn get_units(&self, filters: Option<&UnitFilters>) -> ClientResult<Vec<Unit>> {
            self.filters.lock().unwrap().push(filters.cloned());
            Ok(vec![unit(Some("u1"), "Loft"), unit(Some("u2"), "Studio")])
        }

        async fn create_unit(&self, new_unit: &Unit, images: &[ImageUpload]) -> ClientResult<Unit> {
            self.uploads.lock().unwrap().push((None, images.len()));
            let mut created = new_unit.clone();
            created.id = Some("u9".to_string());
            Ok(created)
        }

        async fn update_unit(&self, id: &str, patch: &UnitPatch, images: &[ImageUpload]) -> ClientResult<Unit> {
            self.uploads.lock().unwrap().push((Some(id.to_string()), images.len()));
            let mut updated = unit(Some(id), "Loft");
            if let Some(title) = &patch.title {
                updated.title = title.clone();
            }
            Ok(updated)
        }
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rental", "units", "list", "--min-price", "100", "--amenity", "wifi", "--amenity", "pool", "--json",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Command::Units(UnitCommand::List(args)) => {
                let filters = args.to_filters().unwrap();
                assert_eq!(filters.min_price, Some(100.0));
                assert_eq!(filters.amenities, Some(vec!["wifi".to_string(), "pool".to_string()]));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn no_filter_flags_means_no_filters() {
        assert_eq!(FilterArgs::default().to_filters(), None);
    }

    #[tokio::test]
    async fn explicit_token_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        FileTokenStore::new(&path).set(TOKEN_KEY, "stored").await.unwrap();

        let cli = Cli::try_parse_from([
            "rental",
            "--token",
            "explicit",
            "--token-file",
            path.to_str().unwrap(),
            "payments",
            "due",
        ])
        .unwrap();
        assert_eq!(cli.token_provider().token().await.as_deref(), Some("explicit"));
    }

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "rental",
            "--api-url",
            "http://10.0.0.5:3000/api",
            "--timeout",
            "7",
            "payments",
            "summary",
        ])
        .unwrap();
        let config = cli.client_config().unwrap();
        assert_eq!(config.base_url(), "http://10.0.0.5:3000/api");
        assert_eq!(config.timeout, Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn due_payments_render_message_total_and_rows() {
        let lines = run_payments(&FakePayments::default(), &PaymentCommand::Due, false)
            .await
            .unwrap();

        assert_eq!(lines[0], "You have 1 due payment");
        assert_eq!(lines[1], "Total due: 950.00 (1 payments)");
        assert!(lines[2].starts_with("p1"));
        assert!(lines[2].contains("PENDING"));
        assert!(lines[2].contains("(past due)"));
    }

    #[tokio::test]
    async fn pay_calls_api_with_id() {
        let api = FakePayments::default();
        let lines = run_payments(&api, &PaymentCommand::Pay { id: "abc123".to_string() }, false)
            .await
            .unwrap();

        assert_eq!(*api.paid.lock().unwrap(), vec!["abc123".to_string()]);
        assert!(lines[0].contains("PAID"));
        assert!(!lines[0].contains("past due"));
    }

    #[tokio::test]
    async fn summary_as_json_is_camel_case() {
        let lines = run_payments(&FakePayments::default(), &PaymentCommand::Summary, true)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["totalProperties"], 3);
        assert_eq!(value["paidPayments"], 7);
    }

    #[tokio::test]
    async fn api_errors_keep_their_message_in_the_chain() {
        let err = run_payments(&FakePayments::default(), &PaymentCommand::DueThisMonth, false)
            .await
            .unwrap_err();
        let client_err = err.downcast_ref::<ClientError>().unwrap();
        assert_eq!(client_err.message(), "boom");
    }

    #[tokio::test]
    async fn list_passes_filters_through() {
        let api = FakeUnits::default();
        let args = FilterArgs {
            rooms: Some(2),
            ..FilterArgs::default()
        };
        let lines = run_units(&api, &UnitCommand::List(args), false).await.unwrap();

        assert_eq!(lines[0], "2 units");
        assert!(lines[1].contains("Loft (Moncton, NB)"));
        let seen = api.filters.lock().unwrap();
        assert_eq!(seen[0].as_ref().unwrap().rooms, Some(2));
    }

    #[tokio::test]
    async fn create_reads_unit_file_and_images() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("unit.json");
        std::fs::write(&file, serde_json::to_string(&unit(None, "Garden flat")).unwrap()).unwrap();
        let image = dir.path().join("front.jpg");
        std::fs::write(&image, [0xff, 0xd8]).unwrap();

        let api = FakeUnits::default();
        let command = UnitCommand::Create {
            file,
            images: vec![image],
        };
        let lines = run_units(&api, &command, false).await.unwrap();

        assert!(lines[0].starts_with("Created u9  Garden flat"));
        assert_eq!(*api.uploads.lock().unwrap(), vec![(None, 1)]);
    }

    #[tokio::test]
    async fn update_reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("patch.json");
        std::fs::write(&file, r#"{"title":"Renovated loft"}"#).unwrap();

        let api = FakeUnits::default();
        let command = UnitCommand::Update {
            id: "u1".to_string(),
            file,
            images: vec![],
        };
        let lines = run_units(&api, &command, false).await.unwrap();

        assert!(lines[0].contains("Renovated loft"));
        assert_eq!(*api.uploads.lock().unwrap(), vec![(Some("u1".to_string()), 0)]);
    }

    #[tokio::test]
    async fn create_with_missing_file_fails() {
        let command = UnitCommand::Create {
            file: PathBuf::from("/no/such/unit.json"),
            images: vec![],
        };
        let err = run_units(&FakeUnits::default(), &command, false).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let parsed = Cli::try_parse_from(["rental", "--timeout", "0", "payments", "due"]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn token_set_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("storage.json"));

        run_token(&store, &TokenCommand::Set { token: "abc".to_string() })
            .await
            .unwrap();
        assert_eq!(store.token().await.as_deref(), Some("abc"));

        assert_eq!(
            run_token(&store, &TokenCommand::Clear).await.unwrap(),
            vec!["Token removed"]
        );
        assert_eq!(
            run_token(&store, &TokenCommand::Clear).await.unwrap(),
            vec!["No token stored"]
        );
    }
}
