use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;
use std::time::SystemTime;

use anyhow::{Context, bail};
use chrono::Utc;
use serde::Serialize;

use stockroom_infra::backup::{create_backup, rotate_backups};
use stockroom_infra::export::{export_inventory_csv, export_transactions_csv};
use stockroom_infra::{AppConfig, Database, FormRegistry, FormTable, LedgerService};
use stockroom_inventory::{
    Adjustment, CertifiedReceipt, DemandSupply, InventoryRecord, NewRecord, RecordFields,
    RecordOrder, SparesIssue, Voucher,
};

use crate::cli::*;
use crate::output::{self, Output};

/// Exit code of `verify` when the ledger is out of balance.
const EXIT_DISCREPANCY: u8 = 2;

pub async fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    stockroom_observability::init(config.logging.format, &config.logging.level);

    let out = Output::new(cli.format);

    let db = Database::open(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.path.display()))?;
    let applied = db.migrate().await.context("migration failed")?;
    let ledger = LedgerService::new(&db);

    let code = match cli.command {
        Command::Migrate => {
            out.emit(applied.as_slice(), output::migrations)?;
            ExitCode::SUCCESS
        }
        Command::Item { action } => cmd_item(&ledger, action, out).await?,
        Command::Adjust(args) => cmd_adjust(&ledger, args, out).await?,
        Command::Transactions(args) => cmd_transactions(&ledger, args, out).await?,
        Command::Verify => cmd_verify(&ledger, out).await?,
        Command::Receipt { action } => match action {
            ReceiptAction::Add(args) => {
                form_add(&db, CertifiedReceipt::from(args), out, output::receipts).await?
            }
            ReceiptAction::List => form_list(&db, out, output::receipts).await?,
        },
        Command::Issue { action } => match action {
            IssueAction::Add(args) => {
                form_add(&db, SparesIssue::from(args), out, output::issues).await?
            }
            IssueAction::List => form_list(&db, out, output::issues).await?,
        },
        Command::Demand { action } => match action {
            DemandAction::Add(args) => {
                form_add(&db, DemandSupply::from(args), out, output::demands).await?
            }
            DemandAction::List => form_list(&db, out, output::demands).await?,
        },
        Command::Export { target } => cmd_export(&ledger, target, out).await?,
        Command::Backup(args) => cmd_backup(&db, &config, args, out).await?,
    };

    db.close().await;
    Ok(code)
}

async fn require(ledger: &LedgerService, part_no: &str) -> anyhow::Result<InventoryRecord> {
    match ledger.get_by_key(part_no).await? {
        Some(rec) => Ok(rec),
        None => bail!("no record with part number {}", part_no.trim()),
    }
}

async fn cmd_item(ledger: &LedgerService, action: ItemAction, out: Output) -> anyhow::Result<ExitCode> {
    match action {
        ItemAction::Add { part_no, quantity, fields } => {
            let fields = fields.apply(RecordFields::with_part_no(part_no));
            let rec = ledger.create(NewRecord::new(fields, quantity)).await?;
            out.emit(&rec, output::record)?;
        }
        ItemAction::Show { part_no } => {
            let rec = require(ledger, &part_no).await?;
            out.emit(&rec, output::record)?;
        }
        ItemAction::List { order } => {
            let records = ledger.list_all(RecordOrder::from(order)).await?;
            out.emit(records.as_slice(), output::record_table)?;
        }
        ItemAction::Update { part_no, rename, fields } => {
            let current = require(ledger, &part_no).await?;
            let mut updated = fields.apply(current.fields);
            if let Some(new_key) = rename {
                updated.part_no = new_key;
            }
            let rec = ledger.update(current.id, updated).await?;
            out.emit(&rec, output::record)?;
        }
        ItemAction::Delete { part_no } => {
            let rec = require(ledger, &part_no).await?;
            ledger.delete(rec.id).await?;
            out.emit(&rec.id, |id| format!("deleted {} ({id})", rec.fields.part_no))?;
        }
        ItemAction::Search { term } => {
            let found = ledger.search(&term).await?;
            out.emit(found.as_slice(), output::record_table)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_adjust(ledger: &LedgerService, args: AdjustArgs, out: Output) -> anyhow::Result<ExitCode> {
    let entry = ledger
        .adjust(
            Adjustment::new(args.part_no, args.delta)
                .reason(args.reason)
                .source(args.source),
        )
        .await?;
    out.emit(&entry, output::entry)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_transactions(
    ledger: &LedgerService,
    args: TransactionsArgs,
    out: Output,
) -> anyhow::Result<ExitCode> {
    let entries = match args.part_no {
        Some(part_no) => ledger.history(&part_no, args.limit).await?,
        None => ledger.list_recent(args.limit).await?,
    };
    out.emit(entries.as_slice(), output::entry_table)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_verify(ledger: &LedgerService, out: Output) -> anyhow::Result<ExitCode> {
    let found = ledger.reconcile().await?;
    out.emit(found.as_slice(), output::discrepancies)?;
    if found.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_DISCREPANCY))
    }
}

async fn form_add<F>(
    db: &Database,
    form: F,
    out: Output,
    render: fn(&[Voucher<F>]) -> String,
) -> anyhow::Result<ExitCode>
where
    F: FormTable + Serialize,
{
    let saved = FormRegistry::<F>::new(db).save(form).await?;
    out.emit(&saved, |v| render(std::slice::from_ref(v)))?;
    Ok(ExitCode::SUCCESS)
}

async fn form_list<F>(
    db: &Database,
    out: Output,
    render: fn(&[Voucher<F>]) -> String,
) -> anyhow::Result<ExitCode>
where
    F: FormTable + Serialize,
{
    let list = FormRegistry::<F>::new(db).list().await?;
    out.emit(list.as_slice(), render)?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct ExportSummary<'a> {
    path: &'a std::path::Path,
    rows: usize,
}

async fn cmd_export(ledger: &LedgerService, target: ExportTarget, out: Output) -> anyhow::Result<ExitCode> {
    let (path, rows) = match target {
        ExportTarget::Inventory { path } => {
            let records = ledger.list_all(RecordOrder::CreatedDesc).await?;
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let rows = export_inventory_csv(&records, BufWriter::new(file))?;
            (path, rows)
        }
        ExportTarget::Transactions { path, limit } => {
            let entries = ledger
                .list_recent(limit.unwrap_or(u32::MAX))
                .await?;
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let rows = export_transactions_csv(&entries, BufWriter::new(file))?;
            (path, rows)
        }
    };

    let summary = ExportSummary { path: &path, rows };
    out.emit(&summary, |s| format!("wrote {} rows to {}", s.rows, s.path.display()))?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct BackupSummary {
    created: std::path::PathBuf,
    removed: Vec<std::path::PathBuf>,
}

async fn cmd_backup(
    db: &Database,
    config: &AppConfig,
    args: BackupArgs,
    out: Output,
) -> anyhow::Result<ExitCode> {
    let dir = &config.backup.dir;
    let keep_days = args.keep_days.unwrap_or(config.backup.keep_days);

    let created = create_backup(db, dir, Utc::now())
        .await
        .with_context(|| format!("failed to back up into {}", dir.display()))?;
    let removed = rotate_backups(dir, keep_days, SystemTime::now())
        .with_context(|| format!("failed to rotate backups in {}", dir.display()))?;

    let summary = BackupSummary { created, removed };
    out.emit(&summary, |s| {
        let mut text = format!("created {}", s.created.display());
        for p in &s.removed {
            text.push_str(&format!("\nremoved {}", p.display()));
        }
        text
    })?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use clap::Parser;
    use sqlx::Connection;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};

    use super::*;

    struct Workspace {
        dir: tempfile::TempDir,
        config: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = dir.path().join("stockroom.toml");
            let body = format!(
                "[database]\npath = '{}'\n\n[backup]\ndir = '{}'\n",
                dir.path().join("stockroom.db").display(),
                dir.path().join("backups").display(),
            );
            std::fs::write(&config, body).unwrap();
            Self { dir, config }
        }

        fn db_path(&self) -> PathBuf {
            self.dir.path().join("stockroom.db")
        }

        async fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
            let config = self.config.to_string_lossy().into_owned();
            let argv = ["stockroom", "--config", config.as_str()]
                .into_iter()
                .chain(args.iter().copied());
            run_command(Cli::try_parse_from(argv)?).await
        }
    }

    async fn set_quantity(db: &Path, part_no: &str, quantity: i64) {
        let options = SqliteConnectOptions::new().filename(db);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::query("UPDATE inventory SET quantity = ?1 WHERE part_no = ?2")
            .bind(quantity)
            .bind(part_no)
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn migrate_twice_succeeds() {
        let ws = Workspace::new();
        assert_eq!(ws.run(&["migrate"]).await.unwrap(), ExitCode::SUCCESS);
        assert_eq!(ws.run(&["migrate"]).await.unwrap(), ExitCode::SUCCESS);
        assert!(ws.db_path().exists());
    }

    #[tokio::test]
    async fn verify_exits_with_discrepancy_code_after_out_of_band_edit() {
        let ws = Workspace::new();
        ws.run(&["item", "add", "P-100", "--quantity", "10"]).await.unwrap();
        ws.run(&["adjust", "P-100", "5", "--reason", "receipt"]).await.unwrap();
        ws.run(&["adjust", "P-100", "-3", "--reason", "issue"]).await.unwrap();
        assert_eq!(ws.run(&["verify"]).await.unwrap(), ExitCode::SUCCESS);

        set_quantity(&ws.db_path(), "P-100", 40).await;

        assert_eq!(
            ws.run(&["verify"]).await.unwrap(),
            ExitCode::from(EXIT_DISCREPANCY)
        );
    }

    #[tokio::test]
    async fn update_with_empty_value_clears_field() {
        let ws = Workspace::new();
        ws.run(&["item", "add", "P-7", "--remarks", "dented", "-d", "Bracket"])
            .await
            .unwrap();
        ws.run(&["item", "update", "P-7", "--remarks", ""]).await.unwrap();

        let db = Database::connect(&stockroom_infra::DatabaseConfig::at(ws.db_path()))
            .await
            .unwrap();
        let rec = LedgerService::new(&db).get_by_key("P-7").await.unwrap().unwrap();
        assert_eq!(rec.fields.remarks, None);
        assert_eq!(rec.fields.description.as_deref(), Some("Bracket"));
        db.close().await;
    }

    #[tokio::test]
    async fn failures_surface_as_errors() {
        let ws = Workspace::new();
        assert!(ws.run(&["adjust", "P-999", "4"]).await.is_err());
        assert!(ws.run(&["item", "show", "P-999"]).await.is_err());

        let missing = ws.dir.path().join("absent.toml");
        let cli = Cli::try_parse_from([
            "stockroom",
            "--config",
            missing.to_str().unwrap(),
            "migrate",
        ])
        .unwrap();
        assert!(run_command(cli).await.is_err());
    }
}
