use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use stockroom_inventory::{
    CertifiedReceipt, DemandSupply, RecordFields, RecordOrder, SparesIssue,
};

#[derive(Parser)]
#[command(
    name = "stockroom",
    about = "Inventory ledger for a small warehouse",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or upgrade the database schema
    Migrate,
    /// Manage inventory records
    Item {
        #[command(subcommand)]
        action: ItemAction,
    },
    /// Apply a signed quantity change to a record
    Adjust(AdjustArgs),
    /// Show the transaction log
    Transactions(TransactionsArgs),
    /// Check every record quantity against the transaction log
    Verify,
    /// Certified receipt vouchers
    Receipt {
        #[command(subcommand)]
        action: ReceiptAction,
    },
    /// Spares issue vouchers
    Issue {
        #[command(subcommand)]
        action: IssueAction,
    },
    /// Demand on supply office vouchers
    Demand {
        #[command(subcommand)]
        action: DemandAction,
    },
    /// Write a CSV report
    Export {
        #[command(subcommand)]
        target: ExportTarget,
    },
    /// Snapshot the database and prune old snapshots
    Backup(BackupArgs),
}

#[derive(Subcommand)]
pub enum ItemAction {
    /// Create a record
    Add {
        part_no: String,
        /// Opening quantity
        #[arg(long, short, default_value_t = 0, allow_negative_numbers = true)]
        quantity: i64,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Show one record
    Show { part_no: String },
    /// List every record
    List {
        #[arg(long, value_enum, default_value = "created")]
        order: OrderArg,
    },
    /// Change descriptive fields; quantity is only changed by `adjust`
    #[command(after_help = "Omitted options keep their current value. An empty value (e.g. --remarks '') clears a text field.")]
    Update {
        part_no: String,
        /// New part number
        #[arg(long, value_name = "PART_NO")]
        rename: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete a record (its log entries are kept)
    Delete { part_no: String },
    /// Find records by part number or description
    Search { term: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OrderArg {
    /// Newest first
    Created,
    /// By description, then part number
    Name,
}

impl From<OrderArg> for RecordOrder {
    fn from(o: OrderArg) -> Self {
        match o {
            OrderArg::Created => RecordOrder::CreatedDesc,
            OrderArg::Name => RecordOrder::NameAsc,
        }
    }
}

/// Descriptive record fields. Omitted options keep their current value on
/// update; an empty string clears a text field once the record is normalized.
#[derive(Args, Debug, Default)]
pub struct FieldArgs {
    #[arg(long)]
    pub s_no: Option<String>,
    #[arg(long)]
    pub sl_no_contract: Option<String>,
    #[arg(long)]
    pub set_patt_no: Option<String>,
    #[arg(long, short)]
    pub description: Option<String>,
    #[arg(long)]
    pub denomination: Option<String>,
    #[arg(long)]
    pub item_type: Option<String>,
    #[arg(long)]
    pub qty_per_gt: Option<i64>,
    #[arg(long)]
    pub mdnd_def: Option<String>,
    #[arg(long)]
    pub lf_no: Option<String>,
    #[arg(long)]
    pub location_bin: Option<String>,
    #[arg(long)]
    pub received_from: Option<String>,
    #[arg(long)]
    pub qty_received: Option<i64>,
    #[arg(long)]
    pub issued_to: Option<String>,
    #[arg(long)]
    pub qty_issued: Option<i64>,
    #[arg(long)]
    pub remarks: Option<String>,
}

impl FieldArgs {
    /// Overlay the given options on `base`.
    pub fn apply(self, base: RecordFields) -> RecordFields {
        RecordFields {
            part_no: base.part_no,
            s_no: self.s_no.or(base.s_no),
            sl_no_contract: self.sl_no_contract.or(base.sl_no_contract),
            set_patt_no: self.set_patt_no.or(base.set_patt_no),
            description: self.description.or(base.description),
            denomination: self.denomination.or(base.denomination),
            item_type: self.item_type.or(base.item_type),
            qty_per_gt: self.qty_per_gt.or(base.qty_per_gt),
            mdnd_def: self.mdnd_def.or(base.mdnd_def),
            lf_no: self.lf_no.or(base.lf_no),
            location_bin: self.location_bin.or(base.location_bin),
            received_from: self.received_from.or(base.received_from),
            qty_received: self.qty_received.or(base.qty_received),
            issued_to: self.issued_to.or(base.issued_to),
            qty_issued: self.qty_issued.or(base.qty_issued),
            remarks: self.remarks.or(base.remarks),
        }
    }
}

#[derive(Args)]
pub struct AdjustArgs {
    pub part_no: String,
    /// Signed change, e.g. 5 or -3
    #[arg(allow_negative_numbers = true)]
    pub delta: i64,
    #[arg(long, short, default_value = "")]
    pub reason: String,
    /// manual, scanner, or any other tag
    #[arg(long, short, default_value = "manual")]
    pub source: String,
}

#[derive(Args)]
pub struct TransactionsArgs {
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub limit: u32,
    /// Only entries of the record with this part number
    #[arg(long)]
    pub part_no: Option<String>,
}

#[derive(Subcommand)]
pub enum ReceiptAction {
    /// Record a certified receipt voucher
    Add(ReceiptArgs),
    /// List receipts, newest first
    List,
}

#[derive(Args)]
pub struct ReceiptArgs {
    #[arg(long)]
    pub set_no: Option<String>,
    #[arg(long)]
    pub part_no: Option<String>,
    #[arg(long)]
    pub item_desc: Option<String>,
    #[arg(long)]
    pub denom_qty: Option<String>,
    #[arg(long)]
    pub qty_received: Option<i64>,
    #[arg(long)]
    pub received_from: Option<String>,
    #[arg(long)]
    pub received_by: Option<String>,
    #[arg(long)]
    pub remarks: Option<String>,
}

impl From<ReceiptArgs> for CertifiedReceipt {
    fn from(a: ReceiptArgs) -> Self {
        Self {
            set_no: a.set_no,
            part_no: a.part_no,
            item_desc: a.item_desc,
            denom_qty: a.denom_qty,
            qty_received: a.qty_received,
            received_from: a.received_from,
            received_by: a.received_by,
            remarks: a.remarks,
        }
    }
}

#[derive(Subcommand)]
pub enum IssueAction {
    /// Record a spares issue voucher
    Add(IssueArgs),
    /// List issues, newest first
    List,
}

#[derive(Args)]
pub struct IssueArgs {
    #[arg(long)]
    pub sl_no: Option<String>,
    #[arg(long)]
    pub part_no: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub lf_no: Option<String>,
    #[arg(long)]
    pub item: Option<String>,
    #[arg(long)]
    pub qty_issued: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub balance: Option<i64>,
    #[arg(long)]
    pub issued_to: Option<String>,
    #[arg(long)]
    pub remarks: Option<String>,
}

impl From<IssueArgs> for SparesIssue {
    fn from(a: IssueArgs) -> Self {
        Self {
            sl_no: a.sl_no,
            part_no: a.part_no,
            description: a.description,
            lf_no: a.lf_no,
            item: a.item,
            qty_issued: a.qty_issued,
            balance: a.balance,
            issued_to: a.issued_to,
            remarks: a.remarks,
        }
    }
}

#[derive(Subcommand)]
pub enum DemandAction {
    /// Record a demand on the supply office
    Add(DemandArgs),
    /// List demands, newest first
    List,
}

#[derive(Args)]
pub struct DemandArgs {
    #[arg(long)]
    pub patt_no: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub mand_dept: Option<String>,
    #[arg(long)]
    pub lf_no: Option<String>,
    #[arg(long)]
    pub qty_req: Option<i64>,
    #[arg(long)]
    pub qty_held: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub balance: Option<i64>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub remarks: Option<String>,
}

impl From<DemandArgs> for DemandSupply {
    fn from(a: DemandArgs) -> Self {
        Self {
            patt_no: a.patt_no,
            description: a.description,
            mand_dept: a.mand_dept,
            lf_no: a.lf_no,
            qty_req: a.qty_req,
            qty_held: a.qty_held,
            balance: a.balance,
            location: a.location,
            remarks: a.remarks,
        }
    }
}

#[derive(Subcommand)]
pub enum ExportTarget {
    /// Every inventory record
    Inventory { path: PathBuf },
    /// The transaction log, newest first
    Transactions {
        path: PathBuf,
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
}

#[derive(Args)]
pub struct BackupArgs {
    /// Delete snapshots older than this many days (default from config)
    #[arg(long)]
    pub keep_days: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_delta_parses() {
        let cli = Cli::try_parse_from(["stockroom", "adjust", "P-100", "-3", "--reason", "issue"])
            .unwrap();
        match cli.command {
            Command::Adjust(a) => {
                assert_eq!(a.part_no, "P-100");
                assert_eq!(a.delta, -3);
                assert_eq!(a.reason, "issue");
                assert_eq!(a.source, "manual");
            }
            _ => panic!("expected adjust"),
        }
    }

    #[test]
    fn update_keeps_unspecified_fields() {
        let base = RecordFields {
            description: Some("Bolt".into()),
            remarks: Some("old".into()),
            ..RecordFields::with_part_no("P-1")
        };
        let args = FieldArgs {
            remarks: Some("new".into()),
            ..FieldArgs::default()
        };
        let merged = args.apply(base);
        assert_eq!(merged.part_no, "P-1");
        assert_eq!(merged.description.as_deref(), Some("Bolt"));
        assert_eq!(merged.remarks.as_deref(), Some("new"));
    }

    #[test]
    fn empty_option_clears_text_field() {
        let cli = Cli::try_parse_from(["stockroom", "item", "update", "P-1", "--remarks", ""])
            .unwrap();
        let Command::Item { action: ItemAction::Update { fields, .. } } = cli.command else {
            panic!("expected item update");
        };
        let base = RecordFields {
            description: Some("Bolt".into()),
            remarks: Some("old".into()),
            ..RecordFields::with_part_no("P-1")
        };
        let merged = fields.apply(base).normalized().unwrap();
        assert_eq!(merged.description.as_deref(), Some("Bolt"));
        assert_eq!(merged.remarks, None);
    }
}
