use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use time::{macros::format_description, Date};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clinic_schedule_client::{
    auth::FileSessionStore,
    clock::{Clock, SystemClock},
    config::Config,
    lifetime::Lifetime,
    models::{
        payment::{CreatePaymentRequest, InvoiceRef},
        schedule::{ConflictAction, ShiftType},
    },
    payment::{
        reference::{payment_code, vietqr_url},
        PaymentOutcome, PaymentPoller, PaymentState,
    },
    scheduling::{
        builder::{AssignDraft, CopyDraft, RecurringDraft, ScheduleSubmission, StaffScope},
        calendar::MonthGrid,
        dates::{can_modify_month, is_past, YearMonth},
        dialog::{DialogKind, DialogState, ScheduleDialog},
    },
    ApiClient, AppContext, ClientError, Result,
};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(version)]
#[command(about = "Manage doctor schedules and take invoice payments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in role
    Whoami,
    /// List doctors that can be scheduled
    Doctors,
    /// Show the month calendar
    Calendar(MonthArgs),
    /// Show the shifts of one day
    Day {
        /// YYYY-MM-DD
        #[arg(value_parser = parse_date)]
        date: Date,
    },
    /// Assign a shift on one or more dates
    Assign {
        #[arg(short, long)]
        staff: i64,

        /// YYYY-MM-DD, repeatable
        #[arg(short, long = "date", value_parser = parse_date, required = true)]
        dates: Vec<Date>,

        #[command(flatten)]
        shift: ShiftArgs,
    },
    /// Assign a shift on every given weekday of a month
    Recurring {
        #[arg(short, long)]
        staff: i64,

        #[command(flatten)]
        month: MonthArgs,

        /// ISO weekday, 1 = Monday .. 7 = Sunday
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=7))]
        weekday: u8,

        #[command(flatten)]
        shift: ShiftArgs,

        /// Print the dates that would be scheduled without submitting
        #[arg(long)]
        dry_run: bool,
    },
    /// Copy the previous month's schedule into a month
    Copy {
        #[command(flatten)]
        month: MonthArgs,

        /// Only copy this doctor's shifts
        #[arg(short, long)]
        staff: Option<i64>,

        #[arg(long = "on-conflict", value_enum, default_value_t = ConflictArg::Skip)]
        on_conflict: ConflictArg,
    },
    /// Delete one doctor's shift on a day
    DeleteShift {
        #[arg(value_parser = parse_date)]
        date: Date,

        #[arg(short, long)]
        staff: i64,

        #[arg(long, value_enum, default_value_t = ShiftArg::Morning)]
        shift: ShiftArg,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Take payment for an invoice and wait until it settles
    Pay {
        #[arg(short, long)]
        invoice: i64,

        /// Invoice total in VND
        #[arg(short, long)]
        amount: i64,

        /// Payment method code, e.g. BANK_TRANSFER or MOMO
        #[arg(short, long)]
        method: Option<String>,

        #[arg(short, long)]
        staff: Option<i64>,
    },
}

#[derive(Args)]
struct MonthArgs {
    #[arg(short, long)]
    year: Option<i32>,

    #[arg(short = 'M', long, value_parser = clap::value_parser!(u8).range(1..=12))]
    month: Option<u8>,
}

impl MonthArgs {
    fn resolve(&self, today: Date) -> YearMonth {
        let current = YearMonth::of(today);
        YearMonth {
            year: self.year.unwrap_or(current.year),
            month: self.month.unwrap_or(current.month),
        }
    }
}

#[derive(Args)]
struct ShiftArgs {
    #[arg(long, value_enum, default_value_t = ShiftArg::Morning)]
    shift: ShiftArg,

    #[arg(long = "on-conflict", value_enum, default_value_t = ConflictArg::Skip)]
    on_conflict: ConflictArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShiftArg {
    Morning,
    Afternoon,
}

impl From<ShiftArg> for ShiftType {
    fn from(arg: ShiftArg) -> Self {
        match arg {
            ShiftArg::Morning => ShiftType::Morning,
            ShiftArg::Afternoon => ShiftType::Afternoon,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ConflictArg {
    Skip,
    Overwrite,
    Cancel,
}

impl From<ConflictArg> for ConflictAction {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Skip => ConflictAction::Skip,
            ConflictArg::Overwrite => ConflictAction::Overwrite,
            ConflictArg::Cancel => ConflictAction::Cancel,
        }
    }
}

fn parse_date(s: &str) -> std::result::Result<Date, String> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

/// A failed banner still ends the command with an error so the exit status
/// reflects it.
fn ensure_applied(state: &DialogState) -> Result<()> {
    match state {
        DialogState::Failed(_) => Err(ClientError::InvalidInput("Schedule change was not applied".into())),
        _ => Ok(()),
    }
}

struct App {
    cfg: Config,
    clock: SystemClock,
    client: ApiClient,
}

impl App {
    fn ctx(&self) -> &AppContext {
        self.client.context()
    }

    async fn require_admin(&self) -> Result<()> {
        match self.ctx().role().await {
            Some(role) if role.can_manage_schedule() => Ok(()),
            Some(role) => Err(ClientError::Forbidden(format!(
                "{role} cannot change schedules"
            ))),
            None => Err(ClientError::Unauthorized),
        }
    }

    async fn print_calendar(&self, ym: YearMonth) -> Result<()> {
        let today = self.clock.today();
        let resp = self.client.monthly_schedule(ym.year, ym.month).await?;
        let grid = MonthGrid::build(ym.year, ym.month, &resp.schedule_by_day, today, None)?;
        print!("{}", grid.render());

        if !resp.staff_colors.is_empty() {
            println!();
            for staff in &resp.staff_colors {
                println!("  {} {} (#{})", staff.color, staff.staff_name, staff.staff_id);
            }
        }
        println!("\n{} shift(s). S = morning, C = afternoon, F = full day.", resp.total_shifts);
        if resp.past_month {
            println!("This month is in the past and read-only.");
        } else if resp.total_shifts == 0 && resp.has_previous_month_schedule {
            println!("Tip: `clinic copy` can start from last month's schedule.");
        }
        Ok(())
    }

    /// Runs a submission through a dialog, printing the banner and refreshing
    /// the calendar of `month` on success.
    async fn submit(&self, kind: DialogKind, submission: ScheduleSubmission, month: YearMonth) -> Result<()> {
        let refreshed = Arc::new(AtomicBool::new(false));
        let flag = refreshed.clone();
        let mut dialog = ScheduleDialog::open(kind, Arc::new(self.client.clone()), move || {
            flag.store(true, Ordering::SeqCst);
        });

        let handle = dialog.close_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.close();
            }
        });

        let result = dialog.submit(submission).await;
        interrupt.abort();

        let state = match result {
            Ok(state) => state,
            Err(ClientError::Cancelled) => {
                println!("Cancelled; any response from the server was discarded.");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if let Some(banner) = state.banner() {
            println!("{banner}");
        }
        let applied = ensure_applied(state);
        dialog.close();

        if refreshed.load(Ordering::SeqCst) {
            println!();
            self.print_calendar(month).await?;
        }
        applied
    }

    async fn run(&self, command: Commands) -> Result<()> {
        let today = self.clock.today();
        match command {
            Commands::Login { username, password } => {
                let password = match password {
                    Some(p) => p,
                    None => prompt("Password: ").await?,
                };
                let role = self.client.login(&username, &password).await?;
                println!("Signed in as {role}");
            }
            Commands::Logout => {
                self.client.logout().await?;
                println!("Signed out");
            }
            Commands::Whoami => match self.ctx().role().await {
                Some(role) => println!("{role}"),
                None => println!("Not signed in"),
            },
            Commands::Doctors => {
                for doc in self.client.doctors().await? {
                    println!("{:>5}  {}  ({})", doc.staff_id, doc.full_name, doc.position);
                }
            }
            Commands::Calendar(month) => self.print_calendar(month.resolve(today)).await?,
            Commands::Day { date } => {
                let day = self.client.daily_schedule(date).await?;
                println!("{} {}", day.day_of_week_name, day.date);
                if day.shifts.is_empty() {
                    println!("  No shifts scheduled.");
                }
                for shift in &day.shifts {
                    println!(
                        "  #{:<5} {:<28} {:<9} {}-{}  {:?}  {}/{} booked",
                        shift.staff_id,
                        shift.staff_name,
                        shift.shift_type.label(),
                        shift.start_time,
                        shift.end_time,
                        shift.status,
                        shift.booked_slots_count,
                        shift.total_slots_count,
                    );
                }
            }
            Commands::Assign { staff, dates, shift } => {
                self.require_admin().await?;
                let mut draft = AssignDraft {
                    staff_id: Some(staff),
                    shift_type: shift.shift.into(),
                    conflict_action: shift.on_conflict.into(),
                    ..AssignDraft::default()
                };
                for date in dates {
                    draft.dates.add(date, today)?;
                }
                let month = draft.dates.first().map(YearMonth::of).unwrap_or(YearMonth::of(today));
                let submission = draft.build()?;
                self.submit(DialogKind::Assign, submission, month).await?;
            }
            Commands::Recurring {
                staff,
                month,
                weekday,
                shift,
                dry_run,
            } => {
                let ym = month.resolve(today);
                let mut draft = RecurringDraft::new(ym.year, ym.month);
                draft.staff_id = Some(staff);
                draft.day_of_week = weekday;
                draft.shift_type = shift.shift.into();
                draft.conflict_action = shift.on_conflict.into();

                let preview = draft.preview(today)?;
                println!("{} date(s): {}", preview.len(), join_dates(&preview));
                if dry_run {
                    return Ok(());
                }
                self.require_admin().await?;
                let submission = draft.build(today)?;
                self.submit(DialogKind::Recurring, submission, ym).await?;
            }
            Commands::Copy {
                month,
                staff,
                on_conflict,
            } => {
                self.require_admin().await?;
                let ym = month.resolve(today);
                if !can_modify_month(ym.year, ym.month, today)? {
                    return Err(ClientError::InvalidInput("Cannot copy into a past month".into()));
                }
                let mut draft = CopyDraft::new(ym.year, ym.month);
                draft.staff = staff.map_or(StaffScope::All, StaffScope::One);
                draft.conflict_action = on_conflict.into();
                let source = ym.previous();
                println!("Copying {}/{} into {}/{}", source.month, source.year, ym.month, ym.year);
                self.submit(DialogKind::Copy, draft.build()?, ym).await?;
            }
            Commands::DeleteShift {
                date,
                staff,
                shift,
                yes,
            } => {
                self.require_admin().await?;
                if is_past(date, today) {
                    return Err(ClientError::InvalidInput("Cannot modify past schedules".into()));
                }
                let shift_type: ShiftType = shift.into();
                let day = self.client.daily_schedule(date).await?;
                let target = day
                    .shifts
                    .iter()
                    .find(|s| s.staff_id == staff && s.shift_type == shift_type)
                    .ok_or_else(|| {
                        ClientError::InvalidInput(format!(
                            "No {} shift for staff {staff} on {date}",
                            shift_type.label()
                        ))
                    })?;

                if !yes {
                    let answer = prompt(&format!(
                        "Delete {}'s {} shift on {} ({} slot(s))? [y/N] ",
                        target.staff_name,
                        shift_type.label(),
                        date,
                        target.time_slots.len()
                    ))
                    .await?;
                    if !matches!(answer.trim(), "y" | "Y" | "yes") {
                        println!("Nothing deleted.");
                        return Ok(());
                    }
                }
                let removed = self.client.delete_shift(target).await?;
                println!("Deleted {removed} slot(s).");
            }
            Commands::Pay {
                invoice,
                amount,
                method,
                staff,
            } => self.pay(InvoiceRef { invoice_id: invoice, total_amount: amount }, method, staff).await?,
        }
        Ok(())
    }

    async fn pay(&self, invoice: InvoiceRef, method: Option<String>, staff: Option<i64>) -> Result<()> {
        let code = payment_code(&invoice);
        let base = self.cfg.api_url.trim_end_matches('/');
        let request = CreatePaymentRequest {
            invoice_id: invoice.invoice_id,
            staff_id: staff,
            description: code.clone(),
            return_url: format!("{base}/payment/success"),
            cancel_url: format!("{base}/payment/cancel"),
        };

        let poller = PaymentPoller::new(Arc::new(self.client.clone()), self.cfg.payment.clone());
        let mut states = poller.subscribe();

        let lifetime = Arc::new(Lifetime::new());
        let token = lifetime.token();
        let on_interrupt = lifetime.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.end();
            }
        });

        let timeout = self.cfg.payment.timeout;
        let watcher = async {
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                match &state {
                    PaymentState::Polling { link } => {
                        println!("Payment reference: {code}");
                        if let Some(url) = &link.checkout_url {
                            println!("Checkout: {url}");
                        }
                        match vietqr_url(link, &invoice, &code, method.as_deref()) {
                            Ok(Some(url)) => println!("QR: {url}"),
                            Ok(None) => {}
                            Err(e) => tracing::warn!("Could not build QR link: {}", e),
                        }
                        println!(
                            "Waiting up to {} min for payment (Ctrl-C to stop)...",
                            timeout.as_secs() / 60
                        );
                    }
                    s if s.is_terminal() => break,
                    _ => {}
                }
            }
        };

        let (outcome, ()) = tokio::join!(poller.run(invoice, request, token), watcher);
        interrupt.abort();

        match outcome? {
            PaymentOutcome::Succeeded { order_code } => println!("Payment received (order {order_code})."),
            PaymentOutcome::Expired => println!("Payment window expired."),
            PaymentOutcome::Cancelled => println!("Payment cancelled."),
        }
        Ok(())
    }
}

fn join_dates(dates: &[Date]) -> String {
    dates.iter().map(Date::to_string).collect::<Vec<_>>().join(", ")
}

async fn prompt(message: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (dev convenience)
    let _ = dotenvy::dotenv();

    // Tracing goes to stderr; stdout is reserved for command output
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let use_json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    let clock = SystemClock::new(cfg.timezone);
    let store = Arc::new(FileSessionStore::new(cfg.session_file.clone()));
    let ctx = AppContext::hydrate(store, &clock).await?;
    let client = ApiClient::new(&cfg.api_url, cfg.request_timeout, ctx)?;
    let app = App { cfg, clock, client };

    match app.run(cli.command).await {
        Ok(()) => Ok(()),
        Err(ClientError::Unauthorized) => {
            anyhow::bail!("Your session has expired or you are not signed in. Run `clinic login` to sign in again.")
        }
        Err(e) => Err(anyhow::anyhow!(e.user_message())),
    }
}
