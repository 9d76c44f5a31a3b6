use anyhow::{Context, bail};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::client::{GoogleIdentity, IdentityProvider, import_contacts};
use crate::app::App;
use crate::dispatch::{DispatchReport, send_one, send_to_all};
use crate::gate::AlertDismissals;
use crate::matcher::{age_on, birthday_days_in_month, match_birthdays, summary};
use crate::models::{AutoSendConfig, ContactDraft, ContactPatch, NotificationPreferences};
use crate::scheduler::Scheduler;
use crate::sink;
use crate::utils::{block_on, display_phone};

/// Birthday reminders with WhatsApp greetings.
#[derive(Parser)]
#[command(name = "birthday-notifier", version, about)]
pub struct Cli {
    /// Path to the TOML settings file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage contacts.
    #[command(subcommand)]
    Contacts(ContactsCommand),
    /// Show who has a birthday on a date (today by default).
    Today {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show the days of a month that have birthdays.
    Calendar {
        /// Month as YYYY-MM; current month by default.
        #[arg(long)]
        month: Option<String>,
    },
    /// Greet everyone whose birthday is on the date. Not limited to once a day.
    Send {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Greet a single contact.
    SendOne { id: String },
    /// Today's birthday alert.
    #[command(subcommand)]
    Alert(AlertCommand),
    /// Message, image and automatic sending preferences.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Run the daily automatic sender until interrupted.
    Run,
    /// Google account used for spreadsheet import.
    #[command(subcommand)]
    Account(AccountCommand),
    /// Import contacts from a spreadsheet.
    Import,
}

#[derive(Args)]
pub struct ContactFields {
    #[arg(long)]
    name: Option<String>,
    /// Birth date as YYYY-MM-DD.
    #[arg(long)]
    birth_date: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    /// Whether the number uses WhatsApp.
    #[arg(long)]
    whatsapp: Option<bool>,
}

#[derive(Subcommand)]
pub enum ContactsCommand {
    Add(ContactFields),
    Edit {
        id: String,
        #[command(flatten)]
        fields: ContactFields,
    },
    Remove {
        id: String,
    },
    List,
    Activate {
        id: String,
    },
    Deactivate {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AlertCommand {
    Status,
    Dismiss,
    Reset,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    /// Greeting template; `[NOME]` is replaced by the contact's name.
    Template { template: String },
    /// Greeting image URL; omit to clear.
    Image { url: Option<String> },
    Prefs {
        #[arg(long)]
        email: Option<bool>,
        #[arg(long)]
        sms: Option<bool>,
        #[arg(long)]
        chat: Option<bool>,
    },
    AutoSend {
        #[arg(long)]
        enabled: Option<bool>,
        /// Local time as HH:MM.
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommand {
    Login {
        /// OAuth access token for the Google account.
        #[arg(long)]
        token: String,
    },
    Logout,
    Status,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn run(cli: Cli, app: App) -> anyhow::Result<()> {
    match cli.command {
        Command::Contacts(cmd) => contacts(&app, cmd),
        Command::Today { date } => show_day(&app, date.unwrap_or_else(today)),
        Command::Calendar { month } => calendar(&app, month.as_deref()),
        Command::Send { date } => send_all(&app, date.unwrap_or_else(today)),
        Command::SendOne { id } => send_single(&app, &id),
        Command::Alert(cmd) => alert(&app, cmd),
        Command::Config(cmd) => config(&app, cmd),
        Command::Run => run_scheduler(app),
        Command::Account(cmd) => account(&app, cmd),
        Command::Import => {
            let identity = GoogleIdentity::new(app.backend.clone())?;
            let imported = import_contacts(&identity)?;
            println!("Imported {} contact(s)", imported.len());
            Ok(())
        }
    }
}

fn contacts(app: &App, cmd: ContactsCommand) -> anyhow::Result<()> {
    let mut store = app.contacts()?;
    match cmd {
        ContactsCommand::Add(f) => {
            let c = store.add(ContactDraft {
                name: f.name.unwrap_or_default(),
                birth_date: f.birth_date.unwrap_or_default(),
                phone: f.phone.unwrap_or_default(),
                email: f.email,
                has_messaging_app: f.whatsapp.unwrap_or(true),
                active: true,
            })?;
            println!("Added {} ({})", c.name, c.id);
        }
        ContactsCommand::Edit { id, fields } => {
            let patch = ContactPatch {
                name: fields.name,
                birth_date: fields.birth_date,
                phone: fields.phone,
                email: fields.email.map(Some),
                has_messaging_app: fields.whatsapp,
                active: None,
            };
            if patch.is_empty() {
                bail!("nothing to change");
            }
            let c = store.edit(&id, patch)?;
            println!("Updated {} ({})", c.name, c.id);
        }
        ContactsCommand::Remove { id } => {
            let c = store.remove(&id)?;
            println!("Removed {}", c.name);
        }
        ContactsCommand::Activate { id } => {
            store.set_active(&id, true)?;
        }
        ContactsCommand::Deactivate { id } => {
            store.set_active(&id, false)?;
        }
        ContactsCommand::List => {
            for c in store.list() {
                println!(
                    "{}  {:<24} {}  {}{}{}",
                    c.id,
                    c.name,
                    c.birth_date,
                    display_phone(&c.phone),
                    if c.has_messaging_app { "" } else { "  (no WhatsApp)" },
                    if c.active { "" } else { "  [inactive]" },
                );
            }
        }
    }
    Ok(())
}

fn show_day(app: &App, date: NaiveDate) -> anyhow::Result<()> {
    let store = app.contacts()?;
    let contacts = store.list();
    let stats = summary(contacts, date);
    println!(
        "{} contacts ({} active), {} birthday(s) this month",
        stats.total, stats.active, stats.this_month
    );

    let matched = match_birthdays(contacts, date);
    if matched.is_empty() {
        println!("No birthdays on {}.", date.format("%d/%m"));
        return Ok(());
    }
    println!("Birthdays on {}:", date.format("%d/%m"));
    for c in matched {
        let age = age_on(c, date)
            .map(|a| format!(", {a} years"))
            .unwrap_or_default();
        println!("  {} ({}){}  {}", c.name, c.id, age, display_phone(&c.phone));
    }
    if date == today() && AlertDismissals::new(app.backend.clone()).is_dismissed(date) {
        println!("(alert dismissed for today)");
    }
    Ok(())
}

fn calendar(app: &App, month: Option<&str>) -> anyhow::Result<()> {
    let first = match month {
        Some(m) => NaiveDate::parse_from_str(&format!("{m}-01"), "%Y-%m-%d")
            .with_context(|| format!("month {m:?} is not YYYY-MM"))?,
        None => today().with_day(1).context("first day of month")?,
    };
    let store = app.contacts()?;
    let days = birthday_days_in_month(store.list(), first.year(), first.month());
    let listed: Vec<String> = days.iter().map(u32::to_string).collect();
    println!("{}: {}", first.format("%Y-%m"), listed.join(", "));
    Ok(())
}

fn print_report(report: DispatchReport) {
    println!(
        "{} sent, {} skipped, {} failed",
        report.sent, report.skipped, report.failed
    );
}

fn send_all(app: &App, date: NaiveDate) -> anyhow::Result<()> {
    let (contacts, template) = {
        let store = app.contacts()?;
        let cfg = store.configuration();
        (cfg.contacts.clone(), cfg.message_template.clone())
    };
    let sink = sink::from_kind(app.settings.sink);
    let delay = app.settings.manual_send_delay();
    let report = block_on(send_to_all(&contacts, date, &template, sink.as_ref(), delay))?;
    if report.attempted == 0 {
        println!("No birthdays on {}.", date.format("%d/%m"));
    } else {
        print_report(report);
    }
    Ok(())
}

fn send_single(app: &App, id: &str) -> anyhow::Result<()> {
    let (contact, template) = {
        let store = app.contacts()?;
        let contact = store
            .get(id)
            .cloned()
            .with_context(|| format!("no contact with id {id}"))?;
        (contact, store.configuration().message_template.clone())
    };
    let sink = sink::from_kind(app.settings.sink);
    block_on(send_one(&contact, &template, sink.as_ref()))??;
    println!("Greeting prepared for {}", contact.name);
    Ok(())
}

fn alert(app: &App, cmd: AlertCommand) -> anyhow::Result<()> {
    let alerts = AlertDismissals::new(app.backend.clone());
    let date = today();
    match cmd {
        AlertCommand::Status => {
            let store = app.contacts()?;
            let count = match_birthdays(store.list(), date).len();
            if count > 0 && !alerts.is_dismissed(date) {
                println!("{count} birthday(s) today");
            } else {
                println!("no alert");
            }
        }
        AlertCommand::Dismiss => alerts.dismiss(date)?,
        AlertCommand::Reset => alerts.reset(date)?,
    }
    Ok(())
}

fn config(app: &App, cmd: ConfigCommand) -> anyhow::Result<()> {
    let mut store = app.contacts()?;
    match cmd {
        ConfigCommand::Show => {
            let cfg = store.configuration();
            println!("template:  {}", cfg.message_template);
            println!("image:     {}", cfg.image_url.as_deref().unwrap_or("-"));
            println!(
                "channels:  email={} sms={} chat={}",
                cfg.preferences.email_enabled,
                cfg.preferences.sms_enabled,
                cfg.preferences.chat_enabled
            );
            println!(
                "auto-send: {} at {}",
                if cfg.auto_send.enabled { "on" } else { "off" },
                cfg.auto_send.time_of_day
            );
            match cfg.dispatch.last_auto_send_date {
                Some(d) => println!("last auto-send: {d}"),
                None => println!("last auto-send: never"),
            }
        }
        ConfigCommand::Template { template } => store.set_template(&template)?,
        ConfigCommand::Image { url } => store.set_image_url(url)?,
        ConfigCommand::Prefs { email, sms, chat } => {
            let current = store.configuration().preferences;
            store.set_preferences(NotificationPreferences {
                email_enabled: email.unwrap_or(current.email_enabled),
                sms_enabled: sms.unwrap_or(current.sms_enabled),
                chat_enabled: chat.unwrap_or(current.chat_enabled),
            })?;
        }
        ConfigCommand::AutoSend { enabled, at } => {
            let current = store.configuration().auto_send.clone();
            store.set_auto_send(AutoSendConfig {
                enabled: enabled.unwrap_or(current.enabled),
                time_of_day: at.unwrap_or(current.time_of_day),
            })?;
        }
    }
    Ok(())
}

fn run_scheduler(app: App) -> anyhow::Result<()> {
    let sink: Arc<dyn sink::SendSink> = Arc::from(sink::from_kind(app.settings.sink));
    let scheduler = Scheduler::new(app.contacts.clone(), sink)
        .with_check_interval(app.settings.check_interval())
        .with_send_delay(app.settings.auto_send_delay());
    block_on(async move {
        let handle = scheduler.start();
        let stopped = tokio::signal::ctrl_c().await;
        handle.stop().await;
        stopped.context("waiting for Ctrl-C")
    })?
}

fn account(app: &App, cmd: AccountCommand) -> anyhow::Result<()> {
    let identity = GoogleIdentity::new(app.backend.clone())?;
    match cmd {
        AccountCommand::Login { token } => {
            let user = block_on(identity.sign_in(&token))??;
            println!("Signed in as {} <{}>", user.name, user.email);
        }
        AccountCommand::Logout => block_on(identity.sign_out())??,
        AccountCommand::Status => match identity.current_user() {
            Some(user) => println!("Signed in as {} <{}>", user.name, user.email),
            None => println!("Not signed in"),
        },
    }
    Ok(())
}
