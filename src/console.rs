use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::models::{ItemCategory, Notice, NoticeVariant, Plan, Reservation};
use crate::services::{
    ChannelDecoder, FormErrors, ReservationApi, ReservationCache, ReservationForm, ScanEvent,
    ScanFeed, ScanHandle, SubmitOutcome,
};

const HELP: &str = "\
commands:
  code <value>                 reservation code
  pickup-plan <value>          pickup plan code
  return-plan <value>          return plan code (return only)
  info <text>                  free text information
  add <category> <code>        add an item (motor, helmet, fak, hardcase)
  remove <category> <code>     remove an item
  status <category> <code> <status>
  scan <category>              read codes until `done`; `ok` confirms, `rescan` discards
                               (other commands wait until `done`)
  show                         print the form
  save                         submit the form
  quit";

const COMMANDS: &[&str] = &[
    "help",
    "quit",
    "exit",
    "code",
    "pickup-plan",
    "return-plan",
    "info",
    "add",
    "remove",
    "status",
    "scan",
    "show",
    "save",
];

struct Scanner {
    category: ItemCategory,
    feed: ScanFeed<ChannelDecoder>,
    codes: mpsc::Sender<String>,
    handle: ScanHandle,
}

pub struct Console<A: ReservationApi + ?Sized, R, W> {
    form: ReservationForm<A>,
    input: Lines<R>,
    output: W,
    scan_interval: Duration,
    scanner: Option<Scanner>,
}

impl<A, R, W> Console<A, R, W>
where
    A: ReservationApi + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(form: ReservationForm<A>, input: R, output: W, scan_interval: Duration) -> Self {
        Self {
            form,
            input: input.lines(),
            output,
            scan_interval,
            scanner: None,
        }
    }

    pub fn form(&self) -> &ReservationForm<A> {
        &self.form
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub async fn run(&mut self) -> AppResult<()> {
        self.say(format!("{} reservation. Type `help` for commands.", self.form.mode().phase()))
            .await?;

        while let Some(line) = self.input.next_line().await? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if self.scanner.is_some() {
                self.scan_line(&line).await?;
                continue;
            }
            if !self.command(&line).await? {
                break;
            }
        }

        if let Some(scanner) = self.scanner.take() {
            scanner.handle.close();
        }
        if self.form.is_dirty() {
            self.say("Leaving with unsaved changes.").await?;
        }
        self.output.flush().await?;
        Ok(())
    }

    async fn command(&mut self, line: &str) -> AppResult<bool> {
        let (verb, rest) = split_word(line);
        debug!("console command {}", verb);

        match verb {
            "help" => self.say(HELP).await?,
            "quit" | "exit" => return Ok(false),
            "code" => self.form.set_reservation_code(rest),
            "pickup-plan" => self.form.set_pickup_plan_code(rest),
            "return-plan" => {
                if let Err(e) = self.form.set_return_plan_code(rest) {
                    self.say(format!("error: {}", e)).await?;
                }
            }
            "info" => self.form.set_information(rest),
            "add" | "remove" => {
                let (category, code) = split_word(rest);
                match category.parse::<ItemCategory>() {
                    Ok(category) if verb == "add" => {
                        if !self.form.add_item(category, code) {
                            self.say(format!("{} {} not added", category, code)).await?;
                        }
                    }
                    Ok(category) => {
                        if !self.form.remove_item(category, code) {
                            self.say(format!("{} {} is not in the list", category, code))
                                .await?;
                        }
                    }
                    Err(e) => self.say(format!("error: {}", e)).await?,
                }
            }
            "status" => {
                let (category, rest) = split_word(rest);
                let (code, status) = split_word(rest);
                match category.parse::<ItemCategory>() {
                    Ok(category) => {
                        if let Err(e) = self.form.set_item_status_str(category, code, status) {
                            self.say(format!("error: {}", e)).await?;
                        }
                    }
                    Err(e) => self.say(format!("error: {}", e)).await?,
                }
            }
            "scan" => match rest.parse::<ItemCategory>() {
                Ok(category) => self.start_scan(category).await?,
                Err(e) => self.say(format!("error: {}", e)).await?,
            },
            "show" => {
                let summary = render_form(&self.form);
                self.say(summary).await?;
            }
            "save" => self.save().await?,
            other => self.say(format!("unknown command `{}`", other)).await?,
        }
        Ok(true)
    }

    async fn start_scan(&mut self, category: ItemCategory) -> AppResult<()> {
        let (codes, decoder) = ChannelDecoder::channel(1);
        let (feed, handle) = ScanFeed::new(decoder, self.scan_interval);
        self.scanner = Some(Scanner {
            category,
            feed,
            codes,
            handle,
        });
        info!("Scanning {} items", category);
        self.say(format!(
            "Scanning {} items. `ok` confirms, `rescan` discards, `done` finishes.",
            category
        ))
        .await
    }

    async fn scan_line(&mut self, line: &str) -> AppResult<()> {
        let Some(scanner) = self.scanner.as_mut() else {
            return Ok(());
        };
        let category = scanner.category;

        match line {
            "done" => {
                scanner.handle.close();
                self.scanner = None;
                self.say("Scanner closed.").await
            }
            "ok" => {
                let known = self.form.known_codes(category);
                match scanner.feed.confirm(&known) {
                    Some(code) => {
                        self.form.add_item(category, &code);
                        self.say(format!("Added {} {}", category, code)).await
                    }
                    None => self.say("Nothing to confirm.").await,
                }
            }
            "rescan" => {
                scanner.feed.rescan();
                self.say("Discarded, scan again.").await
            }
            line if COMMANDS.contains(&split_word(line).0) => {
                self.say("Type `done` to close the scanner first.").await
            }
            code => {
                if let Some(pending) = scanner.feed.candidate() {
                    let message = format!("Confirm or discard {} first.", pending);
                    return self.say(message).await;
                }
                if scanner.codes.send(code.to_string()).await.is_err() {
                    self.scanner = None;
                    return self.say("Scanner closed.").await;
                }
                let known = self.form.known_codes(category);
                let event = scanner.feed.next_event(&known).await;
                match event {
                    Some(event) => {
                        if let ScanEvent::Duplicate(code) = &event {
                            debug!("{} {} scanned twice", category, code);
                        }
                        self.notify(&event.notice()).await
                    }
                    None => {
                        self.scanner = None;
                        self.say("Scanner closed.").await
                    }
                }
            }
        }
    }

    async fn save(&mut self) -> AppResult<()> {
        match self.form.submit().await {
            SubmitOutcome::Saved { reservation, notice } => {
                self.notify(&notice).await?;
                self.say(format!("id: {}", reservation.id)).await
            }
            SubmitOutcome::Invalid(errors) | SubmitOutcome::Rejected(errors) => {
                self.say(render_errors(&errors)).await
            }
            SubmitOutcome::Failed(notice) => self.notify(&notice).await,
            SubmitOutcome::SessionExpired => {
                self.say("Session expired, run `rental-desk login` and try again.")
                    .await
            }
            SubmitOutcome::NothingToSave => self.say("Nothing to save.").await,
        }
    }

    async fn notify(&mut self, notice: &Notice) -> AppResult<()> {
        let marker = match notice.variant {
            NoticeVariant::Default => "*",
            NoticeVariant::Destructive => "!",
        };
        self.say(format!("{} {}: {}", marker, notice.title, notice.description))
            .await
    }

    async fn say(&mut self, text: impl AsRef<str>) -> AppResult<()> {
        self.output.write_all(text.as_ref().as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        Ok(())
    }
}

fn split_word(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

pub fn render_form<A: ReservationApi + ?Sized>(form: &ReservationForm<A>) -> String {
    let tabs: Vec<String> = form
        .phase_indicator()
        .iter()
        .map(|(phase, active)| if *active { format!("[{}]", phase) } else { phase.to_string() })
        .collect();
    let fields = form.fields();

    let mut out = vec![
        tabs.join(" "),
        format!("Reservation code: {}", or_dash(&fields.reservation_code)),
        format!("Pickup plan: {}", or_dash(&fields.pickup_plan_code)),
        format!("Return plan: {}", or_dash(&fields.return_plan_code)),
        format!("Information: {}", or_dash(&fields.information)),
    ];
    for editor in form.collections().iter() {
        let entries: Vec<String> = editor
            .values()
            .iter()
            .map(|e| match e.status {
                Some(status) => format!("{} ({})", e.code, status),
                None => e.code.clone(),
            })
            .collect();
        let listed = if entries.is_empty() {
            "-".to_string()
        } else {
            entries.join(", ")
        };
        out.push(format!("{}: {}", editor.category(), listed));
    }
    if form.is_dirty() {
        out.push("(unsaved changes)".to_string());
    }
    out.join("\n")
}

pub fn render_errors(errors: &FormErrors) -> String {
    let mut out = Vec::new();
    for (field, messages) in errors.fields() {
        for message in messages {
            out.push(format!("  {}: {}", field, message));
        }
    }
    for error in errors.entries() {
        out.push(format!("  {}", error));
    }
    for (key, messages) in errors.custom() {
        for message in messages {
            out.push(format!("  {}: {}", key, message));
        }
    }
    format!("Cannot save:\n{}", out.join("\n"))
}

pub async fn print_plans<A, W>(api: &A, output: &mut W) -> AppResult<()>
where
    A: ReservationApi + ?Sized,
    W: AsyncWrite + Unpin,
{
    let plans = api.list_plans().await?;
    for Plan { id, plan_code, name, address, .. } in plans {
        let line = format!(
            "{:>4}  {:<10} {}{}\n",
            id,
            plan_code,
            name,
            address.map(|a| format!(" ({})", a)).unwrap_or_default()
        );
        output.write_all(line.as_bytes()).await?;
    }
    output.flush().await?;
    Ok(())
}

pub async fn print_reservations<A, W>(
    cache: &ReservationCache,
    api: &A,
    output: &mut W,
) -> AppResult<()>
where
    A: ReservationApi + ?Sized,
    W: AsyncWrite + Unpin,
{
    let reservations = cache.reservations(api).await?;
    for reservation in &reservations {
        output
            .write_all(format!("{}\n", reservation_line(reservation)).as_bytes())
            .await?;
    }
    output.flush().await?;
    Ok(())
}

pub async fn print_reservation<A, W>(api: &A, id: i64, output: &mut W) -> AppResult<()>
where
    A: ReservationApi + ?Sized,
    W: AsyncWrite + Unpin,
{
    let reservation = api.get_reservation(id).await?;
    let mut out = vec![
        format!("Reservation {} (id {})", reservation.reservation_code, reservation.id),
        format!("Status: {}", reservation.derived_status().as_str()),
        format!("Pickup plan: {}", or_dash(&reservation.pickup_plan_code)),
        format!(
            "Return plan: {}",
            or_dash(reservation.return_plan_code.as_deref().unwrap_or_default())
        ),
        format!(
            "Information: {}",
            or_dash(reservation.information.as_deref().unwrap_or_default())
        ),
    ];
    for category in ItemCategory::ALL {
        let items = reservation.items(category);
        if items.is_empty() {
            out.push(format!("{}: -", category));
            continue;
        }
        out.push(format!("{}:", category));
        for item in items {
            out.push(format!(
                "  {:<10} {:<20} {}",
                item.code,
                item.name.as_deref().unwrap_or("-"),
                item.status.as_deref().unwrap_or("-")
            ));
        }
    }
    output
        .write_all(format!("{}\n", out.join("\n")).as_bytes())
        .await?;
    output.flush().await?;
    Ok(())
}

fn reservation_line(reservation: &Reservation) -> String {
    let items: usize = ItemCategory::ALL
        .iter()
        .map(|c| reservation.items(*c).len())
        .sum();
    format!(
        "{:>4}  {:<10} {:<15} {} -> {}  {} items",
        reservation.id,
        reservation.reservation_code,
        reservation.derived_status().as_str(),
        reservation.pickup_plan_code,
        reservation.return_plan_code.as_deref().unwrap_or("-"),
        items
    )
}
