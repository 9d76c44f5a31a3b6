use chrono::NaiveDate;
use log::{info, warn};
use std::time::Duration;

use crate::error::Result;
use crate::formatter::format_message;
use crate::matcher::match_birthdays;
use crate::models::Contact;
use crate::sink::SendSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Formats and hands one greeting to the sink.
pub async fn send_one(contact: &Contact, template: &str, sink: &dyn SendSink) -> Result<()> {
    let text = format_message(template, &contact.name);
    sink.send(&contact.phone_digits(), &text).await?;
    Ok(())
}

/// Greets every contact in `recipients`, pausing `delay` between hand-offs.
/// Ineligible contacts are skipped and a failed hand-off does not stop the
/// rest.
pub async fn send_each(
    recipients: &[&Contact],
    template: &str,
    sink: &dyn SendSink,
    delay: Duration,
) -> DispatchReport {
    let mut report = DispatchReport {
        attempted: recipients.len(),
        ..DispatchReport::default()
    };
    let mut first = true;
    for contact in recipients {
        if !contact.is_dispatch_eligible() {
            info!("not greeting {} ({}): not eligible", contact.name, contact.id);
            report.skipped += 1;
            continue;
        }
        if !first && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        first = false;
        match send_one(contact, template, sink).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!("greeting for {} failed: {e}", contact.name);
                report.failed += 1;
            }
        }
    }
    report
}

/// Manual "send to everyone" for `date`. Not gated: calling it twice sends
/// twice.
pub async fn send_to_all(
    contacts: &[Contact],
    date: NaiveDate,
    template: &str,
    sink: &dyn SendSink,
    delay: Duration,
) -> DispatchReport {
    let recipients = match_birthdays(contacts, date);
    if recipients.is_empty() {
        info!("no birthdays on {date}");
        return DispatchReport::default();
    }
    info!("sending greetings to {} contact(s) for {date}", recipients.len());
    send_each(&recipients, template, sink, delay).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::NAME_TOKEN;
    use crate::matcher::contact;
    use crate::models::DEFAULT_TEMPLATE;
    use crate::sink::testing::RecordingSink;

    fn june_8() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 8).unwrap()
    }

    #[tokio::test]
    async fn end_to_end_default_template() {
        let contacts = vec![contact("João", "1990-06-08", "5511999887766")];
        let sink = RecordingSink::default();
        let report = send_to_all(&contacts, june_8(), "", &sink, Duration::ZERO).await;
        assert_eq!(report.sent, 1);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5511999887766");
        assert_eq!(sent[0].1, DEFAULT_TEMPLATE.replacen(NAME_TOKEN, "João", 1));
        assert!(sent[0].1.contains("João"));
        assert!(!sent[0].1.contains(NAME_TOKEN));
    }

    #[tokio::test]
    async fn manual_send_is_not_gated() {
        let contacts = vec![contact("Ana", "1988-06-08", "1")];
        let sink = RecordingSink::default();
        send_to_all(&contacts, june_8(), "Oi [NOME]", &sink, Duration::ZERO).await;
        send_to_all(&contacts, june_8(), "Oi [NOME]", &sink, Duration::ZERO).await;
        assert_eq!(sink.sent().len(), 2);
    }

    #[tokio::test]
    async fn failures_and_ineligible_contacts_are_counted() {
        let mut no_app = contact("NoApp", "1990-06-08", "3");
        no_app.has_messaging_app = false;
        let contacts = vec![
            contact("A", "1990-06-08", "1"),
            contact("B", "1990-06-08", "2"),
            no_app,
            contact("Other day", "1990-06-09", "4"),
        ];
        let sink = RecordingSink {
            fail_for: vec!["1".into()],
            ..RecordingSink::default()
        };
        let report = send_to_all(&contacts, june_8(), "", &sink, Duration::ZERO).await;
        assert_eq!(
            report,
            DispatchReport {
                attempted: 3,
                sent: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(sink.sent()[0].0, "2");
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_recipients() {
        let contacts = vec![
            contact("A", "1990-06-08", "1"),
            contact("B", "1990-06-08", "2"),
            contact("C", "1990-06-08", "3"),
        ];
        let sink = RecordingSink::default();
        let start = tokio::time::Instant::now();
        send_to_all(&contacts, june_8(), "", &sink, Duration::from_millis(500)).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn nobody_today_sends_nothing() {
        let contacts = vec![contact("A", "1990-01-01", "1")];
        let sink = RecordingSink::default();
        let report = send_to_all(&contacts, june_8(), "", &sink, Duration::ZERO).await;
        assert_eq!(report, DispatchReport::default());
        assert!(sink.sent().is_empty());
    }
}
