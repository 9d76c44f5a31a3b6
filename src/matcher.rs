use chrono::{Datelike, NaiveDate};
use log::warn;
use std::collections::BTreeSet;

use crate::models::Contact;

fn same_day_of_year(contact: &Contact, date: NaiveDate) -> bool {
    match contact.birthday() {
        Some(birthday) => birthday.month() == date.month() && birthday.day() == date.day(),
        None => {
            warn!(
                "skipping contact {} ({}): unreadable birth date {:?}",
                contact.id, contact.name, contact.birth_date
            );
            false
        }
    }
}

/// Active contacts whose birthday (month and day, any year) falls on `date`,
/// in input order.
pub fn match_birthdays<'a>(contacts: &'a [Contact], date: NaiveDate) -> Vec<&'a Contact> {
    contacts
        .iter()
        .filter(|c| c.active && same_day_of_year(c, date))
        .collect()
}

/// Completed years of age at `date`.
pub fn age_on(contact: &Contact, date: NaiveDate) -> Option<u32> {
    let birthday = contact.birthday()?;
    date.years_since(birthday)
}

/// Days of `month` in `year` carrying at least one active contact's
/// birthday. Feb 29 only shows up in leap years.
pub fn birthday_days_in_month(contacts: &[Contact], year: i32, month: u32) -> BTreeSet<u32> {
    contacts
        .iter()
        .filter(|c| c.active)
        .filter_map(Contact::birthday)
        .filter(|b| b.month() == month)
        .map(|b| b.day())
        .filter(|&d| NaiveDate::from_ymd_opt(year, month, d).is_some())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub active: usize,
    pub on_date: usize,
    pub this_month: usize,
}

pub fn summary(contacts: &[Contact], date: NaiveDate) -> Summary {
    let this_month = contacts
        .iter()
        .filter(|c| c.active)
        .filter_map(Contact::birthday)
        .filter(|b| b.month() == date.month())
        .count();
    Summary {
        total: contacts.len(),
        active: contacts.iter().filter(|c| c.active).count(),
        on_date: match_birthdays(contacts, date).len(),
        this_month,
    }
}

#[cfg(test)]
pub(crate) fn contact(name: &str, birth_date: &str, phone: &str) -> Contact {
    Contact {
        id: format!("id-{name}"),
        name: name.to_string(),
        birth_date: birth_date.to_string(),
        phone: phone.to_string(),
        email: None,
        has_messaging_app: true,
        active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn matches_month_and_day_regardless_of_year() {
        let contacts = vec![
            contact("João", "1990-06-08", "5511999887766"),
            contact("Maria", "1985-06-08", "5511888776655"),
            contact("Pedro", "1992-12-25", "5511777665544"),
        ];
        let names: Vec<_> = match_birthdays(&contacts, day(2024, 6, 8))
            .into_iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["João", "Maria"]);
    }

    #[test]
    fn malformed_dates_never_match_and_do_not_break_the_rest() {
        let contacts = vec![
            contact("Broken", "not-a-date", "1"),
            contact("Empty", "", "2"),
            contact("Ana", "1988-03-15", "3"),
        ];
        let matched = match_birthdays(&contacts, day(2030, 3, 15));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "Ana");
    }

    #[test]
    fn inactive_contacts_are_filtered() {
        let mut c = contact("Lucia", "1987-09-10", "1");
        c.active = false;
        assert!(match_birthdays(&[c], day(2024, 9, 10)).is_empty());
    }

    #[test]
    fn leap_day_birthdays_only_match_on_leap_years() {
        let contacts = vec![contact("Leap", "2000-02-29", "1")];
        assert!(match_birthdays(&contacts, day(2023, 2, 28)).is_empty());
        assert!(match_birthdays(&contacts, day(2023, 3, 1)).is_empty());
        assert_eq!(match_birthdays(&contacts, day(2024, 2, 29)).len(), 1);
    }

    #[test]
    fn age_counts_completed_years() {
        let c = contact("Ana", "1988-03-15", "1");
        assert_eq!(age_on(&c, day(2024, 3, 14)), Some(35));
        assert_eq!(age_on(&c, day(2024, 3, 15)), Some(36));
        assert_eq!(age_on(&c, day(1980, 1, 1)), None);
        assert_eq!(age_on(&contact("X", "garbage", "1"), day(2024, 1, 1)), None);
    }

    #[test]
    fn calendar_and_summary() {
        let mut inactive = contact("Off", "1990-06-20", "1");
        inactive.active = false;
        let contacts = vec![
            contact("João", "1990-06-08", "1"),
            contact("Maria", "1985-06-08", "2"),
            contact("Carlos", "1995-06-21", "3"),
            contact("Pedro", "1992-12-25", "4"),
            inactive,
        ];
        let days: Vec<_> = birthday_days_in_month(&contacts, 2024, 6).into_iter().collect();
        assert_eq!(days, [8, 21]);

        let s = summary(&contacts, day(2024, 6, 8));
        assert_eq!(
            s,
            Summary {
                total: 5,
                active: 4,
                on_date: 2,
                this_month: 3
            }
        );
    }

    #[test]
    fn leap_day_birthday_only_marked_in_leap_years() {
        let contacts = [contact("Lia", "2000-02-29", "1")];
        assert!(birthday_days_in_month(&contacts, 2023, 2).is_empty());
        assert_eq!(
            birthday_days_in_month(&contacts, 2024, 2).into_iter().collect::<Vec<_>>(),
            [29]
        );
    }
}
