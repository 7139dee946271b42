//! User-facing texts for booking results

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::extract::Detail;
use crate::schedule::ClinicSchedule;
use crate::service::{Availability, BookingOutcome};

const WEEKDAY_NAMES: [&str; 7] = [
    "lunes",
    "martes",
    "miércoles",
    "jueves",
    "viernes",
    "sábado",
    "domingo",
];

const EXAMPLE: &str = "Por ejemplo: *Me llamo Ana García, quiero cita el 12/03 a las 10:30*";

fn format_date(date: NaiveDate) -> String {
    format!(
        "{} {}",
        WEEKDAY_NAMES[date.weekday().num_days_from_monday() as usize],
        date.format("%d/%m")
    )
}

fn format_slot(schedule: &ClinicSchedule, at: DateTime<Utc>) -> String {
    let local = schedule.local(at);
    format!("{} a las {}", format_date(local.date_naive()), local.format("%H:%M"))
}

fn detail_label(detail: Detail) -> &'static str {
    match detail {
        Detail::Name => "tu nombre",
        Detail::Date => "el día",
        Detail::Time => "la hora",
    }
}

/// "a", "a y b", "a, b y c"
fn join_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} y {}", init.join(", "), last),
    }
}

fn alternatives(schedule: &ClinicSchedule, slots: &[DateTime<Utc>]) -> String {
    if slots.is_empty() {
        return "No encuentro huecos libres en los próximos días.".to_string();
    }
    let lines: Vec<String> = slots
        .iter()
        .map(|slot| format!("• {}", format_slot(schedule, *slot)))
        .collect();
    format!("Horas libres más cercanas:\n{}", lines.join("\n"))
}

/// How to ask for an appointment when a calendar is connected
pub fn booking_help() -> String {
    format!("📅 Para reservar dime tu nombre, el día y la hora que prefieres.\n{}", EXAMPLE)
}

/// Text for a booking attempt
pub fn render_outcome(outcome: &BookingOutcome, schedule: &ClinicSchedule) -> String {
    match outcome {
        BookingOutcome::MissingDetails { missing, .. } => {
            let labels: Vec<&str> = missing.iter().map(|d| detail_label(*d)).collect();
            format!(
                "Para reservar tu cita necesito {}.\n{}",
                join_list(&labels),
                EXAMPLE
            )
        }
        BookingOutcome::InPast { .. } => {
            "Esa fecha y hora ya han pasado. ¿Qué otro día te viene bien?".to_string()
        }
        BookingOutcome::OutsideHours {
            requested,
            alternatives: slots,
        } => format!(
            "El {} la clínica está cerrada.\n{}",
            format_slot(schedule, *requested),
            alternatives(schedule, slots)
        ),
        BookingOutcome::SlotTaken {
            requested,
            alternatives: slots,
        } => format!(
            "El hueco del {} ya está ocupado.\n{}",
            format_slot(schedule, *requested),
            alternatives(schedule, slots)
        ),
        BookingOutcome::Booked { name, event } => format!(
            "✅ Cita reservada para {} el {}. ¡Te esperamos!",
            name,
            format_slot(schedule, event.start)
        ),
    }
}

/// Text for an availability query
pub fn render_availability(days: &[Availability], schedule: &ClinicSchedule) -> String {
    match days {
        [] => "No encuentro huecos libres en los próximos días.".to_string(),
        [day] if day.slots.is_empty() => {
            format!("No quedan horas libres el {}.", format_date(day.date))
        }
        _ => {
            let lines: Vec<String> = days
                .iter()
                .map(|day| {
                    let times: Vec<String> = day
                        .slots
                        .iter()
                        .map(|slot| schedule.local(*slot).format("%H:%M").to_string())
                        .collect();
                    format!("*{}*: {}", format_date(day.date), times.join(", "))
                })
                .collect();
            format!(
                "Horas libres:\n{}\n\nPara reservar escribe tu nombre, el día y la hora.",
                lines.join("\n")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::BookingRequest;
    use chrono::{Duration, TimeZone};
    use dg_calendar::CalendarEvent;
    use dg_core::BookingConfig;

    fn schedule() -> ClinicSchedule {
        ClinicSchedule::from_config(&BookingConfig::default()).unwrap()
    }

    /// Monday 2025-03-10, 10:00 clinic time
    fn ten() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_join_list() {
        assert_eq!(join_list(&["a"]), "a");
        assert_eq!(join_list(&["a", "b"]), "a y b");
        assert_eq!(join_list(&["a", "b", "c"]), "a, b y c");
    }

    #[test]
    fn test_missing_details_text() {
        let outcome = BookingOutcome::MissingDetails {
            request: BookingRequest::default(),
            missing: vec![Detail::Name, Detail::Date, Detail::Time],
        };
        let text = render_outcome(&outcome, &schedule());
        assert!(text.starts_with("Para reservar tu cita necesito tu nombre, el día y la hora."));
    }

    #[test]
    fn test_booked_text_uses_local_time() {
        let outcome = BookingOutcome::Booked {
            name: "Ana".to_string(),
            event: CalendarEvent::new("Cita: Ana", ten(), ten() + Duration::minutes(30)),
        };
        assert_eq!(
            render_outcome(&outcome, &schedule()),
            "✅ Cita reservada para Ana el lunes 10/03 a las 10:00. ¡Te esperamos!"
        );
    }

    #[test]
    fn test_taken_lists_alternatives() {
        let outcome = BookingOutcome::SlotTaken {
            requested: ten(),
            alternatives: vec![ten() + Duration::minutes(30), ten() + Duration::days(1)],
        };
        let text = render_outcome(&outcome, &schedule());
        assert!(text.contains("lunes 10/03 a las 10:00 ya está ocupado"));
        assert!(text.contains("• lunes 10/03 a las 10:30"));
        assert!(text.contains("• martes 11/03 a las 10:00"));
    }

    #[test]
    fn test_no_alternatives() {
        let outcome = BookingOutcome::OutsideHours {
            requested: ten(),
            alternatives: vec![],
        };
        assert!(render_outcome(&outcome, &schedule()).contains("No encuentro huecos libres"));
    }

    #[test]
    fn test_availability_texts() {
        let schedule = schedule();
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let empty = [Availability { date, slots: vec![] }];
        assert_eq!(render_availability(&empty, &schedule), "No quedan horas libres el lunes 10/03.");

        let some = [Availability {
            date,
            slots: vec![ten(), ten() + Duration::minutes(30)],
        }];
        assert!(render_availability(&some, &schedule).contains("*lunes 10/03*: 10:00, 10:30"));
    }
}
