//! Pull a name, a date and a time out of a free-text booking message
//!
//! Understands Spanish and English phrasing. Dates are resolved relative to
//! the clinic-local `today`.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(me llamo|mi nombre es|my name is|soy|i'?m|i am)\s+|(nombre)\s*:\s*)")
        .expect("name regex is valid")
});
static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("iso date regex is valid")
});
static NUMERIC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})(?:[/-](\d{4}|\d{2}))?\b").expect("numeric date regex is valid")
});
static MONTH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+de\s+([a-záéíóúñ]+)(?:\s+(?:de|del)\s+(\d{4}))?")
        .expect("month date regex is valid")
});
static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[:.h](\d{2})(?:\s*([ap])\.?\s?m\b\.?|(?:hrs|hs|h)\b|\b)")
        .expect("clock regex is valid")
});
static MERIDIEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\w:.])(\d{1,2})\s*([ap])\.?\s?m\b").expect("meridiem regex is valid")
});
static HOUR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:a las|a la|sobre las|at)\s+(\d{1,2})\b|\b(\d{1,2})\s*h\b")
        .expect("hour regex is valid")
});

/// Words that end a name: dates, fillers and booking verbs
const NAME_STOP_WORDS: &[&str] = &[
    "y", "e", "para", "el", "la", "los", "las", "de", "del", "a", "al", "en", "quiero", "quisiera",
    "me", "necesito", "una", "un", "cita", "hoy", "mañana", "manana", "pasado", "lunes", "martes",
    "miércoles", "miercoles", "jueves", "viernes", "sábado", "sabado", "domingo", "and", "for",
    "on", "at", "the", "i", "want", "would", "like", "need", "an", "appointment", "today",
    "tomorrow", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "por", "favor", "please", "gracias", "thanks",
];

/// Triggers weak enough that the name must be capitalised ("soy alérgico" is not a name)
const WEAK_TRIGGERS: &[&str] = &["soy", "i'm", "im", "i am"];

const MAX_NAME_WORDS: usize = 3;

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miércoles", Weekday::Wed),
    ("miercoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sábado", Weekday::Sat),
    ("sabado", Weekday::Sat),
    ("domingo", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

const MONTHS: &[&str] = &[
    "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto", "septiembre",
    "octubre", "noviembre", "diciembre",
];

/// Phrases that move an hour below 12 into the afternoon
/// "In the morning" phrases, which must not read as "tomorrow"
const MORNING: &[&str] = &[
    "por la mañana",
    "de la mañana",
    "en la mañana",
    "por la manana",
    "de la manana",
    "en la manana",
];

const AFTERNOON: &[&str] = &[
    "de la tarde",
    "por la tarde",
    "de la noche",
    "in the afternoon",
    "in the evening",
];

/// A detail the user still has to provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    Name,
    Date,
    Time,
}

/// What the user asked to book
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl BookingRequest {
    /// Extract whatever the message contains
    pub fn parse(text: &str, today: NaiveDate) -> Self {
        Self {
            name: extract_name(text),
            date: extract_date(text, today),
            time: extract_time(text),
        }
    }

    /// Use `name` (e.g. the WhatsApp profile name) when none was written
    pub fn with_fallback_name(mut self, name: Option<&str>) -> Self {
        if self.name.is_none() {
            self.name = name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string);
        }
        self
    }

    /// Details still missing, in asking order
    pub fn missing(&self) -> Vec<Detail> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push(Detail::Name);
        }
        if self.date.is_none() {
            missing.push(Detail::Date);
        }
        if self.time.is_none() {
            missing.push(Detail::Time);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Name after "me llamo", "my name is" and similar
pub fn extract_name(text: &str) -> Option<String> {
    for caps in NAME_RE.captures_iter(text) {
        let Some(trigger) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let trigger = trigger.as_str().to_lowercase();
        let rest = &text[caps.get(0).map_or(text.len(), |m| m.end())..];

        let mut words = Vec::new();
        for raw in rest.split_whitespace() {
            let word = raw.trim_end_matches(|c: char| !c.is_alphabetic());
            let ended = word.len() != raw.len();

            let valid = !word.is_empty()
                && word.chars().all(|c| c.is_alphabetic() || c == '-' || c == '\'')
                && !NAME_STOP_WORDS.contains(&word.to_lowercase().as_str());
            if !valid {
                break;
            }
            words.push(word);
            if ended || words.len() == MAX_NAME_WORDS {
                break;
            }
        }

        let Some(first) = words.first() else {
            continue;
        };
        let weak = WEAK_TRIGGERS.contains(&trigger.as_str());
        if weak && !first.chars().next().is_some_and(char::is_uppercase) {
            continue;
        }

        return Some(words.iter().map(|w| capitalise(w)).collect::<Vec<_>>().join(" "));
    }
    None
}

/// Day and month without a year roll into next year once they have passed
fn day_month(day: u32, month: u32, year: Option<i32>, today: NaiveDate) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => {
            let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if date < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(date)
            }
        }
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Requested date, resolved against `today`
pub fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE_RE.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    for caps in MONTH_DATE_RE.captures_iter(text) {
        let month_name = caps[2].to_lowercase();
        let Some(index) = MONTHS.iter().position(|m| *m == month_name) else {
            continue;
        };
        let day = caps[1].parse().ok()?;
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        if let Some(date) = day_month(day, index as u32 + 1, year, today) {
            return Some(date);
        }
    }

    if let Some(caps) = NUMERIC_DATE_RE.captures(text) {
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let year = caps.get(3).and_then(|y| {
            let year: i32 = y.as_str().parse().ok()?;
            Some(if year < 100 { 2000 + year } else { year })
        });
        if let Some(date) = day_month(day, month, year, today) {
            return Some(date);
        }
    }

    let lower = text.to_lowercase();
    // "por la mañana" is "in the morning", not "tomorrow"
    let lower = MORNING.iter().fold(lower, |text, phrase| text.replace(phrase, " "));

    if lower.contains("pasado mañana")
        || lower.contains("pasado manana")
        || lower.contains("day after tomorrow")
    {
        return Some(today + Duration::days(2));
    }
    if contains_word(&lower, "mañana") || contains_word(&lower, "manana") || contains_word(&lower, "tomorrow") {
        return Some(today + Duration::days(1));
    }
    if contains_word(&lower, "hoy") || contains_word(&lower, "today") {
        return Some(today);
    }

    for (name, weekday) in WEEKDAYS {
        if contains_word(&lower, name) {
            let ahead = (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
            let ahead = if ahead == 0 { 7 } else { ahead };
            return Some(today + Duration::days(i64::from(ahead)));
        }
    }

    None
}

fn to_24h(hour: u32, meridiem: Option<&str>) -> Option<u32> {
    match meridiem.map(|m| m.to_lowercase()) {
        Some(m) if m == "p" => Some(if hour < 12 { hour + 12 } else { hour }),
        Some(_) => Some(if hour == 12 { 0 } else { hour }),
        None => Some(hour),
    }
    .filter(|h| *h < 24)
}

/// Requested wall-clock time
pub fn extract_time(text: &str) -> Option<NaiveTime> {
    let (hour, minute, explicit) = if let Some(caps) = CLOCK_RE.captures(text) {
        let meridiem = caps.get(3).map(|m| m.as_str());
        let hour = to_24h(caps[1].parse().ok()?, meridiem)?;
        (hour, caps[2].parse().ok()?, meridiem.is_some())
    } else if let Some(caps) = MERIDIEM_RE.captures(text) {
        let hour = to_24h(caps[1].parse().ok()?, Some(&caps[2]))?;
        (hour, 0, true)
    } else if let Some(caps) = HOUR_RE.captures(text) {
        let hour = caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()?;
        (hour, 0, false)
    } else {
        return None;
    };

    let lower = text.to_lowercase();
    let hour = if !explicit && hour < 12 && AFTERNOON.iter().any(|p| lower.contains(p)) {
        hour + 12
    } else {
        hour
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}
