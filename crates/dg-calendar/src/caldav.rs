//! CalDAV client implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use dg_core::CaldavConfig;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Method};
use tracing::{debug, error, info};

use crate::error::{CalendarError, Result};
use crate::models::{CalendarEvent, TimeRange, resolve_local};
use crate::provider::CalendarProvider;

const ICAL_UTC: &str = "%Y%m%dT%H%M%SZ";

/// CalDAV client for calendar operations
pub struct CaldavClient {
    client: Client,
    config: CaldavConfig,
    base_url: String,
    zone: Tz,
}

impl CaldavClient {
    /// Create a new CalDAV client
    pub fn new(config: &CaldavConfig, zone: Tz) -> Result<Self> {
        if config.server_url.is_empty() {
            return Err(CalendarError::Configuration("CalDAV server URL not set".to_string()));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CalendarError::Configuration(e.to_string()))?;

        let base_url = config.server_url.trim_end_matches('/').to_string();

        info!("Calendar client initialized for: {}", base_url);

        Ok(Self {
            client,
            config: config.clone(),
            base_url,
            zone,
        })
    }

    fn calendar_url(&self) -> String {
        match &self.config.calendar_path {
            Some(path) => format!("{}/{}", self.base_url, path.trim_matches('/')),
            None => self.base_url.clone(),
        }
    }

    fn request(&self, method: &[u8], url: &str) -> Result<reqwest::RequestBuilder> {
        let method = Method::from_bytes(method)
            .map_err(|e| CalendarError::CaldavError(e.to_string()))?;
        let mut builder = self.client.request(method, url);
        if !self.config.username.is_empty() {
            builder = builder.basic_auth(&self.config.username, Some(&self.config.password));
        }
        Ok(builder)
    }

    fn calendar_query(range: &TimeRange) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8" ?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop>
        <D:getetag/>
        <C:calendar-data/>
    </D:prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:time-range start="{}" end="{}"/>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#,
            range.start.format(ICAL_UTC),
            range.end.format(ICAL_UTC)
        )
    }

    /// Pull every `calendar-data` element out of a multistatus response
    fn parse_calendar_response(&self, response: &str) -> Result<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut reader = Reader::from_str(response);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut in_calendar_data = false;
        let mut current_calendar_data = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"calendar-data" => {
                    in_calendar_data = true;
                    current_calendar_data.clear();
                }
                Ok(Event::End(ref e)) if e.local_name().as_ref() == b"calendar-data" => {
                    in_calendar_data = false;
                    events.extend(parse_icalendar(&current_calendar_data, self.zone));
                }
                Ok(Event::Text(ref e)) if in_calendar_data => {
                    let text = e
                        .unescape()
                        .map_err(|e| CalendarError::XmlParseError(e.to_string()))?;
                    current_calendar_data.push_str(&text);
                }
                Ok(Event::CData(ref e)) if in_calendar_data => {
                    current_calendar_data.push_str(&String::from_utf8_lossy(e));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(CalendarError::XmlParseError(e.to_string()));
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(events)
    }
}

#[async_trait]
impl CalendarProvider for CaldavClient {
    fn name(&self) -> &'static str {
        "caldav"
    }

    async fn list_events(&self, range: TimeRange) -> Result<Vec<CalendarEvent>> {
        let url = self.calendar_url();

        debug!("Fetching events from: {}", url);

        let response = self
            .request(b"REPORT", &url)?
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", "1")
            .body(Self::calendar_query(&range))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CalendarError::Authentication("CalDAV credentials rejected".to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("CalDAV request failed: {} - {}", status, error_text);
            return Err(CalendarError::CaldavError(format!(
                "Request failed: {} - {}",
                status, error_text
            )));
        }

        let text = response.text().await?;
        let events: Vec<_> = self
            .parse_calendar_response(&text)?
            .into_iter()
            .filter(|e| e.range().overlaps(&range))
            .collect();

        info!("Fetched {} events", events.len());
        Ok(events)
    }

    async fn create_event(&self, mut event: CalendarEvent) -> Result<CalendarEvent> {
        let uid = event
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let url = format!("{}/{}.ics", self.calendar_url(), uid);

        debug!("Creating event: {}", event.summary);

        let response = self
            .request(b"PUT", &url)?
            .header("Content-Type", "text/calendar; charset=utf-8")
            .header("If-None-Match", "*")
            .body(event_to_ical(&event, &uid, Utc::now()))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Create event failed: {} - {}", status, error_text);
            return Err(CalendarError::CreateError(format!(
                "Failed to create event: {} - {}",
                status, error_text
            )));
        }

        info!("Created event: {}", uid);

        event.id = Some(uid);
        Ok(event)
    }
}

/// Undo RFC 5545 line folding
fn unfold(ical: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in ical.lines() {
        let raw = raw.trim_end_matches('\r');
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.trim_start().to_string());
    }
    lines
}

/// Parse every VEVENT in an iCalendar blob. Events without a start are skipped.
fn parse_icalendar(ical: &str, zone: Tz) -> Vec<CalendarEvent> {
    let mut events = Vec::new();
    let mut current: Option<PartialEvent> = None;

    for line in unfold(ical) {
        if line == "BEGIN:VEVENT" {
            current = Some(PartialEvent::default());
            continue;
        }
        if line == "END:VEVENT" {
            if let Some(event) = current.take().and_then(|p| p.finish()) {
                events.push(event);
            }
            continue;
        }
        let Some(partial) = current.as_mut() else {
            continue;
        };
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (property, params) = match name.split_once(';') {
            Some((p, rest)) => (p, rest),
            None => (name, ""),
        };

        match property {
            "UID" => partial.uid = Some(value.to_string()),
            "SUMMARY" => partial.summary = unescape_text(value),
            "DESCRIPTION" => partial.description = Some(unescape_text(value)),
            "DTSTART" => partial.start = parse_ical_date(params, value, zone),
            "DTEND" => partial.end = parse_ical_date(params, value, zone),
            "STATUS" => partial.cancelled = value.eq_ignore_ascii_case("CANCELLED"),
            "TRANSP" => partial.transparent = value.eq_ignore_ascii_case("TRANSPARENT"),
            _ => {}
        }
    }

    events
}

#[derive(Default)]
struct PartialEvent {
    uid: Option<String>,
    summary: String,
    description: Option<String>,
    start: Option<(DateTime<Utc>, bool)>,
    end: Option<(DateTime<Utc>, bool)>,
    cancelled: bool,
    transparent: bool,
}

impl PartialEvent {
    fn finish(self) -> Option<CalendarEvent> {
        if self.cancelled || self.transparent {
            return None;
        }
        let (start, all_day) = self.start?;
        let end = match self.end {
            Some((end, _)) => end,
            None if all_day => start + chrono::Duration::days(1),
            None => start,
        };

        Some(CalendarEvent {
            id: self.uid,
            summary: self.summary,
            description: self.description,
            start,
            end,
        })
    }
}

/// Parse a DTSTART/DTEND value. Returns the instant and whether it was a date only.
///
/// UTC values end in `Z`. A TZID naming a known IANA zone is honoured; other
/// TZIDs, floating times and dates are read in the clinic zone.
fn parse_ical_date(params: &str, value: &str, zone: Tz) -> Option<(DateTime<Utc>, bool)> {
    let date_only = params.contains("VALUE=DATE") && !params.contains("VALUE=DATE-TIME");
    if date_only || !value.contains('T') {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some((resolve_local(zone, date.and_hms_opt(0, 0, 0)?), true));
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some((naive.and_utc(), false));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    let zone = params
        .split(';')
        .find_map(|p| p.strip_prefix("TZID="))
        .and_then(|tzid| tzid.trim_matches('"').parse::<Tz>().ok())
        .unwrap_or(zone);
    Some((resolve_local(zone, naive), false))
}

fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn event_to_ical(event: &CalendarEvent, uid: &str, stamp: DateTime<Utc>) -> String {
    let mut ical = String::new();

    ical.push_str("BEGIN:VCALENDAR\r\n");
    ical.push_str("VERSION:2.0\r\n");
    ical.push_str("PRODID:-//dental-gateway//calendar//ES\r\n");
    ical.push_str("CALSCALE:GREGORIAN\r\n");
    ical.push_str("BEGIN:VEVENT\r\n");

    ical.push_str(&format!("UID:{}\r\n", uid));
    ical.push_str(&format!("DTSTAMP:{}\r\n", stamp.format(ICAL_UTC)));
    ical.push_str(&format!("DTSTART:{}\r\n", event.start.format(ICAL_UTC)));
    ical.push_str(&format!("DTEND:{}\r\n", event.end.format(ICAL_UTC)));
    ical.push_str(&format!("SUMMARY:{}\r\n", escape_text(&event.summary)));

    if let Some(ref desc) = event.description {
        ical.push_str(&format!("DESCRIPTION:{}\r\n", escape_text(desc)));
    }

    ical.push_str("END:VEVENT\r\n");
    ical.push_str("END:VCALENDAR\r\n");

    ical
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn madrid() -> Tz {
        Tz::Europe__Madrid
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    const MULTISTATUS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:response>
    <D:href>/cal/a.ics</D:href>
    <D:propstat><D:prop>
      <C:calendar-data>BEGIN:VCALENDAR
BEGIN:VTIMEZONE
TZID:Europe/Madrid
BEGIN:STANDARD
DTSTART:19701025T030000
END:STANDARD
END:VTIMEZONE
BEGIN:VEVENT
UID:a
SUMMARY:Cita: Ana\, limpieza
DTSTART;TZID=Europe/Madrid:20250310T100000
DTEND;TZID=Europe/Madrid:20250310T103000
END:VEVENT
END:VCALENDAR
</C:calendar-data>
    </D:prop></D:propstat>
  </D:response>
  <D:response>
    <D:href>/cal/b.ics</D:href>
    <D:propstat><D:prop>
      <C:calendar-data>BEGIN:VCALENDAR
BEGIN:VEVENT
UID:b
SUMMARY:Formación
DTSTART:20250310T150000Z
DTEND:20250310T160000Z
END:VEVENT
END:VCALENDAR
</C:calendar-data>
    </D:prop></D:propstat>
  </D:response>
</D:multistatus>"#;

    #[test]
    fn test_parse_icalendar_skips_timezone_blocks() {
        let ical = "BEGIN:VCALENDAR\nBEGIN:VTIMEZONE\nDTSTART:19701025T030000\nEND:VTIMEZONE\n\
                    BEGIN:VEVENT\nUID:x\nSUMMARY:Test\nDTSTART:20250310T090000Z\nDTEND:20250310T093000Z\nEND:VEVENT\nEND:VCALENDAR";
        let events = parse_icalendar(ical, madrid());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, utc(2025, 3, 10, 9, 0));
        assert_eq!(events[0].end, utc(2025, 3, 10, 9, 30));
    }

    #[test]
    fn test_parse_all_day_and_folded_lines() {
        let ical = "BEGIN:VEVENT\r\nUID:y\r\nSUMMARY:Clínica cerrada por\r\n  formación\r\nDTSTART;VALUE=DATE:20250311\r\nEND:VEVENT\r\n";
        let events = parse_icalendar(ical, madrid());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Clínica cerrada por formación");
        // Midnight local (+01:00) is 23:00 UTC the day before
        assert_eq!(events[0].start, utc(2025, 3, 10, 23, 0));
        assert_eq!(events[0].end, utc(2025, 3, 11, 23, 0));
    }

    #[test]
    fn test_parse_summer_times_and_foreign_tzid() {
        let ical = "BEGIN:VEVENT\nUID:s\nDTSTART:20250714T090000\nDTEND:20250714T093000\nEND:VEVENT\n\
                    BEGIN:VEVENT\nUID:n\nDTSTART;TZID=America/New_York:20250714T090000\nEND:VEVENT\n\
                    BEGIN:VEVENT\nUID:c\nDTSTART;TZID=\"Custom Zone\":20250714T090000\nEND:VEVENT\n";
        let events = parse_icalendar(ical, madrid());
        assert_eq!(events.len(), 3);
        // Floating 09:00 in Madrid summer time is 07:00 UTC
        assert_eq!(events[0].start, utc(2025, 7, 14, 7, 0));
        assert_eq!(events[1].start, utc(2025, 7, 14, 13, 0));
        // Unknown TZIDs fall back to the clinic zone
        assert_eq!(events[2].start, utc(2025, 7, 14, 7, 0));
    }

    #[test]
    fn test_parse_skips_cancelled_and_transparent() {
        let ical = "BEGIN:VEVENT\nUID:c\nSTATUS:CANCELLED\nDTSTART:20250310T090000Z\nEND:VEVENT\n\
                    BEGIN:VEVENT\nUID:t\nTRANSP:TRANSPARENT\nDTSTART:20250310T090000Z\nEND:VEVENT\n";
        assert!(parse_icalendar(ical, madrid()).is_empty());
    }

    #[test]
    fn test_escape_roundtrip() {
        let text = "Ana; tel, 600\nnota";
        assert_eq!(unescape_text(&escape_text(text)), text);
    }

    #[test]
    fn test_event_to_ical() {
        let event = CalendarEvent::new("Cita: Ana", utc(2025, 3, 10, 9, 0), utc(2025, 3, 10, 9, 30))
            .with_description("WhatsApp: 34600111222");
        let ical = event_to_ical(&event, "uid-1", utc(2025, 3, 1, 0, 0));
        assert!(ical.contains("UID:uid-1\r\n"));
        assert!(ical.contains("DTSTART:20250310T090000Z\r\n"));
        assert!(ical.contains("DTEND:20250310T093000Z\r\n"));
        assert!(ical.contains("DESCRIPTION:WhatsApp: 34600111222\r\n"));
    }

    #[tokio::test]
    async fn test_list_events_report() {
        let server = MockServer::start().await;
        Mock::given(path("/cal"))
            .and(header("depth", "1"))
            .and(body_string_contains("20250310T000000Z"))
            .respond_with(ResponseTemplate::new(207).set_body_string(MULTISTATUS))
            .expect(1)
            .mount(&server)
            .await;

        let config = CaldavConfig {
            server_url: server.uri(),
            username: "clinic".to_string(),
            password: "secret".to_string(),
            calendar_path: Some("/cal/".to_string()),
        };
        let client = CaldavClient::new(&config, madrid()).unwrap();
        let events = client
            .list_events(TimeRange::new(utc(2025, 3, 10, 0, 0), utc(2025, 3, 11, 0, 0)))
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary, "Cita: Ana, limpieza");
        assert_eq!(events[0].start, utc(2025, 3, 10, 9, 0));
        assert_eq!(events[1].id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_create_event_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/cal/fixed-uid.ics"))
            .and(header("if-none-match", "*"))
            .and(body_string_contains("SUMMARY:Cita: Ana"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let config = CaldavConfig {
            server_url: format!("{}/", server.uri()),
            calendar_path: Some("cal".to_string()),
            ..Default::default()
        };
        let client = CaldavClient::new(&config, madrid()).unwrap();
        let mut event = CalendarEvent::new("Cita: Ana", utc(2025, 3, 10, 9, 0), utc(2025, 3, 10, 9, 30));
        event.id = Some("fixed-uid".to_string());

        let created = client.create_event(event).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("fixed-uid"));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = CaldavConfig {
            server_url: server.uri(),
            ..Default::default()
        };
        let client = CaldavClient::new(&config, madrid()).unwrap();
        let result = client
            .list_events(TimeRange::new(utc(2025, 3, 10, 0, 0), utc(2025, 3, 11, 0, 0)))
            .await;
        assert!(matches!(result, Err(CalendarError::Authentication(_))));
    }
}
