//! Minimal server-rendered pages. All interpolated values are produced by
//! this crate (formatted numbers, timestamps, validated zone names).

use std::fmt::Write as _;

use url::form_urlencoded;

use crate::history::HistoryRow;

const QUICK_RANGES_HOURS: [u32; 4] = [3, 6, 12, 24];

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

pub fn current(temperature: f64, humidity: f64) -> String {
    layout(
        "Current conditions",
        &format!(
            "<h1>Current conditions</h1>\n\
             <p>Temperature: <strong>{temperature:.1}&deg;C</strong></p>\n\
             <p>Humidity: <strong>{humidity:.1}%</strong></p>\n\
             <p><a href=\"/temp_history\">History</a></p>"
        ),
    )
}

pub fn no_sensor() -> String {
    layout(
        "Sensor unavailable",
        "<h1>Sensor unavailable</h1>\n<p>The sensor did not return a reading. Try again in a few seconds.</p>",
    )
}

pub struct HistoryPage<'a> {
    pub timezone: &'a str,
    pub from_date: &'a str,
    pub to_date: &'a str,
    pub rows: &'a [HistoryRow],
}

pub fn history(page: &HistoryPage<'_>) -> String {
    let tz_param: String = form_urlencoded::byte_serialize(page.timezone.as_bytes()).collect();

    let mut body = String::new();
    let _ = writeln!(body, "<h1>History</h1>");
    let _ = writeln!(
        body,
        "<p>From <strong>{}</strong> to <strong>{}</strong> ({}), {} records</p>",
        page.from_date,
        page.to_date,
        page.timezone,
        page.rows.len()
    );

    let _ = write!(body, "<p>");
    for hours in QUICK_RANGES_HOURS {
        let _ = write!(
            body,
            "<a href=\"/temp_history?range_h={hours}&amp;timezone={tz_param}\">{hours}h</a> "
        );
    }
    let _ = writeln!(body, "</p>");

    let _ = writeln!(
        body,
        "<table>\n<tr><th>Date</th><th>Temperature (&deg;C)</th><th>Humidity (%)</th></tr>"
    );
    for row in page.rows {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{:.1}</td><td>{:.1}</td></tr>",
            row.timestamp, row.temperature, row.humidity
        );
    }
    let _ = write!(body, "</table>");

    layout("History", &body)
}
