//! HTML pages served by the device

use crate::core::state::DeviceState;
use crate::devices::gps::FixSample;
use crate::tracks::TrackMeta;
use alloc::format;
use alloc::string::{String, ToString};

/// Escape text for use inside HTML
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Wrap `body` in the common document
pub fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    )
}

pub fn home(state: DeviceState) -> String {
    let control = match state {
        DeviceState::Idle => "<form action=\"/track\" method=\"post\">\
             <input name=\"filename\" placeholder=\"description\">\
             <input name=\"width\" type=\"number\" min=\"1\" max=\"9\" value=\"3\">\
             <button>Start recording</button></form>",
        DeviceState::Tracking => "<form action=\"/track\" method=\"post\">\
             <input type=\"hidden\" name=\"stop\" value=\"1\">\
             <button>Stop recording</button></form>",
        DeviceState::Stopping => "<p>Stopping...</p>",
    };
    let body = format!(
        "<h1>TMC</h1>\n<p>State: {}</p>\n{}\n\
         <form action=\"/marker\" method=\"post\"><input name=\"text\" placeholder=\"marker\">\
         <button>Add marker</button></form>\n\
         <form action=\"/junction\" method=\"post\"><button>Add junction</button></form>\n\
         <form action=\"/display\" method=\"post\"><button>Show trails</button></form>\n\
         <p><a href=\"/loc\">Location</a> | <a href=\"/view_tracks\">Tracks</a> | \
         <a href=\"/debug\">Debug</a></p>",
        state, control
    );
    layout("TMC Home", &body)
}

pub fn location(fix: &FixSample) -> String {
    let latlong = format!("{},{}", fix.latitude, fix.longitude);
    let body = format!(
        "<a href=\"https://www.google.com/maps/search/{0}\" target=\"_blank\">{0}</a>",
        latlong
    );
    layout("TMC Location", &body)
}

pub fn debug(report: &str) -> String {
    let body = format!(
        "<h2>Debugging info</h2>\n<p>{}</p>",
        escape(report).replace('\n', "<br>")
    );
    layout("TMC Debug", &body)
}

/// Table of recorded tracks with download links
pub fn track_list<'m>(tracks: impl Iterator<Item = (&'m str, Option<&'m TrackMeta>)>) -> String {
    let mut rows = String::new();
    for (path, meta) in tracks {
        let (description, width, start) = match meta {
            Some(meta) => (escape(&meta.description), meta.width.to_string(), meta.start_time.to_string()),
            None => (String::new(), String::from("-"), String::from("-")),
        };
        rows.push_str(&format!(
            "<tr><td><a href=\"/download?filename={0}\">{1}</a></td><td>{2}</td><td>{3}</td><td>{4}</td></tr>\n",
            path,
            escape(path),
            description,
            width,
            start
        ));
    }
    let body = if rows.is_empty() {
        String::from("<h2>Tracks</h2>\n<p>No tracks recorded.</p>")
    } else {
        format!(
            "<h2>Tracks</h2>\n<table>\n<tr><th>File</th><th>Description</th><th>Width</th><th>Start</th></tr>\n{}</table>",
            rows
        )
    };
    layout("TMC Tracks", &body)
}
