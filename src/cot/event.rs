//! # CoT Event Projection
//!
//! Maps a broadcast message onto the Cursor-on-Target event schema consumed
//! by TAK servers. The uid is stable per sensor so the display updates a
//! track in place instead of stacking markers.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::signal::BroadcastMessage;

/// CoT type code for a hostile UAS
pub const COT_TYPE: &str = "a-h-A-M-F-Q";

/// Position source: machine-generated GPS
const COT_HOW: &str = "m-g";

/// Events expire this long after emission; the next detection renews them
const STALE_AFTER_SECS: i64 = 120;

/// Circular (horizontal) position error in meters
const CIRCULAR_ERROR_M: f64 = 10.0;

/// Linear (vertical) position error in meters
const LINEAR_ERROR_M: f64 = 15.0;

/// One renderable CoT event
#[derive(Debug, Clone, PartialEq)]
pub struct CotEvent {
    pub uid: String,
    pub callsign: String,
    pub time: DateTime<Utc>,
    pub stale: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub hae: f64,
    pub course_deg: f64,
    pub speed_mps: f64,
    /// Reporting sensor, echoed in the remarks block
    pub node: String,
}

impl CotEvent {
    /// Project a broadcast message, or `None` without a position fix.
    ///
    /// `now` becomes the event time; detections are plotted as of when they
    /// reach the publisher, not when the sensor sampled them.
    pub fn from_message(message: &BroadcastMessage, now: DateTime<Utc>) -> Option<Self> {
        let lat = message.lat?;
        let lon = message.lon?;
        let suffix = uid_suffix(&message.sn);

        Some(Self {
            uid: format!("skytrack.UAS.{suffix}"),
            callsign: format!("UAS-{suffix}"),
            time: now,
            stale: now + Duration::seconds(STALE_AFTER_SECS),
            lat,
            lon,
            hae: message.height_m.unwrap_or(0.0),
            course_deg: f64::from(message.direction_deg.unwrap_or(0)),
            speed_mps: message.speed_h_mps.unwrap_or(0.0),
            node: message.sn.clone(),
        })
    }

    /// Render the event as a standalone XML document
    pub fn to_xml(&self) -> String {
        let time = self.time.to_rfc3339_opts(SecondsFormat::Secs, true);
        let stale = self.stale.to_rfc3339_opts(SecondsFormat::Secs, true);
        let remarks = format!(
            "Remote-ID Detection\nNode: {}\nSpeed: {:.1} m/s @ {:.0}°",
            self.node, self.speed_mps, self.course_deg
        );

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<event version="2.0" uid="{uid}" type="{cot_type}" how="{how}" time="{time}" start="{time}" stale="{stale}">"#,
                r#"<point lat="{lat}" lon="{lon}" hae="{hae}" ce="{ce}" le="{le}"/>"#,
                "<detail>",
                r#"<contact callsign="{callsign}"/>"#,
                "<remarks>{remarks}</remarks>",
                r#"<track course="{course}" speed="{speed}"/>"#,
                "</detail></event>"
            ),
            uid = escape_xml(&self.uid),
            cot_type = COT_TYPE,
            how = COT_HOW,
            time = time,
            stale = stale,
            lat = self.lat,
            lon = self.lon,
            hae = self.hae,
            ce = CIRCULAR_ERROR_M,
            le = LINEAR_ERROR_M,
            callsign = escape_xml(&self.callsign),
            remarks = escape_xml(&remarks),
            course = self.course_deg,
            speed = self.speed_mps,
        )
    }
}

/// Last four characters of the identifier, or all of it when shorter
fn uid_suffix(id: &str) -> &str {
    match id.char_indices().rev().nth(3) {
        Some((idx, _)) => &id[idx..],
        None => id,
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sn: &str, lat: Option<f64>) -> BroadcastMessage {
        BroadcastMessage {
            sn: sn.to_string(),
            ts: Utc::now(),
            lat,
            lon: lat.map(|_| -114.07),
            height_m: Some(80.0),
            speed_h_mps: Some(12.5),
            direction_deg: Some(270),
        }
    }

    #[test]
    fn test_event_requires_position_fix() {
        let now = Utc::now();
        assert!(CotEvent::from_message(&message("D1", None), now).is_none());
        assert!(CotEvent::from_message(&message("D1", Some(51.05)), now).is_some());
    }

    #[test]
    fn test_uid_and_callsign_share_sensor_suffix() {
        let event = CotEvent::from_message(&message("SENSOR-1234", Some(51.05)), Utc::now()).unwrap();
        assert_eq!(event.uid, "skytrack.UAS.1234");
        assert_eq!(event.callsign, "UAS-1234");
    }

    #[test]
    fn test_short_sensor_id_used_whole() {
        let event = CotEvent::from_message(&message("D1", Some(51.05)), Utc::now()).unwrap();
        assert_eq!(event.uid, "skytrack.UAS.D1");
        assert_eq!(event.callsign, "UAS-D1");
    }

    #[test]
    fn test_event_goes_stale_two_minutes_out() {
        let now = Utc::now();
        let event = CotEvent::from_message(&message("D1", Some(51.05)), now).unwrap();
        assert_eq!(event.time, now);
        assert_eq!(event.stale - event.time, Duration::seconds(120));
    }

    #[test]
    fn test_xml_carries_point_contact_and_track() {
        let event = CotEvent::from_message(&message("SENSOR-1234", Some(51.05)), Utc::now()).unwrap();
        let xml = event.to_xml();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"uid="skytrack.UAS.1234""#));
        assert!(xml.contains(r#"type="a-h-A-M-F-Q""#));
        assert!(xml.contains(r#"lat="51.05""#));
        assert!(xml.contains(r#"hae="80""#));
        assert!(xml.contains(r#"ce="10""#));
        assert!(xml.contains(r#"<contact callsign="UAS-1234"/>"#));
        assert!(xml.contains("Speed: 12.5 m/s @ 270°"));
        assert!(xml.contains(r#"<track course="270" speed="12.5"/>"#));
    }

    #[test]
    fn test_xml_escapes_markup_in_sensor_id() {
        let event = CotEvent::from_message(&message("a<b>&c", Some(51.05)), Utc::now()).unwrap();
        let xml = event.to_xml();

        assert!(!xml.contains("a<b>"));
        assert!(xml.contains("&lt;b&gt;&amp;c"));
    }
}
