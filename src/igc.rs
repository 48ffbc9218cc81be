//! IGC flight-log loading.
//!
//! Only B-records (timestamped fixes) are read. Fields sit at fixed byte
//! offsets:
//!
//! ```text
//! B HHMMSS DDMMmmmN DDDMMmmmE V PPPPP GGGGG ...
//! 0 1      7        15        24 25   30   35
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::LoadError;
use crate::types::LogRecord;

pub const MIN_RECORD_LEN: usize = 35;
const RECORD_MARKER: u8 = b'B';
const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub struct LogParser;

impl LogParser {
    /// Read every B-record in `path` (`.gz` is decompressed on the fly).
    pub fn load(path: &Path) -> Result<Vec<LogRecord>, LoadError> {
        let unreadable = |source| LoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(unreadable)?;

        let records = if path.extension().map(|e| e == "gz").unwrap_or(false) {
            Self::parse_reader(BufReader::new(GzDecoder::new(file)))
        } else {
            Self::parse_reader(BufReader::new(file))
        }
        .map_err(unreadable)?;

        if records.is_empty() {
            return Err(LoadError::NoRecords {
                path: path.to_path_buf(),
            });
        }
        log::info!("[IGC] loaded {} fix records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Same rules as `load`, for a log already in memory.
    pub fn parse_str(text: &str) -> Result<Vec<LogRecord>, LoadError> {
        let records: Vec<LogRecord> = text
            .lines()
            .filter_map(|line| Self::parse_b_record(line.as_bytes()))
            .collect();
        if records.is_empty() {
            return Err(LoadError::NoRecords {
                path: PathBuf::from("<memory>"),
            });
        }
        Ok(records)
    }

    fn parse_reader<R: Read>(mut reader: BufReader<R>) -> std::io::Result<Vec<LogRecord>> {
        let mut records = Vec::new();
        let mut line = Vec::with_capacity(128);
        let mut skipped = 0usize;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if line.first() != Some(&RECORD_MARKER) {
                continue;
            }
            match Self::parse_b_record(trim_eol(&line)) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            log::debug!("[IGC] skipped {} malformed B-records", skipped);
        }
        Ok(records)
    }

    /// Parse one B-record line. `None` for anything short or malformed.
    pub fn parse_b_record(line: &[u8]) -> Option<LogRecord> {
        if line.len() < MIN_RECORD_LEN || line[0] != RECORD_MARKER {
            return None;
        }

        let timestamp = parse_time(&line[1..7])?;
        let latitude = parse_coordinate(&line[7..15], 2, b'N', b'S')?;
        let longitude = parse_coordinate(&line[15..24], 3, b'E', b'W')?;
        // line[24] is the A/V validity flag; replay treats every record as a fix
        let baro_altitude = parse_altitude(&line[25..30])?;
        let gps_altitude = parse_altitude(&line[30..35])?;

        Some(LogRecord {
            timestamp,
            latitude,
            longitude,
            gps_altitude,
            baro_altitude,
            speed: 0.0,
            heading: 0.0,
            satellites: 0,
            hdop: 99.9,
        })
    }

    /// Fill `speed` and `heading` from consecutive positions.
    ///
    /// Each record gets the haversine speed and initial bearing from its
    /// predecessor. Record 0 copies record 1. A zero time step keeps the
    /// previous values.
    pub fn derive_ground_track(records: &mut [LogRecord]) {
        if records.len() < 2 {
            return;
        }

        for i in 1..records.len() {
            let (prev, cur) = (records[i - 1], records[i]);
            let dt_s = cur.timestamp.wrapping_sub(prev.timestamp) as f64 / 1000.0;
            if dt_s <= 0.0 {
                records[i].speed = prev.speed;
                records[i].heading = prev.heading;
                continue;
            }
            let distance = haversine_m(prev.latitude, prev.longitude, cur.latitude, cur.longitude);
            records[i].speed = (distance / dt_s) as f32;
            records[i].heading =
                initial_bearing_deg(prev.latitude, prev.longitude, cur.latitude, cur.longitude) as f32;
        }

        records[0].speed = records[1].speed;
        records[0].heading = records[1].heading;
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

fn digits(field: &[u8]) -> Option<u32> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(field.iter().fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0')))
}

fn parse_time(field: &[u8]) -> Option<u32> {
    let hours = digits(&field[0..2])?;
    let minutes = digits(&field[2..4])?;
    let seconds = digits(&field[4..6])?;
    Some((hours * 3600 + minutes * 60 + seconds) * 1000)
}

/// `D..DMMmmm` plus hemisphere letter. Minutes carry three implied decimals.
fn parse_coordinate(field: &[u8], degree_digits: usize, positive: u8, negative: u8) -> Option<f64> {
    let (body, hemisphere) = field.split_at(field.len() - 1);
    let degrees = digits(&body[..degree_digits])? as f64;
    let minutes = digits(&body[degree_digits..])? as f64 / 1000.0;
    let value = degrees + minutes / 60.0;

    match hemisphere[0] {
        h if h == positive => Some(value),
        h if h == negative => Some(-value),
        _ => None,
    }
}

/// Five-character meters field; leading `-` allowed for below-datum values.
fn parse_altitude(field: &[u8]) -> Option<f32> {
    match field.split_first() {
        Some((b'-', rest)) => digits(rest).map(|m| -(m as f32)),
        _ => digits(field).map(|m| m as f32),
    }
}

fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

fn initial_bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_lambda = (lon2 - lon1).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    const SAMPLE: &str = "B1012363357123N00730456WA0012300145";

    #[test]
    fn test_parses_reference_record() {
        let r = LogParser::parse_b_record(SAMPLE.as_bytes()).unwrap();
        assert_eq!(r.timestamp, 36_756_000);
        assert_relative_eq!(r.latitude, 33.95205, epsilon = 1e-9);
        assert_relative_eq!(r.longitude, -7.5076, epsilon = 1e-9);
        assert_eq!(r.baro_altitude, 123.0);
        assert_eq!(r.gps_altitude, 145.0);
        assert_eq!(r.speed, 0.0);
        assert_eq!(r.satellites, 0);
        assert_relative_eq!(r.hdop, 99.9);
    }

    #[test]
    fn test_southern_eastern_hemisphere() {
        let r = LogParser::parse_b_record(b"B0000003330000S15100000EA0050000520").unwrap();
        assert_eq!(r.timestamp, 0);
        assert_relative_eq!(r.latitude, -33.5, epsilon = 1e-9);
        assert_relative_eq!(r.longitude, 151.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_short_and_malformed_lines() {
        assert!(LogParser::parse_b_record(&SAMPLE.as_bytes()[..34]).is_none());
        assert!(LogParser::parse_b_record(b"B10123633571X3N00730456WA0012300145").is_none());
        assert!(LogParser::parse_b_record(b"B1012363357123X00730456WA0012300145").is_none());
        assert!(LogParser::parse_b_record(b"HFDTE150623                        ").is_none());
        // altitudes are plain digit fields
        assert!(LogParser::parse_b_record(b"B1012363357123N00730456WA  inf00145").is_none());
        assert!(LogParser::parse_b_record(b"B1012363357123N00730456WA  NaN00145").is_none());
        assert!(LogParser::parse_b_record(b"B1012363357123N00730456WA001231e+04").is_none());
        assert!(LogParser::parse_b_record(b"B1012363357123N00730456WA+012300145").is_none());
        assert!(LogParser::parse_b_record(b"B1012363357123N00730456WA  12300145").is_none());
        let below = LogParser::parse_b_record(b"B1012363357123N00730456WA-0012-0005").unwrap();
        assert_eq!((below.baro_altitude, below.gps_altitude), (-12.0, -5.0));
        // trailing extension fields are ignored
        assert!(LogParser::parse_b_record(b"B1012363357123N00730456WA0012300145012FXA").is_some());
    }

    #[test]
    fn test_malformed_line_does_not_abort() {
        let log = format!(
            "AXXX001\nHFDTE150623\n{}\nB10123\nB1012383357150N00730400WA0013000150\nLXXXcomment\n",
            SAMPLE
        );
        let records = LogParser::parse_str(&log).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].timestamp, 36_758_000);
    }

    #[test]
    fn test_no_records_is_an_error() {
        let err = LogParser::parse_str("AXXX\nHFDTE150623\n").unwrap_err();
        assert!(matches!(err, LoadError::NoRecords { .. }));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = LogParser::load(Path::new("/no/such/flight.igc")).unwrap_err();
        assert!(matches!(err, LoadError::Unreadable { .. }));
    }

    #[test]
    fn test_loads_plain_and_gzip_files() {
        let dir = std::env::temp_dir();
        let body = format!("HFDTE150623\r\n{}\r\n", SAMPLE);

        let plain = dir.join("vario_core_test_plain.igc");
        std::fs::write(&plain, &body).unwrap();
        let records = LogParser::load(&plain).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gps_altitude, 145.0);

        let gz = dir.join("vario_core_test_log.igc.gz");
        let mut enc = flate2::write::GzEncoder::new(
            std::fs::File::create(&gz).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(body.as_bytes()).unwrap();
        enc.finish().unwrap();
        assert_eq!(LogParser::load(&gz).unwrap(), records);

        let _ = std::fs::remove_file(&plain);
        let _ = std::fs::remove_file(&gz);
    }

    #[test]
    fn test_non_utf8_line_is_skipped() {
        let path = std::env::temp_dir().join("vario_core_test_binary.igc");
        let mut bytes = b"B\xff\xfe garbage that is long enough to pass\n".to_vec();
        bytes.extend_from_slice(SAMPLE.as_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(LogParser::load(&path).unwrap().len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_ground_track_due_north() {
        // one arc-minute of latitude is ~1853 m
        let mut records = LogParser::parse_str(
            "B1000004600000N00700000EA0100001000\n\
             B1001004601000N00700000EA0100001000\n\
             B1001004601000N00700000EA0100001000\n",
        )
        .unwrap();
        LogParser::derive_ground_track(&mut records);

        assert_relative_eq!(records[1].speed, 1853.2 / 60.0, epsilon = 0.2);
        assert_relative_eq!(records[1].heading, 0.0, epsilon = 1e-3);
        assert_eq!(records[0].speed, records[1].speed);
        // zero time step keeps the previous values
        assert_eq!(records[2].speed, records[1].speed);
    }

    #[test]
    fn test_bearing_is_normalized() {
        let west = initial_bearing_deg(46.0, 7.0, 46.0, 6.9);
        assert!(west > 269.0 && west < 271.0, "got {}", west);
    }
}
