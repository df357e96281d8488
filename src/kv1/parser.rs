//! Schema-driven parser for the KV1 token stream.
//!
//! Each row dispatches on its record-type header (`ORUN`, `USRSTOP`, ...) to
//! a per-table parser that consumes a fixed, ordered list of cells through
//! the field validators. Errors come in three flavors: record errors abandon
//! the offending row and fold into the global error list at the row
//! boundary, global errors are reported at the end, and warnings cover
//! benign conditions such as unknown record types.

use crate::kv1::lexer::Kv1Token;
use crate::kv1::types::*;
use crate::time::{parse_datetime, Date, ServiceTime, AMSTERDAM};
use chrono_tz::Tz;

/// Result of parsing a KV1 token stream.
pub struct ParseOutcome {
    pub records: Kv1Records,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Parses with KV1's home zone (Europe/Amsterdam) for zone-less datetimes.
pub fn parse(tokens: &[Kv1Token]) -> ParseOutcome {
    parse_in_zone(tokens, AMSTERDAM)
}

pub fn parse_in_zone(tokens: &[Kv1Token], tz: Tz) -> ParseOutcome {
    let mut parser = Parser {
        tokens,
        pos: 0,
        tz,
        records: Kv1Records::default(),
        warnings: Vec::new(),
        global_errors: Vec::new(),
        record_errors: Vec::new(),
    };
    parser.run();
    ParseOutcome {
        records: parser.records,
        warnings: parser.warnings,
        errors: parser.global_errors,
    }
}

struct Parser<'a> {
    tokens: &'a [Kv1Token],
    pos: usize,
    tz: Tz,
    records: Kv1Records,
    warnings: Vec<String>,
    global_errors: Vec<String>,
    record_errors: Vec<String>,
}

fn integral_digits(value: f64) -> usize {
    let mut x = value.trunc().abs() as i64;
    let mut digits = 0;
    while x != 0 {
        digits += 1;
        x /= 10;
    }
    digits
}

// Fixed-point decimal: optional sign, digits, optional fraction. No
// exponents, no inf/nan.
fn parse_fixed(value: &str) -> Option<f64> {
    let rest = value.strip_prefix('-').unwrap_or(value);
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    value.parse().ok()
}

fn parse_rgb(value: &str) -> Option<RgbColor> {
    let b = value.as_bytes();
    if b.len() != 6 {
        return None;
    }
    let nibble = |c: u8| match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    };
    let octet = |hi: u8, lo: u8| Some((nibble(hi)? << 4) | nibble(lo)?);
    Some(RgbColor {
        r: octet(b[0], b[1])?,
        g: octet(b[2], b[3])?,
        b: octet(b[4], b[5])?,
    })
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat_row_ends(&mut self) {
        while matches!(self.tokens.get(self.pos), Some(Kv1Token::RowEnd)) {
            self.pos += 1;
        }
    }

    fn eat_rest_of_row(&mut self) {
        while matches!(self.tokens.get(self.pos), Some(Kv1Token::Cell(_))) {
            self.pos += 1;
        }
    }

    fn eat_cell(&mut self, what: &str) -> Option<&'a [u8]> {
        let tokens = self.tokens;
        match tokens.get(self.pos) {
            None => {
                self.record_errors
                    .push(format!("expected cell but got end of input when reading {what}"));
                None
            }
            Some(Kv1Token::RowEnd) => {
                self.record_errors
                    .push(format!("expected cell but got end of row when reading {what}"));
                None
            }
            Some(Kv1Token::Cell(data)) => {
                self.pos += 1;
                Some(data.as_slice())
            }
        }
    }

    // Consumed but never validated.
    fn eat_deprecated(&mut self, what: &str) {
        self.eat_cell(what);
    }

    fn eat_utf8(&mut self, field: &str) -> Option<&'a str> {
        let raw = self.eat_cell(field)?;
        if !self.record_errors.is_empty() {
            return None;
        }
        match std::str::from_utf8(raw) {
            Ok(value) => Some(value),
            Err(_) => {
                self.global_errors
                    .push(format!("{field} contains invalid UTF-8"));
                None
            }
        }
    }

    fn eat_string(&mut self, field: &str, mandatory: bool, max_len: usize) -> String {
        let Some(value) = self.eat_utf8(field) else {
            return String::new();
        };
        if value.is_empty() {
            if mandatory {
                self.record_errors
                    .push(format!("{field} has length zero but is required"));
            }
            return String::new();
        }
        let codepoints = value.chars().count();
        if codepoints > max_len {
            self.record_errors.push(format!(
                "{field} has length ({codepoints}) that is greater than maximum length ({max_len})"
            ));
        }
        value.to_owned()
    }

    fn eat_boolean(&mut self, field: &str, mandatory: bool) -> Option<bool> {
        let value = self.eat_utf8(field)?;
        if value.is_empty() {
            if mandatory {
                self.record_errors
                    .push(format!("{field} is required, but has no value"));
            }
            return None;
        }
        match value {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => {
                self.record_errors.push(format!(
                    "{field} should have value \"1\", \"0\", \"true\" or \"false\""
                ));
                None
            }
        }
    }

    fn eat_number(&mut self, field: &str, mandatory: bool, max_digits: usize) -> Option<f64> {
        let value = self.eat_utf8(field)?;
        if value.is_empty() {
            if mandatory {
                self.record_errors
                    .push(format!("{field} has no value but is required"));
            }
            return None;
        }
        let Some(parsed) = parse_fixed(value) else {
            self.record_errors
                .push(format!("{field} has a bad value that cannot be parsed as a number"));
            return None;
        };
        let digits = integral_digits(parsed);
        if digits > max_digits {
            self.record_errors.push(format!(
                "{field} contains more digits (in the integral part) ({digits}) than allowed ({max_digits})"
            ));
            return None;
        }
        Some(parsed)
    }

    fn eat_rgb_color(&mut self, field: &str, mandatory: bool) -> Option<RgbColor> {
        let value = self.eat_utf8(field)?;
        if value.is_empty() {
            if mandatory {
                self.record_errors
                    .push(format!("{field} is required, but has no value"));
            }
            return None;
        }
        let parsed = parse_rgb(value);
        if parsed.is_none() {
            self.record_errors.push(format!(
                "{field} should be an RGB color, six hexadecimal digits (RRGGBB)"
            ));
        }
        parsed
    }

    fn eat_rd_coord(&mut self, field: &str, mandatory: bool, min_digits: usize) -> Option<f64> {
        let value = self.eat_utf8(field)?;
        if value.is_empty() {
            if mandatory {
                self.record_errors
                    .push(format!("{field} is required, but has no value"));
            }
            return None;
        }
        if value.len() > 15 {
            self.record_errors
                .push(format!("{field} may not have more than 15 characters"));
            return None;
        }
        let Some(parsed) = parse_fixed(value) else {
            self.record_errors
                .push(format!("{field} has a bad value that cannot be parsed as a number"));
            return None;
        };
        let digits = integral_digits(parsed);
        if digits < min_digits {
            self.record_errors.push(format!(
                "{field} contains fewer digits (in the integral part) ({digits}) than required ({min_digits})"
            ));
            return None;
        }
        Some(parsed)
    }

    fn int_i16(&mut self, field: &str, value: f64) -> Option<i16> {
        if value.fract() == 0.0 && (i16::MIN as f64..=i16::MAX as f64).contains(&value) {
            Some(value as i16)
        } else {
            self.record_errors
                .push(format!("{field} should be an integer"));
            None
        }
    }

    fn int_i32(&mut self, field: &str, value: f64) -> Option<i32> {
        if value.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(&value) {
            Some(value as i32)
        } else {
            self.record_errors
                .push(format!("{field} should be an integer"));
            None
        }
    }

    fn eat_yyyymmdd(&mut self, field: &str, mandatory: bool, max_len: usize) -> Option<Date> {
        let raw = self.eat_string(field, mandatory, max_len);
        if !self.record_errors.is_empty() || raw.is_empty() {
            return None;
        }
        let parsed = Date::parse_yyyymmdd(&raw);
        if parsed.is_none() {
            self.record_errors
                .push(format!("{field} has invalid format, should be YYYY-MM-DD"));
        }
        parsed
    }

    fn eat_hhmmss(&mut self, field: &str, mandatory: bool) -> Option<ServiceTime> {
        let raw = self.eat_string(field, mandatory, 8);
        if !self.record_errors.is_empty() || raw.is_empty() {
            return None;
        }
        let parsed = ServiceTime::parse(&raw);
        if parsed.is_none() {
            self.record_errors
                .push(format!("{field} has invalid format, should be HH:MM:SS"));
        }
        parsed
    }

    fn check_e3_wheelchair(&mut self, field: &str, value: &str) {
        if !matches!(value, "ACCESSIBLE" | "NOTACCESSIBLE" | "UNKNOWN") {
            self.record_errors.push(format!(
                "{field} should be in BISON E3 values [ACCESSIBLE, NOTACCESSIBLE, UNKNOWN]"
            ));
        }
    }

    fn check_e21_show_flexible_trip(&mut self, field: &str, value: &str) {
        if !value.is_empty() && !matches!(value, "TRUE" | "FALSE" | "REALTIME") {
            self.record_errors.push(format!(
                "{field} should be in BISON E21 values [TRUE, FALSE, REALTIME]"
            ));
        }
    }

    fn parse_header(&mut self) -> String {
        let record_type = self.eat_string("<header>.Recordtype", true, 10);
        let version_number = self.eat_string("<header>.VersionNumber", true, 2);
        let implicit_explicit = self.eat_string("<header>.Implicit/Explicit", true, 1);
        if !self.record_errors.is_empty() {
            return String::new();
        }
        if version_number != "1" {
            self.record_errors
                .push("<header>.VersionNumber should be 1".to_string());
            return String::new();
        }
        if implicit_explicit != "I" {
            self.record_errors
                .push("<header>.Implicit/Explicit should be 'I'".to_string());
            return String::new();
        }
        record_type
    }

    fn run(&mut self) {
        while !self.at_end() {
            self.eat_row_ends();
            if self.at_end() {
                break;
            }

            let record_type = self.parse_header();
            if !self.record_errors.is_empty() {
                // A broken header leaves no reliable way to resynchronize.
                break;
            }

            let known = self.dispatch(&record_type);
            if !known {
                self.warnings.push(format!(
                    "Recordtype ({record_type}) is bad or names a record type that this program cannot process"
                ));
                self.eat_rest_of_row();
                continue;
            }

            if self.record_errors.is_empty()
                && matches!(self.tokens.get(self.pos), Some(Kv1Token::Cell(_)))
            {
                self.record_errors.push(format!(
                    "record parser for Recordtype ({record_type}) did not consume all record fields"
                ));
            }
            if !self.record_errors.is_empty() {
                self.eat_rest_of_row();
                self.global_errors.append(&mut self.record_errors);
            }
        }
        self.global_errors.append(&mut self.record_errors);
    }

    fn dispatch(&mut self, record_type: &str) -> bool {
        match record_type {
            "ORUN" => self.parse_organizational_unit(),
            "ORUNORUN" => self.parse_higher_organizational_unit(),
            "USRSTOP" => self.parse_user_stop_point(),
            "USRSTAR" => self.parse_user_stop_area(),
            "TILI" => self.parse_timing_link(),
            "LINK" => self.parse_link(),
            "LINE" => self.parse_line(),
            "DEST" => self.parse_destination(),
            "JOPA" => self.parse_journey_pattern(),
            "CONFINREL" => self.parse_concession_financer_relation(),
            "CONAREA" => self.parse_concession_area(),
            "FINANCER" => self.parse_financer(),
            "JOPATILI" => self.parse_journey_pattern_timing_link(),
            "POINT" => self.parse_point(),
            "POOL" => self.parse_point_on_link(),
            "ICON" => self.parse_icon(),
            "NOTICE" => self.parse_notice(),
            "NTCASSGNM" => self.parse_notice_assignment(),
            "TIMDEMGRP" => self.parse_time_demand_group(),
            "TIMDEMRNT" => self.parse_time_demand_group_run_time(),
            "PEGR" => self.parse_period_group(),
            "SPECDAY" => self.parse_specific_day(),
            "TIVE" => self.parse_timetable_version(),
            "PUJO" => self.parse_public_journey(),
            "PEGRVAL" => self.parse_period_group_validity(),
            "EXCOPDAY" => self.parse_exceptional_operating_day(),
            "SCHEDVERS" => self.parse_schedule_version(),
            "PUJOPASS" => self.parse_public_journey_passing_times(),
            "OPERDAY" => self.parse_operating_day(),
            _ => return false,
        }
        true
    }

    fn parse_organizational_unit(&mut self) {
        let data_owner_code = self.eat_string("ORUN.DataOwnerCode", true, 10);
        let organizational_unit_code = self.eat_string("ORUN.OrganizationalUnitCode", true, 10);
        let name = self.eat_string("ORUN.Name", true, 50);
        let organizational_unit_type = self.eat_string("ORUN.OrganizationalUnitType", true, 10);
        let description = self.eat_string("ORUN.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.organizational_units.push(Kv1OrganizationalUnit {
            key: Kv1OrganizationalUnitKey {
                data_owner_code: data_owner_code.into(),
                organizational_unit_code: organizational_unit_code.into(),
            },
            name,
            organizational_unit_type: organizational_unit_type.into(),
            description,
        });
    }

    fn parse_higher_organizational_unit(&mut self) {
        let data_owner_code = self.eat_string("ORUNORUN.DataOwnerCode", true, 10);
        let parent = self.eat_string("ORUNORUN.OrganizationalUnitCodeParent", true, 10);
        let child = self.eat_string("ORUNORUN.OrganizationalUnitCodeChild", true, 10);
        let valid_from = self.eat_yyyymmdd("ORUNORUN.ValidFrom", true, 10);
        if !self.record_errors.is_empty() {
            return;
        }
        let Some(valid_from) = valid_from else { return };

        self.records
            .higher_organizational_units
            .push(Kv1HigherOrganizationalUnit {
                key: Kv1HigherOrganizationalUnitKey {
                    data_owner_code: data_owner_code.into(),
                    organizational_unit_code_parent: parent.into(),
                    organizational_unit_code_child: child.into(),
                    valid_from,
                },
                organizational_unit_parent: None,
                organizational_unit_child: None,
            });
    }

    fn parse_user_stop_point(&mut self) {
        let data_owner_code = self.eat_string("USRSTOP.DataOwnerCode", true, 10);
        let user_stop_code = self.eat_string("USRSTOP.UserStopCode", true, 10);
        let timing_point_code = self.eat_string("USRSTOP.TimingPointCode", false, 10);
        let get_in = self.eat_boolean("USRSTOP.GetIn", true);
        let get_out = self.eat_boolean("USRSTOP.GetOut", true);
        self.eat_deprecated("USRSTOP.<deprecated field #1>");
        let name = self.eat_string("USRSTOP.Name", true, 50);
        let town = self.eat_string("USRSTOP.Town", true, 50);
        let user_stop_area_code = self.eat_string("USRSTOP.UserStopAreaCode", false, 10);
        let stop_side_code = self.eat_string("USRSTOP.StopSideCode", true, 10);
        self.eat_deprecated("USRSTOP.<deprecated field #2>");
        self.eat_deprecated("USRSTOP.<deprecated field #3>");
        let minimal_stop_time = self.eat_number("USRSTOP.MinimalStopTime", true, 5);
        let stop_side_length = self.eat_number("USRSTOP.StopSideLength", false, 3);
        let description = self.eat_string("USRSTOP.Description", false, 255);
        let user_stop_type = self.eat_string("USRSTOP.UserStopType", true, 10);
        let quay_code = self.eat_string("USRSTOP.QuayCode", false, 30);
        if !self.record_errors.is_empty() {
            return;
        }
        let (Some(get_in), Some(get_out), Some(minimal_stop_time)) =
            (get_in, get_out, minimal_stop_time)
        else {
            return;
        };

        self.records.user_stop_points.push(Kv1UserStopPoint {
            key: Kv1UserStopPointKey {
                data_owner_code: data_owner_code.into(),
                user_stop_code: user_stop_code.into(),
            },
            timing_point_code: timing_point_code.into(),
            get_in,
            get_out,
            name,
            town,
            user_stop_area_code: user_stop_area_code.into(),
            stop_side_code: stop_side_code.into(),
            minimal_stop_time_s: minimal_stop_time,
            stop_side_length,
            description,
            user_stop_type: user_stop_type.into(),
            quay_code: quay_code.into(),
            user_stop_area: None,
            point: None,
        });
    }

    fn parse_user_stop_area(&mut self) {
        let data_owner_code = self.eat_string("USRSTAR.DataOwnerCode", true, 10);
        let user_stop_area_code = self.eat_string("USRSTAR.UserStopAreaCode", true, 10);
        let name = self.eat_string("USRSTAR.Name", true, 50);
        let town = self.eat_string("USRSTAR.Town", true, 50);
        self.eat_deprecated("USRSTAR.<deprecated field #1>");
        self.eat_deprecated("USRSTAR.<deprecated field #2>");
        let description = self.eat_string("USRSTAR.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.user_stop_areas.push(Kv1UserStopArea {
            key: Kv1UserStopAreaKey {
                data_owner_code: data_owner_code.into(),
                user_stop_area_code: user_stop_area_code.into(),
            },
            name,
            town,
            description,
        });
    }

    fn parse_timing_link(&mut self) {
        let data_owner_code = self.eat_string("TILI.DataOwnerCode", true, 10);
        let user_stop_code_begin = self.eat_string("TILI.UserStopCodeBegin", true, 10);
        let user_stop_code_end = self.eat_string("TILI.UserStopCodeEnd", true, 10);
        let minimal_drive_time = self.eat_number("TILI.MinimalDriveTime", false, 5);
        let description = self.eat_string("TILI.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.timing_links.push(Kv1TimingLink {
            key: Kv1TimingLinkKey {
                data_owner_code: data_owner_code.into(),
                user_stop_code_begin: user_stop_code_begin.into(),
                user_stop_code_end: user_stop_code_end.into(),
            },
            minimal_drive_time_s: minimal_drive_time,
            description,
            user_stop_begin: None,
            user_stop_end: None,
        });
    }

    fn parse_link(&mut self) {
        let data_owner_code = self.eat_string("LINK.DataOwnerCode", true, 10);
        let user_stop_code_begin = self.eat_string("LINK.UserStopCodeBegin", true, 10);
        let user_stop_code_end = self.eat_string("LINK.UserStopCodeEnd", true, 10);
        self.eat_deprecated("LINK.<deprecated field #1>");
        let distance = self.eat_number("LINK.Distance", true, 6);
        let description = self.eat_string("LINK.Description", false, 255);
        let transport_type = self.eat_string("LINK.TransportType", true, 5);
        if !self.record_errors.is_empty() {
            return;
        }
        let Some(distance) = distance else { return };

        self.records.links.push(Kv1Link {
            key: Kv1LinkKey {
                data_owner_code: data_owner_code.into(),
                user_stop_code_begin: user_stop_code_begin.into(),
                user_stop_code_end: user_stop_code_end.into(),
                transport_type: transport_type.into(),
            },
            distance,
            description,
            user_stop_begin: None,
            user_stop_end: None,
        });
    }

    fn parse_line(&mut self) {
        let data_owner_code = self.eat_string("LINE.DataOwnerCode", true, 10);
        let line_planning_number = self.eat_string("LINE.LinePlanningNumber", true, 10);
        let line_public_number = self.eat_string("LINE.LinePublicNumber", true, 4);
        let line_name = self.eat_string("LINE.LineName", true, 50);
        let line_ve_tag_number = self.eat_number("LINE.LineVeTagNumber", true, 3);
        let description = self.eat_string("LINE.Description", false, 255);
        let transport_type = self.eat_string("LINE.TransportType", true, 5);
        let line_icon = self.eat_number("LINE.LineIcon", false, 4);
        let line_color = self.eat_rgb_color("LINE.LineColor", false);
        let line_text_color = self.eat_rgb_color("LINE.LineTextColor", false);
        if !self.record_errors.is_empty() {
            return;
        }

        // The standard bounds LineVeTagNumber to [0, 400); operators do not
        // honor that, so only integrality is checked.
        let line_ve_tag_number =
            line_ve_tag_number.and_then(|x| self.int_i16("LINE.LineVeTagNumber", x));
        let line_icon = line_icon.and_then(|x| self.int_i16("LINE.LineIcon", x));
        if !self.record_errors.is_empty() {
            return;
        }
        let Some(line_ve_tag_number) = line_ve_tag_number else { return };

        self.records.lines.push(Kv1Line {
            key: Kv1LineKey {
                data_owner_code: data_owner_code.into(),
                line_planning_number: line_planning_number.into(),
            },
            line_public_number: line_public_number.into(),
            line_name,
            line_ve_tag_number,
            description,
            transport_type: transport_type.into(),
            line_icon,
            line_color,
            line_text_color,
            icon: None,
        });
    }

    fn parse_destination(&mut self) {
        let data_owner_code = self.eat_string("DEST.DataOwnerCode", true, 10);
        let dest_code = self.eat_string("DEST.DestCode", true, 10);
        let dest_name_full = self.eat_string("DEST.DestNameFull", true, 50);
        let dest_name_main = self.eat_string("DEST.DestNameMain", true, 24);
        let dest_name_detail = self.eat_string("DEST.DestNameDetail", false, 24);
        let relevant_dest_name_detail = self.eat_boolean("DEST.RelevantDestNameDetail", true);
        let dest_name_main_21 = self.eat_string("DEST.DestNameMain21", true, 21);
        let dest_name_detail_21 = self.eat_string("DEST.DestNameDetail21", false, 21);
        let dest_name_main_19 = self.eat_string("DEST.DestNameMain19", true, 19);
        let dest_name_detail_19 = self.eat_string("DEST.DestNameDetail19", false, 19);
        let dest_name_main_16 = self.eat_string("DEST.DestNameMain16", true, 16);
        let dest_name_detail_16 = self.eat_string("DEST.DestNameDetail16", false, 16);
        let dest_icon = self.eat_number("DEST.DestIcon", false, 4);
        let dest_color = self.eat_rgb_color("DEST.DestColor", false);
        // The standard declares DestTextColor as 30 characters but describes
        // an RGB value of six hex digits; the data follows the latter.
        let dest_text_color = self.eat_rgb_color("DEST.DestTextColor", false);
        if !self.record_errors.is_empty() {
            return;
        }

        let dest_icon = dest_icon.and_then(|x| self.int_i16("DEST.DestIcon", x));
        if !self.record_errors.is_empty() {
            return;
        }
        let Some(relevant_dest_name_detail) = relevant_dest_name_detail else { return };

        self.records.destinations.push(Kv1Destination {
            key: Kv1DestinationKey {
                data_owner_code: data_owner_code.into(),
                dest_code: dest_code.into(),
            },
            dest_name_full,
            dest_name_main,
            dest_name_detail,
            relevant_dest_name_detail,
            dest_name_main_21,
            dest_name_detail_21,
            dest_name_main_19,
            dest_name_detail_19,
            dest_name_main_16,
            dest_name_detail_16,
            dest_icon,
            dest_color,
            dest_text_color,
        });
    }

    fn parse_journey_pattern(&mut self) {
        let data_owner_code = self.eat_string("JOPA.DataOwnerCode", true, 10);
        let line_planning_number = self.eat_string("JOPA.LinePlanningNumber", true, 10);
        let journey_pattern_code = self.eat_string("JOPA.JourneyPatternCode", true, 10);
        let journey_pattern_type = self.eat_string("JOPA.JourneyPatternType", true, 10);
        let direction = self.eat_string("JOPA.Direction", true, 1);
        let description = self.eat_string("JOPA.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        let direction = match direction.as_str() {
            "1" => '1',
            "2" => '2',
            "A" => 'A',
            "B" => 'B',
            _ => {
                self.record_errors
                    .push("JOPA.Direction should be in [1, 2, A, B]".to_string());
                return;
            }
        };

        self.records.journey_patterns.push(Kv1JourneyPattern {
            key: Kv1JourneyPatternKey {
                data_owner_code: data_owner_code.into(),
                line_planning_number: line_planning_number.into(),
                journey_pattern_code: journey_pattern_code.into(),
            },
            journey_pattern_type: journey_pattern_type.into(),
            direction,
            description,
            line: None,
        });
    }

    fn parse_concession_financer_relation(&mut self) {
        let data_owner_code = self.eat_string("CONFINREL.DataOwnerCode", true, 10);
        let con_fin_rel_code = self.eat_string("CONFINREL.ConFinRelCode", true, 10);
        let concession_area_code = self.eat_string("CONFINREL.ConcessionAreaCode", true, 10);
        let financer_code = self.eat_string("CONFINREL.FinancerCode", false, 10);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records
            .concession_financer_relations
            .push(Kv1ConcessionFinancerRelation {
                key: Kv1ConcessionFinancerRelationKey {
                    data_owner_code: data_owner_code.into(),
                    con_fin_rel_code: con_fin_rel_code.into(),
                },
                concession_area_code: concession_area_code.into(),
                financer_code: financer_code.into(),
                concession_area: None,
                financer: None,
            });
    }

    fn parse_concession_area(&mut self) {
        let data_owner_code = self.eat_string("CONAREA.DataOwnerCode", true, 10);
        let concession_area_code = self.eat_string("CONAREA.ConcessionAreaCode", true, 10);
        let description = self.eat_string("CONAREA.Description", true, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.concession_areas.push(Kv1ConcessionArea {
            key: Kv1ConcessionAreaKey {
                data_owner_code: data_owner_code.into(),
                concession_area_code: concession_area_code.into(),
            },
            description,
        });
    }

    fn parse_financer(&mut self) {
        let data_owner_code = self.eat_string("FINANCER.DataOwnerCode", true, 10);
        let financer_code = self.eat_string("FINANCER.FinancerCode", true, 10);
        let description = self.eat_string("FINANCER.Description", true, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.financers.push(Kv1Financer {
            key: Kv1FinancerKey {
                data_owner_code: data_owner_code.into(),
                financer_code: financer_code.into(),
            },
            description,
        });
    }

    fn parse_journey_pattern_timing_link(&mut self) {
        let data_owner_code = self.eat_string("JOPATILI.DataOwnerCode", true, 10);
        let line_planning_number = self.eat_string("JOPATILI.LinePlanningNumber", true, 10);
        let journey_pattern_code = self.eat_string("JOPATILI.JourneyPatternCode", true, 10);
        let timing_link_order = self.eat_number("JOPATILI.TimingLinkOrder", true, 3);
        let user_stop_code_begin = self.eat_string("JOPATILI.UserStopCodeBegin", true, 10);
        let user_stop_code_end = self.eat_string("JOPATILI.UserStopCodeEnd", true, 10);
        let con_fin_rel_code = self.eat_string("JOPATILI.ConFinRelCode", true, 10);
        let dest_code = self.eat_string("JOPATILI.DestCode", true, 10);
        self.eat_deprecated("JOPATILI.<deprecated field #1>");
        let is_timing_stop = self.eat_boolean("JOPATILI.IsTimingStop", true);
        let display_public_line = self.eat_string("JOPATILI.DisplayPublicLine", false, 4);
        let product_formula_type = self.eat_number("JOPATILI.ProductFormulaType", false, 4);
        let get_in = self.eat_boolean("JOPATILI.GetIn", true);
        let get_out = self.eat_boolean("JOPATILI.GetOut", true);
        let show_flexible_trip = self.eat_string("JOPATILI.ShowFlexibleTrip", false, 8);
        let line_dest_icon = self.eat_number("JOPATILI.LineDestIcon", false, 4);
        let line_dest_color = self.eat_rgb_color("JOPATILI.LineDestColor", false);
        let line_dest_text_color = self.eat_rgb_color("JOPATILI.LineDestTextColor", false);
        if !self.record_errors.is_empty() {
            return;
        }

        let timing_link_order =
            timing_link_order.and_then(|x| self.int_i16("JOPATILI.TimingLinkOrder", x));
        let product_formula_type =
            product_formula_type.and_then(|x| self.int_i16("JOPATILI.ProductFormulaType", x));
        let line_dest_icon = line_dest_icon.and_then(|x| self.int_i16("JOPATILI.LineDestIcon", x));
        self.check_e21_show_flexible_trip("JOPATILI.ShowFlexibleTrip", &show_flexible_trip);
        if !self.record_errors.is_empty() {
            return;
        }
        let (Some(timing_link_order), Some(is_timing_stop), Some(get_in), Some(get_out)) =
            (timing_link_order, is_timing_stop, get_in, get_out)
        else {
            return;
        };

        self.records
            .journey_pattern_timing_links
            .push(Kv1JourneyPatternTimingLink {
                key: Kv1JourneyPatternTimingLinkKey {
                    data_owner_code: data_owner_code.into(),
                    line_planning_number: line_planning_number.into(),
                    journey_pattern_code: journey_pattern_code.into(),
                    timing_link_order,
                },
                user_stop_code_begin: user_stop_code_begin.into(),
                user_stop_code_end: user_stop_code_end.into(),
                con_fin_rel_code: con_fin_rel_code.into(),
                dest_code: dest_code.into(),
                is_timing_stop,
                display_public_line: display_public_line.into(),
                product_formula_type,
                get_in,
                get_out,
                show_flexible_trip: show_flexible_trip.into(),
                line_dest_icon,
                line_dest_color,
                line_dest_text_color,
                line: None,
                journey_pattern: None,
                user_stop_begin: None,
                user_stop_end: None,
                con_fin_rel: None,
                dest: None,
                icon: None,
            });
    }

    fn parse_point(&mut self) {
        let data_owner_code = self.eat_string("POINT.DataOwnerCode", true, 10);
        let point_code = self.eat_string("POINT.PointCode", true, 10);
        self.eat_deprecated("POINT.<deprecated field #1>");
        let point_type = self.eat_string("POINT.PointType", true, 10);
        let coordinate_system_type = self.eat_string("POINT.CoordinateSystemType", true, 10);
        // The standard asks for at least 6 digits here; 4 admits the Benelux
        // edge coordinates that occur in real feeds.
        let location_x_ew = self.eat_rd_coord("POINT.LocationX_EW", true, 4);
        let location_y_ns = self.eat_rd_coord("POINT.LocationY_NS", true, 6);
        let location_z = self.eat_rd_coord("POINT.LocationZ", false, 0);
        let description = self.eat_string("POINT.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }
        let (Some(location_x_ew), Some(location_y_ns)) = (location_x_ew, location_y_ns) else {
            return;
        };

        self.records.points.push(Kv1Point {
            key: Kv1PointKey {
                data_owner_code: data_owner_code.into(),
                point_code: point_code.into(),
            },
            point_type: point_type.into(),
            coordinate_system_type: coordinate_system_type.into(),
            location_x_ew,
            location_y_ns,
            location_z,
            description,
        });
    }

    fn parse_point_on_link(&mut self) {
        let data_owner_code = self.eat_string("POOL.DataOwnerCode", true, 10);
        let user_stop_code_begin = self.eat_string("POOL.UserStopCodeBegin", true, 10);
        let user_stop_code_end = self.eat_string("POOL.UserStopCodeEnd", true, 10);
        self.eat_deprecated("POOL.<deprecated field #1>");
        let point_data_owner_code = self.eat_string("POOL.PointDataOwnerCode", true, 10);
        let point_code = self.eat_string("POOL.PointCode", true, 10);
        let distance_since_start_of_link =
            self.eat_number("POOL.DistanceSinceStartOfLink", true, 5);
        let segment_speed = self.eat_number("POOL.SegmentSpeed", false, 4);
        let local_point_speed = self.eat_number("POOL.LocalPointSpeed", false, 4);
        let description = self.eat_string("POOL.Description", false, 255);
        let transport_type = self.eat_string("POOL.TransportType", true, 5);
        if !self.record_errors.is_empty() {
            return;
        }
        let Some(distance_since_start_of_link) = distance_since_start_of_link else { return };

        self.records.point_on_links.push(Kv1PointOnLink {
            key: Kv1PointOnLinkKey {
                data_owner_code: data_owner_code.into(),
                user_stop_code_begin: user_stop_code_begin.into(),
                user_stop_code_end: user_stop_code_end.into(),
                point_data_owner_code: point_data_owner_code.into(),
                point_code: point_code.into(),
                transport_type: transport_type.into(),
            },
            distance_since_start_of_link,
            segment_speed_mps: segment_speed,
            local_point_speed_mps: local_point_speed,
            description,
            user_stop_begin: None,
            user_stop_end: None,
            point: None,
        });
    }

    fn parse_icon(&mut self) {
        let data_owner_code = self.eat_string("ICON.DataOwnerCode", true, 10);
        let icon_number = self.eat_number("ICON.IconNumber", true, 4);
        let icon_uri = self.eat_string("ICON.IconURI", true, 1024);
        if !self.record_errors.is_empty() {
            return;
        }
        let icon_number = icon_number.and_then(|x| self.int_i16("ICON.IconNumber", x));
        let Some(icon_number) = icon_number else { return };

        self.records.icons.push(Kv1Icon {
            key: Kv1IconKey {
                data_owner_code: data_owner_code.into(),
                icon_number,
            },
            icon_uri,
        });
    }

    fn parse_notice(&mut self) {
        let data_owner_code = self.eat_string("NOTICE.DataOwnerCode", true, 10);
        let notice_code = self.eat_string("NOTICE.NoticeCode", true, 20);
        let notice_content = self.eat_string("NOTICE.NoticeContent", true, 1024);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.notices.push(Kv1Notice {
            key: Kv1NoticeKey {
                data_owner_code: data_owner_code.into(),
                notice_code: notice_code.into(),
            },
            notice_content,
        });
    }

    fn parse_notice_assignment(&mut self) {
        let data_owner_code = self.eat_string("NTCASSGNM.DataOwnerCode", true, 10);
        let notice_code = self.eat_string("NTCASSGNM.NoticeCode", true, 20);
        let assigned_object = self.eat_string("NTCASSGNM.AssignedObject", true, 8);
        let timetable_version_code = self.eat_string("NTCASSGNM.TimetableVersionCode", false, 10);
        let organizational_unit_code =
            self.eat_string("NTCASSGNM.OrganizationalUnitCode", false, 10);
        let schedule_code = self.eat_string("NTCASSGNM.ScheduleCode", false, 10);
        let schedule_type_code = self.eat_string("NTCASSGNM.ScheduleTypeCode", false, 10);
        let period_group_code = self.eat_string("NTCASSGNM.PeriodGroupCode", false, 10);
        let specific_day_code = self.eat_string("NTCASSGNM.SpecificDayCode", false, 10);
        let day_type = self.eat_string("NTCASSGNM.DayType", false, 7);
        let line_planning_number = self.eat_string("NTCASSGNM.LinePlanningNumber", true, 10);
        let journey_number = self.eat_number("NTCASSGNM.JourneyNumber", false, 6);
        let stop_order = self.eat_number("NTCASSGNM.StopOrder", false, 4);
        let journey_pattern_code = self.eat_string("NTCASSGNM.JourneyPatternCode", false, 10);
        let timing_link_order = self.eat_number("NTCASSGNM.TimingLinkOrder", false, 3);
        let user_stop_code = self.eat_string("NTCASSGNM.UserStopCode", false, 10);
        if !self.record_errors.is_empty() {
            return;
        }

        let journey_number = journey_number.and_then(|x| self.int_i32("NTCASSGNM.JourneyNumber", x));
        let stop_order = stop_order.and_then(|x| self.int_i16("NTCASSGNM.StopOrder", x));
        let timing_link_order =
            timing_link_order.and_then(|x| self.int_i16("NTCASSGNM.TimingLinkOrder", x));
        if let Some(n) = journey_number {
            if !(0..=999_999).contains(&n) {
                self.record_errors.push(
                    "NTCASSGNM.JourneyNumber should be within the range [0-999999]".to_string(),
                );
            }
        }
        if journey_number.is_none() && matches!(assigned_object.as_str(), "PUJO" | "PUJOPASS") {
            self.record_errors.push(
                "NTCASSGNM.JourneyNumber is required for AssignedObject PUJO/PUJOPASS".to_string(),
            );
        }
        if journey_pattern_code.is_empty() && assigned_object == "JOPATILI" {
            self.record_errors.push(
                "NTCASSGNM.JourneyPatternCode is required for AssignedObject JOPATILI".to_string(),
            );
        }
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.notice_assignments.push(Kv1NoticeAssignment {
            data_owner_code: data_owner_code.into(),
            notice_code: notice_code.into(),
            assigned_object: assigned_object.into(),
            timetable_version_code: timetable_version_code.into(),
            organizational_unit_code: organizational_unit_code.into(),
            schedule_code: schedule_code.into(),
            schedule_type_code: schedule_type_code.into(),
            period_group_code: period_group_code.into(),
            specific_day_code: specific_day_code.into(),
            day_type: day_type.into(),
            line_planning_number: line_planning_number.into(),
            journey_number,
            stop_order,
            journey_pattern_code: journey_pattern_code.into(),
            timing_link_order,
            user_stop_code: user_stop_code.into(),
            notice: None,
        });
    }

    fn parse_time_demand_group(&mut self) {
        let data_owner_code = self.eat_string("TIMDEMGRP.DataOwnerCode", true, 10);
        let line_planning_number = self.eat_string("TIMDEMGRP.LinePlanningNumber", true, 10);
        let journey_pattern_code = self.eat_string("TIMDEMGRP.JourneyPatternCode", true, 10);
        let time_demand_group_code = self.eat_string("TIMDEMGRP.TimeDemandGroupCode", true, 10);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.time_demand_groups.push(Kv1TimeDemandGroup {
            key: Kv1TimeDemandGroupKey {
                data_owner_code: data_owner_code.into(),
                line_planning_number: line_planning_number.into(),
                journey_pattern_code: journey_pattern_code.into(),
                time_demand_group_code: time_demand_group_code.into(),
            },
            line: None,
            journey_pattern: None,
        });
    }

    fn parse_time_demand_group_run_time(&mut self) {
        let data_owner_code = self.eat_string("TIMDEMRNT.DataOwnerCode", true, 10);
        let line_planning_number = self.eat_string("TIMDEMRNT.LinePlanningNumber", true, 10);
        let journey_pattern_code = self.eat_string("TIMDEMRNT.JourneyPatternCode", true, 10);
        let time_demand_group_code = self.eat_string("TIMDEMRNT.TimeDemandGroupCode", true, 10);
        let timing_link_order = self.eat_number("TIMDEMRNT.TimingLinkOrder", true, 3);
        let user_stop_code_begin = self.eat_string("TIMDEMRNT.UserStopCodeBegin", true, 10);
        let user_stop_code_end = self.eat_string("TIMDEMRNT.UserStopCodeEnd", true, 10);
        let total_drive_time = self.eat_number("TIMDEMRNT.TotalDriveTime", true, 5);
        let drive_time = self.eat_number("TIMDEMRNT.DriveTime", true, 5);
        let expected_delay = self.eat_number("TIMDEMRNT.ExpectedDelay", false, 5);
        let layover_time = self.eat_number("TIMDEMRNT.LayOverTime", false, 5);
        let stop_wait_time = self.eat_number("TIMDEMRNT.StopWaitTime", true, 5);
        let minimum_stop_time = self.eat_number("TIMDEMRNT.MinimumStopTime", false, 5);
        if !self.record_errors.is_empty() {
            return;
        }

        let timing_link_order =
            timing_link_order.and_then(|x| self.int_i16("TIMDEMRNT.TimingLinkOrder", x));
        if !self.record_errors.is_empty() {
            return;
        }
        let (Some(timing_link_order), Some(total_drive_time), Some(drive_time), Some(stop_wait_time)) =
            (timing_link_order, total_drive_time, drive_time, stop_wait_time)
        else {
            return;
        };

        self.records
            .time_demand_group_run_times
            .push(Kv1TimeDemandGroupRunTime {
                key: Kv1TimeDemandGroupRunTimeKey {
                    data_owner_code: data_owner_code.into(),
                    line_planning_number: line_planning_number.into(),
                    journey_pattern_code: journey_pattern_code.into(),
                    time_demand_group_code: time_demand_group_code.into(),
                    timing_link_order,
                },
                user_stop_code_begin: user_stop_code_begin.into(),
                user_stop_code_end: user_stop_code_end.into(),
                total_drive_time_s: total_drive_time,
                drive_time_s: drive_time,
                expected_delay_s: expected_delay,
                layover_time_s: layover_time,
                stop_wait_time_s: stop_wait_time,
                minimum_stop_time_s: minimum_stop_time,
                line: None,
                user_stop_begin: None,
                user_stop_end: None,
                journey_pattern: None,
                time_demand_group: None,
                journey_pattern_timing_link: None,
            });
    }

    fn parse_period_group(&mut self) {
        let data_owner_code = self.eat_string("PEGR.DataOwnerCode", true, 10);
        let period_group_code = self.eat_string("PEGR.PeriodGroupCode", true, 10);
        let description = self.eat_string("PEGR.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.period_groups.push(Kv1PeriodGroup {
            key: Kv1PeriodGroupKey {
                data_owner_code: data_owner_code.into(),
                period_group_code: period_group_code.into(),
            },
            description,
        });
    }

    fn parse_specific_day(&mut self) {
        let data_owner_code = self.eat_string("SPECDAY.DataOwnerCode", true, 10);
        let specific_day_code = self.eat_string("SPECDAY.SpecificDayCode", true, 10);
        let name = self.eat_string("SPECDAY.Name", true, 50);
        let description = self.eat_string("SPECDAY.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        self.records.specific_days.push(Kv1SpecificDay {
            key: Kv1SpecificDayKey {
                data_owner_code: data_owner_code.into(),
                specific_day_code: specific_day_code.into(),
            },
            name,
            description,
        });
    }

    fn parse_timetable_version(&mut self) {
        let data_owner_code = self.eat_string("TIVE.DataOwnerCode", true, 10);
        let organizational_unit_code = self.eat_string("TIVE.OrganizationalUnitCode", true, 10);
        let timetable_version_code = self.eat_string("TIVE.TimetableVersionCode", true, 10);
        let period_group_code = self.eat_string("TIVE.PeriodGroupCode", true, 10);
        let specific_day_code = self.eat_string("TIVE.SpecificDayCode", true, 10);
        let valid_from = self.eat_yyyymmdd("TIVE.ValidFrom", true, 10);
        let timetable_version_type = self.eat_string("TIVE.TimetableVersionType", true, 10);
        let valid_thru = self.eat_yyyymmdd("TIVE.ValidThru", false, 10);
        let description = self.eat_string("TIVE.Description", false, 255);
        if !description.is_empty() {
            self.record_errors
                .push("TIVE.Description should be empty".to_string());
        }
        if !self.record_errors.is_empty() {
            return;
        }
        let Some(valid_from) = valid_from else { return };

        self.records.timetable_versions.push(Kv1TimetableVersion {
            key: Kv1TimetableVersionKey {
                data_owner_code: data_owner_code.into(),
                organizational_unit_code: organizational_unit_code.into(),
                timetable_version_code: timetable_version_code.into(),
                period_group_code: period_group_code.into(),
                specific_day_code: specific_day_code.into(),
            },
            valid_from,
            timetable_version_type: timetable_version_type.into(),
            valid_thru,
            description,
            organizational_unit: None,
            period_group: None,
            specific_day: None,
        });
    }

    fn parse_public_journey(&mut self) {
        let data_owner_code = self.eat_string("PUJO.DataOwnerCode", true, 10);
        let timetable_version_code = self.eat_string("PUJO.TimetableVersionCode", true, 10);
        let organizational_unit_code = self.eat_string("PUJO.OrganizationalUnitCode", true, 10);
        let period_group_code = self.eat_string("PUJO.PeriodGroupCode", true, 10);
        let specific_day_code = self.eat_string("PUJO.SpecificDayCode", true, 10);
        let day_type = self.eat_string("PUJO.DayType", true, 7);
        let line_planning_number = self.eat_string("PUJO.LinePlanningNumber", true, 10);
        let journey_number = self.eat_number("PUJO.JourneyNumber", true, 6);
        let time_demand_group_code = self.eat_string("PUJO.TimeDemandGroupCode", true, 10);
        let journey_pattern_code = self.eat_string("PUJO.JourneyPatternCode", true, 10);
        let departure_time = self.eat_hhmmss("PUJO.DepartureTime", true);
        let wheelchair_accessible = self.eat_string("PUJO.WheelChairAccessible", true, 13);
        let data_owner_is_operator = self.eat_boolean("PUJO.DataOwnerIsOperator", true);
        let planned_monitored = self.eat_boolean("PUJO.PlannedMonitored", true);
        let product_formula_type = self.eat_number("PUJO.ProductFormulaType", false, 4);
        let show_flexible_trip = self.eat_string("PUJO.ShowFlexibleTrip", false, 8);
        if !self.record_errors.is_empty() {
            return;
        }

        let journey_number = journey_number.and_then(|x| self.int_i32("PUJO.JourneyNumber", x));
        if let Some(n) = journey_number {
            if !(0..=999_999).contains(&n) {
                self.record_errors
                    .push("PUJO.JourneyNumber should be within the range [0-999999]".to_string());
            }
        }
        let product_formula_type =
            product_formula_type.and_then(|x| self.int_i16("PUJO.ProductFormulaType", x));
        self.check_e3_wheelchair("PUJO.WheelChairAccessible", &wheelchair_accessible);
        self.check_e21_show_flexible_trip("PUJO.ShowFlexibleTrip", &show_flexible_trip);
        if !self.record_errors.is_empty() {
            return;
        }
        let (
            Some(journey_number),
            Some(departure_time),
            Some(data_owner_is_operator),
            Some(planned_monitored),
        ) = (journey_number, departure_time, data_owner_is_operator, planned_monitored)
        else {
            return;
        };

        self.records.public_journeys.push(Kv1PublicJourney {
            key: Kv1PublicJourneyKey {
                data_owner_code: data_owner_code.into(),
                timetable_version_code: timetable_version_code.into(),
                organizational_unit_code: organizational_unit_code.into(),
                period_group_code: period_group_code.into(),
                specific_day_code: specific_day_code.into(),
                day_type: day_type.into(),
                line_planning_number: line_planning_number.into(),
                journey_number,
            },
            time_demand_group_code: time_demand_group_code.into(),
            journey_pattern_code: journey_pattern_code.into(),
            departure_time,
            wheelchair_accessible: wheelchair_accessible.into(),
            data_owner_is_operator,
            planned_monitored,
            product_formula_type,
            show_flexible_trip: show_flexible_trip.into(),
            timetable_version: None,
            organizational_unit: None,
            period_group: None,
            specific_day: None,
            line: None,
            time_demand_group: None,
            journey_pattern: None,
        });
    }

    fn parse_period_group_validity(&mut self) {
        let data_owner_code = self.eat_string("PEGRVAL.DataOwnerCode", true, 10);
        let organizational_unit_code = self.eat_string("PEGRVAL.OrganizationalUnitCode", true, 10);
        let period_group_code = self.eat_string("PEGRVAL.PeriodGroupCode", true, 10);
        let valid_from = self.eat_yyyymmdd("PEGRVAL.ValidFrom", true, 10);
        let valid_thru = self.eat_yyyymmdd("PEGRVAL.ValidThru", true, 10);
        if !self.record_errors.is_empty() {
            return;
        }
        let (Some(valid_from), Some(valid_thru)) = (valid_from, valid_thru) else { return };

        self.records
            .period_group_validities
            .push(Kv1PeriodGroupValidity {
                key: Kv1PeriodGroupValidityKey {
                    data_owner_code: data_owner_code.into(),
                    organizational_unit_code: organizational_unit_code.into(),
                    period_group_code: period_group_code.into(),
                    valid_from,
                },
                valid_thru,
                organizational_unit: None,
                period_group: None,
            });
    }

    fn parse_exceptional_operating_day(&mut self) {
        let data_owner_code = self.eat_string("EXCOPDAY.DataOwnerCode", true, 10);
        let organizational_unit_code = self.eat_string("EXCOPDAY.OrganizationalUnitCode", true, 10);
        let valid_date_raw = self.eat_string("EXCOPDAY.ValidDate", true, 23);
        let day_type_as_on = self.eat_string("EXCOPDAY.DayTypeAsOn", true, 7);
        let specific_day_code = self.eat_string("EXCOPDAY.SpecificDayCode", true, 10);
        let period_group_code = self.eat_string("EXCOPDAY.PeriodGroupCode", false, 10);
        let description = self.eat_string("EXCOPDAY.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }

        let Some(valid_date) = parse_datetime(&valid_date_raw, self.tz) else {
            self.record_errors.push(format!(
                "EXCOPDAY.ValidDate has a bad format (value: {valid_date_raw})"
            ));
            return;
        };

        self.records
            .exceptional_operating_days
            .push(Kv1ExceptionalOperatingDay {
                key: Kv1ExceptionalOperatingDayKey {
                    data_owner_code: data_owner_code.into(),
                    organizational_unit_code: organizational_unit_code.into(),
                    valid_date,
                },
                day_type_as_on: day_type_as_on.into(),
                specific_day_code: specific_day_code.into(),
                period_group_code: period_group_code.into(),
                description,
                organizational_unit: None,
                specific_day: None,
                period_group: None,
            });
    }

    fn parse_schedule_version(&mut self) {
        let data_owner_code = self.eat_string("SCHEDVERS.DataOwnerCode", true, 10);
        let organizational_unit_code = self.eat_string("SCHEDVERS.OrganizationalUnitCode", true, 10);
        let schedule_code = self.eat_string("SCHEDVERS.ScheduleCode", true, 10);
        let schedule_type_code = self.eat_string("SCHEDVERS.ScheduleTypeCode", true, 10);
        let valid_from = self.eat_yyyymmdd("SCHEDVERS.ValidFrom", true, 10);
        let valid_thru = self.eat_yyyymmdd("SCHEDVERS.ValidThru", false, 10);
        let description = self.eat_string("SCHEDVERS.Description", false, 255);
        if !description.is_empty() {
            self.record_errors
                .push("SCHEDVERS.Description should be empty".to_string());
        }
        if !self.record_errors.is_empty() {
            return;
        }
        let Some(valid_from) = valid_from else { return };

        self.records.schedule_versions.push(Kv1ScheduleVersion {
            key: Kv1ScheduleVersionKey {
                data_owner_code: data_owner_code.into(),
                organizational_unit_code: organizational_unit_code.into(),
                schedule_code: schedule_code.into(),
                schedule_type_code: schedule_type_code.into(),
            },
            valid_from,
            valid_thru,
            description,
            organizational_unit: None,
        });
    }

    fn parse_public_journey_passing_times(&mut self) {
        let data_owner_code = self.eat_string("PUJOPASS.DataOwnerCode", true, 10);
        let organizational_unit_code = self.eat_string("PUJOPASS.OrganizationalUnitCode", true, 10);
        let schedule_code = self.eat_string("PUJOPASS.ScheduleCode", true, 10);
        let schedule_type_code = self.eat_string("PUJOPASS.ScheduleTypeCode", true, 10);
        let line_planning_number = self.eat_string("PUJOPASS.LinePlanningNumber", true, 10);
        let journey_number = self.eat_number("PUJOPASS.JourneyNumber", true, 6);
        let stop_order = self.eat_number("PUJOPASS.StopOrder", true, 4);
        let journey_pattern_code = self.eat_string("PUJOPASS.JourneyPatternCode", true, 10);
        let user_stop_code = self.eat_string("PUJOPASS.UserStopCode", true, 10);
        let target_arrival_time = self.eat_hhmmss("PUJOPASS.TargetArrivalTime", false);
        let target_departure_time = self.eat_hhmmss("PUJOPASS.TargetDepartureTime", false);
        let wheelchair_accessible = self.eat_string("PUJOPASS.WheelChairAccessible", true, 13);
        let data_owner_is_operator = self.eat_boolean("PUJOPASS.DataOwnerIsOperator", true);
        let planned_monitored = self.eat_boolean("PUJOPASS.PlannedMonitored", true);
        let product_formula_type = self.eat_number("PUJOPASS.ProductFormulaType", false, 4);
        let show_flexible_trip = self.eat_string("PUJOPASS.ShowFlexibleTrip", false, 8);
        if !self.record_errors.is_empty() {
            return;
        }

        let journey_number = journey_number.and_then(|x| self.int_i32("PUJOPASS.JourneyNumber", x));
        if let Some(n) = journey_number {
            if !(0..=999_999).contains(&n) {
                self.record_errors.push(
                    "PUJOPASS.JourneyNumber should be within the range [0-999999]".to_string(),
                );
            }
        }
        let stop_order = stop_order.and_then(|x| self.int_i16("PUJOPASS.StopOrder", x));
        let product_formula_type =
            product_formula_type.and_then(|x| self.int_i16("PUJOPASS.ProductFormulaType", x));
        self.check_e3_wheelchair("PUJOPASS.WheelChairAccessible", &wheelchair_accessible);
        self.check_e21_show_flexible_trip("PUJOPASS.ShowFlexibleTrip", &show_flexible_trip);
        if !self.record_errors.is_empty() {
            return;
        }
        let (
            Some(journey_number),
            Some(stop_order),
            Some(data_owner_is_operator),
            Some(planned_monitored),
        ) = (journey_number, stop_order, data_owner_is_operator, planned_monitored)
        else {
            return;
        };

        self.records
            .public_journey_passing_times
            .push(Kv1PublicJourneyPassingTimes {
                key: Kv1PublicJourneyPassingTimesKey {
                    data_owner_code: data_owner_code.into(),
                    organizational_unit_code: organizational_unit_code.into(),
                    schedule_code: schedule_code.into(),
                    schedule_type_code: schedule_type_code.into(),
                    line_planning_number: line_planning_number.into(),
                    journey_number,
                    stop_order,
                },
                journey_pattern_code: journey_pattern_code.into(),
                user_stop_code: user_stop_code.into(),
                target_arrival_time,
                target_departure_time,
                wheelchair_accessible: wheelchair_accessible.into(),
                data_owner_is_operator,
                planned_monitored,
                product_formula_type,
                show_flexible_trip: show_flexible_trip.into(),
                organizational_unit: None,
                schedule_version: None,
                line: None,
                journey_pattern: None,
                user_stop: None,
            });
    }

    fn parse_operating_day(&mut self) {
        let data_owner_code = self.eat_string("OPERDAY.DataOwnerCode", true, 10);
        let organizational_unit_code = self.eat_string("OPERDAY.OrganizationalUnitCode", true, 10);
        let schedule_code = self.eat_string("OPERDAY.ScheduleCode", true, 10);
        let schedule_type_code = self.eat_string("OPERDAY.ScheduleTypeCode", true, 10);
        let valid_date = self.eat_yyyymmdd("OPERDAY.ValidDate", true, 10);
        let description = self.eat_string("OPERDAY.Description", false, 255);
        if !self.record_errors.is_empty() {
            return;
        }
        let Some(valid_date) = valid_date else { return };

        self.records.operating_days.push(Kv1OperatingDay {
            key: Kv1OperatingDayKey {
                data_owner_code: data_owner_code.into(),
                organizational_unit_code: organizational_unit_code.into(),
                schedule_code: schedule_code.into(),
                schedule_type_code: schedule_type_code.into(),
                valid_date,
            },
            description,
            organizational_unit: None,
            schedule_version: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv1::lexer;
    use crate::time::Date;

    fn parse_str(input: &str) -> ParseOutcome {
        let (tokens, errors) = lexer::lex(input.as_bytes());
        assert!(errors.is_empty(), "lexer errors: {errors:?}");
        parse(&tokens)
    }

    #[test]
    fn orun_row_with_header_and_comment() {
        let out = parse_str("[hdr]\n;comment\nORUN|1|I|X|U|N|T|\n");
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.records.organizational_units.len(), 1);
        let orun = &out.records.organizational_units[0];
        assert_eq!(orun.key.data_owner_code, "X");
        assert_eq!(orun.key.organizational_unit_code, "U");
        assert_eq!(orun.name, "N");
        assert_eq!(orun.organizational_unit_type, "T");
        assert_eq!(orun.description, "");
    }

    #[test]
    fn unknown_record_type_is_a_warning() {
        let out = parse_str("BOGUS|1|I|a|b\nORUN|1|I|X|U|N|T|\n");
        assert_eq!(out.warnings.len(), 1);
        assert!(out.errors.is_empty());
        assert_eq!(out.records.organizational_units.len(), 1);
    }

    #[test]
    fn bad_row_is_abandoned_and_parsing_continues() {
        // First LINE row has a malformed color; the second is fine.
        let input = "LINE|1|I|CXX|M300|300|Ring|0||BUS||GGGGGG|\n\
                     LINE|1|I|CXX|M301|301|Star|12||BUS||00FF00|FFFFFF\n";
        let out = parse_str(input);
        assert_eq!(out.errors.len(), 1, "{:?}", out.errors);
        assert_eq!(out.records.lines.len(), 1);
        let line = &out.records.lines[0];
        assert_eq!(line.key.line_planning_number, "M301");
        assert_eq!(line.line_ve_tag_number, 12);
        assert_eq!(line.line_color, Some(RgbColor { r: 0, g: 255, b: 0 }));
        assert_eq!(line.line_text_color, Some(RgbColor { r: 255, g: 255, b: 255 }));
        assert_eq!(line.line_icon, None);
    }

    #[test]
    fn version_must_be_1_and_implicit() {
        let out = parse_str("ORUN|2|I|X|U|N|T|\n");
        assert_eq!(out.errors.len(), 1);
        assert!(out.records.organizational_units.is_empty());
    }

    #[test]
    fn usrstop_row_with_deprecated_cells() {
        let input = "USRSTOP|1|I|CXX|10001|10001|1|0||Stationsplein|Utrecht|UT001|A|||15|12|perron A|PASSENGER|NL:Q:10001\n";
        let out = parse_str(input);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let stop = &out.records.user_stop_points[0];
        assert_eq!(stop.key.user_stop_code, "10001");
        assert!(stop.get_in);
        assert!(!stop.get_out);
        assert_eq!(stop.name, "Stationsplein");
        assert_eq!(stop.town, "Utrecht");
        assert_eq!(stop.user_stop_area_code, "UT001");
        assert_eq!(stop.minimal_stop_time_s, 15.0);
        assert_eq!(stop.stop_side_length, Some(12.0));
        assert_eq!(stop.user_stop_type, "PASSENGER");
    }

    #[test]
    fn jopa_direction_is_validated() {
        let ok = parse_str("JOPA|1|I|CXX|M300|1001|NORMAL|A|\n");
        assert!(ok.errors.is_empty());
        assert_eq!(ok.records.journey_patterns[0].direction, 'A');

        let bad = parse_str("JOPA|1|I|CXX|M300|1001|NORMAL|X|\n");
        assert_eq!(bad.errors.len(), 1);
        assert!(bad.records.journey_patterns.is_empty());
    }

    #[test]
    fn pujo_row_with_service_time_past_midnight() {
        let input =
            "PUJO|1|I|CXX|TV1|U1|PG1|NORMAL|1234567|M300|2045|TDG1|1001|25:30:00|ACCESSIBLE|1|1||\n";
        let out = parse_str(input);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let pujo = &out.records.public_journeys[0];
        assert_eq!(pujo.key.journey_number, 2045);
        assert_eq!(pujo.departure_time.hour, 25);
        assert_eq!(pujo.wheelchair_accessible, "ACCESSIBLE");
        assert!(pujo.data_owner_is_operator);
    }

    #[test]
    fn pujo_journey_number_range() {
        let input =
            "PUJO|1|I|CXX|TV1|U1|PG1|NORMAL|1234567|M300|1000000|TDG1|1001|08:00:00|UNKNOWN|1|1||\n";
        let out = parse_str(input);
        assert!(!out.errors.is_empty());
        assert!(out.records.public_journeys.is_empty());
    }

    #[test]
    fn tive_description_must_be_empty() {
        let input = "TIVE|1|I|CXX|U1|TV1|PG1|NORMAL|2024-01-01|PUBT||oops\n";
        let out = parse_str(input);
        assert_eq!(out.errors.len(), 1);

        let input = "TIVE|1|I|CXX|U1|TV1|PG1|NORMAL|2024-01-01|PUBT||\n";
        let out = parse_str(input);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let tive = &out.records.timetable_versions[0];
        assert_eq!(tive.valid_from, Date { year: 2024, month: 1, day: 1 });
        assert_eq!(tive.valid_thru, None);
    }

    #[test]
    fn excopday_datetime_resolves_in_amsterdam() {
        let input = "EXCOPDAY|1|I|CXX|U1|2024-01-01T12:00:00|1234500|NORMAL||\n";
        let out = parse_str(input);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let day = &out.records.exceptional_operating_days[0];
        // 12:00 CET is 11:00Z.
        assert_eq!(day.key.valid_date.timestamp(), 1704106800);
    }

    #[test]
    fn point_coordinate_digit_bounds() {
        let ok = parse_str("POINT|1|I|CXX|P1||SP|RD|4500|450000||\n");
        assert!(ok.errors.is_empty(), "{:?}", ok.errors);
        assert_eq!(ok.records.points[0].location_x_ew, 4500.0);

        // X with fewer than four integral digits is out.
        let bad = parse_str("POINT|1|I|CXX|P1||SP|RD|450|450000||\n");
        assert_eq!(bad.errors.len(), 1);
        assert!(bad.records.points.is_empty());
    }

    #[test]
    fn link_distance_and_transport_type() {
        let out = parse_str("LINK|1|I|CXX|10001|10002||500||BUS\n");
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let link = &out.records.links[0];
        assert_eq!(link.distance, 500.0);
        assert_eq!(link.key.transport_type, "BUS");
    }

    #[test]
    fn ntcassgnm_requires_journey_number_for_pujo() {
        let base = "NTCASSGNM|1|I|CXX|N1|PUJO||||||||M300|{jn}||||\n";
        let out = parse_str(&base.replace("{jn}", "2045"));
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.records.notice_assignments.len(), 1);
        assert_eq!(out.records.notice_assignments[0].journey_number, Some(2045));

        let out = parse_str(&base.replace("{jn}", ""));
        assert_eq!(out.errors.len(), 1);
        assert!(out.records.notice_assignments.is_empty());
    }

    #[test]
    fn number_must_be_fixed_point() {
        // Exponents are not fixed-point notation.
        let out = parse_str("LINK|1|I|CXX|10001|10002||5e2||BUS\n");
        assert_eq!(out.errors.len(), 1);
        assert!(out.records.links.is_empty());
    }

    #[test]
    fn too_many_cells_is_a_record_error() {
        let out = parse_str("ORUN|1|I|X|U|N|T|desc|extra\n");
        assert_eq!(out.errors.len(), 1);
        // The record itself was complete before the surplus cell.
        assert_eq!(out.records.organizational_units.len(), 1);
    }
}
