//! Parser for decompressed `VV_TM_PUSH` XML payloads.
//!
//! Only elements in the TMI8 KV6 namespace (or unqualified ones) are
//! considered; anything else is skipped. Envelope problems are errors and
//! drop the whole payload. Per-record problems (a field that fails its typed
//! parse, a record whose shape is wrong after normalization) are warnings
//! and drop only that record.

use crate::kv6::model::{Kv6Field, Kv6Record, Kv6RecordType, VvTmPushInfo};
use crate::time::{Date, Timestamp};

pub const TMI8_KV6_NS: &str = "http://bison.connekt.nl/tmi8/kv6/msg";

/// Outcome of parsing one payload. `info` is `None` when the envelope was
/// rejected; warnings may accompany a successful parse.
pub struct ParsedPayload {
    pub info: Option<VvTmPushInfo>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn parse_vv_tm_push(xml: &str) -> ParsedPayload {
    let mut parser = Parser {
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    let info = match roxmltree::Document::parse(xml) {
        Ok(doc) => parser.parse_document(&doc),
        Err(err) => {
            parser.errors.push(format!("XML parsing failed: {err}"));
            None
        }
    };
    ParsedPayload {
        info,
        errors: parser.errors,
        warnings: parser.warnings,
    }
}

struct Parser {
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn is_tmi8(node: roxmltree::Node) -> bool {
    matches!(node.tag_name().namespace(), None | Some(TMI8_KV6_NS))
}

// The single text child of a leaf element, with no element children mixed in.
fn text_value<'a>(node: roxmltree::Node<'a, '_>) -> Option<&'a str> {
    if node.children().any(|c| c.is_element()) {
        return None;
    }
    node.text()
}

fn parse_unsigned(src: &str, max_digits: usize) -> Option<u64> {
    if src.is_empty() || src.len() > max_digits {
        return None;
    }
    if !src.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    src.parse().ok()
}

fn parse_signed(src: &str, max_digits: usize) -> Option<i64> {
    let (negative, digits) = match src.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, src),
    };
    let magnitude = parse_unsigned(digits, max_digits)? as i64;
    Some(if negative { -magnitude } else { magnitude })
}

impl Parser {
    fn parse_document(&mut self, doc: &roxmltree::Document) -> Option<VvTmPushInfo> {
        let mut info = None;
        for node in doc.root().children().filter(|n| n.is_element()) {
            if !is_tmi8(node) || node.tag_name().name() != "VV_TM_PUSH" {
                continue;
            }
            if info.is_some() {
                self.errors.push("duplicated VV_TM_PUSH".to_string());
                return None;
            }
            info = self.parse_envelope(node);
            if info.is_none() {
                self.errors.push("invalid VV_TM_PUSH".to_string());
            }
        }
        if info.is_none() && self.errors.is_empty() {
            self.errors.push("expected to find VV_TM_PUSH".to_string());
        }
        info
    }

    fn parse_envelope(&mut self, node: roxmltree::Node) -> Option<VvTmPushInfo> {
        let mut subscriber_id = None;
        let mut version = None;
        let mut dossier_name = None;
        let mut timestamp = None;
        let mut records = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            if !is_tmi8(child) {
                continue;
            }
            match child.tag_name().name() {
                "SubscriberID" => match text_value(child) {
                    Some(text) => subscriber_id = Some(text.to_string()),
                    None => self.errors.push("invalid value for SubscriberID".to_string()),
                },
                "Version" => match text_value(child) {
                    Some(text) => version = Some(text.to_string()),
                    None => self.errors.push("invalid value for Version".to_string()),
                },
                "DossierName" => match text_value(child) {
                    Some(text) => dossier_name = Some(text.to_string()),
                    None => self.errors.push("invalid value for DossierName".to_string()),
                },
                "Timestamp" => match text_value(child).and_then(Timestamp::parse) {
                    Some(ts) => timestamp = Some(ts),
                    None => self
                        .errors
                        .push("invalid value for Timestamp: not a valid timestamp".to_string()),
                },
                "KV6posinfo" => records = self.parse_pos_info(child),
                _ => {}
            }
        }

        Some(VvTmPushInfo {
            subscriber_id: subscriber_id?,
            version: version?,
            dossier_name: dossier_name?,
            timestamp: timestamp?,
            records,
        })
    }

    fn parse_pos_info(&mut self, node: roxmltree::Node) -> Vec<Kv6Record> {
        let mut records = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if !is_tmi8(child) {
                continue;
            }
            let Some(record_type) = Kv6RecordType::from_element_name(child.tag_name().name())
            else {
                continue;
            };
            if let Some(record) = self.parse_record(record_type, child) {
                records.push(record);
            }
        }
        records
    }

    fn parse_record(
        &mut self,
        record_type: Kv6RecordType,
        node: roxmltree::Node,
    ) -> Option<Kv6Record> {
        let mut record = Kv6Record::new(record_type);

        for child in node.children().filter(|n| n.is_element()) {
            if !is_tmi8(child) {
                continue;
            }
            let name = child.tag_name().name();
            let Some(field) = Kv6Field::ALL.into_iter().find(|f| f.element_name() == name)
            else {
                continue;
            };
            let Some(text) = text_value(child) else {
                self.warn_record(record_type, format!("{name} should only contain data"));
                return None;
            };
            if !self.assign_field(&mut record, field, text) {
                return None;
            }
            record.mark_present(field);
        }

        record.remove_unsupported_fields();
        if !record.is_valid() {
            self.warn_record(record_type, "required fields missing");
            return None;
        }
        Some(record)
    }

    fn warn_record(&mut self, record_type: Kv6RecordType, what: impl std::fmt::Display) {
        self.warnings
            .push(format!("{} record dropped: {what}", record_type.element_name()));
    }

    // Returns false (and warns) when the text fails the field's typed parse.
    fn assign_field(&mut self, record: &mut Kv6Record, field: Kv6Field, text: &str) -> bool {
        let record_type = record.record_type;
        macro_rules! invalid {
            ($($why:tt)*) => {{
                self.warn_record(record_type, format!($($why)*));
                return false;
            }};
        }

        match field {
            Kv6Field::DataOwnerCode => {
                if text.len() > 10 {
                    invalid!("invalid value for dataownercode");
                }
                record.data_owner_code = text.into();
            }
            Kv6Field::LinePlanningNumber => {
                if text.len() > 10 {
                    invalid!("invalid value for lineplanningnumber");
                }
                record.line_planning_number = text.into();
            }
            Kv6Field::OperatingDay => match Date::parse(text) {
                Some(date) => record.operating_day = date,
                None => invalid!("invalid value for operatingday: not a valid date"),
            },
            Kv6Field::JourneyNumber => match parse_unsigned(text, 6) {
                Some(n) => record.journey_number = n as u32,
                None => invalid!(
                    "invalid value for journeynumber: not a valid unsigned number with at most six digits"
                ),
            },
            Kv6Field::ReinforcementNumber => match parse_unsigned(text, 2) {
                Some(n) => record.reinforcement_number = n as u8,
                None => invalid!(
                    "invalid value for reinforcementnumber: not a valid unsigned number with at most two digits"
                ),
            },
            Kv6Field::Timestamp => match Timestamp::parse(text) {
                Some(ts) => record.timestamp = ts,
                None => invalid!("invalid value for timestamp: not a valid timestamp"),
            },
            Kv6Field::Source => {
                if text.len() > 10 {
                    invalid!("invalid value for source: not a valid string of at most 10 bytes");
                }
                record.source = text.into();
            }
            Kv6Field::Punctuality => match parse_signed(text, 4) {
                Some(n) => record.punctuality = n as i16,
                None => invalid!(
                    "invalid value for punctuality: not a valid signed number with at most four digits"
                ),
            },
            Kv6Field::UserStopCode => {
                if text.len() > 10 {
                    invalid!(
                        "invalid value for userstopcode: not a valid string of at most 10 bytes"
                    );
                }
                record.user_stop_code = text.into();
            }
            Kv6Field::PassageSequenceNumber => match parse_unsigned(text, 4) {
                Some(n) => record.passage_sequence_number = n as u16,
                None => invalid!(
                    "invalid value for passagesequencenumber: not a valid unsigned number with at most four digits"
                ),
            },
            Kv6Field::VehicleNumber => match parse_unsigned(text, 6) {
                Some(n) => record.vehicle_number = n as u32,
                None => invalid!(
                    "invalid value for vehiclenumber: not a valid unsigned number with at most six digits"
                ),
            },
            Kv6Field::BlockCode => match parse_unsigned(text, 8) {
                Some(n) => record.block_code = n as u32,
                None => invalid!(
                    "invalid value for blockcode: not a valid unsigned number with at most eight digits"
                ),
            },
            Kv6Field::WheelchairAccessible => {
                if !matches!(text, "ACCESSIBLE" | "NOTACCESSIBLE" | "UNKNOWN") {
                    invalid!("invalid value for wheelchairaccessible");
                }
                record.wheelchair_accessible = text.into();
            }
            Kv6Field::NumberOfCoaches => match parse_unsigned(text, 2) {
                Some(n) => record.number_of_coaches = n as u8,
                None => invalid!(
                    "invalid value for numberofcoaches: not a valid unsigned number with at most two digits"
                ),
            },
            Kv6Field::RdY => match parse_signed(text, 6) {
                Some(n) => record.rd_y = n as i32,
                None => invalid!(
                    "invalid value for rd-y: not a valid signed number with at most six digits"
                ),
            },
            Kv6Field::RdX => match parse_signed(text, 6) {
                Some(n) => record.rd_x = n as i32,
                None => invalid!(
                    "invalid value for rd-x: not a valid signed number with at most six digits"
                ),
            },
            Kv6Field::DistanceSinceLastUserStop => match parse_unsigned(text, 5) {
                Some(n) => record.distance_since_last_user_stop = n as u32,
                None => invalid!(
                    "invalid value for distancesincelastuserstop: not a valid unsigned number with at most five digits"
                ),
            },
        }
        true
    }
}
