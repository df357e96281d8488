//! The KV6 vehicle-position record model.
//!
//! A record is one of nine position message types plus a bitset saying which
//! of the 17 optional fields are present. Validity is purely shape-based:
//! every field of the type's required mask must be present, and nothing
//! outside `required | optional` may remain after normalization.

use crate::time::{Date, Timestamp};
use compact_str::CompactString;

/// One of the 17 KV6 record fields, in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kv6Field {
    DataOwnerCode = 0,
    LinePlanningNumber,
    OperatingDay,
    JourneyNumber,
    ReinforcementNumber,
    Timestamp,
    Source,
    Punctuality,
    UserStopCode,
    PassageSequenceNumber,
    VehicleNumber,
    BlockCode,
    WheelchairAccessible,
    NumberOfCoaches,
    RdY,
    RdX,
    DistanceSinceLastUserStop,
}

impl Kv6Field {
    pub const ALL: [Kv6Field; 17] = [
        Kv6Field::DataOwnerCode,
        Kv6Field::LinePlanningNumber,
        Kv6Field::OperatingDay,
        Kv6Field::JourneyNumber,
        Kv6Field::ReinforcementNumber,
        Kv6Field::Timestamp,
        Kv6Field::Source,
        Kv6Field::Punctuality,
        Kv6Field::UserStopCode,
        Kv6Field::PassageSequenceNumber,
        Kv6Field::VehicleNumber,
        Kv6Field::BlockCode,
        Kv6Field::WheelchairAccessible,
        Kv6Field::NumberOfCoaches,
        Kv6Field::RdY,
        Kv6Field::RdX,
        Kv6Field::DistanceSinceLastUserStop,
    ];

    /// The element name inside `KV6posinfo` records.
    pub fn element_name(self) -> &'static str {
        match self {
            Kv6Field::DataOwnerCode => "dataownercode",
            Kv6Field::LinePlanningNumber => "lineplanningnumber",
            Kv6Field::OperatingDay => "operatingday",
            Kv6Field::JourneyNumber => "journeynumber",
            Kv6Field::ReinforcementNumber => "reinforcementnumber",
            Kv6Field::Timestamp => "timestamp",
            Kv6Field::Source => "source",
            Kv6Field::Punctuality => "punctuality",
            Kv6Field::UserStopCode => "userstopcode",
            Kv6Field::PassageSequenceNumber => "passagesequencenumber",
            Kv6Field::VehicleNumber => "vehiclenumber",
            Kv6Field::BlockCode => "blockcode",
            Kv6Field::WheelchairAccessible => "wheelchairaccessible",
            Kv6Field::NumberOfCoaches => "numberofcoaches",
            Kv6Field::RdY => "rd-y",
            Kv6Field::RdX => "rd-x",
            Kv6Field::DistanceSinceLastUserStop => "distancesincelastuserstop",
        }
    }
}

/// A set of [`Kv6Field`]s, packed into a `u32`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldSet(u32);

impl FieldSet {
    pub const EMPTY: FieldSet = FieldSet(0);

    pub const fn with(self, field: Kv6Field) -> FieldSet {
        FieldSet(self.0 | 1 << field as u32)
    }

    pub fn insert(&mut self, field: Kv6Field) {
        self.0 |= 1 << field as u32;
    }

    pub fn remove(&mut self, field: Kv6Field) {
        self.0 &= !(1 << field as u32);
    }

    pub fn contains(self, field: Kv6Field) -> bool {
        self.0 & 1 << field as u32 != 0
    }

    pub const fn union(self, other: FieldSet) -> FieldSet {
        FieldSet(self.0 | other.0)
    }

    pub const fn intersection(self, other: FieldSet) -> FieldSet {
        FieldSet(self.0 & other.0)
    }

    pub const fn difference(self, other: FieldSet) -> FieldSet {
        FieldSet(self.0 & !other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// The common prefix every record type requires.
const IDENTITY: FieldSet = FieldSet::EMPTY
    .with(Kv6Field::DataOwnerCode)
    .with(Kv6Field::LinePlanningNumber)
    .with(Kv6Field::OperatingDay)
    .with(Kv6Field::JourneyNumber)
    .with(Kv6Field::ReinforcementNumber)
    .with(Kv6Field::Timestamp)
    .with(Kv6Field::Source);

const STOP_PASSAGE: FieldSet = FieldSet::EMPTY
    .with(Kv6Field::UserStopCode)
    .with(Kv6Field::PassageSequenceNumber)
    .with(Kv6Field::VehicleNumber);

const RD_POSITION: FieldSet = FieldSet::EMPTY.with(Kv6Field::RdX).with(Kv6Field::RdY);

/// The nine KV6 position message types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kv6RecordType {
    Delay,
    Init,
    Arrival,
    OnStop,
    Departure,
    OnRoute,
    OnPath,
    OffRoute,
    End,
}

impl Kv6RecordType {
    pub const ALL: [Kv6RecordType; 9] = [
        Kv6RecordType::Delay,
        Kv6RecordType::Init,
        Kv6RecordType::Arrival,
        Kv6RecordType::OnStop,
        Kv6RecordType::Departure,
        Kv6RecordType::OnRoute,
        Kv6RecordType::OnPath,
        Kv6RecordType::OffRoute,
        Kv6RecordType::End,
    ];

    /// The element name inside `KV6posinfo`, also the `type` output column.
    pub fn element_name(self) -> &'static str {
        match self {
            Kv6RecordType::Delay => "DELAY",
            Kv6RecordType::Init => "INIT",
            Kv6RecordType::Arrival => "ARRIVAL",
            Kv6RecordType::OnStop => "ONSTOP",
            Kv6RecordType::Departure => "DEPARTURE",
            Kv6RecordType::OnRoute => "ONROUTE",
            Kv6RecordType::OnPath => "ONPATH",
            Kv6RecordType::OffRoute => "OFFROUTE",
            Kv6RecordType::End => "END",
        }
    }

    pub fn from_element_name(name: &str) -> Option<Kv6RecordType> {
        Kv6RecordType::ALL
            .into_iter()
            .find(|t| t.element_name() == name)
    }

    pub fn required_fields(self) -> FieldSet {
        match self {
            Kv6RecordType::Delay => IDENTITY.with(Kv6Field::Punctuality),
            Kv6RecordType::Init => IDENTITY
                .union(STOP_PASSAGE)
                .with(Kv6Field::BlockCode)
                .with(Kv6Field::WheelchairAccessible)
                .with(Kv6Field::NumberOfCoaches),
            Kv6RecordType::Arrival | Kv6RecordType::OnStop | Kv6RecordType::Departure => {
                IDENTITY.union(STOP_PASSAGE).with(Kv6Field::Punctuality)
            }
            Kv6RecordType::OnRoute => IDENTITY
                .union(STOP_PASSAGE)
                .with(Kv6Field::Punctuality)
                .union(RD_POSITION),
            // ONPATH is defined by TMI8 but carries no processable payload.
            Kv6RecordType::OnPath => FieldSet::EMPTY,
            Kv6RecordType::OffRoute => IDENTITY.union(STOP_PASSAGE).union(RD_POSITION),
            Kv6RecordType::End => IDENTITY.union(STOP_PASSAGE),
        }
    }

    pub fn optional_fields(self) -> FieldSet {
        match self {
            Kv6RecordType::Arrival | Kv6RecordType::OnStop | Kv6RecordType::Departure => {
                RD_POSITION
            }
            Kv6RecordType::OnRoute => {
                FieldSet::EMPTY.with(Kv6Field::DistanceSinceLastUserStop)
            }
            _ => FieldSet::EMPTY,
        }
    }

    pub fn supported_fields(self) -> FieldSet {
        self.required_fields().union(self.optional_fields())
    }
}

/// One KV6 vehicle-position record: type, presence bitset, and the union of
/// all possible field values. A field's value is meaningful only when its
/// presence bit is set.
#[derive(Clone, Debug, PartialEq)]
pub struct Kv6Record {
    pub record_type: Kv6RecordType,
    pub presence: FieldSet,
    pub data_owner_code: CompactString,
    pub line_planning_number: CompactString,
    pub source: CompactString,
    pub user_stop_code: CompactString,
    pub wheelchair_accessible: CompactString,
    pub operating_day: Date,
    pub timestamp: Timestamp,
    pub block_code: u32,
    pub journey_number: u32,
    pub vehicle_number: u32,
    pub rd_x: i32,
    pub rd_y: i32,
    pub distance_since_last_user_stop: u32,
    pub passage_sequence_number: u16,
    pub punctuality: i16,
    pub number_of_coaches: u8,
    pub reinforcement_number: u8,
}

impl Kv6Record {
    pub fn new(record_type: Kv6RecordType) -> Kv6Record {
        Kv6Record {
            record_type,
            presence: FieldSet::EMPTY,
            data_owner_code: CompactString::default(),
            line_planning_number: CompactString::default(),
            source: CompactString::default(),
            user_stop_code: CompactString::default(),
            wheelchair_accessible: CompactString::default(),
            operating_day: Date::default(),
            timestamp: Timestamp::default(),
            block_code: 0,
            journey_number: 0,
            vehicle_number: 0,
            rd_x: 0,
            rd_y: 0,
            distance_since_last_user_stop: 0,
            passage_sequence_number: 0,
            punctuality: 0,
            number_of_coaches: 0,
            reinforcement_number: 0,
        }
    }

    pub fn mark_present(&mut self, field: Kv6Field) {
        self.presence.insert(field);
    }

    /// Drops presence bits for fields the record's type does not support.
    pub fn remove_unsupported_fields(&mut self) {
        self.presence = self
            .presence
            .intersection(self.record_type.supported_fields());
    }

    /// Shape check: all required fields present, nothing unsupported left.
    pub fn is_valid(&self) -> bool {
        let required = self.record_type.required_fields();
        let supported = self.record_type.supported_fields();
        self.presence.intersection(required) == required
            && self.presence.difference(supported).is_empty()
    }

    /// The fields that make it into the columnar output: presence masked to
    /// the supported set, with the `-1` sentinel coordinates cleared. Some
    /// feeds mark `rd-x`/`rd-y` required but send `-1` for "unknown"; those
    /// emit as null.
    pub fn emitted_fields(&self) -> FieldSet {
        let mut used = self.presence.intersection(self.record_type.supported_fields());
        if used.contains(Kv6Field::RdX) && self.rd_x == -1 {
            used.remove(Kv6Field::RdX);
        }
        if used.contains(Kv6Field::RdY) && self.rd_y == -1 {
            used.remove(Kv6Field::RdY);
        }
        used
    }
}

/// A `VV_TM_PUSH` envelope: subscription metadata plus the position records
/// of one push. All envelope fields are required.
#[derive(Clone, Debug, PartialEq)]
pub struct VvTmPushInfo {
    pub subscriber_id: String,
    pub version: String,
    pub dossier_name: String,
    pub timestamp: Timestamp,
    pub records: Vec<Kv6Record>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_route_minimal() -> Kv6Record {
        let mut record = Kv6Record::new(Kv6RecordType::OnRoute);
        record.data_owner_code = "CXX".into();
        record.line_planning_number = "M300".into();
        record.operating_day = crate::time::Date { year: 2024, month: 6, day: 1 };
        record.journey_number = 2045;
        record.reinforcement_number = 0;
        record.timestamp = crate::time::Timestamp::parse("2024-06-01T12:00:00Z").unwrap();
        record.source = "VEHICLE".into();
        record.punctuality = 30;
        record.user_stop_code = "10001".into();
        record.passage_sequence_number = 0;
        record.vehicle_number = 8401;
        record.rd_x = 155000;
        record.rd_y = 463000;
        for field in [
            Kv6Field::DataOwnerCode,
            Kv6Field::LinePlanningNumber,
            Kv6Field::OperatingDay,
            Kv6Field::JourneyNumber,
            Kv6Field::ReinforcementNumber,
            Kv6Field::Timestamp,
            Kv6Field::Source,
            Kv6Field::Punctuality,
            Kv6Field::UserStopCode,
            Kv6Field::PassageSequenceNumber,
            Kv6Field::VehicleNumber,
            Kv6Field::RdX,
            Kv6Field::RdY,
        ] {
            record.mark_present(field);
        }
        record
    }

    #[test]
    fn on_route_with_exactly_required_fields_is_valid() {
        let record = on_route_minimal();
        assert!(record.is_valid());
        assert_eq!(record.presence, Kv6RecordType::OnRoute.required_fields());
    }

    #[test]
    fn missing_required_field_invalidates() {
        let mut record = on_route_minimal();
        record.presence.remove(Kv6Field::RdX);
        assert!(!record.is_valid());
    }

    #[test]
    fn optional_field_is_allowed() {
        let mut record = on_route_minimal();
        record.distance_since_last_user_stop = 250;
        record.mark_present(Kv6Field::DistanceSinceLastUserStop);
        assert!(record.is_valid());
    }

    #[test]
    fn unsupported_fields_are_stripped() {
        let mut record = on_route_minimal();
        // block code is INIT-only; a DELAY/ONROUTE message carrying it is
        // normalized rather than rejected.
        record.block_code = 99;
        record.mark_present(Kv6Field::BlockCode);
        assert!(!record.is_valid());
        record.remove_unsupported_fields();
        assert!(record.is_valid());
        assert!(!record.presence.contains(Kv6Field::BlockCode));
    }

    #[test]
    fn rd_sentinels_are_cleared_on_emission() {
        let mut record = on_route_minimal();
        record.rd_x = -1;
        record.rd_y = -1;
        assert!(record.is_valid());
        let used = record.emitted_fields();
        assert!(!used.contains(Kv6Field::RdX));
        assert!(!used.contains(Kv6Field::RdY));
        assert!(used.contains(Kv6Field::Punctuality));
    }

    #[test]
    fn on_path_supports_nothing() {
        assert!(Kv6RecordType::OnPath.supported_fields().is_empty());
        let mut record = Kv6Record::new(Kv6RecordType::OnPath);
        assert!(record.is_valid());
        record.mark_present(Kv6Field::DataOwnerCode);
        assert!(!record.is_valid());
    }

    #[test]
    fn record_type_element_names_roundtrip() {
        for t in Kv6RecordType::ALL {
            assert_eq!(Kv6RecordType::from_element_name(t.element_name()), Some(t));
        }
        assert_eq!(Kv6RecordType::from_element_name("UNKNOWN"), None);
    }
}
