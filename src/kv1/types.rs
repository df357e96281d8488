//! The KV1 "Dienstregeling" data model: TMI8 KV1 v8.3.0.2, 29 tables.
//!
//! Every record is `(key, attributes, resolved references)`. Keys are the
//! composite identifiers defined by the standard and always start with the
//! `DataOwnerCode` (operator). Resolved references are `Option<usize>`
//! indices into the owning vector of the referenced type inside
//! [`Kv1Records`]; they start out `None` and are filled in by the linker.

use crate::time::{Date, ServiceTime};
use chrono::{DateTime, Utc};
use compact_str::CompactString;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// Table 1: Organizational Unit [ORUN]. A collection of trips with the same
// validity features (school holidays, shopping Sundays, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1OrganizationalUnitKey {
    pub data_owner_code: CompactString,
    pub organizational_unit_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1OrganizationalUnit {
    pub key: Kv1OrganizationalUnitKey,
    pub name: String,
    pub organizational_unit_type: CompactString,
    pub description: String,
}

// Table 2: Higher Organizational Unit [ORUNORUN]. Hierarchy edge between two
// organizational units.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1HigherOrganizationalUnitKey {
    pub data_owner_code: CompactString,
    pub organizational_unit_code_parent: CompactString,
    pub organizational_unit_code_child: CompactString,
    pub valid_from: Date,
}

#[derive(Clone, Debug)]
pub struct Kv1HigherOrganizationalUnit {
    pub key: Kv1HigherOrganizationalUnitKey,

    pub organizational_unit_parent: Option<usize>,
    pub organizational_unit_child: Option<usize>,
}

// Table 3: User Stop Point [USRSTOP]. Stop or other timing point (e.g. a
// bridge) for which times are recorded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1UserStopPointKey {
    pub data_owner_code: CompactString,
    pub user_stop_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1UserStopPoint {
    pub key: Kv1UserStopPointKey,
    pub timing_point_code: CompactString,
    pub get_in: bool,
    pub get_out: bool,
    pub name: String,
    pub town: String,
    pub user_stop_area_code: CompactString,
    // "-" when not applicable.
    pub stop_side_code: CompactString,
    pub minimal_stop_time_s: f64,
    pub stop_side_length: Option<f64>,
    pub description: String,
    pub user_stop_type: CompactString,
    pub quay_code: CompactString,

    pub user_stop_area: Option<usize>,
    pub point: Option<usize>,
}

// Table 4: User Stop Area [USRSTAR]. A collection of stops sharing a public
// name (bus station, transfer point, both sides of a street).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1UserStopAreaKey {
    pub data_owner_code: CompactString,
    pub user_stop_area_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1UserStopArea {
    pub key: Kv1UserStopAreaKey,
    pub name: String,
    pub town: String,
    pub description: String,
}

// Table 5: Timing Link [TILI]. Link between two stops/timing points of a
// journey pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1TimingLinkKey {
    pub data_owner_code: CompactString,
    pub user_stop_code_begin: CompactString,
    pub user_stop_code_end: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1TimingLink {
    pub key: Kv1TimingLinkKey,
    pub minimal_drive_time_s: Option<f64>,
    pub description: String,

    pub user_stop_begin: Option<usize>,
    pub user_stop_end: Option<usize>,
}

// Table 6: Link [LINK]. Connection between two points on the physical path
// of a route, keyed additionally by modality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1LinkKey {
    pub data_owner_code: CompactString,
    pub user_stop_code_begin: CompactString,
    pub user_stop_code_end: CompactString,
    pub transport_type: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1Link {
    pub key: Kv1LinkKey,
    // Meters.
    pub distance: f64,
    pub description: String,

    pub user_stop_begin: Option<usize>,
    pub user_stop_end: Option<usize>,
}

// Table 7: Line [LINE]. A collection of journey patterns publicly known
// under a shared number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1LineKey {
    pub data_owner_code: CompactString,
    pub line_planning_number: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1Line {
    pub key: Kv1LineKey,
    pub line_public_number: CompactString,
    pub line_name: String,
    // The standard constrains this to [0, 400); real feeds do not honor that,
    // so only integrality is enforced.
    pub line_ve_tag_number: i16,
    pub description: String,
    pub transport_type: CompactString,
    pub line_icon: Option<i16>,
    pub line_color: Option<RgbColor>,
    pub line_text_color: Option<RgbColor>,

    pub icon: Option<usize>,
}

// Table 8: Destination [DEST]. Destination display texts in the various
// widths, plus optional icon and colors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1DestinationKey {
    pub data_owner_code: CompactString,
    pub dest_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1Destination {
    pub key: Kv1DestinationKey,
    pub dest_name_full: String,
    pub dest_name_main: String,
    pub dest_name_detail: String,
    pub relevant_dest_name_detail: bool,
    pub dest_name_main_21: String,
    pub dest_name_detail_21: String,
    pub dest_name_main_19: String,
    pub dest_name_detail_19: String,
    pub dest_name_main_16: String,
    pub dest_name_detail_16: String,
    pub dest_icon: Option<i16>,
    pub dest_color: Option<RgbColor>,
    pub dest_text_color: Option<RgbColor>,
}

// Table 9: Journey Pattern [JOPA]. Route variant from start to end point as
// an ordered list of timing links.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1JourneyPatternKey {
    pub data_owner_code: CompactString,
    pub line_planning_number: CompactString,
    pub journey_pattern_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1JourneyPattern {
    pub key: Kv1JourneyPatternKey,
    pub journey_pattern_type: CompactString,
    // One of '1', '2', 'A', 'B'.
    pub direction: char,
    pub description: String,

    pub line: Option<usize>,
}

// Table 10: Concession Financer Relation [CONFINREL]. Smallest unit (parcel)
// relating a concession to a financer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1ConcessionFinancerRelationKey {
    pub data_owner_code: CompactString,
    pub con_fin_rel_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1ConcessionFinancerRelation {
    pub key: Kv1ConcessionFinancerRelationKey,
    pub concession_area_code: CompactString,
    pub financer_code: CompactString,

    pub concession_area: Option<usize>,
    pub financer: Option<usize>,
}

// Table 11: Concession Area [CONAREA].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1ConcessionAreaKey {
    pub data_owner_code: CompactString,
    pub concession_area_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1ConcessionArea {
    pub key: Kv1ConcessionAreaKey,
    pub description: String,
}

// Table 12: Financer [FINANCER].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1FinancerKey {
    pub data_owner_code: CompactString,
    pub financer_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1Financer {
    pub key: Kv1FinancerKey,
    pub description: String,
}

// Table 13: Journey Pattern Timing Link [JOPATILI]. The ordered composition
// of a journey pattern from logical links, with per-link display features.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1JourneyPatternTimingLinkKey {
    pub data_owner_code: CompactString,
    pub line_planning_number: CompactString,
    pub journey_pattern_code: CompactString,
    pub timing_link_order: i16,
}

#[derive(Clone, Debug)]
pub struct Kv1JourneyPatternTimingLink {
    pub key: Kv1JourneyPatternTimingLinkKey,
    pub user_stop_code_begin: CompactString,
    pub user_stop_code_end: CompactString,
    pub con_fin_rel_code: CompactString,
    pub dest_code: CompactString,
    pub is_timing_stop: bool,
    pub display_public_line: CompactString,
    pub product_formula_type: Option<i16>,
    pub get_in: bool,
    pub get_out: bool,
    // E21: "TRUE", "FALSE", "REALTIME" or empty.
    pub show_flexible_trip: CompactString,
    pub line_dest_icon: Option<i16>,
    pub line_dest_color: Option<RgbColor>,
    pub line_dest_text_color: Option<RgbColor>,

    pub line: Option<usize>,
    pub journey_pattern: Option<usize>,
    pub user_stop_begin: Option<usize>,
    pub user_stop_end: Option<usize>,
    pub con_fin_rel: Option<usize>,
    pub dest: Option<usize>,
    pub icon: Option<usize>,
}

// Table 14: Point [POINT]. Smallest addressable location; every stop is a
// point. Coordinates are in the Dutch RD system, in meters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1PointKey {
    pub data_owner_code: CompactString,
    pub point_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1Point {
    pub key: Kv1PointKey,
    pub point_type: CompactString,
    // Only "RD" is allowed by the standard.
    pub coordinate_system_type: CompactString,
    pub location_x_ew: f64,
    pub location_y_ns: f64,
    pub location_z: Option<f64>,
    pub description: String,
}

// Table 15: Point on Link [POOL]. Curve point describing the trajectory
// between two stops.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1PointOnLinkKey {
    pub data_owner_code: CompactString,
    pub user_stop_code_begin: CompactString,
    pub user_stop_code_end: CompactString,
    pub point_data_owner_code: CompactString,
    pub point_code: CompactString,
    pub transport_type: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1PointOnLink {
    pub key: Kv1PointOnLinkKey,
    pub distance_since_start_of_link: f64,
    pub segment_speed_mps: Option<f64>,
    pub local_point_speed_mps: Option<f64>,
    pub description: String,

    pub user_stop_begin: Option<usize>,
    pub user_stop_end: Option<usize>,
    pub point: Option<usize>,
}

// Table 16: Icon [ICON]. Images referred to from DEST, LINE and JOPATILI.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1IconKey {
    pub data_owner_code: CompactString,
    pub icon_number: i16,
}

#[derive(Clone, Debug)]
pub struct Kv1Icon {
    pub key: Kv1IconKey,
    pub icon_uri: String,
}

// Table 17: Notice [NOTICE]. Reusable clarifying text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1NoticeKey {
    pub data_owner_code: CompactString,
    pub notice_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1Notice {
    pub key: Kv1NoticeKey,
    pub notice_content: String,
}

// Table 18: Notice Assignment [NTCASSGNM]. Pure edge record assigning a
// notice to a line, journey pattern, journey or stop passing. Which
// attributes are meaningful depends on `assigned_object` (PUJO, PUJOPASS,
// LINE or JOPATILI); the record has no key and is not indexed.
#[derive(Clone, Debug)]
pub struct Kv1NoticeAssignment {
    pub data_owner_code: CompactString,
    pub notice_code: CompactString,
    pub assigned_object: CompactString,
    pub timetable_version_code: CompactString,
    pub organizational_unit_code: CompactString,
    pub schedule_code: CompactString,
    pub schedule_type_code: CompactString,
    pub period_group_code: CompactString,
    pub specific_day_code: CompactString,
    pub day_type: CompactString,
    pub line_planning_number: CompactString,
    pub journey_number: Option<i32>,
    pub stop_order: Option<i16>,
    pub journey_pattern_code: CompactString,
    pub timing_link_order: Option<i16>,
    pub user_stop_code: CompactString,

    pub notice: Option<usize>,
}

// Table 19: Time Demand Group [TIMDEMGRP]. Grouping of the run time
// distribution of a journey pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1TimeDemandGroupKey {
    pub data_owner_code: CompactString,
    pub line_planning_number: CompactString,
    pub journey_pattern_code: CompactString,
    pub time_demand_group_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1TimeDemandGroup {
    pub key: Kv1TimeDemandGroupKey,

    pub line: Option<usize>,
    pub journey_pattern: Option<usize>,
}

// Table 20: Time Demand Group Run Time [TIMDEMRNT]. Run time structure per
// timing link of a journey pattern/time demand group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1TimeDemandGroupRunTimeKey {
    pub data_owner_code: CompactString,
    pub line_planning_number: CompactString,
    pub journey_pattern_code: CompactString,
    pub time_demand_group_code: CompactString,
    pub timing_link_order: i16,
}

#[derive(Clone, Debug)]
pub struct Kv1TimeDemandGroupRunTime {
    pub key: Kv1TimeDemandGroupRunTimeKey,
    pub user_stop_code_begin: CompactString,
    pub user_stop_code_end: CompactString,
    pub total_drive_time_s: f64,
    pub drive_time_s: f64,
    pub expected_delay_s: Option<f64>,
    pub layover_time_s: Option<f64>,
    pub stop_wait_time_s: f64,
    pub minimum_stop_time_s: Option<f64>,

    pub line: Option<usize>,
    pub user_stop_begin: Option<usize>,
    pub user_stop_end: Option<usize>,
    pub journey_pattern: Option<usize>,
    pub time_demand_group: Option<usize>,
    pub journey_pattern_timing_link: Option<usize>,
}

// Table 21: Period Group [PEGR]. A homogeneous period of the year w.r.t.
// frequencies and run times.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1PeriodGroupKey {
    pub data_owner_code: CompactString,
    pub period_group_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1PeriodGroup {
    pub key: Kv1PeriodGroupKey,
    pub description: String,
}

// Table 22: Specific Day [SPECDAY]. A day with a deviating service level
// (shopping Sundays, New Year's Eve, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1SpecificDayKey {
    pub data_owner_code: CompactString,
    pub specific_day_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1SpecificDay {
    pub key: Kv1SpecificDayKey,
    pub name: String,
    pub description: String,
}

// Table 23: Timetable Version [TIVE]. Bundles planned activities for an
// organizational unit ("validities and time demand groups" variant).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1TimetableVersionKey {
    pub data_owner_code: CompactString,
    pub organizational_unit_code: CompactString,
    pub timetable_version_code: CompactString,
    pub period_group_code: CompactString,
    pub specific_day_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1TimetableVersion {
    pub key: Kv1TimetableVersionKey,
    pub valid_from: Date,
    // "PUBT".
    pub timetable_version_type: CompactString,
    pub valid_thru: Option<Date>,
    pub description: String,

    pub organizational_unit: Option<usize>,
    pub period_group: Option<usize>,
    pub specific_day: Option<usize>,
}

// Table 24: Public Journey [PUJO]. A scheduled passenger trip.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1PublicJourneyKey {
    pub data_owner_code: CompactString,
    pub timetable_version_code: CompactString,
    pub organizational_unit_code: CompactString,
    pub period_group_code: CompactString,
    pub specific_day_code: CompactString,
    // [0|1][0|2]...[0|7] for Mon..Sun, e.g. "1234500".
    pub day_type: CompactString,
    pub line_planning_number: CompactString,
    pub journey_number: i32,
}

#[derive(Clone, Debug)]
pub struct Kv1PublicJourney {
    pub key: Kv1PublicJourneyKey,
    pub time_demand_group_code: CompactString,
    pub journey_pattern_code: CompactString,
    pub departure_time: ServiceTime,
    // E3: "ACCESSIBLE", "NOTACCESSIBLE" or "UNKNOWN".
    pub wheelchair_accessible: CompactString,
    pub data_owner_is_operator: bool,
    pub planned_monitored: bool,
    pub product_formula_type: Option<i16>,
    pub show_flexible_trip: CompactString,

    pub timetable_version: Option<usize>,
    pub organizational_unit: Option<usize>,
    pub period_group: Option<usize>,
    pub specific_day: Option<usize>,
    pub line: Option<usize>,
    pub time_demand_group: Option<usize>,
    pub journey_pattern: Option<usize>,
}

// Table 25: Period Group Validity [PEGRVAL]. From/thru validity dates of a
// period group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1PeriodGroupValidityKey {
    pub data_owner_code: CompactString,
    pub organizational_unit_code: CompactString,
    pub period_group_code: CompactString,
    pub valid_from: Date,
}

#[derive(Clone, Debug)]
pub struct Kv1PeriodGroupValidity {
    pub key: Kv1PeriodGroupValidityKey,
    pub valid_thru: Date,

    pub organizational_unit: Option<usize>,
    pub period_group: Option<usize>,
}

// Table 26: Exceptional Operating Day [EXCOPDAY]. Calendar dates on which
// service runs following a different day type or period.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1ExceptionalOperatingDayKey {
    pub data_owner_code: CompactString,
    pub organizational_unit_code: CompactString,
    pub valid_date: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Kv1ExceptionalOperatingDay {
    pub key: Kv1ExceptionalOperatingDayKey,
    pub day_type_as_on: CompactString,
    pub specific_day_code: CompactString,
    pub period_group_code: CompactString,
    pub description: String,

    pub organizational_unit: Option<usize>,
    pub specific_day: Option<usize>,
    pub period_group: Option<usize>,
}

// Table 27: Schedule Version [SCHEDVERS]. Bundles planned activities per day
// type ("schedules and passing times" variant).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1ScheduleVersionKey {
    pub data_owner_code: CompactString,
    pub organizational_unit_code: CompactString,
    pub schedule_code: CompactString,
    pub schedule_type_code: CompactString,
}

#[derive(Clone, Debug)]
pub struct Kv1ScheduleVersion {
    pub key: Kv1ScheduleVersionKey,
    pub valid_from: Date,
    pub valid_thru: Option<Date>,
    pub description: String,

    pub organizational_unit: Option<usize>,
}

// Table 28: Public Journey Passing Times [PUJOPASS]. Arrival/departure at
// one stop of a public journey.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1PublicJourneyPassingTimesKey {
    pub data_owner_code: CompactString,
    pub organizational_unit_code: CompactString,
    pub schedule_code: CompactString,
    pub schedule_type_code: CompactString,
    pub line_planning_number: CompactString,
    pub journey_number: i32,
    pub stop_order: i16,
}

#[derive(Clone, Debug)]
pub struct Kv1PublicJourneyPassingTimes {
    pub key: Kv1PublicJourneyPassingTimesKey,
    pub journey_pattern_code: CompactString,
    pub user_stop_code: CompactString,
    // Not compulsory for the first stop of a journey.
    pub target_arrival_time: Option<ServiceTime>,
    // Not compulsory for the last stop of a journey.
    pub target_departure_time: Option<ServiceTime>,
    pub wheelchair_accessible: CompactString,
    pub data_owner_is_operator: bool,
    pub planned_monitored: bool,
    pub product_formula_type: Option<i16>,
    pub show_flexible_trip: CompactString,

    pub organizational_unit: Option<usize>,
    pub schedule_version: Option<usize>,
    pub line: Option<usize>,
    pub journey_pattern: Option<usize>,
    pub user_stop: Option<usize>,
}

// Table 29: Operating Day [OPERDAY]. The operational calendar: which
// schedule version applies per day, per organizational unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Kv1OperatingDayKey {
    pub data_owner_code: CompactString,
    pub organizational_unit_code: CompactString,
    pub schedule_code: CompactString,
    pub schedule_type_code: CompactString,
    pub valid_date: Date,
}

#[derive(Clone, Debug)]
pub struct Kv1OperatingDay {
    pub key: Kv1OperatingDayKey,
    pub description: String,

    pub organizational_unit: Option<usize>,
    pub schedule_version: Option<usize>,
}

/// Owner of all parsed KV1 records. Built once by the parser; afterwards
/// logically immutable except for the linker filling resolved references.
#[derive(Clone, Debug, Default)]
pub struct Kv1Records {
    pub organizational_units: Vec<Kv1OrganizationalUnit>,
    pub higher_organizational_units: Vec<Kv1HigherOrganizationalUnit>,
    pub user_stop_points: Vec<Kv1UserStopPoint>,
    pub user_stop_areas: Vec<Kv1UserStopArea>,
    pub timing_links: Vec<Kv1TimingLink>,
    pub links: Vec<Kv1Link>,
    pub lines: Vec<Kv1Line>,
    pub destinations: Vec<Kv1Destination>,
    pub journey_patterns: Vec<Kv1JourneyPattern>,
    pub concession_financer_relations: Vec<Kv1ConcessionFinancerRelation>,
    pub concession_areas: Vec<Kv1ConcessionArea>,
    pub financers: Vec<Kv1Financer>,
    pub journey_pattern_timing_links: Vec<Kv1JourneyPatternTimingLink>,
    pub points: Vec<Kv1Point>,
    pub point_on_links: Vec<Kv1PointOnLink>,
    pub icons: Vec<Kv1Icon>,
    pub notices: Vec<Kv1Notice>,
    pub notice_assignments: Vec<Kv1NoticeAssignment>,
    pub time_demand_groups: Vec<Kv1TimeDemandGroup>,
    pub time_demand_group_run_times: Vec<Kv1TimeDemandGroupRunTime>,
    pub period_groups: Vec<Kv1PeriodGroup>,
    pub specific_days: Vec<Kv1SpecificDay>,
    pub timetable_versions: Vec<Kv1TimetableVersion>,
    pub public_journeys: Vec<Kv1PublicJourney>,
    pub period_group_validities: Vec<Kv1PeriodGroupValidity>,
    pub exceptional_operating_days: Vec<Kv1ExceptionalOperatingDay>,
    pub schedule_versions: Vec<Kv1ScheduleVersion>,
    pub public_journey_passing_times: Vec<Kv1PublicJourneyPassingTimes>,
    pub operating_days: Vec<Kv1OperatingDay>,
}

impl Kv1Records {
    pub fn total(&self) -> usize {
        self.organizational_units.len()
            + self.higher_organizational_units.len()
            + self.user_stop_points.len()
            + self.user_stop_areas.len()
            + self.timing_links.len()
            + self.links.len()
            + self.lines.len()
            + self.destinations.len()
            + self.journey_patterns.len()
            + self.concession_financer_relations.len()
            + self.concession_areas.len()
            + self.financers.len()
            + self.journey_pattern_timing_links.len()
            + self.points.len()
            + self.point_on_links.len()
            + self.icons.len()
            + self.notices.len()
            + self.notice_assignments.len()
            + self.time_demand_groups.len()
            + self.time_demand_group_run_times.len()
            + self.period_groups.len()
            + self.specific_days.len()
            + self.timetable_versions.len()
            + self.public_journeys.len()
            + self.period_group_validities.len()
            + self.exceptional_operating_days.len()
            + self.schedule_versions.len()
            + self.public_journey_passing_times.len()
            + self.operating_days.len()
    }

    /// Per-type counts, for census logging after a parse.
    pub fn census(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("organizational_units", self.organizational_units.len()),
            ("higher_organizational_units", self.higher_organizational_units.len()),
            ("user_stop_points", self.user_stop_points.len()),
            ("user_stop_areas", self.user_stop_areas.len()),
            ("timing_links", self.timing_links.len()),
            ("links", self.links.len()),
            ("lines", self.lines.len()),
            ("destinations", self.destinations.len()),
            ("journey_patterns", self.journey_patterns.len()),
            ("concession_financer_relations", self.concession_financer_relations.len()),
            ("concession_areas", self.concession_areas.len()),
            ("financers", self.financers.len()),
            ("journey_pattern_timing_links", self.journey_pattern_timing_links.len()),
            ("points", self.points.len()),
            ("point_on_links", self.point_on_links.len()),
            ("icons", self.icons.len()),
            ("notices", self.notices.len()),
            ("notice_assignments", self.notice_assignments.len()),
            ("time_demand_groups", self.time_demand_groups.len()),
            ("time_demand_group_run_times", self.time_demand_group_run_times.len()),
            ("period_groups", self.period_groups.len()),
            ("specific_days", self.specific_days.len()),
            ("timetable_versions", self.timetable_versions.len()),
            ("public_journeys", self.public_journeys.len()),
            ("period_group_validities", self.period_group_validities.len()),
            ("exceptional_operating_days", self.exceptional_operating_days.len()),
            ("schedule_versions", self.schedule_versions.len()),
            ("public_journey_passing_times", self.public_journey_passing_times.len()),
            ("operating_days", self.operating_days.len()),
        ]
    }
}
